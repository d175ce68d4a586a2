use indexmap::IndexMap;

use crate::Object;

/// Named arguments of a call, in the order they were given.
pub type Kwargs = IndexMap<String, Object>;

/// Positional and named arguments for one proxy call.
///
/// Lua has no keyword arguments, so named arguments are collapsed into a single
/// trailing table when the call is marshaled. Build one from `()`, a tuple of up to
/// six values, a `Vec<Object>`, or fluently:
///
/// ```
/// use pxl::CallArgs;
///
/// let args = CallArgs::new().kwarg("width", 3).kwarg("height", 4);
/// assert_eq!(args.positional().len(), 0);
/// assert_eq!(args.kwargs().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Object>,
    kwargs: Kwargs,
}

impl CallArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Object>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds a named argument, replacing any earlier one with the same name.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Object>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Replaces the named arguments wholesale.
    #[must_use]
    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    #[must_use]
    pub fn positional(&self) -> &[Object] {
        &self.positional
    }

    #[must_use]
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub(crate) fn into_parts(self) -> (Vec<Object>, Kwargs) {
        (self.positional, self.kwargs)
    }
}

impl From<()> for CallArgs {
    fn from((): ()) -> Self {
        Self::default()
    }
}

impl From<Vec<Object>> for CallArgs {
    fn from(positional: Vec<Object>) -> Self {
        Self {
            positional,
            kwargs: Kwargs::new(),
        }
    }
}

impl From<Kwargs> for CallArgs {
    fn from(kwargs: Kwargs) -> Self {
        Self {
            positional: Vec::new(),
            kwargs,
        }
    }
}

macro_rules! impl_from_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Object>),+> From<($($name,)+)> for CallArgs {
            #[expect(non_snake_case, reason = "bindings reuse the type parameter names")]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Self {
                    positional: vec![$($name.into()),+],
                    kwargs: Kwargs::new(),
                }
            }
        }
    };
}

impl_from_tuple!(A);
impl_from_tuple!(A, B);
impl_from_tuple!(A, B, C);
impl_from_tuple!(A, B, C, D);
impl_from_tuple!(A, B, C, D, E);
impl_from_tuple!(A, B, C, D, E, F);
