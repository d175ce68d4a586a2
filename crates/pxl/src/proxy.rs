use std::{fmt, ops};

use mlua::{Function, IntoLua, MetaMethod, UserData, UserDataMethods, Value};
use tracing::{error, trace};

use crate::{
    CallArgs, CallKind, EngineContext, Object, Result, classify_callee,
    engine::lua_tostring,
    marshal::{self, Returns},
};

/// Host-side handle to one value living inside the engine.
///
/// Reading a field or index yields another proxy lazily, without copying the
/// engine value; calling a proxy marshals arguments in and results out. A proxy
/// remembers the engine value it was read from (its parent), which is used only
/// to decide between a plain call and a method call, see [`classify_callee`].
///
/// The handle and parent never change after construction; every mutation goes to
/// the engine-side value. Clones share the same handle.
#[derive(Clone)]
pub struct ValueProxy {
    engine: EngineContext,
    handle: Value,
    parent: Option<Value>,
    get_field: Function,
    set_field: Function,
}

impl ValueProxy {
    /// Wraps `handle`, compiling this proxy's field helpers.
    pub fn new(engine: &EngineContext, handle: Value, parent: Option<Value>) -> Result<Self> {
        Ok(Self {
            engine: engine.clone(),
            handle,
            parent,
            get_field: engine.field_getter()?,
            set_field: engine.field_setter()?,
        })
    }

    /// The wrapped engine value.
    #[must_use]
    pub fn handle(&self) -> &Value {
        &self.handle
    }

    /// The engine value this proxy was read from, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Value> {
        self.parent.as_ref()
    }

    /// The engine this proxy belongs to.
    #[must_use]
    pub fn engine(&self) -> &EngineContext {
        &self.engine
    }

    /// Lua type name of the wrapped value (`"table"`, `"function"`, ...).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.handle.type_name()
    }

    /// Reads `self[key]` and wraps the raw result, whatever its type.
    ///
    /// The result is not result-marshaled: reading a number field gives a proxy
    /// around that number. Errors raised by the engine (for example indexing
    /// `nil`) propagate unchanged.
    pub fn get(&self, key: impl IntoLua) -> Result<Self> {
        let raw = self.get_field.call::<Value>((self.handle.clone(), key))?;
        Self::new(&self.engine, raw, Some(self.handle.clone()))
    }

    /// Reads `self[key]`; identical to [`ValueProxy::get`].
    pub fn index(&self, key: impl IntoLua) -> Result<Self> {
        self.get(key)
    }

    /// Writes `self[key] = value`.
    ///
    /// Unlike call arguments, `value` is not unwrapped: passing a proxy stores a
    /// userdata wrapping the proxy, not the engine value it refers to, and lists
    /// or dicts are stored as opaque host objects rather than tables. Use
    /// [`ValueProxy::set_raw`] with [`ValueProxy::handle`] to store the referent.
    pub fn set(&self, key: impl IntoLua, value: impl Into<Object>) -> Result<()> {
        let value = marshal::passthrough(&self.engine, value.into())?;
        self.set_raw(key, value)
    }

    /// Writes `self[key] = value`; identical to [`ValueProxy::set`].
    pub fn set_index(&self, key: impl IntoLua, value: impl Into<Object>) -> Result<()> {
        self.set(key, value)
    }

    /// Writes an engine value as-is.
    pub fn set_raw(&self, key: impl IntoLua, value: Value) -> Result<()> {
        self.set_field.call::<()>((self.handle.clone(), key, value))?;
        Ok(())
    }

    /// Applies a binary Lua operator to `lhs` and `rhs`.
    ///
    /// A fresh two-argument function is compiled on every call. The raw engine
    /// result is returned without result marshaling.
    fn apply_operator(&self, operator: &str, lhs: Object, rhs: Object) -> Result<Value> {
        let function = self
            .engine
            .eval_function(&format!("function(a, b) return a {operator} b end"))?;
        let args = marshal::marshal_args(&self.engine, (lhs, rhs))?;
        Ok(function.call::<Value>(args)?)
    }

    /// `self + other`, returning the raw engine value.
    pub fn add(&self, other: impl Into<Object>) -> Result<Value> {
        self.apply_operator("+", self.into(), other.into())
    }

    /// `other + self`, returning the raw engine value.
    pub fn radd(&self, other: impl Into<Object>) -> Result<Value> {
        self.apply_operator("+", other.into(), self.into())
    }

    /// `self - other`, returning the raw engine value.
    pub fn sub(&self, other: impl Into<Object>) -> Result<Value> {
        self.apply_operator("-", self.into(), other.into())
    }

    /// `self * other`, returning the raw engine value.
    pub fn mul(&self, other: impl Into<Object>) -> Result<Value> {
        self.apply_operator("*", self.into(), other.into())
    }

    /// `other * self`, returning the raw engine value.
    pub fn rmul(&self, other: impl Into<Object>) -> Result<Value> {
        self.apply_operator("*", other.into(), self.into())
    }

    /// `self / other`, returning the raw engine value.
    pub fn div(&self, other: impl Into<Object>) -> Result<Value> {
        self.apply_operator("/", self.into(), other.into())
    }

    /// Calls the wrapped value, choosing the calling convention from its parent.
    ///
    /// If the parent carries the class marker, this is [`ValueProxy::method`];
    /// otherwise it is [`ValueProxy::function`].
    ///
    /// # Panics
    /// Panics if named arguments are combined with more than one positional
    /// argument (counting the receiver of a method call).
    pub fn call(&self, args: impl Into<CallArgs>) -> Result<Returns> {
        let kind = classify_callee(&self.engine, self.parent.as_ref());
        trace!(?kind, callee = self.type_name(), "dispatching proxy call");
        match kind {
            CallKind::BoundMethod => self.method(args),
            CallKind::PlainFunction => self.function(args),
        }
    }

    /// Calls the wrapped value with exactly `args`, no receiver.
    ///
    /// Engine errors are logged and then returned unchanged.
    ///
    /// # Panics
    /// Panics if named arguments are combined with more than one positional argument.
    pub fn function(&self, args: impl Into<CallArgs>) -> Result<Returns> {
        self.invoke(None, args.into())
    }

    /// Calls the wrapped value with its parent prepended as the receiver.
    ///
    /// The receiver is injected even when the parent has no class marker, and is
    /// `nil` when the proxy has no parent. Engine errors are logged and then
    /// returned unchanged.
    ///
    /// # Panics
    /// Panics if named arguments are combined with any positional argument, since
    /// the receiver already occupies the single allowed slot.
    pub fn method(&self, args: impl Into<CallArgs>) -> Result<Returns> {
        let receiver = self.parent.clone().unwrap_or(Value::Nil);
        self.invoke(Some(receiver), args.into())
    }

    fn invoke(&self, receiver: Option<Value>, args: CallArgs) -> Result<Returns> {
        let args = marshal::marshal_call(&self.engine, receiver, args)?;
        let results = self.engine.invoke(&self.handle, args).inspect_err(|err| {
            error!(error = %err, callee = self.type_name(), "engine call failed");
        })?;
        marshal::marshal_results(&self.engine, results)
    }

    /// Renders the wrapped value with Lua's `tostring`.
    pub fn to_lua_string(&self) -> Result<String> {
        self.engine.tostring(&self.handle)
    }
}

impl fmt::Display for ValueProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_lua_string() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "<{} {:p}>", self.type_name(), self.handle.to_pointer()),
        }
    }
}

impl fmt::Debug for ValueProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueProxy")
            .field("handle", &self.handle)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

/// Proxies are equal when they wrap the same engine value (raw equality).
impl PartialEq for ValueProxy {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

/// Userdata stored in Lua when a proxy is written as a field value.
///
/// Holds only the proxy's handle. Nothing stored inside the runtime may own an
/// [`EngineContext`], or the runtime would keep itself alive.
pub(crate) struct StoredProxy(pub(crate) Value);

impl UserData for StoredProxy {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |lua, this, ()| {
            Ok(format!("<proxy {}>", lua_tostring(lua, &this.0)?))
        });
    }
}

macro_rules! impl_operator {
    ($trait:ident, $method:ident) => {
        impl<T: Into<Object>> ops::$trait<T> for &ValueProxy {
            type Output = Result<Value>;

            fn $method(self, rhs: T) -> Self::Output {
                ValueProxy::$method(self, rhs)
            }
        }
    };
}

impl_operator!(Add, add);
impl_operator!(Sub, sub);
impl_operator!(Mul, mul);
impl_operator!(Div, div);
