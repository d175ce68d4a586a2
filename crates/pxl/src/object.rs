use std::fmt::{self, Write};

use indexmap::IndexMap;
use mlua::{Lua, MetaMethod, UserData, UserDataMethods, Value};

use crate::{ValueProxy, engine::lua_tostring};

/// A host-side value that can be passed into or returned from the engine.
///
/// This is the tagged variant the marshalers switch on: the primitive variants
/// (`Nil`, `Bool`, `Int`, `Float`, `String`) cross the boundary as native Lua
/// scalars in both directions, `List` and `Dict` are host composites that become
/// Lua tables when passed as call arguments, and `Proxy` carries a handle to a
/// value that lives inside the engine.
///
/// Results coming back from the engine are only ever primitives or proxies; a
/// Lua table is never copied back into a `List` or `Dict`.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Lua `nil`, the absence marker.
    Nil,
    /// Lua boolean.
    Bool(bool),
    /// Lua integer (64-bit signed).
    Int(i64),
    /// Lua float (64-bit IEEE 754).
    Float(f64),
    /// Lua string, decoded as UTF-8.
    String(String),
    /// Host sequence, converted into a 1-based Lua table.
    List(Vec<Self>),
    /// Host mapping, converted into a keyed Lua table.
    Dict(DictPairs),
    /// Handle to a value inside the engine.
    Proxy(ValueProxy),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                f.write_char('[')?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    item.repr_fmt(f)?;
                }
                f.write_char(']')
            }
            Self::Dict(pairs) => {
                f.write_char('{')?;
                for (index, (key, value)) in pairs.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    key.repr_fmt(f)?;
                    f.write_str(": ")?;
                    value.repr_fmt(f)?;
                }
                f.write_char('}')
            }
            Self::Proxy(proxy) => write!(f, "{proxy}"),
        }
    }
}

impl Object {
    /// Creates a new `Object` from something that can be converted into a `DictPairs`.
    pub fn dict(dict: impl Into<DictPairs>) -> Self {
        Self::Dict(dict.into())
    }

    /// Whether this value crosses the boundary unchanged in both directions.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Nil | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::String(_)
        )
    }

    /// Lua truthiness: only `nil` and `false` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    /// Short name of the variant's kind, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Proxy(_) => "proxy",
        }
    }

    /// Returns the wrapped proxy, if this is one.
    #[must_use]
    pub fn as_proxy(&self) -> Option<&ValueProxy> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Consumes the value and returns the wrapped proxy, if this is one.
    #[must_use]
    pub fn into_proxy(self) -> Option<ValueProxy> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn repr_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<()> for Object {
    fn from((): ()) -> Self {
        Self::Nil
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Object {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Object {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ValueProxy> for Object {
    fn from(value: ValueProxy) -> Self {
        Self::Proxy(value)
    }
}

impl From<&ValueProxy> for Object {
    fn from(value: &ValueProxy) -> Self {
        Self::Proxy(value.clone())
    }
}

impl From<DictPairs> for Object {
    fn from(value: DictPairs) -> Self {
        Self::Dict(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Object {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Object {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}

/// Ordered key/value pairs of a host mapping.
///
/// Keys are arbitrary `Object`s, so floats and proxies may be used as keys the
/// same way Lua allows; insertion order is kept for deterministic table building.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictPairs(Vec<(Object, Object)>);

impl From<Vec<(Object, Object)>> for DictPairs {
    fn from(pairs: Vec<(Object, Object)>) -> Self {
        Self(pairs)
    }
}

impl<K: Into<String>> From<IndexMap<K, Object>> for DictPairs {
    fn from(map: IndexMap<K, Object>) -> Self {
        map.into_iter()
            .map(|(key, value)| (Object::String(key.into()), value))
            .collect()
    }
}

impl IntoIterator for DictPairs {
    type Item = (Object, Object);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DictPairs {
    type Item = &'a (Object, Object);
    type IntoIter = std::slice::Iter<'a, (Object, Object)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Object, Object)> for DictPairs {
    fn from_iter<T: IntoIterator<Item = (Object, Object)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl DictPairs {
    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Object, Object)> {
        self.0.iter()
    }

    /// Appends a pair.
    pub fn push(&mut self, key: impl Into<Object>, value: impl Into<Object>) {
        self.0.push((key.into(), value.into()));
    }
}

/// A host list or dict handed to the engine without conversion.
///
/// Lua sees it as an opaque userdata; only `tostring` is supported on it. Proxies
/// inside are kept as bare handles, so the stored value never owns the engine.
#[derive(Debug, Clone)]
pub struct HostObject(HostValue);

#[derive(Debug, Clone)]
enum HostValue {
    /// Primitive `Object`; never a composite or a proxy.
    Scalar(Object),
    List(Vec<Self>),
    Dict(Vec<(Self, Self)>),
    Handle(Value),
}

impl HostObject {
    /// Detaches `value` from the engine context for storage inside the runtime.
    #[must_use]
    pub fn new(value: Object) -> Self {
        Self(HostValue::detach(value))
    }
}

impl HostValue {
    fn detach(value: Object) -> Self {
        match value {
            Object::Proxy(proxy) => Self::Handle(proxy.handle().clone()),
            Object::List(items) => Self::List(items.into_iter().map(Self::detach).collect()),
            Object::Dict(pairs) => Self::Dict(
                pairs
                    .into_iter()
                    .map(|(key, value)| (Self::detach(key), Self::detach(value)))
                    .collect(),
            ),
            scalar => Self::Scalar(scalar),
        }
    }

    /// Appends the repr-style rendering used by `Object`'s `Display`.
    fn render(&self, lua: &Lua, out: &mut String) -> mlua::Result<()> {
        match self {
            Self::Scalar(Object::String(s)) => out.push_str(&format!("{s:?}")),
            Self::Scalar(scalar) => out.push_str(&scalar.to_string()),
            Self::List(items) => {
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    item.render(lua, out)?;
                }
                out.push(']');
            }
            Self::Dict(pairs) => {
                out.push('{');
                for (index, (key, value)) in pairs.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    key.render(lua, out)?;
                    out.push_str(": ");
                    value.render(lua, out)?;
                }
                out.push('}');
            }
            Self::Handle(value) => out.push_str(&lua_tostring(lua, value)?),
        }
        Ok(())
    }
}

impl UserData for HostObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |lua, this, ()| {
            let mut text = String::from("<host ");
            this.0.render(lua, &mut text)?;
            text.push('>');
            Ok(text)
        });
    }
}
