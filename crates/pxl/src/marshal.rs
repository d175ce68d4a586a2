//! Conversion of values crossing the host/engine boundary.
//!
//! - `marshal_arg` / `marshal_args`: host call arguments into Lua values
//! - `marshal_result` / `marshal_results`: Lua results back into `Object`s
//!
//! Field writes (`ValueProxy::set`) skip `marshal_arg` and use [`passthrough`]
//! instead; see that function for the difference.

use std::ops::Deref;

use mlua::{MultiValue, Value};
use smallvec::SmallVec;

use crate::{CallArgs, EngineContext, HostObject, Object, Result, ValueProxy, proxy::StoredProxy};

/// How nested lists and dicts are handled when building a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nesting {
    /// Nested composites become nested tables.
    Convert,
    /// Nested composites are stored as opaque host userdata.
    Opaque,
}

/// Converts one call argument into its Lua representation.
///
/// Proxies are unwrapped to their handle, lists and dicts are converted
/// recursively into tables, and primitives become native Lua scalars.
pub fn marshal_arg(engine: &EngineContext, arg: Object) -> Result<Value> {
    match arg {
        Object::Proxy(proxy) => Ok(proxy.handle().clone()),
        composite @ (Object::List(_) | Object::Dict(_)) => Ok(Value::Table(engine.table_from(composite, true)?)),
        primitive => primitive_to_lua(engine, primitive),
    }
}

/// Converts a full argument list into the values a Lua callable receives.
///
/// Named arguments, if any, are converted into one table appended after the
/// positional arguments.
///
/// # Panics
/// Panics if named arguments are given together with more than one positional
/// argument. Lua callables receive keyword parameters as a single trailing table,
/// which only makes sense after at most one leading argument.
pub fn marshal_args(engine: &EngineContext, args: impl Into<CallArgs>) -> Result<MultiValue> {
    marshal_call(engine, None, args.into())
}

/// Marshals `args`, optionally preceded by an already-native receiver.
///
/// The receiver counts as a positional argument for the named-argument check.
pub(crate) fn marshal_call(engine: &EngineContext, receiver: Option<Value>, args: CallArgs) -> Result<MultiValue> {
    let (positional, kwargs) = args.into_parts();
    let count = positional.len() + usize::from(receiver.is_some());
    if !kwargs.is_empty() {
        assert!(
            count <= 1,
            "named arguments allow at most one positional argument, got {count}"
        );
    }

    let mut values = Vec::with_capacity(count + 1);
    values.extend(receiver);
    for arg in positional {
        values.push(marshal_arg(engine, arg)?);
    }
    if !kwargs.is_empty() {
        values.push(Value::Table(engine.table_from(Object::dict(kwargs), true)?));
    }
    Ok(MultiValue::from_vec(values))
}

/// Converts one raw engine result into a host value.
///
/// `nil`, booleans, integers, floats and strings pass through as primitives;
/// anything else is wrapped in a new proxy with no parent.
pub fn marshal_result(engine: &EngineContext, value: Value) -> Result<Object> {
    match value {
        Value::Nil => Ok(Object::Nil),
        Value::Boolean(b) => Ok(Object::Bool(b)),
        Value::Integer(i) => Ok(Object::Int(i)),
        Value::Number(n) => Ok(Object::Float(n)),
        Value::String(s) => Ok(Object::String(String::from(s.to_string_lossy()))),
        other => Ok(Object::Proxy(ValueProxy::new(engine, other, None)?)),
    }
}

/// Converts every result of one invocation, preserving order and arity.
pub fn marshal_results(engine: &EngineContext, values: MultiValue) -> Result<Returns> {
    values
        .into_iter()
        .map(|value| marshal_result(engine, value))
        .collect::<Result<SmallVec<_>>>()
        .map(Returns)
}

/// Converts a value for a field write, without unwrapping anything.
///
/// Primitives become native scalars, but a proxy is handed over as a userdata
/// wrapping its handle rather than as the referent itself, and lists and dicts are
/// handed over as opaque [`HostObject`]s instead of tables. Call arguments go
/// through [`marshal_arg`], which does unwrap.
pub(crate) fn passthrough(engine: &EngineContext, value: Object) -> Result<Value> {
    match value {
        Object::Proxy(proxy) => {
            let stored = StoredProxy(proxy.handle().clone());
            Ok(Value::UserData(engine.lua().create_userdata(stored)?))
        }
        composite @ (Object::List(_) | Object::Dict(_)) => {
            Ok(Value::UserData(engine.lua().create_userdata(HostObject::new(composite))?))
        }
        primitive => primitive_to_lua(engine, primitive),
    }
}

/// Converts an element stored inside a table being built by `table_from`.
pub(crate) fn table_element(engine: &EngineContext, item: Object, nesting: Nesting) -> Result<Value> {
    match (item, nesting) {
        (Object::Proxy(proxy), _) => Ok(proxy.handle().clone()),
        (composite @ (Object::List(_) | Object::Dict(_)), Nesting::Convert) => {
            Ok(Value::Table(engine.table_from(composite, true)?))
        }
        (composite @ (Object::List(_) | Object::Dict(_)), Nesting::Opaque) => {
            Ok(Value::UserData(engine.lua().create_userdata(HostObject::new(composite))?))
        }
        (primitive, _) => primitive_to_lua(engine, primitive),
    }
}

fn primitive_to_lua(engine: &EngineContext, value: Object) -> Result<Value> {
    let value = match value {
        Object::Nil => Value::Nil,
        Object::Bool(b) => Value::Boolean(b),
        Object::Int(i) => Value::Integer(i),
        Object::Float(f) => Value::Number(f),
        Object::String(s) => Value::String(engine.lua().create_string(&s)?),
        Object::List(_) | Object::Dict(_) | Object::Proxy(_) => {
            unreachable!("composite values are handled by the caller")
        }
    };
    Ok(value)
}

/// Marshaled results of one invocation.
///
/// Arity is kept exactly: a Lua function returning nothing yields an empty
/// `Returns`, one returning three values yields three entries in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Returns(SmallVec<[Object; 2]>);

impl Returns {
    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the invocation returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the results and returns the first one, or `Nil` if there were none.
    ///
    /// This matches how Lua itself adjusts a call to a single value.
    #[must_use]
    pub fn into_first(self) -> Object {
        self.0.into_iter().next().unwrap_or(Object::Nil)
    }

    /// Consumes the results into a plain vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Object> {
        self.0.into_vec()
    }
}

impl Deref for Returns {
    type Target = [Object];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Returns {
    type Item = Object;
    type IntoIter = smallvec::IntoIter<[Object; 2]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<Object>> for Returns {
    fn from(values: Vec<Object>) -> Self {
        Self(SmallVec::from_vec(values))
    }
}
