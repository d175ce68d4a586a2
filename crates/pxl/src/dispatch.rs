use mlua::Value;
use tracing::trace;

use crate::EngineContext;

/// Calling convention chosen for a proxy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `f(args...)`: no receiver is injected.
    PlainFunction,
    /// `parent:f(args...)`: the parent is passed as the first argument.
    BoundMethod,
}

/// Decides how a function read from `parent` should be called.
///
/// Lua distinguishes `t.f(x)` from `t:f(x)`, but the host has a single call form,
/// so the convention is reconstructed from the table the function was read from:
/// if that table carries a truthy class marker field, the call is a method call.
///
/// This is a heuristic, not a guarantee. With no parent, a falsy or missing
/// marker, or an engine error while reading the marker (for example an `__index`
/// metamethod that raises, or a parent that cannot be indexed at all), the result
/// is `PlainFunction`. This function never fails.
#[must_use]
pub fn classify_callee(engine: &EngineContext, parent: Option<&Value>) -> CallKind {
    let Some(parent) = parent else {
        return CallKind::PlainFunction;
    };
    match engine.probe_marker(parent) {
        Ok(true) => CallKind::BoundMethod,
        Ok(false) => CallKind::PlainFunction,
        Err(err) => {
            trace!(error = %err, "class marker probe failed, treating callee as a plain function");
            CallKind::PlainFunction
        }
    }
}
