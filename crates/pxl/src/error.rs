/// Failure raised by the embedded Lua engine.
///
/// Covers every compile or runtime failure the engine can report: syntax errors,
/// runtime type errors, calling a non-callable value, a module that cannot be
/// found, exceeding the memory limit, and so on. It is the only error kind that
/// crosses the bridge; the wrapped `mlua::Error` is kept intact so callers can
/// match on it when they need more detail than the message.
#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct EngineError(#[from] mlua::Error);

impl EngineError {
    /// Human-readable message reported by the engine.
    #[must_use]
    pub fn message(&self) -> String {
        self.0.to_string()
    }

    /// Borrows the underlying `mlua` error.
    #[must_use]
    pub fn as_lua(&self) -> &mlua::Error {
        &self.0
    }

    /// Consumes the error and returns the underlying `mlua` error.
    #[must_use]
    pub fn into_lua(self) -> mlua::Error {
        self.0
    }
}

/// Result alias used throughout the bridge.
pub type Result<T> = std::result::Result<T, EngineError>;
