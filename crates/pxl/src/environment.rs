use mlua::{IntoLua, Value};
use tracing::debug;

use crate::{
    EngineConfig, EngineContext, Object, PrintWriter, Result, ValueProxy,
    marshal::{self, Returns},
};

const REQUIRE_SOURCE: &str = "function(name) return require(name) end";

/// Loads the Lua module `name` and wraps the first value it produces.
///
/// `require` may return a second value (the loader data); it is discarded. The
/// proxy has no parent. A module that cannot be found or fails while loading
/// raises the engine's error, which propagates without being logged here.
pub fn require(engine: &EngineContext, name: &str) -> Result<ValueProxy> {
    debug!(module = name, "loading lua module");
    let loader = engine.eval_function(REQUIRE_SOURCE)?;
    let module = loader
        .call::<mlua::MultiValue>(name)?
        .into_iter()
        .next()
        .unwrap_or(Value::Nil);
    ValueProxy::new(engine, module, None)
}

/// The engine together with its global namespace.
///
/// Build one at startup and pass it (or its [`EngineContext`]) to whatever needs
/// the engine. Top-level names are looked up through [`Environment::globals`].
///
/// ```
/// use pxl::{EngineConfig, Environment, Object};
///
/// let env = Environment::new(EngineConfig::default()).unwrap();
/// env.engine().execute("function add(a, b) return a + b end").unwrap();
/// let sum = env.get("add").unwrap().call((2, 3)).unwrap();
/// assert_eq!(sum.into_first(), Object::Int(5));
/// ```
#[derive(Debug, Clone)]
pub struct Environment {
    engine: EngineContext,
    globals: ValueProxy,
}

impl Environment {
    /// Creates a fresh engine whose `print()` writes to stdout.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::from_engine(EngineContext::new(&config)?)
    }

    /// Creates a fresh engine whose `print()` is redirected to `writer`.
    pub fn with_print(config: EngineConfig, writer: impl PrintWriter + 'static) -> Result<Self> {
        Self::from_engine(EngineContext::with_print(&config, writer)?)
    }

    /// Binds the global namespace of an existing engine.
    pub fn from_engine(engine: EngineContext) -> Result<Self> {
        let globals = Value::Table(engine.lua().globals());
        let globals = ValueProxy::new(&engine, globals, None)?;
        Ok(Self { engine, globals })
    }

    #[must_use]
    pub fn engine(&self) -> &EngineContext {
        &self.engine
    }

    /// Proxy bound to `_G`.
    #[must_use]
    pub fn globals(&self) -> &ValueProxy {
        &self.globals
    }

    /// Looks up a global name.
    pub fn get(&self, name: impl IntoLua) -> Result<ValueProxy> {
        self.globals.get(name)
    }

    /// Assigns a global name, with the same pass-through rules as [`ValueProxy::set`].
    pub fn set(&self, name: impl IntoLua, value: impl Into<Object>) -> Result<()> {
        self.globals.set(name, value)
    }

    /// Loads a module, see [`require`].
    pub fn require(&self, name: &str) -> Result<ValueProxy> {
        require(&self.engine, name)
    }

    /// Evaluates `source` and marshals every value it produces.
    pub fn eval(&self, source: &str) -> Result<Returns> {
        let values = self.engine.eval(source)?;
        marshal::marshal_results(&self.engine, values)
    }
}
