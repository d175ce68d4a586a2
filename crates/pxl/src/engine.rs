use std::{borrow::Cow, cell::RefCell, fmt, rc::Rc};

use mlua::{Function, Lua, MultiValue, Table, Value};
use tracing::debug;

use crate::{
    EngineConfig, Object, PrintWriter, Result, StdPrint,
    marshal::{self, Nesting},
};

const GET_FIELD_SOURCE: &str = "function(t, k) return t[k] end";
const SET_FIELD_SOURCE: &str = "function(t, k, v) t[k] = v end";
const PROBE_SOURCE: &str = "function(v, k) return v and v[k] end";
const TRAMPOLINE_SOURCE: &str = "function(f, ...) return f(...) end";
const INSTALL_PRINT_SOURCE: &str = "function(p) print = p end";

/// Handle to one embedded Lua runtime.
///
/// Constructed once at startup and shared by every proxy created from it; clones
/// are cheap and refer to the same runtime. The runtime is `!Send`, so all access
/// stays on the thread that created it.
#[derive(Clone)]
pub struct EngineContext(Rc<EngineInner>);

struct EngineInner {
    lua: Lua,
    class_marker: String,
    probe: Function,
    trampoline: Function,
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("class_marker", &self.0.class_marker)
            .field("used_memory", &self.0.lua.used_memory())
            .finish_non_exhaustive()
    }
}

impl EngineContext {
    /// Creates a runtime whose `print()` writes to stdout.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Self::with_print(config, StdPrint)
    }

    /// Creates a runtime whose `print()` is redirected to `writer`.
    pub fn with_print(config: &EngineConfig, writer: impl PrintWriter + 'static) -> Result<Self> {
        let lua = Lua::new();
        if let Some(prefix) = config.search_path_prefix() {
            let package: Table = lua.globals().get("package")?;
            let path: String = package.get("path")?;
            package.set("path", format!("{prefix}{path}"))?;
        }
        install_print(&lua, writer)?;
        let probe = lua.load(PROBE_SOURCE).eval::<Function>()?;
        let trampoline = lua.load(TRAMPOLINE_SOURCE).eval::<Function>()?;
        if let Some(limit) = config.memory_limit {
            lua.set_memory_limit(limit)?;
        }
        debug!(
            class_marker = %config.class_marker,
            memory_limit = ?config.memory_limit,
            "lua engine initialized"
        );
        Ok(Self(Rc::new(EngineInner {
            lua,
            class_marker: config.class_marker.clone(),
            probe,
            trampoline,
        })))
    }

    /// The underlying `mlua` runtime.
    #[must_use]
    pub fn lua(&self) -> &Lua {
        &self.0.lua
    }

    /// Field name consulted by call dispatch.
    #[must_use]
    pub fn class_marker(&self) -> &str {
        &self.0.class_marker
    }

    /// Compiles and runs `source` as an expression, falling back to a statement
    /// chunk, and returns every value it produces.
    pub fn eval(&self, source: &str) -> Result<MultiValue> {
        Ok(self.0.lua.load(source).eval::<MultiValue>()?)
    }

    /// Runs `source` as a statement chunk, discarding any results.
    pub fn execute(&self, source: &str) -> Result<()> {
        Ok(self.0.lua.load(source).exec()?)
    }

    /// Evaluates `source`, which must produce a function.
    pub fn eval_function(&self, source: &str) -> Result<Function> {
        Ok(self.0.lua.load(source).eval::<Function>()?)
    }

    /// Compiles a fresh generic field-get helper.
    pub(crate) fn field_getter(&self) -> Result<Function> {
        self.eval_function(GET_FIELD_SOURCE)
    }

    /// Compiles a fresh generic field-set helper.
    pub(crate) fn field_setter(&self) -> Result<Function> {
        self.eval_function(SET_FIELD_SOURCE)
    }

    /// Deep-converts a host list or dict into a Lua table.
    ///
    /// Lists become 1-based sequences. With `recursive`, nested lists and dicts
    /// are converted as well; otherwise they are stored as opaque host userdata.
    /// Proxies found inside are unwrapped to their handles either way.
    pub fn table_from(&self, source: Object, recursive: bool) -> Result<Table> {
        let nesting = if recursive { Nesting::Convert } else { Nesting::Opaque };
        let table = self.0.lua.create_table()?;
        match source {
            Object::List(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    table.raw_set(index + 1, marshal::table_element(self, item, nesting)?)?;
                }
            }
            Object::Dict(pairs) => {
                for (key, value) in pairs {
                    let key = marshal::table_element(self, key, nesting)?;
                    table.raw_set(key, marshal::table_element(self, value, nesting)?)?;
                }
            }
            other => {
                let message = format!("cannot build a table from {}", other.type_name());
                return Err(mlua::Error::runtime(message).into());
            }
        }
        Ok(table)
    }

    /// Calls `callable` with already-marshaled arguments and returns the raw results.
    ///
    /// Functions are called directly; anything else goes through a Lua trampoline
    /// so `__call` metamethods apply and non-callables raise the engine's own error.
    pub fn invoke(&self, callable: &Value, mut args: MultiValue) -> Result<MultiValue> {
        let results = if let Value::Function(function) = callable {
            function.call::<MultiValue>(args)?
        } else {
            args.push_front(callable.clone());
            self.0.trampoline.call::<MultiValue>(args)?
        };
        Ok(results)
    }

    /// Reads the class marker off `value`, returning its Lua truthiness.
    pub(crate) fn probe_marker(&self, value: &Value) -> Result<bool> {
        let marker = self
            .0
            .probe
            .call::<Value>((value.clone(), self.0.class_marker.as_str()))?;
        Ok(!matches!(marker, Value::Nil | Value::Boolean(false)))
    }

    /// Renders `value` with Lua's `tostring`.
    pub fn tostring(&self, value: &Value) -> Result<String> {
        Ok(lua_tostring(&self.0.lua, value)?)
    }
}

/// Renders `value` with the runtime's global `tostring`.
pub(crate) fn lua_tostring(lua: &Lua, value: &Value) -> mlua::Result<String> {
    let tostring: Function = lua.globals().get("tostring")?;
    let text: mlua::String = tostring.call(value.clone())?;
    Ok(String::from(text.to_string_lossy()))
}

/// Replaces the global `print` with a host function forwarding to `writer`.
fn install_print(lua: &Lua, writer: impl PrintWriter + 'static) -> Result<()> {
    let writer = RefCell::new(writer);
    let print = lua.create_function(move |lua, args: MultiValue| {
        // `__tostring` may call `print` again, so nothing is borrowed while formatting
        let texts = args
            .iter()
            .map(|arg| lua_tostring(lua, arg))
            .collect::<mlua::Result<Vec<_>>>()?;
        let mut writer = writer.try_borrow_mut().map_err(mlua::Error::external)?;
        for (index, text) in texts.into_iter().enumerate() {
            if index > 0 {
                writer.stdout_push(' ').map_err(mlua::Error::external)?;
            }
            writer.stdout_write(Cow::Owned(text)).map_err(mlua::Error::external)?;
        }
        writer.stdout_push('\n').map_err(mlua::Error::external)
    })?;
    lua.load(INSTALL_PRINT_SOURCE).eval::<Function>()?.call::<()>(print)?;
    Ok(())
}
