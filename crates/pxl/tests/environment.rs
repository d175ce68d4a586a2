//! Tests for the global namespace, module loading, `print` redirection and
//! engine configuration.

use std::{borrow::Cow, cell::Cell, fs, io, rc::Rc};

use pretty_assertions::assert_eq;
use pxl::{CollectStringPrint, EngineConfig, Environment, NoPrint, Object, PrintWriter};

fn env() -> Environment {
    Environment::with_print(EngineConfig::default(), NoPrint).unwrap()
}

// =============================================================================
// 1. Globals
// =============================================================================

/// The globals proxy wraps `_G` itself.
#[test]
fn globals_wrap_global_table() {
    let env = env();
    assert_eq!(&env.get("_G").unwrap(), env.globals());
    assert!(env.globals().parent().is_none());
    assert_eq!(env.globals().type_name(), "table");
}

/// Globals set from the host are visible to Lua code and vice versa.
#[test]
fn global_set_and_get() {
    let env = env();
    env.set("answer", 42).unwrap();
    assert_eq!(env.eval("answer + 1").unwrap().into_first(), Object::Int(43));

    env.engine().execute("greeting = 'hi'").unwrap();
    assert_eq!(env.get("greeting").unwrap().to_lua_string().unwrap(), "hi");
}

/// Raw evaluation marshals every produced value.
#[test]
fn eval_marshals_all_values() {
    let env = env();
    let results = env.eval("1, 'two', {}").unwrap().into_vec();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Object::Int(1));
    assert_eq!(results[1], Object::from("two"));
    assert!(matches!(&results[2], Object::Proxy(proxy) if proxy.type_name() == "table"));
}

/// Statement chunks evaluate too, producing whatever they return.
#[test]
fn eval_accepts_statement_chunks() {
    let env = env();
    let results = env.eval("local x = 2 return x * 3").unwrap();
    assert_eq!(results.into_first(), Object::Int(6));
}

// =============================================================================
// 2. Modules
// =============================================================================

/// Modules registered in `package.preload` load through `require`.
#[test]
fn require_preloaded_module() {
    let env = env();
    env.engine()
        .execute(
            "package.preload.geometry = function(name) return { name = name, square = function(n) return n * n end } end",
        )
        .unwrap();
    let geometry = env.require("geometry").unwrap();
    assert!(geometry.parent().is_none());
    assert_eq!(geometry.get("name").unwrap().to_lua_string().unwrap(), "geometry");
    let square = geometry.get("square").unwrap();
    assert_eq!(square.call((7,)).unwrap().into_first(), Object::Int(49));
}

/// `require` caches modules, so two loads wrap the same table.
#[test]
fn require_returns_cached_module() {
    let env = env();
    env.engine()
        .execute("package.preload.counter = function() return { hits = 0 } end")
        .unwrap();
    let first = env.require("counter").unwrap();
    first.set("hits", 1).unwrap();
    let second = pxl::require(env.engine(), "counter").unwrap();
    assert_eq!(first, second);
    assert_eq!(second.get("hits").unwrap().handle(), &mlua::Value::Integer(1));
}

/// Directories from the configuration are searched for module files.
#[test]
fn require_from_package_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("greeter.lua"),
        "return { greet = function(who) return 'hello ' .. who end }",
    )
    .unwrap();
    fs::create_dir(dir.path().join("shapes")).unwrap();
    fs::write(dir.path().join("shapes").join("init.lua"), "return { sides = 4 }").unwrap();

    let config = EngineConfig::new().package_dir(dir.path());
    let env = Environment::with_print(config, NoPrint).unwrap();

    let greeter = env.require("greeter").unwrap();
    let greeting = greeter.get("greet").unwrap().call(("lua",)).unwrap();
    assert_eq!(greeting.into_first(), Object::from("hello lua"));

    let shapes = env.require("shapes").unwrap();
    assert_eq!(shapes.get("sides").unwrap().handle(), &mlua::Value::Integer(4));
}

/// A module name is passed as data, never spliced into source.
#[test]
fn require_name_is_not_evaluated() {
    let env = env();
    let err = env.require("x\") os.exit(1) --").unwrap_err();
    assert!(err.message().contains("not found"), "{err}");
}

// =============================================================================
// 3. Output
// =============================================================================

/// `print` goes to the configured writer, space-separated and newline-terminated.
#[test]
fn print_is_redirected() {
    let output = CollectStringPrint::new();
    let env = Environment::with_print(EngineConfig::default(), output.clone()).unwrap();
    env.engine().execute("print('a', 1, nil, true) print()").unwrap();
    assert_eq!(output.output(), "a 1 nil true\n\n");
}

/// Values with `__tostring` are printed through it.
#[test]
fn print_uses_tostring_metamethods() {
    let output = CollectStringPrint::new();
    let env = Environment::with_print(EngineConfig::default(), output.clone()).unwrap();
    env.engine()
        .execute("print(setmetatable({}, { __tostring = function() return 'custom' end }), 2.5)")
        .unwrap();
    assert_eq!(output.take(), "custom 2.5\n");
    assert_eq!(output.output(), "");
}

/// A proxy stored into Lua prints with its own description.
#[test]
fn print_of_stored_proxy() {
    let output = CollectStringPrint::new();
    let env = Environment::with_print(EngineConfig::default(), output.clone()).unwrap();
    env.set("n", 5).unwrap();
    env.set("boxed", env.get("n").unwrap()).unwrap();
    env.engine().execute("print(boxed)").unwrap();
    assert_eq!(output.output(), "<proxy 5>\n");
}

/// A `__tostring` metamethod may itself print while its value is being printed.
#[test]
fn print_reentered_from_tostring() {
    let output = CollectStringPrint::new();
    let env = Environment::with_print(EngineConfig::default(), output.clone()).unwrap();
    env.engine()
        .execute("print(setmetatable({}, { __tostring = function() print('inner') return 'outer' end }))")
        .unwrap();
    assert_eq!(output.output(), "inner\nouter\n");
}

/// A stored host list renders the proxies inside it with `tostring`.
#[test]
fn print_of_stored_list_with_proxy() {
    let output = CollectStringPrint::new();
    let env = Environment::with_print(EngineConfig::default(), output.clone()).unwrap();
    env.set("n", 5).unwrap();
    env.set("items", vec![Object::Proxy(env.get("n").unwrap()), Object::from("x")])
        .unwrap();
    env.engine().execute("print(items)").unwrap();
    assert_eq!(output.output(), "<host [5, \"x\"]>\n");
}

// =============================================================================
// 4. Engine lifetime
// =============================================================================

/// Writer that records when the engine releases it.
struct DropFlag(Rc<Cell<bool>>);

impl PrintWriter for DropFlag {
    fn stdout_write(&mut self, _output: Cow<'_, str>) -> io::Result<()> {
        Ok(())
    }

    fn stdout_push(&mut self, _end: char) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

/// Dropping the last handle frees the engine, with nothing stored in it.
#[test]
fn engine_is_freed_on_drop() {
    let dropped = Rc::new(Cell::new(false));
    let env = Environment::with_print(EngineConfig::default(), DropFlag(dropped.clone())).unwrap();
    env.engine().execute("t = {}").unwrap();
    let t = env.get("t").unwrap();
    drop((t, env));
    assert!(dropped.get());
}

/// Proxies stored into the engine, directly or inside host lists, do not keep it alive.
#[test]
fn stored_proxies_do_not_keep_engine_alive() {
    let dropped = Rc::new(Cell::new(false));
    let env = Environment::with_print(EngineConfig::default(), DropFlag(dropped.clone())).unwrap();
    env.engine().execute("t = {}").unwrap();
    let t = env.get("t").unwrap();
    env.set("alias", &t).unwrap();
    env.set("listed", vec![Object::Proxy(t.clone()), Object::Int(1)]).unwrap();
    t.set("me", &t).unwrap();
    assert!(!dropped.get());

    drop((t, env));
    assert!(dropped.get());
}

// =============================================================================
// 5. Configuration
// =============================================================================

/// Configuration deserializes with defaults for missing fields.
#[test]
fn config_from_json() {
    let config: EngineConfig = serde_json::from_str(r#"{ "class_marker": "isClass" }"#).unwrap();
    assert_eq!(config, EngineConfig::new().class_marker("isClass"));

    let config: EngineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.class_marker, pxl::DEFAULT_CLASS_MARKER);
}

/// A custom class marker replaces the default one for dispatch.
#[test]
fn custom_class_marker_drives_dispatch() {
    let env = Environment::with_print(EngineConfig::new().class_marker("isClass"), NoPrint).unwrap();
    assert_eq!(env.engine().class_marker(), "isClass");
    env.engine()
        .execute(
            r"
            Old = { __is_llx_class = true, who = function(...) return select('#', ...) end }
            New = { isClass = true, who = function(...) return select('#', ...) end }
            ",
        )
        .unwrap();
    let old = env.get("Old").unwrap().get("who").unwrap().call(()).unwrap();
    let new = env.get("New").unwrap().get("who").unwrap().call(()).unwrap();
    assert_eq!(old.into_first(), Object::Int(0));
    assert_eq!(new.into_first(), Object::Int(1));
}

/// Allocations beyond the memory limit fail with the engine's memory error.
#[test]
fn memory_limit_is_enforced() {
    let config = EngineConfig::new().memory_limit(4 * 1024 * 1024);
    let env = Environment::with_print(config, NoPrint).unwrap();
    let err = env
        .engine()
        .execute("local t = {} for i = 1, 10000000 do t[i] = tostring(i) end")
        .unwrap_err();
    assert!(matches!(err.as_lua(), mlua::Error::MemoryError(_)), "{err:?}");
}
