use std::path::PathBuf;

/// Field name whose truthiness marks a table as a class or instance.
///
/// A function read from such a table is called with the table prepended as its
/// receiver, mirroring Lua's `obj:method(...)` syntax.
pub const DEFAULT_CLASS_MARKER: &str = "__is_llx_class";

/// Options applied when constructing an [`EngineContext`](crate::EngineContext).
///
/// Use `EngineConfig::default()` for a stock Lua 5.4 runtime, or build custom
/// options with the builder pattern.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reserved field consulted by call dispatch, see [`DEFAULT_CLASS_MARKER`].
    pub class_marker: String,
    /// Directories searched by `require`, ahead of Lua's built-in `package.path`.
    ///
    /// Each directory contributes the `<dir>/?.lua` and `<dir>/?/init.lua` templates.
    pub package_path: Vec<PathBuf>,
    /// Maximum memory in bytes the Lua allocator may hold.
    pub memory_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            class_marker: DEFAULT_CLASS_MARKER.to_owned(),
            package_path: Vec::new(),
            memory_limit: None,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the class marker field name.
    #[must_use]
    pub fn class_marker(mut self, marker: impl Into<String>) -> Self {
        self.class_marker = marker.into();
        self
    }

    /// Adds a directory to the module search path.
    #[must_use]
    pub fn package_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_path.push(dir.into());
        self
    }

    /// Sets the allocator memory limit in bytes.
    #[must_use]
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Renders `package_path` as a Lua search-path prefix, or `None` if empty.
    pub(crate) fn search_path_prefix(&self) -> Option<String> {
        if self.package_path.is_empty() {
            return None;
        }
        let mut prefix = String::new();
        for dir in &self.package_path {
            let dir = dir.to_string_lossy();
            let dir = dir.trim_end_matches(['/', '\\']);
            prefix.push_str(&format!("{dir}/?.lua;{dir}/?/init.lua;"));
        }
        Some(prefix)
    }
}
