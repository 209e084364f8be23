//! Bridge configuration
//!
//! Read once, when the interpreter is first initialized. Use
//! [`crate::configure`] before the first import to override the defaults;
//! otherwise [`BridgeConfig::from_env`] is used.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Passed to `Py_InitializeEx`; off so the host keeps its own signal handling.
    #[serde(default)]
    pub install_signal_handlers: bool,

    /// Entries prepended to `sys.path`, in order.
    #[serde(default)]
    pub python_path: Vec<String>,

    /// Value of `sys.argv`.
    #[serde(default = "default_argv")]
    pub argv: Vec<String>,

    /// Worker threads are named `<prefix>-<context name>`.
    #[serde(default = "default_thread_prefix")]
    pub thread_name_prefix: String,

    #[serde(default)]
    pub worker_stack_size: Option<usize>,
}

fn default_argv() -> Vec<String> {
    vec![String::new()]
}

fn default_thread_prefix() -> String {
    "pybridge".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            install_signal_handlers: false,
            python_path: Vec::new(),
            argv: default_argv(),
            thread_name_prefix: default_thread_prefix(),
            worker_stack_size: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults plus `PYBRIDGE_PYTHONPATH` and `PYBRIDGE_THREAD_PREFIX`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(paths) = std::env::var_os("PYBRIDGE_PYTHONPATH") {
            config.python_path = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
        }

        if let Ok(prefix) = std::env::var("PYBRIDGE_THREAD_PREFIX") {
            if !prefix.is_empty() {
                config.thread_name_prefix = prefix;
            }
        }

        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_python_path(mut self, path: impl Into<String>) -> Self {
        self.python_path.push(path.into());
        self
    }

    pub fn with_argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(!config.install_signal_handlers);
        assert_eq!(config.argv, vec![String::new()]);
        assert_eq!(config.thread_name_prefix, "pybridge");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BridgeConfig::from_toml("python_path = [\"/opt/lib\"]\n").unwrap();
        assert_eq!(config.python_path, vec!["/opt/lib".to_string()]);
        assert_eq!(config.argv, vec![String::new()]);
        assert_eq!(config.worker_stack_size, None);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "install_signal_handlers = true\nargv = [\"prog\", \"-v\"]\nthread_name_prefix = \"py\"\nworker_stack_size = 8388608"
        )
        .unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert!(config.install_signal_handlers);
        assert_eq!(config.argv, vec!["prog".to_string(), "-v".to_string()]);
        assert_eq!(config.thread_name_prefix, "py");
        assert_eq!(config.worker_stack_size, Some(8 * 1024 * 1024));
    }

    #[test]
    fn test_bad_toml() {
        let err = BridgeConfig::from_toml("argv = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::default()
            .with_python_path("a")
            .with_python_path("b")
            .with_argv(["x"])
            .with_thread_name_prefix("t");
        assert_eq!(config.python_path, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.argv, vec!["x".to_string()]);
        assert_eq!(config.thread_name_prefix, "t");
    }
}
