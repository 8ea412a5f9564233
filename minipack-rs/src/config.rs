//! Configuration model, read from `minipack.config.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PackError, Result};

/// File name looked up in the project root when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "minipack.config.json";

/// Name given to the entry when the configuration lists a single path.
pub const DEFAULT_ENTRY_NAME: &str = "main";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub entry: EntryConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Either one entry path or a map of named entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntryConfig {
    Single(PathBuf),
    Named(BTreeMap<String, PathBuf>),
}

impl EntryConfig {
    /// Named entries in bootstrap order.
    pub fn entries(&self) -> Vec<(String, PathBuf)> {
        match self {
            EntryConfig::Single(path) => vec![(DEFAULT_ENTRY_NAME.to_string(), path.clone())],
            EntryConfig::Named(map) => map
                .iter()
                .map(|(name, path)| (name.clone(), path.clone()))
                .collect(),
        }
    }
}

/// A pattern and the transforms applied to files whose path matches it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Regular expression tested against the forward-slash file path.
    pub test: String,
    /// Transform names; the last one runs first.
    #[serde(rename = "use")]
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory, relative to the project root unless absolute.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default = "default_output_filename")]
    pub filename: String,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("dist")
}

fn default_output_filename() -> String {
    "bundle.js".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            filename: default_output_filename(),
        }
    }
}

impl Config {
    /// Config with a single entry and defaults everywhere else.
    pub fn with_entry(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: EntryConfig::Single(entry.into()),
            rules: Vec::new(),
            output: OutputConfig::default(),
            plugins: Vec::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| PackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PackError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|e| match e {
            PackError::Config(message) => {
                PackError::Config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if let EntryConfig::Named(map) = &self.entry {
            if map.is_empty() {
                return Err(PackError::Config("no entry configured".to_string()));
            }
        }
        if self.output.filename.is_empty() {
            return Err(PackError::Config("output.filename is empty".to_string()));
        }
        for rule in &self.rules {
            if rule.chain.is_empty() {
                return Err(PackError::Config(format!(
                    "rule '{}' has no transforms",
                    rule.test
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_entry_with_defaults() {
        let config = Config::from_json(r#"{"entry": "./src/index.js"}"#).unwrap();
        assert_eq!(
            config.entry.entries(),
            vec![("main".to_string(), PathBuf::from("./src/index.js"))]
        );
        assert_eq!(config.output.path, PathBuf::from("dist"));
        assert_eq!(config.output.filename, "bundle.js");
        assert!(config.rules.is_empty());
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_json(
            r#"{
                "entry": {"app": "./app.js", "admin": "./admin.js"},
                "rules": [{"test": "\\.json$", "use": ["json"]}],
                "output": {"path": "build", "filename": "out.js"},
                "plugins": ["phase-log"]
            }"#,
        )
        .unwrap();
        let names: Vec<_> = config.entry.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["admin", "app"]);
        assert_eq!(config.rules[0].test, "\\.json$");
        assert_eq!(config.rules[0].chain, vec!["json"]);
        assert_eq!(config.output.filename, "out.js");
        assert_eq!(config.plugins, vec!["phase-log"]);
    }

    #[test]
    fn test_invalid_configs() {
        for text in [
            r#"{}"#,
            r#"{"entry": {}}"#,
            r#"{"entry": "a.js", "unknown": 1}"#,
            r#"{"entry": "a.js", "rules": [{"test": "x", "use": []}]}"#,
            r#"{"entry": "a.js", "output": {"filename": ""}}"#,
            "not json",
        ] {
            let err = Config::from_json(text).unwrap_err();
            assert!(matches!(err, PackError::Config(_)), "{text}: {err}");
        }
    }
}
