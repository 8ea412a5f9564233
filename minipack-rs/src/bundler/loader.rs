//! Source loading for the bundler.
//!
//! Reads module text from disk and runs it through the transform chains of
//! every configured rule whose pattern matches the file path.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use regex::Regex;

use super::text::BUILTIN_TRANSFORMS;
use crate::config::RuleConfig;
use crate::error::{PackError, Result};

/// A text-to-text transform that may be named from a rule.
pub type Transform = Rc<dyn Fn(&str) -> anyhow::Result<String>>;

/// Named transforms available to rules.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let transforms = BUILTIN_TRANSFORMS
            .iter()
            .map(|(name, f)| {
                let f = *f;
                (name.to_string(), Rc::new(f) as Transform)
            })
            .collect();
        Self { transforms }
    }
}

impl TransformRegistry {
    /// Registers `transform` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&str) -> anyhow::Result<String> + 'static,
    {
        self.transforms.insert(name.into(), Rc::new(transform));
    }

    pub fn get(&self, name: &str) -> Option<Transform> {
        self.transforms.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}

struct Rule {
    test: Regex,
    /// Transforms in declaration order.
    chain: Vec<(String, Transform)>,
}

/// Applies rule transform chains to module text.
pub struct SourceTransformer {
    rules: Vec<Rule>,
}

impl SourceTransformer {
    /// Compiles the rule patterns and resolves every transform name.
    pub fn new(rules: &[RuleConfig], registry: &TransformRegistry) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let test = Regex::new(&rule.test).map_err(|e| {
                    PackError::Config(format!("invalid rule pattern '{}': {}", rule.test, e))
                })?;
                let chain = rule
                    .chain
                    .iter()
                    .map(|name| {
                        registry
                            .get(name)
                            .map(|t| (name.clone(), t))
                            .ok_or_else(|| {
                                PackError::Config(format!(
                                    "unknown transform '{}' (available: {})",
                                    name,
                                    registry.names().join(", ")
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Rule { test, chain })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Reads `path` and applies the matching transforms.
    pub fn get_source(&self, path: &Path) -> Result<String> {
        let source = std::fs::read_to_string(path).map_err(|source| PackError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply(path, source)
    }

    /// Applies every matching rule, in rule order, to `source`. Within a rule
    /// the chain runs right to left.
    pub fn apply(&self, path: &Path, mut source: String) -> Result<String> {
        let subject = path.to_string_lossy().replace('\\', "/");
        for rule in self.rules.iter().filter(|rule| rule.test.is_match(&subject)) {
            for (name, transform) in rule.chain.iter().rev() {
                log::trace!("Applying transform '{}' to {}", name, subject);
                source = transform(&source).map_err(|e| PackError::Transform {
                    transform: name.clone(),
                    path: path.to_path_buf(),
                    message: format!("{:#}", e),
                })?;
            }
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    fn rule(test: &str, chain: &[&str]) -> RuleConfig {
        RuleConfig {
            test: test.to_string(),
            chain: chain.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn registry() -> TransformRegistry {
        let mut registry = TransformRegistry::default();
        registry.register("A", |s: &str| Ok(format!("A({s})")));
        registry.register("B", |s: &str| Ok(format!("B({s})")));
        registry.register("fail", |_: &str| Err(anyhow::anyhow!("nope")));
        registry
    }

    #[test]
    fn test_no_rules_leaves_text_unchanged() {
        let transformer = SourceTransformer::new(&[], &registry()).unwrap();
        let out = transformer
            .apply(Path::new("/p/index.js"), "let x = 1;".to_string())
            .unwrap();
        assert_eq!(out, "let x = 1;");
    }

    #[test]
    fn test_chain_runs_right_to_left() {
        let transformer =
            SourceTransformer::new(&[rule(r"\.css$", &["A", "B"])], &registry()).unwrap();
        let out = transformer
            .apply(Path::new("/p/site.css"), "t".to_string())
            .unwrap();
        assert_eq!(out, "A(B(t))");
    }

    #[rstest]
    #[case("/p/index.js", "X")]
    #[case("/p/style.css", "x")]
    fn test_rule_only_applies_to_matching_paths(#[case] path: &str, #[case] expected: &str) {
        let transformer =
            SourceTransformer::new(&[rule(r"\.js$", &["uppercase"])], &registry()).unwrap();
        let out = transformer.apply(Path::new(path), "x".to_string()).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_matching_rules_apply_cumulatively() {
        let transformer = SourceTransformer::new(
            &[rule(r"\.js$", &["A"]), rule(r"index", &["B"])],
            &registry(),
        )
        .unwrap();
        let out = transformer
            .apply(Path::new("/p/index.js"), "t".to_string())
            .unwrap();
        assert_eq!(out, "B(A(t))");
    }

    #[rstest]
    #[case(rule(r"\.js$", &["missing"]))]
    #[case(rule(r"(", &["A"]))]
    fn test_bad_rules_are_config_errors(#[case] bad: RuleConfig) {
        let err = SourceTransformer::new(&[bad], &registry()).err().unwrap();
        assert!(matches!(err, PackError::Config(_)), "{err}");
    }

    #[test]
    fn test_transform_failure() {
        let transformer =
            SourceTransformer::new(&[rule(r"\.js$", &["A", "fail"])], &registry()).unwrap();
        let err = transformer
            .apply(Path::new("/p/a.js"), "t".to_string())
            .unwrap_err();
        match err {
            PackError::Transform {
                transform, path, ..
            } => {
                assert_eq!(transform, "fail");
                assert_eq!(path, PathBuf::from("/p/a.js"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_get_source_missing_file() {
        let transformer = SourceTransformer::new(&[], &registry()).unwrap();
        let err = transformer
            .get_source(Path::new("/definitely/not/here.js"))
            .unwrap_err();
        assert!(matches!(err, PackError::FileRead { .. }));
    }

    #[test]
    fn test_get_source_reads_and_transforms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();
        let transformer =
            SourceTransformer::new(&[rule(r"\.json$", &["json"])], &registry()).unwrap();
        let out = transformer.get_source(&path).unwrap();
        assert!(out.starts_with("module.exports = JSON.parse("));
    }
}
