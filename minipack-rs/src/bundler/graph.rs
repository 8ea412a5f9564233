//! Module graph construction.
//!
//! Starting from each entry, modules are discovered depth first: the file is
//! loaded through the [`SourceTransformer`], its `require()` calls rewritten by
//! the [`ModuleRewriter`], and every dependency built before the module itself
//! is recorded.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use super::loader::SourceTransformer;
use super::rewrite::{module_dir, ModuleRewriter};
use crate::error::{PackError, Result};

/// A module ready to be embedded in the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub identity: String,
    /// Source text after transforms and rewriting.
    pub source: String,
    /// Dependency identities in discovery order.
    pub dependencies: Vec<String>,
}

/// The modules of one run keyed by identity, plus the named entries.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    entries: Vec<(String, String)>,
    modules: BTreeMap<String, ModuleRecord>,
}

impl ModuleGraph {
    /// `(name, identity)` pairs in the order the entries were built.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    pub fn get(&self, identity: &str) -> Option<&ModuleRecord> {
        self.modules.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.modules.contains_key(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Checks that every dependency of every module is in the graph.
    pub fn validate(&self, root: &Path) -> Result<()> {
        for record in self.modules.values() {
            if let Some(missing) = record.dependencies.iter().find(|d| !self.contains(d)) {
                return Err(PackError::Resolution {
                    identity: missing.clone(),
                    importer: Some(record.identity.clone()),
                    path: identity_path(root, missing),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Builds a [`ModuleGraph`] rooted at the project directory.
pub struct ModuleGraphBuilder<'a> {
    root: &'a Path,
    transformer: &'a SourceTransformer,
    rewriter: &'a ModuleRewriter,
    states: HashMap<String, VisitState>,
    /// Identities currently being built, outermost first.
    stack: Vec<String>,
    graph: ModuleGraph,
}

impl<'a> ModuleGraphBuilder<'a> {
    pub fn new(
        root: &'a Path,
        transformer: &'a SourceTransformer,
        rewriter: &'a ModuleRewriter,
    ) -> Self {
        Self {
            root,
            transformer,
            rewriter,
            states: HashMap::new(),
            stack: Vec::new(),
            graph: ModuleGraph::default(),
        }
    }

    /// Builds the module at `path` and everything it requires. When `entry`
    /// is given the module is recorded as a named entry. Returns its identity.
    pub fn build_module(&mut self, path: &Path, entry: Option<&str>) -> Result<String> {
        let identity = module_identity(self.root, path);
        if let Some(name) = entry {
            self.graph.entries.push((name.to_string(), identity.clone()));
        }

        match self.states.get(&identity) {
            Some(VisitState::Done) => return Ok(identity),
            Some(VisitState::InProgress) => {
                let start = self
                    .stack
                    .iter()
                    .position(|id| *id == identity)
                    .unwrap_or(0);
                let mut chain = self.stack[start..].to_vec();
                chain.push(identity);
                return Err(PackError::CyclicDependency { chain });
            }
            None => {}
        }

        self.states.insert(identity.clone(), VisitState::InProgress);
        self.stack.push(identity.clone());

        let source = self.transformer.get_source(path)?;
        let rewritten = self
            .rewriter
            .parse_source(&identity, &source, module_dir(&identity))?;
        log::debug!(
            "Built {} ({} dependencies)",
            identity,
            rewritten.dependencies.len()
        );

        for dependency in &rewritten.dependencies {
            let dependency_path = identity_path(self.root, dependency);
            if !dependency_path.is_file() {
                return Err(PackError::Resolution {
                    identity: dependency.clone(),
                    importer: Some(identity),
                    path: dependency_path,
                });
            }
            self.build_module(&dependency_path, None)?;
        }

        self.stack.pop();
        self.states.insert(identity.clone(), VisitState::Done);
        self.graph.modules.insert(
            identity.clone(),
            ModuleRecord {
                identity: identity.clone(),
                source: rewritten.source,
                dependencies: rewritten.dependencies,
            },
        );
        Ok(identity)
    }

    pub fn finish(self) -> ModuleGraph {
        self.graph
    }
}

/// Canonical identity of `path`: `./` followed by the forward-slash path
/// relative to `root`. Paths outside the root climb out of it with `..`.
pub fn module_identity(root: &Path, path: &Path) -> String {
    let root = lexical_components(&std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf()));
    let path = lexical_components(&std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()));

    let shared = root
        .iter()
        .zip(&path)
        .take_while(|(a, b)| a == b)
        .count();
    let segments: Vec<&str> = std::iter::repeat("..")
        .take(root.len() - shared)
        .chain(path[shared..].iter().map(String::as_str))
        .collect();
    format!("./{}", segments.join("/"))
}

/// Components of `path` with `.` dropped and `..` folded into its parent.
/// The root and any prefix are kept as leading entries.
fn lexical_components(path: &Path) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if matches!(segments.last(), Some(last) if last != ".." && last != "/") {
                    segments.pop();
                } else if segments.last().map(String::as_str) != Some("/") {
                    segments.push("..".to_string());
                }
            }
            Component::RootDir => segments.push("/".to_string()),
            Component::Prefix(prefix) => {
                segments.push(prefix.as_os_str().to_string_lossy().into_owned())
            }
            Component::CurDir => {}
        }
    }
    segments
}

/// Absolute path of an identity under `root`.
pub fn identity_path(root: &Path, identity: &str) -> PathBuf {
    root.join(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::TransformRegistry;
    use std::fs;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn build(root: &Path, entry: &str) -> Result<ModuleGraph> {
        build_with_rules(root, entry, &[])
    }

    fn build_with_rules(root: &Path, entry: &str, rules: &[RuleConfig]) -> Result<ModuleGraph> {
        let transformer = SourceTransformer::new(rules, &TransformRegistry::default())?;
        let rewriter = ModuleRewriter::new();
        let mut builder = ModuleGraphBuilder::new(root, &transformer, &rewriter);
        builder.build_module(&root.join(entry), Some("main"))?;
        Ok(builder.finish())
    }

    #[test]
    fn test_module_identity() {
        let root = Path::new("/project");
        assert_eq!(module_identity(root, Path::new("/project/index.js")), "./index.js");
        assert_eq!(module_identity(root, Path::new("/project/./a/b.js")), "./a/b.js");
        assert_eq!(module_identity(root, Path::new("/project/a/../c.js")), "./c.js");
        assert_eq!(module_identity(root, &identity_path(root, "./src/x.js")), "./src/x.js");
        assert_eq!(module_identity(root, Path::new("/other/index.js")), "./../other/index.js");
        assert_eq!(module_identity(root, Path::new("/project/../up.js")), "./../up.js");
    }

    #[test]
    fn test_entry_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        write(dir.path(), "other/index.js", "require('./dep');");
        write(dir.path(), "other/dep.js", "module.exports = 1;");

        let transformer = SourceTransformer::new(&[], &TransformRegistry::default()).unwrap();
        let rewriter = ModuleRewriter::new();
        let mut builder = ModuleGraphBuilder::new(&root, &transformer, &rewriter);
        let identity = builder
            .build_module(&dir.path().join("other/index.js"), Some("main"))
            .unwrap();
        let graph = builder.finish();

        assert_eq!(identity, "./../other/index.js");
        let keys: Vec<_> = graph.identities().collect();
        assert_eq!(keys, vec!["./../other/dep.js", "./../other/index.js"]);
        assert!(identity_path(&root, "./../other/dep.js").is_file());
        graph.validate(&root).unwrap();
    }

    #[test]
    fn test_linear_chain() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "index.js", "require('./a');");
        write(root, "a.js", "require('./b');");
        write(root, "b.js", "module.exports = 1;");

        let graph = build(root, "index.js").unwrap();
        let keys: Vec<_> = graph.identities().collect();
        assert_eq!(keys, vec!["./a.js", "./b.js", "./index.js"]);
        assert_eq!(
            graph.entries(),
            &[("main".to_string(), "./index.js".to_string())]
        );
        assert_eq!(graph.get("./a.js").unwrap().dependencies, vec!["./b.js"]);
        graph.validate(root).unwrap();
    }

    #[test]
    fn test_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/index.js", "require('./lib/util'); require('../shared.js');");
        write(root, "src/lib/util.js", "require('../../shared');");
        write(root, "shared.js", "");

        let graph = build(root, "src/index.js").unwrap();
        let keys: Vec<_> = graph.identities().collect();
        assert_eq!(keys, vec!["./shared.js", "./src/index.js", "./src/lib/util.js"]);
        assert_eq!(
            graph.get("./src/index.js").unwrap().dependencies,
            vec!["./src/lib/util.js", "./shared.js"]
        );
    }

    #[test]
    fn test_shared_dependency_is_built_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "index.js", "require('./a'); require('./b'); require('./a');");
        write(root, "a.js", "require('./c');");
        write(root, "b.js", "require('./c');");
        write(root, "c.js", "module.exports = 'c';");

        let graph = build(root, "index.js").unwrap();
        assert_eq!(graph.len(), 4);
        graph.validate(root).unwrap();
    }

    #[test]
    fn test_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "index.js", "require('./missing');");

        let err = build(root, "index.js").unwrap_err();
        match err {
            PackError::Resolution {
                identity, importer, ..
            } => {
                assert_eq!(identity, "./missing.js");
                assert_eq!(importer.as_deref(), Some("./index.js"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "index.js", "require('./a');");
        write(root, "a.js", "require('./b');");
        write(root, "b.js", "require('./a');");

        let err = build(root, "index.js").unwrap_err();
        match err {
            PackError::CyclicDependency { chain } => {
                assert_eq!(chain, vec!["./a.js", "./b.js", "./a.js"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_require_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "index.js", "require('./index');");

        let err = build(root, "index.js").unwrap_err();
        assert!(matches!(err, PackError::CyclicDependency { .. }));
    }

    #[test]
    fn test_transforms_apply_before_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "index.js", "require('./data.json');");
        write(root, "data.json", r#"{"answer": 42}"#);

        let rules = [RuleConfig {
            test: r"\.json$".to_string(),
            chain: vec!["json".to_string()],
        }];
        let graph = build_with_rules(root, "index.js", &rules).unwrap();
        let data = graph.get("./data.json").unwrap();
        assert!(data.source.contains("JSON.parse("));
        assert!(data.dependencies.is_empty());
    }

    #[test]
    fn test_validate_reports_dangling_dependency() {
        let mut graph = ModuleGraph::default();
        graph.modules.insert(
            "./index.js".to_string(),
            ModuleRecord {
                identity: "./index.js".to_string(),
                source: String::new(),
                dependencies: vec!["./gone.js".to_string()],
            },
        );
        let err = graph.validate(Path::new("/p")).unwrap_err();
        assert!(matches!(err, PackError::Resolution { .. }));
    }
}
