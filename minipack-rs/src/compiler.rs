use std::path::{Path, PathBuf};

use crate::bundler::{
    BundleArtifact, BundleEmitter, ModuleGraph, ModuleGraphBuilder, ModuleRewriter,
    SourceTransformer, TransformRegistry,
};
use crate::config::Config;
use crate::error::{PackError, Result};
use crate::hooks::{LifecycleHooks, Phase, DONE_STATUS, RUN_STATUS};
use crate::plugin::{builtin_plugin, Plugin};

/// Drives one bundling run: entry resolution, graph construction and
/// emission, with lifecycle hooks fired around each stage.
pub struct Compiler {
    config: Config,
    root: PathBuf,
    transformer: SourceTransformer,
    rewriter: ModuleRewriter,
    /// Hook slots plugins tap into.
    pub hooks: LifecycleHooks,
}

/// Collects custom transforms and plugins before constructing a [`Compiler`].
pub struct CompilerBuilder {
    config: Config,
    root: PathBuf,
    transforms: TransformRegistry,
    plugins: Vec<Box<dyn Plugin>>,
}

impl CompilerBuilder {
    /// Makes `transform` available to rules under `name`.
    pub fn transform<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + 'static,
    {
        self.transforms.register(name, transform);
        self
    }

    /// Installs `plugin` after the plugins named in the configuration.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn build(self) -> Result<Compiler> {
        self.config.validate()?;
        let transformer = SourceTransformer::new(&self.config.rules, &self.transforms)?;

        let mut plugins = self
            .config
            .plugins
            .iter()
            .map(|name| builtin_plugin(name))
            .collect::<Result<Vec<_>>>()?;
        plugins.extend(self.plugins);

        let mut compiler = Compiler {
            config: self.config,
            root: self.root,
            transformer,
            rewriter: ModuleRewriter::new(),
            hooks: LifecycleHooks::default(),
        };
        for plugin in &plugins {
            log::debug!("Installing plugin '{}'", plugin.name());
            plugin.install(&mut compiler);
        }
        Ok(compiler)
    }
}

impl Compiler {
    /// Compiler with the built-in transforms and the configured plugins.
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(config, root).build()
    }

    pub fn builder(config: Config, root: impl Into<PathBuf>) -> CompilerBuilder {
        CompilerBuilder {
            config,
            root: root.into(),
            transforms: TransformRegistry::default(),
            plugins: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs every stage and returns the written bundle.
    pub fn run(&mut self) -> Result<BundleArtifact> {
        self.hooks.run.call(RUN_STATUS)?;

        self.hooks.call_unit(Phase::BeforeEntryOptions)?;
        let entries = self.resolve_entries()?;
        self.hooks.call_unit(Phase::AfterEntryOptions)?;

        self.hooks.call_unit(Phase::BeforeCompile)?;
        let graph = self.compile(&entries)?;
        self.hooks.call_unit(Phase::AfterCompile)?;

        self.hooks.call_unit(Phase::BeforeEmitFile)?;
        let artifact = self.emit(&graph)?;
        self.hooks.call_unit(Phase::AfterEmitFile)?;

        self.hooks.done.call(DONE_STATUS)?;
        Ok(artifact)
    }

    /// Named entry paths joined to the root. Every entry must exist.
    pub fn resolve_entries(&self) -> Result<Vec<(String, PathBuf)>> {
        self.config
            .entry
            .entries()
            .into_iter()
            .map(|(name, path)| {
                let resolved = self.root.join(&path);
                if resolved.is_file() {
                    Ok((name, resolved))
                } else {
                    Err(PackError::Resolution {
                        identity: path.display().to_string(),
                        importer: None,
                        path: resolved,
                    })
                }
            })
            .collect()
    }

    /// Builds the module graph for `entries`.
    pub fn compile(&self, entries: &[(String, PathBuf)]) -> Result<ModuleGraph> {
        let mut builder = ModuleGraphBuilder::new(&self.root, &self.transformer, &self.rewriter);
        for (name, path) in entries {
            let identity = builder.build_module(path, Some(name.as_str()))?;
            log::debug!("Entry '{}' resolved to {}", name, identity);
        }
        Ok(builder.finish())
    }

    /// Writes the bundle for `graph`.
    pub fn emit(&self, graph: &ModuleGraph) -> Result<BundleArtifact> {
        BundleEmitter::new(&self.root, &self.config.output, &self.transformer).emit_file(graph)
    }
}
