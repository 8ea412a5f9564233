//! Bundle emission.
//!
//! Renders the module graph into the bootstrap template and writes the
//! resulting script to the configured output location.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::graph::ModuleGraph;
use super::loader::SourceTransformer;
use super::rewrite::RUNTIME_LOAD;
use super::text::quote;
use crate::config::OutputConfig;
use crate::error::{PackError, Result};

/// Runtime bootstrap shipped with the crate.
pub const BOOTSTRAP_TEMPLATE: &str = include_str!("../../templates/bootstrap.tpl");
/// Name the bootstrap template is matched under by rules.
pub const BOOTSTRAP_TEMPLATE_NAME: &str = "minipack/bootstrap.tpl";

const ENTRIES_MARKER: &str = "/* minipack:entries */";
const MODULES_MARKER: &str = "/* minipack:modules */";

/// The written bundle.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub path: PathBuf,
    pub code: String,
}

pub struct BundleEmitter<'a> {
    root: &'a Path,
    output: &'a OutputConfig,
    transformer: &'a SourceTransformer,
}

impl<'a> BundleEmitter<'a> {
    pub fn new(root: &'a Path, output: &'a OutputConfig, transformer: &'a SourceTransformer) -> Self {
        Self {
            root,
            output,
            transformer,
        }
    }

    /// Output directory joined with the output file name.
    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output.path).join(&self.output.filename)
    }

    /// Renders the bundle text for `graph`.
    pub fn render(&self, graph: &ModuleGraph) -> Result<String> {
        graph.validate(self.root)?;
        if graph.entries().is_empty() {
            return Err(PackError::Config("no entry was built".to_string()));
        }

        let template = self.transformer.apply(
            Path::new(BOOTSTRAP_TEMPLATE_NAME),
            BOOTSTRAP_TEMPLATE.to_string(),
        )?;
        for marker in [ENTRIES_MARKER, MODULES_MARKER] {
            if !template.contains(marker) {
                return Err(PackError::Config(format!(
                    "bootstrap template is missing the '{}' marker",
                    marker
                )));
            }
        }

        let mut entries = String::new();
        for (name, identity) in graph.entries() {
            writeln!(entries, "  /* {} */", comment_text(name)?).ok();
            writeln!(entries, "  {}({});", RUNTIME_LOAD, json_quote(identity)?).ok();
        }

        let mut modules = String::new();
        for record in graph.modules() {
            writeln!(
                modules,
                "{}: (function (module, exports, {}) {{\n{}\n}}),",
                json_quote(&record.identity)?,
                RUNTIME_LOAD,
                record.source.trim_end()
            )
            .ok();
        }

        Ok(template
            .replace(ENTRIES_MARKER, entries.trim_end())
            .replace(MODULES_MARKER, modules.trim_end()))
    }

    /// Renders the bundle and writes it, replacing any existing file.
    pub fn emit_file(&self, graph: &ModuleGraph) -> Result<BundleArtifact> {
        let code = self.render(graph)?;
        let path = self.output_path();

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| PackError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, &code).map_err(|source| PackError::Write {
            path: path.clone(),
            source,
        })?;
        log::info!(
            "Wrote {} ({} modules, {} bytes)",
            path.display(),
            graph.len(),
            code.len()
        );

        Ok(BundleArtifact { path, code })
    }
}

fn json_quote(text: &str) -> Result<String> {
    quote(text).map_err(|e| PackError::Config(format!("cannot quote '{}': {}", text, e)))
}

/// `text` quoted so it can sit inside a block comment without ending it.
fn comment_text(text: &str) -> Result<String> {
    Ok(json_quote(text)?.replace("*/", "*\\/"))
}
