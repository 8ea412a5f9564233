//! CommonJS bundler.
//!
//! The bundler creates a self-contained script by:
//! 1. Loading each module's text and running it through the configured
//!    transform chains
//! 2. Rewriting `require()` calls to address the bundle runtime by module
//!    identity, collecting the dependencies they name
//! 3. Walking dependencies depth first to build the module graph
//! 4. Rendering the graph into the bootstrap template
//!
//! # Architecture
//!
//! - `loader`: Reads module text and applies rule transform chains
//! - `text`: Built-in transforms
//! - `rewrite`: Parses a module with swc and rewrites its `require()` calls
//! - `graph`: Depth-first module graph construction with cycle detection
//! - `emit`: Bootstrap rendering and bundle output

mod emit;
mod graph;
mod loader;
mod rewrite;
mod text;

pub use emit::{BundleArtifact, BundleEmitter, BOOTSTRAP_TEMPLATE, BOOTSTRAP_TEMPLATE_NAME};
pub use graph::{module_identity, ModuleGraph, ModuleGraphBuilder, ModuleRecord};
pub use loader::{SourceTransformer, Transform, TransformRegistry};
pub use rewrite::{
    module_dir, normalize_dependency, ModuleRewriter, RewrittenModule, DEFAULT_EXTENSION,
    HOST_LOAD, RUNTIME_LOAD,
};
pub use text::{strip_bom, BuiltinTransform, BUILTIN_TRANSFORMS};
