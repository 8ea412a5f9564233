// Allow uninlined format args for cleaner format!/log! macros
#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod bundler;
pub mod compiler;
pub mod config;
pub mod error;
pub mod hooks;
pub mod plugin;

#[macro_use]
extern crate lazy_static;

pub use bundler::{BundleArtifact, ModuleGraph, ModuleRecord, TransformRegistry};
pub use compiler::{Compiler, CompilerBuilder};
pub use config::Config;
pub use error::{PackError, Result};
pub use hooks::{LifecycleHooks, Phase, SyncHook};
pub use plugin::Plugin;
pub use anyhow;
