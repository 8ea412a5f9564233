//! Error types for minipack-rs.

use std::path::PathBuf;

use thiserror::Error;

use crate::hooks::Phase;

/// Result type alias using PackError.
pub type Result<T> = std::result::Result<T, PackError>;

/// Errors that abort a bundling run.
#[derive(Debug, Error)]
pub enum PackError {
    /// Malformed or missing configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A source file or the configuration file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bundle could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Module text could not be parsed.
    #[error("Syntax error in {identity} at {line}:{column}: {message}")]
    Syntax {
        identity: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// A require() call whose target is not a plain string literal.
    #[error("Unsupported dependency in {identity} at line {line}: {reason}")]
    InvalidDependency {
        identity: String,
        line: usize,
        reason: String,
    },

    /// A dependency or entry that does not exist on disk.
    #[error("Cannot resolve '{identity}'{}: {} does not exist",
        .importer.as_ref().map(|i| format!(" from '{}'", i)).unwrap_or_default(),
        .path.display())]
    Resolution {
        identity: String,
        importer: Option<String>,
        path: PathBuf,
    },

    /// A module transitively requires itself.
    #[error("Cyclic dependency detected: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    /// A transform in a rule chain failed.
    #[error("Transform '{transform}' failed on {}: {message}", .path.display())]
    Transform {
        transform: String,
        path: PathBuf,
        message: String,
    },

    /// A plugin callback failed.
    #[error("Hook '{name}' failed during {phase}: {source}")]
    Hook {
        phase: Phase,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
