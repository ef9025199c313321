//! Error types for both halves of the crate.
//!
//! Compile errors are terminal for a single source text. Runtime errors are
//! propagated unchanged through the ledger so that a broken export fails the
//! module that observes it instead of silently desynchronizing its view.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// The source text could not be parsed. Carries every parser diagnostic.
    #[error("failed to parse source: {}", .0.join("; "))]
    Parse(Vec<String>),

    #[error("invalid compile options: {0}")]
    Options(#[from] serde_json::Error),

    /// The requested module alias is not a plain identifier.
    #[error("module alias `{0}` is not a valid identifier")]
    InvalidAlias(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// `import`/`import_sync` was called on a record that never had a host installed.
    #[error("module `{0}` has no runtime host installed")]
    NotEnabled(String),

    #[error("cannot resolve `{specifier}` from `{from}`")]
    Unresolved { specifier: String, from: String },

    #[error("failed to load `{id}`: {message}")]
    Load { id: String, message: String },

    /// An error raised by user code: a provider, a module body or a setter host.
    #[error("uncaught error: {0}")]
    Thrown(String),
}

impl RuntimeError {
    pub fn thrown(message: impl Into<String>) -> Self {
        RuntimeError::Thrown(message.into())
    }
}
