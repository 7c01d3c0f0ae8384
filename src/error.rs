//! Error types for azstack.
//!
//! This module defines the error types used throughout azstack. Provider
//! failures are carried through unchanged so the message a caller sees is the
//! one the provider produced.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::provider::ProviderError;

/// Result type alias for azstack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for azstack.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Provider Errors
    // ========================================================================
    /// A provider call failed. The provider's message is preserved verbatim.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An error raised while resolving a shared output.
    ///
    /// Outputs are shared between every consumer, so the original error is
    /// reference counted. Display is transparent.
    #[error(transparent)]
    Resolution(Arc<Error>),

    // ========================================================================
    // Declaration Errors
    // ========================================================================
    /// A resource with the same type and logical name was already declared.
    #[error("Duplicate resource declaration: '{0}'")]
    DuplicateResource(String),

    /// A resource referenced an input whose producing resource is unknown.
    #[error("Resource '{resource}' depends on undeclared resource '{dependency}'")]
    UnknownDependency {
        /// Resource being declared
        resource: String,
        /// The dependency that was not found
        dependency: String,
    },

    /// The declared resources contain a dependency cycle.
    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    /// A created resource did not report an expected output property.
    #[error("Resource '{urn}' did not return output property '{property}'")]
    MissingOutput {
        /// Resource URN
        urn: String,
        /// Property name
        property: String,
    },

    // ========================================================================
    // Filesystem Errors
    // ========================================================================
    /// The static content directory could not be read.
    #[error("Failed to read content directory '{path}': {source}")]
    ContentDirectory {
        /// Directory path
        path: PathBuf,
        /// Source error
        #[source]
        source: std::io::Error,
    },

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to package an archive.
    #[error("Failed to package archive '{path}': {message}")]
    Archive {
        /// Archive source path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new missing output error.
    pub fn missing_output(urn: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingOutput {
            urn: urn.into(),
            property: property.into(),
        }
    }

    /// Creates a new archive error.
    pub fn archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid config error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wraps an error for sharing between output consumers.
    ///
    /// An error that is already shared is passed through so that chains of
    /// outputs never nest `Resolution` inside `Resolution`.
    pub fn into_shared(self) -> Arc<Error> {
        match self {
            Error::Resolution(shared) => shared,
            other => Arc::new(other),
        }
    }

    /// Recovers an error from its shared form, unwrapping it when this is the
    /// last reference.
    pub fn from_shared(shared: Arc<Error>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(Error::Resolution)
    }

    /// Returns the innermost error, looking through shared wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Resolution(shared) => shared.root(),
            other => other,
        }
    }

    /// Returns true if this error originated from the provider.
    pub fn is_provider_error(&self) -> bool {
        matches!(self.root(), Error::Provider(_))
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Error::Provider(_) => 3,
            Error::ContentDirectory { .. }
            | Error::FileNotFound(_)
            | Error::Archive { .. }
            | Error::Io(_)
            | Error::Zip(_) => 4,
            Error::Config(_) | Error::InvalidConfig { .. } => 5,
            Error::DuplicateResource(_)
            | Error::UnknownDependency { .. }
            | Error::DependencyCycle(_) => 6,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
