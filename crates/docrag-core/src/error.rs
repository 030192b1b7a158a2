use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported document format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding model mismatch: collection was built with '{stored}', got '{requested}'")]
    ModelMismatch { stored: String, requested: String },

    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
        transient: bool,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{backend} returned unusable output after {attempts} attempt(s): {message}")]
    Parse {
        backend: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("Vector store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A failure that is worth retrying: network hiccups, timeouts, 429/5xx.
    pub fn transient(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend { backend, message: message.into(), transient: true, source: None }
    }

    /// A backend failure that retrying will not fix (auth, bad request, ...).
    pub fn fatal(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend { backend, message: message.into(), transient: false, source: None }
    }

    /// Malformed backend output. `attempts` is filled in by the retry loop.
    pub fn parse(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Parse { backend, attempts: 1, message: message.into() }
    }

    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store { message: err.to_string(), source: Some(Box::new(err)) }
    }

    pub fn read<E>(path: impl Into<PathBuf>, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Read { path: path.into(), source: err.into() }
    }

    /// Attach the underlying cause to a `Backend` error; other variants are returned unchanged.
    #[must_use]
    pub fn with_source<E>(self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self {
            Self::Backend { backend, message, transient, .. } => {
                Self::Backend { backend, message, transient, source: Some(Box::new(err)) }
            }
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { transient: true, .. } | Self::Parse { .. })
    }

    /// Stable kind name shown to users, e.g. `error[BackendError]: ...`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "ConfigError",
            Self::UnsupportedFormat { .. } | Self::Read { .. } => "FormatError",
            Self::DimensionMismatch { .. } => "DimensionMismatchError",
            Self::ModelMismatch { .. } => "ModelMismatchError",
            Self::Backend { .. } => "BackendError",
            Self::Parse { .. } => "ParseError",
            Self::Store { .. } => "StoreError",
            Self::NotFound(_) => "NotFound",
        }
    }
}
