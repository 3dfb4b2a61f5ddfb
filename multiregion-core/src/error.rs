//! Error types for loading and transforming templates

use thiserror::Error;

use crate::inventory::InventoryError;

/// Errors that abort a transformation
///
/// Everything except `CertificateLookupFailed` points at a template that does
/// not have the shape the rules were written for, or at rules that ran in the
/// wrong order.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The certificate inventory could not be queried
    ///
    /// `cause` is printed in the message and is not the error source.
    #[error("Could not list certificates in Certificate Manager for {host_name}: {cause}")]
    CertificateLookupFailed {
        host_name: String,
        cause: InventoryError,
    },

    /// A rule expected a resource that is not in the template
    #[error("Resource not found in template: {0}")]
    MissingResource(String),

    /// A rule expected an output that is not in the template
    #[error("Output not found in template: {0}")]
    MissingOutput(String),

    /// A value in the template does not have the expected shape
    #[error("Unexpected template shape at {path}: expected {expected}")]
    UnexpectedShape { path: String, expected: &'static str },

    /// A removed resource is still referenced
    #[error("{referrer} still references removed resource {target}")]
    DanglingReference { referrer: String, target: String },
}

impl TransformError {
    pub fn unexpected_shape(path: impl Into<String>, expected: &'static str) -> Self {
        Self::UnexpectedShape {
            path: path.into(),
            expected,
        }
    }
}

/// Result type for transformation steps
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors raised while reading templates and service descriptions
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type LoadResult<T> = Result<T, LoadError>;
