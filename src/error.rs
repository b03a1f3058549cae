use crate::secrets::{SecretError, SecretRef};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A value that cannot be compiled, like a malformed regex or selector.
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
    /// A field that is understood but cannot be expressed in the output.
    #[error("{field}: {feature} is not supported")]
    Unsupported { field: String, feature: String },
    /// A credential that has to be inlined could not be read.
    #[error("unable to resolve {field} from {reference}")]
    SecretResolution {
        field: String,
        reference: SecretRef,
        #[source]
        source: SecretError,
    },
    /// Issue when serializing the generated configuration.
    #[error("unable to render scrape configuration")]
    Render(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn validation(field: impl Into<String>, reason: impl ToString) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported(field: impl Into<String>, feature: impl Into<String>) -> Self {
        Error::Unsupported {
            field: field.into(),
            feature: feature.into(),
        }
    }

    /// Nest the field path under `parent`, so `regex` becomes
    /// `relabelings[2].regex`.
    pub(crate) fn within(self, parent: &str) -> Self {
        match self {
            Error::Validation { field, reason } => Error::Validation {
                field: format!("{parent}.{field}"),
                reason,
            },
            Error::Unsupported { field, feature } => Error::Unsupported {
                field: format!("{parent}.{field}"),
                feature,
            },
            Error::SecretResolution {
                field,
                reference,
                source,
            } => Error::SecretResolution {
                field: format!("{parent}.{field}"),
                reference,
                source,
            },
            other => other,
        }
    }

    /// The path of the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. }
            | Error::Unsupported { field, .. }
            | Error::SecretResolution { field, .. } => Some(field),
            Error::Render(_) => None,
        }
    }
}

/// Failure to compile one monitor. Nothing of the monitor is emitted when this
/// is returned.
#[derive(Debug, Error)]
#[error("unable to generate scrape config for {namespace}/{name} endpoint {endpoint}")]
pub struct MonitorError {
    pub namespace: String,
    pub name: String,
    pub endpoint: usize,
    #[source]
    pub source: Error,
}
