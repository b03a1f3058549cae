//! Resolution of secret and config map references.
//!
//! Credentials are referenced, never copied: wherever the output schema has a
//! `*_file` field the reference is turned into a path that the scrape engine
//! reads on first use. Only fields that must be inline (an OAuth2 client id,
//! a basic auth username) are read while compiling.

use crate::config::SecretsConfig;
use crate::error::{Error, Result};
use crate::monitor::KeySelector;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

static PATH_SEGMENT: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new("^[-._a-zA-Z0-9]+$").expect("path segment pattern must compile")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    Secret,
    ConfigMap,
}

impl SourceKind {
    fn directory(&self) -> &'static str {
        match self {
            SourceKind::Secret => "secrets",
            SourceKind::ConfigMap => "configmaps",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Secret => f.write_str("secret"),
            SourceKind::ConfigMap => f.write_str("config map"),
        }
    }
}

/// A single key of a secret or config map in a given namespace.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecretRef {
    pub namespace: String,
    pub kind: SourceKind,
    pub name: String,
    pub key: String,
}

impl SecretRef {
    pub fn new(namespace: &str, kind: SourceKind, selector: &KeySelector) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind,
            name: selector.name.clone(),
            key: selector.key.clone(),
        }
    }

    /// Each of namespace, name and key must be a single path segment made of
    /// `[-._a-zA-Z0-9]`, and neither `.` nor `..`.
    pub fn validate(&self) -> std::result::Result<(), SecretError> {
        let parts = [
            ("namespace", &self.namespace),
            ("name", &self.name),
            ("key", &self.key),
        ];

        for (part, value) in parts {
            if value == "." || value == ".." || !PATH_SEGMENT.is_match(value) {
                return Err(SecretError::InvalidReference {
                    part,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Location of this reference below `root`, e.g.
    /// `<root>/secrets/<namespace>/<name>/<key>`. Only meaningful for
    /// references that pass [`SecretRef::validate`].
    fn path_under(&self, root: &Path) -> PathBuf {
        root.join(self.kind.directory())
            .join(&self.namespace)
            .join(&self.name)
            .join(&self.key)
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} (key {})",
            self.kind, self.namespace, self.name, self.key
        )
    }
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("{part} {value:?} is not a valid path segment")]
    InvalidReference { part: &'static str, value: String },
    #[error("no value stored at {0}")]
    NotFound(String),
    #[error("unable to read {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Access to the secret and config map storage backend.
///
/// Implementations are shared across concurrent compilations and must be
/// safe for concurrent reads. `read` is the only call that may block, any
/// timeout policy belongs to the implementation.
pub trait SecretAccessor: Send + Sync {
    /// The stable file path the scrape engine will read `reference` from.
    fn path(&self, reference: &SecretRef) -> String;

    /// Fetch the current value of `reference`.
    fn read(&self, reference: &SecretRef) -> std::result::Result<String, SecretError>;
}

/// Secrets and config maps projected onto the local filesystem.
#[derive(Clone, Debug)]
pub struct MountedSecrets {
    root: PathBuf,
}

impl MountedSecrets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &SecretsConfig) -> Self {
        Self::new(&config.mount_root)
    }
}

impl SecretAccessor for MountedSecrets {
    fn path(&self, reference: &SecretRef) -> String {
        reference.path_under(&self.root).display().to_string()
    }

    fn read(&self, reference: &SecretRef) -> std::result::Result<String, SecretError> {
        reference.validate()?;
        let path = self.path(reference);
        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => SecretError::NotFound(path),
            _ => SecretError::Io { path, source },
        })
    }
}

/// Map backed accessor, for embedding the compiler where values are already
/// held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySecrets {
    root: PathBuf,
    values: BTreeMap<SecretRef, String>,
}

impl InMemorySecrets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, reference: SecretRef, value: impl Into<String>) {
        self.values.insert(reference, value.into());
    }
}

impl SecretAccessor for InMemorySecrets {
    fn path(&self, reference: &SecretRef) -> String {
        reference.path_under(&self.root).display().to_string()
    }

    fn read(&self, reference: &SecretRef) -> std::result::Result<String, SecretError> {
        self.values
            .get(reference)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(self.path(reference)))
    }
}

pub struct SecretResolver<'a> {
    accessor: &'a dyn SecretAccessor,
}

impl<'a> SecretResolver<'a> {
    pub fn new(accessor: &'a dyn SecretAccessor) -> Self {
        Self { accessor }
    }

    fn check(&self, reference: &SecretRef, field: &str) -> Result<()> {
        reference
            .validate()
            .map_err(|err| Error::validation(field, err))
    }

    /// Turn `reference` into a path without touching storage. Read failures
    /// surface later, when the scrape engine opens the file.
    pub fn resolve_as_file(&self, reference: &SecretRef, field: &str) -> Result<String> {
        self.check(reference, field)?;
        let path = self.accessor.path(reference);
        trace!(%reference, %path, "Resolved credential reference to file");
        Ok(path)
    }

    /// Fetch the value of `reference` now, for schema fields that have no
    /// file based form.
    pub fn resolve_as_value(&self, reference: &SecretRef, field: &str) -> Result<String> {
        self.check(reference, field)?;
        self.accessor.read(reference).map_err(|source| {
            debug!(%reference, field, err = %source, "Unable to read credential value");
            Error::SecretResolution {
                field: field.to_string(),
                reference: reference.clone(),
                source,
            }
        })
    }
}
