//! Error types for the module resolver.
//!
//! Every resolution failure carries enough context (the offending reference,
//! the declaring document and, for cycles, the full chain) for a user to fix
//! their configuration without re-running in verbose mode.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main result type for resolver operations.
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Error type for all resolver operations.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// A `uses` entry does not match any reference grammar
    #[error("malformed reference '{reference}' in {}: {reason}", document.display())]
    ReferenceMalformed {
        /// The raw reference string
        reference: String,
        /// Document declaring the reference
        document: PathBuf,
        /// Why the reference was rejected
        reason: String,
    },

    /// A reference resolved to a path that does not exist
    #[error("module file does not exist: '{reference}' (resolved to {}) in {}", path.display(), document.display())]
    NotFound {
        /// The raw reference string
        reference: String,
        /// Document declaring the reference
        document: PathBuf,
        /// Resolved filesystem location
        path: PathBuf,
    },

    /// Downloading or unpacking a remote package failed
    #[error("failed to fetch package '{package}': {message}")]
    FetchFailed {
        /// Package identifier (`selefra/<name>` or `<org>/<name>`)
        package: String,
        /// Error description
        message: String,
        /// Underlying transport or archive error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An organization package was referenced without a login token
    #[error("reference '{reference}' in {} requires a login token", document.display())]
    Unauthenticated {
        /// The raw reference string
        reference: String,
        /// Document declaring the reference
        document: PathBuf,
    },

    /// Documents reference each other in a loop
    #[error("modules have circular references: {}", format_chain(chain))]
    CircularReference {
        /// Document paths from the start of the cycle back to itself
        chain: Vec<PathBuf>,
    },

    /// Two flattened modules share a qualified name
    #[error("duplicate module name '{name}' declared in {}", document.display())]
    DuplicateModuleName {
        /// The qualified name that collided
        name: String,
        /// Document holding the second declaration
        document: PathBuf,
    },

    /// A document's `modules` section has the wrong shape
    #[error("malformed module document {}: {message}", path.display())]
    MalformedDocument {
        /// Document path
        path: PathBuf,
        /// Error description
        message: String,
    },

    /// I/O related errors
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl ModuleError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new malformed reference error
    pub fn reference_malformed(
        reference: impl Into<String>,
        document: &Path,
        reason: impl Into<String>,
    ) -> Self {
        Self::ReferenceMalformed {
            reference: reference.into(),
            document: document.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new malformed document error
    pub fn malformed_document(path: &Path, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a new fetch error without an underlying source
    pub fn fetch(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            package: package.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new fetch error wrapping the transport failure
    pub fn fetch_with_source(
        package: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::FetchFailed {
            package: package.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<io::Error> for ModuleError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for ModuleError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Attach a message to failed I/O operations.
pub trait IoResultExt<T> {
    /// Convert an I/O failure into [`ModuleError::Io`] with a lazily built message
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoResultExt<T> for std::result::Result<T, io::Error> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| ModuleError::io(f(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_reference_display_lists_chain() {
        let err = ModuleError::CircularReference {
            chain: vec![
                PathBuf::from("/ws/a.yaml"),
                PathBuf::from("/ws/b.yaml"),
                PathBuf::from("/ws/a.yaml"),
            ],
        };

        assert_eq!(
            err.to_string(),
            "modules have circular references: /ws/a.yaml -> /ws/b.yaml -> /ws/a.yaml"
        );
    }

    #[test]
    fn test_reference_malformed_carries_context() {
        let err = ModuleError::reference_malformed("selefra/", Path::new("/ws/m.yaml"), "missing package name");

        if let ModuleError::ReferenceMalformed {
            reference,
            document,
            reason,
        } = &err
        {
            assert_eq!(reference, "selefra/");
            assert_eq!(document, Path::new("/ws/m.yaml"));
            assert_eq!(reason, "missing package name");
        } else {
            panic!("Expected ReferenceMalformed error");
        }
    }

    #[test]
    fn test_fetch_with_source_keeps_message() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = ModuleError::fetch_with_source("selefra/aws", io_err);

        assert!(err.to_string().contains("selefra/aws"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_io_context() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = result.io_context(|| "reading rules".to_string()).unwrap_err();

        if let ModuleError::Io { message, source } = err {
            assert_eq!(message, "reading rules");
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        } else {
            panic!("Expected Io error");
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<i32>("invalid: yaml: content").unwrap_err();
        let err: ModuleError = yaml_err.into();

        if let ModuleError::Serialization { data_type, .. } = err {
            assert_eq!(data_type, Some("YAML".to_string()));
        } else {
            panic!("Expected Serialization error");
        }
    }
}
