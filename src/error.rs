//! Error types for declaration loading, schema resolution and document handling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a declaration manifest or an existing document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Fatal errors that abort a resolution run.
///
/// Annotation-level problems never show up here; they are reported as
/// [`Diagnostic`](crate::Diagnostic) values instead.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("schema name conflict: '{name}' is produced by both {first} and {second}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error(
        "cyclic declaration {} at {declaration}.{field}: {}",
        cycle_path(*via_array),
        chain.join(" -> ")
    )]
    CyclicDeclaration {
        declaration: String,
        field: String,
        chain: Vec<String>,
        /// The cycle passes through elements of an array whose element type
        /// is not registered, so it cannot be broken with a `$ref`.
        via_array: bool,
    },

    #[error("maximum recursion depth {limit} exceeded while resolving {declaration}")]
    RecursionLimit { declaration: String, limit: usize },

    #[error("duplicate discriminator mapping key '{key}' in {declaration}")]
    DiscriminatorKeyCollision { declaration: String, key: String },
}

fn cycle_path(via_array: bool) -> &'static str {
    if via_array {
        "through elements of an unregistered array type"
    } else {
        "without an array indirection"
    }
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Qualified declaration the error is reported against.
    pub fn declaration(&self) -> &str {
        match self {
            ResolveError::NameCollision { second, .. } => second,
            ResolveError::CyclicDeclaration { declaration, .. }
            | ResolveError::RecursionLimit { declaration, .. }
            | ResolveError::DiscriminatorKeyCollision { declaration, .. } => declaration,
        }
    }
}

/// Errors raised by the OpenAPI document store.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("schema '{name}' already exists in the document")]
    SchemaExists { name: String },

    #[error("document failed validation with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },

    #[error("cannot encode document as JSON: {source}")]
    EncodeJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode document as YAML: {source}")]
    EncodeYaml {
        #[source]
        source: serde_yaml::Error,
    },
}

impl DocumentError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DocumentError::Load(e) => e.exit_code(),
            DocumentError::Invalid { .. } => 1,
            _ => 2,
        }
    }
}

/// Single document validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the offending node.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("decls.yaml"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::InvalidJson {
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn document_error_exit_codes() {
        let err = DocumentError::Invalid {
            errors: vec![SchemaError {
                path: "/components/schemas/Pet".into(),
                message: "dangling reference".into(),
            }],
        };
        assert_eq!(err.exit_code(), 1);

        let err = DocumentError::SchemaExists { name: "Pet".into() };
        assert_eq!(err.exit_code(), 2);

        let err = DocumentError::Load(LoadError::FileNotFound {
            path: PathBuf::from("openapi.json"),
        });
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn collision_names_both_declarations() {
        let err = ResolveError::NameCollision {
            name: "User".into(),
            first: "example.com/a.User".into(),
            second: "example.com/b.User".into(),
        };
        let msg = err.to_string();
        assert_eq!(err.declaration(), "example.com/b.User");
        assert!(msg.contains("example.com/a.User"));
        assert!(msg.contains("example.com/b.User"));
    }

    #[test]
    fn cycle_message_shows_chain() {
        let err = ResolveError::CyclicDeclaration {
            declaration: "pets.Node".into(),
            field: "Next".into(),
            chain: vec!["pets.Node".into(), "pets.Node".into()],
            via_array: false,
        };
        assert_eq!(
            err.to_string(),
            "cyclic declaration without an array indirection at pets.Node.Next: pets.Node -> pets.Node"
        );

        let err = ResolveError::CyclicDeclaration {
            declaration: "pets.Helper".into(),
            field: "Kids".into(),
            chain: vec!["pets.Helper".into(), "pets.Helper".into()],
            via_array: true,
        };
        assert_eq!(
            err.to_string(),
            "cyclic declaration through elements of an unregistered array type at pets.Helper.Kids: pets.Helper -> pets.Helper"
        );
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError {
            path: "/components/schemas/Pet/required".into(),
            message: "'age' is not a property".into(),
        };
        assert_eq!(
            err.to_string(),
            "/components/schemas/Pet/required: 'age' is not a property"
        );
    }
}
