//! OpenAPI document store: holds registered component schemas, validates and
//! serializes them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DocumentError;
use crate::loader::{self, Format};
use crate::schema::{Schema, SchemaCollection};
use crate::validator::validate_document;

/// OpenAPI version written into new documents.
pub const OPENAPI_VERSION: &str = "3.0.3";

/// An OpenAPI 3.0 document.
///
/// Only the parts the engine writes are typed; everything else in a loaded
/// document is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub openapi: String,
    pub info: Info,
    #[serde(default)]
    pub paths: Map<String, Value>,
    #[serde(default)]
    pub components: Components,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Empty document with the given title and API version.
    pub fn new(title: &str, version: &str) -> Self {
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: title.to_string(),
                version: version.to_string(),
                extra: Map::new(),
            },
            paths: Map::new(),
            components: Components::default(),
            extra: Map::new(),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, DocumentError> {
        Ok(loader::parse_str(content, Format::Json)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, DocumentError> {
        Ok(loader::parse_str(content, Format::Yaml)?)
    }

    /// Load a document from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        Ok(loader::read_file(path)?)
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.components.schemas.contains_key(name)
    }

    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.components.schemas.keys().map(String::as_str)
    }

    /// Register a component schema.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::SchemaExists` if `name` is already present.
    pub fn add_schema(&mut self, name: &str, schema: &Schema) -> Result<(), DocumentError> {
        if self.has_schema(name) {
            return Err(DocumentError::SchemaExists {
                name: name.to_string(),
            });
        }
        let value =
            serde_json::to_value(schema).map_err(|source| DocumentError::EncodeJson { source })?;
        self.components.schemas.insert(name.to_string(), value);
        Ok(())
    }

    /// Register every schema of a resolution run, or none of them.
    ///
    /// Returns the number of schemas added.
    pub fn add_schemas(&mut self, schemas: &SchemaCollection) -> Result<usize, DocumentError> {
        if let Some(existing) = schemas.names().find(|name| self.has_schema(name)) {
            return Err(DocumentError::SchemaExists {
                name: existing.to_string(),
            });
        }

        let mut staged = Map::new();
        for (name, schema) in schemas.iter() {
            let value = serde_json::to_value(schema)
                .map_err(|source| DocumentError::EncodeJson { source })?;
            staged.insert(name.clone(), value);
        }
        let added = staged.len();
        self.components.schemas.extend(staged);
        Ok(added)
    }

    /// Structural and referential validation of the whole document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Invalid` with every problem found.
    pub fn validate(&self) -> Result<(), DocumentError> {
        validate_document(&self.to_value()?)
    }

    pub fn to_value(&self) -> Result<Value, DocumentError> {
        serde_json::to_value(self).map_err(|source| DocumentError::EncodeJson { source })
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, DocumentError> {
        let encoded = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        encoded.map_err(|source| DocumentError::EncodeJson { source })
    }

    /// YAML encoding of the canonical JSON form.
    pub fn to_yaml(&self) -> Result<String, DocumentError> {
        serde_yaml::to_string(&self.to_value()?)
            .map_err(|source| DocumentError::EncodeYaml { source })
    }
}
