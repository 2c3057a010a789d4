//! Output schema model (OpenAPI 3.0 schema objects).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::types::REF_PREFIX;

/// A schema slot: either a named reference or an owned inline schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaRef {
    /// `$ref` to a schema registered under `#/components/schemas/`.
    Ref(Reference),
    /// Inline schema.
    Inline(Box<Schema>),
}

impl SchemaRef {
    /// Reference to a component schema by its registered name.
    pub fn to_component(name: &str) -> Self {
        SchemaRef::Ref(Reference::component(name))
    }

    pub fn inline(schema: Schema) -> Self {
        SchemaRef::Inline(Box::new(schema))
    }

    /// The reference string, if this slot is a pure `$ref`.
    pub fn ref_path(&self) -> Option<&str> {
        match self {
            SchemaRef::Ref(reference) => Some(&reference.ref_path),
            SchemaRef::Inline(_) => None,
        }
    }

    /// Mutable access to the inline schema; `None` for a pure `$ref`.
    pub fn as_inline_mut(&mut self) -> Option<&mut Schema> {
        match self {
            SchemaRef::Inline(schema) => Some(schema),
            SchemaRef::Ref(_) => None,
        }
    }

    pub fn as_inline(&self) -> Option<&Schema> {
        match self {
            SchemaRef::Inline(schema) => Some(schema),
            SchemaRef::Ref(_) => None,
        }
    }
}

/// `{"$ref": "..."}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub ref_path: String,
}

impl Reference {
    pub fn component(name: &str) -> Self {
        Self {
            ref_path: format!("{REF_PREFIX}{name}"),
        }
    }

    /// Final path segment of the reference, i.e. the registered schema name.
    pub fn target_name(&self) -> &str {
        self.ref_path
            .rsplit('/')
            .next()
            .unwrap_or(self.ref_path.as_str())
    }
}

/// Kind of a schema (`type` keyword).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
}

/// Discriminator block for composed (`oneOf`) schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mapping: BTreeMap<String, String>,
}

/// Serialize `Option<f64>` as an integer when it has no fractional part, so
/// `oapi_minimum: 1` renders as `1` rather than `1.0`.
#[allow(clippy::ref_option)]
fn serialize_number<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => {
            #[allow(clippy::cast_possible_truncation)]
            let int_val = *v as i64;
            serializer.serialize_some(&int_val)
        }
        Some(v) => serializer.serialize_some(v),
        None => serializer.serialize_none(),
    }
}

/// A single schema object.
///
/// Attributes other than the structural ones (`type`, `properties`,
/// `required`, `items`, `oneOf`, `allOf`, `discriminator`) are only ever set
/// through directive application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#enum: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number"
    )]
    pub minimum: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number"
    )]
    pub maximum: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number"
    )]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_empty_value: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaRef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
}

impl Schema {
    pub fn new(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Default::default()
        }
    }

    /// Generic object schema, also used as the opaque fallback.
    pub fn object() -> Self {
        Self::new(SchemaType::Object)
    }

    pub fn array(items: SchemaRef) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(SchemaType::Array)
        }
    }

    /// Add a property, keeping `required` duplicate-free.
    ///
    /// Returns `true` when a property of the same name was replaced.
    pub fn insert_property(&mut self, name: String, schema: SchemaRef, required: bool) -> bool {
        let replaced = self.properties.insert(name.clone(), schema).is_some();
        if required {
            if !self.required.contains(&name) {
                self.required.push(name);
            }
        } else {
            self.required.retain(|r| *r != name);
        }
        replaced
    }
}

/// Schemas produced by one resolution run, keyed by registered name.
///
/// A name is registered once; a second declaration claiming it is a
/// [`ResolveError::NameCollision`].
#[derive(Debug, Clone, Default)]
pub struct SchemaCollection {
    schemas: BTreeMap<String, Schema>,
    origins: HashMap<String, String>,
}

impl SchemaCollection {
    /// Register `schema` under `name`, produced by declaration `origin`.
    pub fn insert(&mut self, name: String, schema: Schema, origin: String) -> Result<(), ResolveError> {
        if let Some(first) = self.origins.get(&name) {
            return Err(ResolveError::NameCollision {
                name,
                first: first.clone(),
                second: origin,
            });
        }
        self.origins.insert(name.clone(), origin);
        self.schemas.insert(name, schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Qualified declaration that produced `name`.
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.origins.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Schema)> {
        self.schemas.iter()
    }

    pub fn into_schemas(self) -> BTreeMap<String, Schema> {
        self.schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reference_serializes_as_ref_object() {
        let value = serde_json::to_value(SchemaRef::to_component("Pet")).unwrap();
        assert_eq!(value, json!({ "$ref": "#/components/schemas/Pet" }));
    }

    #[test]
    fn reference_target_name() {
        assert_eq!(Reference::component("FooBar").target_name(), "FooBar");
    }

    #[test]
    fn integral_minimum_serializes_as_integer() {
        let schema = Schema {
            minimum: Some(1.0),
            maximum: Some(2.5),
            ..Schema::new(SchemaType::Number)
        };
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value, json!({ "type": "number", "minimum": 1, "maximum": 2.5 }));
    }

    #[test]
    fn empty_collections_are_omitted() {
        let value = serde_json::to_value(Schema::object()).unwrap();
        assert_eq!(value, json!({ "type": "object" }));
    }

    #[test]
    fn untagged_ref_deserializes_before_inline() {
        let slot: SchemaRef =
            serde_json::from_value(json!({ "$ref": "#/components/schemas/Pet" })).unwrap();
        assert_eq!(slot.ref_path(), Some("#/components/schemas/Pet"));

        let slot: SchemaRef = serde_json::from_value(json!({ "type": "string" })).unwrap();
        assert_eq!(
            slot.as_inline().and_then(|s| s.schema_type),
            Some(SchemaType::String)
        );
    }

    #[test]
    fn insert_property_keeps_required_unique() {
        let mut schema = Schema::object();
        schema.insert_property("id".into(), SchemaRef::inline(Schema::object()), true);
        let replaced =
            schema.insert_property("id".into(), SchemaRef::inline(Schema::object()), true);
        assert!(replaced);
        assert_eq!(schema.required, vec!["id".to_string()]);

        schema.insert_property("id".into(), SchemaRef::inline(Schema::object()), false);
        assert!(schema.required.is_empty());
    }

    #[test]
    fn collection_rejects_second_registration() {
        let mut collection = SchemaCollection::default();
        collection
            .insert("User".into(), Schema::object(), "a.User".into())
            .unwrap();
        let err = collection
            .insert("User".into(), Schema::object(), "b.User".into())
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::NameCollision { ref first, ref second, .. }
                if first == "a.User" && second == "b.User"
        ));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.origin("User"), Some("a.User"));
    }
}
