//! Document validation: structural checks against an embedded meta-schema,
//! then referential checks over the component schemas.

use serde_json::Value;

use crate::error::{DocumentError, SchemaError};

/// Structural meta-schema for OpenAPI 3.0 documents and their schemas.
const META_SCHEMA: &str = include_str!("meta_schema.json");

/// Validate an OpenAPI document value.
///
/// Every problem is collected; nothing short-circuits.
///
/// # Errors
///
/// Returns `DocumentError::Invalid` listing each structural or referential
/// error.
pub fn validate_document(document: &Value) -> Result<(), DocumentError> {
    let mut errors = structural_errors(document);
    check_references(document, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DocumentError::Invalid { errors })
    }
}

fn structural_errors(document: &Value) -> Vec<SchemaError> {
    let validator = match meta_validator() {
        Ok(validator) => validator,
        Err(error) => return vec![error],
    };

    validator
        .iter_errors(document)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect()
}

fn meta_validator() -> Result<jsonschema::Validator, SchemaError> {
    let meta_error = |message: String| SchemaError {
        path: String::new(),
        message: format!("embedded meta-schema: {message}"),
    };
    let meta: Value = serde_json::from_str(META_SCHEMA).map_err(|e| meta_error(e.to_string()))?;
    jsonschema::validator_for(&meta).map_err(|e| meta_error(e.to_string()))
}

/// `$ref`, discriminator mapping and `required` checks below
/// `/components/schemas`.
fn check_references(document: &Value, errors: &mut Vec<SchemaError>) {
    let Some(schemas) = document
        .pointer("/components/schemas")
        .and_then(Value::as_object)
    else {
        return;
    };

    for (name, schema) in schemas {
        let path = format!("/components/schemas/{}", escape(name));
        check_schema(document, schema, &path, errors);
    }
}

fn check_schema(root: &Value, schema: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    let Value::Object(map) = schema else {
        return;
    };

    if let Some(Value::String(target)) = map.get("$ref") {
        check_single_ref(root, target, &format!("{path}/$ref"), errors);
    }

    if let Some(mapping) = map
        .get("discriminator")
        .and_then(|d| d.get("mapping"))
        .and_then(Value::as_object)
    {
        for (key, target) in mapping {
            if let Some(target) = target.as_str() {
                let mapping_path = format!("{path}/discriminator/mapping/{}", escape(key));
                check_single_ref(root, target, &mapping_path, errors);
            }
        }
    }

    if let (Some(Value::Array(required)), Some(Value::Object(properties))) =
        (map.get("required"), map.get("properties"))
    {
        for (i, name) in required.iter().enumerate() {
            match name.as_str() {
                Some(name) if !properties.contains_key(name) => errors.push(SchemaError {
                    path: format!("{path}/required/{i}"),
                    message: format!("required property '{name}' is not declared in properties"),
                }),
                _ => {}
            }
        }
    }

    for (key, child) in map {
        let child_path = format!("{path}/{key}");
        match key.as_str() {
            "properties" => {
                if let Value::Object(properties) = child {
                    for (name, property) in properties {
                        let property_path = format!("{child_path}/{}", escape(name));
                        check_schema(root, property, &property_path, errors);
                    }
                }
            }
            "items" | "not" | "additionalProperties" => {
                check_schema(root, child, &child_path, errors);
            }
            "oneOf" | "allOf" | "anyOf" => {
                if let Value::Array(members) = child {
                    for (i, member) in members.iter().enumerate() {
                        check_schema(root, member, &format!("{child_path}/{i}"), errors);
                    }
                }
            }
            _ => {}
        }
    }
}

fn check_single_ref(root: &Value, target: &str, path: &str, errors: &mut Vec<SchemaError>) {
    // External references can't be resolved locally - skip silently
    let Some(pointer) = target.strip_prefix('#') else {
        return;
    };
    if root.pointer(pointer).is_none() {
        errors.push(SchemaError {
            path: path.to_string(),
            message: format!("unresolved reference: {target}"),
        });
    }
}

/// Escape one JSON Pointer reference token.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(schemas: Value) -> Value {
        json!({
            "openapi": "3.0.3",
            "info": { "title": "Pets", "version": "1.0.0" },
            "paths": {},
            "components": { "schemas": schemas }
        })
    }

    fn errors(document: &Value) -> Vec<SchemaError> {
        match validate_document(document) {
            Ok(()) => vec![],
            Err(DocumentError::Invalid { errors }) => errors,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_document_passes() {
        let doc = document(json!({
            "Pet": {
                "type": "object",
                "properties": {
                    "id": { "type": "integer", "minimum": 1 },
                    "owner": { "$ref": "#/components/schemas/Owner" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["id"]
            },
            "Owner": { "type": "object" }
        }));
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn missing_info_is_structural_error() {
        let doc = json!({ "openapi": "3.0.3", "paths": {} });
        assert!(!errors(&doc).is_empty());
    }

    #[test]
    fn unknown_schema_type_is_structural_error() {
        let doc = document(json!({ "Pet": { "type": "float" } }));
        assert!(!errors(&doc).is_empty());
    }

    #[test]
    fn dangling_ref_reported_with_path() {
        let doc = document(json!({
            "Pet": {
                "type": "object",
                "properties": { "owner": { "$ref": "#/components/schemas/Owner" } }
            }
        }));
        let errors = errors(&doc);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/components/schemas/Pet/properties/owner/$ref");
    }

    #[test]
    fn dangling_discriminator_target_reported() {
        let doc = document(json!({
            "Cat": { "type": "object" },
            "Pet": {
                "oneOf": [{ "$ref": "#/components/schemas/Cat" }],
                "discriminator": {
                    "propertyName": "kind",
                    "mapping": {
                        "CAT": "#/components/schemas/Cat",
                        "DOG": "#/components/schemas/Dog"
                    }
                }
            }
        }));
        let errors = errors(&doc);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/components/schemas/Pet/discriminator/mapping/DOG");
    }

    #[test]
    fn required_must_be_declared() {
        let doc = document(json!({
            "Pet": {
                "type": "object",
                "properties": { "id": { "type": "integer" } },
                "required": ["id", "age"]
            }
        }));
        let errors = errors(&doc);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/components/schemas/Pet/required/1");
    }

    #[test]
    fn external_refs_are_skipped() {
        let doc = document(json!({
            "Pet": { "$ref": "https://example.com/schemas/pet.json" }
        }));
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn ref_with_description_sibling_is_accepted() {
        let doc = document(json!({
            "Owner": { "type": "object" },
            "Pet": {
                "type": "object",
                "properties": {
                    "owner": {
                        "$ref": "#/components/schemas/Owner",
                        "description": "who feeds it"
                    }
                }
            }
        }));
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn escape_pointer_tokens() {
        assert_eq!(escape("a/b~c"), "a~1b~0c");
    }
}
