//! Directive application onto schemas-in-progress.
//!
//! The set of settable attributes is closed. Each one declares the kind its
//! raw text is coerced to; names outside the table are reported and ignored.

use thiserror::Error;

use crate::schema::{Schema, SchemaRef};

/// How an attribute's raw value is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Bool,
    Float,
    Unsigned,
    StringList,
    Text,
}

/// Every schema attribute a directive may set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Required,
    Title,
    Description,
    Format,
    Pattern,
    Default,
    Example,
    Minimum,
    Maximum,
    MultipleOf,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MinLength,
    MaxLength,
    MinItems,
    MaxItems,
    UniqueItems,
    MinProperties,
    MaxProperties,
    Nullable,
    ReadOnly,
    WriteOnly,
    Deprecated,
    AllowEmptyValue,
    Enum,
}

impl Attribute {
    /// Look up an attribute by the directive's second `_` segment.
    ///
    /// Matching is on the capitalized form, so `minLength` and `MinLength`
    /// are the same attribute.
    pub fn lookup(name: &str) -> Option<Self> {
        let attribute = match capitalize(name).as_str() {
            "Required" => Attribute::Required,
            "Title" => Attribute::Title,
            "Description" => Attribute::Description,
            "Format" => Attribute::Format,
            "Pattern" => Attribute::Pattern,
            "Default" => Attribute::Default,
            "Example" => Attribute::Example,
            "Min" | "Minimum" => Attribute::Minimum,
            "Max" | "Maximum" => Attribute::Maximum,
            "MultipleOf" => Attribute::MultipleOf,
            "ExclusiveMin" | "ExclusiveMinimum" => Attribute::ExclusiveMinimum,
            "ExclusiveMax" | "ExclusiveMaximum" => Attribute::ExclusiveMaximum,
            "MinLength" => Attribute::MinLength,
            "MaxLength" => Attribute::MaxLength,
            "MinItems" => Attribute::MinItems,
            "MaxItems" => Attribute::MaxItems,
            "UniqueItems" => Attribute::UniqueItems,
            "MinProps" | "MinProperties" => Attribute::MinProperties,
            "MaxProps" | "MaxProperties" => Attribute::MaxProperties,
            "Nullable" => Attribute::Nullable,
            "ReadOnly" => Attribute::ReadOnly,
            "WriteOnly" => Attribute::WriteOnly,
            "Deprecated" => Attribute::Deprecated,
            "AllowEmptyValue" => Attribute::AllowEmptyValue,
            "Enum" => Attribute::Enum,
            _ => return None,
        };
        Some(attribute)
    }

    pub fn kind(self) -> AttributeKind {
        use Attribute as A;
        match self {
            A::Required
            | A::ExclusiveMinimum
            | A::ExclusiveMaximum
            | A::UniqueItems
            | A::Nullable
            | A::ReadOnly
            | A::WriteOnly
            | A::Deprecated
            | A::AllowEmptyValue => AttributeKind::Bool,
            A::Minimum | A::Maximum | A::MultipleOf => AttributeKind::Float,
            A::MinLength
            | A::MaxLength
            | A::MinItems
            | A::MaxItems
            | A::MinProperties
            | A::MaxProperties => AttributeKind::Unsigned,
            A::Enum => AttributeKind::StringList,
            A::Title | A::Description | A::Format | A::Pattern | A::Default | A::Example => {
                AttributeKind::Text
            }
        }
    }
}

/// Coerced directive value, ready to assign.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Float(f64),
    Unsigned(u64),
    List(Vec<String>),
    Text(String),
}

/// Recoverable problem while applying a directive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeWarning {
    #[error("invalid boolean '{value}' for {attribute}, using false")]
    InvalidBool { attribute: String, value: String },

    #[error("invalid boolean '{value}' for required, keeping previous value")]
    InvalidRequired { value: String },

    #[error("invalid number '{value}' for {attribute}, attribute left unchanged")]
    InvalidNumber { attribute: String, value: String },

    #[error("unknown attribute '{attribute}', directive ignored")]
    UnknownAttribute { attribute: String },
}

impl AttributeWarning {
    /// Diagnostic code for this warning.
    pub fn code(&self) -> &'static str {
        match self {
            AttributeWarning::InvalidBool { .. } | AttributeWarning::InvalidRequired { .. } => {
                "W002"
            }
            AttributeWarning::InvalidNumber { .. } => "W003",
            AttributeWarning::UnknownAttribute { .. } => "W004",
        }
    }
}

/// Result of applying one directive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    /// Set for `required` directives; the caller owns the required flag.
    pub required: Option<bool>,
    pub warning: Option<AttributeWarning>,
}

/// Apply `oapi_<attribute>: raw` to a schema slot.
///
/// `required` is returned rather than stored. Any other attribute on a pure
/// `$ref` slot is a no-op.
pub fn apply(target: &mut SchemaRef, attribute: &str, raw: &str) -> Applied {
    let Some(attr) = Attribute::lookup(attribute) else {
        tracing::debug!(attribute = %attribute, "unknown schema attribute");
        return Applied {
            required: None,
            warning: Some(AttributeWarning::UnknownAttribute {
                attribute: attribute.to_string(),
            }),
        };
    };
    let raw = raw.trim();

    if attr == Attribute::Required {
        return match parse_bool(raw) {
            Some(required) => Applied {
                required: Some(required),
                warning: None,
            },
            None => Applied {
                required: None,
                warning: Some(AttributeWarning::InvalidRequired {
                    value: raw.to_string(),
                }),
            },
        };
    }

    let Some(schema) = target.as_inline_mut() else {
        tracing::debug!(attribute = %attribute, "attribute on $ref ignored");
        return Applied::default();
    };

    let mut warning = None;
    let value = match attr.kind() {
        AttributeKind::Bool => match parse_bool(raw) {
            Some(b) => Value::Bool(b),
            None => {
                warning = Some(AttributeWarning::InvalidBool {
                    attribute: attribute.to_string(),
                    value: raw.to_string(),
                });
                Value::Bool(false)
            }
        },
        AttributeKind::Float => match raw.parse::<f64>() {
            Ok(f) if f.is_finite() && (attr != Attribute::MultipleOf || f > 0.0) => {
                Value::Float(f)
            }
            _ => return number_warning(attribute, raw),
        },
        AttributeKind::Unsigned => match raw.parse::<u64>() {
            Ok(n) => Value::Unsigned(n),
            Err(_) => return number_warning(attribute, raw),
        },
        AttributeKind::StringList => Value::List(
            raw.split(',')
                .map(|v| v.trim().to_string())
                .collect(),
        ),
        AttributeKind::Text => Value::Text(raw.to_string()),
    };

    assign(schema, attr, value);
    Applied {
        required: None,
        warning,
    }
}

fn number_warning(attribute: &str, raw: &str) -> Applied {
    Applied {
        required: None,
        warning: Some(AttributeWarning::InvalidNumber {
            attribute: attribute.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn assign(schema: &mut Schema, attr: Attribute, value: Value) {
    use Attribute as A;
    match (attr, value) {
        (A::Title, Value::Text(s)) => schema.title = Some(s),
        (A::Description, Value::Text(s)) => schema.description = Some(s),
        (A::Format, Value::Text(s)) => schema.format = Some(s),
        (A::Pattern, Value::Text(s)) => schema.pattern = Some(s),
        (A::Default, Value::Text(s)) => schema.default = Some(serde_json::Value::String(s)),
        (A::Example, Value::Text(s)) => schema.example = Some(serde_json::Value::String(s)),
        (A::Minimum, Value::Float(f)) => schema.minimum = Some(f),
        (A::Maximum, Value::Float(f)) => schema.maximum = Some(f),
        (A::MultipleOf, Value::Float(f)) => schema.multiple_of = Some(f),
        (A::ExclusiveMinimum, Value::Bool(b)) => schema.exclusive_minimum = Some(b),
        (A::ExclusiveMaximum, Value::Bool(b)) => schema.exclusive_maximum = Some(b),
        (A::MinLength, Value::Unsigned(n)) => schema.min_length = Some(n),
        (A::MaxLength, Value::Unsigned(n)) => schema.max_length = Some(n),
        (A::MinItems, Value::Unsigned(n)) => schema.min_items = Some(n),
        (A::MaxItems, Value::Unsigned(n)) => schema.max_items = Some(n),
        (A::UniqueItems, Value::Bool(b)) => schema.unique_items = Some(b),
        (A::MinProperties, Value::Unsigned(n)) => schema.min_properties = Some(n),
        (A::MaxProperties, Value::Unsigned(n)) => schema.max_properties = Some(n),
        (A::Nullable, Value::Bool(b)) => schema.nullable = Some(b),
        (A::ReadOnly, Value::Bool(b)) => schema.read_only = Some(b),
        (A::WriteOnly, Value::Bool(b)) => schema.write_only = Some(b),
        (A::Deprecated, Value::Bool(b)) => schema.deprecated = Some(b),
        (A::AllowEmptyValue, Value::Bool(b)) => schema.allow_empty_value = Some(b),
        (A::Enum, Value::List(values)) => schema.r#enum.extend(values),
        (attr, value) => {
            tracing::debug!(?attr, ?value, "attribute kind mismatch");
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaType;

    fn string_slot() -> SchemaRef {
        SchemaRef::inline(Schema::new(SchemaType::String))
    }

    fn inline(slot: &SchemaRef) -> &Schema {
        slot.as_inline().unwrap()
    }

    #[test]
    fn required_is_returned_not_stored() {
        let mut slot = string_slot();
        let applied = apply(&mut slot, "required", "true");
        assert_eq!(applied.required, Some(true));
        assert_eq!(slot, string_slot());

        let applied = apply(&mut slot, "required", "false");
        assert_eq!(applied.required, Some(false));
    }

    #[test]
    fn required_applies_to_refs() {
        let mut slot = SchemaRef::to_component("Pet");
        assert_eq!(apply(&mut slot, "required", "true").required, Some(true));
    }

    #[test]
    fn invalid_required_keeps_previous() {
        let mut slot = string_slot();
        let applied = apply(&mut slot, "required", "yes");
        assert_eq!(applied.required, None);
        assert_eq!(applied.warning.unwrap().code(), "W002");
    }

    #[test]
    fn text_attributes_assign_trimmed() {
        let mut slot = string_slot();
        apply(&mut slot, "format", " uuid ");
        apply(&mut slot, "description", "the id");
        assert_eq!(inline(&slot).format.as_deref(), Some("uuid"));
        assert_eq!(inline(&slot).description.as_deref(), Some("the id"));
    }

    #[test]
    fn numeric_attributes_parse() {
        let mut slot = string_slot();
        apply(&mut slot, "minimum", "1.5");
        apply(&mut slot, "max", "10");
        apply(&mut slot, "minLength", "3");
        let schema = inline(&slot);
        assert_eq!(schema.minimum, Some(1.5));
        assert_eq!(schema.maximum, Some(10.0));
        assert_eq!(schema.min_length, Some(3));
    }

    #[test]
    fn invalid_number_leaves_attribute_untouched() {
        let mut slot = string_slot();
        apply(&mut slot, "minimum", "2");
        let applied = apply(&mut slot, "minimum", "two");
        assert_eq!(
            applied.warning,
            Some(AttributeWarning::InvalidNumber {
                attribute: "minimum".into(),
                value: "two".into()
            })
        );
        assert_eq!(inline(&slot).minimum, Some(2.0));

        let applied = apply(&mut slot, "maxLength", "-1");
        assert_eq!(applied.warning.unwrap().code(), "W003");
        assert_eq!(inline(&slot).max_length, None);
    }

    #[test]
    fn multiple_of_must_be_positive() {
        let mut slot = SchemaRef::inline(Schema::new(SchemaType::Integer));
        assert!(apply(&mut slot, "multipleOf", "2").warning.is_none());

        for raw in ["0", "-2", "-0.5"] {
            let applied = apply(&mut slot, "multipleOf", raw);
            assert_eq!(applied.warning.unwrap().code(), "W003");
        }
        assert_eq!(inline(&slot).multiple_of, Some(2.0));
    }

    #[test]
    fn invalid_bool_defaults_false() {
        let mut slot = string_slot();
        let applied = apply(&mut slot, "nullable", "maybe");
        assert_eq!(applied.warning.unwrap().code(), "W002");
        assert_eq!(inline(&slot).nullable, Some(false));
    }

    #[test]
    fn enum_values_accumulate() {
        let mut slot = string_slot();
        apply(&mut slot, "enum", "a, b");
        apply(&mut slot, "enum", "c");
        assert_eq!(inline(&slot).r#enum, vec!["a", "b", "c"]);
    }

    #[test]
    fn ref_slot_is_not_mutated() {
        let mut slot = SchemaRef::to_component("Pet");
        let applied = apply(&mut slot, "description", "ignored");
        assert_eq!(applied, Applied::default());
        assert_eq!(slot, SchemaRef::to_component("Pet"));
    }

    #[test]
    fn unknown_attribute_is_soft_fail() {
        let mut slot = string_slot();
        let applied = apply(&mut slot, "colour", "blue");
        assert_eq!(
            applied.warning,
            Some(AttributeWarning::UnknownAttribute {
                attribute: "colour".into()
            })
        );
        assert_eq!(slot, string_slot());
    }

    #[test]
    fn lookup_aliases() {
        assert_eq!(Attribute::lookup("exclusiveMin"), Some(Attribute::ExclusiveMinimum));
        assert_eq!(Attribute::lookup("ExclusiveMaximum"), Some(Attribute::ExclusiveMaximum));
        assert_eq!(Attribute::lookup("minProps"), Some(Attribute::MinProperties));
        assert_eq!(Attribute::kind(Attribute::Enum), AttributeKind::StringList);
    }
}
