//! Core types shared by the resolution stages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::SchemaType;

/// Prefix of every `$ref` produced by the engine.
pub const REF_PREFIX: &str = "#/components/schemas/";

/// Doc markers that opt a declaration into schema generation.
pub const SCHEMA_MARKERS: &[&str] = &["oapi:schema", "swagger:model"];

/// Default bound on declaration nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A field or alias type expression.
///
/// Parsed from the Go-like textual forms used in declaration manifests:
/// `int64`, `Pet`, `*Pet`, `[]*Pet`, `[4]byte`, `map[string]any`, `time.Time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeExpr {
    /// Builtin scalar or `any`/`interface{}`.
    Primitive(String),
    /// Identifier naming another declaration.
    Named(String),
    Pointer(Box<TypeExpr>),
    Array(Box<TypeExpr>),
    /// `map[K]V`; key and value types do not influence the schema.
    Map,
    /// Package-qualified type from another module.
    Foreign { package: String, name: String },
}

const PRIMITIVES: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64",
    "uintptr", "rune", "float", "float32", "float64", "string", "byte", "bool", "any",
];

impl TypeExpr {
    /// Parse a textual type expression.
    pub fn parse(input: &str) -> Result<Self, String> {
        let s = input.trim();
        if s.is_empty() {
            return Err("empty type expression".to_string());
        }
        if let Some(rest) = s.strip_prefix('*') {
            return Ok(TypeExpr::Pointer(Box::new(Self::parse(rest)?)));
        }
        if let Some(rest) = s.strip_prefix('[') {
            let close = rest
                .find(']')
                .ok_or_else(|| format!("unterminated array type '{s}'"))?;
            let len = &rest[..close];
            if !len.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return Err(format!("invalid array length in '{s}'"));
            }
            return Ok(TypeExpr::Array(Box::new(Self::parse(&rest[close + 1..])?)));
        }
        if let Some(rest) = s.strip_prefix("map[") {
            let close = matching_bracket(rest).ok_or_else(|| format!("unterminated map type '{s}'"))?;
            Self::parse(&rest[..close])?;
            Self::parse(&rest[close + 1..])?;
            return Ok(TypeExpr::Map);
        }
        if s == "interface{}" || s == "any" {
            return Ok(TypeExpr::Primitive("any".to_string()));
        }
        if let Some((package, name)) = s.rsplit_once('.') {
            if !is_identifier(name) || package.is_empty() {
                return Err(format!("invalid qualified type '{s}'"));
            }
            return Ok(TypeExpr::Foreign {
                package: package.to_string(),
                name: name.to_string(),
            });
        }
        if !is_identifier(s) {
            return Err(format!("invalid type expression '{s}'"));
        }
        if PRIMITIVES.contains(&s) {
            Ok(TypeExpr::Primitive(s.to_string()))
        } else {
            Ok(TypeExpr::Named(s.to_string()))
        }
    }
}

/// Index of the `]` closing a bracket already opened before `s`.
fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl TryFrom<String> for TypeExpr {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TypeExpr> for String {
    fn from(value: TypeExpr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(name) | TypeExpr::Named(name) => f.write_str(name),
            TypeExpr::Pointer(inner) => write!(f, "*{inner}"),
            TypeExpr::Array(inner) => write!(f, "[]{inner}"),
            TypeExpr::Map => f.write_str("map[string]any"),
            TypeExpr::Foreign { package, name } => write!(f, "{package}.{name}"),
        }
    }
}

/// Map a builtin type name to its schema kind.
///
/// Anything unrecognized maps to `object`.
pub fn primitive_schema_type(name: &str) -> SchemaType {
    match name {
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32"
        | "uint64" | "uintptr" | "rune" => SchemaType::Integer,
        "float" | "float32" | "float64" => SchemaType::Number,
        "string" | "byte" => SchemaType::String,
        "bool" => SchemaType::Boolean,
        _ => SchemaType::Object,
    }
}

/// Options for a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Maximum declaration nesting depth before the run aborts.
    pub max_depth: usize,
    /// When true, an `omitempty` modifier on the `json` directive makes a
    /// field optional by default. Off by default; explicit `oapi_required`
    /// always takes precedence.
    pub omitempty_optional: bool,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            omitempty_optional: false,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn omitempty_optional(mut self, enabled: bool) -> Self {
        self.omitempty_optional = enabled;
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A non-fatal problem found while resolving annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Qualified declaration (`package.Type`).
    pub declaration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(
        code: &str,
        declaration: &str,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            declaration: declaration.to_string(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// Location in `declaration.field` form.
    pub fn location(&self) -> String {
        match &self.field {
            Some(field) => format!("{}.{}", self.declaration, field),
            None => self.declaration.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.location(), self.message)
    }
}
