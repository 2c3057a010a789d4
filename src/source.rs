//! Declaration source model and the phase-one declaration index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::annotation::{self, DirectiveKind};
use crate::types::TypeExpr;

/// Declaration doc directive that renames the registered schema.
pub const RENAME_KEY: &str = "oapi_name";

/// Every package/module handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarationSource {
    #[serde(default)]
    pub packages: Vec<Package>,
}

/// One package and the type declarations it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub path: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

/// A named type: either object-like (a field list) or an alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    #[serde(default)]
    pub doc: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Underlying type for alias declarations (`type Status string`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<TypeExpr>,
}

impl Declaration {
    pub fn is_object_like(&self) -> bool {
        self.alias.is_none()
    }

    pub fn is_annotated(&self) -> bool {
        annotation::is_annotated(&self.doc)
    }

    /// Name the declaration registers under: `oapi_name` from the doc, or
    /// the type name.
    pub fn schema_name(&self) -> String {
        annotation::directive_lines(&self.doc)
            .flat_map(annotation::parse_directives)
            .find(|d| d.key == RENAME_KEY && !d.value.is_empty())
            .map(|d| d.value)
            .unwrap_or_else(|| self.name.clone())
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Absent for embedded/anonymous fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Field {
    /// Label used in diagnostics and errors.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<embedded {}>", self.ty),
        }
    }
}

/// A declaration together with the package that declares it.
#[derive(Debug, Clone, Copy)]
pub struct DeclRef<'a> {
    pub package: &'a Package,
    pub declaration: &'a Declaration,
}

impl<'a> DeclRef<'a> {
    /// `package.Type`, unique across the source.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package.path, self.declaration.name)
    }

    /// Declaration bound directly by name in the same package, annotated or not.
    pub fn sibling(&self, name: &str) -> Option<DeclRef<'a>> {
        self.package
            .declarations
            .iter()
            .find(|d| d.name == name)
            .map(|declaration| DeclRef {
                package: self.package,
                declaration,
            })
    }
}

/// Annotated declarations by type name, built before any resolution.
#[derive(Debug, Default)]
pub struct DeclarationIndex<'a> {
    by_name: HashMap<&'a str, DeclRef<'a>>,
    annotated: Vec<DeclRef<'a>>,
}

impl<'a> DeclarationIndex<'a> {
    pub fn build(source: &'a DeclarationSource) -> Self {
        let mut index = Self::default();
        for package in &source.packages {
            for declaration in &package.declarations {
                if !declaration.is_annotated() {
                    continue;
                }
                let decl = DeclRef {
                    package,
                    declaration,
                };
                // First declaration wins the by-name slot; a second one with
                // the same schema name is rejected at registration.
                index.by_name.entry(declaration.name.as_str()).or_insert(decl);
                index.annotated.push(decl);
            }
        }
        index
    }

    pub fn lookup(&self, name: &str) -> Option<DeclRef<'a>> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Whether this exact declaration will be registered: indexed and
    /// object-like. Aliases are always inlined.
    pub fn is_registered(&self, decl: DeclRef<'_>) -> bool {
        decl.declaration.is_object_like()
            && self
                .annotated
                .iter()
                .any(|d| std::ptr::eq(d.declaration, decl.declaration))
    }

    /// Annotated declarations in source order.
    pub fn annotated(&self) -> &[DeclRef<'a>] {
        &self.annotated
    }
}

/// Schema directives in a declaration's own doc that are not discriminator
/// or rename directives, e.g. `oapi_description` on an alias.
pub(crate) fn declaration_attribute_lines(doc: &str) -> impl Iterator<Item = &str> {
    annotation::directive_lines(doc).filter(|line| {
        annotation::parse_directives(line).first().is_some_and(|d| {
            d.key != RENAME_KEY
                && matches!(annotation::classify(&d.key), DirectiveKind::Attribute(_))
        })
    })
}
