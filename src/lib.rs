//! Struct-to-OpenAPI schema resolution
//!
//! Derives OpenAPI component schemas from annotated type declarations.
//!
//! Declarations come from a manifest listing packages, their named types,
//! each type's fields (type expression, struct tag, doc comment) and the
//! declaration's own doc text. Declarations whose doc contains `oapi:schema`
//! or `swagger:model` are resolved and registered as component schemas.
//!
//! # Example
//!
//! ```
//! use struct_oapi::{load_source_str, resolve_all, Document, Format, ResolveOptions};
//!
//! let manifest = r#"
//! packages:
//!   - path: pets
//!     declarations:
//!       - name: Pet
//!         doc: oapi:schema
//!         fields:
//!           - name: Name
//!             type: string
//!             tag: 'json:"name" oapi_minLength:"1"'
//!           - name: Tags
//!             type: "[]string"
//!             tag: 'json:"tags"'
//! "#;
//!
//! let source = load_source_str(manifest, Format::Yaml).unwrap();
//! let resolution = resolve_all(&source, &ResolveOptions::default()).unwrap();
//!
//! let pet = resolution.schemas.get("Pet").unwrap();
//! assert_eq!(pet.required, vec!["name"]);
//!
//! let mut document = Document::new("Pets", "1.0.0");
//! document.add_schemas(&resolution.schemas).unwrap();
//! document.validate().unwrap();
//! ```
//!
//! # Annotation Format
//!
//! Struct tags carry `key:"value"` directives:
//! ```text
//! json:"name,omitempty" oapi_required:"true" oapi_format:"uuid"
//! ```
//!
//! Doc-comment lines starting with `oapi` are directives too, plus the
//! structural markers `oapi_oneOf[: key]` and `oapi_allOf` on embedded
//! fields and `oapi_discriminator*` / `oapi_name` on declarations.
//!
//! # Required Rules
//!
//! | Field type | Required by default |
//! |------------|---------------------|
//! | scalar, named type, foreign type | yes |
//! | `*T` | no |
//! | `[]T`, `map[K]V` | no |
//!
//! An explicit `oapi_required` always wins.

mod annotation;
mod attribute;
mod discriminator;
mod document;
mod error;
mod field;
mod linter;
mod loader;
mod resolver;
mod schema;
mod source;
mod types;
mod validator;

pub use annotation::{
    classify, composition_marker, parse_directives, split_transport, CompositionMarker, Directive,
    DirectiveKind,
};
pub use attribute::{apply, Applied, Attribute, AttributeKind, AttributeWarning};
pub use discriminator::{to_upper_snake, DiscriminatorSpec};
pub use document::{Components, Document, Info, OPENAPI_VERSION};
pub use error::{DocumentError, LoadError, ResolveError, SchemaError};
pub use field::resolve_field;
pub use linter::{lint, lint_file, FileResult, FileStatus, LintResult};
pub use loader::{is_url, load_source, load_source_auto, load_source_str, load_value, Format};
pub use resolver::{resolve_all, resolve_declaration, Resolution, ResolveContext, Resolved};
pub use schema::{Discriminator, Reference, Schema, SchemaCollection, SchemaRef, SchemaType};
pub use source::{DeclRef, Declaration, DeclarationIndex, DeclarationSource, Field, Package};
pub use types::{
    Diagnostic, ResolveOptions, Severity, TypeExpr, DEFAULT_MAX_DEPTH, REF_PREFIX,
};
pub use validator::validate_document;

#[cfg(feature = "remote")]
pub use loader::load_source_url;
