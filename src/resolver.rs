//! Declaration resolution - turns annotated declarations into component schemas.
//!
//! Resolution is two-phase: [`DeclarationIndex::build`] indexes every
//! annotated declaration first, then [`resolve_all`] resolves each one,
//! consulting the index for forward and cross-package references.

use std::collections::HashMap;

use crate::annotation::{self, CompositionMarker, DirectiveKind};
use crate::attribute;
use crate::discriminator::DiscriminatorSpec;
use crate::error::ResolveError;
use crate::field::resolve_field;
use crate::schema::{Schema, SchemaCollection, SchemaRef};
use crate::source::{
    declaration_attribute_lines, DeclRef, DeclarationIndex, DeclarationSource, Field,
};
use crate::types::{Diagnostic, ResolveOptions, TypeExpr};

/// State owned by one resolution run.
pub struct ResolveContext<'a> {
    index: DeclarationIndex<'a>,
    options: ResolveOptions,
    memo: HashMap<String, Resolved>,
    in_progress: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ResolveContext<'a> {
    /// Build the declaration index for `source` and start an empty run.
    pub fn new(source: &'a DeclarationSource, options: &ResolveOptions) -> Self {
        Self {
            index: DeclarationIndex::build(source),
            options: options.clone(),
            memo: HashMap::new(),
            in_progress: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn index(&self) -> &DeclarationIndex<'a> {
        &self.index
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Record a recoverable problem.
    pub fn warn(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            code = %diagnostic.code,
            location = %diagnostic.location(),
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    /// Find `name` as seen from `owner`: direct binding in the owner's
    /// package first, then the declaration index.
    pub fn lookup(&self, owner: DeclRef<'a>, name: &str) -> Option<DeclRef<'a>> {
        owner.sibling(name).or_else(|| self.index.lookup(name))
    }

    /// Declaration chain that re-entering `target` would close, if it is
    /// currently being resolved.
    pub(crate) fn cycle_through(&self, target: DeclRef<'_>) -> Option<Vec<String>> {
        let qualified = target.qualified_name();
        let start = self.in_progress.iter().position(|q| *q == qualified)?;
        let mut chain = self.in_progress[start..].to_vec();
        chain.push(qualified);
        Some(chain)
    }
}

/// Outcome of resolving one declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Registered name for object-like declarations; `None` for aliases.
    pub name: Option<String>,
    pub schema: Schema,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub schemas: SchemaCollection,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve every annotated declaration in `source`.
///
/// Registration is all-or-nothing: on any fatal error no collection is
/// returned.
///
/// # Errors
///
/// Returns `ResolveError` on name collisions, declaration cycles, depth
/// overflow or duplicate discriminator keys.
pub fn resolve_all(
    source: &DeclarationSource,
    options: &ResolveOptions,
) -> Result<Resolution, ResolveError> {
    let mut ctx = ResolveContext::new(source, options);
    let mut schemas = SchemaCollection::default();

    let annotated = ctx.index().annotated().to_vec();
    for decl in annotated {
        let resolved = resolve_declaration(&mut ctx, decl)?;
        if let Some(name) = resolved.name {
            schemas.insert(name, resolved.schema, decl.qualified_name())?;
        }
    }

    tracing::debug!(
        schemas = schemas.len(),
        diagnostics = ctx.diagnostics().len(),
        "resolution finished"
    );
    Ok(Resolution {
        schemas,
        diagnostics: ctx.into_diagnostics(),
    })
}

/// Resolve one declaration, at most once per run.
///
/// # Errors
///
/// Returns [`ResolveError::RecursionLimit`] when nesting exceeds
/// `max_depth`, and propagates errors from its fields.
pub fn resolve_declaration<'a>(
    ctx: &mut ResolveContext<'a>,
    decl: DeclRef<'a>,
) -> Result<Resolved, ResolveError> {
    let qualified = decl.qualified_name();
    if let Some(resolved) = ctx.memo.get(&qualified) {
        return Ok(resolved.clone());
    }
    if ctx.in_progress.len() >= ctx.options.max_depth {
        return Err(ResolveError::RecursionLimit {
            declaration: qualified,
            limit: ctx.options.max_depth,
        });
    }

    tracing::debug!(
        declaration = %qualified,
        depth = ctx.in_progress.len(),
        "resolving declaration"
    );
    ctx.in_progress.push(qualified.clone());
    let result = match &decl.declaration.alias {
        Some(underlying) => resolve_alias(ctx, decl, underlying).map(|schema| Resolved {
            name: None,
            schema,
        }),
        None => resolve_object(ctx, decl).map(|schema| Resolved {
            name: Some(decl.declaration.schema_name()),
            schema,
        }),
    };
    ctx.in_progress.pop();

    let resolved = result?;
    ctx.memo.insert(qualified, resolved.clone());
    Ok(resolved)
}

fn resolve_alias<'a>(
    ctx: &mut ResolveContext<'a>,
    decl: DeclRef<'a>,
    underlying: &TypeExpr,
) -> Result<Schema, ResolveError> {
    let (slot, _) = resolve_field(ctx, decl, "<alias>", underlying)?;
    let schema = match slot {
        SchemaRef::Inline(schema) => *schema,
        reference @ SchemaRef::Ref(_) => Schema {
            all_of: vec![reference],
            ..Schema::default()
        },
    };
    Ok(apply_declaration_doc(ctx, decl, schema))
}

/// Apply `oapi_*` attribute lines from the declaration's own doc.
fn apply_declaration_doc(
    ctx: &mut ResolveContext<'_>,
    decl: DeclRef<'_>,
    schema: Schema,
) -> Schema {
    let mut slot = SchemaRef::inline(schema);
    let mut ignored = None;
    for line in declaration_attribute_lines(&decl.declaration.doc) {
        for directive in annotation::parse_directives(line) {
            if let DirectiveKind::Attribute(name) = annotation::classify(&directive.key) {
                apply_directive(ctx, decl, None, &mut slot, name, &directive.value, &mut ignored);
            }
        }
    }
    match slot {
        SchemaRef::Inline(schema) => *schema,
        SchemaRef::Ref(_) => Schema::default(),
    }
}

/// One field after tag and doc processing.
struct ResolvedField {
    name: String,
    slot: SchemaRef,
    required: bool,
    marker: Option<CompositionMarker>,
}

fn resolve_object<'a>(
    ctx: &mut ResolveContext<'a>,
    decl: DeclRef<'a>,
) -> Result<Schema, ResolveError> {
    let qualified = decl.qualified_name();
    let discriminator = DiscriminatorSpec::from_doc(&decl.declaration.doc);

    let mut own = Schema::object();
    let mut one_of = Vec::new();
    let mut one_of_keys = Vec::new();
    let mut all_of = Vec::new();

    for field in &decl.declaration.fields {
        let Some(resolved) = resolve_declared_field(ctx, decl, field)? else {
            continue;
        };

        if !resolved.name.is_empty() {
            if own.insert_property(resolved.name.clone(), resolved.slot, resolved.required) {
                ctx.warn(Diagnostic::warning(
                    "W006",
                    &qualified,
                    Some(resolved.name.as_str()),
                    "duplicate property name, last field wins",
                ));
            }
            continue;
        }

        match resolved.marker {
            Some(CompositionMarker::OneOf(key)) => {
                one_of.push(resolved.slot);
                one_of_keys.push(key);
            }
            Some(CompositionMarker::AllOf) | None => all_of.push(resolved.slot),
        }
    }

    let mut schema = if one_of.is_empty() && all_of.is_empty() {
        own
    } else {
        let mut composed = Schema::default();
        let residual = (!own.properties.is_empty()).then(|| SchemaRef::inline(own));
        if !one_of.is_empty() {
            composed.one_of = one_of;
            composed.one_of.extend(residual);
        } else {
            all_of.extend(residual);
        }
        composed.all_of = all_of;
        composed
    };

    let mut warnings = Vec::new();
    schema.discriminator =
        discriminator.build(&qualified, &schema.one_of, &one_of_keys, &mut warnings)?;
    for warning in warnings {
        ctx.warn(warning);
    }

    Ok(apply_declaration_doc(ctx, decl, schema))
}

/// Resolve a field's type, then apply its tag and doc directives.
///
/// Returns `None` for fields skipped with `json:"-"`.
fn resolve_declared_field<'a>(
    ctx: &mut ResolveContext<'a>,
    decl: DeclRef<'a>,
    field: &'a Field,
) -> Result<Option<ResolvedField>, ResolveError> {
    let label = field.label();
    let tag_directives = field
        .tag
        .as_deref()
        .map(annotation::parse_directives)
        .unwrap_or_default();

    let mut name = field.name.clone().unwrap_or_default();
    let mut omitempty = false;
    for directive in &tag_directives {
        if annotation::classify(&directive.key) == DirectiveKind::Transport {
            let (transport_name, modifiers) = annotation::split_transport(&directive.value);
            if transport_name == "-" {
                tracing::debug!(field = %label, "field skipped by transport directive");
                return Ok(None);
            }
            if !transport_name.is_empty() {
                name = transport_name.to_string();
            }
            omitempty = modifiers.contains(&"omitempty");
        }
    }

    let (mut slot, required_default) = resolve_field(ctx, decl, &label, &field.ty)?;
    let mut explicit_required = None;

    for directive in &tag_directives {
        match annotation::classify(&directive.key) {
            DirectiveKind::Attribute(attribute) => apply_directive(
                ctx,
                decl,
                Some(label.as_str()),
                &mut slot,
                attribute,
                &directive.value,
                &mut explicit_required,
            ),
            DirectiveKind::Malformed => malformed(ctx, decl, &label, &directive.key),
            _ => {}
        }
    }

    let mut marker = None;
    for line in annotation::directive_lines(field.doc.as_deref().unwrap_or_default()) {
        if let Some(found) = annotation::composition_marker(line) {
            marker = Some(found);
            continue;
        }
        for directive in annotation::parse_directives(line) {
            match annotation::classify(&directive.key) {
                DirectiveKind::Attribute(attribute) => apply_directive(
                    ctx,
                    decl,
                    Some(label.as_str()),
                    &mut slot,
                    attribute,
                    &directive.value,
                    &mut explicit_required,
                ),
                DirectiveKind::Malformed => malformed(ctx, decl, &label, &directive.key),
                _ => {}
            }
        }
    }

    let omitted = ctx.options.omitempty_optional && omitempty;
    Ok(Some(ResolvedField {
        name,
        slot,
        required: explicit_required.unwrap_or(required_default && !omitted),
        marker,
    }))
}

fn apply_directive(
    ctx: &mut ResolveContext<'_>,
    decl: DeclRef<'_>,
    field: Option<&str>,
    slot: &mut SchemaRef,
    attribute: &str,
    value: &str,
    required: &mut Option<bool>,
) {
    let applied = attribute::apply(slot, attribute, value);
    if let Some(flag) = applied.required {
        *required = Some(flag);
    }
    if let Some(warning) = applied.warning {
        ctx.warn(Diagnostic::warning(
            warning.code(),
            &decl.qualified_name(),
            field,
            warning.to_string(),
        ));
    }
}

fn malformed(ctx: &mut ResolveContext<'_>, decl: DeclRef<'_>, field: &str, key: &str) {
    ctx.warn(Diagnostic::warning(
        "W001",
        &decl.qualified_name(),
        Some(field),
        format!("malformed directive key '{key}', ignored"),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_source_str, Format};
    use crate::schema::SchemaType;
    use serde_json::json;

    fn load(yaml: &str) -> DeclarationSource {
        load_source_str(yaml, Format::Yaml).unwrap()
    }

    fn resolve(yaml: &str) -> Resolution {
        resolve_all(&load(yaml), &ResolveOptions::default()).unwrap()
    }

    fn schema_json(resolution: &Resolution, name: &str) -> serde_json::Value {
        serde_json::to_value(resolution.schemas.get(name).unwrap()).unwrap()
    }

    const PETS: &str = r#"
packages:
  - path: pets
    declarations:
      - name: Pet
        doc: oapi:schema
        fields:
          - name: ID
            type: int64
            tag: 'json:"id"'
          - name: Name
            type: string
            tag: 'json:"name,omitempty" oapi_required:"true"'
          - name: Owner
            type: "*Owner"
            tag: 'json:"owner"'
          - name: Friends
            type: "[]*Pet"
            tag: 'json:"friends"'
          - name: Secret
            type: string
            tag: 'json:"-"'
      - name: Owner
        doc: oapi:schema
        fields:
          - name: Email
            type: string
            tag: 'json:"email"'
            doc: "oapi_format: email"
"#;

    #[test]
    fn resolves_object_fields() {
        let resolution = resolve(PETS);
        assert_eq!(
            schema_json(&resolution, "Pet"),
            json!({
                "type": "object",
                "properties": {
                    "friends": {
                        "type": "array",
                        "items": { "$ref": "#/components/schemas/Pet" }
                    },
                    "id": { "type": "integer" },
                    "name": { "type": "string" },
                    "owner": { "$ref": "#/components/schemas/Owner" }
                },
                "required": ["id", "name"]
            })
        );
        assert_eq!(
            schema_json(&resolution, "Owner"),
            json!({
                "type": "object",
                "properties": { "email": { "type": "string", "format": "email" } },
                "required": ["email"]
            })
        );
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn resolution_is_idempotent() {
        let first = resolve(PETS);
        let second = resolve(PETS);
        for name in ["Pet", "Owner"] {
            assert_eq!(
                serde_json::to_string(first.schemas.get(name).unwrap()).unwrap(),
                serde_json::to_string(second.schemas.get(name).unwrap()).unwrap()
            );
        }
    }

    #[test]
    fn omitempty_policy_is_opt_in() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: A
        doc: oapi:schema
        fields:
          - { name: X, type: string, tag: 'json:"x,omitempty"' }
          - { name: Y, type: string, tag: 'json:"y,omitempty" oapi_required:"true"' }
"#;
        let source = load(yaml);
        let default = resolve_all(&source, &ResolveOptions::default()).unwrap();
        assert_eq!(default.schemas.get("A").unwrap().required, vec!["x", "y"]);

        let opted = resolve_all(&source, &ResolveOptions::new().omitempty_optional(true)).unwrap();
        assert_eq!(opted.schemas.get("A").unwrap().required, vec!["y"]);
    }

    #[test]
    fn one_of_folds_named_properties() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: Animal
        doc: oapi:schema
        fields:
          - { type: Cat, doc: oapi_oneOf }
          - { type: Dog, doc: oapi_oneOf }
          - { name: Name, type: string }
      - { name: Cat, doc: "oapi:schema" }
      - { name: Dog, doc: "oapi:schema" }
"#;
        let resolution = resolve(yaml);
        assert_eq!(
            schema_json(&resolution, "Animal"),
            json!({
                "oneOf": [
                    { "$ref": "#/components/schemas/Cat" },
                    { "$ref": "#/components/schemas/Dog" },
                    {
                        "type": "object",
                        "properties": { "Name": { "type": "string" } },
                        "required": ["Name"]
                    }
                ]
            })
        );
    }

    #[test]
    fn anonymous_fields_default_to_all_of() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: Timestamped
        doc: oapi:schema
        fields:
          - { name: CreatedAt, type: string }
      - name: Post
        doc: oapi:schema
        fields:
          - { type: Timestamped }
          - { name: Body, type: string }
"#;
        let resolution = resolve(yaml);
        let post = resolution.schemas.get("Post").unwrap();
        assert!(post.properties.is_empty());
        assert_eq!(post.all_of.len(), 2);
        assert_eq!(post.all_of[0], SchemaRef::to_component("Timestamped"));
        assert!(post.all_of[1].as_inline().unwrap().properties.contains_key("Body"));
    }

    #[test]
    fn discriminator_mapping_recases_unless_explicit() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: Shape
        doc: |
          oapi:schema
          oapi_discriminator: kind
          oapi_discriminator_mapped_parsed: oneOf
          oapi_discriminator_mapped_parser: upperSnake
        fields:
          - { type: FooBar, doc: oapi_oneOf }
          - { type: BazQux, doc: "oapi_oneOf: explicitKey" }
      - { name: FooBar, doc: "oapi:schema" }
      - { name: BazQux, doc: "oapi:schema" }
"#;
        let resolution = resolve(yaml);
        let discriminator = resolution
            .schemas
            .get("Shape")
            .unwrap()
            .discriminator
            .clone()
            .unwrap();
        assert_eq!(discriminator.property_name, "kind");
        assert_eq!(discriminator.mapping["FOO_BAR"], "#/components/schemas/FooBar");
        assert_eq!(discriminator.mapping["explicitKey"], "#/components/schemas/BazQux");
        assert_eq!(discriminator.mapping.len(), 2);
    }

    #[test]
    fn rename_collision_registers_nothing() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - { name: UserV1, doc: "oapi:schema\noapi_name: User" }
      - { name: UserV2, doc: "oapi:schema\noapi_name: User" }
"#;
        let err = resolve_all(&load(yaml), &ResolveOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::NameCollision { ref name, ref first, ref second }
                if name == "User" && first == "p.UserV1" && second == "p.UserV2"
        ));
    }

    #[test]
    fn renamed_declaration_is_referenced_by_new_name() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: Order
        doc: oapi:schema
        fields:
          - { name: Customer, type: CustomerV2 }
      - { name: CustomerV2, doc: "oapi:schema\noapi_name: Customer" }
"#;
        let resolution = resolve(yaml);
        assert!(resolution.schemas.get("Customer").is_some());
        assert_eq!(
            resolution.schemas.get("Order").unwrap().properties["Customer"],
            SchemaRef::to_component("Customer")
        );
    }

    #[test]
    fn pointer_self_reference_is_cyclic() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: Node
        doc: oapi:schema
        fields:
          - { name: Next, type: "*Node" }
"#;
        let err = resolve_all(&load(yaml), &ResolveOptions::default()).unwrap_err();
        match err {
            ResolveError::CyclicDeclaration {
                declaration,
                field,
                chain,
                via_array,
            } => {
                assert!(!via_array);
                assert_eq!(declaration, "p.Node");
                assert_eq!(field, "Next");
                assert_eq!(chain, vec!["p.Node", "p.Node"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn array_self_reference_is_ref() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: Tree
        doc: oapi:schema
        fields:
          - { name: Children, type: "[]*Tree" }
"#;
        let resolution = resolve(yaml);
        let tree = resolution.schemas.get("Tree").unwrap();
        let children = tree.properties["Children"].as_inline().unwrap();
        assert_eq!(children.schema_type, Some(SchemaType::Array));
        assert_eq!(
            children.items.as_deref(),
            Some(&SchemaRef::to_component("Tree"))
        );
        assert!(tree.required.is_empty());
    }

    #[test]
    fn max_depth_is_enforced() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: A
        doc: oapi:schema
        fields: [{ name: B, type: B }]
      - name: B
        fields: [{ name: C, type: C }]
      - name: C
        fields: [{ name: N, type: int }]
"#;
        let source = load(yaml);
        assert!(resolve_all(&source, &ResolveOptions::new().max_depth(3)).is_ok());
        let err = resolve_all(&source, &ResolveOptions::new().max_depth(2)).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::RecursionLimit { ref declaration, limit: 2 } if declaration == "p.C"
        ));
    }

    #[test]
    fn alias_resolves_to_scalar_with_doc_attributes() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: Status
        doc: "swagger:model\noapi_enum: active, closed"
        alias: string
      - name: Account
        doc: oapi:schema
        fields:
          - { name: Status, type: Status }
"#;
        let resolution = resolve(yaml);
        assert!(resolution.schemas.get("Status").is_none());
        assert_eq!(
            serde_json::to_value(&resolution.schemas.get("Account").unwrap().properties["Status"])
                .unwrap(),
            json!({ "type": "string", "enum": ["active", "closed"] })
        );
    }

    #[test]
    fn annotation_problems_become_diagnostics() {
        let yaml = r#"
packages:
  - path: p
    declarations:
      - name: A
        doc: oapi:schema
        fields:
          - name: X
            type: int
            tag: 'json:"x" oapi_minimum:"low" oapi_colour:"red"'
            doc: "oapi_min_length: 3"
          - { name: Y, type: Missing, tag: 'json:"x"' }
"#;
        let resolution = resolve(yaml);
        let codes: Vec<&str> = resolution
            .diagnostics
            .iter()
            .map(|d| d.code.as_str())
            .collect();
        assert_eq!(codes, vec!["W003", "W004", "W001", "W005", "W006"]);
        let a = resolution.schemas.get("A").unwrap();
        assert_eq!(a.properties.len(), 1);
        assert_eq!(a.required, vec!["x"]);
    }

    #[test]
    fn required_is_subset_of_properties() {
        for resolution in [resolve(PETS)] {
            for (_, schema) in resolution.schemas.iter() {
                for name in &schema.required {
                    assert!(schema.properties.contains_key(name));
                }
            }
        }
    }
}
