//! Field type resolution: one type expression to one schema slot.

use crate::error::ResolveError;
use crate::resolver::{resolve_declaration, ResolveContext};
use crate::schema::{Schema, SchemaRef};
use crate::source::DeclRef;
use crate::types::{primitive_schema_type, Diagnostic, TypeExpr};

/// Resolve the type of field `field` declared on `owner`.
///
/// Returns the schema slot and whether the field is required absent any
/// explicit directive. Pointers, arrays and maps default to optional.
///
/// # Errors
///
/// Propagates fatal errors from nested declarations, and returns
/// [`ResolveError::CyclicDeclaration`] when the type names a declaration
/// that is still being resolved.
pub fn resolve_field<'a>(
    ctx: &mut ResolveContext<'a>,
    owner: DeclRef<'a>,
    field: &str,
    expr: &TypeExpr,
) -> Result<(SchemaRef, bool), ResolveError> {
    resolve_expr(ctx, owner, field, expr, false)
}

/// `in_array` is set while resolving an array's element type.
fn resolve_expr<'a>(
    ctx: &mut ResolveContext<'a>,
    owner: DeclRef<'a>,
    field: &str,
    expr: &TypeExpr,
    in_array: bool,
) -> Result<(SchemaRef, bool), ResolveError> {
    match expr {
        TypeExpr::Map => Ok((SchemaRef::inline(Schema::object()), false)),
        TypeExpr::Array(element) => {
            let items = resolve_items(ctx, owner, field, element)?;
            Ok((SchemaRef::inline(Schema::array(items)), false))
        }
        TypeExpr::Pointer(inner) => {
            let (slot, _) = resolve_expr(ctx, owner, field, inner, in_array)?;
            Ok((slot, false))
        }
        TypeExpr::Foreign { package, name } => {
            tracing::debug!(%package, %name, field, "foreign type resolved as opaque object");
            Ok((SchemaRef::inline(Schema::object()), true))
        }
        TypeExpr::Primitive(name) => Ok((
            SchemaRef::inline(Schema::new(primitive_schema_type(name))),
            true,
        )),
        TypeExpr::Named(name) => {
            resolve_named(ctx, owner, field, name, in_array).map(|slot| (slot, true))
        }
    }
}

/// Array element: one pointer level is unwrapped, and a registered target is
/// referenced without being resolved again.
fn resolve_items<'a>(
    ctx: &mut ResolveContext<'a>,
    owner: DeclRef<'a>,
    field: &str,
    element: &TypeExpr,
) -> Result<SchemaRef, ResolveError> {
    let element = match element {
        TypeExpr::Pointer(inner) => inner.as_ref(),
        other => other,
    };

    if let TypeExpr::Named(name) = element {
        if let Some(target) = ctx.lookup(owner, name) {
            if ctx.index().is_registered(target) {
                return Ok(SchemaRef::to_component(&target.declaration.schema_name()));
            }
        }
    }

    resolve_expr(ctx, owner, field, element, true).map(|(slot, _)| slot)
}

fn resolve_named<'a>(
    ctx: &mut ResolveContext<'a>,
    owner: DeclRef<'a>,
    field: &str,
    name: &str,
    in_array: bool,
) -> Result<SchemaRef, ResolveError> {
    let Some(target) = ctx.lookup(owner, name) else {
        ctx.warn(Diagnostic::warning(
            "W005",
            &owner.qualified_name(),
            Some(field),
            format!("type '{name}' is not declared, using a generic object"),
        ));
        return Ok(SchemaRef::inline(Schema::object()));
    };

    if let Some(chain) = ctx.cycle_through(target) {
        return Err(ResolveError::CyclicDeclaration {
            declaration: owner.qualified_name(),
            field: field.to_string(),
            chain,
            via_array: in_array,
        });
    }

    let resolved = resolve_declaration(ctx, target)?;
    match resolved.name {
        Some(registered) if ctx.index().is_registered(target) => {
            Ok(SchemaRef::to_component(&registered))
        }
        _ => Ok(SchemaRef::inline(resolved.schema)),
    }
}
