//! Discriminator construction for `oneOf` compositions.

use std::collections::BTreeMap;

use crate::annotation::{self, DirectiveKind};
use crate::error::ResolveError;
use crate::schema::{Discriminator, SchemaRef};
use crate::types::Diagnostic;

/// Mapping source understood by `oapi_discriminator_mapped_parsed`.
const PARSED_ONE_OF: &str = "oneOf";

/// Key casing understood by `oapi_discriminator_mapped_parser`.
const PARSER_UPPER_SNAKE: &str = "upperSnake";

/// Discriminator directives captured from a declaration's doc text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscriminatorSpec {
    pub property_name: Option<String>,
    pub parsed: Option<String>,
    pub parser: Option<String>,
}

impl DiscriminatorSpec {
    pub fn from_doc(doc: &str) -> Self {
        let mut spec = Self::default();
        for directive in annotation::directive_lines(doc).flat_map(annotation::parse_directives) {
            match annotation::classify(&directive.key) {
                DirectiveKind::DiscriminatorProperty => spec.property_name = Some(directive.value),
                DirectiveKind::DiscriminatorParsed => spec.parsed = Some(directive.value),
                DirectiveKind::DiscriminatorParser => spec.parser = Some(directive.value),
                _ => {}
            }
        }
        spec
    }

    /// Build the discriminator block over the collected `oneOf` members.
    ///
    /// `explicit_keys[i]` is the `oapi_oneOf: key` captured for `members[i]`.
    /// Returns `None` when no property name was declared.
    pub fn build(
        &self,
        declaration: &str,
        members: &[SchemaRef],
        explicit_keys: &[Option<String>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Option<Discriminator>, ResolveError> {
        let Some(property_name) = self.property_name.clone() else {
            return Ok(None);
        };

        let mut mapping = BTreeMap::new();
        match self.parsed.as_deref() {
            None => {}
            Some(PARSED_ONE_OF) => {
                let upper_snake = match self.parser.as_deref() {
                    None => false,
                    Some(PARSER_UPPER_SNAKE) => true,
                    Some(other) => {
                        diagnostics.push(Diagnostic::warning(
                            "W007",
                            declaration,
                            None,
                            format!("unsupported discriminator parser '{other}', keys left as-is"),
                        ));
                        false
                    }
                };

                for (i, member) in members.iter().enumerate() {
                    let SchemaRef::Ref(reference) = member else {
                        continue;
                    };
                    let key = match explicit_keys.get(i).cloned().flatten() {
                        Some(explicit) => explicit,
                        None if upper_snake => to_upper_snake(reference.target_name()),
                        None => reference.target_name().to_string(),
                    };
                    if mapping.contains_key(&key) {
                        return Err(ResolveError::DiscriminatorKeyCollision {
                            declaration: declaration.to_string(),
                            key,
                        });
                    }
                    mapping.insert(key, reference.ref_path.clone());
                }
            }
            Some(other) => diagnostics.push(Diagnostic::warning(
                "W007",
                declaration,
                None,
                format!("unsupported discriminator source '{other}', mapping not built"),
            )),
        }

        Ok(Some(Discriminator {
            property_name,
            mapping,
        }))
    }
}

/// `FooBar` -> `FOO_BAR`: an underscore goes between a lowercase letter or
/// digit and a following uppercase letter, then everything is uppercased.
pub fn to_upper_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if let Some(p) = prev {
            if (p.is_lowercase() || p.is_ascii_digit()) && c.is_uppercase() {
                out.push('_');
            }
        }
        out.extend(c.to_uppercase());
        prev = Some(c);
    }
    out
}
