//! Annotation parsing for struct tags and doc-comment lines.
//!
//! A directive is `key:value` or `key:"value"`. Several directives may share
//! one line; each is matched independently and anything the pattern does not
//! match is ignored.

use std::sync::OnceLock;

use regex::Regex;

/// Directive key carrying the externally visible field name.
pub const TRANSPORT_KEY: &str = "json";

/// Prefix of schema directives, both in tags and in doc lines.
pub const SCHEMA_PREFIX: &str = "oapi";

/// A parsed `(key, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
}

/// What a directive key means to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind<'a> {
    /// `json`: first comma segment of the value names the field.
    Transport,
    /// `oapi_<attribute>`.
    Attribute(&'a str),
    /// `oapi_discriminator`.
    DiscriminatorProperty,
    /// `oapi_discriminator_mapped_parser`.
    DiscriminatorParser,
    /// `oapi_discriminator_mapped_parsed`.
    DiscriminatorParsed,
    /// `oapi...` key with an unexpected segment count.
    Malformed,
    /// Any other key; not ours.
    Foreign,
}

/// Structural doc markers on anonymous fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionMarker {
    /// `oapi_oneOf`, optionally `oapi_oneOf: key` with an explicit mapping key.
    OneOf(Option<String>),
    AllOf,
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z0-9_-]+):\s?(?:"([^"]*)"|([ A-Za-z0-9{},._-]+))"#)
            .expect("directive pattern is a valid regex")
    })
}

/// Extract every directive from a raw tag string or doc line.
///
/// A bare value runs until the next quote or unsupported character, so when
/// it stops at a `:` its last word is the next directive's key and matching
/// resumes there.
pub fn parse_directives(raw: &str) -> Vec<Directive> {
    let pattern = directive_pattern();
    let mut directives = Vec::new();
    let mut at = 0;

    while let Some(caps) = pattern.captures_at(raw, at) {
        let key = caps[1].to_string();
        if let Some(quoted) = caps.get(2) {
            directives.push(Directive {
                key,
                value: quoted.as_str().trim().to_string(),
            });
            at = quoted.end() + 1;
            continue;
        }

        let Some(bare) = caps.get(3) else { break };
        let mut value = bare.as_str();
        at = bare.end();
        if raw[bare.end()..].starts_with(':') {
            let split = value.rfind(' ').map_or(0, |i| i + 1);
            value = &value[..split];
            at = bare.start() + split;
        }
        directives.push(Directive {
            key,
            value: value.trim().to_string(),
        });
    }
    directives
}

/// Classify a directive key.
pub fn classify(key: &str) -> DirectiveKind<'_> {
    if key == TRANSPORT_KEY {
        return DirectiveKind::Transport;
    }
    if !key.starts_with(SCHEMA_PREFIX) {
        return DirectiveKind::Foreign;
    }
    let segments: Vec<&str> = key.split('_').collect();
    match segments.as_slice() {
        [SCHEMA_PREFIX, "discriminator"] => DirectiveKind::DiscriminatorProperty,
        [SCHEMA_PREFIX, "discriminator", "mapped", "parser"] => DirectiveKind::DiscriminatorParser,
        [SCHEMA_PREFIX, "discriminator", "mapped", "parsed"] => DirectiveKind::DiscriminatorParsed,
        [SCHEMA_PREFIX, attribute] if !attribute.is_empty() => DirectiveKind::Attribute(*attribute),
        _ => DirectiveKind::Malformed,
    }
}

/// Split a transport directive value into name and modifiers.
///
/// `"name,omitempty"` yields `("name", ["omitempty"])`.
pub fn split_transport(value: &str) -> (&str, Vec<&str>) {
    let mut parts = value.split(',').map(str::trim);
    let name = parts.next().unwrap_or("");
    (name, parts.filter(|p| !p.is_empty()).collect())
}

/// Doc-comment lines that carry schema directives, with comment markers
/// stripped.
pub fn directive_lines(doc: &str) -> impl Iterator<Item = &str> {
    doc.lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix("//").map(str::trim_start).unwrap_or(line)
        })
        .filter(|line| line.starts_with(SCHEMA_PREFIX))
}

/// Recognize `oapi_oneOf[: key]` and `oapi_allOf` doc lines.
pub fn composition_marker(line: &str) -> Option<CompositionMarker> {
    if let Some(rest) = marker_rest(line, "oapi_oneOf") {
        let key = rest
            .trim_start()
            .strip_prefix(':')
            .map(|k| k.trim().trim_matches('"').trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        return Some(CompositionMarker::OneOf(key));
    }
    marker_rest(line, "oapi_allOf").map(|_| CompositionMarker::AllOf)
}

fn marker_rest<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.trim().strip_prefix(marker)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c == ':' || c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// Whether a declaration's doc text opts it into schema generation.
pub fn is_annotated(doc: &str) -> bool {
    crate::types::SCHEMA_MARKERS
        .iter()
        .any(|marker| doc.contains(marker))
}
