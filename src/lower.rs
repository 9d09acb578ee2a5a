//! Schema documents ⇄ schemas.
//!
//! Wrapper flags lower in a fixed order: `nullable` inside `optional` inside
//! `default`, with the description on the outermost node. `emit_doc` only
//! raises schemas built in that order, and none with user closures.
use regex::Regex;
use thiserror::Error;

use crate::error::SchemaError;
use crate::ir::{DocKind, LiteralDoc, ObjectMode, SchemaDoc};
use crate::schema::{self, Definition, Kind, Literal, Schema, UnknownKeys};
use crate::value::Value;

#[derive(Debug, Error)]
pub enum LowerError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern { pattern: String, source: regex::Error },
}

pub fn lower(doc: &SchemaDoc) -> Result<Schema, LowerError> {
    let mut out = lower_kind(&doc.kind)?;
    if doc.nullable {
        out = out.nullable();
    }
    if doc.optional {
        out = out.optional();
    }
    if let Some(default) = &doc.default {
        out = out.default(default.clone());
    }
    if let Some(text) = &doc.description {
        out = out.describe(text.clone());
    }
    Ok(out)
}

fn lower_kind(kind: &DocKind) -> Result<Schema, LowerError> {
    Ok(match kind {
        DocKind::String { pattern: None } => schema::string(),
        DocKind::String { pattern: Some(pattern) } => {
            let re = Regex::new(pattern)
                .map_err(|source| LowerError::Pattern { pattern: pattern.clone(), source })?;
            schema::string().refine(move |v| match v.as_str() {
                Some(s) if re.is_match(s) => Ok(()),
                _ => Err(format!("Expected a string matching {}", re.as_str())),
            })
        }
        DocKind::Integer => schema::integer(),
        DocKind::Float => schema::float(),
        DocKind::Bool => schema::bool(),
        DocKind::Unit => schema::unit(),
        DocKind::Unknown => schema::unknown(),
        DocKind::Never => schema::never(),
        DocKind::Json => schema::json(),
        DocKind::Nan => schema::nan(),
        DocKind::Literal { value } => schema::literal(literal_value(value))?,
        DocKind::Array { items } => schema::array(lower(items)?),
        DocKind::List { items } => schema::list(lower(items)?),
        DocKind::Dict { values } => schema::dict(lower(values)?),
        DocKind::Tuple { items } => schema::tuple(items.iter().map(lower).collect::<Result<Vec<_>, _>>()?),
        DocKind::Union { variants } => schema::union(variants.iter().map(lower).collect::<Result<Vec<_>, _>>()?)?,
        DocKind::Object { fields, mode } => {
            let fields = fields
                .iter()
                .map(|(name, doc)| Ok((name.clone(), lower(doc)?)))
                .collect::<Result<Vec<_>, LowerError>>()?;
            let object = schema::object(|o| {
                for (name, field) in fields {
                    o.field(name, field);
                }
            })?;
            match mode {
                ObjectMode::Passthrough => object,
                ObjectMode::Strict => object.strict(),
                ObjectMode::Strip => object.strip(),
            }
        }
    })
}

fn literal_value(value: &LiteralDoc) -> Value {
    match value {
        LiteralDoc::Null => Value::Null,
        LiteralDoc::Bool(b) => Value::Bool(*b),
        LiteralDoc::Number(n) => Value::Number(n.0),
        LiteralDoc::String(s) => Value::String(s.clone()),
    }
}

/// Raise a schema back to a document. `None` when some node has no
/// declarative form (refinements, transforms, custom schemas, restructured
/// objects).
pub fn emit_doc(schema: &Schema) -> Option<SchemaDoc> {
    let mut doc = match schema.kind() {
        Kind::Option(inner) => {
            let mut doc = emit_doc(inner)?;
            if doc.optional || doc.default.is_some() || doc.description.is_some() {
                return None;
            }
            doc.optional = true;
            doc
        }
        Kind::Nullable(inner) => {
            let mut doc = emit_doc(inner)?;
            if !doc.is_bare() {
                return None;
            }
            doc.nullable = true;
            doc
        }
        Kind::Default { base, value } => {
            let mut doc = emit_doc(base)?;
            if doc.default.is_some() || doc.description.is_some() {
                return None;
            }
            doc.default = Some(value.clone().into_json()?);
            doc
        }
        kind => SchemaDoc::new(emit_kind(kind)?),
    };
    if let Some(text) = schema.description() {
        doc.description = Some(text.to_owned());
    }
    Some(doc)
}

fn emit_kind(kind: &Kind) -> Option<DocKind> {
    let boxed = |s: &Schema| emit_doc(s).map(Box::new);
    let all = |xs: &[Schema]| xs.iter().map(emit_doc).collect::<Option<Vec<_>>>();
    Some(match kind {
        Kind::String => DocKind::String { pattern: None },
        Kind::Integer => DocKind::Integer,
        Kind::Float => DocKind::Float,
        Kind::Bool => DocKind::Bool,
        Kind::Unit => DocKind::Unit,
        Kind::Unknown => DocKind::Unknown,
        Kind::Never => DocKind::Never,
        Kind::Json => DocKind::Json,
        Kind::Literal(Literal::NaN) => DocKind::Nan,
        Kind::Literal(literal) => DocKind::Literal { value: literal_doc(literal)? },
        Kind::Array(s) => DocKind::Array { items: boxed(s)? },
        Kind::List(s) => DocKind::List { items: boxed(s)? },
        Kind::Dict(s) => DocKind::Dict { values: boxed(s)? },
        Kind::Tuple(items) => DocKind::Tuple { items: all(items)? },
        Kind::Union(variants) => DocKind::Union { variants: all(variants)? },
        Kind::Object(shape) if *shape.definition() == Definition::Fields => DocKind::Object {
            fields: shape
                .fields()
                .map(|(name, s)| Some((name.to_owned(), emit_doc(s)?)))
                .collect::<Option<_>>()?,
            mode: match shape.unknown_keys() {
                UnknownKeys::Passthrough => ObjectMode::Passthrough,
                UnknownKeys::Strict => ObjectMode::Strict,
                UnknownKeys::Strip => ObjectMode::Strip,
            },
        },
        _ => return None,
    })
}

fn literal_doc(literal: &Literal) -> Option<LiteralDoc> {
    match literal {
        Literal::Null => Some(LiteralDoc::Null),
        Literal::Bool(b) => Some(LiteralDoc::Bool(*b)),
        Literal::Number(n) => Some(LiteralDoc::Number(*n)),
        Literal::String(s) => Some(LiteralDoc::String(s.clone())),
        Literal::Undefined | Literal::NaN => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{parse, serialize};
    use crate::error::Reason;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> SchemaDoc { serde_json::from_value(v).unwrap() }

    #[test]
    fn lowered_objects_validate() {
        let s = lower(&doc(json!({
            "type": "object",
            "mode": "strict",
            "fields": {
                "id": {"type": "integer"},
                "tags": {"type": "array", "items": {"type": "string"}, "optional": true},
                "kind": {"type": "literal", "value": "user", "default": "user"}
            }
        })))
        .unwrap();
        assert_eq!(
            parse(&s, json!({"id": 1})).unwrap(),
            Value::from(json!({"id": 1, "kind": "user"}))
        );
        let err = parse(&s, json!({"id": 1, "extra": true})).unwrap_err();
        assert_eq!(err.reason, Reason::ExcessField("extra".into()));
        assert_eq!(err.path.to_string(), ".extra");
        assert_eq!(parse(&s, json!({"id": 1, "tags": [2]})).unwrap_err().path.to_string(), ".tags[0]");
    }

    #[test]
    fn patterns_become_refinements() {
        let s = lower(&doc(json!({"type": "string", "pattern": "^[a-z]+$"}))).unwrap();
        assert!(parse(&s, "abc").is_ok());
        assert_eq!(
            parse(&s, "ABC").unwrap_err().message(),
            "Failed parsing at root. Reason: Expected a string matching ^[a-z]+$"
        );
        assert!(serialize(&s, "ABC").is_err());
        assert!(emit_doc(&s).is_none());
    }

    #[test]
    fn bad_documents_fail_to_lower() {
        let err = lower(&doc(json!({"type": "string", "pattern": "("}))).unwrap_err();
        assert!(matches!(err, LowerError::Pattern { .. }));
        let err = lower(&doc(json!({"type": "union", "variants": []}))).unwrap_err();
        assert!(matches!(err, LowerError::Schema(SchemaError::EmptyUnion)));
    }

    #[test]
    fn emit_inverts_lower() {
        let original = doc(json!({
            "type": "object",
            "description": "event",
            "fields": {
                "at": {"type": "tuple", "items": [{"type": "integer"}, {"type": "float"}]},
                "note": {"type": "string", "nullable": true, "optional": true},
                "level": {"type": "union", "variants": [
                    {"type": "literal", "value": 1},
                    {"type": "literal", "value": null}
                ], "default": 1},
                "meta": {"type": "dict", "values": {"type": "json"}},
                "score": {"type": "nan"}
            },
            "mode": "strip"
        }));
        let lowered = lower(&original).unwrap();
        let emitted = emit_doc(&lowered).unwrap();
        assert_eq!(emitted, original);
        assert_eq!(lower(&emitted).unwrap(), lowered);
    }

    #[test]
    fn closures_and_layouts_have_no_document() {
        assert!(emit_doc(&schema::custom("Email", Ok, Ok)).is_none());
        assert!(emit_doc(&schema::string().transform(Ok, Ok)).is_none());
        let restructured = schema::object(|o| o.field("a", schema::string())).unwrap();
        assert!(emit_doc(&restructured).is_none());
        assert!(emit_doc(&schema::nullable(schema::option(schema::string()))).is_none());
    }
}
