//! Schema nodes and the combinators that build them.
//!
//! A [`Schema`] is a cheap handle to an immutable node. Combinators never
//! mutate their inputs; they wrap them in new nodes. Each node also owns a
//! lazily filled cache of compiled operations (see [`crate::compile`]),
//! which takes no part in equality.
pub mod literal;
pub mod object;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::compile::OperationCache;
use crate::error::SchemaError;
use crate::value::Value;

pub use literal::Literal;
pub use object::{Definition, FieldRef, ObjectBuilder, ObjectShape, UnknownKeys};

/// User-supplied value mapping. `Err` carries the failure reason.
pub type MapFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;
/// User-supplied predicate that never changes the value.
pub type CheckFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;
pub type AsyncCheckFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

#[derive(Clone)]
pub enum Kind {
    String,
    Integer,
    Float,
    Bool,
    Unit,
    Unknown,
    Never,
    Literal(Literal),
    Option(Schema),
    Nullable(Schema),
    Array(Schema),
    List(Schema),
    Dict(Schema),
    Tuple(Vec<Schema>),
    Object(ObjectShape),
    Union(Vec<Schema>),
    Json,
    Custom { name: String, parser: MapFn, serializer: MapFn },
    Refine { base: Schema, check: CheckFn },
    Transform { base: Schema, parser: MapFn, serializer: Option<MapFn> },
    AsyncRefine { base: Schema, check: AsyncCheckFn },
    Default { base: Schema, value: Value },
}

impl Kind {
    fn children(&self) -> Vec<&Schema> {
        match self {
            Kind::Option(s) | Kind::Nullable(s) | Kind::Array(s) | Kind::List(s) | Kind::Dict(s) => vec![s],
            Kind::Tuple(items) | Kind::Union(items) => items.iter().collect(),
            Kind::Object(shape) => shape.fields.values().collect(),
            Kind::Refine { base, .. }
            | Kind::Transform { base, .. }
            | Kind::AsyncRefine { base, .. }
            | Kind::Default { base, .. } => vec![base],
            _ => Vec::new(),
        }
    }
}

// Declarative shape only: user closures are opaque and never compared.
impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        use Kind::*;
        match (self, other) {
            (String, String) | (Integer, Integer) | (Float, Float) | (Bool, Bool) => true,
            (Unit, Unit) | (Unknown, Unknown) | (Never, Never) | (Json, Json) => true,
            (Literal(a), Literal(b)) => a == b,
            (Option(a), Option(b)) | (Nullable(a), Nullable(b)) => a == b,
            (Array(a), Array(b)) | (List(a), List(b)) | (Dict(a), Dict(b)) => a == b,
            (Tuple(a), Tuple(b)) | (Union(a), Union(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Custom { name: a, .. }, Custom { name: b, .. }) => a == b,
            (Refine { base: a, .. }, Refine { base: b, .. }) => a == b,
            (Transform { base: a, .. }, Transform { base: b, .. }) => a == b,
            (AsyncRefine { base: a, .. }, AsyncRefine { base: b, .. }) => a == b,
            (Default { base: a, value: x }, Default { base: b, value: y }) => a == b && x == y,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub description: Option<String>,
}

pub(crate) struct Node {
    pub(crate) kind: Kind,
    pub(crate) metadata: Metadata,
    pub(crate) is_async: bool,
    pub(crate) cache: OperationCache,
}

#[derive(Clone)]
pub struct Schema(pub(crate) Arc<Node>);

impl Schema {
    fn new(kind: Kind, metadata: Metadata) -> Self {
        let is_async = matches!(kind, Kind::AsyncRefine { .. })
            || kind.children().iter().any(|c| c.is_async());
        Schema(Arc::new(Node { kind, metadata, is_async, cache: OperationCache::default() }))
    }

    fn from_kind(kind: Kind) -> Self { Self::new(kind, Metadata::default()) }

    pub fn kind(&self) -> &Kind { &self.0.kind }

    pub fn metadata(&self) -> &Metadata { &self.0.metadata }

    /// True when some node in this tree needs the two-phase parse.
    pub fn is_async(&self) -> bool { self.0.is_async }

    pub fn description(&self) -> Option<&str> { self.0.metadata.description.as_deref() }

    /// Fallback supplied by the nearest `default` wrapper, if any.
    pub fn default_value(&self) -> Option<&Value> {
        match &self.0.kind {
            Kind::Default { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Name used in diagnostics and operation labels.
    pub fn name(&self) -> String {
        match &self.0.kind {
            Kind::String => "string".into(),
            Kind::Integer => "integer".into(),
            Kind::Float => "float".into(),
            Kind::Bool => "bool".into(),
            Kind::Unit => "unit".into(),
            Kind::Unknown => "unknown".into(),
            Kind::Never => "never".into(),
            Kind::Literal(l) => l.to_string(),
            Kind::Option(s) => format!("option<{}>", s.name()),
            Kind::Nullable(s) => format!("nullable<{}>", s.name()),
            Kind::Array(s) => format!("array<{}>", s.name()),
            Kind::List(s) => format!("list<{}>", s.name()),
            Kind::Dict(s) => format!("dict<{}>", s.name()),
            Kind::Tuple(items) => format!(
                "tuple<{}>",
                items.iter().map(Schema::name).collect::<Vec<_>>().join(", ")
            ),
            Kind::Object(_) => "object".into(),
            Kind::Union(variants) => variants.iter().map(Schema::name).collect::<Vec<_>>().join(" | "),
            Kind::Json => "JSON".into(),
            Kind::Custom { name, .. } => name.clone(),
            Kind::Refine { base, .. }
            | Kind::Transform { base, .. }
            | Kind::AsyncRefine { base, .. }
            | Kind::Default { base, .. } => base.name(),
        }
    }

    /// Validation-only predicate, run after the base on parse and before it on serialize.
    pub fn refine<F>(&self, check: F) -> Schema
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::from_kind(Kind::Refine { base: self.clone(), check: Arc::new(check) })
    }

    pub fn transform<P, S>(&self, parser: P, serializer: S) -> Schema
    where
        P: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
        S: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::from_kind(Kind::Transform {
            base: self.clone(),
            parser: Arc::new(parser),
            serializer: Some(Arc::new(serializer)),
        })
    }

    /// Parse-only transform; serializing through it fails with `MissingSerializer`.
    pub fn transform_parser<P>(&self, parser: P) -> Schema
    where
        P: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::from_kind(Kind::Transform { base: self.clone(), parser: Arc::new(parser), serializer: None })
    }

    /// Asynchronous predicate. Makes every schema containing this one async to parse.
    pub fn async_refine<F, Fut>(&self, check: F) -> Schema
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let check: AsyncCheckFn = Arc::new(move |v| check(v).boxed());
        Self::from_kind(Kind::AsyncRefine { base: self.clone(), check })
    }

    /// Substitute `value` when the input is exactly `undefined`.
    pub fn default(&self, value: impl Into<Value>) -> Schema {
        Self::from_kind(Kind::Default { base: self.clone(), value: value.into() })
    }

    /// Same node, new documentation. Behavior is untouched.
    pub fn describe(&self, text: impl Into<String>) -> Schema {
        Self::new(self.0.kind.clone(), Metadata { description: Some(text.into()) })
    }

    pub fn optional(&self) -> Schema { option(self.clone()) }

    pub fn nullable(&self) -> Schema { nullable(self.clone()) }

    /// Reject undeclared keys. Replaces any previous mode; no-op on non-objects.
    pub fn strict(&self) -> Schema { self.with_unknown_keys(UnknownKeys::Strict) }

    /// Drop undeclared keys. Replaces any previous mode; no-op on non-objects.
    pub fn strip(&self) -> Schema { self.with_unknown_keys(UnknownKeys::Strip) }

    fn with_unknown_keys(&self, mode: UnknownKeys) -> Schema {
        match &self.0.kind {
            Kind::Object(shape) => {
                Self::new(Kind::Object(shape.with_unknown_keys(mode)), self.0.metadata.clone())
            }
            _ => self.clone(),
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.kind == other.0.kind && self.0.metadata == other.0.metadata)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name())
            .field("description", &self.description())
            .field("is_async", &self.is_async())
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMBINATORS
// ————————————————————————————————————————————————————————————————————————————

pub fn string() -> Schema { Schema::from_kind(Kind::String) }

/// Finite integral numbers in the 32-bit signed range.
pub fn integer() -> Schema { Schema::from_kind(Kind::Integer) }

/// Any number except NaN.
pub fn float() -> Schema { Schema::from_kind(Kind::Float) }

pub fn bool() -> Schema { Schema::from_kind(Kind::Bool) }

/// Accepts only `undefined`.
pub fn unit() -> Schema { Schema::from_kind(Kind::Unit) }

pub fn unknown() -> Schema { Schema::from_kind(Kind::Unknown) }

pub fn never() -> Schema { Schema::from_kind(Kind::Never) }

pub fn literal(value: impl Into<Value>) -> Result<Schema, SchemaError> {
    Ok(Schema::from_kind(Kind::Literal(Literal::from_value(value.into())?)))
}

pub fn nan() -> Schema { Schema::from_kind(Kind::Literal(Literal::NaN)) }

pub fn option(inner: Schema) -> Schema { Schema::from_kind(Kind::Option(inner)) }

pub fn nullable(inner: Schema) -> Schema { Schema::from_kind(Kind::Nullable(inner)) }

pub fn array(inner: Schema) -> Schema { Schema::from_kind(Kind::Array(inner)) }

pub fn list(inner: Schema) -> Schema { Schema::from_kind(Kind::List(inner)) }

pub fn dict(inner: Schema) -> Schema { Schema::from_kind(Kind::Dict(inner)) }

pub fn record(inner: Schema) -> Schema { dict(inner) }

pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::from_kind(Kind::Tuple(items.into_iter().collect()))
}

/// Declare fields through `build`; what it returns is the parsed output layout
/// (`()` keeps every field under its own name).
pub fn object<F, D>(build: F) -> Result<Schema, SchemaError>
where
    F: FnOnce(&mut ObjectBuilder) -> D,
    D: Into<Definition>,
{
    let mut builder = ObjectBuilder::default();
    let definition = build(&mut builder).into();
    Ok(Schema::from_kind(Kind::Object(builder.finish(definition)?)))
}

/// First variant (in declared order) that accepts the input wins.
pub fn union(variants: impl IntoIterator<Item = Schema>) -> Result<Schema, SchemaError> {
    let variants: Vec<Schema> = variants.into_iter().collect();
    if variants.is_empty() {
        return Err(SchemaError::EmptyUnion);
    }
    Ok(Schema::from_kind(Kind::Union(variants)))
}

pub fn json() -> Schema { Schema::from_kind(Kind::Json) }

pub fn custom<P, S>(name: impl Into<String>, parser: P, serializer: S) -> Schema
where
    P: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    S: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
{
    Schema::from_kind(Kind::Custom { name: name.into(), parser: Arc::new(parser), serializer: Arc::new(serializer) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_combinator_calls_build_equal_schemas() {
        assert_eq!(array(string()), array(string()));
        assert_eq!(tuple([string(), integer()]), tuple([string(), integer()]));
        assert_eq!(option(nullable(string())), option(nullable(string())));
        assert_ne!(option(nullable(string())), nullable(option(string())));
        assert_ne!(array(string()), list(string()));
    }

    #[test]
    fn equality_ignores_compiled_state() {
        let a = string();
        let b = string();
        let _ = crate::api::parse(&a, Value::from("x"));
        assert_eq!(a, b);
    }

    #[test]
    fn strict_and_strip_replace_each_other() {
        let base = object(|o| {
            o.field("a", integer());
        })
        .unwrap();
        let strict = base.strict();
        let strip_then_strict = base.strip().strict();
        assert_ne!(base, strict);
        assert_ne!(strict, base.strip());
        assert_eq!(strict, strip_then_strict);
        match strip_then_strict.kind() {
            Kind::Object(shape) => assert_eq!(shape.unknown_keys(), UnknownKeys::Strict),
            _ => unreachable!(),
        }
        assert_eq!(string().strict(), string());
    }

    #[test]
    fn construction_errors_fail_immediately() {
        assert_eq!(literal(f64::NAN).err(), Some(SchemaError::NanLiteral));
        assert_eq!(union([]).err(), Some(SchemaError::EmptyUnion));
        let dup = object(|o| {
            o.field("a", string());
            o.field("a", string());
        });
        assert_eq!(dup.err(), Some(SchemaError::DuplicateField("a".into())));
    }

    #[test]
    fn async_taint_flows_up_only() {
        let checked = string().async_refine(|_| async { Ok(()) });
        let sibling = integer();
        let parent = object(|o| {
            o.field("a", checked.clone());
            o.field("b", sibling.clone());
        })
        .unwrap();
        assert!(checked.is_async());
        assert!(parent.is_async());
        assert!(!sibling.is_async());
        assert!(array(parent.clone()).optional().is_async());
    }

    #[test]
    fn describe_and_default_metadata() {
        let s = string().describe("user name");
        assert_eq!(s.description(), Some("user name"));
        assert_eq!(string().description(), None);
        let d = string().default("anon");
        assert_eq!(d.default_value(), Some(&Value::from("anon")));
        assert_eq!(d.name(), "string");
        assert_eq!(custom("Email", Ok, Ok).name(), "Email");
    }
}
