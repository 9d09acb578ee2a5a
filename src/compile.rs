//! Operation compiler.
//!
//! Turns a [`Schema`] into a tree of closures, once per (node, operation kind),
//! and caches the result on the node. Dispatch on the node's kind happens here,
//! at compile time; the produced closures only carry the checks that node needs.
//!
//! Parse, assert and serialize compile to plain synchronous steps. An async
//! parse of a schema that contains `async_refine` compiles to a two-phase step
//! instead (see [`two_phase`]); every synchronous subtree inside it reuses its
//! cached parse step.
mod containers;
pub mod two_phase;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{Error, Operation, Reason};
use crate::schema::{Kind, Schema};
use crate::value::Value;

use two_phase::{async_fn, AsyncStep};
pub use two_phase::Outcome;

pub(crate) type Step = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Parse,
    /// Parse semantics, errors tagged `Assert`; callers discard the value.
    Assert,
    Serialize,
    /// Two-phase parse; only differs from `Parse` for async schemas.
    ParseAsync,
}

impl OperationKind {
    pub fn operation(self) -> Operation {
        match self {
            OperationKind::Parse | OperationKind::ParseAsync => Operation::Parse,
            OperationKind::Assert => Operation::Assert,
            OperationKind::Serialize => Operation::Serialize,
        }
    }
}

#[derive(Clone)]
enum Body {
    Sync(Step),
    Async(AsyncStep),
}

#[derive(Clone)]
pub struct CompiledOperation {
    kind: OperationKind,
    label: Arc<str>,
    noop: bool,
    body: Body,
}

impl CompiledOperation {
    pub fn kind(&self) -> OperationKind { self.kind }

    /// Name of the schema this was compiled for.
    pub fn label(&self) -> &str { &self.label }

    /// Returns its input unchanged for every input.
    pub fn is_noop(&self) -> bool { self.noop }

    /// Needs phase two for some inputs.
    pub fn is_async(&self) -> bool { matches!(self.body, Body::Async(_)) }

    /// Same compiled closure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.body, &other.body) {
            (Body::Sync(a), Body::Sync(b)) => Arc::ptr_eq(a, b),
            (Body::Async(a), Body::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    #[inline]
    pub(crate) fn call(&self, input: Value) -> Result<Value, Error> {
        match &self.body {
            Body::Sync(step) => step(input),
            Body::Async(step) => match step(input)? {
                Outcome::Ready(v) => Ok(v),
                Outcome::Deferred(_) => Err(Error::at_root(Reason::UnexpectedAsync, self.kind.operation())),
            },
        }
    }

    /// Synchronous structural pass; async checks come back unsettled.
    pub fn phase_one(&self, input: Value) -> Result<Outcome, Error> {
        match &self.body {
            Body::Sync(step) => step(input).map(Outcome::Ready),
            Body::Async(step) => step(input),
        }
    }

    pub fn run(&self, input: Value) -> Result<Value, Error> { self.call(input) }

    pub async fn run_async(&self, input: Value) -> Result<Value, Error> {
        self.phase_one(input)?.settle().await
    }
}

impl fmt::Debug for CompiledOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledOperation")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("noop", &self.noop)
            .field("async", &self.is_async())
            .finish()
    }
}

/// Per-node memo, one slot per operation kind. A slot is written at most once,
/// even when several threads race on first use.
#[derive(Default)]
pub(crate) struct OperationCache {
    parse: OnceCell<CompiledOperation>,
    assert: OnceCell<CompiledOperation>,
    serialize: OnceCell<CompiledOperation>,
    parse_async: OnceCell<CompiledOperation>,
}

impl OperationCache {
    fn slot(&self, kind: OperationKind) -> &OnceCell<CompiledOperation> {
        match kind {
            OperationKind::Parse => &self.parse,
            OperationKind::Assert => &self.assert,
            OperationKind::Serialize => &self.serialize,
            OperationKind::ParseAsync => &self.parse_async,
        }
    }
}

impl Schema {
    /// Compiled operation for `kind`, built on first request and reused afterwards.
    pub fn operation(&self, kind: OperationKind) -> &CompiledOperation {
        self.0.cache.slot(kind).get_or_init(|| compile(self, kind))
    }

    pub fn is_compiled(&self, kind: OperationKind) -> bool {
        self.0.cache.slot(kind).get().is_some()
    }
}

fn compile(schema: &Schema, kind: OperationKind) -> CompiledOperation {
    let (body, noop) = match kind {
        // nothing async below: reuse the synchronous parse as-is
        OperationKind::ParseAsync if !schema.is_async() => {
            let parse = schema.operation(OperationKind::Parse);
            (parse.body.clone(), parse.noop)
        }
        OperationKind::ParseAsync => (Body::Async(build_async(schema)), false),
        _ => {
            let (step, noop) = build(schema, kind);
            (Body::Sync(step), noop)
        }
    };
    let label: Arc<str> = schema.name().into();
    tracing::debug!(schema = %label, ?kind, noop, "compiled operation");
    CompiledOperation { kind, label, noop, body }
}

fn child(schema: &Schema, kind: OperationKind) -> CompiledOperation { schema.operation(kind).clone() }

pub(crate) fn step_fn<F>(f: F) -> Step
where
    F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn noop() -> (Step, bool) {
    (step_fn(Ok), true)
}

fn guard(expected: &'static str, op: Operation, accepts: fn(&Value) -> bool) -> Step {
    step_fn(move |v| {
        if accepts(&v) {
            Ok(v)
        } else {
            Err(Error::invalid_type(expected, &v, op))
        }
    })
}

fn failed(message: String, op: Operation) -> Error {
    Error::at_root(Reason::OperationFailed(message), op)
}

fn is_int32(v: &Value) -> bool {
    matches!(v, Value::Number(n)
        if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64)
}

/// Synchronous operations: parse, assert and serialize.
fn build(schema: &Schema, kind: OperationKind) -> (Step, bool) {
    let op = kind.operation();
    let serializing = kind == OperationKind::Serialize;

    match schema.kind() {
        Kind::String => (guard("string", op, |v| matches!(v, Value::String(_))), false),
        Kind::Integer => (guard("integer", op, is_int32), false),
        Kind::Float => (guard("float", op, |v| matches!(v, Value::Number(n) if !n.is_nan())), false),
        Kind::Bool => (guard("bool", op, |v| matches!(v, Value::Bool(_))), false),
        Kind::Unit => (guard("unit", op, Value::is_undefined), false),
        Kind::Unknown => noop(),
        Kind::Never => (step_fn(move |v| Err(Error::invalid_type("never", &v, op))), false),
        Kind::Literal(literal) => (containers::literal(literal.clone(), op), false),
        Kind::Option(inner) => {
            let inner = child(inner, kind);
            if inner.is_noop() {
                return noop();
            }
            (step_fn(move |v| if v.is_undefined() { Ok(v) } else { inner.call(v) }), false)
        }
        Kind::Nullable(inner) => {
            let inner = child(inner, kind);
            if inner.is_noop() {
                return noop();
            }
            (step_fn(move |v| if v.is_null() { Ok(v) } else { inner.call(v) }), false)
        }
        Kind::Array(item) | Kind::List(item) => (containers::sequence(child(item, kind), op), false),
        Kind::Dict(item) => (containers::dict(child(item, kind), op), false),
        Kind::Tuple(items) => (containers::tuple(items.iter().map(|s| child(s, kind)).collect(), op), false),
        Kind::Object(shape) => {
            let object = containers::Object::new(shape, |s| child(s, kind), op);
            let step = if serializing { object.serializer() } else { object.parser() };
            (step, false)
        }
        Kind::Union(variants) => (containers::union(variants.iter().map(|s| child(s, kind)).collect(), op), false),
        Kind::Json => (containers::json(op), false),
        Kind::Custom { name, parser, serializer } => {
            let map = if serializing { serializer.clone() } else { parser.clone() };
            let name = name.clone();
            (step_fn(move |v| map(v).map_err(|m| failed(format!("{name}: {m}"), op))), false)
        }
        Kind::Refine { base, check } => {
            let base = child(base, kind);
            let check = check.clone();
            let step = if serializing {
                step_fn(move |v| {
                    check(&v).map_err(|m| failed(m, op))?;
                    base.call(v)
                })
            } else {
                step_fn(move |v| {
                    let out = base.call(v)?;
                    check(&out).map_err(|m| failed(m, op))?;
                    Ok(out)
                })
            };
            (step, false)
        }
        Kind::Transform { base, parser, serializer } => {
            let base = child(base, kind);
            let step = match (serializing, serializer) {
                (false, _) => {
                    let parser = parser.clone();
                    step_fn(move |v| parser(base.call(v)?).map_err(|m| failed(m, op)))
                }
                (true, Some(serializer)) => {
                    let serializer = serializer.clone();
                    step_fn(move |v| base.call(serializer(v).map_err(|m| failed(m, op))?))
                }
                (true, None) => step_fn(move |_| Err(Error::at_root(Reason::MissingSerializer, op))),
            };
            (step, false)
        }
        Kind::AsyncRefine { base, .. } => {
            if serializing {
                let base = child(base, kind);
                let noop = base.noop;
                return (step_fn(move |v| base.call(v)), noop);
            }
            (step_fn(move |_| Err(Error::at_root(Reason::UnexpectedAsync, op))), false)
        }
        Kind::Default { base, value } => {
            let base = child(base, kind);
            if serializing {
                let noop = base.noop;
                return (step_fn(move |v| base.call(v)), noop);
            }
            let value = value.clone();
            (step_fn(move |v| if v.is_undefined() { Ok(value.clone()) } else { base.call(v) }), false)
        }
    }
}

/// Two-phase parse for a schema with at least one async node below it.
/// Synchronous children come back as their plain parse.
fn build_async(schema: &Schema) -> AsyncStep {
    let op = Operation::Parse;
    let child = |s: &Schema| s.operation(OperationKind::ParseAsync).clone();

    match schema.kind() {
        Kind::Option(inner) => {
            let inner = child(inner);
            async_fn(move |v| if v.is_undefined() { Ok(Outcome::Ready(v)) } else { inner.phase_one(v) })
        }
        Kind::Nullable(inner) => {
            let inner = child(inner);
            async_fn(move |v| if v.is_null() { Ok(Outcome::Ready(v)) } else { inner.phase_one(v) })
        }
        Kind::Array(item) | Kind::List(item) => containers::sequence_deferred(child(item), op),
        Kind::Dict(item) => containers::dict_deferred(child(item), op),
        Kind::Tuple(items) => containers::tuple_deferred(items.iter().map(child).collect(), op),
        Kind::Object(shape) => containers::Object::new(shape, child, op).deferred_parser(),
        Kind::Union(variants) => two_phase::union(variants.iter().map(child).collect(), op),
        Kind::Refine { base, check } => {
            let base = child(base);
            let check = check.clone();
            async_fn(move |v| {
                let check = check.clone();
                base.phase_one(v)?.then(move |out| {
                    check(&out).map_err(|m| failed(m, op))?;
                    Ok(out)
                })
            })
        }
        Kind::Transform { base, parser, .. } => {
            let base = child(base);
            let parser = parser.clone();
            async_fn(move |v| {
                let parser = parser.clone();
                base.phase_one(v)?.then(move |out| parser(out).map_err(|m| failed(m, op)))
            })
        }
        Kind::AsyncRefine { base, check } => {
            let base = child(base);
            let check = check.clone();
            async_fn(move |v| {
                let settling = base.phase_one(v)?.into_future();
                let check = check.clone();
                Ok(Outcome::Deferred(Box::pin(async move {
                    let out = settling.await?;
                    check(out.clone()).await.map_err(|m| failed(m, op))?;
                    Ok(out)
                })))
            })
        }
        Kind::Default { base, value } => {
            let base = child(base);
            let value = value.clone();
            async_fn(move |v| if v.is_undefined() { Ok(Outcome::Ready(value.clone())) } else { base.phase_one(v) })
        }
        // leaves are never async
        _ => {
            let parse = schema.operation(OperationKind::Parse).clone();
            async_fn(move |v| parse.phase_one(v))
        }
    }
}
