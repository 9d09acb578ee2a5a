//! Steps for literals and every container kind. Direction-agnostic where the
//! rule is the same both ways: the caller passes the children's parse or
//! serialize operations and the error tag. The `*_deferred` forms build the
//! two-phase parse of containers with async children.
use std::sync::Arc;

use indexmap::IndexMap;

use super::two_phase::{async_fn, gather, AsyncStep};
use super::{step_fn, CompiledOperation, Step};
use crate::error::{Error, Operation, Reason};
use crate::path::PathSegment;
use crate::schema::literal::preview;
use crate::schema::{Definition, Literal, ObjectShape, Schema, UnknownKeys};
use crate::value::{Map, Value};

pub(super) fn literal(literal: Literal, op: Operation) -> Step {
    step_fn(move |v| {
        if literal.matches(&v) {
            Ok(v)
        } else {
            Err(Error::at_root(
                Reason::InvalidLiteral { expected: literal.to_string(), received: preview(&v) },
                op,
            ))
        }
    })
}

pub(super) fn sequence(item: CompiledOperation, op: Operation) -> Step {
    if item.is_noop() {
        return step_fn(move |v| match v {
            Value::Array(_) => Ok(v),
            other => Err(Error::invalid_type("array", &other, op)),
        });
    }
    step_fn(move |v| match v {
        Value::Array(xs) => xs
            .into_iter()
            .enumerate()
            .map(|(i, x)| item.call(x).map_err(|e| e.prepend(PathSegment::Index(i))))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(Error::invalid_type("array", &other, op)),
    })
}

pub(super) fn dict(item: CompiledOperation, op: Operation) -> Step {
    if item.is_noop() {
        return step_fn(move |v| match v {
            Value::Object(_) => Ok(v),
            other => Err(Error::invalid_type("dict", &other, op)),
        });
    }
    step_fn(move |v| match v {
        Value::Object(m) => {
            let mut out = Map::with_capacity(m.len());
            for (k, x) in m {
                let parsed = item.call(x).map_err(|e| e.prepend(PathSegment::Field(k.clone())))?;
                out.insert(k, parsed);
            }
            Ok(Value::Object(out))
        }
        other => Err(Error::invalid_type("dict", &other, op)),
    })
}

fn tuple_items(v: Value, expected: usize, op: Operation) -> Result<Vec<Value>, Error> {
    match v {
        Value::Array(xs) if xs.len() == expected => Ok(xs),
        Value::Array(xs) => Err(Error::at_root(
            Reason::InvalidTupleSize { expected, received: xs.len() },
            op,
        )),
        other => Err(Error::invalid_type("tuple", &other, op)),
    }
}

pub(super) fn tuple(items: Vec<CompiledOperation>, op: Operation) -> Step {
    step_fn(move |v| {
        tuple_items(v, items.len(), op)?
            .into_iter()
            .zip(&items)
            .enumerate()
            .map(|(i, (x, item))| item.call(x).map_err(|e| e.prepend(PathSegment::Index(i))))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    })
}

/// Tries variants in declared order. A variant that needs async checks stops
/// the search: a synchronous run cannot decide it.
pub(super) fn union(variants: Vec<CompiledOperation>, op: Operation) -> Step {
    step_fn(move |v| {
        let mut errors = Vec::with_capacity(variants.len());
        for variant in &variants {
            match variant.call(v.clone()) {
                Ok(out) => return Ok(out),
                Err(e) if e.reason == Reason::UnexpectedAsync => return Err(e),
                Err(e) => errors.push(e),
            }
        }
        Err(Error::union(errors, op))
    })
}

pub(super) fn json(op: Operation) -> Step {
    step_fn(move |v| {
        check_json(&v, op)?;
        Ok(v)
    })
}

fn check_json(v: &Value, op: Operation) -> Result<(), Error> {
    match v {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) if n.is_finite() => Ok(()),
        Value::Array(xs) => xs
            .iter()
            .enumerate()
            .try_for_each(|(i, x)| check_json(x, op).map_err(|e| e.prepend(PathSegment::Index(i)))),
        Value::Object(m) => m
            .iter()
            .try_for_each(|(k, x)| check_json(x, op).map_err(|e| e.prepend(PathSegment::Field(k.clone())))),
        other => Err(Error::invalid_type("JSON", other, op)),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TWO-PHASE PARSE
// ————————————————————————————————————————————————————————————————————————————

pub(super) fn sequence_deferred(item: CompiledOperation, op: Operation) -> AsyncStep {
    async_fn(move |v| match v {
        Value::Array(xs) => {
            let parts = xs
                .into_iter()
                .enumerate()
                .map(|(i, x)| {
                    let outcome = item.phase_one(x).map_err(|e| e.prepend(PathSegment::Index(i)))?;
                    Ok((PathSegment::Index(i), outcome))
                })
                .collect::<Result<Vec<_>, Error>>()?;
            Ok(gather(parts, Value::Array))
        }
        other => Err(Error::invalid_type("array", &other, op)),
    })
}

pub(super) fn dict_deferred(item: CompiledOperation, op: Operation) -> AsyncStep {
    async_fn(move |v| match v {
        Value::Object(m) => {
            let mut keys = Vec::with_capacity(m.len());
            let mut parts = Vec::with_capacity(m.len());
            for (k, x) in m {
                let step = PathSegment::Field(k.clone());
                let outcome = item.phase_one(x).map_err(|e| e.prepend(step.clone()))?;
                parts.push((step, outcome));
                keys.push(k);
            }
            Ok(gather(parts, move |values| Value::Object(keys.into_iter().zip(values).collect())))
        }
        other => Err(Error::invalid_type("dict", &other, op)),
    })
}

pub(super) fn tuple_deferred(items: Vec<CompiledOperation>, op: Operation) -> AsyncStep {
    async_fn(move |v| {
        let parts = tuple_items(v, items.len(), op)?
            .into_iter()
            .zip(&items)
            .enumerate()
            .map(|(i, (x, item))| {
                let outcome = item.phase_one(x).map_err(|e| e.prepend(PathSegment::Index(i)))?;
                Ok((PathSegment::Index(i), outcome))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(gather(parts, Value::Array))
    })
}

// ————————————————————————————————————————————————————————————————————————————
// OBJECTS
// ————————————————————————————————————————————————————————————————————————————

/// Everything an object step needs, captured once at compile time.
pub(super) struct Object {
    fields: IndexMap<String, CompiledOperation>,
    definition: Definition,
    unknown_keys: UnknownKeys,
    op: Operation,
}

impl Object {
    pub(super) fn new(shape: &ObjectShape, child: impl Fn(&Schema) -> CompiledOperation, op: Operation) -> Self {
        Object {
            fields: shape.fields.iter().map(|(name, s)| (name.clone(), child(s))).collect(),
            definition: shape.definition.clone(),
            unknown_keys: shape.unknown_keys,
            op,
        }
    }

    /// Sort an input map into declared-field slots plus undeclared leftovers.
    /// Returns the first excess key when strict.
    fn distribute(&self, input: Map, slots: &mut [Value], extra: &mut Map) -> Option<String> {
        let mut excess = None;
        for (key, value) in input {
            match self.fields.get_index_of(&key) {
                Some(i) => slots[i] = value,
                None => match self.unknown_keys {
                    UnknownKeys::Passthrough => {
                        extra.insert(key, value);
                    }
                    UnknownKeys::Strict => {
                        excess.get_or_insert(key);
                    }
                    UnknownKeys::Strip => {}
                },
            }
        }
        excess
    }

    fn excess(&self, key: String) -> Error {
        Error::at_root(Reason::ExcessField(key.clone()), self.op).prepend(PathSegment::Field(key))
    }

    fn split(&self, v: Value) -> Result<(Vec<Value>, Map, Option<String>), Error> {
        let input = match v {
            Value::Object(m) => m,
            other => return Err(Error::invalid_type("object", &other, self.op)),
        };
        let mut slots = vec![Value::Undefined; self.fields.len()];
        let mut extra = Map::new();
        let excess = self.distribute(input, &mut slots, &mut extra);
        Ok((slots, extra, excess))
    }

    /// Parsed output from parsed field values.
    fn assemble(&self, slots: Vec<Value>, extra: Map) -> Value {
        if !self.definition.is_identity() {
            return self.definition.build(&slots);
        }
        let mut out = Map::with_capacity(slots.len() + extra.len());
        for (name, value) in self.fields.keys().zip(slots) {
            if !value.is_undefined() {
                out.insert(name.clone(), value);
            }
        }
        out.extend(extra);
        Value::Object(out)
    }

    pub(super) fn parser(self) -> Step {
        step_fn(move |v| {
            let (mut slots, extra, excess) = self.split(v)?;
            for (slot, (name, field)) in slots.iter_mut().zip(&self.fields) {
                *slot = field
                    .call(std::mem::take(slot))
                    .map_err(|e| e.prepend(PathSegment::Field(name.clone())))?;
            }
            if let Some(key) = excess {
                return Err(self.excess(key));
            }
            Ok(self.assemble(slots, extra))
        })
    }

    pub(super) fn deferred_parser(self) -> AsyncStep {
        let object = Arc::new(self);
        async_fn(move |v| {
            let (slots, extra, excess) = object.split(v)?;
            let mut parts = Vec::with_capacity(slots.len());
            for (slot, (name, field)) in slots.into_iter().zip(&object.fields) {
                let step = PathSegment::Field(name.clone());
                let outcome = field.phase_one(slot).map_err(|e| e.prepend(step.clone()))?;
                parts.push((step, outcome));
            }
            if let Some(key) = excess {
                return Err(object.excess(key));
            }
            let object = object.clone();
            Ok(gather(parts, move |slots| object.assemble(slots, extra)))
        })
    }

    pub(super) fn serializer(self) -> Step {
        step_fn(move |v| {
            let mut slots = vec![Value::Undefined; self.fields.len()];
            let mut extra = Map::new();
            let mut excess = None;
            if self.definition.is_identity() {
                match v {
                    Value::Object(m) => excess = self.distribute(m, &mut slots, &mut extra),
                    other => return Err(Error::invalid_type("object", &other, self.op)),
                }
            } else {
                self.definition.scatter(v, &mut slots, self.op)?;
            }

            let mut out = Map::with_capacity(slots.len() + extra.len());
            for (slot, (name, field)) in slots.into_iter().zip(&self.fields) {
                let raw = field.call(slot).map_err(|e| e.prepend(PathSegment::Field(name.clone())))?;
                if !raw.is_undefined() {
                    out.insert(name.clone(), raw);
                }
            }
            if let Some(key) = excess {
                return Err(self.excess(key));
            }
            out.extend(extra);
            Ok(Value::Object(out))
        })
    }
}
