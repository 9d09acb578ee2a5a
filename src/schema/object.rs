//! Object shapes: declared fields, their output layout, and the unknown-key policy.
use indexmap::IndexMap;

use crate::error::{Error, Operation, Reason, SchemaError};
use crate::path::PathSegment;
use crate::schema::Schema;
use crate::value::Value;

/// What happens to keys the object does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnknownKeys {
    /// Kept as-is in both directions.
    #[default]
    Passthrough,
    /// Rejected with an excess-field error.
    Strict,
    /// Dropped on parse, never re-emitted on serialize.
    Strip,
}

/// Placeholder returned by [`ObjectBuilder::field`]; stands for the parsed field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef(pub(crate) usize);

/// Layout of the parsed output, in terms of field placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// Every declared field under its own name.
    Fields,
    Field(FieldRef),
    Object(Vec<(String, Definition)>),
    Tuple(Vec<Definition>),
    Constant(Value),
}

impl Definition {
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Definition)>) -> Self {
        Definition::Object(entries.into_iter().map(|(k, d)| (k.into(), d)).collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Definition>) -> Self {
        Definition::Tuple(items.into_iter().collect())
    }

    pub fn constant(value: impl Into<Value>) -> Self { Definition::Constant(value.into()) }

    pub fn is_identity(&self) -> bool { matches!(self, Definition::Fields) }

    /// Fill the layout from parsed field values.
    pub(crate) fn build(&self, parsed: &[Value]) -> Value {
        match self {
            Definition::Fields => Value::Undefined,
            Definition::Field(r) => parsed.get(r.0).cloned().unwrap_or_default(),
            Definition::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, d)| (k.clone(), d.build(parsed)))
                    .filter(|(_, v)| !v.is_undefined())
                    .collect(),
            ),
            Definition::Tuple(items) => Value::Array(items.iter().map(|d| d.build(parsed)).collect()),
            Definition::Constant(v) => v.clone(),
        }
    }

    /// Inverse of `build`: pull each field's typed value back out of a
    /// restructured value. A placeholder used twice keeps its first value.
    pub(crate) fn scatter(&self, value: Value, slots: &mut [Value], op: Operation) -> Result<(), Error> {
        match self {
            Definition::Fields | Definition::Constant(_) => Ok(()),
            Definition::Field(r) => {
                if let Some(slot) = slots.get_mut(r.0) {
                    if slot.is_undefined() {
                        *slot = value;
                    }
                }
                Ok(())
            }
            Definition::Object(entries) => match value {
                Value::Object(mut m) => entries.iter().try_for_each(|(k, d)| {
                    let v = m.swap_remove(k).unwrap_or_default();
                    d.scatter(v, slots, op).map_err(|e| e.prepend(PathSegment::Field(k.clone())))
                }),
                other => Err(Error::invalid_type("object", &other, op)),
            },
            Definition::Tuple(items) => match value {
                Value::Array(xs) if xs.len() == items.len() => {
                    xs.into_iter().zip(items).enumerate().try_for_each(|(i, (x, d))| {
                        d.scatter(x, slots, op).map_err(|e| e.prepend(PathSegment::Index(i)))
                    })
                }
                Value::Array(xs) => Err(Error::at_root(
                    Reason::InvalidTupleSize { expected: items.len(), received: xs.len() },
                    op,
                )),
                other => Err(Error::invalid_type("tuple", &other, op)),
            },
        }
    }
}

impl From<()> for Definition {
    fn from(_: ()) -> Self { Definition::Fields }
}

impl From<FieldRef> for Definition {
    fn from(r: FieldRef) -> Self { Definition::Field(r) }
}

/// Field registrar handed to the `object` builder callback.
#[derive(Default)]
pub struct ObjectBuilder {
    fields: IndexMap<String, Schema>,
    duplicate: Option<String>,
}

impl ObjectBuilder {
    pub fn field(&mut self, name: impl Into<String>, schema: Schema) -> FieldRef {
        let name = name.into();
        if let Some(index) = self.fields.get_index_of(&name) {
            self.duplicate.get_or_insert(name);
            return FieldRef(index);
        }
        let (index, _) = self.fields.insert_full(name, schema);
        FieldRef(index)
    }

    pub(crate) fn finish(self, definition: Definition) -> Result<ObjectShape, SchemaError> {
        if let Some(name) = self.duplicate {
            return Err(SchemaError::DuplicateField(name));
        }
        Ok(ObjectShape { fields: self.fields, definition, unknown_keys: UnknownKeys::default() })
    }
}

#[derive(Clone, PartialEq)]
pub struct ObjectShape {
    pub(crate) fields: IndexMap<String, Schema>,
    pub(crate) definition: Definition,
    pub(crate) unknown_keys: UnknownKeys,
}

impl ObjectShape {
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.fields.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn definition(&self) -> &Definition { &self.definition }

    pub fn unknown_keys(&self) -> UnknownKeys { self.unknown_keys }

    pub(crate) fn with_unknown_keys(&self, unknown_keys: UnknownKeys) -> Self {
        Self { unknown_keys, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{integer, string};

    #[test]
    fn duplicate_fields_are_rejected_at_finish() {
        let mut o = ObjectBuilder::default();
        let a = o.field("a", string());
        let again = o.field("a", integer());
        assert_eq!(a, again);
        assert_eq!(o.finish(Definition::Fields).err(), Some(SchemaError::DuplicateField("a".into())));
    }

    #[test]
    fn definition_builds_restructured_output() {
        let mut o = ObjectBuilder::default();
        let first = o.field("first_name", string());
        let age = o.field("age", integer());
        let def = Definition::object([
            ("name", Definition::from(first)),
            ("meta", Definition::tuple([age.into(), Definition::constant("v1")])),
        ]);
        let out = def.build(&[Value::from("Ada"), Value::from(36)]);
        assert_eq!(out, Value::from(serde_json::json!({"name": "Ada", "meta": [36, "v1"]})));
    }
}
