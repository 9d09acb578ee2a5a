pub mod value;
pub mod path;
pub mod error;
pub mod schema;
pub mod compile;
pub mod api;
pub mod ir;
pub mod lower;

pub use api::{
    assert, description, parse, parse_async, parse_async_abortable, parse_into, parse_or_raise, serialize,
    serialize_from, serialize_or_raise, TypedError,
};
pub use compile::{CompiledOperation, OperationKind};
pub use error::{AsyncParseError, Error, Operation, Reason, SchemaError, StructError};
pub use path::{Path, PathSegment};
pub use schema::{
    array, bool, custom, dict, float, integer, json, list, literal, nan, never, nullable, object, option, record,
    string, tuple, union, unit, unknown, Definition, FieldRef, Kind, ObjectBuilder, Schema, UnknownKeys,
};
pub use value::{Map, Value};
