//! Entry points over compiled operations.
//!
//! Non-raising calls return the structured [`Error`]; the `*_or_raise` forms
//! return a [`StructError`] holding the same rendered message.
use futures::future::{AbortRegistration, Abortable};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error as ThisError;

use crate::compile::OperationKind;
use crate::error::{AsyncParseError, Error, StructError};
use crate::schema::Schema;
use crate::value::Value;

pub fn parse(schema: &Schema, input: impl Into<Value>) -> Result<Value, Error> {
    schema.operation(OperationKind::Parse).run(input.into())
}

pub fn parse_or_raise(schema: &Schema, input: impl Into<Value>) -> Result<Value, StructError> {
    parse(schema, input).map_err(StructError::from)
}

/// Two-phase parse when the schema has async checks, plain parse otherwise.
pub async fn parse_async(schema: &Schema, input: impl Into<Value>) -> Result<Value, Error> {
    if !schema.is_async() {
        return parse(schema, input);
    }
    schema.operation(OperationKind::ParseAsync).run_async(input.into()).await
}

/// Like [`parse_async`], but stops as soon as the paired `AbortHandle` fires.
/// Checks still in flight are dropped and no value is produced.
pub async fn parse_async_abortable(
    schema: &Schema,
    input: impl Into<Value>,
    registration: AbortRegistration,
) -> Result<Value, AsyncParseError> {
    match Abortable::new(parse_async(schema, input), registration).await {
        Ok(result) => result.map_err(AsyncParseError::Invalid),
        Err(_aborted) => Err(AsyncParseError::Aborted),
    }
}

pub fn serialize(schema: &Schema, value: impl Into<Value>) -> Result<Value, Error> {
    schema.operation(OperationKind::Serialize).run(value.into())
}

pub fn serialize_or_raise(schema: &Schema, value: impl Into<Value>) -> Result<Value, StructError> {
    serialize(schema, value).map_err(StructError::from)
}

/// Same validation as [`parse`]; the parsed value is discarded.
pub fn assert(schema: &Schema, input: impl Into<Value>) -> Result<(), Error> {
    schema.operation(OperationKind::Assert).run(input.into()).map(drop)
}

pub fn description(schema: &Schema) -> Option<&str> { schema.description() }

#[derive(Debug, ThisError)]
pub enum TypedError {
    #[error(transparent)]
    Invalid(#[from] Error),
    #[error("at JSON path {path} → {message}")]
    Deserialize { path: String, message: String },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Parse, then deserialize the result into `T` with path context on failure.
pub fn parse_into<T: DeserializeOwned>(schema: &Schema, input: impl Into<Value>) -> Result<T, TypedError> {
    let parsed = parse(schema, input)?;
    let json = parsed.into_json().unwrap_or(serde_json::Value::Null);
    serde_path_to_error::deserialize::<_, T>(json).map_err(|err| TypedError::Deserialize {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// Serialize a host value through `schema`.
pub fn serialize_from<T: Serialize>(schema: &Schema, value: &T) -> Result<Value, TypedError> {
    let typed = Value::from(serde_json::to_value(value)?);
    Ok(serialize(schema, typed)?)
}
