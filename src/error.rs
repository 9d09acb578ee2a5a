//! Structured failures: what went wrong, during which operation, and where.
use std::fmt;

use thiserror::Error;

use crate::path::{Path, PathSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Parse,
    Serialize,
    Assert,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Parse => "parsing",
            Operation::Serialize => "serializing",
            Operation::Assert => "asserting",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Reason {
    #[error("Expected {expected}, received {received}")]
    InvalidType { expected: String, received: String },
    #[error("Expected {expected}, received {received}")]
    InvalidLiteral { expected: String, received: String },
    #[error("Expected Tuple with {expected} items, received {received}")]
    InvalidTupleSize { expected: usize, received: usize },
    #[error("Encountered disallowed excess key \"{0}\" on an object")]
    ExcessField(String),
    #[error("{0}")]
    OperationFailed(String),
    #[error("{}", render_union(.0))]
    InvalidUnion(Vec<Error>),
    #[error("Encountered unexpected asynchronous transform or refine. Use parse_async instead")]
    UnexpectedAsync,
    #[error("The schema doesn't have a serializer")]
    MissingSerializer,
}

fn render_union(errors: &[Error]) -> String {
    let mut s = String::from("Invalid union with following errors:");
    for e in errors {
        s.push_str("\n- ");
        s.push_str(&e.to_string());
    }
    s
}

/// A failure detected at `path` while running `operation`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Failed {operation} at {path}. Reason: {reason}")]
pub struct Error {
    pub operation: Operation,
    pub path: Path,
    pub reason: Reason,
}

impl Error {
    pub fn new(reason: Reason, operation: Operation, path: Path) -> Self {
        Self { operation, path, reason }
    }

    /// Error at the root of the node that detected it.
    pub fn at_root(reason: Reason, operation: Operation) -> Self {
        Self::new(reason, operation, Path::empty())
    }

    /// Aggregate of every failed union variant, reported at the union's own location.
    pub fn union(errors: Vec<Error>, operation: Operation) -> Self {
        Self::at_root(Reason::InvalidUnion(errors), operation)
    }

    pub fn message(&self) -> String { self.to_string() }

    /// Called by each enclosing container on the way out.
    pub fn prepend(mut self, step: PathSegment) -> Self {
        self.path = self.path.prepend(step);
        self
    }

    pub(crate) fn invalid_type(expected: impl Into<String>, received: &crate::value::Value, operation: Operation) -> Self {
        Self::at_root(
            Reason::InvalidType { expected: expected.into(), received: received.kind().to_owned() },
            operation,
        )
    }
}

/// What the raising entry points return: only the rendered message survives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StructError(pub String);

impl From<Error> for StructError {
    fn from(e: Error) -> Self { StructError(e.message()) }
}

/// Outcome of an asynchronous parse that did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AsyncParseError {
    #[error(transparent)]
    Invalid(#[from] Error),
    #[error("asynchronous parse was aborted")]
    Aborted,
}

/// Programming errors raised while building a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Failed to create a NaN literal schema. Use nan() instead")]
    NanLiteral,
    #[error("The value provided to the literal schema factory is not supported: {0}")]
    UnsupportedLiteral(String),
    #[error("The field \"{0}\" is defined multiple times")]
    DuplicateField(String),
    #[error("A union schema needs at least one variant")]
    EmptyUnion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_embeds_operation_path_and_reason() {
        let e = Error::new(
            Reason::InvalidType { expected: "string".into(), received: "number".into() },
            Operation::Parse,
            Path::field("name"),
        );
        assert_eq!(e.message(), "Failed parsing at .name. Reason: Expected string, received number");
    }

    #[test]
    fn identical_inputs_render_identically() {
        let make = || Error::new(Reason::OperationFailed("Should be positive".into()), Operation::Serialize, Path::empty());
        assert_eq!(make().message(), make().message());
        assert_eq!(make().message(), "Failed serializing at root. Reason: Should be positive");
    }

    #[test]
    fn union_keeps_every_branch_message() {
        let a = Error::at_root(Reason::InvalidLiteral { expected: "\"a\"".into(), received: "\"b\"".into() }, Operation::Parse);
        let b = Error::at_root(Reason::ExcessField("x".into()), Operation::Parse).prepend(PathSegment::Field("x".into()));
        let u = Error::union(vec![a.clone(), b.clone()], Operation::Parse);
        let msg = u.message();
        assert!(msg.starts_with("Failed parsing at root. Reason: Invalid union with following errors:"));
        assert!(msg.contains(&format!("- {}", a.message())));
        assert!(msg.contains(&format!("- {}", b.message())));
    }

    #[test]
    fn raising_form_carries_the_same_message() {
        let e = Error::at_root(Reason::UnexpectedAsync, Operation::Assert);
        assert_eq!(StructError::from(e.clone()).to_string(), e.message());
    }
}
