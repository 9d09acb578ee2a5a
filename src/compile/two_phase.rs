//! Asynchronous parsing in two phases.
//!
//! Phase one is the synchronous call of an async step: it performs every
//! structural check and either finishes with a value or hands back the part of
//! the work that has to wait on async checks. Phase two drives those deferred
//! parts. Containers join their children's deferred parts concurrently; the
//! first failure wins and the remaining ones are dropped unfinished. Anything
//! declared after an async check (refine, transform, union fallback) is chained
//! onto the settled value, never run ahead of it.
use std::sync::Arc;

use futures::future::{self, try_join_all, BoxFuture};
use futures::FutureExt;

use super::CompiledOperation;
use crate::error::{Error, Operation};
use crate::path::PathSegment;
use crate::value::Value;

pub(crate) type AsyncStep = Arc<dyn Fn(Value) -> Result<Outcome, Error> + Send + Sync>;

/// Result of phase one.
pub enum Outcome {
    Ready(Value),
    Deferred(BoxFuture<'static, Result<Value, Error>>),
}

impl Outcome {
    pub fn is_ready(&self) -> bool { matches!(self, Outcome::Ready(_)) }

    fn into_ready(self) -> Option<Value> {
        match self {
            Outcome::Ready(v) => Some(v),
            Outcome::Deferred(_) => None,
        }
    }

    pub fn into_future(self) -> BoxFuture<'static, Result<Value, Error>> {
        match self {
            Outcome::Ready(v) => future::ready(Ok(v)).boxed(),
            Outcome::Deferred(f) => f,
        }
    }

    pub async fn settle(self) -> Result<Value, Error> { self.into_future().await }

    /// Run `next` on the final value: now if it is ready, after settling otherwise.
    pub(crate) fn then<F>(self, next: F) -> Result<Outcome, Error>
    where
        F: FnOnce(Value) -> Result<Value, Error> + Send + 'static,
    {
        match self {
            Outcome::Ready(v) => next(v).map(Outcome::Ready),
            Outcome::Deferred(f) => Ok(Outcome::Deferred(async move { next(f.await?) }.boxed())),
        }
    }
}

pub(crate) fn async_fn<F>(f: F) -> AsyncStep
where
    F: Fn(Value) -> Result<Outcome, Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Combine the children of one container. Stays synchronous when every child is ready.
pub(crate) fn gather<F>(parts: Vec<(PathSegment, Outcome)>, finish: F) -> Outcome
where
    F: FnOnce(Vec<Value>) -> Value + Send + 'static,
{
    if parts.iter().all(|(_, o)| o.is_ready()) {
        return Outcome::Ready(finish(parts.into_iter().filter_map(|(_, o)| o.into_ready()).collect()));
    }
    tracing::trace!(parts = parts.len(), "deferring container until async checks settle");
    let settling = try_join_all(
        parts
            .into_iter()
            .map(|(step, outcome)| async move { outcome.settle().await.map_err(|e| e.prepend(step)) }),
    );
    Outcome::Deferred(async move { Ok(finish(settling.await?)) }.boxed())
}

/// First variant, in declared order, whose parse fully succeeds wins; async
/// checks included. A variant whose checks fail hands over to the next one.
pub(super) fn union(variants: Vec<CompiledOperation>, op: Operation) -> AsyncStep {
    let variants: Arc<[CompiledOperation]> = variants.into();
    async_fn(move |v| {
        let mut errors = Vec::with_capacity(variants.len());
        for (i, variant) in variants.iter().enumerate() {
            match variant.phase_one(v.clone()) {
                Ok(Outcome::Ready(out)) => return Ok(Outcome::Ready(out)),
                Ok(Outcome::Deferred(candidate)) => {
                    let rest = variants.clone();
                    return Ok(Outcome::Deferred(settle_union(rest, i + 1, candidate, v, errors, op).boxed()));
                }
                Err(e) => errors.push(e),
            }
        }
        Err(Error::union(errors, op))
    })
}

async fn settle_union(
    variants: Arc<[CompiledOperation]>,
    next: usize,
    candidate: BoxFuture<'static, Result<Value, Error>>,
    input: Value,
    mut errors: Vec<Error>,
    op: Operation,
) -> Result<Value, Error> {
    match candidate.await {
        Ok(out) => return Ok(out),
        Err(e) => errors.push(e),
    }
    for variant in &variants[next..] {
        let attempt = match variant.phase_one(input.clone()) {
            Ok(outcome) => outcome.settle().await,
            Err(e) => Err(e),
        };
        match attempt {
            Ok(out) => return Ok(out),
            Err(e) => errors.push(e),
        }
    }
    Err(Error::union(errors, op))
}
