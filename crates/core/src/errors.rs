use thiserror::Error;

/// Failures of core invariants. Everything else in this crate degrades
/// locally: lookup misses return `None` and the caller drops the intent.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
