//! Error taxonomy for the reactive graph.
//!
//! The propagator itself never throws for the `NotReady` case; that is
//! modeled as a variant of [`UpdateOutcome`] threaded through `update` /
//! `update_if_necessary` (see `crate::propagator`) and only converted into a
//! [`ReactiveError`] at an outermost public boundary such as a synchronous
//! read performed outside a stale-values-allowed context.

use std::any::Any;
use std::fmt;

/// Errors surfaced across the public API.
#[derive(thiserror::Error)]
pub enum ReactiveError {
    /// A context or cleanup operation was attempted with no current owner.
    #[error("no owner is currently active")]
    NoOwner,

    /// `get_context` found no value for the given key and no default was
    /// registered.
    #[error("no context value found for `{type_name}`")]
    ContextNotFound { type_name: &'static str },

    /// A source reported that its value is not yet available.
    #[error("value not ready")]
    NotReady,

    /// A compute function panicked or returned an error; the payload is
    /// preserved for handlers further up the chain.
    #[error("error while computing a reactive node")]
    Compute(Box<dyn Any + Send>),
}

impl fmt::Debug for ReactiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactiveError::NoOwner => write!(f, "NoOwner"),
            ReactiveError::ContextNotFound { type_name } => {
                write!(f, "ContextNotFound({type_name})")
            }
            ReactiveError::NotReady => write!(f, "NotReady"),
            ReactiveError::Compute(_) => write!(f, "Compute(..)"),
        }
    }
}

impl ReactiveError {
    pub fn compute(payload: Box<dyn Any + Send>) -> Self {
        ReactiveError::Compute(payload)
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, ReactiveError::NotReady)
    }

    /// Convert into a panic payload suitable for
    /// [`std::panic::resume_unwind`]. A `Compute` error's original payload
    /// is passed through unchanged; every other variant is boxed from its
    /// `Display` message, since there is no panic to resurrect.
    pub(crate) fn into_payload(self) -> Box<dyn Any + Send> {
        match self {
            ReactiveError::Compute(payload) => payload,
            other => Box::new(other.to_string()),
        }
    }
}

pub type ReactiveResult<T> = Result<T, ReactiveError>;
