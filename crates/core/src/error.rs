//! Errors raised while reading caller input, before any remote call.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was blank after trimming.
    #[error("{kind} cannot be empty")]
    EmptyId { kind: &'static str },
}
