//! Tagged results of author-gated operations.
//!
//! Services never turn ownership failures into errors: the HTTP layer decides
//! where a non-owner is sent.

use crate::application::forms::FormErrors;

/// Result of loading a record for an author-only page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate<T> {
    Owner(T),
    NotOwner,
}

/// Result of a mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    Applied(T),
    NotOwner,
    Invalid(FormErrors),
}

/// A form submission that either produced a value or was rejected with field errors.
pub type Submission<T> = Result<T, FormErrors>;
