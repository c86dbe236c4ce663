//! Structural validation of scheduling instances.
//!
//! [`Instance`] mutations already reject negative durations and bad
//! positions. This pass checks the remaining properties the model builder
//! relies on:
//! - Every operation's job and resource are registered members
//! - Each job visits a resource at most once
//!
//! All problems are collected rather than stopping at the first one.
//! Jobs without operations are legal.

use rustc_hash::FxHashSet;

use crate::models::Instance;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A job visits the same resource more than once.
    RepeatedResource,
    /// An operation references a resource that isn't registered.
    InvalidResourceReference,
    /// An operation's job differs from the job whose route owns it.
    InvalidJobReference,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates an instance before model construction.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_instance(instance: &Instance) -> ValidationResult {
    let mut errors = Vec::new();

    for (job, route) in instance.routes() {
        let mut visited = FxHashSet::default();
        for (position, op) in route.iter().enumerate() {
            if op.job != job {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidJobReference,
                    format!("Operation {position} in route of job '{job}' belongs to job '{}'", op.job),
                ));
            }
            if !instance.contains_resource(&op.resource) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidResourceReference,
                    format!("Job '{job}' references unknown resource '{}'", op.resource),
                ));
            }
            if !visited.insert(op.resource.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::RepeatedResource,
                    format!("Job '{job}' visits resource '{}' more than once", op.resource),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
