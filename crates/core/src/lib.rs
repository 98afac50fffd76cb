//! Shared primitives for all Rust crates in Caseforge.

#![forbid(unsafe_code)]

/// Request-scoped actor identity recorded on every mutation.
pub mod actor;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use actor::Actor;

/// Result type used across Caseforge crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

macro_rules! storage_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(i64);

        impl $name {
            /// Wraps a storage-assigned row identifier.
            #[must_use]
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            #[must_use]
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

storage_id!(
    /// Identifier of a case template.
    TemplateId
);
storage_id!(
    /// Identifier of a lookup data table.
    DataTableId
);
storage_id!(
    /// Identifier of a case instance.
    CaseId
);
storage_id!(
    /// Identifier of a data-table record.
    RecordId
);

/// Generated, unique, human-readable case identifier.
///
/// Formatted as `CASE-{n:06}` from a monotonically reserved sequence value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseNumber(String);

impl CaseNumber {
    /// Formats a case number from a reserved sequence value.
    pub fn from_sequence(value: i64) -> AppResult<Self> {
        if value <= 0 {
            return Err(AppError::Validation(format!(
                "case number sequence value must be positive, got {value}"
            )));
        }

        Ok(Self(format!("CASE-{value:06}")))
    }

    /// Restores a case number from its persisted text form.
    pub fn from_stored(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let digits = value.strip_prefix("CASE-").unwrap_or_default();
        if digits.len() < 6 || !digits.chars().all(|character| character.is_ascii_digit()) {
            return Err(AppError::Validation(format!(
                "malformed case number '{value}'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the formatted case number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CaseNumber {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state, e.g. a duplicate name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Delete blocked because other records still reference the resource.
    #[error("in use: {0}")]
    InUse(String),

    /// Dependency evaluation rejected a case payload.
    #[error("case data validation failed: {}", errors.join("; "))]
    CaseDataInvalid {
        /// Field-level validation messages.
        errors: Vec<String>,
    },

    /// Underlying storage or serialization fault.
    #[error("storage error: {0}")]
    Storage(String),
}
