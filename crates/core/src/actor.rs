use serde::{Deserialize, Serialize};

/// Identity of the caller performing an operation.
///
/// The transport layer owns authentication; this core only records who acted
/// so audit columns and history entries carry a stable subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    subject: String,
    display_name: String,
}

impl Actor {
    /// Creates an actor from a subject claim and display name.
    #[must_use]
    pub fn new(subject: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the stable subject recorded in audit columns.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the current caller.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }
}
