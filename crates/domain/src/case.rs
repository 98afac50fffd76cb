use std::str::FromStr;

use caseforge_core::{AppError, AppResult, CaseId, CaseNumber, NonEmptyString, TemplateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle states of a case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Saved but not submitted.
    #[default]
    Draft,
    /// Submitted and awaiting triage.
    Open,
    /// Being worked on.
    InProgress,
    /// Waiting on an external party.
    Pending,
    /// Work completed, awaiting closure.
    Resolved,
    /// Closed.
    Closed,
    /// Abandoned before resolution.
    Cancelled,
    /// Raised beyond normal handling.
    Escalated,
}

impl CaseStatus {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Escalated => "escalated",
        }
    }
}

impl FromStr for CaseStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(Self::Draft),
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            "escalated" => Ok(Self::Escalated),
            _ => Err(AppError::Validation(format!(
                "unknown case status '{value}'"
            ))),
        }
    }
}

/// Priority levels of a case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    /// Lowest urgency.
    Low,
    /// Default urgency.
    #[default]
    Medium,
    /// Elevated urgency.
    High,
    /// Needs prompt attention.
    Urgent,
    /// Highest urgency.
    Critical,
}

impl CasePriority {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for CasePriority {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            "critical" => Ok(Self::Critical),
            _ => Err(AppError::Validation(format!(
                "unknown case priority '{value}'"
            ))),
        }
    }
}

/// Kinds of case-affecting mutations recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Case was created.
    Created,
    /// Case row was updated.
    Updated,
    /// Status transitioned.
    StatusChanged,
    /// Assignee changed.
    Assigned,
    /// Comment appended.
    CommentAdded,
    /// Attachment appended.
    AttachmentAdded,
    /// One case-data field changed.
    FieldChanged,
}

impl HistoryAction {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::Assigned => "assigned",
            Self::CommentAdded => "comment_added",
            Self::AttachmentAdded => "attachment_added",
            Self::FieldChanged => "field_changed",
        }
    }
}

impl FromStr for HistoryAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "status_changed" => Ok(Self::StatusChanged),
            "assigned" => Ok(Self::Assigned),
            "comment_added" => Ok(Self::CommentAdded),
            "attachment_added" => Ok(Self::AttachmentAdded),
            "field_changed" => Ok(Self::FieldChanged),
            _ => Err(AppError::Validation(format!(
                "unknown history action '{value}'"
            ))),
        }
    }
}

/// Constituent parts of a case, used to build the validated aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseParts {
    /// Storage-assigned identifier.
    pub id: CaseId,
    /// Generated unique case number.
    pub case_number: CaseNumber,
    /// Template the case was created from.
    pub template_id: TemplateId,
    /// Case title.
    pub title: String,
    /// Case description.
    pub description: String,
    /// Lifecycle state.
    pub status: CaseStatus,
    /// Priority level.
    pub priority: CasePriority,
    /// Current assignee subject, when assigned.
    pub assigned_to: Option<String>,
    /// Field-id-keyed submitted payload.
    pub case_data: Value,
    /// Free-form metadata object.
    pub metadata: Value,
    /// Comma-separated tag list.
    pub tags: String,
    /// Optional due date string.
    pub due_date: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: Option<DateTime<Utc>>,
    /// Subject that created the case.
    pub created_by: String,
    /// Subject that last modified the case.
    pub last_modified_by: Option<String>,
}

/// One instance of data submitted against a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    id: CaseId,
    case_number: CaseNumber,
    template_id: TemplateId,
    title: NonEmptyString,
    description: String,
    status: CaseStatus,
    priority: CasePriority,
    assigned_to: Option<String>,
    case_data: Value,
    metadata: Value,
    tags: String,
    due_date: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    created_by: String,
    last_modified_by: Option<String>,
}

impl Case {
    /// Creates a validated case aggregate.
    pub fn new(parts: CaseParts) -> AppResult<Self> {
        let CaseParts {
            id,
            case_number,
            template_id,
            title,
            description,
            status,
            priority,
            assigned_to,
            case_data,
            metadata,
            tags,
            due_date,
            created_at,
            updated_at,
            created_by,
            last_modified_by,
        } = parts;

        if !case_data.is_object() {
            return Err(AppError::Validation(
                "case_data must be a JSON object".to_owned(),
            ));
        }

        if !metadata.is_object() {
            return Err(AppError::Validation(
                "case metadata must be a JSON object".to_owned(),
            ));
        }

        Ok(Self {
            id,
            case_number,
            template_id,
            title: NonEmptyString::new(title)?,
            description,
            status,
            priority,
            assigned_to,
            case_data,
            metadata,
            tags,
            due_date,
            created_at,
            updated_at,
            created_by,
            last_modified_by,
        })
    }

    /// Returns the storage-assigned identifier.
    #[must_use]
    pub fn id(&self) -> CaseId {
        self.id
    }

    /// Returns the generated case number.
    #[must_use]
    pub fn case_number(&self) -> &CaseNumber {
        &self.case_number
    }

    /// Returns the source template identifier.
    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.template_id
    }

    /// Returns the case title.
    #[must_use]
    pub fn title(&self) -> &NonEmptyString {
        &self.title
    }

    /// Returns the case description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn status(&self) -> CaseStatus {
        self.status
    }

    /// Returns the priority level.
    #[must_use]
    pub fn priority(&self) -> CasePriority {
        self.priority
    }

    /// Returns the current assignee, when assigned.
    #[must_use]
    pub fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    /// Returns the field-id-keyed payload.
    #[must_use]
    pub fn case_data(&self) -> &Value {
        &self.case_data
    }

    /// Returns the free-form metadata object.
    #[must_use]
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Returns the comma-separated tag list.
    #[must_use]
    pub fn tags(&self) -> &str {
        self.tags.as_str()
    }

    /// Returns the optional due date.
    #[must_use]
    pub fn due_date(&self) -> Option<&str> {
        self.due_date.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Returns the creating subject.
    #[must_use]
    pub fn created_by(&self) -> &str {
        self.created_by.as_str()
    }

    /// Returns the last modifying subject.
    #[must_use]
    pub fn last_modified_by(&self) -> Option<&str> {
        self.last_modified_by.as_deref()
    }
}

/// One append-only audit entry recording a case-affecting mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseHistoryEntry {
    /// Case the entry belongs to.
    pub case_id: CaseId,
    /// Kind of mutation.
    pub action: HistoryAction,
    /// Affected field identifier, for field-level changes.
    pub field_name: Option<String>,
    /// Stringified previous value.
    pub old_value: Option<String>,
    /// Stringified new value.
    pub new_value: Option<String>,
    /// Free-text comment.
    pub comment: Option<String>,
    /// Entry timestamp.
    pub created_at: DateTime<Utc>,
    /// Acting subject.
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use caseforge_core::{CaseId, CaseNumber, TemplateId};
    use chrono::Utc;
    use serde_json::json;

    use super::{Case, CaseParts, CasePriority, CaseStatus};

    fn parts() -> CaseParts {
        CaseParts {
            id: CaseId::new(1),
            case_number: CaseNumber::from_sequence(1).unwrap_or_else(|_| unreachable!()),
            template_id: TemplateId::new(1),
            title: "Broken laptop".to_owned(),
            description: String::new(),
            status: CaseStatus::default(),
            priority: CasePriority::default(),
            assigned_to: None,
            case_data: json!({"category": "HW"}),
            metadata: json!({}),
            tags: String::new(),
            due_date: None,
            created_at: Utc::now(),
            updated_at: None,
            created_by: "admin".to_owned(),
            last_modified_by: None,
        }
    }

    #[test]
    fn defaults_are_draft_and_medium() {
        assert_eq!(CaseStatus::default(), CaseStatus::Draft);
        assert_eq!(CasePriority::default(), CasePriority::Medium);
    }

    #[test]
    fn case_requires_object_payload() {
        let mut invalid = parts();
        invalid.case_data = json!("not-object");
        assert!(Case::new(invalid).is_err());
    }

    #[test]
    fn case_requires_title() {
        let mut invalid = parts();
        invalid.title = "  ".to_owned();
        assert!(Case::new(invalid).is_err());
    }

    #[test]
    fn status_round_trips_storage_values() {
        for status in [
            CaseStatus::Draft,
            CaseStatus::Open,
            CaseStatus::InProgress,
            CaseStatus::Pending,
            CaseStatus::Resolved,
            CaseStatus::Closed,
            CaseStatus::Cancelled,
            CaseStatus::Escalated,
        ] {
            let parsed: CaseStatus = status.as_str().parse().unwrap_or_else(|_| unreachable!());
            assert_eq!(parsed, status);
        }
    }
}
