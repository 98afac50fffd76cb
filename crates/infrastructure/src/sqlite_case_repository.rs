use std::str::FromStr;

use async_trait::async_trait;
use caseforge_application::{CaseListFilter, CaseRepository, NewCaseRecord};
use caseforge_core::{AppError, AppResult, CaseId, CaseNumber, TemplateId};
use caseforge_domain::{
    Case, CaseHistoryEntry, CaseParts, CasePriority, CaseStatus, HistoryAction,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};


/// SQLite-backed case repository with the append-only audit trail.
#[derive(Clone)]
pub struct SqliteCaseRepository {
    pool: SqlitePool,
}

impl SqliteCaseRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CaseRow {
    id: i64,
    case_number: String,
    template_id: i64,
    title: String,
    description: String,
    status: String,
    priority: String,
    assigned_to: Option<String>,
    case_data: String,
    metadata: String,
    tags: String,
    due_date: Option<String>,
    created_at: String,
    updated_at: Option<String>,
    created_by: String,
    last_modified_by: Option<String>,
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    case_id: i64,
    action_type: String,
    field_name: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    comment: Option<String>,
    created_at: String,
    created_by: String,
}

const CASE_COLUMNS: &str = "id, case_number, template_id, title, description, status, priority, \
     assigned_to, case_data, metadata, tags, due_date, created_at, updated_at, created_by, \
     last_modified_by";

fn storage_fault(context: &str, error: impl std::fmt::Display) -> AppError {
    tracing::error!("{context}: {error}");
    AppError::Storage(format!("{context}: {error}"))
}

fn parse_timestamp(text: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| storage_fault(format!("malformed timestamp '{text}'").as_str(), error))
}

fn case_from_row(row: CaseRow) -> AppResult<Case> {
    let case_data: Value = serde_json::from_str(row.case_data.as_str())
        .map_err(|error| storage_fault("persisted case_data is invalid", error))?;
    let metadata: Value = serde_json::from_str(row.metadata.as_str())
        .map_err(|error| storage_fault("persisted case metadata is invalid", error))?;

    Case::new(CaseParts {
        id: CaseId::new(row.id),
        case_number: CaseNumber::from_stored(row.case_number)?,
        template_id: TemplateId::new(row.template_id),
        title: row.title,
        description: row.description,
        status: CaseStatus::from_str(row.status.as_str())?,
        priority: CasePriority::from_str(row.priority.as_str())?,
        assigned_to: row.assigned_to,
        case_data,
        metadata,
        tags: row.tags,
        due_date: row.due_date,
        created_at: parse_timestamp(row.created_at.as_str())?,
        updated_at: row
            .updated_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        created_by: row.created_by,
        last_modified_by: row.last_modified_by,
    })
}

fn history_from_row(row: HistoryRow) -> AppResult<CaseHistoryEntry> {
    Ok(CaseHistoryEntry {
        case_id: CaseId::new(row.case_id),
        action: HistoryAction::from_str(row.action_type.as_str())?,
        field_name: row.field_name,
        old_value: row.old_value,
        new_value: row.new_value,
        comment: row.comment,
        created_at: parse_timestamp(row.created_at.as_str())?,
        created_by: row.created_by,
    })
}

#[async_trait]
impl CaseRepository for SqliteCaseRepository {
    async fn create_case(&self, record: NewCaseRecord) -> AppResult<(CaseId, CaseNumber)> {
        let case_data = serde_json::to_string(&record.case_data)
            .map_err(|error| storage_fault("failed to serialize case_data", error))?;
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|error| storage_fault("failed to serialize case metadata", error))?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        // Reserving the number inside the insert transaction keeps
        // concurrent creates from observing the same value.
        let sequence_value = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE case_number_sequence
            SET last_value = last_value + 1
            WHERE id = 1
            RETURNING last_value
            "#,
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| storage_fault("failed to reserve case number", error))?;

        let case_number = CaseNumber::from_sequence(sequence_value)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO cases (
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
                created_by
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(case_number.as_str())
        .bind(record.template_id.as_i64())
        .bind(record.title.as_str())
        .bind(record.description.as_str())
        .bind(record.status.as_str())
        .bind(record.priority.as_str())
        .bind(record.assigned_to.as_deref())
        .bind(case_data.as_str())
        .bind(metadata.as_str())
        .bind(record.tags.as_str())
        .bind(record.due_date.as_deref())
        .bind(now.as_str())
        .bind(record.created_by.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|error| storage_fault("failed to insert case", error))?;

        let case_id = inserted.last_insert_rowid();

        sqlx::query(
            r#"
            INSERT INTO case_history (case_id, action_type, comment, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(case_id)
        .bind(HistoryAction::Created.as_str())
        .bind(format!("Case {case_number} created"))
        .bind(now.as_str())
        .bind(record.created_by.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|error| storage_fault("failed to insert case history entry", error))?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit case insert", error))?;

        Ok((CaseId::new(case_id), case_number))
    }

    async fn find_case(&self, case_id: CaseId) -> AppResult<Option<Case>> {
        let row = sqlx::query_as::<_, CaseRow>(
            format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1").as_str(),
        )
        .bind(case_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to find case", error))?;

        row.map(case_from_row).transpose()
    }

    async fn update_case_data(
        &self,
        case_id: CaseId,
        case_data: Value,
        entry: CaseHistoryEntry,
    ) -> AppResult<()> {
        let serialized = serde_json::to_string(&case_data)
            .map_err(|error| storage_fault("failed to serialize case_data", error))?;
        let timestamp = entry.created_at.to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        let updated = sqlx::query(
            r#"
            UPDATE cases
            SET case_data = ?1, updated_at = ?2, last_modified_by = ?3
            WHERE id = ?4
            "#,
        )
        .bind(serialized.as_str())
        .bind(timestamp.as_str())
        .bind(entry.created_by.as_str())
        .bind(case_id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|error| storage_fault("failed to update case", error))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "case '{case_id}' does not exist"
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO case_history (
                case_id,
                action_type,
                field_name,
                old_value,
                new_value,
                comment,
                created_at,
                created_by
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(case_id.as_i64())
        .bind(entry.action.as_str())
        .bind(entry.field_name.as_deref())
        .bind(entry.old_value.as_deref())
        .bind(entry.new_value.as_deref())
        .bind(entry.comment.as_deref())
        .bind(timestamp.as_str())
        .bind(entry.created_by.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|error| storage_fault("failed to insert case history entry", error))?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit case update", error))
    }

    async fn list_cases(&self, filter: CaseListFilter) -> AppResult<Vec<Case>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CASE_COLUMNS} FROM cases WHERE 1 = 1"
        ));

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(assigned_to) = filter.assigned_to {
            builder.push(" AND assigned_to = ").push_bind(assigned_to);
        }
        if let Some(template_id) = filter.template_id {
            builder
                .push(" AND template_id = ")
                .push_bind(template_id.as_i64());
        }

        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);

        let rows: Vec<CaseRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| storage_fault("failed to list cases", error))?;

        rows.into_iter().map(case_from_row).collect()
    }

    async fn list_history(&self, case_id: CaseId) -> AppResult<Vec<CaseHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT case_id, action_type, field_name, old_value, new_value, comment, created_at, created_by
            FROM case_history
            WHERE case_id = ?1
            ORDER BY id
            "#,
        )
        .bind(case_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to list case history", error))?;

        rows.into_iter().map(history_from_row).collect()
    }

    async fn count_for_template(&self, template_id: TemplateId) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cases WHERE template_id = ?1",
        )
        .bind(template_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to count cases for template", error))?;

        Ok(count as u64)
    }
}
