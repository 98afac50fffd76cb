use std::str::FromStr;

use async_trait::async_trait;
use caseforge_application::{TemplateRepository, TemplateSummary};
use caseforge_core::{AppError, AppResult, DataTableId, TemplateId};
use caseforge_domain::{
    ActionType, CaseTemplate, ConditionType, DependencyRule, FieldType, TemplateField,
    TemplateFieldInput, ValidationRules,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};


/// SQLite-backed template repository.
#[derive(Clone)]
pub struct SqliteTemplateRepository {
    pool: SqlitePool,
}

impl SqliteTemplateRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    name: String,
    description: String,
    category: String,
}

#[derive(Debug, FromRow)]
struct FieldRow {
    field_id: String,
    display_name: String,
    field_type: String,
    is_required: bool,
    field_config: String,
    validation_rules: String,
    conditional_logic: String,
    data_table_id: Option<i64>,
    parent_field_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct DependencyRow {
    dependent_field_id: String,
    parent_field_id: String,
    condition_type: String,
    condition_value: Option<String>,
    action_type: String,
    action_config: String,
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: i64,
    name: String,
    description: String,
    category: String,
    field_count: i64,
}

fn storage_fault(context: &str, error: impl std::fmt::Display) -> AppError {
    tracing::error!("{context}: {error}");
    AppError::Storage(format!("{context}: {error}"))
}

fn encode_json(context: &str, value: &Value) -> AppResult<String> {
    serde_json::to_string(value).map_err(|error| storage_fault(context, error))
}

fn decode_json(context: &str, text: &str) -> AppResult<Value> {
    serde_json::from_str(text).map_err(|error| storage_fault(context, error))
}

async fn insert_fields(
    tx: &mut Transaction<'_, Sqlite>,
    template_id: i64,
    template: &CaseTemplate,
    now: &str,
) -> AppResult<()> {
    for (order, field) in template.fields().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO template_fields (
                template_id,
                field_id,
                display_name,
                field_type,
                is_required,
                display_order,
                field_config,
                validation_rules,
                conditional_logic,
                data_table_id,
                parent_field_id,
                created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(template_id)
        .bind(field.field_id().as_str())
        .bind(field.display_name().as_str())
        .bind(field.field_type().as_str())
        .bind(field.is_required())
        .bind(order as i64)
        .bind(encode_json("failed to serialize field_config", field.field_config())?)
        .bind(
            serde_json::to_string(field.validation_rules())
                .map_err(|error| storage_fault("failed to serialize validation_rules", error))?,
        )
        .bind(encode_json(
            "failed to serialize conditional_logic",
            field.conditional_logic(),
        )?)
        .bind(field.data_table_id().map(|id| id.as_i64()))
        .bind(field.parent_field_id().map(|parent| parent.as_str()))
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|error| {
            storage_fault(
                format!("failed to insert field '{}'", field.field_id().as_str()).as_str(),
                error,
            )
        })?;

        for rule in field.dependencies() {
            sqlx::query(
                r#"
                INSERT INTO field_dependencies (
                    template_id,
                    dependent_field_id,
                    parent_field_id,
                    condition_type,
                    condition_value,
                    action_type,
                    action_config,
                    created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(template_id)
            .bind(field.field_id().as_str())
            .bind(rule.parent_field().as_str())
            .bind(rule.condition_type().as_str())
            .bind(rule.condition_value())
            .bind(rule.action_type().as_str())
            .bind(encode_json("failed to serialize action_config", rule.action_config())?)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(|error| {
                storage_fault(
                    format!(
                        "failed to insert dependency rule for field '{}'",
                        field.field_id().as_str()
                    )
                    .as_str(),
                    error,
                )
            })?;
        }
    }

    Ok(())
}

#[async_trait]
impl TemplateRepository for SqliteTemplateRepository {
    async fn create_template(
        &self,
        template: CaseTemplate,
        created_by: &str,
    ) -> AppResult<TemplateId> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO case_templates (name, description, category, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(template.name().as_str())
        .bind(template.description())
        .bind(template.category())
        .bind(now.as_str())
        .bind(created_by)
        .execute(&mut *tx)
        .await;

        let template_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.kind() == sqlx::error::ErrorKind::UniqueViolation
                {
                    return Err(AppError::Conflict(format!(
                        "template '{}' already exists",
                        template.name().as_str()
                    )));
                }

                return Err(storage_fault("failed to insert template", error));
            }
        };

        insert_fields(&mut tx, template_id, &template, now.as_str()).await?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit template insert", error))?;

        Ok(TemplateId::new(template_id))
    }

    async fn update_template(
        &self,
        template_id: TemplateId,
        template: CaseTemplate,
    ) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        let updated = sqlx::query(
            r#"
            UPDATE case_templates
            SET name = ?1, description = ?2, category = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(template.name().as_str())
        .bind(template.description())
        .bind(template.category())
        .bind(now.as_str())
        .bind(template_id.as_i64())
        .execute(&mut *tx)
        .await;

        match updated {
            Ok(result) if result.rows_affected() == 0 => {
                return Err(AppError::NotFound(format!(
                    "template '{template_id}' does not exist"
                )));
            }
            Ok(_) => {}
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.kind() == sqlx::error::ErrorKind::UniqueViolation
                {
                    return Err(AppError::Conflict(format!(
                        "template '{}' already exists",
                        template.name().as_str()
                    )));
                }

                return Err(storage_fault("failed to update template", error));
            }
        }

        sqlx::query("DELETE FROM field_dependencies WHERE template_id = ?1")
            .bind(template_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete dependency rules", error))?;

        sqlx::query("DELETE FROM template_fields WHERE template_id = ?1")
            .bind(template_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete template fields", error))?;

        insert_fields(&mut tx, template_id.as_i64(), &template, now.as_str()).await?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit template update", error))
    }

    async fn find_template(&self, template_id: TemplateId) -> AppResult<Option<CaseTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT name, description, category
            FROM case_templates
            WHERE id = ?1
            "#,
        )
        .bind(template_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to find template", error))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let field_rows = sqlx::query_as::<_, FieldRow>(
            r#"
            SELECT
                field_id,
                display_name,
                field_type,
                is_required,
                field_config,
                validation_rules,
                conditional_logic,
                data_table_id,
                parent_field_id
            FROM template_fields
            WHERE template_id = ?1
            ORDER BY display_order
            "#,
        )
        .bind(template_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to list template fields", error))?;

        let dependency_rows = sqlx::query_as::<_, DependencyRow>(
            r#"
            SELECT
                dependent_field_id,
                parent_field_id,
                condition_type,
                condition_value,
                action_type,
                action_config
            FROM field_dependencies
            WHERE template_id = ?1
            ORDER BY id
            "#,
        )
        .bind(template_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to list dependency rules", error))?;

        let mut fields = Vec::with_capacity(field_rows.len());
        for field_row in field_rows {
            let dependencies = dependency_rows
                .iter()
                .filter(|dependency| dependency.dependent_field_id == field_row.field_id)
                .map(|dependency| {
                    DependencyRule::new(
                        dependency.parent_field_id.clone(),
                        ConditionType::from_str(dependency.condition_type.as_str())?,
                        dependency.condition_value.clone(),
                        ActionType::from_str(dependency.action_type.as_str())?,
                        decode_json(
                            "persisted action_config is invalid",
                            dependency.action_config.as_str(),
                        )?,
                    )
                })
                .collect::<AppResult<Vec<_>>>()?;

            let validation_rules: ValidationRules =
                serde_json::from_str(field_row.validation_rules.as_str()).map_err(|error| {
                    storage_fault("persisted validation_rules are invalid", error)
                })?;

            fields.push(TemplateField::new(TemplateFieldInput {
                field_id: field_row.field_id,
                display_name: field_row.display_name,
                field_type: FieldType::from_str(field_row.field_type.as_str())?,
                is_required: field_row.is_required,
                field_config: decode_json(
                    "persisted field_config is invalid",
                    field_row.field_config.as_str(),
                )?,
                validation_rules,
                conditional_logic: decode_json(
                    "persisted conditional_logic is invalid",
                    field_row.conditional_logic.as_str(),
                )?,
                data_table_id: field_row.data_table_id.map(DataTableId::new),
                parent_field_id: field_row.parent_field_id,
                dependencies,
            })?);
        }

        CaseTemplate::new(row.name, row.description, row.category, fields)
            .map(Some)
            .map_err(|error| {
                storage_fault(
                    format!("persisted template '{template_id}' is invalid").as_str(),
                    error,
                )
            })
    }

    async fn delete_template(&self, template_id: TemplateId) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        sqlx::query("DELETE FROM field_dependencies WHERE template_id = ?1")
            .bind(template_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete dependency rules", error))?;

        sqlx::query("DELETE FROM template_fields WHERE template_id = ?1")
            .bind(template_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete template fields", error))?;

        sqlx::query("DELETE FROM case_templates WHERE id = ?1")
            .bind(template_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete template", error))?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit template delete", error))
    }

    async fn list_templates(&self) -> AppResult<Vec<TemplateSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                t.id,
                t.name,
                t.description,
                t.category,
                COUNT(f.id) AS field_count
            FROM case_templates t
            LEFT JOIN template_fields f ON f.template_id = t.id
            GROUP BY t.id
            ORDER BY t.created_at DESC, t.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to list templates", error))?;

        Ok(rows
            .into_iter()
            .map(|row| TemplateSummary {
                id: TemplateId::new(row.id),
                name: row.name,
                description: row.description,
                category: row.category,
                field_count: row.field_count as usize,
            })
            .collect())
    }
}
