use std::str::FromStr;

use async_trait::async_trait;
use caseforge_application::{DataTableRepository, DataTableSummary};
use caseforge_core::{AppError, AppResult, DataTableId, RecordId};
use caseforge_domain::{
    ColumnDataType, ColumnDefinition, DataTableDefinition, DataTableRecord,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

#[cfg(test)]
mod tests;

/// SQLite-backed lookup-table repository.
#[derive(Clone)]
pub struct SqliteDataTableRepository {
    pool: SqlitePool,
}

impl SqliteDataTableRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TableRow {
    table_name: String,
    display_name: String,
    description: String,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    column_name: String,
    display_name: String,
    data_type: String,
    is_key_field: bool,
    is_display_field: bool,
    is_searchable: bool,
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: i64,
    table_id: i64,
    record_data: String,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct TableSummaryRow {
    id: i64,
    table_name: String,
    display_name: String,
    description: String,
    record_count: i64,
}

fn storage_fault(context: &str, error: impl std::fmt::Display) -> AppError {
    tracing::error!("{context}: {error}");
    AppError::Storage(format!("{context}: {error}"))
}

fn record_from_row(row: RecordRow) -> AppResult<DataTableRecord> {
    let data: Value = serde_json::from_str(row.record_data.as_str())
        .map_err(|error| storage_fault("persisted record payload is invalid", error))?;

    DataTableRecord::new(
        RecordId::new(row.id),
        DataTableId::new(row.table_id),
        data,
        row.is_active,
    )
}

async fn insert_columns(
    tx: &mut Transaction<'_, Sqlite>,
    table_id: i64,
    table: &DataTableDefinition,
    now: &str,
) -> AppResult<()> {
    for (order, column) in table.columns().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO data_table_columns (
                table_id,
                column_name,
                display_name,
                data_type,
                is_key_field,
                is_display_field,
                is_searchable,
                display_order,
                created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(table_id)
        .bind(column.column_name().as_str())
        .bind(column.display_name().as_str())
        .bind(column.data_type().as_str())
        .bind(column.is_key_field())
        .bind(column.is_display_field())
        .bind(column.is_searchable())
        .bind(order as i64)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|error| {
            storage_fault(
                format!("failed to insert column '{}'", column.column_name().as_str()).as_str(),
                error,
            )
        })?;
    }

    Ok(())
}

#[async_trait]
impl DataTableRepository for SqliteDataTableRepository {
    async fn create_table(
        &self,
        table: DataTableDefinition,
        created_by: &str,
    ) -> AppResult<DataTableId> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO data_tables (table_name, display_name, description, is_active, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(table.table_name().as_str())
        .bind(table.display_name().as_str())
        .bind(table.description())
        .bind(table.is_active())
        .bind(now.as_str())
        .bind(created_by)
        .execute(&mut *tx)
        .await;

        let table_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.kind() == sqlx::error::ErrorKind::UniqueViolation
                {
                    return Err(AppError::Conflict(format!(
                        "data table '{}' already exists",
                        table.table_name().as_str()
                    )));
                }

                return Err(storage_fault("failed to insert data table", error));
            }
        };

        insert_columns(&mut tx, table_id, &table, now.as_str()).await?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit data table insert", error))?;

        Ok(DataTableId::new(table_id))
    }

    async fn update_table(
        &self,
        table_id: DataTableId,
        table: DataTableDefinition,
    ) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        let updated = sqlx::query(
            r#"
            UPDATE data_tables
            SET table_name = ?1, display_name = ?2, description = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(table.table_name().as_str())
        .bind(table.display_name().as_str())
        .bind(table.description())
        .bind(now.as_str())
        .bind(table_id.as_i64())
        .execute(&mut *tx)
        .await;

        match updated {
            Ok(result) if result.rows_affected() == 0 => {
                return Err(AppError::NotFound(format!(
                    "data table '{table_id}' does not exist"
                )));
            }
            Ok(_) => {}
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.kind() == sqlx::error::ErrorKind::UniqueViolation
                {
                    return Err(AppError::Conflict(format!(
                        "data table '{}' already exists",
                        table.table_name().as_str()
                    )));
                }

                return Err(storage_fault("failed to update data table", error));
            }
        }

        sqlx::query("DELETE FROM data_table_columns WHERE table_id = ?1")
            .bind(table_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete table columns", error))?;

        insert_columns(&mut tx, table_id.as_i64(), &table, now.as_str()).await?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit data table update", error))
    }

    async fn delete_table(&self, table_id: DataTableId) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_fault("failed to open transaction", error))?;

        sqlx::query("DELETE FROM data_table_records WHERE table_id = ?1")
            .bind(table_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete table records", error))?;

        sqlx::query("DELETE FROM data_table_columns WHERE table_id = ?1")
            .bind(table_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete table columns", error))?;

        sqlx::query("DELETE FROM data_tables WHERE id = ?1")
            .bind(table_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| storage_fault("failed to delete data table", error))?;

        tx.commit()
            .await
            .map_err(|error| storage_fault("failed to commit data table delete", error))
    }

    async fn find_table(&self, table_id: DataTableId) -> AppResult<Option<DataTableDefinition>> {
        let row = sqlx::query_as::<_, TableRow>(
            r#"
            SELECT table_name, display_name, description, is_active
            FROM data_tables
            WHERE id = ?1
            "#,
        )
        .bind(table_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to find data table", error))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let column_rows = sqlx::query_as::<_, ColumnRow>(
            r#"
            SELECT
                column_name,
                display_name,
                data_type,
                is_key_field,
                is_display_field,
                is_searchable
            FROM data_table_columns
            WHERE table_id = ?1
            ORDER BY display_order
            "#,
        )
        .bind(table_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to list table columns", error))?;

        let columns = column_rows
            .into_iter()
            .map(|column| {
                ColumnDefinition::new(
                    column.column_name,
                    column.display_name,
                    ColumnDataType::from_str(column.data_type.as_str())?,
                    column.is_key_field,
                    column.is_display_field,
                    column.is_searchable,
                )
            })
            .collect::<AppResult<Vec<_>>>()?;

        DataTableDefinition::new(
            row.table_name,
            row.display_name,
            row.description,
            columns,
            row.is_active,
        )
        .map(Some)
        .map_err(|error| {
            storage_fault(
                format!("persisted data table '{table_id}' is invalid").as_str(),
                error,
            )
        })
    }

    async fn list_tables(&self) -> AppResult<Vec<DataTableSummary>> {
        let rows = sqlx::query_as::<_, TableSummaryRow>(
            r#"
            SELECT
                t.id,
                t.table_name,
                t.display_name,
                t.description,
                COUNT(r.id) AS record_count
            FROM data_tables t
            LEFT JOIN data_table_records r ON r.table_id = t.id AND r.is_active = 1
            WHERE t.is_active = 1
            GROUP BY t.id
            ORDER BY t.display_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to list data tables", error))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let column_names = sqlx::query_scalar::<_, String>(
                r#"
                SELECT display_name
                FROM data_table_columns
                WHERE table_id = ?1
                ORDER BY display_order
                "#,
            )
            .bind(row.id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| storage_fault("failed to list table columns", error))?;

            summaries.push(DataTableSummary {
                id: DataTableId::new(row.id),
                table_name: row.table_name,
                display_name: row.display_name,
                description: row.description,
                record_count: row.record_count as usize,
                column_display_names: column_names,
            });
        }

        Ok(summaries)
    }

    async fn add_record(
        &self,
        table_id: DataTableId,
        payload: Value,
        created_by: &str,
    ) -> AppResult<RecordId> {
        let serialized = serde_json::to_string(&payload)
            .map_err(|error| storage_fault("failed to serialize record payload", error))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO data_table_records (table_id, record_data, is_active, created_at, created_by)
            VALUES (?1, ?2, 1, ?3, ?4)
            "#,
        )
        .bind(table_id.as_i64())
        .bind(serialized.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(created_by)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to insert record", error))?;

        Ok(RecordId::new(inserted.last_insert_rowid()))
    }

    async fn list_records(&self, table_id: DataTableId) -> AppResult<Vec<DataTableRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, table_id, record_data, is_active
            FROM data_table_records
            WHERE table_id = ?1 AND is_active = 1
            ORDER BY id
            "#,
        )
        .bind(table_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to list records", error))?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn search_records(
        &self,
        table_id: DataTableId,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<DataTableRecord>> {
        // instr() is a case-sensitive byte containment test, unlike LIKE,
        // which folds ASCII case.
        let rows = if query.is_empty() {
            sqlx::query_as::<_, RecordRow>(
                r#"
                SELECT id, table_id, record_data, is_active
                FROM data_table_records
                WHERE table_id = ?1 AND is_active = 1
                ORDER BY id
                LIMIT ?2
                "#,
            )
            .bind(table_id.as_i64())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, RecordRow>(
                r#"
                SELECT id, table_id, record_data, is_active
                FROM data_table_records
                WHERE table_id = ?1 AND is_active = 1 AND instr(record_data, ?2) > 0
                ORDER BY id
                LIMIT ?3
                "#,
            )
            .bind(table_id.as_i64())
            .bind(query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|error| storage_fault("failed to search records", error))?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn count_records(&self, table_id: DataTableId) -> AppResult<usize> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM data_table_records
            WHERE table_id = ?1 AND is_active = 1
            "#,
        )
        .bind(table_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| storage_fault("failed to count records", error))?;

        Ok(count as usize)
    }
}
