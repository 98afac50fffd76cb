use std::sync::Arc;

use caseforge_core::{Actor, AppError, AppResult, DataTableId, RecordId};
use caseforge_domain::{ColumnDefinition, DataTableDefinition, DataTableRecord};
use serde_json::Value;

use crate::ports::{DataTableRepository, DataTableSummary};

/// One record matched by a lookup search, with its resolved display label.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupMatch {
    /// Matched record identifier.
    pub record_id: RecordId,
    /// Opaque record payload.
    pub data: Value,
    /// Label resolved through the table's display column.
    pub display: String,
}

/// A table definition together with its aggregate record count.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTableDetails {
    /// Table identifier.
    pub id: DataTableId,
    /// Table definition with columns.
    pub table: DataTableDefinition,
    /// Number of active records.
    pub record_count: usize,
}

/// Application service for lookup data tables.
#[derive(Clone)]
pub struct DataTableService {
    tables: Arc<dyn DataTableRepository>,
}

impl DataTableService {
    /// Creates a data-table service from a repository implementation.
    #[must_use]
    pub fn new(tables: Arc<dyn DataTableRepository>) -> Self {
        Self { tables }
    }

    /// Creates a lookup table with the given columns.
    pub async fn create_table(
        &self,
        actor: &Actor,
        table_name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> AppResult<DataTableId> {
        let table = DataTableDefinition::new(table_name, display_name, description, columns, true)?;
        self.tables.create_table(table, actor.subject()).await
    }

    /// Updates table metadata and replaces the column set. Records are kept.
    pub async fn update_table(
        &self,
        _actor: &Actor,
        table_id: DataTableId,
        table_name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> AppResult<()> {
        let table = DataTableDefinition::new(table_name, display_name, description, columns, true)?;
        self.tables.update_table(table_id, table).await
    }

    /// Deletes a table together with its columns and records.
    pub async fn delete_table(&self, table_id: DataTableId) -> AppResult<()> {
        if self.tables.find_table(table_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "data table '{table_id}' does not exist"
            )));
        }

        self.tables.delete_table(table_id).await
    }

    /// Returns a table definition with its aggregate record count.
    pub async fn table_details(&self, table_id: DataTableId) -> AppResult<DataTableDetails> {
        let table = self.require_table(table_id).await?;
        let record_count = self.tables.count_records(table_id).await?;

        Ok(DataTableDetails {
            id: table_id,
            table,
            record_count,
        })
    }

    /// Lists tables as summary rows with record counts.
    pub async fn list_tables(&self) -> AppResult<Vec<DataTableSummary>> {
        self.tables.list_tables().await
    }

    /// Returns a table's column definitions.
    pub async fn get_columns(&self, table_id: DataTableId) -> AppResult<Vec<ColumnDefinition>> {
        let table = self.require_table(table_id).await?;
        Ok(table.columns().to_vec())
    }

    /// Appends one record to a table.
    pub async fn add_record(
        &self,
        actor: &Actor,
        table_id: DataTableId,
        payload: Value,
    ) -> AppResult<RecordId> {
        if !payload.is_object() {
            return Err(AppError::Validation(
                "record payload must be a JSON object".to_owned(),
            ));
        }

        self.require_table(table_id).await?;
        self.tables
            .add_record(table_id, payload, actor.subject())
            .await
    }

    /// Lists a table's active records in storage order.
    pub async fn list_records(&self, table_id: DataTableId) -> AppResult<Vec<DataTableRecord>> {
        self.require_table(table_id).await?;
        self.tables.list_records(table_id).await
    }

    /// Searches a table's records by substring containment against the
    /// serialized payload.
    ///
    /// `display_column_override` selects the labeling column instead of the
    /// table's resolved display column.
    pub async fn search_records(
        &self,
        table_id: DataTableId,
        query: &str,
        limit: usize,
        display_column_override: Option<&str>,
    ) -> AppResult<Vec<LookupMatch>> {
        let table = self.require_table(table_id).await?;
        let display_column = display_column_override
            .unwrap_or_else(|| table.display_column())
            .to_owned();

        let records = self.tables.search_records(table_id, query, limit).await?;

        Ok(records
            .into_iter()
            .map(|record| LookupMatch {
                record_id: record.id(),
                display: record.display_value(display_column.as_str()),
                data: record.data().clone(),
            })
            .collect())
    }

    async fn require_table(&self, table_id: DataTableId) -> AppResult<DataTableDefinition> {
        self.tables
            .find_table(table_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("data table '{table_id}' does not exist")))
    }
}
