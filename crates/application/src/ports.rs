use async_trait::async_trait;
use caseforge_core::{AppResult, CaseId, CaseNumber, DataTableId, RecordId, TemplateId};
use caseforge_domain::{
    Case, CaseHistoryEntry, CasePriority, CaseStatus, CaseTemplate, DataTableDefinition,
    DataTableRecord,
};
use serde_json::Value;

/// Summary row returned by template listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSummary {
    /// Template identifier.
    pub id: TemplateId,
    /// Unique template name.
    pub name: String,
    /// Template description.
    pub description: String,
    /// Template category.
    pub category: String,
    /// Number of fields defined on the template.
    pub field_count: usize,
}

/// Summary row returned by data-table listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTableSummary {
    /// Table identifier.
    pub id: DataTableId,
    /// Unique machine table name.
    pub table_name: String,
    /// Human-readable table label.
    pub display_name: String,
    /// Table description.
    pub description: String,
    /// Number of active records in the table.
    pub record_count: usize,
    /// Display labels of the table's columns.
    pub column_display_names: Vec<String>,
}

/// Filters for case listings, combined with logical AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseListFilter {
    /// Restrict to one lifecycle state.
    pub status: Option<CaseStatus>,
    /// Restrict to one assignee subject.
    pub assigned_to: Option<String>,
    /// Restrict to cases created from one template.
    pub template_id: Option<TemplateId>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for CaseListFilter {
    fn default() -> Self {
        Self {
            status: None,
            assigned_to: None,
            template_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Insert payload for a new case row.
///
/// The repository reserves the case number and writes the `created` history
/// entry in the same transaction as the insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCaseRecord {
    /// Template the case is created from.
    pub template_id: TemplateId,
    /// Case title.
    pub title: String,
    /// Case description.
    pub description: String,
    /// Lifecycle state.
    pub status: CaseStatus,
    /// Priority level.
    pub priority: CasePriority,
    /// Initial assignee subject.
    pub assigned_to: Option<String>,
    /// Field-id-keyed payload, after dependency resolution.
    pub case_data: Value,
    /// Free-form metadata object.
    pub metadata: Value,
    /// Comma-separated tag list.
    pub tags: String,
    /// Optional due date string.
    pub due_date: Option<String>,
    /// Creating subject.
    pub created_by: String,
}

/// Repository port for template persistence.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Persists a template with its fields and dependency rules as one
    /// atomic unit. Fails with `Conflict` when the name is taken.
    async fn create_template(
        &self,
        template: CaseTemplate,
        created_by: &str,
    ) -> AppResult<TemplateId>;

    /// Replaces a template's metadata and entire field set. Fails with
    /// `NotFound` when the id is absent.
    async fn update_template(&self, template_id: TemplateId, template: CaseTemplate)
    -> AppResult<()>;

    /// Looks up a template with fields in display order and dependency
    /// rules attached.
    async fn find_template(&self, template_id: TemplateId) -> AppResult<Option<CaseTemplate>>;

    /// Deletes a template together with its fields and dependency rules.
    async fn delete_template(&self, template_id: TemplateId) -> AppResult<()>;

    /// Lists templates as summary rows with field counts.
    async fn list_templates(&self) -> AppResult<Vec<TemplateSummary>>;
}

/// Repository port for lookup-table persistence.
#[async_trait]
pub trait DataTableRepository: Send + Sync {
    /// Persists a table and its columns. Fails with `Conflict` when the
    /// machine name is taken.
    async fn create_table(
        &self,
        table: DataTableDefinition,
        created_by: &str,
    ) -> AppResult<DataTableId>;

    /// Updates table metadata and replaces the column set. Fails with
    /// `NotFound` when the id is absent.
    async fn update_table(&self, table_id: DataTableId, table: DataTableDefinition)
    -> AppResult<()>;

    /// Deletes a table together with its columns and records.
    async fn delete_table(&self, table_id: DataTableId) -> AppResult<()>;

    /// Looks up a table definition with its columns.
    async fn find_table(&self, table_id: DataTableId) -> AppResult<Option<DataTableDefinition>>;

    /// Lists tables as summary rows with aggregate record counts.
    async fn list_tables(&self) -> AppResult<Vec<DataTableSummary>>;

    /// Appends one record to a table.
    async fn add_record(
        &self,
        table_id: DataTableId,
        payload: Value,
        created_by: &str,
    ) -> AppResult<RecordId>;

    /// Lists a table's active records in storage order.
    async fn list_records(&self, table_id: DataTableId) -> AppResult<Vec<DataTableRecord>>;

    /// Returns active records whose serialized payload contains the query
    /// as a case-sensitive substring, in storage order, capped at `limit`.
    /// An empty query matches every active record.
    async fn search_records(
        &self,
        table_id: DataTableId,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<DataTableRecord>>;

    /// Counts a table's active records.
    async fn count_records(&self, table_id: DataTableId) -> AppResult<usize>;
}

/// Repository port for case persistence and the append-only audit trail.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Inserts a case, reserving its case number and appending the
    /// `created` history entry in the same transaction.
    async fn create_case(&self, record: NewCaseRecord) -> AppResult<(CaseId, CaseNumber)>;

    /// Looks up a case by identifier.
    async fn find_case(&self, case_id: CaseId) -> AppResult<Option<Case>>;

    /// Replaces a case's payload and appends the given history entry in the
    /// same transaction. The entry's actor becomes `last_modified_by`.
    /// Fails with `NotFound` when the id is absent.
    async fn update_case_data(
        &self,
        case_id: CaseId,
        case_data: Value,
        entry: CaseHistoryEntry,
    ) -> AppResult<()>;

    /// Lists cases matching the filter, newest first.
    async fn list_cases(&self, filter: CaseListFilter) -> AppResult<Vec<Case>>;

    /// Lists a case's history entries, oldest first.
    async fn list_history(&self, case_id: CaseId) -> AppResult<Vec<CaseHistoryEntry>>;

    /// Counts cases created from the given template.
    async fn count_for_template(&self, template_id: TemplateId) -> AppResult<u64>;
}
