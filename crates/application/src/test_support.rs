//! In-memory fakes shared by the service test suites.

use std::collections::HashMap;

use async_trait::async_trait;
use caseforge_core::{
    AppError, AppResult, CaseId, CaseNumber, DataTableId, RecordId, TemplateId,
};
use caseforge_domain::{
    Case, CaseHistoryEntry, CaseParts, CaseTemplate, DataTableDefinition, DataTableRecord,
    HistoryAction,
};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::ports::{
    CaseListFilter, CaseRepository, DataTableRepository, DataTableSummary, NewCaseRecord,
    TemplateRepository, TemplateSummary,
};

pub struct InMemoryTemplateRepository {
    templates: Mutex<HashMap<i64, CaseTemplate>>,
    next_id: Mutex<i64>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self {
            templates: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
        }
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn create_template(
        &self,
        template: CaseTemplate,
        _created_by: &str,
    ) -> AppResult<TemplateId> {
        let mut templates = self.templates.lock().await;
        if templates
            .values()
            .any(|existing| existing.name() == template.name())
        {
            return Err(AppError::Conflict(format!(
                "template '{}' already exists",
                template.name().as_str()
            )));
        }

        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        templates.insert(*next_id, template);
        Ok(TemplateId::new(*next_id))
    }

    async fn update_template(
        &self,
        template_id: TemplateId,
        template: CaseTemplate,
    ) -> AppResult<()> {
        let mut templates = self.templates.lock().await;
        if !templates.contains_key(&template_id.as_i64()) {
            return Err(AppError::NotFound(format!(
                "template '{template_id}' does not exist"
            )));
        }

        templates.insert(template_id.as_i64(), template);
        Ok(())
    }

    async fn find_template(&self, template_id: TemplateId) -> AppResult<Option<CaseTemplate>> {
        Ok(self
            .templates
            .lock()
            .await
            .get(&template_id.as_i64())
            .cloned())
    }

    async fn delete_template(&self, template_id: TemplateId) -> AppResult<()> {
        self.templates.lock().await.remove(&template_id.as_i64());
        Ok(())
    }

    async fn list_templates(&self) -> AppResult<Vec<TemplateSummary>> {
        let templates = self.templates.lock().await;
        let mut listed: Vec<TemplateSummary> = templates
            .iter()
            .map(|(id, template)| TemplateSummary {
                id: TemplateId::new(*id),
                name: template.name().as_str().to_owned(),
                description: template.description().to_owned(),
                category: template.category().to_owned(),
                field_count: template.fields().len(),
            })
            .collect();
        listed.sort_by_key(|summary| summary.id);
        Ok(listed)
    }
}

pub struct InMemoryDataTableRepository {
    tables: Mutex<HashMap<i64, DataTableDefinition>>,
    records: Mutex<HashMap<i64, Vec<DataTableRecord>>>,
    next_table_id: Mutex<i64>,
    next_record_id: Mutex<i64>,
}

impl InMemoryDataTableRepository {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
            next_table_id: Mutex::new(0),
            next_record_id: Mutex::new(0),
        }
    }

    pub async fn deactivate_record(&self, table_id: DataTableId, record_id: RecordId) {
        let mut records = self.records.lock().await;
        if let Some(rows) = records.get_mut(&table_id.as_i64()) {
            for row in rows.iter_mut() {
                if row.id() == record_id {
                    *row = DataTableRecord::new(row.id(), row.table_id(), row.data().clone(), false)
                        .unwrap_or_else(|_| unreachable!());
                }
            }
        }
    }
}

#[async_trait]
impl DataTableRepository for InMemoryDataTableRepository {
    async fn create_table(
        &self,
        table: DataTableDefinition,
        _created_by: &str,
    ) -> AppResult<DataTableId> {
        let mut tables = self.tables.lock().await;
        if tables
            .values()
            .any(|existing| existing.table_name() == table.table_name())
        {
            return Err(AppError::Conflict(format!(
                "data table '{}' already exists",
                table.table_name().as_str()
            )));
        }

        let mut next_id = self.next_table_id.lock().await;
        *next_id += 1;
        tables.insert(*next_id, table);
        Ok(DataTableId::new(*next_id))
    }

    async fn update_table(
        &self,
        table_id: DataTableId,
        table: DataTableDefinition,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.contains_key(&table_id.as_i64()) {
            return Err(AppError::NotFound(format!(
                "data table '{table_id}' does not exist"
            )));
        }

        tables.insert(table_id.as_i64(), table);
        Ok(())
    }

    async fn delete_table(&self, table_id: DataTableId) -> AppResult<()> {
        self.tables.lock().await.remove(&table_id.as_i64());
        self.records.lock().await.remove(&table_id.as_i64());
        Ok(())
    }

    async fn find_table(&self, table_id: DataTableId) -> AppResult<Option<DataTableDefinition>> {
        Ok(self.tables.lock().await.get(&table_id.as_i64()).cloned())
    }

    async fn list_tables(&self) -> AppResult<Vec<DataTableSummary>> {
        let tables = self.tables.lock().await;
        let records = self.records.lock().await;

        let mut listed: Vec<DataTableSummary> = tables
            .iter()
            .map(|(id, table)| DataTableSummary {
                id: DataTableId::new(*id),
                table_name: table.table_name().as_str().to_owned(),
                display_name: table.display_name().as_str().to_owned(),
                description: table.description().to_owned(),
                record_count: records
                    .get(id)
                    .map(|rows| rows.iter().filter(|row| row.is_active()).count())
                    .unwrap_or_default(),
                column_display_names: table
                    .columns()
                    .iter()
                    .map(|column| column.display_name().as_str().to_owned())
                    .collect(),
            })
            .collect();
        listed.sort_by_key(|summary| summary.id);
        Ok(listed)
    }

    async fn add_record(
        &self,
        table_id: DataTableId,
        payload: Value,
        _created_by: &str,
    ) -> AppResult<RecordId> {
        let mut next_id = self.next_record_id.lock().await;
        *next_id += 1;
        let record_id = RecordId::new(*next_id);

        let record = DataTableRecord::new(record_id, table_id, payload, true)?;
        self.records
            .lock()
            .await
            .entry(table_id.as_i64())
            .or_default()
            .push(record);
        Ok(record_id)
    }

    async fn list_records(&self, table_id: DataTableId) -> AppResult<Vec<DataTableRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .get(&table_id.as_i64())
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.is_active())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search_records(
        &self,
        table_id: DataTableId,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<DataTableRecord>> {
        let records = self.records.lock().await;
        let matched = records
            .get(&table_id.as_i64())
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.is_active())
                    .filter(|row| {
                        query.is_empty()
                            || serde_json::to_string(row.data())
                                .unwrap_or_default()
                                .contains(query)
                    })
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(matched)
    }

    async fn count_records(&self, table_id: DataTableId) -> AppResult<usize> {
        Ok(self
            .records
            .lock()
            .await
            .get(&table_id.as_i64())
            .map(|rows| rows.iter().filter(|row| row.is_active()).count())
            .unwrap_or_default())
    }
}

pub struct InMemoryCaseRepository {
    cases: Mutex<HashMap<i64, Case>>,
    history: Mutex<Vec<CaseHistoryEntry>>,
    sequence: Mutex<i64>,
}

impl InMemoryCaseRepository {
    pub fn new() -> Self {
        Self {
            cases: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            sequence: Mutex::new(0),
        }
    }

    pub async fn clear(&self) {
        self.cases.lock().await.clear();
        self.history.lock().await.clear();
    }
}

#[async_trait]
impl CaseRepository for InMemoryCaseRepository {
    async fn create_case(&self, record: NewCaseRecord) -> AppResult<(CaseId, CaseNumber)> {
        let mut sequence = self.sequence.lock().await;
        *sequence += 1;
        let case_id = CaseId::new(*sequence);
        let case_number = CaseNumber::from_sequence(*sequence)?;
        let now = Utc::now();

        let case = Case::new(CaseParts {
            id: case_id,
            case_number: case_number.clone(),
            template_id: record.template_id,
            title: record.title,
            description: record.description,
            status: record.status,
            priority: record.priority,
            assigned_to: record.assigned_to,
            case_data: record.case_data,
            metadata: record.metadata,
            tags: record.tags,
            due_date: record.due_date,
            created_at: now,
            updated_at: None,
            created_by: record.created_by.clone(),
            last_modified_by: None,
        })?;

        self.cases.lock().await.insert(case_id.as_i64(), case);
        self.history.lock().await.push(CaseHistoryEntry {
            case_id,
            action: HistoryAction::Created,
            field_name: None,
            old_value: None,
            new_value: None,
            comment: Some(format!("Case {case_number} created")),
            created_at: now,
            created_by: record.created_by,
        });

        Ok((case_id, case_number))
    }

    async fn find_case(&self, case_id: CaseId) -> AppResult<Option<Case>> {
        Ok(self.cases.lock().await.get(&case_id.as_i64()).cloned())
    }

    async fn update_case_data(
        &self,
        case_id: CaseId,
        case_data: Value,
        entry: CaseHistoryEntry,
    ) -> AppResult<()> {
        let mut cases = self.cases.lock().await;
        let existing = cases.get(&case_id.as_i64()).ok_or_else(|| {
            AppError::NotFound(format!("case '{case_id}' does not exist"))
        })?;

        let updated = Case::new(CaseParts {
            id: existing.id(),
            case_number: existing.case_number().clone(),
            template_id: existing.template_id(),
            title: existing.title().as_str().to_owned(),
            description: existing.description().to_owned(),
            status: existing.status(),
            priority: existing.priority(),
            assigned_to: existing.assigned_to().map(str::to_owned),
            case_data,
            metadata: existing.metadata().clone(),
            tags: existing.tags().to_owned(),
            due_date: existing.due_date().map(str::to_owned),
            created_at: existing.created_at(),
            updated_at: Some(entry.created_at),
            created_by: existing.created_by().to_owned(),
            last_modified_by: Some(entry.created_by.clone()),
        })?;

        cases.insert(case_id.as_i64(), updated);
        self.history.lock().await.push(entry);
        Ok(())
    }

    async fn list_cases(&self, filter: CaseListFilter) -> AppResult<Vec<Case>> {
        let cases = self.cases.lock().await;
        let mut listed: Vec<Case> = cases
            .values()
            .filter(|case| {
                filter
                    .status
                    .is_none_or(|status| case.status() == status)
            })
            .filter(|case| {
                filter
                    .assigned_to
                    .as_deref()
                    .is_none_or(|assignee| case.assigned_to() == Some(assignee))
            })
            .filter(|case| {
                filter
                    .template_id
                    .is_none_or(|template_id| case.template_id() == template_id)
            })
            .cloned()
            .collect();

        listed.sort_by(|left, right| {
            right
                .created_at()
                .cmp(&left.created_at())
                .then(right.id().as_i64().cmp(&left.id().as_i64()))
        });

        Ok(listed
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn list_history(&self, case_id: CaseId) -> AppResult<Vec<CaseHistoryEntry>> {
        Ok(self
            .history
            .lock()
            .await
            .iter()
            .filter(|entry| entry.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn count_for_template(&self, template_id: TemplateId) -> AppResult<u64> {
        Ok(self
            .cases
            .lock()
            .await
            .values()
            .filter(|case| case.template_id() == template_id)
            .count() as u64)
    }
}
