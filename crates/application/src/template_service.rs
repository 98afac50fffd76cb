use std::sync::Arc;

use caseforge_core::{Actor, AppError, AppResult, TemplateId};
use caseforge_domain::{CaseTemplate, TemplateField, TemplateFieldInput, stringify};
use serde_json::Value;

use crate::data_table_service::LookupMatch;
use crate::ports::{CaseRepository, DataTableRepository, TemplateRepository, TemplateSummary};

const FIELD_OPTIONS_LIMIT: usize = 10;

/// Dynamic options resolved for a dependent field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOptions {
    /// Matches from the field's backing lookup table.
    Lookup(Vec<LookupMatch>),
    /// Static options from the field's `optionsMap` configuration.
    Static(Vec<Value>),
}

/// Application service for template definitions.
#[derive(Clone)]
pub struct TemplateService {
    templates: Arc<dyn TemplateRepository>,
    cases: Arc<dyn CaseRepository>,
    data_tables: Arc<dyn DataTableRepository>,
}

impl TemplateService {
    /// Creates a template service from repository implementations.
    #[must_use]
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        cases: Arc<dyn CaseRepository>,
        data_tables: Arc<dyn DataTableRepository>,
    ) -> Self {
        Self {
            templates,
            cases,
            data_tables,
        }
    }

    /// Creates a template with its fields and dependency rules.
    pub async fn create_template(
        &self,
        actor: &Actor,
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        fields: Vec<TemplateFieldInput>,
    ) -> AppResult<TemplateId> {
        let template = build_template(name, description, category, fields)?;
        self.templates
            .create_template(template, actor.subject())
            .await
    }

    /// Replaces a template's metadata and entire field set.
    ///
    /// Existing fields and their dependency rules are deleted and
    /// re-inserted from the supplied list; order is preserved as display
    /// order.
    pub async fn update_template(
        &self,
        _actor: &Actor,
        template_id: TemplateId,
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        fields: Vec<TemplateFieldInput>,
    ) -> AppResult<()> {
        let template = build_template(name, description, category, fields)?;
        self.templates.update_template(template_id, template).await
    }

    /// Returns a template with fields in display order and dependency rules
    /// attached.
    pub async fn get_template(&self, template_id: TemplateId) -> AppResult<CaseTemplate> {
        self.templates
            .find_template(template_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("template '{template_id}' does not exist")))
    }

    /// Deletes a template when no case references it.
    pub async fn delete_template(&self, template_id: TemplateId) -> AppResult<()> {
        if self.templates.find_template(template_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "template '{template_id}' does not exist"
            )));
        }

        let referencing = self.cases.count_for_template(template_id).await?;
        if referencing > 0 {
            return Err(AppError::InUse(format!(
                "template '{template_id}' is in use by {referencing} existing cases"
            )));
        }

        self.templates.delete_template(template_id).await
    }

    /// Lists templates as summary rows with field counts.
    pub async fn list_templates(&self) -> AppResult<Vec<TemplateSummary>> {
        self.templates.list_templates().await
    }

    /// Resolves dynamic options for a dependent field from its parent's
    /// current value.
    ///
    /// Lookup-backed fields search their data table with the stringified
    /// parent value; other fields read the static `optionsMap` from their
    /// configuration.
    pub async fn field_options(
        &self,
        template_id: TemplateId,
        field_id: &str,
        parent_value: &Value,
    ) -> AppResult<FieldOptions> {
        let template = self.get_template(template_id).await?;
        let field = template.field(field_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "field '{field_id}' does not exist on template '{template_id}'"
            ))
        })?;

        let parent_text = stringify(Some(parent_value));

        if let Some(table_id) = field.data_table_id() {
            let table = self.data_tables.find_table(table_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("data table '{table_id}' does not exist"))
            })?;
            let display_column = table.display_column().to_owned();

            let records = self
                .data_tables
                .search_records(table_id, parent_text.as_str(), FIELD_OPTIONS_LIMIT)
                .await?;

            let matches = records
                .into_iter()
                .map(|record| LookupMatch {
                    record_id: record.id(),
                    display: record.display_value(display_column.as_str()),
                    data: record.data().clone(),
                })
                .collect();
            return Ok(FieldOptions::Lookup(matches));
        }

        let options = field
            .field_config()
            .get("optionsMap")
            .and_then(|map| map.get(parent_text.as_str()))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(FieldOptions::Static(options))
    }
}

fn build_template(
    name: impl Into<String>,
    description: impl Into<String>,
    category: impl Into<String>,
    fields: Vec<TemplateFieldInput>,
) -> AppResult<CaseTemplate> {
    let fields = fields
        .into_iter()
        .map(TemplateField::new)
        .collect::<AppResult<Vec<_>>>()?;

    CaseTemplate::new(name, description, category, fields)
}
