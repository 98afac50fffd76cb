use std::sync::Arc;

use caseforge_core::{Actor, AppError, AppResult, CaseId, CaseNumber, NonEmptyString, TemplateId};
use caseforge_domain::{
    Case, CaseHistoryEntry, CasePriority, CaseStatus, EvaluationOutcome, HistoryAction, evaluate,
    stringify,
};
use chrono::Utc;
use serde_json::{Map, Value};

use crate::ports::{CaseListFilter, CaseRepository, NewCaseRecord, TemplateRepository};

/// Tunable behavior of the case service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaseServicePolicy {
    /// Re-run dependency validation when a single field is updated.
    ///
    /// Off by default: incremental draft edits save without validation and
    /// only case creation is gated. Turning this on makes `update_field`
    /// reject payloads the evaluator finds invalid.
    pub validate_on_update: bool,
}

/// Input payload for case creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCaseInput {
    /// Template the case is created from.
    pub template_id: TemplateId,
    /// Case title.
    pub title: String,
    /// Case description.
    pub description: String,
    /// Field-id-keyed submitted payload.
    pub case_data: Value,
    /// Lifecycle state, `draft` when unspecified.
    pub status: CaseStatus,
    /// Priority level, `medium` when unspecified.
    pub priority: CasePriority,
    /// Initial assignee subject.
    pub assigned_to: Option<String>,
    /// Free-form metadata object.
    pub metadata: Value,
    /// Comma-separated tag list.
    pub tags: String,
    /// Optional due date string.
    pub due_date: Option<String>,
}

impl NewCaseInput {
    /// Creates an input with default status, priority, and empty extras.
    #[must_use]
    pub fn new(template_id: TemplateId, title: impl Into<String>, case_data: Value) -> Self {
        Self {
            template_id,
            title: title.into(),
            description: String::new(),
            case_data,
            status: CaseStatus::default(),
            priority: CasePriority::default(),
            assigned_to: None,
            metadata: Value::Object(Map::new()),
            tags: String::new(),
            due_date: None,
        }
    }
}

/// Application service for case instances and their audit trail.
#[derive(Clone)]
pub struct CaseService {
    cases: Arc<dyn CaseRepository>,
    templates: Arc<dyn TemplateRepository>,
    policy: CaseServicePolicy,
}

impl CaseService {
    /// Creates a case service from repository implementations.
    #[must_use]
    pub fn new(
        cases: Arc<dyn CaseRepository>,
        templates: Arc<dyn TemplateRepository>,
        policy: CaseServicePolicy,
    ) -> Self {
        Self {
            cases,
            templates,
            policy,
        }
    }

    /// Evaluates a template's dependency rules against a candidate payload
    /// without persisting anything.
    pub async fn evaluate_case_data(
        &self,
        template_id: TemplateId,
        case_data: &Value,
    ) -> AppResult<EvaluationOutcome> {
        let template = self
            .templates
            .find_template(template_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("template '{template_id}' does not exist"))
            })?;

        Ok(evaluate(&template, case_data))
    }

    /// Creates a case after dependency validation.
    ///
    /// The evaluator's resolved payload is persisted, so values written by
    /// `set_value` rules survive into the stored case. The insert, the
    /// case-number reservation, and the `created` history entry commit as
    /// one transaction.
    pub async fn create_case(
        &self,
        actor: &Actor,
        input: NewCaseInput,
    ) -> AppResult<(CaseId, CaseNumber)> {
        NonEmptyString::new(input.title.as_str())?;

        let outcome = self
            .evaluate_case_data(input.template_id, &input.case_data)
            .await?;
        if !outcome.is_valid() {
            return Err(AppError::CaseDataInvalid {
                errors: outcome.errors().to_vec(),
            });
        }

        self.cases
            .create_case(NewCaseRecord {
                template_id: input.template_id,
                title: input.title,
                description: input.description,
                status: input.status,
                priority: input.priority,
                assigned_to: input.assigned_to,
                case_data: outcome.resolved_data().clone(),
                metadata: input.metadata,
                tags: input.tags,
                due_date: input.due_date,
                created_by: actor.subject().to_owned(),
            })
            .await
    }

    /// Returns a case by identifier.
    pub async fn get_case(&self, case_id: CaseId) -> AppResult<Case> {
        self.cases
            .find_case(case_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("case '{case_id}' does not exist")))
    }

    /// Updates one field of a case's payload and records the change.
    ///
    /// Appends exactly one `field_changed` history entry carrying the
    /// stringified old and new values. Validation only runs when the
    /// service policy enables it.
    pub async fn update_field(
        &self,
        actor: &Actor,
        case_id: CaseId,
        field_name: &str,
        old_value: &Value,
        new_value: &Value,
    ) -> AppResult<()> {
        if field_name.trim().is_empty() {
            return Err(AppError::Validation(
                "field name must not be empty".to_owned(),
            ));
        }

        let case = self.get_case(case_id).await?;

        let mut merged: Map<String, Value> =
            case.case_data().as_object().cloned().unwrap_or_default();
        merged.insert(field_name.to_owned(), new_value.clone());
        let mut payload = Value::Object(merged);

        if self.policy.validate_on_update {
            let outcome = self.evaluate_case_data(case.template_id(), &payload).await?;
            if !outcome.is_valid() {
                return Err(AppError::CaseDataInvalid {
                    errors: outcome.errors().to_vec(),
                });
            }
            payload = outcome.resolved_data().clone();
        }

        self.cases
            .update_case_data(
                case_id,
                payload,
                CaseHistoryEntry {
                    case_id,
                    action: HistoryAction::FieldChanged,
                    field_name: Some(field_name.to_owned()),
                    old_value: Some(stringify(Some(old_value))),
                    new_value: Some(stringify(Some(new_value))),
                    comment: None,
                    created_at: Utc::now(),
                    created_by: actor.subject().to_owned(),
                },
            )
            .await
    }

    /// Lists cases matching the filter, newest first.
    pub async fn list_cases(&self, filter: CaseListFilter) -> AppResult<Vec<Case>> {
        self.cases.list_cases(filter).await
    }

    /// Returns a case's append-only history, oldest first.
    pub async fn case_history(&self, case_id: CaseId) -> AppResult<Vec<CaseHistoryEntry>> {
        self.get_case(case_id).await?;
        self.cases.list_history(case_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use caseforge_core::{Actor, AppError, CaseId, TemplateId};
    use caseforge_domain::{
        ActionType, CaseStatus, ConditionType, DependencyRule, FieldType, HistoryAction,
        TemplateFieldInput, ValidationRules,
    };
    use serde_json::json;

    use crate::ports::CaseListFilter;
    use crate::template_service::TemplateService;
    use crate::test_support::{
        InMemoryCaseRepository, InMemoryDataTableRepository, InMemoryTemplateRepository,
    };

    use super::{CaseService, CaseServicePolicy, NewCaseInput};

    fn actor() -> Actor {
        Actor::new("admin", "Administrator")
    }

    fn text_field(field_id: &str) -> TemplateFieldInput {
        TemplateFieldInput {
            field_id: field_id.to_owned(),
            display_name: field_id.to_uppercase(),
            field_type: FieldType::Text,
            is_required: false,
            field_config: json!({}),
            validation_rules: ValidationRules::default(),
            conditional_logic: json!({}),
            data_table_id: None,
            parent_field_id: None,
            dependencies: Vec::new(),
        }
    }

    fn conditional_asset_tag() -> TemplateFieldInput {
        let mut field = text_field("asset_tag");
        field.dependencies = vec![
            DependencyRule::new(
                "category",
                ConditionType::Equals,
                Some("HW".to_owned()),
                ActionType::Require,
                json!({}),
            )
            .unwrap_or_else(|_| unreachable!()),
        ];
        field
    }

    async fn setup(policy: CaseServicePolicy) -> (CaseService, TemplateId) {
        let templates = Arc::new(InMemoryTemplateRepository::new());
        let cases = Arc::new(InMemoryCaseRepository::new());
        let data_tables = Arc::new(InMemoryDataTableRepository::new());

        let template_service =
            TemplateService::new(templates.clone(), cases.clone(), data_tables);
        let template_id = template_service
            .create_template(
                &actor(),
                "IT Request",
                "",
                "General",
                vec![text_field("category"), conditional_asset_tag()],
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        (CaseService::new(cases, templates, policy), template_id)
    }

    #[tokio::test]
    async fn create_rejects_payloads_failing_dependency_validation() {
        let (service, template_id) = setup(CaseServicePolicy::default()).await;

        let result = service
            .create_case(
                &actor(),
                NewCaseInput::new(template_id, "Broken laptop", json!({"category": "HW"})),
            )
            .await;

        let Err(AppError::CaseDataInvalid { errors }) = result else {
            unreachable!();
        };
        assert_eq!(errors, ["field 'asset_tag' is required"]);

        let accepted = service
            .create_case(
                &actor(),
                NewCaseInput::new(template_id, "License request", json!({"category": "SW"})),
            )
            .await;
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn case_numbers_are_sequential_and_zero_padded() {
        let (service, template_id) = setup(CaseServicePolicy::default()).await;

        let mut last_number = String::new();
        for index in 1..=5 {
            let (_, case_number) = service
                .create_case(
                    &actor(),
                    NewCaseInput::new(
                        template_id,
                        format!("Case {index}"),
                        json!({"category": "SW"}),
                    ),
                )
                .await
                .unwrap_or_else(|_| unreachable!());
            last_number = case_number.as_str().to_owned();
        }

        assert_eq!(last_number, "CASE-000005");
    }

    #[tokio::test]
    async fn create_persists_the_resolved_payload() {
        let templates = Arc::new(InMemoryTemplateRepository::new());
        let cases = Arc::new(InMemoryCaseRepository::new());
        let data_tables = Arc::new(InMemoryDataTableRepository::new());

        let mut priority_field = text_field("priority_hint");
        priority_field.dependencies = vec![
            DependencyRule::new(
                "category",
                ConditionType::Equals,
                Some("HW".to_owned()),
                ActionType::SetValue,
                json!({"value": "urgent"}),
            )
            .unwrap_or_else(|_| unreachable!()),
        ];

        let template_service =
            TemplateService::new(templates.clone(), cases.clone(), data_tables);
        let template_id = template_service
            .create_template(
                &actor(),
                "IT Request",
                "",
                "General",
                vec![text_field("category"), priority_field],
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        let service = CaseService::new(cases, templates, CaseServicePolicy::default());
        let (case_id, _) = service
            .create_case(
                &actor(),
                NewCaseInput::new(template_id, "Broken laptop", json!({"category": "HW"})),
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        let case = service.get_case(case_id).await.unwrap_or_else(|_| unreachable!());
        assert_eq!(case.case_data().get("priority_hint"), Some(&json!("urgent")));
    }

    #[tokio::test]
    async fn update_field_appends_exactly_one_history_entry() {
        let (service, template_id) = setup(CaseServicePolicy::default()).await;

        let (case_id, _) = service
            .create_case(
                &actor(),
                NewCaseInput::new(template_id, "License request", json!({"category": "SW"})),
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        service
            .update_field(&actor(), case_id, "category", &json!("SW"), &json!("HW"))
            .await
            .unwrap_or_else(|_| unreachable!());

        let history = service
            .case_history(case_id)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, HistoryAction::Created);

        let change = &history[1];
        assert_eq!(change.action, HistoryAction::FieldChanged);
        assert_eq!(change.field_name.as_deref(), Some("category"));
        assert_eq!(change.old_value.as_deref(), Some("SW"));
        assert_eq!(change.new_value.as_deref(), Some("HW"));
        assert_eq!(change.created_by, "admin");

        let case = service.get_case(case_id).await.unwrap_or_else(|_| unreachable!());
        assert_eq!(case.case_data().get("category"), Some(&json!("HW")));
        assert_eq!(case.last_modified_by(), Some("admin"));
    }

    #[tokio::test]
    async fn update_validation_is_policy_gated() {
        let (lenient, template_id) = setup(CaseServicePolicy::default()).await;

        let (case_id, _) = lenient
            .create_case(
                &actor(),
                NewCaseInput::new(template_id, "License request", json!({"category": "SW"})),
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        // Default policy: switching to HW without an asset tag saves fine.
        let saved = lenient
            .update_field(&actor(), case_id, "category", &json!("SW"), &json!("HW"))
            .await;
        assert!(saved.is_ok());

        let (strict, template_id) = setup(CaseServicePolicy {
            validate_on_update: true,
        })
        .await;
        let (case_id, _) = strict
            .create_case(
                &actor(),
                NewCaseInput::new(template_id, "License request", json!({"category": "SW"})),
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        let rejected = strict
            .update_field(&actor(), case_id, "category", &json!("SW"), &json!("HW"))
            .await;
        assert!(matches!(rejected, Err(AppError::CaseDataInvalid { .. })));
    }

    #[tokio::test]
    async fn list_cases_filters_by_status() {
        let (service, template_id) = setup(CaseServicePolicy::default()).await;

        let mut open_case =
            NewCaseInput::new(template_id, "License request", json!({"category": "SW"}));
        open_case.status = CaseStatus::Open;
        service
            .create_case(&actor(), open_case)
            .await
            .unwrap_or_else(|_| unreachable!());

        service
            .create_case(
                &actor(),
                NewCaseInput::new(template_id, "Another request", json!({"category": "SW"})),
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        let open = service
            .list_cases(CaseListFilter {
                status: Some(CaseStatus::Open),
                ..CaseListFilter::default()
            })
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title().as_str(), "License request");

        let all = service
            .list_cases(CaseListFilter::default())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn missing_case_and_template_are_not_found() {
        let (service, _) = setup(CaseServicePolicy::default()).await;

        assert!(matches!(
            service.get_case(CaseId::new(404)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service
                .create_case(
                    &actor(),
                    NewCaseInput::new(TemplateId::new(404), "Ghost", json!({})),
                )
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
