//! Single-pass dependency evaluation over a template and a case payload.
//!
//! Evaluation order is the documented contract: fields in display order,
//! each field's rules in stored order, no fixed-point iteration. A
//! `set_value` action writes into the working payload, so rules evaluated
//! later observe the updated value.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::dependency::{ActionType, ConditionType, DependencyRule};
use crate::template::{CaseTemplate, TemplateField, ValidationRules};

/// Effective per-field state after dependency evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    visible: bool,
    enabled: bool,
    required: bool,
    forced_value: Option<Value>,
    clear_requested: bool,
    options_refresh_requested: bool,
    errors: Vec<String>,
}

impl FieldState {
    fn for_field(field: &TemplateField) -> Self {
        Self {
            visible: true,
            enabled: true,
            required: field.is_required(),
            forced_value: None,
            clear_requested: false,
            options_refresh_requested: false,
            errors: Vec::new(),
        }
    }

    /// Returns whether the field should be rendered.
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Returns whether the field accepts input.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the effective required flag.
    #[must_use]
    pub fn required(&self) -> bool {
        self.required
    }

    /// Returns the value a `set_value` action forced, when one fired.
    #[must_use]
    pub fn forced_value(&self) -> Option<&Value> {
        self.forced_value.as_ref()
    }

    /// Returns whether a `clear_value` action fired.
    #[must_use]
    pub fn clear_requested(&self) -> bool {
        self.clear_requested
    }

    /// Returns whether an `update_options` action fired.
    #[must_use]
    pub fn options_refresh_requested(&self) -> bool {
        self.options_refresh_requested
    }

    /// Returns validation messages attributed to this field.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Result of evaluating a template's dependency rules against a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    field_states: BTreeMap<String, FieldState>,
    resolved_data: Value,
    errors: Vec<String>,
}

impl EvaluationOutcome {
    /// Returns the effective state for one field.
    #[must_use]
    pub fn field_state(&self, field_id: &str) -> Option<&FieldState> {
        self.field_states.get(field_id)
    }

    /// Returns effective states keyed by field identifier.
    #[must_use]
    pub fn field_states(&self) -> &BTreeMap<String, FieldState> {
        &self.field_states
    }

    /// Returns the working payload after `set_value` actions were applied.
    ///
    /// This is the payload callers should persist, so auto-set values
    /// survive into the stored case.
    #[must_use]
    pub fn resolved_data(&self) -> &Value {
        &self.resolved_data
    }

    /// Returns all validation messages in field order.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns whether the payload passed validation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluates a template's dependency rules against a case payload.
///
/// Pure: identical inputs always produce identical outcomes. Rules whose
/// parent field does not resolve in the template are skipped as benign
/// no-ops.
#[must_use]
pub fn evaluate(template: &CaseTemplate, case_data: &Value) -> EvaluationOutcome {
    let mut working: Map<String, Value> = case_data.as_object().cloned().unwrap_or_default();

    let mut field_states: BTreeMap<String, FieldState> = template
        .fields()
        .iter()
        .map(|field| (field.field_id().as_str().to_owned(), FieldState::for_field(field)))
        .collect();

    for field in template.fields() {
        for rule in field.dependencies() {
            if template.field(rule.parent_field().as_str()).is_none() {
                continue;
            }

            let fired = condition_matches(working.get(rule.parent_field().as_str()), rule);
            if !fired {
                continue;
            }

            let Some(state) = field_states.get_mut(field.field_id().as_str()) else {
                continue;
            };

            match rule.action_type() {
                ActionType::Show => state.visible = true,
                ActionType::Hide => state.visible = false,
                ActionType::Enable => state.enabled = true,
                ActionType::Disable => state.enabled = false,
                ActionType::Require => state.required = true,
                ActionType::Optional => state.required = false,
                ActionType::SetValue => {
                    if let Some(value) = rule.set_value_payload() {
                        state.forced_value = Some(value.clone());
                        working.insert(field.field_id().as_str().to_owned(), value.clone());
                    }
                }
                ActionType::ClearValue => state.clear_requested = true,
                ActionType::UpdateOptions => state.options_refresh_requested = true,
            }
        }
    }

    let mut errors = Vec::new();
    for field in template.fields() {
        let field_id = field.field_id().as_str();
        let value = working.get(field_id);
        let mut field_errors = Vec::new();

        let required = field_states
            .get(field_id)
            .is_some_and(FieldState::required);
        if required && value_is_empty(value) {
            field_errors.push(format!("field '{field_id}' is required"));
        }

        if !value_is_empty(value)
            && let Some(value) = value
        {
            check_validation_rules(field_id, field.validation_rules(), value, &mut field_errors);
        }

        if let Some(state) = field_states.get_mut(field_id) {
            state.errors = field_errors.clone();
        }
        errors.extend(field_errors);
    }

    EvaluationOutcome {
        field_states,
        resolved_data: Value::Object(working),
        errors,
    }
}

/// Canonical text form of a payload value used by condition comparisons.
///
/// Absent and null values stringify to the empty string; strings are taken
/// as-is; everything else uses its compact JSON text.
#[must_use]
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Returns whether a payload value counts as empty for validation.
#[must_use]
pub fn value_is_empty(value: Option<&Value>) -> bool {
    stringify(value).trim().is_empty()
}

fn condition_matches(parent_value: Option<&Value>, rule: &DependencyRule) -> bool {
    let text = stringify(parent_value);
    let literal = rule.condition_value().unwrap_or_default();

    match rule.condition_type() {
        ConditionType::Equals => text == literal,
        ConditionType::NotEquals => text != literal,
        ConditionType::Contains => text.contains(literal),
        ConditionType::NotContains => !text.contains(literal),
        ConditionType::GreaterThan => match (parse_number(&text), parse_number(literal)) {
            (Some(left), Some(right)) => left > right,
            _ => false,
        },
        ConditionType::LessThan => match (parse_number(&text), parse_number(literal)) {
            (Some(left), Some(right)) => left < right,
            _ => false,
        },
        ConditionType::InList => literal.split(',').any(|item| item == text),
        ConditionType::NotInList => !literal.split(',').any(|item| item == text),
        ConditionType::IsEmpty => value_is_empty(parent_value),
        ConditionType::IsNotEmpty => !value_is_empty(parent_value),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

fn check_validation_rules(
    field_id: &str,
    rules: &ValidationRules,
    value: &Value,
    errors: &mut Vec<String>,
) {
    if rules.is_unconstrained() {
        return;
    }

    let text = stringify(Some(value));

    if let Some(min_length) = rules.min_length
        && text.chars().count() < min_length as usize
    {
        errors.push(format!(
            "field '{field_id}' must be at least {min_length} characters"
        ));
    }

    if let Some(max_length) = rules.max_length
        && text.chars().count() > max_length as usize
    {
        errors.push(format!(
            "field '{field_id}' must be at most {max_length} characters"
        ));
    }

    if let Some(pattern) = rules.pattern.as_deref() {
        // A malformed pattern disables the check rather than failing the
        // whole payload.
        if let Ok(regex) = Regex::new(pattern)
            && !regex.is_match(&text)
        {
            errors.push(format!(
                "field '{field_id}' does not match the required pattern"
            ));
        }
    }

    if rules.min.is_some() || rules.max.is_some() {
        match parse_number(&text) {
            Some(number) => {
                if let Some(min) = rules.min
                    && number < min
                {
                    errors.push(format!("field '{field_id}' must be at least {min}"));
                }
                if let Some(max) = rules.max
                    && number > max
                {
                    errors.push(format!("field '{field_id}' must be at most {max}"));
                }
            }
            None => errors.push(format!("field '{field_id}' must be numeric")),
        }
    }

    if rules.email_format == Some(true)
        && let Ok(regex) = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        && !regex.is_match(&text)
    {
        errors.push(format!("field '{field_id}' must be a valid email address"));
    }
}
