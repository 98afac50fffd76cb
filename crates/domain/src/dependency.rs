use std::str::FromStr;

use caseforge_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Condition operators linking a parent field's value to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Stringified value equals the condition value.
    Equals,
    /// Stringified value differs from the condition value.
    NotEquals,
    /// Stringified value contains the condition value as a substring.
    Contains,
    /// Stringified value does not contain the condition value.
    NotContains,
    /// Numeric comparison, true when the value is greater.
    GreaterThan,
    /// Numeric comparison, true when the value is smaller.
    LessThan,
    /// Stringified value is a member of the comma-separated condition value.
    InList,
    /// Stringified value is not a member of the comma-separated condition value.
    NotInList,
    /// Value is absent, null, or blank after trimming.
    IsEmpty,
    /// Negation of `is_empty`.
    IsNotEmpty,
}

impl ConditionType {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::InList => "in_list",
            Self::NotInList => "not_in_list",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
        }
    }

    /// Returns whether the condition compares against a literal value.
    #[must_use]
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

impl FromStr for ConditionType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "equals" => Ok(Self::Equals),
            "not_equals" => Ok(Self::NotEquals),
            "contains" => Ok(Self::Contains),
            "not_contains" => Ok(Self::NotContains),
            "greater_than" => Ok(Self::GreaterThan),
            "less_than" => Ok(Self::LessThan),
            "in_list" => Ok(Self::InList),
            "not_in_list" => Ok(Self::NotInList),
            "is_empty" => Ok(Self::IsEmpty),
            "is_not_empty" => Ok(Self::IsNotEmpty),
            _ => Err(AppError::Validation(format!(
                "unknown condition type '{value}'"
            ))),
        }
    }
}

/// Field-level effects applied when a condition fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Make the dependent field visible.
    Show,
    /// Hide the dependent field.
    Hide,
    /// Enable the dependent field for input.
    Enable,
    /// Disable the dependent field.
    Disable,
    /// Mark the dependent field required.
    Require,
    /// Clear the required flag on the dependent field.
    Optional,
    /// Overwrite the dependent field's value in the working payload.
    SetValue,
    /// Request the dependent field's value be cleared (recorded as state).
    ClearValue,
    /// Request the dependent field's options be refreshed (recorded as state).
    UpdateOptions,
}

impl ActionType {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Hide => "hide",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Require => "require",
            Self::Optional => "optional",
            Self::SetValue => "set_value",
            Self::ClearValue => "clear_value",
            Self::UpdateOptions => "update_options",
        }
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "show" => Ok(Self::Show),
            "hide" => Ok(Self::Hide),
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "require" => Ok(Self::Require),
            "optional" => Ok(Self::Optional),
            "set_value" => Ok(Self::SetValue),
            "clear_value" => Ok(Self::ClearValue),
            "update_options" => Ok(Self::UpdateOptions),
            _ => Err(AppError::Validation(format!(
                "unknown action type '{value}'"
            ))),
        }
    }
}

/// A conditional rule linking a parent field's value to an effect on the
/// field that owns the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRule {
    parent_field: NonEmptyString,
    condition_type: ConditionType,
    condition_value: Option<String>,
    action_type: ActionType,
    action_config: Value,
}

impl DependencyRule {
    /// Creates a validated dependency rule.
    pub fn new(
        parent_field: impl Into<String>,
        condition_type: ConditionType,
        condition_value: Option<String>,
        action_type: ActionType,
        action_config: Value,
    ) -> AppResult<Self> {
        if condition_type.requires_value() && condition_value.is_none() {
            return Err(AppError::Validation(format!(
                "condition '{}' requires condition_value",
                condition_type.as_str()
            )));
        }

        if !action_config.is_object() {
            return Err(AppError::Validation(
                "action_config must be a JSON object".to_owned(),
            ));
        }

        if action_type == ActionType::SetValue && action_config.get("value").is_none() {
            return Err(AppError::Validation(
                "set_value actions require a 'value' key in action_config".to_owned(),
            ));
        }

        Ok(Self {
            parent_field: NonEmptyString::new(parent_field)?,
            condition_type,
            condition_value,
            action_type,
            action_config,
        })
    }

    /// Returns the parent field identifier the condition reads.
    #[must_use]
    pub fn parent_field(&self) -> &NonEmptyString {
        &self.parent_field
    }

    /// Returns the condition operator.
    #[must_use]
    pub fn condition_type(&self) -> ConditionType {
        self.condition_type
    }

    /// Returns the condition literal, absent for the emptiness checks.
    #[must_use]
    pub fn condition_value(&self) -> Option<&str> {
        self.condition_value.as_deref()
    }

    /// Returns the action applied when the condition fires.
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    /// Returns the action configuration object.
    #[must_use]
    pub fn action_config(&self) -> &Value {
        &self.action_config
    }

    /// Returns the payload written by `set_value` actions.
    #[must_use]
    pub fn set_value_payload(&self) -> Option<&Value> {
        self.action_config.get("value")
    }
}
