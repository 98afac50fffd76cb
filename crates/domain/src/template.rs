use std::collections::HashSet;
use std::str::FromStr;

use caseforge_core::{AppError, AppResult, DataTableId, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dependency::DependencyRule;

/// Supported template field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Single-line text input.
    Text,
    /// Multi-line text input.
    Textarea,
    /// Numeric input.
    Number,
    /// Email address input.
    Email,
    /// Phone number input.
    Phone,
    /// URL input.
    Url,
    /// Date-only input.
    Date,
    /// Date-time input.
    DateTime,
    /// Single-choice dropdown.
    Select,
    /// Multi-choice dropdown.
    Multiselect,
    /// Single-choice radio group.
    Radio,
    /// Boolean checkbox.
    Checkbox,
    /// Boolean toggle switch.
    Toggle,
    /// Free text with suggestions.
    Autocomplete,
    /// Value picked from a lookup data table.
    DataTableLookup,
    /// Options derived from another field's value.
    DependentField,
    /// File attachment.
    FileUpload,
    /// Image attachment.
    ImageUpload,
    /// Captured signature.
    Signature,
    /// Star/numeric rating.
    Rating,
    /// Geographic location.
    Location,
    /// Color picker.
    Color,
    /// Raw JSON editor.
    JsonEditor,
}

impl FieldType {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Toggle => "toggle",
            Self::Autocomplete => "autocomplete",
            Self::DataTableLookup => "data_table_lookup",
            Self::DependentField => "dependent_field",
            Self::FileUpload => "file_upload",
            Self::ImageUpload => "image_upload",
            Self::Signature => "signature",
            Self::Rating => "rating",
            Self::Location => "location",
            Self::Color => "color",
            Self::JsonEditor => "json_editor",
        }
    }
}

impl FromStr for FieldType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "textarea" => Ok(Self::Textarea),
            "number" => Ok(Self::Number),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            "url" => Ok(Self::Url),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            "select" => Ok(Self::Select),
            "multiselect" => Ok(Self::Multiselect),
            "radio" => Ok(Self::Radio),
            "checkbox" => Ok(Self::Checkbox),
            "toggle" => Ok(Self::Toggle),
            "autocomplete" => Ok(Self::Autocomplete),
            "data_table_lookup" => Ok(Self::DataTableLookup),
            "dependent_field" => Ok(Self::DependentField),
            "file_upload" => Ok(Self::FileUpload),
            "image_upload" => Ok(Self::ImageUpload),
            "signature" => Ok(Self::Signature),
            "rating" => Ok(Self::Rating),
            "location" => Ok(Self::Location),
            "color" => Ok(Self::Color),
            "json_editor" => Ok(Self::JsonEditor),
            _ => Err(AppError::Validation(format!(
                "unknown field type '{value}'"
            ))),
        }
    }
}

/// Declarative validation constraints attached to a field.
///
/// All constraints are optional; absent constraints are never checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRules {
    /// Minimum character count for the stringified value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    /// Maximum character count for the stringified value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Regular expression the stringified value must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Inclusive numeric lower bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Requires the value to look like an email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_format: Option<bool>,
}

impl ValidationRules {
    /// Returns whether no constraint is set.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.email_format.is_none()
    }
}

/// Input payload for constructing one template field.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFieldInput {
    /// Stable field identifier, unique within the template.
    pub field_id: String,
    /// Human-readable field label.
    pub display_name: String,
    /// Field type.
    pub field_type: FieldType,
    /// Whether the field is statically required.
    pub is_required: bool,
    /// Type-specific configuration object.
    pub field_config: Value,
    /// Declarative validation constraints.
    pub validation_rules: ValidationRules,
    /// Persisted conditional-logic blob (round-tripped, not interpreted).
    pub conditional_logic: Value,
    /// Backing lookup table for lookup-typed fields.
    pub data_table_id: Option<DataTableId>,
    /// Structural parent field (nesting), distinct from dependency rules.
    pub parent_field_id: Option<String>,
    /// Dependency rules targeting this field.
    pub dependencies: Vec<DependencyRule>,
}

/// One typed, configurable form element within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    field_id: NonEmptyString,
    display_name: NonEmptyString,
    field_type: FieldType,
    is_required: bool,
    field_config: Value,
    validation_rules: ValidationRules,
    conditional_logic: Value,
    data_table_id: Option<DataTableId>,
    parent_field_id: Option<NonEmptyString>,
    dependencies: Vec<DependencyRule>,
}

impl TemplateField {
    /// Creates a validated template field.
    pub fn new(input: TemplateFieldInput) -> AppResult<Self> {
        let TemplateFieldInput {
            field_id,
            display_name,
            field_type,
            is_required,
            field_config,
            validation_rules,
            conditional_logic,
            data_table_id,
            parent_field_id,
            dependencies,
        } = input;

        if !field_config.is_object() {
            return Err(AppError::Validation(format!(
                "field_config for '{field_id}' must be a JSON object"
            )));
        }

        if !conditional_logic.is_object() {
            return Err(AppError::Validation(format!(
                "conditional_logic for '{field_id}' must be a JSON object"
            )));
        }

        if field_type == FieldType::DataTableLookup && data_table_id.is_none() {
            return Err(AppError::Validation(format!(
                "data_table_lookup field '{field_id}' requires data_table_id"
            )));
        }

        Ok(Self {
            field_id: NonEmptyString::new(field_id)?,
            display_name: NonEmptyString::new(display_name)?,
            field_type,
            is_required,
            field_config,
            validation_rules,
            conditional_logic,
            data_table_id,
            parent_field_id: parent_field_id.map(NonEmptyString::new).transpose()?,
            dependencies,
        })
    }

    /// Returns the stable field identifier.
    #[must_use]
    pub fn field_id(&self) -> &NonEmptyString {
        &self.field_id
    }

    /// Returns the display label.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the field type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns whether the field is statically required.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.is_required
    }

    /// Returns the type-specific configuration object.
    #[must_use]
    pub fn field_config(&self) -> &Value {
        &self.field_config
    }

    /// Returns the declarative validation constraints.
    #[must_use]
    pub fn validation_rules(&self) -> &ValidationRules {
        &self.validation_rules
    }

    /// Returns the persisted conditional-logic blob.
    #[must_use]
    pub fn conditional_logic(&self) -> &Value {
        &self.conditional_logic
    }

    /// Returns the backing lookup table, when the field is table-backed.
    #[must_use]
    pub fn data_table_id(&self) -> Option<DataTableId> {
        self.data_table_id
    }

    /// Returns the structural parent field identifier.
    #[must_use]
    pub fn parent_field_id(&self) -> Option<&NonEmptyString> {
        self.parent_field_id.as_ref()
    }

    /// Returns dependency rules targeting this field.
    #[must_use]
    pub fn dependencies(&self) -> &[DependencyRule] {
        &self.dependencies
    }
}

/// A named, versionless schema describing a form's fields for one class of case.
///
/// Field order is render and evaluation order; the display_order column in
/// storage is the position in this list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseTemplate {
    name: NonEmptyString,
    description: String,
    category: String,
    fields: Vec<TemplateField>,
}

impl CaseTemplate {
    /// Creates a validated template.
    ///
    /// Dependency rules may reference parent fields that no longer exist;
    /// those rules are tolerated here and skipped at evaluation time, since
    /// templates can be edited while long-lived case drafts still reference
    /// older field sets.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        fields: Vec<TemplateField>,
    ) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.field_id().as_str().to_owned()) {
                return Err(AppError::Validation(format!(
                    "duplicate field_id '{}' in template",
                    field.field_id().as_str()
                )));
            }
        }

        Ok(Self {
            name: NonEmptyString::new(name)?,
            description: description.into(),
            category: category.into(),
            fields,
        })
    }

    /// Returns the unique template name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the template description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the template category.
    #[must_use]
    pub fn category(&self) -> &str {
        self.category.as_str()
    }

    /// Returns the fields in display order.
    #[must_use]
    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    /// Looks up a field by its stable identifier.
    #[must_use]
    pub fn field(&self, field_id: &str) -> Option<&TemplateField> {
        self.fields
            .iter()
            .find(|field| field.field_id().as_str() == field_id)
    }
}
