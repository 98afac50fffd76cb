use std::collections::HashSet;
use std::str::FromStr;

use caseforge_core::{AppError, AppResult, DataTableId, NonEmptyString, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column value types supported by lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDataType {
    /// UTF-8 text.
    Text,
    /// Numeric value.
    Number,
    /// Date string.
    Date,
    /// Boolean flag.
    Boolean,
}

impl ColumnDataType {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

impl FromStr for ColumnDataType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "date" => Ok(Self::Date),
            "boolean" => Ok(Self::Boolean),
            _ => Err(AppError::Validation(format!(
                "unknown column data type '{value}'"
            ))),
        }
    }
}

/// One typed column of a lookup data table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    column_name: NonEmptyString,
    display_name: NonEmptyString,
    data_type: ColumnDataType,
    is_key_field: bool,
    is_display_field: bool,
    is_searchable: bool,
}

impl ColumnDefinition {
    /// Creates a validated column definition.
    pub fn new(
        column_name: impl Into<String>,
        display_name: impl Into<String>,
        data_type: ColumnDataType,
        is_key_field: bool,
        is_display_field: bool,
        is_searchable: bool,
    ) -> AppResult<Self> {
        Ok(Self {
            column_name: NonEmptyString::new(column_name)?,
            display_name: NonEmptyString::new(display_name)?,
            data_type,
            is_key_field,
            is_display_field,
            is_searchable,
        })
    }

    /// Returns the machine column name keyed into record payloads.
    #[must_use]
    pub fn column_name(&self) -> &NonEmptyString {
        &self.column_name
    }

    /// Returns the human-readable column label.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the column value type.
    #[must_use]
    pub fn data_type(&self) -> ColumnDataType {
        self.data_type
    }

    /// Returns whether the column is the record key.
    #[must_use]
    pub fn is_key_field(&self) -> bool {
        self.is_key_field
    }

    /// Returns whether the column is the preferred display value.
    #[must_use]
    pub fn is_display_field(&self) -> bool {
        self.is_display_field
    }

    /// Returns whether the column participates in search.
    #[must_use]
    pub fn is_searchable(&self) -> bool {
        self.is_searchable
    }
}

/// An administrator-defined lookup table backing autocomplete and select
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTableDefinition {
    table_name: NonEmptyString,
    display_name: NonEmptyString,
    description: String,
    columns: Vec<ColumnDefinition>,
    is_active: bool,
}

impl DataTableDefinition {
    /// Creates a validated data table definition.
    pub fn new(
        table_name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        is_active: bool,
    ) -> AppResult<Self> {
        if columns.is_empty() {
            return Err(AppError::Validation(
                "data tables require at least one column".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.column_name().as_str().to_owned()) {
                return Err(AppError::Validation(format!(
                    "duplicate column name '{}' in data table",
                    column.column_name().as_str()
                )));
            }
        }

        Ok(Self {
            table_name: NonEmptyString::new(table_name)?,
            display_name: NonEmptyString::new(display_name)?,
            description: description.into(),
            columns,
            is_active,
        })
    }

    /// Returns the unique machine table name.
    #[must_use]
    pub fn table_name(&self) -> &NonEmptyString {
        &self.table_name
    }

    /// Returns the human-readable table label.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the table description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the ordered column definitions.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Returns whether the table is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Resolves the column whose value labels a record.
    ///
    /// The first column marked `is_display_field` wins; otherwise the first
    /// column; `"id"` when the table somehow carries no columns.
    #[must_use]
    pub fn display_column(&self) -> &str {
        self.columns
            .iter()
            .find(|column| column.is_display_field())
            .or_else(|| self.columns.first())
            .map_or("id", |column| column.column_name().as_str())
    }
}

/// One opaque row stored in a lookup data table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTableRecord {
    id: RecordId,
    table_id: DataTableId,
    data: Value,
    is_active: bool,
}

impl DataTableRecord {
    /// Creates a validated record projection.
    pub fn new(
        id: RecordId,
        table_id: DataTableId,
        data: Value,
        is_active: bool,
    ) -> AppResult<Self> {
        if !data.is_object() {
            return Err(AppError::Validation(
                "record payload must be a JSON object".to_owned(),
            ));
        }

        Ok(Self {
            id,
            table_id,
            data,
            is_active,
        })
    }

    /// Returns the record identifier.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the owning table identifier.
    #[must_use]
    pub fn table_id(&self) -> DataTableId {
        self.table_id
    }

    /// Returns the opaque record payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns whether the record is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the record label under the given display column, falling back
    /// to the record id when the column is absent from the payload.
    #[must_use]
    pub fn display_value(&self, display_column: &str) -> String {
        match self.data.get(display_column) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => self.id.to_string(),
            Some(other) => other.to_string(),
        }
    }
}
