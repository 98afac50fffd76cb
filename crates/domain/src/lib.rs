//! Domain entities and invariants for the case-management core.

#![forbid(unsafe_code)]

mod case;
mod data_table;
mod dependency;
mod evaluation;
mod template;

pub use case::{
    Case, CaseHistoryEntry, CaseParts, CasePriority, CaseStatus, HistoryAction,
};
pub use data_table::{
    ColumnDataType, ColumnDefinition, DataTableDefinition, DataTableRecord,
};
pub use dependency::{ActionType, ConditionType, DependencyRule};
pub use evaluation::{EvaluationOutcome, FieldState, evaluate, stringify, value_is_empty};
pub use template::{CaseTemplate, FieldType, TemplateField, TemplateFieldInput, ValidationRules};
