//! Application services and repository ports for the case-management core.

#![forbid(unsafe_code)]

mod case_service;
mod data_table_service;
mod ports;
mod template_service;

#[cfg(test)]
mod test_support;

pub use case_service::{CaseService, CaseServicePolicy, NewCaseInput};
pub use data_table_service::{DataTableDetails, DataTableService, LookupMatch};
pub use ports::{
    CaseListFilter, CaseRepository, DataTableRepository, DataTableSummary, NewCaseRecord,
    TemplateRepository, TemplateSummary,
};
pub use template_service::{FieldOptions, TemplateService};
