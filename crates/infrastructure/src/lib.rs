//! SQLite adapters for the application repository ports.

#![forbid(unsafe_code)]

mod database;
mod sqlite_case_repository;
mod sqlite_data_table_repository;
mod sqlite_template_repository;

pub use database::connect_and_migrate;
pub use sqlite_case_repository::SqliteCaseRepository;
pub use sqlite_data_table_repository::SqliteDataTableRepository;
pub use sqlite_template_repository::SqliteTemplateRepository;
