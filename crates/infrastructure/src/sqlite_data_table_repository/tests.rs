use caseforge_application::DataTableRepository;
use caseforge_core::{AppError, DataTableId};
use caseforge_domain::{ColumnDataType, ColumnDefinition, DataTableDefinition};
use serde_json::json;
use sqlx::SqlitePool;

use crate::connect_and_migrate;

use super::SqliteDataTableRepository;

async fn memory_pool() -> SqlitePool {
    connect_and_migrate("sqlite::memory:")
        .await
        .unwrap_or_else(|_| unreachable!())
}

fn column(name: &str, display: &str, is_display: bool) -> ColumnDefinition {
    ColumnDefinition::new(name, display, ColumnDataType::Text, false, is_display, true)
        .unwrap_or_else(|_| unreachable!())
}

fn categories_table() -> DataTableDefinition {
    DataTableDefinition::new(
        "categories",
        "Issue Categories",
        "Categorization for support issues",
        vec![
            column("cat_id", "Category ID", false),
            column("cat_name", "Category Name", true),
        ],
        true,
    )
    .unwrap_or_else(|_| unreachable!())
}

async fn seeded_repository() -> (SqliteDataTableRepository, SqlitePool, DataTableId) {
    let pool = memory_pool().await;
    let repository = SqliteDataTableRepository::new(pool.clone());

    let table_id = repository
        .create_table(categories_table(), "admin")
        .await
        .unwrap_or_else(|_| unreachable!());

    for payload in [
        json!({"cat_id": "HW", "cat_name": "Hardware Issues"}),
        json!({"cat_id": "HW_LAPTOP", "cat_name": "Laptop Problems"}),
        json!({"cat_id": "SW", "cat_name": "Software Issues"}),
    ] {
        repository
            .add_record(table_id, payload, "admin")
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    (repository, pool, table_id)
}

#[tokio::test]
async fn create_and_read_back_round_trips() {
    let (repository, _, table_id) = seeded_repository().await;

    let loaded = repository
        .find_table(table_id)
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());

    assert_eq!(loaded.table_name().as_str(), "categories");
    assert_eq!(loaded.columns().len(), 2);
    assert_eq!(loaded.display_column(), "cat_name");
}

#[tokio::test]
async fn duplicate_table_names_conflict() {
    let (repository, _, _) = seeded_repository().await;

    let second = repository.create_table(categories_table(), "admin").await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn search_is_case_sensitive_containment() {
    let (repository, _, table_id) = seeded_repository().await;

    let matched = repository
        .search_records(table_id, "Hard", 10)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(matched.len(), 1);
    assert_eq!(
        matched[0].data().get("cat_name"),
        Some(&json!("Hardware Issues"))
    );

    let lowercase = repository
        .search_records(table_id, "hard", 10)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(lowercase.is_empty());

    // Serialized keys match too.
    let by_key = repository
        .search_records(table_id, "HW", 10)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(by_key.len(), 2);
}

#[tokio::test]
async fn empty_query_returns_records_up_to_limit() {
    let (repository, _, table_id) = seeded_repository().await;

    let matched = repository
        .search_records(table_id, "", 2)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(matched.len(), 2);
}

#[tokio::test]
async fn inactive_records_are_excluded() {
    let (repository, pool, table_id) = seeded_repository().await;

    sqlx::query("UPDATE data_table_records SET is_active = 0 WHERE record_data LIKE '%Software%'")
        .execute(&pool)
        .await
        .unwrap_or_else(|_| unreachable!());

    let matched = repository
        .search_records(table_id, "Issues", 10)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(matched.len(), 1);

    let listed = repository
        .list_records(table_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(listed.len(), 2);

    let count = repository
        .count_records(table_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(count, 2);
}

#[tokio::test]
async fn list_tables_aggregates_record_counts() {
    let (repository, _, _) = seeded_repository().await;

    let listed = repository.list_tables().await.unwrap_or_else(|_| unreachable!());
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].table_name, "categories");
    assert_eq!(listed[0].record_count, 3);
    assert_eq!(
        listed[0].column_display_names,
        ["Category ID", "Category Name"]
    );
}

#[tokio::test]
async fn update_replaces_columns_and_keeps_records() {
    let (repository, _, table_id) = seeded_repository().await;

    let replacement = DataTableDefinition::new(
        "categories",
        "Categories",
        "renamed",
        vec![column("cat_id", "Identifier", true)],
        true,
    )
    .unwrap_or_else(|_| unreachable!());

    repository
        .update_table(table_id, replacement)
        .await
        .unwrap_or_else(|_| unreachable!());

    let loaded = repository
        .find_table(table_id)
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());
    assert_eq!(loaded.columns().len(), 1);
    assert_eq!(loaded.display_column(), "cat_id");

    let count = repository
        .count_records(table_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(count, 3);
}

#[tokio::test]
async fn update_of_missing_table_is_not_found() {
    let (repository, _, _) = seeded_repository().await;

    let result = repository
        .update_table(DataTableId::new(99), categories_table())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn delete_removes_table_columns_and_records() {
    let (repository, pool, table_id) = seeded_repository().await;

    repository
        .delete_table(table_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    let found = repository
        .find_table(table_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(found.is_none());

    for table in ["data_table_columns", "data_table_records"] {
        let count = sqlx::query_scalar::<_, i64>(
            format!("SELECT COUNT(*) FROM {table} WHERE table_id = ?1").as_str(),
        )
        .bind(table_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(count, 0, "{table} rows should be removed");
    }
}
