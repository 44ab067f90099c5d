//! Integration tests for the history layer.
//!
//! These use a real temporary SQLite database to verify repository
//! operations against the actual schema.

use scriba::history::{self, DbPool, HistoryEntry, HistoryRepository, SqlxHistoryRepository};

/// Helper to create a test database pool with migrations applied.
async fn setup_test_db(dir: &tempfile::TempDir) -> DbPool {
    let db_path = dir.path().join("history.db");
    let pool = history::init_pool(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .expect("Failed to create test pool");

    history::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

fn entry(source: &str, prefix: &str, seq: Option<i64>, title: &str, mode: &str) -> HistoryEntry {
    HistoryEntry {
        source_path: source.to_string(),
        prefix: prefix.to_string(),
        naming_mode: if seq.is_some() {
            "sequential".to_string()
        } else {
            "original".to_string()
        },
        sequential_number: seq,
        output_title: title.to_string(),
        output_mode: mode.to_string(),
        output_reference: Some(format!("/out/{}.md", title)),
        language: Some("en".to_string()),
    }
}

#[tokio::test]
async fn test_migrations_create_history_table() {
    let dir = tempfile::tempdir().unwrap();
    let pool = setup_test_db(&dir).await;

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .expect("Failed to query tables");

    let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
    assert!(
        table_names.contains(&"processed_media"),
        "processed_media table missing"
    );
}

#[tokio::test]
async fn test_sequential_numbers_start_at_one_and_advance() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqlxHistoryRepository::new(setup_test_db(&dir).await);

    assert_eq!(repo.next_sequential_number("Transcripcion").await.unwrap(), 1);

    repo.record(&entry(
        "/media/a.mp4",
        "Transcripcion",
        Some(1),
        "Transcripcion_1",
        "markdown",
    ))
    .await
    .unwrap();
    repo.record(&entry(
        "/media/b.mp4",
        "Transcripcion",
        Some(2),
        "Transcripcion_2",
        "markdown",
    ))
    .await
    .unwrap();

    assert_eq!(repo.next_sequential_number("Transcripcion").await.unwrap(), 3);
    // Numbers are tracked per prefix.
    assert_eq!(repo.next_sequential_number("Meeting").await.unwrap(), 1);
}

#[tokio::test]
async fn test_original_mode_entries_do_not_affect_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqlxHistoryRepository::new(setup_test_db(&dir).await);

    repo.record(&entry(
        "/media/a.mp4",
        "Transcripcion",
        None,
        "Transcripcion_a",
        "markdown",
    ))
    .await
    .unwrap();

    assert_eq!(repo.next_sequential_number("Transcripcion").await.unwrap(), 1);
}

#[tokio::test]
async fn test_already_processed_matches_exact_combination() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqlxHistoryRepository::new(setup_test_db(&dir).await);

    repo.record(&entry(
        "/media/a.mp4",
        "Transcripcion",
        Some(1),
        "Transcripcion_1",
        "markdown",
    ))
    .await
    .unwrap();

    assert!(
        repo.is_already_processed("/media/a.mp4", "Transcripcion", "markdown")
            .await
            .unwrap()
    );
    // A different prefix or output mode is a fresh combination.
    assert!(
        !repo
            .is_already_processed("/media/a.mp4", "Meeting", "markdown")
            .await
            .unwrap()
    );
    assert!(
        !repo
            .is_already_processed("/media/a.mp4", "Transcripcion", "google_docs")
            .await
            .unwrap()
    );
    assert!(
        !repo
            .is_already_processed("/media/b.mp4", "Transcripcion", "markdown")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_output_title_exists_per_mode() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqlxHistoryRepository::new(setup_test_db(&dir).await);

    repo.record(&entry(
        "/media/a.mp4",
        "Transcripcion",
        None,
        "Transcripcion_interview",
        "google_docs",
    ))
    .await
    .unwrap();

    assert!(
        repo.output_title_exists("Transcripcion_interview", "google_docs")
            .await
            .unwrap()
    );
    assert!(
        !repo
            .output_title_exists("Transcripcion_interview", "markdown")
            .await
            .unwrap()
    );
    assert!(
        !repo
            .output_title_exists("Transcripcion_other", "google_docs")
            .await
            .unwrap()
    );
}
