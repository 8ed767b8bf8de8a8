use {
    anyhow::{Context, Result},
    sqlx::{
        Pool, Sqlite,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    },
    std::path::Path,
};

pub async fn setup(path: &Path, max_connections: u32) -> Result<Pool<Sqlite>> {
    let db = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(connect_options(path))
        .await
        .with_context(|| format!("failed to open database at {path:?}"))?;
    sqlx::raw_sql(include_str!("schema.sql"))
        .execute(&db)
        .await
        .context("failed to set up database")?;
    Ok(db)
}

// WAL lets lookups keep reading the last committed dictionary set while an
// import transaction is open
fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
}

/// Encodes a set of codes for a space-separated TEXT column.
pub fn join_codes(codes: &[String]) -> String {
    codes.join(" ")
}

/// Decodes a space-separated TEXT column.
pub fn split_codes(column: Option<&str>) -> Vec<String> {
    column
        .unwrap_or_default()
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect()
}

/// Encodes glosses for the newline-joined `definitions` column.
///
/// Newlines inside a single gloss would split it on the way back out, so
/// they are folded into spaces.
pub fn join_definitions(definitions: &[String]) -> String {
    definitions
        .iter()
        .map(|gloss| gloss.replace(['\r', '\n'], " "))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn split_definitions(column: &str) -> Vec<String> {
    column
        .split('\n')
        .filter(|gloss| !gloss.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
