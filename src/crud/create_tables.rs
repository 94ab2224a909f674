use std::path::Path;

use futures_util::stream::{self, StreamExt};

use super::create_table;
use crate::connector::SqlConnector;
use crate::error::SqlConduitError;
use crate::schema::TableSchema;

/// Tables created concurrently by [`create_tables`].
pub const CREATE_CONCURRENCY: usize = 4;

/// Create every table in `schemas`, at most [`CREATE_CONCURRENCY`] at a time.
///
/// Returns one `(table name, outcome)` pair per schema in completion order; a failure does not
/// stop the others.
pub async fn create_tables(
    connector: &SqlConnector,
    schemas: Vec<TableSchema>,
    owner: Option<&str>,
) -> Vec<(String, Result<usize, SqlConduitError>)> {
    stream::iter(schemas)
        .map(|schema| async move {
            let outcome = create_table(connector, &schema, owner).await;
            if let Err(err) = &outcome {
                tracing::error!(
                    db = %connector.label(),
                    table = %schema.table_name,
                    error = %err,
                    "create table failed"
                );
            }
            (schema.table_name, outcome)
        })
        .buffer_unordered(CREATE_CONCURRENCY)
        .collect()
        .await
}

/// [`create_tables`] for every `*.json` schema file in `dir`.
///
/// Files that cannot be read or parsed are reported under their file name and skipped.
///
/// # Errors
/// `SchemaError` when the directory itself cannot be listed.
pub async fn create_tables_from_dir(
    connector: &SqlConnector,
    dir: impl AsRef<Path>,
    owner: Option<&str>,
) -> Result<Vec<(String, Result<usize, SqlConduitError>)>, SqlConduitError> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SqlConduitError::SchemaError(format!("cannot list {}: {e}", dir.display())))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SqlConduitError::SchemaError(format!("cannot list {}: {e}", dir.display())))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut report = Vec::new();
    let mut schemas = Vec::with_capacity(paths.len());
    for path in paths {
        match TableSchema::from_file(&path) {
            Ok(schema) => schemas.push(schema),
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "skipping schema file");
                report.push((path.display().to_string(), Err(err)));
            }
        }
    }
    report.extend(create_tables(connector, schemas, owner).await);
    Ok(report)
}
