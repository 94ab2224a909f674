// row: a single record with shared column names
// result_set: rows plus column metadata and affected count
mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::CustomDbRow;

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// Shared column-name list, lower-cased when the connector normalizes identifiers.
pub(crate) fn column_names<I>(names: I, lower_case: bool) -> Arc<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    Arc::new(
        names
            .into_iter()
            .map(|name| {
                if lower_case {
                    name.to_lowercase()
                } else {
                    name
                }
            })
            .collect(),
    )
}

/// Column names plus lookup cache shared by every row of one cursor.
#[derive(Debug, Clone)]
pub(crate) struct RowShape {
    names: Arc<Vec<String>>,
    cache: Arc<HashMap<String, usize>>,
}

impl RowShape {
    pub(crate) fn new(names: Arc<Vec<String>>) -> Self {
        let cache = Arc::new(row::index_columns(&names));
        Self { names, cache }
    }

    pub(crate) fn width(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn row(&self, values: Vec<RowValues>) -> CustomDbRow {
        CustomDbRow::with_cache(Arc::clone(&self.names), Arc::clone(&self.cache), values)
    }
}
