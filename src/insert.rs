//! Fallback row-insert loader.
//!
//! BULK INSERT requires the server to read the data file from its own
//! filesystem. When the file only exists on the client (containers, managed
//! runtimes), this loader streams the file and issues multi-row INSERT
//! statements through the same handle instead. Much slower; same positional
//! field-to-column contract.

use std::path::Path;

use log::info;

use crate::db::DbHandle;
use crate::error::ImportError;
use crate::schema::ColumnMetadata;

/// Loads `source` into `table` with batched INSERT statements, committing
/// after each batch. Returns the number of rows inserted. Values travel as
/// string literals; type coercion is left to the engine, matching the bulk
/// path. Empty fields become NULL.
pub fn load_with_inserts(
    db: &mut dyn DbHandle,
    source: &Path,
    table: &str,
    columns: &[ColumnMetadata],
    delimiter: u8,
    skip_header: bool,
    batch_size: usize,
) -> Result<u64, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(skip_header)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(source)?;

    let column_list = columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let batch_size = batch_size.max(1);

    let mut total_rows = 0u64;
    let mut batch: Vec<String> = Vec::with_capacity(batch_size);
    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        batch.push(row_values(&record, columns.len()));
        if batch.len() >= batch_size {
            flush_batch(db, table, &column_list, &mut batch)?;
            total_rows += batch_size as u64;
            info!("Inserted {total_rows} row(s)...");
        }
    }
    if !batch.is_empty() {
        total_rows += batch.len() as u64;
        flush_batch(db, table, &column_list, &mut batch)?;
    }

    info!("Row-insert load finished: {total_rows} row(s) into {table}");
    Ok(total_rows)
}

fn flush_batch(
    db: &mut dyn DbHandle,
    table: &str,
    column_list: &str,
    batch: &mut Vec<String>,
) -> Result<(), ImportError> {
    let statement = format!(
        "INSERT INTO {table} ({column_list}) VALUES {}",
        batch.join(", "),
    );
    db.execute(&statement)?;
    db.commit()?;
    batch.clear();
    Ok(())
}

/// Renders one record as a `(...)` values tuple, positionally aligned to the
/// column count: short records pad with NULL, extra fields are dropped.
fn row_values(record: &csv::StringRecord, column_count: usize) -> String {
    let mut values = Vec::with_capacity(column_count);
    for index in 0..column_count {
        match record.get(index) {
            Some(field) if !field.is_empty() => {
                values.push(format!("'{}'", field.replace('\'', "''")));
            }
            _ => values.push("NULL".to_string()),
        }
    }
    format!("({})", values.join(", "))
}
