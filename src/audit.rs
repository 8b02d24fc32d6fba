//! Pre-flight length audit.
//!
//! Streams the raw delimited file and reports every field whose character
//! length exceeds the destination column's declared maximum. Violations are
//! normal structured output, not errors: the audit is informational and
//! never touches the database or the source file.

use std::path::Path;

use log::info;
use serde::Serialize;

use crate::error::ImportError;
use crate::schema::ColumnMetadata;

const PROGRESS_EVERY: u64 = 10_000;

/// Width of the display excerpt carried on each violation.
const EXCERPT_LIMIT: usize = 50;

/// One oversized field value. `row_number` is 1-based over data rows (a
/// skipped header is not counted).
#[derive(Debug, Clone, Serialize)]
pub struct ProblemRow {
    pub row_number: u64,
    pub column: String,
    pub data_length: usize,
    pub max_allowed: i64,
    pub data: String,
}

/// Scans `source` and returns every length violation in row order.
///
/// A field is reported only when it is non-empty, its column is a
/// character-family type, the column's declared maximum is positive, and the
/// field's character count exceeds that maximum. Fields past the column
/// count are ignored.
pub fn audit(
    source: &Path,
    columns: &[ColumnMetadata],
    delimiter: u8,
    skip_header: bool,
) -> Result<Vec<ProblemRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(skip_header)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(source)?;

    info!(
        "Auditing '{}' against {} column(s)",
        source.display(),
        columns.len()
    );

    let mut problems = Vec::new();
    let mut row_number = 0u64;
    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        row_number += 1;
        for (index, column) in columns.iter().enumerate() {
            let Some(field) = record.get(index) else {
                break;
            };
            if field.is_empty() || !column.declared_type.is_character() || column.max_length <= 0 {
                continue;
            }
            let data_length = field.chars().count();
            if data_length as i64 > column.max_length {
                problems.push(ProblemRow {
                    row_number,
                    column: column.name.clone(),
                    data_length,
                    max_allowed: column.max_length,
                    data: excerpt(field),
                });
            }
        }
        if row_number % PROGRESS_EVERY == 0 {
            info!("Audited {row_number} row(s)...");
        }
    }

    info!(
        "Audit finished: {} violation(s) across {} row(s)",
        problems.len(),
        row_number
    );
    Ok(problems)
}

/// Truncates a value to at most [`EXCERPT_LIMIT`] display characters, ending
/// in `...` when shortened.
fn excerpt(value: &str) -> String {
    if value.chars().count() <= EXCERPT_LIMIT {
        return value.to_string();
    }
    let mut shortened: String = value.chars().take(EXCERPT_LIMIT - 3).collect();
    shortened.push_str("...");
    shortened
}
