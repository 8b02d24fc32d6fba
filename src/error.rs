use thiserror::Error;

/// Fatal error taxonomy for a single import or audit invocation.
///
/// Every variant unwinds the whole invocation; the orchestration guarantees
/// connection teardown and scratch-file cleanup before any of these reach the
/// caller. Post-commit restore failures (index rebuild, constraint re-enable)
/// are deliberately absent: they are logged warnings, not errors.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Could not establish a database handle. Nothing was mutated.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The destination table or its columns could not be resolved.
    #[error("schema lookup failed for table '{table}': {detail}")]
    Schema { table: String, detail: String },

    /// Source file unreadable or scratch file uncreatable.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The bulk-load facility rejected or aborted the load. Carries the
    /// failing statement and any engine-provided diagnostic detail.
    #[error("bulk load failed: {detail}\nstatement: {statement}")]
    Load { statement: String, detail: String },

    /// Any other statement the engine refused to execute.
    #[error("statement failed: {detail}\nstatement: {statement}")]
    Db { statement: String, detail: String },
}

impl ImportError {
    pub fn schema(table: &str, detail: impl Into<String>) -> Self {
        ImportError::Schema {
            table: table.to_string(),
            detail: detail.into(),
        }
    }

    pub fn statement(statement: &str, detail: impl Into<String>) -> Self {
        ImportError::Db {
            statement: statement.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => ImportError::Io(io),
            other => ImportError::Io(std::io::Error::other(format!("{other:?}"))),
        }
    }
}
