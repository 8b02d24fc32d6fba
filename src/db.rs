//! Database handle capability.
//!
//! The core components never talk to SQL Server directly; they go through
//! [`DbHandle`], a synchronous, blocking seam. Production code plugs in
//! [`crate::client::MssqlClient`]; tests plug in a recording fake.

use crate::error::ImportError;

/// One row from a metadata query, fields in select-list order. `None` is SQL
/// NULL.
pub type QueryRow = Vec<Option<String>>;

/// Blocking database capability: one connection, one transaction at a time.
pub trait DbHandle {
    /// Runs a parameterized read-only query and materializes all rows.
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<QueryRow>, ImportError>;

    /// Executes a statement inside the current transaction.
    fn execute(&mut self, sql: &str) -> Result<(), ImportError>;

    /// Commits the current transaction, if one is open.
    fn commit(&mut self) -> Result<(), ImportError>;

    /// Rolls back the current transaction, if one is open.
    fn rollback(&mut self) -> Result<(), ImportError>;

    /// Releases the connection. Best-effort; called on every exit path.
    fn close(&mut self);
}

/// Runs `operation` against the handle and closes it afterwards, on success
/// and failure alike. All invocation entry points route through this so the
/// handle cannot leak past a failed run.
pub fn with_teardown<T>(
    db: &mut dyn DbHandle,
    operation: impl FnOnce(&mut dyn DbHandle) -> Result<T, ImportError>,
) -> Result<T, ImportError> {
    let result = operation(db);
    db.close();
    result
}
