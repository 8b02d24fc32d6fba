//! Bulk-load orchestration.
//!
//! A single invocation walks the sequence truncate -> introspect -> disable
//! constraints/indexes -> normalize -> build format file -> BULK INSERT ->
//! rebuild/re-enable, committing the load on success and rolling back on
//! failure. The truncate step commits before the load runs and is not undone
//! by a later load failure; that non-atomicity is part of the contract.
//!
//! Scratch files (normalized CSV, format file) are owned by RAII handles and
//! disappear on every exit path. Post-commit restore steps (index rebuild,
//! constraint re-enable) are best-effort: a failure there is logged as a
//! warning and never escalated, so a committed load is not masked by a
//! cleanup error.

use std::path::Path;
use std::time::Instant;

use log::{info, warn};

use crate::db::DbHandle;
use crate::error::ImportError;
use crate::format::{self, LoadDescriptor};
use crate::normalize;
use crate::schema;

/// Knobs for one load invocation.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Drop the first line of the source file before loading.
    pub skip_header: bool,
    /// TRUNCATE TABLE before loading. Irreversible without a backup.
    pub truncate: bool,
    /// NOCHECK all constraints before the load, CHECK them after.
    pub manage_constraints: bool,
    /// Disable all indexes before the load, rebuild them after.
    pub manage_indexes: bool,
    /// Request an exclusive table lock (TABLOCK) for throughput.
    pub table_lock: bool,
    /// Row-level errors tolerated before the engine aborts the load.
    /// Zero means all-or-nothing.
    pub max_errors: u32,
    /// Rows per batch for the fallback row-insert loader.
    pub batch_size: usize,
    /// Statement timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_header: false,
            truncate: false,
            manage_constraints: false,
            manage_indexes: false,
            table_lock: false,
            max_errors: 0,
            batch_size: 5_000,
            timeout_secs: 600,
        }
    }
}

impl LoadOptions {
    /// Preset bundling the throughput options: larger batches, longer
    /// timeout, constraint and index management, table lock.
    pub fn apply_high_performance(&mut self) {
        self.batch_size = 10_000;
        self.timeout_secs = 1_200;
        self.manage_constraints = true;
        self.manage_indexes = true;
        self.table_lock = true;
    }
}

/// Summary of a completed load.
#[derive(Debug)]
pub struct LoadReport {
    pub table: String,
    pub rows_loaded: u64,
    pub elapsed_secs: f64,
}

/// Runs the full import sequence against an established handle.
///
/// The caller owns the handle and must close it afterwards; everything else
/// (rollback on failure, scratch cleanup, best-effort restores) happens in
/// here.
pub fn run_import(
    db: &mut dyn DbHandle,
    source: &Path,
    table: &str,
    delimiter: u8,
    options: &LoadOptions,
) -> Result<LoadReport, ImportError> {
    let started = Instant::now();
    let result = run_steps(db, source, table, delimiter, options);
    match result {
        Ok(rows_loaded) => {
            let elapsed_secs = started.elapsed().as_secs_f64();
            info!("Import into {table} completed in {elapsed_secs:.2}s");
            Ok(LoadReport {
                table: table.to_string(),
                rows_loaded,
                elapsed_secs,
            })
        }
        Err(err) => {
            if let Err(rollback_err) = db.rollback() {
                warn!("Rollback after failed import also failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

fn run_steps(
    db: &mut dyn DbHandle,
    source: &Path,
    table: &str,
    delimiter: u8,
    options: &LoadOptions,
) -> Result<u64, ImportError> {
    if options.truncate {
        truncate_table(db, table)?;
    }

    let columns = schema::get_columns(db, table)?;

    if options.manage_constraints {
        toggle(db, &format!("ALTER TABLE {table} NOCHECK CONSTRAINT ALL"))?;
        info!("Constraint checking disabled on {table}");
    }
    if options.manage_indexes {
        toggle(db, &format!("ALTER INDEX ALL ON {table} DISABLE"))?;
        info!("Indexes disabled on {table}");
    }

    let normalized = normalize::normalize(source, columns.len(), delimiter, options.skip_header)?;
    let descriptor = LoadDescriptor::build(&columns, delimiter as char);
    let format_file = format::write_format_file(&descriptor)?;

    bulk_insert(db, table, normalized.path(), format_file.path(), options)?;
    let rows_loaded = normalized.line_count();

    // The load is committed from here on; restore steps must not unwind it.
    if options.manage_indexes {
        restore(db, &format!("ALTER INDEX ALL ON {table} REBUILD"), "index rebuild");
    }
    if options.manage_constraints {
        restore(
            db,
            &format!("ALTER TABLE {table} WITH CHECK CHECK CONSTRAINT ALL"),
            "constraint re-enable",
        );
    }

    Ok(rows_loaded)
}

/// Truncates and commits immediately: a later load failure does not restore
/// the truncated rows.
pub fn truncate_table(db: &mut dyn DbHandle, table: &str) -> Result<(), ImportError> {
    db.execute(&format!("TRUNCATE TABLE {table}"))?;
    db.commit()?;
    info!("Table {table} truncated");
    Ok(())
}

fn toggle(db: &mut dyn DbHandle, sql: &str) -> Result<(), ImportError> {
    db.execute(sql)?;
    db.commit()
}

fn restore(db: &mut dyn DbHandle, sql: &str, what: &str) {
    if let Err(err) = db.execute(sql).and_then(|()| db.commit()) {
        warn!("Post-load {what} failed (load already committed): {err}");
    } else {
        info!("Post-load {what} completed");
    }
}

fn bulk_insert(
    db: &mut dyn DbHandle,
    table: &str,
    data_path: &Path,
    format_path: &Path,
    options: &LoadOptions,
) -> Result<(), ImportError> {
    db.execute("SET ARITHABORT ON")?;

    let mut with_clauses = vec![
        format!("FORMATFILE = '{}'", path_literal(format_path)),
        "FIRSTROW = 1".to_string(),
        format!("MAXERRORS = {}", options.max_errors),
    ];
    if options.table_lock {
        with_clauses.push("TABLOCK".to_string());
    }
    let statement = format!(
        "BULK INSERT {table} FROM '{}' WITH ({})",
        path_literal(data_path),
        with_clauses.join(", "),
    );

    info!("Executing: {statement}");
    match db.execute(&statement) {
        Ok(()) => {
            db.commit()?;
            info!("BULK INSERT completed");
            Ok(())
        }
        Err(ImportError::Db { detail, .. }) => Err(ImportError::Load { statement, detail }),
        Err(other) => Err(other),
    }
}

/// Renders a path as a single-quoted SQL literal body.
fn path_literal(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}
