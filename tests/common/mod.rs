#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use sql_import::db::{DbHandle, QueryRow};
use sql_import::error::ImportError;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Recording in-memory stand-in for a SQL Server connection.
///
/// Every executed statement is captured in order; queries answer with a
/// canned column-metadata result. A statement containing `fail_on` fails
/// with a fake engine error, which lets tests drive the failure paths.
pub struct FakeDb {
    pub columns_result: Vec<QueryRow>,
    pub statements: Vec<String>,
    pub queries: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
    pub closed: bool,
    pub fail_on: Option<String>,
    pub fail_queries: bool,
}

impl FakeDb {
    pub fn new(columns: &[(&str, &str, i64)]) -> Self {
        let columns_result = columns
            .iter()
            .map(|(name, declared, max_length)| {
                vec![
                    Some(name.to_string()),
                    Some(declared.to_string()),
                    (*max_length >= 0).then(|| max_length.to_string()),
                ]
            })
            .collect();
        Self {
            columns_result,
            statements: Vec::new(),
            queries: Vec::new(),
            commits: 0,
            rollbacks: 0,
            closed: false,
            fail_on: None,
            fail_queries: false,
        }
    }

    /// Any later statement containing `marker` fails.
    pub fn fail_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn statements_containing(&self, marker: &str) -> Vec<&String> {
        self.statements
            .iter()
            .filter(|sql| sql.contains(marker))
            .collect()
    }

    pub fn position_of(&self, marker: &str) -> Option<usize> {
        self.statements.iter().position(|sql| sql.contains(marker))
    }
}

impl DbHandle for FakeDb {
    fn query(&mut self, sql: &str, _params: &[&str]) -> Result<Vec<QueryRow>, ImportError> {
        self.queries.push(sql.to_string());
        if self.fail_queries {
            return Err(ImportError::statement(sql, "fake query failure"));
        }
        Ok(self.columns_result.clone())
    }

    fn execute(&mut self, sql: &str) -> Result<(), ImportError> {
        self.statements.push(sql.to_string());
        if let Some(marker) = &self.fail_on {
            if sql.contains(marker.as_str()) {
                return Err(ImportError::statement(sql, "fake engine failure"));
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ImportError> {
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ImportError> {
        self.rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
