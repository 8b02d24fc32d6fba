//! Event-trigger entry point.
//!
//! Batch frameworks and serverless triggers hand over a structured job
//! description instead of CLI flags. [`run_job`] validates it, runs the
//! import, and returns a structured outcome; errors become status payloads
//! rather than panics so the calling framework always gets an answer. The
//! source file is expected to be staged locally by the caller (object-store
//! download is the wrapper's job, not ours).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::client::{ConnectOptions, Credentials, MssqlClient};
use crate::db;
use crate::load::{self, LoadOptions};

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_port() -> u16 {
    1433
}

/// Structured job description, typically parsed from trigger-event JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub source_path: PathBuf,
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub table: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub skip_header: bool,
    #[serde(default)]
    pub truncate: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub trusted_connection: bool,
    #[serde(default)]
    pub manage_constraints: bool,
    #[serde(default)]
    pub manage_indexes: bool,
}

/// Structured status result handed back to the trigger framework.
#[derive(Debug, Serialize)]
pub struct JobOutcome {
    pub status_code: u16,
    pub body: String,
}

impl JobOutcome {
    fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    fn failed(status_code: u16, body: String) -> Self {
        Self { status_code, body }
    }
}

/// Runs one import described by `request`. Never returns an error: failures
/// are folded into the outcome so the invoking framework can report them.
pub fn run_job(request: &JobRequest) -> JobOutcome {
    info!(
        "Job received: load '{}' into {} on {}/{}",
        request.source_path.display(),
        request.table,
        request.server,
        request.database
    );
    match execute(request) {
        Ok(rows) => JobOutcome::ok(format!(
            "Successfully imported {} ({} row(s)) into {}",
            request.source_path.display(),
            rows,
            request.table
        )),
        Err(err) => {
            error!("Job failed: {err:#}");
            JobOutcome::failed(500, format!("Error importing data: {err:#}"))
        }
    }
}

fn execute(request: &JobRequest) -> Result<u64> {
    let delimiter = crate::cli::parse_delimiter(&request.delimiter)
        .map_err(anyhow::Error::msg)
        .context("Invalid delimiter in job request")?;

    let credentials = if request.trusted_connection {
        Credentials::Trusted
    } else {
        match (&request.username, &request.password) {
            (Some(username), Some(password)) => Credentials::SqlLogin {
                username: username.clone(),
                password: password.clone(),
            },
            _ => anyhow::bail!(
                "username and password are required unless trusted_connection is set"
            ),
        }
    };

    let options = LoadOptions {
        skip_header: request.skip_header,
        truncate: request.truncate,
        manage_constraints: request.manage_constraints,
        manage_indexes: request.manage_indexes,
        ..LoadOptions::default()
    };
    let connect = ConnectOptions {
        server: request.server.clone(),
        port: request.port,
        database: request.database.clone(),
        credentials,
        timeout: Duration::from_secs(options.timeout_secs),
    };

    let mut client = MssqlClient::connect(&connect)?;
    let report = db::with_teardown(&mut client, |db| {
        load::run_import(db, &request.source_path, &request.table, delimiter, &options)
    })
    .with_context(|| format!("Importing into {}", request.table))?;
    Ok(report.rows_loaded)
}
