pub mod audit;
pub mod cli;
pub mod client;
pub mod db;
pub mod error;
pub mod format;
pub mod insert;
pub mod job;
pub mod load;
pub mod normalize;
pub mod schema;

use std::time::Duration;
use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{AuditArgs, Cli, Commands, ConnectionArgs, JobArgs, LoadArgs};
use crate::client::{ConnectOptions, Credentials, MssqlClient};
use crate::db::DbHandle;
use crate::load::LoadOptions;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sql_import", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Audit(args) => handle_audit(&args),
        Commands::Job(args) => handle_job(&args),
    }
}

fn handle_load(args: &LoadArgs) -> Result<()> {
    let delimiter = resolve_input_delimiter(&args.input, args.delimiter);
    let mut options = LoadOptions {
        skip_header: args.first_row_columns || args.skip_header_row,
        truncate: args.truncate,
        manage_constraints: args.manage_constraints,
        manage_indexes: args.manage_indexes,
        table_lock: args.table_lock,
        max_errors: args.max_errors,
        batch_size: args.batch_size,
        timeout_secs: args.timeout,
    };
    if args.high_performance {
        options.apply_high_performance();
    }

    info!(
        "Loading '{}' into {} (delimiter '{}')",
        args.input.display(),
        args.table,
        printable_delimiter(delimiter)
    );

    let mut client = connect(&args.connection, options.timeout_secs)?;
    let result = db::with_teardown(&mut client, |db| {
        if args.row_inserts {
            run_row_inserts(db, args, delimiter, &options)
        } else {
            load::run_import(db, &args.input, &args.table, delimiter, &options)
                .map(|report| report.rows_loaded)
        }
    });

    let rows = result.with_context(|| format!("Loading {:?} into {}", args.input, args.table))?;
    info!("Loaded {} row(s) into {}", rows, args.table);
    Ok(())
}

fn run_row_inserts(
    db: &mut dyn DbHandle,
    args: &LoadArgs,
    delimiter: u8,
    options: &LoadOptions,
) -> Result<u64, error::ImportError> {
    if options.truncate {
        load::truncate_table(db, &args.table)?;
    }
    let columns = schema::get_columns(db, &args.table)?;
    insert::load_with_inserts(
        db,
        &args.input,
        &args.table,
        &columns,
        delimiter,
        options.skip_header,
        options.batch_size,
    )
}

fn handle_audit(args: &AuditArgs) -> Result<()> {
    let delimiter = resolve_input_delimiter(&args.input, args.delimiter);
    info!(
        "Auditing '{}' against table {} (delimiter '{}')",
        args.input.display(),
        args.table,
        printable_delimiter(delimiter)
    );

    let mut client = connect(&args.connection, 600)?;
    let columns = db::with_teardown(&mut client, |db| schema::get_columns(db, &args.table))
        .with_context(|| format!("Reading columns of {}", args.table))?;

    let problems = audit::audit(&args.input, &columns, delimiter, args.skip_header_row)
        .with_context(|| format!("Auditing {:?}", args.input))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&problems)?);
        return Ok(());
    }
    if problems.is_empty() {
        println!("No data length problems found.");
        return Ok(());
    }
    println!("Found {} potential issue(s):", problems.len());
    for problem in &problems {
        println!(
            "Row {}, Column '{}': data length {} exceeds max allowed {}",
            problem.row_number, problem.column, problem.data_length, problem.max_allowed
        );
        println!("  Data: {}", problem.data);
    }
    Ok(())
}

fn handle_job(args: &JobArgs) -> Result<()> {
    let raw = if args.request == std::path::Path::new("-") {
        std::io::read_to_string(std::io::stdin().lock()).context("Reading job request from stdin")?
    } else {
        fs::read_to_string(&args.request)
            .with_context(|| format!("Reading job request {:?}", args.request))?
    };

    let outcome = match serde_json::from_str::<job::JobRequest>(&raw) {
        Ok(request) => job::run_job(&request),
        Err(err) => job::JobOutcome {
            status_code: 400,
            body: format!("Invalid job request: {err}"),
        },
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if outcome.status_code >= 400 {
        bail!("job finished with status {}", outcome.status_code);
    }
    Ok(())
}

fn connect(connection: &ConnectionArgs, timeout_secs: u64) -> Result<MssqlClient> {
    let credentials = if connection.trusted {
        Credentials::Trusted
    } else {
        match (&connection.username, &connection.password) {
            (Some(username), Some(password)) => Credentials::SqlLogin {
                username: username.clone(),
                password: password.clone(),
            },
            _ => bail!("--username and --password are required unless --trusted is set"),
        }
    };
    let options = ConnectOptions {
        server: connection.server.clone(),
        port: connection.port,
        database: connection.database.clone(),
        credentials,
        timeout: Duration::from_secs(timeout_secs),
    };
    let client = MssqlClient::connect(&options).with_context(|| {
        format!(
            "Connecting to {}:{}/{}",
            connection.server, connection.port, connection.database
        )
    })?;
    Ok(client)
}

pub(crate) fn resolve_input_delimiter(path: &std::path::Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    })
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
