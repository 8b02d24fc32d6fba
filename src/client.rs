//! SQL Server client: a blocking facade over the async `tiberius` driver.
//!
//! The rest of the crate is synchronous, so the client owns a private
//! current-thread tokio runtime and blocks on every call. Connections run
//! with IMPLICIT_TRANSACTIONS ON so that commit/rollback from [`DbHandle`]
//! are real transaction boundaries rather than no-ops under autocommit.

use std::time::Duration;

use log::{debug, info};
use tiberius::{AuthMethod, Client, ColumnData, Config};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::db::{DbHandle, QueryRow};
use crate::error::ImportError;

/// How to authenticate against the server.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Integrated authentication (Windows only).
    Trusted,
    /// SQL Server login.
    SqlLogin { username: String, password: String },
}

/// Connection coordinates for one invocation.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub server: String,
    pub port: u16,
    pub database: String,
    pub credentials: Credentials,
    /// Statement timeout. Statements exceeding it fail the invocation.
    pub timeout: Duration,
}

pub struct MssqlClient {
    runtime: Runtime,
    client: Option<Client<Compat<TcpStream>>>,
    timeout: Duration,
}

impl std::fmt::Debug for MssqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MssqlClient {
    /// Opens a connection and switches the session to implicit transactions.
    pub fn connect(options: &ConnectOptions) -> Result<Self, ImportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ImportError::Connection(err.to_string()))?;

        let mut config = Config::new();
        config.host(&options.server);
        config.port(options.port);
        config.database(&options.database);
        config.trust_cert();
        match &options.credentials {
            Credentials::SqlLogin { username, password } => {
                config.authentication(AuthMethod::sql_server(username, password));
            }
            Credentials::Trusted => {
                #[cfg(windows)]
                config.authentication(AuthMethod::Integrated);
                #[cfg(not(windows))]
                return Err(ImportError::Connection(
                    "trusted (integrated) authentication is only available on Windows".into(),
                ));
            }
        }

        let client = runtime
            .block_on(async {
                let tcp = TcpStream::connect(config.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Client::connect(config, tcp.compat_write())
                    .await
                    .map_err(|err| std::io::Error::other(err.to_string()))
            })
            .map_err(|err| ImportError::Connection(err.to_string()))?;

        let mut handle = Self {
            runtime,
            client: Some(client),
            timeout: options.timeout,
        };
        handle.run_statement("SET IMPLICIT_TRANSACTIONS ON")?;
        info!(
            "Connected to {}:{}/{}",
            options.server, options.port, options.database
        );
        Ok(handle)
    }

    fn run_statement(&mut self, sql: &str) -> Result<(), ImportError> {
        let timeout = self.timeout;
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| ImportError::Connection("connection already closed".into()))?;
        self.runtime
            .block_on(async {
                tokio::time::timeout(timeout, client.execute(sql, &[]))
                    .await
                    .map_err(|_| format!("timed out after {}s", timeout.as_secs()))?
                    .map_err(|err| err.to_string())
            })
            .map(|_| ())
            .map_err(|detail| ImportError::statement(sql, detail))
    }
}

impl DbHandle for MssqlClient {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<QueryRow>, ImportError> {
        let timeout = self.timeout;
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| ImportError::Connection("connection already closed".into()))?;
        let owned_params: Vec<&dyn tiberius::ToSql> =
            params.iter().map(|param| param as &dyn tiberius::ToSql).collect();
        let rows = self
            .runtime
            .block_on(async {
                let stream = tokio::time::timeout(timeout, client.query(sql, &owned_params))
                    .await
                    .map_err(|_| format!("timed out after {}s", timeout.as_secs()))?
                    .map_err(|err| err.to_string())?;
                stream
                    .into_first_result()
                    .await
                    .map_err(|err| err.to_string())
            })
            .map_err(|detail| ImportError::statement(sql, detail))?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(column_to_string).collect())
            .collect())
    }

    fn execute(&mut self, sql: &str) -> Result<(), ImportError> {
        self.run_statement(sql)
    }

    fn commit(&mut self) -> Result<(), ImportError> {
        self.run_statement("IF @@TRANCOUNT > 0 COMMIT TRANSACTION")
    }

    fn rollback(&mut self) -> Result<(), ImportError> {
        self.run_statement("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(err) = self.runtime.block_on(client.close()) {
                debug!("Error closing connection: {err}");
            } else {
                info!("Database connection closed");
            }
        }
    }
}

impl Drop for MssqlClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stringly projection of a result cell. The metadata queries this client
/// serves only return text and integer cells; anything else maps to NULL.
fn column_to_string(data: ColumnData<'static>) -> Option<String> {
    match data {
        ColumnData::String(value) => value.map(|cow| cow.into_owned()),
        ColumnData::U8(value) => value.map(|v| v.to_string()),
        ColumnData::I16(value) => value.map(|v| v.to_string()),
        ColumnData::I32(value) => value.map(|v| v.to_string()),
        ColumnData::I64(value) => value.map(|v| v.to_string()),
        ColumnData::F32(value) => value.map(|v| v.to_string()),
        ColumnData::F64(value) => value.map(|v| v.to_string()),
        ColumnData::Bit(value) => value.map(|v| v.to_string()),
        _ => None,
    }
}
