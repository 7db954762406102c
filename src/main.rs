//! dbwrap CLI Entry Point
//!
//! Subcommands:
//! - `connect` - Validate a connection and optionally save it under a name
//! - `connections` - List saved connections
//! - `tables` - List the tables of a database
//! - `fields` - Describe the columns of a table
//! - `query` - Run a query with positional binds
//! - `exec` - Run a statement with positional binds
//!
//! All output to stdout is JSON-only. Logs go to stderr (`RUST_LOG`).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use dbwrap::{
    Client, ConfigLocation, ConnectionConfig, DatabaseType, Db, DbError, ErrorEnvelope, ErrorInfo,
    FetchOptions, Metadata, StoredConnection, SuccessEnvelope, TracingObserver, Value,
};

/// dbwrap - parameter-bound database helper CLI
#[derive(Parser)]
#[command(name = "dbwrap")]
#[command(about = "Run parameter-bound statements against MySQL or SQLite")]
#[command(version)]
struct Cli {
    /// Saved connection name (defaults to the registry default)
    #[arg(long, global = true, conflicts_with = "dsn")]
    name: Option<String>,

    /// PDO-style DSN, e.g. `mysql:host=localhost;dbname=test` or `sqlite:app.db`
    #[arg(long, global = true)]
    dsn: Option<String>,

    /// User for `--dsn`
    #[arg(long, global = true)]
    user: Option<String>,

    /// Password for `--dsn`
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a connection and optionally save it
    Connect {
        /// Read the password from this environment variable instead
        #[arg(long)]
        password_env: Option<String>,

        /// Save the connection under this name
        #[arg(long)]
        save_as: Option<String>,

        /// Save to the per-user config instead of `.dbwrap/config.json`
        #[arg(long, requires = "save_as")]
        global: bool,
    },

    /// List saved connections
    Connections,

    /// List the tables of a database
    Tables {
        /// Database (schema) name; `main` for SQLite
        dbname: String,
    },

    /// Describe the columns of a table
    Fields { table: String },

    /// Run a query and print its rows
    Query {
        sql: String,

        /// Positional bind value, parsed as JSON when possible
        #[arg(long = "bind")]
        binds: Vec<String>,

        #[arg(long, default_value_t = 0)]
        limit_start: u64,

        /// Page size; 0 disables paging
        #[arg(long, default_value_t = 0)]
        limit_step: u64,

        /// Stream rows instead of buffering the result set
        #[arg(long)]
        unbuffered: bool,
    },

    /// Run a statement and print the affected row count
    Exec {
        sql: String,

        #[arg(long = "bind")]
        binds: Vec<String>,
    },
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Connections => "connections",
            Self::Tables { .. } => "tables",
            Self::Fields { .. } => "fields",
            Self::Query { .. } => "query",
            Self::Exec { .. } => "exec",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let command = cli.command.name();

    let (engine, result) = match &cli.command {
        Commands::Connections => (String::new(), list_saved()),
        _ => match resolve_config(&cli) {
            Ok(config) => {
                let engine = config.engine.as_str().to_string();
                (engine, dispatch(&config, &cli.command).await)
            }
            Err(err) => (String::new(), Err(err)),
        },
    };

    match result {
        Ok((data, meta)) => {
            print_json(&SuccessEnvelope::new(engine, command, data, meta));
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "command failed");
            print_json(&ErrorEnvelope::new(engine, command, error_info(&err)));
            ExitCode::FAILURE
        }
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            let message = format!("Could not serialize output: {e}");
            let fallback = json!({
                "ok": false,
                "engine": "",
                "command": "",
                "error": { "code": "INTERNAL_ERROR", "message": message },
            });
            println!("{fallback}");
        }
    }
}

fn error_info(err: &anyhow::Error) -> ErrorInfo {
    match err.downcast_ref::<DbError>() {
        Some(db_err) => {
            let mut info = ErrorInfo::from(db_err);
            info.message = format!("{err:#}");
            info
        }
        None => ErrorInfo::new("INTERNAL_ERROR", format!("{err:#}")),
    }
}

/// `--dsn` wins over `--name`, which wins over the registry default
fn resolve_config(cli: &Cli) -> anyhow::Result<ConnectionConfig> {
    if let Some(dsn) = &cli.dsn {
        let mut config =
            ConnectionConfig::from_dsn(dsn, cli.user.as_deref(), cli.password.as_deref())?;
        if let Commands::Connect { password_env: Some(var), .. } = &cli.command {
            config.password = Some(
                std::env::var(var)
                    .with_context(|| format!("Environment variable {var} not found for password"))?,
            );
        }
        return Ok(config);
    }

    if matches!(cli.command, Commands::Connect { .. }) {
        bail!("connect requires --dsn");
    }

    let config = dbwrap::resolve_connection(cli.name.as_deref())
        .context("No --dsn given and no saved connection could be resolved")?;
    Ok(config)
}

fn list_saved() -> anyhow::Result<(serde_json::Value, Metadata)> {
    let start = Instant::now();
    let connections = dbwrap::list_connections()?;

    // Passwords never leave the config files
    let data: Vec<serde_json::Value> = connections
        .iter()
        .map(|(name, config)| {
            json!({
                "name": name,
                "engine": config.engine,
                "host": config.host,
                "database": config.database,
                "file": config.file,
            })
        })
        .collect();

    Ok((json!(data), Metadata::with_rows(elapsed_ms(start), data.len())))
}

async fn dispatch(
    config: &ConnectionConfig,
    command: &Commands,
) -> anyhow::Result<(serde_json::Value, Metadata)> {
    match config.engine {
        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => {
            let client = dbwrap::MySqlClient::connect(config).await?;
            run(Db::new(client), config, command).await
        }
        #[cfg(not(feature = "mysql"))]
        DatabaseType::MySQL => bail!("MySQL engine not enabled. Build with --features mysql"),

        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => {
            let client = dbwrap::SqliteClient::connect(config)?;
            run(Db::new(client), config, command).await
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseType::SQLite => bail!("SQLite engine not enabled. Build with --features sqlite"),
    }
}

async fn run<C: Client>(
    db: Db<C>,
    config: &ConnectionConfig,
    command: &Commands,
) -> anyhow::Result<(serde_json::Value, Metadata)> {
    let mut db = db.with_observer(TracingObserver);
    let start = Instant::now();

    let output = match command {
        Commands::Connect { password_env, save_as, global } => {
            let saved_to = match save_as {
                Some(name) => {
                    let mut stored = StoredConnection::new(config.clone());
                    if let Some(var) = password_env {
                        stored = stored.with_password_env(var);
                    }
                    let location =
                        if *global { ConfigLocation::Global } else { ConfigLocation::Local };
                    let path = dbwrap::save_connection(name, stored, location)?;
                    Some(path.display().to_string())
                }
                None => None,
            };
            let data = json!({
                "dialect": db.dialect(),
                "connection_name": save_as,
                "saved_to": saved_to,
            });
            (data, Metadata::new(elapsed_ms(start)))
        }

        Commands::Tables { dbname } => {
            let tables = db.show_tables(dbname).await?;
            let count = tables.len();
            (json!(tables), Metadata::with_rows(elapsed_ms(start), count))
        }

        Commands::Fields { table } => {
            let fields = db.show_fields(table).await?;
            let count = fields.len();
            let data: Vec<_> = fields.into_values().collect();
            (serde_json::to_value(data)?, Metadata::with_rows(elapsed_ms(start), count))
        }

        Commands::Query { sql, binds, limit_start, limit_step, unbuffered } => {
            let binds = parse_binds(binds);
            let mut opts = FetchOptions::page(*limit_start, *limit_step);
            if *unbuffered {
                opts = opts.unbuffered();
            }
            let rows = db.fetch_all(sql, &binds, opts).await?;
            let count = rows.len();
            (serde_json::to_value(rows)?, Metadata::with_rows(elapsed_ms(start), count))
        }

        Commands::Exec { sql, binds } => {
            if binds.is_empty() {
                let affected = db.exec(sql).await?;
                let meta = Metadata::with_affected(elapsed_ms(start), affected);
                (json!({ "rows_affected": affected }), meta)
            } else {
                let done = db.execute_sql(sql, &parse_binds(binds)).await?;
                let meta = Metadata::with_affected(elapsed_ms(start), done.rows_affected);
                (serde_json::to_value(done)?, meta)
            }
        }

        Commands::Connections => bail!("connections does not open a database"),
    };

    db.close().await?;
    Ok(output)
}

/// `--bind 5` binds an integer, `--bind null` binds NULL, anything that is not
/// JSON binds as text
fn parse_binds(raw: &[String]) -> Vec<Value> {
    raw.iter()
        .map(|s| {
            serde_json::from_str(s)
                .map_or_else(|_| Value::Text(s.clone()), Value::from_json)
        })
        .collect()
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
