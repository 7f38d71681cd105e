use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use multidb::{
    connect_adapter, ColumnMapping, ConfirmationPolicy, ConnectionParams, CsvImportPipeline, DatabaseAdapter,
    EngineKind, ImportRequest, ImportStatus, NetworkParams, ProposedAction, QueryResult, Scalar,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "multidb")]
#[command(about = "Query, inspect and load MySQL, PostgreSQL, SQLite and DuckDB databases")]
struct Args {
    /// Database engine
    #[arg(long, value_enum)]
    engine: EngineKind,

    /// Server host (MySQL, PostgreSQL)
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(short, long)]
    user: Option<String>,

    /// Password (or set DB_PASSWORD, also read from .env)
    #[arg(short, long)]
    password: Option<String>,

    /// Database name, or the database file for SQLite and DuckDB
    #[arg(short, long)]
    database: Option<String>,

    #[arg(long)]
    charset: Option<String>,

    #[arg(long)]
    ssl_disabled: bool,

    /// Connect timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one SQL statement
    Exec {
        sql: String,
        /// Positional bind parameter, repeatable (`null`, numbers, or text)
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// List databases
    Databases,
    /// List tables in the current database
    Tables,
    /// Describe the columns of a table
    Columns { table: String },
    /// Import a CSV file into a table
    Import {
        csv: PathBuf,
        table: String,
        /// Create the table from the CSV when it does not exist
        #[arg(long)]
        create_table: bool,
        #[arg(long, default_value_t = multidb::ingestion::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Explicit CSV=COLUMN mapping, repeatable
        #[arg(long = "map", value_parser = parse_mapping_pair)]
        map: Vec<(String, String)>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
        /// Abort instead of importing when some CSV columns cannot be mapped
        #[arg(long)]
        strict_mapping: bool,
    },
}

fn parse_mapping_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((header, column)) if !header.is_empty() && !column.trim().is_empty() => {
            Ok((header.to_string(), column.trim().to_string()))
        }
        _ => Err(format!("expected CSV=COLUMN, got '{}'", raw)),
    }
}

/// Asks on the terminal; anything but `y`/`yes` declines.
struct TerminalPrompt;

impl ConfirmationPolicy for TerminalPrompt {
    fn approve(&mut self, action: &ProposedAction) -> bool {
        eprint!("{} [y/N] ", action);
        if io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let params = connection_params(&args);
    let mut adapter = connect_adapter(params).context("could not connect")?;
    info!(engine = %adapter.engine(), uri = %adapter.redacted_uri(), "connected");

    let outcome = run_command(&args, adapter.as_mut());
    adapter.close();
    outcome
}

fn run_command(args: &Args, adapter: &mut dyn DatabaseAdapter) -> Result<()> {
    match &args.command {
        Command::Exec { sql, params } => {
            let params: Vec<Scalar> = params.iter().map(|p| Scalar::parse_literal(p)).collect();
            print_result(&adapter.execute(sql, &params), args.json)
        }
        Command::Databases => print_result(&adapter.list_databases(), args.json),
        Command::Tables => print_result(&adapter.list_tables(), args.json),
        Command::Columns { table } => print_result(&adapter.list_columns(table), args.json),
        Command::Import {
            csv,
            table,
            create_table,
            chunk_size,
            map,
            yes,
            strict_mapping,
        } => {
            let mut request = ImportRequest::new(csv, table);
            request.create_table_if_missing = *create_table;
            request.chunk_size = *chunk_size;
            request.interactive = !*yes;
            request.allow_partial_mapping = !*strict_mapping;
            if !map.is_empty() {
                request.column_mapping = Some(ColumnMapping::from_pairs(map.iter().cloned())?);
            }

            let quiet = args.json;
            let result = CsvImportPipeline::new(adapter)
                .with_confirmation(TerminalPrompt)
                .with_progress(|event| {
                    if !quiet {
                        eprintln!(
                            "  chunk {}: {} rows ({:.0} rows/s)",
                            event.chunk_index, event.rows_so_far, event.rows_per_second
                        );
                    }
                })
                .import(&request);

            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                if let Some(ddl) = &result.ddl {
                    println!("Created table:\n{}", ddl);
                }
                if !result.unmapped_columns.is_empty() {
                    println!("Skipped CSV columns: {}", result.unmapped_columns.join(", "));
                }
                println!("{}", result.message);
            }
            if result.status == ImportStatus::Failed {
                bail!("import into '{}' failed", table);
            }
            Ok(())
        }
    }
}

fn connection_params(args: &Args) -> ConnectionParams {
    let password = args.password.clone().or_else(|| std::env::var("DB_PASSWORD").ok());
    let network = |mut p: NetworkParams| {
        if let Some(host) = &args.host {
            p.host = host.clone();
        }
        if let Some(port) = args.port {
            p.port = port;
        }
        if let Some(user) = &args.user {
            p.user = user.clone();
        }
        if args.database.is_some() {
            p.database = args.database.clone();
        }
        if args.charset.is_some() {
            p.charset = args.charset.clone();
        }
        if let Some(timeout) = args.timeout {
            p.timeout_secs = timeout;
        }
        p.password = password.clone();
        p.ssl_disabled = args.ssl_disabled;
        p
    };

    match ConnectionParams::defaults_for(args.engine) {
        ConnectionParams::MySql(p) => ConnectionParams::MySql(network(p)),
        ConnectionParams::Postgres(p) => ConnectionParams::Postgres(network(p)),
        ConnectionParams::Sqlite(mut p) => {
            if let Some(path) = &args.database {
                p.database_path = path.clone();
            }
            ConnectionParams::Sqlite(p)
        }
        ConnectionParams::DuckDb(mut p) => {
            if let Some(path) = &args.database {
                p.database_path = path.clone();
            }
            ConnectionParams::DuckDb(p)
        }
    }
}

fn print_result(result: &QueryResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        match result {
            QueryResult::Rows { columns, rows } => print_table(columns, rows),
            QueryResult::Effect { message, .. } => println!("{}", message),
            QueryResult::Failure { detail, .. } => eprintln!("Error: {}", detail),
        }
    }
    if let QueryResult::Failure { kind, detail } = result {
        bail!("{:?} failure: {}", kind, detail);
    }
    Ok(())
}

fn print_table(columns: &[String], rows: &[Vec<Scalar>]) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            cells
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|c| c.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("{}", line(columns));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in &cells {
        println!("{}", line(row.as_slice()));
    }
    println!("({} row(s))", rows.len());
}
