//! Top-level CLI definition and dispatch.

use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use colored::{Color, Colorize, control};
use log::info;
use serde::Serialize;
use thiserror::Error;

use logview::backend::sqlite::SqliteLogWriter;
use logview::buffer::{BufferConfig, Driver, DriverFactory, Line, ScreenBuffer};
use logview::cli::viewer::{self, ViewerConfig};
use logview::cli::{Severity, TIME_FORMAT, format_line, seed};
use logview::core::config::Config;
use logview::core::errors::LvError;
use logview::filter::{
    DATETIME_FORMAT, DEFAULT_TABLE, FilterState, facility_from_name, is_plain_identifier,
    level_from_name,
};

/// Terminal viewer for syslog records stored in a SQL table.
#[derive(Debug, Parser)]
#[command(
    name = "logview",
    author,
    version,
    about = "Scroll and filter syslog records stored in a database",
    long_about = None
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Write log output to this file.
    #[arg(long, global = true, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    #[command(flatten)]
    filter: FilterArgs,
    /// Subcommand to execute (defaults to `view`).
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Default, Args)]
struct FilterArgs {
    /// Severity ceiling, by name (`warning`) or code (`4`).
    #[arg(long, global = true, value_name = "LEVEL")]
    level: Option<String>,
    /// Facility by name (`cron`) or code (`15`); `all` for every facility.
    #[arg(long, global = true, value_name = "FACILITY")]
    facility: Option<String>,
    /// Host terms: `web1 db*` includes, `!web2` excludes.
    #[arg(long, global = true, value_name = "TERMS")]
    host: Option<String>,
    /// Program terms, same syntax as --host.
    #[arg(long, global = true, value_name = "TERMS")]
    program: Option<String>,
    /// Open at the first record on or after "YYYY-MM-DD HH:MM:SS".
    #[arg(long, global = true, value_name = "DATETIME")]
    since: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Interactive viewer (default).
    View,
    /// Print the most recent records and exit.
    Dump(DumpArgs),
    /// Create a SQLite log database seeded with synthetic records.
    InitDb(InitDbArgs),
}

#[derive(Debug, Clone, Args)]
struct DumpArgs {
    /// Number of lines to print.
    #[arg(long, default_value_t = 20, value_name = "N")]
    count: usize,
    /// Emit one JSON object per line.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args)]
struct InitDbArgs {
    /// Database file to create.
    #[arg(long, value_name = "PATH")]
    path: PathBuf,
    /// Table name.
    #[arg(long, default_value = DEFAULT_TABLE, value_name = "NAME")]
    table: String,
    /// Number of synthetic records.
    #[arg(long, default_value_t = 1000, value_name = "N")]
    count: usize,
}

/// Top-level CLI error.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input.
    #[error("{0}")]
    User(String),
    /// Library failure (config, backend, engine).
    #[error("{0}")]
    Lv(#[from] LvError),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output or terminal failure.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) | Self::Lv(LvError::InvalidFilter { .. }) => 1,
            Self::Lv(_) | Self::Json(_) | Self::Io(_) => 2,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let command = cli.command.clone().unwrap_or(Command::View);
    init_logging(cli.log.as_ref(), matches!(command, Command::View))?;
    if cli.no_color {
        control::set_override(false);
    }

    match &command {
        Command::View => run_view(cli),
        Command::Dump(args) => run_dump(cli, args),
        Command::InitDb(args) => run_init_db(args),
    }
}

/// `--log` sends logs to a file; otherwise only non-interactive commands log
/// (to stderr), since the viewer owns the terminal.
fn init_logging(log: Option<&PathBuf>, interactive: bool) -> Result<(), CliError> {
    if let Some(path) = log {
        let file = File::create(path).map_err(|source| LvError::io(path, source))?;
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if !interactive {
        env_logger::init();
    }
    Ok(())
}

fn build_filter(args: &FilterArgs) -> Result<FilterState, CliError> {
    let mut filter = FilterState::new();
    if let Some(level) = &args.level {
        filter.set_level(level_from_name(level)?);
    }
    if let Some(facility) = &args.facility {
        filter.set_facility(facility_from_name(facility)?)?;
    }
    if let Some(host) = &args.host {
        filter.set_host(host.as_str());
    }
    if let Some(program) = &args.program {
        filter.set_program(program.as_str());
    }
    if let Some(since) = &args.since {
        let start = NaiveDateTime::parse_from_str(since, DATETIME_FORMAT).map_err(|e| {
            CliError::User(format!(
                "invalid --since `{since}` (expected YYYY-MM-DD HH:MM:SS): {e}"
            ))
        })?;
        filter.set_start_date(Some(start));
    }
    Ok(filter)
}

// ──────────────────── view ────────────────────

fn run_view(cli: &Cli) -> Result<(), CliError> {
    if !io::stdout().is_terminal() {
        return Err(CliError::User(
            "the viewer needs a terminal; use `logview dump` for pipes".to_string(),
        ));
    }
    let filter = build_filter(&cli.filter)?;
    let config = Config::load(cli.config.as_deref())?;
    let factory = config.driver_factory()?;
    let viewer_config = ViewerConfig {
        buffer: config.buffer_config(1),
        color: !cli.no_color,
    };
    viewer::run(&factory, filter, &viewer_config)?;
    Ok(())
}

// ──────────────────── dump ────────────────────

#[derive(Debug, Serialize)]
struct LineJson<'a> {
    id: i64,
    datetime: String,
    host: &'a str,
    program: &'a str,
    facility: &'a str,
    level: &'a str,
    message: &'a str,
    continuation: bool,
}

impl<'a> From<&'a Line> for LineJson<'a> {
    fn from(line: &'a Line) -> Self {
        Self {
            id: line.id(),
            datetime: line.datetime().format(DATETIME_FORMAT).to_string(),
            host: line.host(),
            program: line.program(),
            facility: line.facility(),
            level: line.level(),
            message: line.message(),
            continuation: line.is_continuation(),
        }
    }
}

fn run_dump(cli: &Cli, args: &DumpArgs) -> Result<(), CliError> {
    if args.count == 0 {
        return Err(CliError::User("--count must be at least 1".to_string()));
    }
    let filter = build_filter(&cli.filter)?;
    let config = Config::load(cli.config.as_deref())?;
    let factory = config.driver_factory()?;
    let lines = fetch_page(&factory, &filter, args.count)?;
    info!("dump: {} lines", lines.len());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in &lines {
        if args.json {
            serde_json::to_writer(&mut out, &LineJson::from(line))?;
            writeln!(out)?;
        } else {
            let color = severity_color(Severity::of(line.level()));
            writeln!(out, "{}", format_line(line).color(color))?;
        }
    }
    out.flush()?;
    Ok(())
}

/// One synchronous refill pass on a cache sized to a single page.
fn fetch_page<F: DriverFactory>(
    factory: &F,
    filter: &FilterState,
    count: usize,
) -> Result<Vec<Line>, CliError> {
    let buffer = ScreenBuffer::with_config(&BufferConfig::new(count).with_buffer_size(1));
    let mut driver = factory.create_driver(filter);
    driver.start_connection()?;
    let result = buffer.refill(&mut driver);
    driver.stop_connection();
    result?;
    Ok(buffer.current_lines())
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Urgent => Color::Magenta,
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Notice => Color::Cyan,
        Severity::Debug => Color::BrightBlack,
        Severity::Normal => Color::White,
    }
}

// ──────────────────── init-db ────────────────────

fn run_init_db(args: &InitDbArgs) -> Result<(), CliError> {
    if !is_plain_identifier(&args.table) {
        return Err(CliError::User(format!(
            "--table `{}` must be a plain identifier",
            args.table
        )));
    }
    let mut writer = SqliteLogWriter::open(&args.path, &args.table)?;
    let now = Local::now().naive_local();
    let written = writer.append_all(&seed::synthetic_entries(args.count, now))?;
    println!(
        "wrote {written} records to {} (table {}, newest before {})",
        args.path.display(),
        args.table,
        now.format(TIME_FORMAT)
    );
    Ok(())
}
