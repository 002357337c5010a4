//! Purpose: `staffdb` CLI entry point.
//! Role: Binary crate root; parses args, opens the store, runs one mode, reports.
//! Invariants: The store is closed on every exit path (explicit close or drop).
//! Invariants: Unknown modes print a message and exit 0.
//! Invariants: Errors go to stderr (JSON when stderr is not a TTY); exit code from `to_exit_code`.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod bench;
mod command_dispatch;
mod db_paths;

use db_paths::default_db_path;
use staffdb::core::error::{Error, ErrorKind, to_exit_code};
use staffdb::core::record::Sex;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run(std::env::args_os()) {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run<I>(args: I) -> Result<RunOutcome, Error>
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `staffdb --help` for the list of modes."));
            }
        },
    };

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    command_dispatch::dispatch_mode(&cli, db_path)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    name = "staffdb",
    version,
    about = "Personnel registry backed by a single SQLite table",
    long_about = None,
    after_help = r#"MODES
  0  clear   Delete every worker and compact the file
  1  init    Create the workers table if it is missing
  2  add     Add one worker: staffdb 2 "<Surname Firstname Patronymic>" <YYYY-MM-DD> <Male|Female>
  3  list    List unique workers ordered by name, with ages
  4  fill    Replace the table with --rows random workers plus --special-rows F-surnamed men
  5  search  Find workers by --sex and --prefix (default: Male, F) and time the query
  6  index   Time the search, create the (sex, name) index, time it again

EXAMPLES
  $ staffdb 1
  $ staffdb 2 "Smith John Ivanovich" 1990-05-17 Male
  $ staffdb --rows 100000 4
  $ staffdb --json 6

NOTES
  - Default file: ./staff.db (override with --db or STAFFDB_PATH)
  - Set RUST_LOG=info to see store events on stderr"#,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    #[arg(
        long,
        help = "Backing database file (default: $STAFFDB_PATH or ./staff.db)",
        value_hint = ValueHint::FilePath
    )]
    pub(crate) db: Option<PathBuf>,
    #[arg(long, help = "Emit JSON on stdout instead of text")]
    pub(crate) json: bool,
    #[arg(
        long,
        default_value_t = 1_000_000,
        help = "Random workers to generate in fill mode"
    )]
    pub(crate) rows: u64,
    #[arg(
        long,
        default_value_t = 100,
        help = "Male F-surnamed workers added after the random ones in fill mode"
    )]
    pub(crate) special_rows: u64,
    #[arg(long, help = "Commit every N rows during fill (default: one commit per batch)")]
    pub(crate) chunk_rows: Option<usize>,
    #[arg(
        long,
        default_value = "Male",
        value_parser = parse_sex,
        help = "Sex to match in search/index modes (Male or Female)"
    )]
    pub(crate) sex: Sex,
    #[arg(long, default_value = "F", help = "Case-sensitive name prefix for search/index modes")]
    pub(crate) prefix: String,
    #[arg(long, help = "Seed for reproducible fill data")]
    pub(crate) seed: Option<u64>,
    #[arg(help = "Mode code (0-6) or name (clear, init, add, list, fill, search, index)")]
    pub(crate) mode: String,
    #[arg(
        help = "Mode arguments (add: name, date of birth, sex)",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) args: Vec<String>,
}

fn parse_sex(input: &str) -> Result<Sex, String> {
    input.parse::<Sex>().map_err(|err| error_message(&err))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Connectivity => "cannot open store".to_string(),
        ErrorKind::Schema => "schema error".to_string(),
        ErrorKind::Constraint => "constraint violation".to_string(),
        ErrorKind::MalformedInput => "malformed input".to_string(),
        ErrorKind::Busy => "store is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}
