// Seatkeeper CLI - legislator record maintenance against named stores

mod exit_codes;
mod maintenance;
mod prompt;
mod records;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use seatkeeper_config::Settings;
use seatkeeper_io::SqliteStore;
use seatkeeper_recon::listing::{self, MissingTarget};
use seatkeeper_recon::model::scope_filters;
use seatkeeper_recon::pipeline::MoveMode;
use seatkeeper_recon::states::{all_codes, is_state};
use seatkeeper_recon::{DistrictRegistry, Field, Filter, Level, ReconError, ResolutionOracle, ThresholdOracle, WriteOutcome};

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE, EXIT_WRITE_PARTIAL};
use prompt::TerminalOracle;

#[derive(Parser)]
#[command(name = "seatkeeper")]
#[command(about = "Reconcile legislator records against canonical district data")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: the user config directory)
    #[arg(long, global = true, env = "SEATKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Named store to work on (default: default_store from settings)
    #[arg(long, global = true)]
    store: Option<String>,

    /// Answer ambiguities without prompting: take the best candidate scoring
    /// at least this much (0-100), otherwise leave the question undecided
    #[arg(long, global = true, value_name = "MIN_SCORE", value_parser = clap::value_parser!(u8).range(0..=100))]
    batch: Option<u8>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List records lacking audio or contact details
    #[command(subcommand)]
    List(ListCommands),

    /// Import a spreadsheet of legislators into the store
    #[command(after_help = "\
Examples:
  seatkeeper insert ohio-senate.csv --merge
  seatkeeper insert vt-house.tsv --store archive
  seatkeeper insert new.csv --merge --batch 85 --json

The file needs level and state columns; any other column must be a known
field name (district, name, title, phones, emails, active, ...). Phones,
emails and networks cells hold ';'-separated values.")]
    Insert {
        /// CSV or TSV file
        file: PathBuf,

        /// Check each row against existing records before inserting
        #[arg(long)]
        merge: bool,

        /// Print the insert report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete records by scope or from a list
    #[command(subcommand)]
    Delete(DeleteCommands),

    /// Copy records from one store into another
    #[command(after_help = "\
Examples:
  seatkeeper move --from local --to archive --level state-lower --state VT
  seatkeeper move --from archive --to local --mode replace --level fed-upper")]
    Move {
        /// Source store
        #[arg(long)]
        from: String,

        /// Destination store
        #[arg(long)]
        to: String,

        /// append, append-missing or replace
        #[arg(long, default_value = "append-missing", value_parser = parse_move_mode)]
        mode: MoveMode,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Check seats against the canonical district list
    #[command(subcommand)]
    Audit(AuditCommands),

    /// Merge records that share a name, keeping the first
    #[command(after_help = "\
Examples:
  seatkeeper dedupe --level state-lower --state VT
  seatkeeper dedupe --peer archive

Contact details are pooled from every record with the same name and level,
in this store and each --peer store; audio is adopted from a peer record
with the same name.")]
    Dedupe {
        /// Other stores to pool contact details and audio from
        #[arg(long = "peer")]
        peers: Vec<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Settings file helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// Records missing a kind of data
    #[command(after_help = "\
Examples:
  seatkeeper list missing audio --level fed-upper
  seatkeeper list missing phones --state OH --output ohio-phones.csv")]
    Missing {
        /// audio, phones, emails or networks
        #[arg(value_parser = parse_missing_target)]
        target: MissingTarget,

        /// Write a CSV listing instead of printing
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Records matching every --where condition
    #[command(after_help = "\
Examples:
  seatkeeper list filter --where state=VT --where needsAudio=true
  seatkeeper list filter --where title=Senator --output senators.csv
  seatkeeper list filter --where level=fed-lower --where district=

Values are matched exactly. Flags take true or false; an empty district
selects at-large seats.")]
    Filter {
        /// FIELD=VALUE condition, repeatable
        #[arg(long = "where", value_name = "FIELD=VALUE", required = true, value_parser = parse_condition)]
        conditions: Vec<(Field, serde_json::Value)>,

        /// Write a CSV listing instead of printing
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// "title name" lines for everyone still needing a recording
    Worklist {
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Subcommand)]
pub enum DeleteCommands {
    /// Delete every record in scope
    #[command(after_help = "\
Examples:
  seatkeeper delete criteria --level state-upper --state OH")]
    Criteria {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Delete the records described by a spreadsheet
    #[command(after_help = "\
Examples:
  seatkeeper delete list retired.csv

Each row is matched on the columns the file supplies. Without a district
column, names are resolved against the store first.")]
    List {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Report empty, unknown and multiply-held seats
    #[command(after_help = "\
Examples:
  seatkeeper audit seats --level fed-upper
  seatkeeper audit seats --level state-lower --state VT --strict
  seatkeeper audit seats --output audit.txt")]
    Seats {
        /// Exit non-zero when any seat has a finding
        #[arg(long)]
        strict: bool,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Fill empty seats and trim multiply-held ones, asking for each
    RepairSeats {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Map district labels the store holds onto canonical ones
    RepairDistricts {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the settings file path
    Path,
    /// Parse the settings and load the reference data
    Validate,
}

/// Level/state selection shared by most commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Level to include (repeatable; default: all)
    #[arg(long = "level", value_parser = parse_level)]
    pub levels: Vec<Level>,

    /// Two-letter state code to include (repeatable; default: all)
    #[arg(long = "state", value_parser = parse_state)]
    pub states: Vec<String>,
}

impl ScopeArgs {
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.states.is_empty()
    }

    pub fn levels(&self) -> Vec<Level> {
        if self.levels.is_empty() {
            Level::ALL.to_vec()
        } else {
            self.levels.clone()
        }
    }

    pub fn states(&self) -> Option<&[String]> {
        if self.states.is_empty() {
            None
        } else {
            Some(&self.states)
        }
    }

    pub fn state_codes(&self) -> Vec<String> {
        match self.states() {
            Some(states) => states.to_vec(),
            None => all_codes().into_iter().map(str::to_string).collect(),
        }
    }

    pub fn filters(&self) -> Vec<Filter> {
        scope_filters(&self.levels(), self.states())
    }
}

fn parse_level(s: &str) -> Result<Level, String> {
    Level::parse(s).ok_or_else(|| format!("unknown level '{s}' (expected fed-upper, fed-lower, state-upper or state-lower)"))
}

fn parse_state(s: &str) -> Result<String, String> {
    let code = s.trim().to_ascii_uppercase();
    if is_state(&code) {
        Ok(code)
    } else {
        Err(format!("unknown state code '{s}'"))
    }
}

fn parse_move_mode(s: &str) -> Result<MoveMode, String> {
    s.parse()
}

fn parse_missing_target(s: &str) -> Result<MissingTarget, String> {
    s.parse()
}

fn parse_condition(s: &str) -> Result<(Field, serde_json::Value), String> {
    listing::parse_condition(s)
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  seatkeeper-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Config(command) => cmd_config(command, cli.config.as_deref()),
        command => Context::load(cli.config.as_deref(), cli.store, cli.batch).and_then(|ctx| match command {
            Commands::List(command) => records::cmd_list(&ctx, command),
            Commands::Insert { file, merge, json } => records::cmd_insert(&ctx, &file, merge, json),
            Commands::Delete(command) => records::cmd_delete(&ctx, command),
            Commands::Move { from, to, mode, scope } => records::cmd_move(&ctx, &from, &to, mode, &scope),
            Commands::Audit(command) => maintenance::cmd_audit(&ctx, command),
            Commands::Dedupe { peers, scope } => maintenance::cmd_dedupe(&ctx, &peers, &scope),
            Commands::Config(_) => Ok(()),
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::Schema(_) => {
                Some("columns must be field names such as level, state, district, name".to_string())
            }
            ReconError::Validation { field, .. } if field == "state" => {
                Some("states are two-letter postal codes".to_string())
            }
            ReconError::Validation { field, .. } if field == "level" => {
                Some("levels are fed-upper, fed-lower, state-upper, state-lower".to_string())
            }
            ReconError::ReferenceData(_) => Some("check `reference` in the settings file".to_string()),
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Some("run `seatkeeper config path` to locate the settings file".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

/// Turn a write outcome with per-record errors into a failure after the
/// summary has been printed.
pub fn check_outcome(outcome: &WriteOutcome) -> Result<(), CliError> {
    if outcome.is_clean() {
        return Ok(());
    }
    for err in &outcome.errors {
        log::warn!("{err}");
    }
    Err(CliError::new(
        EXIT_WRITE_PARTIAL,
        format!("{} records failed to write", outcome.errors.len()),
    )
    .with_hint("rerun with -v to see each failure"))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{text}");
    Ok(())
}

// ============================================================================
// Context
// ============================================================================

/// Settings plus the global flags every store-touching command needs.
pub struct Context {
    pub settings: Settings,
    store: Option<String>,
    batch: Option<u8>,
}

impl Context {
    fn load(config: Option<&Path>, store: Option<String>, batch: Option<u8>) -> Result<Self, CliError> {
        let settings = load_settings(config)?;
        Ok(Self { settings, store, batch })
    }

    pub fn is_batch(&self) -> bool {
        self.batch.is_some()
    }

    /// The store selected with --store, or the default one.
    pub fn store(&self) -> Result<SqliteStore, CliError> {
        self.open_store(self.store.as_deref())
    }

    pub fn open_store(&self, name: Option<&str>) -> Result<SqliteStore, CliError> {
        let (name, store) = self.settings.store(name)?;
        log::debug!("opening store {name} at {}", store.path.display());
        Ok(SqliteStore::open(name, &store.path)?)
    }

    pub fn registry(&self) -> Result<DistrictRegistry, CliError> {
        Ok(seatkeeper_io::csv::load_registry(&self.settings.reference)?)
    }

    pub fn oracle(&self) -> Box<dyn ResolutionOracle> {
        match self.batch {
            Some(min_score) => Box::new(ThresholdOracle { min_score }),
            None => Box::new(TerminalOracle::stdio()),
        }
    }
}

fn load_settings(config: Option<&Path>) -> Result<Settings, CliError> {
    match config {
        Some(path) => Ok(Settings::load_from(path)?),
        None => Ok(Settings::load()?),
    }
}

// ============================================================================
// config
// ============================================================================

fn cmd_config(command: ConfigCommands, config: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            match config {
                Some(path) => println!("{}", path.display()),
                None => println!("{}", Settings::config_path_display()),
            }
            Ok(())
        }
        ConfigCommands::Validate => {
            let settings = load_settings(config)?;
            let registry = seatkeeper_io::csv::load_registry(&settings.reference)?;
            if registry.is_empty() {
                return Err(CliError::from(ReconError::ReferenceData(format!(
                    "{}: no districts",
                    settings.reference.display()
                ))));
            }
            println!(
                "ok: {} store(s), reference {}",
                settings.stores.len(),
                settings.reference.display()
            );
            Ok(())
        }
    }
}
