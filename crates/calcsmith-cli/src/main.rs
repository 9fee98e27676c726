//! calcsmith CLI - validate, order and run calculator definitions

use anyhow::{anyhow, bail, Context, Result};
use calcsmith::prelude::*;
use calcsmith::{resolve, suggest, validate, validate_calculator};
use clap::{ArgAction, Parser, Subcommand};
use env_logger::Env;
use log::{info, LevelFilter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "calcsmith")]
#[command(
    author,
    version,
    about = "Validate, order and run calculator definitions"
)]
struct Cli {
    /// More log output (-v info, -vv debug); CALCSMITH_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a calculator definition (JSON)
    Validate {
        /// Calculator definition file
        calculator: PathBuf,
    },

    /// Validate a single expression
    Check {
        expression: String,

        /// Names the expression may reference (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Autocomplete suggestions for an expression
    Suggest {
        expression: String,

        /// Cursor position in chars (default: end of expression)
        #[arg(short, long)]
        cursor: Option<usize>,

        /// Names the expression may reference (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Show the execution order of a calculator
    Order {
        /// Calculator definition file
        calculator: PathBuf,
    },

    /// Execute a calculator
    Run {
        /// Calculator definition file
        calculator: PathBuf,

        /// Input values file: { "<field>": value }
        #[arg(short, long)]
        inputs: Option<PathBuf>,

        /// Lookup tables file: { "mhr": { "<recordId>": { "<field>": value } } }
        #[arg(short, long)]
        lookups: Option<PathBuf>,

        /// Abandon execution after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Currency symbol for currency-formatted results
        #[arg(long)]
        currency: Option<String>,

        /// Do not group thousands in formatted results
        #[arg(long)]
        no_grouping: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate { calculator } => validate_definition(&calculator),
        Commands::Check { expression, names } => {
            let report = validate(&expression, &name_set(names));
            print_json(&report)?;
            if !report.is_valid {
                bail!("Expression is invalid");
            }
            Ok(())
        }
        Commands::Suggest {
            expression,
            cursor,
            names,
        } => {
            let cursor = cursor.unwrap_or_else(|| expression.chars().count());
            print_json(&suggest(&expression, cursor, &name_set(names)))
        }
        Commands::Order { calculator } => show_order(&calculator),
        Commands::Run {
            calculator,
            inputs,
            lookups,
            timeout_ms,
            currency,
            no_grouping,
        } => {
            let mut options = ExecutionOptions {
                thousands_separator: !no_grouping,
                ..ExecutionOptions::default()
            };
            if let Some(symbol) = currency {
                options.currency_symbol = symbol;
            }
            run(
                &calculator,
                inputs.as_deref(),
                lookups.as_deref(),
                timeout_ms.map(Duration::from_millis),
                options,
            )
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let mut builder = env_logger::Builder::from_env(
        Env::new().filter_or("CALCSMITH_LOG", default_level.as_str()),
    );
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn validate_definition(path: &Path) -> Result<()> {
    let calc: Calculator = load_json(path)?;
    let report = validate_calculator(&calc);
    print_json(&report)?;

    if !report.is_valid() {
        for message in report.error_messages() {
            eprintln!("error: {}", message);
        }
        bail!("Calculator '{}' is invalid", calc.id);
    }
    info!("calculator '{}' is valid", calc.id);
    Ok(())
}

fn show_order(path: &Path) -> Result<()> {
    let calc: Calculator = load_json(path)?;
    let resolution = resolve(&calc);
    print_json(&resolution)?;

    if resolution.has_cycles() {
        bail!(
            "Calculator '{}' has {} circular reference(s)",
            calc.id,
            resolution.cycles.len()
        );
    }
    Ok(())
}

fn run(
    calculator: &Path,
    inputs: Option<&Path>,
    lookups: Option<&Path>,
    timeout: Option<Duration>,
    options: ExecutionOptions,
) -> Result<()> {
    let calc: Calculator = load_json(calculator)?;
    let inputs: InputValues = match inputs {
        Some(path) => load_json(path)?,
        None => InputValues::new(),
    };
    let lookup: StaticLookup = match lookups {
        Some(path) => load_json(path)?,
        None => StaticLookup::new(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start async runtime")?;
    let engine = Engine::new(options);

    let report = runtime
        .block_on(async {
            let execution = engine.execute(&calc, &inputs, &lookup);
            match timeout {
                Some(limit) => tokio::time::timeout(limit, execution).await.map_err(|_| {
                    anyhow!("Execution timed out after {} ms", limit.as_millis())
                }),
                None => Ok(execution.await),
            }
        })?
        .with_context(|| format!("Failed to execute '{}'", calc.id))?;

    for (name, error) in report.failed() {
        eprintln!("{}: {}", name, error.message);
    }
    print_json(&report)
}

fn name_set(names: Vec<String>) -> BTreeSet<String> {
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse '{}'", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    text.push('\n');
    io::stdout()
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")
}
