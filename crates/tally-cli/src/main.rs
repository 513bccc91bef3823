//! Tally CLI - run formula batches from the command line

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, LevelFilter};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tally::prelude::*;
use tally::{coerce_as, ErrorReport};

#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about = "Evaluate chained formulas over batches of records")]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and execute a batch, printing the results as JSON
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Evaluate records on a single thread
        #[arg(long)]
        sequential: bool,

        /// Smallest batch evaluated in parallel
        #[arg(long, default_value_t = ExecutionOptions::default().min_parallel_records)]
        min_parallel_records: usize,
    },

    /// Validate a batch without executing it
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Coerce a single value to a declared type
    Coerce {
        /// Value to coerce (JSON scalar, otherwise taken as text)
        value: String,

        /// Type tag (number, boolean, datetime, percentage, currency)
        #[arg(short = 't', long = "type")]
        var_type: String,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Request file with `data` and `formulas` ('-' for stdin)
    #[arg(conflicts_with_all = ["data", "formulas"])]
    request: Option<PathBuf>,

    /// Records file (.json array or .csv with a header row)
    #[arg(short, long, requires = "formulas")]
    data: Option<PathBuf>,

    /// Formulas file (.json array)
    #[arg(short, long, requires = "data")]
    formulas: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    } else if cli.quiet {
        logger.filter_level(LevelFilter::Error);
    }
    logger.init();

    match cli.command {
        Commands::Run {
            input,
            output,
            pretty,
            sequential,
            min_parallel_records,
        } => {
            let options = ExecutionOptions::default()
                .with_parallel(!sequential)
                .with_min_parallel_records(min_parallel_records);
            run(&input, output.as_deref(), pretty, &options)
        }
        Commands::Validate { input } => validate(&input),
        Commands::Coerce { value, var_type } => coerce_value(&value, &var_type),
    }
}

fn run(
    input: &InputArgs,
    output: Option<&Path>,
    pretty: bool,
    options: &ExecutionOptions,
) -> Result<ExitCode> {
    let request = load_request(input)?;

    match run_batch_with(&NativeEngine, &request, options) {
        Ok(response) => {
            write_json(&response, output, pretty)?;
            eprintln!(
                "Executed {} formulas over {} records",
                request.formulas.len(),
                request.data.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            write_json(&ErrorReport::from(&err), output, pretty)?;
            eprintln!("Batch failed: {}", err.kind());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn validate(input: &InputArgs) -> Result<ExitCode> {
    let request = load_request(input)?;

    match FormulaValidator::new(&NativeEngine).validate_batch(&request.data, &request.formulas) {
        Ok(()) => {
            let sample_fields = request.data.first().map_or(0, Record::len);
            println!(
                "OK: {} formulas validated against {} sample fields ({} records)",
                request.formulas.len(),
                sample_fields,
                request.data.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            write_json(&ErrorReport::from(&err), None, true)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn coerce_value(raw: &str, var_type: &str) -> Result<ExitCode> {
    let value = parse_scalar(raw);
    debug!("coercing {:?} as {}", value, var_type);

    match coerce_as(&value, var_type) {
        Ok(coerced) => {
            println!("{}", serde_json::to_string(&coerced)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Parse a command-line value as a JSON scalar, falling back to raw text
fn parse_scalar(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::string(raw))
}

fn load_request(input: &InputArgs) -> Result<FormulaRequest> {
    if let Some(path) = &input.request {
        let text = read_input(path)?;
        let request = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse request '{}'", path.display()))?;
        return Ok(request);
    }

    let (data, formulas) = match (&input.data, &input.formulas) {
        (Some(data), Some(formulas)) => (data, formulas),
        _ => bail!("Provide a request file, or both --data and --formulas"),
    };

    let records = load_records(data)?;
    let formulas: Vec<Formula> = serde_json::from_str(&read_input(formulas)?)
        .with_context(|| format!("Failed to parse formulas '{}'", formulas.display()))?;

    debug!(
        "loaded {} records and {} formulas",
        records.len(),
        formulas.len()
    );
    Ok(FormulaRequest::new(records, formulas))
}

fn load_records(path: &Path) -> Result<Vec<Record>> {
    let is_csv = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open '{}'", path.display()))?;
        return records_from_csv(reader)
            .with_context(|| format!("Failed to read CSV '{}'", path.display()));
    }

    serde_json::from_str(&read_input(path)?)
        .with_context(|| format!("Failed to parse records '{}'", path.display()))
}

/// Read CSV rows into records, one field per header column
fn records_from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Record>> {
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(name, field)| (name.to_string(), detect_type(field)))
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// Detect the type of a CSV field
fn detect_type(field: &str) -> Value {
    let field = field.trim();

    if field.is_empty() {
        return Value::Null;
    }

    // Try boolean
    match field.to_lowercase().as_str() {
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        _ => {}
    }

    // Try number
    if let Ok(n) = field.parse::<f64>() {
        return Value::Number(n);
    }

    // Default to string
    Value::string(field)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;
        return Ok(text);
    }

    fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    if let Some(output_path) = output {
        fs::write(output_path, text + "\n")
            .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
        eprintln!("Wrote '{}'", output_path.display());
    } else {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", text).context("Failed to write to stdout")?;
    }

    Ok(())
}
