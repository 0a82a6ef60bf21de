use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use formflow_engine::{Environment, FlowSession, Submission, parse_flow_file};
use serde_json::{Map, Value};
use tracing::{info, warn};

mod prompt;

/// Walk declarative multi-step input flows from the terminal.
#[derive(Parser, Debug)]
#[command(name = "formflow", version, about)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk a flow, prompting for each input step
    Run {
        /// Path to the flow document (YAML or JSON)
        file: PathBuf,

        /// Seed variable; VALUE is read as JSON and falls back to a string
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
        vars: Vec<(String, Value)>,

        /// Replay submissions from a YAML/JSON list instead of prompting
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// Load a flow and report where its first input step is
    Check {
        /// Path to the flow document (YAML or JSON)
        file: PathBuf,

        /// Seed variable; VALUE is read as JSON and falls back to a string
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
        vars: Vec<(String, Value)>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run { file, vars, answers } => run(&file, vars, answers.as_deref()),
        Commands::Check { file, vars } => check(&file, vars),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(file: &Path, vars: Vec<(String, Value)>, answers: Option<&Path>) -> Result<()> {
    let flow = parse_flow_file(file)?;
    let environment: Environment = vars.into_iter().collect();
    let mut session = FlowSession::start_with(&flow, environment).context("Failed to reach the first input step")?;

    let outcome = match answers {
        Some(path) => Some(replay(&mut session, load_answers(path)?)?),
        None => prompt::drive(&mut session, io::stdin().lock(), io::stdout().lock())?,
    };

    match outcome {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => info!(file = %file.display(), "run cancelled"),
    }
    Ok(())
}

fn check(file: &Path, vars: Vec<(String, Value)>) -> Result<()> {
    let flow = parse_flow_file(file)?;
    let point = flow
        .initial_with(vars.into_iter().collect())
        .context("Failed to reach the first input step")?;
    let fields: Vec<&str> = point.value().defaults.keys().map(String::as_str).collect();
    println!(
        "{}: ok, first input at {} (fields: {})",
        file.display(),
        point.address(),
        if fields.is_empty() { "none".to_string() } else { fields.join(", ") }
    );
    Ok(())
}

fn load_answers(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read answers file: {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Answers file must be a list of objects: {}", path.display()))
}

/// Submits each answer over the current step's defaults until the flow finishes.
fn replay(session: &mut FlowSession<'_>, answers: Vec<Map<String, Value>>) -> Result<Value> {
    let total = answers.len();
    for (position, answer) in answers.into_iter().enumerate() {
        let mut values = session.current().value().defaults.clone();
        values.extend(answer);
        let address = session.current().address().clone();

        match session.submit(values)? {
            Submission::Rejected(errors) => {
                let messages: Vec<String> = errors.iter().map(|error| format!("{}: {}", error.field, error.message)).collect();
                bail!("answer {} was rejected at step {address}: {}", position + 1, messages.join("; "));
            }
            Submission::Advanced => {}
            Submission::Finished(value) => {
                if position + 1 < total {
                    warn!(unused = total - position - 1, "flow finished before all answers were used");
                }
                return Ok(value);
            }
        }
    }
    bail!("answers ran out at step {}", session.current().address())
}

fn parse_variable(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((name.to_string(), parse_field_value(value)))
}

/// Reads typed text as JSON, keeping anything that is not JSON as a string.
fn parse_field_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
