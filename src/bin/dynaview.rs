use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dynaview::{
    action::PathFilePicker, evaluate, evaluate_condition, interpolate_string, ActionExecutor,
    ActionSpec, Context, EngineConfig, Error, ExecutionContext, InternalResult, StateStore, Value,
};
use tokio::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an expression and print the JSON result
    Eval {
        expression: String,
        /// JSON file with the evaluation context
        #[arg(short, long)]
        context: Option<PathBuf>,
    },
    /// Interpolate a `{{ }}` template
    Render {
        template: String,
        #[arg(short, long)]
        context: Option<PathBuf>,
    },
    /// Evaluate a condition and print true or false
    Check {
        condition: String,
        #[arg(short, long)]
        context: Option<PathBuf>,
    },
    /// Run a list of actions against a fresh state store
    Run {
        actions: PathBuf,
        /// Initial state (JSON record)
        #[arg(short, long)]
        state: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Files offered to `openFilePicker`
        #[arg(long, num_args = 1..)]
        files: Vec<PathBuf>,
        /// Upper bound on waiting for running intervals
        #[arg(long, default_value_t = 5000)]
        wait_ms: u64,
    },
}

fn read_json(path: &Path) -> InternalResult<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::internal(format!("Failed to read {}: {}", path.display(), e)))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| Error::internal(format!("Failed to parse {}: {}", path.display(), e)))?;
    Ok(Value::from(json))
}

fn load_context(path: Option<&Path>) -> InternalResult<Context> {
    match path {
        Some(path) => Ok(Context::from(&read_json(path)?)),
        None => Ok(Context::new()),
    }
}

fn print_value(value: &Value) -> InternalResult<()> {
    let json = serde_json::to_string_pretty(&serde_json::Value::from(value))
        .map_err(|e| Error::internal(format!("Failed to print result: {}", e)))?;
    println!("{}", json);
    Ok(())
}

async fn run_actions(
    actions: &Path,
    state: Option<&Path>,
    config: Option<&Path>,
    files: &[PathBuf],
    wait_ms: u64,
) -> InternalResult<()> {
    let config = match config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    debug!("config: {:?}", config);

    let initial = match state {
        Some(path) => read_json(path)?,
        None => Value::empty_object(),
    };
    let store = Arc::new(StateStore::new(initial));

    let mut executor = ActionExecutor::new(config)?;
    if !files.is_empty() {
        executor = executor.with_file_picker(Arc::new(PathFilePicker::new(files.to_vec())));
    }

    let specs = ActionSpec::list_from_value(&read_json(actions)?);
    info!("Running {} actions", specs.len());
    let succeeded = executor
        .execute_actions(&specs, ExecutionContext::new(store.clone()))
        .await;

    let deadline = Instant::now() + Duration::from_millis(wait_ms);
    while executor.intervals().active_count() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    executor.clear_all_intervals();

    if !succeeded {
        eprintln!("An action failed; remaining actions were skipped.");
    }
    print_value(&store.get_all())
}

async fn run(cli: Cli) -> InternalResult<()> {
    match cli.command {
        Command::Eval {
            expression,
            context,
        } => {
            let ctx = load_context(context.as_deref())?;
            print_value(&evaluate(&expression, &ctx)?)
        }
        Command::Render { template, context } => {
            let ctx = load_context(context.as_deref())?;
            print_value(&interpolate_string(&template, &ctx))
        }
        Command::Check { condition, context } => {
            let ctx = load_context(context.as_deref())?;
            println!("{}", evaluate_condition(&condition, &ctx));
            Ok(())
        }
        Command::Run {
            actions,
            state,
            config,
            files,
            wait_ms,
        } => {
            run_actions(
                &actions,
                state.as_deref(),
                config.as_deref(),
                &files,
                wait_ms,
            )
            .await
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
