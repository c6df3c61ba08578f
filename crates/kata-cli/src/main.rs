use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use kata_cli::config::{self, Overrides};
use kata_cli::{render, Console, Exit, FileSolution, SessionController, SolutionSource, TerminalKeys};
use kata_engine::{validate, validate_all, ChallengeSet, NullSink, TestEngine, ValidationSummary};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stack for the interpreter thread; deep user recursion runs on it.
const SESSION_STACK_BYTES: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "kata", author, version, about = "Practice coding challenges from the terminal")]
struct Cli {
    /// Engine config file (defaults to ./kata.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Challenge definition file
    #[arg(long, global = true, default_value = "challenges.json")]
    challenges: PathBuf,
    /// Override the benchmark time budget, in milliseconds
    #[arg(long, global = true)]
    budget_ms: Option<u64>,
    /// Override the per-evaluation step budget
    #[arg(long, global = true)]
    gas_limit: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session for a challenge
    Run {
        id: String,
        /// Solution file (defaults to <id>.js)
        #[arg(long)]
        solution: Option<PathBuf>,
    },
    /// Run the tests once and print the report
    Test {
        id: String,
        #[arg(long)]
        solution: Option<PathBuf>,
        /// Include hidden tests
        #[arg(long)]
        all: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check challenge definitions against their sample solutions
    Validate {
        /// Challenge ids (all challenges when omitted)
        ids: Vec<String>,
    },
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    std::thread::Builder::new()
        .name("kata-main".into())
        .stack_size(SESSION_STACK_BYTES)
        .spawn(move || execute(cli))
        .context("failed to start session thread")?
        .join()
        .map_err(|_| anyhow!("session thread panicked"))?
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KATA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let overrides = Overrides {
        budget_ms: cli.budget_ms,
        gas_limit: cli.gas_limit,
    };
    let engine = TestEngine::new(config::resolve(cli.config.as_deref(), &cwd, overrides));
    let set = ChallengeSet::load(&cli.challenges)
        .with_context(|| format!("failed to load {}", cli.challenges.display()))?;

    match cli.command {
        Command::Run { id, solution } => run_session(engine, &set, &id, solution),
        Command::Test {
            id,
            solution,
            all,
            json,
        } => run_once(&engine, &set, &id, solution, all, json),
        Command::Validate { ids } => run_validate(&engine, &set, &ids),
    }
}

fn solution_path(id: &str, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(format!("{id}.js")))
}

fn run_session(
    engine: TestEngine,
    set: &ChallengeSet,
    id: &str,
    solution: Option<PathBuf>,
) -> Result<ExitCode> {
    let challenge = set.get(id)?;
    let path = solution_path(id, solution);
    write_template(&path, &challenge.template)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let mut controller = SessionController::new(
        engine,
        challenge,
        TerminalKeys,
        FileSolution::new(path),
        io::stdout(),
    );
    let exit = runtime.block_on(controller.run())?;
    match exit {
        Exit::Submitted(report) => info!(pass = report.pass, "session submitted"),
        Exit::Quit => info!("session quit"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Materialise the template, leaving an existing solution untouched.
fn write_template(path: &Path, template: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, template).with_context(|| format!("failed to write {}", path.display()))
}

fn run_once(
    engine: &TestEngine,
    set: &ChallengeSet,
    id: &str,
    solution: Option<PathBuf>,
    all: bool,
    json: bool,
) -> Result<ExitCode> {
    let challenge = set.get(id)?;
    let mut source = FileSolution::new(solution_path(id, solution));
    let text = source
        .read()
        .with_context(|| format!("failed to read {}", source.describe()))?;

    let report = if json {
        let report = engine.run(&challenge, &text, all, &mut NullSink);
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
        report
    } else {
        let mut console = Console::new(io::stdout().lock());
        let report = engine.run(&challenge, &text, all, &mut console);
        console.line(&render::summary(&report))?;
        report
    };
    Ok(if report.pass {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_validate(engine: &TestEngine, set: &ChallengeSet, ids: &[String]) -> Result<ExitCode> {
    let summary = if ids.is_empty() {
        validate_all(engine, set)
    } else {
        let mut summary = ValidationSummary::default();
        for id in ids {
            summary.merge(validate(engine, set, id));
        }
        summary
    };

    let mut stdout = io::stdout().lock();
    for diagnostic in &summary.diagnostics {
        writeln!(stdout, "{diagnostic}")?;
    }
    writeln!(
        stdout,
        "{} error(s), {} warning(s)",
        summary.errors, summary.warnings
    )?;
    Ok(if summary.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
