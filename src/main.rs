use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use scenariorunner::journal::{self, preamble};
use scenariorunner::{RunnerConfig, Scenario, ScenarioRun, ScenarioStep, StepExecutionResult, StepObserver, StepStatus};

#[derive(Parser)]
#[command(
    name = "scenariorunner",
    about = "Synthetic-user scenario runner with an append-only JSONL audit log",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (TOML). Falls back to $SCENARIORUNNER_CONFIG, then ./scenariorunner.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the scenario log path
    #[arg(long, global = true, env = "SCENARIORUNNER_LOG")]
    log: Option<PathBuf>,

    /// Override the base URL for relative HTTP step URLs
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Diagnostic output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario by id
    Run {
        /// Scenario id (see `list`)
        scenario: String,

        /// Do not write the meta/component preamble first
        #[arg(long)]
        no_preamble: bool,
    },

    /// Run every registered scenario
    RunAll,

    /// List registered scenarios
    List,

    /// Validate and summarize the scenario log
    Validate {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Delete the scenario log
    ClearLog,

    /// Write only the meta/component preamble
    LogArchitecture,
}

/// Prints one line per step as the run progresses.
struct ConsoleObserver;

impl StepObserver for ConsoleObserver {
    fn on_run(&self, scenario: &Scenario) {
        println!("\nRunning scenario {}", scenario.scenario_id);
    }

    fn on_step(&self, _scenario: &Scenario, step: &ScenarioStep, result: &StepExecutionResult) {
        let status = match result.status() {
            StepStatus::Success => "OK  ",
            StepStatus::Failed => "FAIL",
            StepStatus::Skipped => "SKIP",
        };
        println!(
            "  [{}] {:>3} {:<28} {:>9.1} ms",
            status,
            step.order,
            step.name,
            result.latency_ms()
        );
        if let Some(error) = result.error() {
            println!("         -> {}", error);
        }
    }
}

fn print_run(run: &ScenarioRun) {
    println!(
        "Scenario {} finished: {} ({} steps, {} failed, {} skipped)",
        run.scenario_id,
        run.status,
        run.steps.len(),
        run.count(StepStatus::Failed),
        run.count(StepStatus::Skipped)
    );
    println!("  trace_id: {}  run_id: {}\n", run.trace_id(), run.scenario_run_id());
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = RunnerConfig::resolve(cli.config.as_deref())?;
    if let Some(log) = cli.log {
        config.log.path = log;
    }
    if let Some(base_url) = cli.base_url {
        config.http.base_url = Some(base_url);
    }

    match cli.command {
        Commands::Run { scenario, no_preamble } => {
            let orchestrator = scenariorunner::build(&config).await?.with_observer(ConsoleObserver);
            // Configuration errors leave the log untouched.
            orchestrator.registry().resolve(&scenario)?.execution_order()?;
            if !no_preamble {
                preamble::log_preamble(orchestrator.writer()).await?;
            }
            let run = orchestrator.run_by_id(&scenario).await?;
            print_run(&run);
            println!("Scenario logged to: {}", config.log.path.display());
        }
        Commands::RunAll => {
            let orchestrator = scenariorunner::build(&config).await?.with_observer(ConsoleObserver);
            for scenario in orchestrator.registry().iter() {
                scenario.execution_order()?;
            }
            preamble::log_preamble(orchestrator.writer()).await?;
            let runs = orchestrator.run_all().await?;
            println!("\n{}", "=".repeat(60));
            for run in &runs {
                print_run(run);
            }
            println!("All scenarios logged to: {}", config.log.path.display());
        }
        Commands::List => {
            let registry = scenariorunner::load_registry(&config)?;
            if registry.is_empty() {
                println!("No scenarios defined.");
            } else {
                println!("{:<24} | {:<5} | Name", "Scenario", "Steps");
                println!("{:-<24}-|-{:-<5}-|-{:-<30}", "", "", "");
                for scenario in registry.iter() {
                    println!("{:<24} | {:<5} | {}", scenario.scenario_id, scenario.steps.len(), scenario.name);
                }
            }
        }
        Commands::Validate { json } => {
            let summary = journal::validate(&config.log.path).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\nLog: {}", config.log.path.display());
                println!("Total records: {}", summary.total_records);
                for (record_type, count) in &summary.record_types {
                    println!("  {:<20} {}", record_type, count);
                }
                if !summary.event_types.is_empty() {
                    println!("Events:");
                    for (event_type, count) in &summary.event_types {
                        println!("  {:<20} {}", event_type, count);
                    }
                }
                println!("Anomalies: {}", summary.anomalies.len());
                for anomaly in &summary.anomalies {
                    println!("  line {}: {} ({})", anomaly.line, anomaly.error, anomaly.content);
                }
            }
        }
        Commands::ClearLog => {
            if journal::writer::clear(&config.log.path).await? {
                println!("Cleared log file: {}", config.log.path.display());
            } else {
                println!("Log file does not exist: {}", config.log.path.display());
            }
        }
        Commands::LogArchitecture => {
            let writer = journal::RecordWriter::open(&config.log.path).await?;
            let written = preamble::log_preamble(&writer).await?;
            println!("Logged {} architecture records to: {}", written, config.log.path.display());
        }
    }

    Ok(())
}
