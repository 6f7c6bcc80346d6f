//! normsim - run norm-aware car agents against the in-memory demo network
//!
//! Exit status: 0 on success, 1 startup failure, 2 invalid configuration or
//! arguments, 4 time-step failure, 10 connection lost while applying
//! commands, 15 fatal query failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use normsim_core::{
    InMemoryEnvironment, NormAwareDeliberation, Orchestrator, SanctionConfig, SimulationConfig,
};
use tracing_subscriber::EnvFilter;

const EXIT_STARTUP_FAILURE: i32 = 1;
const EXIT_INVALID_CONFIG: i32 = 2;

#[derive(Parser)]
#[command(name = "normsim", version, about = "Norm-aware traffic agents under sanction budgets")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run a simulation and print its summary as JSON
    Run(RunArgs),

    /// Print the default configuration as JSON
    Defaults,
}

#[derive(Clone, Copy, ValueEnum)]
enum SanctionMode {
    Continuous,
    Fixed,
}

#[derive(Args)]
struct RunArgs {
    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The number of cars to place in the environment
    #[arg(long = "number-of-cars")]
    cars: Option<usize>,

    /// Number of turns to run; unbounded if neither this nor the config sets it
    #[arg(short = 'i', long = "number-of-iterations")]
    iterations: Option<u64>,

    /// Seed for command ordering
    #[arg(long = "random-seed")]
    seed: Option<u64>,

    /// Seed for agent-side choices (categories, routes, lanes)
    #[arg(long)]
    agent_seed: Option<u64>,

    /// Percentage of rich agents
    #[arg(long)]
    rich: Option<f64>,

    /// Percentage of medium agents
    #[arg(long)]
    medium: Option<f64>,

    /// Percentage of poor agents
    #[arg(long)]
    poor: Option<f64>,

    /// Lane speed ceiling is divided by this to get the enforced speed
    #[arg(long)]
    speed_limit_factor: Option<f64>,

    /// Lowest minimum gap an agent may choose (m)
    #[arg(long)]
    min_gap: Option<f64>,

    /// Sanction strategy
    #[arg(long, value_enum)]
    sanction: Option<SanctionMode>,

    /// Deduct sanctions from agent budgets every turn
    #[arg(long, default_value_t = false)]
    charge_sanctions: bool,

    /// Nodes in the demo ring network
    #[arg(long, default_value_t = 8)]
    ring_segments: usize,

    /// Environment time at which the demo network stops
    #[arg(long)]
    end_time: Option<u64>,

    /// Most recent events kept in memory; 0 disables the event log
    #[arg(long)]
    event_log_capacity: Option<usize>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "normsim=info,normsim_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn read_config_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))
}

/// Config file contents (or defaults) with command-line overrides applied
fn build_config(args: &RunArgs, file: Option<(&Path, &str)>) -> Result<SimulationConfig> {
    let mut config = match file {
        Some((path, text)) => serde_json::from_str(text)
            .with_context(|| format!("failed to parse config {}", path.display()))?,
        None => SimulationConfig::default(),
    };

    if let Some(cars) = args.cars {
        config.num_agents = cars;
    }
    if args.iterations.is_some() {
        config.max_turns = args.iterations;
    }
    if args.seed.is_some() {
        config.system_seed = args.seed;
    }
    if args.agent_seed.is_some() {
        config.agent_seed = args.agent_seed;
    }
    if let Some(rich) = args.rich {
        config.categories.weights.rich = rich;
    }
    if let Some(medium) = args.medium {
        config.categories.weights.medium = medium;
    }
    if let Some(poor) = args.poor {
        config.categories.weights.poor = poor;
    }
    if let Some(factor) = args.speed_limit_factor {
        config.norms.speed_limit_factor = factor;
    }
    if let Some(min_gap) = args.min_gap {
        config.search.min_gap = min_gap;
    }
    match args.sanction {
        Some(SanctionMode::Continuous) if !matches!(config.norms.sanction, SanctionConfig::Continuous { .. }) => {
            config.norms.sanction = SanctionConfig::Continuous {
                base: 2.0,
                scale: 2.0,
            };
        }
        Some(SanctionMode::Fixed) if !matches!(config.norms.sanction, SanctionConfig::Fixed { .. }) => {
            config.norms.sanction = SanctionConfig::Fixed { penalty: None };
        }
        _ => {}
    }
    if args.charge_sanctions {
        config.norms.charge_sanctions = true;
    }
    if args.event_log_capacity.is_some() {
        config.event_log_capacity = args.event_log_capacity;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: RunArgs) -> i32 {
    // An unreadable file is a startup failure; bad contents are a config error
    let text = match args.config.as_deref().map(read_config_text).transpose() {
        Ok(text) => text,
        Err(err) => {
            tracing::error!("{:#}", err);
            return EXIT_STARTUP_FAILURE;
        }
    };
    let file = args.config.as_deref().zip(text.as_deref());

    let config = match build_config(&args, file) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{:#}", err);
            return EXIT_INVALID_CONFIG;
        }
    };

    let mut env = InMemoryEnvironment::ring(args.ring_segments);
    if let Some(end_time) = args.end_time {
        env = env.with_end_time(end_time);
    }
    let deliberation = NormAwareDeliberation::new(&config);

    let result = Orchestrator::new(config, env, deliberation).and_then(|mut orchestrator| orchestrator.run());
    match result {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to render summary");
                EXIT_STARTUP_FAILURE
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "simulation failed");
            err.exit_code()
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = match cli.command {
        CliCommand::Run(args) => run(args),
        CliCommand::Defaults => match serde_json::to_string_pretty(&SimulationConfig::default()) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to render defaults");
                1
            }
        },
    };

    process::exit(code);
}
