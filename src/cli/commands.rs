//! CLI command definitions for trialqc.
//!
//! File reading and writing happen here, never inside the pipeline stages.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::aggregate::StatisticKind;
use crate::error::DataError;
use crate::generator::TrialSimulator;
use crate::pipeline::{ConfigError, PipelineOutput, QcConfig, QcPipeline, RunMetadata};
use crate::trial::TrialRecord;

/// Default seed for simulated data.
const DEFAULT_SEED: u64 = 42;

/// Default number of simulated trials per subject and condition.
const DEFAULT_TRIALS_PER_CONDITION: usize = 12;

/// Reaction-time quality control and aggregation.
#[derive(Parser)]
#[command(name = "trialqc")]
#[command(about = "Apply trial and subject QC to reaction-time data, then aggregate")]
#[command(version)]
#[command(
    long_about = "trialqc flags invalid trials, excludes subjects with too few valid trials, and \
computes per-subject, per-condition statistics on what remains.\n\nExample usage:\n  \
trialqc simulate --sanity-checks -o trials.json\n  \
trialqc run -i trials.json --statistic median,trimmed_mean --trim-fraction 0.1"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Simulate raw trials and write them as JSON.
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Run QC and aggregation over a JSON trial file.
    Run(RunArgs),

    /// Simulate trials with known bad values and run the pipeline on them.
    Demo(DemoArgs),
}

/// Arguments for `trialqc simulate`.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Seed for the random number generator.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Trials per subject and condition.
    #[arg(short = 'n', long, default_value_t = DEFAULT_TRIALS_PER_CONDITION)]
    pub trials_per_condition: usize,

    /// Append a 9000 ms and a -50 ms trial.
    #[arg(long)]
    pub sanity_checks: bool,

    /// Probability that a trial has no reaction time.
    #[arg(long, default_value_t = 0.0)]
    pub missing_rate: f64,

    /// Output file for the trials.
    #[arg(short = 'o', long)]
    pub output: PathBuf,
}

/// QC options shared by `run` and `demo`.
///
/// Options given here override the YAML file, or the `TRIALQC_*`
/// environment when no file is given. The merged result is validated once.
#[derive(Parser, Debug, Default)]
pub struct QcArgs {
    /// YAML configuration file.
    #[arg(short = 'c', long, env = "TRIALQC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Reaction times below this are rejected as too fast.
    #[arg(long)]
    pub rt_min: Option<f64>,

    /// Reaction times above this are rejected as too slow.
    #[arg(long)]
    pub rt_max: Option<f64>,

    /// Minimum valid trials for a subject to be included.
    #[arg(long)]
    pub min_valid_trials: Option<usize>,

    /// Statistics to compute (mean, median, trimmed_mean).
    #[arg(long = "statistic", value_delimiter = ',')]
    pub statistics: Vec<StatisticKind>,

    /// Fraction cut from each tail for trimmed_mean.
    #[arg(long)]
    pub trim_fraction: Option<f64>,

    /// Abort without results if the run takes longer than this.
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

impl QcArgs {
    /// Resolves the pipeline configuration from file or environment plus overrides.
    ///
    /// The base layer is not validated on its own, so a flag can complete or
    /// correct it.
    pub fn resolve_config(&self) -> Result<QcConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => QcConfig::load_yaml_file(path)?,
            None => QcConfig::load_env()?,
        };

        if let Some(rt_min) = self.rt_min {
            config.rt_min = rt_min;
        }
        if let Some(rt_max) = self.rt_max {
            config.rt_max = rt_max;
        }
        if let Some(min) = self.min_valid_trials {
            config.min_valid_trials = min;
        }
        if !self.statistics.is_empty() {
            config.statistics = self.statistics.iter().copied().collect();
        }
        if let Some(fraction) = self.trim_fraction {
            config.trim_fraction = Some(fraction);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Arguments for `trialqc run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON file containing an array of trial records.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub qc: QcArgs,

    /// Write the annotated trials, subject table and aggregates as JSON.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `trialqc demo`.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Seed for the random number generator.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    #[command(flatten)]
    pub qc: QcArgs,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Simulate(args) => run_simulate_command(args),
        Commands::Run(args) => run_run_command(args).await,
        Commands::Demo(args) => run_demo_command(args).await,
    }
}

fn run_simulate_command(args: SimulateArgs) -> anyhow::Result<()> {
    let mut simulator = TrialSimulator::new(args.seed)
        .with_trials_per_condition(args.trials_per_condition)
        .with_missing_rate(args.missing_rate);
    if args.sanity_checks {
        simulator = simulator.with_sanity_checks();
    }

    let trials = simulator.generate()?;
    write_json(&args.output, &trials)?;
    info!(
        trials = trials.len(),
        output = %args.output.display(),
        "Wrote simulated trials"
    );
    Ok(())
}

async fn run_run_command(args: RunArgs) -> anyhow::Result<()> {
    let trials = load_trials(&args.input)?;
    info!(trials = trials.len(), input = %args.input.display(), "Loaded trials");

    let (run, output) = execute(&args.qc, trials).await?;

    if let Some(path) = &args.output {
        write_json(path, &RunRecord { run, output: &output })?;
        info!(run_id = %run.run_id, output = %path.display(), "Wrote pipeline output");
    }

    let report = output.report().with_run(run);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

async fn run_demo_command(args: DemoArgs) -> anyhow::Result<()> {
    let trials = TrialSimulator::new(args.seed)
        .with_sanity_checks()
        .generate()?;
    let (run, output) = execute(&args.qc, trials).await?;
    println!("{}", output.report().with_run(run));
    Ok(())
}

/// A pipeline output together with the invocation that produced it.
#[derive(Serialize)]
struct RunRecord<'a> {
    #[serde(flatten)]
    run: RunMetadata,
    #[serde(flatten)]
    output: &'a PipelineOutput,
}

/// Builds the pipeline and runs it, under a deadline when one is given.
async fn execute(
    qc: &QcArgs,
    trials: Vec<TrialRecord>,
) -> anyhow::Result<(RunMetadata, PipelineOutput)> {
    let pipeline = QcPipeline::new(qc.resolve_config()?)?;
    let run = RunMetadata::new();
    info!(run_id = %run.run_id, started_at = %run.started_at, "Starting run");

    let output = match qc.deadline_secs {
        Some(secs) => {
            pipeline
                .run_with_deadline(trials, Duration::from_secs(secs))
                .await?
        }
        None => pipeline.run(&trials),
    };
    Ok((run, output))
}

/// Loads a JSON array of trial records, rejecting duplicate trial ids.
pub fn load_trials(path: &Path) -> Result<Vec<TrialRecord>, DataError> {
    let content = fs::read_to_string(path).map_err(|source| DataError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let trials: Vec<TrialRecord> = serde_json::from_str(&content)?;

    let mut seen = HashSet::with_capacity(trials.len());
    for trial in &trials {
        if !seen.insert(trial.trial_id) {
            return Err(DataError::DuplicateTrialId {
                path: path.display().to_string(),
                trial_id: trial.trial_id,
            });
        }
    }

    Ok(trials)
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DataError> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).map_err(|source| DataError::Write {
        path: path.display().to_string(),
        source,
    })
}
