//! Vigil - diagnostic health checks and self-repair
//!
//! The `vigil` command drives the standard module catalog.
//!
//! ## Commands
//!
//! - `sweep`: Run one diagnostic sweep
//! - `repair`: Attempt one repair on a named module
//! - `run`: Run the repair loop until converged, capped, or interrupted
//! - `stability`: Compute the stability aggregate for a cohort
//! - `score`: Compute a bounded confidence score

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};

use vigil_core::stability::COHORT_SIZE;
use vigil_core::{
    compute_stability, compute_with_bands, DiagnosticResult, LoopReport, Metrics, ModuleCatalog,
    Participant, RepairDispatcher, RepairLoop, ScoreInputs, StabilityMetric, StandardModules,
    TracingSink, VigilConfig,
};

#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diagnostic health checks and self-repair", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML); defaults plus VIGIL_* overrides when omitted
    #[arg(short, long, global = true, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Result format on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one diagnostic sweep over the standard modules
    Sweep {
        /// Inject seeded faults before sweeping
        #[arg(long)]
        faults: Option<u64>,
    },

    /// Attempt one repair on a module, then re-check it
    Repair {
        /// Module to repair
        module: String,

        /// Inject seeded faults before repairing
        #[arg(long)]
        faults: Option<u64>,
    },

    /// Run the repair loop; Ctrl-C stops it at the next iteration boundary
    Run {
        /// Inject seeded faults before starting
        #[arg(long)]
        faults: Option<u64>,

        /// Override the iteration cap
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the backoff between iterations
        #[arg(long)]
        backoff_ms: Option<u64>,
    },

    /// Compute the stability aggregate for exactly three participants
    Stability {
        /// Participant as NAME:CLEARANCE:REACH (repeat three times)
        #[arg(short, long = "participant", value_parser = parse_participant)]
        participants: Vec<Participant>,
    },

    /// Compute a bounded confidence score in [0, 1]
    Score {
        #[arg(long, default_value = "1.0")]
        alignment: f64,
        #[arg(long, default_value = "1.0")]
        coherence: f64,
        #[arg(long, default_value = "1.0")]
        harmonic: f64,
        #[arg(long, default_value = "1.0")]
        intensity: f64,
        #[arg(long, default_value = "1.0")]
        belief: f64,
        #[arg(long, default_value = "1.0")]
        trust: f64,
        /// Reference frequency in Hz, matched against resonance bands
        #[arg(long, default_value = "0.0")]
        frequency: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vigil_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sweep { faults } => cmd_sweep(&config, faults, cli.output).await,
        Commands::Repair { module, faults } => {
            cmd_repair(&config, &module, faults, cli.output).await
        }
        Commands::Run {
            faults,
            max_iterations,
            backoff_ms,
        } => {
            let mut config = config;
            if let Some(n) = max_iterations {
                config.repair_loop.max_iterations = n;
            }
            if let Some(ms) = backoff_ms {
                config.repair_loop.backoff_ms = ms;
            }
            config.validate().context("Invalid loop overrides")?;
            cmd_run(&config, faults, cli.output).await
        }
        Commands::Stability { participants } => {
            cmd_stability(&config, &participants, cli.output)
        }
        Commands::Score {
            alignment,
            coherence,
            harmonic,
            intensity,
            belief,
            trust,
            frequency,
        } => {
            let inputs = ScoreInputs {
                alignment_index: alignment,
                coherence_factor: coherence,
                harmonic_quotient: harmonic,
                intensity,
                belief,
                trust,
                reference_hz: frequency,
            };
            cmd_score(&config, &inputs, cli.output)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<VigilConfig> {
    match path {
        Some(path) => VigilConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => VigilConfig::from_env().context("Invalid VIGIL_* environment overrides"),
    }
}

/// Parse `NAME:CLEARANCE:REACH`.
fn parse_participant(s: &str) -> std::result::Result<Participant, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [name, clearance, reach] = parts.as_slice() else {
        return Err(format!("expected NAME:CLEARANCE:REACH, got '{s}'"));
    };
    if name.is_empty() {
        return Err("participant name must not be empty".to_string());
    }
    let clearance: f64 = clearance
        .parse()
        .map_err(|_| format!("invalid clearance '{clearance}'"))?;
    let reach: f64 = reach
        .parse()
        .map_err(|_| format!("invalid reach '{reach}'"))?;
    Ok(Participant::new(*name, clearance, reach))
}

/// Standard modules plus a catalog wired to them, with optional faults.
fn standard_catalog(
    config: &VigilConfig,
    faults: Option<u64>,
) -> Result<(StandardModules, ModuleCatalog)> {
    let modules = StandardModules::new(config).context("Failed to build standard modules")?;
    let catalog = modules
        .catalog(config, Arc::new(Metrics::new()))
        .context("Failed to register standard modules")?;
    if let Some(seed) = faults {
        let touched = modules.inject_faults(seed);
        info!(seed, touched = ?touched, "Injected faults");
    }
    Ok((modules, catalog))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_results(results: &[DiagnosticResult]) {
    for r in results {
        println!(
            "{:<12} {:<9} score {:>5.1}  confidence {:.2}  {}",
            r.module_name, r.status, r.score, r.confidence, r.detail
        );
        for hint in &r.repair_hints {
            println!("{:<12} hint: {}", "", hint);
        }
    }
}

async fn cmd_sweep(config: &VigilConfig, faults: Option<u64>, output: OutputFormat) -> Result<()> {
    let (_modules, catalog) = standard_catalog(config, faults)?;
    let results = catalog.run_all().await;

    match output {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Text => {
            print_results(&results);
            let unhealthy = results.iter().filter(|r| !r.is_healthy()).count();
            println!();
            println!("{} module(s), {} unhealthy", results.len(), unhealthy);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RepairSummary {
    module: String,
    repaired: bool,
    before: DiagnosticResult,
    after: DiagnosticResult,
}

async fn cmd_repair(
    config: &VigilConfig,
    module: &str,
    faults: Option<u64>,
    output: OutputFormat,
) -> Result<()> {
    let (_modules, catalog) = standard_catalog(config, faults)?;
    let catalog = Arc::new(catalog);
    if !catalog.contains(module) {
        bail!(
            "Unknown module '{}'; known modules: {}",
            module,
            catalog.names().join(", ")
        );
    }

    let dispatcher = RepairDispatcher::new(Arc::clone(&catalog))
        .with_repair_timeout(config.repair_loop.repair_timeout());
    let before = catalog.check(module).await?;
    let repaired = dispatcher.repair(module).await;
    let after = catalog.check(module).await?;

    let summary = RepairSummary {
        module: module.to_string(),
        repaired,
        before,
        after,
    };
    match output {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!(
                "{}: {} -> {} ({})",
                summary.module,
                summary.before.status,
                summary.after.status,
                if repaired { "repaired" } else { "repair failed" }
            );
        }
    }
    Ok(())
}

async fn cmd_run(config: &VigilConfig, faults: Option<u64>, output: OutputFormat) -> Result<()> {
    let (_modules, catalog) = standard_catalog(config, faults)?;
    let repair_loop = RepairLoop::new(Arc::new(catalog), config.repair_loop.clone())
        .with_sink(Arc::new(TracingSink));
    repair_loop.start();

    let stopper = repair_loop.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping at the next iteration boundary");
            stopper.stop();
        }
    });

    let report = repair_loop
        .wait()
        .await
        .context("Repair loop ended without a report")?;
    interrupt.abort();

    print_report(&report, output)
}

fn print_report(report: &LoopReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Text => {
            print_results(&report.final_results);
            println!();
            println!("Run:     {}", report.run_id);
            println!("Outcome: {}", report.outcome);
            println!("{}", report.summary());
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct StabilitySummary {
    #[serde(flatten)]
    metric: StabilityMetric,
    gate_threshold: f64,
    gate_open: bool,
}

fn cmd_stability(
    config: &VigilConfig,
    participants: &[Participant],
    output: OutputFormat,
) -> Result<()> {
    let metric = compute_stability(participants);
    if participants.len() != COHORT_SIZE {
        warn!(
            count = participants.len(),
            expected = COHORT_SIZE,
            "Wrong cohort size; stability is zero"
        );
    }
    let gate = config.stability.gate();
    let summary = StabilitySummary {
        metric,
        gate_threshold: gate.threshold,
        gate_open: gate.permits(&metric),
    };

    match output {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!("Stability: {:.4}", summary.metric.value);
            println!("Boost:     {:.4}", summary.metric.boost);
            println!(
                "Gate:      {} (threshold {:.2})",
                if summary.gate_open { "open" } else { "closed" },
                summary.gate_threshold
            );
        }
    }
    Ok(())
}

fn cmd_score(config: &VigilConfig, inputs: &ScoreInputs, output: OutputFormat) -> Result<()> {
    let score = compute_with_bands(inputs, &config.resonance.bands);
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "score": score }))?,
        OutputFormat::Text => println!("Score: {:.6}", score),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_participant() {
        let p = parse_participant("helm:2.5:0.8").unwrap();
        assert_eq!(p.name, "helm");
        assert_eq!(p.clearance, 2.5);
        assert_eq!(p.reach, 0.8);
    }

    #[test]
    fn test_parse_participant_rejects_malformed() {
        assert!(parse_participant("helm:2.5").is_err());
        assert!(parse_participant("helm:x:0.8").is_err());
        assert!(parse_participant(":1:1").is_err());
        assert!(parse_participant("a:1:1:1").is_err());
    }

    #[test]
    fn test_cli_parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "vigil",
            "--output",
            "json",
            "run",
            "--faults",
            "7",
            "--max-iterations",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Run {
                faults,
                max_iterations,
                backoff_ms,
            } => {
                assert_eq!(faults, Some(7));
                assert_eq!(max_iterations, Some(3));
                assert_eq!(backoff_ms, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_stability_participants() {
        let cli = Cli::try_parse_from([
            "vigil",
            "stability",
            "-p",
            "helm:3:1",
            "-p",
            "ops:3:1",
            "--participant",
            "science:3:1",
        ])
        .unwrap();
        match cli.command {
            Commands::Stability { participants } => assert_eq!(participants.len(), 3),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_participant() {
        assert!(Cli::try_parse_from(["vigil", "stability", "-p", "helm"]).is_err());
    }

    #[tokio::test]
    async fn test_repair_unknown_module_errors() {
        let config = VigilConfig::default();
        let err = cmd_repair(&config, "nonexistent", None, OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_faults_converges() {
        let mut config = VigilConfig::default();
        config.repair_loop.backoff_ms = 10;
        let (modules, catalog) = standard_catalog(&config, Some(42)).unwrap();
        modules.degrade_all();
        let repair_loop = RepairLoop::new(Arc::new(catalog), config.repair_loop.clone());
        let report = repair_loop.run().await.unwrap();
        assert_eq!(report.outcome, vigil_core::LoopOutcome::Converged);
    }
}
