use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use symbiosis_core::{SimulationMode, SymbiosisConfig, TickSummary, World};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "symbiosis",
    version,
    about = "Run a host/symbiont coevolution experiment"
)]
struct Cli {
    /// JSON configuration file; omitted fields keep their defaults.
    #[arg(short, long, env = "SYMBIOSIS_CONFIG")]
    config: Option<PathBuf>,

    /// Updates to run with mutation enabled.
    #[arg(short, long, default_value_t = 1000)]
    ticks: u64,

    /// Extra updates to run after mutation is switched off.
    #[arg(long, default_value_t = 0)]
    no_mutation_ticks: u64,

    /// Override the configured RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured organism kinds.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<SimulationMode>,

    /// Log a summary every N updates (0 logs only the final one).
    #[arg(long, default_value_t = 100)]
    report_every: u64,

    /// Print every reported summary to stdout as a JSON line.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut world = World::new(config).context("invalid world configuration")?;
    world.populate().context("failed to populate world")?;
    info!(ticks = cli.ticks, no_mutation_ticks = cli.no_mutation_ticks, "starting run");

    let mut last = None;
    for _ in 0..cli.ticks {
        last = Some(step(&mut world, &cli)?);
    }
    if cli.no_mutation_ticks > 0 {
        world.disable_mutation();
        for _ in 0..cli.no_mutation_ticks {
            last = Some(step(&mut world, &cli)?);
        }
    }

    match last {
        Some(summary) => {
            log_summary(&summary, "run finished");
            if cli.json && !is_report_tick(&summary, cli.report_every) {
                emit_json(&summary)?;
            }
        }
        None => warn!("run finished without any updates"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<SymbiosisConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => SymbiosisConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
        if mode == SimulationMode::Lysis {
            config.lysis = true;
        }
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<SymbiosisConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn parse_config(raw: &str) -> Result<SymbiosisConfig> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_mode(raw: &str) -> Result<SimulationMode, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_ascii_lowercase()))
        .map_err(|_| format!("unknown mode `{raw}` (expected default, efficient, lysis or pgg)"))
}

fn step(world: &mut World, cli: &Cli) -> Result<TickSummary> {
    let summary = world
        .update()
        .with_context(|| format!("update {} failed", world.tick().0))?;
    if is_report_tick(&summary, cli.report_every) {
        log_summary(&summary, "progress");
        if cli.json {
            emit_json(&summary)?;
        }
    }
    Ok(summary)
}

fn is_report_tick(summary: &TickSummary, every: u64) -> bool {
    every > 0 && summary.tick.0 % every == 0
}

fn log_summary(summary: &TickSummary, message: &str) {
    info!(
        tick = summary.tick.0,
        hosts = summary.hosts,
        hosted_symbionts = summary.hosted_symbionts,
        free_symbionts = summary.free_symbionts,
        uninfected_hosts = summary.uninfected_hosts,
        births = summary.births,
        deaths = summary.deaths,
        mean_host_interaction = summary.mean_host_interaction,
        mean_symbiont_interaction = summary.mean_symbiont_interaction,
        vertical = summary.counters.vertical_successes,
        horizontal = summary.counters.horizontal_successes,
        "{message}"
    );
}

fn emit_json(summary: &TickSummary) -> Result<()> {
    let line = serde_json::to_string(summary).context("failed to encode summary")?;
    println!("{line}");
    Ok(())
}
