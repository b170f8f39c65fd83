use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hypercycle_core::config::SimConfig;
use hypercycle_core::metrics::HypercycleReport;
use hypercycle_core::space::Space;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

const WARMUP_TICKS: usize = 1_000;
const BENCHMARK_TICKS: usize = 50_000;
const CSV_HEADER: &str = "run,cycles,cell_complexity,rule_complexity,alive,last_reproduction";

#[derive(Parser)]
#[command(name = "hypercycle")]
#[command(about = "Hypercycle cell/rule/product simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation from a config file
    Run {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for summary.json and results.csv (optional)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Number of ticks to run (defaults to a budget scaled by product types)
        #[arg(long)]
        steps: Option<usize>,

        /// Ticks between metric samples
        #[arg(long, default_value_t = 1_000)]
        sample_every: usize,

        /// Label for the CSV row (defaults to the seed)
        #[arg(long)]
        label: Option<String>,
    },
    /// Measure ticks per second at several population sizes
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let file = File::open(path).with_context(|| format!("failed to open config file {path:?}"))?;
    serde_json::from_reader(BufReader::new(file)).context("failed to parse config")
}

/// Frozen runs report zeros for everything but the last reproduction step.
fn csv_row(label: &str, report: &HypercycleReport) -> String {
    let c = &report.cycles;
    let alive = if report.active { report.alive_cells } else { 0 };
    format!(
        "{label},{},{},{},{alive},{}",
        c.cycle_count,
        c.plus3_cell_complexity,
        c.plus3_rule_complexity,
        report.last_reproduction_step
    )
}

fn append_csv(path: &Path, row: &str) -> Result<()> {
    let fresh = !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {path:?}"))?;
    if fresh {
        writeln!(file, "{CSV_HEADER}")?;
    }
    writeln!(file, "{row}").context("failed to append results row")
}

fn run_benchmark(cell_count: usize, edge: i32) -> Result<()> {
    let config = SimConfig {
        cell_count,
        rule_count: cell_count * 10,
        product_count: cell_count * 10,
        space_width: edge,
        space_height: edge,
        invariant_checks: false,
        ..SimConfig::default()
    };
    let mut space = Space::new(config).context("failed to initialize space")?;
    for _ in 0..WARMUP_TICKS {
        space.step();
    }

    let start = Instant::now();
    for _ in 0..BENCHMARK_TICKS {
        space.step();
    }
    let elapsed = start.elapsed().as_secs_f64();
    let ticks_per_sec = BENCHMARK_TICKS as f64 / elapsed.max(f64::EPSILON);

    let t0 = Instant::now();
    let report = space.report(space.step_count());
    let analysis_ms = t0.elapsed().as_secs_f64() * 1_000.0;

    println!("--- {cell_count} cells on {edge}x{edge} ---");
    println!("  Ticks/sec:     {ticks_per_sec:.0}");
    println!(
        "  Analysis:      {analysis_ms:.1} ms ({} cycles{})",
        report.cycles.cycle_count,
        if report.cycles.truncated { ", truncated" } else { "" }
    );
    println!("  Alive cells:   {}/{cell_count}", report.alive_cells);
    println!();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = SimConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p hypercycle-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== Hypercycle benchmark ===");
            println!("Warmup: {WARMUP_TICKS} ticks, Benchmark: {BENCHMARK_TICKS} ticks");
            println!();
            for (cells, edge) in [(20, 10), (100, 25), (500, 50), (2_000, 100)] {
                run_benchmark(cells, edge)?;
            }
        }
        Commands::Run {
            config,
            out,
            steps,
            sample_every,
            label,
        } => {
            let sim_config = load_config(config.as_deref())?;
            sim_config.validate().context("Config validation error")?;
            let label = label.unwrap_or_else(|| sim_config.seed.to_string());
            let steps = steps.unwrap_or_else(|| sim_config.default_run_steps());

            info!(seed = sim_config.seed, steps, "starting run");
            let mut space = Space::new(sim_config).context("failed to initialize space")?;
            let summary = space
                .run_experiment(steps, sample_every)
                .context("experiment failed")?;
            let row = csv_row(&label, &summary.report);

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let file = File::create(out_dir.join("summary.json"))
                    .context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                append_csv(&out_dir.join("results.csv"), &row)?;
                println!("Run complete. Results saved to {out_dir:?}");
            } else {
                println!("{CSV_HEADER}");
                println!("{row}");
            }
        }
    }
    Ok(())
}
