use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use cwnd_lab_abstract::{Algorithm, SimConfig, SimConfigOverride};
use cwnd_lab_simulator::tui::{MemoryLogBuffer, TuiApp};
use cwnd_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-RTT TCP Tahoe/Reno congestion window simulator")]
struct Args {
    /// Base configuration file (TOML, any subset of fields).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a scenario file and check its assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Launch the terminal UI visualizer.
    #[arg(long, default_value_t = false)]
    tui: bool,

    /// Congestion control variant: tahoe or reno.
    #[arg(long)]
    algorithm: Option<Algorithm>,

    /// Per-packet loss probability in [0, 1].
    #[arg(long)]
    loss_rate: Option<f64>,

    /// Round-trip time in seconds.
    #[arg(long)]
    rtt: Option<f64>,

    /// Simulated duration in seconds.
    #[arg(long)]
    sim_time: Option<f64>,

    /// Segment size used for throughput accounting.
    #[arg(long)]
    mss: Option<f64>,

    #[arg(long)]
    initial_cwnd: Option<f64>,
    #[arg(long)]
    ssthresh: Option<f64>,
    #[arg(long)]
    cwnd_cap: Option<f64>,

    /// Seed for the random loss oracle.
    #[arg(long)]
    seed: Option<u64>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_buffer = init_logging(args.tui);
    info!("cwnd-lab starting…");

    let base = args.base_config()?;

    let report = if let Some(path) = &args.scenario {
        if args.tui {
            run_scenario_tui(path, base, &args.flag_overrides(), log_buffer)?
        } else {
            // Flags win over the scenario's own [config] table.
            let mut scenario = scenario_runner::load_scenario(path)?;
            merge_override(&mut scenario.config, &args.flag_overrides());
            scenario_runner::run_loaded(&scenario, base)?
        }
    } else {
        let mut config = base;
        args.flag_overrides().apply_to(&mut config);
        run_default_sim(args.tui, config, None, log_buffer)?
    };

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    println!("Sim done. Throughput (MSS/s): {:.3}", report.throughput);
    Ok(())
}

impl Args {
    /// Defaults, optionally replaced by the `--config` file.
    fn base_config(&self) -> Result<SimConfig> {
        match &self.config {
            Some(path) => load_config(path),
            None => Ok(SimConfig::default()),
        }
    }

    fn flag_overrides(&self) -> SimConfigOverride {
        SimConfigOverride {
            rtt: self.rtt,
            sim_time: self.sim_time,
            mss: self.mss,
            loss_rate: self.loss_rate,
            algorithm: self.algorithm,
            initial_cwnd: self.initial_cwnd,
            ssthresh_init: self.ssthresh,
            cwnd_cap: self.cwnd_cap,
            seed: self.seed,
        }
    }
}

fn merge_override(target: &mut SimConfigOverride, flags: &SimConfigOverride) {
    target.rtt = flags.rtt.or(target.rtt);
    target.sim_time = flags.sim_time.or(target.sim_time);
    target.mss = flags.mss.or(target.mss);
    target.loss_rate = flags.loss_rate.or(target.loss_rate);
    target.algorithm = flags.algorithm.or(target.algorithm);
    target.initial_cwnd = flags.initial_cwnd.or(target.initial_cwnd);
    target.ssthresh_init = flags.ssthresh_init.or(target.ssthresh_init);
    target.cwnd_cap = flags.cwnd_cap.or(target.cwnd_cap);
    target.seed = flags.seed.or(target.seed);
}

fn init_logging(use_tui: bool) -> Option<MemoryLogBuffer> {
    if use_tui {
        let buffer = MemoryLogBuffer::new();
        let writer = buffer.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .init();
        Some(buffer)
    } else {
        tracing_subscriber::fmt::init();
        None
    }
}

fn run_default_sim(
    use_tui: bool,
    config: SimConfig,
    scenario_name: Option<String>,
    logs: Option<MemoryLogBuffer>,
) -> Result<SimulationReport> {
    let mut sim = Simulator::seeded(config).context("Refusing to start simulation")?;
    if use_tui {
        let mut app = TuiApp::new(sim, scenario_name);
        if let Some(logs) = logs {
            app = app.with_logs(logs);
        }
        app.run()?;
        let sim = app.into_simulator();
        Ok(sim.export_report())
    } else {
        info!("Starting headless simulation…");
        sim.run_until_complete();
        let report = sim.export_report();
        info!("{}", report.title());
        Ok(report)
    }
}

fn run_scenario_tui(
    path: &Path,
    base: SimConfig,
    flags: &SimConfigOverride,
    logs: Option<MemoryLogBuffer>,
) -> Result<SimulationReport> {
    let scenario = scenario_runner::load_scenario(path)?;
    let mut config = base;
    scenario.config.apply_to(&mut config);
    flags.apply_to(&mut config);
    let sim = Simulator::seeded(config)
        .with_context(|| format!("Scenario '{}' has an invalid configuration", scenario.name))?;

    let mut app = TuiApp::new(sim, Some(scenario.name.clone()));
    if let Some(logs) = logs {
        app = app.with_logs(logs);
    }
    app.run()?;

    // Quitting early still judges the whole run.
    let mut sim = app.into_simulator();
    sim.run_until_complete();
    let report = sim.export_report();
    scenario_runner::check_report(&scenario, &report)?;
    Ok(report)
}

fn load_config(path: &Path) -> Result<SimConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SimConfig = toml::from_str(&content).context("Failed to parse config file")?;
    Ok(config)
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    info!("Trace written to {}", path.display());
    Ok(())
}
