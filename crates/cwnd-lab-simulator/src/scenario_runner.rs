use crate::engine::Simulator;
use crate::trace::SimulationReport;
use anyhow::{Context, Result};
use cwnd_lab_abstract::{Scenario, ScenarioAssertion, SimConfig};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

/// Load a scenario from disk, run it on top of `base` and check its assertions.
pub fn run_scenario(path: impl AsRef<Path>, base: SimConfig) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_loaded(&scenario, base)
}

pub fn run_loaded(scenario: &Scenario, mut base: SimConfig) -> Result<SimulationReport> {
    info!("Running scenario '{}': {}", scenario.name, scenario.description);
    scenario.config.apply_to(&mut base);

    let mut sim = Simulator::seeded(base)
        .with_context(|| format!("Scenario '{}' has an invalid configuration", scenario.name))?;
    sim.run_until_complete();
    let report = sim.export_report();
    check_report(scenario, &report)?;
    Ok(report)
}

/// Check every assertion of `scenario` against a finished run.
pub fn check_report(scenario: &Scenario, report: &SimulationReport) -> Result<()> {
    let failures: Vec<String> = scenario
        .assertions
        .iter()
        .filter_map(|assertion| check_assertion(assertion, report).err())
        .collect();

    if !failures.is_empty() {
        for failure in &failures {
            warn!("[{}] {}", scenario.name, failure);
        }
        anyhow::bail!(
            "Scenario '{}' failed {} of {} assertions:\n  {}",
            scenario.name,
            failures.len(),
            scenario.assertions.len(),
            failures.join("\n  ")
        );
    }

    info!(
        "Scenario '{}' passed {} assertions (throughput {:.3})",
        scenario.name,
        scenario.assertions.len(),
        report.throughput
    );
    Ok(())
}

/// Check a single assertion, describing the mismatch on failure.
pub fn check_assertion(
    assertion: &ScenarioAssertion,
    report: &SimulationReport,
) -> Result<(), String> {
    match assertion {
        ScenarioAssertion::Throughput { min, max } => {
            in_range("throughput", report.throughput, *min, *max)
        }
        ScenarioAssertion::CwndMax { min, max } => {
            let peak = report.peak_cwnd().unwrap_or(0.0);
            in_range("peak cwnd", peak, *min, *max)
        }
        ScenarioAssertion::CwndDrop {
            from_at_least,
            to_at_most,
        } => {
            let reached = report
                .trace
                .iter()
                .position(|s| s.cwnd >= *from_at_least);
            let dropped = reached.is_some_and(|start| {
                report.trace[start + 1..]
                    .iter()
                    .any(|s| s.cwnd <= *to_at_most)
            });
            if dropped {
                Ok(())
            } else {
                Err(format!(
                    "cwnd never dropped from >= {} to <= {}",
                    from_at_least, to_at_most
                ))
            }
        }
        ScenarioAssertion::LossEvents { min, max } => in_range(
            "loss events",
            report.loss_events as f64,
            *min as f64,
            max.map(|m| m as f64),
        ),
        ScenarioAssertion::TickCount { min, max } => in_range(
            "tick count",
            report.ticks as f64,
            *min as f64,
            max.map(|m| m as f64),
        ),
    }
}

fn in_range(what: &str, value: f64, min: f64, max: Option<f64>) -> Result<(), String> {
    if value < min {
        return Err(format!("{} {} is below minimum {}", what, value, min));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(format!("{} {} exceeds maximum {}", what, value, max));
    }
    Ok(())
}
