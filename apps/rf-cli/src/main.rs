mod error;
mod output;

use clap::{Parser, Subcommand};
use error::{CliError, CliResult};
use output::{BatchSummary, EdcSummary, ExtinctionSummary, IgnitionSummary, write_json};
use rf_batch::{BatchConfig, BatchScheduler, CellReactor, CellState};
use rf_core::timing::{enable_timing, integrator_timing};
use rf_core::{atm, k};
use rf_edc::{EdcClosure, EdcConstants, TurbulenceState};
use rf_mech::{Mechanism, load_mechanism_file};
use rf_reactor::{
    ExtinctionOptions, GasState, IgnitionCriterion, IgnitionOptions, ReactorKind, extinction_residence_time,
    ignition_delay,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const STOICHIOMETRIC_H2_AIR: &str = "H2:2, O2:1, N2:3.76";

#[derive(Parser)]
#[command(name = "rf-cli")]
#[command(about = "reactflow CLI - chemical kinetics for reacting-flow simulation", long_about = None)]
struct Cli {
    /// Print integrator hot-path timings on exit
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a mechanism and report what it contains
    Validate {
        /// Path to the mechanism YAML file
        mechanism: PathBuf,
    },
    /// Ignition delay of a closed adiabatic reactor
    Ignition {
        mechanism: PathBuf,
        /// Initial temperature (K)
        #[arg(long, default_value_t = 1000.0)]
        temperature: f64,
        /// Initial pressure (atm)
        #[arg(long, default_value_t = 1.0)]
        pressure: f64,
        /// Mole-basis composition, e.g. "H2:2, O2:1, N2:3.76"
        #[arg(long, default_value = STOICHIOMETRIC_H2_AIR)]
        composition: String,
        /// Hold pressure instead of volume
        #[arg(long)]
        constant_pressure: bool,
        /// Temperature rise marking ignition (K)
        #[arg(long, default_value_t = 400.0)]
        rise: f64,
        /// Use the peak of dT/dt instead of a temperature rise
        #[arg(long)]
        max_rate: bool,
        /// Give up after this time (s)
        #[arg(long, default_value_t = 0.1)]
        t_end: f64,
        /// Write a JSON summary here
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Extinction residence time of a perfectly stirred reactor
    Extinction {
        mechanism: PathBuf,
        /// Feed temperature (K)
        #[arg(long, default_value_t = 300.0)]
        temperature: f64,
        /// Pressure (atm)
        #[arg(long, default_value_t = 1.0)]
        pressure: f64,
        #[arg(long, default_value = STOICHIOMETRIC_H2_AIR)]
        composition: String,
        /// Residence time of the first burning solution (s)
        #[arg(long, default_value_t = 1e-3)]
        tau: f64,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Advance a synthetic batch of cells and report throughput
    Batch {
        mechanism: PathBuf,
        #[arg(long, default_value_t = 1000)]
        cells: usize,
        /// Lowest cell temperature (K)
        #[arg(long, default_value_t = 1000.0)]
        temperature: f64,
        /// Cell temperatures span [temperature, temperature + spread] (K)
        #[arg(long, default_value_t = 300.0)]
        spread: f64,
        #[arg(long, default_value_t = 1.0)]
        pressure: f64,
        #[arg(long, default_value = STOICHIOMETRIC_H2_AIR)]
        composition: String,
        /// Time step (s)
        #[arg(long, default_value_t = 1e-5)]
        dt: f64,
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,
        /// Size of a dedicated worker pool
        #[arg(long)]
        threads: Option<usize>,
        /// Batch timeout (ms)
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        constant_volume: bool,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// EDC mean reaction rates of one cell
    Edc {
        mechanism: PathBuf,
        #[arg(long, default_value_t = 1200.0)]
        temperature: f64,
        #[arg(long, default_value_t = 1.0)]
        pressure: f64,
        #[arg(long, default_value = STOICHIOMETRIC_H2_AIR)]
        composition: String,
        /// Turbulence kinetic energy (m^2/s^2)
        #[arg(long, default_value_t = 1.0)]
        k: f64,
        /// Dissipation rate (m^2/s^3)
        #[arg(long, default_value_t = 1e3)]
        epsilon: f64,
        /// Kinematic viscosity (m^2/s)
        #[arg(long, default_value_t = 1.5e-5)]
        nu: f64,
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if cli.timing {
        enable_timing();
    }

    let result = match cli.command {
        Commands::Validate { mechanism } => cmd_validate(&mechanism),
        Commands::Ignition {
            mechanism,
            temperature,
            pressure,
            composition,
            constant_pressure,
            rise,
            max_rate,
            t_end,
            json,
        } => {
            let criterion = if max_rate {
                IgnitionCriterion::MaxTemperatureRate
            } else {
                IgnitionCriterion::TemperatureRise(rise)
            };
            let kind = if constant_pressure {
                ReactorKind::ConstantPressure
            } else {
                ReactorKind::ConstantVolume
            };
            let options = IgnitionOptions {
                criterion,
                t_end,
                ..IgnitionOptions::default()
            };
            cmd_ignition(&mechanism, temperature, pressure, &composition, kind, &options, json.as_deref())
        }
        Commands::Extinction {
            mechanism,
            temperature,
            pressure,
            composition,
            tau,
            json,
        } => {
            let options = ExtinctionOptions {
                initial_residence_time: tau,
                ..ExtinctionOptions::default()
            };
            cmd_extinction(&mechanism, temperature, pressure, &composition, &options, json.as_deref())
        }
        Commands::Batch {
            mechanism,
            cells,
            temperature,
            spread,
            pressure,
            composition,
            dt,
            chunk_size,
            threads,
            timeout_ms,
            constant_volume,
            json,
        } => {
            let config = BatchConfig {
                chunk_size,
                threads,
                timeout: timeout_ms.map(Duration::from_millis),
                reactor: if constant_volume {
                    CellReactor::ConstantVolume
                } else {
                    CellReactor::ConstantPressure
                },
                ..BatchConfig::default()
            };
            let layout = CellLayout {
                count: cells,
                temperature,
                spread,
                pressure,
            };
            cmd_batch(&mechanism, &layout, &composition, dt, config, json.as_deref())
        }
        Commands::Edc {
            mechanism,
            temperature,
            pressure,
            composition,
            k,
            epsilon,
            nu,
            json,
        } => cmd_edc(
            &mechanism,
            temperature,
            pressure,
            &composition,
            TurbulenceState::new(k, epsilon, nu),
            json.as_deref(),
        ),
    };

    if cli.timing {
        print!("{}", integrator_timing::summary());
    }
    result
}

fn load(path: &Path) -> CliResult<Arc<Mechanism>> {
    let mech = load_mechanism_file(path)?;
    info!(
        path = %path.display(),
        species = mech.species_count(),
        reactions = mech.reaction_count(),
        "mechanism loaded"
    );
    Ok(mech)
}

fn initial_state(mech: &Mechanism, temperature: f64, pressure: f64, composition: &str) -> CliResult<GasState> {
    Ok(GasState::from_composition(mech, k(temperature), atm(pressure), composition)?)
}

fn cmd_validate(path: &Path) -> CliResult<()> {
    println!("Validating mechanism: {}", path.display());
    let mech = load(path)?;
    println!("✓ Mechanism '{}' is valid", mech.name());
    println!("  Elements:  {}", mech.element_names().join(" "));
    println!("  Species:   {}", mech.species_count());
    println!("  Reactions: {}", mech.reaction_count());
    let names: Vec<&str> = mech.species_names().collect();
    println!("  {}", names.join(" "));
    Ok(())
}

fn cmd_ignition(
    path: &Path,
    temperature: f64,
    pressure: f64,
    composition: &str,
    kind: ReactorKind,
    options: &IgnitionOptions,
    json: Option<&Path>,
) -> CliResult<()> {
    let mech = load(path)?;
    let initial = initial_state(&mech, temperature, pressure, composition)?;
    println!(
        "Ignition, {} reactor: T0 = {temperature} K, p0 = {pressure} atm, {composition}",
        kind.label()
    );
    let result = ignition_delay(Arc::clone(&mech), kind, initial, options)?;
    println!("✓ Ignition delay: {:.4e} s", result.delay);
    println!("  T at ignition:  {:.1} K", result.temperature);
    println!("  Peak dT/dt:     {:.3e} K/s", result.max_temperature_rate);
    println!(
        "  Steps: {} accepted, {} rejected",
        result.stats.accepted_steps, result.stats.rejected_steps
    );
    if let Some(path) = json {
        write_json(&IgnitionSummary::from(result), path)?;
    }
    Ok(())
}

fn cmd_extinction(
    path: &Path,
    temperature: f64,
    pressure: f64,
    composition: &str,
    options: &ExtinctionOptions,
    json: Option<&Path>,
) -> CliResult<()> {
    let mech = load(path)?;
    let feed = initial_state(&mech, temperature, pressure, composition)?;
    println!("Extinction of a stirred reactor fed with {composition} at {temperature} K");
    let result = extinction_residence_time(Arc::clone(&mech), &feed, options)?;
    println!("✓ Extinction residence time: {:.4e} s", result.residence_time);
    println!("  Extinguished at:   {:.4e} s", result.extinguished_at);
    println!("  Burning T at τ:    {:.1} K", result.burning_state.temperature_k());
    println!("  Solutions computed: {}", result.history.len());
    if let Some(path) = json {
        write_json(&ExtinctionSummary::from(result), path)?;
    }
    Ok(())
}

struct CellLayout {
    count: usize,
    temperature: f64,
    spread: f64,
    pressure: f64,
}

fn cmd_batch(
    path: &Path,
    layout: &CellLayout,
    composition: &str,
    dt: f64,
    config: BatchConfig,
    json: Option<&Path>,
) -> CliResult<()> {
    if layout.count == 0 {
        return Err(CliError::Usage("--cells must be positive".to_string()));
    }
    let mech = load(path)?;
    let cells = (0..layout.count)
        .map(|i| {
            let frac = if layout.count > 1 {
                i as f64 / (layout.count - 1) as f64
            } else {
                0.0
            };
            let state = initial_state(&mech, layout.temperature + frac * layout.spread, layout.pressure, composition)?;
            Ok(CellState::new(
                state.temperature_k(),
                state.density(&mech),
                state.mass_fractions().to_vec(),
            ))
        })
        .collect::<CliResult<Vec<_>>>()?;

    println!("Advancing {} cells by {dt:e} s", cells.len());
    let scheduler = BatchScheduler::new(Arc::clone(&mech), config)?;
    let report = scheduler.advance(&cells, dt)?;
    let summary = BatchSummary::from(&report);
    println!(
        "✓ {} converged, {} failed, {} timed out",
        summary.converged, summary.failed, summary.timed_out
    );
    println!(
        "  Wall time: {:.3} s ({:.0} cells/s, {:.1} steps/cell)",
        summary.wall_time_s, summary.cells_per_second, summary.mean_accepted_steps
    );
    if let Some(path) = json {
        write_json(&summary, path)?;
    }
    Ok(())
}

fn cmd_edc(
    path: &Path,
    temperature: f64,
    pressure: f64,
    composition: &str,
    turbulence: TurbulenceState,
    json: Option<&Path>,
) -> CliResult<()> {
    let mech = load(path)?;
    let state = initial_state(&mech, temperature, pressure, composition)?;
    let cell = CellState::new(
        state.temperature_k(),
        state.density(&mech),
        state.mass_fractions().to_vec(),
    );
    let closure = EdcClosure::new(Arc::clone(&mech), EdcConstants::default(), BatchConfig::default())?;
    let report = closure.mean_rates(&[cell], &[turbulence])?;
    let names: Vec<String> = mech.species_names().map(str::to_string).collect();
    let summary = EdcSummary::from_report(&report, &names)
        .ok_or_else(|| CliError::Usage("no EDC result".to_string()))?;

    println!(
        "✓ ξ* = {:.4}, τ* = {:.3e} s, κ = {:.4}",
        summary.xi, summary.tau_s, summary.kappa
    );
    for (name, rate) in &summary.species_rates {
        println!("  {name:<6} {rate:>12.4e} kg/(m^3 s)");
    }
    println!("  Heat release: {:.4e} W/m^3", summary.heat_release_rate_w_per_m3);
    if summary.flagged {
        println!("  (fine-structure integration failed; sources zeroed)");
    }
    if let Some(path) = json {
        write_json(&summary, path)?;
    }
    Ok(())
}
