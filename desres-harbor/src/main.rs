//! CLI entry point: run the container terminal model and print its report.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use desres_core::{init_simulation_logging_with_level, MemorySink, SimError, Simulation};
use desres_harbor::{Harbor, HarborConfig};
use tracing::{error, info};

/// Container terminal simulation
#[derive(Parser, Debug)]
#[command(name = "harbor", about = "Ships competing for the berths of a container terminal.")]
struct Cli {
    /// Path to a JSON harbor config (overrides defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Master seed for all random streams
    #[arg(long)]
    seed: Option<u64>,

    /// Stop time in the experiment's time unit
    #[arg(long)]
    stop_time: Option<f64>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the model trace before the report
    #[arg(long)]
    trace: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_simulation_logging_with_level(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Harbor simulation failed");
            eprintln!("harbor: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), SimError> {
    let mut config = match &cli.config {
        Some(path) => HarborConfig::from_json_file(path)?,
        None => HarborConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.experiment.seed = seed;
    }
    if let Some(stop_time) = cli.stop_time {
        config.experiment.stop_time = Some(stop_time);
    }
    config.validate()?;

    let mut sim = Simulation::new(config.experiment.clone())?;
    let sink = MemorySink::new();
    if cli.trace {
        sim.set_trace_sink(Box::new(sink.clone()));
    }

    let harbor = Harbor::build(&mut sim, &config)?;
    sim.run();
    let ships = harbor.ships_generated(&mut sim);
    let report = sim.finish();

    if cli.trace {
        let unit = config.experiment.time_unit;
        for note in sink.notes() {
            println!(
                "{:>10.3} {:<16} {}",
                note.time.as_units(unit),
                note.process_name,
                note.message
            );
        }
    }

    let json = report
        .to_json()
        .map_err(|e| SimError::Internal(format!("cannot serialize report: {e}")))?;
    println!("{json}");
    info!(ships, final_time = %report.final_time, "Harbor simulation finished");
    Ok(())
}
