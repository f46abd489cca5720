//! Runs the shovel factory for a fixed duration and prints the totals.

use clap::Parser;
use shovel_factory::{FactoryConfig, FactoryError, FactorySimulation};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "shovel_factory", about = "Concurrent shovel factory simulation")]
struct Cli {
    /// TOML file overriding the default configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run length in seconds
    #[arg(long)]
    duration_secs: Option<u64>,
    /// Production event log file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<FactoryConfig, FactoryError> {
    let mut config = match &cli.config {
        Some(path) => FactoryConfig::from_file(path)?,
        None => FactoryConfig::default(),
    };
    if let Some(secs) = cli.duration_secs {
        config = config.with_run_duration(secs);
    }
    if let Some(path) = &cli.log_file {
        config = config.with_event_log_path(path);
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Starting shovel factory");
    println!(
        "  Buffers: handles={}, blades={}, shovels={}",
        config.handle_capacity, config.blade_capacity, config.shovel_capacity
    );
    println!(
        "  Actors: {} handle supplier(s), {} blade supplier(s), {} assembler(s), {} dealer(s)",
        config.handle_suppliers, config.blade_suppliers, config.assemblers, config.dealers
    );
    println!(
        "  Restock target: {}, run: {}s, log: {}",
        config.restock_target,
        config.run_duration_secs,
        config.event_log_path.display()
    );
    println!();

    let mut factory = match FactorySimulation::with_file_log(config) {
        Ok(factory) => factory,
        Err(e) => {
            log::error!("Failed to set up factory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match factory.run() {
        Ok(snapshot) => {
            println!("Factory finished: {}", snapshot);
            ExitCode::SUCCESS
        }
        Err(e @ FactoryError::ShutdownTimeout { .. }) => {
            log::error!("Factory did not stop cleanly: {}", e);
            println!("Partial totals: {}", factory.stats());
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("Factory run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
