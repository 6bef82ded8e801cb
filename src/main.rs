//! z80sp - Host tool for the Z80 support board
//!
//! Downloads Z80 images into the board's parallel flash through the flash
//! loader on its serial console, and exercises the board drivers against a
//! simulated board.
//!
//! # Architecture
//!
//! The board-side drivers live in `z80sp-core` and run unchanged on the
//! host:
//! - **Serial commands** (`find`, `load`) speak the record protocol to a
//!   real board through `z80sp-serial`
//! - **Simulation commands** (`sim ...`) run the bus arbiter, flash, SPI and
//!   SD drivers against the pin-level model from `z80sp-sim`

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, SimCommands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Programs => {
            commands::list_programs();
            Ok(())
        }
        Commands::Find { session } => commands::run_find(&session),
        Commands::Load {
            input,
            port,
            session,
        } => commands::run_load(&input, port.as_deref(), &session),
        Commands::Sim(sim) => match sim {
            SimCommands::Load {
                input,
                erase,
                output,
                session,
            } => commands::run_sim_load(&input, erase, output.as_deref(), &session),
            SimCommands::Flash { program, dump } => commands::run_sim_flash(program, dump),
            SimCommands::Sd {
                program,
                partition,
                no_format,
                no_card,
            } => commands::run_sim_sd(program, partition, no_format, no_card),
        },
    };

    result
}
