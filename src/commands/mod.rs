//! CLI command implementations
//!
//! ## Board commands
//!
//! `find` and `load` talk to a real board over a serial port.
//!
//! ## Simulation commands
//!
//! The `sim` commands run the same drivers and the same loader protocol
//! against the in-memory board from `z80sp-sim`.

mod load;
mod programs;
mod sim;

pub use load::{run_find, run_load};
pub use programs::list_programs;
pub use sim::{run_sim_flash, run_sim_load, run_sim_sd};
