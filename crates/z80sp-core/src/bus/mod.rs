//! Z80 bus access
//!
//! [`BusArbiter`] owns the board pins and decides who may drive them,
//! [`IoPort`] builds Z80 IO cycles on top of it, and [`IoreqMailbox`] carries
//! IO request snapshots latched by the board interrupt into the poll loop.

mod arbiter;
mod io;
mod mailbox;

#[cfg(test)]
pub(crate) mod mock;

pub use arbiter::{
    BusArbiter, BusOwnership, ControlBit, BUS_REQUEST_SETTLE_US, LINE_SETTLE_US, RESET_PULSE_MS,
};
pub use io::{IoPort, IO_READ_SETTLE_US};
pub use mailbox::{IoRequest, IoreqMailbox, IoreqMonitor};
