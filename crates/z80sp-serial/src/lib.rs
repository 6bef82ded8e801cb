//! z80sp-serial - Host side of the flash loader protocol
//!
//! This crate talks to the flash load sequencer on the board over its serial
//! console. Records use the same codec as the board (`z80sp_core::record`).
//!
//! # Example
//!
//! ```no_run
//! use z80sp_serial::{find_device, ClientConfig};
//!
//! let image = std::fs::read("blink.bin")?;
//! let (port, mut client) = find_device(&ClientConfig::default())?;
//! println!("Board on {}", port);
//! client.download(&image, |done, total| println!("{}/{}", done, total))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod device;
pub mod error;
pub mod transport;

// Re-exports
pub use client::{image_records, ClientConfig, LoaderClient, MAX_IMAGE_LEN};
pub use device::{find_device, list_ports, open_device};
pub use error::{LoaderError, Result};
pub use transport::loopback::LoaderLink;
pub use transport::serial::SerialTransport;
pub use transport::Transport;
