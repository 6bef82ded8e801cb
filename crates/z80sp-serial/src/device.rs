//! Serial port discovery

use crate::client::{ClientConfig, LoaderClient};
use crate::error::{LoaderError, Result};
use crate::transport::serial::SerialTransport;

/// Names of all serial ports on this host
pub fn list_ports() -> Result<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|port| port.port_name)
        .collect())
}

/// Find the board by probing every serial port
///
/// Each port is opened at the console rate and sent the activation phrase
/// plus a probe record. The first port that acknowledges is returned with a
/// client ready for a download; the loader on the board is already active.
pub fn find_device(config: &ClientConfig) -> Result<(String, LoaderClient<SerialTransport>)> {
    for name in list_ports()? {
        log::debug!("Probing {}", name);
        let transport = match SerialTransport::open(&name, None) {
            Ok(transport) => transport,
            Err(e) => {
                log::debug!("Cannot open {}: {}", name, e);
                continue;
            }
        };

        let mut client = LoaderClient::with_config(transport, config.clone());
        match client.probe() {
            Ok(()) => {
                log::info!("Flash loader found on {}", name);
                return Ok((name, client));
            }
            Err(e) => log::debug!("No flash loader on {}: {}", name, e),
        }
    }
    Err(LoaderError::NoDevice)
}

/// Open a known port and probe it
pub fn open_device(name: &str, config: &ClientConfig) -> Result<LoaderClient<SerialTransport>> {
    let transport = SerialTransport::open(name, None)?;
    let mut client = LoaderClient::with_config(transport, config.clone());
    client.probe()?;
    log::info!("Flash loader found on {}", name);
    Ok(client)
}
