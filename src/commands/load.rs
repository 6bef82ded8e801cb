//! Serial download commands

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use z80sp_core::record::HexRecord;
use z80sp_serial::{
    find_device, list_ports, open_device, ClientConfig, LoaderClient, Transport, MAX_IMAGE_LEN,
};

use crate::cli::SessionArgs;

/// Client timing from the command line
pub(crate) fn client_config(session: &SessionArgs) -> ClientConfig {
    ClientConfig {
        ack_timeout_ms: session.ack_timeout,
        record_len: usize::from(session.record_len),
        ..Default::default()
    }
}

/// Read an image file and check that it fits one session
pub(crate) fn read_image(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = fs::read(path)?;
    if data.is_empty() || data.len() > MAX_IMAGE_LEN {
        return Err(format!(
            "{:?} holds {} bytes, expected 1 to {}",
            path,
            data.len(),
            MAX_IMAGE_LEN
        )
        .into());
    }
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Send an image with a progress bar
pub(crate) fn download_with_progress<T: Transport>(
    client: &mut LoaderClient<T>,
    image: &[u8],
) -> Result<usize, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({eta})")?
            .progress_chars("#>-"),
    );

    let result = client.download(image, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    });

    match result {
        Ok(records) => {
            pb.finish_with_message("Download complete");
            Ok(records)
        }
        Err(e) => {
            pb.abandon_with_message("Download failed");
            Err(e.into())
        }
    }
}

/// Probe all serial ports for the board
pub fn run_find(session: &SessionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ports = list_ports()?;
    if ports.is_empty() {
        return Err("No serial ports available".into());
    }
    println!("Probing {} serial port(s): {}", ports.len(), ports.join(", "));

    let (name, mut client) = find_device(&client_config(session))?;
    // close the session again without touching the flash
    client.send_record(&HexRecord::end_of_file())?;
    println!("Board found on {}", name);
    Ok(())
}

/// Download an image to a board on a serial port
pub fn run_load(
    input: &Path,
    port: Option<&str>,
    session: &SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = read_image(input)?;
    let config = client_config(session);

    let mut client = match port {
        Some(name) => open_device(name, &config)?,
        None => {
            let (name, client) = find_device(&config)?;
            println!("Board found on {}", name);
            client
        }
    };

    let records = download_with_progress(&mut client, &image)?;
    println!(
        "Downloaded {} bytes in {} records",
        image.len(),
        records
    );
    Ok(())
}
