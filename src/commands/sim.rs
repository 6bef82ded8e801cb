//! Commands against the simulated board

use std::fs;
use std::path::Path;

use z80sp_core::bus::BusArbiter;
use z80sp_core::flash::commands::BANK_SIZE;
use z80sp_core::flash::ParallelFlash;
use z80sp_core::loader::{EraseScope, FlashLoader, LoaderConfig};
use z80sp_core::programs;
use z80sp_core::sd::{Mbr, SdCard};
use z80sp_core::spi::SoftSpi;
use z80sp_serial::{LoaderClient, LoaderLink};
use z80sp_sim::{CardConfig, SimBoard, SimClock, SimConfig};

use super::load::{client_config, download_with_progress, read_image};
use super::programs::format_size;
use crate::cli::{EraseArg, SessionArgs};

fn print_hex_dump(start: u32, data: &[u8]) {
    for (offset, line) in (start..).step_by(16).zip(data.chunks(16)) {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
        println!("  {:04X}: {}", offset, hex.join(" "));
    }
}

fn print_partitions(mbr: &Mbr) {
    println!("Partition table ({} used):", mbr.partitions);
    for (index, partition) in mbr.table.iter().enumerate() {
        if !partition.is_used() {
            println!("  {}: unused", index);
            continue;
        }
        println!(
            "  {}: start block 0x{:08X}, {} blocks ({}), type 0x{:02X}, status 0x{:02X}",
            index,
            partition.block,
            partition.size,
            format_size(partition.size.saturating_mul(512)),
            partition.partition_type,
            partition.status
        );
    }
}

fn print_elapsed(board: &SimBoard) {
    println!(
        "Simulated bus time: {:.1} ms",
        board.elapsed_us() as f64 / 1000.0
    );
}

/// Download an image into the simulated flash through the loader protocol
pub fn run_sim_load(
    input: &Path,
    erase: EraseArg,
    output: Option<&Path>,
    session: &SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = read_image(input)?;
    let mut bus = BusArbiter::new(SimBoard::new(SimConfig::default()));
    let clock = SimClock::new();
    let loader_config = LoaderConfig {
        erase: match erase {
            EraseArg::Chip => EraseScope::Chip,
            EraseArg::Bank => EraseScope::Bank,
        },
        ..Default::default()
    };

    let records = {
        let loader =
            FlashLoader::with_config(ParallelFlash::new(&mut bus), &clock, loader_config);
        let mut client = LoaderClient::with_config(LoaderLink::new(loader), client_config(session));
        client.probe()?;
        download_with_progress(&mut client, &image)?
    };
    println!(
        "Downloaded {} bytes in {} records",
        image.len(),
        records
    );

    let mut window = vec![0u8; BANK_SIZE as usize];
    let used = {
        let mut flash = ParallelFlash::new(&mut bus);
        flash.enter();
        flash.read_into(0, &mut window);
        let used = flash.bytes_programmed();
        flash.exit();
        used
    };
    println!("Flash window in use: {} bytes", used);
    if window[..image.len()] != image[..] {
        return Err("Flash contents differ from the image".into());
    }
    print_elapsed(bus.pins());

    if let Some(path) = output {
        fs::write(path, &window)?;
        println!("Wrote flash window to {:?}", path);
    }
    Ok(())
}

/// Identify the simulated flash and write a built-in program
pub fn run_sim_flash(program: usize, dump: u32) -> Result<(), Box<dyn std::error::Error>> {
    let image = programs::get(program).ok_or_else(|| format!("No built-in program {}", program))?;
    let mut bus = BusArbiter::new(SimBoard::new(SimConfig::default()));
    let mut flash = ParallelFlash::new(&mut bus);

    flash.enter();
    let id = flash.read_chip_identification();
    flash.exit();
    println!("Flash: {}", id);

    println!("Writing '{}' ({} bytes)", image.name, image.len());
    flash.write_program(program)?;

    let mut data = vec![0u8; dump.min(BANK_SIZE) as usize];
    flash.enter();
    let used = flash.bytes_programmed();
    flash.read_into(0, &mut data);
    flash.exit();

    println!("Program verified, {} bytes in use", used);
    print_hex_dump(0, &data);
    print_elapsed(bus.pins());
    Ok(())
}

/// Partition the simulated card and write a built-in program to it
pub fn run_sim_sd(
    program: usize,
    partition: usize,
    no_format: bool,
    no_card: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SimConfig {
        card: (!no_card).then(CardConfig::default),
        ..Default::default()
    };
    let mut bus = BusArbiter::new(SimBoard::new(config));
    {
        let mut card = SdCard::new(SoftSpi::new(&mut bus));
        if !no_format {
            card.format_card()?;
            println!("Card formatted");
        }
        print_partitions(&card.read_mbr()?);

        card.write_program(partition, program)?;
        println!("Program {} written to partition {}", program, partition);
    }
    print_elapsed(bus.pins());
    Ok(())
}
