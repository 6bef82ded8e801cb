//! List commands implementation

use z80sp_core::flash::KNOWN_CHIPS;
use z80sp_core::programs::PROGRAMS;

/// List the built-in programs and the supported flash parts
pub fn list_programs() {
    println!("Built-in programs:");
    println!();
    println!("{:<4} {:<48} {:>8}", "#", "Name", "Size");
    println!("{}", "-".repeat(62));

    for (index, program) in PROGRAMS.iter().enumerate() {
        println!(
            "{:<4} {:<48} {:>8}",
            index,
            program.name,
            format_size(program.len() as u32)
        );
    }

    println!();
    println!("Supported flash parts:");
    for chip in KNOWN_CHIPS {
        println!(
            "  {:<12} {:02X}:{:02X} {:>8}",
            chip.name,
            chip.vendor,
            chip.device,
            format_size(chip.size)
        );
    }
}

pub(crate) fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
