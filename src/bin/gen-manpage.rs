//! Man page generator for z80sp
//!
//! Writes `z80sp.1` plus one page per subcommand (`z80sp-load.1`,
//! `z80sp-sim-flash.1`, ...) into the given directory.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::{Command, CommandFactory};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

/// Every command in the tree with its page name, parents first
fn pages(cmd: &Command, prefix: Option<&str>) -> Vec<(String, Command)> {
    let name = match prefix {
        Some(parent) => format!("{}-{}", parent, cmd.get_name()),
        None => cmd.get_name().to_string(),
    };
    let mut out = vec![(name.clone(), cmd.clone())];
    for sub in cmd.get_subcommands() {
        out.extend(pages(sub, Some(&name)));
    }
    out
}

fn render(page: &str, cmd: Command, dir: &Path) -> io::Result<PathBuf> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    let path = dir.join(format!("{}.1", page));
    fs::write(&path, buffer)?;
    Ok(path)
}

fn main() -> io::Result<()> {
    let output_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    for (page, cmd) in pages(&cli::Cli::command(), None) {
        let path = render(&page, cmd, &output_dir)?;
        println!("{}", path.display());
    }
    Ok(())
}
