//! # GW-BASIC
//!
//! Interactive interpreter.

mod term;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "gwbasic")]
#[command(about = "GW-BASIC compatible interpreter")]
pub struct Cli {
    /// Program to load and run on start-up, e.g. C:\MENU.BAS
    pub program: Option<String>,

    /// Fetch programs from this file server instead of local directories
    #[arg(long)]
    pub server: Option<String>,

    /// Map a drive letter to a local directory, e.g. C=./source
    #[arg(long = "drive", value_parser = parse_drive)]
    pub drives: Vec<(char, PathBuf)>,

    /// Working directory in BASIC form
    #[arg(long, default_value = "C:\\")]
    pub cwd: String,

    /// Start with TRON active
    #[arg(long)]
    pub trace: bool,
}

fn parse_drive(s: &str) -> Result<(char, PathBuf), String> {
    let (letter, dir) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LETTER=DIR, got {}", s))?;
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok((c.to_ascii_uppercase(), dir.into())),
        _ => Err(format!("not a drive letter: {}", letter)),
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    term::main(cli);
}
