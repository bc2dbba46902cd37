// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing for the interpreter driver.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::memory::DEFAULT_MEMORY_SIZE;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(
    name = "asml",
    version = VERSION,
    about = "Interpreter for the ASML register-oriented assembly language"
)]
pub struct Cli {
    #[arg(
        value_name = "FILE",
        help = "ASML source file, or - to read from standard input"
    )]
    pub input: PathBuf,
    #[arg(
        long = "dump-state",
        action = ArgAction::SetTrue,
        long_help = "After the run, print the machine state: error flag, comparison flags, and all 32 registers in decimal. Printed even when the run fails."
    )]
    pub dump_state: bool,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select the state dump format. text is default; json emits one machine-readable object."
    )]
    pub format: OutputFormat,
    #[arg(
        long = "mem-size",
        value_name = "BYTES",
        default_value_t = DEFAULT_MEMORY_SIZE,
        long_help = "Size of the machine's byte memory. The store is zero-initialized at program start."
    )]
    pub mem_size: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Read the program source, treating `-` as standard input.
pub fn read_source(cli: &Cli) -> io::Result<Vec<u8>> {
    if cli.input.as_os_str() == "-" {
        let mut source = Vec::new();
        io::stdin().read_to_end(&mut source)?;
        Ok(source)
    } else {
        fs::read(&cli.input)
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, OutputFormat};
    use crate::memory::DEFAULT_MEMORY_SIZE;
    use clap::Parser;

    #[test]
    fn defaults_are_text_format_and_default_memory() {
        let cli = Cli::parse_from(["asml", "program.asml"]);
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.mem_size, DEFAULT_MEMORY_SIZE);
        assert!(!cli.dump_state);
    }

    #[test]
    fn accepts_dump_state_with_json_format() {
        let cli = Cli::parse_from(["asml", "-", "--dump-state", "--format", "json"]);
        assert!(cli.dump_state);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.input.as_os_str(), "-");
    }
}
