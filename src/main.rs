// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for the ASML interpreter.

use std::io::{self, Write};
use std::process;

use clap::Parser as ClapParser;

use asml::cli::{read_source, Cli, OutputFormat};
use asml::interpreter::Interpreter;
use asml::lexer::Lexer;
use asml::memory::ByteMemory;
use asml::parser::Parser;

fn main() {
    let cli = Cli::parse();

    let source = match read_source(&cli) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {}: {err}", cli.input.display());
            process::exit(1);
        }
    };

    let program = match Parser::new(Lexer::new(&source)).parse_program() {
        Ok(program) => program,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let mut interpreter = Interpreter::new(ByteMemory::with_size(cli.mem_size));
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = interpreter.run(&program, &mut out);
    let _ = out.flush();

    if cli.dump_state {
        match cli.format {
            OutputFormat::Text => print!("{}", interpreter.state_dump()),
            OutputFormat::Json => println!("{}", interpreter.state_json()),
        }
    }

    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(3);
    }
}
