/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use anyhow::{Context, Result};
use clap::Parser;
use lcc16::{InterpretOptions, cli, obj, vm};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Executable to run
    input: PathBuf,
    /// Load point in hex
    #[clap(short = 'L', value_parser = cli::parse_hex_u16)]
    load_point: Option<u16>,
    /// Suppress the .lst/.bst listings
    #[clap(long)]
    nostats: bool,
}

fn main() -> ExitCode {
    let opts: Opts = Opts::parse();
    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::from(cli::exit_code(&e))
        }
    }
}

fn run(opts: &Opts) -> Result<()> {
    let exe = obj::read_file(&opts.input)
        .with_context(|| format!("Failed to read executable: {}", opts.input.display()))?;

    let user_name = if opts.nostats {
        String::new()
    } else {
        cli::load_user_name(true)?
    };

    let source_name = opts.input.display().to_string();
    let outcome = lcc16::interpret(
        &exe,
        InterpretOptions {
            load_point: opts.load_point.unwrap_or(0),
            interactive: true,
            echo: true,
            instruction_cap: vm::DEFAULT_INSTRUCTION_CAP,
            stats: !opts.nostats,
            source_name,
            user_name,
            ..InterpretOptions::default()
        },
    )?;

    cli::write_listings(&opts.input, &outcome)?;

    if let Some(error) = outcome.error {
        return Err(error.into());
    }

    Ok(())
}
