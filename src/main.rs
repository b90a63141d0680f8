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

//! The one-shot driver: assembles any sources, links when anything
//! needs it, then runs the result and writes its listings.

use anyhow::{Context, Result};
use clap::Parser;
use lcc16::obj::ObjectModule;
use lcc16::{InterpretOptions, cli, obj, vm};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Assembly sources, object modules (.o) or an executable (.e)
    #[clap(required = true)]
    inputs: Vec<PathBuf>,
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
    let mut modules: Vec<(PathBuf, ObjectModule)> = Vec::new();

    for input in &opts.inputs {
        let extension = input.extension().and_then(|e| e.to_str()).unwrap_or("");
        let (path, module) = match extension {
            "o" | "e" => {
                let module = obj::read_file(input)
                    .with_context(|| format!("Failed to read module: {}", input.display()))?;
                (input.clone(), module)
            }
            _ => assemble_source(input)?,
        };
        modules.push((path, module));
    }

    let (exe_path, exe) = if modules.len() == 1 && !modules[0].1.needs_linking() {
        let (path, module) = modules.into_iter().next().expect("one module");
        (path, module)
    } else {
        let exe = lcc16::link(
            &modules.iter().map(|(_, m)| m.clone()).collect::<Vec<_>>(),
            None,
        )?;
        let path = opts.inputs[0].with_extension("e");
        obj::write_file(&path, &exe)?;
        println!(
            "Successfully linked {} module(s) to {}",
            modules.len(),
            path.display()
        );
        (path, exe)
    };

    let user_name = if opts.nostats {
        String::new()
    } else {
        cli::load_user_name(true)?
    };

    let outcome = lcc16::interpret(
        &exe,
        InterpretOptions {
            load_point: opts.load_point.unwrap_or(0),
            interactive: true,
            echo: true,
            instruction_cap: vm::DEFAULT_INSTRUCTION_CAP,
            stats: !opts.nostats,
            source_name: exe_path.display().to_string(),
            user_name,
            ..InterpretOptions::default()
        },
    )?;

    cli::write_listings(&exe_path, &outcome)?;

    if let Some(error) = outcome.error {
        return Err(error.into());
    }

    Ok(())
}

fn assemble_source(input: &Path) -> Result<(PathBuf, ObjectModule)> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    let module = lcc16::assemble(&source)?;

    let extension = if module.needs_linking() { "o" } else { "e" };
    let output = input.with_extension(extension);
    obj::write_file(&output, &module)?;
    println!(
        "Successfully assembled {} to {}",
        input.display(),
        output.display()
    );

    Ok((output, module))
}
