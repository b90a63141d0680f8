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
use lcc16::{cli, obj};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Assembly source files; each becomes a `.o` or `.e` next to it
    #[clap(required = true)]
    inputs: Vec<PathBuf>,
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
    for input in &opts.inputs {
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
    }

    Ok(())
}
