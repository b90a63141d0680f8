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
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Object modules, linked in argument order
    #[clap(required = true)]
    inputs: Vec<PathBuf>,
    /// Output executable; defaults to the first input with a `.e` extension
    #[clap(short, long)]
    output: Option<PathBuf>,
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
    let mut modules = Vec::new();
    for input in &opts.inputs {
        let module = obj::read_file(input)
            .with_context(|| format!("Failed to read object module: {}", input.display()))?;
        modules.push(module);
    }

    let exe = lcc16::link(&modules, None)?;

    let output = match &opts.output {
        Some(path) => path.clone(),
        None => opts.inputs[0].with_extension("e"),
    };
    obj::write_file(&output, &exe)?;
    println!(
        "Successfully linked {} module(s) to {}",
        modules.len(),
        output.display()
    );

    Ok(())
}
