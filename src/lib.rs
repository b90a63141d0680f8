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

//! A toolchain for the LCC, a pedagogical 16-bit machine: a two-pass
//! assembler producing relocatable object modules or executables, a
//! linker, a disassembler, and a VM interpreter with memory-mapped
//! trap I/O and execution listings.

pub mod assembler;
pub mod ast;
pub mod cli;
pub mod disasm;
pub mod errors;
pub mod isa;
pub mod linker;
pub mod obj;
pub mod parser;
pub mod vm;

use anyhow::{Context, Result};
use errors::LccError;
use obj::ObjectModule;
use vm::listing::{self, ListingInfo};
use vm::{Interpreter, Machine, RunState};

/// Assemble one source module. The result serializes to a `.o` when it
/// still needs the linker (`needs_linking`), otherwise to a `.e`.
pub fn assemble(source: &str) -> Result<ObjectModule> {
    let lines = parser::parse_source(source).context("Failed during parsing stage")?;

    let symbol_table =
        assembler::build_symbol_table(&lines).context("Failed during assembler pass 1")?;

    let module = assembler::generate_object(&lines, &symbol_table)
        .context("Failed during assembler pass 2")?;

    Ok(module)
}

/// Link object modules into an executable. `start_label`, when given,
/// overrides the entry point with the named global.
pub fn link(modules: &[ObjectModule], start_label: Option<&str>) -> Result<ObjectModule> {
    linker::link(modules, start_label).context("Failed during linking")
}

/// Reconstruct assemblable source text from an executable.
pub fn disassemble(exe: &ObjectModule) -> Result<String> {
    disasm::disassemble(exe).context("Failed during disassembly")
}

pub struct InterpretOptions {
    pub load_point: u16,
    pub input: Vec<u8>,
    // Fall back to stdin/stdout when the buffer runs dry.
    pub interactive: bool,
    pub echo: bool,
    pub instruction_cap: u64,
    // Produce `.lst`/`.bst` text (`-nostats` turns this off).
    pub stats: bool,
    pub source_name: String,
    pub user_name: String,
}

impl Default for InterpretOptions {
    fn default() -> InterpretOptions {
        InterpretOptions {
            load_point: 0,
            input: Vec::new(),
            interactive: false,
            echo: false,
            instruction_cap: vm::DEFAULT_INSTRUCTION_CAP,
            stats: true,
            source_name: String::new(),
            user_name: String::new(),
        }
    }
}

pub struct InterpretOutcome {
    pub stdout: Vec<u8>,
    pub lst: Option<String>,
    pub bst: Option<String>,
    // A runtime failure does not discard the partial listings; the
    // caller reports it and exits non-zero.
    pub error: Option<LccError>,
}

/// Load and run an executable to completion, collecting its output and
/// execution listings.
pub fn interpret(exe: &ObjectModule, opts: InterpretOptions) -> Result<InterpretOutcome> {
    let mut machine = Machine::new();
    machine
        .load(exe, opts.load_point)
        .context("Failed during loading")?;
    machine.push_input(&opts.input);
    machine.interactive = opts.interactive;
    machine.echo = opts.echo;

    let mut interpreter = Interpreter::with_system_traps(machine);
    interpreter.instruction_cap = opts.instruction_cap;

    let error = match interpreter.run() {
        Ok(RunState::Halted) => None,
        Ok(RunState::AwaitingInput) => {
            Some(LccError::RuntimeError("unexpected end of input".into()))
        }
        Ok(RunState::Running) => unreachable!("run only returns on halt or suspension"),
        Err(e) => Some(e),
    };

    let (lst, bst) = if opts.stats {
        let info = ListingInfo {
            source_name: &opts.source_name,
            user_name: &opts.user_name,
            machine: &interpreter.machine,
            executed: interpreter.executed,
            error: error.as_ref(),
        };
        (
            Some(listing::render_lst(&interpreter.rows, &info)),
            Some(listing::render_bst(&interpreter.rows, &info)),
        )
    } else {
        (None, None)
    };

    Ok(InterpretOutcome {
        stdout: interpreter.machine.take_output(),
        lst,
        bst,
        error,
    })
}
