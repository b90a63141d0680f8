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

mod encoder;
mod symbol_table;

use crate::ast::{AssemblyLine, Directive, Literal};
use crate::errors::LccError;
use crate::obj::{HeaderEntry, ObjectModule, RefSlot};
use encoder::Encoder;
pub use symbol_table::SymbolTable;

const ADDRESS_SPACE_WORDS: u32 = 65536;

/// Pass 1: size every line and build the symbol table.
pub fn build_symbol_table(lines: &[AssemblyLine]) -> Result<SymbolTable, LccError> {
    let mut symbol_table = SymbolTable::default();
    let mut addr: u32 = 0;

    for line in lines {
        // If a label exists on this line, record its current address.
        if let Some(label) = &line.label {
            symbol_table.define(label, addr as u16, line.line_number)?;
        }

        if line.instruction.is_some() {
            addr += 1;
        }

        if let Some(directive) = &line.directive {
            match directive {
                Directive::Global(name) => symbol_table.mark_global(name, line.line_number)?,
                Directive::Extern(name) => symbol_table.mark_extern(name, line.line_number)?,
                Directive::Org(target) => check_org(*target, addr, line.line_number)?,
                Directive::Start(_) => {}
                other => addr += directive_size(other),
            }
        }

        if addr > ADDRESS_SPACE_WORDS {
            return Err(LccError::AsmError {
                line: line.line_number,
                reason: "module exceeds the 65536-word address space".to_string(),
            });
        }
    }

    symbol_table.validate()?;
    Ok(symbol_table)
}

/// Pass 2: emit code words and relocation entries.
pub fn generate_object(
    lines: &[AssemblyLine],
    symbol_table: &SymbolTable,
) -> Result<ObjectModule, LccError> {
    let mut code: Vec<u16> = Vec::new();
    let mut start: Option<u16> = None;
    let mut global_entries: Vec<HeaderEntry> = Vec::new();
    let mut ref_entries: Vec<HeaderEntry> = Vec::new();
    let mut local_entries: Vec<HeaderEntry> = Vec::new();

    for line in lines {
        let addr = code.len() as u16;

        if let Some(instruction) = &line.instruction {
            let encoder = Encoder::new(symbol_table, addr, line.line_number);
            let (word, entry) = encoder.encode(instruction)?;
            if let Some(entry) = entry {
                ref_entries.push(entry);
            }
            code.push(word);
        }

        if let Some(directive) = &line.directive {
            match directive {
                Directive::Word(Literal::Int(value)) => code.push(*value as u16),
                Directive::Word(Literal::Char(c)) => code.push(*c as u16),
                Directive::Word(Literal::Label(name)) => {
                    if let Some(def) = symbol_table.lookup(name) {
                        // The emitted word is a module-relative address;
                        // the linker rebases it through the A entry.
                        local_entries.push(HeaderEntry::Local(addr));
                        code.push(def);
                    } else if symbol_table.is_extern(name) {
                        ref_entries.push(HeaderEntry::Extern {
                            addr,
                            label: name.clone(),
                            slot: RefSlot::Abs16,
                        });
                        code.push(0);
                    } else {
                        return Err(LccError::AsmError {
                            line: line.line_number,
                            reason: format!("Undefined label: {}", name),
                        });
                    }
                }
                Directive::Zero(count) => {
                    code.extend(std::iter::repeat_n(0u16, *count as usize));
                }
                Directive::Stringz(text) => {
                    code.extend(text.bytes().map(u16::from));
                    code.push(0);
                }
                Directive::Start(name) => {
                    if start.is_some() {
                        return Err(LccError::AsmError {
                            line: line.line_number,
                            reason: "Multiple .start directives in one module".to_string(),
                        });
                    }
                    let def = symbol_table.lookup(name).ok_or_else(|| LccError::AsmError {
                        line: line.line_number,
                        reason: format!(".start names an undefined label: {}", name),
                    })?;
                    start = Some(def);
                }
                Directive::Global(name) => {
                    // Pass 1 guarantees the definition exists.
                    let def = symbol_table
                        .lookup(name)
                        .expect("validated global definition");
                    global_entries.push(HeaderEntry::Global {
                        addr: def,
                        label: name.clone(),
                    });
                }
                Directive::Extern(_) | Directive::Org(_) => {}
            }
        }
    }

    let mut entries = Vec::new();
    if let Some(addr) = start {
        entries.push(HeaderEntry::Start(addr));
    }
    entries.extend(global_entries);
    entries.extend(ref_entries);
    entries.extend(local_entries);

    Ok(ObjectModule { entries, code })
}

fn directive_size(directive: &Directive) -> u32 {
    match directive {
        Directive::Word(_) => 1,
        Directive::Zero(count) => *count,
        Directive::Stringz(text) => text.len() as u32 + 1,
        Directive::Start(_)
        | Directive::Global(_)
        | Directive::Extern(_)
        | Directive::Org(_) => 0,
    }
}

// `.org`/`.orig` is accepted for compatibility but relocatable modules
// always start at zero, so only a no-op form is legal.
fn check_org(target: u32, current: u32, line: usize) -> Result<(), LccError> {
    if target != 0 || current != 0 {
        return Err(LccError::AsmError {
            line,
            reason: ".org must be 0 and precede all emission in a relocatable module".to_string(),
        });
    }
    Ok(())
}
