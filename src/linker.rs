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

//! Lays object modules end to end in the 16-bit address space, resolves
//! external references against the accumulated global table, and emits
//! a fully-resolved executable. External relocation must run before
//! local relocation: the E/e/V patch formulas read the pre-rebase word.

use crate::errors::LccError;
use crate::obj::{HeaderEntry, ObjectModule, RefSlot};
use std::collections::HashMap;

const ADDRESS_SPACE_WORDS: usize = 65536;

// An unresolved reference with its address already rebased to the
// final image.
struct ExternRef {
    addr: u16,
    label: String,
    slot: RefSlot,
}

// An A entry plus the base of the module it came from.
struct LocalRef {
    addr: u16,
    module_start: u16,
}

pub fn link(modules: &[ObjectModule], start_label: Option<&str>) -> Result<ObjectModule, LccError> {
    let mut mca: Vec<u16> = Vec::new();
    let mut globals: HashMap<String, u16> = HashMap::new();
    let mut global_entries: Vec<HeaderEntry> = Vec::new();
    let mut extern_refs: Vec<ExternRef> = Vec::new();
    let mut local_refs: Vec<LocalRef> = Vec::new();
    let mut start: Option<u16> = None;

    // Ingest every module, rebasing header entry addresses as we go.
    for module in modules {
        let module_start = mca.len() as u16;
        if mca.len() + module.code.len() > ADDRESS_SPACE_WORDS {
            return Err(LccError::FormatError(
                "linked program exceeds the 65536-word address space".into(),
            ));
        }

        for entry in &module.entries {
            match entry {
                HeaderEntry::Start(addr) => {
                    if start.is_some() {
                        return Err(LccError::MultipleEntryPoints);
                    }
                    start = Some(addr.wrapping_add(module_start));
                }
                HeaderEntry::Global { addr, label } => {
                    let absolute = addr.wrapping_add(module_start);
                    if globals.insert(label.clone(), absolute).is_some() {
                        return Err(LccError::DuplicateSymbol(label.clone()));
                    }
                    global_entries.push(HeaderEntry::Global {
                        addr: absolute,
                        label: label.clone(),
                    });
                }
                HeaderEntry::Extern { addr, label, slot } => {
                    extern_refs.push(ExternRef {
                        addr: addr.wrapping_add(module_start),
                        label: label.clone(),
                        slot: *slot,
                    });
                }
                HeaderEntry::Local(addr) => {
                    local_refs.push(LocalRef {
                        addr: addr.wrapping_add(module_start),
                        module_start,
                    });
                }
            }
        }

        mca.extend_from_slice(&module.code);
    }

    // External relocation: patch each E/e/V site against the global
    // table. V sites become plain A entries in the output.
    let mut resolved_locals: Vec<u16> = Vec::new();
    for reference in &extern_refs {
        let global = *globals
            .get(&reference.label)
            .ok_or_else(|| LccError::UndefinedSymbol(reference.label.clone()))?;
        let site = reference.addr as usize;
        let word = mca[site];
        mca[site] = match reference.slot {
            RefSlot::Pc11 => {
                let patched = word
                    .wrapping_add(global)
                    .wrapping_sub(reference.addr)
                    .wrapping_sub(1);
                (word & 0xF800) | (patched & 0x07FF)
            }
            RefSlot::Pc9 => {
                let patched = word
                    .wrapping_add(global)
                    .wrapping_sub(reference.addr)
                    .wrapping_sub(1);
                (word & 0xFE00) | (patched & 0x01FF)
            }
            RefSlot::Abs16 => {
                resolved_locals.push(reference.addr);
                word.wrapping_add(global)
            }
        };
    }

    // Local relocation, strictly after the external pass.
    for local in &local_refs {
        let site = local.addr as usize;
        mca[site] = mca[site].wrapping_add(local.module_start);
    }

    if let Some(label) = start_label {
        let addr = *globals
            .get(label)
            .ok_or_else(|| LccError::UndefinedSymbol(label.to_string()))?;
        start = Some(addr);
    }

    let mut entries = Vec::new();
    if let Some(addr) = start {
        entries.push(HeaderEntry::Start(addr));
    }
    entries.extend(global_entries);
    entries.extend(local_refs.iter().map(|l| HeaderEntry::Local(l.addr)));
    entries.extend(resolved_locals.into_iter().map(HeaderEntry::Local));

    Ok(ObjectModule { entries, code: mca })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{build_symbol_table, generate_object};
    use crate::parser::parse_source;

    fn assemble(source: &str) -> ObjectModule {
        let lines = parse_source(source).unwrap();
        let symbols = build_symbol_table(&lines).unwrap();
        generate_object(&lines, &symbols).unwrap()
    }

    #[test]
    fn test_link_identity_for_resolved_module() {
        let module = assemble("x: .word 7\ny: .word x\nhalt\n");
        let linked = link(&[module.clone()], None).unwrap();
        assert_eq!(linked.code, module.code);
        // the input's A entries survive, rebased by zero
        assert_eq!(
            linked.entries,
            vec![HeaderEntry::Local(1)]
        );
    }

    #[test]
    fn test_bl_patched_across_modules() {
        // startup: bl main / halt; main is two words in
        let startup = assemble(".extern main\nbl main\nhalt\n");
        let m1 = assemble(".global main\nmain: nl\nret\n");
        let linked = link(&[startup, m1], None).unwrap();

        // bl at 0 targeting address 2: signed 11-bit offset = 2 - 1 = 1
        assert_eq!(linked.code[0], 0x4801);
        assert_eq!(linked.code.len(), 4);
    }

    #[test]
    fn test_pc9_and_abs16_relocation() {
        let user = assemble(".extern i\nld r0, i\n.word i\nhalt\n");
        let def = assemble(".global i\ni: .word 99\n");
        let linked = link(&[user, def], None).unwrap();

        // i lands at address 3; ld at 0 gets offset 3 - 1 = 2
        assert_eq!(linked.code[0], 0x2002);
        // the .word slot holds the absolute address of i
        assert_eq!(linked.code[1], 3);
        assert_eq!(linked.code[3], 99);
        // the V site is recorded as a resolved A entry
        assert!(linked.entries.contains(&HeaderEntry::Local(1)));
    }

    #[test]
    fn test_local_relocation_rebases_by_module_start() {
        let first = assemble("halt\n");
        let second = assemble("x: .word 7\ny: .word x\n");
        let linked = link(&[first, second], None).unwrap();

        // x sits at absolute address 1; y's word is patched 0 -> 1...
        assert_eq!(linked.code[2], 1);
        assert_eq!(linked.entries, vec![HeaderEntry::Local(2)]);
    }

    #[test]
    fn test_undefined_symbol() {
        let module = assemble(".extern ghost\nbl ghost\nhalt\n");
        assert!(matches!(
            link(&[module], None),
            Err(LccError::UndefinedSymbol(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_symbol() {
        let a = assemble(".global main\nmain: halt\n");
        let b = assemble(".global main\nmain: halt\n");
        assert!(matches!(
            link(&[a, b], None),
            Err(LccError::DuplicateSymbol(name)) if name == "main"
        ));
    }

    #[test]
    fn test_multiple_entry_points() {
        let a = assemble("main: halt\n.start main\n");
        let b = assemble("alt: halt\n.start alt\n");
        assert!(matches!(
            link(&[a, b], None),
            Err(LccError::MultipleEntryPoints)
        ));
    }

    #[test]
    fn test_start_rebased_by_module_base() {
        let first = assemble("halt\nhalt\n");
        let second = assemble("entry: halt\n.start entry\n");
        let linked = link(&[first, second], None).unwrap();
        assert_eq!(linked.start(), Some(2));
    }

    #[test]
    fn test_start_label_override() {
        let module = assemble(".global main\nnl\nmain: halt\n");
        let linked = link(&[module], Some("main")).unwrap();
        assert_eq!(linked.start(), Some(1));
        assert!(matches!(
            link(&[assemble("halt\n")], Some("main")),
            Err(LccError::UndefinedSymbol(_))
        ));
    }

    #[test]
    fn test_three_module_scenario() {
        // startup calls main; m1 defines main and calls sub reading i;
        // m2 defines sub and globals i and j.
        let startup = assemble(".extern main\nbl main\nhalt\n.start $entry\n$entry: nl\n");
        let m1 = assemble(".extern sub\n.extern i\n.global main\nmain: ld r0, i\nbl sub\nret\n");
        let m2 = assemble(
            ".global sub\n.global i\n.global j\nsub: nl\nret\ni: .word 1\nj: .word 2\n",
        );
        let linked = link(&[startup, m1, m2], None).unwrap();

        // layout: startup 0..3, m1 3..6, m2 6..10
        // bl main at 0: offset = 3 - 1 = 2
        assert_eq!(linked.code[0] & 0x07FF, 2);
        // ld r0, i at 3: i at 8, offset = 8 - 4 = 4
        assert_eq!(linked.code[3], 0x2004);
        // bl sub at 4: sub at 6, offset = 6 - 5 = 1
        assert_eq!(linked.code[4] & 0x07FF, 1);
        assert_eq!(linked.code[8], 1);
        assert_eq!(linked.code[9], 2);
        // no unresolved entries remain
        assert!(!linked.has_unresolved());
    }
}
