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

//! Linear-sweep disassembler. All working state lives in one
//! `Disassembler` value per invocation. The output is reassemblable:
//! words that do not decode strictly fall back to `.word`, pc-relative
//! operands become synthesized `@L`/`@D` labels (or absolute addresses
//! when the target lies outside the image), and `A` entries are
//! rendered as `.word <label>` so relocation records survive a
//! round trip.

use crate::errors::LccError;
use crate::isa::{self, Decoded, DecodedRhs, REGISTER_NAMES, trap_str};
use crate::obj::{HeaderEntry, ObjectModule};
use std::collections::{BTreeMap, HashSet};

pub struct Disassembler {
    labels: BTreeMap<usize, String>,
    // extra labels sharing an already-named address
    alias_labels: Vec<(usize, String)>,
    code_label_count: u32,
    data_label_count: u32,
}

pub fn disassemble(module: &ObjectModule) -> Result<String, LccError> {
    Disassembler::new().run(module)
}

impl Disassembler {
    pub fn new() -> Disassembler {
        Disassembler {
            labels: BTreeMap::new(),
            alias_labels: Vec::new(),
            code_label_count: 0,
            data_label_count: 0,
        }
    }

    pub fn run(mut self, module: &ObjectModule) -> Result<String, LccError> {
        if module.has_unresolved() {
            return Err(LccError::FormatError(
                "cannot disassemble a module with unresolved references".into(),
            ));
        }

        let len = module.code.len();
        let decoded: Vec<Option<Decoded>> = module.code.iter().map(|w| isa::decode(*w)).collect();

        // Relocated words render as `.word <label>`, never as code.
        let mut data_sites: HashSet<usize> = HashSet::new();

        // Global names win over synthesized ones.
        for entry in &module.entries {
            if let HeaderEntry::Global { addr, label } = entry {
                let addr = *addr as usize;
                if self.labels.contains_key(&addr) {
                    self.alias_labels.push((addr, label.clone()));
                } else {
                    self.labels.insert(addr, label.clone());
                }
            }
        }

        for entry in &module.entries {
            if let HeaderEntry::Local(addr) = entry {
                let site = *addr as usize;
                data_sites.insert(site);
                let target = module.code[site] as usize;
                if target <= len {
                    self.ensure_data_label(target);
                }
            }
        }

        if let Some(start) = module.start() {
            self.ensure_code_label(start as usize);
        }

        for (i, d) in decoded.iter().enumerate() {
            if data_sites.contains(&i) {
                continue;
            }
            let Some(d) = d else { continue };
            match *d {
                Decoded::Br { offset, .. } | Decoded::Bl { offset } => {
                    if let Some(target) = in_image(pc_target(i, offset), len) {
                        self.ensure_code_label(target);
                    }
                }
                Decoded::Ld { offset, .. }
                | Decoded::St { offset, .. }
                | Decoded::Lea { offset, .. } => {
                    if let Some(target) = in_image(pc_target(i, offset), len) {
                        self.ensure_data_label(target);
                    }
                }
                _ => {}
            }
        }

        // Emission.
        let mut out = String::new();
        for entry in &module.entries {
            if let HeaderEntry::Global { label, .. } = entry {
                out.push_str(&format!(".global {}\n", label));
            }
        }
        if let Some(start) = module.start() {
            out.push_str(&format!(".start {}\n", self.labels[&(start as usize)]));
        }

        for i in 0..len {
            for (addr, alias) in &self.alias_labels {
                if *addr == i {
                    out.push_str(&format!("{}:\n", alias));
                }
            }
            let prefix = match self.labels.get(&i) {
                Some(label) => format!("{}: ", label),
                None => "    ".to_string(),
            };
            let body = if data_sites.contains(&i) {
                let target = module.code[i] as usize;
                match self.labels.get(&target) {
                    Some(label) => format!(".word {}", label),
                    None => format!(".word 0x{:04x}", module.code[i]),
                }
            } else {
                match &decoded[i] {
                    Some(d) => self.format_instruction(d, i, len),
                    None => format!(".word 0x{:04x}", module.code[i]),
                }
            };
            out.push_str(&prefix);
            out.push_str(&body);
            out.push('\n');
        }

        // A label can point one past the last word.
        if let Some(label) = self.labels.get(&len) {
            out.push_str(&format!("{}:\n", label));
        }

        Ok(out)
    }

    fn ensure_code_label(&mut self, addr: usize) {
        if !self.labels.contains_key(&addr) {
            self.labels.insert(addr, format!("@L{}", self.code_label_count));
            self.code_label_count += 1;
        }
    }

    fn ensure_data_label(&mut self, addr: usize) {
        if !self.labels.contains_key(&addr) {
            self.labels.insert(addr, format!("@D{}", self.data_label_count));
            self.data_label_count += 1;
        }
    }

    // Like `Decoded::display_at`, but pc-relative targets go through
    // the label map.
    fn format_instruction(&self, d: &Decoded, addr: usize, len: usize) -> String {
        let target_str = |offset: i16| {
            match in_image(pc_target(addr, offset), len).and_then(|t| self.labels.get(&t)) {
                Some(label) => label.clone(),
                None => format!("0x{:04x}", (addr as u16).wrapping_add(1).wrapping_add(offset as u16)),
            }
        };
        let r = |i: u16| REGISTER_NAMES[i as usize];

        match *d {
            Decoded::Br { cc, offset } => {
                format!("{} {}", isa::BRANCH_NAMES[cc as usize], target_str(offset))
            }
            Decoded::Ld { dr, offset } => format!("ld {}, {}", r(dr), target_str(offset)),
            Decoded::St { sr, offset } => format!("st {}, {}", r(sr), target_str(offset)),
            Decoded::Lea { dr, offset } => format!("lea {}, {}", r(dr), target_str(offset)),
            Decoded::Bl { offset } => format!("bl {}", target_str(offset)),
            Decoded::Trap { reg, vec } => trap_str(reg, vec),
            Decoded::Add { dr, sr1, rhs } => {
                format!("add {}, {}, {}", r(dr), r(sr1), rhs_str(rhs))
            }
            Decoded::And { dr, sr1, rhs } => {
                format!("and {}, {}, {}", r(dr), r(sr1), rhs_str(rhs))
            }
            Decoded::Sub { dr, sr1, rhs } => {
                format!("sub {}, {}, {}", r(dr), r(sr1), rhs_str(rhs))
            }
            other => other.display_at(addr as u16),
        }
    }
}

impl Default for Disassembler {
    fn default() -> Disassembler {
        Disassembler::new()
    }
}

fn pc_target(addr: usize, offset: i16) -> usize {
    (addr + 1).wrapping_add_signed(offset as isize)
}

fn in_image(target: usize, len: usize) -> Option<usize> {
    // a negative target wraps far above any image and is rejected here
    (target <= len).then_some(target)
}

fn rhs_str(rhs: DecodedRhs) -> String {
    match rhs {
        DecodedRhs::Reg(i) => REGISTER_NAMES[i as usize].to_string(),
        DecodedRhs::Imm(v) => v.to_string(),
    }
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

    fn round_trip(source: &str) {
        let first = assemble(source);
        let text = disassemble(&first).unwrap();
        let second = assemble(&text);
        assert_eq!(
            first.to_bytes(),
            second.to_bytes(),
            "reassembly diverged for:\n{}",
            text
        );
    }

    #[test]
    fn test_round_trip_demo_a() {
        round_trip("mov r0, 5\ndout r0\nnl\nhalt\n");
    }

    #[test]
    fn test_round_trip_branches_and_data() {
        round_trip(
            "mvi r0, 5\nloop: dout r0\nsub r0, r0, 1\nbrnz loop\nhalt\nx: .word 7\ny: .word x\n",
        );
    }

    #[test]
    fn test_round_trip_with_start_and_string() {
        round_trip("msg: .string \"hi\"\nentry: lea r0, msg\nsout r0\nhalt\n.start entry\n");
    }

    #[test]
    fn test_round_trip_misc_ops() {
        round_trip(
            "push r0\npop r1\nmvr r2, r3\nsrl r0, 3\nmul r0, r1\nsext r4\nnot r0, r1\ncmp r0, 5\nldr r0, fp, -2\nblr r2, 1\nret\nhalt\n",
        );
    }

    #[test]
    fn test_data_words_survive() {
        // 0x9000 does not decode (not without its 111111 tail)
        let module = ObjectModule {
            entries: vec![],
            code: vec![0x9000, 0xF000],
        };
        let text = disassemble(&module).unwrap();
        assert!(text.contains(".word 0x9000"));
        let again = assemble(&text);
        assert_eq!(again.code, module.code);
    }

    #[test]
    fn test_global_names_survive() {
        let module = assemble(".global main\nmain: halt\n");
        let text = disassemble(&module).unwrap();
        assert!(text.contains(".global main"));
        assert!(text.contains("main: halt"));
        let again = assemble(&text);
        assert_eq!(module.to_bytes(), again.to_bytes());
    }

    #[test]
    fn test_word_label_renders_relocation() {
        let module = assemble("x: .word 7\ny: .word x\nhalt\n");
        let text = disassemble(&module).unwrap();
        assert!(text.contains(".word x") || text.contains(".word @D"));
    }

    #[test]
    fn test_unresolved_module_rejected() {
        let module = assemble(".extern far\nbl far\nhalt\n");
        assert!(disassemble(&module).is_err());
    }
}
