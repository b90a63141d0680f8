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

use crate::assembler::symbol_table::SymbolTable;
use crate::ast::{ConditionCode, Instruction, Literal, Register, Rhs};
use crate::errors::LccError;
use crate::isa::*;
use crate::obj::{HeaderEntry, RefSlot};

// Encodes one instruction at a known address during pass 2. A reference
// to an extern symbol encodes a zero offset field and surfaces as a
// header entry for the linker to patch.
pub struct Encoder<'a> {
    symbols: &'a SymbolTable,
    addr: u16,
    line: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(symbols: &'a SymbolTable, addr: u16, line: usize) -> Encoder<'a> {
        Encoder {
            symbols,
            addr,
            line,
        }
    }

    pub fn encode(&self, instruction: &Instruction) -> Result<(u16, Option<HeaderEntry>), LccError> {
        let word = |w: u16| Ok((w, None));

        match instruction {
            Instruction::Br(cc, target) => {
                let (field, entry) = self.pc_field(target, RefSlot::Pc9)?;
                Ok(((OP_BR << 12) | (cc_bits(*cc) << 9) | field, entry))
            }
            Instruction::Add(dr, sr1, rhs) => {
                word((OP_ADD << 12) | regs_12_9_6(*dr, *sr1) | self.rhs_field(rhs)?)
            }
            Instruction::And(dr, sr1, rhs) => {
                word((OP_AND << 12) | regs_12_9_6(*dr, *sr1) | self.rhs_field(rhs)?)
            }
            Instruction::Sub(dr, sr1, rhs) => {
                word((OP_SUB << 12) | regs_12_9_6(*dr, *sr1) | self.rhs_field(rhs)?)
            }
            Instruction::Ld(dr, target) => {
                let (field, entry) = self.pc_field(target, RefSlot::Pc9)?;
                Ok(((OP_LD << 12) | (dr.index() << 9) | field, entry))
            }
            Instruction::St(sr, target) => {
                let (field, entry) = self.pc_field(target, RefSlot::Pc9)?;
                Ok(((OP_ST << 12) | (sr.index() << 9) | field, entry))
            }
            Instruction::Lea(dr, target) => {
                let (field, entry) = self.pc_field(target, RefSlot::Pc9)?;
                Ok(((OP_LEA << 12) | (dr.index() << 9) | field, entry))
            }
            Instruction::Bl(target) => {
                let (field, entry) = self.pc_field(target, RefSlot::Pc11)?;
                Ok(((OP_BL << 12) | 0x0800 | field, entry))
            }
            Instruction::Blr(base, offset) => {
                word((OP_BL << 12) | (base.index() << 6) | self.imm(*offset, 6)?)
            }
            Instruction::Ldr(dr, base, offset) => word(
                (OP_LDR << 12)
                    | (dr.index() << 9)
                    | (base.index() << 6)
                    | self.imm(*offset, 6)?,
            ),
            Instruction::Str(sr, base, offset) => word(
                (OP_STR << 12)
                    | (sr.index() << 9)
                    | (base.index() << 6)
                    | self.imm(*offset, 6)?,
            ),
            Instruction::Cmp(sr1, rhs) => {
                word((OP_CMP << 12) | (sr1.index() << 6) | self.rhs_field(rhs)?)
            }
            Instruction::Not(dr, sr) => {
                word((OP_NOT << 12) | regs_12_9_6(*dr, *sr) | 0x3F)
            }
            Instruction::Push(sr) => word((OP_MISC << 12) | (sr.index() << 9) | EOP_PUSH),
            Instruction::Pop(dr) => word((OP_MISC << 12) | (dr.index() << 9) | EOP_POP),
            Instruction::Mvr(dr, sr) => {
                word((OP_MISC << 12) | regs_12_9_6(*dr, *sr) | EOP_MVR)
            }
            Instruction::Srl(dr, count) => self.shift(*dr, *count, EOP_SRL),
            Instruction::Sra(dr, count) => self.shift(*dr, *count, EOP_SRA),
            Instruction::Sll(dr, count) => self.shift(*dr, *count, EOP_SLL),
            Instruction::Rol(dr, count) => self.shift(*dr, *count, EOP_ROL),
            Instruction::Ror(dr, count) => self.shift(*dr, *count, EOP_ROR),
            Instruction::Mul(dr, sr) => {
                word((OP_MISC << 12) | regs_12_9_6(*dr, *sr) | EOP_MUL)
            }
            Instruction::Div(dr, sr) => {
                word((OP_MISC << 12) | regs_12_9_6(*dr, *sr) | EOP_DIV)
            }
            Instruction::Rem(dr, sr) => {
                word((OP_MISC << 12) | regs_12_9_6(*dr, *sr) | EOP_REM)
            }
            Instruction::Or(dr, sr) => {
                word((OP_MISC << 12) | regs_12_9_6(*dr, *sr) | EOP_OR)
            }
            Instruction::Xor(dr, sr) => {
                word((OP_MISC << 12) | regs_12_9_6(*dr, *sr) | EOP_XOR)
            }
            Instruction::Sext(dr) => word((OP_MISC << 12) | (dr.index() << 9) | EOP_SEXT),
            Instruction::Jmp(base, offset) => {
                word((OP_JMP << 12) | (base.index() << 6) | self.imm(*offset, 6)?)
            }
            Instruction::Ret => word((OP_JMP << 12) | (Register::Lr.index() << 6)),
            Instruction::Mvi(dr, imm) => {
                word((OP_MVI << 12) | (dr.index() << 9) | self.imm(*imm, 9)?)
            }
            Instruction::Trap(reg, vec) => {
                if !(0..=0xFF).contains(vec) {
                    return Err(LccError::AsmError {
                        line: self.line,
                        reason: format!("Trap vector must be 0..255, found {}", vec),
                    });
                }
                word((OP_TRAP << 12) | (reg.index() << 9) | (*vec as u16))
            }
        }
    }

    // Resolve a pc-relative target into its offset field. Extern labels
    // leave the field zero and report a relocation entry instead.
    fn pc_field(
        &self,
        target: &Literal,
        slot: RefSlot,
    ) -> Result<(u16, Option<HeaderEntry>), LccError> {
        let bits = slot.bits();
        match target {
            Literal::Int(value) => Ok((self.pc_offset_to(*value, bits, || {
                format!("target 0x{:04x}", value)
            })?, None)),
            Literal::Char(c) => Ok((self.pc_offset_to(*c as i32, bits, || {
                format!("target 0x{:04x}", c)
            })?, None)),
            Literal::Label(name) => {
                if let Some(def) = self.symbols.lookup(name) {
                    let field = self.pc_offset_to(def as i32, bits, || {
                        format!("label \"{}\"", name)
                    })?;
                    Ok((field, None))
                } else if self.symbols.is_extern(name) {
                    Ok((
                        0,
                        Some(HeaderEntry::Extern {
                            addr: self.addr,
                            label: name.clone(),
                            slot,
                        }),
                    ))
                } else {
                    Err(LccError::AsmError {
                        line: self.line,
                        reason: format!("Undefined label: {}", name),
                    })
                }
            }
        }
    }

    fn pc_offset_to(
        &self,
        target: i32,
        bits: u32,
        what: impl Fn() -> String,
    ) -> Result<u16, LccError> {
        let offset = target - (self.addr as i32 + 1);
        if !fits_signed(offset, bits) {
            return Err(LccError::RangeError {
                line: self.line,
                what: what(),
                bits,
            });
        }
        Ok(offset as u16 & field_mask(bits))
    }

    fn rhs_field(&self, rhs: &Rhs) -> Result<u16, LccError> {
        match rhs {
            Rhs::Register(r) => Ok(r.index()),
            Rhs::Imm(value) => Ok(0x20 | self.imm(*value, 5)?),
        }
    }

    fn imm(&self, value: i32, bits: u32) -> Result<u16, LccError> {
        if !fits_signed(value, bits) {
            return Err(LccError::RangeError {
                line: self.line,
                what: format!("immediate {}", value),
                bits,
            });
        }
        Ok(value as u16 & field_mask(bits))
    }

    fn shift(&self, dr: Register, count: i32, eop: u16) -> Result<(u16, Option<HeaderEntry>), LccError> {
        if !(0..=7).contains(&count) {
            return Err(LccError::AsmError {
                line: self.line,
                reason: format!("Shift count must be 0..7, found {}", count),
            });
        }
        Ok((
            (OP_MISC << 12) | (dr.index() << 9) | ((count as u16) << 6) | eop,
            None,
        ))
    }
}

fn regs_12_9_6(hi: Register, lo: Register) -> u16 {
    (hi.index() << 9) | (lo.index() << 6)
}

fn cc_bits(cc: ConditionCode) -> u16 {
    match cc {
        ConditionCode::Z => 0,
        ConditionCode::Nz => 1,
        ConditionCode::N => 2,
        ConditionCode::P => 3,
        ConditionCode::Lt => 4,
        ConditionCode::Gt => 5,
        ConditionCode::C => 6,
        ConditionCode::Always => 7,
    }
}
