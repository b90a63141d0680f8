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

use super::Rule;
use crate::ast::*;
use crate::errors::LccError;
use pest::iterators::Pair;

// Operands as they come out of the grammar, before an instruction shape
// is imposed on them.
#[derive(Debug, Clone)]
enum Operand {
    Register(Register),
    Int(i32),
    Char(u8),
    Str(String),
    Label(String),
}

// Trap service vectors for the alias mnemonics.
const TRAP_ALIASES: &[(&str, i32)] = &[
    ("halt", 0x00),
    ("nl", 0x01),
    ("dout", 0x02),
    ("udout", 0x03),
    ("hout", 0x04),
    ("aout", 0x05),
    ("sout", 0x06),
    ("din", 0x07),
    ("hin", 0x08),
    ("ain", 0x09),
    ("sin", 0x0A),
    ("m", 0x0B),
    ("r", 0x0C),
    ("s", 0x0D),
    ("bp", 0x0E),
];

pub fn build_instruction(pair: Pair<Rule>) -> Result<Instruction, LccError> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut inner = pair.into_inner();
    let mnemonic = inner
        .next()
        .expect("instruction always starts with a mnemonic")
        .as_str()
        .to_lowercase();
    let args = Args::collect(line, inner)?;

    let instruction = match mnemonic.as_str() {
        "br" => Instruction::Br(ConditionCode::Always, args.one_target()?),
        "brz" => Instruction::Br(ConditionCode::Z, args.one_target()?),
        "brnz" => Instruction::Br(ConditionCode::Nz, args.one_target()?),
        "brn" => Instruction::Br(ConditionCode::N, args.one_target()?),
        "brp" => Instruction::Br(ConditionCode::P, args.one_target()?),
        "brlt" => Instruction::Br(ConditionCode::Lt, args.one_target()?),
        "brgt" => Instruction::Br(ConditionCode::Gt, args.one_target()?),
        "brc" => Instruction::Br(ConditionCode::C, args.one_target()?),
        "add" => {
            args.expect(3)?;
            Instruction::Add(args.reg(0)?, args.reg(1)?, args.rhs(2)?)
        }
        "and" => {
            args.expect(3)?;
            Instruction::And(args.reg(0)?, args.reg(1)?, args.rhs(2)?)
        }
        "sub" => {
            args.expect(3)?;
            Instruction::Sub(args.reg(0)?, args.reg(1)?, args.rhs(2)?)
        }
        "ld" => {
            args.expect(2)?;
            Instruction::Ld(args.reg(0)?, args.target(1)?)
        }
        "st" => {
            args.expect(2)?;
            Instruction::St(args.reg(0)?, args.target(1)?)
        }
        "lea" => {
            args.expect(2)?;
            Instruction::Lea(args.reg(0)?, args.target(1)?)
        }
        "bl" => Instruction::Bl(args.one_target()?),
        "blr" | "jsrr" => {
            args.expect_range(1, 2)?;
            Instruction::Blr(args.reg(0)?, args.opt_int(1)?)
        }
        "ldr" => {
            args.expect(3)?;
            Instruction::Ldr(args.reg(0)?, args.reg(1)?, args.int(2)?)
        }
        "str" => {
            args.expect(3)?;
            Instruction::Str(args.reg(0)?, args.reg(1)?, args.int(2)?)
        }
        "cmp" => {
            args.expect(2)?;
            Instruction::Cmp(args.reg(0)?, args.rhs(1)?)
        }
        "not" => {
            args.expect(2)?;
            Instruction::Not(args.reg(0)?, args.reg(1)?)
        }
        "push" => {
            args.expect(1)?;
            Instruction::Push(args.reg(0)?)
        }
        "pop" => {
            args.expect(1)?;
            Instruction::Pop(args.reg(0)?)
        }
        "mvr" => {
            args.expect(2)?;
            Instruction::Mvr(args.reg(0)?, args.reg(1)?)
        }
        "srl" => {
            args.expect(2)?;
            Instruction::Srl(args.reg(0)?, args.int(1)?)
        }
        "sra" => {
            args.expect(2)?;
            Instruction::Sra(args.reg(0)?, args.int(1)?)
        }
        "sll" => {
            args.expect(2)?;
            Instruction::Sll(args.reg(0)?, args.int(1)?)
        }
        "rol" => {
            args.expect(2)?;
            Instruction::Rol(args.reg(0)?, args.int(1)?)
        }
        "ror" => {
            args.expect(2)?;
            Instruction::Ror(args.reg(0)?, args.int(1)?)
        }
        "mul" => {
            args.expect(2)?;
            Instruction::Mul(args.reg(0)?, args.reg(1)?)
        }
        "div" => {
            args.expect(2)?;
            Instruction::Div(args.reg(0)?, args.reg(1)?)
        }
        "rem" => {
            args.expect(2)?;
            Instruction::Rem(args.reg(0)?, args.reg(1)?)
        }
        "or" => {
            args.expect(2)?;
            Instruction::Or(args.reg(0)?, args.reg(1)?)
        }
        "xor" => {
            args.expect(2)?;
            Instruction::Xor(args.reg(0)?, args.reg(1)?)
        }
        "sext" => {
            args.expect(1)?;
            Instruction::Sext(args.reg(0)?)
        }
        "jmp" => {
            args.expect_range(1, 2)?;
            Instruction::Jmp(args.reg(0)?, args.opt_int(1)?)
        }
        "ret" => {
            args.expect(0)?;
            Instruction::Ret
        }
        "mvi" | "mov" => {
            args.expect(2)?;
            Instruction::Mvi(args.reg(0)?, args.int(1)?)
        }
        "trap" => {
            args.expect(2)?;
            Instruction::Trap(args.reg(0)?, args.int(1)?)
        }
        other => {
            let vec = TRAP_ALIASES
                .iter()
                .find(|(name, _)| *name == other)
                .map(|(_, vec)| *vec)
                .ok_or_else(|| LccError::SyntaxError {
                    line,
                    reason: format!("Unknown mnemonic: {}", other),
                })?;
            if matches!(other, "halt" | "nl") {
                args.expect(0)?;
                Instruction::Trap(Register::R0, vec)
            } else {
                args.expect_range(0, 1)?;
                Instruction::Trap(args.opt_reg(0)?, vec)
            }
        }
    };

    Ok(instruction)
}

pub fn build_directive(pair: Pair<Rule>) -> Result<Directive, LccError> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut inner = pair.into_inner();
    let keyword = inner
        .next()
        .expect("directive always starts with a keyword")
        .as_str()
        .to_lowercase();
    let args = Args::collect(line, inner)?;

    let directive = match keyword.as_str() {
        ".word" => {
            args.expect(1)?;
            Directive::Word(args.target(0)?)
        }
        ".zero" | ".space" | ".blkw" | ".fill" => {
            args.expect(1)?;
            let count = args.int(0)?;
            if count < 0 {
                return Err(LccError::SyntaxError {
                    line,
                    reason: format!("{} count must not be negative", keyword),
                });
            }
            Directive::Zero(count as u32)
        }
        ".string" | ".asciz" | ".stringz" => {
            args.expect(1)?;
            Directive::Stringz(args.string(0)?)
        }
        ".start" => {
            args.expect(1)?;
            Directive::Start(args.label(0)?)
        }
        ".global" | ".globl" => {
            args.expect(1)?;
            Directive::Global(args.label(0)?)
        }
        ".extern" => {
            args.expect(1)?;
            Directive::Extern(args.label(0)?)
        }
        ".org" | ".orig" => {
            args.expect(1)?;
            let addr = args.int(0)?;
            if !(0..=0xFFFF).contains(&addr) {
                return Err(LccError::SyntaxError {
                    line,
                    reason: format!("{} address must be a 16-bit value", keyword),
                });
            }
            Directive::Org(addr as u32)
        }
        other => {
            return Err(LccError::SyntaxError {
                line,
                reason: format!("Unknown directive: {}", other),
            });
        }
    };

    Ok(directive)
}

// ------- operand collection and shape checks -------

struct Args {
    line: usize,
    ops: Vec<Operand>,
}

impl Args {
    fn collect<'a>(
        line: usize,
        pairs: impl Iterator<Item = Pair<'a, Rule>>,
    ) -> Result<Args, LccError> {
        let mut ops = Vec::new();
        for pair in pairs {
            ops.push(build_operand(line, pair)?);
        }
        Ok(Args { line, ops })
    }

    fn err(&self, reason: String) -> LccError {
        LccError::SyntaxError {
            line: self.line,
            reason,
        }
    }

    fn expect(&self, n: usize) -> Result<(), LccError> {
        if self.ops.len() != n {
            return Err(self.err(format!("Expected {} operand(s), found {}", n, self.ops.len())));
        }
        Ok(())
    }

    fn expect_range(&self, min: usize, max: usize) -> Result<(), LccError> {
        if self.ops.len() < min || self.ops.len() > max {
            return Err(self.err(format!(
                "Expected {} to {} operand(s), found {}",
                min,
                max,
                self.ops.len()
            )));
        }
        Ok(())
    }

    fn reg(&self, i: usize) -> Result<Register, LccError> {
        match self.ops.get(i) {
            Some(Operand::Register(r)) => Ok(*r),
            _ => Err(self.err(format!("Operand {} must be a register", i + 1))),
        }
    }

    fn int(&self, i: usize) -> Result<i32, LccError> {
        match self.ops.get(i) {
            Some(Operand::Int(v)) => Ok(*v),
            Some(Operand::Char(c)) => Ok(*c as i32),
            _ => Err(self.err(format!("Operand {} must be a number", i + 1))),
        }
    }

    fn rhs(&self, i: usize) -> Result<Rhs, LccError> {
        match self.ops.get(i) {
            Some(Operand::Register(r)) => Ok(Rhs::Register(*r)),
            Some(Operand::Int(v)) => Ok(Rhs::Imm(*v)),
            Some(Operand::Char(c)) => Ok(Rhs::Imm(*c as i32)),
            _ => Err(self.err(format!(
                "Operand {} must be a register or an immediate",
                i + 1
            ))),
        }
    }

    fn target(&self, i: usize) -> Result<Literal, LccError> {
        match self.ops.get(i) {
            Some(Operand::Label(name)) => Ok(Literal::Label(name.clone())),
            Some(Operand::Int(v)) => Ok(Literal::Int(*v)),
            Some(Operand::Char(c)) => Ok(Literal::Char(*c)),
            _ => Err(self.err(format!(
                "Operand {} must be a label, a number or a char",
                i + 1
            ))),
        }
    }

    fn one_target(&self) -> Result<Literal, LccError> {
        self.expect(1)?;
        self.target(0)
    }

    fn label(&self, i: usize) -> Result<String, LccError> {
        match self.ops.get(i) {
            Some(Operand::Label(name)) => Ok(name.clone()),
            _ => Err(self.err(format!("Operand {} must be a label", i + 1))),
        }
    }

    fn string(&self, i: usize) -> Result<String, LccError> {
        match self.ops.get(i) {
            Some(Operand::Str(s)) => Ok(s.clone()),
            _ => Err(self.err(format!("Operand {} must be a string literal", i + 1))),
        }
    }

    fn opt_int(&self, i: usize) -> Result<i32, LccError> {
        if i < self.ops.len() { self.int(i) } else { Ok(0) }
    }

    fn opt_reg(&self, i: usize) -> Result<Register, LccError> {
        if i < self.ops.len() {
            self.reg(i)
        } else {
            Ok(Register::R0)
        }
    }
}

fn build_operand(line: usize, pair: Pair<Rule>) -> Result<Operand, LccError> {
    match pair.as_rule() {
        Rule::register => Ok(Operand::Register(parse_register(pair.as_str()))),
        Rule::number => Ok(Operand::Int(parse_number(line, pair.as_str())?)),
        Rule::char_lit => {
            let inner = pair
                .into_inner()
                .next()
                .expect("char literal always has an inner char");
            Ok(Operand::Char(unescape_char(line, inner.as_str())?))
        }
        Rule::string => {
            let text = pair
                .into_inner()
                .next()
                .map(|inner| inner.as_str().to_string())
                .unwrap_or_default();
            Ok(Operand::Str(unescape_string(line, &text)?))
        }
        Rule::ident => Ok(Operand::Label(pair.as_str().to_string())),
        rule => Err(LccError::SyntaxError {
            line,
            reason: format!("Unexpected operand: {:?}", rule),
        }),
    }
}

fn parse_register(text: &str) -> Register {
    match text.to_lowercase().as_str() {
        "r0" => Register::R0,
        "r1" => Register::R1,
        "r2" => Register::R2,
        "r3" => Register::R3,
        "r4" => Register::R4,
        "r5" | "fp" => Register::Fp,
        "r6" | "sp" => Register::Sp,
        "r7" | "lr" => Register::Lr,
        _ => unreachable!("grammar only accepts r0-r7, fp, sp, lr"),
    }
}

fn parse_number(line: usize, text: &str) -> Result<i32, LccError> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else {
        rest.parse::<i64>()
    }
    .map_err(|_| LccError::SyntaxError {
        line,
        reason: format!("Invalid numeric literal: {}", text),
    })?;

    let value = if negative { -value } else { value };
    if !(-65536..=65535).contains(&value) {
        return Err(LccError::SyntaxError {
            line,
            reason: format!("Numeric literal out of 16-bit range: {}", text),
        });
    }

    Ok(value as i32)
}

fn unescape_char(line: usize, text: &str) -> Result<u8, LccError> {
    let mut chars = text.chars();
    let first = chars.next().ok_or_else(|| LccError::SyntaxError {
        line,
        reason: "Empty char literal".to_string(),
    })?;

    let value = if first == '\\' {
        let escaped = chars.next().ok_or_else(|| LccError::SyntaxError {
            line,
            reason: "Dangling escape in char literal".to_string(),
        })?;
        escape_value(line, escaped)?
    } else {
        char_to_byte(line, first)?
    };

    Ok(value)
}

fn unescape_string(line: usize, text: &str) -> Result<String, LccError> {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let escaped = chars.next().ok_or_else(|| LccError::SyntaxError {
                line,
                reason: "Dangling escape in string literal".to_string(),
            })?;
            out.push(escape_value(line, escaped)? as char);
        } else {
            out.push(char_to_byte(line, c)? as char);
        }
    }
    Ok(out)
}

fn escape_value(line: usize, escaped: char) -> Result<u8, LccError> {
    match escaped {
        'n' => Ok(b'\n'),
        'r' => Ok(b'\r'),
        't' => Ok(b'\t'),
        '\\' => Ok(b'\\'),
        '\'' => Ok(b'\''),
        '"' => Ok(b'"'),
        '0' => Ok(0),
        other => Err(LccError::SyntaxError {
            line,
            reason: format!("Unknown escape sequence: \\{}", other),
        }),
    }
}

fn char_to_byte(line: usize, c: char) -> Result<u8, LccError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(LccError::SyntaxError {
            line,
            reason: format!("Non-ASCII character in literal: {}", c),
        })
    }
}
