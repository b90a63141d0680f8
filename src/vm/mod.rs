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

pub mod listing;
pub mod traps;

use crate::errors::LccError;
use crate::isa::{self, Decoded, DecodedRhs, REGISTER_NAMES};
use crate::obj::ObjectModule;
use listing::ListingRow;
use std::collections::VecDeque;
use traps::{SystemTraps, TrapDispatcher, TrapResult};

pub const MEMORY_WORDS: usize = 65536;
pub const DEFAULT_INSTRUCTION_CAP: u64 = 500_000;

const SP: u16 = 6;
const LR: u16 = 7;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Flags {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

// What the interpreter reports back to its host after running: still
// going, cleanly halted, or suspended waiting for input bytes the host
// has not supplied yet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Halted,
    AwaitingInput,
}

pub struct Machine {
    pub mem: Vec<u16>,
    pub regs: [u16; 8],
    pub pc: u16,
    pub flags: Flags,
    pub running: bool,
    // When set, input traps fall back to reading stdin and output is
    // echoed as it is produced.
    pub interactive: bool,
    pub echo: bool,
    input: VecDeque<u8>,
    output: Vec<u8>,
    code_words: usize,
}

impl Default for Machine {
    fn default() -> Machine {
        Machine::new()
    }
}

impl Machine {
    pub fn new() -> Machine {
        Machine {
            mem: vec![0; MEMORY_WORDS],
            regs: [0; 8],
            pc: 0,
            flags: Flags::default(),
            running: true,
            interactive: false,
            echo: false,
            input: VecDeque::new(),
            output: Vec::new(),
            code_words: 0,
        }
    }

    // Map an executable into memory at `load_point` and point the pc at
    // its entry. Unresolved containers are not loadable.
    pub fn load(&mut self, exe: &ObjectModule, load_point: u16) -> Result<(), LccError> {
        if exe.has_unresolved() {
            return Err(LccError::FormatError(
                "executable contains unresolved external references".into(),
            ));
        }
        let base = load_point as usize;
        if base + exe.code.len() > MEMORY_WORDS {
            return Err(LccError::FormatError(
                "program does not fit in memory at the given load point".into(),
            ));
        }
        self.mem[base..base + exe.code.len()].copy_from_slice(&exe.code);
        self.code_words = exe.code.len();
        self.pc = load_point.wrapping_add(exe.start().unwrap_or(0));
        Ok(())
    }

    pub fn code_words(&self) -> usize {
        self.code_words
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn write_out(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
        if self.echo {
            use std::io::Write;
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(bytes);
            let _ = stdout.flush();
        }
    }

    // Take one line from the input buffer, refilling from stdin in
    // interactive mode. Returns None when the buffer is dry and nothing
    // more can be read: the caller suspends.
    pub fn read_input_line(&mut self) -> Option<Vec<u8>> {
        if self.input.is_empty() {
            if !self.interactive {
                return None;
            }
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
                return None;
            }
            self.input.extend(line.bytes());
        }
        let mut line = Vec::new();
        while let Some(byte) = self.input.pop_front() {
            if byte == b'\n' {
                break;
            }
            line.push(byte);
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    pub fn register_dump(&self) -> String {
        let r = |i: usize| format!("{} = {:04x}", REGISTER_NAMES[i], self.regs[i]);
        format!(
            "{}  {}  {}  {}\n{}  {}  {}  {}\n",
            r(0),
            r(1),
            r(2),
            r(3),
            r(4),
            r(5),
            r(6),
            r(7)
        )
    }

    pub fn flag_dump(&self) -> String {
        let bit = |b: bool| if b { 1 } else { 0 };
        format!(
            "nzcv = {} {} {} {}",
            bit(self.flags.n),
            bit(self.flags.z),
            bit(self.flags.c),
            bit(self.flags.v)
        )
    }

    fn set_nz(&mut self, value: u16) {
        self.flags.n = value & 0x8000 != 0;
        self.flags.z = value == 0;
    }

    // Widened addition: carry from bit 16, signed overflow from the
    // operand/result sign pattern.
    fn add_flags(&mut self, a: u16, b: u16) -> u16 {
        let wide = a as u32 + b as u32;
        let result = wide as u16;
        self.flags.c = wide > 0xFFFF;
        self.flags.v = ((a ^ result) & (b ^ result) & 0x8000) != 0;
        self.set_nz(result);
        result
    }

    // Subtraction flags: c is the borrow, per the cmp convention.
    fn sub_flags(&mut self, a: u16, b: u16) -> u16 {
        let result = a.wrapping_sub(b);
        self.flags.c = a < b;
        self.flags.v = ((a ^ b) & (a ^ result) & 0x8000) != 0;
        self.set_nz(result);
        result
    }

    fn condition(&self, cc: u16) -> bool {
        let f = self.flags;
        match cc {
            0 => f.z,
            1 => !f.z,
            2 => f.n,
            3 => !f.n && !f.z,
            4 => f.n != f.v,
            5 => !f.z && (f.n == f.v),
            6 => f.c,
            _ => true,
        }
    }
}

pub struct Interpreter {
    pub machine: Machine,
    traps: Box<dyn TrapDispatcher>,
    pub rows: Vec<ListingRow>,
    pub executed: u64,
    pub instruction_cap: u64,
}

impl Interpreter {
    pub fn new(machine: Machine, traps: Box<dyn TrapDispatcher>) -> Interpreter {
        Interpreter {
            machine,
            traps,
            rows: Vec::new(),
            executed: 0,
            instruction_cap: DEFAULT_INSTRUCTION_CAP,
        }
    }

    pub fn with_system_traps(machine: Machine) -> Interpreter {
        Interpreter::new(machine, Box::new(SystemTraps))
    }

    // Execute a single instruction. On a starved input trap the pc is
    // rewound so the same trap re-executes once input arrives.
    pub fn step(&mut self) -> Result<RunState, LccError> {
        if !self.machine.running {
            return Ok(RunState::Halted);
        }
        if self.executed >= self.instruction_cap {
            return Err(LccError::PossibleInfiniteLoop(self.instruction_cap));
        }

        let addr = self.machine.pc;
        let word = self.machine.mem[addr as usize];
        self.machine.pc = addr.wrapping_add(1);

        let decoded = isa::decode(word).ok_or_else(|| {
            LccError::RuntimeError(format!(
                "invalid instruction 0x{:04x} at 0x{:04x}",
                word, addr
            ))
        })?;

        let outcome = self.execute(&decoded)?;
        match outcome {
            TrapResult::Continue(effect) => {
                self.finish_step(addr, word, &decoded, effect);
                Ok(RunState::Running)
            }
            TrapResult::Halt => {
                self.machine.running = false;
                self.finish_step(addr, word, &decoded, None);
                Ok(RunState::Halted)
            }
            TrapResult::AwaitInput => {
                self.machine.pc = addr;
                Ok(RunState::AwaitingInput)
            }
        }
    }

    // Run up to `n` instructions, stopping early on halt or input
    // starvation. Hosts that interleave input injection drive this.
    pub fn step_batch(&mut self, n: u32) -> Result<RunState, LccError> {
        for _ in 0..n {
            match self.step()? {
                RunState::Running => {}
                state => return Ok(state),
            }
        }
        Ok(RunState::Running)
    }

    // Run until halt or suspension, subject to the instruction cap.
    pub fn run(&mut self) -> Result<RunState, LccError> {
        loop {
            match self.step()? {
                RunState::Running => {}
                state => return Ok(state),
            }
        }
    }

    fn finish_step(&mut self, addr: u16, word: u16, decoded: &Decoded, effect: Option<String>) {
        self.executed += 1;
        self.rows.push(ListingRow {
            addr,
            word,
            text: decoded.display_at(addr),
            effect,
        });
    }

    fn execute(&mut self, decoded: &Decoded) -> Result<TrapResult, LccError> {
        let m = &mut self.machine;
        let rhs_value = |m: &Machine, rhs: DecodedRhs| match rhs {
            DecodedRhs::Reg(i) => m.regs[i as usize],
            DecodedRhs::Imm(v) => v as u16,
        };
        let reg_effect =
            |m: &Machine, i: u16| Some(format!("{} = {:04x}", REGISTER_NAMES[i as usize], m.regs[i as usize]));

        let result = match *decoded {
            Decoded::Br { cc, offset } => {
                if m.condition(cc) {
                    m.pc = m.pc.wrapping_add(offset as u16);
                }
                TrapResult::Continue(None)
            }
            Decoded::Add { dr, sr1, rhs } => {
                let b = rhs_value(m, rhs);
                let a = m.regs[sr1 as usize];
                m.regs[dr as usize] = m.add_flags(a, b);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Sub { dr, sr1, rhs } => {
                let b = rhs_value(m, rhs);
                let a = m.regs[sr1 as usize];
                m.regs[dr as usize] = m.sub_flags(a, b);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::And { dr, sr1, rhs } => {
                let value = m.regs[sr1 as usize] & rhs_value(m, rhs);
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Ld { dr, offset } => {
                let target = m.pc.wrapping_add(offset as u16);
                m.regs[dr as usize] = m.mem[target as usize];
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::St { sr, offset } => {
                let target = m.pc.wrapping_add(offset as u16);
                m.mem[target as usize] = m.regs[sr as usize];
                TrapResult::Continue(None)
            }
            Decoded::Bl { offset } => {
                m.regs[LR as usize] = m.pc;
                m.pc = m.pc.wrapping_add(offset as u16);
                TrapResult::Continue(None)
            }
            Decoded::Blr { base, offset } => {
                let target = m.regs[base as usize].wrapping_add(offset as u16);
                m.regs[LR as usize] = m.pc;
                m.pc = target;
                TrapResult::Continue(None)
            }
            Decoded::Ldr { dr, base, offset } => {
                let target = m.regs[base as usize].wrapping_add(offset as u16);
                m.regs[dr as usize] = m.mem[target as usize];
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Str { sr, base, offset } => {
                let target = m.regs[base as usize].wrapping_add(offset as u16);
                m.mem[target as usize] = m.regs[sr as usize];
                TrapResult::Continue(None)
            }
            Decoded::Cmp { sr1, rhs } => {
                let b = rhs_value(m, rhs);
                let a = m.regs[sr1 as usize];
                m.sub_flags(a, b);
                TrapResult::Continue(Some(m.flag_dump()))
            }
            Decoded::Not { dr, sr } => {
                let value = !m.regs[sr as usize];
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Push { sr } => {
                m.regs[SP as usize] = m.regs[SP as usize].wrapping_sub(1);
                m.mem[m.regs[SP as usize] as usize] = m.regs[sr as usize];
                TrapResult::Continue(None)
            }
            Decoded::Pop { dr } => {
                m.regs[dr as usize] = m.mem[m.regs[SP as usize] as usize];
                m.regs[SP as usize] = m.regs[SP as usize].wrapping_add(1);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Mvr { dr, sr } => {
                let value = m.regs[sr as usize];
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Srl { dr, count } => {
                let value = m.regs[dr as usize] >> count;
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Sra { dr, count } => {
                let value = ((m.regs[dr as usize] as i16) >> count) as u16;
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Sll { dr, count } => {
                let value = m.regs[dr as usize] << count;
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Rol { dr, count } => {
                let value = m.regs[dr as usize].rotate_left(count as u32);
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Ror { dr, count } => {
                let value = m.regs[dr as usize].rotate_right(count as u32);
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Mul { dr, sr } => {
                let value = m.regs[dr as usize].wrapping_mul(m.regs[sr as usize]);
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Div { dr, sr } => {
                let divisor = m.regs[sr as usize] as i16;
                if divisor == 0 {
                    return Err(LccError::RuntimeError("Floating point exception".into()));
                }
                let value = (m.regs[dr as usize] as i16).wrapping_div(divisor) as u16;
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Rem { dr, sr } => {
                let divisor = m.regs[sr as usize] as i16;
                if divisor == 0 {
                    return Err(LccError::RuntimeError("Floating point exception".into()));
                }
                let value = (m.regs[dr as usize] as i16).wrapping_rem(divisor) as u16;
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Or { dr, sr } => {
                let value = m.regs[dr as usize] | m.regs[sr as usize];
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Xor { dr, sr } => {
                let value = m.regs[dr as usize] ^ m.regs[sr as usize];
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Sext { dr } => {
                let value = (m.regs[dr as usize] as u8 as i8) as i16 as u16;
                m.regs[dr as usize] = value;
                m.set_nz(value);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Jmp { base, offset } => {
                m.pc = m.regs[base as usize].wrapping_add(offset as u16);
                TrapResult::Continue(None)
            }
            Decoded::Mvi { dr, imm } => {
                m.regs[dr as usize] = imm as u16;
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Lea { dr, offset } => {
                m.regs[dr as usize] = m.pc.wrapping_add(offset as u16);
                TrapResult::Continue(reg_effect(m, dr))
            }
            Decoded::Trap { reg, vec } => self.traps.dispatch(&mut self.machine, reg, vec)?,
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{build_symbol_table, generate_object};
    use crate::parser::parse_source;

    fn machine_for(source: &str) -> Interpreter {
        let lines = parse_source(source).unwrap();
        let symbols = build_symbol_table(&lines).unwrap();
        let module = generate_object(&lines, &symbols).unwrap();
        let mut machine = Machine::new();
        machine.load(&module, 0).unwrap();
        Interpreter::with_system_traps(machine)
    }

    fn run_to_halt(interp: &mut Interpreter) {
        assert_eq!(interp.run().unwrap(), RunState::Halted);
    }

    #[test]
    fn test_demo_a() {
        let mut interp = machine_for("mov r0, 5\ndout r0\nnl\nhalt\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.output(), b"5\n");
        assert_eq!(interp.executed, 4);
    }

    #[test]
    fn test_add_and_sub_flags() {
        let mut interp = machine_for("mvi r0, 1\nmvi r1, -1\nadd r2, r0, r1\nhalt\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[2], 0);
        assert!(interp.machine.flags.z);
        assert!(interp.machine.flags.c); // 1 + 0xFFFF carries out
        assert!(!interp.machine.flags.v);
    }

    #[test]
    fn test_signed_overflow_flag() {
        let mut interp = machine_for("mvi r0, 255\nsll r0, 7\nadd r1, r0, r0\nhalt\n");
        // r0 = 0x7F80; doubling it overflows into the sign bit
        run_to_halt(&mut interp);
        assert!(interp.machine.flags.v);
        assert!(interp.machine.flags.n);
        assert!(!interp.machine.flags.c);
    }

    #[test]
    fn test_cmp_borrow_and_branches() {
        let mut interp = machine_for(
            "mvi r0, 3\nmvi r1, 5\ncmp r0, r1\nbrlt less\nmvi r2, 0\nhalt\nless: mvi r2, 1\nhalt\n",
        );
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[2], 1);
        assert!(interp.machine.flags.c); // 3 < 5 borrows
    }

    #[test]
    fn test_branch_conditions_gt() {
        let mut interp = machine_for(
            "mvi r0, 7\ncmp r0, 2\nbrgt big\nmvi r1, 0\nhalt\nbig: mvi r1, 1\nhalt\n",
        );
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[1], 1);
    }

    #[test]
    fn test_loop_with_counter() {
        // sum 1..=5 into r1
        let mut interp = machine_for(
            "mvi r0, 5\nmvi r1, 0\nloop: add r1, r1, r0\nsub r0, r0, 1\nbrnz loop\nhalt\n",
        );
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[1], 15);
    }

    #[test]
    fn test_ld_st_roundtrip() {
        let mut interp = machine_for("ld r0, x\nadd r0, r0, 1\nst r0, x\nhalt\nx: .word 41\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.mem[4], 42);
    }

    #[test]
    fn test_ldr_str_with_base() {
        let mut interp = machine_for(
            "lea r1, data\nldr r0, r1, 1\nstr r0, r1, 0\nhalt\ndata: .word 1\n.word 2\n",
        );
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.mem[4], 2);
    }

    #[test]
    fn test_push_pop() {
        let mut interp = machine_for("mvi r0, 9\npush r0\nmvi r0, 0\npop r1\nhalt\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[1], 9);
        assert_eq!(interp.machine.regs[SP as usize], 0);
    }

    #[test]
    fn test_bl_ret() {
        let mut interp = machine_for("bl sub\nhalt\nsub: mvi r0, 3\nret\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[0], 3);
        assert_eq!(interp.executed, 4);
    }

    #[test]
    fn test_misc_alu_ops() {
        let mut interp = machine_for(
            "mvi r0, 6\nmvi r1, 4\nmul r0, r1\nmvi r2, 7\nmvi r3, 2\ndiv r2, r3\nhalt\n",
        );
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[0], 24);
        assert_eq!(interp.machine.regs[2], 3);
    }

    #[test]
    fn test_division_by_zero() {
        let mut interp = machine_for("mvi r0, 4\nmvi r1, 0\ndiv r0, r1\nhalt\n");
        let err = interp.run().unwrap_err();
        assert!(matches!(
            err,
            LccError::RuntimeError(msg) if msg == "Floating point exception"
        ));
    }

    #[test]
    fn test_sext() {
        let mut interp = machine_for("mvi r0, 255\nsext r0\nhalt\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[0], 0xFFFF);
    }

    #[test]
    fn test_sout_trap() {
        let mut interp = machine_for("lea r0, msg\nsout r0\nhalt\nmsg: .string \"ok\"\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.output(), b"ok");
    }

    #[test]
    fn test_hout_uppercase() {
        let mut interp = machine_for("mvi r0, 255\nhout r0\nhalt\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.output(), b"00FF");
    }

    #[test]
    fn test_udout_vs_dout() {
        let mut interp = machine_for("mvi r0, -1\ndout r0\nnl\nudout r0\nhalt\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.output(), b"-1\n65535");
    }

    #[test]
    fn test_input_traps_from_buffer() {
        let mut interp = machine_for("ain r0\ndin r1\nhin r2\nhalt\n");
        interp.machine.push_input(b"g\n-5\nff\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[0], b'g' as u16);
        assert_eq!(interp.machine.regs[1], 0xFFFB);
        assert_eq!(interp.machine.regs[2], 0xFF);
        // each input trap leaves a listing row with its register effect
        let effects: Vec<_> = interp.rows.iter().filter(|r| r.effect.is_some()).collect();
        assert_eq!(effects.len(), 3);
    }

    #[test]
    fn test_awaiting_input_resumes() {
        let mut interp = machine_for("din r0\nhalt\n");
        assert_eq!(interp.run().unwrap(), RunState::AwaitingInput);
        interp.machine.push_input(b"12\n");
        assert_eq!(interp.run().unwrap(), RunState::Halted);
        assert_eq!(interp.machine.regs[0], 12);
    }

    #[test]
    fn test_invalid_decimal_input() {
        let mut interp = machine_for("din r0\nhalt\n");
        interp.machine.push_input(b"zebra\n");
        assert!(matches!(
            interp.run().unwrap_err(),
            LccError::RuntimeError(msg) if msg.contains("invalid decimal")
        ));
    }

    #[test]
    fn test_sin_stores_words() {
        let mut interp = machine_for("lea r0, buf\nsin r0\nhalt\nbuf: .zero 8\n");
        interp.machine.push_input(b"ab\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.mem[3], b'a' as u16);
        assert_eq!(interp.machine.mem[4], b'b' as u16);
        assert_eq!(interp.machine.mem[5], 0);
    }

    #[test]
    fn test_instruction_cap() {
        let mut interp = machine_for("loop: br loop\n");
        interp.instruction_cap = 1000;
        assert!(matches!(
            interp.run().unwrap_err(),
            LccError::PossibleInfiniteLoop(1000)
        ));
    }

    #[test]
    fn test_idempotent_load() {
        let lines = parse_source("mvi r0, 5\nhalt\nx: .word 7\n").unwrap();
        let symbols = build_symbol_table(&lines).unwrap();
        let module = generate_object(&lines, &symbols).unwrap();
        let mut a = Machine::new();
        let mut b = Machine::new();
        a.load(&module, 0x10).unwrap();
        b.load(&module, 0x10).unwrap();
        assert_eq!(a.mem, b.mem);
        assert_eq!(a.pc, b.pc);
    }

    #[test]
    fn test_load_point_offsets_pc() {
        let lines = parse_source("entry: halt\n.start entry\n").unwrap();
        let symbols = build_symbol_table(&lines).unwrap();
        let module = generate_object(&lines, &symbols).unwrap();
        let mut machine = Machine::new();
        machine.load(&module, 0x100).unwrap();
        assert_eq!(machine.pc, 0x100);
        assert_eq!(machine.mem[0x100], 0xF000);
    }

    #[test]
    fn test_mvi_does_not_touch_flags() {
        let mut interp = machine_for("mvi r0, 0\ncmp r0, r0\nmvi r1, 5\nbrz yes\nhalt\nyes: mvi r2, 1\nhalt\n");
        run_to_halt(&mut interp);
        assert_eq!(interp.machine.regs[2], 1);
    }
}
