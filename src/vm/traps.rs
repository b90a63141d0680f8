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

//! Trap service routines. The dispatcher is a trait object owned by the
//! interpreter, so an extended trap set can wrap `SystemTraps` and
//! delegate the vectors it does not handle.

use super::{MEMORY_WORDS, Machine};
use crate::errors::LccError;
use crate::isa::{self, REGISTER_NAMES};

pub enum TrapResult {
    // Keep running; the payload is the listing effect note, if any.
    Continue(Option<String>),
    Halt,
    // Input buffer is dry; the host must supply bytes and resume.
    AwaitInput,
}

pub trait TrapDispatcher {
    fn dispatch(&mut self, machine: &mut Machine, reg: u16, vec: u8)
    -> Result<TrapResult, LccError>;
}

// The standard trap table, vectors 0x00..0x0E.
pub struct SystemTraps;

impl TrapDispatcher for SystemTraps {
    fn dispatch(
        &mut self,
        machine: &mut Machine,
        reg: u16,
        vec: u8,
    ) -> Result<TrapResult, LccError> {
        let value = machine.regs[reg as usize];

        match vec {
            isa::TRAP_HALT => Ok(TrapResult::Halt),
            isa::TRAP_NL => {
                machine.write_out(b"\n");
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_DOUT => {
                machine.write_out(format!("{}", value as i16).as_bytes());
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_UDOUT => {
                machine.write_out(format!("{}", value).as_bytes());
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_HOUT => {
                machine.write_out(format!("{:04X}", value).as_bytes());
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_AOUT => {
                machine.write_out(&[value as u8]);
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_SOUT => {
                let mut bytes = Vec::new();
                let mut addr = value;
                for _ in 0..MEMORY_WORDS {
                    let byte = machine.mem[addr as usize] as u8;
                    if byte == 0 {
                        break;
                    }
                    bytes.push(byte);
                    addr = addr.wrapping_add(1);
                }
                machine.write_out(&bytes);
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_DIN => {
                let Some(line) = machine.read_input_line() else {
                    return Ok(TrapResult::AwaitInput);
                };
                let text = String::from_utf8_lossy(&line);
                let parsed = text.trim().parse::<i32>().ok().filter(|v| {
                    (i16::MIN as i32..=i16::MAX as i32).contains(v)
                });
                let Some(parsed) = parsed else {
                    return Err(LccError::RuntimeError(format!(
                        "invalid decimal: {}",
                        text.trim()
                    )));
                };
                machine.regs[reg as usize] = parsed as u16;
                Ok(TrapResult::Continue(Some(reg_note(machine, reg))))
            }
            isa::TRAP_HIN => {
                let Some(line) = machine.read_input_line() else {
                    return Ok(TrapResult::AwaitInput);
                };
                let text = String::from_utf8_lossy(&line);
                let digits = text
                    .trim()
                    .trim_start_matches("0x")
                    .trim_start_matches("0X");
                let parsed = u16::from_str_radix(digits, 16).map_err(|_| {
                    LccError::RuntimeError(format!("invalid hex number: {}", text.trim()))
                })?;
                machine.regs[reg as usize] = parsed;
                Ok(TrapResult::Continue(Some(reg_note(machine, reg))))
            }
            isa::TRAP_AIN => {
                let Some(line) = machine.read_input_line() else {
                    return Ok(TrapResult::AwaitInput);
                };
                machine.regs[reg as usize] = line.first().copied().unwrap_or(0) as u16;
                Ok(TrapResult::Continue(Some(reg_note(machine, reg))))
            }
            isa::TRAP_SIN => {
                let Some(line) = machine.read_input_line() else {
                    return Ok(TrapResult::AwaitInput);
                };
                let mut addr = value;
                for byte in &line {
                    machine.mem[addr as usize] = *byte as u16;
                    addr = addr.wrapping_add(1);
                }
                machine.mem[addr as usize] = 0;
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_M => {
                let mut dump = String::new();
                for row in 0..2 {
                    let base = value.wrapping_add(row * 8);
                    dump.push_str(&format!("{:04x}:", base));
                    for col in 0..8 {
                        let addr = base.wrapping_add(col);
                        dump.push_str(&format!(" {:04x}", machine.mem[addr as usize]));
                    }
                    dump.push('\n');
                }
                machine.write_out(dump.as_bytes());
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_R => {
                let dump = machine.register_dump();
                machine.write_out(dump.as_bytes());
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_S => {
                let sp = machine.regs[6];
                let mut dump = String::new();
                for i in 0..8 {
                    let addr = sp.wrapping_add(i);
                    dump.push_str(&format!(
                        "{:04x}: {:04x}\n",
                        addr, machine.mem[addr as usize]
                    ));
                }
                machine.write_out(dump.as_bytes());
                Ok(TrapResult::Continue(None))
            }
            isa::TRAP_BP => {
                // Breakpoints only pause when someone is at the keyboard.
                if machine.interactive {
                    machine.write_out(b"bp (press enter to continue)\n");
                    let mut line = String::new();
                    let _ = std::io::stdin().read_line(&mut line);
                }
                Ok(TrapResult::Continue(None))
            }
            other => Err(LccError::RuntimeError(format!(
                "invalid trap vector 0x{:02x}",
                other
            ))),
        }
    }
}

fn reg_note(machine: &Machine, reg: u16) -> String {
    format!(
        "{} = {:04x}",
        REGISTER_NAMES[reg as usize], machine.regs[reg as usize]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(machine: &mut Machine, reg: u16, vec: u8) -> Result<TrapResult, LccError> {
        SystemTraps.dispatch(machine, reg, vec)
    }

    #[test]
    fn test_dout_signed() {
        let mut machine = Machine::new();
        machine.regs[0] = 0x8000;
        dispatch(&mut machine, 0, isa::TRAP_DOUT).unwrap();
        assert_eq!(machine.output(), b"-32768");
    }

    #[test]
    fn test_hout_width() {
        let mut machine = Machine::new();
        machine.regs[1] = 0xB;
        dispatch(&mut machine, 1, isa::TRAP_HOUT).unwrap();
        assert_eq!(machine.output(), b"000B");
    }

    #[test]
    fn test_sout_reads_low_bytes() {
        let mut machine = Machine::new();
        machine.mem[10] = b'h' as u16;
        machine.mem[11] = b'i' as u16;
        machine.mem[12] = 0;
        machine.regs[2] = 10;
        dispatch(&mut machine, 2, isa::TRAP_SOUT).unwrap();
        assert_eq!(machine.output(), b"hi");
    }

    #[test]
    fn test_din_starved_buffer_suspends() {
        let mut machine = Machine::new();
        let result = dispatch(&mut machine, 0, isa::TRAP_DIN).unwrap();
        assert!(matches!(result, TrapResult::AwaitInput));
    }

    #[test]
    fn test_din_range_check() {
        let mut machine = Machine::new();
        machine.push_input(b"70000\n");
        assert!(dispatch(&mut machine, 0, isa::TRAP_DIN).is_err());
    }

    #[test]
    fn test_hin_accepts_prefix() {
        let mut machine = Machine::new();
        machine.push_input(b"0x1A\n");
        dispatch(&mut machine, 3, isa::TRAP_HIN).unwrap();
        assert_eq!(machine.regs[3], 0x1A);
    }

    #[test]
    fn test_unknown_vector() {
        let mut machine = Machine::new();
        assert!(dispatch(&mut machine, 0, 0x42).is_err());
    }
}
