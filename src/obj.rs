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

//! The object/executable container: a one-byte `'o'` magic, a run of
//! tagged header entries, a `'C'` terminator, then the code section as
//! little-endian 16-bit words. Objects may carry unresolved `E`/`e`/`V`
//! references; executables carry only `S`/`G`/`A` entries.

use crate::errors::LccError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

pub const MAGIC: u8 = b'o';
const TERMINATOR: u8 = b'C';

// Width of the slot an external reference patches into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RefSlot {
    Pc11,  // 'E': bl call slot
    Pc9,   // 'e': br/ld/st/lea slot
    Abs16, // 'V': full-word .word slot
}

impl RefSlot {
    pub fn bits(self) -> u32 {
        match self {
            RefSlot::Pc11 => 11,
            RefSlot::Pc9 => 9,
            RefSlot::Abs16 => 16,
        }
    }

    fn tag(self) -> u8 {
        match self {
            RefSlot::Pc11 => b'E',
            RefSlot::Pc9 => b'e',
            RefSlot::Abs16 => b'V',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderEntry {
    // 'S': module start address; at most one per module.
    Start(u16),
    // 'G': global definition of `label` at `addr`.
    Global { addr: u16, label: String },
    // 'E'/'e'/'V': unresolved reference to `label` patched at `addr`.
    Extern {
        addr: u16,
        label: String,
        slot: RefSlot,
    },
    // 'A': word at `addr` holds a module-relative address.
    Local(u16),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectModule {
    pub entries: Vec<HeaderEntry>,
    pub code: Vec<u16>,
}

impl ObjectModule {
    pub fn start(&self) -> Option<u16> {
        self.entries.iter().find_map(|e| match e {
            HeaderEntry::Start(addr) => Some(*addr),
            _ => None,
        })
    }

    pub fn has_unresolved(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, HeaderEntry::Extern { .. }))
    }

    // An object file needs the linker when it exports or imports
    // symbols; otherwise it is already a complete executable.
    pub fn needs_linking(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, HeaderEntry::Extern { .. } | HeaderEntry::Global { .. }))
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<ObjectModule, LccError> {
        let magic = read_u8(reader)?.ok_or_else(|| LccError::FormatError("empty file".into()))?;
        if magic != MAGIC {
            return Err(LccError::FormatError(format!(
                "bad magic byte 0x{:02x}, expected 'o'",
                magic
            )));
        }

        let mut entries = Vec::new();
        loop {
            let tag = read_u8(reader)?.ok_or_else(|| {
                LccError::FormatError("header not terminated with 'C'".into())
            })?;
            match tag {
                TERMINATOR => break,
                b'S' => entries.push(HeaderEntry::Start(read_addr(reader)?)),
                b'G' => entries.push(HeaderEntry::Global {
                    addr: read_addr(reader)?,
                    label: read_label(reader)?,
                }),
                b'E' => entries.push(HeaderEntry::Extern {
                    addr: read_addr(reader)?,
                    label: read_label(reader)?,
                    slot: RefSlot::Pc11,
                }),
                b'e' => entries.push(HeaderEntry::Extern {
                    addr: read_addr(reader)?,
                    label: read_label(reader)?,
                    slot: RefSlot::Pc9,
                }),
                b'V' => entries.push(HeaderEntry::Extern {
                    addr: read_addr(reader)?,
                    label: read_label(reader)?,
                    slot: RefSlot::Abs16,
                }),
                b'A' => entries.push(HeaderEntry::Local(read_addr(reader)?)),
                other => {
                    return Err(LccError::FormatError(format!(
                        "unknown header tag 0x{:02x}",
                        other
                    )));
                }
            }
        }

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest)?;
        if rest.len() % 2 != 0 {
            return Err(LccError::FormatError(
                "code section has an odd number of bytes".into(),
            ));
        }
        let code = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(ObjectModule { entries, code })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u8(MAGIC)?;
        for entry in &self.entries {
            match entry {
                HeaderEntry::Start(addr) => {
                    writer.write_u8(b'S')?;
                    writer.write_u16::<LittleEndian>(*addr)?;
                }
                HeaderEntry::Global { addr, label } => {
                    writer.write_u8(b'G')?;
                    writer.write_u16::<LittleEndian>(*addr)?;
                    write_label(writer, label)?;
                }
                HeaderEntry::Extern { addr, label, slot } => {
                    writer.write_u8(slot.tag())?;
                    writer.write_u16::<LittleEndian>(*addr)?;
                    write_label(writer, label)?;
                }
                HeaderEntry::Local(addr) => {
                    writer.write_u8(b'A')?;
                    writer.write_u16::<LittleEndian>(*addr)?;
                }
            }
        }
        writer.write_u8(TERMINATOR)?;
        for word in &self.code {
            writer.write_u16::<LittleEndian>(*word)?;
        }
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ObjectModule, LccError> {
        let mut cursor = bytes;
        ObjectModule::read(&mut cursor)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out)
            .expect("writing to a Vec cannot fail");
        out
    }
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<ObjectModule, LccError> {
    ObjectModule::read(&mut BufReader::new(File::open(path)?))
}

pub fn write_file<P: AsRef<Path>>(path: P, module: &ObjectModule) -> Result<(), LccError> {
    let mut writer = BufWriter::new(File::create(path)?);
    module.write(&mut writer)?;
    Ok(())
}

// Returns None at clean EOF so the caller can tell truncation apart
// from the end of the entry stream.
fn read_u8<R: Read>(reader: &mut R) -> Result<Option<u8>, LccError> {
    match reader.read_u8() {
        Ok(byte) => Ok(Some(byte)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_addr<R: Read>(reader: &mut R) -> Result<u16, LccError> {
    reader.read_u16::<LittleEndian>().map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            LccError::FormatError("truncated header entry".into())
        } else {
            e.into()
        }
    })
}

fn read_label<R: Read>(reader: &mut R) -> Result<String, LccError> {
    let mut bytes = Vec::new();
    loop {
        match read_u8(reader)? {
            Some(0) => break,
            Some(b) => bytes.push(b),
            None => {
                return Err(LccError::FormatError(
                    "unterminated label in header entry".into(),
                ));
            }
        }
    }
    String::from_utf8(bytes)
        .map_err(|_| LccError::FormatError("label is not valid ASCII".into()))
}

fn write_label<W: Write>(writer: &mut W, label: &str) -> std::io::Result<()> {
    writer.write_all(label.as_bytes())?;
    writer.write_u8(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObjectModule {
        ObjectModule {
            entries: vec![
                HeaderEntry::Start(0),
                HeaderEntry::Global {
                    addr: 2,
                    label: "main".to_string(),
                },
                HeaderEntry::Extern {
                    addr: 0,
                    label: "sub".to_string(),
                    slot: RefSlot::Pc11,
                },
                HeaderEntry::Local(5),
            ],
            code: vec![0x4800, 0xD005, 0xF000],
        }
    }

    #[test]
    fn test_round_trip_bytes() {
        let module = sample();
        let bytes = module.to_bytes();
        assert_eq!(ObjectModule::from_bytes(&bytes).unwrap(), module);
    }

    #[test]
    fn test_layout_is_bit_exact() {
        let module = ObjectModule {
            entries: vec![
                HeaderEntry::Start(0x0102),
                HeaderEntry::Global {
                    addr: 3,
                    label: "x".to_string(),
                },
            ],
            code: vec![0xBEEF],
        };
        assert_eq!(
            module.to_bytes(),
            vec![
                b'o', b'S', 0x02, 0x01, b'G', 0x03, 0x00, b'x', 0x00, b'C', 0xEF, 0xBE
            ]
        );
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            ObjectModule::from_bytes(b"x"),
            Err(LccError::FormatError(_))
        ));
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(
            ObjectModule::from_bytes(b"oQ\x00\x00C"),
            Err(LccError::FormatError(_))
        ));
    }

    #[test]
    fn test_missing_terminator() {
        assert!(matches!(
            ObjectModule::from_bytes(b"oS\x00\x00"),
            Err(LccError::FormatError(_))
        ));
    }

    #[test]
    fn test_odd_code_bytes() {
        assert!(matches!(
            ObjectModule::from_bytes(b"oC\x01"),
            Err(LccError::FormatError(_))
        ));
    }

    #[test]
    fn test_needs_linking() {
        assert!(sample().needs_linking());
        let exe = ObjectModule {
            entries: vec![HeaderEntry::Start(0), HeaderEntry::Local(1)],
            code: vec![0, 0],
        };
        assert!(!exe.needs_linking());
        assert!(!exe.has_unresolved());
    }
}
