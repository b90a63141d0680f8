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

//! Shared plumbing for the command-line tools: exit-code policy, the
//! `name.nnn` identity file, and listing output.

use crate::InterpretOutcome;
use crate::errors::LccError;
use anyhow::Result;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

pub const NAME_FILE: &str = "name.nnn";

// Exit 2 for environment failures (unreadable input, unwritable
// output), 1 for everything the toolchain itself rejects.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if let Some(LccError::IoError(_)) = cause.downcast_ref::<LccError>() {
            return 2;
        }
        if cause.downcast_ref::<io::Error>().is_some() {
            return 2;
        }
    }
    1
}

// Read the user identity from `name.nnn`, prompting once and creating
// the file when it does not exist yet.
pub fn load_user_name(interactive: bool) -> Result<String> {
    match fs::read_to_string(NAME_FILE) {
        Ok(text) => Ok(text.lines().next().unwrap_or("").trim().to_string()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if !interactive {
                return Ok(String::new());
            }
            print!("Enter name (Last, First MI): ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            let name = line.trim().to_string();
            fs::write(NAME_FILE, format!("{}\n", name))?;
            Ok(name)
        }
        Err(e) => Err(e.into()),
    }
}

// clap value parser for the `-L` load point.
pub fn parse_hex_u16(text: &str) -> Result<u16, String> {
    let digits = text
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|_| format!("invalid hex address: {}", text))
}

pub fn write_listings(exe_path: &Path, outcome: &InterpretOutcome) -> Result<()> {
    if let Some(lst) = &outcome.lst {
        fs::write(exe_path.with_extension("lst"), lst)?;
    }
    if let Some(bst) = &outcome.bst {
        fs::write(exe_path.with_extension("bst"), bst)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u16("0x100"), Ok(0x100));
        assert_eq!(parse_hex_u16("ff"), Ok(0xFF));
        assert!(parse_hex_u16("zz").is_err());
    }

    #[test]
    fn test_exit_codes() {
        let env: anyhow::Error =
            LccError::IoError(io::Error::new(ErrorKind::NotFound, "gone")).into();
        assert_eq!(exit_code(&env), 2);
        let user: anyhow::Error = LccError::RuntimeError("bad".into()).into();
        assert_eq!(exit_code(&user), 1);
    }
}
