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

//! Execution trace listings. `.lst` renders the instruction word as
//! hex, `.bst` as grouped binary; everything else is shared. Golden
//! comparisons go through `normalize`, so exact column widths are
//! cosmetic.

use super::Machine;
use crate::errors::LccError;

// One executed instruction: where it was fetched, its raw word, the
// disassembly, and the register/flag effect worth showing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub addr: u16,
    pub word: u16,
    pub text: String,
    pub effect: Option<String>,
}

pub struct ListingInfo<'a> {
    pub source_name: &'a str,
    pub user_name: &'a str,
    pub machine: &'a Machine,
    pub executed: u64,
    pub error: Option<&'a LccError>,
}

pub fn render_lst(rows: &[ListingRow], info: &ListingInfo) -> String {
    render(rows, info, false)
}

pub fn render_bst(rows: &[ListingRow], info: &ListingInfo) -> String {
    render(rows, info, true)
}

fn render(rows: &[ListingRow], info: &ListingInfo, binary: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Input file name = {}\n", info.source_name));
    out.push_str(info.user_name);
    out.push('\n');
    out.push('\n');

    for row in rows {
        let code = if binary {
            binary_word(row.word)
        } else {
            format!("{:04x}", row.word)
        };
        match &row.effect {
            Some(effect) => {
                out.push_str(&format!(
                    "{:04x}  {}  {:<24}{}\n",
                    row.addr, code, row.text, effect
                ));
            }
            None => {
                out.push_str(&format!("{:04x}  {}  {}\n", row.addr, code, row.text));
            }
        }
    }

    out.push('\n');
    out.push_str("==================== Final state ====================\n");
    out.push_str(&info.machine.register_dump());
    out.push_str(&info.machine.flag_dump());
    out.push('\n');
    out.push_str(&format!("Instructions executed: {}\n", info.executed));
    out.push_str(&format!("Memory words used: {}\n", info.machine.code_words()));
    if let Some(error) = info.error {
        out.push_str(&format!("{}\n", error));
    }
    out
}

fn binary_word(word: u16) -> String {
    format!(
        "{:04b} {:04b} {:04b} {:04b}",
        (word >> 12) & 0xF,
        (word >> 8) & 0xF,
        (word >> 4) & 0xF,
        word & 0xF
    )
}

// The golden-file equivalence rule: strip comments, collapse runs of
// whitespace, lowercase, and drop the header lines that carry file
// names or assembler banners.
pub fn normalize(text: &str) -> String {
    text.lines()
        .filter_map(|line| {
            let line = line.split(';').next().unwrap_or("");
            let trimmed = line.trim_start();
            if trimmed.starts_with("Input file name =") || trimmed.starts_with("LCC Assemble") {
                return None;
            }
            let collapsed = line
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            if collapsed.is_empty() {
                None
            } else {
                Some(collapsed)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<ListingRow> {
        vec![
            ListingRow {
                addr: 0,
                word: 0xD005,
                text: "mvi r0, 5".to_string(),
                effect: Some("r0 = 0005".to_string()),
            },
            ListingRow {
                addr: 1,
                word: 0xF000,
                text: "halt".to_string(),
                effect: None,
            },
        ]
    }

    #[test]
    fn test_lst_layout() {
        let machine = Machine::new();
        let info = ListingInfo {
            source_name: "demo.e",
            user_name: "Doe, John J",
            machine: &machine,
            executed: 2,
            error: None,
        };
        let lst = render_lst(&sample_rows(), &info);
        assert!(lst.starts_with("Input file name = demo.e\nDoe, John J\n"));
        assert!(lst.contains("0000  d005  mvi r0, 5               r0 = 0005\n"));
        assert!(lst.contains("0001  f000  halt\n"));
        assert!(lst.contains("Instructions executed: 2\n"));
    }

    #[test]
    fn test_bst_groups_binary() {
        let machine = Machine::new();
        let info = ListingInfo {
            source_name: "demo.e",
            user_name: "Doe, John J",
            machine: &machine,
            executed: 2,
            error: None,
        };
        let bst = render_bst(&sample_rows(), &info);
        assert!(bst.contains("1101 0000 0000 0101"));
        assert!(bst.contains("1111 0000 0000 0000"));
    }

    #[test]
    fn test_error_appended() {
        let machine = Machine::new();
        let error = LccError::RuntimeError("Floating point exception".into());
        let info = ListingInfo {
            source_name: "demo.e",
            user_name: "Doe, John J",
            machine: &machine,
            executed: 1,
            error: Some(&error),
        };
        let lst = render_lst(&sample_rows(), &info);
        assert!(lst.contains("Runtime Error: Floating point exception"));
    }

    #[test]
    fn test_normalize_rules() {
        let text = "Input file name = x.e\nLCC Assemble v1\nMVI  r0,   5 ; set up\n\n  HALT\n";
        assert_eq!(normalize(text), "mvi r0, 5\nhalt");
    }
}
