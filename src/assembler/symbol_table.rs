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

use crate::errors::LccError;
use std::collections::HashMap;

// Labels, their module-relative addresses, and the global/extern marks
// collected during pass 1. Global and extern lists keep source order so
// header entries come out deterministically.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, u16>,
    globals: Vec<(String, usize)>,
    externs: Vec<(String, usize)>,
}

impl SymbolTable {
    pub fn define(&mut self, label: &str, addr: u16, line: usize) -> Result<(), LccError> {
        if self.symbols.contains_key(label) {
            return Err(LccError::AsmError {
                line,
                reason: format!("Duplicate label definition: {}", label),
            });
        }
        self.symbols.insert(label.to_string(), addr);
        Ok(())
    }

    pub fn mark_global(&mut self, label: &str, line: usize) -> Result<(), LccError> {
        if self.globals.iter().any(|(name, _)| name == label) {
            return Err(LccError::AsmError {
                line,
                reason: format!("Duplicate .global directive for: {}", label),
            });
        }
        self.globals.push((label.to_string(), line));
        Ok(())
    }

    pub fn mark_extern(&mut self, label: &str, line: usize) -> Result<(), LccError> {
        if self.externs.iter().any(|(name, _)| name == label) {
            return Err(LccError::AsmError {
                line,
                reason: format!("Duplicate .extern directive for: {}", label),
            });
        }
        self.externs.push((label.to_string(), line));
        Ok(())
    }

    pub fn lookup(&self, label: &str) -> Option<u16> {
        self.symbols.get(label).copied()
    }

    pub fn is_extern(&self, label: &str) -> bool {
        self.externs.iter().any(|(name, _)| name == label)
    }

    pub fn globals(&self) -> impl Iterator<Item = &str> {
        self.globals.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_marks(&self) -> bool {
        !self.globals.is_empty() || !self.externs.is_empty()
    }

    // Cross-checks run once pass 1 has seen the whole module.
    pub fn validate(&self) -> Result<(), LccError> {
        for (name, line) in &self.globals {
            if !self.symbols.contains_key(name) {
                return Err(LccError::AsmError {
                    line: *line,
                    reason: format!(".global names an undefined label: {}", name),
                });
            }
            if self.is_extern(name) {
                return Err(LccError::AsmError {
                    line: *line,
                    reason: format!("Label is both .global and .extern: {}", name),
                });
            }
        }
        for (name, line) in &self.externs {
            if self.symbols.contains_key(name) {
                return Err(LccError::AsmError {
                    line: *line,
                    reason: format!(".extern label is defined in this module: {}", name),
                });
            }
        }
        Ok(())
    }
}
