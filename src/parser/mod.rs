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

mod ast_builder;

use crate::ast::AssemblyLine;
use crate::errors::LccError;
use pest::Parser;
use pest_derive::Parser;

// Derive the parser from our grammar file.
#[derive(Parser)]
#[grammar = "./grammar.pest"]
pub struct LccParser;

// Main parsing function that takes the entire source code string.
pub fn parse_source(source: &str) -> Result<Vec<AssemblyLine>, LccError> {
    let pairs = LccParser::parse(Rule::program, source)
        .map_err(|e| LccError::PestError(Box::new(e)))?;
    let mut ast = Vec::new();

    for line_pair in pairs
        .flatten()
        .filter(|p| p.as_rule() == Rule::line_content)
    {
        let mut assembly_line = AssemblyLine {
            line_number: line_pair.as_span().start_pos().line_col().0,
            ..AssemblyLine::default()
        };

        for part in line_pair.into_inner() {
            match part.as_rule() {
                Rule::label => {
                    assembly_line.label = Some(
                        part.into_inner()
                            .next()
                            .expect("label always wraps an ident")
                            .as_str()
                            .to_string(),
                    );
                }
                Rule::instruction => {
                    assembly_line.instruction = Some(ast_builder::build_instruction(part)?);
                }
                Rule::directive => {
                    assembly_line.directive = Some(ast_builder::build_directive(part)?);
                }
                _ => {}
            }
        }

        ast.push(assembly_line);
    }

    Ok(ast)
}

// ------------- unit tests -------------
