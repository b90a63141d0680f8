use thiserror::Error;

#[derive(Error, Debug)]
pub enum LccError {
    #[error("Syntax Error: {0}")]
    PestError(#[from] Box<pest::error::Error<crate::parser::Rule>>),

    #[error("Syntax Error on line {line}: {reason}")]
    SyntaxError { line: usize, reason: String },

    #[error("Assembly Error on line {line}: {reason}")]
    AsmError { line: usize, reason: String },

    #[error("Range Error on line {line}: {what} does not fit in a signed {bits}-bit field")]
    RangeError { line: usize, what: String, bits: u32 },

    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("Multiple entry points")]
    MultipleEntryPoints,

    #[error("Format Error: {0}")]
    FormatError(String),

    #[error("Runtime Error: {0}")]
    RuntimeError(String),

    #[error("Possible infinite loop: {0} instructions executed without halt")]
    PossibleInfiniteLoop(u64),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
