use thiserror::Error;

use crate::entry_point::ExecutionModel;

/// Errors produced while parsing or rewriting a SPIR-V module.
///
/// Every variant describes the offending location so the diagnostic can be forwarded to
/// callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpirvError {
    #[error("SPIR-V binary length {len} is not a multiple of 4 bytes")]
    UnalignedLength { len: usize },
    #[error("SPIR-V binary is truncated: header needs 5 words, got {words}")]
    TruncatedHeader { words: usize },
    #[error("SPIR-V binary has {words} words, more than the supported {max}")]
    TooLarge { words: usize, max: usize },
    #[error("bad SPIR-V magic 0x{found:08x}, expected 0x07230203")]
    BadMagic { found: u32 },
    #[error("instruction at word {offset} has a zero word count")]
    ZeroWordCount { offset: usize },
    #[error(
        "instruction at word {offset} (opcode {opcode}) declares {word_count} words \
         but only {remaining} remain"
    )]
    TruncatedInstruction {
        offset: usize,
        opcode: u16,
        word_count: usize,
        remaining: usize,
    },
    #[error("instruction {index} (opcode {opcode}) is malformed: {message}")]
    MalformedInstruction {
        index: usize,
        opcode: u16,
        message: String,
    },
    #[error("SPIR-V module declares no entry points")]
    NoEntryPoints,
    #[error("no {model} entry point named {name:?} (module declares: {available})")]
    EntryPointNotFound {
        model: ExecutionModel,
        name: String,
        available: String,
    },
    #[error("SPIR-V id bound overflow")]
    IdBoundOverflow,
}

impl SpirvError {
    pub(crate) fn malformed(index: usize, opcode: u16, message: impl Into<String>) -> Self {
        SpirvError::MalformedInstruction {
            index,
            opcode,
            message: message.into(),
        }
    }
}
