use core::fmt;

use crate::error::SpirvError;
use crate::module::{decode_string, encode_string, Instruction};
use crate::opcode::op;

/// SPIR-V `ExecutionModel` operand of `OpEntryPoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionModel {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    GLCompute,
    Kernel,
    /// Execution models outside the graphics/compute core (ray tracing, mesh, ...).
    Other(u32),
}

impl ExecutionModel {
    pub fn from_word(word: u32) -> Self {
        match word {
            0 => Self::Vertex,
            1 => Self::TessellationControl,
            2 => Self::TessellationEvaluation,
            3 => Self::Geometry,
            4 => Self::Fragment,
            5 => Self::GLCompute,
            6 => Self::Kernel,
            other => Self::Other(other),
        }
    }

    pub fn to_word(self) -> u32 {
        match self {
            Self::Vertex => 0,
            Self::TessellationControl => 1,
            Self::TessellationEvaluation => 2,
            Self::Geometry => 3,
            Self::Fragment => 4,
            Self::GLCompute => 5,
            Self::Kernel => 6,
            Self::Other(word) => word,
        }
    }
}

impl fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("Vertex"),
            Self::TessellationControl => f.write_str("TessellationControl"),
            Self::TessellationEvaluation => f.write_str("TessellationEvaluation"),
            Self::Geometry => f.write_str("Geometry"),
            Self::Fragment => f.write_str("Fragment"),
            Self::GLCompute => f.write_str("GLCompute"),
            Self::Kernel => f.write_str("Kernel"),
            Self::Other(word) => write!(f, "ExecutionModel({word})"),
        }
    }
}

/// Decoded `OpEntryPoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub model: ExecutionModel,
    /// Result id of the `OpFunction` implementing the entry point.
    pub function: u32,
    pub name: String,
    /// Ids of the global variables in the entry point's interface.
    pub interface: Vec<u32>,
}

impl EntryPoint {
    /// Decodes an `OpEntryPoint` instruction. `index` is only used for diagnostics.
    pub fn decode(inst: &Instruction, index: usize) -> Result<Self, SpirvError> {
        if inst.opcode != op::ENTRY_POINT {
            return Err(SpirvError::malformed(
                index,
                inst.opcode,
                "expected OpEntryPoint",
            ));
        }
        let [model, function, rest @ ..] = inst.operands.as_slice() else {
            return Err(SpirvError::malformed(
                index,
                inst.opcode,
                "OpEntryPoint needs an execution model, a function id and a name",
            ));
        };
        let (name, name_words) = decode_string(rest).ok_or_else(|| {
            let reason = "entry point name is not a terminated UTF-8 string";
            SpirvError::malformed(index, inst.opcode, reason)
        })?;
        Ok(EntryPoint {
            model: ExecutionModel::from_word(*model),
            function: *function,
            name,
            interface: rest[name_words..].to_vec(),
        })
    }

    pub fn encode(&self) -> Instruction {
        let mut operands = vec![self.model.to_word(), self.function];
        operands.extend(encode_string(&self.name));
        operands.extend_from_slice(&self.interface);
        Instruction::new(op::ENTRY_POINT, operands)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.model, self.name)
    }
}
