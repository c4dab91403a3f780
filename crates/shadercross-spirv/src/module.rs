use std::collections::HashMap;

use crate::entry_point::EntryPoint;
use crate::error::SpirvError;
use crate::opcode::op;

pub const SPIRV_MAGIC: u32 = 0x0723_0203;
/// Magic, version, generator, id bound, schema.
pub const HEADER_WORDS: usize = 5;
// Real shaders are far below this; the cap keeps hostile inputs from allocating unbounded
// instruction vectors.
const MAX_MODULE_WORDS: usize = 16 * 1024 * 1024;

/// The fixed five-word SPIR-V header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub generator: u32,
    /// Every id in the module is strictly below this value.
    pub bound: u32,
    pub schema: u32,
}

impl Header {
    pub fn version_major_minor(&self) -> (u8, u8) {
        (((self.version >> 16) & 0xFF) as u8, ((self.version >> 8) & 0xFF) as u8)
    }
}

/// One instruction: opcode plus every word that follows the opcode word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u16,
    pub operands: Vec<u32>,
}

impl Instruction {
    pub fn new(opcode: u16, operands: Vec<u32>) -> Self {
        Self { opcode, operands }
    }

    pub fn word_count(&self) -> usize {
        1 + self.operands.len()
    }

    pub fn operand(&self, index: usize) -> Option<u32> {
        self.operands.get(index).copied()
    }

    /// Result id for the opcodes this crate inspects; `None` for everything else.
    pub fn result_id(&self) -> Option<u32> {
        match self.opcode {
            op::EXT_INST_IMPORT | op::STRING | op::LABEL => self.operand(0),
            op::TYPE_VOID..=op::TYPE_PIPE => self.operand(0),
            op::UNDEF
            | op::CONSTANT_TRUE..=op::CONSTANT_NULL
            | op::SPEC_CONSTANT_TRUE..=op::SPEC_CONSTANT_OP
            | op::FUNCTION
            | op::FUNCTION_PARAMETER
            | op::FUNCTION_CALL
            | op::VARIABLE
            | op::LOAD
            | op::ACCESS_CHAIN
            | op::IN_BOUNDS_ACCESS_CHAIN
            | op::COMPOSITE_CONSTRUCT
            | op::COMPOSITE_EXTRACT
            | op::SAMPLED_IMAGE
            | op::IMAGE_SAMPLE_IMPLICIT_LOD
            | op::IMAGE_FETCH
            | op::IMAGE
            | op::IMAGE_QUERY_SIZE_LOD..=op::IMAGE_QUERY_SAMPLES
            | op::MATRIX_TIMES_VECTOR => self.operand(1),
            _ => None,
        }
    }
}

/// A parsed SPIR-V module.
///
/// The module is kept as a flat instruction list; passes rewrite it in place and
/// [`SpirvModule::to_words`] re-serializes it with an up-to-date header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpirvModule {
    header: Header,
    instructions: Vec<Instruction>,
}

impl SpirvModule {
    /// Parses a SPIR-V binary from bytes.
    ///
    /// Input is untrusted: every length is checked and malformed data yields an error, never a
    /// panic. Big-endian modules (byte-swapped magic) are accepted and normalized.
    pub fn parse(bytes: &[u8]) -> Result<Self, SpirvError> {
        if bytes.len() % 4 != 0 {
            return Err(SpirvError::UnalignedLength { len: bytes.len() });
        }
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_words(&words)
    }

    pub fn from_words(words: &[u32]) -> Result<Self, SpirvError> {
        if words.len() < HEADER_WORDS {
            return Err(SpirvError::TruncatedHeader { words: words.len() });
        }
        if words.len() > MAX_MODULE_WORDS {
            return Err(SpirvError::TooLarge {
                words: words.len(),
                max: MAX_MODULE_WORDS,
            });
        }

        let swapped;
        let words = match words[0] {
            SPIRV_MAGIC => words,
            magic if magic == SPIRV_MAGIC.swap_bytes() => {
                swapped = words.iter().map(|w| w.swap_bytes()).collect::<Vec<_>>();
                swapped.as_slice()
            }
            found => return Err(SpirvError::BadMagic { found }),
        };

        let header = Header {
            version: words[1],
            generator: words[2],
            bound: words[3],
            schema: words[4],
        };

        let mut instructions = Vec::new();
        let mut offset = HEADER_WORDS;
        while offset < words.len() {
            let first = words[offset];
            let word_count = (first >> 16) as usize;
            let opcode = (first & 0xFFFF) as u16;
            if word_count == 0 {
                return Err(SpirvError::ZeroWordCount { offset });
            }
            let remaining = words.len() - offset;
            if word_count > remaining {
                return Err(SpirvError::TruncatedInstruction {
                    offset,
                    opcode,
                    word_count,
                    remaining,
                });
            }
            instructions.push(Instruction::new(
                opcode,
                words[offset + 1..offset + word_count].to_vec(),
            ));
            offset += word_count;
        }

        let module = SpirvModule {
            header,
            instructions,
        };
        let mut entry_points = 0usize;
        for (index, inst) in module.instructions.iter().enumerate() {
            if inst.opcode == op::ENTRY_POINT {
                EntryPoint::decode(inst, index)?;
                entry_points += 1;
            }
        }
        if entry_points == 0 {
            return Err(SpirvError::NoEntryPoints);
        }
        Ok(module)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.instructions
    }

    pub fn to_words(&self) -> Vec<u32> {
        let body: usize = self.instructions.iter().map(Instruction::word_count).sum();
        let mut words = Vec::with_capacity(HEADER_WORDS + body);
        words.extend_from_slice(&[
            SPIRV_MAGIC,
            self.header.version,
            self.header.generator,
            self.header.bound,
            self.header.schema,
        ]);
        for inst in &self.instructions {
            words.push(((inst.word_count() as u32) << 16) | u32::from(inst.opcode));
            words.extend_from_slice(&inst.operands);
        }
        words
    }

    /// Little-endian byte serialization, the layout [`SpirvModule::parse`] reads back.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words()
            .into_iter()
            .flat_map(u32::to_le_bytes)
            .collect()
    }

    /// Reserves a fresh id by bumping the header's id bound.
    pub fn allocate_id(&mut self) -> Result<u32, SpirvError> {
        let id = self.header.bound;
        self.header.bound = id.checked_add(1).ok_or(SpirvError::IdBoundOverflow)?;
        Ok(id)
    }

    pub fn entry_points(&self) -> Vec<EntryPoint> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.opcode == op::ENTRY_POINT)
            .filter_map(|(index, inst)| EntryPoint::decode(inst, index).ok())
            .collect()
    }

    /// Renames every `OpEntryPoint` implemented by `function` and returns how many were renamed.
    pub fn rename_entry_point(&mut self, function: u32, name: &str) -> usize {
        let mut renamed = 0;
        for (index, inst) in self.instructions.iter_mut().enumerate() {
            if inst.opcode != op::ENTRY_POINT || inst.operand(1) != Some(function) {
                continue;
            }
            if let Ok(mut ep) = EntryPoint::decode(inst, index) {
                ep.name = name.to_owned();
                *inst = ep.encode();
                renamed += 1;
            }
        }
        renamed
    }

    /// Index of the defining instruction for every result id this crate understands.
    pub fn definitions(&self) -> HashMap<u32, usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter_map(|(index, inst)| inst.result_id().map(|id| (id, index)))
            .collect()
    }

    pub fn debug_name(&self, id: u32) -> Option<String> {
        self.instructions
            .iter()
            .filter(|inst| inst.opcode == op::NAME && inst.operand(0) == Some(id))
            .find_map(|inst| decode_string(&inst.operands[1..]).map(|(name, _)| name))
    }

    /// Literal operands of every `OpDecorate` of `decoration` applied to `target`.
    pub fn decorations<'a>(
        &'a self,
        target: u32,
        decoration: u32,
    ) -> impl Iterator<Item = &'a [u32]> + 'a {
        self.instructions.iter().filter_map(move |inst| {
            match inst.operands.as_slice() {
                [t, d, literals @ ..]
                    if inst.opcode == op::DECORATE && *t == target && *d == decoration =>
                {
                    Some(literals)
                }
                _ => None,
            }
        })
    }

    /// First literal of the first matching decoration, e.g. a `Location` or `Binding`.
    pub fn decoration_literal(&self, target: u32, decoration: u32) -> Option<u32> {
        self.decorations(target, decoration)
            .find_map(|literals| literals.first().copied())
    }

    /// Index of the first `OpFunction`; everything before it is module-level.
    pub(crate) fn first_function_index(&self) -> usize {
        self.instructions
            .iter()
            .position(|inst| inst.opcode == op::FUNCTION)
            .unwrap_or(self.instructions.len())
    }
}

/// Decodes a nul-terminated literal string.
///
/// Returns the string and the number of words it occupied (padding included).
pub fn decode_string(words: &[u32]) -> Option<(String, usize)> {
    let mut bytes = Vec::new();
    for (i, word) in words.iter().enumerate() {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                return String::from_utf8(bytes).ok().map(|s| (s, i + 1));
            }
            bytes.push(byte);
        }
    }
    None
}

/// Encodes a literal string with its nul terminator and zero padding.
pub fn encode_string(s: &str) -> Vec<u32> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn string_literals_pad_to_word_boundary() {
        assert_eq!(encode_string("main").len(), 2);
        assert_eq!(encode_string("abc").len(), 1);
        assert_eq!(encode_string("").len(), 1);

        let words = encode_string("PixelMain");
        assert_eq!(decode_string(&words), Some(("PixelMain".to_owned(), words.len())));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let words = [u32::from_le_bytes(*b"abcd")];
        assert_eq!(decode_string(&words), None);
    }

    #[test]
    fn header_version_splits_major_minor() {
        let header = Header {
            version: 0x0001_0300,
            generator: 0,
            bound: 1,
            schema: 0,
        };
        assert_eq!(header.version_major_minor(), (1, 3));
    }
}
