//! Texture/sampler pairing at the SPIR-V level.
//!
//! Texel fetches and size queries read a separate texture without naming a sampler. Targets
//! that only know combined `sampler*` objects need a sampler for every texture access, so
//! [`pair_samplerless_reads`] routes each such read through an `OpSampledImage` with a sampler:
//! the one the texture is already sampled with, or a dummy sampler added to the module.

use std::collections::HashMap;

use tracing::debug;

use crate::error::SpirvError;
use crate::module::{encode_string, Instruction, SpirvModule};
use crate::opcode::{dim, op, storage_class};
use crate::types::{TypeInfo, TypeTable};

/// Debug name given to the synthesized sampler variable.
pub const DUMMY_SAMPLER_NAME: &str = "dummy_sampler";

/// A texture variable combined with a sampler variable by an `OpSampledImage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerPair {
    pub image: u32,
    pub sampler: u32,
}

/// Outcome of [`pair_samplerless_reads`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplerlessReads {
    /// Variable id of the synthesized sampler, if any texture had no sampler of its own.
    pub dummy_sampler: Option<u32>,
    /// Instructions that now read their texture through a sampler.
    pub rewritten: usize,
}

/// Every distinct (texture variable, sampler variable) pair combined by an `OpSampledImage`, in
/// first-use order. Operands that do not trace back to global variables are skipped.
pub fn sampler_pairs(module: &SpirvModule) -> Vec<SamplerPair> {
    let definitions = module.definitions();
    let first_function = module.first_function_index();
    let mut pairs = Vec::new();
    for inst in &module.instructions()[first_function..] {
        if inst.opcode != op::SAMPLED_IMAGE {
            continue;
        }
        let (Some(image), Some(sampler)) = (inst.operand(2), inst.operand(3)) else {
            continue;
        };
        let (Some(image), Some(sampler)) = (
            backing_variable(module, &definitions, image),
            backing_variable(module, &definitions, sampler),
        ) else {
            continue;
        };
        let pair = SamplerPair { image, sampler };
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }
    pairs
}

struct Site {
    index: usize,
    image_type: u32,
    sampler: Option<u32>,
}

/// Makes every texel fetch and size/level/sample query on a sampled separate texture go
/// through a sampler.
///
/// The texture's read becomes `OpLoad sampler`, `OpSampledImage`, `OpImage` feeding the original
/// instruction. The sampler is one the texture is already paired with elsewhere in the module;
/// otherwise a single dummy sampler variable (no descriptor decorations) is added and shared by
/// all such textures.
pub fn pair_samplerless_reads(module: &mut SpirvModule) -> Result<SamplerlessReads, SpirvError> {
    let types = TypeTable::build(module);
    let definitions = module.definitions();
    let first_function = module.first_function_index();
    let declared: HashMap<u32, u32> = sampler_pairs(module)
        .into_iter()
        .rev()
        .map(|pair| (pair.image, pair.sampler))
        .collect();

    let mut sites = Vec::new();
    for (index, inst) in module.instructions().iter().enumerate().skip(first_function) {
        if !matches!(
            inst.opcode,
            op::IMAGE_FETCH
                | op::IMAGE_QUERY_SIZE_LOD
                | op::IMAGE_QUERY_SIZE
                | op::IMAGE_QUERY_LEVELS
                | op::IMAGE_QUERY_SAMPLES
        ) {
            continue;
        }
        let Some(image_value) = inst.operand(2) else {
            continue;
        };
        let Some(load) = definitions
            .get(&image_value)
            .and_then(|&def| module.instructions().get(def))
            .filter(|load| load.opcode == op::LOAD)
        else {
            continue;
        };
        let Some(image_type) = load.operand(0) else {
            continue;
        };
        let Some(TypeInfo::Image { sampled: 1, dim, .. }) = types.get(image_type) else {
            continue;
        };
        if dim == dim::BUFFER || dim == dim::SUBPASS_DATA {
            continue;
        }
        let Some(variable) = backing_variable(module, &definitions, image_value) else {
            continue;
        };
        sites.push(Site {
            index,
            image_type,
            sampler: declared.get(&variable).copied(),
        });
    }
    if sites.is_empty() {
        return Ok(SamplerlessReads::default());
    }

    let mut globals: Vec<Instruction> = Vec::new();
    // (variable, sampler type) of the synthesized sampler.
    let mut dummy = None;
    if sites.iter().any(|site| site.sampler.is_none()) {
        let sampler_type = match find_type(module, op::TYPE_SAMPLER, &[]) {
            Some(id) => id,
            None => {
                let id = module.allocate_id()?;
                globals.push(Instruction::new(op::TYPE_SAMPLER, vec![id]));
                id
            }
        };
        let pointer = match types.find_pointer(storage_class::UNIFORM_CONSTANT, sampler_type) {
            Some(id) => id,
            None => {
                let id = module.allocate_id()?;
                globals.push(Instruction::new(
                    op::TYPE_POINTER,
                    vec![id, storage_class::UNIFORM_CONSTANT, sampler_type],
                ));
                id
            }
        };
        let variable = module.allocate_id()?;
        globals.push(Instruction::new(
            op::VARIABLE,
            vec![pointer, variable, storage_class::UNIFORM_CONSTANT],
        ));
        dummy = Some((variable, sampler_type));
    }

    let mut sampled_image_types: HashMap<u32, u32> = HashMap::new();
    let mut inserts: HashMap<usize, Vec<Instruction>> = HashMap::new();
    let mut replacements: HashMap<usize, u32> = HashMap::new();
    for site in &sites {
        let (sampler_variable, sampler_type) = match (site.sampler, dummy) {
            (Some(declared), _) => {
                let sampler_type = variable_pointee(module, &definitions, &types, declared)
                    .ok_or_else(|| {
                        SpirvError::malformed(
                            site.index,
                            op::SAMPLED_IMAGE,
                            "paired sampler is not a UniformConstant variable",
                        )
                    })?;
                (declared, sampler_type)
            }
            (None, Some(dummy)) => dummy,
            (None, None) => continue,
        };
        let sampled_image_type = match sampled_image_types.get(&site.image_type) {
            Some(&id) => id,
            None => {
                let id = match find_type(module, op::TYPE_SAMPLED_IMAGE, &[site.image_type]) {
                    Some(id) => id,
                    None => {
                        let id = module.allocate_id()?;
                        globals.push(Instruction::new(
                            op::TYPE_SAMPLED_IMAGE,
                            vec![id, site.image_type],
                        ));
                        id
                    }
                };
                sampled_image_types.insert(site.image_type, id);
                id
            }
        };

        let image_value = module.instructions()[site.index].operands[2];
        let sampler_value = module.allocate_id()?;
        let combined = module.allocate_id()?;
        let image = module.allocate_id()?;
        inserts.insert(
            site.index,
            vec![
                Instruction::new(op::LOAD, vec![sampler_type, sampler_value, sampler_variable]),
                Instruction::new(
                    op::SAMPLED_IMAGE,
                    vec![sampled_image_type, combined, image_value, sampler_value],
                ),
                Instruction::new(op::IMAGE, vec![site.image_type, image, combined]),
            ],
        );
        replacements.insert(site.index, image);
    }

    let dummy_sampler = dummy.map(|(variable, _)| variable);
    let name_at = debug_name_position(module);
    let old = std::mem::take(module.instructions_mut());
    let mut rewritten = Vec::with_capacity(old.len() + globals.len() + inserts.len() * 3 + 1);
    for (index, mut inst) in old.into_iter().enumerate() {
        if index == name_at {
            if let Some(variable) = dummy_sampler {
                let mut operands = vec![variable];
                operands.extend(encode_string(DUMMY_SAMPLER_NAME));
                rewritten.push(Instruction::new(op::NAME, operands));
            }
        }
        if index == first_function {
            rewritten.append(&mut globals);
        }
        if let Some(mut prefix) = inserts.remove(&index) {
            rewritten.append(&mut prefix);
        }
        if let Some(&image) = replacements.get(&index) {
            inst.operands[2] = image;
        }
        rewritten.push(inst);
    }
    *module.instructions_mut() = rewritten;

    // From SPIR-V 1.4 on, every global an entry point touches must be in its interface.
    if let Some(variable) = dummy_sampler {
        if module.header().version >= 0x0001_0400 {
            for inst in module.instructions_mut() {
                if inst.opcode == op::ENTRY_POINT {
                    inst.operands.push(variable);
                }
            }
        }
    }

    let result = SamplerlessReads {
        dummy_sampler,
        rewritten: replacements.len(),
    };
    debug!(
        dummy_sampler = ?result.dummy_sampler,
        rewritten = result.rewritten,
        "paired sampler-less texture reads"
    );
    Ok(result)
}

/// Follows loads and access chains from `value` back to the global variable it reads.
fn backing_variable(
    module: &SpirvModule,
    definitions: &HashMap<u32, usize>,
    mut value: u32,
) -> Option<u32> {
    let first_function = module.first_function_index();
    // Access chains nest at most once per array dimension.
    for _ in 0..16 {
        let def = *definitions.get(&value)?;
        let inst = module.instructions().get(def)?;
        match inst.opcode {
            op::VARIABLE if def < first_function => return inst.operand(1),
            op::LOAD | op::ACCESS_CHAIN | op::IN_BOUNDS_ACCESS_CHAIN => value = inst.operand(2)?,
            _ => return None,
        }
    }
    None
}

fn variable_pointee(
    module: &SpirvModule,
    definitions: &HashMap<u32, usize>,
    types: &TypeTable,
    variable: u32,
) -> Option<u32> {
    let inst = module.instructions().get(*definitions.get(&variable)?)?;
    if inst.opcode != op::VARIABLE {
        return None;
    }
    match types.pointee(inst.operand(0)?)? {
        (storage_class::UNIFORM_CONSTANT, pointee) => Some(types.element(pointee)),
        _ => None,
    }
}

/// Result id of an existing type declaration with exactly these operands after the result id.
fn find_type(module: &SpirvModule, opcode: u16, operands: &[u32]) -> Option<u32> {
    module
        .instructions()
        .iter()
        .find(|inst| inst.opcode == opcode && inst.operands.get(1..) == Some(operands))
        .and_then(|inst| inst.operand(0))
}

/// Where a new `OpName` belongs: after the last debug name, or before the first annotation or
/// declaration when the module has none.
fn debug_name_position(module: &SpirvModule) -> usize {
    let instructions = module.instructions();
    if let Some(last) = instructions
        .iter()
        .rposition(|inst| matches!(inst.opcode, op::NAME | op::MEMBER_NAME))
    {
        return last + 1;
    }
    instructions
        .iter()
        .position(|inst| {
            matches!(inst.opcode, op::DECORATE | op::MEMBER_DECORATE)
                || (op::TYPE_VOID..=op::TYPE_PIPE).contains(&inst.opcode)
                || inst.opcode == op::FUNCTION
        })
        .unwrap_or(instructions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use pretty_assertions::assert_eq;

    fn parse(words: &[u32]) -> SpirvModule {
        SpirvModule::from_words(words).expect("fixture should parse")
    }

    fn count(module: &SpirvModule, opcode: u16) -> usize {
        module
            .instructions()
            .iter()
            .filter(|inst| inst.opcode == opcode)
            .count()
    }

    #[test]
    fn declared_pairs_trace_back_to_variables() {
        let module = parse(&fixtures::separate_texture_and_sampler());
        let pairs = sampler_pairs(&module);
        assert_eq!(pairs.len(), 1);
        assert_eq!(module.debug_name(pairs[0].image).as_deref(), Some("albedo"));
        assert_eq!(
            module.debug_name(pairs[0].sampler).as_deref(),
            Some("albedo_sampler")
        );
    }

    #[test]
    fn module_without_samplerless_reads_is_untouched() {
        let words = fixtures::separate_texture_and_sampler();
        let mut module = parse(&words);
        let result = pair_samplerless_reads(&mut module).unwrap();
        assert_eq!(result, SamplerlessReads::default());
        assert_eq!(module.to_words(), words);
    }

    #[test]
    fn fetch_and_query_share_one_dummy_sampler() {
        let mut module = parse(&fixtures::texel_fetch_without_sampler());
        assert_eq!(count(&module, op::TYPE_SAMPLER), 0);

        let result = pair_samplerless_reads(&mut module).unwrap();
        assert_eq!(result.rewritten, 2);
        let dummy = result.dummy_sampler.expect("dummy sampler");
        assert_eq!(module.debug_name(dummy).as_deref(), Some(DUMMY_SAMPLER_NAME));
        assert_eq!(count(&module, op::TYPE_SAMPLER), 1);
        assert_eq!(count(&module, op::TYPE_SAMPLED_IMAGE), 1);

        let pairs = sampler_pairs(&module);
        assert_eq!(pairs.len(), 1);
        assert_eq!(module.debug_name(pairs[0].image).as_deref(), Some("albedo"));
        assert_eq!(pairs[0].sampler, dummy);

        // Every fetch and query now reads the image extracted from a sampled image.
        let definitions = module.definitions();
        for inst in module.instructions() {
            if matches!(inst.opcode, op::IMAGE_FETCH | op::IMAGE_QUERY_SIZE_LOD) {
                let def = definitions[&inst.operands[2]];
                assert_eq!(module.instructions()[def].opcode, op::IMAGE);
            }
        }
        // The rewritten module is still a well-formed word stream.
        parse(&module.to_words());
    }

    #[test]
    fn fetch_reuses_the_sampler_the_texture_is_sampled_with() {
        let mut module = parse(&fixtures::sampled_and_fetched_texture());
        let before = sampler_pairs(&module);
        assert_eq!(before.len(), 1);

        let result = pair_samplerless_reads(&mut module).unwrap();
        assert_eq!(result.dummy_sampler, None);
        assert_eq!(result.rewritten, 2);
        assert_eq!(sampler_pairs(&module), before);
        assert_eq!(count(&module, op::TYPE_SAMPLED_IMAGE), 1);
    }
}
