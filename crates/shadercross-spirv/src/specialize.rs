//! Specialization-constant patching.
//!
//! Shaders declare `OpSpecConstant*` values decorated with `SpecId`; their literal operands are
//! the defaults a pipeline may override without recompiling from source. Patching rewrites those
//! literals in place, so any later consumer of the module (constant folding in a code generator
//! included) sees the overridden value as if it had been authored that way.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::module::SpirvModule;
use crate::opcode::{decoration, op};
use crate::types::{TypeInfo, TypeTable};

/// Override value. The variant selects the setter used to write it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecValue {
    U32(u32),
    I32(i32),
    F32(f32),
    F64(f64),
}

impl SpecValue {
    pub fn bit_width(&self) -> u32 {
        match self {
            SpecValue::U32(_) | SpecValue::I32(_) | SpecValue::F32(_) => 32,
            SpecValue::F64(_) => 64,
        }
    }

    fn is_truthy(&self) -> bool {
        match *self {
            SpecValue::U32(v) => v != 0,
            SpecValue::I32(v) => v != 0,
            SpecValue::F32(v) => v != 0.0,
            SpecValue::F64(v) => v != 0.0,
        }
    }
}

/// A caller-supplied override for the constant declared with `SpecId == id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecializationConstant {
    pub id: u32,
    pub value: SpecValue,
}

impl SpecializationConstant {
    pub fn new(id: u32, value: SpecValue) -> Self {
        Self { id, value }
    }

    pub fn u32(id: u32, value: u32) -> Self {
        Self::new(id, SpecValue::U32(value))
    }

    pub fn i32(id: u32, value: i32) -> Self {
        Self::new(id, SpecValue::I32(value))
    }

    pub fn f32(id: u32, value: f32) -> Self {
        Self::new(id, SpecValue::F32(value))
    }

    pub fn f64(id: u32, value: f64) -> Self {
        Self::new(id, SpecValue::F64(value))
    }
}

/// Scalar type of a declared specialization constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int { width: u32, signed: bool },
    Float { width: u32 },
}

impl ScalarKind {
    fn width(&self) -> u32 {
        match *self {
            ScalarKind::Bool => 1,
            ScalarKind::Int { width, .. } | ScalarKind::Float { width } => width,
        }
    }
}

/// A declared specialization constant and where its value lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecConstantSlot {
    pub spec_id: u32,
    /// Result id of the `OpSpecConstant*` instruction.
    pub result_id: u32,
    pub kind: ScalarKind,
    /// Current default value as literal words (empty for booleans).
    pub literal: Vec<u32>,
    instruction: usize,
}

impl SpecConstantSlot {
    /// For booleans, whether the constant currently defaults to `true`.
    pub fn bool_default(&self, module: &SpirvModule) -> Option<bool> {
        match module.instructions().get(self.instruction)?.opcode {
            op::SPEC_CONSTANT_TRUE => Some(true),
            op::SPEC_CONSTANT_FALSE => Some(false),
            _ => None,
        }
    }
}

/// Why a matching override could not be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// There is no 64-bit integer setter.
    Int64Unsupported,
    WidthMismatch { slot_width: u32, value_width: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkippedOverride {
    pub spec_id: u32,
    pub result_id: u32,
    pub value: SpecValue,
    pub reason: SkipReason,
}

/// Outcome of [`apply_specialization`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecializationReport {
    /// `(spec_id, result_id)` of every constant that received a value.
    pub applied: Vec<(u32, u32)>,
    /// Override ids that matched no declared constant.
    pub unmatched: Vec<u32>,
    pub skipped: Vec<SkippedOverride>,
}

/// Enumerates the module's specialization constants in declaration order.
///
/// Constants without a `SpecId` decoration or with a non-scalar type are not overridable and are
/// left out.
pub fn spec_constant_slots(module: &SpirvModule) -> Vec<SpecConstantSlot> {
    let types = TypeTable::build(module);
    let mut spec_ids: HashMap<u32, u32> = HashMap::new();
    for inst in module.instructions() {
        if let (op::DECORATE, [target, decoration::SPEC_ID, spec_id, ..]) =
            (inst.opcode, inst.operands.as_slice())
        {
            spec_ids.insert(*target, *spec_id);
        }
    }

    let mut slots = Vec::new();
    for (index, inst) in module.instructions().iter().enumerate() {
        if !matches!(
            inst.opcode,
            op::SPEC_CONSTANT | op::SPEC_CONSTANT_TRUE | op::SPEC_CONSTANT_FALSE
        ) {
            continue;
        }
        let [result_type, result_id, literal @ ..] = inst.operands.as_slice() else {
            continue;
        };
        let Some(&spec_id) = spec_ids.get(result_id) else {
            continue;
        };
        let kind = match types.get(*result_type) {
            Some(TypeInfo::Bool) => ScalarKind::Bool,
            Some(TypeInfo::Int { width, signed }) => ScalarKind::Int { width, signed },
            Some(TypeInfo::Float { width }) => ScalarKind::Float { width },
            _ => {
                debug!(spec_id, result_id, "ignoring non-scalar specialization constant");
                continue;
            }
        };
        let expected_words = match kind {
            ScalarKind::Bool => 0,
            _ => kind.width().div_ceil(32) as usize,
        };
        if literal.len() != expected_words {
            debug!(
                spec_id,
                result_id,
                words = literal.len(),
                expected_words,
                "ignoring specialization constant with a malformed literal"
            );
            continue;
        }
        slots.push(SpecConstantSlot {
            spec_id,
            result_id: *result_id,
            kind,
            literal: literal.to_vec(),
            instruction: index,
        });
    }
    slots
}

/// Typed setters over one module's specialization constants.
pub struct SpecConstantWriter<'a> {
    module: &'a mut SpirvModule,
}

impl<'a> SpecConstantWriter<'a> {
    pub fn new(module: &'a mut SpirvModule) -> Self {
        Self { module }
    }

    pub fn set_u32(&mut self, slot: &SpecConstantSlot, value: u32) -> Result<(), SkipReason> {
        self.write_32(slot, value, SpecValue::U32(value))
    }

    pub fn set_i32(&mut self, slot: &SpecConstantSlot, value: i32) -> Result<(), SkipReason> {
        self.write_32(slot, value as u32, SpecValue::I32(value))
    }

    pub fn set_f32(&mut self, slot: &SpecConstantSlot, value: f32) -> Result<(), SkipReason> {
        self.write_32(slot, value.to_bits(), SpecValue::F32(value))
    }

    pub fn set_f64(&mut self, slot: &SpecConstantSlot, value: f64) -> Result<(), SkipReason> {
        match slot.kind {
            ScalarKind::Bool => self.write_bool(slot, SpecValue::F64(value).is_truthy()),
            ScalarKind::Int { width: 64, .. } => Err(SkipReason::Int64Unsupported),
            ScalarKind::Float { width: 64 } => {
                let bits = value.to_bits();
                // Multi-word literals are stored low-order word first.
                self.write_literal(slot, &[bits as u32, (bits >> 32) as u32]);
                Ok(())
            }
            kind => Err(SkipReason::WidthMismatch {
                slot_width: kind.width(),
                value_width: 64,
            }),
        }
    }

    pub fn set(&mut self, slot: &SpecConstantSlot, value: SpecValue) -> Result<(), SkipReason> {
        match value {
            SpecValue::U32(v) => self.set_u32(slot, v),
            SpecValue::I32(v) => self.set_i32(slot, v),
            SpecValue::F32(v) => self.set_f32(slot, v),
            SpecValue::F64(v) => self.set_f64(slot, v),
        }
    }

    fn write_32(
        &mut self,
        slot: &SpecConstantSlot,
        bits: u32,
        value: SpecValue,
    ) -> Result<(), SkipReason> {
        match slot.kind {
            ScalarKind::Bool => self.write_bool(slot, value.is_truthy()),
            ScalarKind::Int { width: 64, .. } => Err(SkipReason::Int64Unsupported),
            ScalarKind::Int { width: 32, .. } | ScalarKind::Float { width: 32 } => {
                self.write_literal(slot, &[bits]);
                Ok(())
            }
            kind => Err(SkipReason::WidthMismatch {
                slot_width: kind.width(),
                value_width: 32,
            }),
        }
    }

    fn write_bool(&mut self, slot: &SpecConstantSlot, value: bool) -> Result<(), SkipReason> {
        if let Some(inst) = self.module.instructions_mut().get_mut(slot.instruction) {
            inst.opcode = if value {
                op::SPEC_CONSTANT_TRUE
            } else {
                op::SPEC_CONSTANT_FALSE
            };
        }
        Ok(())
    }

    fn write_literal(&mut self, slot: &SpecConstantSlot, words: &[u32]) {
        if let Some(inst) = self.module.instructions_mut().get_mut(slot.instruction) {
            inst.operands.truncate(2);
            inst.operands.extend_from_slice(words);
        }
    }
}

/// Writes every override into each declared constant with a matching id.
///
/// Overrides whose id matches nothing are recorded as unmatched and otherwise ignored; a shader
/// variant need not use every toggle. Writes that cannot be expressed (64-bit integers, width
/// mismatches) are skipped with a warning and never fail the call.
pub fn apply_specialization(
    module: &mut SpirvModule,
    overrides: &[SpecializationConstant],
) -> SpecializationReport {
    let slots = spec_constant_slots(module);
    let mut report = SpecializationReport::default();
    let mut writer = SpecConstantWriter::new(module);

    for over in overrides {
        let mut matched = false;
        for slot in slots.iter().filter(|slot| slot.spec_id == over.id) {
            matched = true;
            match writer.set(slot, over.value) {
                Ok(()) => report.applied.push((slot.spec_id, slot.result_id)),
                Err(reason) => {
                    warn!(
                        spec_id = slot.spec_id,
                        result_id = slot.result_id,
                        value = ?over.value,
                        ?reason,
                        "specialization override skipped"
                    );
                    report.skipped.push(SkippedOverride {
                        spec_id: slot.spec_id,
                        result_id: slot.result_id,
                        value: over.value,
                        reason,
                    });
                }
            }
        }
        if !matched {
            debug!(spec_id = over.id, "specialization override matches no declared constant");
            report.unmatched.push(over.id);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, ModuleBuilder};
    use crate::ExecutionModel;
    use pretty_assertions::assert_eq;

    fn parse(words: &[u32]) -> SpirvModule {
        SpirvModule::from_words(words).expect("fixture should parse")
    }

    fn literal_of(module: &SpirvModule, spec_id: u32) -> Vec<u32> {
        spec_constant_slots(module)
            .into_iter()
            .find(|slot| slot.spec_id == spec_id)
            .map(|slot| slot.literal)
            .expect("spec constant should exist")
    }

    #[test]
    fn enumerates_scalar_spec_constants() {
        let module = parse(&fixtures::fragment_with_spec_constants());
        let slots = spec_constant_slots(&module);
        let ids: Vec<u32> = slots.iter().map(|s| s.spec_id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(slots
            .iter()
            .all(|s| s.kind == ScalarKind::Float { width: 32 }));
        assert_eq!(slots[0].literal, vec![0.25f32.to_bits()]);
    }

    #[test]
    fn f32_override_rewrites_literal() {
        let mut module = parse(&fixtures::fragment_with_spec_constants());
        let report = apply_specialization(&mut module, &[SpecializationConstant::f32(1, 0.75)]);
        assert_eq!(report.applied.len(), 1);
        assert!(report.unmatched.is_empty());
        assert_eq!(literal_of(&module, 1), vec![0.75f32.to_bits()]);
        assert_eq!(literal_of(&module, 0), vec![0.25f32.to_bits()]);
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let original = parse(&fixtures::fragment_with_spec_constants());
        let mut module = original.clone();
        let report = apply_specialization(&mut module, &[SpecializationConstant::u32(42, 7)]);
        assert_eq!(report.unmatched, vec![42]);
        assert!(report.applied.is_empty());
        assert_eq!(module, original);
    }

    #[test]
    fn distinct_ids_commute() {
        let base = parse(&fixtures::fragment_with_spec_constants());
        let a = SpecializationConstant::f32(0, 0.125);
        let b = SpecializationConstant::f32(1, 0.875);

        let mut ab = base.clone();
        apply_specialization(&mut ab, &[a, b]);
        let mut ba = base;
        apply_specialization(&mut ba, &[b, a]);

        assert_eq!(ab.to_bytes(), ba.to_bytes());
    }

    /// Builds a module declaring one spec constant of each interesting scalar kind.
    fn mixed_kinds_module() -> SpirvModule {
        let mut b = ModuleBuilder::new();
        let void = b.id();
        let fn_ty = b.id();
        let bool_ty = b.id();
        let u32_ty = b.id();
        let i64_ty = b.id();
        let f64_ty = b.id();
        let sc_bool = b.id();
        let sc_u32 = b.id();
        let sc_i64 = b.id();
        let sc_f64 = b.id();
        let dup_u32 = b.id();
        let main = b.id();
        let label = b.id();

        b.capability(1);
        b.capability(10); // Float64
        b.capability(11); // Int64
        b.memory_model();
        b.entry_point(ExecutionModel::GLCompute, main, "main", &[]);
        b.inst(op::EXECUTION_MODE, &[main, 17, 1, 1, 1]); // LocalSize 1 1 1
        b.decorate(sc_bool, decoration::SPEC_ID, &[10]);
        b.decorate(sc_u32, decoration::SPEC_ID, &[11]);
        b.decorate(sc_i64, decoration::SPEC_ID, &[12]);
        b.decorate(sc_f64, decoration::SPEC_ID, &[13]);
        b.decorate(dup_u32, decoration::SPEC_ID, &[11]);
        b.inst(op::TYPE_VOID, &[void]);
        b.inst(op::TYPE_FUNCTION, &[fn_ty, void]);
        b.inst(op::TYPE_BOOL, &[bool_ty]);
        b.inst(op::TYPE_INT, &[u32_ty, 32, 0]);
        b.inst(op::TYPE_INT, &[i64_ty, 64, 1]);
        b.inst(op::TYPE_FLOAT, &[f64_ty, 64]);
        b.inst(op::SPEC_CONSTANT_FALSE, &[bool_ty, sc_bool]);
        b.inst(op::SPEC_CONSTANT, &[u32_ty, sc_u32, 3]);
        b.inst(op::SPEC_CONSTANT, &[i64_ty, sc_i64, 5, 0]);
        b.inst(op::SPEC_CONSTANT, &[f64_ty, sc_f64, 0, 0]);
        b.inst(op::SPEC_CONSTANT, &[u32_ty, dup_u32, 3]);
        b.inst(op::FUNCTION, &[void, main, 0, fn_ty]);
        b.inst(op::LABEL, &[label]);
        b.inst(op::RETURN, &[]);
        b.inst(op::FUNCTION_END, &[]);
        parse(&b.finish())
    }

    #[test]
    fn bool_constant_toggles_opcode() {
        let mut module = mixed_kinds_module();
        let report = apply_specialization(&mut module, &[SpecializationConstant::u32(10, 1)]);
        assert_eq!(report.applied.len(), 1);
        let slot = spec_constant_slots(&module)
            .into_iter()
            .find(|s| s.spec_id == 10)
            .expect("bool slot");
        assert_eq!(slot.bool_default(&module), Some(true));
    }

    #[test]
    fn duplicate_declared_ids_all_receive_the_value() {
        let mut module = mixed_kinds_module();
        let report = apply_specialization(&mut module, &[SpecializationConstant::u32(11, 9)]);
        assert_eq!(report.applied.len(), 2);
        let literals: Vec<Vec<u32>> = spec_constant_slots(&module)
            .into_iter()
            .filter(|s| s.spec_id == 11)
            .map(|s| s.literal)
            .collect();
        assert_eq!(literals, vec![vec![9], vec![9]]);
    }

    #[test]
    fn f64_override_writes_low_word_first() {
        let mut module = mixed_kinds_module();
        apply_specialization(&mut module, &[SpecializationConstant::f64(13, 2.5)]);
        let bits = 2.5f64.to_bits();
        assert_eq!(
            literal_of(&module, 13),
            vec![bits as u32, (bits >> 32) as u32]
        );
    }

    #[test]
    fn int64_and_width_mismatch_are_skipped_not_failed() {
        let original = mixed_kinds_module();
        let mut module = original.clone();
        let report = apply_specialization(
            &mut module,
            &[
                SpecializationConstant::i32(12, -1),
                SpecializationConstant::f64(11, 1.0),
            ],
        );
        assert!(report.applied.is_empty());
        let reasons: Vec<SkipReason> = report.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::Int64Unsupported,
                SkipReason::WidthMismatch {
                    slot_width: 32,
                    value_width: 64
                },
                SkipReason::WidthMismatch {
                    slot_width: 32,
                    value_width: 64
                },
            ]
        );
        assert_eq!(module, original);
    }

    #[test]
    fn i32_override_stores_twos_complement() {
        let mut module = mixed_kinds_module();
        apply_specialization(&mut module, &[SpecializationConstant::i32(11, -2)]);
        assert_eq!(literal_of(&module, 11), vec![(-2i32) as u32]);
    }
}
