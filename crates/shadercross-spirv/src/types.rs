use std::collections::HashMap;

use crate::module::SpirvModule;
use crate::opcode::op;

/// The parts of a SPIR-V type declaration the passes care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeInfo {
    Bool,
    Int { width: u32, signed: bool },
    Float { width: u32 },
    Vector { component: u32, count: u32 },
    Matrix { column: u32, columns: u32 },
    Image { sampled_type: u32, dim: u32, depth: u32, sampled: u32 },
    Sampler,
    SampledImage { image: u32 },
    Array { element: u32 },
    RuntimeArray { element: u32 },
    Struct,
    Pointer { storage: u32, pointee: u32 },
    Other,
}

/// Lookup table from type id to [`TypeInfo`], built once per pass.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: HashMap<u32, TypeInfo>,
}

impl TypeTable {
    pub fn build(module: &SpirvModule) -> Self {
        let mut types = HashMap::new();
        for inst in module.instructions() {
            if !(op::TYPE_VOID..=op::TYPE_PIPE).contains(&inst.opcode) {
                continue;
            }
            let o = inst.operands.as_slice();
            let info = match (inst.opcode, o) {
                (op::TYPE_BOOL, [_]) => TypeInfo::Bool,
                (op::TYPE_INT, [_, width, signed, ..]) => TypeInfo::Int {
                    width: *width,
                    signed: *signed != 0,
                },
                (op::TYPE_FLOAT, [_, width, ..]) => TypeInfo::Float { width: *width },
                (op::TYPE_VECTOR, [_, component, count, ..]) => TypeInfo::Vector {
                    component: *component,
                    count: *count,
                },
                (op::TYPE_MATRIX, [_, column, columns, ..]) => TypeInfo::Matrix {
                    column: *column,
                    columns: *columns,
                },
                (op::TYPE_IMAGE, [_, sampled_type, dim, depth, _arrayed, _ms, sampled, ..]) => {
                    TypeInfo::Image {
                        sampled_type: *sampled_type,
                        dim: *dim,
                        depth: *depth,
                        sampled: *sampled,
                    }
                }
                (op::TYPE_SAMPLER, [_]) => TypeInfo::Sampler,
                (op::TYPE_SAMPLED_IMAGE, [_, image, ..]) => {
                    TypeInfo::SampledImage { image: *image }
                }
                (op::TYPE_ARRAY, [_, element, ..]) => TypeInfo::Array { element: *element },
                (op::TYPE_RUNTIME_ARRAY, [_, element, ..]) => {
                    TypeInfo::RuntimeArray { element: *element }
                }
                (op::TYPE_STRUCT, [_, ..]) => TypeInfo::Struct,
                (op::TYPE_POINTER, [_, storage, pointee, ..]) => TypeInfo::Pointer {
                    storage: *storage,
                    pointee: *pointee,
                },
                _ => TypeInfo::Other,
            };
            if let Some(&id) = o.first() {
                types.insert(id, info);
            }
        }
        Self { types }
    }

    pub fn get(&self, id: u32) -> Option<TypeInfo> {
        self.types.get(&id).copied()
    }

    /// Follows a pointer type to its pointee.
    pub fn pointee(&self, pointer: u32) -> Option<(u32, u32)> {
        match self.get(pointer)? {
            TypeInfo::Pointer { storage, pointee } => Some((storage, pointee)),
            _ => None,
        }
    }

    /// Strips (runtime) array wrappers, e.g. for texture arrays.
    pub fn element(&self, mut id: u32) -> u32 {
        while let Some(TypeInfo::Array { element } | TypeInfo::RuntimeArray { element }) =
            self.get(id)
        {
            id = element;
        }
        id
    }

    /// Existing `OpTypePointer` with the given storage class and pointee, if any.
    pub fn find_pointer(&self, storage: u32, pointee: u32) -> Option<u32> {
        let mut matches: Vec<u32> = self
            .types
            .iter()
            .filter(|(_, info)| **info == TypeInfo::Pointer { storage, pointee })
            .map(|(id, _)| *id)
            .collect();
        // Deterministic choice when a module declares duplicate pointer types.
        matches.sort_unstable();
        matches.first().copied()
    }
}
