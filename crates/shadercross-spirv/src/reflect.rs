use core::fmt;

use crate::module::SpirvModule;
use crate::opcode::{decoration, op, storage_class};
use crate::types::{TypeInfo, TypeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    SampledImage,
    /// Separate texture, sampled through a sampler declared elsewhere.
    Image,
    StorageImage,
    Sampler,
    UniformBuffer,
    StorageBuffer,
    Other,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::SampledImage => "sampled image",
            ResourceKind::Image => "image",
            ResourceKind::StorageImage => "storage image",
            ResourceKind::Sampler => "sampler",
            ResourceKind::UniformBuffer => "uniform buffer",
            ResourceKind::StorageBuffer => "storage buffer",
            ResourceKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A descriptor-bound global variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    pub variable: u32,
    pub name: Option<String>,
    pub set: u32,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Lists the module's global variables that carry a `Binding` decoration, ordered by
/// `(set, binding)`. A missing `DescriptorSet` reads as set 0.
pub fn resource_bindings(module: &SpirvModule) -> Vec<ResourceBinding> {
    let types = TypeTable::build(module);
    let first_function = module.first_function_index();
    let mut out = Vec::new();
    for inst in &module.instructions()[..first_function] {
        if inst.opcode != op::VARIABLE {
            continue;
        }
        let [pointer_type, variable, storage, ..] = inst.operands.as_slice() else {
            continue;
        };
        let Some(binding) = module.decoration_literal(*variable, decoration::BINDING) else {
            continue;
        };
        let set = module
            .decoration_literal(*variable, decoration::DESCRIPTOR_SET)
            .unwrap_or(0);
        let kind = types
            .pointee(*pointer_type)
            .map(|(_, pointee)| classify(module, &types, *storage, types.element(pointee)))
            .unwrap_or(ResourceKind::Other);
        out.push(ResourceBinding {
            variable: *variable,
            name: module.debug_name(*variable),
            set,
            binding,
            kind,
        });
    }
    out.sort_by_key(|r| (r.set, r.binding, r.variable));
    out
}

fn classify(module: &SpirvModule, types: &TypeTable, storage: u32, ty: u32) -> ResourceKind {
    match (storage, types.get(ty)) {
        (_, Some(TypeInfo::SampledImage { .. })) => ResourceKind::SampledImage,
        // Sampled == 2 marks a storage image.
        (_, Some(TypeInfo::Image { sampled: 2, .. })) => ResourceKind::StorageImage,
        (_, Some(TypeInfo::Image { .. })) => ResourceKind::Image,
        (_, Some(TypeInfo::Sampler)) => ResourceKind::Sampler,
        (storage_class::STORAGE_BUFFER, _) => ResourceKind::StorageBuffer,
        (storage_class::UNIFORM, Some(TypeInfo::Struct)) => {
            // Pre-1.3 modules spell storage buffers as Uniform + BufferBlock.
            const BUFFER_BLOCK: u32 = 3;
            if module.decorations(ty, BUFFER_BLOCK).next().is_some() {
                ResourceKind::StorageBuffer
            } else {
                ResourceKind::UniformBuffer
            }
        }
        _ => ResourceKind::Other,
    }
}
