//! A bounds-checked SPIR-V module reader/writer and the word-level passes the shader
//! cross-compiler runs before handing a module to a code generator.
//!
//! Inputs are treated as **untrusted**: parsing never panics or reads out of bounds, and every
//! pass either rewrites the module consistently or leaves it unchanged.
//!
//! Passes:
//!
//! - [`apply_specialization`]: writes override values into `OpSpecConstant*` literals.
//! - [`isolate_entry_point`]: reduces a multi-entry-point module to a single entry point.
//! - [`flatten_matrix_vertex_inputs`]: splits matrix vertex inputs into per-column inputs.
//! - [`pair_samplerless_reads`]: gives texel fetches and size queries a sampler to combine with.
//! - [`resource_bindings`]: lists descriptor-bound globals.

#![forbid(unsafe_code)]

mod entry_point;
mod error;
mod flatten;
mod isolate;
mod module;
/// Opcode, decoration and storage-class numbers used by this crate.
pub mod opcode;
mod reflect;
mod samplers;
mod specialize;
mod types;

/// Helpers for hand-assembling SPIR-V modules in tests.
///
/// Only available to this crate's own tests or with the `test-utils` feature enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::entry_point::{EntryPoint, ExecutionModel};
pub use crate::error::SpirvError;
pub use crate::flatten::{flatten_matrix_vertex_inputs, FlattenedInput};
pub use crate::isolate::{isolate_entry_point, IsolatedEntryPoint};
pub use crate::module::{
    decode_string, encode_string, Header, Instruction, SpirvModule, HEADER_WORDS, SPIRV_MAGIC,
};
pub use crate::reflect::{resource_bindings, ResourceBinding, ResourceKind};
pub use crate::samplers::{
    pair_samplerless_reads, sampler_pairs, SamplerPair, SamplerlessReads, DUMMY_SAMPLER_NAME,
};
pub use crate::specialize::{
    apply_specialization, spec_constant_slots, ScalarKind, SkipReason, SkippedOverride,
    SpecConstantSlot, SpecConstantWriter, SpecValue, SpecializationConstant,
    SpecializationReport,
};
pub use crate::types::{TypeInfo, TypeTable};
