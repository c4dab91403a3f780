//! Shader cross-compilation: one shader source, many native shading languages.
//!
//! The pipeline has two halves joined by SPIR-V:
//!
//! - [`compile_to_ir`] compiles source text for one stage to a SPIR-V module.
//! - [`transpile_from_ir`] turns a SPIR-V module into GLSL, GLSL ES or HLSL text for one
//!   entry point, after applying specialization-constant overrides and giving every combined
//!   texture+sampler the binding slot the application assigned to the texture.
//!
//! Both return a [`CompiledArtifact`]; failures are data, never panics. Every object a call
//! creates is released before it returns, see [`live_handles`].

#![forbid(unsafe_code)]

mod artifact;
mod back;
mod context;
mod error;
mod front;
mod handles;
mod normalize;
mod options;
mod pipeline;
mod stage;

pub use crate::artifact::CompiledArtifact;
pub use crate::error::{ErrorKind, PipelineError};
pub use crate::handles::{live_handles, Tracked};
pub use crate::normalize::{CombinedImageSampler, SamplerSource};
pub use crate::options::{CompileOptions, HlslShaderModel, TranspileOptions};
pub use crate::pipeline::{
    compile_to_ir, compile_to_ir_with_options, transpile_from_ir, try_compile_to_ir, Transpiled,
    Transpiler,
};
pub use crate::stage::{
    ParseNameError, ShaderStage, SourceLanguage, TargetFamily, TargetLanguage,
};

pub use shadercross_spirv::{
    FlattenedInput, SkipReason, SpecValue, SpecializationConstant, SpecializationReport,
};
