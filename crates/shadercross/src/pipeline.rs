use shadercross_spirv::{FlattenedInput, SpecializationConstant, SpecializationReport};
use spirv_cross::glsl;
use tracing::debug;

use crate::artifact::CompiledArtifact;
use crate::back;
use crate::context::IrContext;
use crate::error::PipelineError;
use crate::front;
use crate::handles::Tracked;
use crate::normalize::{CombinedImageSampler, CombinedSamplerNormalizer, GlslCombinedSamplers};
use crate::options::{CompileOptions, TranspileOptions};
use crate::stage::{ShaderStage, SourceLanguage, TargetFamily, TargetLanguage};

/// Compiles shader source text to SPIR-V.
///
/// The returned IR exposes exactly one entry point, named `entry_point`, for `stage`.
pub fn compile_to_ir(
    stage: ShaderStage,
    source_language: SourceLanguage,
    source: &[u8],
    entry_point: &str,
) -> CompiledArtifact {
    compile_to_ir_with_options(
        stage,
        source_language,
        source,
        entry_point,
        &CompileOptions::default(),
    )
}

pub fn compile_to_ir_with_options(
    stage: ShaderStage,
    source_language: SourceLanguage,
    source: &[u8],
    entry_point: &str,
    options: &CompileOptions,
) -> CompiledArtifact {
    try_compile_to_ir(stage, source_language, source, entry_point, options).into()
}

/// [`compile_to_ir_with_options`] with the failure as a typed error.
pub fn try_compile_to_ir(
    stage: ShaderStage,
    source_language: SourceLanguage,
    source: &[u8],
    entry_point: &str,
    options: &CompileOptions,
) -> Result<Vec<u8>, PipelineError> {
    front::compile(stage, source_language, source, entry_point, options).inspect_err(|err| {
        debug!(%stage, %source_language, entry_point, %err, "front-end compile failed");
    })
}

/// Transpiles SPIR-V to target-language text with the default [`TranspileOptions`].
///
/// `specialization` overrides default values of specialization constants before code
/// generation; ids the shader does not declare are ignored.
pub fn transpile_from_ir(
    target_language: TargetLanguage,
    stage: ShaderStage,
    ir: &[u8],
    entry_point: &str,
    specialization: Option<&[SpecializationConstant]>,
) -> CompiledArtifact {
    Transpiler::default()
        .transpile(target_language, stage, ir, entry_point, specialization)
        .map(|transpiled| transpiled.text.into_bytes())
        .into()
}

/// Text and per-call report of one transpilation.
#[derive(Debug, Clone)]
pub struct Transpiled {
    pub text: String,
    /// Combined objects synthesized for GLSL-family targets; empty for HLSL.
    pub combined_samplers: Vec<CombinedImageSampler>,
    pub specialization: SpecializationReport,
    /// Matrix vertex inputs split into per-column inputs (HLSL vertex shaders only).
    pub flattened_inputs: Vec<FlattenedInput>,
}

/// IR-to-text back end with a fixed option set.
#[derive(Debug, Clone, Default)]
pub struct Transpiler {
    options: TranspileOptions,
}

impl Transpiler {
    pub fn new(options: TranspileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TranspileOptions {
        &self.options
    }

    pub fn transpile(
        &self,
        target_language: TargetLanguage,
        stage: ShaderStage,
        ir: &[u8],
        entry_point: &str,
        specialization: Option<&[SpecializationConstant]>,
    ) -> Result<Transpiled, PipelineError> {
        self.transpile_inner(target_language, stage, ir, entry_point, specialization)
            .inspect_err(|err| {
                debug!(%target_language, %stage, entry_point, %err, "transpile failed");
            })
    }

    fn transpile_inner(
        &self,
        target_language: TargetLanguage,
        stage: ShaderStage,
        ir: &[u8],
        entry_point: &str,
        specialization: Option<&[SpecializationConstant]>,
    ) -> Result<Transpiled, PipelineError> {
        let family = target_language.family();
        if family == TargetFamily::Hlsl && stage == ShaderStage::Geometry {
            return Err(PipelineError::Compile(format!(
                "{stage}: the HLSL code generator has no geometry stage"
            )));
        }
        let mut ctx = IrContext::parse(ir)?;

        let isolated = ctx.isolate(stage, entry_point)?;
        debug!(
            %target_language,
            entry_point = %isolated.entry_point,
            removed_entry_points = isolated.removed_entry_points.len(),
            "selected entry point"
        );

        let flattened_inputs = match (family, stage) {
            (TargetFamily::Hlsl, ShaderStage::Vertex) => ctx.flatten_matrix_vertex_inputs()?,
            _ => Vec::new(),
        };

        let specialization = specialization
            .map(|overrides| ctx.specialize(overrides))
            .unwrap_or_default();

        let (text, combined_samplers) = match family {
            TargetFamily::Glsl { es } => {
                let version = if es {
                    self.options.essl_version
                } else {
                    self.options.glsl_version
                };
                let normalizer = GlslCombinedSamplers;
                let plan = normalizer.plan(ctx.module_mut())?;
                let words = Tracked::new(ctx.to_words());
                let mut ast = back::generator::<glsl::Target>(&words)?;
                drop(words);
                let version = back::glsl_version(version, es)?;
                let combined = normalizer.synthesize(&plan, &mut ast)?;
                (back::write_glsl(&mut ast, version)?, combined)
            }
            TargetFamily::Hlsl => {
                let words = Tracked::new(ctx.to_words());
                (
                    back::write_hlsl(&words, self.options.hlsl_shader_model)?,
                    Vec::new(),
                )
            }
        };

        Ok(Transpiled {
            text,
            combined_samplers,
            specialization,
            flattened_inputs,
        })
    }
}
