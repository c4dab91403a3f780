//! Target-language text generation through the wrapped `spirv_cross` code generators.

use spirv_cross::{glsl, hlsl, spirv};
use tracing::debug;

use crate::error::{codegen_error, PipelineError};
use crate::handles::Tracked;
use crate::options::HlslShaderModel;

/// Parses IR words into a code generator for `Target`.
pub(crate) fn generator<Target>(
    words: &[u32],
) -> Result<Tracked<spirv::Ast<Target>>, PipelineError>
where
    spirv::Ast<Target>: spirv::Parse<Target> + spirv::Compile<Target>,
{
    let module = spirv::Module::from_words(words);
    spirv::Ast::<Target>::parse(&module)
        .map(Tracked::new)
        .map_err(|err| codegen_error("parsing SPIR-V for code generation failed", err))
}

/// Maps a `#version` number to a code generator version. GLSL ES supports 100 and 300.
pub(crate) fn glsl_version(version: u16, es: bool) -> Result<glsl::Version, PipelineError> {
    use glsl::Version::*;
    let mapped = match (version, es) {
        (110, false) => V1_10,
        (120, false) => V1_20,
        (130, false) => V1_30,
        (140, false) => V1_40,
        (150, false) => V1_50,
        (330, false) => V3_30,
        (400, false) => V4_00,
        (410, false) => V4_10,
        (420, false) => V4_20,
        (430, false) => V4_30,
        (440, false) => V4_40,
        (450, false) => V4_50,
        (460, false) => V4_60,
        (100, true) => V1_00Es,
        (300, true) => V3_00Es,
        _ => {
            let profile = if es { "GLSL ES" } else { "GLSL" };
            return Err(PipelineError::Compile(format!(
                "{profile} version {version} is not supported by the code generator"
            )));
        }
    };
    Ok(mapped)
}

pub(crate) fn write_glsl(
    ast: &mut spirv::Ast<glsl::Target>,
    version: glsl::Version,
) -> Result<String, PipelineError> {
    let mut options = glsl::CompilerOptions::default();
    options.version = version;
    // Plain GLSL: no descriptor sets, no separate textures or samplers.
    options.vulkan_semantics = false;
    ast.set_compiler_options(&options)
        .map_err(|err| codegen_error("GLSL options were rejected", err))?;

    let text = ast
        .compile()
        .map_err(|err| codegen_error("GLSL generation failed", err))?;
    debug!(version = ?options.version, len = text.len(), "generated GLSL");
    Ok(text)
}

/// Registers follow the IR bindings: `binding = N` becomes `register(tN)`, `(sN)` or `(bN)`.
pub(crate) fn write_hlsl(
    words: &[u32],
    shader_model: HlslShaderModel,
) -> Result<String, PipelineError> {
    let mut ast = generator::<hlsl::Target>(words)?;
    let mut options = hlsl::CompilerOptions::default();
    options.shader_model = shader_model.to_generator();
    ast.set_compiler_options(&options)
        .map_err(|err| codegen_error("HLSL options were rejected", err))?;

    let text = ast
        .compile()
        .map_err(|err| codegen_error("HLSL generation failed", err))?;
    debug!(?shader_model, len = text.len(), "generated HLSL");
    Ok(text)
}
