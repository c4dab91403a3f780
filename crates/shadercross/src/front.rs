//! Source text to SPIR-V, through the wrapped `shaderc` front end.

use shadercross_spirv::SpirvModule;
use tracing::{debug, warn};

use crate::error::{describe, PipelineError};
use crate::handles::Tracked;
use crate::options::CompileOptions;
use crate::stage::{ShaderStage, SourceLanguage};

pub(crate) fn compile(
    stage: ShaderStage,
    language: SourceLanguage,
    source: &[u8],
    entry_point: &str,
    options: &CompileOptions,
) -> Result<Vec<u8>, PipelineError> {
    let source = std::str::from_utf8(source).map_err(|err| {
        PipelineError::front_end(stage, format!("source is not valid UTF-8: {err}"))
    })?;

    let compiler = Tracked::new(
        shaderc::Compiler::new()
            .ok_or_else(|| PipelineError::front_end(stage, "failed to create the compiler"))?,
    );
    let mut compile_options = Tracked::new(
        shaderc::CompileOptions::new()
            .ok_or_else(|| PipelineError::front_end(stage, "failed to create compile options"))?,
    );
    match language {
        SourceLanguage::Hlsl => {
            compile_options.set_source_language(shaderc::SourceLanguage::HLSL);
            // Texture and sampler pairs become combined samplers; register(tN) maps to binding N.
            compile_options.set_auto_combined_image_sampler(true);
            compile_options.set_hlsl_io_mapping(true);
        }
        // ESSL is told apart by its `#version NNN es` line.
        SourceLanguage::Glsl | SourceLanguage::Essl => {
            compile_options.set_source_language(shaderc::SourceLanguage::GLSL);
        }
    }
    compile_options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    compile_options.set_optimization_level(shaderc::OptimizationLevel::Zero);
    for (name, value) in &options.defines {
        compile_options.add_macro_definition(name, Some(value.as_str()));
    }

    let file_name = format!("{stage}.{language}");
    let artifact = Tracked::new(
        compiler
            .compile_into_spirv(
                source,
                stage.shader_kind(),
                &file_name,
                entry_point,
                Some(&*compile_options),
            )
            .map_err(|err| PipelineError::front_end(stage, describe(&err)))?,
    );
    if artifact.get_num_warnings() > 0 {
        warn!(
            %stage,
            %language,
            warnings = %artifact.get_warning_messages(),
            "front end reported warnings"
        );
    }

    let mut module = Tracked::new(SpirvModule::from_words(artifact.as_binary()).map_err(
        |err| PipelineError::front_end(stage, format!("front end produced invalid SPIR-V: {err}")),
    )?);
    drop(artifact);

    // GLSL entry points are always `main` in the source; expose the caller's name instead.
    let function = match module.entry_points().as_slice() {
        [ep] if ep.name == entry_point => None,
        [ep] => Some(ep.function),
        eps => {
            return Err(PipelineError::front_end(
                stage,
                format!("expected exactly one entry point, found {}", eps.len()),
            ))
        }
    };
    if let Some(function) = function {
        module.rename_entry_point(function, entry_point);
    }

    let bytes = module.to_bytes();
    debug!(
        %stage,
        %language,
        entry_point,
        bytes = bytes.len(),
        "compiled shader source to SPIR-V"
    );
    Ok(bytes)
}
