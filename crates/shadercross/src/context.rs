use shadercross_spirv::{
    apply_specialization, flatten_matrix_vertex_inputs, isolate_entry_point, FlattenedInput,
    IsolatedEntryPoint, SpecializationConstant, SpecializationReport, SpirvModule,
};
use tracing::debug;

use crate::error::PipelineError;
use crate::handles::Tracked;
use crate::stage::ShaderStage;

/// One parsed IR module, rewritten in place for a single transpile call.
pub(crate) struct IrContext {
    spirv: Tracked<SpirvModule>,
}

impl IrContext {
    pub fn parse(bytes: &[u8]) -> Result<Self, PipelineError> {
        let spirv = SpirvModule::parse(bytes)?;
        debug!(
            bytes = bytes.len(),
            instructions = spirv.instructions().len(),
            entry_points = spirv.entry_points().len(),
            "parsed SPIR-V"
        );
        Ok(Self {
            spirv: Tracked::new(spirv),
        })
    }

    pub fn isolate(
        &mut self,
        stage: ShaderStage,
        entry_point: &str,
    ) -> Result<IsolatedEntryPoint, PipelineError> {
        isolate_entry_point(&mut self.spirv, stage.execution_model(), entry_point)
            .map_err(|err| PipelineError::Compile(err.to_string()))
    }

    pub fn flatten_matrix_vertex_inputs(&mut self) -> Result<Vec<FlattenedInput>, PipelineError> {
        flatten_matrix_vertex_inputs(&mut self.spirv)
            .map_err(|err| PipelineError::Compile(err.to_string()))
    }

    pub fn specialize(&mut self, overrides: &[SpecializationConstant]) -> SpecializationReport {
        apply_specialization(&mut self.spirv, overrides)
    }

    pub fn module_mut(&mut self) -> &mut SpirvModule {
        &mut self.spirv
    }

    /// The (rewritten) module as words for the code generator.
    pub fn to_words(&self) -> Vec<u32> {
        self.spirv.to_words()
    }
}
