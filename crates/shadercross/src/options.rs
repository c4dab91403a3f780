use std::collections::BTreeMap;

use spirv_cross::hlsl;

/// Options for the source-to-IR direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Preprocessor macros, as if `#define NAME VALUE` preceded the source.
    pub defines: BTreeMap<String, String>,
}

impl CompileOptions {
    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HlslShaderModel {
    #[default]
    V5_0,
    V5_1,
    V6_0,
}

impl HlslShaderModel {
    pub(crate) fn to_generator(self) -> hlsl::ShaderModel {
        match self {
            HlslShaderModel::V5_0 => hlsl::ShaderModel::V5_0,
            HlslShaderModel::V5_1 => hlsl::ShaderModel::V5_1,
            HlslShaderModel::V6_0 => hlsl::ShaderModel::V6_0,
        }
    }
}

/// Options for the IR-to-text direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranspileOptions {
    /// Desktop GLSL `#version`, 110 through 460.
    pub glsl_version: u16,
    /// GLSL ES `#version` (without the `es` suffix): 100 or 300.
    pub essl_version: u16,
    pub hlsl_shader_model: HlslShaderModel,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            glsl_version: 430,
            essl_version: 300,
            hlsl_shader_model: HlslShaderModel::V5_0,
        }
    }
}
