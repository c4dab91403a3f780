use core::fmt;
use core::str::FromStr;

use shadercross_spirv::ExecutionModel;
use thiserror::Error;

/// Pipeline stage a shader is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 4] = [
        ShaderStage::Vertex,
        ShaderStage::Fragment,
        ShaderStage::Geometry,
        ShaderStage::Compute,
    ];

    /// Shader kind the front end compiles this stage as.
    pub(crate) fn shader_kind(self) -> shaderc::ShaderKind {
        match self {
            ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
            ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
            ShaderStage::Geometry => shaderc::ShaderKind::Geometry,
            ShaderStage::Compute => shaderc::ShaderKind::Compute,
        }
    }

    pub fn execution_model(self) -> ExecutionModel {
        match self {
            ShaderStage::Vertex => ExecutionModel::Vertex,
            ShaderStage::Fragment => ExecutionModel::Fragment,
            ShaderStage::Geometry => ExecutionModel::Geometry,
            ShaderStage::Compute => ExecutionModel::GLCompute,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} {value:?} (expected one of: {expected})")]
pub struct ParseNameError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

impl FromStr for ShaderStage {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertex" | "vs" => Ok(ShaderStage::Vertex),
            "fragment" | "pixel" | "fs" | "ps" => Ok(ShaderStage::Fragment),
            "geometry" | "gs" => Ok(ShaderStage::Geometry),
            "compute" | "cs" => Ok(ShaderStage::Compute),
            _ => Err(ParseNameError {
                kind: "shader stage",
                value: s.to_owned(),
                expected: "vertex, fragment, geometry, compute",
            }),
        }
    }
}

/// Language of shader source text handed to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    Glsl,
    Hlsl,
    /// GLSL ES.
    Essl,
}

/// Language of the text the back end emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLanguage {
    Glsl,
    Hlsl,
    /// GLSL ES.
    Essl,
}

/// Code-style family a target language belongs to. ESSL is GLSL with the ES profile flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFamily {
    Glsl { es: bool },
    Hlsl,
}

impl TargetLanguage {
    pub fn family(self) -> TargetFamily {
        match self {
            TargetLanguage::Glsl => TargetFamily::Glsl { es: false },
            TargetLanguage::Essl => TargetFamily::Glsl { es: true },
            TargetLanguage::Hlsl => TargetFamily::Hlsl,
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceLanguage::Glsl => "GLSL",
            SourceLanguage::Hlsl => "HLSL",
            SourceLanguage::Essl => "ESSL",
        })
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetLanguage::Glsl => "GLSL",
            TargetLanguage::Hlsl => "HLSL",
            TargetLanguage::Essl => "ESSL",
        })
    }
}

fn parse_language(s: &str, kind: &'static str) -> Result<u8, ParseNameError> {
    match s.to_ascii_lowercase().as_str() {
        "glsl" => Ok(0),
        "hlsl" => Ok(1),
        "essl" | "gles" | "glsl-es" => Ok(2),
        _ => Err(ParseNameError {
            kind,
            value: s.to_owned(),
            expected: "glsl, hlsl, essl",
        }),
    }
}

impl FromStr for SourceLanguage {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_language(s, "source language")? {
            0 => SourceLanguage::Glsl,
            1 => SourceLanguage::Hlsl,
            _ => SourceLanguage::Essl,
        })
    }
}

impl FromStr for TargetLanguage {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_language(s, "target language")? {
            0 => TargetLanguage::Glsl,
            1 => TargetLanguage::Hlsl,
            _ => TargetLanguage::Essl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_maps_to_execution_model() {
        assert_eq!(ShaderStage::Vertex.execution_model().to_word(), 0);
        assert_eq!(ShaderStage::Geometry.execution_model().to_word(), 3);
        assert_eq!(ShaderStage::Fragment.execution_model().to_word(), 4);
        assert_eq!(ShaderStage::Compute.execution_model().to_word(), 5);
    }

    #[test]
    fn every_stage_has_its_own_shader_kind() {
        let kinds: Vec<_> = ShaderStage::ALL.iter().map(|s| s.shader_kind()).collect();
        assert_eq!(
            kinds,
            vec![
                shaderc::ShaderKind::Vertex,
                shaderc::ShaderKind::Fragment,
                shaderc::ShaderKind::Geometry,
                shaderc::ShaderKind::Compute,
            ]
        );
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("Pixel".parse::<ShaderStage>(), Ok(ShaderStage::Fragment));
        assert_eq!("HLSL".parse::<TargetLanguage>(), Ok(TargetLanguage::Hlsl));
        assert_eq!("essl".parse::<SourceLanguage>(), Ok(SourceLanguage::Essl));

        let err = "tess".parse::<ShaderStage>().unwrap_err();
        assert!(err.to_string().contains("\"tess\""), "{err}");
        assert!("msl".parse::<TargetLanguage>().is_err());
    }

    #[test]
    fn essl_is_glsl_family_with_es_flag() {
        assert_eq!(TargetLanguage::Essl.family(), TargetFamily::Glsl { es: true });
        assert_eq!(TargetLanguage::Glsl.family(), TargetFamily::Glsl { es: false });
        assert_eq!(TargetLanguage::Hlsl.family(), TargetFamily::Hlsl);
    }
}
