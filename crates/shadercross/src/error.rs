use std::error::Error as StdError;

use shadercross_spirv::SpirvError;
use thiserror::Error;

use crate::stage::ShaderStage;

/// Which half of the pipeline a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source text could not be compiled to IR.
    FrontEnd,
    /// IR could not be parsed, rewritten or serialized to target text.
    BackEnd,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: {message}")]
    FrontEnd { stage: ShaderStage, message: String },
    #[error("invalid SPIR-V: {0}")]
    IrParse(#[from] SpirvError),
    #[error("{0}")]
    Compile(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::FrontEnd { .. } => ErrorKind::FrontEnd,
            PipelineError::IrParse(_) | PipelineError::Compile(_) => ErrorKind::BackEnd,
        }
    }

    pub(crate) fn front_end(stage: ShaderStage, message: impl Into<String>) -> Self {
        PipelineError::FrontEnd {
            stage,
            message: message.into(),
        }
    }
}

/// Maps a code generator failure, which carries at most a message, to a back-end error.
pub(crate) fn codegen_error(context: &str, err: spirv_cross::ErrorCode) -> PipelineError {
    match err {
        spirv_cross::ErrorCode::CompilationError(message) => {
            PipelineError::Compile(format!("{context}: {message}"))
        }
        spirv_cross::ErrorCode::Unhandled => {
            PipelineError::Compile(format!("{context}: unhandled code generator error"))
        }
    }
}

/// Renders an error and its `source()` chain, outermost first.
///
/// Wrapped tools often keep the useful detail in a nested source, so `Display` alone would drop
/// it.
pub(crate) fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner detail")]
    struct Inner;

    #[test]
    fn describe_walks_the_source_chain() {
        assert_eq!(describe(&Outer(Inner)), "outer: inner detail");
    }

    #[test]
    fn kinds() {
        assert_eq!(
            PipelineError::front_end(ShaderStage::Fragment, "boom").kind(),
            ErrorKind::FrontEnd
        );
        assert_eq!(
            PipelineError::from(SpirvError::NoEntryPoints).kind(),
            ErrorKind::BackEnd
        );
        assert_eq!(
            PipelineError::Compile("x".into()).kind(),
            ErrorKind::BackEnd
        );
    }

    #[test]
    fn code_generator_messages_are_kept() {
        let err = codegen_error(
            "GLSL generation failed",
            spirv_cross::ErrorCode::CompilationError("unsupported execution model".into()),
        );
        assert_eq!(err.kind(), ErrorKind::BackEnd);
        assert_eq!(
            err.to_string(),
            "GLSL generation failed: unsupported execution model"
        );
    }

    #[test]
    fn front_end_errors_are_prefixed_with_the_stage() {
        let err = PipelineError::front_end(ShaderStage::Vertex, "0:3: syntax error");
        assert_eq!(err.to_string(), "vertex: 0:3: syntax error");
    }
}
