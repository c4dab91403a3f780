use crate::error::{ErrorKind, PipelineError};

/// Outcome of one pipeline call: bytes on success, a diagnostic on failure, never both.
///
/// Fields are private so the invariant holds by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    bytes: Option<Vec<u8>>,
    error: String,
    error_kind: Option<ErrorKind>,
}

impl CompiledArtifact {
    pub fn success(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            error: String::new(),
            error_kind: None,
        }
    }

    pub fn failure(err: &PipelineError) -> Self {
        let mut error = err.to_string();
        if error.is_empty() {
            error = "unknown error".to_owned();
        }
        Self {
            bytes: None,
            error,
            error_kind: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.bytes.is_some()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.bytes
    }

    /// Output as UTF-8 text, for transpile results.
    pub fn text(&self) -> Option<&str> {
        self.bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Empty on success.
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }
}

impl From<Result<Vec<u8>, PipelineError>> for CompiledArtifact {
    fn from(result: Result<Vec<u8>, PipelineError>) -> Self {
        match result {
            Ok(bytes) => CompiledArtifact::success(bytes),
            Err(err) => CompiledArtifact::failure(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_bytes_and_no_error() {
        let artifact = CompiledArtifact::success(b"void main() {}".to_vec());
        assert!(artifact.is_success());
        assert_eq!(artifact.error(), "");
        assert_eq!(artifact.error_kind(), None);
        assert_eq!(artifact.text(), Some("void main() {}"));
    }

    #[test]
    fn failure_carries_error_and_no_bytes() {
        let artifact = CompiledArtifact::failure(&PipelineError::Compile(String::new()));
        assert!(!artifact.is_success());
        assert_eq!(artifact.bytes(), None);
        assert!(!artifact.error().is_empty());
        assert_eq!(artifact.error_kind(), Some(ErrorKind::BackEnd));
    }
}
