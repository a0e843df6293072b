use serde::{Deserialize, Serialize};
use thiserror::Error;

use tabflow_core::Error as CoreError;

/// Result type local to tabflow-exec.
pub type Result<T> = std::result::Result<T, ExecError>;

/// Coarse classification carried by every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    Unknown,
    Internal,
    Invalid,
    Canceled,
    NotFound,
    Unavailable,
}

#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// An operator failure annotated with where the operator came from.
    #[error("runtime error{}: {source}", at(.source_info))]
    Runtime {
        source_info: Option<String>,
        source: Box<ExecError>,
    },

    /// Raised by transformation code.
    #[error("{message}")]
    Transformation { code: Code, message: String },

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("dispatcher: {0}")]
    Dispatcher(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

fn at(source_info: &Option<String>) -> String {
    match source_info {
        Some(s) => format!(" {s}"),
        None => String::new(),
    }
}

impl ExecError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        ExecError::Transformation {
            code,
            message: message.into(),
        }
    }

    /// Annotate with operator provenance. The code is inherited.
    pub fn with_source_info(self, source_info: Option<String>) -> Self {
        ExecError::Runtime {
            source_info,
            source: Box::new(self),
        }
    }

    pub fn code(&self) -> Code {
        match self {
            ExecError::Runtime { source, .. } => source.code(),
            ExecError::Transformation { code, .. } => *code,
            ExecError::Canceled(_) => Code::Canceled,
            ExecError::Internal(_) | ExecError::Dispatcher(_) => Code::Internal,
            ExecError::Core(CoreError::Invariant(_)) => Code::Internal,
            ExecError::Core(_) => Code::Invalid,
        }
    }

    /// The innermost error, with every provenance layer removed.
    pub fn root_cause(&self) -> &ExecError {
        match self {
            ExecError::Runtime { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_wrap_renders_source_info() {
        let err = ExecError::new(Code::Invalid, "boom")
            .with_source_info(Some("@main.tf|3:1-3:9: dedup".into()));
        assert_eq!(err.to_string(), "runtime error @main.tf|3:1-3:9: dedup: boom");
        assert_eq!(err.code(), Code::Invalid);
        assert_eq!(err.root_cause().to_string(), "boom");
    }

    #[test]
    fn runtime_wrap_without_stack_omits_annotation() {
        let err = ExecError::Canceled("query stopped".into()).with_source_info(None);
        assert_eq!(err.to_string(), "runtime error: canceled: query stopped");
        assert_eq!(err.code(), Code::Canceled);
    }

    #[test]
    fn core_errors_map_to_codes() {
        let err: ExecError = CoreError::Table("bad".into()).into();
        assert_eq!(err.code(), Code::Invalid);
        let err: ExecError = CoreError::Invariant("bad".into()).into();
        assert_eq!(err.code(), Code::Internal);
    }
}
