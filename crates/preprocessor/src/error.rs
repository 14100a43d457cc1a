//! Failure taxonomy for the whole sandbox.
//!
//! Every fault raised by the preprocessor, the registries, or the frame loop
//! carries a stable [`ErrorCode`] so the hosting driver can route it into a
//! single user-facing error channel without string matching. The variants
//! keep their structured fields (module name, function name, line, expected
//! and actual types) for diagnostics.

use std::fmt;

use thiserror::Error;

use crate::types::{GlslType, GlslVersion};

/// Stable machine-readable classification of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Context,
    Shader,
    Module,
    Validation,
    Program,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Context => "CONTEXT_ERROR",
            Self::Shader => "SHADER_ERROR",
            Self::Module => "MODULE_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Program => "PROGRAM_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any fault the sandbox can surface to its driver.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SandboxError {
    #[error("invalid import at line {line}: {detail}")]
    ImportSyntax { line: usize, detail: String },

    #[error("duplicate import alias '{alias}' at line {line}")]
    DuplicateAlias { alias: String, line: usize },

    #[error("'{0}' is reserved and cannot be imported")]
    ReservedFunction(String),

    #[error("shader source declares no function")]
    MissingFunction,

    #[error("uniform '{name}' is declared as {actual} but {expected} is required")]
    UniformTypeConflict {
        name: String,
        expected: GlslType,
        actual: GlslType,
    },

    #[error("module '{0}' is not registered")]
    ModuleNotFound(String),

    #[error("module '{module}' does not define '{function}'")]
    FunctionNotFound { module: String, function: String },

    #[error("module name '{0}' is reserved")]
    ReservedModuleName(String),

    #[error("module '{0}' is already defined")]
    ModuleAlreadyDefined(String),

    #[error("vertex shader targets {vertex} but fragment shader targets {fragment}")]
    VersionMismatch {
        vertex: GlslVersion,
        fragment: GlslVersion,
    },

    #[error("failed to link shader program: {0}")]
    ProgramLink(String),

    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("hook {id} failed: {message}")]
    HookFailed { id: u64, message: String },
}

impl SandboxError {
    /// The stable code the driver reports for this fault.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ImportSyntax { .. }
            | Self::DuplicateAlias { .. }
            | Self::ReservedFunction(_)
            | Self::MissingFunction
            | Self::UniformTypeConflict { .. } => ErrorCode::Shader,
            Self::ModuleNotFound(_)
            | Self::FunctionNotFound { .. }
            | Self::ReservedModuleName(_)
            | Self::ModuleAlreadyDefined(_) => ErrorCode::Module,
            Self::VersionMismatch { .. } => ErrorCode::Validation,
            Self::ProgramLink(_) => ErrorCode::Program,
            Self::ContextUnavailable(_) => ErrorCode::Context,
            Self::HookFailed { .. } => ErrorCode::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(ErrorCode::Shader.as_str(), "SHADER_ERROR");
        assert_eq!(ErrorCode::Module.as_str(), "MODULE_ERROR");
        assert_eq!(ErrorCode::Unknown.as_str(), "UNKNOWN_ERROR");
    }

    #[test]
    fn faults_map_to_their_group() {
        let err = SandboxError::ImportSyntax {
            line: 3,
            detail: "missing 'from' clause".into(),
        };
        assert_eq!(err.code(), ErrorCode::Shader);

        let err = SandboxError::ModuleNotFound("fx".into());
        assert_eq!(err.code(), ErrorCode::Module);

        let err = SandboxError::UniformTypeConflict {
            name: "u_time".into(),
            expected: GlslType::Float,
            actual: GlslType::Vec4,
        };
        assert_eq!(err.code(), ErrorCode::Shader);
        assert!(err.to_string().contains("vec4"));
        assert!(err.to_string().contains("float"));
    }
}
