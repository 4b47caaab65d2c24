//! Compile errors
//!
//! Only whole-compile failures are errors. Malformed bindings and similar local problems are
//! logged and skipped so the rest of the program still generates.

use crate::shader::ShaderStage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no geometric shader was provided")]
    MissingGeometricShader,
    #[error("no resource-binder metadata was provided")]
    MissingMetaData,
    #[error("{stage} stage failed to compile: {log}")]
    StageCompileFailed { stage: ShaderStage, log: String },
    #[error("program failed to link: {0}")]
    LinkFailed(String),
}
