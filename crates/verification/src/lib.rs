//! Verification utilities for primvar code generation
//!
//! This crate checks generated programs from two sides: [`parity`] proves the textual and
//! descriptor resource pipelines declare the same resources, and [`naga_backend`] runs the
//! assembled stages through naga's GLSL front end as a stand-in device compiler.

pub mod naga_backend;
pub mod parity;

use primvar_codegen::{CompileError, ManifestError, ShaderStage};
use thiserror::Error;

/// Errors raised while verifying a manifest
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{0} stages cannot be validated with naga")]
    UnsupportedStage(ShaderStage),
    #[error("{stage} stage failed to parse: {message}")]
    Parse { stage: ShaderStage, message: String },
    #[error("{stage} stage failed validation: {message}")]
    Validation { stage: ShaderStage, message: String },
}
