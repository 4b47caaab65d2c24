//! Primvar shader code generation
//!
//! This crate generates the per-stage GLSL sources of a draw program (or compute program) from
//! resource-binder metadata: the `HdGet_<name>` accessor functions shader snippets read primvars
//! and material parameters through, the interstage plumbing carrying primvars between stages, and
//! the resource declarations with every slot, location and binding assigned.
//!
//! The usual entry point is [`CodeGen`]; [`DrawBatchManifest`] loads all of its inputs from YAML.

pub mod assemble;
pub mod binding;
pub mod capabilities;
pub mod compile;
pub mod context;
pub mod error;
pub mod hash;
pub mod ir;
pub mod layout;
pub mod manifest;
pub mod packed;
pub mod resource;
pub mod shader;

pub use binding::{Binding, BindingKind, MetaData, ShaderParameter};
pub use capabilities::Capabilities;
pub use compile::{AssembledStage, Backend, CodeGen, CompileOptions, CompiledProgram, ProgramHandle, RecordingBackend, ResourcePipeline, StageHandle};
pub use error::CompileError;
pub use manifest::{DrawBatchManifest, ManifestError};
pub use packed::DataType;
pub use resource::FunctionDescriptor;
pub use shader::{GeometricShader, ShaderCode, ShaderStage, StageMask};

/// Loads a manifest file and compiles it against `backend`
///
/// # Arguments
/// * `manifest_filepath` - Path to the YAML draw-batch manifest
/// * `backend` - Compiler and linker receiving the assembled stages
///
/// # Returns
/// The linked program with its assembled stages and cache key
pub fn compile_manifest(manifest_filepath: &str, backend: &mut dyn Backend) -> Result<CompiledProgram, Box<dyn std::error::Error>> {
    let manifest = DrawBatchManifest::from_file(manifest_filepath)?;
    let mut code_gen = manifest.code_gen()?;
    Ok(code_gen.compile(backend)?)
}
