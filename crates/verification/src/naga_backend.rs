//! naga-backed compile backend
//!
//! Parses and validates assembled stages with naga's GLSL front end. naga only accepts vertex,
//! fragment and compute shaders, so tessellation, geometry and post-tessellation stages are
//! reported as unsupported rather than silently passed.

use crate::VerifyError;
use primvar_codegen::{AssembledStage, Backend, ProgramHandle, ShaderStage, StageHandle};

fn naga_stage(stage: ShaderStage) -> Option<naga::ShaderStage> {
    match stage {
        ShaderStage::Vertex => Some(naga::ShaderStage::Vertex),
        ShaderStage::Fragment => Some(naga::ShaderStage::Fragment),
        ShaderStage::Compute => Some(naga::ShaderStage::Compute),
        _ => None,
    }
}

/// Parses and validates one stage's GLSL source
///
/// # Arguments
/// * `source` - Complete GLSL source, `#version` line included
/// * `stage` - Stage the source belongs to
///
/// # Returns
/// The validated naga module
pub fn validate_glsl(source: &str, stage: ShaderStage) -> Result<naga::Module, VerifyError> {
    let shader_stage = naga_stage(stage).ok_or(VerifyError::UnsupportedStage(stage))?;

    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options {
        stage: shader_stage,
        defines: Default::default(),
    };
    let module = frontend.parse(&options, source).map_err(|e| VerifyError::Parse { stage, message: format!("{e:?}") })?;

    naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
        .validate(&module)
        .map_err(|e| VerifyError::Validation { stage, message: format!("{e:?}") })?;

    Ok(module)
}

/// Backend validating every stage with naga
///
/// Linking only checks that every handle names a validated stage; naga has no program objects.
#[derive(Debug, Default)]
pub struct NagaBackend {
    modules: Vec<(ShaderStage, naga::Module)>,
}

impl NagaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validated modules in submission order
    pub fn modules(&self) -> &[(ShaderStage, naga::Module)] {
        &self.modules
    }
}

impl Backend for NagaBackend {
    fn compile_stage(&mut self, stage: &AssembledStage) -> Result<StageHandle, String> {
        let module = validate_glsl(&stage.source, stage.stage).map_err(|e| e.to_string())?;
        self.modules.push((stage.stage, module));
        Ok(StageHandle(self.modules.len() as u32 - 1))
    }

    fn link_program(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle, String> {
        if stages.is_empty() {
            return Err("no stages to link".to_string());
        }
        for handle in stages {
            if handle.0 as usize >= self.modules.len() {
                return Err(format!("unknown stage handle {}", handle.0));
            }
        }
        Ok(ProgramHandle(stages[0].0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"#version 450
layout(location = 0) in vec3 color;
layout(location = 0) out vec4 colorOut;
vec3 HdGet_color() {
    return color;
}
void main() {
    colorOut = vec4(HdGet_color(), 1.0);
}
"#;

    #[test]
    fn test_valid_fragment() {
        assert!(validate_glsl(FRAGMENT, ShaderStage::Fragment).is_ok());
    }

    #[test]
    fn test_invalid_source() {
        let source = "#version 450\nvoid main() {\n    undeclared = 1.0;\n}\n";
        assert!(matches!(validate_glsl(source, ShaderStage::Vertex), Err(VerifyError::Parse { .. })));
    }

    #[test]
    fn test_unsupported_stage() {
        assert!(matches!(validate_glsl(FRAGMENT, ShaderStage::Geometry), Err(VerifyError::UnsupportedStage(ShaderStage::Geometry))));
    }

    #[test]
    fn test_backend_links_validated_stages() {
        let mut backend = NagaBackend::new();
        let stage = AssembledStage {
            stage: ShaderStage::Fragment,
            source: FRAGMENT.to_string(),
            resources: String::new(),
            descriptor: None,
        };
        let handle = backend.compile_stage(&stage).unwrap();
        assert_eq!(backend.modules().len(), 1);
        assert!(backend.link_program(&[handle]).is_ok());
        assert!(backend.link_program(&[StageHandle(7)]).is_err());
    }
}
