//! Draw-Batch Manifest Parser
//!
//! YAML description of one draw batch (or compute program): every input of a compile in one
//! file, so the command-line tools can run code generation without a renderer behind them.

use crate::binding::{MetaData, ParameterKind};
use crate::capabilities::{Capabilities, PRESET_NAMES};
use crate::compile::{CodeGen, CompileOptions};
use crate::shader::{GeometricShader, ShaderCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Capabilities given by preset name or spelled out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilitySource {
    Preset(String),
    Inline(Capabilities),
}

impl Default for CapabilitySource {
    fn default() -> Self {
        CapabilitySource::Preset("opengl".to_string())
    }
}

impl CapabilitySource {
    pub fn resolve(&self) -> Option<Capabilities> {
        match self {
            CapabilitySource::Preset(name) => Capabilities::preset(name),
            CapabilitySource::Inline(capabilities) => Some(*capabilities),
        }
    }
}

/// Every input of one compile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawBatchManifest {
    pub id: String,
    /// Generates a compute program from the compute sources instead of a draw program
    #[serde(default)]
    pub compute: bool,
    #[serde(default)]
    pub geometric_shader: Option<GeometricShader>,
    #[serde(default)]
    pub shaders: Vec<ShaderCode>,
    #[serde(default)]
    pub metadata: Option<MetaData>,
    #[serde(default)]
    pub capabilities: CapabilitySource,
    #[serde(default)]
    pub material_tag: String,
    #[serde(default)]
    pub options: CompileOptions,
}

/// Errors loading a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Yaml(#[from] serde_norway::Error),
    #[error("invalid manifest: {0}")]
    Validation(#[from] ManifestValidationError),
}

/// Structural problems found by [`DrawBatchManifest::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidationError {
    /// Manifest ID field is empty
    EmptyId,
    /// Capability preset name not known (preset name)
    UnknownPreset(String),
    /// Draw manifest without a geometric shader
    MissingGeometricShader,
    /// Two primvars share a name (category, name)
    DuplicatePrimvar(&'static str, String),
    /// Instance primvar authored at a level the instancer does not have (name, level, levels)
    InstanceLevelOutOfRange(String, u32, u32),
    /// Primvar redirect or transform without a source primvar (parameter name)
    MissingRedirectTarget(String),
    /// Texture-backed parameter without a texel binding (parameter name)
    TextureWithoutBinding(String),
}

impl fmt::Display for ManifestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "Manifest ID cannot be empty"),
            Self::UnknownPreset(name) => write!(f, "Unknown capability preset '{name}', expected one of {}", PRESET_NAMES.join(", ")),
            Self::MissingGeometricShader => write!(f, "Draw manifests need a geometric shader"),
            Self::DuplicatePrimvar(category, name) => write!(f, "Primvar '{name}' ({category}) is declared more than once"),
            Self::InstanceLevelOutOfRange(name, level, levels) => {
                write!(f, "Instance primvar '{name}' uses level {level} but the instancer has {levels} levels")
            }
            Self::MissingRedirectTarget(name) => write!(f, "Parameter '{name}' names no source primvar"),
            Self::TextureWithoutBinding(name) => write!(f, "Texture parameter '{name}' has no binding"),
        }
    }
}

impl std::error::Error for ManifestValidationError {}

impl DrawBatchManifest {
    /// Parses a manifest from YAML text
    pub fn from_yaml(yaml_content: &str) -> Result<Self, ManifestError> {
        Ok(serde_norway::from_str(yaml_content)?)
    }

    /// Parses and validates a manifest file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML manifest file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        let manifest = Self::from_yaml(&content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks structural sanity before compilation
    ///
    /// Problems code generation only skips with a diagnostic are rejected here up front.
    pub fn validate(&self) -> Result<(), ManifestValidationError> {
        if self.id.is_empty() {
            return Err(ManifestValidationError::EmptyId);
        }
        if let CapabilitySource::Preset(name) = &self.capabilities {
            if Capabilities::preset(name).is_none() {
                return Err(ManifestValidationError::UnknownPreset(name.clone()));
            }
        }
        if !self.compute && self.geometric_shader.is_none() {
            return Err(ManifestValidationError::MissingGeometricShader);
        }

        let Some(metadata) = &self.metadata else {
            return Ok(());
        };
        let mut names = HashSet::new();
        for (category, name) in metadata.primvar_names() {
            if !names.insert(name) {
                return Err(ManifestValidationError::DuplicatePrimvar(category, name.to_string()));
            }
        }
        for primvar in &metadata.instance_data {
            if primvar.level >= metadata.instancer_num_levels {
                return Err(ManifestValidationError::InstanceLevelOutOfRange(primvar.name.clone(), primvar.level, metadata.instancer_num_levels));
            }
        }
        for parameter in &metadata.shader_parameters {
            match parameter.kind {
                ParameterKind::PrimvarRedirect | ParameterKind::Transform2d if parameter.in_primvars.is_empty() => {
                    return Err(ManifestValidationError::MissingRedirectTarget(parameter.name.clone()));
                }
                ParameterKind::Texture | ParameterKind::Field | ParameterKind::Ptex | ParameterKind::Udim if parameter.binding.is_none() => {
                    return Err(ManifestValidationError::TextureWithoutBinding(parameter.name.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Code generator over the manifest's inputs
    pub fn code_gen(&self) -> Result<CodeGen<'_>, ManifestError> {
        let capabilities = match &self.capabilities {
            CapabilitySource::Preset(name) => Capabilities::preset(name).ok_or_else(|| ManifestValidationError::UnknownPreset(name.clone()))?,
            CapabilitySource::Inline(capabilities) => *capabilities,
        };
        let code_gen = if self.compute {
            CodeGen::new_compute(&self.shaders, self.metadata.as_ref(), capabilities)
        } else {
            CodeGen::new(self.geometric_shader.as_ref(), &self.shaders, self.metadata.as_ref(), capabilities, self.material_tag.clone())
        };
        Ok(code_gen.with_options(self.options.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{RecordingBackend, ResourcePipeline};
    use crate::packed::DataType;
    use crate::shader::{PrimitiveType, ShaderStage};

    const MESH_MANIFEST: &str = r#"
id: simple_mesh
capabilities: opengl
material_tag: defaultMaterialTag
options:
  resource_pipeline_override: textual
geometric_shader:
  primitive_type: mesh_coarse_triangles
  sources:
    vertex: |
      void main() {
          ProcessPrimvarsIn();
          gl_Position = vec4(HdGet_points(), 1.0);
      }
    fragment: |
      layout(location = 0) out vec4 colorOut;
      void main() {
          colorOut = vec4(HdGet_displayColor(), 1.0);
      }
metadata:
  drawing_coord0:
    kind: draw_index
    location: 0
  constant_data:
    - binding:
        kind: ssbo
        location: 2
      block_name: ConstantData
      var_name: constantPrimvars
      entries:
        - name: displayColor
          data_type: vec3
  vertex_data:
    - name: points
      data_type: vec3
      binding:
        kind: vertex_attr
        location: 1
"#;

    #[test]
    fn test_manifest_parsing() {
        let manifest = DrawBatchManifest::from_yaml(MESH_MANIFEST).unwrap();
        assert_eq!(manifest.id, "simple_mesh");
        assert_eq!(manifest.capabilities, CapabilitySource::Preset("opengl".to_string()));
        assert_eq!(manifest.options.resource_pipeline_override, Some(ResourcePipeline::Textual));
        let shader = manifest.geometric_shader.as_ref().unwrap();
        assert_eq!(shader.primitive_type, PrimitiveType::MeshCoarseTriangles);
        let metadata = manifest.metadata.as_ref().unwrap();
        assert_eq!(metadata.vertex_data[0].data_type, DataType::Vec3);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_manifest_compiles() {
        let manifest = DrawBatchManifest::from_yaml(MESH_MANIFEST).unwrap();
        let mut code_gen = manifest.code_gen().unwrap();
        let program = code_gen.compile(&mut RecordingBackend::new()).unwrap();
        assert_eq!(program.stages.len(), 2);
        assert!(program.stages.iter().all(|stage| stage.descriptor.is_none()));
        assert!(code_gen.generated_source(ShaderStage::Fragment).unwrap().contains("colorOut = vec4(HdGet_displayColor(), 1.0);"));
    }

    #[test]
    fn test_inline_capabilities() {
        let yaml = r#"
id: inline
compute: true
capabilities:
  glsl_version: 460
  function_descriptors: true
"#;
        let manifest = DrawBatchManifest::from_yaml(yaml).unwrap();
        let capabilities = manifest.capabilities.resolve().unwrap();
        assert_eq!(capabilities.glsl_version, 460);
        assert!(capabilities.function_descriptors);
        // Unlisted bits come from the default preset
        assert!(capabilities.shader_draw_parameters);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut manifest = DrawBatchManifest::from_yaml(MESH_MANIFEST).unwrap();
        manifest.capabilities = CapabilitySource::Preset("d3d12".to_string());
        assert_eq!(manifest.validate(), Err(ManifestValidationError::UnknownPreset("d3d12".to_string())));
        assert!(matches!(manifest.code_gen(), Err(ManifestError::Validation(_))));

        let mut manifest = DrawBatchManifest::from_yaml(MESH_MANIFEST).unwrap();
        let metadata = manifest.metadata.as_mut().unwrap();
        let mut duplicate = metadata.vertex_data[0].clone();
        duplicate.name = "displayColor".to_string();
        metadata.varying_data.push(duplicate);
        assert_eq!(manifest.validate(), Err(ManifestValidationError::DuplicatePrimvar("varying", "displayColor".to_string())));

        let yaml = r#"
id: redirect
geometric_shader:
  primitive_type: mesh_coarse_triangles
metadata:
  shader_parameters:
    - name: st
      data_type: vec2
      kind: primvar_redirect
"#;
        let manifest = DrawBatchManifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.validate(), Err(ManifestValidationError::MissingRedirectTarget("st".to_string())));
        assert_eq!(manifest.validate().unwrap_err().to_string(), "Parameter 'st' names no source primvar");
    }
}
