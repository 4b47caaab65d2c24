//! Resource pipeline parity
//!
//! Generates a manifest once per resource pipeline and compares the resource declarations of
//! every stage. Qualifier-only statements are left out of the comparison because only the
//! descriptor rendering carries them.

use crate::VerifyError;
use primvar_codegen::manifest::CapabilitySource;
use primvar_codegen::{AssembledStage, DrawBatchManifest, ResourcePipeline, ShaderStage};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)layout\([^)]*\)[^;{]*(\{[^}]*\}[^;]*)?;").expect("valid declaration pattern"));
static QUALIFIER_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^layout\([^)]*\)\s*(in|out)\s*;$").expect("valid qualifier pattern"));

/// Resource declarations of one stage, counted
pub fn declarations(resources: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for declaration in DECLARATION.find_iter(resources).map(|m| m.as_str().trim()) {
        if QUALIFIER_ONLY.is_match(declaration) {
            continue;
        }
        *counts.entry(declaration.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Declarations present in `left` more often than in `right`
fn surplus(left: &BTreeMap<String, usize>, right: &BTreeMap<String, usize>) -> Vec<String> {
    left.iter()
        .filter(|(declaration, count)| right.get(*declaration).copied().unwrap_or(0) < **count)
        .map(|(declaration, _)| declaration.clone())
        .collect()
}

/// Comparison of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageParity {
    pub stage: ShaderStage,
    /// Declared only by the textual pipeline
    pub textual_only: Vec<String>,
    /// Declared only by the descriptor pipeline
    pub descriptor_only: Vec<String>,
}

impl StageParity {
    pub fn is_match(&self) -> bool {
        self.textual_only.is_empty() && self.descriptor_only.is_empty()
    }
}

/// Comparison of one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityReport {
    pub id: String,
    pub stages: Vec<StageParity>,
    /// Stages generated by only one of the pipelines
    pub stage_mismatch: bool,
}

impl ParityReport {
    pub fn is_match(&self) -> bool {
        !self.stage_mismatch && self.stages.iter().all(StageParity::is_match)
    }
}

/// Compares already generated stages
pub fn compare_stages(id: &str, textual: &[AssembledStage], described: &[AssembledStage]) -> ParityReport {
    let stage_mismatch = textual.iter().map(|s| s.stage).ne(described.iter().map(|s| s.stage));
    let stages = textual
        .iter()
        .zip(described)
        .map(|(text, desc)| {
            let text_declarations = declarations(&text.resources);
            let desc_declarations = declarations(&desc.resources);
            StageParity {
                stage: text.stage,
                textual_only: surplus(&text_declarations, &desc_declarations),
                descriptor_only: surplus(&desc_declarations, &text_declarations),
            }
        })
        .collect();
    ParityReport {
        id: id.to_string(),
        stages,
        stage_mismatch,
    }
}

fn generate(manifest: &DrawBatchManifest, pipeline: ResourcePipeline) -> Result<Vec<AssembledStage>, VerifyError> {
    let mut manifest = manifest.clone();
    manifest.options.resource_pipeline_override = Some(pipeline);
    // Devices consuming descriptors natively would ignore the override
    let mut capabilities = manifest.code_gen()?.capabilities();
    capabilities.function_descriptors = false;
    manifest.capabilities = CapabilitySource::Inline(capabilities);

    let mut code_gen = manifest.code_gen()?;
    Ok(code_gen.generate()?.to_vec())
}

/// Generates a manifest through both resource pipelines and compares them
pub fn check_parity(manifest: &DrawBatchManifest) -> Result<ParityReport, VerifyError> {
    let textual = generate(manifest, ResourcePipeline::Textual)?;
    let described = generate(manifest, ResourcePipeline::Descriptor)?;
    tracing::debug!(manifest = %manifest.id, stages = textual.len(), "comparing resource pipelines");
    Ok(compare_stages(&manifest.id, &textual, &described))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(stage: ShaderStage, resources: &str) -> AssembledStage {
        AssembledStage {
            stage,
            source: String::new(),
            resources: resources.to_string(),
            descriptor: None,
        }
    }

    #[test]
    fn test_declarations_skip_qualifiers() {
        let resources = "layout(triangles, equal_spacing, ccw) in;\nlayout(location = 0) in vec3 points;\nlayout(location = 1) in PrimvarsTCS {\n    vec3 normals;\n} inPrimvars[];\n";
        let found = declarations(resources);
        assert_eq!(found.len(), 2);
        assert_eq!(found.get("layout(location = 0) in vec3 points;"), Some(&1));
        assert!(found.contains_key("layout(location = 1) in PrimvarsTCS {\n    vec3 normals;\n} inPrimvars[];"));
    }

    #[test]
    fn test_order_does_not_matter() {
        let textual = [stage(ShaderStage::Vertex, "layout(location = 1) in vec3 points;\nlayout(location = 0) uniform float exposure;\n")];
        let described = [stage(ShaderStage::Vertex, "layout(location = 0) uniform float exposure;\nlayout(location = 1) in vec3 points;\n")];
        assert!(compare_stages("batch", &textual, &described).is_match());
    }

    #[test]
    fn test_mismatch_reported() {
        let textual = [stage(ShaderStage::Fragment, "layout(location = 0) out vec4 colorOut;\n")];
        let described = [stage(ShaderStage::Fragment, "layout(location = 1) out vec4 colorOut;\n")];
        let report = compare_stages("batch", &textual, &described);
        assert!(!report.is_match());
        assert_eq!(report.stages[0].textual_only, vec!["layout(location = 0) out vec4 colorOut;".to_string()]);
        assert_eq!(report.stages[0].descriptor_only, vec!["layout(location = 1) out vec4 colorOut;".to_string()]);

        let missing = compare_stages("batch", &textual, &[]);
        assert!(missing.stage_mismatch);
    }

    #[test]
    fn test_generated_manifest_parity() {
        let yaml = r#"
id: parity
capabilities: vulkan
geometric_shader:
  primitive_type: mesh_coarse_triangles
  sources:
    vertex: "void main() { ProcessPrimvarsIn(); }"
    fragment: "layout(location = 0) out vec4 colorOut;\nvoid main() { colorOut = vec4(HdGet_normals(), 1.0); }"
metadata:
  drawing_coord0:
    kind: draw_index
    location: 0
  vertex_data:
    - name: normals
      data_type: vec3
      binding:
        kind: ssbo
        location: 3
"#;
        let manifest = DrawBatchManifest::from_yaml(yaml).unwrap();
        let report = check_parity(&manifest).unwrap();
        assert_eq!(report.stages.len(), 2);
        assert!(report.is_match(), "{report:?}");
    }
}
