//! Shader stages and the shader objects contributing source to a program
//!
//! A program is assembled from one geometric shader, which knows the primitive being drawn,
//! and any number of shader codes (material, lighting, render pass). Both expose per-stage
//! source text and a per-stage resource layout.

use crate::layout::LayoutEntry;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage of a generated program
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEval,
    Geometry,
    Fragment,
    Compute,
    /// Control stage of the post-tessellation model, run before the tessellator as a vertex-like pass
    PostTessControl,
    /// Vertex stage of the post-tessellation model, run once per tessellated vertex
    PostTessVertex,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 8] = [
        ShaderStage::Vertex,
        ShaderStage::TessControl,
        ShaderStage::TessEval,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
        ShaderStage::PostTessControl,
        ShaderStage::PostTessVertex,
    ];

    /// Abbreviation used in generated block names (`PrimvarsVS`)
    pub fn abbreviation(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VS",
            ShaderStage::TessControl => "TCS",
            ShaderStage::TessEval => "TES",
            ShaderStage::Geometry => "GS",
            ShaderStage::Fragment => "FS",
            ShaderStage::Compute => "CS",
            ShaderStage::PostTessControl => "PTCS",
            ShaderStage::PostTessVertex => "PTVS",
        }
    }

    /// Prefix of the plumbed values a stage writes for its successor (`vsDrawingCoord0`)
    pub fn prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::TessControl => "tcs",
            ShaderStage::TessEval => "tes",
            ShaderStage::Geometry => "gs",
            ShaderStage::Fragment => "fs",
            ShaderStage::Compute => "cs",
            ShaderStage::PostTessControl => "ptcs",
            ShaderStage::PostTessVertex => "ptvs",
        }
    }

    /// Returns true if per-vertex inputs of this stage are arrays over the incoming primitive
    pub fn has_arrayed_input(self) -> bool {
        matches!(self, ShaderStage::TessControl | ShaderStage::TessEval | ShaderStage::Geometry)
    }

    /// Returns true if per-vertex outputs of this stage are arrays over the outgoing patch
    pub fn has_arrayed_output(self) -> bool {
        self == ShaderStage::TessControl
    }

    /// Returns true if this stage reads the raw per-draw drawing coordinate instead of a plumbed copy
    pub fn reads_raw_drawing_coord(self) -> bool {
        matches!(self, ShaderStage::Vertex | ShaderStage::PostTessControl | ShaderStage::PostTessVertex)
    }

    /// Returns true if the hardware exposes a primitive index to this stage
    pub fn has_primitive_id(self) -> bool {
        matches!(self, ShaderStage::TessControl | ShaderStage::TessEval | ShaderStage::Geometry | ShaderStage::Fragment | ShaderStage::PostTessVertex)
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

bitflags! {
    /// Set of stages a generated item or resource is visible in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageMask: u32 {
        const VERTEX = 1 << 0;
        const TESS_CONTROL = 1 << 1;
        const TESS_EVAL = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
        const POST_TESS_CONTROL = 1 << 6;
        const POST_TESS_VERTEX = 1 << 7;
    }
}

impl From<ShaderStage> for StageMask {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => StageMask::VERTEX,
            ShaderStage::TessControl => StageMask::TESS_CONTROL,
            ShaderStage::TessEval => StageMask::TESS_EVAL,
            ShaderStage::Geometry => StageMask::GEOMETRY,
            ShaderStage::Fragment => StageMask::FRAGMENT,
            ShaderStage::Compute => StageMask::COMPUTE,
            ShaderStage::PostTessControl => StageMask::POST_TESS_CONTROL,
            ShaderStage::PostTessVertex => StageMask::POST_TESS_VERTEX,
        }
    }
}

impl StageMask {
    /// Returns true if the given stage is part of this set
    pub fn has(self, stage: ShaderStage) -> bool {
        self.contains(StageMask::from(stage))
    }

    /// Iterates the member stages in pipeline order
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL.into_iter().filter(move |stage| self.has(*stage))
    }
}

/// Source text contributed to each stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSources {
    pub vertex: String,
    pub tess_control: String,
    pub tess_eval: String,
    pub geometry: String,
    pub fragment: String,
    pub compute: String,
    pub post_tess_control: String,
    pub post_tess_vertex: String,
}

impl StageSources {
    pub fn get(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::TessControl => &self.tess_control,
            ShaderStage::TessEval => &self.tess_eval,
            ShaderStage::Geometry => &self.geometry,
            ShaderStage::Fragment => &self.fragment,
            ShaderStage::Compute => &self.compute,
            ShaderStage::PostTessControl => &self.post_tess_control,
            ShaderStage::PostTessVertex => &self.post_tess_vertex,
        }
    }
}

/// Resource layout entries declared for each stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageLayouts {
    pub vertex: Vec<LayoutEntry>,
    pub tess_control: Vec<LayoutEntry>,
    pub tess_eval: Vec<LayoutEntry>,
    pub geometry: Vec<LayoutEntry>,
    pub fragment: Vec<LayoutEntry>,
    pub compute: Vec<LayoutEntry>,
    pub post_tess_control: Vec<LayoutEntry>,
    pub post_tess_vertex: Vec<LayoutEntry>,
}

impl StageLayouts {
    pub fn get(&self, stage: ShaderStage) -> &[LayoutEntry] {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::TessControl => &self.tess_control,
            ShaderStage::TessEval => &self.tess_eval,
            ShaderStage::Geometry => &self.geometry,
            ShaderStage::Fragment => &self.fragment,
            ShaderStage::Compute => &self.compute,
            ShaderStage::PostTessControl => &self.post_tess_control,
            ShaderStage::PostTessVertex => &self.post_tess_vertex,
        }
    }
}

/// Primitive a geometric shader rasterizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Points,
    BasisCurvesLines,
    BasisCurvesLinearPatches,
    BasisCurvesCubicPatches,
    MeshCoarseTriangles,
    MeshRefinedTriangles,
    MeshCoarseQuads,
    MeshRefinedQuads,
    /// Quads drawn as triangle pairs
    MeshCoarseTriQuads,
    MeshRefinedTriQuads,
    MeshBSpline,
    MeshBoxSplineTriangle,
    Volume,
    Compute,
}

impl PrimitiveType {
    pub fn is_points(self) -> bool {
        self == PrimitiveType::Points
    }

    pub fn is_curves(self) -> bool {
        matches!(self, PrimitiveType::BasisCurvesLines | PrimitiveType::BasisCurvesLinearPatches | PrimitiveType::BasisCurvesCubicPatches)
    }

    pub fn is_mesh(self) -> bool {
        matches!(
            self,
            PrimitiveType::MeshCoarseTriangles
                | PrimitiveType::MeshRefinedTriangles
                | PrimitiveType::MeshCoarseQuads
                | PrimitiveType::MeshRefinedQuads
                | PrimitiveType::MeshCoarseTriQuads
                | PrimitiveType::MeshRefinedTriQuads
                | PrimitiveType::MeshBSpline
                | PrimitiveType::MeshBoxSplineTriangle
        )
    }

    /// Returns true for meshes produced by uniform or adaptive subdivision
    pub fn is_refined(self) -> bool {
        matches!(
            self,
            PrimitiveType::MeshRefinedTriangles | PrimitiveType::MeshRefinedQuads | PrimitiveType::MeshRefinedTriQuads | PrimitiveType::MeshBSpline | PrimitiveType::MeshBoxSplineTriangle
        )
    }

    /// Returns true for primitives submitted as tessellation patches
    pub fn is_patches(self) -> bool {
        matches!(
            self,
            PrimitiveType::BasisCurvesLinearPatches | PrimitiveType::BasisCurvesCubicPatches | PrimitiveType::MeshBSpline | PrimitiveType::MeshBoxSplineTriangle
        )
    }

    pub fn is_quads(self) -> bool {
        matches!(self, PrimitiveType::MeshCoarseQuads | PrimitiveType::MeshRefinedQuads)
    }

    pub fn is_triangles(self) -> bool {
        matches!(self, PrimitiveType::MeshCoarseTriangles | PrimitiveType::MeshRefinedTriangles)
    }

    pub fn is_tri_quads(self) -> bool {
        matches!(self, PrimitiveType::MeshCoarseTriQuads | PrimitiveType::MeshRefinedTriQuads)
    }

    /// Number of indices per primitive in the index buffer
    pub fn primitive_index_size(self) -> u32 {
        match self {
            PrimitiveType::Points => 1,
            PrimitiveType::BasisCurvesLines | PrimitiveType::BasisCurvesLinearPatches => 2,
            PrimitiveType::BasisCurvesCubicPatches => 4,
            PrimitiveType::MeshCoarseTriangles | PrimitiveType::MeshRefinedTriangles | PrimitiveType::MeshCoarseTriQuads | PrimitiveType::MeshRefinedTriQuads => 3,
            PrimitiveType::MeshCoarseQuads | PrimitiveType::MeshRefinedQuads => 4,
            PrimitiveType::MeshBSpline => 16,
            PrimitiveType::MeshBoxSplineTriangle => 12,
            PrimitiveType::Volume => 3,
            PrimitiveType::Compute => 0,
        }
    }

    /// Number of control points the patch evaluator consumes, zero for non-patch primitives
    pub fn num_patch_eval_verts(self) -> u32 {
        match self {
            PrimitiveType::BasisCurvesLinearPatches => 2,
            PrimitiveType::BasisCurvesCubicPatches => 4,
            PrimitiveType::MeshBSpline => 16,
            PrimitiveType::MeshBoxSplineTriangle => 12,
            _ => 0,
        }
    }

    /// Number of vertices per primitive visible to a geometry stage
    pub fn num_primitive_verts_for_gs(self) -> u32 {
        match self {
            PrimitiveType::Points => 1,
            PrimitiveType::BasisCurvesLines => 2,
            PrimitiveType::MeshCoarseQuads | PrimitiveType::MeshRefinedQuads => 4,
            PrimitiveType::Compute => 0,
            // Tessellated patches and every triangle-based primitive arrive as triangles
            _ => 3,
        }
    }
}

/// Patch layout of face-varying data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FvarPatchType {
    #[default]
    None,
    CoarseQuads,
    RefinedQuads,
    CoarseTriangles,
    RefinedTriangles,
    BSpline,
    BoxSplineTriangle,
}

impl FvarPatchType {
    /// Returns true if face-varying values are addressed through a refined index buffer
    pub fn is_refined(self) -> bool {
        matches!(self, FvarPatchType::RefinedQuads | FvarPatchType::RefinedTriangles | FvarPatchType::BSpline | FvarPatchType::BoxSplineTriangle)
    }

    /// Returns true if face-varying values are evaluated against spline patch bases
    pub fn is_spline(self) -> bool {
        matches!(self, FvarPatchType::BSpline | FvarPatchType::BoxSplineTriangle)
    }
}

/// Shader object that knows the primitive being drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricShader {
    pub primitive_type: PrimitiveType,
    #[serde(default)]
    pub fvar_patch_type: FvarPatchType,
    #[serde(default)]
    pub sources: StageSources,
    #[serde(default)]
    pub layout: StageLayouts,
}

impl GeometricShader {
    /// Number of face-varying samples per primitive
    pub fn fvar_corner_count(&self) -> u32 {
        match self.fvar_patch_type {
            FvarPatchType::CoarseQuads | FvarPatchType::RefinedQuads => 4,
            FvarPatchType::CoarseTriangles | FvarPatchType::RefinedTriangles => 3,
            FvarPatchType::BSpline => 16,
            FvarPatchType::BoxSplineTriangle => 12,
            FvarPatchType::None if self.primitive_type.is_quads() || self.primitive_type.is_tri_quads() => 4,
            FvarPatchType::None if self.primitive_type.is_triangles() => 3,
            FvarPatchType::None => 1,
        }
    }

    /// Returns true if the program needs the external patch-evaluation library
    pub fn uses_patch_evaluation(&self) -> bool {
        self.primitive_type.is_refined() || self.fvar_patch_type.is_spline()
    }

    /// Layout qualifier name of the geometry-stage input primitive
    pub fn geometry_input_primitive(&self) -> &'static str {
        match self.primitive_type.num_primitive_verts_for_gs() {
            1 => "points",
            2 => "lines",
            4 => "lines_adjacency",
            _ => "triangles",
        }
    }
}

/// Shader object contributing material, lighting or render-pass code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderCode {
    pub name: String,
    #[serde(default)]
    pub sources: StageSources,
    #[serde(default)]
    pub layout: StageLayouts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mask_iteration_order() {
        let mask = StageMask::FRAGMENT | StageMask::VERTEX | StageMask::GEOMETRY;
        let stages: Vec<_> = mask.stages().collect();
        assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Geometry, ShaderStage::Fragment]);
        assert!(mask.has(ShaderStage::Geometry));
        assert!(!mask.has(ShaderStage::TessEval));
    }

    #[test]
    fn test_primitive_constants() {
        assert_eq!(PrimitiveType::MeshBSpline.primitive_index_size(), 16);
        assert_eq!(PrimitiveType::MeshBSpline.num_patch_eval_verts(), 16);
        assert_eq!(PrimitiveType::MeshBoxSplineTriangle.num_patch_eval_verts(), 12);
        assert_eq!(PrimitiveType::MeshCoarseTriQuads.primitive_index_size(), 3);
        assert_eq!(PrimitiveType::MeshCoarseQuads.num_primitive_verts_for_gs(), 4);
        assert_eq!(PrimitiveType::MeshBSpline.num_primitive_verts_for_gs(), 3);
        assert!(PrimitiveType::MeshRefinedQuads.is_refined());
        assert!(!PrimitiveType::MeshCoarseQuads.is_refined());
        assert!(PrimitiveType::BasisCurvesCubicPatches.is_patches());
    }

    #[test]
    fn test_fvar_corner_count() {
        let mut shader = GeometricShader {
            primitive_type: PrimitiveType::MeshCoarseTriQuads,
            fvar_patch_type: FvarPatchType::None,
            sources: StageSources::default(),
            layout: StageLayouts::default(),
        };
        assert_eq!(shader.fvar_corner_count(), 4);

        shader.fvar_patch_type = FvarPatchType::BoxSplineTriangle;
        assert_eq!(shader.fvar_corner_count(), 12);
        assert!(shader.uses_patch_evaluation());
    }

    #[test]
    fn test_geometric_shader_yaml() {
        let yaml = r#"
primitive_type: mesh_refined_quads
fvar_patch_type: refined_quads
sources:
  vertex: "void main() { ProcessPrimvarsIn(); }"
  fragment: "void main() {}"
"#;
        let shader: GeometricShader = serde_norway::from_str(yaml).unwrap();
        assert_eq!(shader.primitive_type, PrimitiveType::MeshRefinedQuads);
        assert_eq!(shader.fvar_patch_type, FvarPatchType::RefinedQuads);
        assert!(shader.sources.get(ShaderStage::Geometry).is_empty());
        assert!(shader.sources.get(ShaderStage::Vertex).contains("ProcessPrimvarsIn"));
    }
}
