//! Layout elements
//!
//! A layout element is one declared resource of one stage: an interface value or block, a
//! uniform, a storage buffer, a texture, or a qualifier-only statement such as the tessellation
//! topology. Elements carry no slot numbers of their own beyond explicit bindings; the resource
//! generator assigns the rest.

use crate::packed::DataType;
use serde::{Deserialize, Serialize};

/// Shape of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Value,
    Block,
    UniformValue,
    UniformBlock,
    UniformBlockConstantParams,
    BufferReadOnly,
    BufferReadWrite,
    Qualifier,
    Texture,
}

/// Direction of an interface element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InOut {
    StageIn,
    StageOut,
    #[default]
    None,
}

/// Interpolation or sampling qualifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    None,
    Flat,
    Centroid,
    Sample,
    Patch,
}

impl Interpolation {
    /// Qualifier keyword followed by a space, empty when unqualified
    pub fn keyword(self) -> &'static str {
        match self {
            Interpolation::None => "",
            Interpolation::Flat => "flat ",
            Interpolation::Centroid => "centroid ",
            Interpolation::Sample => "sample ",
            Interpolation::Patch => "patch ",
        }
    }
}

/// Array dimension of a declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArraySize {
    #[default]
    None,
    Unsized,
    /// Literal count or a symbolic constant such as `HD_NUM_PATCH_EVAL_VERTS`
    Sized(String),
}

impl ArraySize {
    pub fn sized(count: impl ToString) -> Self {
        ArraySize::Sized(count.to_string())
    }

    /// Maps the metadata convention (zero means not an array) to an array size
    pub fn from_count(count: u32) -> Self {
        if count == 0 { ArraySize::None } else { ArraySize::Sized(count.to_string()) }
    }

    pub fn is_none(&self) -> bool {
        *self == ArraySize::None
    }

    /// Declarator suffix (`""`, `"[]"`, `"[4]"`)
    pub fn suffix(&self) -> String {
        match self {
            ArraySize::None => String::new(),
            ArraySize::Unsized => "[]".to_string(),
            ArraySize::Sized(count) => format!("[{count}]"),
        }
    }

    /// Resolves the element count, looking symbolic sizes up in `constants`
    ///
    /// Unsized and unresolvable arrays count as one element.
    pub fn count(&self, constants: &dyn Fn(&str) -> Option<u32>) -> u32 {
        match self {
            ArraySize::None | ArraySize::Unsized => 1,
            ArraySize::Sized(count) => count.parse().ok().or_else(|| constants(count)).unwrap_or(1),
        }
    }
}

/// Member of a block element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub qualifier: Interpolation,
    #[serde(default)]
    pub array_size: ArraySize,
}

impl Member {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            qualifier: Interpolation::None,
            array_size: ArraySize::None,
        }
    }

    pub fn with_array_size(mut self, array_size: ArraySize) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Interpolation) -> Self {
        self.qualifier = qualifier;
        self
    }
}

/// Tessellation primitive generated from a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchType {
    Triangles,
    Quads,
    Isolines,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spacing {
    #[default]
    Equal,
    FractionalOdd,
    FractionalEven,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winding {
    #[default]
    Ccw,
    Cw,
}

/// Primitive topology at a geometry-stage boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryPrimitive {
    Points,
    Lines,
    LinesAdjacency,
    Triangles,
    LineStrip,
    TriangleStrip,
}

impl GeometryPrimitive {
    pub fn keyword(self) -> &'static str {
        match self {
            GeometryPrimitive::Points => "points",
            GeometryPrimitive::Lines => "lines",
            GeometryPrimitive::LinesAdjacency => "lines_adjacency",
            GeometryPrimitive::Triangles => "triangles",
            GeometryPrimitive::LineStrip => "line_strip",
            GeometryPrimitive::TriangleStrip => "triangle_strip",
        }
    }
}

/// Qualifier-only statement of a stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageQualifier {
    EarlyFragmentTests,
    TessInput {
        patch_type: PatchType,
        #[serde(default)]
        spacing: Spacing,
        #[serde(default)]
        winding: Winding,
    },
    TessOutputVertices {
        count: u32,
    },
    GeometryInput {
        primitive: GeometryPrimitive,
    },
    GeometryOutput {
        primitive: GeometryPrimitive,
        max_vertices: u32,
    },
}

impl PatchType {
    pub fn keyword(self) -> &'static str {
        match self {
            PatchType::Triangles => "triangles",
            PatchType::Quads => "quads",
            PatchType::Isolines => "isolines",
        }
    }
}

impl Spacing {
    pub fn keyword(self) -> &'static str {
        match self {
            Spacing::Equal => "equal_spacing",
            Spacing::FractionalOdd => "fractional_odd_spacing",
            Spacing::FractionalEven => "fractional_even_spacing",
        }
    }
}

impl Winding {
    pub fn keyword(self) -> &'static str {
        match self {
            Winding::Ccw => "ccw",
            Winding::Cw => "cw",
        }
    }
}

/// One declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    pub kind: ElementKind,
    pub in_out: InOut,
    /// Value name, or the block type name for block-shaped kinds
    pub name: String,
    pub data_type: DataType,
    pub array_size: ArraySize,
    /// Per-vertex array dimension of interface elements in arrayed stages
    pub interface_array: ArraySize,
    pub qualifier: Interpolation,
    /// Explicit location or bind index
    pub location: Option<u32>,
    pub members: Vec<Member>,
    /// Instance name of block-shaped kinds
    pub block_instance: Option<String>,
    pub stage_qualifier: Option<StageQualifier>,
}

impl LayoutElement {
    fn new(kind: ElementKind, in_out: InOut, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            kind,
            in_out,
            name: name.into(),
            data_type,
            array_size: ArraySize::None,
            interface_array: ArraySize::None,
            qualifier: Interpolation::None,
            location: None,
            members: Vec::new(),
            block_instance: None,
            stage_qualifier: None,
        }
    }

    /// Interface value passed between stages
    pub fn value(in_out: InOut, name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(ElementKind::Value, in_out, name, data_type)
    }

    /// Interface block passed between stages
    pub fn block(in_out: InOut, block_name: impl Into<String>, instance: impl Into<String>, members: Vec<Member>) -> Self {
        let mut element = Self::new(ElementKind::Block, in_out, block_name, DataType::Named(String::new()));
        element.block_instance = Some(instance.into());
        element.members = members;
        element
    }

    pub fn uniform_value(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(ElementKind::UniformValue, InOut::None, name, data_type)
    }

    /// Uniform, constant-params or buffer block with the given members
    pub fn resource_block(kind: ElementKind, block_name: impl Into<String>, members: Vec<Member>) -> Self {
        let mut element = Self::new(kind, InOut::None, block_name, DataType::Named(String::new()));
        element.members = members;
        element
    }

    pub fn qualifier(qualifier: StageQualifier) -> Self {
        let mut element = Self::new(ElementKind::Qualifier, InOut::None, String::new(), DataType::Named(String::new()));
        element.stage_qualifier = Some(qualifier);
        element
    }

    pub fn with_location(mut self, location: u32) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_array_size(mut self, array_size: ArraySize) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_interface_array(mut self, interface_array: ArraySize) -> Self {
        self.interface_array = interface_array;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Interpolation) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.block_instance = Some(instance.into());
        self
    }

    /// Returns true for kinds declared as a `{ ... }` block
    pub fn is_block_shaped(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Block | ElementKind::UniformBlock | ElementKind::UniformBlockConstantParams | ElementKind::BufferReadOnly | ElementKind::BufferReadWrite
        )
    }
}

/// Component format of a texture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    #[default]
    Float,
    Int,
    UInt,
}

/// Sampling flavor of a texture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureType {
    #[default]
    Texture,
    ArrayTexture,
    ShadowTexture,
}

/// A sampler declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureElement {
    /// Declared sampler variable name
    pub name: String,
    /// Dimensionality (1, 2 or 3)
    pub dim: u8,
    pub bind_index: u32,
    pub format: TextureFormat,
    pub texture_type: TextureType,
    /// Array-of-textures size, zero when not an array
    pub array_size: u32,
}

impl TextureElement {
    /// GLSL sampler type (`sampler2D`, `usampler1DArray`, `sampler2DShadow`, ...)
    pub fn sampler_type(&self) -> String {
        let prefix = match self.format {
            TextureFormat::Float => "",
            TextureFormat::Int => "i",
            TextureFormat::UInt => "u",
        };
        let suffix = match self.texture_type {
            TextureType::Texture => "",
            TextureType::ArrayTexture => "Array",
            TextureType::ShadowTexture => "Shadow",
        };
        format!("{prefix}sampler{}D{suffix}", self.dim)
    }
}
