//! Resource-binder metadata
//!
//! Describes how every piece of per-draw data is physically bound: which primvars live in
//! which buffers, where the drawing coordinate comes from, and which textures back the
//! material parameters. Built once per draw batch by the resource binder and consumed
//! read-only by code generation.
//!
//! All tables are ordered vectors so that generation visits them in authored order.

use crate::packed::DataType;
use serde::{Deserialize, Serialize};

/// Storage kind of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// Per-vertex attribute
    VertexAttr,
    /// Per-draw attribute holding drawing-coordinate offsets
    DrawIndex,
    /// Per-instance attribute holding drawing-coordinate offsets
    DrawIndexInstance,
    /// Per-instance attribute array, one attribute per instancer level
    DrawIndexInstanceArray,
    Uniform,
    UniformArray,
    Ubo,
    Ssbo,
    BindlessUniform,
    BindlessSsboRange,
    Texture2d,
    BindlessTexture2d,
    ArrayOfTexture2d,
    BindlessArrayOfTexture2d,
    TextureField,
    BindlessTextureField,
    TextureUdimArray,
    BindlessTextureUdimArray,
    TextureUdimLayout,
    BindlessTextureUdimLayout,
    TexturePtexTexel,
    BindlessTexturePtexTexel,
    TexturePtexLayout,
    BindlessTexturePtexLayout,
}

impl BindingKind {
    /// Returns true if the resource is referenced through a handle stored in ordinary data
    pub fn is_bindless(self) -> bool {
        matches!(
            self,
            BindingKind::BindlessUniform
                | BindingKind::BindlessSsboRange
                | BindingKind::BindlessTexture2d
                | BindingKind::BindlessArrayOfTexture2d
                | BindingKind::BindlessTextureField
                | BindingKind::BindlessTextureUdimArray
                | BindingKind::BindlessTextureUdimLayout
                | BindingKind::BindlessTexturePtexTexel
                | BindingKind::BindlessTexturePtexLayout
        )
    }

    /// Returns true if the binding may be declared with an array size
    pub fn allows_array(self) -> bool {
        matches!(
            self,
            BindingKind::UniformArray | BindingKind::DrawIndexInstanceArray | BindingKind::Ubo | BindingKind::Ssbo | BindingKind::BindlessSsboRange | BindingKind::BindlessUniform
        )
    }

    /// Returns true for texture kinds, bound or bindless
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            BindingKind::Texture2d
                | BindingKind::BindlessTexture2d
                | BindingKind::ArrayOfTexture2d
                | BindingKind::BindlessArrayOfTexture2d
                | BindingKind::TextureField
                | BindingKind::BindlessTextureField
                | BindingKind::TextureUdimArray
                | BindingKind::BindlessTextureUdimArray
                | BindingKind::TextureUdimLayout
                | BindingKind::BindlessTextureUdimLayout
                | BindingKind::TexturePtexTexel
                | BindingKind::BindlessTexturePtexTexel
                | BindingKind::TexturePtexLayout
                | BindingKind::BindlessTexturePtexLayout
        )
    }
}

/// Storage kind plus location (attribute location or bind index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub kind: BindingKind,
    pub location: u32,
    /// Texture unit, when it differs from the location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_unit: Option<u32>,
}

impl Binding {
    pub fn new(kind: BindingKind, location: u32) -> Self {
        Self { kind, location, texture_unit: None }
    }

    /// Bind index a texture declared from this binding uses
    pub fn texture_bind_index(&self) -> u32 {
        self.texture_unit.unwrap_or(self.location)
    }
}

/// A named primvar stored behind one binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primvar {
    pub name: String,
    pub data_type: DataType,
    pub binding: Binding,
}

/// An instance primvar authored at one instancer nesting level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePrimvar {
    pub name: String,
    pub data_type: DataType,
    pub level: u32,
    pub binding: Binding,
}

/// A face-varying primvar belonging to one face-varying channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FvarPrimvar {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub channel: u32,
    pub binding: Binding,
}

/// A per-channel auxiliary buffer (face-varying indices or patch params)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub channel: u32,
    pub data_type: DataType,
    pub binding: Binding,
}

/// One member of an interleaved struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructEntry {
    pub name: String,
    pub data_type: DataType,
    /// Element count for arrayed members, zero when not an array
    #[serde(default)]
    pub array_size: u32,
}

/// An interleaved struct buffer (constant primvars, material parameters, custom interleaved data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructBlock {
    pub binding: Binding,
    /// Name of the generated struct type
    pub block_name: String,
    /// Name of the buffer variable
    pub var_name: String,
    pub entries: Vec<StructEntry>,
}

impl StructBlock {
    pub fn entry(&self, name: &str) -> Option<&StructEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// A user-declared binding outside the primvar categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomBinding {
    pub name: String,
    pub data_type: DataType,
    pub binding: Binding,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub array_size: u32,
}

/// How a material parameter obtains its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Authored value only
    Fallback,
    /// Bound 2D texture
    Texture,
    /// 3D field texture
    Field,
    /// Per-face texture with a layout buffer
    Ptex,
    /// Tiled virtual texture
    Udim,
    /// Alias for another primvar
    PrimvarRedirect,
    /// Affine 2D transform of a primvar
    Transform2d,
}

/// A material parameter exposed to shader code as `HdGet_<name>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderParameter {
    pub name: String,
    pub data_type: DataType,
    pub kind: ParameterKind,
    /// Texel binding for texture kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    /// Layout binding for ptex and UDIM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_binding: Option<Binding>,
    /// Coordinate primvar (textures), redirect target or transformed primvar
    #[serde(default)]
    pub in_primvars: Vec<String>,
    /// Channel selection applied to sampled values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swizzle: Option<String>,
    #[serde(default)]
    pub array_of_textures_size: u32,
    #[serde(default)]
    pub shadow: bool,
    /// Return the fallback when the texture's validity flag is false
    #[serde(default)]
    pub process_texture_fallback_value: bool,
}

/// The complete binding metadata of a draw batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaData {
    pub drawing_coord0: Option<Binding>,
    pub drawing_coord1: Option<Binding>,
    pub drawing_coord2: Option<Binding>,
    pub drawing_coord_i: Option<Binding>,
    pub instancer_num_levels: u32,
    /// Buffer of culled instance indices, `HD_INSTANCE_INDEX_WIDTH` entries per instance
    pub instance_index_array: Option<Binding>,
    pub primitive_param: Option<Primvar>,
    pub edge_index: Option<Primvar>,
    pub fvar_indices: Vec<ChannelBinding>,
    pub fvar_patch_param: Vec<ChannelBinding>,
    pub constant_data: Vec<StructBlock>,
    pub instance_data: Vec<InstancePrimvar>,
    pub element_data: Vec<Primvar>,
    pub vertex_data: Vec<Primvar>,
    pub varying_data: Vec<Primvar>,
    pub fvar_data: Vec<FvarPrimvar>,
    pub shader_data: Option<StructBlock>,
    pub shader_parameters: Vec<ShaderParameter>,
    pub custom_bindings: Vec<CustomBinding>,
    pub custom_interleaved: Vec<StructBlock>,
}

impl MetaData {
    /// Iterates every primvar name with its category, in category order
    pub fn primvar_names(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let constant = self.constant_data.iter().flat_map(|block| block.entries.iter().map(|entry| ("constant", entry.name.as_str())));
        let element = self.element_data.iter().map(|p| ("element", p.name.as_str()));
        let vertex = self.vertex_data.iter().map(|p| ("vertex", p.name.as_str()));
        let varying = self.varying_data.iter().map(|p| ("varying", p.name.as_str()));
        let fvar = self.fvar_data.iter().map(|p| ("face-varying", p.name.as_str()));
        constant.chain(element).chain(vertex).chain(varying).chain(fvar)
    }

    /// Binding of the named custom binding, used to resolve explicit locations by name
    pub fn custom_binding(&self, name: &str) -> Option<&CustomBinding> {
        self.custom_bindings.iter().find(|binding| binding.name == name)
    }

    /// Returns the material-parameter entry with the given name, if authored
    pub fn shader_data_entry(&self, name: &str) -> Option<&StructEntry> {
        self.shader_data.as_ref().and_then(|block| block.entry(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_whitelist() {
        assert!(BindingKind::UniformArray.allows_array());
        assert!(BindingKind::Ssbo.allows_array());
        assert!(BindingKind::DrawIndexInstanceArray.allows_array());
        assert!(!BindingKind::Uniform.allows_array());
        assert!(!BindingKind::VertexAttr.allows_array());
        assert!(!BindingKind::Texture2d.allows_array());
    }

    #[test]
    fn test_metadata_yaml() {
        let yaml = r#"
drawing_coord0: { kind: draw_index, location: 8 }
instancer_num_levels: 2
vertex_data:
  - { name: points, data_type: vec3, binding: { kind: vertex_attr, location: 0 } }
shader_data:
  binding: { kind: ssbo, location: 3 }
  block_name: MaterialParams
  var_name: materialParams
  entries:
    - { name: diffuseColor_fallback, data_type: vec3 }
    - { name: weights, data_type: float, array_size: 4 }
shader_parameters:
  - name: diffuseColor
    data_type: vec3
    kind: texture
    binding: { kind: texture2d, location: 5, texture_unit: 2 }
    in_primvars: [st]
"#;
        let metadata: MetaData = serde_norway::from_str(yaml).unwrap();
        assert_eq!(metadata.drawing_coord0, Some(Binding::new(BindingKind::DrawIndex, 8)));
        assert_eq!(metadata.instancer_num_levels, 2);
        assert_eq!(metadata.vertex_data[0].data_type, DataType::Vec3);
        assert_eq!(metadata.shader_data_entry("weights").map(|e| e.array_size), Some(4));
        assert!(metadata.shader_data_entry("missing").is_none());

        let parameter = &metadata.shader_parameters[0];
        assert_eq!(parameter.kind, ParameterKind::Texture);
        assert_eq!(parameter.binding.map(|b| b.texture_bind_index()), Some(2));
        assert_eq!(parameter.in_primvars, vec!["st".to_string()]);
    }

    #[test]
    fn test_primvar_names_order() {
        let metadata = MetaData {
            vertex_data: vec![Primvar {
                name: "points".to_string(),
                data_type: DataType::Vec3,
                binding: Binding::new(BindingKind::VertexAttr, 0),
            }],
            element_data: vec![Primvar {
                name: "faceColor".to_string(),
                data_type: DataType::Vec3,
                binding: Binding::new(BindingKind::Ssbo, 1),
            }],
            ..Default::default()
        };
        let names: Vec<_> = metadata.primvar_names().collect();
        assert_eq!(names, vec![("element", "faceColor"), ("vertex", "points")]);
    }
}
