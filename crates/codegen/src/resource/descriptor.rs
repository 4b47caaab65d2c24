//! Structured resource emission
//!
//! Populates a backend-agnostic [`FunctionDescriptor`] per stage instead of text. Qualifier-only
//! elements that textual emission drops land in the tessellation, geometry and fragment fields.

use super::textual::{block_line, buffer_line, builtin_line, qualifier_line, texture_line, uniform_block_line, uniform_value_line, value_line};
use super::{Builtin, ResourceSink};
use crate::layout::{ArraySize, ElementKind, GeometryPrimitive, InOut, Interpolation, LayoutElement, Member, PatchType, Spacing, StageQualifier, TextureElement, Winding};
use crate::packed::DataType;
use crate::shader::ShaderStage;
use serde::{Deserialize, Serialize};

/// Interface value between stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceValue {
    pub name: String,
    pub data_type: DataType,
    pub location: u32,
    pub qualifier: Interpolation,
    pub array_size: ArraySize,
    pub interface_array: ArraySize,
}

/// Interface block between stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceBlock {
    pub block_name: String,
    pub instance: Option<String>,
    pub location: u32,
    pub members: Vec<Member>,
    pub interface_array: ArraySize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformValue {
    pub name: String,
    pub data_type: DataType,
    pub location: u32,
    pub array_size: ArraySize,
}

/// Uniform block or constant-params block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBlock {
    pub block_name: String,
    pub instance: Option<String>,
    pub binding: u32,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferDescriptor {
    pub block_name: String,
    pub binding: u32,
    pub writable: bool,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TessellationDescriptor {
    pub patch_type: Option<PatchType>,
    pub spacing: Spacing,
    pub winding: Winding,
    /// Output patch size of the control stage
    pub output_vertices: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryDescriptor {
    pub input_primitive: Option<GeometryPrimitive>,
    pub output_primitive: Option<GeometryPrimitive>,
    pub max_vertices: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentDescriptor {
    pub early_fragment_tests: bool,
}

/// Every resource one stage function declares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub stage: ShaderStage,
    pub inputs: Vec<InterfaceValue>,
    pub outputs: Vec<InterfaceValue>,
    pub input_blocks: Vec<InterfaceBlock>,
    pub output_blocks: Vec<InterfaceBlock>,
    pub uniform_values: Vec<UniformValue>,
    pub uniform_blocks: Vec<ResourceBlock>,
    pub constant_params: Vec<ResourceBlock>,
    pub buffers: Vec<BufferDescriptor>,
    pub textures: Vec<TextureElement>,
    pub builtins: Vec<Builtin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tessellation: Option<TessellationDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometryDescriptor>,
    pub fragment: FragmentDescriptor,
}

impl FunctionDescriptor {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_blocks: Vec::new(),
            output_blocks: Vec::new(),
            uniform_values: Vec::new(),
            uniform_blocks: Vec::new(),
            constant_params: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            builtins: Vec::new(),
            tessellation: None,
            geometry: None,
            fragment: FragmentDescriptor::default(),
        }
    }

    fn tessellation_mut(&mut self) -> &mut TessellationDescriptor {
        self.tessellation.get_or_insert(TessellationDescriptor {
            patch_type: None,
            spacing: Spacing::default(),
            winding: Winding::default(),
            output_vertices: None,
        })
    }

    fn geometry_mut(&mut self) -> &mut GeometryDescriptor {
        self.geometry.get_or_insert(GeometryDescriptor {
            input_primitive: None,
            output_primitive: None,
            max_vertices: 0,
        })
    }

    /// Qualifier statements implied by the tessellation, geometry and fragment fields
    pub fn qualifiers(&self) -> Vec<StageQualifier> {
        let mut qualifiers = Vec::new();
        if let Some(tessellation) = &self.tessellation {
            if let Some(patch_type) = tessellation.patch_type {
                qualifiers.push(StageQualifier::TessInput {
                    patch_type,
                    spacing: tessellation.spacing,
                    winding: tessellation.winding,
                });
            }
            if let Some(count) = tessellation.output_vertices {
                qualifiers.push(StageQualifier::TessOutputVertices { count });
            }
        }
        if let Some(geometry) = &self.geometry {
            if let Some(primitive) = geometry.input_primitive {
                qualifiers.push(StageQualifier::GeometryInput { primitive });
            }
            if let Some(primitive) = geometry.output_primitive {
                qualifiers.push(StageQualifier::GeometryOutput {
                    primitive,
                    max_vertices: geometry.max_vertices,
                });
            }
        }
        if self.fragment.early_fragment_tests {
            qualifiers.push(StageQualifier::EarlyFragmentTests);
        }
        qualifiers
    }

    /// Renders the descriptor as GLSL declarations
    ///
    /// Uses the same line formatting as textual emission, plus the qualifier statements textual
    /// emission cannot express.
    pub fn render_glsl(&self) -> String {
        let mut out = String::new();
        for builtin in &self.builtins {
            out.push_str(&builtin_line(builtin));
        }
        for qualifier in self.qualifiers() {
            out.push_str(&qualifier_line(&qualifier));
        }
        let values = self.inputs.iter().map(|v| (InOut::StageIn, v)).chain(self.outputs.iter().map(|v| (InOut::StageOut, v)));
        for (in_out, value) in values {
            out.push_str(&value_line(in_out, value.location, value.qualifier, &value.data_type, &value.name, &value.interface_array, &value.array_size));
        }
        let blocks = self.input_blocks.iter().map(|b| (InOut::StageIn, b)).chain(self.output_blocks.iter().map(|b| (InOut::StageOut, b)));
        for (in_out, block) in blocks {
            out.push_str(&block_line(in_out, block.location, &block.block_name, &block.members, block.instance.as_deref(), &block.interface_array));
        }
        for value in &self.uniform_values {
            out.push_str(&uniform_value_line(value.location, &value.data_type, &value.name, &value.array_size));
        }
        for block in self.uniform_blocks.iter().chain(&self.constant_params) {
            out.push_str(&uniform_block_line(block.binding, &block.block_name, &block.members, block.instance.as_deref()));
        }
        for buffer in &self.buffers {
            out.push_str(&buffer_line(buffer.binding, &buffer.block_name, &buffer.members, buffer.writable));
        }
        for texture in &self.textures {
            out.push_str(&texture_line(texture));
        }
        out
    }
}

/// Resource sink filling a [`FunctionDescriptor`]
#[derive(Debug)]
pub struct DescriptorSink {
    descriptor: FunctionDescriptor,
}

impl DescriptorSink {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            descriptor: FunctionDescriptor::new(stage),
        }
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    pub fn into_descriptor(self) -> FunctionDescriptor {
        self.descriptor
    }
}

impl ResourceSink for DescriptorSink {
    fn value(&mut self, element: &LayoutElement, location: u32) {
        let value = InterfaceValue {
            name: element.name.clone(),
            data_type: element.data_type.clone(),
            location,
            qualifier: element.qualifier,
            array_size: element.array_size.clone(),
            interface_array: element.interface_array.clone(),
        };
        match element.in_out {
            InOut::StageIn => self.descriptor.inputs.push(value),
            InOut::StageOut => self.descriptor.outputs.push(value),
            InOut::None => tracing::error!(resource = %element.name, "interface value without a direction"),
        }
    }

    fn block(&mut self, element: &LayoutElement, location: u32) {
        let block = InterfaceBlock {
            block_name: element.name.clone(),
            instance: element.block_instance.clone(),
            location,
            members: element.members.clone(),
            interface_array: element.interface_array.clone(),
        };
        match element.in_out {
            InOut::StageIn => self.descriptor.input_blocks.push(block),
            InOut::StageOut => self.descriptor.output_blocks.push(block),
            InOut::None => tracing::error!(resource = %element.name, "interface block without a direction"),
        }
    }

    fn uniform_value(&mut self, element: &LayoutElement, location: u32) {
        self.descriptor.uniform_values.push(UniformValue {
            name: element.name.clone(),
            data_type: element.data_type.clone(),
            location,
            array_size: element.array_size.clone(),
        });
    }

    fn uniform_block(&mut self, element: &LayoutElement, binding: u32) {
        let block = ResourceBlock {
            block_name: element.name.clone(),
            instance: element.block_instance.clone(),
            binding,
            members: element.members.clone(),
        };
        if element.kind == ElementKind::UniformBlockConstantParams {
            self.descriptor.constant_params.push(block);
        } else {
            self.descriptor.uniform_blocks.push(block);
        }
    }

    fn buffer(&mut self, element: &LayoutElement, binding: u32, writable: bool) {
        self.descriptor.buffers.push(BufferDescriptor {
            block_name: element.name.clone(),
            binding,
            writable,
            members: element.members.clone(),
        });
    }

    fn texture(&mut self, texture: &TextureElement) {
        self.descriptor.textures.push(texture.clone());
    }

    fn qualifier(&mut self, qualifier: &StageQualifier) {
        match qualifier {
            StageQualifier::EarlyFragmentTests => self.descriptor.fragment.early_fragment_tests = true,
            StageQualifier::TessInput { patch_type, spacing, winding } => {
                let tessellation = self.descriptor.tessellation_mut();
                tessellation.patch_type = Some(*patch_type);
                tessellation.spacing = *spacing;
                tessellation.winding = *winding;
            }
            StageQualifier::TessOutputVertices { count } => self.descriptor.tessellation_mut().output_vertices = Some(*count),
            StageQualifier::GeometryInput { primitive } => self.descriptor.geometry_mut().input_primitive = Some(*primitive),
            StageQualifier::GeometryOutput { primitive, max_vertices } => {
                let geometry = self.descriptor.geometry_mut();
                geometry.output_primitive = Some(*primitive);
                geometry.max_vertices = *max_vertices;
            }
        }
    }

    fn builtin(&mut self, builtin: &Builtin) {
        self.descriptor.builtins.push(builtin.clone());
    }
}
