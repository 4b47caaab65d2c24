//! Resource Generator
//!
//! Gives every layout element of a stage its concrete slot, location or binding and hands it to a
//! [`ResourceSink`]. The two sinks, [`TextualSink`] and [`DescriptorSink`], are interchangeable: a
//! compile picks one for all of its stages.

mod descriptor;
mod slots;
mod textual;

pub use descriptor::{BufferDescriptor, DescriptorSink, FragmentDescriptor, FunctionDescriptor, GeometryDescriptor, InterfaceBlock, InterfaceValue, ResourceBlock, TessellationDescriptor, UniformValue};
pub use slots::SlotAllocator;
pub use textual::TextualSink;

use crate::layout::{ArraySize, ElementKind, InOut, LayoutElement, StageQualifier, TextureElement};
use crate::shader::ShaderStage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Stage-specific built-in declaration added by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Builtin {
    /// `hd_` spelling of a built-in variable, or its constant stand-in
    Alias { name: String, value: String },
    /// Redeclared per-vertex output block with a clip-distance array
    PerVertex { clip_distances: u32 },
}

/// Receives resources together with their assigned numbers
pub trait ResourceSink {
    /// Interstage or fragment output value
    fn value(&mut self, element: &LayoutElement, location: u32);
    /// Interstage block
    fn block(&mut self, element: &LayoutElement, location: u32);
    fn uniform_value(&mut self, element: &LayoutElement, location: u32);
    /// Uniform block or constant-params block
    fn uniform_block(&mut self, element: &LayoutElement, binding: u32);
    fn buffer(&mut self, element: &LayoutElement, binding: u32, writable: bool);
    fn texture(&mut self, texture: &TextureElement);
    /// Qualifier-only statement (topology, early fragment tests)
    fn qualifier(&mut self, qualifier: &StageQualifier);
    fn builtin(&mut self, builtin: &Builtin);
}

/// Assigns slots across the stages of one compile
#[derive(Debug, Clone)]
pub struct ResourceGenerator {
    slots: SlotAllocator,
    /// Values of symbolic array sizes such as `HD_NUM_PATCH_EVAL_VERTS`
    constants: BTreeMap<String, u32>,
}

impl ResourceGenerator {
    pub fn new(slots: SlotAllocator, constants: BTreeMap<String, u32>) -> Self {
        Self { slots, constants }
    }

    fn count(&self, size: &ArraySize) -> u32 {
        size.count(&|name| self.constants.get(name).copied())
    }

    /// Slots an interface element consumes
    ///
    /// Blocks are sized from their first member's type so the block agrees with the per-member
    /// costs of a backend that spills wide types into two slots. Arrayed members take one such
    /// cost per element.
    fn slot_count(&self, element: &LayoutElement) -> u32 {
        if element.is_block_shaped() {
            let per_member = element.members.first().map_or(1, |member| member.data_type.slot_cost());
            return element.members.iter().map(|member| per_member * self.count(&member.array_size)).sum();
        }
        element.data_type.slot_cost() * self.count(&element.array_size)
    }

    fn explicit(&self, element: &LayoutElement) -> Option<u32> {
        let names = std::iter::once(element.name.as_str()).chain(element.block_instance.as_deref()).chain(element.members.iter().map(|m| m.name.as_str()));
        self.slots.explicit(element.location, names)
    }

    /// Emits the resources of one stage
    ///
    /// # Arguments
    /// * `stage` - Stage being emitted; stages must be visited in pipeline order
    /// * `elements` - Layout elements of the stage
    /// * `textures` - Texture elements of the stage
    /// * `builtins` - Built-in declarations the orchestrator adds for the stage
    /// * `sink` - Receiver of the numbered resources
    pub fn generate_stage(&mut self, stage: ShaderStage, elements: &[LayoutElement], textures: &[TextureElement], builtins: &[Builtin], sink: &mut dyn ResourceSink) {
        self.slots.advance_stage(stage);
        for builtin in builtins {
            sink.builtin(builtin);
        }

        let mut declared = HashSet::new();
        for element in elements {
            if !declared.insert((element.kind, element.in_out, element.name.clone(), element.block_instance.clone())) {
                tracing::debug!(resource = %element.name, %stage, "skipping duplicate declaration");
                continue;
            }
            match element.kind {
                ElementKind::Value => {
                    let count = self.slot_count(element);
                    let location = match self.explicit(element) {
                        Some(location) => location,
                        None if element.in_out == InOut::StageOut && stage == ShaderStage::Fragment => self.slots.output(&element.name, count),
                        None => self.slots.interstage(&element.name, count),
                    };
                    sink.value(element, location);
                }
                ElementKind::Block => {
                    let count = self.slot_count(element);
                    let location = self.explicit(element).unwrap_or_else(|| self.slots.interstage(&element.name, count));
                    sink.block(element, location);
                }
                ElementKind::UniformValue => {
                    let count = self.count(&element.array_size);
                    let location = self.explicit(element).unwrap_or_else(|| self.slots.location(&element.name, count));
                    sink.uniform_value(element, location);
                }
                ElementKind::UniformBlock | ElementKind::UniformBlockConstantParams => {
                    let binding = self.explicit(element).unwrap_or_else(|| self.slots.location(&element.name, 1));
                    sink.uniform_block(element, binding);
                }
                ElementKind::BufferReadOnly | ElementKind::BufferReadWrite => {
                    let binding = self.explicit(element).unwrap_or_else(|| self.slots.location(&element.name, 1));
                    sink.buffer(element, binding, element.kind == ElementKind::BufferReadWrite);
                }
                ElementKind::Qualifier => match &element.stage_qualifier {
                    Some(qualifier) => sink.qualifier(qualifier),
                    None => tracing::error!(%stage, "qualifier element without a qualifier"),
                },
                ElementKind::Texture => tracing::error!(resource = %element.name, %stage, "textures are declared through texture elements"),
            }
        }

        let mut samplers = HashSet::new();
        for texture in textures {
            if samplers.insert(texture.name.as_str()) {
                sink.texture(texture);
            }
        }
    }
}
