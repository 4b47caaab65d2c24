//! Textual resource emission
//!
//! Writes declarations straight into a stage's resource section. The line formatting helpers are
//! shared with [`FunctionDescriptor::render_glsl`](super::FunctionDescriptor::render_glsl) so both
//! pipelines spell every declaration the same way.

use super::{Builtin, ResourceSink};
use crate::layout::{ArraySize, InOut, Interpolation, LayoutElement, Member, StageQualifier, TextureElement};
use crate::packed::DataType;

fn direction(in_out: InOut) -> &'static str {
    match in_out {
        InOut::StageIn => "in",
        InOut::StageOut => "out",
        InOut::None => "",
    }
}

fn members_text(members: &[Member]) -> String {
    members
        .iter()
        .map(|member| format!("    {}{} {}{};\n", member.qualifier.keyword(), member.data_type.glsl(), member.name, member.array_size.suffix()))
        .collect()
}

/// `layout(location = N) flat in T name[iface][array];`
pub(crate) fn value_line(in_out: InOut, location: u32, qualifier: Interpolation, data_type: &DataType, name: &str, interface: &ArraySize, array: &ArraySize) -> String {
    format!(
        "layout(location = {location}) {}{} {} {name}{}{};\n",
        qualifier.keyword(),
        direction(in_out),
        data_type.glsl(),
        interface.suffix(),
        array.suffix()
    )
}

/// Interface block between two stages
pub(crate) fn block_line(in_out: InOut, location: u32, block_name: &str, members: &[Member], instance: Option<&str>, interface: &ArraySize) -> String {
    let instance = instance.map(|instance| format!(" {instance}{}", interface.suffix())).unwrap_or_default();
    format!("layout(location = {location}) {} {block_name} {{\n{}}}{instance};\n", direction(in_out), members_text(members))
}

pub(crate) fn uniform_value_line(location: u32, data_type: &DataType, name: &str, array: &ArraySize) -> String {
    format!("layout(location = {location}) uniform {} {name}{};\n", data_type.glsl(), array.suffix())
}

/// Uniform or constant-params block
pub(crate) fn uniform_block_line(binding: u32, block_name: &str, members: &[Member], instance: Option<&str>) -> String {
    let instance = instance.map(|instance| format!(" {instance}")).unwrap_or_default();
    format!("layout(std140, binding = {binding}) uniform {block_name} {{\n{}}}{instance};\n", members_text(members))
}

pub(crate) fn buffer_line(binding: u32, block_name: &str, members: &[Member], writable: bool) -> String {
    let access = if writable { "" } else { "readonly " };
    format!("layout(std430, binding = {binding}) {access}buffer {block_name} {{\n{}}};\n", members_text(members))
}

pub(crate) fn texture_line(texture: &TextureElement) -> String {
    let array = ArraySize::from_count(texture.array_size);
    format!("layout(binding = {}) uniform {} {}{};\n", texture.bind_index, texture.sampler_type(), texture.name, array.suffix())
}

/// Qualifier-only statement, only the descriptor rendering emits these
pub(crate) fn qualifier_line(qualifier: &StageQualifier) -> String {
    match qualifier {
        StageQualifier::EarlyFragmentTests => "layout(early_fragment_tests) in;\n".to_string(),
        StageQualifier::TessInput { patch_type, spacing, winding } => format!("layout({}, {}, {}) in;\n", patch_type.keyword(), spacing.keyword(), winding.keyword()),
        StageQualifier::TessOutputVertices { count } => format!("layout(vertices = {count}) out;\n"),
        StageQualifier::GeometryInput { primitive } => format!("layout({}) in;\n", primitive.keyword()),
        StageQualifier::GeometryOutput { primitive, max_vertices } => format!("layout({}, max_vertices = {max_vertices}) out;\n", primitive.keyword()),
    }
}

pub(crate) fn builtin_line(builtin: &Builtin) -> String {
    match builtin {
        Builtin::Alias { name, value } => format!("#define {name} {value}\n"),
        Builtin::PerVertex { clip_distances } => {
            let clip = if *clip_distances > 0 { format!("    float gl_ClipDistance[{clip_distances}];\n") } else { String::new() };
            format!("out gl_PerVertex {{\n    vec4 gl_Position;\n    float gl_PointSize;\n{clip}}};\n")
        }
    }
}

/// Resource sink producing declaration text
#[derive(Debug, Default)]
pub struct TextualSink {
    text: String,
}

impl TextualSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The declarations written so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl ResourceSink for TextualSink {
    fn value(&mut self, element: &LayoutElement, location: u32) {
        self.text.push_str(&value_line(element.in_out, location, element.qualifier, &element.data_type, &element.name, &element.interface_array, &element.array_size));
    }

    fn block(&mut self, element: &LayoutElement, location: u32) {
        self.text.push_str(&block_line(element.in_out, location, &element.name, &element.members, element.block_instance.as_deref(), &element.interface_array));
    }

    fn uniform_value(&mut self, element: &LayoutElement, location: u32) {
        self.text.push_str(&uniform_value_line(location, &element.data_type, &element.name, &element.array_size));
    }

    fn uniform_block(&mut self, element: &LayoutElement, binding: u32) {
        self.text.push_str(&uniform_block_line(binding, &element.name, &element.members, element.block_instance.as_deref()));
    }

    fn buffer(&mut self, element: &LayoutElement, binding: u32, writable: bool) {
        self.text.push_str(&buffer_line(binding, &element.name, &element.members, writable));
    }

    fn texture(&mut self, texture: &TextureElement) {
        self.text.push_str(&texture_line(texture));
    }

    fn qualifier(&mut self, qualifier: &StageQualifier) {
        tracing::trace!(?qualifier, "textual resources drop qualifier-only statements");
    }

    fn builtin(&mut self, builtin: &Builtin) {
        self.text.push_str(&builtin_line(builtin));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ElementKind, GeometryPrimitive, TextureFormat, TextureType};

    #[test]
    fn test_declaration_lines() {
        assert_eq!(
            value_line(InOut::StageIn, 2, Interpolation::Flat, &DataType::IVec4, "vsDrawingCoord0", &ArraySize::Unsized, &ArraySize::None),
            "layout(location = 2) flat in ivec4 vsDrawingCoord0[];\n"
        );
        let members = vec![Member::new("points", DataType::Vec3), Member::new("id", DataType::Int).with_qualifier(Interpolation::Flat)];
        assert_eq!(
            block_line(InOut::StageOut, 0, "PrimvarsVS", &members, Some("outPrimvars"), &ArraySize::None),
            "layout(location = 0) out PrimvarsVS {\n    vec3 points;\n    flat int id;\n} outPrimvars;\n"
        );
        let member = vec![Member::new("points", DataType::Float).with_array_size(ArraySize::Unsized)];
        assert_eq!(buffer_line(4, "buffer_points", &member, false), "layout(std430, binding = 4) readonly buffer buffer_points {\n    float points[];\n};\n");
        assert_eq!(buffer_line(4, "buffer_points", &member, true), "layout(std430, binding = 4) buffer buffer_points {\n    float points[];\n};\n");
    }

    #[test]
    fn test_qualifier_and_texture_lines() {
        let output = StageQualifier::GeometryOutput {
            primitive: GeometryPrimitive::TriangleStrip,
            max_vertices: 3,
        };
        assert_eq!(qualifier_line(&output), "layout(triangle_strip, max_vertices = 3) out;\n");
        let texture = TextureElement {
            name: "sampler2d_diffuse".to_string(),
            dim: 2,
            bind_index: 5,
            format: TextureFormat::Float,
            texture_type: TextureType::Texture,
            array_size: 4,
        };
        assert_eq!(texture_line(&texture), "layout(binding = 5) uniform sampler2D sampler2d_diffuse[4];\n");
    }

    #[test]
    fn test_sink_drops_qualifiers() {
        let mut sink = TextualSink::new();
        sink.qualifier(&StageQualifier::EarlyFragmentTests);
        assert!(sink.text().is_empty());
        let element = LayoutElement::uniform_value("exposure", DataType::Float);
        assert_eq!(element.kind, ElementKind::UniformValue);
        sink.uniform_value(&element, 3);
        assert_eq!(sink.into_text(), "layout(location = 3) uniform float exposure;\n");
    }
}
