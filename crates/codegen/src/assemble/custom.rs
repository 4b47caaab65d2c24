//! Custom bindings
//!
//! User-declared resources outside the primvar categories. Draw programs see them in every graphics
//! stage; compute programs additionally get `HdSet_<name>` mutators for writable buffers.

use super::{declare_struct_block, graphics_mask, push_accessor, read_binding, read_struct_entry};
use crate::binding::{BindingKind, CustomBinding, MetaData};
use crate::context::{GenerationContext, Section};
use crate::ir::Function;
use crate::layout::translate_binding;
use crate::shader::StageMask;

/// Index argument used to read a custom binding, `None` for plain uniforms
fn index(binding: &CustomBinding) -> Option<&'static str> {
    match binding.binding.kind {
        BindingKind::Uniform if binding.array_size == 0 => None,
        _ => Some("localIndex"),
    }
}

fn declare(ctx: &mut GenerationContext, stages: StageMask, binding: &CustomBinding) {
    ctx.push_elements(stages, translate_binding(&binding.binding, &binding.name, &binding.data_type, binding.writable, binding.array_size));
    // Atomic counters are used directly by name, there is no meaningful read accessor
    if binding.data_type.is_atomic() {
        tracing::debug!(resource = %binding.name, "atomic custom binding declared without an accessor");
        return;
    }
    let read = read_binding(&binding.binding, &binding.name, &binding.data_type, index(binding));
    push_accessor(ctx, stages, &binding.name, &binding.data_type, vec![format!("return {read};")]);
}

pub(crate) fn generate(metadata: &MetaData, ctx: &mut GenerationContext) {
    let stages = graphics_mask(ctx);
    for binding in &metadata.custom_bindings {
        declare(ctx, stages, binding);
    }
    for block in &metadata.custom_interleaved {
        declare_struct_block(ctx, stages, block);
        for entry in &block.entries {
            let element = (entry.array_size > 0).then_some("localIndex");
            let read = read_struct_entry(block, &entry.name, &entry.data_type, "0", element);
            push_accessor(ctx, stages, &entry.name, &entry.data_type, vec![format!("return {read};")]);
        }
    }
}

pub(crate) fn generate_compute(metadata: &MetaData, ctx: &mut GenerationContext) {
    let stages = StageMask::COMPUTE;
    for binding in &metadata.custom_bindings {
        declare(ctx, stages, binding);
        if !binding.writable || binding.data_type.is_atomic() {
            continue;
        }
        if binding.binding.kind != BindingKind::Ssbo {
            tracing::warn!(resource = %binding.name, kind = ?binding.binding.kind, "only storage buffers can be written, no mutator emitted");
            continue;
        }
        let ty = binding.data_type.unpacked_type();
        let value = binding.data_type.pack_expr(false, "value");
        ctx.push(
            Section::Accessor,
            stages,
            Function::new("void", format!("HdSet_{}", binding.name))
                .param("int localIndex")
                .param(format!("{} value", ty.glsl()))
                .line(format!("{}[localIndex] = {value};", binding.name)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{geometric_shader, run, section};
    use crate::binding::{Binding, BindingKind, CustomBinding, MetaData, StructBlock, StructEntry};
    use crate::capabilities::Capabilities;
    use crate::context::{ActiveStages, GenerationContext, Section};
    use crate::layout::ElementKind;
    use crate::packed::DataType;
    use crate::shader::{PrimitiveType, ShaderStage, StageMask};

    fn custom(name: &str, data_type: DataType, kind: BindingKind, writable: bool) -> CustomBinding {
        CustomBinding {
            name: name.to_string(),
            data_type,
            binding: Binding::new(kind, 8),
            writable,
            array_size: 0,
        }
    }

    #[test]
    fn test_draw_custom_bindings() {
        let metadata = MetaData {
            custom_bindings: vec![
                custom("exposure", DataType::Float, BindingKind::Uniform, false),
                custom("counter", DataType::AtomicUInt, BindingKind::Ssbo, true),
            ],
            custom_interleaved: vec![StructBlock {
                binding: Binding::new(BindingKind::Ubo, 2),
                block_name: "LightingData".to_string(),
                var_name: "lighting".to_string(),
                entries: vec![
                    StructEntry {
                        name: "ambient".to_string(),
                        data_type: DataType::Vec3,
                        array_size: 0,
                    },
                    StructEntry {
                        name: "shadowMatrix".to_string(),
                        data_type: DataType::Mat4,
                        array_size: 4,
                    },
                ],
            }],
            ..Default::default()
        };
        let shader = geometric_shader(PrimitiveType::MeshCoarseTriangles);
        let ctx = run(&shader, &metadata, &Capabilities::opengl(), StageMask::VERTEX | StageMask::FRAGMENT);
        let text = section(&ctx, ShaderStage::Fragment, Section::Accessor);

        assert!(text.contains("float HdGet_exposure(int localIndex) {\n    return exposure;\n}\n"));
        assert!(text.contains("vec3 HdGet_ambient(int localIndex) {\n    return hd_vec3_get(lighting.ambient);\n}\n"));
        assert!(text.contains("mat4 HdGet_shadowMatrix(int localIndex) {\n    return lighting.shadowMatrix[localIndex];\n}\n"));
        assert!(!text.contains("HdGet_counter"));

        let elements = ctx.elements(ShaderStage::Vertex);
        assert!(elements.iter().any(|e| e.name == "exposure" && e.kind == ElementKind::UniformValue));
        assert!(elements.iter().any(|e| e.name == "buffer_counter" && e.kind == ElementKind::BufferReadWrite));
        assert!(elements.iter().any(|e| e.name == "ubo_lighting" && e.kind == ElementKind::UniformBlock));
    }

    #[test]
    fn test_compute_mutators() {
        let metadata = MetaData {
            custom_bindings: vec![
                custom("positions", DataType::Vec3, BindingKind::Ssbo, true),
                custom("weights", DataType::Float, BindingKind::Ssbo, false),
                custom("counter", DataType::AtomicInt, BindingKind::Ssbo, true),
            ],
            ..Default::default()
        };
        let mut ctx = GenerationContext::new(ActiveStages::new(StageMask::COMPUTE));
        super::super::assemble_compute(&metadata, &Capabilities::opengl(), &mut ctx);
        let text = section(&ctx, ShaderStage::Compute, Section::Accessor);

        assert!(text.contains("vec3 HdGet_positions(int localIndex) {\n    return positions[localIndex];\n}\n"));
        assert!(text.contains("void HdSet_positions(int localIndex, vec3 value) {\n    positions[localIndex] = value;\n}\n"));
        assert!(text.contains("float HdGet_weights(int localIndex) {"));
        assert!(!text.contains("HdSet_weights"));
        assert!(!text.contains("HdSet_counter"));
        assert!(!text.contains("HdGet_counter"));
    }
}
