//! Source assembler
//!
//! Runs the generation passes of [`GenerationPass::ORDER`] over one [`GenerationContext`]. Each
//! pass lives in its own submodule and only pushes IR items, layout elements and textures; the
//! orchestrator renders them afterwards.

mod custom;
mod drawing_coord;
mod face_varying;
mod interstage;
mod parameters;
mod primvars;

use crate::binding::{Binding, BindingKind, MetaData, StructBlock};
use crate::capabilities::Capabilities;
use crate::context::{GenerationContext, GenerationPass, Section};
use crate::ir::{Function, Item};
use crate::layout::{ArraySize, ElementKind, LayoutElement, Member, buffer_block_name, translate_binding, uniform_block_name};
use crate::packed::{DataType, PACKED_TYPE_DEFINITIONS};
use crate::shader::{GeometricShader, StageMask};

/// Read-only inputs of a draw-program generation run
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    pub geometric_shader: &'a GeometricShader,
    pub metadata: &'a MetaData,
    pub capabilities: &'a Capabilities,
}

/// Runs every generation pass of a draw program
pub fn assemble_draw(inputs: &Inputs, ctx: &mut GenerationContext) {
    for pass in GenerationPass::ORDER {
        ctx.begin_pass(pass);
        match pass {
            GenerationPass::PackedTypes => packed_types(inputs.capabilities, ctx),
            GenerationPass::DrawingCoord => drawing_coord::drawing_coord(inputs, ctx),
            GenerationPass::PrimitiveId => drawing_coord::primitive_id(inputs, ctx),
            GenerationPass::ConstantPrimvars => primvars::constant(inputs, ctx),
            GenerationPass::InstancePrimvars => primvars::instance(inputs, ctx),
            GenerationPass::ElementPrimvars => primvars::element(inputs, ctx),
            GenerationPass::VertexPrimvars => primvars::vertex(inputs, ctx),
            GenerationPass::FaceVarying => face_varying::generate(inputs, ctx),
            GenerationPass::CustomBindings => custom::generate(inputs.metadata, ctx),
            GenerationPass::ShaderParameters => parameters::generate(inputs, ctx),
            GenerationPass::Interstage => interstage::generate(ctx),
        }
    }
}

/// Runs the generation passes of a compute program
///
/// Compute programs have no drawing coordinate and no primvar categories; they only see the
/// packed helpers and the custom bindings, with mutators for writable buffers.
pub fn assemble_compute(metadata: &MetaData, capabilities: &Capabilities, ctx: &mut GenerationContext) {
    for pass in GenerationPass::ORDER {
        ctx.begin_pass(pass);
        match pass {
            GenerationPass::PackedTypes => packed_types(capabilities, ctx),
            GenerationPass::CustomBindings => custom::generate_compute(metadata, ctx),
            _ => {}
        }
    }
}

fn packed_types(capabilities: &Capabilities, ctx: &mut GenerationContext) {
    let all = ctx.active().mask();
    ctx.push(Section::Declaration, all, Item::Raw(PACKED_TYPE_DEFINITIONS.to_string()));
    if capabilities.bindless_buffers {
        ctx.push(
            Section::Define,
            all,
            Item::define("HD_BINDLESS_READ(T, handle, index)", "((T *)(packUint2x32(handle)))[index]"),
        );
    }
}

/// Every active stage of a draw program except compute
pub(crate) fn graphics_mask(ctx: &GenerationContext) -> StageMask {
    ctx.active().mask() - StageMask::COMPUTE
}

/// Expression reading one logical value through a binding
///
/// # Arguments
/// * `binding` - Storage of the value
/// * `name` - Declared name of the value or buffer member
/// * `data_type` - Logical type; packed storage is unpacked with the catalog accessor
/// * `index` - Element index for arrayed storage
pub(crate) fn read_binding(binding: &Binding, name: &str, data_type: &DataType, index: Option<&str>) -> String {
    let indexed = |base: &str| match index {
        Some(index) => format!("{base}[{index}]"),
        None => base.to_string(),
    };
    match binding.kind {
        BindingKind::VertexAttr | BindingKind::DrawIndex | BindingKind::DrawIndexInstance => name.to_string(),
        BindingKind::Uniform => data_type.unpack_expr(true, name),
        BindingKind::UniformArray | BindingKind::Ubo => data_type.unpack_expr(true, &indexed(name)),
        BindingKind::Ssbo => data_type.unpack_expr(false, &format!("{name}[{}]", index.unwrap_or("0"))),
        BindingKind::BindlessSsboRange | BindingKind::BindlessUniform => {
            let storage = data_type.packed_type(false);
            data_type.unpack_expr(false, &format!("HD_BINDLESS_READ({}, {name}, {})", storage.glsl(), index.unwrap_or("0")))
        }
        kind => {
            tracing::error!(resource = name, ?kind, "binding kind cannot back a value accessor");
            data_type.default_value()
        }
    }
}

/// Declares an interleaved struct block: the struct type plus the buffer holding it
///
/// Struct members use packed storage so three-component members do not pick up padding.
pub(crate) fn declare_struct_block(ctx: &mut GenerationContext, stages: StageMask, block: &StructBlock) {
    let fields = block
        .entries
        .iter()
        .map(|entry| (entry.data_type.packed_type(true).glsl().to_string(), format!("{}{}", entry.name, ArraySize::from_count(entry.array_size).suffix())))
        .collect();
    ctx.push(Section::Declaration, stages, Item::Struct { name: block.block_name.clone(), fields });

    let struct_type = DataType::Named(block.block_name.clone());
    let element = match block.binding.kind {
        BindingKind::Ssbo => {
            let member = Member::new(block.var_name.clone(), struct_type).with_array_size(ArraySize::Unsized);
            LayoutElement::resource_block(ElementKind::BufferReadOnly, buffer_block_name(&block.var_name), vec![member]).with_location(block.binding.location)
        }
        BindingKind::Ubo => {
            let member = Member::new(block.var_name.clone(), struct_type);
            LayoutElement::resource_block(ElementKind::UniformBlock, uniform_block_name(&block.var_name), vec![member]).with_location(block.binding.location)
        }
        _ => {
            let mut elements = translate_binding(&block.binding, &block.var_name, &struct_type, false, 0);
            if elements.is_empty() {
                return;
            }
            elements.remove(0)
        }
    };
    ctx.push_element(stages, element);
}

/// Expression of one struct-block entry
///
/// # Arguments
/// * `block` - The struct block
/// * `entry` - Entry name
/// * `data_type` - Logical entry type
/// * `coord` - Struct index for buffer-backed blocks (a drawing-coordinate field)
/// * `element` - Element index for arrayed entries
pub(crate) fn read_struct_entry(block: &StructBlock, entry: &str, data_type: &DataType, coord: &str, element: Option<&str>) -> String {
    let base = match block.binding.kind {
        BindingKind::Ubo => block.var_name.clone(),
        BindingKind::BindlessSsboRange | BindingKind::BindlessUniform => format!("HD_BINDLESS_READ({}, {}, {coord})", block.block_name, block.var_name),
        _ => format!("{}[{coord}]", block.var_name),
    };
    let member = match element {
        Some(element) => format!("{base}.{entry}[{element}]"),
        None => format!("{base}.{entry}"),
    };
    data_type.unpack_expr(true, &member)
}

/// Registers `HdGet_<name>(int localIndex)` with its companion overloads and `HD_HAS_<name>` define
///
/// # Arguments
/// * `ctx` - Generation context
/// * `stages` - Stages receiving the accessor
/// * `name` - Primvar or parameter name
/// * `data_type` - Logical type returned by the accessor
/// * `body` - Body statements of the indexed accessor
pub(crate) fn push_accessor(ctx: &mut GenerationContext, stages: StageMask, name: &str, data_type: &DataType, body: Vec<String>) {
    let ty = data_type.unpacked_type();
    ctx.push(Section::Define, stages, Item::has(name));
    ctx.push(Section::Accessor, stages, Function::new(ty.glsl(), format!("HdGet_{name}")).param("int localIndex").lines(body));
    push_overloads(ctx, stages, name, &ty);
    ctx.register_primvar(name, &ty, stages);
}

/// Zero-argument and scalar companions of an indexed accessor
pub(crate) fn push_overloads(ctx: &mut GenerationContext, stages: StageMask, name: &str, ty: &DataType) {
    for item in overload_items(name, ty) {
        ctx.push(Section::Accessor, stages, item);
    }
}

pub(crate) fn overload_items(name: &str, ty: &DataType) -> Vec<Item> {
    let mut items = vec![Function::new(ty.glsl(), format!("HdGet_{name}")).returning(format!("HdGet_{name}(0)")).into()];
    if ty.component_count() <= 4 && !ty.is_matrix() && !matches!(ty, DataType::Named(_)) {
        let flat = ty.flat_type();
        items.push(
            Function::new(flat.glsl(), format!("HdGetScalar_{name}"))
                .param("int localIndex")
                .returning(format!("HdGet_{name}(localIndex){}", ty.flat_swizzle()))
                .into(),
        );
        items.push(Function::new(flat.glsl(), format!("HdGetScalar_{name}")).returning(format!("HdGetScalar_{name}(0)")).into());
    }
    items
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binding::{InstancePrimvar, ParameterKind, Primvar, ShaderParameter, StructEntry};
    use crate::context::ActiveStages;
    use crate::ir::render_items;
    use crate::shader::{FvarPatchType, PrimitiveType, ShaderStage, StageLayouts, StageSources};

    pub(crate) fn geometric_shader(primitive_type: PrimitiveType) -> GeometricShader {
        GeometricShader {
            primitive_type,
            fvar_patch_type: FvarPatchType::None,
            sources: StageSources::default(),
            layout: StageLayouts::default(),
        }
    }

    /// Runs every pass and returns the context
    pub(crate) fn run(shader: &GeometricShader, metadata: &MetaData, capabilities: &Capabilities, mask: StageMask) -> GenerationContext {
        let mut ctx = GenerationContext::new(ActiveStages::new(mask));
        let inputs = Inputs {
            geometric_shader: shader,
            metadata,
            capabilities,
        };
        assemble_draw(&inputs, &mut ctx);
        ctx
    }

    /// Renders one section of one stage
    pub(crate) fn section(ctx: &GenerationContext, stage: ShaderStage, section: Section) -> String {
        let mut out = String::new();
        render_items(&ctx.items(stage, section), &mut out);
        out
    }

    pub(crate) fn ssbo_primvar(name: &str, data_type: DataType, location: u32) -> Primvar {
        Primvar {
            name: name.to_string(),
            data_type,
            binding: Binding::new(BindingKind::Ssbo, location),
        }
    }

    fn accessor_names(ctx: &GenerationContext, stage: ShaderStage) -> Vec<String> {
        ctx.items(stage, Section::Accessor)
            .into_iter()
            .filter_map(|item| if let Item::Function(function) = item { Some(function.signature()) } else { None })
            .collect()
    }

    #[test]
    fn test_every_accessor_has_zero_argument_overload() {
        let metadata = MetaData {
            constant_data: vec![StructBlock {
                binding: Binding::new(BindingKind::Ssbo, 0),
                block_name: "ConstantData".to_string(),
                var_name: "constantPrimvars".to_string(),
                entries: vec![StructEntry {
                    name: "displayColor".to_string(),
                    data_type: DataType::Vec3,
                    array_size: 0,
                }],
            }],
            element_data: vec![ssbo_primvar("faceIndex", DataType::Int, 1)],
            vertex_data: vec![Primvar {
                name: "points".to_string(),
                data_type: DataType::Vec3,
                binding: Binding::new(BindingKind::VertexAttr, 0),
            }],
            instancer_num_levels: 1,
            instance_data: vec![InstancePrimvar {
                name: "translate".to_string(),
                data_type: DataType::Vec3,
                level: 0,
                binding: Binding::new(BindingKind::Ssbo, 2),
            }],
            shader_parameters: vec![ShaderParameter {
                name: "roughness".to_string(),
                data_type: DataType::Float,
                kind: ParameterKind::Fallback,
                binding: None,
                layout_binding: None,
                in_primvars: Vec::new(),
                swizzle: None,
                array_of_textures_size: 0,
                shadow: false,
                process_texture_fallback_value: false,
            }],
            ..Default::default()
        };
        let shader = geometric_shader(PrimitiveType::MeshCoarseTriangles);
        let ctx = run(&shader, &metadata, &Capabilities::opengl(), StageMask::VERTEX | StageMask::FRAGMENT);

        let fragment = accessor_names(&ctx, ShaderStage::Fragment);
        for (name, ty) in [("displayColor", "vec3"), ("faceIndex", "int"), ("points", "vec3"), ("translate_0", "vec3"), ("roughness", "float")] {
            assert!(fragment.contains(&format!("{ty} HdGet_{name}(int localIndex)")), "missing indexed accessor for {name}");
            assert!(fragment.contains(&format!("{ty} HdGet_{name}()")), "missing zero-argument accessor for {name}");
        }
        assert!(fragment.contains(&"float HdGetScalar_displayColor(int localIndex)".to_string()));

        let text = section(&ctx, ShaderStage::Fragment, Section::Accessor);
        assert!(text.contains("vec3 HdGet_points() {\n    return HdGet_points(0);\n}\n"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let metadata = MetaData {
            vertex_data: vec![ssbo_primvar("normals", DataType::Packed2_10_10_10, 3), ssbo_primvar("widths", DataType::Float, 4)],
            ..Default::default()
        };
        let shader = geometric_shader(PrimitiveType::MeshRefinedQuads);
        let first = run(&shader, &metadata, &Capabilities::opengl(), StageMask::VERTEX | StageMask::GEOMETRY | StageMask::FRAGMENT);
        let second = run(&shader, &metadata, &Capabilities::opengl(), StageMask::VERTEX | StageMask::GEOMETRY | StageMask::FRAGMENT);
        for stage in [ShaderStage::Vertex, ShaderStage::Geometry, ShaderStage::Fragment] {
            for sec in [Section::Define, Section::Declaration, Section::Accessor] {
                assert_eq!(section(&first, stage, sec), section(&second, stage, sec));
            }
            assert_eq!(first.elements(stage), second.elements(stage));
        }
    }

    #[test]
    fn test_read_binding_unpacks() {
        let ssbo = Binding::new(BindingKind::Ssbo, 0);
        assert_eq!(read_binding(&ssbo, "normals", &DataType::Packed2_10_10_10, Some("i")), "hd_vec4_2_10_10_10_get(normals[i])");
        assert_eq!(read_binding(&ssbo, "points", &DataType::Vec3, Some("i")), "points[i]");
        let uniform = Binding::new(BindingKind::UniformArray, 0);
        assert_eq!(read_binding(&uniform, "clip", &DataType::Vec3, Some("1")), "hd_vec3_get(clip[1])");
        let attr = Binding::new(BindingKind::VertexAttr, 0);
        assert_eq!(read_binding(&attr, "points", &DataType::Vec3, Some("hd_VertexID")), "points");
        let texture = Binding::new(BindingKind::Texture2d, 0);
        assert_eq!(read_binding(&texture, "diffuse", &DataType::Vec3, None), "vec3(0)");
    }
}
