//! Primvar category passes
//!
//! Each category has its own indexing formula:
//! * constant: interleaved struct at `constantCoord`
//! * instance: per-level buffer at `instanceCoords[level]`
//! * element: buffer at `elementCoord + GetElementID()` through the primitive-param indirection
//! * vertex and varying: attribute or buffer in vertex-like stages, interstage block elsewhere

use super::drawing_coord::plumbing_source;
use super::{Inputs, declare_struct_block, graphics_mask, overload_items, push_accessor, read_binding, read_struct_entry};
use crate::binding::BindingKind;
use crate::context::{GenerationContext, InterstageMember, Section};
use crate::ir::{Function, Item};
use crate::layout::{ArraySize, translate_binding};
use crate::packed::DataType;
use crate::shader::{PrimitiveType, ShaderStage, StageMask};

pub(crate) fn constant(inputs: &Inputs, ctx: &mut GenerationContext) {
    let stages = graphics_mask(ctx);
    for block in &inputs.metadata.constant_data {
        declare_struct_block(ctx, stages, block);
        for entry in &block.entries {
            let element = (entry.array_size > 0).then_some("localIndex");
            let read = read_struct_entry(block, &entry.name, &entry.data_type, "GetDrawingCoord().constantCoord", element);
            push_accessor(ctx, stages, &entry.name, &entry.data_type, vec![format!("return {read};")]);
        }
    }
}

pub(crate) fn instance(inputs: &Inputs, ctx: &mut GenerationContext) {
    let metadata = inputs.metadata;
    let levels = metadata.instancer_num_levels;
    let stages = graphics_mask(ctx);

    // Name, type and lowest authored level
    let mut names: Vec<(&str, &DataType, u32)> = Vec::new();
    for primvar in &metadata.instance_data {
        if primvar.level >= levels {
            tracing::warn!(primvar = %primvar.name, level = primvar.level, levels, "instance primvar level out of range, skipping");
            continue;
        }
        let name = format!("{}_{}", primvar.name, primvar.level);
        ctx.push_elements(stages, translate_binding(&primvar.binding, &name, &primvar.data_type, false, 0));
        let index = format!("GetDrawingCoord().instanceCoords[{}]", primvar.level);
        let read = read_binding(&primvar.binding, &name, &primvar.data_type, Some(&index));
        push_accessor(ctx, stages, &name, &primvar.data_type, vec![format!("return {read};")]);

        match names.iter_mut().find(|(existing, _, _)| *existing == primvar.name) {
            Some(entry) => entry.2 = entry.2.min(primvar.level),
            None => names.push((&primvar.name, &primvar.data_type, primvar.level)),
        }
    }

    // Dispatchers try each level in ascending order and fall back to the caller's default
    for (name, data_type, lowest) in names {
        let ty = data_type.unpacked_type();
        let mut dispatcher = Function::new(ty.glsl(), format!("HdGetInstance_{name}")).param("int level").param(format!("{} defaultValue", ty.glsl()));
        for level in 0..levels {
            dispatcher = dispatcher.lines([
                format!("#if defined(HD_HAS_{name}_{level})"),
                format!("if (level == {level}) return HdGet_{name}_{level}();"),
                "#endif".to_string(),
            ]);
        }
        ctx.push(Section::Accessor, stages, dispatcher.returning("defaultValue"));
        ctx.push(
            Section::Accessor,
            stages,
            Function::new(ty.glsl(), format!("HdGetInstance_{name}")).param(format!("{} defaultValue", ty.glsl())).returning(format!("HdGetInstance_{name}(0, defaultValue)")),
        );

        // Plain accessor for shaders unaware of instancing levels; any other primvar of the same name wins
        let mut then = vec![
            Item::has(name),
            Function::new(ty.glsl(), format!("HdGet_{name}")).param("int localIndex").returning(format!("HdGet_{name}_{lowest}()")).into(),
        ];
        then.extend(overload_items(name, &ty));
        ctx.push(
            Section::Accessor,
            stages,
            Item::Guard {
                condition: format!("!defined(HD_HAS_{name})"),
                then,
                otherwise: Vec::new(),
            },
        );
        ctx.register_primvar(name, &ty, stages);
    }
}

/// Sentinel element id of primitives without a primitive-param buffer
fn element_sentinel(primitive_type: PrimitiveType) -> &'static str {
    if primitive_type.is_points() { "-1" } else { "0" }
}

pub(crate) fn element(inputs: &Inputs, ctx: &mut GenerationContext) {
    let metadata = inputs.metadata;
    let primitive_type = inputs.geometric_shader.primitive_type;
    let stages: StageMask = graphics_mask(ctx).stages().filter(|stage| stage.has_primitive_id()).fold(StageMask::empty(), |mask, stage| mask | stage.into());
    if stages.is_empty() {
        return;
    }

    match &metadata.primitive_param {
        Some(param) => {
            ctx.push_elements(stages, translate_binding(&param.binding, &param.name, &param.data_type, false, 0));
            let read = read_binding(&param.binding, &param.name, &param.data_type, Some("GetDrawingCoord().primitiveCoord + GetPrimitiveID()"));
            push_accessor(ctx, stages, "primitiveParam", &param.data_type, vec![format!("return {read};")]);

            // Refined patches carry the coarse face in x and the patch param in y and z
            let coarse = if primitive_type.is_refined() { "HdGet_primitiveParam().x" } else { "HdGet_primitiveParam()" };
            let element_id = if primitive_type.is_mesh() { format!("{coarse} >> 2") } else { coarse.to_string() };
            ctx.push(Section::Accessor, stages, Function::new("int", "GetElementID").returning(element_id));
            ctx.push(Section::Accessor, stages, Function::new("int", "GetAggregatedElementID").returning("GetElementID() + GetDrawingCoord().elementCoord"));

            let edge_flag = if primitive_type.is_mesh() { format!("{coarse} & 3") } else { "0".to_string() };
            ctx.push(Section::Accessor, stages, Function::new("int", "GetEdgeFlag").param("int localIndex").returning(edge_flag));
            let patch_param = if primitive_type.is_refined() {
                "ivec2(HdGet_primitiveParam().y, HdGet_primitiveParam().z)"
            } else {
                "ivec2(0)"
            };
            ctx.push(Section::Accessor, stages, Function::new("ivec2", "GetPatchParam").returning(patch_param));
        }
        None => {
            let sentinel = element_sentinel(primitive_type);
            ctx.push(Section::Accessor, stages, Function::new("int", "GetElementID").returning(sentinel));
            ctx.push(Section::Accessor, stages, Function::new("int", "GetAggregatedElementID").returning(sentinel));
            ctx.push(Section::Accessor, stages, Function::new("int", "GetEdgeFlag").param("int localIndex").returning("0"));
            ctx.push(Section::Accessor, stages, Function::new("ivec2", "GetPatchParam").returning("ivec2(0)"));
        }
    }

    if let Some(edge_index) = &metadata.edge_index {
        ctx.push_elements(stages, translate_binding(&edge_index.binding, &edge_index.name, &edge_index.data_type, false, 0));
        let read = read_binding(&edge_index.binding, &edge_index.name, &edge_index.data_type, Some("GetDrawingCoord().primitiveCoord + GetPrimitiveID()"));
        push_accessor(ctx, stages, "edgeIndices", &edge_index.data_type, vec![format!("return {read};")]);
    }

    for primvar in &metadata.element_data {
        ctx.push_elements(stages, translate_binding(&primvar.binding, &primvar.name, &primvar.data_type, false, 0));
        let read = read_binding(&primvar.binding, &primvar.name, &primvar.data_type, Some("GetAggregatedElementID()"));
        push_accessor(ctx, stages, &primvar.name, &primvar.data_type, vec![format!("return {read};")]);
    }
}

/// Vertex and varying primvars
///
/// Vertex-like stages read storage directly; every later stage reads the interstage block its
/// predecessor writes.
pub(crate) fn vertex(inputs: &Inputs, ctx: &mut GenerationContext) {
    let metadata = inputs.metadata;
    let stages = graphics_mask(ctx);
    let raw: Vec<ShaderStage> = stages.stages().filter(|stage| stage.reads_raw_drawing_coord()).collect();
    let plumbed: Vec<ShaderStage> = stages.stages().filter(|stage| plumbing_source(ctx, *stage).is_some()).collect();

    let categories = metadata.vertex_data.iter().map(|p| (p, false)).chain(metadata.varying_data.iter().map(|p| (p, true)));
    for (primvar, varying) in categories {
        let name = &primvar.name;
        let ty = primvar.data_type.unpacked_type();

        for stage in &raw {
            let mut elements = translate_binding(&primvar.binding, name, &primvar.data_type, false, 0);
            // Post-tessellation vertex stages see attributes per patch control point
            let per_control_point = *stage == ShaderStage::PostTessVertex && primvar.binding.kind == BindingKind::VertexAttr;
            if per_control_point {
                elements = elements.into_iter().map(|e| e.with_interface_array(ArraySize::Unsized)).collect();
            }
            ctx.push_elements((*stage).into(), elements);

            let vertex_id = if *stage == ShaderStage::PostTessVertex { "localIndex" } else { "hd_VertexID" };
            let index = if varying {
                format!("GetDrawingCoord().varyingCoord + {vertex_id} - hd_BaseVertex")
            } else {
                vertex_id.to_string()
            };
            let read = if per_control_point {
                format!("{name}[localIndex]")
            } else {
                read_binding(&primvar.binding, name, &primvar.data_type, Some(&index))
            };
            push_accessor(ctx, (*stage).into(), name, &primvar.data_type, vec![format!("return {read};")]);
        }

        for stage in &plumbed {
            let read = if stage.has_arrayed_input() { format!("inPrimvars[localIndex].{name}") } else { format!("inPrimvars.{name}") };
            push_accessor(ctx, (*stage).into(), name, &ty, vec![format!("return {read};")]);
        }

        ctx.push_interstage_member(InterstageMember {
            name: name.clone(),
            data_type: ty,
            interpolated: true,
            geometry_only: false,
        });
    }

    if !metadata.varying_data.is_empty() {
        ctx.push(Section::Define, stages, Item::define("HD_HAS_VARYING_PRIMVARS", 1));
    }
}
