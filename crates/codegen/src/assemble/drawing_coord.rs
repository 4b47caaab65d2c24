//! Drawing coordinate and primitive id passes
//!
//! The drawing coordinate locates the current draw item inside every aggregated buffer. Stages
//! reading the raw per-draw attributes build it from them; every later stage rebuilds it from
//! flat pass-through values written by its predecessor.

use super::{Inputs, graphics_mask, read_binding};
use crate::context::{GenerationContext, Section};
use crate::ir::{Function, Item};
use crate::layout::{ArraySize, InOut, Interpolation, LayoutElement, translate_binding};
use crate::packed::DataType;
use crate::shader::{ShaderStage, StageMask};

/// Fields of `hd_drawingCoord` read from the three packed drawing-coordinate vectors, as (field, vector, component)
const COORD_FIELDS: [(&str, usize, &str); 10] = [
    ("modelCoord", 0, "x"),
    ("constantCoord", 0, "y"),
    ("elementCoord", 0, "z"),
    ("primitiveCoord", 0, "w"),
    ("fvarCoord", 1, "x"),
    ("instanceIndexCoord", 1, "y"),
    ("shaderCoord", 1, "z"),
    ("vertexCoord", 1, "w"),
    ("topologyVisibilityCoord", 2, "x"),
    ("varyingCoord", 2, "y"),
];

const COORD_TYPES: [DataType; 3] = [DataType::IVec4, DataType::IVec4, DataType::IVec2];

fn plumbed_name(producer: ShaderStage, vector: &str) -> String {
    format!("{}DrawingCoord{vector}", producer.prefix())
}

/// Index selecting this stage's own element of an arrayed output
pub(crate) fn output_index(stage: ShaderStage) -> &'static str {
    if stage.has_arrayed_output() { "[gl_InvocationID]" } else { "" }
}

/// Index reading the first element of an arrayed input
fn first_input(stage: ShaderStage) -> &'static str {
    if stage.has_arrayed_input() { "[0]" } else { "" }
}

fn interface_array(arrayed: bool) -> ArraySize {
    if arrayed { ArraySize::Unsized } else { ArraySize::None }
}

/// Stage whose plumbed values `stage` reads, if it does not read the raw coordinate
pub(crate) fn plumbing_source(ctx: &GenerationContext, stage: ShaderStage) -> Option<ShaderStage> {
    if stage.reads_raw_drawing_coord() {
        return None;
    }
    ctx.active().previous(stage)
}

pub(crate) fn drawing_coord(inputs: &Inputs, ctx: &mut GenerationContext) {
    let metadata = inputs.metadata;
    let levels = metadata.instancer_num_levels;
    let stages = graphics_mask(ctx);

    ctx.push(Section::Define, stages, Item::define("HD_INSTANCER_NUM_LEVELS", levels));
    ctx.push(Section::Define, stages, Item::define("HD_INSTANCE_INDEX_WIDTH", levels + 1));
    let mut fields: Vec<(String, String)> = COORD_FIELDS.iter().map(|(field, _, _)| ("int".to_string(), field.to_string())).collect();
    fields.push(("int".to_string(), "instanceIndex[HD_INSTANCE_INDEX_WIDTH]".to_string()));
    fields.push(("int".to_string(), "instanceCoords[HD_INSTANCE_INDEX_WIDTH]".to_string()));
    ctx.push(Section::Declaration, stages, Item::Struct { name: "hd_drawingCoord".to_string(), fields });

    let raw: StageMask = stages.stages().filter(|stage| stage.reads_raw_drawing_coord()).fold(StageMask::empty(), |mask, stage| mask | stage.into());
    raw_drawing_coord(inputs, ctx, raw);

    for stage in stages.stages() {
        match plumbing_source(ctx, stage) {
            Some(producer) => plumbed_drawing_coord(ctx, producer, stage, levels),
            None if !stage.reads_raw_drawing_coord() => {
                // First stage of a program without a vertex-like stage
                tracing::debug!(%stage, "no drawing coordinate source, using zero offsets");
                let body = vec!["hd_drawingCoord dc;".to_string()]
                    .into_iter()
                    .chain(COORD_FIELDS.iter().map(|(field, _, _)| format!("dc.{field} = 0;")))
                    .chain(["for (int i = 0; i < HD_INSTANCE_INDEX_WIDTH; ++i) {".to_string(), "    dc.instanceIndex[i] = 0;".to_string(), "    dc.instanceCoords[i] = 0;".to_string(), "}".to_string(), "return dc;".to_string()])
                    .collect::<Vec<_>>();
                ctx.push(Section::Accessor, stage.into(), Function::new("hd_drawingCoord", "GetDrawingCoord").lines(body));
            }
            None => {}
        }
    }

    for stage in stages.stages() {
        match ctx.active().next(stage) {
            Some(consumer) if !consumer.reads_raw_drawing_coord() => plumb_to_next(ctx, stage, consumer, levels),
            _ => {}
        }
    }
}

/// `GetDrawingCoord()` of stages reading the per-draw attributes
fn raw_drawing_coord(inputs: &Inputs, ctx: &mut GenerationContext, raw: StageMask) {
    if raw.is_empty() {
        return;
    }
    let metadata = inputs.metadata;
    let levels = metadata.instancer_num_levels;
    let bindings = [metadata.drawing_coord0, metadata.drawing_coord1, metadata.drawing_coord2];

    let mut vectors = Vec::new();
    for (i, binding) in bindings.iter().enumerate() {
        let name = format!("drawingCoord{i}");
        match binding {
            Some(binding) => {
                ctx.push_elements(raw, translate_binding(binding, &name, &COORD_TYPES[i], false, 0));
                vectors.push(read_binding(binding, &name, &COORD_TYPES[i], None));
            }
            None => vectors.push(COORD_TYPES[i].default_value()),
        }
    }

    let mut instance_coords = Vec::new();
    if levels > 0 {
        match &metadata.drawing_coord_i {
            Some(binding) => {
                ctx.push_elements(raw, translate_binding(binding, "drawingCoordI", &DataType::Int, false, levels));
                instance_coords.extend((0..levels).map(|level| format!("drawingCoordI_{level}")));
            }
            None => {
                tracing::error!(levels, "instancer levels without a drawingCoordI binding");
                instance_coords.extend((0..levels).map(|_| "0".to_string()));
            }
        }
    }

    let mut index = Function::new("int", "GetInstanceIndex").param("int level");
    index = match &metadata.instance_index_array {
        Some(binding) => {
            ctx.push_elements(raw, translate_binding(binding, "instanceIndices", &DataType::Int, false, 0));
            let offset = format!("{}.y + hd_InstanceID * HD_INSTANCE_INDEX_WIDTH + level", vectors[1]);
            index.returning(read_binding(binding, "instanceIndices", &DataType::Int, Some(&offset)))
        }
        None => index.returning("hd_InstanceID"),
    };
    ctx.push(Section::Accessor, raw, index);

    let mut body = vec!["hd_drawingCoord dc;".to_string()];
    body.extend(COORD_FIELDS.iter().map(|(field, vector, component)| format!("dc.{field} = {}.{component};", vectors[*vector])));
    body.push("for (int i = 0; i < HD_INSTANCE_INDEX_WIDTH; ++i) {".to_string());
    body.push("    dc.instanceIndex[i] = GetInstanceIndex(i);".to_string());
    body.push("    dc.instanceCoords[i] = 0;".to_string());
    body.push("}".to_string());
    body.extend(instance_coords.iter().enumerate().map(|(level, coord)| format!("dc.instanceCoords[{level}] = dc.instanceIndex[{}] + {coord};", level + 1)));
    body.push("return dc;".to_string());
    ctx.push(Section::Accessor, raw, Function::new("hd_drawingCoord", "GetDrawingCoord").lines(body));
}

/// `GetDrawingCoord()` of a stage reading its predecessor's pass-through values
///
/// Instance indices are not plumbed; only the instance coordinates survive the first stage.
fn plumbed_drawing_coord(ctx: &mut GenerationContext, producer: ShaderStage, stage: ShaderStage, levels: u32) {
    let index = first_input(stage);
    let mut body = vec!["hd_drawingCoord dc;".to_string()];
    body.extend(
        COORD_FIELDS
            .iter()
            .map(|(field, vector, component)| format!("dc.{field} = {}{index}.{component};", plumbed_name(producer, &vector.to_string()))),
    );
    body.push("for (int i = 0; i < HD_INSTANCE_INDEX_WIDTH; ++i) {".to_string());
    body.push("    dc.instanceIndex[i] = 0;".to_string());
    body.push("    dc.instanceCoords[i] = 0;".to_string());
    body.push("}".to_string());
    body.extend((0..levels).map(|level| format!("dc.instanceCoords[{level}] = {}{index};", plumbed_name(producer, &format!("I_{level}")))));
    body.push("return dc;".to_string());
    ctx.push(Section::Accessor, stage.into(), Function::new("hd_drawingCoord", "GetDrawingCoord").lines(body));
}

/// Declares the pass-through values between `producer` and `consumer` and the statements writing them
fn plumb_to_next(ctx: &mut GenerationContext, producer: ShaderStage, consumer: ShaderStage, levels: u32) {
    let mut values: Vec<(String, DataType, String)> = vec![
        ("0".to_string(), DataType::IVec4, "ivec4(dc.modelCoord, dc.constantCoord, dc.elementCoord, dc.primitiveCoord)".to_string()),
        ("1".to_string(), DataType::IVec4, "ivec4(dc.fvarCoord, dc.instanceIndexCoord, dc.shaderCoord, dc.vertexCoord)".to_string()),
        ("2".to_string(), DataType::IVec2, "ivec2(dc.topologyVisibilityCoord, dc.varyingCoord)".to_string()),
    ];
    values.extend((0..levels).map(|level| (format!("I_{level}"), DataType::Int, format!("dc.instanceCoords[{level}]"))));

    ctx.push_plumbing(producer, "hd_drawingCoord dc = GetDrawingCoord();");
    for (vector, data_type, expr) in values {
        let name = plumbed_name(producer, &vector);
        let out = LayoutElement::value(InOut::StageOut, name.clone(), data_type.clone())
            .with_qualifier(Interpolation::Flat)
            .with_interface_array(interface_array(producer.has_arrayed_output()));
        let input = LayoutElement::value(InOut::StageIn, name.clone(), data_type)
            .with_qualifier(Interpolation::Flat)
            .with_interface_array(interface_array(consumer.has_arrayed_input()));
        ctx.push_element(producer.into(), out);
        ctx.push_element(consumer.into(), input);
        ctx.push_plumbing(producer, format!("{name}{} = {expr};", output_index(producer)));
    }
}

/// Primitive id indirection: `GetPrimitiveID()`, `GetBasePrimitiveOffset()` and `GetTriQuadID()`
pub(crate) fn primitive_id(inputs: &Inputs, ctx: &mut GenerationContext) {
    let capabilities = inputs.capabilities;
    let primitive_type = inputs.geometric_shader.primitive_type;
    let stages: StageMask = graphics_mask(ctx).stages().filter(|stage| stage.has_primitive_id()).fold(StageMask::empty(), |mask, stage| mask | stage.into());
    if stages.is_empty() {
        return;
    }

    let emulated = capabilities.primitive_id_emulation && ctx.active().has(ShaderStage::PostTessVertex) && ctx.active().has(ShaderStage::Fragment);
    for stage in stages.stages() {
        let source = if emulated && stage == ShaderStage::Fragment { "ptvsPatchID" } else { "gl_PrimitiveID" };
        ctx.push(Section::Define, stage.into(), Item::define("hd_PrimitiveID", source));
    }
    if emulated {
        let out = LayoutElement::value(InOut::StageOut, "ptvsPatchID", DataType::Int).with_qualifier(Interpolation::Flat);
        let input = LayoutElement::value(InOut::StageIn, "ptvsPatchID", DataType::Int).with_qualifier(Interpolation::Flat);
        ctx.push_element(StageMask::POST_TESS_VERTEX, out);
        ctx.push_element(StageMask::FRAGMENT, input);
        ctx.push_plumbing(ShaderStage::PostTessVertex, "ptvsPatchID = hd_PrimitiveID;");
    }

    let offset = if capabilities.requires_base_primitive_offset {
        ctx.push(Section::Accessor, stages, Function::new("int", "GetBasePrimitiveOffset").returning("GetDrawingCoord().primitiveCoord"));
        "(hd_PrimitiveID - GetBasePrimitiveOffset())"
    } else {
        "hd_PrimitiveID"
    };

    if primitive_type.is_tri_quads() {
        // Each quad is drawn as two triangles
        ctx.push(Section::Accessor, stages, Function::new("int", "GetPrimitiveID").returning(format!("{offset} / 2")));
        ctx.push(Section::Accessor, stages, Function::new("int", "GetTriQuadID").returning(format!("{offset} & 1")));
    } else {
        ctx.push(Section::Accessor, stages, Function::new("int", "GetPrimitiveID").returning(offset));
    }
}
