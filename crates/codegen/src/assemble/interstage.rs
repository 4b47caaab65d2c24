//! Interstage primvar blocks and the procedures filling them
//!
//! Every stage that feeds another through the plumbed path writes one output block
//! (`outPrimvars`) matching the consumer's input block (`inPrimvars`) member for member. The
//! producer's fill procedure also runs the drawing-coordinate plumbing collected by earlier passes.

use crate::context::{GenerationContext, InterstageMember, Section};
use crate::ir::Function;
use crate::layout::{ArraySize, InOut, Interpolation, LayoutElement, Member};
use crate::shader::{ShaderStage, StageMask};

/// Members crossing from `producer` to its successor
fn members_from(ctx: &GenerationContext, producer: ShaderStage) -> Vec<&InterstageMember> {
    ctx.interstage_members().iter().filter(|member| !member.geometry_only || producer == ShaderStage::Geometry).collect()
}

fn interface_member(member: &InterstageMember) -> Member {
    let declared = Member::new(member.name.clone(), member.data_type.clone());
    if member.data_type.is_integral() || member.data_type.is_double() {
        declared.with_qualifier(Interpolation::Flat)
    } else {
        declared
    }
}

/// Declares the output block of `producer` and the matching input block of `consumer`
fn declare_blocks(ctx: &mut GenerationContext, producer: ShaderStage, consumer: ShaderStage) {
    let members: Vec<Member> = members_from(ctx, producer).into_iter().map(interface_member).collect();
    if members.is_empty() {
        return;
    }
    let block_name = format!("Primvars{}", producer.abbreviation());

    let mut output = LayoutElement::block(InOut::StageOut, block_name.clone(), "outPrimvars", members.clone());
    if producer.has_arrayed_output() {
        output = output.with_interface_array(ArraySize::Unsized);
    }
    ctx.push_element(producer.into(), output);

    let mut input = LayoutElement::block(InOut::StageIn, block_name, "inPrimvars", members);
    if consumer.has_arrayed_input() {
        input = input.with_interface_array(ArraySize::Unsized);
    }
    ctx.push_element(consumer.into(), input);
}

/// Weighted sum of the four control-point values selected by `i0..i3`
fn weighted(member: &InterstageMember) -> String {
    let name = &member.name;
    if !member.interpolated || member.data_type.is_integral() {
        return format!("HdGet_{name}(i0)");
    }
    (0..4).map(|i| format!("basis[{i}] * HdGet_{name}(i{i})")).collect::<Vec<_>>().join(" + ")
}

fn fill_procedure(ctx: &GenerationContext, stage: ShaderStage, has_consumer: bool) -> Vec<Function> {
    let plumbing = ctx.plumbing(stage).to_vec();
    let members: Vec<&InterstageMember> = if has_consumer { members_from(ctx, stage) } else { Vec::new() };
    match stage {
        ShaderStage::Vertex => {
            let writes = members.iter().map(|m| format!("outPrimvars.{0} = HdGet_{0}();", m.name));
            vec![Function::new("void", "ProcessPrimvarsIn").lines(plumbing).lines(writes)]
        }
        ShaderStage::TessControl => {
            let writes = members.iter().map(|m| format!("outPrimvars[gl_InvocationID].{0} = inPrimvars[gl_InvocationID].{0};", m.name));
            vec![Function::new("void", "ProcessPrimvarsOut").lines(plumbing).lines(writes)]
        }
        ShaderStage::TessEval | ShaderStage::PostTessVertex => {
            let writes = members.iter().map(|m| format!("outPrimvars.{} = {};", m.name, weighted(m)));
            vec![
                Function::new("void", "ProcessPrimvarsOut")
                    .param("vec4 basis")
                    .param("int i0")
                    .param("int i1")
                    .param("int i2")
                    .param("int i3")
                    .lines(plumbing)
                    .lines(writes),
            ]
        }
        ShaderStage::Geometry => {
            let (face_varying, per_vertex): (Vec<&InterstageMember>, Vec<&InterstageMember>) = members.into_iter().partition(|m| m.geometry_only);
            let writes = per_vertex.iter().map(|m| format!("outPrimvars.{0} = HdGet_{0}(index);", m.name));
            let by_vertex = Function::new("void", "ProcessPrimvarsOut").param("int index").lines(plumbing).lines(writes);
            let face_varying_writes = face_varying.iter().map(|m| format!("outPrimvars.{0} = HdGet_{0}(index, localST);", m.name));
            let by_patch = Function::new("void", "ProcessPrimvarsOut")
                .param("int index")
                .param("vec2 localST")
                .line("ProcessPrimvarsOut(index);")
                .lines(face_varying_writes);
            vec![by_vertex, by_patch]
        }
        _ => Vec::new(),
    }
}

pub(crate) fn generate(ctx: &mut GenerationContext) {
    let stages = ctx.active().graphics();
    for producer in stages {
        let consumer = ctx.active().next(producer).filter(|consumer| !consumer.reads_raw_drawing_coord());
        if let Some(consumer) = consumer {
            declare_blocks(ctx, producer, consumer);
        }
        for procedure in fill_procedure(ctx, producer, consumer.is_some()) {
            ctx.push(Section::Accessor, StageMask::from(producer), procedure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{geometric_shader, run, section, ssbo_primvar};
    use crate::binding::{Binding, BindingKind, FvarPrimvar, MetaData};
    use crate::capabilities::Capabilities;
    use crate::context::Section;
    use crate::layout::{ArraySize, ElementKind, InOut, Interpolation};
    use crate::packed::DataType;
    use crate::shader::{FvarPatchType, PrimitiveType, ShaderStage, StageMask};

    fn metadata() -> MetaData {
        MetaData {
            vertex_data: vec![ssbo_primvar("points", DataType::Vec3, 0), ssbo_primvar("cornerIndex", DataType::Int, 1)],
            ..Default::default()
        }
    }

    #[test]
    fn test_vertex_to_fragment_blocks() {
        let shader = geometric_shader(PrimitiveType::MeshCoarseTriangles);
        let ctx = run(&shader, &metadata(), &Capabilities::opengl(), StageMask::VERTEX | StageMask::FRAGMENT);

        let outputs = ctx.elements(ShaderStage::Vertex);
        let output = outputs.iter().find(|e| e.kind == ElementKind::Block && e.in_out == InOut::StageOut).unwrap();
        assert_eq!(output.name, "PrimvarsVS");
        assert_eq!(output.block_instance.as_deref(), Some("outPrimvars"));
        let names: Vec<_> = output.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["points", "cornerIndex"]);
        assert_eq!(output.members[1].qualifier, Interpolation::Flat);
        assert_eq!(output.members[0].qualifier, Interpolation::None);

        let inputs = ctx.elements(ShaderStage::Fragment);
        let input = inputs.iter().find(|e| e.kind == ElementKind::Block && e.in_out == InOut::StageIn).unwrap();
        assert_eq!(input.name, "PrimvarsVS");
        assert_eq!(input.members, output.members);
        assert_eq!(input.interface_array, ArraySize::None);

        let text = section(&ctx, ShaderStage::Vertex, Section::Accessor);
        assert!(text.contains("void ProcessPrimvarsIn() {\n    hd_drawingCoord dc = GetDrawingCoord();\n"));
        assert!(text.contains("    outPrimvars.points = HdGet_points();\n    outPrimvars.cornerIndex = HdGet_cornerIndex();\n}\n"));
    }

    #[test]
    fn test_tessellation_chain() {
        let shader = geometric_shader(PrimitiveType::MeshBSpline);
        let mask = StageMask::VERTEX | StageMask::TESS_CONTROL | StageMask::TESS_EVAL | StageMask::FRAGMENT;
        let ctx = run(&shader, &metadata(), &Capabilities::opengl(), mask);

        let tcs = ctx.elements(ShaderStage::TessControl);
        let tcs_out = tcs.iter().find(|e| e.kind == ElementKind::Block && e.in_out == InOut::StageOut).unwrap();
        assert_eq!(tcs_out.interface_array, ArraySize::Unsized);
        let tcs_in = tcs.iter().find(|e| e.kind == ElementKind::Block && e.in_out == InOut::StageIn).unwrap();
        assert_eq!(tcs_in.name, "PrimvarsVS");
        assert_eq!(tcs_in.interface_array, ArraySize::Unsized);

        let text = section(&ctx, ShaderStage::TessControl, Section::Accessor);
        assert!(text.contains("outPrimvars[gl_InvocationID].points = inPrimvars[gl_InvocationID].points;"));

        let text = section(&ctx, ShaderStage::TessEval, Section::Accessor);
        assert!(text.contains("void ProcessPrimvarsOut(vec4 basis, int i0, int i1, int i2, int i3) {"));
        assert!(text.contains(
            "outPrimvars.points = basis[0] * HdGet_points(i0) + basis[1] * HdGet_points(i1) + basis[2] * HdGet_points(i2) + basis[3] * HdGet_points(i3);"
        ));
        assert!(text.contains("outPrimvars.cornerIndex = HdGet_cornerIndex(i0);"));
    }

    #[test]
    fn test_geometry_forwards_face_varying() {
        let mut shader = geometric_shader(PrimitiveType::MeshCoarseQuads);
        shader.fvar_patch_type = FvarPatchType::CoarseQuads;
        let mut metadata = metadata();
        metadata.fvar_data = vec![FvarPrimvar {
            name: "st".to_string(),
            data_type: DataType::Vec2,
            channel: 0,
            binding: Binding::new(BindingKind::Ssbo, 4),
        }];
        let ctx = run(&shader, &metadata, &Capabilities::opengl(), StageMask::VERTEX | StageMask::GEOMETRY | StageMask::FRAGMENT);

        let vs_out = ctx.elements(ShaderStage::Vertex);
        let vs_block = vs_out.iter().find(|e| e.kind == ElementKind::Block && e.in_out == InOut::StageOut).unwrap();
        assert!(vs_block.members.iter().all(|m| m.name != "st"));

        let gs_out = ctx.elements(ShaderStage::Geometry);
        let gs_block = gs_out.iter().find(|e| e.kind == ElementKind::Block && e.in_out == InOut::StageOut).unwrap();
        assert!(gs_block.members.iter().any(|m| m.name == "st"));

        let text = section(&ctx, ShaderStage::Geometry, Section::Accessor);
        assert!(text.contains("void ProcessPrimvarsOut(int index, vec2 localST) {\n    ProcessPrimvarsOut(index);\n    outPrimvars.st = HdGet_st(index, localST);\n}\n"));
        assert!(text.contains("outPrimvars.points = HdGet_points(index);"));
    }

    #[test]
    fn test_lone_vertex_stage_still_gets_procedure() {
        let shader = geometric_shader(PrimitiveType::Points);
        let ctx = run(&shader, &metadata(), &Capabilities::opengl(), StageMask::VERTEX);
        assert!(ctx.elements(ShaderStage::Vertex).iter().all(|e| e.kind != ElementKind::Block));
        assert!(section(&ctx, ShaderStage::Vertex, Section::Accessor).contains("void ProcessPrimvarsIn() {\n}\n"));
    }
}
