//! Face-varying primvars
//!
//! Two layers per primvar: `HdGet_<name>_Coarse(localIndex)` reads one raw corner sample and
//! `HdGet_<name>(localIndex, st)` interpolates the corners of the current patch. Both live in the
//! geometry stage when there is one, otherwise directly in the fragment stage.

use super::{Inputs, push_accessor, push_overloads, read_binding};
use crate::binding::{ChannelBinding, FvarPrimvar};
use crate::context::{GenerationContext, InterstageMember, Section};
use crate::ir::{Function, Item};
use crate::layout::translate_binding;
use crate::shader::{FvarPatchType, GeometricShader, ShaderStage, StageMask};

/// Interpolation applied to the corner samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Bilinear,
    Barycentric,
    /// Weighted basis over all patch control points
    Basis(&'static str),
    /// One sample per primitive
    None,
}

fn interpolation(shader: &GeometricShader) -> Interpolation {
    match shader.fvar_patch_type {
        FvarPatchType::CoarseQuads | FvarPatchType::RefinedQuads => Interpolation::Bilinear,
        FvarPatchType::CoarseTriangles | FvarPatchType::RefinedTriangles => Interpolation::Barycentric,
        FvarPatchType::BSpline => Interpolation::Basis("OSD_PATCH_DESCRIPTOR_REGULAR"),
        FvarPatchType::BoxSplineTriangle => Interpolation::Basis("OSD_PATCH_DESCRIPTOR_LOOP"),
        FvarPatchType::None if shader.primitive_type.is_quads() || shader.primitive_type.is_tri_quads() => Interpolation::Bilinear,
        FvarPatchType::None if shader.primitive_type.is_triangles() => Interpolation::Barycentric,
        FvarPatchType::None => Interpolation::None,
    }
}

fn channel(bindings: &[ChannelBinding], channel: u32) -> Option<&ChannelBinding> {
    bindings.iter().find(|binding| binding.channel == channel)
}

pub(crate) fn generate(inputs: &Inputs, ctx: &mut GenerationContext) {
    let metadata = inputs.metadata;
    if metadata.fvar_data.is_empty() {
        return;
    }
    let Some(stage) = ctx.active().face_varying_stage() else {
        return;
    };
    let shader = inputs.geometric_shader;
    let mask = StageMask::from(stage);
    let corners = shader.fvar_corner_count();
    let refined = shader.fvar_patch_type.is_refined();
    let interpolation = interpolation(shader);

    ctx.push(Section::Declaration, mask, Item::Raw("vec4 GetPatchCoord(int localIndex);".to_string()));

    // Per-channel helpers, once per channel in use
    let mut channels: Vec<u32> = metadata.fvar_data.iter().map(|primvar| primvar.channel).collect();
    channels.sort_unstable();
    channels.dedup();
    for ch in channels {
        if refined {
            match channel(&metadata.fvar_indices, ch) {
                Some(indices) => {
                    let name = format!("fvarIndices_{ch}");
                    ctx.push_elements(mask, translate_binding(&indices.binding, &name, &indices.data_type, false, 0));
                    let read = read_binding(&indices.binding, &name, &indices.data_type, Some("localIndex"));
                    ctx.push(Section::Accessor, mask, Function::new("int", format!("HdGet_{name}")).param("int localIndex").returning(read));
                }
                None => tracing::error!(channel = ch, "refined face-varying channel without an index buffer"),
            }
        }
        if let Interpolation::Basis(_) = interpolation {
            let body = match channel(&metadata.fvar_patch_param, ch) {
                Some(param) => {
                    let name = format!("fvarPatchParam_{ch}");
                    ctx.push_elements(mask, translate_binding(&param.binding, &name, &param.data_type, false, 0));
                    format!("ivec2({})", read_binding(&param.binding, &name, &param.data_type, Some("GetPrimitiveID()")))
                }
                None => {
                    tracing::error!(channel = ch, "spline face-varying channel without a patch-param buffer");
                    "ivec2(0)".to_string()
                }
            };
            ctx.push(Section::Accessor, mask, Function::new("ivec2", format!("GetFVarPatchParam_{ch}")).returning(body));
        }
    }

    for primvar in &metadata.fvar_data {
        coarse_accessor(ctx, mask, primvar, corners, refined && channel(&metadata.fvar_indices, primvar.channel).is_some());
        interpolated_accessor(ctx, mask, primvar, corners, interpolation);
    }

    // A geometry stage forwards the interpolated values to the fragment stage
    if stage == ShaderStage::Geometry && ctx.active().has(ShaderStage::Fragment) {
        for primvar in &metadata.fvar_data {
            let ty = primvar.data_type.unpacked_type();
            push_accessor(ctx, StageMask::FRAGMENT, &primvar.name, &ty, vec![format!("return inPrimvars.{};", primvar.name)]);
            ctx.push_interstage_member(InterstageMember {
                name: primvar.name.clone(),
                data_type: ty,
                interpolated: false,
                geometry_only: true,
            });
        }
    }
}

fn coarse_accessor(ctx: &mut GenerationContext, mask: StageMask, primvar: &FvarPrimvar, corners: u32, indexed: bool) {
    let name = &primvar.name;
    ctx.push_elements(mask, translate_binding(&primvar.binding, name, &primvar.data_type, false, 0));
    let corner = format!("GetPrimitiveID() * {corners} + localIndex");
    let index = if indexed {
        format!("GetDrawingCoord().fvarCoord + HdGet_fvarIndices_{}({corner})", primvar.channel)
    } else {
        format!("GetDrawingCoord().fvarCoord + {corner}")
    };
    let read = read_binding(&primvar.binding, name, &primvar.data_type, Some(&index));
    let ty = primvar.data_type.unpacked_type();
    ctx.push(Section::Accessor, mask, Function::new(ty.glsl(), format!("HdGet_{name}_Coarse")).param("int localIndex").returning(read));
}

fn interpolated_accessor(ctx: &mut GenerationContext, mask: StageMask, primvar: &FvarPrimvar, corners: u32, interpolation: Interpolation) {
    let name = &primvar.name;
    let ty = primvar.data_type.unpacked_type();
    let coarse = |corner: &str| format!("HdGet_{name}_Coarse({corner})");

    // Integral values cannot be blended
    let interpolation = if ty.is_integral() { Interpolation::None } else { interpolation };
    let body = match interpolation {
        Interpolation::Bilinear => vec![format!(
            "return mix(mix({}, {}, st.x), mix({}, {}, st.x), st.y);",
            coarse("0"),
            coarse("1"),
            coarse("3"),
            coarse("2")
        )],
        Interpolation::Barycentric => vec![format!("return {} * (1.0 - st.x - st.y) + {} * st.x + {} * st.y;", coarse("0"), coarse("1"), coarse("2"))],
        Interpolation::Basis(descriptor) => vec![
            "float wP[20], wDs[20], wDt[20], wDss[20], wDst[20], wDtt[20];".to_string(),
            format!("ivec2 fvarPatchParam = GetFVarPatchParam_{}();", primvar.channel),
            "OsdPatchParam param = OsdPatchParamInit(fvarPatchParam.x, fvarPatchParam.y, 0);".to_string(),
            format!("OsdEvaluatePatchBasisNormalized({descriptor}, param, st.x, st.y, wP, wDs, wDt, wDss, wDst, wDtt);"),
            format!("{} result = {};", ty.glsl(), ty.default_value()),
            format!("for (int i = 0; i < {corners}; ++i) {{"),
            format!("    result += wP[i] * {};", coarse("i")),
            "}".to_string(),
            "return result;".to_string(),
        ],
        Interpolation::None => vec![format!("return {};", coarse("localIndex"))],
    };

    let function = Function::new(ty.glsl(), format!("HdGet_{name}")).param("int localIndex").param("vec2 st").lines(body);
    ctx.push(Section::Accessor, mask, function);
    ctx.push(
        Section::Accessor,
        mask,
        Function::new(ty.glsl(), format!("HdGet_{name}")).param("int localIndex").returning(format!("HdGet_{name}(localIndex, GetPatchCoord(localIndex).xy)")),
    );
    ctx.push(Section::Define, mask, Item::has(name));
    push_overloads(ctx, mask, name, &ty);
    ctx.register_primvar(name, &ty, mask);
}

#[cfg(test)]
mod tests {
    use super::super::tests::{geometric_shader, run, section, ssbo_primvar};
    use crate::binding::{Binding, BindingKind, ChannelBinding, FvarPrimvar, MetaData};
    use crate::capabilities::Capabilities;
    use crate::context::Section;
    use crate::packed::DataType;
    use crate::shader::{FvarPatchType, PrimitiveType, ShaderStage, StageMask};

    fn fvar_metadata() -> MetaData {
        MetaData {
            fvar_data: vec![FvarPrimvar {
                name: "st".to_string(),
                data_type: DataType::Vec2,
                channel: 0,
                binding: Binding::new(BindingKind::Ssbo, 7),
            }],
            fvar_indices: vec![ChannelBinding {
                channel: 0,
                data_type: DataType::Int,
                binding: Binding::new(BindingKind::Ssbo, 8),
            }],
            fvar_patch_param: vec![ChannelBinding {
                channel: 0,
                data_type: DataType::IVec2,
                binding: Binding::new(BindingKind::Ssbo, 9),
            }],
            primitive_param: Some(ssbo_primvar("primitiveParam", DataType::Int, 2)),
            ..Default::default()
        }
    }

    #[test]
    fn test_coarse_quads_in_fragment_stage() {
        let shader = geometric_shader(PrimitiveType::MeshCoarseQuads);
        let ctx = run(&shader, &fvar_metadata(), &Capabilities::opengl(), StageMask::VERTEX | StageMask::FRAGMENT);
        let text = section(&ctx, ShaderStage::Fragment, Section::Accessor);
        assert!(text.contains("return st[GetDrawingCoord().fvarCoord + GetPrimitiveID() * 4 + localIndex];"));
        assert!(text.contains("return mix(mix(HdGet_st_Coarse(0), HdGet_st_Coarse(1), st.x), mix(HdGet_st_Coarse(3), HdGet_st_Coarse(2), st.x), st.y);"));
        assert!(text.contains("vec2 HdGet_st(int localIndex) {\n    return HdGet_st(localIndex, GetPatchCoord(localIndex).xy);\n}\n"));
        assert!(text.contains("vec2 HdGet_st() {\n    return HdGet_st(0);\n}\n"));
        assert!(section(&ctx, ShaderStage::Fragment, Section::Declaration).contains("vec4 GetPatchCoord(int localIndex);"));
        assert!(!section(&ctx, ShaderStage::Vertex, Section::Accessor).contains("HdGet_st"));
    }

    #[test]
    fn test_refined_triangles_use_index_buffer() {
        let mut shader = geometric_shader(PrimitiveType::MeshRefinedTriangles);
        shader.fvar_patch_type = FvarPatchType::RefinedTriangles;
        let ctx = run(&shader, &fvar_metadata(), &Capabilities::opengl(), StageMask::VERTEX | StageMask::FRAGMENT);
        let text = section(&ctx, ShaderStage::Fragment, Section::Accessor);
        assert!(text.contains("return fvarIndices_0[localIndex];"));
        assert!(text.contains("return st[GetDrawingCoord().fvarCoord + HdGet_fvarIndices_0(GetPrimitiveID() * 3 + localIndex)];"));
        assert!(text.contains("return HdGet_st_Coarse(0) * (1.0 - st.x - st.y) + HdGet_st_Coarse(1) * st.x + HdGet_st_Coarse(2) * st.y;"));
    }

    #[test]
    fn test_spline_patches_evaluate_basis_in_geometry_stage() {
        let mut shader = geometric_shader(PrimitiveType::MeshBSpline);
        shader.fvar_patch_type = FvarPatchType::BSpline;
        let mask = StageMask::VERTEX | StageMask::TESS_CONTROL | StageMask::TESS_EVAL | StageMask::GEOMETRY | StageMask::FRAGMENT;
        let ctx = run(&shader, &fvar_metadata(), &Capabilities::opengl(), mask);

        let geometry = section(&ctx, ShaderStage::Geometry, Section::Accessor);
        assert!(geometry.contains("OsdEvaluatePatchBasisNormalized(OSD_PATCH_DESCRIPTOR_REGULAR, param, st.x, st.y, wP, wDs, wDt, wDss, wDst, wDtt);"));
        assert!(geometry.contains("for (int i = 0; i < 16; ++i) {\n        result += wP[i] * HdGet_st_Coarse(i);\n    }"));
        assert!(geometry.contains("return ivec2(fvarPatchParam_0[GetPrimitiveID()]);"));

        // The fragment stage reads what the geometry stage interpolated
        let fragment = section(&ctx, ShaderStage::Fragment, Section::Accessor);
        assert!(fragment.contains("return inPrimvars.st;"));
        assert!(!fragment.contains("HdGet_st_Coarse"));
        assert!(ctx.interstage_members().iter().any(|m| m.name == "st" && m.geometry_only));
    }
}
