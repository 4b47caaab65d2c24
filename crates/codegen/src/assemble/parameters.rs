//! Material parameter accessors
//!
//! Parameters are emitted in four groups: redirects, 2D transforms, fallbacks, textures. Redirects
//! and transforms come first so a texture coordinate may name either of them. A real primvar
//! always wins over a parameter of the same name: the parameter accessor is left out of every
//! stage where the primvar already has one.

use super::{Inputs, declare_struct_block, graphics_mask, push_accessor, read_struct_entry};
use crate::binding::{Binding, MetaData, ParameterKind, ShaderParameter};
use crate::context::{GenerationContext, Section};
use crate::ir::{Function, Item};
use crate::layout::{TextureElement, TextureFormat, TextureType, translate_binding};
use crate::packed::DataType;
use crate::shader::StageMask;

const PTEX_SAMPLE: &[&str] = &[
    "int faceID = int(patchCoord.w);",
    "uvec4 faceLayout = texelFetch(layout, ivec2(faceID, 0), 0);",
    "vec2 faceSize = vec2(float(1u << (faceLayout.w >> 8)), float(1u << (faceLayout.w & 0xffu)));",
    "vec2 texel = vec2(faceLayout.yz) + patchCoord.xy * (faceSize - 1.0) + 0.5;",
    "vec2 texelsSize = vec2(textureSize(texels, 0).xy);",
    "return HD_TEXTURE_SAMPLE(texels, vec3(texel / texelsSize, float(faceLayout.x)));",
];

const UDIM_COORD: &[&str] = &[
    "vec2 tile = floor(coord);",
    "int tileIndex = int(tile.x) + 10 * int(tile.y);",
    "if (tileIndex < 0 || tileIndex >= textureSize(layout, 0)) {",
    "    return vec3(0.0, 0.0, -1.0);",
    "}",
    "float layer = texelFetch(layout, tileIndex, 0).x;",
    "return vec3(coord - tile, layer - 1.0);",
];

/// Helpers shared by all texture accessors of one compile
#[derive(Debug, Default)]
struct Helpers {
    ptex: bool,
    udim: bool,
}

pub(crate) fn generate(inputs: &Inputs, ctx: &mut GenerationContext) {
    let metadata = inputs.metadata;
    let stages = graphics_mask(ctx);
    if let Some(block) = &metadata.shader_data {
        declare_struct_block(ctx, stages, block);
    }

    for parameter in of_kind(metadata, &[ParameterKind::PrimvarRedirect]) {
        redirect(ctx, metadata, parameter);
    }
    for parameter in of_kind(metadata, &[ParameterKind::Transform2d]) {
        transform_2d(ctx, metadata, parameter);
    }
    for parameter in of_kind(metadata, &[ParameterKind::Fallback]) {
        if let Some(mask) = accessor_stages(ctx, parameter) {
            push_accessor(ctx, mask, &parameter.name, &parameter.data_type, vec![format!("return {};", fallback(metadata, parameter))]);
        }
    }
    let mut helpers = Helpers::default();
    for parameter in of_kind(metadata, &[ParameterKind::Texture, ParameterKind::Field, ParameterKind::Ptex, ParameterKind::Udim]) {
        texture(ctx, metadata, parameter, &mut helpers);
    }
}

fn of_kind<'a>(metadata: &'a MetaData, kinds: &'a [ParameterKind]) -> impl Iterator<Item = &'a ShaderParameter> + 'a {
    metadata.shader_parameters.iter().filter(move |parameter| kinds.contains(&parameter.kind))
}

/// Stages receiving a parameter accessor, `None` when a real primvar covers all of them
fn accessor_stages(ctx: &GenerationContext, parameter: &ShaderParameter) -> Option<StageMask> {
    let mut stages = graphics_mask(ctx);
    if let Some((_, shadowed)) = ctx.primvar(&parameter.name) {
        tracing::debug!(parameter = %parameter.name, "primvar of the same name takes precedence over the parameter");
        stages -= *shadowed;
    }
    (!stages.is_empty()).then_some(stages)
}

/// Expression of a material value authored in the shader data
fn material(metadata: &MetaData, entry: &str) -> Option<String> {
    let block = metadata.shader_data.as_ref()?;
    let entry = block.entry(entry)?;
    Some(read_struct_entry(block, &entry.name, &entry.data_type, "GetDrawingCoord().shaderCoord", None))
}

/// Authored fallback value of a parameter (`<name>_fallback`, then `<name>`), zero when missing
fn fallback(metadata: &MetaData, parameter: &ShaderParameter) -> String {
    material(metadata, &format!("{}_fallback", parameter.name))
        .or_else(|| material(metadata, &parameter.name))
        .unwrap_or_else(|| {
            tracing::warn!(parameter = %parameter.name, "no authored fallback value, using zero");
            parameter.data_type.default_value()
        })
}

/// Lines declaring `vec<dims> <var>` from a primvar, zero when the primvar is missing
fn coord_lines(ctx: &GenerationContext, primvar: &str, dims: u32, var: &str) -> Vec<String> {
    let target = format!("vec{dims}");
    let read = format!("HdGet_{primvar}(localIndex)");
    let components = ctx.primvar(primvar).map_or(dims, |(ty, _)| ty.component_count());
    let value = if components == 1 {
        let padding = ", 0.0".repeat(dims as usize - 1);
        format!("{target}({read}{padding})")
    } else if components > dims {
        let swizzle = &"xyzw"[..dims as usize];
        format!("{target}({read}.{swizzle})")
    } else if components == dims {
        format!("{target}({read})")
    } else {
        let padding = ", 0.0".repeat((dims - components) as usize);
        format!("{target}({read}{padding})")
    };
    vec![
        format!("#if defined(HD_HAS_{primvar})"),
        format!("{target} {var} = {value};"),
        "#else".to_string(),
        format!("{target} {var} = {target}(0.0);"),
        "#endif".to_string(),
    ]
}

fn redirect(ctx: &mut GenerationContext, metadata: &MetaData, parameter: &ShaderParameter) {
    let Some(mask) = accessor_stages(ctx, parameter) else {
        return;
    };
    // Redirects may chain, so every redirect is declared ahead of the first definition
    let ty = parameter.data_type.unpacked_type();
    ctx.push(Section::Declaration, mask, Item::Raw(format!("{} HdGet_{}(int localIndex);", ty.glsl(), parameter.name)));
    let fallback = fallback(metadata, parameter);
    let body = match parameter.in_primvars.first() {
        Some(target) => vec![
            format!("#if defined(HD_HAS_{target})"),
            format!("return HdGet_{target}(localIndex);"),
            "#else".to_string(),
            format!("return {fallback};"),
            "#endif".to_string(),
        ],
        None => {
            tracing::error!(parameter = %parameter.name, "primvar redirect without a target");
            vec![format!("return {fallback};")]
        }
    };
    push_accessor(ctx, mask, &parameter.name, &parameter.data_type, body);
}

fn transform_2d(ctx: &mut GenerationContext, metadata: &MetaData, parameter: &ShaderParameter) {
    let Some(mask) = accessor_stages(ctx, parameter) else {
        return;
    };
    let name = &parameter.name;
    let rotation = material(metadata, &format!("{name}_rotation")).unwrap_or_else(|| "0.0".to_string());
    let scale = material(metadata, &format!("{name}_scale")).unwrap_or_else(|| "vec2(1.0)".to_string());
    let translation = material(metadata, &format!("{name}_translation")).unwrap_or_else(|| "vec2(0.0)".to_string());
    let fallback = fallback(metadata, parameter);
    let ty = parameter.data_type.unpacked_type();

    let body = match parameter.in_primvars.first() {
        Some(source) => {
            let read = coord_lines(ctx, source, 2, "source");
            vec![
                format!("float angleRad = radians({rotation});"),
                "float rotCos = cos(angleRad);".to_string(),
                "float rotSin = sin(angleRad);".to_string(),
                "mat2 rotMat = mat2(rotCos, rotSin, -rotSin, rotCos);".to_string(),
                format!("#if defined(HD_HAS_{source})"),
                read[1].clone(),
                format!("return {}({translation} + rotMat * ({scale} * source));", ty.glsl()),
                "#else".to_string(),
                format!("return {fallback};"),
                "#endif".to_string(),
            ]
        }
        None => {
            tracing::error!(parameter = %name, "transform without a source primvar");
            vec![format!("return {fallback};")]
        }
    };
    push_accessor(ctx, mask, name, &parameter.data_type, body);
}

/// Declares one sampler and returns the expression naming it
///
/// Bound textures become texture elements; bindless ones become a uniform handle turned into a
/// sampler at the use site.
fn declare_sampler(ctx: &mut GenerationContext, mask: StageMask, binding: &Binding, texture: TextureElement) -> String {
    if binding.kind.is_bindless() {
        let sampler_type = texture.sampler_type();
        let elements = translate_binding(binding, &texture.name, &DataType::UVec2, false, texture.array_size);
        if elements.is_empty() {
            return format!("{sampler_type}(uvec2(0))");
        }
        ctx.push_elements(mask, elements);
        return format!("{sampler_type}({})", texture.name);
    }
    let name = texture.name.clone();
    ctx.push_texture(mask, texture);
    name
}

fn texture_element(name: String, dim: u8, binding: &Binding, format: TextureFormat, texture_type: TextureType, array_size: u32) -> TextureElement {
    TextureElement {
        name,
        dim,
        bind_index: binding.texture_bind_index(),
        format,
        texture_type,
        array_size,
    }
}

fn texture(ctx: &mut GenerationContext, metadata: &MetaData, parameter: &ShaderParameter, helpers: &mut Helpers) {
    let Some(mask) = accessor_stages(ctx, parameter) else {
        return;
    };
    let name = &parameter.name;
    let Some(binding) = parameter.binding else {
        tracing::error!(parameter = %name, kind = ?parameter.kind, "texture parameter without a binding, using its fallback");
        push_accessor(ctx, mask, name, &parameter.data_type, vec![format!("return {};", fallback(metadata, parameter))]);
        return;
    };
    let coord = parameter.in_primvars.first();
    let mut lines = Vec::new();

    let sample = match parameter.kind {
        ParameterKind::Texture => {
            let texture_type = if parameter.shadow { TextureType::ShadowTexture } else { TextureType::Texture };
            let element = texture_element(format!("sampler2d_{name}"), 2, &binding, TextureFormat::Float, texture_type, parameter.array_of_textures_size);
            let mut sampler = declare_sampler(ctx, mask, &binding, element);
            if parameter.array_of_textures_size > 0 && !binding.kind.is_bindless() {
                sampler = format!("{sampler}[localIndex]");
            }
            // Shadow lookups take the depth reference in the third coordinate
            let dims = if parameter.shadow { 3 } else { 2 };
            if let Some(coord) = coord {
                lines.extend(coord_lines(ctx, coord, dims, "coord"));
            } else {
                lines.push(format!("vec{dims} coord = vec{dims}(0.0);"));
            }
            if parameter.shadow {
                format!("vec4(HD_TEXTURE_SAMPLE({sampler}, coord))")
            } else {
                format!("HD_TEXTURE_SAMPLE({sampler}, coord)")
            }
        }
        ParameterKind::Field => {
            let element = texture_element(format!("sampler3d_{name}"), 3, &binding, TextureFormat::Float, TextureType::Texture, 0);
            let sampler = declare_sampler(ctx, mask, &binding, element);
            let transform = material(metadata, &format!("{name}_samplingTransform")).unwrap_or_else(|| "mat4(1.0)".to_string());
            let mut body = match coord {
                Some(coord) => coord_lines(ctx, coord, 3, "coord"),
                None => vec!["vec3 coord = vec3(0.0);".to_string()],
            };
            body.push(format!("return (({transform}) * vec4(coord, 1.0)).xyz;"));
            ctx.push(Section::Accessor, mask, Function::new("vec3", format!("HdGetCoord_{name}")).param("int localIndex").lines(body));
            format!("HD_TEXTURE_SAMPLE({sampler}, HdGetCoord_{name}(localIndex))")
        }
        ParameterKind::Ptex => {
            let Some(layout) = parameter.layout_binding else {
                tracing::error!(parameter = %name, "ptex parameter without a layout binding, using its fallback");
                push_accessor(ctx, mask, name, &parameter.data_type, vec![format!("return {};", fallback(metadata, parameter))]);
                return;
            };
            let texels = declare_sampler(
                ctx,
                mask,
                &binding,
                texture_element(format!("sampler2darray_{name}"), 2, &binding, TextureFormat::Float, TextureType::ArrayTexture, 0),
            );
            let layout = declare_sampler(
                ctx,
                mask,
                &layout,
                texture_element(format!("usampler1darray_{name}_layout"), 1, &layout, TextureFormat::UInt, TextureType::ArrayTexture, 0),
            );
            if !helpers.ptex {
                helpers.ptex = true;
                ctx.push(Section::Declaration, mask, Item::Raw("vec4 GetPatchCoord(int localIndex);".to_string()));
                ctx.push(
                    Section::Accessor,
                    graphics_mask(ctx),
                    Function::new("vec4", "hd_sample_ptex").param("sampler2DArray texels").param("usampler1DArray layout").param("vec4 patchCoord").lines(PTEX_SAMPLE.iter().copied()),
                );
            }
            format!("hd_sample_ptex({texels}, {layout}, GetPatchCoord(localIndex))")
        }
        ParameterKind::Udim => {
            let Some(layout) = parameter.layout_binding else {
                tracing::error!(parameter = %name, "udim parameter without a layout binding, using its fallback");
                push_accessor(ctx, mask, name, &parameter.data_type, vec![format!("return {};", fallback(metadata, parameter))]);
                return;
            };
            let texels = declare_sampler(
                ctx,
                mask,
                &binding,
                texture_element(format!("sampler2darray_{name}"), 2, &binding, TextureFormat::Float, TextureType::ArrayTexture, 0),
            );
            let layout = declare_sampler(
                ctx,
                mask,
                &layout,
                texture_element(format!("sampler1d_{name}_layout"), 1, &layout, TextureFormat::Float, TextureType::Texture, 0),
            );
            if !helpers.udim {
                helpers.udim = true;
                ctx.push(
                    Section::Accessor,
                    graphics_mask(ctx),
                    Function::new("vec3", "hd_udim_coord").param("sampler1D layout").param("vec2 coord").lines(UDIM_COORD.iter().copied()),
                );
            }
            match coord {
                Some(coord) => lines.extend(coord_lines(ctx, coord, 2, "coord")),
                None => lines.push("vec2 coord = vec2(0.0);".to_string()),
            }
            lines.push(format!("vec3 udim = hd_udim_coord({layout}, coord);"));
            format!("(udim.z < 0.0 ? vec4(0.0) : HD_TEXTURE_SAMPLE({texels}, udim))")
        }
        _ => return,
    };

    let valid = material(metadata, &format!("{name}_valid"));
    match valid {
        Some(valid) if parameter.process_texture_fallback_value => {
            lines.push(format!("vec4 value = {};", parameter.data_type.to_vec4(&fallback(metadata, parameter))));
            lines.push(format!("if (bool({valid})) {{"));
            lines.push(format!("    value = {sample};"));
            lines.push("}".to_string());
        }
        _ => lines.push(format!("vec4 value = {sample};")),
    }
    let scale = material(metadata, &format!("{name}_scale"));
    let bias = material(metadata, &format!("{name}_bias"));
    if scale.is_some() || bias.is_some() {
        let scale = scale.unwrap_or_else(|| "vec4(1.0)".to_string());
        let bias = bias.unwrap_or_else(|| "vec4(0.0)".to_string());
        lines.push(format!("value = value * {scale} + {bias};"));
    }
    lines.push(format!("return {};", parameter.data_type.from_vec4("value", parameter.swizzle.as_deref())));
    push_accessor(ctx, mask, name, &parameter.data_type, lines);
}

#[cfg(test)]
mod tests {
    use super::super::tests::{geometric_shader, run, section};
    use crate::binding::{Binding, BindingKind, FvarPrimvar, MetaData, ParameterKind, ShaderParameter, StructBlock, StructEntry};
    use crate::capabilities::Capabilities;
    use crate::context::{GenerationContext, Section};
    use crate::packed::DataType;
    use crate::shader::{PrimitiveType, ShaderStage, StageMask};

    fn parameter(name: &str, data_type: DataType, kind: ParameterKind) -> ShaderParameter {
        ShaderParameter {
            name: name.to_string(),
            data_type,
            kind,
            binding: None,
            layout_binding: None,
            in_primvars: Vec::new(),
            swizzle: None,
            array_of_textures_size: 0,
            shadow: false,
            process_texture_fallback_value: false,
        }
    }

    fn entry(name: &str, data_type: DataType) -> StructEntry {
        StructEntry {
            name: name.to_string(),
            data_type,
            array_size: 0,
        }
    }

    fn material(entries: Vec<StructEntry>) -> Option<StructBlock> {
        Some(StructBlock {
            binding: Binding::new(BindingKind::Ssbo, 3),
            block_name: "MaterialParams".to_string(),
            var_name: "materialParams".to_string(),
            entries,
        })
    }

    fn fragment(metadata: &MetaData) -> (GenerationContext, String) {
        let shader = geometric_shader(PrimitiveType::MeshRefinedQuads);
        let ctx = run(&shader, metadata, &Capabilities::opengl(), StageMask::VERTEX | StageMask::FRAGMENT);
        let text = section(&ctx, ShaderStage::Fragment, Section::Accessor);
        (ctx, text)
    }

    #[test]
    fn test_texture_validity_fallback() {
        let mut diffuse = parameter("diffuseColor", DataType::Vec3, ParameterKind::Texture);
        diffuse.binding = Some(Binding::new(BindingKind::Texture2d, 2));
        diffuse.in_primvars = vec!["st".to_string()];
        diffuse.process_texture_fallback_value = true;
        let metadata = MetaData {
            shader_data: material(vec![
                entry("diffuseColor_fallback", DataType::Vec3),
                entry("diffuseColor_valid", DataType::Bool),
                entry("diffuseColor_scale", DataType::Vec4),
                entry("diffuseColor_bias", DataType::Vec4),
            ]),
            shader_parameters: vec![diffuse],
            ..Default::default()
        };
        let (ctx, text) = fragment(&metadata);
        let params = "materialParams[GetDrawingCoord().shaderCoord]";
        let expected = [
            "vec3 HdGet_diffuseColor(int localIndex) {".to_string(),
            "#if defined(HD_HAS_st)".to_string(),
            "    vec2 coord = vec2(HdGet_st(localIndex));".to_string(),
            "#else".to_string(),
            "    vec2 coord = vec2(0.0);".to_string(),
            "#endif".to_string(),
            format!("    vec4 value = vec4(hd_vec3_get({params}.diffuseColor_fallback), 1.0);"),
            format!("    if (bool({params}.diffuseColor_valid)) {{"),
            "        value = HD_TEXTURE_SAMPLE(sampler2d_diffuseColor, coord);".to_string(),
            "    }".to_string(),
            format!("    value = value * {params}.diffuseColor_scale + {params}.diffuseColor_bias;"),
            "    return vec3(value.xyz);".to_string(),
            "}\n".to_string(),
        ]
        .join("\n");
        assert!(text.contains(&expected), "{text}");
        assert!(text.contains("vec3 HdGet_diffuseColor() {\n    return HdGet_diffuseColor(0);\n}\n"));

        let textures = ctx.textures(ShaderStage::Fragment);
        assert_eq!(textures.len(), 1);
        assert_eq!(textures[0].name, "sampler2d_diffuseColor");
        assert_eq!(textures[0].bind_index, 2);
    }

    #[test]
    fn test_redirect_reads_target_or_material() {
        let mut redirect = parameter("uv", DataType::Vec2, ParameterKind::PrimvarRedirect);
        redirect.in_primvars = vec!["st".to_string()];
        let metadata = MetaData {
            shader_data: material(vec![entry("uv", DataType::Vec2)]),
            shader_parameters: vec![redirect],
            ..Default::default()
        };
        let (ctx, text) = fragment(&metadata);
        assert!(text.contains(
            "vec2 HdGet_uv(int localIndex) {\n#if defined(HD_HAS_st)\n    return HdGet_st(localIndex);\n#else\n    return materialParams[GetDrawingCoord().shaderCoord].uv;\n#endif\n}\n"
        ));
        assert!(section(&ctx, ShaderStage::Fragment, Section::Define).contains("#define HD_HAS_uv 1\n"));
    }

    /// A name shared by a texture coordinate primvar and a redirect resolves to the primvar,
    /// and a texture whose coordinate names a redirect reads through it
    #[test]
    fn test_primvar_and_redirect_precedence() {
        let mut shadowed = parameter("st", DataType::Vec2, ParameterKind::PrimvarRedirect);
        shadowed.in_primvars = vec!["uvSet1".to_string()];
        let mut uv = parameter("uv", DataType::Vec2, ParameterKind::PrimvarRedirect);
        uv.in_primvars = vec!["st".to_string()];
        let mut diffuse = parameter("diffuseColor", DataType::Vec3, ParameterKind::Texture);
        diffuse.binding = Some(Binding::new(BindingKind::Texture2d, 0));
        diffuse.in_primvars = vec!["uv".to_string()];
        let metadata = MetaData {
            fvar_data: vec![FvarPrimvar {
                name: "st".to_string(),
                data_type: DataType::Vec2,
                channel: 0,
                binding: Binding::new(BindingKind::Ssbo, 1),
            }],
            shader_parameters: vec![diffuse, uv, shadowed],
            ..Default::default()
        };
        let (ctx, text) = fragment(&metadata);

        // The face-varying primvar owns HdGet_st in the fragment stage
        assert!(!text.contains("return HdGet_uvSet1(localIndex);"));
        assert_eq!(text.matches("vec2 HdGet_st(int localIndex) {").count(), 1);
        // The redirect only fills the stages the primvar does not reach
        assert!(section(&ctx, ShaderStage::Vertex, Section::Accessor).contains("return HdGet_uvSet1(localIndex);"));

        // The redirect accessor precedes the texture accessor reading it
        let redirect_at = text.find("vec2 HdGet_uv(int localIndex)").unwrap();
        let texture_at = text.find("vec3 HdGet_diffuseColor(int localIndex)").unwrap();
        assert!(redirect_at < texture_at);
        assert!(text.contains("vec2 coord = vec2(HdGet_uv(localIndex));"));
        assert!(section(&ctx, ShaderStage::Vertex, Section::Declaration).contains("vec2 HdGet_st(int localIndex);\n"));
        assert!(!section(&ctx, ShaderStage::Fragment, Section::Declaration).contains("vec2 HdGet_st(int localIndex);"));
    }

    #[test]
    fn test_ptex_and_udim_samplers() {
        let mut ptex = parameter("color", DataType::Vec4, ParameterKind::Ptex);
        ptex.binding = Some(Binding::new(BindingKind::TexturePtexTexel, 4));
        ptex.layout_binding = Some(Binding::new(BindingKind::TexturePtexLayout, 5));
        let mut udim = parameter("rough", DataType::Float, ParameterKind::Udim);
        udim.binding = Some(Binding::new(BindingKind::TextureUdimArray, 6));
        udim.layout_binding = Some(Binding::new(BindingKind::TextureUdimLayout, 7));
        udim.in_primvars = vec!["st".to_string()];
        udim.swizzle = Some("r".to_string());
        let metadata = MetaData {
            shader_parameters: vec![ptex, udim],
            ..Default::default()
        };
        let (ctx, text) = fragment(&metadata);

        assert!(text.contains("vec4 value = hd_sample_ptex(sampler2darray_color, usampler1darray_color_layout, GetPatchCoord(localIndex));"));
        assert!(text.contains("vec3 udim = hd_udim_coord(sampler1d_rough_layout, coord);"));
        assert!(text.contains("return float(value.r);"));
        assert_eq!(text.matches("vec4 hd_sample_ptex(").count(), 1);

        let samplers: Vec<_> = ctx.textures(ShaderStage::Fragment).into_iter().map(|t| (t.name.clone(), t.sampler_type())).collect();
        assert_eq!(
            samplers,
            vec![
                ("sampler2darray_color".to_string(), "sampler2DArray".to_string()),
                ("usampler1darray_color_layout".to_string(), "usampler1DArray".to_string()),
                ("sampler2darray_rough".to_string(), "sampler2DArray".to_string()),
                ("sampler1d_rough_layout".to_string(), "sampler1D".to_string()),
            ]
        );
    }

    #[test]
    fn test_transform_and_field() {
        let mut transform = parameter("stTransform", DataType::Vec2, ParameterKind::Transform2d);
        transform.in_primvars = vec!["st".to_string()];
        let mut density = parameter("density", DataType::Float, ParameterKind::Field);
        density.binding = Some(Binding::new(BindingKind::TextureField, 1));
        density.in_primvars = vec!["points".to_string()];
        let metadata = MetaData {
            shader_data: material(vec![entry("stTransform_rotation", DataType::Float), entry("density_samplingTransform", DataType::Mat4)]),
            shader_parameters: vec![density, transform],
            ..Default::default()
        };
        let (_, text) = fragment(&metadata);
        assert!(text.contains("float angleRad = radians(materialParams[GetDrawingCoord().shaderCoord].stTransform_rotation);"));
        assert!(text.contains("return vec2(vec2(0.0) + rotMat * (vec2(1.0) * source));"));
        assert!(text.contains("return ((materialParams[GetDrawingCoord().shaderCoord].density_samplingTransform) * vec4(coord, 1.0)).xyz;"));
        assert!(text.contains("vec4 value = HD_TEXTURE_SAMPLE(sampler3d_density, HdGetCoord_density(localIndex));"));
    }

    #[test]
    fn test_bindless_texture_uses_handle() {
        let mut diffuse = parameter("diffuseColor", DataType::Vec3, ParameterKind::Texture);
        diffuse.binding = Some(Binding::new(BindingKind::BindlessTexture2d, 9));
        let metadata = MetaData {
            shader_parameters: vec![diffuse],
            ..Default::default()
        };
        let (ctx, text) = fragment(&metadata);
        assert!(text.contains("vec4 value = HD_TEXTURE_SAMPLE(sampler2D(sampler2d_diffuseColor), coord);"));
        assert!(ctx.textures(ShaderStage::Fragment).is_empty());
        assert!(ctx.elements(ShaderStage::Fragment).iter().any(|e| e.name == "sampler2d_diffuseColor" && e.data_type == DataType::UVec2));
    }
}
