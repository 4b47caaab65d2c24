//! Device capabilities
//!
//! Read-only capability bits of the target backend. Choosing them is the caller's business;
//! this module only ships the presets the command-line tools and manifests refer to by name.

use crate::shader::ShaderStage;
use serde::{Deserialize, Serialize};

/// Capability bits consumed by code generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// `#version` of the generated GLSL
    pub glsl_version: u32,
    pub bindless_textures: bool,
    pub bindless_buffers: bool,
    pub shader_draw_parameters: bool,
    pub builtin_barycentrics: bool,
    /// Tessellation runs as a compute pre-pass followed by a post-tessellation vertex stage
    pub post_tessellation: bool,
    /// Primitive ids do not restart at zero per draw and must be rebased
    pub requires_base_primitive_offset: bool,
    /// The fragment stage has no native primitive id; it is plumbed from the post-tessellation vertex stage
    pub primitive_id_emulation: bool,
    pub double_precision: bool,
    pub depth_range_zero_to_one: bool,
    /// The backend consumes per-stage function descriptors natively
    pub function_descriptors: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::opengl()
    }
}

/// Preset names accepted by [`Capabilities::preset`]
pub const PRESET_NAMES: &[&str] = &["opengl", "vulkan", "metal"];

impl Capabilities {
    /// Desktop OpenGL 4.5 with draw parameters
    pub fn opengl() -> Self {
        Self {
            glsl_version: 450,
            bindless_textures: false,
            bindless_buffers: false,
            shader_draw_parameters: true,
            builtin_barycentrics: false,
            post_tessellation: false,
            requires_base_primitive_offset: false,
            primitive_id_emulation: false,
            double_precision: true,
            depth_range_zero_to_one: false,
            function_descriptors: false,
        }
    }

    /// Vulkan-class device consuming function descriptors
    pub fn vulkan() -> Self {
        Self {
            depth_range_zero_to_one: true,
            function_descriptors: true,
            ..Self::opengl()
        }
    }

    /// Metal-class device with post-tessellation stages and emulated primitive ids
    pub fn metal() -> Self {
        Self {
            builtin_barycentrics: true,
            post_tessellation: true,
            requires_base_primitive_offset: true,
            primitive_id_emulation: true,
            double_precision: false,
            depth_range_zero_to_one: true,
            function_descriptors: true,
            ..Self::opengl()
        }
    }

    /// Looks a preset up by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "opengl" => Some(Self::opengl()),
            "vulkan" => Some(Self::vulkan()),
            "metal" => Some(Self::metal()),
            _ => None,
        }
    }

    /// Capability defines shared by every stage
    pub fn defines(&self) -> Vec<(&'static str, u32)> {
        let mut defines = vec![("HD_SHADER_API", 1)];
        let flags = [
            ("HD_HAS_BINDLESS_TEXTURES", self.bindless_textures),
            ("HD_HAS_BINDLESS_BUFFERS", self.bindless_buffers),
            ("HD_HAS_BUILTIN_BARYCENTRICS", self.builtin_barycentrics),
            ("HD_HAS_DOUBLE_PRECISION", self.double_precision),
            ("HD_DEPTH_RANGE_ZERO_TO_ONE", self.depth_range_zero_to_one),
        ];
        defines.extend(flags.into_iter().filter(|(_, enabled)| *enabled).map(|(name, _)| (name, 1)));
        defines
    }

    /// GLSL extensions a stage needs on this device
    pub fn extensions(&self, stage: ShaderStage) -> Vec<&'static str> {
        let mut extensions = Vec::new();
        if self.bindless_textures {
            extensions.push("GL_ARB_bindless_texture");
        }
        if self.bindless_buffers {
            extensions.push("GL_NV_shader_buffer_load");
        }
        if self.shader_draw_parameters && stage.reads_raw_drawing_coord() {
            extensions.push("GL_ARB_shader_draw_parameters");
        }
        if self.builtin_barycentrics && stage == ShaderStage::Fragment {
            extensions.push("GL_NV_fragment_shader_barycentric");
        }
        extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        for name in PRESET_NAMES {
            assert!(Capabilities::preset(name).is_some(), "missing preset {name}");
        }
        assert!(Capabilities::preset("d3d12").is_none());
        assert!(Capabilities::vulkan().function_descriptors);
        assert!(!Capabilities::opengl().function_descriptors);
        assert!(Capabilities::metal().post_tessellation);
    }

    #[test]
    fn test_header_helpers() {
        let metal = Capabilities::metal();
        assert!(metal.defines().contains(&("HD_HAS_BUILTIN_BARYCENTRICS", 1)));
        assert!(!metal.defines().iter().any(|(name, _)| *name == "HD_HAS_DOUBLE_PRECISION"));
        assert_eq!(metal.extensions(ShaderStage::Fragment), vec!["GL_NV_fragment_shader_barycentric"]);
        assert_eq!(metal.extensions(ShaderStage::PostTessVertex), vec!["GL_ARB_shader_draw_parameters"]);
        assert!(Capabilities::opengl().extensions(ShaderStage::Geometry).is_empty());
    }

    #[test]
    fn test_partial_yaml_defaults_to_opengl() {
        let caps: Capabilities = serde_norway::from_str("bindless_textures: true").unwrap();
        assert!(caps.bindless_textures);
        assert_eq!(caps.glsl_version, 450);
        assert!(caps.shader_draw_parameters);
    }
}
