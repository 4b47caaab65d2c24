//! Metadata to layout translation
//!
//! Turns one binding from the resource-binder metadata into the layout elements that declare it.
//! Dispatch is on the storage kind alone; the data type only decides packing.

use super::element::{ArraySize, ElementKind, InOut, LayoutElement, Member};
use crate::binding::{Binding, BindingKind};
use crate::packed::DataType;

/// Name of the buffer block wrapping a storage-buffer binding
pub fn buffer_block_name(name: &str) -> String {
    format!("buffer_{name}")
}

/// Name of the uniform block wrapping a uniform-block binding
pub fn uniform_block_name(name: &str) -> String {
    format!("ubo_{name}")
}

/// Emits the layout elements realizing a binding
///
/// Bindings that cannot be declared are skipped with a diagnostic so the rest of the program
/// still generates: arrays on storage kinds that do not allow them are a verification failure,
/// plain texture kinds are a coding error (textures are declared as texture elements).
///
/// # Arguments
/// * `binding` - Storage kind and location
/// * `name` - Symbolic name of the declared value
/// * `data_type` - Logical data type
/// * `writable` - Whether a storage buffer is declared read-write
/// * `array_size` - Element count, zero when not an array
///
/// # Returns
/// Zero or more layout elements, in declaration order
pub fn translate_binding(binding: &Binding, name: &str, data_type: &DataType, writable: bool, array_size: u32) -> Vec<LayoutElement> {
    if name.is_empty() {
        tracing::warn!(kind = ?binding.kind, "skipping binding with an empty name");
        return Vec::new();
    }
    if array_size > 0 && !binding.kind.allows_array() {
        tracing::warn!(resource = name, kind = ?binding.kind, array_size, "array declaration not allowed for this binding kind, skipping");
        return Vec::new();
    }

    let array = ArraySize::from_count(array_size);
    let location = binding.location;

    match binding.kind {
        BindingKind::VertexAttr | BindingKind::DrawIndex | BindingKind::DrawIndexInstance => {
            vec![LayoutElement::value(InOut::StageIn, name, data_type.clone()).with_location(location)]
        }
        BindingKind::DrawIndexInstanceArray => (0..array_size)
            .map(|i| LayoutElement::value(InOut::StageIn, format!("{name}_{i}"), data_type.clone()).with_location(location + i))
            .collect(),
        BindingKind::Uniform | BindingKind::UniformArray => {
            vec![LayoutElement::uniform_value(name, data_type.packed_type(true)).with_location(location).with_array_size(array)]
        }
        BindingKind::Ubo => {
            let member = Member::new(name, data_type.packed_type(true)).with_array_size(array);
            vec![LayoutElement::resource_block(ElementKind::UniformBlock, uniform_block_name(name), vec![member]).with_location(location)]
        }
        BindingKind::Ssbo => {
            let kind = if writable { ElementKind::BufferReadWrite } else { ElementKind::BufferReadOnly };
            let member = Member::new(name, data_type.packed_type(false)).with_array_size(ArraySize::Unsized);
            vec![LayoutElement::resource_block(kind, buffer_block_name(name), vec![member]).with_location(location)]
        }
        kind if kind.is_bindless() => {
            // The handle itself is an ordinary uniform
            vec![LayoutElement::uniform_value(name, DataType::UVec2).with_location(location).with_array_size(array)]
        }
        kind => {
            tracing::error!(resource = name, ?kind, "unexpected binding kind for a declaration, textures are declared as texture elements");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_attribute() {
        let elements = translate_binding(&Binding::new(BindingKind::VertexAttr, 2), "points", &DataType::Vec3, false, 0);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Value);
        assert_eq!(elements[0].in_out, InOut::StageIn);
        assert_eq!(elements[0].location, Some(2));
        assert_eq!(elements[0].data_type, DataType::Vec3);
    }

    #[test]
    fn test_instance_array_expands_per_slot() {
        let elements = translate_binding(&Binding::new(BindingKind::DrawIndexInstanceArray, 10), "drawingCoordI", &DataType::Int, false, 3);
        let names: Vec<_> = elements.iter().map(|e| e.name.as_str()).collect();
        let locations: Vec<_> = elements.iter().map(|e| e.location).collect();
        assert_eq!(names, vec!["drawingCoordI_0", "drawingCoordI_1", "drawingCoordI_2"]);
        assert_eq!(locations, vec![Some(10), Some(11), Some(12)]);
    }

    #[test]
    fn test_uniform_is_packed() {
        let elements = translate_binding(&Binding::new(BindingKind::UniformArray, 4), "clipPlanes", &DataType::Vec3, false, 2);
        assert_eq!(elements[0].kind, ElementKind::UniformValue);
        assert_eq!(elements[0].data_type, DataType::PackedVec3);
        assert_eq!(elements[0].array_size, ArraySize::sized(2));
    }

    #[test]
    fn test_storage_buffers() {
        let read_only = translate_binding(&Binding::new(BindingKind::Ssbo, 1), "normals", &DataType::Packed2_10_10_10, false, 0);
        assert_eq!(read_only[0].kind, ElementKind::BufferReadOnly);
        assert_eq!(read_only[0].name, "buffer_normals");
        assert_eq!(read_only[0].members.len(), 1);
        assert_eq!(read_only[0].members[0].data_type, DataType::Int);
        assert_eq!(read_only[0].members[0].array_size, ArraySize::Unsized);

        let read_write = translate_binding(&Binding::new(BindingKind::Ssbo, 1), "counter", &DataType::AtomicInt, true, 0);
        assert_eq!(read_write[0].kind, ElementKind::BufferReadWrite);
    }

    #[test]
    fn test_uniform_block_has_one_member() {
        let elements = translate_binding(&Binding::new(BindingKind::Ubo, 0), "lighting", &DataType::Vec4, false, 8);
        assert_eq!(elements[0].kind, ElementKind::UniformBlock);
        assert_eq!(elements[0].name, "ubo_lighting");
        assert_eq!(elements[0].members[0].array_size, ArraySize::sized(8));
    }

    #[test]
    fn test_bindless_is_uniform_handle() {
        let elements = translate_binding(&Binding::new(BindingKind::BindlessSsboRange, 6), "points", &DataType::Vec3, false, 0);
        assert_eq!(elements[0].kind, ElementKind::UniformValue);
        assert_eq!(elements[0].data_type, DataType::UVec2);
    }

    #[test]
    fn test_illegal_array_is_skipped() {
        assert!(translate_binding(&Binding::new(BindingKind::VertexAttr, 0), "points", &DataType::Vec3, false, 4).is_empty());
        assert!(translate_binding(&Binding::new(BindingKind::Uniform, 0), "color", &DataType::Vec4, false, 2).is_empty());
        // The same bindings without an array size are fine
        assert_eq!(translate_binding(&Binding::new(BindingKind::Uniform, 0), "color", &DataType::Vec4, false, 0).len(), 1);
    }

    #[test]
    fn test_plain_texture_and_empty_name_are_skipped() {
        assert!(translate_binding(&Binding::new(BindingKind::Texture2d, 0), "diffuse", &DataType::Vec4, false, 0).is_empty());
        assert!(translate_binding(&Binding::new(BindingKind::Ssbo, 0), "", &DataType::Vec4, false, 0).is_empty());
    }
}
