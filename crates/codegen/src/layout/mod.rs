//! Layout elements and their sources
//!
//! Elements come from two places: bindings in the resource-binder metadata (see
//! [`translate_binding`]) and the resource-layout dictionaries shader objects declare per stage
//! (see [`LayoutEntry`]).

mod element;
mod translate;

pub use element::*;
pub use translate::{buffer_block_name, translate_binding, uniform_block_name};

use crate::packed::DataType;
use serde::{Deserialize, Deserializer, Serialize};

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Count(u64),
        Symbol(String),
    }

    Ok(Option::<Size>::deserialize(deserializer)?.map(|size| match size {
        Size::Count(count) => count.to_string(),
        Size::Symbol(symbol) => symbol,
    }))
}

fn array_size(size: &Option<String>) -> ArraySize {
    size.as_ref().map_or(ArraySize::None, |size| ArraySize::Sized(size.clone()))
}

/// Member of a block entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub qualifier: Interpolation,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub array_size: Option<String>,
}

impl MemberEntry {
    fn to_member(&self) -> Member {
        Member::new(self.name.clone(), self.data_type.clone()).with_qualifier(self.qualifier).with_array_size(array_size(&self.array_size))
    }
}

/// One entry of a shader object's resource-layout dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutEntry {
    In {
        name: String,
        #[serde(rename = "type")]
        data_type: DataType,
        #[serde(default)]
        qualifier: Interpolation,
        #[serde(default, deserialize_with = "deserialize_size")]
        array_size: Option<String>,
        /// Per-vertex array of an arrayed stage
        #[serde(default)]
        arrayed: bool,
    },
    Out {
        name: String,
        #[serde(rename = "type")]
        data_type: DataType,
        #[serde(default)]
        qualifier: Interpolation,
        #[serde(default, deserialize_with = "deserialize_size")]
        array_size: Option<String>,
        #[serde(default)]
        arrayed: bool,
    },
    InBlock {
        #[serde(rename = "type")]
        block_name: String,
        instance: String,
        members: Vec<MemberEntry>,
        #[serde(default)]
        arrayed: bool,
    },
    OutBlock {
        #[serde(rename = "type")]
        block_name: String,
        instance: String,
        members: Vec<MemberEntry>,
        #[serde(default)]
        arrayed: bool,
    },
    Uniform {
        name: String,
        #[serde(rename = "type")]
        data_type: DataType,
        #[serde(default, deserialize_with = "deserialize_size")]
        array_size: Option<String>,
    },
    UniformBlock {
        #[serde(rename = "type")]
        block_name: String,
        #[serde(default)]
        instance: Option<String>,
        members: Vec<MemberEntry>,
    },
    UniformBlockConstantParams {
        #[serde(rename = "type")]
        block_name: String,
        #[serde(default)]
        instance: Option<String>,
        members: Vec<MemberEntry>,
    },
    BufferReadOnly {
        name: String,
        #[serde(rename = "type")]
        data_type: DataType,
    },
    BufferReadWrite {
        name: String,
        #[serde(rename = "type")]
        data_type: DataType,
    },
    Qualifier {
        layout: StageQualifier,
    },
}

impl LayoutEntry {
    /// Converts the entry into the layout element it declares
    pub fn to_element(&self) -> LayoutElement {
        let interface = |arrayed: bool| if arrayed { ArraySize::Unsized } else { ArraySize::None };
        match self {
            LayoutEntry::In {
                name,
                data_type,
                qualifier,
                array_size: size,
                arrayed,
            } => LayoutElement::value(InOut::StageIn, name.clone(), data_type.clone())
                .with_qualifier(*qualifier)
                .with_array_size(array_size(size))
                .with_interface_array(interface(*arrayed)),
            LayoutEntry::Out {
                name,
                data_type,
                qualifier,
                array_size: size,
                arrayed,
            } => LayoutElement::value(InOut::StageOut, name.clone(), data_type.clone())
                .with_qualifier(*qualifier)
                .with_array_size(array_size(size))
                .with_interface_array(interface(*arrayed)),
            LayoutEntry::InBlock { block_name, instance, members, arrayed } => {
                LayoutElement::block(InOut::StageIn, block_name.clone(), instance.clone(), members.iter().map(MemberEntry::to_member).collect()).with_interface_array(interface(*arrayed))
            }
            LayoutEntry::OutBlock { block_name, instance, members, arrayed } => {
                LayoutElement::block(InOut::StageOut, block_name.clone(), instance.clone(), members.iter().map(MemberEntry::to_member).collect()).with_interface_array(interface(*arrayed))
            }
            LayoutEntry::Uniform { name, data_type, array_size: size } => LayoutElement::uniform_value(name.clone(), data_type.clone()).with_array_size(array_size(size)),
            LayoutEntry::UniformBlock { block_name, instance, members } => {
                let element = LayoutElement::resource_block(ElementKind::UniformBlock, block_name.clone(), members.iter().map(MemberEntry::to_member).collect());
                match instance {
                    Some(instance) => element.with_instance(instance.clone()),
                    None => element,
                }
            }
            LayoutEntry::UniformBlockConstantParams { block_name, instance, members } => {
                let element = LayoutElement::resource_block(ElementKind::UniformBlockConstantParams, block_name.clone(), members.iter().map(MemberEntry::to_member).collect());
                match instance {
                    Some(instance) => element.with_instance(instance.clone()),
                    None => element,
                }
            }
            LayoutEntry::BufferReadOnly { name, data_type } => {
                LayoutElement::resource_block(ElementKind::BufferReadOnly, buffer_block_name(name), vec![Member::new(name.clone(), data_type.clone()).with_array_size(ArraySize::Unsized)])
            }
            LayoutEntry::BufferReadWrite { name, data_type } => {
                LayoutElement::resource_block(ElementKind::BufferReadWrite, buffer_block_name(name), vec![Member::new(name.clone(), data_type.clone()).with_array_size(ArraySize::Unsized)])
            }
            LayoutEntry::Qualifier { layout } => LayoutElement::qualifier(layout.clone()),
        }
    }
}

/// Converts a stage's layout dictionary into layout elements, in declaration order
pub fn elements_from_layout(entries: &[LayoutEntry]) -> Vec<LayoutElement> {
    entries.iter().map(LayoutEntry::to_element).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_dictionary_parsing() {
        let yaml = r#"
- kind: in
  name: Peye
  type: vec4
- kind: out
  name: colorOut
  type: vec4
- kind: in_block
  type: VertexData
  instance: inData
  arrayed: true
  members:
    - { name: normal, type: vec3 }
    - { name: id, type: int, qualifier: flat }
- kind: uniform
  name: weights
  type: float
  array_size: 4
- kind: buffer_read_write
  name: counters
  type: atomic_uint
- kind: qualifier
  layout: { type: tess_output_vertices, count: 16 }
"#;
        let entries: Vec<LayoutEntry> = serde_norway::from_str(yaml).unwrap();
        let elements = elements_from_layout(&entries);
        assert_eq!(elements.len(), 6);

        assert_eq!(elements[0].kind, ElementKind::Value);
        assert_eq!(elements[0].in_out, InOut::StageIn);
        assert_eq!(elements[1].in_out, InOut::StageOut);

        assert_eq!(elements[2].kind, ElementKind::Block);
        assert_eq!(elements[2].name, "VertexData");
        assert_eq!(elements[2].block_instance.as_deref(), Some("inData"));
        assert_eq!(elements[2].interface_array, ArraySize::Unsized);
        assert_eq!(elements[2].members[1].qualifier, Interpolation::Flat);

        assert_eq!(elements[3].kind, ElementKind::UniformValue);
        assert_eq!(elements[3].array_size, ArraySize::sized(4));

        assert_eq!(elements[4].kind, ElementKind::BufferReadWrite);
        assert_eq!(elements[4].name, "buffer_counters");

        assert_eq!(elements[5].kind, ElementKind::Qualifier);
        assert_eq!(elements[5].stage_qualifier, Some(StageQualifier::TessOutputVertices { count: 16 }));
    }
}
