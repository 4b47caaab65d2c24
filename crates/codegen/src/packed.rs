//! Packed-type catalog
//!
//! Resolves, for every data-type tag that can appear in binding metadata, its packed storage
//! representation, its unpacked logical representation, the accessor/mutator pair converting
//! between the two, its flat scalar equivalent and the swizzle used to extract components.
//!
//! Three-component vectors and matrices are stored as `hd_*` aggregates of scalars so that
//! std140/std430 alignment does not round them up to four components.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Data-type tag of a primvar, parameter or declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    UVec2,
    UVec3,
    UVec4,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Double,
    DVec2,
    DVec3,
    DVec4,
    Mat2,
    Mat3,
    Mat4,
    DMat3,
    DMat4,
    /// Normalized signed 10/10/10/2 vector packed into one int
    Packed2_10_10_10,
    PackedIVec3,
    PackedVec3,
    PackedDVec3,
    PackedMat3,
    PackedDMat3,
    AtomicInt,
    AtomicUInt,
    /// Any other type name, typically a generated struct
    Named(String),
}

/// Tag spelling for every non-named variant
const TAGS: &[(&str, DataType)] = &[
    ("bool", DataType::Bool),
    ("int", DataType::Int),
    ("ivec2", DataType::IVec2),
    ("ivec3", DataType::IVec3),
    ("ivec4", DataType::IVec4),
    ("uint", DataType::UInt),
    ("uvec2", DataType::UVec2),
    ("uvec3", DataType::UVec3),
    ("uvec4", DataType::UVec4),
    ("float", DataType::Float),
    ("vec2", DataType::Vec2),
    ("vec3", DataType::Vec3),
    ("vec4", DataType::Vec4),
    ("double", DataType::Double),
    ("dvec2", DataType::DVec2),
    ("dvec3", DataType::DVec3),
    ("dvec4", DataType::DVec4),
    ("mat2", DataType::Mat2),
    ("mat3", DataType::Mat3),
    ("mat4", DataType::Mat4),
    ("dmat3", DataType::DMat3),
    ("dmat4", DataType::DMat4),
    ("packed_2_10_10_10", DataType::Packed2_10_10_10),
    ("hd_ivec3", DataType::PackedIVec3),
    ("hd_vec3", DataType::PackedVec3),
    ("hd_dvec3", DataType::PackedDVec3),
    ("hd_mat3", DataType::PackedMat3),
    ("hd_dmat3", DataType::PackedDMat3),
    ("atomic_int", DataType::AtomicInt),
    ("atomic_uint", DataType::AtomicUInt),
];

impl DataType {
    /// Returns the metadata tag of this type (`"vec3"`, `"hd_vec3"`, `"atomic_int"`, ...)
    pub fn tag(&self) -> &str {
        if let DataType::Named(name) = self {
            return name;
        }
        TAGS.iter().find(|(_, t)| t == self).map(|(tag, _)| *tag).unwrap_or_default()
    }

    /// Returns the spelling used in generated GLSL
    ///
    /// Identical to the tag except for atomics, which are declared as plain integers and
    /// only ever touched through the `atomic*` builtins.
    pub fn glsl(&self) -> &str {
        match self {
            DataType::AtomicInt => "int",
            DataType::AtomicUInt => "uint",
            _ => self.tag(),
        }
    }

    /// Returns the packed storage type
    ///
    /// # Arguments
    /// * `packed_alignment` - Whether three-component types should be stored as scalar aggregates
    pub fn packed_type(&self, packed_alignment: bool) -> DataType {
        match self {
            DataType::Packed2_10_10_10 => DataType::Int,
            DataType::IVec3 if packed_alignment => DataType::PackedIVec3,
            DataType::Vec3 if packed_alignment => DataType::PackedVec3,
            DataType::DVec3 if packed_alignment => DataType::PackedDVec3,
            DataType::Mat3 if packed_alignment => DataType::PackedMat3,
            DataType::DMat3 if packed_alignment => DataType::PackedDMat3,
            other => other.clone(),
        }
    }

    /// Returns the logical type a shader snippet sees through an accessor
    pub fn unpacked_type(&self) -> DataType {
        match self {
            DataType::Packed2_10_10_10 => DataType::Vec4,
            DataType::PackedIVec3 => DataType::IVec3,
            DataType::PackedVec3 => DataType::Vec3,
            DataType::PackedDVec3 => DataType::DVec3,
            DataType::PackedMat3 => DataType::Mat3,
            DataType::PackedDMat3 => DataType::DMat3,
            other => other.clone(),
        }
    }

    /// Returns the function converting the packed storage value into the logical type
    ///
    /// `None` when storage and logical types are identical.
    pub fn packed_accessor(&self, packed_alignment: bool) -> Option<&'static str> {
        match self.packed_type(packed_alignment) {
            DataType::Int if *self == DataType::Packed2_10_10_10 => Some("hd_vec4_2_10_10_10_get"),
            DataType::PackedIVec3 => Some("hd_ivec3_get"),
            DataType::PackedVec3 => Some("hd_vec3_get"),
            DataType::PackedDVec3 => Some("hd_dvec3_get"),
            DataType::PackedMat3 => Some("hd_mat3_get"),
            DataType::PackedDMat3 => Some("hd_dmat3_get"),
            _ => None,
        }
    }

    /// Returns the function converting a logical value into its packed storage value
    pub fn packed_mutator(&self, packed_alignment: bool) -> Option<&'static str> {
        match self.packed_type(packed_alignment) {
            DataType::Int if *self == DataType::Packed2_10_10_10 => Some("hd_vec4_2_10_10_10_set"),
            DataType::PackedIVec3 => Some("hd_ivec3_set"),
            DataType::PackedVec3 => Some("hd_vec3_set"),
            DataType::PackedDVec3 => Some("hd_dvec3_set"),
            DataType::PackedMat3 => Some("hd_mat3_set"),
            DataType::PackedDMat3 => Some("hd_dmat3_set"),
            _ => None,
        }
    }

    /// Wraps a storage expression with the packed accessor, if any
    pub fn unpack_expr(&self, packed_alignment: bool, expr: &str) -> String {
        match self.packed_accessor(packed_alignment) {
            Some(accessor) => format!("{accessor}({expr})"),
            None => expr.to_string(),
        }
    }

    /// Wraps a logical expression with the packed mutator, if any
    pub fn pack_expr(&self, packed_alignment: bool, expr: &str) -> String {
        match self.packed_mutator(packed_alignment) {
            Some(mutator) => format!("{mutator}({expr})"),
            None => expr.to_string(),
        }
    }

    /// Returns the scalar type sharing this type's component representation
    ///
    /// Used for the `HdGetScalar_*` accessors of backends that forbid swizzling scalars.
    pub fn flat_type(&self) -> DataType {
        match self.unpacked_type() {
            DataType::Int | DataType::IVec2 | DataType::IVec3 | DataType::IVec4 | DataType::AtomicInt => DataType::Int,
            DataType::UInt | DataType::UVec2 | DataType::UVec3 | DataType::UVec4 | DataType::AtomicUInt => DataType::UInt,
            DataType::Float | DataType::Vec2 | DataType::Vec3 | DataType::Vec4 | DataType::Mat2 | DataType::Mat3 | DataType::Mat4 => DataType::Float,
            DataType::Double | DataType::DVec2 | DataType::DVec3 | DataType::DVec4 | DataType::DMat3 | DataType::DMat4 => DataType::Double,
            other => other,
        }
    }

    /// Returns the number of scalar components of the logical type
    pub fn component_count(&self) -> u32 {
        match self.unpacked_type() {
            DataType::IVec2 | DataType::UVec2 | DataType::Vec2 | DataType::DVec2 => 2,
            DataType::IVec3 | DataType::UVec3 | DataType::Vec3 | DataType::DVec3 => 3,
            DataType::IVec4 | DataType::UVec4 | DataType::Vec4 | DataType::DVec4 | DataType::Mat2 => 4,
            DataType::Mat3 | DataType::DMat3 => 9,
            DataType::Mat4 | DataType::DMat4 => 16,
            _ => 1,
        }
    }

    /// Returns the swizzle that extracts this type's components from a four-component value
    pub fn swizzle(&self) -> &'static str {
        match self.component_count() {
            1 => ".x",
            2 => ".xy",
            3 => ".xyz",
            _ => "",
        }
    }

    /// Returns the swizzle that extracts the first scalar of this type, empty for scalars
    pub fn flat_swizzle(&self) -> &'static str {
        if self.component_count() == 1 { "" } else { ".x" }
    }

    /// Returns a zero-initialized expression of the logical type
    pub fn default_value(&self) -> String {
        match self.unpacked_type() {
            DataType::Bool => "false".to_string(),
            DataType::Named(name) => format!("{name}()"),
            other => format!("{}(0)", other.glsl()),
        }
    }

    /// Converts an expression of the logical type to a `vec4`
    ///
    /// Missing components are zero, a missing alpha is one. Types with more than four
    /// components have no meaningful conversion and yield `vec4(0.0)`.
    pub fn to_vec4(&self, expr: &str) -> String {
        match self.component_count() {
            1 => format!("vec4({expr})"),
            2 => format!("vec4({expr}, 0.0, 1.0)"),
            3 => format!("vec4({expr}, 1.0)"),
            4 if !self.is_matrix() => format!("vec4({expr})"),
            _ => "vec4(0.0)".to_string(),
        }
    }

    /// Converts a `vec4` expression back to the logical type
    ///
    /// # Arguments
    /// * `expr` - The four-component expression
    /// * `swizzle` - Authored channel selection (for example `"a"` or `"rgb"`), overriding the default swizzle
    pub fn from_vec4(&self, expr: &str, swizzle: Option<&str>) -> String {
        let swizzle = match swizzle {
            Some(s) if !s.is_empty() => format!(".{s}"),
            _ => self.swizzle().to_string(),
        };
        format!("{}({expr}{swizzle})", self.unpacked_type().glsl())
    }

    /// Number of interface slots one value of this type consumes
    pub fn slot_cost(&self) -> u32 {
        match self.unpacked_type() {
            DataType::DVec3 | DataType::DVec4 | DataType::Mat2 => 2,
            DataType::Mat3 => 3,
            DataType::Mat4 => 4,
            DataType::DMat3 => 6,
            DataType::DMat4 => 8,
            _ => 1,
        }
    }

    /// Returns true for types that must not be interpolated across a primitive
    pub fn is_integral(&self) -> bool {
        matches!(
            self.unpacked_type(),
            DataType::Bool
                | DataType::Int
                | DataType::IVec2
                | DataType::IVec3
                | DataType::IVec4
                | DataType::UInt
                | DataType::UVec2
                | DataType::UVec3
                | DataType::UVec4
                | DataType::AtomicInt
                | DataType::AtomicUInt
        )
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, DataType::AtomicInt | DataType::AtomicUInt)
    }

    pub fn is_double(&self) -> bool {
        self.flat_type() == DataType::Double
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self.unpacked_type(), DataType::Mat2 | DataType::Mat3 | DataType::Mat4 | DataType::DMat3 | DataType::DMat4)
    }
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Unknown tags pass through as named types
        Ok(TAGS.iter().find(|(tag, _)| *tag == s).map(|(_, t)| t.clone()).unwrap_or_else(|| DataType::Named(s.to_string())))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl Serialize for DataType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// GLSL definitions of the packed aggregates and their accessor/mutator functions
///
/// Every accessor also has an identity overload on the logical type so generated code can
/// call it regardless of how a value happened to be stored.
pub const PACKED_TYPE_DEFINITIONS: &str = r#"struct hd_ivec3 { int x, y, z; };
struct hd_vec3 { float x, y, z; };
struct hd_dvec3 { double x, y, z; };
struct hd_mat3 { float m00, m01, m02, m10, m11, m12, m20, m21, m22; };
struct hd_dmat3 { double m00, m01, m02, m10, m11, m12, m20, m21, m22; };
ivec3 hd_ivec3_get(hd_ivec3 v) { return ivec3(v.x, v.y, v.z); }
ivec3 hd_ivec3_get(ivec3 v) { return v; }
hd_ivec3 hd_ivec3_set(ivec3 v) { return hd_ivec3(v.x, v.y, v.z); }
vec3 hd_vec3_get(hd_vec3 v) { return vec3(v.x, v.y, v.z); }
vec3 hd_vec3_get(vec3 v) { return v; }
hd_vec3 hd_vec3_set(vec3 v) { return hd_vec3(v.x, v.y, v.z); }
dvec3 hd_dvec3_get(hd_dvec3 v) { return dvec3(v.x, v.y, v.z); }
dvec3 hd_dvec3_get(dvec3 v) { return v; }
hd_dvec3 hd_dvec3_set(dvec3 v) { return hd_dvec3(v.x, v.y, v.z); }
mat3 hd_mat3_get(hd_mat3 v) { return mat3(v.m00, v.m01, v.m02, v.m10, v.m11, v.m12, v.m20, v.m21, v.m22); }
mat3 hd_mat3_get(mat3 v) { return v; }
hd_mat3 hd_mat3_set(mat3 v) { return hd_mat3(v[0][0], v[0][1], v[0][2], v[1][0], v[1][1], v[1][2], v[2][0], v[2][1], v[2][2]); }
dmat3 hd_dmat3_get(hd_dmat3 v) { return dmat3(v.m00, v.m01, v.m02, v.m10, v.m11, v.m12, v.m20, v.m21, v.m22); }
dmat3 hd_dmat3_get(dmat3 v) { return v; }
hd_dmat3 hd_dmat3_set(dmat3 v) { return hd_dmat3(v[0][0], v[0][1], v[0][2], v[1][0], v[1][1], v[1][2], v[2][0], v[2][1], v[2][2]); }
vec4 hd_vec4_2_10_10_10_get(int v) {
    ivec4 unpacked = ivec4((v & 0x3ff) << 22, (v & 0xffc00) << 12, (v & 0x3ff00000) << 2, (v & 0xc0000000));
    return vec4(vec3(unpacked.xyz >> 22) / 511.0, float(unpacked.w >> 30));
}
int hd_vec4_2_10_10_10_set(vec4 v) {
    return ((int(round(v.x * 511.0)) & 0x3ff) | ((int(round(v.y * 511.0)) & 0x3ff) << 10) | ((int(round(v.z * 511.0)) & 0x3ff) << 20) | ((int(v.w) & 0x3) << 30));
}
"#;

/// Host-side mirrors of the packed aggregates
///
/// These match the GPU layout byte for byte and are what a buffer uploader writes.
pub mod host {
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    pub struct HdIVec3 {
        pub x: i32,
        pub y: i32,
        pub z: i32,
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    pub struct HdVec3 {
        pub x: f32,
        pub y: f32,
        pub z: f32,
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    pub struct HdDVec3 {
        pub x: f64,
        pub y: f64,
        pub z: f64,
    }

    /// Column-major 3x3 float matrix without column padding
    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    pub struct HdMat3 {
        pub m: [f32; 9],
    }

    /// Column-major 3x3 double matrix without column padding
    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    pub struct HdDMat3 {
        pub m: [f64; 9],
    }

    impl From<[i32; 3]> for HdIVec3 {
        fn from([x, y, z]: [i32; 3]) -> Self {
            Self { x, y, z }
        }
    }

    impl From<HdIVec3> for [i32; 3] {
        fn from(v: HdIVec3) -> Self {
            [v.x, v.y, v.z]
        }
    }

    impl From<[f32; 3]> for HdVec3 {
        fn from([x, y, z]: [f32; 3]) -> Self {
            Self { x, y, z }
        }
    }

    impl From<HdVec3> for [f32; 3] {
        fn from(v: HdVec3) -> Self {
            [v.x, v.y, v.z]
        }
    }

    impl From<[f64; 3]> for HdDVec3 {
        fn from([x, y, z]: [f64; 3]) -> Self {
            Self { x, y, z }
        }
    }

    impl From<HdDVec3> for [f64; 3] {
        fn from(v: HdDVec3) -> Self {
            [v.x, v.y, v.z]
        }
    }

    impl From<[[f32; 3]; 3]> for HdMat3 {
        fn from(columns: [[f32; 3]; 3]) -> Self {
            Self { m: bytemuck::cast(columns) }
        }
    }

    impl From<HdMat3> for [[f32; 3]; 3] {
        fn from(v: HdMat3) -> Self {
            bytemuck::cast(v.m)
        }
    }

    impl From<[[f64; 3]; 3]> for HdDMat3 {
        fn from(columns: [[f64; 3]; 3]) -> Self {
            Self { m: bytemuck::cast(columns) }
        }
    }

    impl From<HdDMat3> for [[f64; 3]; 3] {
        fn from(v: HdDMat3) -> Self {
            bytemuck::cast(v.m)
        }
    }

    /// Packs a normalized signed vector into the 10/10/10/2 layout read by `hd_vec4_2_10_10_10_get`
    pub fn pack_2_10_10_10(v: [f32; 4]) -> i32 {
        let component = |c: f32| ((c * 511.0).round() as i32 as u32) & 0x3ff;
        let bits = component(v[0]) | (component(v[1]) << 10) | (component(v[2]) << 20) | (((v[3] as i32 as u32) & 0x3) << 30);
        bits as i32
    }

    /// Inverse of [`pack_2_10_10_10`]
    pub fn unpack_2_10_10_10(packed: i32) -> [f32; 4] {
        let component = |shift: u32| ((packed << (22 - shift)) >> 22) as f32 / 511.0;
        [component(0), component(10), component(20), (packed >> 30) as f32]
    }
}
