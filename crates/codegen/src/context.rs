//! Per-compile generation state
//!
//! Everything a compile accumulates lives in one [`GenerationContext`], created at the start of
//! the compile and dropped after submission. Generation passes run in the fixed order of
//! [`GenerationPass::ORDER`] and push stage-scoped items, layout elements and textures into it.

use crate::ir::Item;
use crate::layout::{LayoutElement, TextureElement};
use crate::packed::DataType;
use crate::shader::{ShaderStage, StageMask};
use std::collections::BTreeMap;

/// Generation passes, in execution order
///
/// Later passes may consume what earlier passes registered, never the reverse:
/// * `PackedTypes` produces the `hd_*` helpers every accessor may call.
/// * `DrawingCoord` produces `GetDrawingCoord()`, consumed by every buffer-indexed accessor, and
///   the drawing-coordinate plumbing statements consumed by `Interstage`.
/// * `PrimitiveId` produces `GetPrimitiveID()`, consumed by `ElementPrimvars` and `FaceVarying`.
/// * The primvar passes register every real primvar name; `ShaderParameters` consults that
///   registry to suppress redirects shadowed by a real primvar.
/// * `ShaderParameters` emits redirects and transforms before textures, so a texture
///   coordinate may name either.
/// * `Interstage` consumes the plumbing statements and interstage members collected by all
///   previous passes and builds the per-stage blocks and procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GenerationPass {
    PackedTypes,
    DrawingCoord,
    PrimitiveId,
    ConstantPrimvars,
    InstancePrimvars,
    ElementPrimvars,
    VertexPrimvars,
    FaceVarying,
    CustomBindings,
    ShaderParameters,
    Interstage,
}

impl GenerationPass {
    pub const ORDER: [GenerationPass; 11] = [
        GenerationPass::PackedTypes,
        GenerationPass::DrawingCoord,
        GenerationPass::PrimitiveId,
        GenerationPass::ConstantPrimvars,
        GenerationPass::InstancePrimvars,
        GenerationPass::ElementPrimvars,
        GenerationPass::VertexPrimvars,
        GenerationPass::FaceVarying,
        GenerationPass::CustomBindings,
        GenerationPass::ShaderParameters,
        GenerationPass::Interstage,
    ];
}

/// Part of a stage's source an item is rendered into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Preprocessor defines, ahead of everything else
    Define,
    /// Type declarations, ahead of the resource section
    Declaration,
    /// Accessor and procedure bodies, after the resource section
    Accessor,
}

#[derive(Debug, Clone)]
struct ScopedItem {
    pass: GenerationPass,
    section: Section,
    stages: StageMask,
    item: Item,
}

/// A value crossing a stage boundary inside the interstage primvar block
#[derive(Debug, Clone, PartialEq)]
pub struct InterstageMember {
    pub name: String,
    pub data_type: DataType,
    /// Whether the member is reinterpolated from patch control points in evaluation stages
    pub interpolated: bool,
    /// Only the geometry-to-fragment interface carries this member
    pub geometry_only: bool,
}

/// The active stages of one compile, in pipeline order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStages {
    order: Vec<ShaderStage>,
}

impl ActiveStages {
    pub fn new(mask: StageMask) -> Self {
        Self { order: mask.stages().collect() }
    }

    pub fn mask(&self) -> StageMask {
        self.order.iter().fold(StageMask::empty(), |mask, stage| mask | StageMask::from(*stage))
    }

    pub fn has(&self, stage: ShaderStage) -> bool {
        self.order.contains(&stage)
    }

    /// Active stages in pipeline order (post-tessellation stages precede the fragment stage)
    pub fn iter(&self) -> impl Iterator<Item = ShaderStage> + '_ {
        let graphics = self.order.iter().copied().filter(|s| matches!(s, ShaderStage::PostTessControl | ShaderStage::PostTessVertex));
        let rest = self.order.iter().copied().filter(|s| !matches!(s, ShaderStage::PostTessControl | ShaderStage::PostTessVertex));
        graphics.chain(rest)
    }

    /// Graphics stages (everything but compute) in pipeline order
    pub fn graphics(&self) -> Vec<ShaderStage> {
        self.iter().filter(|stage| *stage != ShaderStage::Compute).collect()
    }

    /// The graphics stage feeding `stage`, if any
    pub fn previous(&self, stage: ShaderStage) -> Option<ShaderStage> {
        let graphics = self.graphics();
        let index = graphics.iter().position(|s| *s == stage)?;
        index.checked_sub(1).map(|i| graphics[i])
    }

    /// The graphics stage `stage` feeds, if any
    pub fn next(&self, stage: ShaderStage) -> Option<ShaderStage> {
        let graphics = self.graphics();
        let index = graphics.iter().position(|s| *s == stage)?;
        graphics.get(index + 1).copied()
    }

    /// Returns true if the post-tessellation model replaces the vertex and geometry stages
    pub fn post_tessellation(&self) -> bool {
        self.has(ShaderStage::PostTessVertex)
    }

    /// Stage evaluating face-varying data: geometry when present, otherwise fragment
    pub fn face_varying_stage(&self) -> Option<ShaderStage> {
        [ShaderStage::Geometry, ShaderStage::Fragment].into_iter().find(|stage| self.has(*stage))
    }
}

/// Accumulated state of one compile
#[derive(Debug)]
pub struct GenerationContext {
    active: ActiveStages,
    pass: GenerationPass,
    items: Vec<ScopedItem>,
    elements: Vec<(StageMask, LayoutElement)>,
    textures: Vec<(StageMask, TextureElement)>,
    primvars: BTreeMap<String, (DataType, StageMask)>,
    plumbing: BTreeMap<ShaderStage, Vec<String>>,
    interstage: Vec<InterstageMember>,
}

impl GenerationContext {
    pub fn new(active: ActiveStages) -> Self {
        Self {
            active,
            pass: GenerationPass::ORDER[0],
            items: Vec::new(),
            elements: Vec::new(),
            textures: Vec::new(),
            primvars: BTreeMap::new(),
            plumbing: BTreeMap::new(),
            interstage: Vec::new(),
        }
    }

    pub fn active(&self) -> &ActiveStages {
        &self.active
    }

    /// Starts a pass; passes must be entered in [`GenerationPass::ORDER`]
    pub fn begin_pass(&mut self, pass: GenerationPass) {
        if pass < self.pass {
            tracing::error!(?pass, current = ?self.pass, "generation pass entered out of order");
        }
        tracing::trace!(?pass, "begin generation pass");
        self.pass = pass;
    }

    pub fn current_pass(&self) -> GenerationPass {
        self.pass
    }

    /// Pushes an item visible in `stages` (restricted to the active stages)
    pub fn push(&mut self, section: Section, stages: StageMask, item: impl Into<Item>) {
        let stages = stages & self.active.mask();
        if stages.is_empty() {
            return;
        }
        self.items.push(ScopedItem {
            pass: self.pass,
            section,
            stages,
            item: item.into(),
        });
    }

    pub fn push_element(&mut self, stages: StageMask, element: LayoutElement) {
        let stages = stages & self.active.mask();
        if !stages.is_empty() {
            self.elements.push((stages, element));
        }
    }

    pub fn push_elements(&mut self, stages: StageMask, elements: Vec<LayoutElement>) {
        for element in elements {
            self.push_element(stages, element);
        }
    }

    pub fn push_texture(&mut self, stages: StageMask, texture: TextureElement) {
        let stages = stages & self.active.mask();
        if !stages.is_empty() {
            self.textures.push((stages, texture));
        }
    }

    /// Records that `HdGet_<name>` exists in `stages`
    pub fn register_primvar(&mut self, name: &str, data_type: &DataType, stages: StageMask) {
        let entry = self.primvars.entry(name.to_string()).or_insert_with(|| (data_type.clone(), StageMask::empty()));
        entry.1 |= stages;
    }

    /// Type and stages of a registered primvar or parameter accessor
    pub fn primvar(&self, name: &str) -> Option<&(DataType, StageMask)> {
        self.primvars.get(name)
    }

    pub fn has_primvar(&self, name: &str) -> bool {
        self.primvars.contains_key(name)
    }

    /// Adds a statement copying plumbed values to `stage`'s outputs
    pub fn push_plumbing(&mut self, stage: ShaderStage, statement: impl Into<String>) {
        if self.active.has(stage) {
            self.plumbing.entry(stage).or_default().push(statement.into());
        }
    }

    pub fn plumbing(&self, stage: ShaderStage) -> &[String] {
        self.plumbing.get(&stage).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn push_interstage_member(&mut self, member: InterstageMember) {
        self.interstage.push(member);
    }

    pub fn interstage_members(&self) -> &[InterstageMember] {
        &self.interstage
    }

    /// Items of one section visible in `stage`, in pass order
    pub fn items(&self, stage: ShaderStage, section: Section) -> Vec<Item> {
        let mut scoped: Vec<&ScopedItem> = self.items.iter().filter(|item| item.section == section && item.stages.has(stage)).collect();
        scoped.sort_by_key(|item| item.pass);
        scoped.into_iter().map(|item| item.item.clone()).collect()
    }

    /// Layout elements visible in `stage`, in insertion order
    pub fn elements(&self, stage: ShaderStage) -> Vec<LayoutElement> {
        self.elements.iter().filter(|(stages, _)| stages.has(stage)).map(|(_, element)| element.clone()).collect()
    }

    pub fn textures(&self, stage: ShaderStage) -> Vec<TextureElement> {
        self.textures.iter().filter(|(stages, _)| stages.has(stage)).map(|(_, texture)| texture.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Function;

    fn context(mask: StageMask) -> GenerationContext {
        GenerationContext::new(ActiveStages::new(mask))
    }

    #[test]
    fn test_items_are_scoped_and_ordered_by_pass() {
        let mut ctx = context(StageMask::VERTEX | StageMask::FRAGMENT);
        ctx.begin_pass(GenerationPass::DrawingCoord);
        ctx.push(Section::Accessor, StageMask::FRAGMENT, Function::new("int", "Second").returning("0"));
        ctx.push(Section::Accessor, StageMask::GEOMETRY, Function::new("int", "Inactive").returning("0"));
        ctx.begin_pass(GenerationPass::ShaderParameters);
        ctx.push(Section::Accessor, StageMask::all(), Function::new("int", "Third").returning("0"));

        let names = |stage| {
            ctx.items(stage, Section::Accessor)
                .into_iter()
                .filter_map(|item| if let Item::Function(f) = item { Some(f.name) } else { None })
                .collect::<Vec<_>>()
        };
        assert_eq!(names(ShaderStage::Fragment), vec!["Second", "Third"]);
        assert_eq!(names(ShaderStage::Vertex), vec!["Third"]);
        assert!(names(ShaderStage::Geometry).is_empty());
    }

    #[test]
    fn test_stage_neighbors() {
        let active = ActiveStages::new(StageMask::VERTEX | StageMask::TESS_CONTROL | StageMask::TESS_EVAL | StageMask::FRAGMENT);
        assert_eq!(active.previous(ShaderStage::Vertex), None);
        assert_eq!(active.previous(ShaderStage::Fragment), Some(ShaderStage::TessEval));
        assert_eq!(active.next(ShaderStage::TessControl), Some(ShaderStage::TessEval));
        assert_eq!(active.next(ShaderStage::Fragment), None);
        assert_eq!(active.face_varying_stage(), Some(ShaderStage::Fragment));

        let post = ActiveStages::new(StageMask::POST_TESS_CONTROL | StageMask::POST_TESS_VERTEX | StageMask::FRAGMENT);
        assert_eq!(post.graphics(), vec![ShaderStage::PostTessControl, ShaderStage::PostTessVertex, ShaderStage::Fragment]);
        assert_eq!(post.previous(ShaderStage::Fragment), Some(ShaderStage::PostTessVertex));
        assert!(post.post_tessellation());
    }

    #[test]
    fn test_primvar_registry_merges_stages() {
        let mut ctx = context(StageMask::all());
        ctx.register_primvar("color", &DataType::Vec3, StageMask::VERTEX);
        ctx.register_primvar("color", &DataType::Vec3, StageMask::FRAGMENT);
        assert_eq!(ctx.primvar("color").map(|(_, stages)| *stages), Some(StageMask::VERTEX | StageMask::FRAGMENT));
        assert!(!ctx.has_primvar("st"));
    }
}
