//! Compile Orchestrator
//!
//! Decides which stages are active, runs the generation passes, numbers every resource through
//! one of the two resource pipelines and assembles the final per-stage sources. Submission goes
//! through a [`Backend`]; the first failing stage aborts the whole compile.

use crate::assemble::{Inputs, assemble_compute, assemble_draw};
use crate::binding::MetaData;
use crate::capabilities::Capabilities;
use crate::context::{ActiveStages, GenerationContext, Section};
use crate::error::CompileError;
use crate::hash::{combine, content_hash};
use crate::ir::{Item, render_items};
use crate::layout::elements_from_layout;
use crate::resource::{Builtin, DescriptorSink, FunctionDescriptor, ResourceGenerator, SlotAllocator, TextualSink};
use crate::shader::{GeometricShader, ShaderCode, ShaderStage, StageMask};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How resources are handed to the backend, fixed for a whole compile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcePipeline {
    /// Per-stage function descriptors
    Descriptor,
    /// Declarations written into the source text
    Textual,
}

/// Caller-supplied knobs of a compile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Forces a resource pipeline; ignored when the backend only consumes descriptors
    pub resource_pipeline_override: Option<ResourcePipeline>,
    /// Number of authored clip planes
    pub clip_plane_count: u32,
    /// Patch-evaluation library source inlined into programs drawing refined or spline geometry
    pub patch_evaluation_source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramHandle(pub u32);

/// One assembled stage, ready for submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledStage {
    pub stage: ShaderStage,
    /// Complete source, resource section included
    pub source: String,
    /// The resource section alone
    pub resources: String,
    /// Function descriptor when the descriptor pipeline is in use
    pub descriptor: Option<FunctionDescriptor>,
}

/// Result of a successful compile
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub handle: ProgramHandle,
    pub stages: Vec<AssembledStage>,
    pub hash: u64,
}

/// Shader compiler and linker of the target device
pub trait Backend {
    /// Compiles one stage, returning the compile log on failure
    fn compile_stage(&mut self, stage: &AssembledStage) -> Result<StageHandle, String>;
    /// Links compiled stages, returning the link log on failure
    fn link_program(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle, String>;
}

/// Backend accepting every stage and recording what it was given
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    pub stages: Vec<AssembledStage>,
    pub programs: Vec<Vec<StageHandle>>,
    /// Stage whose compilation is reported as failed
    pub fail_on: Option<ShaderStage>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend failing to compile `stage`
    pub fn failing_on(stage: ShaderStage) -> Self {
        Self {
            fail_on: Some(stage),
            ..Self::default()
        }
    }
}

impl Backend for RecordingBackend {
    fn compile_stage(&mut self, stage: &AssembledStage) -> Result<StageHandle, String> {
        if self.fail_on == Some(stage.stage) {
            return Err(format!("{}: rejected by recording backend", stage.stage));
        }
        self.stages.push(stage.clone());
        Ok(StageHandle(self.stages.len() as u32))
    }

    fn link_program(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle, String> {
        self.programs.push(stages.to_vec());
        Ok(ProgramHandle(self.programs.len() as u32))
    }
}

/// Code generator for one draw batch or compute program
///
/// State is reset by every [`generate`](Self::generate); one instance must not be shared by
/// overlapping compiles.
#[derive(Debug)]
pub struct CodeGen<'a> {
    geometric_shader: Option<&'a GeometricShader>,
    shaders: &'a [ShaderCode],
    metadata: Option<&'a MetaData>,
    capabilities: Capabilities,
    material_tag: String,
    options: CompileOptions,
    compute: bool,
    assembled: Vec<AssembledStage>,
}

impl<'a> CodeGen<'a> {
    /// Creates a draw-program generator
    ///
    /// # Arguments
    /// * `geometric_shader` - Shader object describing the drawn primitive, required by [`compile`](Self::compile)
    /// * `shaders` - Material, lighting and render-pass shader objects, in order
    /// * `metadata` - Resource-binder metadata of the batch, required by [`compile`](Self::compile)
    /// * `capabilities` - Device capability bits
    /// * `material_tag` - Material tag contributing to the cache key
    pub fn new(geometric_shader: Option<&'a GeometricShader>, shaders: &'a [ShaderCode], metadata: Option<&'a MetaData>, capabilities: Capabilities, material_tag: impl Into<String>) -> Self {
        Self {
            geometric_shader,
            shaders,
            metadata,
            capabilities,
            material_tag: material_tag.into(),
            options: CompileOptions::default(),
            compute: false,
            assembled: Vec::new(),
        }
    }

    /// Creates a compute-program generator
    pub fn new_compute(shaders: &'a [ShaderCode], metadata: Option<&'a MetaData>, capabilities: Capabilities) -> Self {
        Self {
            compute: true,
            ..Self::new(None, shaders, metadata, capabilities, "")
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Resource pipeline used for every stage of this compile
    pub fn resource_pipeline(&self) -> ResourcePipeline {
        let pipeline = if self.capabilities.function_descriptors {
            ResourcePipeline::Descriptor
        } else {
            self.options.resource_pipeline_override.unwrap_or(ResourcePipeline::Descriptor)
        };
        tracing::debug!(?pipeline, requested = ?self.options.resource_pipeline_override, "resource pipeline selected");
        pipeline
    }

    /// Cache key over the geometric shader, metadata, shader objects and material tag
    pub fn compute_hash(&self) -> u64 {
        let shaders: Vec<u64> = self.shaders.iter().map(content_hash).collect();
        combine(&[
            self.geometric_shader.map_or(0, content_hash),
            self.metadata.map_or(0, content_hash),
            combine(&shaders),
            content_hash(&self.material_tag),
        ])
    }

    fn has_source(&self, stage: ShaderStage) -> bool {
        let geometric = self.geometric_shader.is_some_and(|shader| !shader.sources.get(stage).trim().is_empty());
        geometric || self.shaders.iter().any(|shader| !shader.sources.get(stage).trim().is_empty())
    }

    /// Stages taking part in a draw program
    ///
    /// A stage is active when some shader object contributes source to it, subject to the device:
    /// post-tessellation stages need the capability and replace the vertex, tessellation and
    /// geometry stages. Control and evaluation stages only run in pairs.
    pub fn active_stages(&self) -> ActiveStages {
        let mut mask = StageMask::empty();
        for stage in ShaderStage::ALL.into_iter().filter(|stage| *stage != ShaderStage::Compute) {
            if self.has_source(stage) {
                mask |= StageMask::from(stage);
            }
        }

        let post_tessellation = StageMask::POST_TESS_CONTROL | StageMask::POST_TESS_VERTEX;
        if mask.intersects(post_tessellation) && !self.capabilities.post_tessellation {
            tracing::debug!("post-tessellation stages disabled, the device lacks the capability");
            mask -= post_tessellation;
        }
        let pairs = [
            (StageMask::TESS_CONTROL, StageMask::TESS_EVAL),
            (StageMask::POST_TESS_CONTROL, StageMask::POST_TESS_VERTEX),
        ];
        for (control, evaluation) in pairs {
            if mask.contains(control) != mask.contains(evaluation) {
                tracing::error!(control = ?control, evaluation = ?evaluation, "tessellation stages must be enabled together, disabling both");
                mask -= control | evaluation;
            }
        }
        if mask.contains(StageMask::POST_TESS_VERTEX) {
            tracing::debug!("post-tessellation model active, vertex, tessellation and geometry stages disabled");
            mask -= StageMask::VERTEX | StageMask::TESS_CONTROL | StageMask::TESS_EVAL | StageMask::GEOMETRY;
        }
        tracing::debug!(stages = ?mask, "active stages");
        ActiveStages::new(mask)
    }

    /// Assembles every stage without submitting anything
    pub fn generate(&mut self) -> Result<&[AssembledStage], CompileError> {
        if self.compute {
            self.generate_compute()?;
        } else {
            self.generate_draw()?;
        }
        Ok(&self.assembled)
    }

    fn generate_draw(&mut self) -> Result<(), CompileError> {
        self.assembled.clear();
        let geometric_shader = self.geometric_shader.ok_or(CompileError::MissingGeometricShader)?;
        let metadata = self.metadata.ok_or(CompileError::MissingMetaData)?;

        let mut ctx = GenerationContext::new(self.active_stages());
        let inputs = Inputs {
            geometric_shader,
            metadata,
            capabilities: &self.capabilities,
        };
        assemble_draw(&inputs, &mut ctx);

        let constants = BTreeMap::from([
            ("HD_NUM_PATCH_EVAL_VERTS".to_string(), geometric_shader.primitive_type.num_patch_eval_verts()),
            ("HD_NUM_PRIMITIVE_VERTS".to_string(), geometric_shader.primitive_type.num_primitive_verts_for_gs()),
            ("HD_INSTANCER_NUM_LEVELS".to_string(), metadata.instancer_num_levels),
            ("HD_NUM_CLIP_PLANES".to_string(), self.options.clip_plane_count),
        ]);
        let patch_evaluation = match &self.options.patch_evaluation_source {
            Some(source) if geometric_shader.uses_patch_evaluation() => Some(source.as_str()),
            None if geometric_shader.uses_patch_evaluation() => {
                tracing::warn!(primitive = ?geometric_shader.primitive_type, "refined geometry without a patch-evaluation source");
                None
            }
            _ => None,
        };
        self.assembled = self.assemble_stages(&ctx, metadata, constants, Some(geometric_shader), patch_evaluation);
        Ok(())
    }

    fn generate_compute(&mut self) -> Result<(), CompileError> {
        self.assembled.clear();
        let metadata = self.metadata.ok_or(CompileError::MissingMetaData)?;
        let mut ctx = GenerationContext::new(ActiveStages::new(StageMask::COMPUTE));
        assemble_compute(metadata, &self.capabilities, &mut ctx);
        self.assembled = self.assemble_stages(&ctx, metadata, BTreeMap::new(), None, None);
        Ok(())
    }

    /// Last stage before rasterization, the one owning the clip distances
    fn rasterized_stage(active: &ActiveStages) -> Option<ShaderStage> {
        match active.previous(ShaderStage::Fragment) {
            Some(stage) => Some(stage),
            None if active.has(ShaderStage::Fragment) => None,
            None => active.graphics().last().copied(),
        }
    }

    fn builtins(&self, active: &ActiveStages, stage: ShaderStage) -> Vec<Builtin> {
        let alias = |name: &str, value: &str| Builtin::Alias {
            name: name.to_string(),
            value: value.to_string(),
        };
        let mut builtins = Vec::new();
        if stage.reads_raw_drawing_coord() {
            let vulkan = self.capabilities.function_descriptors;
            builtins.push(alias("hd_VertexID", if vulkan { "gl_VertexIndex" } else { "gl_VertexID" }));
            builtins.push(alias("hd_InstanceID", if vulkan { "gl_InstanceIndex" } else { "gl_InstanceID" }));
            let draw_parameters = self.capabilities.shader_draw_parameters;
            builtins.push(alias("hd_BaseInstance", if draw_parameters { "gl_BaseInstanceARB" } else { "0" }));
            builtins.push(alias("hd_BaseVertex", if draw_parameters { "gl_BaseVertexARB" } else { "0" }));
        }
        if stage == ShaderStage::Fragment && self.capabilities.builtin_barycentrics {
            builtins.push(alias("hd_Barycentrics", "gl_BaryCoordNV"));
        }
        if self.options.clip_plane_count > 0 && Self::rasterized_stage(active) == Some(stage) {
            builtins.push(Builtin::PerVertex {
                clip_distances: self.options.clip_plane_count,
            });
        }
        builtins
    }

    /// `#version`, extensions and the orchestrator's own defines
    fn header(&self, stage: ShaderStage) -> String {
        let mut header = format!("#version {}\n", self.capabilities.glsl_version);
        for extension in self.capabilities.extensions(stage) {
            header.push_str(&format!("#extension {extension} : require\n"));
        }

        let mut defines: Vec<Item> = self.capabilities.defines().into_iter().map(|(name, value)| Item::define(name, value)).collect();
        if let Some(shader) = self.geometric_shader {
            defines.push(Item::define("HD_NUM_PATCH_EVAL_VERTS", shader.primitive_type.num_patch_eval_verts()));
            defines.push(Item::define("HD_NUM_PRIMITIVE_VERTS", shader.primitive_type.num_primitive_verts_for_gs()));
        }
        defines.push(Item::define("HD_NUM_CLIP_PLANES", self.options.clip_plane_count));
        let sample = if stage == ShaderStage::Fragment { "texture(sampler, coord)" } else { "textureLod(sampler, coord, 0.0)" };
        defines.push(Item::define("HD_TEXTURE_SAMPLE(sampler, coord)", sample));
        render_items(&defines, &mut header);
        header
    }

    fn assemble_stages(
        &self,
        ctx: &GenerationContext,
        metadata: &MetaData,
        constants: BTreeMap<String, u32>,
        geometric_shader: Option<&GeometricShader>,
        patch_evaluation: Option<&str>,
    ) -> Vec<AssembledStage> {
        let pipeline = self.resource_pipeline();
        let explicit = metadata.custom_bindings.iter().map(|binding| (binding.name.clone(), binding.binding.location)).collect();
        let mut resources = ResourceGenerator::new(SlotAllocator::new(explicit), constants);
        let active = ctx.active().clone();

        let mut assembled = Vec::new();
        for stage in active.iter() {
            let mut elements = ctx.elements(stage);
            for layout in geometric_shader.map(|shader| &shader.layout).into_iter().chain(self.shaders.iter().map(|shader| &shader.layout)) {
                elements.extend(elements_from_layout(layout.get(stage)));
            }
            let textures = ctx.textures(stage);
            let builtins = self.builtins(&active, stage);

            let (resource_text, descriptor) = match pipeline {
                ResourcePipeline::Textual => {
                    let mut sink = TextualSink::new();
                    resources.generate_stage(stage, &elements, &textures, &builtins, &mut sink);
                    (sink.into_text(), None)
                }
                ResourcePipeline::Descriptor => {
                    let mut sink = DescriptorSink::new(stage);
                    resources.generate_stage(stage, &elements, &textures, &builtins, &mut sink);
                    let descriptor = sink.into_descriptor();
                    (descriptor.render_glsl(), Some(descriptor))
                }
            };

            let mut source = self.header(stage);
            render_items(&ctx.items(stage, Section::Define), &mut source);
            render_items(&ctx.items(stage, Section::Declaration), &mut source);
            if let Some(patch_evaluation) = patch_evaluation {
                source.push_str(patch_evaluation);
                if !patch_evaluation.ends_with('\n') {
                    source.push('\n');
                }
            }
            source.push_str(&resource_text);
            render_items(&ctx.items(stage, Section::Accessor), &mut source);
            let bodies = geometric_shader.map(|shader| &shader.sources).into_iter().chain(self.shaders.iter().map(|shader| &shader.sources));
            for body in bodies {
                let body = body.get(stage);
                if !body.trim().is_empty() {
                    source.push_str(body);
                    if !body.ends_with('\n') {
                        source.push('\n');
                    }
                }
            }

            assembled.push(AssembledStage {
                stage,
                source,
                resources: resource_text,
                descriptor,
            });
        }
        assembled
    }

    fn submit(&self, backend: &mut dyn Backend) -> Result<CompiledProgram, CompileError> {
        let mut handles = Vec::new();
        for stage in &self.assembled {
            match backend.compile_stage(stage) {
                Ok(handle) => handles.push(handle),
                Err(log) => {
                    tracing::error!(stage = %stage.stage, %log, "stage failed to compile");
                    return Err(CompileError::StageCompileFailed { stage: stage.stage, log });
                }
            }
        }
        let handle = backend.link_program(&handles).map_err(CompileError::LinkFailed)?;
        Ok(CompiledProgram {
            handle,
            stages: self.assembled.clone(),
            hash: self.compute_hash(),
        })
    }

    /// Generates, compiles and links the program
    pub fn compile(&mut self, backend: &mut dyn Backend) -> Result<CompiledProgram, CompileError> {
        self.generate()?;
        self.submit(backend)
    }

    /// Generates, compiles and links a compute program from the compute sources and custom bindings
    pub fn compile_compute_program(&mut self, backend: &mut dyn Backend) -> Result<CompiledProgram, CompileError> {
        self.generate_compute()?;
        self.submit(backend)
    }

    /// Source of a stage from the last generation, for diagnostics
    pub fn generated_source(&self, stage: ShaderStage) -> Option<&str> {
        self.assembled.iter().find(|assembled| assembled.stage == stage).map(|assembled| assembled.source.as_str())
    }
}
