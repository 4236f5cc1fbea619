//! The per-preset frame pipeline.
//!
//! One [`FramePipeline`] owns everything a loaded preset renders with: its
//! state, compiled programs, both meshes and the ping-ponged offscreen
//! buffers. Every frame issues the same pass sequence; only the motion
//! vector pass is skipped on the first frame after (re)initialisation.

use serde::Serialize;

use super::backend::{Pass, ProgramId, RenderBackend, ShaderUniforms, TextureId};
use super::blur::BlurTextures;
use super::framebuffer::FramebufferPair;
use super::warp::{warped_uvs, WarpFrame};
use crate::audio::FrameAudioData;
use crate::config::{CompatConfig, EngineConfig};
use crate::expr::{FrameVar, PerFrameEvaluator, PerPixelEvaluator, WarpParams};
use crate::mesh::MeshCache;
use crate::overlay::{Border, CustomShape, CustomWave, DarkenCenter, MotionVectors, Waveform};
use crate::preset::PresetDescription;
use crate::shader::{compile_with_fallback, ShaderOutcome, ShaderSlot, ShaderSource};
use crate::state::{PresetState, RenderContext, TextureEntry, TextureHandle, TextureRegistry};
use crate::{LoadError, Result};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const RAND_SEED: u64 = 0x5eed_0f0f;

/// Coarse stages of one rendered frame, in the order they ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStage {
    Evaluate,
    MotionVectors,
    Warp,
    Overlays,
    Composite,
    Present,
}

/// What the last call to [`FramePipeline::render_frame`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameTrace {
    pub frame: u64,
    pub stages: Vec<FrameStage>,
    pub overlay_vertices: usize,
    pub substituted_shaders: usize,
}

impl FrameTrace {
    fn begin(&mut self, frame: u64) {
        self.frame = frame;
        self.stages.clear();
        self.overlay_vertices = 0;
    }
}

#[derive(Debug, Clone)]
struct ShaderSources {
    warp: ShaderSource,
    composite: ShaderSource,
    shapes: Vec<ShaderSource>,
    waves: Vec<ShaderSource>,
}

impl ShaderSources {
    fn from_description(description: &PresetDescription) -> Self {
        Self {
            warp: description.warp_shader.clone(),
            composite: description.composite_shader.clone(),
            shapes: description.shapes().iter().map(|s| s.shader.clone()).collect(),
            waves: description.waves().iter().map(|w| w.shader.clone()).collect(),
        }
    }

    fn composite_for(&self, compat: &CompatConfig) -> ShaderSource {
        if compat.composite_follows_warp_source
            && self.composite.is_declared()
            && self.warp.code.trim().is_empty()
        {
            ShaderSource::new(self.composite.version, "")
        } else {
            self.composite.clone()
        }
    }
}

/// Programs chosen for every slot of a preset. Fixed once compiled.
#[derive(Debug, Clone)]
pub struct ShaderSelection {
    pub warp: ShaderOutcome,
    pub composite: ShaderOutcome,
    pub shapes: Vec<ShaderOutcome>,
    pub waves: Vec<ShaderOutcome>,
}

impl ShaderSelection {
    /// Compiles every slot. If any slot fails, the programs already
    /// compiled for earlier slots are deleted before the error is returned.
    fn compile<B: RenderBackend + ?Sized>(
        backend: &mut B,
        sources: &ShaderSources,
        compat: &CompatConfig,
        context: &RenderContext,
    ) -> std::result::Result<Self, LoadError> {
        let mut selection = Self {
            warp: ShaderOutcome::Passthrough,
            composite: ShaderOutcome::Passthrough,
            shapes: Vec::with_capacity(sources.shapes.len()),
            waves: Vec::with_capacity(sources.waves.len()),
        };
        match selection.fill(backend, sources, compat, context) {
            Ok(()) => Ok(selection),
            Err(err) => {
                selection.release(backend);
                Err(err)
            }
        }
    }

    fn fill<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        sources: &ShaderSources,
        compat: &CompatConfig,
        context: &RenderContext,
    ) -> std::result::Result<(), LoadError> {
        self.warp = compile_with_fallback(backend, ShaderSlot::Warp, &sources.warp, context)?;
        self.composite = compile_with_fallback(
            backend,
            ShaderSlot::Composite,
            &sources.composite_for(compat),
            context,
        )?;
        for (i, source) in sources.shapes.iter().enumerate() {
            self.shapes
                .push(compile_with_fallback(backend, ShaderSlot::Shape(i), source, context)?);
        }
        for (i, source) in sources.waves.iter().enumerate() {
            self.waves
                .push(compile_with_fallback(backend, ShaderSlot::Wave(i), source, context)?);
        }
        Ok(())
    }

    fn release<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        for id in self.program_ids() {
            backend.delete_program(id);
        }
    }

    fn outcomes(&self) -> impl Iterator<Item = &ShaderOutcome> {
        [&self.warp, &self.composite]
            .into_iter()
            .chain(&self.shapes)
            .chain(&self.waves)
    }

    fn rebind(&mut self, context: &RenderContext) {
        let outcomes = [&mut self.warp, &mut self.composite]
            .into_iter()
            .chain(&mut self.shapes)
            .chain(&mut self.waves);
        for program in outcomes.filter_map(ShaderOutcome::program_mut) {
            program.rebind(context);
        }
    }

    /// Highest blur level any selected program samples.
    pub fn blur_level(&self) -> u8 {
        self.outcomes()
            .filter_map(ShaderOutcome::program)
            .map(|program| program.blur_level())
            .max()
            .unwrap_or(0)
    }

    pub fn substitutions(&self) -> usize {
        self.outcomes().filter(|o| o.is_substituted()).count()
    }

    pub fn program_ids(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.outcomes().filter_map(ShaderOutcome::program_id)
    }

    fn shape_program(&self, index: usize) -> Option<ProgramId> {
        self.shapes.get(index).and_then(ShaderOutcome::program_id)
    }

    fn wave_program(&self, index: usize) -> Option<ProgramId> {
        self.waves.get(index).and_then(ShaderOutcome::program_id)
    }
}

/// A loaded preset bound to a backend.
#[derive(Debug)]
pub struct FramePipeline<B: RenderBackend> {
    backend: B,
    config: EngineConfig,
    name: String,
    state: PresetState,
    per_frame: PerFrameEvaluator,
    per_pixel: PerPixelEvaluator,
    shapes: Vec<CustomShape>,
    waves: Vec<CustomWave>,
    sources: ShaderSources,
    shaders: Option<ShaderSelection>,
    framebuffers: FramebufferPair,
    buffer_handles: [TextureHandle; 2],
    blur: BlurTextures,
    warp_mesh: MeshCache,
    composite_mesh: MeshCache,
    warp_params: Vec<WarpParams>,
    warp_uvs: Vec<[f32; 2]>,
    uniforms: ShaderUniforms,
    motion: MotionVectors,
    waveform: Waveform,
    darken: DarkenCenter,
    border: Border,
    rng: fastrand::Rng,
    first_frame: bool,
    frame_count: u64,
    output: Option<TextureHandle>,
    trace: FrameTrace,
    released: bool,
}

/// Entry point name used by embedders.
pub type Preset<B> = FramePipeline<B>;

impl<B: RenderBackend> FramePipeline<B> {
    /// Compiles every program of `description` and allocates the offscreen
    /// buffers at 1x1. Shaders are compiled by the first
    /// [`initialize`](Self::initialize), once the texture catalog is known.
    pub fn load(mut backend: B, description: &PresetDescription, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let warp_mesh = MeshCache::new(config.mesh.warp_width, config.mesh.warp_height)?;
        let composite_mesh =
            MeshCache::new(config.mesh.composite_width, config.mesh.composite_height)?;
        let mesh_size = warp_mesh.size();

        let mut state = PresetState::new();
        let per_frame = PerFrameEvaluator::load(description, &mut state, mesh_size)?;
        let per_pixel = PerPixelEvaluator::load(&description.per_pixel_code)?;
        let shapes = description
            .shapes()
            .iter()
            .enumerate()
            .map(|(i, shape)| CustomShape::load(i, shape, &mut state, mesh_size))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let waves = description
            .waves()
            .iter()
            .enumerate()
            .map(|(i, wave)| CustomWave::load(i, wave, &mut state, mesh_size))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let framebuffers = FramebufferPair::create(&mut backend, &config.attachments, 1, 1)
            .map_err(LoadError::from)?;
        let buffer_handles = register_colors(&mut state.textures, &framebuffers);

        let mut rng = fastrand::Rng::with_seed(RAND_SEED);
        let uniforms = ShaderUniforms {
            rand_preset: [rng.f32(), rng.f32(), rng.f32(), rng.f32()],
            ..Default::default()
        };

        tracing::info!(
            preset = %description.name,
            backend = backend.name(),
            shapes = shapes.len(),
            waves = waves.len(),
            "loaded preset"
        );

        Ok(Self {
            backend,
            name: description.name.clone(),
            sources: ShaderSources::from_description(description),
            config,
            state,
            per_frame,
            per_pixel,
            shapes,
            waves,
            shaders: None,
            framebuffers,
            buffer_handles,
            blur: BlurTextures::new(),
            warp_mesh,
            composite_mesh,
            warp_params: Vec::new(),
            warp_uvs: Vec::new(),
            uniforms,
            motion: MotionVectors::new(),
            waveform: Waveform::new(),
            darken: DarkenCenter::new(),
            border: Border::new(),
            rng,
            first_frame: true,
            frame_count: 0,
            output: None,
            trace: FrameTrace::default(),
            released: false,
        })
    }

    /// Sizes the buffers for `context`. The first call selects and compiles
    /// every shader; a later call with new dimensions resizes the
    /// attachments and re-resolves the selected programs' samplers. Calls
    /// with unchanged dimensions do nothing.
    pub fn initialize(&mut self, context: &RenderContext) -> Result<()> {
        let (width, height) = context.size();
        let resized = self
            .framebuffers
            .set_size(&mut self.backend, width, height)?;
        if !resized && self.shaders.is_some() {
            return Ok(());
        }

        self.state.context.clone_from(context);
        if resized {
            self.warp_mesh.invalidate();
            self.composite_mesh.invalidate();
            for handle in self.buffer_handles {
                self.state.textures.remove(handle);
            }
            self.buffer_handles = register_colors(&mut self.state.textures, &self.framebuffers);
            tracing::info!(preset = %self.name, width, height, "resized framebuffers");
        }

        let shaders = match self.shaders.take() {
            Some(mut shaders) => {
                shaders.rebind(context);
                shaders
            }
            None => ShaderSelection::compile(
                &mut self.backend,
                &self.sources,
                &self.config.compat,
                context,
            )?,
        };
        self.trace.substituted_shaders = shaders.substitutions();
        let blur_level = shaders.blur_level();
        self.shaders = Some(shaders);

        let (width, height) = self.framebuffers.size();
        self.blur
            .ensure(&mut self.backend, blur_level, width, height)?;

        self.first_frame = true;
        self.output = Some(self.buffer_handles[1 - self.framebuffers.current_index()]);
        tracing::debug!(preset = %self.name, blur_level = self.blur.level(), "initialized");
        Ok(())
    }

    /// Renders one frame. Initialises first if the viewport changed or
    /// [`initialize`](Self::initialize) was never called.
    pub fn render_frame(&mut self, audio: &FrameAudioData, context: &RenderContext) -> Result<()> {
        self.state.snapshot(audio, context);
        let (width, height) = context.size();
        if self.shaders.is_none() || (width.max(1), height.max(1)) != self.framebuffers.size() {
            self.initialize(context)?;
        }

        self.trace.begin(self.frame_count);
        self.backend.submit(Pass::BeginFrame {
            frame: self.frame_count,
        })?;

        let mesh_size = self.warp_mesh.size();
        self.per_frame.evaluate(&mut self.state, mesh_size);
        self.trace.stages.push(FrameStage::Evaluate);

        let previous = self.framebuffers.previous();
        let current = self.framebuffers.current();

        if !self.first_frame {
            let batches = self.motion.build(&self.per_frame);
            self.trace.overlay_vertices += batches.iter().map(|b| b.vertices.len()).sum::<usize>();
            self.backend.submit(Pass::MotionVectors {
                target: previous.motion,
                length: MotionVectors::length(&self.per_frame),
                batches,
            })?;
            self.trace.stages.push(FrameStage::MotionVectors);
        }

        self.backend.submit(Pass::BindTargets {
            read: previous,
            draw: current,
        })?;
        self.backend.submit(Pass::MaskMotion(true))?;
        self.backend.submit(Pass::Clear { color: CLEAR_COLOR })?;

        let previous_index = 1 - self.framebuffers.current_index();
        self.state.main_texture = Some(self.buffer_handles[previous_index]);
        fill_uniforms(
            &mut self.uniforms,
            &self.state,
            &self.per_frame,
            self.framebuffers.size(),
            &mut self.rng,
        );

        let (aspect_x, aspect_y) = (context.aspect_x, context.aspect_y);
        let mesh = self.warp_mesh.get(aspect_x, aspect_y);
        self.per_pixel
            .evaluate(&mut self.state, &self.per_frame, mesh, &mut self.warp_params);
        let warp_frame = WarpFrame {
            time: audio.time,
            warp_anim_speed: self.per_frame.value(FrameVar::WarpAnimSpeed),
            warp_scale: self.per_frame.value(FrameVar::WarpScale),
            aspect_x,
            aspect_y,
            inv_aspect_x: context.inv_aspect_x,
            inv_aspect_y: context.inv_aspect_y,
        };
        warped_uvs(&warp_frame, mesh, &self.warp_params, &mut self.warp_uvs);
        let shaders = self.shaders.as_ref();
        self.backend.submit(Pass::Warp {
            source: previous.color,
            program: shaders.and_then(|s| s.warp.program_id()),
            mesh,
            uvs: &self.warp_uvs,
            uniforms: &self.uniforms,
        })?;
        self.trace.stages.push(FrameStage::Warp);

        self.backend.submit(Pass::MaskMotion(false))?;
        self.backend.submit(Pass::UpdateBlur {
            source: current.color,
            targets: self.blur.targets(),
            ranges: self.uniforms.blur_ranges,
            edge_darken: self.per_frame.value(FrameVar::Blur1EdgeDarken),
        })?;

        let main_texture = self
            .state
            .main_texture
            .and_then(|handle| self.state.textures.resolve(handle))
            .map(|entry| entry.id);
        for shape in self.shapes.iter_mut().filter(|s| s.is_enabled()) {
            let program = shaders.and_then(|s| s.shape_program(shape.index()));
            let batches = shape.draw(&mut self.state, mesh_size, main_texture);
            self.trace.overlay_vertices += batches.iter().map(|b| b.vertices.len()).sum::<usize>();
            self.backend.submit(Pass::Shape { program, batches })?;
        }
        for wave in self.waves.iter_mut().filter(|w| w.is_enabled()) {
            let program = shaders.and_then(|s| s.wave_program(wave.index()));
            let batches = wave.draw(&mut self.state, mesh_size);
            self.trace.overlay_vertices += batches.iter().map(|b| b.vertices.len()).sum::<usize>();
            self.backend.submit(Pass::CustomWave { program, batches })?;
        }

        let batches = self
            .waveform
            .build(&self.per_frame, &self.state.audio, aspect_y);
        self.trace.overlay_vertices += batches.iter().map(|b| b.vertices.len()).sum::<usize>();
        self.backend.submit(Pass::Waveform { batches })?;

        if self.per_frame.get(FrameVar::DarkenCenter) > 0.0 {
            let batches = self.darken.build(aspect_y);
            self.backend.submit(Pass::Darken { batches })?;
        }

        let batches = self.border.build(&self.per_frame);
        self.trace.overlay_vertices += batches.iter().map(|b| b.vertices.len()).sum::<usize>();
        self.backend.submit(Pass::Border { batches })?;
        self.trace.stages.push(FrameStage::Overlays);

        self.backend.submit(Pass::BindTargets {
            read: current,
            draw: previous,
        })?;

        let composite_mesh = self.composite_mesh.get(aspect_x, aspect_y);
        self.backend.submit(Pass::Composite {
            source: current.color,
            target: previous.color,
            program: shaders.and_then(|s| s.composite.program_id()),
            mesh: composite_mesh,
            uniforms: &self.uniforms,
        })?;
        self.trace.stages.push(FrameStage::Composite);
        self.output = Some(self.buffer_handles[previous_index]);

        let (width, height) = self.framebuffers.size();
        self.backend.submit(Pass::Present {
            source: previous.color,
            width,
            height,
        })?;
        self.trace.stages.push(FrameStage::Present);

        self.framebuffers.swap();
        self.first_frame = false;
        self.frame_count += 1;
        Ok(())
    }

    /// Color texture holding the last composited frame. Resolves to nothing
    /// once the viewport changes.
    pub fn output_texture(&self) -> Option<TextureHandle> {
        self.output
    }

    /// Backend name of [`output_texture`](Self::output_texture), for pixel
    /// readback.
    pub fn output_texture_name(&self) -> Option<u32> {
        self.output
            .and_then(|handle| self.state.textures.resolve(handle))
            .map(|entry| entry.id.0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_first_frame(&self) -> bool {
        self.first_frame
    }

    pub fn state(&self) -> &PresetState {
        &self.state
    }

    pub fn per_frame(&self) -> &PerFrameEvaluator {
        &self.per_frame
    }

    /// Selected programs, once initialised.
    pub fn shaders(&self) -> Option<&ShaderSelection> {
        self.shaders.as_ref()
    }

    pub fn last_trace(&self) -> &FrameTrace {
        &self.trace
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Deletes every program and texture the preset allocated. Also runs
    /// on drop; calling it twice is harmless.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(shaders) = self.shaders.take() {
            shaders.release(&mut self.backend);
        }
        self.framebuffers.release(&mut self.backend);
        self.blur.release(&mut self.backend);
        self.state.textures.drain();
        self.state.main_texture = None;
        self.output = None;
        self.released = true;
        tracing::debug!(preset = %self.name, "released gpu resources");
    }
}

impl<B: RenderBackend> Drop for FramePipeline<B> {
    fn drop(&mut self) {
        self.release();
    }
}

fn register_colors(registry: &mut TextureRegistry, pair: &FramebufferPair) -> [TextureHandle; 2] {
    let (width, height) = pair.size();
    let [first, second]: [TextureId; 2] = pair.colors();
    [(0, first), (1, second)].map(|(index, id)| {
        registry.insert(TextureEntry {
            name: format!("frame{index}"),
            id,
            width,
            height,
        })
    })
}

fn fill_uniforms(
    uniforms: &mut ShaderUniforms,
    state: &PresetState,
    frame: &PerFrameEvaluator,
    size: (u32, u32),
    rng: &mut fastrand::Rng,
) {
    let audio = &state.audio;
    let context = &state.context;
    let (width, height) = (size.0 as f32, size.1 as f32);

    uniforms.time = audio.time;
    uniforms.fps = audio.fps;
    uniforms.frame = audio.frame as f32;
    uniforms.progress = audio.progress;
    uniforms.bass = audio.bass;
    uniforms.mid = audio.mid;
    uniforms.treb = audio.treb;
    uniforms.bass_att = audio.bass_att;
    uniforms.mid_att = audio.mid_att;
    uniforms.treb_att = audio.treb_att;
    uniforms.vol = audio.vol;
    uniforms.aspect = [
        context.aspect_x,
        context.aspect_y,
        context.inv_aspect_x,
        context.inv_aspect_y,
    ];
    uniforms.texsize = [width, height, 1.0 / width, 1.0 / height];
    for (uniform, q) in uniforms.q.iter_mut().zip(state.q) {
        *uniform = q as f32;
    }

    uniforms.decay = frame.value(FrameVar::Decay);
    uniforms.gamma = frame.value(FrameVar::Gamma);
    uniforms.echo_zoom = frame.value(FrameVar::EchoZoom);
    uniforms.echo_alpha = frame.value(FrameVar::EchoAlpha);
    uniforms.echo_orient = frame.value(FrameVar::EchoOrient);
    uniforms.darken = frame.get(FrameVar::Darken) > 0.0;
    uniforms.brighten = frame.get(FrameVar::Brighten) > 0.0;
    uniforms.invert = frame.get(FrameVar::Invert) > 0.0;
    uniforms.solarize = frame.get(FrameVar::Solarize) > 0.0;
    uniforms.blur_ranges = [
        [frame.value(FrameVar::Blur1Min), frame.value(FrameVar::Blur1Max)],
        [frame.value(FrameVar::Blur2Min), frame.value(FrameVar::Blur2Max)],
        [frame.value(FrameVar::Blur3Min), frame.value(FrameVar::Blur3Max)],
    ];
    uniforms.rand_frame = [rng.f32(), rng.f32(), rng.f32(), rng.f32()];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PassKind, RecordingBackend};

    fn pipeline(description: PresetDescription) -> FramePipeline<RecordingBackend> {
        FramePipeline::load(RecordingBackend::new(), &description, EngineConfig::default()).unwrap()
    }

    #[test]
    fn first_frame_skips_motion_vectors() {
        let mut preset = pipeline(PresetDescription::default());
        let context = RenderContext::new(64, 48);
        preset.initialize(&context).unwrap();
        let audio = FrameAudioData::default();

        preset.render_frame(&audio, &context).unwrap();
        let first = preset.backend_mut().take_trace();
        assert!(!first.contains(&PassKind::MotionVectors));
        assert!(!preset.last_trace().stages.contains(&FrameStage::MotionVectors));

        preset.render_frame(&audio, &context).unwrap();
        let second = preset.backend_mut().take_trace();
        assert_eq!(second[1], PassKind::MotionVectors);
        assert_eq!(preset.frame_count(), 2);
    }

    #[test]
    fn initialize_is_idempotent_for_unchanged_size() {
        let mut preset = pipeline(PresetDescription {
            composite_shader: ShaderSource::new(2, ""),
            ..Default::default()
        });
        let context = RenderContext::new(32, 32);
        preset.initialize(&context).unwrap();
        preset.initialize(&context).unwrap();
        assert_eq!(preset.backend().compiled_programs(), 1);

        preset.initialize(&RenderContext::new(64, 32)).unwrap();
        assert_eq!(preset.backend().compiled_programs(), 1);
        assert!(preset.is_first_frame());
    }

    #[test]
    fn output_alternates_between_buffers_and_goes_stale_on_resize() {
        let mut preset = pipeline(PresetDescription::default());
        let context = RenderContext::new(16, 16);
        let audio = FrameAudioData::default();
        preset.initialize(&context).unwrap();
        let published = preset.output_texture().unwrap();

        preset.render_frame(&audio, &context).unwrap();
        assert_eq!(preset.output_texture(), Some(published));
        let first = preset.output_texture_name().unwrap();
        preset.render_frame(&audio, &context).unwrap();
        let second = preset.output_texture_name().unwrap();
        assert_ne!(first, second);

        let old = preset.output_texture().unwrap();
        preset.render_frame(&audio, &RenderContext::new(32, 16)).unwrap();
        assert!(preset.state().textures.resolve(old).is_none());
        let entry = preset
            .state()
            .textures
            .resolve(preset.output_texture().unwrap())
            .unwrap();
        assert_eq!((entry.width, entry.height), (32, 16));
    }

    #[test]
    fn compat_flag_forces_default_composite() {
        let description = PresetDescription {
            composite_shader: ShaderSource::new(2, "shader_body { ret = 1 - tex2D(sampler_main, uv).xyz; }"),
            ..Default::default()
        };
        let mut config = EngineConfig::default();
        config.compat.composite_follows_warp_source = true;
        let mut preset = FramePipeline::load(RecordingBackend::new(), &description, config).unwrap();
        preset.initialize(&RenderContext::new(8, 8)).unwrap();

        let composite = preset.shaders().unwrap().composite.program().unwrap();
        assert_eq!(composite.prepared.body, "ret = tex2D(sampler_main, uv).xyz;");
    }

    #[test]
    fn blur_textures_follow_the_shaders() {
        let mut preset = pipeline(PresetDescription {
            composite_shader: ShaderSource::new(
                2,
                "shader_body { ret = tex2D(sampler_blur2, uv).xyz; }",
            ),
            ..Default::default()
        });
        preset.initialize(&RenderContext::new(64, 64)).unwrap();
        // four attachments plus two blur levels
        assert_eq!(preset.backend().live_textures(), 6);
    }

    #[test]
    fn release_frees_everything() {
        let mut preset = pipeline(PresetDescription {
            warp_shader: ShaderSource::new(2, ""),
            ..Default::default()
        });
        preset.initialize(&RenderContext::new(8, 8)).unwrap();
        assert_eq!(preset.backend().live_programs(), 1);

        preset.release();
        assert_eq!(preset.backend().live_programs(), 0);
        assert_eq!(preset.backend().live_textures(), 0);
        assert_eq!(preset.output_texture_name(), None);
        preset.release();
    }

    #[test]
    fn failed_compile_keeps_no_programs_alive() {
        let description = PresetDescription {
            warp_shader: ShaderSource::new(2, "shader_body { ret = tex2D(sampler_main, uv).xyz; }"),
            composite_shader: ShaderSource::new(2, ""),
            ..Default::default()
        };
        let backend = RecordingBackend::new().fail_compiles_containing("// composite");
        let mut preset =
            FramePipeline::load(backend, &description, EngineConfig::default()).unwrap();
        let context = RenderContext::new(16, 16);

        for _ in 0..3 {
            let err = preset
                .render_frame(&FrameAudioData::default(), &context)
                .unwrap_err();
            assert!(matches!(
                err,
                crate::RenderError::Load(LoadError::DefaultShader {
                    slot: ShaderSlot::Composite,
                    ..
                })
            ));
            assert_eq!(preset.backend().live_programs(), 0);
        }
        assert!(preset.shaders().is_none());

        preset.release();
        assert_eq!(preset.backend().live_programs(), 0);
    }
}
