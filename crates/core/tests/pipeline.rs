use std::sync::Arc;

use warpdrop_core::audio::{SPECTRUM_SAMPLES, WAVEFORM_SAMPLES};
use warpdrop_core::expr::FrameVar;
use warpdrop_core::{
    EngineConfig, FrameAudioData, GpuError, LoadError, NamedTextures, PassKind, Preset,
    PresetDescription, RecordingBackend, RenderBackend, RenderContext, RenderError,
    ShaderSource, ShapeDescription, WaveDescription,
};

fn load(description: &PresetDescription, backend: RecordingBackend) -> Preset<RecordingBackend> {
    Preset::load(backend, description, EngineConfig::default()).unwrap()
}

fn busy_preset() -> PresetDescription {
    let mut description = PresetDescription {
        name: "busy".into(),
        per_frame_code: "zoom = 1 + 0.05 * bass; rot = 0.1 * sin(time); q1 = treb;".into(),
        per_pixel_code: "rot = rot + 0.02 * rad * q1;".into(),
        warp_shader: ShaderSource::new(2, "shader_body { ret = tex2D(sampler_main, uv).xyz * 0.98; }"),
        composite_shader: ShaderSource::new(2, "shader_body { ret = tex2D(sampler_blur1, uv).xyz; }"),
        shapes: vec![ShapeDescription {
            enabled: true,
            per_frame_code: "x = 0.5 + 0.2 * sin(time + instance); rad = 0.1 * bass_att;".into(),
            values: [("num_inst".to_string(), 3.0)].into_iter().collect(),
            ..Default::default()
        }],
        waves: vec![WaveDescription {
            enabled: true,
            per_frame_code: "samples = 128;".into(),
            per_point_code: "y = 0.5 + value1 * 0.3;".into(),
            ..Default::default()
        }],
        ..Default::default()
    };
    description.values.insert("darken_center".into(), 1.0);
    description.values.insert("mv_a".into(), 0.5);
    description
}

fn random_audio(rng: &mut fastrand::Rng, frame: u32) -> FrameAudioData {
    let mut level = || rng.f32() * 3.0;
    let mut audio = FrameAudioData {
        time: frame as f32 / 60.0,
        frame,
        bass: level(),
        mid: level(),
        treb: level(),
        bass_att: level(),
        mid_att: level(),
        treb_att: level(),
        vol: level(),
        ..Default::default()
    };
    for i in 0..WAVEFORM_SAMPLES {
        audio.waveform_left[i] = rng.f32() * 2.0 - 1.0;
        audio.waveform_right[i] = rng.f32() * 2.0 - 1.0;
    }
    for i in 0..SPECTRUM_SAMPLES {
        audio.spectrum_left[i] = rng.f32();
        audio.spectrum_right[i] = rng.f32();
    }
    audio
}

#[test]
fn steady_state_pass_sequence() {
    let mut preset = load(&busy_preset(), RecordingBackend::new());
    let context = RenderContext::new(320, 240);
    let audio = FrameAudioData::default();
    preset.initialize(&context).unwrap();

    preset.render_frame(&audio, &context).unwrap();
    preset.backend_mut().take_trace();
    preset.render_frame(&audio, &context).unwrap();

    use PassKind::*;
    assert_eq!(
        preset.backend().trace(),
        &[
            BeginFrame,
            MotionVectors,
            BindTargets,
            MaskMotion,
            Clear,
            Warp,
            MaskMotion,
            UpdateBlur,
            Shape,
            CustomWave,
            Waveform,
            Darken,
            Border,
            BindTargets,
            Composite,
            Present,
        ]
    );
}

#[test]
fn motion_vectors_are_suppressed_after_initialize_and_resize() {
    let mut preset = load(&busy_preset(), RecordingBackend::new());
    let audio = FrameAudioData::default();
    let small = RenderContext::new(64, 48);
    let large = RenderContext::new(128, 96);

    preset.initialize(&small).unwrap();
    for (context, expect_motion) in [
        (&small, false),
        (&small, true),
        (&small, true),
        (&large, false),
        (&large, true),
    ] {
        preset.render_frame(&audio, context).unwrap();
        let trace = preset.backend_mut().take_trace();
        assert_eq!(trace.contains(&PassKind::MotionVectors), expect_motion);
    }
}

#[test]
fn pass_order_never_changes_under_random_audio() {
    let mut rng = fastrand::Rng::with_seed(7);
    let mut preset = load(&busy_preset(), RecordingBackend::new());
    let context = RenderContext::new(160, 120);
    preset.initialize(&context).unwrap();

    preset.render_frame(&random_audio(&mut rng, 0), &context).unwrap();
    preset.backend_mut().take_trace();

    let mut reference: Option<Vec<PassKind>> = None;
    for frame in 1..=1000 {
        let audio = random_audio(&mut rng, frame);
        preset.render_frame(&audio, &context).unwrap();
        let trace = preset.backend_mut().take_trace();
        match &reference {
            Some(expected) => assert_eq!(&trace, expected, "frame {frame}"),
            None => reference = Some(trace),
        }
    }
    assert_eq!(preset.frame_count(), 1001);
}

#[test]
fn gamma_and_echo_zoom_clamps_hold_inside_the_pipeline() {
    let context = RenderContext::new(32, 32);
    for (code, gamma, echo_zoom) in [
        ("gamma = -5; echo_zoom = 0;", 0.0, 0.001),
        ("gamma = 50; echo_zoom = 5000;", 8.0, 1000.0),
    ] {
        let description = PresetDescription {
            per_frame_code: code.into(),
            ..Default::default()
        };
        let mut preset = load(&description, RecordingBackend::new());
        preset
            .render_frame(&FrameAudioData::default(), &context)
            .unwrap();
        assert_eq!(preset.per_frame().get(FrameVar::Gamma), gamma);
        assert_eq!(preset.per_frame().get(FrameVar::EchoZoom), echo_zoom);
    }
}

#[test]
fn broken_composite_behaves_like_an_empty_one() {
    let context = RenderContext::new(64, 64);
    let broken = PresetDescription {
        composite_shader: ShaderSource::new(2, "shader_body { ret = BROKEN(uv); }"),
        ..Default::default()
    };
    let empty = PresetDescription {
        composite_shader: ShaderSource::new(2, ""),
        ..Default::default()
    };

    let mut a = load(&broken, RecordingBackend::new().fail_compiles_containing("BROKEN"));
    let mut b = load(&empty, RecordingBackend::new());
    a.initialize(&context).unwrap();
    b.initialize(&context).unwrap();

    let substituted = &a.shaders().unwrap().composite;
    let explicit = &b.shaders().unwrap().composite;
    assert!(substituted.is_substituted());
    assert!(!explicit.is_substituted());
    assert!(substituted
        .program()
        .unwrap()
        .same_behavior(explicit.program().unwrap()));

    a.render_frame(&FrameAudioData::default(), &context).unwrap();
    b.render_frame(&FrameAudioData::default(), &context).unwrap();
    assert_eq!(a.backend().trace(), b.backend().trace());
}

#[test]
fn unresolved_samplers_fall_back_unless_the_catalog_has_them() {
    let description = PresetDescription {
        warp_shader: ShaderSource::new(2, "shader_body { ret = tex2D(sampler_clouds, uv).xyz; }"),
        ..Default::default()
    };

    let mut bare = load(&description, RecordingBackend::new());
    bare.initialize(&RenderContext::new(32, 32)).unwrap();
    assert!(bare.shaders().unwrap().warp.is_substituted());

    let catalog = Arc::new(NamedTextures::new().with("clouds", 256, 256));
    let mut with_catalog = load(&description, RecordingBackend::new());
    with_catalog
        .initialize(&RenderContext::new(32, 32).with_textures(catalog))
        .unwrap();
    assert!(!with_catalog.shaders().unwrap().warp.is_substituted());
}

#[test]
fn failing_default_shader_is_a_load_error() {
    let description = PresetDescription {
        composite_shader: ShaderSource::new(2, ""),
        ..Default::default()
    };
    let mut preset = load(
        &description,
        RecordingBackend::new().fail_compiles_containing("sampler_main"),
    );
    let err = preset.initialize(&RenderContext::new(32, 32)).unwrap_err();
    assert!(matches!(
        err,
        RenderError::Load(LoadError::DefaultShader { .. })
    ));
}

#[test]
fn formula_errors_abort_the_load() {
    let description = PresetDescription {
        per_pixel_code: "zoom = (1 +".into(),
        ..Default::default()
    };
    let err = Preset::load(RecordingBackend::new(), &description, EngineConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Load(LoadError::Expression {
            program: "per-pixel",
            ..
        })
    ));
}

#[test]
fn allocation_failure_during_load_is_fatal() {
    let err = Preset::load(
        RecordingBackend::new().with_texture_limit(3),
        &PresetDescription::default(),
        EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Load(LoadError::Gpu(GpuError::Allocation { .. }))
    ));
}

#[test]
fn lost_attachment_mid_render_is_fatal() {
    let mut preset = load(&PresetDescription::default(), RecordingBackend::new());
    let context = RenderContext::new(32, 32);
    preset
        .render_frame(&FrameAudioData::default(), &context)
        .unwrap();

    let output = preset.output_texture_name().unwrap();
    preset
        .backend_mut()
        .delete_texture(warpdrop_core::render::TextureId(output));
    let err = preset
        .render_frame(&FrameAudioData::default(), &context)
        .unwrap_err();
    assert!(matches!(err, RenderError::Gpu(GpuError::UnknownResource(_))));
}

#[test]
fn release_returns_every_gpu_object() {
    let mut preset = load(&busy_preset(), RecordingBackend::new());
    let context = RenderContext::new(64, 64);
    preset
        .render_frame(&FrameAudioData::default(), &context)
        .unwrap();
    assert!(preset.backend().live_textures() > 4);
    assert_eq!(preset.backend().live_programs(), 2);

    preset.release();
    assert_eq!(preset.backend().live_textures(), 0);
    assert_eq!(preset.backend().live_programs(), 0);
    assert!(preset.output_texture().is_none());
}
