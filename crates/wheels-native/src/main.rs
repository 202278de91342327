//! Drives a small fixed scene through the engine on the offline backend and
//! logs what a listener would hear. Useful for checking mix and effect
//! behaviour without a browser.
//!
//! Usage: `wheels-native [seed]`

use glam::Vec2;
use instant::{Duration, Instant};
use wheels_core::constants::{CONNECTOR_PROBE_SAMPLES, SOLID_RING_PROBE_SAMPLES};
use wheels_core::{
    circle_samples, factor_from_influence, AudioBackend, AudioEngine, EffectKind, EngineConfig,
    OfflineBackend, PcmBuffer, QuadraticCurve, SampleGroup, ShapeId, ShapeIds, ThresholdField,
};

const FRAME_SEC: f64 = 1.0 / 60.0;
const FRAMES: usize = 240;
const SAMPLE_RATE: f32 = 44_100.0;
const TOUCH_BAND: f32 = 4.0;

struct Wheel {
    tone: ShapeId,
    center: Vec2,
    outline_r: f32,
    hue: f32,
}

struct Ring {
    id: ShapeId,
    center: Vec2,
    inner_r: f32,
    outer_r: f32,
}

struct Connector {
    start: Vec2,
    end: Vec2,
    effect: EffectKind,
}

struct Scene {
    wheels: Vec<Wheel>,
    rings: Vec<Ring>,
    connectors: Vec<Connector>,
    bead: (ShapeId, Vec2),
}

fn build_scene(ids: &mut ShapeIds) -> Scene {
    Scene {
        wheels: vec![
            Wheel {
                tone: ids.allocate(),
                center: Vec2::new(160.0, 200.0),
                outline_r: 70.0,
                hue: 40.0,
            },
            Wheel {
                tone: ids.allocate(),
                center: Vec2::new(420.0, 220.0),
                outline_r: 90.0,
                hue: 250.0,
            },
        ],
        rings: vec![Ring {
            id: ids.allocate(),
            center: Vec2::new(160.0, 200.0),
            inner_r: 30.0,
            outer_r: 55.0,
        }],
        connectors: vec![
            Connector {
                start: Vec2::new(160.0, 200.0),
                end: Vec2::new(420.0, 220.0),
                effect: EffectKind::Reverb,
            },
            Connector {
                start: Vec2::new(420.0, 220.0),
                end: Vec2::new(560.0, 90.0),
                effect: EffectKind::Delay,
            },
        ],
        bead: (ids.allocate(), Vec2::new(300.0, 120.0)),
    }
}

fn load_fake_samples(engine: &mut AudioEngine<OfflineBackend>) {
    for group in SampleGroup::ALL {
        let paths: Vec<String> = (1..=3)
            .map(|i| format!("{}/{}-{}.wav", group.default_dir(), group.name(), i))
            .collect();
        engine
            .library_mut()
            .register_pool(group, paths.iter().cloned());
        for (i, path) in paths.into_iter().enumerate() {
            let frames = (SAMPLE_RATE as usize / 4) * (i + 1);
            engine
                .library_mut()
                .insert_buffer(path, PcmBuffer::new(SAMPLE_RATE, frames));
        }
    }
}

fn touches_circle(points: &[Vec2], center: Vec2, radius: f32) -> bool {
    points
        .iter()
        .any(|p| (p.distance(center) - radius).abs() <= TOUCH_BAND)
}

fn touches_band(points: &[Vec2], center: Vec2, inner: f32, outer: f32) -> bool {
    points.iter().any(|p| {
        let d = p.distance(center);
        d >= inner && d <= outer
    })
}

/// Pointer sweeps left to right along a gentle arc.
fn pointer_at(frame: usize) -> Vec2 {
    let t = frame as f32 / FRAMES as f32;
    Vec2::new(60.0 + 520.0 * t, 200.0 - 60.0 * (t * std::f32::consts::PI).sin())
}

fn step(
    engine: &mut AudioEngine<OfflineBackend>,
    field: &mut ThresholdField,
    scene: &Scene,
    now: Instant,
    phase: f32,
) -> usize {
    let mut hits = 0;
    engine.begin_frame();
    let points = field.interaction_points();

    for wheel in &scene.wheels {
        let influence = field.max_influence_over_at(
            circle_samples(wheel.center, wheel.outline_r, phase, SOLID_RING_PROBE_SAMPLES),
            now,
        );
        engine.update_tone(wheel.tone, influence, wheel.hue);
        let outline = touches_circle(&points, wheel.center, wheel.outline_r);
        hits += engine.percussion_edge(wheel.tone, SampleGroup::Snare, outline) as usize;
    }

    for ring in &scene.rings {
        let mid = (ring.inner_r + ring.outer_r) * 0.5;
        let dots = touches_circle(&points, ring.center, mid);
        let rays = touches_band(&points, ring.center, ring.inner_r, ring.outer_r);
        hits += engine.percussion_edge(ring.id, SampleGroup::Kick, dots) as usize;
        hits += engine.percussion_edge(ring.id, SampleGroup::Hihat, rays) as usize;
        let solid = field.max_influence_over_at(
            circle_samples(ring.center, ring.outer_r, phase, SOLID_RING_PROBE_SAMPLES),
            now,
        );
        if engine.solid_ring_edge(ring.id, solid) {
            log::debug!("solid ring {:?} touched", ring.id);
        }
    }

    for connector in &scene.connectors {
        let curve = QuadraticCurve::connector(connector.start, connector.end, phase);
        let influence =
            field.max_influence_over_at(curve.samples(CONNECTOR_PROBE_SAMPLES), now);
        engine.accumulate_connector(
            connector.effect,
            factor_from_influence(0.0, 1.0, influence),
        );
    }

    let (bead, at) = scene.bead;
    let influence = field.max_influence_over_at(std::iter::once(at), now);
    engine.update_loop(bead, influence);

    engine.end_frame();
    hits
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let seed = std::env::args()
        .nth(1)
        .map(|s| s.parse::<u64>())
        .transpose()?
        .unwrap_or(7);
    let config = EngineConfig::with_seed(seed);
    let mut field = ThresholdField::new(config.threshold_radius * 3.0);
    let mut engine = AudioEngine::new(OfflineBackend::new(SAMPLE_RATE), config);
    if !engine.is_available() {
        anyhow::bail!("offline backend refused to build the graph");
    }
    log::info!("session scale: {}", engine.scale().name());

    load_fake_samples(&mut engine);
    engine.enable();
    field.set_audio_ready(true);
    field.add_threshold(Vec2::new(300.0, 150.0));

    let mut ids = ShapeIds::default();
    let scene = build_scene(&mut ids);

    let start = Instant::now();
    let mut hits = 0;
    for frame in 0..FRAMES {
        let now = start + Duration::from_secs_f64(frame as f64 * FRAME_SEC);
        field.pointer_moved(pointer_at(frame));
        if frame == FRAMES / 2 {
            field.toggle_mouse_output();
            log::info!("mouse output muted halfway through");
        }
        hits += step(&mut engine, &mut field, &scene, now, frame as f32 * 0.02);
        engine.backend_mut().advance(FRAME_SEC);

        if frame % 30 == 0 {
            log::info!(
                "t={:.2}s voices={} loops={} reverb={:.2} delay={:.2} bead loop={:.3}",
                engine.backend().current_time(),
                engine.voices().active_count(),
                engine.loops().active_count(),
                engine.effect_level(EffectKind::Reverb),
                engine.effect_level(EffectKind::Delay),
                engine.loop_level(scene.bead.0),
            );
        }
    }

    for wheel in &scene.wheels {
        engine.forget_shape(wheel.tone);
    }
    for ring in &scene.rings {
        engine.forget_shape(ring.id);
    }
    engine.forget_shape(scene.bead.0);
    log::info!(
        "done: {} percussion hits, {} one-shots fired, {} sources still playing",
        hits,
        engine.sampler().fired(),
        engine.backend().playing_sources()
    );
    Ok(())
}
