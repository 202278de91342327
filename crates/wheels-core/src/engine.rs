//! The explicit engine object every call site holds a reference to.
//!
//! One animation tick drives one cycle:
//!
//! ```text
//! begin_frame()
//!   per shape:     update_tone / update_loop / percussion_edge
//!   per connector: accumulate_connector(kind, level)
//! end_frame()
//! ```

use crate::config::EngineConfig;
use crate::effects::{EffectKind, EffectRack};
use crate::error::AudioError;
use crate::frame::FrameAccumulator;
use crate::graph::AudioBackend;
use crate::library::{SampleGroup, SampleLibrary};
use crate::looper::LoopManager;
use crate::mixer::{BusMixer, BusName};
use crate::sampler::SampleTriggerManager;
use crate::scale::{hue_to_octave, ScaleModel};
use crate::shape::{PercussionEdges, ShapeAssignments, ShapeId};
use crate::voice::{ToneChoice, VoiceManager};
use rand::prelude::*;

struct Graph {
    mixer: BusMixer,
    effects: EffectRack,
}

pub struct AudioEngine<B: AudioBackend> {
    backend: B,
    graph: Option<Graph>,
    enabled: bool,
    rng: StdRng,
    scale: ScaleModel,
    assignments: ShapeAssignments,
    edges: PercussionEdges,
    library: SampleLibrary<B::Buffer>,
    voices: VoiceManager,
    loops: LoopManager,
    sampler: SampleTriggerManager,
    frame: FrameAccumulator,
    percussion_velocity: f32,
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Build the bus graph and effect sends on `backend`.
    ///
    /// If the graph cannot be built the engine is kept but unavailable: this is
    /// logged once here and every later call is a no-op.
    pub fn new(mut backend: B, config: EngineConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let scale = ScaleModel::generate(&mut rng);
        let graph = match build_graph(&mut backend, &config, &mut rng) {
            Ok(graph) => Some(graph),
            Err(e) => {
                log::warn!("[audio] audio engine unavailable, sound is disabled: {}", e);
                None
            }
        };
        Self {
            backend,
            graph,
            enabled: false,
            rng,
            scale,
            assignments: ShapeAssignments::default(),
            edges: PercussionEdges::default(),
            library: SampleLibrary::default(),
            voices: VoiceManager::default(),
            loops: LoopManager::default(),
            sampler: SampleTriggerManager::default(),
            frame: FrameAccumulator::default(),
            percussion_velocity: config.percussion_velocity.clamp(0.0, 1.0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.graph.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) -> bool {
        let Some(graph) = &self.graph else {
            return false;
        };
        if self.enabled {
            return true;
        }
        self.enabled = true;
        report("apply bus levels", graph.mixer.apply_levels(&mut self.backend));
        log::info!("[audio] audio engine enabled");
        true
    }

    // ---------------- frame cycle ----------------

    pub fn begin_frame(&mut self) {
        self.frame.reset();
    }

    pub fn accumulate_connector(&mut self, kind: EffectKind, level: f32) {
        if !self.enabled {
            return;
        }
        self.frame.accumulate(kind, level);
    }

    pub fn accumulate_connector_named(&mut self, kind: &str, level: f32) {
        self.accumulate_connector(EffectKind::parse_or_default(kind), level);
    }

    pub fn end_frame(&mut self) {
        if !self.enabled {
            return;
        }
        if let Some(graph) = &mut self.graph {
            report(
                "apply effect frame",
                graph.effects.apply_frame(&mut self.backend, &self.frame),
            );
        }
    }

    // ---------------- per shape ----------------

    /// Drive the shape's oscillator. `hue` (degrees) picks the octave when a
    /// voice is created; NaN falls back to octave 4.
    pub fn update_tone(&mut self, shape: ShapeId, influence: f32, hue: f32) {
        if !self.enabled {
            return;
        }
        let Some(graph) = &self.graph else {
            return;
        };
        let bus = graph.mixer.bus(BusName::Synth);
        let assignments = &mut self.assignments;
        let rng = &mut self.rng;
        let scale = &self.scale;
        let result = self
            .voices
            .update_tone(&mut self.backend, bus, shape, influence, || {
                let waveform = assignments.waveform(shape, rng);
                let midi = scale.pick_note(hue_to_octave(hue), rng);
                ToneChoice { waveform, midi }
            });
        report("update tone", result);
    }

    /// Play a one-shot from `group`. With a shape the sample is the shape's
    /// stable pick for that group; without one it is drawn at random.
    /// Returns whether anything was started.
    pub fn trigger_percussion(
        &mut self,
        group: SampleGroup,
        shape: Option<ShapeId>,
        velocity: Option<f32>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(graph) = &self.graph else {
            return false;
        };
        let pool = self.library.pool(group);
        let path = match shape {
            Some(shape) => self.assignments.sample(shape, group, pool, &mut self.rng),
            None => pool.choose(&mut self.rng).cloned(),
        };
        let Some(buffer) = path.as_deref().and_then(|p| self.library.get_buffer(p)) else {
            return false;
        };
        let velocity = velocity.unwrap_or(self.percussion_velocity);
        let bus = graph.mixer.bus(group.bus());
        match self
            .sampler
            .trigger(&mut self.backend, bus, group, buffer, velocity)
        {
            Ok(_) => true,
            Err(e) => {
                log::warn!("[audio] trigger {} failed: {}", group.name(), e);
                false
            }
        }
    }

    pub fn percussion_edge(&mut self, shape: ShapeId, group: SampleGroup, active: bool) -> bool {
        if !self.edges.update(shape, group, active) {
            return false;
        }
        self.trigger_percussion(group, Some(shape), None)
    }

    /// Track a solid ring's touch state. Solid rings make no sound of their
    /// own; the rising edge is returned for callers that want to react to it.
    pub fn solid_ring_edge(&mut self, shape: ShapeId, influence: f32) -> bool {
        self.edges.update_solid(shape, influence)
    }

    pub fn update_loop(&mut self, shape: ShapeId, influence: f32) {
        let Some(graph) = &self.graph else {
            return;
        };
        if !self.enabled {
            report("stop loop", self.loops.release(&mut self.backend, shape));
            return;
        }
        let bus = graph.mixer.bus(BusName::Sfx);
        let assignments = &mut self.assignments;
        let rng = &mut self.rng;
        let library = &self.library;
        let result = self
            .loops
            .update_loop(&mut self.backend, bus, shape, influence, || {
                let pool = library.pool(SampleGroup::Sfx);
                let path = assignments.sample(shape, SampleGroup::Sfx, pool, rng)?;
                let buffer = library.get_buffer(&path)?.clone();
                Some((path, buffer))
            });
        report("update loop", result);
    }

    pub fn loop_level(&self, shape: ShapeId) -> f32 {
        self.loops.level(&self.backend, shape)
    }

    pub fn forget_shape(&mut self, shape: ShapeId) {
        if self.graph.is_some() {
            report("release voice", self.voices.release(&mut self.backend, shape));
            report("release loop", self.loops.release(&mut self.backend, shape));
        }
        self.assignments.forget(shape);
        self.edges.forget(shape);
    }

    // ---------------- controls ----------------

    pub fn set_bus_level(&mut self, bus: BusName, value: f32) {
        if let Some(graph) = &mut self.graph {
            report(
                "set bus level",
                graph.mixer.set_level(&mut self.backend, bus, value),
            );
        }
    }

    pub fn set_bus_level_by_name(&mut self, name: &str, value: f32) -> bool {
        let Some(graph) = &mut self.graph else {
            return false;
        };
        match graph
            .mixer
            .set_level_by_name(&mut self.backend, name, value)
        {
            Ok(matched) => matched,
            Err(e) => {
                log::warn!("[audio] set bus level failed: {}", e);
                true
            }
        }
    }

    pub fn bus_level(&self, bus: BusName) -> f32 {
        self.graph.as_ref().map_or(0.0, |g| g.mixer.level(bus))
    }

    pub fn set_effect_override(&mut self, kind: EffectKind, value: f32) {
        if let Some(graph) = &mut self.graph {
            graph.effects.set_override(kind, value);
        }
    }

    pub fn set_effect_override_by_name(&mut self, name: &str, value: f32) -> bool {
        match name.parse::<EffectKind>() {
            Ok(kind) => {
                self.set_effect_override(kind, value);
                true
            }
            Err(e) => {
                log::debug!("[audio] {}", e);
                false
            }
        }
    }

    pub fn set_max_effect_level(&mut self, value: f32) {
        if let Some(graph) = &mut self.graph {
            graph.effects.set_max_level(value);
        }
    }

    pub fn effect_level(&self, kind: EffectKind) -> f32 {
        self.graph.as_ref().map_or(0.0, |g| g.effects.level(kind))
    }

    // ---------------- accessors ----------------

    pub fn scale(&self) -> &ScaleModel {
        &self.scale
    }

    pub fn library(&self) -> &SampleLibrary<B::Buffer> {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut SampleLibrary<B::Buffer> {
        &mut self.library
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn mixer(&self) -> Option<&BusMixer> {
        self.graph.as_ref().map(|g| &g.mixer)
    }

    pub fn effects(&self) -> Option<&EffectRack> {
        self.graph.as_ref().map(|g| &g.effects)
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn loops(&self) -> &LoopManager {
        &self.loops
    }

    pub fn sampler(&self) -> &SampleTriggerManager {
        &self.sampler
    }

    pub fn frame(&self) -> &FrameAccumulator {
        &self.frame
    }

    pub fn assignments(&self) -> &ShapeAssignments {
        &self.assignments
    }

    pub fn edges(&self) -> &PercussionEdges {
        &self.edges
    }
}

fn build_graph<B: AudioBackend>(
    backend: &mut B,
    config: &EngineConfig,
    rng: &mut StdRng,
) -> Result<Graph, AudioError> {
    let mixer = BusMixer::build(backend, &config.bus_levels)?;
    let mut effects = EffectRack::build(backend, &mixer, rng)?;
    effects.set_max_level(config.max_effect_level);
    Ok(Graph { mixer, effects })
}

fn report(what: &str, result: Result<(), AudioError>) {
    if let Err(e) = result {
        log::warn!("[audio] {} failed: {}", what, e);
    }
}
