#![cfg(target_arch = "wasm32")]
//! Browser bindings: a `WheelsAudio` object the sketch drives once per
//! animation frame, plus the canvas and keyboard listeners that feed the
//! threshold field.

mod assets;
mod audio;
mod events;

use crate::assets::SharedEngine;
use crate::audio::WebAudioBackend;
use glam::Vec2;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys as web;
use wheels_core::constants::{CONNECTOR_PROBE_SAMPLES, SOLID_RING_PROBE_SAMPLES};
use wheels_core::{
    circle_samples, factor_from_influence, AudioEngine, BusName, ClickOutcome, EffectKind,
    EngineConfig, QuadraticCurve, SampleGroup, ShapeId, ShapeIds, SharedField, ThresholdField,
};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("wheels-web starting");
    Ok(())
}

fn to_js(e: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", e))
}

fn group_or_sfx(name: &str) -> SampleGroup {
    name.parse().unwrap_or_else(|e| {
        log::debug!("[audio] {}; using sfx", e);
        SampleGroup::Sfx
    })
}

fn js_observer<T: Copy + Into<JsValue>>(
    callback: js_sys::Function,
) -> impl FnMut(&T) -> anyhow::Result<()> {
    move |value: &T| {
        callback
            .call1(&JsValue::NULL, &(*value).into())
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{:?}", e))
    }
}

#[wasm_bindgen]
pub struct WheelsAudio {
    engine: SharedEngine,
    field: SharedField,
    shapes: ShapeIds,
}

#[wasm_bindgen]
impl WheelsAudio {
    /// Create the audio context, build the graph and start loading samples.
    /// With a canvas id the pointer, click and key listeners are installed
    /// too; without one the host forwards input through the pointer methods.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: Option<String>, seed: Option<f64>) -> Result<WheelsAudio, JsValue> {
        let seed = seed
            .map(|s| s as u64)
            .unwrap_or_else(|| (js_sys::Math::random() * u32::MAX as f64) as u64);
        let config = EngineConfig::with_seed(seed);
        let field = SharedField::new(ThresholdField::new(config.threshold_radius));
        let engine: SharedEngine = Rc::new(RefCell::new(AudioEngine::new(
            WebAudioBackend::new(),
            config,
        )));
        log::info!(
            "[audio] session scale {} (seed {})",
            engine.borrow().scale().name(),
            seed
        );

        if let Some(id) = canvas_id {
            let window = web::window().ok_or_else(|| JsValue::from_str("no window"))?;
            let document = window
                .document()
                .ok_or_else(|| JsValue::from_str("no document"))?;
            let canvas: web::HtmlCanvasElement = document
                .get_element_by_id(&id)
                .ok_or_else(|| JsValue::from_str(&format!("missing #{}", id)))?
                .dyn_into()
                .map_err(|e| JsValue::from_str(&format!("{:?}", e)))?;
            events::install_canvas_handlers(&canvas, &field).map_err(to_js)?;
            events::install_key_handlers(&field).map_err(to_js)?;
        }
        events::install_unlock_handlers(&engine).map_err(to_js)?;

        let loader = engine.clone();
        spawn_local(async move {
            assets::preload_all(loader).await;
        });

        Ok(WheelsAudio {
            engine,
            field,
            shapes: ShapeIds::default(),
        })
    }

    // ---------------- lifecycle ----------------

    /// Turn sound on. Call from a user gesture so the context can resume.
    pub fn enable(&self) -> bool {
        let enabled = self.engine.borrow_mut().enable();
        if enabled {
            self.field.borrow_mut().set_audio_ready(true);
            events::resume(&self.engine);
        }
        enabled
    }

    pub fn is_available(&self) -> bool {
        self.engine.borrow().is_available()
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.borrow().is_enabled()
    }

    pub fn scale_name(&self) -> String {
        self.engine.borrow().scale().name()
    }

    pub fn begin_frame(&self) {
        self.engine.borrow_mut().begin_frame();
    }

    pub fn end_frame(&self) {
        self.engine.borrow_mut().end_frame();
    }

    // ---------------- influence ----------------

    pub fn influence_at(&self, x: f32, y: f32) -> f32 {
        self.field.borrow_mut().influence_at(Vec2::new(x, y))
    }

    /// Strongest influence along a connector whose control point wobbles with `phase`.
    pub fn connector_influence(&self, x1: f32, y1: f32, x2: f32, y2: f32, phase: f32) -> f32 {
        let curve = QuadraticCurve::connector(Vec2::new(x1, y1), Vec2::new(x2, y2), phase);
        self.field
            .borrow_mut()
            .max_influence_over(curve.samples(CONNECTOR_PROBE_SAMPLES))
    }

    pub fn ring_influence(&self, cx: f32, cy: f32, radius: f32, rotation: f32) -> f32 {
        self.field.borrow_mut().max_influence_over(circle_samples(
            Vec2::new(cx, cy),
            radius,
            rotation,
            SOLID_RING_PROBE_SAMPLES,
        ))
    }

    // ---------------- shapes ----------------

    pub fn allocate_shape(&mut self) -> u32 {
        self.shapes.allocate().0
    }

    pub fn forget_shape(&self, shape: u32) {
        self.engine.borrow_mut().forget_shape(ShapeId(shape));
    }

    /// `hue` in degrees picks the octave for a new voice; omitted means octave 4.
    pub fn update_tone(&self, shape: u32, influence: f32, hue: Option<f32>) {
        self.engine
            .borrow_mut()
            .update_tone(ShapeId(shape), influence, hue.unwrap_or(f32::NAN));
    }

    /// Unknown groups play from the sfx pool.
    pub fn trigger_percussion(
        &self,
        group: &str,
        shape: Option<u32>,
        velocity: Option<f32>,
    ) -> bool {
        self.engine
            .borrow_mut()
            .trigger_percussion(group_or_sfx(group), shape.map(ShapeId), velocity)
    }

    pub fn percussion_edge(&self, shape: u32, group: &str, active: bool) -> bool {
        self.engine
            .borrow_mut()
            .percussion_edge(ShapeId(shape), group_or_sfx(group), active)
    }

    pub fn solid_ring_touch(&self, shape: u32, influence: f32) -> bool {
        self.engine
            .borrow_mut()
            .solid_ring_edge(ShapeId(shape), influence)
    }

    pub fn update_loop(&self, shape: u32, influence: f32) {
        self.engine
            .borrow_mut()
            .update_loop(ShapeId(shape), influence);
    }

    pub fn loop_level(&self, shape: u32) -> f32 {
        self.engine.borrow().loop_level(ShapeId(shape))
    }

    /// Feed a connector's level into this frame's send for `effect`.
    pub fn accumulate_connector(&self, effect: &str, level: f32) {
        self.engine
            .borrow_mut()
            .accumulate_connector_named(effect, level);
    }

    /// Connector influence mapped onto an effect level.
    pub fn connector_effect_level(influence: f32) -> f32 {
        factor_from_influence(0.0, 1.0, influence)
    }

    // ---------------- mixer and effects ----------------

    pub fn set_bus_level(&self, bus: &str, value: f32) -> bool {
        self.engine.borrow_mut().set_bus_level_by_name(bus, value)
    }

    pub fn bus_level(&self, bus: &str) -> Option<f32> {
        let bus: BusName = bus.parse().ok()?;
        Some(self.engine.borrow().bus_level(bus))
    }

    pub fn set_effect_level(&self, effect: &str, value: f32) -> bool {
        self.engine
            .borrow_mut()
            .set_effect_override_by_name(effect, value)
    }

    pub fn set_max_effect_level(&self, value: f32) {
        self.engine.borrow_mut().set_max_effect_level(value);
    }

    pub fn effect_level(&self, effect: &str) -> Option<f32> {
        let kind: EffectKind = effect.parse().ok()?;
        Some(self.engine.borrow().effect_level(kind))
    }

    // ---------------- pointer and thresholds ----------------

    pub fn pointer_moved(&self, x: f32, y: f32) {
        self.field.borrow_mut().pointer_moved(Vec2::new(x, y));
    }

    pub fn pointer_left(&self) {
        self.field.borrow_mut().pointer_left();
    }

    /// Returns whether the click placed or removed a threshold.
    pub fn primary_click(&self, x: f32, y: f32, shift: bool) -> bool {
        let outcome = self
            .field
            .borrow_mut()
            .handle_primary_click(Vec2::new(x, y), shift);
        matches!(
            outcome,
            ClickOutcome::Added(_) | ClickOutcome::Removed(_)
        )
    }

    pub fn secondary_click(&self, x: f32, y: f32) -> bool {
        let outcome = self
            .field
            .borrow_mut()
            .handle_secondary_click(Vec2::new(x, y));
        matches!(outcome, ClickOutcome::Removed(_))
    }

    pub fn threshold_count(&self) -> usize {
        self.field.borrow().thresholds().len()
    }

    pub fn set_radius(&self, value: f32) {
        self.field.set_radius(value);
    }

    pub fn adjust_radius(&self, delta: f32) {
        self.field.adjust_radius(delta);
    }

    pub fn radius(&self) -> f32 {
        self.field.borrow().radius()
    }

    pub fn set_mouse_output_enabled(&self, enabled: bool) {
        self.field.set_mouse_output_enabled(enabled);
    }

    pub fn mouse_output_enabled(&self) -> bool {
        self.field.borrow().is_mouse_output_enabled()
    }

    pub fn on_radius_change(&self, callback: js_sys::Function) {
        self.field.on_radius_change(js_observer::<f32>(callback));
    }

    pub fn on_mouse_output_change(&self, callback: js_sys::Function) {
        self.field.on_mouse_output_change(js_observer::<bool>(callback));
    }
}
