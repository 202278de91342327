//! Listener markers, the fading pointer, and the influence they project.
//!
//! Influence at a point is the *max* over active thresholds of
//! `(1 − d/r)·intensity`, so overlapping zones never add up past the strongest
//! one.

use crate::constants::*;
use crate::observers::{ObserverId, Observers};
use glam::Vec2;
use instant::Instant;
use smallvec::SmallVec;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub struct ListenerThreshold {
    pub id: u32,
    pub position: Vec2,
    pub radius: f32,
    pub falloff: f32,
    pub intensity: f32,
}

impl ListenerThreshold {
    pub fn influence_at(&self, point: Vec2) -> f32 {
        influence(point.distance(self.position), self.radius) * self.intensity
    }
}

/// Linear falloff: `1 − d/r` inside the radius, 0 outside.
#[inline]
pub fn influence(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance > radius {
        return 0.0;
    }
    (1.0 - distance / radius).clamp(0.0, 1.0)
}

/// Linear blend from `base` to `highlight` by clamped influence.
#[inline]
pub fn factor_from_influence(base: f32, highlight: f32, influence: f32) -> f32 {
    let base = base.max(0.0);
    let hi = highlight.max(base);
    base + (hi - base) * influence.clamp(0.0, 1.0)
}

/// Zone around a freshly placed marker in which the pointer stays silent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuppressionZone {
    pub center: Vec2,
    pub radius: f32,
}

impl SuppressionZone {
    fn contains(&self, p: Vec2) -> bool {
        p.distance(self.center) <= self.radius
    }
}

#[derive(Clone, Debug)]
pub struct MousePointerState {
    pub position: Option<Vec2>,
    pub fade: f32,
    pub suppression: Option<SuppressionZone>,
    last_update: Instant,
}

impl MousePointerState {
    fn new(now: Instant) -> Self {
        Self {
            position: None,
            fade: 0.0,
            suppression: None,
            last_update: now,
        }
    }

    fn advance_fade(&mut self, now: Instant) {
        let dt = if now > self.last_update {
            now.duration_since(self.last_update).as_secs_f32()
        } else {
            0.0
        }
        .min(POINTER_FADE_MAX_STEP_SEC);
        self.last_update = now;
        self.fade = if self.position.is_some() {
            (self.fade + dt * POINTER_FADE_RATE_UP).min(1.0)
        } else {
            (self.fade - dt * POINTER_FADE_RATE_DOWN).max(0.0)
        };
    }

    fn is_suppressed(&self) -> bool {
        match (self.suppression, self.position) {
            (Some(zone), Some(p)) => zone.contains(p),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    Added(u32),
    Removed(ListenerThreshold),
    Missed,
    Ignored,
}

#[derive(Clone, Copy)]
struct ActiveThreshold {
    position: Vec2,
    radius: f32,
    intensity: f32,
}

pub struct ThresholdField {
    thresholds: Vec<ListenerThreshold>,
    radius: f32,
    falloff: f32,
    next_id: u32,
    pointer: MousePointerState,
    mouse_output_enabled: bool,
    audio_ready: bool,
}

impl Default for ThresholdField {
    fn default() -> Self {
        Self::new(THRESHOLD_RADIUS_DEFAULT)
    }
}

impl ThresholdField {
    pub fn new(radius: f32) -> Self {
        Self {
            thresholds: Vec::new(),
            radius: clamp_radius(radius, THRESHOLD_RADIUS_DEFAULT),
            falloff: THRESHOLD_FALLOFF_DEFAULT,
            next_id: 0,
            pointer: MousePointerState::new(Instant::now()),
            mouse_output_enabled: true,
            audio_ready: false,
        }
    }

    /// Influence stays at 0 until the audio engine reports it is enabled.
    pub fn set_audio_ready(&mut self, ready: bool) {
        self.audio_ready = ready;
    }

    pub fn is_audio_ready(&self) -> bool {
        self.audio_ready
    }

    pub fn thresholds(&self) -> &[ListenerThreshold] {
        &self.thresholds
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn pointer(&self) -> &MousePointerState {
        &self.pointer
    }

    pub fn is_mouse_output_enabled(&self) -> bool {
        self.mouse_output_enabled
    }

    // ---------------- markers ----------------

    /// Place a marker at `position` with the current radius and arm pointer
    /// suppression over the same zone.
    pub fn add_threshold(&mut self, position: Vec2) -> u32 {
        self.next_id += 1;
        let threshold = ListenerThreshold {
            id: self.next_id,
            position,
            radius: self.radius,
            falloff: self.falloff,
            intensity: 1.0,
        };
        log::info!(
            "[interaction] added listener threshold #{} at ({:.1},{:.1}) r={}",
            threshold.id,
            position.x,
            position.y,
            threshold.radius
        );
        self.thresholds.push(threshold);
        self.pointer.suppression = Some(SuppressionZone {
            center: position,
            radius: self.radius,
        });
        self.next_id
    }

    /// Remove the nearest marker whose own radius covers `position`.
    pub fn remove_near(&mut self, position: Vec2) -> Option<ListenerThreshold> {
        let mut candidate: Option<(usize, f32)> = None;
        for (i, t) in self.thresholds.iter().enumerate() {
            let d = position.distance(t.position);
            if d > t.radius {
                continue;
            }
            match candidate {
                Some((_, best)) if d >= best => {}
                _ => candidate = Some((i, d)),
            }
        }
        let (index, _) = candidate?;
        let removed = self.thresholds.remove(index);
        log::info!("[interaction] removed listener threshold #{}", removed.id);
        Some(removed)
    }

    /// Shift-click removes, a plain click places a marker.
    pub fn handle_primary_click(&mut self, position: Vec2, shift: bool) -> ClickOutcome {
        if !self.audio_ready {
            return ClickOutcome::Ignored;
        }
        if shift {
            return self.handle_secondary_click(position);
        }
        ClickOutcome::Added(self.add_threshold(position))
    }

    pub fn handle_secondary_click(&mut self, position: Vec2) -> ClickOutcome {
        if !self.audio_ready {
            return ClickOutcome::Ignored;
        }
        match self.remove_near(position) {
            Some(t) => ClickOutcome::Removed(t),
            None => ClickOutcome::Missed,
        }
    }

    // ---------------- settings ----------------

    /// Returns whether the clamped radius differs from the current one.
    pub fn set_radius(&mut self, value: f32) -> bool {
        let clamped = clamp_radius(value, self.radius);
        if clamped == self.radius {
            return false;
        }
        self.radius = clamped;
        true
    }

    pub fn adjust_radius(&mut self, delta: f32) -> bool {
        self.set_radius(self.radius + delta)
    }

    pub fn set_mouse_output_enabled(&mut self, enabled: bool) -> bool {
        if enabled == self.mouse_output_enabled {
            return false;
        }
        self.mouse_output_enabled = enabled;
        log::info!(
            "[interaction] mouse listener {}",
            if enabled { "enabled" } else { "muted" }
        );
        true
    }

    pub fn toggle_mouse_output(&mut self) {
        self.set_mouse_output_enabled(!self.mouse_output_enabled);
    }

    // ---------------- pointer ----------------

    pub fn pointer_moved(&mut self, position: Vec2) {
        if !self.audio_ready {
            return;
        }
        self.pointer.position = Some(position);
        self.pointer.fade = 1.0;
        if let Some(zone) = self.pointer.suppression {
            if !zone.contains(position) {
                self.pointer.suppression = None;
            }
        }
    }

    pub fn pointer_left(&mut self) {
        if !self.audio_ready {
            return;
        }
        self.pointer.position = None;
        self.pointer.suppression = None;
    }

    pub fn interaction_points(&self) -> SmallVec<[Vec2; 8]> {
        self.pointer
            .position
            .into_iter()
            .chain(self.thresholds.iter().map(|t| t.position))
            .collect()
    }

    // ---------------- influence ----------------

    pub fn influence_at(&mut self, point: Vec2) -> f32 {
        self.influence_at_time(point, Instant::now())
    }

    /// Same as [`Self::influence_at`] with an explicit wall-clock reading.
    pub fn influence_at_time(&mut self, point: Vec2, now: Instant) -> f32 {
        self.max_influence_over_at(std::iter::once(point), now)
    }

    /// Max influence across `points`, stopping early at full influence.
    pub fn max_influence_over(&mut self, points: impl IntoIterator<Item = Vec2>) -> f32 {
        self.max_influence_over_at(points, Instant::now())
    }

    pub fn max_influence_over_at(
        &mut self,
        points: impl IntoIterator<Item = Vec2>,
        now: Instant,
    ) -> f32 {
        if !self.audio_ready {
            return 0.0;
        }
        self.pointer.advance_fade(now);
        let active = self.active_thresholds();
        if active.is_empty() {
            return 0.0;
        }
        let mut best = 0.0_f32;
        for point in points {
            for t in &active {
                let v = influence(point.distance(t.position), t.radius) * t.intensity;
                best = best.max(v);
            }
            if best >= 1.0 {
                break;
            }
        }
        best.clamp(0.0, 1.0)
    }

    fn active_thresholds(&self) -> SmallVec<[ActiveThreshold; 8]> {
        let mut active: SmallVec<[ActiveThreshold; 8]> = self
            .thresholds
            .iter()
            .map(|t| ActiveThreshold {
                position: t.position,
                radius: t.radius,
                intensity: t.intensity,
            })
            .collect();
        if let Some(mouse) = self.mouse_threshold() {
            active.push(mouse);
        }
        active
    }

    fn mouse_threshold(&self) -> Option<ActiveThreshold> {
        if !self.mouse_output_enabled
            || !self.audio_ready
            || self.pointer.fade <= POINTER_FADE_EPSILON
            || self.pointer.is_suppressed()
        {
            return None;
        }
        let position = self.pointer.position?;
        Some(ActiveThreshold {
            position,
            radius: self.radius,
            intensity: self.pointer.fade,
        })
    }
}

/// A [`ThresholdField`] shared between input handlers and the frame loop,
/// plus the observers of its radius and mouse-output settings.
///
/// Observers run after the field borrow is released, so a callback may read
/// the field back. A change made from inside a callback is applied but not
/// re-announced.
#[derive(Clone)]
pub struct SharedField {
    field: Rc<RefCell<ThresholdField>>,
    radius_observers: Rc<RefCell<Observers<f32>>>,
    mouse_output_observers: Rc<RefCell<Observers<bool>>>,
}

impl Default for SharedField {
    fn default() -> Self {
        Self::new(ThresholdField::default())
    }
}

impl SharedField {
    pub fn new(field: ThresholdField) -> Self {
        Self {
            field: Rc::new(RefCell::new(field)),
            radius_observers: Rc::new(RefCell::new(Observers::new("radius change"))),
            mouse_output_observers: Rc::new(RefCell::new(Observers::new(
                "mouse output change",
            ))),
        }
    }

    pub fn borrow(&self) -> Ref<'_, ThresholdField> {
        self.field.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ThresholdField> {
        self.field.borrow_mut()
    }

    pub fn set_radius(&self, value: f32) {
        let changed = {
            let mut field = self.field.borrow_mut();
            field.set_radius(value).then(|| field.radius())
        };
        if let Some(radius) = changed {
            notify(&self.radius_observers, radius);
        }
    }

    pub fn adjust_radius(&self, delta: f32) {
        let changed = {
            let mut field = self.field.borrow_mut();
            field.adjust_radius(delta).then(|| field.radius())
        };
        if let Some(radius) = changed {
            notify(&self.radius_observers, radius);
        }
    }

    pub fn set_mouse_output_enabled(&self, enabled: bool) {
        if self.field.borrow_mut().set_mouse_output_enabled(enabled) {
            notify(&self.mouse_output_observers, enabled);
        }
    }

    pub fn toggle_mouse_output(&self) {
        let enabled = !self.field.borrow().is_mouse_output_enabled();
        self.set_mouse_output_enabled(enabled);
    }

    pub fn on_radius_change(
        &self,
        callback: impl FnMut(&f32) -> anyhow::Result<()> + 'static,
    ) -> ObserverId {
        register(&self.radius_observers, callback)
    }

    pub fn on_mouse_output_change(
        &self,
        callback: impl FnMut(&bool) -> anyhow::Result<()> + 'static,
    ) -> ObserverId {
        register(&self.mouse_output_observers, callback)
    }

    pub fn remove_radius_observer(&self, id: ObserverId) -> bool {
        unregister(&self.radius_observers, id)
    }

    pub fn remove_mouse_output_observer(&self, id: ObserverId) -> bool {
        unregister(&self.mouse_output_observers, id)
    }
}

fn notify<T>(observers: &RefCell<Observers<T>>, value: T) {
    match observers.try_borrow_mut() {
        Ok(mut observers) => {
            observers.notify(&value);
        }
        Err(_) => log::warn!("[interaction] change made inside an observer was not re-announced"),
    }
}

fn register<T>(
    observers: &RefCell<Observers<T>>,
    callback: impl FnMut(&T) -> anyhow::Result<()> + 'static,
) -> ObserverId {
    observers.borrow_mut().register(callback)
}

fn unregister<T>(observers: &RefCell<Observers<T>>, id: ObserverId) -> bool {
    observers
        .try_borrow_mut()
        .map(|mut observers| observers.unregister(id))
        .unwrap_or(false)
}

fn clamp_radius(value: f32, fallback: f32) -> f32 {
    let v = if value.is_finite() { value } else { fallback };
    v.clamp(THRESHOLD_RADIUS_MIN, THRESHOLD_RADIUS_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn influence_is_linear_inside_radius() {
        assert_eq!(influence(0.0, 15.0), 1.0);
        assert_eq!(influence(15.0, 15.0), 0.0);
        assert_eq!(influence(16.0, 15.0), 0.0);
        assert!((influence(7.0, 15.0) - (1.0 - 7.0 / 15.0)).abs() < 1e-6);
        assert_eq!(influence(1.0, 0.0), 0.0);
    }

    #[test]
    fn factor_maps_influence_onto_range() {
        assert_eq!(factor_from_influence(0.0, 1.0, 0.25), 0.25);
        assert_eq!(factor_from_influence(0.4, 1.0, 2.0), 1.0);
        assert_eq!(factor_from_influence(0.4, 0.1, 0.5), 0.4);
    }

    #[test]
    fn radius_clamps_and_ignores_nan() {
        let mut f = ThresholdField::default();
        f.set_radius(f32::NAN);
        assert_eq!(f.radius(), 15.0);
        f.adjust_radius(-100.0);
        assert_eq!(f.radius(), 10.0);
    }
}
