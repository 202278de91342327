//! Stable shape identity and the per-shape side tables keyed by it.

use crate::constants::SOLID_RING_ACTIVE_INFLUENCE;
use crate::graph::Waveform;
use crate::library::SampleGroup;
use fnv::FnvHashMap;
use rand::prelude::*;

/// Integer id handed out when a shape is created. Never reused in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

#[derive(Debug, Default)]
pub struct ShapeIds {
    next: u32,
}

impl ShapeIds {
    pub fn allocate(&mut self) -> ShapeId {
        self.next += 1;
        ShapeId(self.next)
    }
}

/// Sound choices made once per shape and kept for its lifetime.
#[derive(Clone, Debug, Default)]
pub struct ShapeAudioAssignment {
    pub waveform: Option<Waveform>,
    pub samples: FnvHashMap<SampleGroup, String>,
}

#[derive(Debug, Default)]
pub struct ShapeAssignments {
    entries: FnvHashMap<ShapeId, ShapeAudioAssignment>,
}

impl ShapeAssignments {
    pub fn get(&self, shape: ShapeId) -> Option<&ShapeAudioAssignment> {
        self.entries.get(&shape)
    }

    fn entry(&mut self, shape: ShapeId) -> &mut ShapeAudioAssignment {
        self.entries.entry(shape).or_default()
    }

    pub fn waveform<R: Rng + ?Sized>(&mut self, shape: ShapeId, rng: &mut R) -> Waveform {
        *self
            .entry(shape)
            .waveform
            .get_or_insert_with(|| *Waveform::ALL.choose(rng).unwrap_or(&Waveform::Sine))
    }

    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        shape: ShapeId,
        group: SampleGroup,
        pool: &[String],
        rng: &mut R,
    ) -> Option<String> {
        let samples = &mut self.entry(shape).samples;
        if let Some(path) = samples.get(&group) {
            return Some(path.clone());
        }
        let path = pool.choose(rng)?.clone();
        samples.insert(group, path.clone());
        Some(path)
    }

    pub fn forget(&mut self, shape: ShapeId) -> bool {
        self.entries.remove(&shape).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-shape, per-group "currently touched" flags for edge-triggered percussion.
#[derive(Debug, Default)]
pub struct PercussionEdges {
    active: FnvHashMap<(ShapeId, SampleGroup), bool>,
    solid: FnvHashMap<ShapeId, bool>,
}

impl PercussionEdges {
    /// Record the latest touch state; true only on an inactive→active edge.
    pub fn update(&mut self, shape: ShapeId, group: SampleGroup, active: bool) -> bool {
        rising_edge(self.active.entry((shape, group)).or_insert(false), active)
    }

    /// Solid rings count as touched above a small influence floor. They are
    /// tracked like the other edges but have no sample of their own.
    pub fn update_solid(&mut self, shape: ShapeId, influence: f32) -> bool {
        rising_edge(
            self.solid.entry(shape).or_insert(false),
            influence > SOLID_RING_ACTIVE_INFLUENCE,
        )
    }

    pub fn is_active(&self, shape: ShapeId, group: SampleGroup) -> bool {
        self.active.get(&(shape, group)).copied().unwrap_or(false)
    }

    pub fn is_solid_active(&self, shape: ShapeId) -> bool {
        self.solid.get(&shape).copied().unwrap_or(false)
    }

    pub fn forget(&mut self, shape: ShapeId) {
        self.active.retain(|(s, _), _| *s != shape);
        self.solid.remove(&shape);
    }
}

fn rising_edge(flag: &mut bool, active: bool) -> bool {
    let rising = active && !*flag;
    *flag = active;
    rising
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn waveform_is_chosen_once() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut a = ShapeAssignments::default();
        let first = a.waveform(ShapeId(1), &mut rng);
        for _ in 0..20 {
            assert_eq!(a.waveform(ShapeId(1), &mut rng), first);
        }
    }

    #[test]
    fn sample_choice_is_stable_per_group() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut a = ShapeAssignments::default();
        let pool: Vec<String> = (0..8).map(|i| format!("kick_{i}.wav")).collect();
        let first = a.sample(ShapeId(4), SampleGroup::Kick, &pool, &mut rng);
        assert!(first.is_some());
        for _ in 0..20 {
            assert_eq!(a.sample(ShapeId(4), SampleGroup::Kick, &pool, &mut rng), first);
        }
        assert_eq!(a.sample(ShapeId(4), SampleGroup::Snare, &[], &mut rng), None);
    }

    #[test]
    fn solid_ring_edge_needs_more_than_a_graze() {
        let mut edges = PercussionEdges::default();
        assert!(!edges.update_solid(ShapeId(1), 0.05));
        assert!(edges.update_solid(ShapeId(1), 0.2));
        assert!(!edges.update_solid(ShapeId(1), 0.9));
        assert!(edges.is_solid_active(ShapeId(1)));
        edges.forget(ShapeId(1));
        assert!(!edges.is_solid_active(ShapeId(1)));
    }

    #[test]
    fn ids_are_sequential() {
        let mut ids = ShapeIds::default();
        assert_eq!(ids.allocate(), ShapeId(1));
        assert_eq!(ids.allocate(), ShapeId(2));
    }
}
