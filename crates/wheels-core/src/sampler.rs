use crate::error::AudioError;
use crate::graph::{chain_through_gain, AudioBackend, NodeId};
use crate::library::SampleGroup;

/// Fires one-shot samples. Nothing is tracked after `start`; sustain and edge
/// detection are the caller's business.
#[derive(Debug, Default)]
pub struct SampleTriggerManager {
    fired: u64,
}

impl SampleTriggerManager {
    /// `buffer -> gain(velocity) -> bus`, started now. Velocity is clamped to [0, 1].
    pub fn trigger<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        bus: NodeId,
        group: SampleGroup,
        buffer: &B::Buffer,
        velocity: f32,
    ) -> Result<NodeId, AudioError> {
        let velocity = if velocity.is_finite() {
            velocity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let source = backend.create_buffer_source(buffer, false)?;
        let gain = chain_through_gain(backend, source, velocity, bus)?;
        let now = backend.current_time();
        backend.start(source, now)?;
        backend.release(source);
        backend.release(gain);
        self.fired += 1;
        log::trace!("[audio] {} hit at velocity {:.2}", group.name(), velocity);
        Ok(source)
    }

    /// One-shots started so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Param;
    use crate::offline::{NodeKind, OfflineBackend, PcmBuffer};

    #[test]
    fn each_trigger_is_an_independent_source() {
        let mut backend = OfflineBackend::default();
        let bus = backend.create_gain(1.0).unwrap();
        let buffer = PcmBuffer::new(44_100.0, 4410);
        let mut sampler = SampleTriggerManager::default();

        let a = sampler
            .trigger(&mut backend, bus, SampleGroup::Kick, &buffer, 0.8)
            .unwrap();
        let b = sampler
            .trigger(&mut backend, bus, SampleGroup::Kick, &buffer, 1.5)
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(sampler.fired(), 2);
        assert_eq!(
            backend.count_nodes(|k| matches!(k, NodeKind::BufferSource { looping: false, .. })),
            2
        );
        assert!(backend.reaches(b, bus));

        let gain = backend
            .connections_from(b)
            .find_map(|c| match c {
                crate::offline::Connection::Node(n) => Some(n),
                _ => None,
            })
            .unwrap();
        assert_eq!(backend.param_value(gain, Param::Gain).unwrap(), 1.0);
    }
}
