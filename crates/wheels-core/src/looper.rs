use crate::constants::{GAIN_RAMP_SEC, LOOP_RELEASE_RAMP_SEC};
use crate::error::AudioError;
use crate::graph::{chain_through_gain, fade_out_and_stop, ramp_to, AudioBackend, NodeId, Param};
use crate::shape::ShapeId;
use crate::voice::gain_from_influence;
use fnv::FnvHashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Loop {
    pub source: NodeId,
    pub gain: NodeId,
    pub sample: String,
}

/// Same lifecycle as [`crate::VoiceManager`], backed by a looping buffer source.
#[derive(Debug, Default)]
pub struct LoopManager {
    loops: FnvHashMap<ShapeId, Loop>,
}

impl LoopManager {
    pub fn get(&self, shape: ShapeId) -> Option<&Loop> {
        self.loops.get(&shape)
    }

    pub fn active_count(&self) -> usize {
        self.loops.len()
    }

    /// Drive `shape`'s loop from `influence`.
    ///
    /// `resolve` supplies the sample path and decoded buffer when a loop has to be
    /// started. `None` means nothing is loaded yet: the call does nothing and the
    /// next frame asks again.
    pub fn update_loop<B, F>(
        &mut self,
        backend: &mut B,
        bus: NodeId,
        shape: ShapeId,
        influence: f32,
        resolve: F,
    ) -> Result<(), AudioError>
    where
        B: AudioBackend + ?Sized,
        F: FnOnce() -> Option<(String, B::Buffer)>,
    {
        if influence.is_nan() || influence <= 0.0 {
            return self.release(backend, shape);
        }

        let gain = match self.loops.get(&shape) {
            Some(active) => active.gain,
            None => {
                let Some((sample, buffer)) = resolve() else {
                    return Ok(());
                };
                let source = backend.create_buffer_source(&buffer, true)?;
                let gain = chain_through_gain(backend, source, 0.0, bus)?;
                let now = backend.current_time();
                backend.start(source, now)?;
                log::debug!("[audio] loop on for shape {}: {}", shape.0, sample);
                self.loops.insert(
                    shape,
                    Loop {
                        source,
                        gain,
                        sample,
                    },
                );
                gain
            }
        };

        ramp_to(
            backend,
            gain,
            Param::Gain,
            gain_from_influence(influence),
            GAIN_RAMP_SEC,
        )
    }

    pub fn release<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        shape: ShapeId,
    ) -> Result<(), AudioError> {
        let Some(active) = self.loops.remove(&shape) else {
            return Ok(());
        };
        fade_out_and_stop(backend, active.source, active.gain, LOOP_RELEASE_RAMP_SEC)?;
        log::debug!("[audio] loop off for shape {}", shape.0);
        Ok(())
    }

    pub fn release_all<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<(), AudioError> {
        let shapes: Vec<ShapeId> = self.loops.keys().copied().collect();
        for shape in shapes {
            self.release(backend, shape)?;
        }
        Ok(())
    }

    pub fn level<B: AudioBackend + ?Sized>(&self, backend: &B, shape: ShapeId) -> f32 {
        self.loops
            .get(&shape)
            .and_then(|l| backend.param_value(l.gain, Param::Gain).ok())
            .map_or(0.0, |v| v.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::{OfflineBackend, PcmBuffer};

    fn loaded() -> Option<(String, PcmBuffer)> {
        Some(("../SFX/hum.wav".to_string(), PcmBuffer::new(44_100.0, 88_200)))
    }

    #[test]
    fn missing_buffer_is_a_silent_retry() {
        let mut backend = OfflineBackend::default();
        let bus = backend.create_gain(1.0).unwrap();
        let mut loops = LoopManager::default();
        loops
            .update_loop(&mut backend, bus, ShapeId(1), 0.8, || None)
            .unwrap();
        assert_eq!(loops.active_count(), 0);
        assert_eq!(loops.level(&backend, ShapeId(1)), 0.0);

        loops
            .update_loop(&mut backend, bus, ShapeId(1), 0.8, loaded)
            .unwrap();
        assert_eq!(loops.get(ShapeId(1)).unwrap().sample, "../SFX/hum.wav");
    }

    #[test]
    fn level_follows_the_ramp_and_release() {
        let mut backend = OfflineBackend::default();
        let bus = backend.create_gain(1.0).unwrap();
        let mut loops = LoopManager::default();
        loops
            .update_loop(&mut backend, bus, ShapeId(5), 1.0, loaded)
            .unwrap();
        backend.advance(GAIN_RAMP_SEC);
        assert!((loops.level(&backend, ShapeId(5)) - 0.35).abs() < 1e-6);

        let source = loops.get(ShapeId(5)).unwrap().source;
        loops
            .update_loop(&mut backend, bus, ShapeId(5), 0.0, loaded)
            .unwrap();
        loops
            .update_loop(&mut backend, bus, ShapeId(5), -1.0, loaded)
            .unwrap();
        assert_eq!(backend.node(source).unwrap().stop_calls, 1);
        assert_eq!(loops.level(&backend, ShapeId(5)), 0.0);
    }
}
