use crate::constants::{GAIN_RAMP_SEC, VOICE_GAIN_CEILING, VOICE_GAIN_CURVE, VOICE_RELEASE_RAMP_SEC};
use crate::error::AudioError;
use crate::graph::{
    chain_through_gain, fade_out_and_stop, ramp_to, AudioBackend, NodeId, Param, Waveform,
};
use crate::scale::midi_to_hz;
use crate::shape::ShapeId;
use fnv::FnvHashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneChoice {
    pub waveform: Waveform,
    pub midi: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Voice {
    pub oscillator: NodeId,
    pub gain: NodeId,
    pub waveform: Waveform,
    pub midi: i32,
    pub frequency_hz: f32,
}

/// `min(0.35, clamp01(x)^1.2 · 0.35)`: gentle curve so light touches stay quiet.
pub fn gain_from_influence(influence: f32) -> f32 {
    let x = if influence.is_finite() {
        influence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (x.powf(VOICE_GAIN_CURVE) * VOICE_GAIN_CEILING).min(VOICE_GAIN_CEILING)
}

#[derive(Debug, Default)]
pub struct VoiceManager {
    voices: FnvHashMap<ShapeId, Voice>,
}

impl VoiceManager {
    pub fn voice(&self, shape: ShapeId) -> Option<&Voice> {
        self.voices.get(&shape)
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Drive `shape`'s voice from `influence`.
    ///
    /// `choose` is only called when a new oscillator is needed. Influence at or
    /// below zero releases the voice; a later positive call allocates a fresh one.
    pub fn update_tone<B, F>(
        &mut self,
        backend: &mut B,
        bus: NodeId,
        shape: ShapeId,
        influence: f32,
        choose: F,
    ) -> Result<(), AudioError>
    where
        B: AudioBackend + ?Sized,
        F: FnOnce() -> ToneChoice,
    {
        if influence.is_nan() || influence <= 0.0 {
            return self.release(backend, shape);
        }

        let gain = match self.voices.get(&shape) {
            Some(voice) => voice.gain,
            None => {
                let voice = start_voice(backend, bus, choose())?;
                log::debug!(
                    "[audio] voice on for shape {} ({:?}, midi {}, {:.1} Hz)",
                    shape.0,
                    voice.waveform,
                    voice.midi,
                    voice.frequency_hz
                );
                let gain = voice.gain;
                self.voices.insert(shape, voice);
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

    /// Fade out and schedule the stop. No-op if the shape has no voice.
    pub fn release<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        shape: ShapeId,
    ) -> Result<(), AudioError> {
        let Some(voice) = self.voices.remove(&shape) else {
            return Ok(());
        };
        fade_out_and_stop(backend, voice.oscillator, voice.gain, VOICE_RELEASE_RAMP_SEC)?;
        log::debug!("[audio] voice off for shape {}", shape.0);
        Ok(())
    }

    pub fn release_all<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<(), AudioError> {
        let shapes: Vec<ShapeId> = self.voices.keys().copied().collect();
        for shape in shapes {
            self.release(backend, shape)?;
        }
        Ok(())
    }
}

fn start_voice<B: AudioBackend + ?Sized>(
    backend: &mut B,
    bus: NodeId,
    choice: ToneChoice,
) -> Result<Voice, AudioError> {
    let frequency_hz = midi_to_hz(choice.midi as f32);
    let oscillator = backend.create_oscillator(choice.waveform, frequency_hz)?;
    let gain = chain_through_gain(backend, oscillator, 0.0, bus)?;
    let now = backend.current_time();
    backend.start(oscillator, now)?;
    Ok(Voice {
        oscillator,
        gain,
        waveform: choice.waveform,
        midi: choice.midi,
        frequency_hz,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RELEASE_STOP_SEC, SILENCE_GAIN};
    use crate::offline::{Automation, OfflineBackend};

    const A4: ToneChoice = ToneChoice {
        waveform: Waveform::Triangle,
        midi: 69,
    };

    #[test]
    fn gain_curve_is_capped_and_monotonic() {
        assert_eq!(gain_from_influence(0.0), 0.0);
        assert!((gain_from_influence(1.0) - 0.35).abs() < 1e-6);
        assert!((gain_from_influence(4.0) - 0.35).abs() < 1e-6);
        assert_eq!(gain_from_influence(f32::NAN), 0.0);
        let mut prev = 0.0;
        for i in 1..=20 {
            let g = gain_from_influence(i as f32 / 20.0);
            assert!(g >= prev);
            prev = g;
        }
    }

    #[test]
    fn first_touch_starts_an_oscillator_into_the_bus() {
        let mut backend = OfflineBackend::default();
        let bus = backend.create_gain(1.0).unwrap();
        let mut voices = VoiceManager::default();
        voices
            .update_tone(&mut backend, bus, ShapeId(1), 0.5, || A4)
            .unwrap();

        let voice = voices.voice(ShapeId(1)).unwrap().clone();
        assert!((voice.frequency_hz - 440.0).abs() < 1e-3);
        assert!(backend.is_connected(voice.oscillator, voice.gain));
        assert!(backend.is_connected(voice.gain, bus));
        assert_eq!(backend.node(voice.oscillator).unwrap().started_at, Some(0.0));

        backend.advance(GAIN_RAMP_SEC);
        let g = backend.param_value(voice.gain, Param::Gain).unwrap();
        assert!((g - gain_from_influence(0.5)).abs() < 1e-6);
    }

    #[test]
    fn choice_is_only_consulted_on_creation() {
        let mut backend = OfflineBackend::default();
        let bus = backend.create_gain(1.0).unwrap();
        let mut voices = VoiceManager::default();
        let mut calls = 0;
        for _ in 0..5 {
            voices
                .update_tone(&mut backend, bus, ShapeId(2), 0.3, || {
                    calls += 1;
                    A4
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        assert_eq!(voices.active_count(), 1);
    }

    #[test]
    fn release_schedules_fade_then_stop() {
        let mut backend = OfflineBackend::default();
        let bus = backend.create_gain(1.0).unwrap();
        let mut voices = VoiceManager::default();
        voices
            .update_tone(&mut backend, bus, ShapeId(3), 1.0, || A4)
            .unwrap();
        let voice = voices.voice(ShapeId(3)).unwrap().clone();
        backend.advance(0.5);

        voices
            .update_tone(&mut backend, bus, ShapeId(3), 0.0, || A4)
            .unwrap();
        assert!(voices.voice(ShapeId(3)).is_none());

        let osc = backend.node(voice.oscillator).unwrap();
        assert_eq!(osc.stop_calls, 1);
        assert!((osc.stop_at.unwrap() - (0.5 + RELEASE_STOP_SEC)).abs() < 1e-9);
        let last = *backend
            .node(voice.gain)
            .unwrap()
            .automation(Param::Gain)
            .last()
            .unwrap();
        assert_eq!(
            last,
            Automation::LinearRamp {
                value: SILENCE_GAIN,
                time: 0.5 + VOICE_RELEASE_RAMP_SEC,
            }
        );
    }
}
