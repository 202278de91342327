//! The scheduling seam between the engine and whatever renders audio.
//!
//! The engine never touches samples itself. It creates nodes, wires them, and
//! issues automation (set, cancel, linear ramp) against the backend clock. A
//! WebAudio context implements this in the web crate; [`crate::OfflineBackend`]
//! records the same calls for tests and headless runs.

use crate::constants::{RELEASE_STOP_SEC, SILENCE_GAIN};
use crate::error::AudioError;
use rand::Rng;

/// Opaque handle to a node owned by an [`AudioBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Automatable parameters the engine drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    Gain,
    Frequency,
    DelayTime,
}

impl Param {
    pub fn name(self) -> &'static str {
        match self {
            Param::Gain => "gain",
            Param::Frequency => "frequency",
            Param::DelayTime => "delayTime",
        }
    }
}

/// Basic oscillator shape for procedural voices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Saw,
}

impl Waveform {
    /// The fixed set a shape's waveform is drawn from.
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Saw,
    ];
}

/// Multi-channel impulse response generated on the CPU for the convolver.
#[derive(Clone, Debug)]
pub struct ImpulseResponse {
    pub sample_rate: f32,
    pub channels: Vec<Vec<f32>>,
}

impl ImpulseResponse {
    /// Decaying white noise: `(rand·2 − 1) · (1 − i/len)^decay` per channel.
    pub fn decaying_noise<R: Rng + ?Sized>(
        sample_rate: f32,
        seconds: f32,
        decay: f32,
        channels: usize,
        rng: &mut R,
    ) -> Self {
        let len = (sample_rate * seconds).max(0.0) as usize;
        let channels = (0..channels)
            .map(|_| {
                (0..len)
                    .map(|i| {
                        let envelope = (1.0 - i as f32 / len as f32).powf(decay);
                        (rng.gen::<f32>() * 2.0 - 1.0) * envelope
                    })
                    .collect()
            })
            .collect();
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Node factory, routing and automation on an audio-rendering clock.
///
/// All times are absolute seconds on [`AudioBackend::current_time`]. Calls never
/// block; ramps run on the backend's own schedule.
pub trait AudioBackend {
    /// Decoded sample data as the backend stores it.
    type Buffer: Clone;

    fn current_time(&self) -> f64;
    fn sample_rate(&self) -> f32;
    fn destination(&self) -> NodeId;

    fn create_gain(&mut self, value: f32) -> Result<NodeId, AudioError>;
    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency_hz: f32,
    ) -> Result<NodeId, AudioError>;
    fn create_buffer_source(
        &mut self,
        buffer: &Self::Buffer,
        looping: bool,
    ) -> Result<NodeId, AudioError>;
    fn create_delay(&mut self, max_delay_sec: f64, delay_sec: f32) -> Result<NodeId, AudioError>;
    fn create_convolver(&mut self, impulse: &ImpulseResponse) -> Result<NodeId, AudioError>;
    fn create_allpass(&mut self, frequency_hz: f32) -> Result<NodeId, AudioError>;

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), AudioError>;
    /// Route `from` into an automatable parameter of `to` (LFO modulation).
    fn connect_param(&mut self, from: NodeId, to: NodeId, param: Param) -> Result<(), AudioError>;

    fn set_value(&mut self, node: NodeId, param: Param, value: f32) -> Result<(), AudioError>;
    fn set_value_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        time: f64,
    ) -> Result<(), AudioError>;
    fn cancel_scheduled_values(
        &mut self,
        node: NodeId,
        param: Param,
        time: f64,
    ) -> Result<(), AudioError>;
    fn linear_ramp_to_value_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        time: f64,
    ) -> Result<(), AudioError>;
    /// Value of `param` at the current clock, including in-flight ramps.
    fn param_value(&self, node: NodeId, param: Param) -> Result<f32, AudioError>;

    fn start(&mut self, node: NodeId, when: f64) -> Result<(), AudioError>;
    fn stop(&mut self, node: NodeId, when: f64) -> Result<(), AudioError>;
    /// Drop the engine's handle. Anything already scheduled still plays out.
    fn release(&mut self, node: NodeId);
}

/// Cancel pending automation on `param` and ramp linearly to `value` over `seconds`.
pub fn ramp_to<B: AudioBackend + ?Sized>(
    backend: &mut B,
    node: NodeId,
    param: Param,
    value: f32,
    seconds: f64,
) -> Result<(), AudioError> {
    let now = backend.current_time();
    backend.cancel_scheduled_values(node, param, now)?;
    backend.linear_ramp_to_value_at_time(node, param, value, now + seconds)
}

/// Create `source -> gain -> destination` with the gain starting at `initial`.
pub fn chain_through_gain<B: AudioBackend + ?Sized>(
    backend: &mut B,
    source: NodeId,
    initial: f32,
    destination: NodeId,
) -> Result<NodeId, AudioError> {
    let gain = backend.create_gain(initial)?;
    backend.connect(source, gain)?;
    backend.connect(gain, destination)?;
    Ok(gain)
}

/// Fade `gain` to silence, stop `source` shortly after and drop both handles.
/// The stop is issued even when the fade fails; the first error is returned.
pub fn fade_out_and_stop<B: AudioBackend + ?Sized>(
    backend: &mut B,
    source: NodeId,
    gain: NodeId,
    ramp_sec: f64,
) -> Result<(), AudioError> {
    let now = backend.current_time();
    let faded = ramp_to(backend, gain, Param::Gain, SILENCE_GAIN, ramp_sec);
    let stopped = backend.stop(source, now + RELEASE_STOP_SEC);
    backend.release(source);
    backend.release(gain);
    faded.and(stopped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn impulse_has_expected_shape_and_decays() {
        let mut rng = StdRng::seed_from_u64(7);
        let ir = ImpulseResponse::decaying_noise(1000.0, 2.2, 3.0, 2, &mut rng);
        assert_eq!(ir.channels.len(), 2);
        assert_eq!(ir.len(), 2200);
        for ch in &ir.channels {
            assert!(ch.iter().all(|s| (-1.0..=1.0).contains(s)));
            let head: f32 = ch[..200].iter().map(|s| s.abs()).sum();
            let tail: f32 = ch[ch.len() - 200..].iter().map(|s| s.abs()).sum();
            assert!(tail < head, "tail energy {tail} should be below head {head}");
        }
    }

    #[test]
    fn failed_fade_still_stops_the_source() {
        let mut backend = crate::OfflineBackend::default();
        let out = backend.destination();
        let osc = backend.create_oscillator(Waveform::Sine, 220.0).unwrap();
        let gain = chain_through_gain(&mut backend, osc, 0.5, out).unwrap();
        backend.start(osc, 0.0).unwrap();
        // An oscillator has no gain param, so the fade is rejected.
        let err = fade_out_and_stop(&mut backend, osc, osc, 0.1).unwrap_err();
        assert!(matches!(err, AudioError::NoSuchParam { .. }), "{err:?}");
        let node = backend.node(osc).unwrap();
        assert_eq!(node.stop_at, Some(RELEASE_STOP_SEC));
        assert_eq!(node.stop_calls, 1);
        assert!(node.released);
        assert!(!backend.node(gain).unwrap().released);
    }

    #[test]
    fn fade_out_ramps_then_stops() {
        let mut backend = crate::OfflineBackend::default();
        let out = backend.destination();
        let osc = backend.create_oscillator(Waveform::Sine, 220.0).unwrap();
        let gain = chain_through_gain(&mut backend, osc, 0.5, out).unwrap();
        backend.start(osc, 0.0).unwrap();
        fade_out_and_stop(&mut backend, osc, gain, 0.1).unwrap();
        backend.advance(0.2);
        assert!(backend.param_value(gain, Param::Gain).unwrap() <= SILENCE_GAIN + 1e-6);
        assert_eq!(backend.node(osc).unwrap().stop_at, Some(RELEASE_STOP_SEC));
    }
}
