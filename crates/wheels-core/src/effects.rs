//! Four parallel effect sends tapped off the master input.
//!
//! Each chain ends in a wet gain that starts silent and is driven once per frame
//! from the connector influence gathered in a [`FrameAccumulator`].

use crate::constants::*;
use crate::error::{AudioError, ParseError};
use crate::frame::FrameAccumulator;
use crate::graph::{ramp_to, AudioBackend, ImpulseResponse, NodeId, Param, Waveform};
use crate::mixer::BusMixer;
use rand::Rng;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Flange,
    Reverb,
    Delay,
    Phaser,
}

impl EffectKind {
    pub const COUNT: usize = 4;

    pub const ALL: [EffectKind; EffectKind::COUNT] = [
        EffectKind::Flange,
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Phaser,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Flange => "flange",
            EffectKind::Reverb => "reverb",
            EffectKind::Delay => "delay",
            EffectKind::Phaser => "phaser",
        }
    }

    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or(EffectKind::Flange)
    }

    fn wet_scale(self) -> f32 {
        match self {
            EffectKind::Flange => FLANGE_WET_SCALE,
            EffectKind::Reverb => REVERB_WET_SCALE,
            EffectKind::Delay => DELAY_WET_SCALE,
            EffectKind::Phaser => PHASER_WET_SCALE,
        }
    }
}

impl FromStr for EffectKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ParseError::Effect(s.to_string()))
    }
}

#[derive(Debug)]
struct EffectChain {
    wet: NodeId,
    lfo: Option<NodeId>,
}

#[derive(Debug)]
pub struct EffectRack {
    chains: [EffectChain; EffectKind::COUNT],
    overrides: [f32; EffectKind::COUNT],
    levels: [f32; EffectKind::COUNT],
    max_level: f32,
}

impl EffectRack {
    pub fn build<B: AudioBackend + ?Sized, R: Rng + ?Sized>(
        backend: &mut B,
        mixer: &BusMixer,
        rng: &mut R,
    ) -> Result<Self, AudioError> {
        let input = mixer.master_input();
        let output = mixer.master_output();
        let chains = [
            build_flange(backend, input, output)?,
            build_reverb(backend, input, output, rng)?,
            build_delay(backend, input, output)?,
            build_phaser(backend, input, output)?,
        ];
        Ok(Self {
            chains,
            overrides: [1.0; EffectKind::COUNT],
            levels: [0.0; EffectKind::COUNT],
            max_level: 1.0,
        })
    }

    pub fn wet_node(&self, kind: EffectKind) -> NodeId {
        self.chains[kind.index()].wet
    }

    pub fn lfo_node(&self, kind: EffectKind) -> Option<NodeId> {
        self.chains[kind.index()].lfo
    }

    /// Per-chain user override in [0, 1]; applied on the next frame.
    pub fn set_override(&mut self, kind: EffectKind, value: f32) {
        if value.is_finite() {
            self.overrides[kind.index()] = value.clamp(0.0, 1.0);
        }
    }

    pub fn override_level(&self, kind: EffectKind) -> f32 {
        self.overrides[kind.index()]
    }

    pub fn set_max_level(&mut self, value: f32) {
        if value.is_finite() {
            self.max_level = value.clamp(0.0, 1.0);
        }
    }

    pub fn max_level(&self) -> f32 {
        self.max_level
    }

    /// Send level last applied to `kind`, before the chain's wet scaling.
    pub fn level(&self, kind: EffectKind) -> f32 {
        self.levels[kind.index()]
    }

    pub fn apply_frame<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        frame: &FrameAccumulator,
    ) -> Result<(), AudioError> {
        for kind in EffectKind::ALL {
            let level =
                (frame.get(kind) * self.max_level * self.overrides[kind.index()]).min(1.0);
            self.levels[kind.index()] = level;
            ramp_to(
                backend,
                self.wet_node(kind),
                Param::Gain,
                level * kind.wet_scale(),
                GAIN_RAMP_SEC,
            )?;
        }
        Ok(())
    }
}

fn wet_into<B: AudioBackend + ?Sized>(
    backend: &mut B,
    from: NodeId,
    output: NodeId,
) -> Result<NodeId, AudioError> {
    let wet = backend.create_gain(0.0)?;
    backend.connect(from, wet)?;
    backend.connect(wet, output)?;
    Ok(wet)
}

/// Delay with a feedback gain looped back into itself.
fn feedback_delay<B: AudioBackend + ?Sized>(
    backend: &mut B,
    max_delay_sec: f64,
    delay_sec: f32,
    feedback: f32,
) -> Result<NodeId, AudioError> {
    let delay = backend.create_delay(max_delay_sec, delay_sec)?;
    let fb = backend.create_gain(feedback)?;
    backend.connect(delay, fb)?;
    backend.connect(fb, delay)?;
    Ok(delay)
}

/// Sine LFO scaled by `depth` into `param` of `target`, started immediately.
fn modulate<B: AudioBackend + ?Sized>(
    backend: &mut B,
    target: NodeId,
    param: Param,
    rate_hz: f32,
    depth: f32,
) -> Result<NodeId, AudioError> {
    let lfo = backend.create_oscillator(Waveform::Sine, rate_hz)?;
    let depth_gain = backend.create_gain(depth)?;
    backend.connect(lfo, depth_gain)?;
    backend.connect_param(depth_gain, target, param)?;
    let now = backend.current_time();
    backend.start(lfo, now)?;
    Ok(lfo)
}

fn build_flange<B: AudioBackend + ?Sized>(
    backend: &mut B,
    input: NodeId,
    output: NodeId,
) -> Result<EffectChain, AudioError> {
    let delay = feedback_delay(backend, FLANGE_MAX_DELAY_SEC, FLANGE_DELAY_SEC, FLANGE_FEEDBACK)?;
    let wet = wet_into(backend, delay, output)?;
    backend.connect(input, delay)?;
    let lfo = modulate(
        backend,
        delay,
        Param::DelayTime,
        FLANGE_LFO_HZ,
        FLANGE_LFO_DEPTH_SEC,
    )?;
    Ok(EffectChain {
        wet,
        lfo: Some(lfo),
    })
}

fn build_reverb<B: AudioBackend + ?Sized, R: Rng + ?Sized>(
    backend: &mut B,
    input: NodeId,
    output: NodeId,
    rng: &mut R,
) -> Result<EffectChain, AudioError> {
    let impulse = ImpulseResponse::decaying_noise(
        backend.sample_rate(),
        REVERB_IR_SECONDS,
        REVERB_IR_DECAY,
        REVERB_IR_CHANNELS,
        rng,
    );
    let convolver = backend.create_convolver(&impulse)?;
    backend.connect(input, convolver)?;
    let wet = wet_into(backend, convolver, output)?;
    Ok(EffectChain { wet, lfo: None })
}

fn build_delay<B: AudioBackend + ?Sized>(
    backend: &mut B,
    input: NodeId,
    output: NodeId,
) -> Result<EffectChain, AudioError> {
    let delay = feedback_delay(backend, DELAY_MAX_DELAY_SEC, DELAY_TIME_SEC, DELAY_FEEDBACK)?;
    backend.connect(input, delay)?;
    let wet = wet_into(backend, delay, output)?;
    Ok(EffectChain { wet, lfo: None })
}

fn build_phaser<B: AudioBackend + ?Sized>(
    backend: &mut B,
    input: NodeId,
    output: NodeId,
) -> Result<EffectChain, AudioError> {
    let filter = backend.create_allpass(PHASER_CENTER_HZ)?;
    backend.connect(input, filter)?;
    let wet = wet_into(backend, filter, output)?;
    let lfo = modulate(
        backend,
        filter,
        Param::Frequency,
        PHASER_LFO_HZ,
        PHASER_LFO_DEPTH_HZ,
    )?;
    Ok(EffectChain {
        wet,
        lfo: Some(lfo),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::BusName;
    use crate::offline::{Connection, NodeKind, OfflineBackend};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rack() -> (OfflineBackend, BusMixer, EffectRack) {
        let mut backend = OfflineBackend::new(1000.0);
        let mixer = BusMixer::build(&mut backend, &[(BusName::Master, 1.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let rack = EffectRack::build(&mut backend, &mixer, &mut rng).unwrap();
        (backend, mixer, rack)
    }

    #[test]
    fn every_chain_returns_into_master_output() {
        let (backend, mixer, rack) = rack();
        for kind in EffectKind::ALL {
            let wet = rack.wet_node(kind);
            assert!(backend.is_connected(wet, mixer.master_output()), "{kind:?}");
            assert!(backend.reaches(mixer.master_input(), wet), "{kind:?}");
            assert_eq!(backend.param_value(wet, Param::Gain).unwrap(), 0.0);
        }
        assert_eq!(
            backend.count_nodes(|k| matches!(k, NodeKind::Convolver { impulse_len: 2200 })),
            1
        );
    }

    #[test]
    fn lfos_modulate_their_targets() {
        let (backend, _, rack) = rack();
        let lfo = rack.lfo_node(EffectKind::Phaser).unwrap();
        let depth = backend
            .connections_from(lfo)
            .find_map(|c| match c {
                Connection::Node(n) => Some(n),
                _ => None,
            })
            .unwrap();
        assert!(backend
            .connections_from(depth)
            .any(|c| matches!(c, Connection::Param(_, Param::Frequency))));
        assert_eq!(backend.node(lfo).unwrap().started_at, Some(0.0));
        assert!(rack.lfo_node(EffectKind::Reverb).is_none());
    }

    #[test]
    fn level_is_product_of_frame_max_and_override() {
        let (mut backend, _, mut rack) = rack();
        let mut frame = FrameAccumulator::default();
        frame.accumulate(EffectKind::Reverb, 0.5);
        frame.accumulate(EffectKind::Delay, 1.0);
        rack.set_override(EffectKind::Delay, 0.5);
        rack.set_override(EffectKind::Phaser, 3.0);
        assert_eq!(rack.override_level(EffectKind::Phaser), 1.0);

        rack.apply_frame(&mut backend, &frame).unwrap();
        assert_eq!(rack.level(EffectKind::Reverb), 0.5);
        assert_eq!(rack.level(EffectKind::Delay), 0.5);
        assert_eq!(rack.level(EffectKind::Flange), 0.0);

        backend.advance(GAIN_RAMP_SEC);
        let reverb = backend
            .param_value(rack.wet_node(EffectKind::Reverb), Param::Gain)
            .unwrap();
        assert!((reverb - 0.6).abs() < 1e-5);
        let delay = backend
            .param_value(rack.wet_node(EffectKind::Delay), Param::Gain)
            .unwrap();
        assert!((delay - 0.4).abs() < 1e-5);
    }

    #[test]
    fn global_max_scales_every_chain() {
        let (mut backend, _, mut rack) = rack();
        let mut frame = FrameAccumulator::default();
        frame.accumulate(EffectKind::Flange, 0.8);
        rack.set_max_level(0.5);
        rack.apply_frame(&mut backend, &frame).unwrap();
        assert!((rack.level(EffectKind::Flange) - 0.4).abs() < 1e-6);
    }
}
