use crate::constants::{BUS_RAMP_SEC, MASTER_RAMP_SEC};
use crate::error::{AudioError, ParseError};
use crate::graph::{ramp_to, AudioBackend, NodeId, Param};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BusName {
    Master,
    Synth,
    Kick,
    Snare,
    Hihat,
    Sfx,
}

impl BusName {
    pub const ALL: [BusName; 6] = [
        BusName::Master,
        BusName::Synth,
        BusName::Kick,
        BusName::Snare,
        BusName::Hihat,
        BusName::Sfx,
    ];

    pub const INSTRUMENTS: [BusName; 5] = [
        BusName::Synth,
        BusName::Kick,
        BusName::Snare,
        BusName::Hihat,
        BusName::Sfx,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BusName::Master => "master",
            BusName::Synth => "synth",
            BusName::Kick => "kick",
            BusName::Snare => "snare",
            BusName::Hihat => "hihat",
            BusName::Sfx => "sfx",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn ramp_sec(self) -> f64 {
        match self {
            BusName::Master => MASTER_RAMP_SEC,
            _ => BUS_RAMP_SEC,
        }
    }
}

impl FromStr for BusName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BusName::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| ParseError::Bus(s.to_string()))
    }
}

/// Instrument buses -> master input -> dry -> master output -> destination.
/// The effect rack taps the master input and returns into the master output.
#[derive(Debug)]
pub struct BusMixer {
    master_input: NodeId,
    master_output: NodeId,
    dry: NodeId,
    gains: [NodeId; 6],
    levels: [f32; 6],
}

impl BusMixer {
    pub fn build<B: AudioBackend + ?Sized>(
        backend: &mut B,
        initial: &[(BusName, f32)],
    ) -> Result<Self, AudioError> {
        let mut levels = [0.0_f32; 6];
        for &(bus, level) in initial {
            levels[bus.index()] = clamp_level(level).unwrap_or(0.0);
        }

        let master_input = backend.create_gain(1.0)?;
        let master_output = backend.create_gain(levels[BusName::Master.index()])?;
        let destination = backend.destination();
        backend.connect(master_output, destination)?;

        let dry = backend.create_gain(1.0)?;
        backend.connect(master_input, dry)?;
        backend.connect(dry, master_output)?;

        let mut gains = [master_output; 6];
        for bus in BusName::INSTRUMENTS {
            let gain = backend.create_gain(levels[bus.index()])?;
            backend.connect(gain, master_input)?;
            gains[bus.index()] = gain;
        }

        Ok(Self {
            master_input,
            master_output,
            dry,
            gains,
            levels,
        })
    }

    pub fn master_input(&self) -> NodeId {
        self.master_input
    }

    pub fn master_output(&self) -> NodeId {
        self.master_output
    }

    pub fn dry(&self) -> NodeId {
        self.dry
    }

    pub fn bus(&self, bus: BusName) -> NodeId {
        self.gains[bus.index()]
    }

    pub fn level(&self, bus: BusName) -> f32 {
        self.levels[bus.index()]
    }

    /// Clamp to [0, 1], store, and ramp the bus gain (200 ms for master, 100 ms otherwise).
    pub fn set_level<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        bus: BusName,
        value: f32,
    ) -> Result<(), AudioError> {
        let Some(level) = clamp_level(value) else {
            return Ok(());
        };
        self.levels[bus.index()] = level;
        ramp_to(backend, self.bus(bus), Param::Gain, level, bus.ramp_sec())
    }

    pub fn set_level_by_name<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        value: f32,
    ) -> Result<bool, AudioError> {
        match name.parse::<BusName>() {
            Ok(bus) => self.set_level(backend, bus, value).map(|_| true),
            Err(e) => {
                log::debug!("[audio] {}", e);
                Ok(false)
            }
        }
    }

    pub fn apply_levels<B: AudioBackend + ?Sized>(&self, backend: &mut B) -> Result<(), AudioError> {
        for bus in BusName::ALL {
            ramp_to(
                backend,
                self.bus(bus),
                Param::Gain,
                self.level(bus),
                bus.ramp_sec(),
            )?;
        }
        Ok(())
    }
}

fn clamp_level(value: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}
