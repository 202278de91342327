use crate::constants::*;
use crate::mixer::BusName;

/// Construction-time settings for [`crate::AudioEngine`] and [`crate::ThresholdField`].
///
/// - `seed` feeds the engine RNG (scale, waveform and sample picks, impulse noise)
/// - `bus_levels` are the initial levels applied when audio is enabled
/// - `max_effect_level` is the global multiplier on every effect send
/// - `percussion_velocity` is used when a trigger does not specify one
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub seed: u64,
    pub bus_levels: [(BusName, f32); 6],
    pub max_effect_level: f32,
    pub percussion_velocity: f32,
    pub threshold_radius: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_0F_A11_u64,
            bus_levels: [
                (BusName::Master, MASTER_LEVEL_DEFAULT),
                (BusName::Synth, INSTRUMENT_LEVEL_DEFAULT),
                (BusName::Kick, INSTRUMENT_LEVEL_DEFAULT),
                (BusName::Snare, INSTRUMENT_LEVEL_DEFAULT),
                (BusName::Hihat, INSTRUMENT_LEVEL_DEFAULT),
                (BusName::Sfx, INSTRUMENT_LEVEL_DEFAULT),
            ],
            max_effect_level: 1.0,
            percussion_velocity: PERCUSSION_VELOCITY_DEFAULT,
            threshold_radius: THRESHOLD_RADIUS_DEFAULT,
        }
    }
}

impl EngineConfig {
    /// Same defaults with a different RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}
