//! Timing and tuning constants for the interaction-driven audio engine.
//!
//! Ramp durations are in seconds on the audio clock. Levels are linear gain.

// Threshold field
pub const THRESHOLD_RADIUS_MIN: f32 = 10.0;
pub const THRESHOLD_RADIUS_MAX: f32 = 125.0;
pub const THRESHOLD_RADIUS_DEFAULT: f32 = 15.0;
pub const THRESHOLD_RADIUS_STEP: f32 = 5.0; // `[` / `]` nudges
pub const THRESHOLD_FALLOFF_DEFAULT: f32 = 140.0; // carried on every threshold, unused by the falloff math

// Pointer fade (per second)
pub const POINTER_FADE_RATE_UP: f32 = 6.0;
pub const POINTER_FADE_RATE_DOWN: f32 = 2.5;
pub const POINTER_FADE_MAX_STEP_SEC: f32 = 0.2;
pub const POINTER_FADE_EPSILON: f32 = 0.001;

// Probe counts
pub const CONNECTOR_PROBE_SAMPLES: usize = 32; // inclusive of both ends -> 33 points
pub const SOLID_RING_PROBE_SAMPLES: usize = 18;
pub const CONNECTOR_WOBBLE: f32 = 30.0;
pub const SOLID_RING_ACTIVE_INFLUENCE: f32 = 0.05;

// Tone mapping
pub const VOICE_GAIN_CEILING: f32 = 0.35;
pub const VOICE_GAIN_CURVE: f32 = 1.2;
pub const OCTAVE_MIN: i32 = 2;
pub const OCTAVE_MAX: i32 = 6;
pub const OCTAVE_FALLBACK: i32 = 4;

// Gain ramps
pub const GAIN_RAMP_SEC: f64 = 0.05;
pub const SILENCE_GAIN: f32 = 0.0001; // linear ramps cannot target exact zero on every backend
pub const VOICE_RELEASE_RAMP_SEC: f64 = 0.08;
pub const LOOP_RELEASE_RAMP_SEC: f64 = 0.1;
pub const RELEASE_STOP_SEC: f64 = 0.12;
pub const BUS_RAMP_SEC: f64 = 0.1;
pub const MASTER_RAMP_SEC: f64 = 0.2;

// Bus defaults
pub const MASTER_LEVEL_DEFAULT: f32 = 1.0;
pub const INSTRUMENT_LEVEL_DEFAULT: f32 = 0.8;
pub const PERCUSSION_VELOCITY_DEFAULT: f32 = 0.8;

// Flange-like chain
pub const FLANGE_MAX_DELAY_SEC: f64 = 0.05;
pub const FLANGE_DELAY_SEC: f32 = 0.012;
pub const FLANGE_FEEDBACK: f32 = 0.4;
pub const FLANGE_LFO_HZ: f32 = 0.2;
pub const FLANGE_LFO_DEPTH_SEC: f32 = 0.004;
pub const FLANGE_WET_SCALE: f32 = 1.0;

// Reverb chain
pub const REVERB_IR_SECONDS: f32 = 2.2;
pub const REVERB_IR_DECAY: f32 = 3.0;
pub const REVERB_IR_CHANNELS: usize = 2;
pub const REVERB_WET_SCALE: f32 = 1.2;

// Feedback delay chain
pub const DELAY_MAX_DELAY_SEC: f64 = 1.0;
pub const DELAY_TIME_SEC: f32 = 0.28;
pub const DELAY_FEEDBACK: f32 = 0.35;
pub const DELAY_WET_SCALE: f32 = 0.8;

// Phaser chain
pub const PHASER_CENTER_HZ: f32 = 700.0;
pub const PHASER_LFO_HZ: f32 = 0.3;
pub const PHASER_LFO_DEPTH_HZ: f32 = 1200.0;
pub const PHASER_WET_SCALE: f32 = 1.1;
