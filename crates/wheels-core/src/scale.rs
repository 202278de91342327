use crate::constants::{OCTAVE_FALLBACK, OCTAVE_MAX, OCTAVE_MIN};
use rand::prelude::*;

/// Diatonic patterns (relative semitone degrees).
pub const MAJOR: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
pub const MINOR: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleKind {
    Major,
    Minor,
}

impl ScaleKind {
    pub fn pattern(self) -> &'static [i32; 7] {
        match self {
            ScaleKind::Major => &MAJOR,
            ScaleKind::Minor => &MINOR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScaleKind::Major => "major",
            ScaleKind::Minor => "minor",
        }
    }
}

/// Root plus the seven pitch classes of its scale. Fixed for the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScaleModel {
    kind: ScaleKind,
    root: i32,
    semitones: [i32; 7],
}

impl ScaleModel {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let kind = if rng.gen_bool(0.5) {
            ScaleKind::Major
        } else {
            ScaleKind::Minor
        };
        let root = rng.gen_range(0..12);
        let scale = Self::new(kind, root);
        log::info!("[audio] using {} scale for procedural tones", scale.name());
        scale
    }

    pub fn new(kind: ScaleKind, root: i32) -> Self {
        let root = root.rem_euclid(12);
        let semitones = (*kind.pattern()).map(|step| (root + step) % 12);
        Self {
            kind,
            root,
            semitones,
        }
    }

    pub fn kind(&self) -> ScaleKind {
        self.kind
    }

    pub fn root(&self) -> i32 {
        self.root
    }

    pub fn semitones(&self) -> &[i32; 7] {
        &self.semitones
    }

    pub fn name(&self) -> String {
        format!("{} {}", NOTE_NAMES[self.root as usize], self.kind.label())
    }

    /// Uniform random scale member mapped to MIDI as `12·(octave+1) + semitone`.
    pub fn pick_note<R: Rng + ?Sized>(&self, octave: i32, rng: &mut R) -> i32 {
        let semitone = *self.semitones.choose(rng).unwrap_or(&self.root);
        12 * (octave + 1) + semitone
    }

    pub fn contains_pitch_class(&self, midi: i32) -> bool {
        self.semitones.contains(&midi.rem_euclid(12))
    }
}

pub fn midi_to_hz(midi: f32) -> f32 {
    440.0 * (2.0_f32).powf((midi - 69.0) / 12.0)
}

/// Map a hue in degrees (any range, wrapped into [0, 360)) to an octave in [2, 6].
pub fn hue_to_octave(hue_degrees: f32) -> i32 {
    if !hue_degrees.is_finite() {
        return OCTAVE_FALLBACK;
    }
    let wrapped = hue_degrees.rem_euclid(360.0);
    let span = (OCTAVE_MAX - OCTAVE_MIN) as f32;
    (OCTAVE_MIN as f32 + (wrapped / 360.0) * span).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_members_are_rotated_pattern() {
        let s = ScaleModel::new(ScaleKind::Minor, 9);
        assert_eq!(s.semitones(), &[9, 11, 0, 2, 4, 5, 7]);
        assert_eq!(s.name(), "A minor");
    }

    #[test]
    fn hue_wraps_into_octave_range() {
        assert_eq!(hue_to_octave(0.0), 2);
        assert_eq!(hue_to_octave(180.0), 4);
        assert_eq!(hue_to_octave(359.0), 6);
        assert_eq!(hue_to_octave(-90.0), hue_to_octave(270.0));
        assert_eq!(hue_to_octave(720.0 + 90.0), hue_to_octave(90.0));
        assert_eq!(hue_to_octave(f32::NAN), 4);
    }
}
