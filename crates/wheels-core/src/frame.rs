use crate::effects::EffectKind;

/// Per-frame max of connector influence, one slot per effect chain.
///
/// Call [`FrameAccumulator::reset`] once at the top of every frame before any
/// connector reports in. Max rather than sum keeps a crowd of touched
/// connectors from slamming an effect to full wet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameAccumulator {
    levels: [f32; EffectKind::COUNT],
}

impl FrameAccumulator {
    pub fn reset(&mut self) {
        self.levels = [0.0; EffectKind::COUNT];
    }

    pub fn accumulate(&mut self, kind: EffectKind, value: f32) {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let slot = &mut self.levels[kind.index()];
        *slot = slot.max(value);
    }

    /// String-keyed variant; unknown names land on the flange slot.
    pub fn accumulate_named(&mut self, kind: &str, value: f32) {
        self.accumulate(EffectKind::parse_or_default(kind), value);
    }

    pub fn get(&self, kind: EffectKind) -> f32 {
        self.levels[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_max_and_clamps() {
        let mut acc = FrameAccumulator::default();
        acc.accumulate(EffectKind::Delay, 0.2);
        acc.accumulate(EffectKind::Delay, 1.7);
        acc.accumulate(EffectKind::Delay, 0.4);
        assert_eq!(acc.get(EffectKind::Delay), 1.0);
        acc.accumulate(EffectKind::Reverb, -3.0);
        assert_eq!(acc.get(EffectKind::Reverb), 0.0);
    }

    #[test]
    fn unknown_names_fall_back_to_flange() {
        let mut acc = FrameAccumulator::default();
        acc.accumulate_named("chorus", 0.6);
        assert_eq!(acc.get(EffectKind::Flange), 0.6);
    }
}
