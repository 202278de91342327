//! Probe points along the geometry that listens to the threshold field.

use crate::constants::CONNECTOR_WOBBLE;
use glam::Vec2;

/// Quadratic Bézier used for connectors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadraticCurve {
    pub start: Vec2,
    pub control: Vec2,
    pub end: Vec2,
}

impl QuadraticCurve {
    /// Connector curve whose control point wobbles around the midpoint with phase `t`.
    pub fn connector(start: Vec2, end: Vec2, t: f32) -> Self {
        let control = (start + end) * 0.5 + CONNECTOR_WOBBLE * Vec2::new(t.sin(), t.cos());
        Self {
            start,
            control,
            end,
        }
    }

    pub fn point(&self, t: f32) -> Vec2 {
        let u = 1.0 - t;
        self.start * (u * u) + self.control * (2.0 * u * t) + self.end * (t * t)
    }

    /// `segments + 1` evenly spaced points, both ends included.
    pub fn samples(&self, segments: usize) -> impl Iterator<Item = Vec2> + '_ {
        let n = segments.max(1);
        (0..=n).map(move |i| self.point(i as f32 / n as f32))
    }
}

/// `count` points on a circle, starting at angle `rotation`.
pub fn circle_samples(
    center: Vec2,
    radius: f32,
    rotation: f32,
    count: usize,
) -> impl Iterator<Item = Vec2> {
    let count = count.max(1);
    (0..count).map(move |i| {
        let angle = rotation + std::f32::consts::TAU * i as f32 / count as f32;
        center + Vec2::new(angle.cos(), angle.sin()) * radius
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_hits_its_endpoints() {
        let c = QuadraticCurve::connector(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), 0.3);
        let pts: Vec<Vec2> = c.samples(32).collect();
        assert_eq!(pts.len(), 33);
        assert!(pts[0].distance(c.start) < 1e-4);
        assert!(pts[32].distance(c.end) < 1e-4);
    }

    #[test]
    fn circle_samples_sit_on_the_radius() {
        let center = Vec2::new(50.0, 50.0);
        for p in circle_samples(center, 20.0, 1.0, 18) {
            assert!((p.distance(center) - 20.0).abs() < 1e-3);
        }
    }
}
