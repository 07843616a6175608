//! RGBA color carried by beam energy.

use serde::{Deserialize, Serialize};

/// Four channels, nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub [f64; 4]);

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color([1.0; 4]);
    pub const BLACK: Color = Color([0.0, 0.0, 0.0, 1.0]);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self([r, g, b, a])
    }

    pub const fn splat(v: f64) -> Self {
        Self([v; 4])
    }

    /// Channel-wise product.
    pub fn modulate(self, filter: [f64; 4]) -> Color {
        let mut out = self.0;
        for (c, f) in out.iter_mut().zip(filter) {
            *c *= f;
        }
        Color(out)
    }

    pub fn scale(self, factor: f64) -> [f64; 4] {
        self.0.map(|c| c * factor)
    }

    pub fn clamped(self) -> Color {
        Color(self.0.map(|c| c.clamp(0.0, 1.0)))
    }

    /// Color whose energy-weighted mass is `mass` at `energy`.
    pub fn from_mass(mass: [f64; 4], energy: f64) -> Color {
        Color(mass.map(|m| m / energy)).clamped()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Channel-wise `a + b`.
pub(crate) fn add_mass(a: &mut [f64; 4], b: [f64; 4]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulate_multiplies_channels() {
        let c = Color::new(1.0, 0.5, 0.25, 1.0).modulate([0.5, 0.5, 1.0, 1.0]);
        assert_eq!(c, Color::new(0.5, 0.25, 0.25, 1.0));
    }

    #[test]
    fn from_mass_clamps() {
        let c = Color::from_mass([20.0, 5.0, -1.0, 10.0], 10.0);
        assert_eq!(c, Color::new(1.0, 0.5, 0.0, 1.0));
    }
}
