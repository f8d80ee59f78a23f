//! Fill colours and how one is chosen per tile.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Linear RGBA colour, components in `[0, 1]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Random opaque colour; alpha is set by the caller.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(rng.gen(), rng.gen(), rng.gen(), 1.0)
    }

    pub fn is_translucent(&self) -> bool {
        self.a < 1.0
    }

    #[inline]
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// Per-instance colour attribute in the layout the batching shaders expect
/// (normalised `u8` RGBA).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorAttribute {
    pub value: [u8; 4],
}

impl From<Color> for ColorAttribute {
    fn from(c: Color) -> Self {
        Self { value: c.to_rgba8() }
    }
}

/// How the single fill colour of a tile is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorSelection {
    /// Same colour for every tile.
    Fixed { color: Color },
    /// Fresh random RGB per tile from the thread RNG.
    Random { alpha: f32 },
    /// Random RGB from a fixed seed; every tile gets the same pick.
    Seeded { seed: u64, alpha: f32 },
}

impl Default for ColorSelection {
    fn default() -> Self {
        ColorSelection::Random { alpha: 0.5 }
    }
}

impl ColorSelection {
    pub fn pick(&self) -> Color {
        match *self {
            ColorSelection::Fixed { color } => color,
            ColorSelection::Random { alpha } => Color::from_rng(&mut rand::thread_rng()).with_alpha(alpha),
            ColorSelection::Seeded { seed, alpha } => {
                Color::from_rng(&mut StdRng::seed_from_u64(seed)).with_alpha(alpha)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_selection_returns_its_colour() {
        let c = Color::new(0.2, 0.4, 0.6, 0.5);
        assert_eq!(ColorSelection::Fixed { color: c }.pick(), c);
    }

    #[test]
    fn seeded_selection_is_deterministic() {
        let sel = ColorSelection::Seeded { seed: 7, alpha: 0.5 };
        assert_eq!(sel.pick(), sel.pick());
        assert_eq!(sel.pick().a, 0.5);
    }

    #[test]
    fn default_selection_is_half_translucent() {
        let c = ColorSelection::default().pick();
        assert_eq!(c.a, 0.5);
        assert!((0.0..=1.0).contains(&c.r));
        assert!(c.is_translucent());
    }

    #[test]
    fn rgba8_quantisation_clamps() {
        assert_eq!(Color::new(2.0, -1.0, 0.5, 1.0).to_rgba8(), [255, 0, 128, 255]);
        assert_eq!(ColorAttribute::from(Color::RED.with_alpha(0.5)).value, [255, 0, 0, 128]);
    }

    #[test]
    fn selection_deserialises_from_tagged_json() {
        let sel: ColorSelection = serde_json::from_str(r#"{"kind":"seeded","seed":3,"alpha":0.25}"#).unwrap();
        assert_eq!(sel, ColorSelection::Seeded { seed: 3, alpha: 0.25 });
    }
}
