use serde::{Deserialize, Serialize};

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "default_alpha")]
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color from integer components, clipping each to 0..=255.
    pub fn from_ints(r: i32, g: i32, b: i32, a: i32) -> Self {
        let clip = |v: i32| v.clamp(0, 255) as u8;
        Self::rgba(clip(r), clip(g), clip(b), clip(a))
    }

    /// Premultiplied-alpha form in 0..=1, as consumed by renderers.
    pub fn premultiplied(self) -> [f32; 4] {
        let a = self.a as f32 / 255.0;
        [
            self.r as f32 / 255.0 * a,
            self.g as f32 / 255.0 * a,
            self.b as f32 / 255.0 * a,
            a,
        ]
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

const fn default_alpha() -> u8 {
    255
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_ints_clips_out_of_range_components() {
        let c = Color::from_ints(-5, 300, 128, 1000);
        assert_eq!(c, Color::rgba(0, 255, 128, 255));
    }

    #[test]
    fn premultiplied_scales_by_alpha() {
        let c = Color::rgba(255, 0, 255, 0).premultiplied();
        assert_eq!(c, [0.0, 0.0, 0.0, 0.0]);
        let c = Color::rgba(255, 255, 255, 255).premultiplied();
        assert_eq!(c, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn alpha_defaults_to_opaque_when_deserializing() {
        let c: Color = serde_json::from_str(r#"{"r":1,"g":2,"b":3}"#).expect("color parses");
        assert_eq!(c.a, 255);
    }
}
