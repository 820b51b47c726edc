use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Linear RGB color with channels in [0, 1]. Serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#').unwrap_or(text);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    /// Returns a copy whose HSL saturation is shifted by `delta`.
    pub fn with_saturation_delta(self, delta: f32) -> Rgb {
        if delta == 0.0 {
            return self;
        }
        let (h, s, l) = self.to_hsl();
        Rgb::from_hsl(h, (s + delta).clamp(0.0, 1.0), l)
    }

    pub fn to_hsl(self) -> (f32, f32, f32) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let l = (max + min) * 0.5;
        let d = max - min;
        if d <= f32::EPSILON {
            return (0.0, 0.0, l);
        }
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == self.r {
            ((self.g - self.b) / d).rem_euclid(6.0)
        } else if max == self.g {
            (self.b - self.r) / d + 2.0
        } else {
            (self.r - self.g) / d + 4.0
        };
        (h / 6.0, s, l)
    }

    pub fn from_hsl(h: f32, s: f32, l: f32) -> Rgb {
        if s <= f32::EPSILON {
            return Rgb::new(l, l, l);
        }
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        Rgb::new(
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        )
    }

    /// Channel-wise comparison with a small tolerance, used when merging
    /// palette entries.
    pub fn approx_eq(self, other: Rgb) -> bool {
        const TOLERANCE: f32 = 1.0 / 512.0;
        (self.r - other.r).abs() < TOLERANCE
            && (self.g - other.g).abs() < TOLERANCE
            && (self.b - other.b).abs() < TOLERANCE
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Rgb::from_hex(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("`{text}` is not a #RRGGBB color")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_with_and_without_hash() {
        let a = Rgb::from_hex("#FF8000").unwrap();
        let b = Rgb::from_hex("ff8000").unwrap();
        assert!(a.approx_eq(b));
        assert_eq!(a.to_hex(), "#FF8000");
        assert!(Rgb::from_hex("#FF80").is_none());
        assert!(Rgb::from_hex("#GG0000").is_none());
    }

    #[test]
    fn hsl_round_trip_preserves_color() {
        let color = Rgb::from_hex("#3A7BD5").unwrap();
        let (h, s, l) = color.to_hsl();
        assert!(Rgb::from_hsl(h, s, l).approx_eq(color));
    }

    #[test]
    fn negative_saturation_delta_moves_toward_grey() {
        let color = Rgb::from_hex("#FF0000").unwrap();
        let muted = color.with_saturation_delta(-1.0);
        assert!((muted.r - muted.g).abs() < 1e-4);
        assert!((muted.g - muted.b).abs() < 1e-4);
    }

    #[test]
    fn rejects_bad_color_documents() {
        let parsed: Result<Rgb, _> = serde_json::from_str("\"not-a-color\"");
        assert!(parsed.is_err());
    }
}
