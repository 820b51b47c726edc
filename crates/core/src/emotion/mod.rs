//! Emotions, undertones and the parameters they hand to the particle field.

mod catalog;
mod state;

use serde::{Deserialize, Serialize};

use crate::{
    color::Rgb, particle::BehaviorKind, registry::Definition, EmotiveError, Result,
};

pub use catalog::{builtin_emotions, builtin_undertones, CLEAR_UNDERTONE};
pub use state::{EmotionChange, EmotionStateMachine};

const MAX_PARTICLE_RATE: f32 = 1_000.0;
const MAX_GLOW: f32 = 5.0;
/// Palette entries lighter than this are dropped when blending.
const MIN_PALETTE_WEIGHT: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedColor {
    pub color: Rgb,
    pub weight: f32,
}

impl WeightedColor {
    /// `None` when `hex` is not a `#RRGGBB` color.
    pub fn new(hex: &str, weight: f32) -> Option<Self> {
        Some(Self {
            color: Rgb::from_hex(hex)?,
            weight,
        })
    }
}

/// Core breathing: `rate` in breaths per minute, `depth` as the fractional
/// scale swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathingPattern {
    pub rate: f32,
    pub depth: f32,
}

impl BreathingPattern {
    pub fn lerp(self, other: BreathingPattern, t: f32) -> BreathingPattern {
        BreathingPattern {
            rate: lerp(self.rate, other.rate, t),
            depth: lerp(self.depth, other.depth, t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionDefinition {
    pub id: String,
    pub palette: Vec<WeightedColor>,
    /// Particles spawned per second before undertone scaling.
    pub particle_rate: f32,
    pub glow_intensity: f32,
    pub breathing: BreathingPattern,
    pub behavior: BehaviorKind,
    /// Base velocity scale handed to behaviors.
    #[serde(default = "unit")]
    pub particle_speed: f32,
    /// Gestures that suit this emotion. Advisory only.
    #[serde(default)]
    pub gestures: Vec<String>,
}

fn unit() -> f32 {
    1.0
}

impl Definition for EmotionDefinition {
    const KIND: &'static str = "emotion";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        let fail = |reason: &str| Err(EmotiveError::invalid(Self::KIND, &self.id, reason));
        validate_id(Self::KIND, &self.id)?;
        if self.palette.is_empty() {
            return fail("palette must contain at least one color");
        }
        if self
            .palette
            .iter()
            .any(|entry| !entry.weight.is_finite() || entry.weight <= 0.0)
        {
            return fail("palette weights must be finite and positive");
        }
        if !self.particle_rate.is_finite()
            || !(0.0..=MAX_PARTICLE_RATE).contains(&self.particle_rate)
        {
            return fail("particleRate must be within [0, 1000]");
        }
        if !self.glow_intensity.is_finite() || !(0.0..=MAX_GLOW).contains(&self.glow_intensity) {
            return fail("glowIntensity must be within [0, 5]");
        }
        if !self.breathing.rate.is_finite() || self.breathing.rate < 0.0 {
            return fail("breathing.rate must be >= 0");
        }
        if !(0.0..=1.0).contains(&self.breathing.depth) {
            return fail("breathing.depth must be within [0, 1]");
        }
        if !self.particle_speed.is_finite() || self.particle_speed <= 0.0 {
            return fail("particleSpeed must be positive");
        }
        Ok(())
    }

    fn unknown(id: &str, valid: Vec<String>) -> EmotiveError {
        EmotiveError::UnknownEmotion {
            id: id.to_string(),
            valid,
        }
    }
}

/// Overlay that shifts an emotion without changing its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndertoneModifier {
    pub id: String,
    #[serde(default)]
    pub saturation_delta: f32,
    #[serde(default = "unit")]
    pub speed_multiplier: f32,
    #[serde(default = "unit")]
    pub rate_multiplier: f32,
}

impl UndertoneModifier {
    pub fn clear() -> Self {
        Self {
            id: CLEAR_UNDERTONE.to_string(),
            saturation_delta: 0.0,
            speed_multiplier: 1.0,
            rate_multiplier: 1.0,
        }
    }

    /// Field-wise blend. The id follows whichever side dominates.
    pub fn lerp(&self, other: &UndertoneModifier, t: f32) -> UndertoneModifier {
        UndertoneModifier {
            id: if t >= 0.5 { other.id.clone() } else { self.id.clone() },
            saturation_delta: lerp(self.saturation_delta, other.saturation_delta, t),
            speed_multiplier: lerp(self.speed_multiplier, other.speed_multiplier, t),
            rate_multiplier: lerp(self.rate_multiplier, other.rate_multiplier, t),
        }
    }
}

impl Definition for UndertoneModifier {
    const KIND: &'static str = "undertone";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_id(Self::KIND, &self.id)?;
        if !self.saturation_delta.is_finite() || !(-1.0..=1.0).contains(&self.saturation_delta) {
            return Err(EmotiveError::invalid(
                Self::KIND,
                &self.id,
                "saturationDelta must be within [-1, 1]",
            ));
        }
        for (name, value) in [
            ("speedMultiplier", self.speed_multiplier),
            ("rateMultiplier", self.rate_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 || value > 10.0 {
                return Err(EmotiveError::invalid(
                    Self::KIND,
                    &self.id,
                    format!("{name} must be within (0, 10]"),
                ));
            }
        }
        Ok(())
    }

    fn unknown(id: &str, valid: Vec<String>) -> EmotiveError {
        EmotiveError::UnknownUndertone {
            id: id.to_string(),
            valid,
        }
    }
}

/// Per-tick output of the emotion state machine. Rebuilt from the
/// definitions every tick; nothing in here is fed back into the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderParameters {
    pub emotion: String,
    pub undertone: String,
    pub transition_progress: f32,
    pub palette: Vec<WeightedColor>,
    pub primary_color: Rgb,
    pub particle_rate: f32,
    pub glow_intensity: f32,
    pub breathing: BreathingPattern,
    /// Current core scale from the breathing cycle, around 1.0.
    pub breath_scale: f32,
    pub speed_multiplier: f32,
    /// Behavior assigned to particles spawned this tick.
    pub behavior: BehaviorKind,
}

pub(crate) fn validate_id(kind: &'static str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EmotiveError::invalid(kind, id, "id must not be empty"));
    }
    if id.chars().any(|c| c.is_whitespace()) {
        return Err(EmotiveError::invalid(kind, id, "id must not contain whitespace"));
    }
    Ok(())
}

pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Scales a palette so its weights sum to one.
pub fn normalize_palette(palette: &[WeightedColor]) -> Vec<WeightedColor> {
    let total: f32 = palette.iter().map(|entry| entry.weight).sum();
    if total <= 0.0 {
        return palette.to_vec();
    }
    palette
        .iter()
        .map(|entry| WeightedColor {
            color: entry.color,
            weight: entry.weight / total,
        })
        .collect()
}

/// Weight-union of two palettes: `from` contributes `1 - t` of the total
/// weight and `to` contributes `t`. Equal colors are merged.
pub fn blend_palettes(from: &[WeightedColor], to: &[WeightedColor], t: f32) -> Vec<WeightedColor> {
    let t = t.clamp(0.0, 1.0);
    let mut blended: Vec<WeightedColor> = Vec::with_capacity(from.len() + to.len());
    let sides = [(normalize_palette(from), 1.0 - t), (normalize_palette(to), t)];
    for (palette, share) in sides {
        for entry in palette {
            let weight = entry.weight * share;
            if weight < MIN_PALETTE_WEIGHT {
                continue;
            }
            match blended.iter_mut().find(|e| e.color.approx_eq(entry.color)) {
                Some(existing) => existing.weight += weight,
                None => blended.push(WeightedColor {
                    color: entry.color,
                    weight,
                }),
            }
        }
    }
    blended
}

/// Weighted mean color of a palette.
pub fn mean_color(palette: &[WeightedColor]) -> Rgb {
    let total: f32 = palette.iter().map(|entry| entry.weight).sum();
    if total <= 0.0 {
        return Rgb::WHITE;
    }
    let (r, g, b) = palette.iter().fold((0.0, 0.0, 0.0), |acc, entry| {
        (
            acc.0 + entry.color.r * entry.weight,
            acc.1 + entry.color.g * entry.weight,
            acc.2 + entry.color.b * entry.weight,
        )
    });
    Rgb::new(r / total, g / total, b / total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(entries: &[(&str, f32)]) -> Vec<WeightedColor> {
        entries
            .iter()
            .map(|(hex, weight)| WeightedColor::new(hex, *weight).unwrap())
            .collect()
    }

    #[test]
    fn blend_splits_weight_between_sides() {
        let from = palette(&[("#0000FF", 3.0), ("#000080", 1.0)]);
        let to = palette(&[("#FFFF00", 1.0)]);
        let blended = blend_palettes(&from, &to, 0.5);
        let yellow: f32 = blended
            .iter()
            .filter(|e| e.color.approx_eq(Rgb::from_hex("#FFFF00").unwrap()))
            .map(|e| e.weight)
            .sum();
        let total: f32 = blended.iter().map(|e| e.weight).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!((yellow - 0.5).abs() < 1e-5);
    }

    #[test]
    fn blend_endpoints_keep_only_one_side() {
        let from = palette(&[("#0000FF", 1.0)]);
        let to = palette(&[("#FFFF00", 1.0)]);
        assert_eq!(blend_palettes(&from, &to, 0.0).len(), 1);
        let settled = blend_palettes(&from, &to, 1.0);
        assert_eq!(settled.len(), 1);
        assert!(settled[0].color.approx_eq(Rgb::from_hex("#FFFF00").unwrap()));
    }

    #[test]
    fn blend_merges_shared_colors() {
        let from = palette(&[("#FFFFFF", 1.0)]);
        let to = palette(&[("#FFFFFF", 1.0)]);
        let blended = blend_palettes(&from, &to, 0.3);
        assert_eq!(blended.len(), 1);
        assert!((blended[0].weight - 1.0).abs() < 1e-5);
    }

    #[test]
    fn emotion_validation_rejects_empty_palette() {
        let mut joy = builtin_emotions()
            .into_iter()
            .find(|e| e.id == "joy")
            .unwrap();
        joy.palette.clear();
        assert!(joy.validate().is_err());
    }

    #[test]
    fn undertone_validation_rejects_zero_multiplier() {
        let bad = UndertoneModifier {
            speed_multiplier: 0.0,
            ..UndertoneModifier::clear()
        };
        assert!(bad.validate().is_err());
        assert!(UndertoneModifier::clear().validate().is_ok());
    }

    #[test]
    fn emotion_documents_parse_with_defaults() {
        let json = r##"{
            "id": "wistful",
            "palette": [{ "color": "#8899AA", "weight": 1.0 }],
            "particleRate": 6,
            "glowIntensity": 0.4,
            "breathing": { "rate": 8, "depth": 0.05 },
            "behavior": "falling"
        }"##;
        let definition: EmotionDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.particle_speed, 1.0);
        assert!(definition.gestures.is_empty());
        assert!(definition.validate().is_ok());
    }
}
