//! Shape outlines the particle field can settle into.
//!
//! Every registered shape is resampled to [`CONTROL_POINTS`] points spaced
//! evenly by arc length, starting at its first authored point, so any two
//! shapes can be blended point by point.

mod morph;

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{emotion::validate_id, registry::Definition, EmotiveError, Result};

pub use morph::{
    quantization_strength_for_bpm, quantize_progress, MorphEvent, MorphOptions, MorphOutcome,
    MorphSnapshot, MorphTransition, ShapeMorpher,
};

pub const CONTROL_POINTS: usize = 64;

/// Per-point progress curve used while morphing into a shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationCurve {
    #[default]
    Linear,
    EaseInOut,
    /// Points lead or lag by their position along the outline, so the new
    /// shape sweeps around the circle.
    RadialSweep,
}

const SWEEP_SPREAD: f32 = 0.5;

impl InterpolationCurve {
    /// Progress for control point `index` of `count` at overall progress `p`.
    /// Maps 0 to 0 and 1 to 1 for every point.
    pub fn local_progress(self, p: f32, index: usize, count: usize) -> f32 {
        let p = p.clamp(0.0, 1.0);
        match self {
            InterpolationCurve::Linear => p,
            InterpolationCurve::EaseInOut => p * p * (3.0 - 2.0 * p),
            InterpolationCurve::RadialSweep => {
                let lag = index as f32 / count.max(1) as f32;
                (p * (1.0 + SWEEP_SPREAD) - SWEEP_SPREAD * lag).clamp(0.0, 1.0)
            }
        }
    }
}

/// Authored outline as it appears in a culture pack, before resampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDefinition {
    pub id: String,
    /// Closed outline, in order. The last point connects back to the first.
    pub points: Vec<Vec2>,
    #[serde(default)]
    pub curve: InterpolationCurve,
}

/// Registered shape: id plus exactly [`CONTROL_POINTS`] control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShapeDefinition", rename_all = "camelCase")]
pub struct ShapeDescriptor {
    id: String,
    points: Vec<Vec2>,
    curve: InterpolationCurve,
}

impl ShapeDescriptor {
    pub fn new(id: &str, outline: &[Vec2], curve: InterpolationCurve) -> Result<Self> {
        validate_id(Self::KIND, id)?;
        if outline.len() < 3 {
            return Err(EmotiveError::invalid(
                Self::KIND,
                id,
                "an outline needs at least 3 points",
            ));
        }
        if outline.iter().any(|p| !p.is_finite()) {
            return Err(EmotiveError::invalid(
                Self::KIND,
                id,
                "points must be finite",
            ));
        }
        if perimeter(outline) <= f32::EPSILON {
            return Err(EmotiveError::invalid(
                Self::KIND,
                id,
                "outline has zero length",
            ));
        }
        Ok(Self::resampled(id, outline, curve))
    }

    /// Trusted constructor for generated outlines.
    fn resampled(id: &str, outline: &[Vec2], curve: InterpolationCurve) -> Self {
        Self {
            id: id.to_string(),
            points: resample(outline, CONTROL_POINTS),
            curve,
        }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn curve(&self) -> InterpolationCurve {
        self.curve
    }

    pub fn is_special(&self) -> bool {
        self.curve != InterpolationCurve::Linear
    }
}

impl TryFrom<ShapeDefinition> for ShapeDescriptor {
    type Error = EmotiveError;

    fn try_from(definition: ShapeDefinition) -> Result<Self> {
        ShapeDescriptor::new(&definition.id, &definition.points, definition.curve)
    }
}

impl Definition for ShapeDescriptor {
    const KIND: &'static str = "shape";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_id(Self::KIND, &self.id)?;
        if self.points.len() != CONTROL_POINTS || self.points.iter().any(|p| !p.is_finite()) {
            return Err(EmotiveError::invalid(
                Self::KIND,
                &self.id,
                format!("expected {CONTROL_POINTS} finite control points"),
            ));
        }
        Ok(())
    }

    fn unknown(id: &str, valid: Vec<String>) -> EmotiveError {
        EmotiveError::UnknownShape {
            id: id.to_string(),
            valid,
        }
    }
}

fn perimeter(outline: &[Vec2]) -> f32 {
    outline
        .iter()
        .zip(outline.iter().cycle().skip(1))
        .map(|(a, b)| a.distance(*b))
        .sum()
}

/// Samples `count` points evenly by arc length around a closed outline.
pub fn resample(outline: &[Vec2], count: usize) -> Vec<Vec2> {
    let Some(&first) = outline.first() else {
        return vec![Vec2::ZERO; count];
    };
    let total = perimeter(outline);
    if total <= f32::EPSILON {
        return vec![first; count];
    }

    let step = total / count as f32;
    let mut out = Vec::with_capacity(count);
    let mut edge = 0;
    let mut walked = 0.0;
    for i in 0..count {
        let target = step * i as f32;
        loop {
            let a = outline[edge % outline.len()];
            let b = outline[(edge + 1) % outline.len()];
            let length = a.distance(b);
            if walked + length >= target || edge + 1 >= outline.len() {
                let t = if length > 0.0 {
                    ((target - walked) / length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                out.push(a.lerp(b, t));
                break;
            }
            walked += length;
            edge += 1;
        }
    }
    out
}

/// Outline traced clockwise from the top, `r(theta)` giving the radius.
fn polar(samples: usize, radius: impl Fn(f32) -> f32) -> Vec<Vec2> {
    (0..samples)
        .map(|i| {
            let theta = FRAC_PI_2 - TAU * i as f32 / samples as f32;
            Vec2::from_angle(theta) * radius(theta)
        })
        .collect()
}

fn star_outline(tips: usize, inner: f32) -> Vec<Vec2> {
    (0..tips * 2)
        .map(|i| {
            let theta = FRAC_PI_2 - PI * i as f32 / tips as f32;
            let r = if i % 2 == 0 { 1.0 } else { inner };
            Vec2::from_angle(theta) * r
        })
        .collect()
}

fn heart_outline() -> Vec<Vec2> {
    (0..256)
        .map(|i| {
            let t = TAU * i as f32 / 256.0;
            let x = 16.0 * t.sin().powi(3);
            let y = 13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos();
            Vec2::new(x, y) / 17.0
        })
        .collect()
}

fn crescent_outline() -> Vec<Vec2> {
    const SEGMENTS: usize = 64;
    let outer = (0..=SEGMENTS).map(|i| {
        let deg = 60.0 + 240.0 * i as f32 / SEGMENTS as f32;
        Vec2::from_angle(deg.to_radians())
    });
    // Inner arc of a circle through the horns, bulging toward the left.
    let center = Vec2::new(0.9, 0.0);
    let horn = Vec2::new(0.5, 0.866);
    let radius = center.distance(horn);
    let start = (-horn.y).atan2(horn.x - center.x) + TAU;
    let end = horn.y.atan2(horn.x - center.x);
    let inner = (1..SEGMENTS).map(move |i| {
        let angle = start + (end - start) * i as f32 / SEGMENTS as f32;
        center + Vec2::from_angle(angle) * radius
    });
    outer.chain(inner).collect()
}

pub fn builtin_shapes() -> Vec<ShapeDescriptor> {
    use InterpolationCurve::*;

    let s = 0.8;
    vec![
        ShapeDescriptor::resampled("circle", &polar(CONTROL_POINTS, |_| 1.0), Linear),
        ShapeDescriptor::resampled("heart", &heart_outline(), Linear),
        ShapeDescriptor::resampled("star", &star_outline(5, 0.45), Linear),
        ShapeDescriptor::resampled(
            "square",
            &[
                Vec2::new(0.0, s),
                Vec2::new(s, s),
                Vec2::new(s, -s),
                Vec2::new(-s, -s),
                Vec2::new(-s, s),
            ],
            Linear,
        ),
        ShapeDescriptor::resampled(
            "triangle",
            &[
                Vec2::new(0.0, 1.0),
                Vec2::new(0.866, -0.5),
                Vec2::new(-0.866, -0.5),
            ],
            Linear,
        ),
        ShapeDescriptor::resampled(
            "diamond",
            &[
                Vec2::new(0.0, 1.0),
                Vec2::new(0.7, 0.0),
                Vec2::new(0.0, -1.0),
                Vec2::new(-0.7, 0.0),
            ],
            Linear,
        ),
        ShapeDescriptor::resampled(
            "sun",
            &polar(256, |theta| 1.0 + 0.15 * (8.0 * theta).cos()),
            Linear,
        ),
        ShapeDescriptor::resampled("moon", &crescent_outline(), EaseInOut),
        ShapeDescriptor::resampled(
            "eclipse",
            &polar(256, |theta| 1.0 + 0.05 * (12.0 * theta).sin()),
            RadialSweep,
        ),
    ]
}
