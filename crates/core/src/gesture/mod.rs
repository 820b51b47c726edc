//! Gestures: short, beat-timed motions of the whole mascot.

mod scheduler;

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    emotion::validate_id, particle::Decoration, registry::Definition, EmotiveError, Result,
};

pub use scheduler::{
    ActiveGesture, GestureEvent, GestureOutcome, GestureQueueEntry, GestureScheduler, GestureState,
};

const MIN_DURATION_BEATS: f64 = 1.0 / 16.0;
const MAX_DURATION_BEATS: f64 = 64.0;

/// What happens when a gesture is requested while another instance of it is
/// pending or running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueuePolicy {
    /// Cancel every pending or active instance and take over.
    Replace,
    /// Queue behind existing instances, up to a bound. Overflow is dropped.
    Enqueue,
    /// Do nothing while an instance is pending or active.
    IgnoreIfActive,
}

/// Rigid transform a gesture contributes to the mascot for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureTransform {
    pub offset: Vec2,
    pub scale: f32,
    /// Radians.
    pub rotation: f32,
    pub glow: f32,
}

impl GestureTransform {
    pub const IDENTITY: GestureTransform = GestureTransform {
        offset: Vec2::ZERO,
        scale: 1.0,
        rotation: 0.0,
        glow: 0.0,
    };

    /// Composition of two simultaneous gestures.
    pub fn combine(self, other: GestureTransform) -> GestureTransform {
        GestureTransform {
            offset: self.offset + other.offset,
            scale: self.scale * other.scale,
            rotation: self.rotation + other.rotation,
            glow: self.glow + other.glow,
        }
    }
}

impl Default for GestureTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Motion function of a gesture: a pure map from progress in [0, 1] to a
/// transform. Every variant returns (close to) identity at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Motion {
    Bounce { height: f32 },
    Pulse { scale: f32 },
    Shake { amplitude: f32, cycles: f32 },
    Spin { turns: f32 },
    Nod { depth: f32, cycles: f32 },
    Tilt { angle: f32 },
    Sway { amplitude: f32, cycles: f32 },
    Expand { scale: f32 },
    Contract { scale: f32 },
    Flash { glow: f32 },
    Jump { height: f32, squash: f32 },
    Wiggle { amplitude: f32, cycles: f32 },
    Float { height: f32 },
}

impl Motion {
    pub fn sample(&self, progress: f32) -> GestureTransform {
        let p = progress.clamp(0.0, 1.0);
        let arch = (PI * p).sin();
        let mut t = GestureTransform::IDENTITY;
        match *self {
            Motion::Bounce { height } => {
                t.offset.y = height * (TAU * p).sin().abs() * (1.0 - 0.5 * p);
            }
            Motion::Pulse { scale } => t.scale = 1.0 + (scale - 1.0) * arch,
            Motion::Shake { amplitude, cycles } => {
                t.offset.x = amplitude * (TAU * cycles * p).sin() * (1.0 - p);
            }
            Motion::Spin { turns } => t.rotation = turns * TAU * smoothstep(p),
            Motion::Nod { depth, cycles } => {
                t.offset.y = -depth * (PI * cycles * p).sin().abs() * arch;
            }
            Motion::Tilt { angle } => t.rotation = angle * arch,
            Motion::Sway { amplitude, cycles } => {
                t.offset.x = amplitude * (TAU * cycles * p).sin() * arch;
            }
            Motion::Expand { scale } | Motion::Contract { scale } => {
                t.scale = 1.0 + (scale - 1.0) * plateau(p);
            }
            Motion::Flash { glow } => t.glow = glow * arch,
            Motion::Jump { height, squash } => {
                t.offset.y = height * 4.0 * p * (1.0 - p);
                t.scale = 1.0 + squash * (TAU * p).sin();
            }
            Motion::Wiggle { amplitude, cycles } => {
                t.rotation = amplitude * (TAU * cycles * p).sin() * (1.0 - p);
            }
            Motion::Float { height } => t.offset.y = height * arch,
        }
        t
    }

    fn parameters(&self) -> Vec<f32> {
        match *self {
            Motion::Bounce { height } | Motion::Float { height } => vec![height],
            Motion::Pulse { scale } | Motion::Expand { scale } | Motion::Contract { scale } => {
                vec![scale]
            }
            Motion::Shake { amplitude, cycles }
            | Motion::Sway { amplitude, cycles }
            | Motion::Wiggle { amplitude, cycles } => vec![amplitude, cycles],
            Motion::Spin { turns } => vec![turns],
            Motion::Nod { depth, cycles } => vec![depth, cycles],
            Motion::Tilt { angle } => vec![angle],
            Motion::Flash { glow } => vec![glow],
            Motion::Jump { height, squash } => vec![height, squash],
        }
    }
}

fn smoothstep(p: f32) -> f32 {
    p * p * (3.0 - 2.0 * p)
}

/// Quick attack, hold, quick release.
fn plateau(p: f32) -> f32 {
    (p / 0.2).min(1.0).min((1.0 - p) / 0.2).max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gesture {
    pub id: String,
    pub duration_beats: f64,
    pub motion: Motion,
    pub policy: QueuePolicy,
    /// One-shot particle decoration, reverted when the gesture ends.
    #[serde(default)]
    pub decoration: Option<Decoration>,
}

impl Definition for Gesture {
    const KIND: &'static str = "gesture";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_id(Self::KIND, &self.id)?;
        if !self.duration_beats.is_finite()
            || !(MIN_DURATION_BEATS..=MAX_DURATION_BEATS).contains(&self.duration_beats)
        {
            return Err(EmotiveError::invalid(
                Self::KIND,
                &self.id,
                "durationBeats must be within [1/16, 64]",
            ));
        }
        if self.motion.parameters().iter().any(|v| !v.is_finite()) {
            return Err(EmotiveError::invalid(
                Self::KIND,
                &self.id,
                "motion parameters must be finite",
            ));
        }
        if let Some(decoration) = &self.decoration {
            if !decoration.glow_boost.is_finite() || decoration.glow_boost < 0.0 {
                return Err(EmotiveError::invalid(
                    Self::KIND,
                    &self.id,
                    "decoration.glowBoost must be >= 0",
                ));
            }
        }
        Ok(())
    }

    fn unknown(id: &str, valid: Vec<String>) -> EmotiveError {
        EmotiveError::UnknownGesture {
            id: id.to_string(),
            valid,
        }
    }
}

fn gesture(id: &str, duration_beats: f64, policy: QueuePolicy, motion: Motion) -> Gesture {
    Gesture {
        id: id.to_string(),
        duration_beats,
        motion,
        policy,
        decoration: None,
    }
}

pub fn builtin_gestures() -> Vec<Gesture> {
    use QueuePolicy::*;

    vec![
        gesture("bounce", 1.0, Replace, Motion::Bounce { height: 0.3 }),
        gesture("pulse", 1.0, Replace, Motion::Pulse { scale: 1.15 }),
        gesture(
            "shake",
            1.0,
            IgnoreIfActive,
            Motion::Shake {
                amplitude: 0.12,
                cycles: 4.0,
            },
        ),
        gesture("spin", 2.0, IgnoreIfActive, Motion::Spin { turns: 1.0 }),
        gesture(
            "nod",
            1.0,
            Enqueue,
            Motion::Nod {
                depth: 0.15,
                cycles: 2.0,
            },
        ),
        gesture("tilt", 1.0, Replace, Motion::Tilt { angle: 0.3 }),
        gesture(
            "sway",
            2.0,
            Enqueue,
            Motion::Sway {
                amplitude: 0.2,
                cycles: 1.0,
            },
        ),
        gesture("expand", 1.0, Replace, Motion::Expand { scale: 1.3 }),
        gesture("contract", 1.0, Replace, Motion::Contract { scale: 0.75 }),
        Gesture {
            decoration: Some(Decoration {
                glow_boost: 1.0,
                cell_shaded: false,
            }),
            ..gesture("flash", 0.5, Replace, Motion::Flash { glow: 1.5 })
        },
        gesture(
            "jump",
            1.0,
            IgnoreIfActive,
            Motion::Jump {
                height: 0.5,
                squash: 0.1,
            },
        ),
        gesture(
            "wiggle",
            1.0,
            Enqueue,
            Motion::Wiggle {
                amplitude: 0.25,
                cycles: 3.0,
            },
        ),
        gesture("float", 2.0, Enqueue, Motion::Float { height: 0.2 }),
        Gesture {
            decoration: Some(Decoration {
                glow_boost: 0.0,
                cell_shaded: true,
            }),
            ..gesture(
                "glitch",
                1.0,
                IgnoreIfActive,
                Motion::Shake {
                    amplitude: 0.05,
                    cycles: 8.0,
                },
            )
        },
    ]
}
