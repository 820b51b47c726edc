//! Pooled particles.
//!
//! A [`Particle`] is allocated once at warm-up inside a [`ParticlePool`] and
//! cycles between the free and active sets for the lifetime of the engine.
//! Releasing a particle replaces the whole record with [`Particle::dormant`],
//! so no field (behavior scratch data and gesture decorations included)
//! survives into the next occupant.

mod behavior;
mod pool;
mod system;

use glam::Vec2;
use serde::Serialize;

use crate::color::Rgb;

pub use behavior::{
    BehaviorFrame, BehaviorInit, BehaviorKind, BehaviorRegistry, BehaviorRule, BehaviorState,
    BehaviorUpdate,
};
pub use pool::{ParticleId, ParticlePool, PoolStats};
pub use system::{sample_palette, ParticleSystem, SpawnReport};

/// End of the birth phase, as a fraction of life.
pub const BIRTH_END: f32 = 0.15;
/// Start of the decay phase, as a fraction of life.
pub const DECAY_START: f32 = 0.70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecyclePhase {
    Birth,
    Prime,
    Decay,
}

impl LifecyclePhase {
    pub fn for_life(life: f32) -> Self {
        if life < BIRTH_END {
            LifecyclePhase::Birth
        } else if life < DECAY_START {
            LifecyclePhase::Prime
        } else {
            LifecyclePhase::Decay
        }
    }
}

/// Opacity multiplier for a point in life: ramps in during birth, holds
/// through prime, ramps out during decay.
pub fn phase_opacity(life: f32) -> f32 {
    let life = life.clamp(0.0, 1.0);
    match LifecyclePhase::for_life(life) {
        LifecyclePhase::Birth => life / BIRTH_END,
        LifecyclePhase::Prime => 1.0,
        LifecyclePhase::Decay => (1.0 - (life - DECAY_START) / (1.0 - DECAY_START)).max(0.0),
    }
}

/// One-shot effect a gesture lays over the particles active when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoration {
    #[serde(default)]
    pub glow_boost: f32,
    #[serde(default)]
    pub cell_shaded: bool,
}

/// A decoration tagged with the gesture instance that applied it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedDecoration {
    pub token: u64,
    pub decoration: Decoration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    /// Behavior-space velocity, before the emotion speed multiplier.
    pub velocity: Vec2,
    /// Velocity actually integrated this tick. Recomputed from `velocity`
    /// every tick.
    pub effective_velocity: Vec2,
    /// Normalised age in [0, 1].
    pub life: f32,
    pub lifetime_secs: f32,
    pub base_opacity: f32,
    pub opacity: f32,
    pub size: f32,
    /// Chosen once at spawn.
    pub color: Rgb,
    pub glow: bool,
    pub cell_shaded: bool,
    behavior: BehaviorKind,
    scratch: BehaviorState,
    decoration: Option<AppliedDecoration>,
}

impl Particle {
    /// Fully reset record, as stored in the free set.
    pub fn dormant() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            effective_velocity: Vec2::ZERO,
            life: 0.0,
            lifetime_secs: 1.0,
            base_opacity: 0.0,
            opacity: 0.0,
            size: 0.0,
            color: Rgb::WHITE,
            glow: false,
            cell_shaded: false,
            behavior: BehaviorKind::Ambient,
            scratch: BehaviorState::Empty,
            decoration: None,
        }
    }

    pub fn behavior(&self) -> BehaviorKind {
        self.behavior
    }

    pub fn scratch(&self) -> &BehaviorState {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut BehaviorState {
        &mut self.scratch
    }

    /// Switches behavior. The previous scratch value is dropped as a whole.
    pub fn assign_behavior(&mut self, kind: BehaviorKind, scratch: BehaviorState) {
        self.behavior = kind;
        self.scratch = scratch;
    }

    pub fn decoration(&self) -> Option<&AppliedDecoration> {
        self.decoration.as_ref()
    }

    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::for_life(self.life)
    }

    pub(crate) fn decorate(&mut self, token: u64, decoration: Decoration) {
        self.decoration = Some(AppliedDecoration { token, decoration });
    }

    /// Strips the decoration applied by `token`, leaving any other alone.
    pub(crate) fn undecorate(&mut self, token: u64) -> bool {
        if self.decoration.map(|d| d.token) == Some(token) {
            self.decoration = None;
            true
        } else {
            false
        }
    }

    pub fn view(&self) -> ParticleView {
        let decoration = self.decoration.map(|d| d.decoration);
        ParticleView {
            position: self.position,
            velocity: self.effective_velocity,
            life: self.life,
            opacity: self.opacity,
            size: self.size,
            color: self.color,
            glow: self.glow || decoration.is_some_and(|d| d.glow_boost > 0.0),
            glow_boost: decoration.map_or(0.0, |d| d.glow_boost),
            cell_shaded: self.cell_shaded || decoration.is_some_and(|d| d.cell_shaded),
            behavior: self.behavior,
            phase: self.phase(),
        }
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::dormant()
    }
}

/// Read-only copy of a particle as handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub life: f32,
    pub opacity: f32,
    pub size: f32,
    pub color: Rgb,
    pub glow: bool,
    pub glow_boost: f32,
    pub cell_shaded: bool,
    pub behavior: BehaviorKind,
    pub phase: LifecyclePhase,
}
