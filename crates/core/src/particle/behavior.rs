//! Per-particle motion rules.
//!
//! Each [`BehaviorKind`] owns one [`BehaviorState`] variant as its scratch
//! space. A rule's `init` produces that variant at spawn and its `update`
//! only ever matches on its own variant, so one behavior cannot observe
//! another's leftovers.

use std::{collections::HashMap, f32::consts::TAU};

use glam::Vec2;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use super::Particle;
use crate::{emotion::RenderParameters, gesture::GestureTransform};

/// Floor the popcorn behavior bounces on, in core radii below center.
const POPCORN_FLOOR: f32 = -1.4;
const POPCORN_GRAVITY: f32 = 2.2;
const MAX_AGGRESSIVE_SPEED: f32 = 1.6;
const MAX_SCATTER_SPEED: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    Ambient,
    Rising,
    Falling,
    Popcorn,
    Burst,
    Orbiting,
    Aggressive,
    Scattering,
    Repelling,
    Watching,
    Resting,
    Radiant,
    Ascending,
    Glitchy,
}

impl BehaviorKind {
    pub const ALL: [BehaviorKind; 14] = [
        BehaviorKind::Ambient,
        BehaviorKind::Rising,
        BehaviorKind::Falling,
        BehaviorKind::Popcorn,
        BehaviorKind::Burst,
        BehaviorKind::Orbiting,
        BehaviorKind::Aggressive,
        BehaviorKind::Scattering,
        BehaviorKind::Repelling,
        BehaviorKind::Watching,
        BehaviorKind::Resting,
        BehaviorKind::Radiant,
        BehaviorKind::Ascending,
        BehaviorKind::Glitchy,
    ];
}

/// Behavior-owned scratch data, one variant per behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorState {
    Empty,
    Ambient { drift_phase: f32, drift_rate: f32 },
    Rising { wobble_phase: f32, buoyancy: f32 },
    Falling { sway_phase: f32, terminal: f32 },
    Popcorn { delay: f32, launch: Vec2, popped: bool, bounces: u8 },
    Burst { drag: f32 },
    Orbiting { angle: f32, radius: f32, angular_speed: f32 },
    Aggressive { shake_phase: f32, intensity: f32 },
    Scattering { heading: f32, panic: f32 },
    Repelling { push: f32 },
    Watching { pause_left: f32, move_left: f32, heading: f32 },
    Resting { phase: f32 },
    Radiant { heading: f32, pulse_phase: f32 },
    Ascending { sway_phase: f32, climb: f32 },
    Glitchy { next_jump: f32, seed: u32 },
}

impl BehaviorState {
    /// Behavior that owns this variant. `None` for [`BehaviorState::Empty`].
    pub fn kind(&self) -> Option<BehaviorKind> {
        let kind = match self {
            BehaviorState::Empty => return None,
            BehaviorState::Ambient { .. } => BehaviorKind::Ambient,
            BehaviorState::Rising { .. } => BehaviorKind::Rising,
            BehaviorState::Falling { .. } => BehaviorKind::Falling,
            BehaviorState::Popcorn { .. } => BehaviorKind::Popcorn,
            BehaviorState::Burst { .. } => BehaviorKind::Burst,
            BehaviorState::Orbiting { .. } => BehaviorKind::Orbiting,
            BehaviorState::Aggressive { .. } => BehaviorKind::Aggressive,
            BehaviorState::Scattering { .. } => BehaviorKind::Scattering,
            BehaviorState::Repelling { .. } => BehaviorKind::Repelling,
            BehaviorState::Watching { .. } => BehaviorKind::Watching,
            BehaviorState::Resting { .. } => BehaviorKind::Resting,
            BehaviorState::Radiant { .. } => BehaviorKind::Radiant,
            BehaviorState::Ascending { .. } => BehaviorKind::Ascending,
            BehaviorState::Glitchy { .. } => BehaviorKind::Glitchy,
        };
        Some(kind)
    }
}

/// Everything a behavior may read during an update.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorFrame<'a> {
    pub params: &'a RenderParameters,
    /// Combined transform of every gesture active this tick.
    pub motion: GestureTransform,
}

/// Sets spawn velocity and flags, returns the behavior's initial scratch.
pub type BehaviorInit = fn(&mut Particle, &mut StdRng) -> BehaviorState;
/// Advances one particle by `dt` seconds.
pub type BehaviorUpdate = fn(&mut Particle, &BehaviorFrame<'_>, f32);

#[derive(Clone, Copy)]
pub struct BehaviorRule {
    pub init: BehaviorInit,
    pub update: BehaviorUpdate,
}

impl std::fmt::Debug for BehaviorRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRule").finish_non_exhaustive()
    }
}

/// Rules keyed by behavior id. Every [`BehaviorKind`] has a built-in rule;
/// hosts may swap in their own with [`BehaviorRegistry::register`].
#[derive(Debug, Clone)]
pub struct BehaviorRegistry {
    rules: HashMap<BehaviorKind, BehaviorRule>,
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        let rules = BehaviorKind::ALL
            .into_iter()
            .map(|kind| (kind, builtin_rule(kind)))
            .collect();
        Self { rules }
    }
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rule for `kind`, returning the previous one.
    pub fn register(&mut self, kind: BehaviorKind, rule: BehaviorRule) -> Option<BehaviorRule> {
        self.rules.insert(kind, rule)
    }

    pub fn rule(&self, kind: BehaviorKind) -> BehaviorRule {
        self.rules
            .get(&kind)
            .copied()
            .unwrap_or_else(|| builtin_rule(kind))
    }

    /// Hands `particle` to `kind`, replacing any previous scratch data.
    pub fn assign(&self, kind: BehaviorKind, particle: &mut Particle, rng: &mut StdRng) {
        particle.assign_behavior(kind, BehaviorState::Empty);
        let scratch = (self.rule(kind).init)(particle, rng);
        particle.assign_behavior(kind, scratch);
    }

    pub fn update(&self, particle: &mut Particle, frame: &BehaviorFrame<'_>, dt: f32) {
        (self.rule(particle.behavior()).update)(particle, frame, dt);
    }
}

fn builtin_rule(kind: BehaviorKind) -> BehaviorRule {
    let (init, update): (BehaviorInit, BehaviorUpdate) = match kind {
        BehaviorKind::Ambient => (init_ambient, update_ambient),
        BehaviorKind::Rising => (init_rising, update_rising),
        BehaviorKind::Falling => (init_falling, update_falling),
        BehaviorKind::Popcorn => (init_popcorn, update_popcorn),
        BehaviorKind::Burst => (init_burst, update_burst),
        BehaviorKind::Orbiting => (init_orbiting, update_orbiting),
        BehaviorKind::Aggressive => (init_aggressive, update_aggressive),
        BehaviorKind::Scattering => (init_scattering, update_scattering),
        BehaviorKind::Repelling => (init_repelling, update_repelling),
        BehaviorKind::Watching => (init_watching, update_watching),
        BehaviorKind::Resting => (init_resting, update_resting),
        BehaviorKind::Radiant => (init_radiant, update_radiant),
        BehaviorKind::Ascending => (init_ascending, update_ascending),
        BehaviorKind::Glitchy => (init_glitchy, update_glitchy),
    };
    BehaviorRule { init, update }
}

fn heading(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

fn outward_angle(particle: &Particle) -> f32 {
    particle.position.y.atan2(particle.position.x)
}

fn clamp_speed(velocity: Vec2, max: f32) -> Vec2 {
    velocity.clamp_length_max(max)
}

fn init_ambient(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = heading(rng.gen_range(0.0..TAU)) * rng.gen_range(0.15..0.35);
    BehaviorState::Ambient {
        drift_phase: rng.gen_range(0.0..TAU),
        drift_rate: rng.gen_range(0.5..1.5),
    }
}

fn update_ambient(particle: &mut Particle, frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Ambient {
        drift_phase,
        drift_rate,
    } = &mut particle.scratch
    {
        *drift_phase = (*drift_phase + *drift_rate * dt).rem_euclid(TAU);
        let turn = drift_phase.sin() * 0.5 * dt;
        particle.velocity = Vec2::from_angle(turn).rotate(particle.velocity);
        // Expanding gestures push the haze outward.
        let push = (frame.motion.scale - 1.0) * 0.8;
        particle.velocity += particle.position.normalize_or_zero() * push * dt;
    }
}

fn init_rising(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = Vec2::new(rng.gen_range(-0.05..0.05), rng.gen_range(0.2..0.4));
    BehaviorState::Rising {
        wobble_phase: rng.gen_range(0.0..TAU),
        buoyancy: rng.gen_range(0.1..0.3),
    }
}

fn update_rising(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Rising {
        wobble_phase,
        buoyancy,
    } = &mut particle.scratch
    {
        *wobble_phase = (*wobble_phase + 3.0 * dt).rem_euclid(TAU);
        particle.velocity.y = (particle.velocity.y + *buoyancy * dt).min(0.9);
        particle.velocity.x = wobble_phase.sin() * 0.1;
    }
}

fn init_falling(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = Vec2::new(rng.gen_range(-0.1..0.1), rng.gen_range(-0.2..-0.1));
    BehaviorState::Falling {
        sway_phase: rng.gen_range(0.0..TAU),
        terminal: rng.gen_range(-0.6..-0.4),
    }
}

fn update_falling(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Falling {
        sway_phase,
        terminal,
    } = &mut particle.scratch
    {
        *sway_phase = (*sway_phase + 2.0 * dt).rem_euclid(TAU);
        particle.velocity.y = (particle.velocity.y - 0.3 * dt).max(*terminal);
        particle.velocity.x = sway_phase.sin() * 0.08;
    }
}

fn init_popcorn(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = Vec2::ZERO;
    let spread = rng.gen_range(-0.6..0.6);
    BehaviorState::Popcorn {
        delay: rng.gen_range(0.0..0.4),
        launch: Vec2::new(spread, rng.gen_range(1.2..2.0)),
        popped: false,
        bounces: 0,
    }
}

fn update_popcorn(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    let Particle {
        position,
        velocity,
        scratch,
        ..
    } = particle;
    if let BehaviorState::Popcorn {
        delay,
        launch,
        popped,
        bounces,
    } = scratch
    {
        if !*popped {
            *delay -= dt;
            if *delay <= 0.0 {
                *popped = true;
                *velocity = *launch;
            }
            return;
        }
        velocity.y -= POPCORN_GRAVITY * dt;
        if position.y < POPCORN_FLOOR && velocity.y < 0.0 && *bounces < 2 {
            velocity.y = -velocity.y * 0.5;
            *bounces += 1;
        }
    }
}

fn init_burst(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    let angle = outward_angle(particle) + rng.gen_range(-0.3..0.3);
    particle.velocity = heading(angle) * rng.gen_range(1.0..1.8);
    BehaviorState::Burst {
        drag: rng.gen_range(1.5..2.5),
    }
}

fn update_burst(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Burst { drag } = particle.scratch {
        particle.velocity *= (1.0 - drag * dt).max(0.0);
    }
}

fn init_orbiting(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = Vec2::ZERO;
    let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    BehaviorState::Orbiting {
        angle: outward_angle(particle),
        radius: particle.position.length().max(0.5),
        angular_speed: rng.gen_range(0.8..1.6) * direction,
    }
}

fn update_orbiting(particle: &mut Particle, frame: &BehaviorFrame<'_>, dt: f32) {
    let Particle {
        position,
        velocity,
        scratch,
        ..
    } = particle;
    if let BehaviorState::Orbiting {
        angle,
        radius,
        angular_speed,
    } = scratch
    {
        *angle = (*angle + *angular_speed * dt).rem_euclid(TAU);
        let target_radius = *radius * frame.params.breath_scale * frame.motion.scale;
        let radial = heading(*angle);
        let tangent = radial.perp() * *angular_speed * target_radius;
        let correction = (target_radius - position.length()) * 2.0;
        *velocity = tangent + radial * correction;
    }
}

fn init_aggressive(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = heading(rng.gen_range(0.0..TAU)) * rng.gen_range(0.5..1.0);
    BehaviorState::Aggressive {
        shake_phase: rng.gen_range(0.0..TAU),
        intensity: rng.gen_range(0.5..1.0),
    }
}

fn update_aggressive(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Aggressive {
        shake_phase,
        intensity,
    } = &mut particle.scratch
    {
        *shake_phase = (*shake_phase + 25.0 * dt).rem_euclid(TAU);
        let jitter = particle.velocity.normalize_or_zero().perp() * shake_phase.sin();
        particle.velocity =
            clamp_speed(particle.velocity + jitter * *intensity * 4.0 * dt, MAX_AGGRESSIVE_SPEED);
    }
}

fn init_scattering(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    let angle = outward_angle(particle) + rng.gen_range(-0.5..0.5);
    particle.velocity = heading(angle) * 0.3;
    BehaviorState::Scattering {
        heading: angle,
        panic: rng.gen_range(1.0..1.5),
    }
}

fn update_scattering(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Scattering { heading: angle, panic } = &mut particle.scratch {
        particle.velocity =
            clamp_speed(particle.velocity + heading(*angle) * *panic * dt, MAX_SCATTER_SPEED);
        *panic *= (1.0 - 0.5 * dt).max(0.0);
    }
}

fn init_repelling(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = particle.position.normalize_or_zero() * rng.gen_range(0.2..0.4);
    BehaviorState::Repelling {
        push: rng.gen_range(0.6..1.0),
    }
}

fn update_repelling(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Repelling { push } = particle.scratch {
        let strength = push / (1.0 + particle.position.length_squared());
        particle.velocity += particle.position.normalize_or_zero() * strength * dt;
    }
}

fn init_watching(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    let angle = rng.gen_range(0.0..TAU);
    particle.velocity = heading(angle) * 0.3;
    BehaviorState::Watching {
        pause_left: 0.0,
        move_left: rng.gen_range(0.3..0.8),
        heading: angle,
    }
}

fn update_watching(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Watching {
        pause_left,
        move_left,
        heading: angle,
    } = &mut particle.scratch
    {
        if *move_left > 0.0 {
            *move_left -= dt;
            if *move_left <= 0.0 {
                *pause_left = 0.4;
                particle.velocity = Vec2::ZERO;
            }
        } else {
            *pause_left -= dt;
            if *pause_left <= 0.0 {
                // Golden-angle turn so successive glances do not repeat.
                *angle = (*angle + 2.399_963).rem_euclid(TAU);
                *move_left = 0.5;
                particle.velocity = heading(*angle) * 0.3;
            }
        }
    }
}

fn init_resting(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = Vec2::new(rng.gen_range(-0.03..0.03), rng.gen_range(-0.03..0.03));
    BehaviorState::Resting {
        phase: rng.gen_range(0.0..TAU),
    }
}

fn update_resting(particle: &mut Particle, frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Resting { phase } = &mut particle.scratch {
        *phase = (*phase + 1.5 * dt).rem_euclid(TAU);
        particle.velocity.y = phase.sin() * 0.04 + frame.motion.offset.y * 0.1;
        particle.velocity.x *= (1.0 - dt).max(0.0);
    }
}

fn init_radiant(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.glow = true;
    let angle = outward_angle(particle);
    particle.velocity = heading(angle) * 0.6;
    BehaviorState::Radiant {
        heading: angle,
        pulse_phase: rng.gen_range(0.0..TAU),
    }
}

fn update_radiant(particle: &mut Particle, frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Radiant {
        heading: angle,
        pulse_phase,
    } = &mut particle.scratch
    {
        *pulse_phase = (*pulse_phase + 6.0 * dt).rem_euclid(TAU);
        let speed = 0.6 * (1.0 + 0.3 * pulse_phase.sin()) * frame.motion.scale;
        particle.velocity = heading(*angle) * speed;
    }
}

fn init_ascending(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.velocity = Vec2::new(0.0, rng.gen_range(0.3..0.5));
    BehaviorState::Ascending {
        sway_phase: rng.gen_range(0.0..TAU),
        climb: rng.gen_range(0.2..0.4),
    }
}

fn update_ascending(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    if let BehaviorState::Ascending { sway_phase, climb } = &mut particle.scratch {
        *sway_phase = (*sway_phase + 2.5 * dt).rem_euclid(TAU);
        particle.velocity.y = (particle.velocity.y + *climb * dt).min(1.0);
        // Converge on the center column while climbing.
        particle.velocity.x = -particle.position.x * 0.5 + sway_phase.sin() * 0.03;
    }
}

fn init_glitchy(particle: &mut Particle, rng: &mut StdRng) -> BehaviorState {
    particle.cell_shaded = true;
    particle.velocity = heading(rng.gen_range(0.0..TAU)) * rng.gen_range(0.05..0.2);
    BehaviorState::Glitchy {
        next_jump: rng.gen_range(0.05..0.25),
        seed: rng.gen_range(1..u32::MAX),
    }
}

fn update_glitchy(particle: &mut Particle, _frame: &BehaviorFrame<'_>, dt: f32) {
    let Particle {
        position, scratch, ..
    } = particle;
    if let BehaviorState::Glitchy { next_jump, seed } = scratch {
        *next_jump -= dt;
        if *next_jump <= 0.0 {
            *seed = xorshift(*seed);
            let dx = ((*seed & 0xFF) as f32 / 255.0 - 0.5) * 0.3;
            let dy = (((*seed >> 8) & 0xFF) as f32 / 255.0 - 0.5) * 0.3;
            *position += Vec2::new(dx, dy);
            *next_jump = 0.05 + ((*seed >> 16) % 100) as f32 / 500.0;
        }
    }
}

fn xorshift(mut x: u32) -> u32 {
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}
