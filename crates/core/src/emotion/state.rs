use std::f32::consts::TAU;

use super::{
    blend_palettes, lerp, mean_color, normalize_palette, BreathingPattern, EmotionDefinition,
    RenderParameters, UndertoneModifier, WeightedColor,
};
use crate::{particle::BehaviorKind, registry::Registry, Result};

/// Fraction of the duration under which a transition counts as finished.
const SETTLE_TOLERANCE: f32 = 1e-5;

/// Unscaled emotion values at one point of a transition. The undertone is
/// carried alongside, never folded in, so scaling always starts from here.
#[derive(Debug, Clone)]
struct Blend {
    palette: Vec<WeightedColor>,
    particle_rate: f32,
    glow_intensity: f32,
    breathing: BreathingPattern,
    particle_speed: f32,
    behavior: BehaviorKind,
    undertone: UndertoneModifier,
}

impl Blend {
    fn settled(emotion: &EmotionDefinition, undertone: &UndertoneModifier) -> Self {
        Self {
            palette: normalize_palette(&emotion.palette),
            particle_rate: emotion.particle_rate,
            glow_intensity: emotion.glow_intensity,
            breathing: emotion.breathing,
            particle_speed: emotion.particle_speed,
            behavior: emotion.behavior,
            undertone: undertone.clone(),
        }
    }

    fn toward(&self, target: &Blend, t: f32) -> Blend {
        Blend {
            palette: blend_palettes(&self.palette, &target.palette, t),
            particle_rate: lerp(self.particle_rate, target.particle_rate, t),
            glow_intensity: lerp(self.glow_intensity, target.glow_intensity, t),
            breathing: self.breathing.lerp(target.breathing, t),
            particle_speed: lerp(self.particle_speed, target.particle_speed, t),
            behavior: if t >= 0.5 {
                target.behavior
            } else {
                self.behavior
            },
            undertone: self.undertone.lerp(&target.undertone, t),
        }
    }
}

/// How a `set_emotion` call was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionChange {
    /// Zero duration: the target is active immediately.
    Snapped,
    /// A transition started, or an in-flight one was retargeted.
    Transitioning,
}

/// Holds the active emotion, undertone and the single in-flight transition.
#[derive(Debug)]
pub struct EmotionStateMachine {
    emotions: Registry<EmotionDefinition>,
    undertones: Registry<UndertoneModifier>,
    from: Blend,
    target: EmotionDefinition,
    target_undertone: UndertoneModifier,
    elapsed_ms: f32,
    duration_ms: f32,
    progress: f32,
    default_transition_ms: f32,
    breath_phase: f32,
}

impl EmotionStateMachine {
    pub fn new(
        emotions: Registry<EmotionDefinition>,
        undertones: Registry<UndertoneModifier>,
        initial: &str,
        default_transition_ms: f32,
    ) -> Result<Self> {
        let target = emotions.get(initial)?.clone();
        let target_undertone = undertones.get(super::CLEAR_UNDERTONE)?.clone();
        Ok(Self {
            from: Blend::settled(&target, &target_undertone),
            emotions,
            undertones,
            target,
            target_undertone,
            elapsed_ms: 0.0,
            duration_ms: 0.0,
            progress: 1.0,
            default_transition_ms,
            breath_phase: 0.0,
        })
    }

    /// Starts a transition toward `id`, or retargets the one in flight from
    /// its current interpolated point. `duration_ms` of zero snaps.
    pub fn set_emotion(
        &mut self,
        id: &str,
        undertone: Option<&str>,
        duration_ms: Option<f32>,
    ) -> Result<EmotionChange> {
        let target = self.emotions.get(id)?.clone();
        let target_undertone = self
            .undertones
            .get(undertone.unwrap_or(super::CLEAR_UNDERTONE))?
            .clone();
        let duration_ms = duration_ms
            .filter(|d| d.is_finite())
            .unwrap_or(self.default_transition_ms)
            .max(0.0);

        let change = if duration_ms <= 0.0 {
            self.from = Blend::settled(&target, &target_undertone);
            self.progress = 1.0;
            self.elapsed_ms = 0.0;
            self.duration_ms = 0.0;
            EmotionChange::Snapped
        } else {
            self.from = self.current_blend();
            self.progress = 0.0;
            self.elapsed_ms = 0.0;
            self.duration_ms = duration_ms;
            EmotionChange::Transitioning
        };

        tracing::info!(
            emotion = %target.id,
            undertone = %target_undertone.id,
            duration_ms,
            ?change,
            "emotion change"
        );
        self.target = target;
        self.target_undertone = target_undertone;
        Ok(change)
    }

    /// Advances the transition linearly and the breathing cycle.
    pub fn tick(&mut self, dt_ms: f32) {
        let dt_ms = dt_ms.max(0.0);
        if self.progress < 1.0 {
            self.elapsed_ms += dt_ms;
            let remaining = self.duration_ms - self.elapsed_ms;
            self.progress = if remaining <= self.duration_ms * SETTLE_TOLERANCE {
                1.0
            } else {
                (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
            };
            if self.progress >= 1.0 {
                tracing::debug!(emotion = %self.target.id, "emotion transition settled");
            }
        }

        let breathing = self.current_blend().breathing;
        let cycles = breathing.rate / 60.0 * dt_ms / 1000.0;
        self.breath_phase = (self.breath_phase + cycles * TAU).rem_euclid(TAU);
    }

    /// Interpolated palette, rate, glow and breathing, recomputed from the
    /// unscaled blend and only then scaled by the undertone.
    pub fn render_parameters(&self) -> RenderParameters {
        let blend = self.current_blend();
        let undertone = &blend.undertone;
        let palette: Vec<WeightedColor> = blend
            .palette
            .iter()
            .map(|entry| WeightedColor {
                color: entry.color.with_saturation_delta(undertone.saturation_delta),
                weight: entry.weight,
            })
            .collect();

        RenderParameters {
            emotion: self.target.id.clone(),
            undertone: self.target_undertone.id.clone(),
            transition_progress: self.progress,
            primary_color: mean_color(&palette),
            palette,
            particle_rate: blend.particle_rate * undertone.rate_multiplier,
            glow_intensity: blend.glow_intensity,
            breathing: blend.breathing,
            breath_scale: 1.0 + blend.breathing.depth * self.breath_phase.sin(),
            speed_multiplier: blend.particle_speed * undertone.speed_multiplier,
            behavior: blend.behavior,
        }
    }

    pub fn emotion(&self) -> &str {
        &self.target.id
    }

    pub fn undertone(&self) -> &str {
        &self.target_undertone.id
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Length of the current transition as applied; 0 after a snap.
    pub fn duration_ms(&self) -> f32 {
        self.duration_ms
    }

    pub fn is_transitioning(&self) -> bool {
        self.progress < 1.0
    }

    /// Gestures the active emotion suggests. Empty means no preference.
    pub fn compatible_gestures(&self) -> &[String] {
        &self.target.gestures
    }

    pub fn emotions(&self) -> &Registry<EmotionDefinition> {
        &self.emotions
    }

    pub fn undertones(&self) -> &Registry<UndertoneModifier> {
        &self.undertones
    }

    pub fn register_emotion(&mut self, definition: EmotionDefinition) -> Result<bool> {
        self.emotions.register(definition)
    }

    pub fn register_undertone(&mut self, definition: UndertoneModifier) -> Result<bool> {
        self.undertones.register(definition)
    }

    fn current_blend(&self) -> Blend {
        let target = Blend::settled(&self.target, &self.target_undertone);
        if self.progress >= 1.0 {
            target
        } else {
            self.from.toward(&target, self.progress)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color::Rgb,
        emotion::{builtin_emotions, builtin_undertones},
        EmotiveError,
    };

    fn machine(initial: &str) -> EmotionStateMachine {
        EmotionStateMachine::new(
            Registry::with_builtins(builtin_emotions()),
            Registry::with_builtins(builtin_undertones()),
            initial,
            500.0,
        )
        .unwrap()
    }

    fn definition(id: &str) -> EmotionDefinition {
        builtin_emotions().into_iter().find(|e| e.id == id).unwrap()
    }

    fn share_of(params: &RenderParameters, emotion: &EmotionDefinition) -> f32 {
        params
            .palette
            .iter()
            .filter(|entry| emotion.palette.iter().any(|p| p.color.approx_eq(entry.color)))
            .map(|entry| entry.weight)
            .sum()
    }

    #[test]
    fn unknown_emotion_is_rejected_with_valid_ids() {
        let mut sm = machine("neutral");
        let err = sm.set_emotion("jubilation", None, None).unwrap_err();
        match err {
            EmotiveError::UnknownEmotion { id, valid } => {
                assert_eq!(id, "jubilation");
                assert!(valid.contains(&"joy".to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(sm.emotion(), "neutral");
    }

    #[test]
    fn unknown_undertone_is_rejected() {
        let mut sm = machine("neutral");
        assert!(matches!(
            sm.set_emotion("joy", Some("smug"), None),
            Err(EmotiveError::UnknownUndertone { .. })
        ));
    }

    #[test]
    fn zero_duration_snaps_without_residue() {
        let mut sm = machine("anger");
        sm.set_emotion("sadness", Some("intense"), Some(400.0)).unwrap();
        sm.tick(100.0);
        assert_eq!(
            sm.set_emotion("joy", None, Some(0.0)).unwrap(),
            EmotionChange::Snapped
        );

        let params = sm.render_parameters();
        let joy = definition("joy");
        assert_eq!(params.emotion, "joy");
        assert_eq!(params.undertone, "clear");
        assert_eq!(params.transition_progress, 1.0);
        assert_eq!(params.particle_rate, joy.particle_rate);
        assert_eq!(params.glow_intensity, joy.glow_intensity);
        assert_eq!(params.speed_multiplier, joy.particle_speed);
        assert_eq!(params.palette.len(), joy.palette.len());
        assert!((share_of(&params, &joy) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn progress_is_monotonic_and_settles_in_bounded_ticks() {
        let mut sm = machine("neutral");
        sm.set_emotion("joy", None, Some(500.0)).unwrap();
        let dt = 1000.0 / 60.0;
        let max_ticks = (500.0_f32 / dt).ceil() as usize;
        let mut last = sm.progress();
        for _ in 0..max_ticks {
            sm.tick(dt);
            assert!(sm.progress() >= last);
            last = sm.progress();
        }
        assert_eq!(sm.progress(), 1.0);
        assert!(!sm.is_transitioning());
    }

    #[test]
    fn halfway_transition_blends_palettes_evenly() {
        let mut sm = machine("joy");
        sm.set_emotion("sadness", None, Some(500.0)).unwrap();
        sm.tick(250.0);

        let params = sm.render_parameters();
        let joy_share = share_of(&params, &definition("joy"));
        let sad_share = share_of(&params, &definition("sadness"));
        assert!((joy_share - 0.5).abs() < 0.02, "joy share {joy_share}");
        assert!((sad_share - 0.5).abs() < 0.02, "sadness share {sad_share}");
    }

    #[test]
    fn retarget_starts_from_interpolated_point() {
        let mut sm = machine("neutral");
        let neutral_rate = definition("neutral").particle_rate;
        let joy_rate = definition("joy").particle_rate;
        sm.set_emotion("joy", None, Some(400.0)).unwrap();
        sm.tick(200.0);
        let midway = sm.render_parameters().particle_rate;
        assert!((midway - (neutral_rate + joy_rate) * 0.5).abs() < 1e-3);

        sm.set_emotion("anger", None, Some(400.0)).unwrap();
        let restarted = sm.render_parameters();
        assert_eq!(restarted.transition_progress, 0.0);
        assert!((restarted.particle_rate - midway).abs() < 1e-3);
    }

    #[test]
    fn undertone_scaling_does_not_compound() {
        let mut sm = machine("neutral");
        let boosted = UndertoneModifier {
            id: "brisk".to_string(),
            saturation_delta: 0.0,
            speed_multiplier: 1.1,
            rate_multiplier: 1.1,
        };
        sm.register_undertone(boosted).unwrap();
        sm.set_emotion("neutral", Some("brisk"), Some(0.0)).unwrap();

        let base = definition("neutral");
        for _ in 0..100 {
            sm.tick(16.0);
        }
        let params = sm.render_parameters();
        assert!((params.speed_multiplier - base.particle_speed * 1.1).abs() < 1e-5);
        assert!((params.particle_rate - base.particle_rate * 1.1).abs() < 1e-4);
    }

    #[test]
    fn saturation_delta_applies_to_a_fresh_copy() {
        let mut sm = machine("anger");
        sm.set_emotion("anger", Some("subdued"), Some(0.0)).unwrap();
        let first = sm.render_parameters();
        for _ in 0..50 {
            sm.tick(16.0);
        }
        let later = sm.render_parameters();
        for (a, b) in first.palette.iter().zip(&later.palette) {
            assert!(a.color.approx_eq(b.color));
        }
        let red = Rgb::from_hex("#D62828").unwrap();
        assert!(first.palette.iter().all(|e| !e.color.approx_eq(red)));
    }

    #[test]
    fn non_finite_duration_falls_back_to_the_default() {
        let mut sm = machine("neutral");
        let change = sm.set_emotion("joy", None, Some(f32::NAN)).unwrap();
        assert_eq!(change, EmotionChange::Transitioning);
        assert_eq!(sm.duration_ms(), 500.0);
        sm.set_emotion("anger", None, Some(-50.0)).unwrap();
        assert_eq!(sm.duration_ms(), 0.0);
    }

    #[test]
    fn behavior_switches_at_midpoint() {
        let mut sm = machine("neutral");
        sm.set_emotion("joy", None, Some(1000.0)).unwrap();
        sm.tick(400.0);
        assert_eq!(sm.render_parameters().behavior, BehaviorKind::Ambient);
        sm.tick(200.0);
        assert_eq!(sm.render_parameters().behavior, BehaviorKind::Popcorn);
    }

    #[test]
    fn breathing_scale_stays_within_depth() {
        let mut sm = machine("joy");
        let depth = definition("joy").breathing.depth;
        for _ in 0..200 {
            sm.tick(16.0);
            let scale = sm.render_parameters().breath_scale;
            assert!(scale >= 1.0 - depth - 1e-5 && scale <= 1.0 + depth + 1e-5);
        }
    }
}
