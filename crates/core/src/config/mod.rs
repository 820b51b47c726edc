use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EmotiveError, Result};

/// Top-level configuration handed to [`crate::ChoreographyEngine::new`].
///
/// Every component receives the values it needs from here at construction
/// time, so independent engines can coexist in one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Number of particle records allocated at warm-up.
    pub pool_capacity: usize,
    /// Largest `dt` a single tick may advance, in milliseconds.
    pub max_step_ms: f32,
    pub initial_bpm: f32,
    pub initial_emotion: String,
    pub initial_shape: String,
    /// Transition length used when `set_emotion` is called without one.
    pub default_transition_ms: f32,
    /// Queue bound for a single gesture id under the enqueue policy.
    pub gesture_queue_capacity: usize,
    /// Bound on all pending and active gesture entries together.
    pub max_scheduled_gestures: usize,
    pub morph_duration_beats: f64,
    pub particle_lifetime_ms: f32,
    /// Relative +/- spread applied to each particle's lifetime.
    pub lifetime_jitter: f32,
    /// Radius (in core radii) of the ring particles spawn on.
    pub spawn_radius: f32,
    pub seed: u64,
    pub diagnostic_log_capacity: usize,
    /// Overrides the tempo-adaptive gesture quantum when set.
    pub fixed_quantum: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 200,
            max_step_ms: 100.0,
            initial_bpm: 120.0,
            initial_emotion: "neutral".to_string(),
            initial_shape: "circle".to_string(),
            default_transition_ms: 500.0,
            gesture_queue_capacity: 4,
            max_scheduled_gestures: 16,
            morph_duration_beats: 2.0,
            particle_lifetime_ms: 1500.0,
            lifetime_jitter: 0.25,
            spawn_radius: 1.2,
            seed: 0x5EED_CAFE,
            diagnostic_log_capacity: 256,
            fixed_quantum: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Rejects values that would make the engine misbehave rather than
    /// merely look odd.
    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(EmotiveError::msg("poolCapacity must be at least 1"));
        }
        if !self.initial_bpm.is_finite() || self.initial_bpm <= 0.0 {
            return Err(EmotiveError::InvalidTempo(self.initial_bpm));
        }
        let positive = [
            ("maxStepMs", self.max_step_ms),
            ("particleLifetimeMs", self.particle_lifetime_ms),
            ("spawnRadius", self.spawn_radius),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EmotiveError::msg(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !self.default_transition_ms.is_finite() || self.default_transition_ms < 0.0 {
            return Err(EmotiveError::msg("defaultTransitionMs must be >= 0"));
        }
        if !(0.0..1.0).contains(&self.lifetime_jitter) {
            return Err(EmotiveError::msg("lifetimeJitter must be in [0, 1)"));
        }
        if !self.morph_duration_beats.is_finite() || self.morph_duration_beats <= 0.0 {
            return Err(EmotiveError::msg("morphDurationBeats must be positive"));
        }
        if let Some(quantum) = self.fixed_quantum {
            if !quantum.is_finite() || quantum <= 0.0 {
                return Err(EmotiveError::msg("fixedQuantum must be positive"));
            }
        }
        if self.gesture_queue_capacity == 0 || self.max_scheduled_gestures == 0 {
            return Err(EmotiveError::msg("gesture queue bounds must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fall_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "poolCapacity": 50, "initialBpm": 90 }"#)
            .unwrap();
        assert_eq!(config.pool_capacity, 50);
        assert_eq!(config.initial_bpm, 90.0);
        assert_eq!(config.initial_emotion, "neutral");
    }

    #[test]
    fn rejects_zero_tempo() {
        let err = EngineConfig::from_json_str(r#"{ "initialBpm": 0 }"#).unwrap_err();
        assert!(matches!(err, EmotiveError::InvalidTempo(_)));
    }

    #[test]
    fn rejects_empty_pool() {
        let config = EngineConfig {
            pool_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
