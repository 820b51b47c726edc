use glam::Vec2;
use serde::Serialize;

use super::{InterpolationCurve, ShapeDescriptor};
use crate::{
    registry::{Definition, Registry},
    timeline::MusicalClock,
    Result,
};

/// Fraction of the transition at each end over which quantization fades in
/// and out.
const EDGE_WINDOW: f32 = 0.2;
const COMPLETE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MorphOptions {
    /// Abandon an in-flight morph at its current pose instead of queueing.
    pub force: bool,
    /// Overrides the configured morph length.
    pub duration_beats: Option<f64>,
}

impl MorphOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            duration_beats: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MorphOutcome {
    Started,
    /// Waiting in the pending slot. `replaced` is the request it displaced.
    Queued { replaced: Option<String> },
    /// Started after abandoning the morph toward `abandoned`.
    Forced { abandoned: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MorphEvent {
    Started { target: String },
    Completed { shape: String },
}

/// Ceiling on quantization strength for a tempo. Slow tempos have long
/// sub-beats, so stepping is softened there.
pub fn quantization_strength_for_bpm(bpm: f32) -> f32 {
    (bpm / 120.0).clamp(0.5, 1.0)
}

/// Snaps `raw` progress toward multiples of `step`, fully mid-transition and
/// not at all at either end. Non-decreasing in `raw`.
pub fn quantize_progress(raw: f32, step: f32, strength: f32) -> f32 {
    if raw >= 1.0 {
        return 1.0;
    }
    if raw <= 0.0 || step <= 0.0 {
        return raw.max(0.0);
    }
    let snapped = (raw / step).floor() * step;
    // The envelope is held constant across a step. Evaluating it at `raw`
    // would let a rising envelope drag the output back toward `snapped`.
    let envelope = (snapped / EDGE_WINDOW)
        .min((1.0 - (snapped + step)) / EDGE_WINDOW)
        .clamp(0.0, 1.0);
    raw + (snapped - raw) * strength.clamp(0.0, 1.0) * envelope
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphTransition {
    source: String,
    target: String,
    from: Vec<Vec2>,
    to: Vec<Vec2>,
    curve: InterpolationCurve,
    start_beat: f64,
    duration_beats: f64,
    raw_progress: f32,
    progress: f32,
    strength: f32,
}

impl MorphTransition {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Quantized progress in [0, 1].
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn raw_progress(&self) -> f32 {
        self.raw_progress
    }

    pub fn quantization_strength(&self) -> f32 {
        self.strength
    }

    pub fn duration_beats(&self) -> f64 {
        self.duration_beats
    }

    fn update(&mut self, clock: &MusicalClock) {
        let elapsed = clock.current_beat() - self.start_beat;
        self.raw_progress = if elapsed + COMPLETE_EPSILON >= self.duration_beats {
            1.0
        } else {
            (elapsed / self.duration_beats).clamp(0.0, 1.0) as f32
        };
        self.strength = quantization_strength_for_bpm(clock.bpm());
        let step = (clock.sub_beat_step() / self.duration_beats) as f32;
        // A tempo change mid-morph alters the step; hold rather than retreat.
        self.progress = quantize_progress(self.raw_progress, step, self.strength).max(self.progress);
    }

    fn is_finished(&self) -> bool {
        self.raw_progress >= 1.0
    }

    fn pose(&self) -> Vec<Vec2> {
        let count = self.from.len();
        self.from
            .iter()
            .zip(&self.to)
            .enumerate()
            .map(|(i, (a, b))| a.lerp(*b, self.curve.local_progress(self.progress, i, count)))
            .collect()
    }
}

/// Shape state as handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MorphSnapshot {
    /// Last shape fully reached.
    pub shape: String,
    pub target: Option<String>,
    pub progress: Option<f32>,
    pub pending: Option<String>,
    pub points: Vec<Vec2>,
}

#[derive(Debug)]
pub struct ShapeMorpher {
    shapes: Registry<ShapeDescriptor>,
    shape: String,
    pose: Vec<Vec2>,
    transition: Option<MorphTransition>,
    pending: Option<(String, f64)>,
    default_duration_beats: f64,
}

impl ShapeMorpher {
    pub fn new(
        shapes: Registry<ShapeDescriptor>,
        initial: &str,
        default_duration_beats: f64,
    ) -> Result<Self> {
        let pose = shapes.get(initial)?.points().to_vec();
        Ok(Self {
            shapes,
            shape: initial.to_string(),
            pose,
            transition: None,
            pending: None,
            default_duration_beats,
        })
    }

    pub fn shapes(&self) -> &Registry<ShapeDescriptor> {
        &self.shapes
    }

    pub fn register(&mut self, shape: ShapeDescriptor) -> Result<bool> {
        self.shapes.register(shape)
    }

    /// Starts a morph toward `id`, or parks it in the pending slot while
    /// another morph is running. A later non-forced request displaces an
    /// earlier pending one.
    pub fn morph_to(
        &mut self,
        id: &str,
        options: MorphOptions,
        clock: &MusicalClock,
    ) -> Result<MorphOutcome> {
        let target = self.shapes.get(id)?.clone();
        let duration = options
            .duration_beats
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(self.default_duration_beats);

        let Some(running) = self.transition.take() else {
            self.start(&target, duration, clock);
            return Ok(MorphOutcome::Started);
        };

        if options.force {
            self.pose = running.pose();
            self.pending = None;
            tracing::info!(
                abandoned = %running.target,
                to = %target.id(),
                at = running.progress,
                "morph forced"
            );
            self.start(&target, duration, clock);
            return Ok(MorphOutcome::Forced {
                abandoned: running.target,
            });
        }

        self.transition = Some(running);
        let replaced = self
            .pending
            .replace((target.id().to_string(), duration))
            .map(|(id, _)| id);
        tracing::debug!(to = %target.id(), ?replaced, "morph queued");
        Ok(MorphOutcome::Queued { replaced })
    }

    /// Recomputes progress for the clock's current beat; completes the
    /// running morph and starts the pending one when due.
    pub fn advance(&mut self, clock: &MusicalClock) -> Vec<MorphEvent> {
        let mut events = Vec::new();
        let Some(transition) = self.transition.as_mut() else {
            return events;
        };
        transition.update(clock);
        if !transition.is_finished() {
            return events;
        }

        if let Some(done) = self.transition.take() {
            self.pose = done.to;
            self.shape = done.target;
            tracing::info!(shape = %self.shape, "morph complete");
            events.push(MorphEvent::Completed {
                shape: self.shape.clone(),
            });
        }
        if let Some((id, duration)) = self.pending.take() {
            if let Ok(target) = self.shapes.get(&id).cloned() {
                self.start(&target, duration, clock);
                events.push(MorphEvent::Started { target: id });
            }
        }
        events
    }

    /// Freezes at the current interpolated pose and drops the pending slot.
    /// Returns the id the abandoned morph was heading to.
    pub fn stop(&mut self) -> Option<String> {
        self.pending = None;
        let running = self.transition.take()?;
        self.pose = running.pose();
        Some(running.target)
    }

    pub fn transition(&self) -> Option<&MorphTransition> {
        self.transition.as_ref()
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn shape(&self) -> &str {
        &self.shape
    }

    pub fn pose(&self) -> Vec<Vec2> {
        match &self.transition {
            Some(transition) => transition.pose(),
            None => self.pose.clone(),
        }
    }

    pub fn snapshot(&self) -> MorphSnapshot {
        MorphSnapshot {
            shape: self.shape.clone(),
            target: self.transition.as_ref().map(|t| t.target.clone()),
            progress: self.transition.as_ref().map(|t| t.progress),
            pending: self.pending().map(str::to_string),
            points: self.pose(),
        }
    }

    fn start(&mut self, target: &ShapeDescriptor, duration_beats: f64, clock: &MusicalClock) {
        let mut transition = MorphTransition {
            source: self.shape.clone(),
            target: target.id().to_string(),
            from: self.pose.clone(),
            to: target.points().to_vec(),
            curve: target.curve(),
            start_beat: clock.current_beat(),
            duration_beats,
            raw_progress: 0.0,
            progress: 0.0,
            strength: quantization_strength_for_bpm(clock.bpm()),
        };
        transition.update(clock);
        tracing::info!(
            from = %transition.source,
            to = %transition.target,
            beats = duration_beats,
            "morph started"
        );
        self.transition = Some(transition);
    }
}
