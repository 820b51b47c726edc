use serde::Serialize;

use crate::{
    emotion::RenderParameters,
    gesture::{ActiveGesture, GestureTransform},
    particle::ParticleView,
    shape::MorphSnapshot,
    Result,
};

/// Everything a renderer needs for one frame. Built fresh every tick and
/// never touched by the engine again.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSnapshot {
    pub tick: u64,
    pub beat: f64,
    pub bpm: f32,
    pub particles: Vec<ParticleView>,
    /// `None` once the engine is destroyed.
    pub emotion: Option<RenderParameters>,
    pub gestures: Vec<ActiveGesture>,
    /// All active gesture transforms combined.
    pub gesture_transform: GestureTransform,
    pub morph: Option<MorphSnapshot>,
}

impl RenderSnapshot {
    /// Snapshot with nothing to draw.
    pub fn empty(tick: u64, beat: f64, bpm: f32) -> Self {
        Self {
            tick,
            beat,
            bpm,
            particles: Vec::new(),
            emotion: None,
            gestures: Vec::new(),
            gesture_transform: GestureTransform::IDENTITY,
            morph: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty() && self.emotion.is_none() && self.morph.is_none()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Rendering backend abstraction. Receives snapshots read-only; it never
/// reaches back into the engine.
pub trait Renderer {
    fn draw(&mut self, snapshot: &RenderSnapshot) -> Result<()>;
}

/// Renderer for headless hosts and tests: keeps the latest snapshot and a
/// few running totals.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    frames: u64,
    peak_particles: usize,
    last: Option<RenderSnapshot>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn peak_particles(&self) -> usize {
        self.peak_particles
    }

    pub fn last(&self) -> Option<&RenderSnapshot> {
        self.last.as_ref()
    }
}

impl Renderer for HeadlessRenderer {
    fn draw(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
        self.frames += 1;
        self.peak_particles = self.peak_particles.max(snapshot.particles.len());
        self.last = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_serializes() {
        let snapshot = RenderSnapshot::empty(3, 1.5, 120.0);
        assert!(snapshot.is_empty());
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"gestureTransform\""));
        assert!(json.contains("\"morph\": null"));
    }

    #[test]
    fn headless_renderer_tracks_frames() {
        let mut renderer = HeadlessRenderer::new();
        renderer.draw(&RenderSnapshot::empty(1, 0.0, 120.0)).unwrap();
        renderer.draw(&RenderSnapshot::empty(2, 0.1, 120.0)).unwrap();
        assert_eq!(renderer.frames(), 2);
        assert_eq!(renderer.last().unwrap().tick, 2);
        assert_eq!(renderer.peak_particles(), 0);
    }
}
