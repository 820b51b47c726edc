//! The root engine: owns every subsystem and advances them in a fixed order
//! inside one synchronous `tick`.

mod pack;

use serde::Serialize;

use crate::{
    config::EngineConfig,
    emotion::{builtin_emotions, builtin_undertones, EmotionChange, EmotionStateMachine},
    gesture::{builtin_gestures, GestureEvent, GestureOutcome, GestureScheduler},
    particle::{ParticleSystem, PoolStats},
    record::{DiagnosticKind, DiagnosticLog},
    registry::Registry,
    render::RenderSnapshot,
    shape::{builtin_shapes, MorphEvent, MorphOptions, MorphOutcome, ShapeMorpher},
    timeline::MusicalClock,
    EmotiveError, Result,
};

pub use pack::{AnyDefinition, CulturePack, PackSummary};

/// Read-only summary of engine state, for hosts and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub tick: u64,
    pub beat: f64,
    pub bpm: f32,
    pub quantum: f64,
    pub emotion: String,
    pub undertone: String,
    pub transition_progress: f32,
    pub pool: PoolStats,
    /// Spawns skipped because the pool was empty, since construction.
    pub spawn_skipped: u64,
    pub gesture_queue_depth: usize,
    pub active_gestures: Vec<String>,
    pub gestures_dropped: u64,
    pub shape: String,
    pub morph_progress: Option<f32>,
    pub pending_morph: Option<String>,
    pub destroyed: bool,
}

/// Choreography engine. One instance per mascot; instances share nothing.
#[derive(Debug)]
pub struct ChoreographyEngine {
    config: EngineConfig,
    clock: MusicalClock,
    emotions: EmotionStateMachine,
    gestures: GestureScheduler,
    morpher: ShapeMorpher,
    particles: ParticleSystem,
    diagnostics: DiagnosticLog,
    tick: u64,
    destroyed: bool,
}

impl ChoreographyEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let clock = MusicalClock::new(config.initial_bpm)?.with_fixed_quantum(config.fixed_quantum);
        let emotions = EmotionStateMachine::new(
            Registry::with_builtins(builtin_emotions()),
            Registry::with_builtins(builtin_undertones()),
            &config.initial_emotion,
            config.default_transition_ms,
        )?;
        let gestures = GestureScheduler::new(
            Registry::with_builtins(builtin_gestures()),
            config.gesture_queue_capacity,
            config.max_scheduled_gestures,
        );
        let morpher = ShapeMorpher::new(
            Registry::with_builtins(builtin_shapes()),
            &config.initial_shape,
            config.morph_duration_beats,
        )?;
        let particles = ParticleSystem::new(&config);
        let diagnostics = DiagnosticLog::new(config.diagnostic_log_capacity);

        tracing::info!(
            capacity = config.pool_capacity,
            bpm = config.initial_bpm,
            emotion = %config.initial_emotion,
            "choreography engine ready"
        );

        Ok(Self {
            config,
            clock,
            emotions,
            gestures,
            morpher,
            particles,
            diagnostics,
            tick: 0,
            destroyed: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &MusicalClock {
        &self.clock
    }

    pub fn emotions(&self) -> &EmotionStateMachine {
        &self.emotions
    }

    pub fn gestures(&self) -> &GestureScheduler {
        &self.gestures
    }

    pub fn morpher(&self) -> &ShapeMorpher {
        &self.morpher
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Gestures the active emotion suggests. Others still run.
    pub fn compatible_gestures(&self) -> &[String] {
        self.emotions.compatible_gestures()
    }

    pub fn set_emotion(
        &mut self,
        id: &str,
        undertone: Option<&str>,
        duration_ms: Option<f32>,
    ) -> Result<EmotionChange> {
        self.ensure_alive()?;
        let change = self.emotions.set_emotion(id, undertone, duration_ms)?;
        self.record(DiagnosticKind::EmotionChanged {
            emotion: self.emotions.emotion().to_string(),
            undertone: self.emotions.undertone().to_string(),
            duration_ms: self.emotions.duration_ms(),
        });
        Ok(change)
    }

    /// Schedules a gesture on the next quantum boundary. Unknown ids fail
    /// here; a full queue or an already-running gesture is reported through
    /// the outcome instead.
    pub fn trigger_gesture(&mut self, id: &str) -> Result<GestureOutcome> {
        self.ensure_alive()?;
        let outcome = self.gestures.request(id, &self.clock)?;

        let compatible = self.emotions.compatible_gestures();
        if !compatible.is_empty() && !compatible.iter().any(|g| g == id) {
            tracing::debug!(gesture = id, emotion = self.emotions.emotion(), "gesture outside the emotion's set");
            self.record(DiagnosticKind::IncompatibleGesture {
                gesture: id.to_string(),
                emotion: self.emotions.emotion().to_string(),
            });
        }

        let cancellations = self.gestures.take_events();
        self.apply_gesture_events(cancellations);

        let kind = match outcome {
            GestureOutcome::Scheduled { token, beat } | GestureOutcome::Replaced { token, beat, .. } => {
                DiagnosticKind::GestureScheduled {
                    gesture: id.to_string(),
                    token,
                    beat,
                }
            }
            GestureOutcome::Dropped => DiagnosticKind::GestureDropped {
                gesture: id.to_string(),
            },
            GestureOutcome::Ignored => DiagnosticKind::GestureIgnored {
                gesture: id.to_string(),
            },
        };
        self.record(kind);
        Ok(outcome)
    }

    pub fn morph_to(&mut self, id: &str, options: MorphOptions) -> Result<MorphOutcome> {
        self.ensure_alive()?;
        let outcome = self.morpher.morph_to(id, options, &self.clock)?;
        match &outcome {
            MorphOutcome::Started => self.record(DiagnosticKind::MorphStarted {
                shape: id.to_string(),
            }),
            MorphOutcome::Queued { .. } => self.record(DiagnosticKind::MorphQueued {
                shape: id.to_string(),
            }),
            MorphOutcome::Forced { abandoned } => {
                self.record(DiagnosticKind::MorphAbandoned {
                    shape: abandoned.clone(),
                });
                self.record(DiagnosticKind::MorphStarted {
                    shape: id.to_string(),
                });
            }
        }
        Ok(outcome)
    }

    /// Live tempo change. Beat-fixed spans stretch from here on; nothing
    /// already elapsed moves.
    pub fn set_bpm(&mut self, bpm: f32) -> Result<()> {
        self.clock.set_bpm(bpm)?;
        tracing::info!(bpm, quantum = self.clock.quantum(), "tempo change");
        self.record(DiagnosticKind::TempoChanged { bpm });
        Ok(())
    }

    /// Registers one extension definition after schema checks. Returns
    /// `true` when it replaced an existing one.
    pub fn register(&mut self, definition: AnyDefinition) -> Result<bool> {
        match definition {
            AnyDefinition::Emotion(d) => self.emotions.register_emotion(d),
            AnyDefinition::Undertone(d) => self.emotions.register_undertone(d),
            AnyDefinition::Gesture(d) => self.gestures.register(d),
            AnyDefinition::Shape(d) => self.morpher.register(d),
        }
    }

    /// Validates the whole pack before registering any of it.
    pub fn load_pack(&mut self, pack: &CulturePack) -> Result<PackSummary> {
        let summary = pack.validate()?;
        for definition in pack.definitions() {
            self.register(definition)?;
        }
        tracing::info!(?summary, "culture pack loaded");
        Ok(summary)
    }

    /// Advances every subsystem by `dt_ms` and returns this frame's
    /// snapshot.
    ///
    /// Order: clock, emotion, gestures (including their decorations),
    /// morph, then particles, so particles see this frame's parameters and
    /// any gesture that starts this frame.
    pub fn tick(&mut self, dt_ms: f32) -> RenderSnapshot {
        let dt_ms = self.clamp_step(dt_ms);
        self.tick += 1;
        if self.destroyed {
            return RenderSnapshot::empty(self.tick, self.clock.current_beat(), self.clock.bpm());
        }

        self.clock.advance(dt_ms);
        self.emotions.tick(dt_ms);
        let params = self.emotions.render_parameters();

        let events = self.gestures.advance(&self.clock);
        self.apply_gesture_events(events);
        let motion = self.gestures.combined_transform();

        for event in self.morpher.advance(&self.clock) {
            let kind = match event {
                MorphEvent::Started { target } => DiagnosticKind::MorphStarted { shape: target },
                MorphEvent::Completed { shape } => DiagnosticKind::MorphCompleted { shape },
            };
            self.record(kind);
        }

        let report = self.particles.update(dt_ms, &params, motion);
        if report.skipped > 0 {
            self.record(DiagnosticKind::SpawnSkipped {
                count: report.skipped,
            });
        }

        RenderSnapshot {
            tick: self.tick,
            beat: self.clock.current_beat(),
            bpm: self.clock.bpm(),
            particles: self.particles.views(),
            emotion: Some(params),
            gestures: self.gestures.active(),
            gesture_transform: motion,
            morph: Some(self.morpher.snapshot()),
        }
    }

    pub fn state(&self) -> EngineState {
        let morph = self.morpher.transition();
        EngineState {
            tick: self.tick,
            beat: self.clock.current_beat(),
            bpm: self.clock.bpm(),
            quantum: self.clock.quantum(),
            emotion: self.emotions.emotion().to_string(),
            undertone: self.emotions.undertone().to_string(),
            transition_progress: self.emotions.progress(),
            pool: self.particles.stats(),
            spawn_skipped: self.particles.skipped_total(),
            gesture_queue_depth: self.gestures.queue_depth(),
            active_gestures: self.gestures.active().into_iter().map(|g| g.id).collect(),
            gestures_dropped: self.gestures.dropped_total(),
            shape: self.morpher.shape().to_string(),
            morph_progress: morph.map(|m| m.progress()),
            pending_morph: self.morpher.pending().map(str::to_string),
            destroyed: self.destroyed,
        }
    }

    /// Clears the gesture queue without draining it (reverting any
    /// decorations) and freezes the morph where it is. Emotion and particles
    /// keep running.
    pub fn stop(&mut self) {
        let cancelled = self.gestures.clear();
        self.apply_gesture_events(cancelled);
        if let Some(abandoned) = self.morpher.stop() {
            self.record(DiagnosticKind::MorphAbandoned { shape: abandoned });
        }
        tracing::info!("engine stopped");
        self.record(DiagnosticKind::Stopped);
    }

    /// Stops, returns every particle to the pool and drops its storage.
    /// Later ticks produce empty snapshots.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.particles.dispose();
        self.destroyed = true;
        tracing::info!("engine destroyed");
        self.record(DiagnosticKind::Destroyed);
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(EmotiveError::msg("engine has been destroyed"));
        }
        Ok(())
    }

    fn clamp_step(&mut self, dt_ms: f32) -> f32 {
        if dt_ms.is_nan() || dt_ms < 0.0 {
            return 0.0;
        }
        let max = self.config.max_step_ms;
        if dt_ms > max {
            tracing::warn!(requested_ms = dt_ms, applied_ms = max, "tick step clamped");
            self.record(DiagnosticKind::StepClamped {
                requested_ms: dt_ms,
                applied_ms: max,
            });
            return max;
        }
        dt_ms
    }

    fn apply_gesture_events(&mut self, events: Vec<GestureEvent>) {
        for event in events {
            let kind = match event {
                GestureEvent::Activated {
                    token,
                    id,
                    decoration,
                } => {
                    if let Some(decoration) = decoration {
                        let touched = self.particles.apply_decoration(token, decoration);
                        tracing::debug!(gesture = %id, token, touched, "decoration applied");
                    }
                    DiagnosticKind::GestureActivated { gesture: id, token }
                }
                GestureEvent::Completed {
                    token,
                    id,
                    decoration,
                } => {
                    if decoration.is_some() {
                        self.particles.revert_decoration(token);
                    }
                    DiagnosticKind::GestureCompleted { gesture: id, token }
                }
                GestureEvent::Cancelled {
                    token,
                    id,
                    decoration,
                    was_active,
                } => {
                    if decoration.is_some() && was_active {
                        self.particles.revert_decoration(token);
                    }
                    DiagnosticKind::GestureCancelled { gesture: id, token }
                }
            };
            self.record(kind);
        }
    }

    fn record(&mut self, kind: DiagnosticKind) {
        self.diagnostics
            .push(self.tick, self.clock.current_beat(), kind);
    }
}
