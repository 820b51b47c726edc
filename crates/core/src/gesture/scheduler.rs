use serde::Serialize;

use super::{Gesture, GestureTransform, QueuePolicy};
use crate::{
    particle::Decoration,
    registry::Registry,
    timeline::{quantize_up, MusicalClock},
    Result,
};

const COMPLETE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GestureState {
    Pending,
    Active,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureQueueEntry {
    /// Unique per request; ties decorations to the instance that applied
    /// them.
    pub token: u64,
    pub gesture_id: String,
    pub requested_beat: f64,
    pub scheduled_beat: f64,
    pub duration_beats: f64,
    pub state: GestureState,
    pub progress: f32,
}

impl GestureQueueEntry {
    pub fn end_beat(&self) -> f64 {
        self.scheduled_beat + self.duration_beats
    }

    fn progress_at(&self, beat: f64) -> f32 {
        ((beat - self.scheduled_beat) / self.duration_beats).clamp(0.0, 1.0) as f32
    }
}

/// Result of a gesture request. Only an unknown id is an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Scheduled { token: u64, beat: f64 },
    /// Took over from `cancelled` earlier instances.
    Replaced {
        token: u64,
        beat: f64,
        cancelled: usize,
    },
    /// Queue bound reached.
    Dropped,
    /// An instance is already pending or active.
    Ignored,
}

/// Lifecycle notifications, consumed by the engine to apply and revert
/// decorations.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    Activated {
        token: u64,
        id: String,
        decoration: Option<Decoration>,
    },
    Completed {
        token: u64,
        id: String,
        decoration: Option<Decoration>,
    },
    Cancelled {
        token: u64,
        id: String,
        decoration: Option<Decoration>,
        was_active: bool,
    },
}

/// Snapshot of one running gesture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGesture {
    pub id: String,
    pub token: u64,
    pub progress: f32,
    pub transform: GestureTransform,
}

/// Quantizes gesture requests onto musical boundaries and runs them.
#[derive(Debug)]
pub struct GestureScheduler {
    registry: Registry<Gesture>,
    entries: Vec<GestureQueueEntry>,
    outbox: Vec<GestureEvent>,
    next_token: u64,
    per_gesture_capacity: usize,
    max_entries: usize,
    dropped_total: u64,
    ignored_total: u64,
}

impl GestureScheduler {
    pub fn new(registry: Registry<Gesture>, per_gesture_capacity: usize, max_entries: usize) -> Self {
        Self {
            registry,
            entries: Vec::new(),
            outbox: Vec::new(),
            next_token: 1,
            per_gesture_capacity: per_gesture_capacity.max(1),
            max_entries: max_entries.max(1),
            dropped_total: 0,
            ignored_total: 0,
        }
    }

    pub fn registry(&self) -> &Registry<Gesture> {
        &self.registry
    }

    pub fn register(&mut self, gesture: Gesture) -> Result<bool> {
        self.registry.register(gesture)
    }

    /// Schedules `id` on the next quantum boundary according to its queue
    /// policy. Cancellations caused by `replace` are queued as events; take
    /// them with [`GestureScheduler::take_events`].
    pub fn request(&mut self, id: &str, clock: &MusicalClock) -> Result<GestureOutcome> {
        let gesture = self.registry.get(id)?.clone();
        let now = clock.current_beat();
        let quantum = clock.quantum();

        let (existing, chain_end) = self
            .entries
            .iter()
            .filter(|entry| entry.gesture_id == gesture.id)
            .fold((0, now), |(count, end), entry| {
                (count + 1, end.max(entry.end_beat()))
            });
        let mut cancelled = 0;
        let scheduled_beat = match gesture.policy {
            QueuePolicy::IgnoreIfActive => {
                if existing > 0 {
                    self.ignored_total += 1;
                    tracing::debug!(gesture = %gesture.id, "gesture ignored, already running");
                    return Ok(GestureOutcome::Ignored);
                }
                quantize_up(now, quantum)
            }
            QueuePolicy::Enqueue => {
                if existing >= self.per_gesture_capacity {
                    return Ok(self.drop_request(&gesture.id));
                }
                quantize_up(chain_end, quantum)
            }
            QueuePolicy::Replace => {
                cancelled = self.cancel_where(|entry| entry.gesture_id == gesture.id);
                quantize_up(now, quantum)
            }
        };

        if self.entries.len() >= self.max_entries {
            return Ok(self.drop_request(&gesture.id));
        }

        let token = self.next_token;
        self.next_token += 1;
        self.entries.push(GestureQueueEntry {
            token,
            gesture_id: gesture.id.clone(),
            requested_beat: now,
            scheduled_beat,
            duration_beats: gesture.duration_beats,
            state: GestureState::Pending,
            progress: 0.0,
        });
        tracing::debug!(gesture = %gesture.id, token, requested = now, scheduled = scheduled_beat, "gesture scheduled");

        Ok(if cancelled > 0 {
            GestureOutcome::Replaced {
                token,
                beat: scheduled_beat,
                cancelled,
            }
        } else {
            GestureOutcome::Scheduled {
                token,
                beat: scheduled_beat,
            }
        })
    }

    /// Moves entries through pending → active → complete for the clock's
    /// current beat and returns every event raised since the last call.
    pub fn advance(&mut self, clock: &MusicalClock) -> Vec<GestureEvent> {
        let beat = clock.current_beat();
        let mut events = std::mem::take(&mut self.outbox);

        for entry in &mut self.entries {
            if entry.state == GestureState::Pending && beat + COMPLETE_EPSILON >= entry.scheduled_beat {
                entry.state = GestureState::Active;
                events.push(GestureEvent::Activated {
                    token: entry.token,
                    id: entry.gesture_id.clone(),
                    decoration: decoration_of(&self.registry, &entry.gesture_id),
                });
            }
            if entry.state == GestureState::Active {
                entry.progress = entry.progress_at(beat);
                if beat + COMPLETE_EPSILON >= entry.end_beat() {
                    entry.progress = 1.0;
                    entry.state = GestureState::Complete;
                    events.push(GestureEvent::Completed {
                        token: entry.token,
                        id: entry.gesture_id.clone(),
                        decoration: decoration_of(&self.registry, &entry.gesture_id),
                    });
                }
            }
        }
        self.entries.retain(|entry| entry.state != GestureState::Complete);
        events
    }

    /// Cancels everything immediately, without draining.
    pub fn clear(&mut self) -> Vec<GestureEvent> {
        self.cancel_where(|_| true);
        std::mem::take(&mut self.outbox)
    }

    pub fn take_events(&mut self) -> Vec<GestureEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn active(&self) -> Vec<ActiveGesture> {
        self.entries
            .iter()
            .filter(|entry| entry.state == GestureState::Active)
            .filter_map(|entry| {
                let gesture = self.registry.get(&entry.gesture_id).ok()?;
                Some(ActiveGesture {
                    id: entry.gesture_id.clone(),
                    token: entry.token,
                    progress: entry.progress,
                    transform: gesture.motion.sample(entry.progress),
                })
            })
            .collect()
    }

    /// Combined transform of every active gesture.
    pub fn combined_transform(&self) -> GestureTransform {
        self.active()
            .iter()
            .fold(GestureTransform::IDENTITY, |acc, g| acc.combine(g.transform))
    }

    /// Wall-clock time left for `token` at the current tempo. Recomputed on
    /// every call, so it tracks live BPM changes.
    pub fn remaining_ms(&self, token: u64, clock: &MusicalClock) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| clock.beats_to_ms((entry.end_beat() - clock.current_beat()).max(0.0)))
    }

    pub fn entries(&self) -> &[GestureQueueEntry] {
        &self.entries
    }

    /// Pending plus active entries.
    pub fn queue_depth(&self) -> usize {
        self.entries.len()
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state == GestureState::Active)
            .count()
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    pub fn ignored_total(&self) -> u64 {
        self.ignored_total
    }

    fn drop_request(&mut self, id: &str) -> GestureOutcome {
        self.dropped_total += 1;
        tracing::debug!(gesture = %id, "gesture queue full, request dropped");
        GestureOutcome::Dropped
    }

    fn cancel_where(&mut self, mut predicate: impl FnMut(&GestureQueueEntry) -> bool) -> usize {
        let mut cancelled = 0;
        let registry = &self.registry;
        let outbox = &mut self.outbox;
        self.entries.retain(|entry| {
            if !predicate(entry) {
                return true;
            }
            outbox.push(GestureEvent::Cancelled {
                token: entry.token,
                id: entry.gesture_id.clone(),
                decoration: decoration_of(registry, &entry.gesture_id),
                was_active: entry.state == GestureState::Active,
            });
            cancelled += 1;
            false
        });
        cancelled
    }
}

fn decoration_of(registry: &Registry<Gesture>, id: &str) -> Option<Decoration> {
    registry.get(id).ok().and_then(|g| g.decoration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gesture::builtin_gestures, EmotiveError};

    fn scheduler() -> GestureScheduler {
        GestureScheduler::new(Registry::with_builtins(builtin_gestures()), 2, 8)
    }

    fn clock_at(bpm: f32, beat: f64) -> MusicalClock {
        let mut clock = MusicalClock::new(bpm).unwrap();
        clock.advance((beat * clock.beat_duration_ms()) as f32);
        clock
    }

    #[test]
    fn unknown_gesture_is_rejected_immediately() {
        let mut s = scheduler();
        let clock = clock_at(120.0, 0.0);
        match s.request("boogie", &clock).unwrap_err() {
            EmotiveError::UnknownGesture { id, valid } => {
                assert_eq!(id, "boogie");
                assert!(valid.contains(&"bounce".to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(s.queue_depth(), 0);
    }

    #[test]
    fn request_at_3_1_lands_on_beat_4() {
        let mut s = scheduler();
        let clock = clock_at(120.0, 3.1);
        assert_eq!(clock.quantum(), 1.0);
        match s.request("bounce", &clock).unwrap() {
            GestureOutcome::Scheduled { beat, .. } => assert_eq!(beat, 4.0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn pending_until_scheduled_beat_then_active_then_complete() {
        let mut s = scheduler();
        let mut clock = clock_at(120.0, 0.5);
        s.request("pulse", &clock).unwrap();
        assert!(s.advance(&clock).is_empty());
        assert_eq!(s.entries()[0].state, GestureState::Pending);

        clock.advance(250.0);
        let events = s.advance(&clock);
        assert!(matches!(events[0], GestureEvent::Activated { .. }));
        assert_eq!(s.active_count(), 1);

        clock.advance(250.0);
        s.advance(&clock);
        assert!((s.entries()[0].progress - 0.5).abs() < 1e-5);

        clock.advance(250.0);
        let events = s.advance(&clock);
        assert!(matches!(events[0], GestureEvent::Completed { .. }));
        assert_eq!(s.queue_depth(), 0);
    }

    #[test]
    fn replace_cancels_running_instance() {
        let mut s = scheduler();
        let mut clock = clock_at(120.0, 0.0);
        s.request("flash", &clock).unwrap();
        s.advance(&clock);
        clock.advance(100.0);
        s.advance(&clock);

        let outcome = s.request("flash", &clock).unwrap();
        assert!(matches!(
            outcome,
            GestureOutcome::Replaced { cancelled: 1, .. }
        ));
        let events = s.take_events();
        assert!(matches!(
            events.as_slice(),
            [GestureEvent::Cancelled {
                was_active: true,
                decoration: Some(_),
                ..
            }]
        ));
        assert_eq!(s.queue_depth(), 1);
    }

    #[test]
    fn enqueue_chains_and_drops_overflow() {
        let mut s = scheduler();
        let clock = clock_at(120.0, 0.2);
        let first = s.request("nod", &clock).unwrap();
        let second = s.request("nod", &clock).unwrap();
        assert!(matches!(first, GestureOutcome::Scheduled { beat, .. } if beat == 1.0));
        assert!(matches!(second, GestureOutcome::Scheduled { beat, .. } if beat == 2.0));
        assert_eq!(s.request("nod", &clock).unwrap(), GestureOutcome::Dropped);
        assert_eq!(s.dropped_total(), 1);
    }

    #[test]
    fn ignore_if_active_is_a_no_op() {
        let mut s = scheduler();
        let clock = clock_at(120.0, 0.0);
        s.request("spin", &clock).unwrap();
        assert_eq!(s.request("spin", &clock).unwrap(), GestureOutcome::Ignored);
        assert_eq!(s.queue_depth(), 1);
        assert_eq!(s.ignored_total(), 1);
    }

    #[test]
    fn global_bound_drops_requests() {
        let mut s = GestureScheduler::new(Registry::with_builtins(builtin_gestures()), 4, 2);
        let clock = clock_at(120.0, 0.0);
        s.request("bounce", &clock).unwrap();
        s.request("spin", &clock).unwrap();
        assert_eq!(s.request("jump", &clock).unwrap(), GestureOutcome::Dropped);
    }

    #[test]
    fn tempo_change_stretches_remaining_time_without_jump() {
        let mut s = scheduler();
        let mut clock = clock_at(120.0, 0.0);
        let token = match s.request("pulse", &clock).unwrap() {
            GestureOutcome::Scheduled { token, .. } => token,
            other => panic!("unexpected outcome {other:?}"),
        };
        s.advance(&clock);
        clock.advance(250.0);
        s.advance(&clock);
        let before = s.entries()[0].progress;
        assert!((s.remaining_ms(token, &clock).unwrap() - 250.0).abs() < 1e-6);

        clock.set_bpm(60.0).unwrap();
        s.advance(&clock);
        assert_eq!(s.entries()[0].progress, before);
        assert!((s.remaining_ms(token, &clock).unwrap() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn clear_cancels_everything() {
        let mut s = scheduler();
        let clock = clock_at(120.0, 0.0);
        s.request("bounce", &clock).unwrap();
        s.request("nod", &clock).unwrap();
        s.advance(&clock);
        let events = s.clear();
        assert_eq!(events.len(), 2);
        assert_eq!(s.queue_depth(), 0);
        assert!(s.active().is_empty());
    }
}
