//! In-memory diagnostic log.
//!
//! A bounded ring of notable engine events, for hosts that want to show
//! why something did or did not happen. Nothing here is persisted.

use std::collections::VecDeque;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DiagnosticKind {
    EmotionChanged {
        emotion: String,
        undertone: String,
        duration_ms: f32,
    },
    TempoChanged {
        bpm: f32,
    },
    GestureScheduled {
        gesture: String,
        token: u64,
        beat: f64,
    },
    GestureDropped {
        gesture: String,
    },
    GestureIgnored {
        gesture: String,
    },
    /// Triggered outside the active emotion's suggested set. It still runs.
    IncompatibleGesture {
        gesture: String,
        emotion: String,
    },
    GestureActivated {
        gesture: String,
        token: u64,
    },
    GestureCompleted {
        gesture: String,
        token: u64,
    },
    GestureCancelled {
        gesture: String,
        token: u64,
    },
    MorphStarted {
        shape: String,
    },
    MorphQueued {
        shape: String,
    },
    MorphCompleted {
        shape: String,
    },
    MorphAbandoned {
        shape: String,
    },
    SpawnSkipped {
        count: u32,
    },
    StepClamped {
        requested_ms: f32,
        applied_ms: f32,
    },
    Stopped,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEvent {
    pub tick: u64,
    pub beat: f64,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

/// Ring buffer of the most recent [`DiagnosticEvent`]s.
#[derive(Debug)]
pub struct DiagnosticLog {
    events: VecDeque<DiagnosticEvent>,
    capacity: usize,
    evicted: u64,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, tick: u64, beat: f64, kind: DiagnosticKind) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(DiagnosticEvent { tick, beat, kind });
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticEvent> {
        self.events.iter()
    }

    /// Most recent first.
    pub fn recent(&self, count: usize) -> Vec<&DiagnosticEvent> {
        self.events.iter().rev().take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
