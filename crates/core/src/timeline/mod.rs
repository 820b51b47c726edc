//! Musical time.
//!
//! [`MusicalClock`] turns wall-clock tick deltas into beats at the current
//! tempo. Everything that is "fixed in beats" (gesture durations, morph
//! windows) reads progress off [`MusicalClock::current_beat`], so a tempo
//! change stretches the remaining span instead of jumping.

use serde::{Deserialize, Serialize};

use crate::{EmotiveError, Result};

/// Below this the gesture quantum subdivides the beat.
const SLOW_BPM: f32 = 90.0;
/// Above this the gesture quantum spans two beats.
const FAST_BPM: f32 = 150.0;
const BOUNDARY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicalClock {
    bpm: f32,
    beat: f64,
    elapsed_ms: f64,
    fixed_quantum: Option<f64>,
}

impl MusicalClock {
    pub fn new(bpm: f32) -> Result<Self> {
        validate_bpm(bpm)?;
        Ok(Self {
            bpm,
            beat: 0.0,
            elapsed_ms: 0.0,
            fixed_quantum: None,
        })
    }

    /// Pins the gesture quantum instead of deriving it from tempo.
    pub fn with_fixed_quantum(mut self, quantum: Option<f64>) -> Self {
        self.fixed_quantum = quantum;
        self
    }

    pub fn reset(&mut self) {
        self.beat = 0.0;
        self.elapsed_ms = 0.0;
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Changes tempo. Only the rate at which future ticks add beats changes;
    /// the current beat position is untouched.
    pub fn set_bpm(&mut self, bpm: f32) -> Result<()> {
        validate_bpm(bpm)?;
        self.bpm = bpm;
        Ok(())
    }

    pub fn beat_duration_ms(&self) -> f64 {
        beat_duration_ms(self.bpm)
    }

    pub fn beats_to_ms(&self, beats: f64) -> f64 {
        beats * self.beat_duration_ms()
    }

    pub fn ms_to_beats(&self, ms: f64) -> f64 {
        ms / self.beat_duration_ms()
    }

    pub fn advance(&mut self, dt_ms: f32) {
        let dt_ms = f64::from(dt_ms.max(0.0));
        self.beat += self.ms_to_beats(dt_ms);
        self.elapsed_ms += dt_ms;
    }

    pub fn current_beat(&self) -> f64 {
        self.beat
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Gesture quantum in beats for the current tempo.
    pub fn quantum(&self) -> f64 {
        self.fixed_quantum.unwrap_or_else(|| quantum_for_bpm(self.bpm))
    }

    /// Next quantum boundary at or after the current beat.
    pub fn next_boundary(&self) -> f64 {
        quantize_up(self.beat, self.quantum())
    }

    /// Sub-beat step used by the morph quantizer, in beats: a quarter beat,
    /// widening to half a beat above the fast-tempo threshold. Independent
    /// of the quantum.
    pub fn sub_beat_step(&self) -> f64 {
        if self.bpm > FAST_BPM {
            0.5
        } else {
            0.25
        }
    }
}

pub fn beat_duration_ms(bpm: f32) -> f64 {
    60_000.0 / f64::from(bpm)
}

/// Finer subdivision at slow tempo, coarser at fast tempo, so a quantized
/// event always lands on a boundary a listener can feel.
pub fn quantum_for_bpm(bpm: f32) -> f64 {
    if bpm < SLOW_BPM {
        0.5
    } else if bpm <= FAST_BPM {
        1.0
    } else {
        2.0
    }
}

/// `ceil(beat / quantum) * quantum`, tolerant of float noise sitting just
/// above a boundary.
pub fn quantize_up(beat: f64, quantum: f64) -> f64 {
    if quantum <= 0.0 {
        return beat;
    }
    let steps = beat / quantum;
    let nearest = steps.round();
    if (steps - nearest).abs() < BOUNDARY_EPSILON {
        return nearest * quantum;
    }
    steps.ceil() * quantum
}

fn validate_bpm(bpm: f32) -> Result<()> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(EmotiveError::InvalidTempo(bpm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat_duration_follows_tempo() {
        let clock = MusicalClock::new(120.0).unwrap();
        assert!((clock.beat_duration_ms() - 500.0).abs() < 1e-9);
        assert!((clock.ms_to_beats(250.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_tempo() {
        assert!(matches!(
            MusicalClock::new(0.0),
            Err(EmotiveError::InvalidTempo(_))
        ));
        let mut clock = MusicalClock::new(100.0).unwrap();
        assert!(clock.set_bpm(-1.0).is_err());
        assert!(clock.set_bpm(f32::NAN).is_err());
        assert_eq!(clock.bpm(), 100.0);
    }

    #[test]
    fn quantize_rounds_up_to_next_boundary() {
        assert_eq!(quantize_up(3.1, 1.0), 4.0);
        assert_eq!(quantize_up(4.0, 1.0), 4.0);
        assert_eq!(quantize_up(0.0, 1.0), 0.0);
        assert_eq!(quantize_up(3.1, 0.5), 3.5);
        assert_eq!(quantize_up(3.0 + 1e-12, 1.0), 3.0);
    }

    #[test]
    fn quantum_is_finer_at_slow_tempo() {
        assert!(quantum_for_bpm(60.0) < quantum_for_bpm(120.0));
        assert!(quantum_for_bpm(120.0) < quantum_for_bpm(180.0));
        assert_eq!(quantum_for_bpm(120.0), 1.0);
    }

    #[test]
    fn tempo_change_keeps_beat_position() {
        let mut clock = MusicalClock::new(120.0).unwrap();
        clock.advance(250.0);
        let before = clock.current_beat();
        clock.set_bpm(60.0).unwrap();
        assert_eq!(clock.current_beat(), before);
        clock.advance(500.0);
        assert!((clock.current_beat() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_quantum_overrides_tempo() {
        let clock = MusicalClock::new(60.0).unwrap().with_fixed_quantum(Some(1.0));
        assert_eq!(clock.quantum(), 1.0);
    }
}
