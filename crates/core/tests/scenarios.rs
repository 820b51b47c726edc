use emotive_core::{
    emotion::normalize_palette, gesture::GestureOutcome, registry::Definition, ChoreographyEngine,
    DiagnosticKind, EngineConfig, MorphOptions, MorphOutcome, UndertoneModifier,
};

fn engine_with(config: EngineConfig) -> ChoreographyEngine {
    ChoreographyEngine::new(config).expect("valid config")
}

fn engine() -> ChoreographyEngine {
    engine_with(EngineConfig::default())
}

fn count(engine: &ChoreographyEngine, predicate: impl Fn(&DiagnosticKind) -> bool) -> usize {
    engine
        .diagnostics()
        .iter()
        .filter(|e| predicate(&e.kind))
        .count()
}

#[test]
fn steady_state_population_tracks_rate_times_lifetime() {
    let mut engine = engine_with(EngineConfig {
        pool_capacity: 50,
        particle_lifetime_ms: 1000.0,
        lifetime_jitter: 0.0,
        ..EngineConfig::default()
    });
    engine.set_emotion("joy", None, Some(0.0)).unwrap();

    let mut samples = Vec::new();
    for tick in 0..313 {
        engine.tick(16.0);
        let pool = engine.particles().pool();
        assert!(pool.is_consistent(), "pool invariant broken at tick {tick}");
        assert_eq!(pool.active_len() + pool.free_len(), 50);
        if tick >= 190 {
            samples.push(pool.active_len());
        }
    }
    for active in samples {
        assert!((25..=35).contains(&active), "active count {active}");
    }
    assert_eq!(engine.state().spawn_skipped, 0);
}

#[test]
fn palette_is_half_blended_halfway_through_a_transition() {
    let mut engine = engine();
    engine.set_emotion("joy", None, Some(0.0)).unwrap();
    engine.set_emotion("sadness", None, Some(500.0)).unwrap();

    let mut snapshot = engine.tick(0.0);
    for _ in 0..25 {
        snapshot = engine.tick(10.0);
    }
    let params = snapshot.emotion.unwrap();
    assert!((params.transition_progress - 0.5).abs() < 1e-4);

    let joy = engine.emotions().emotions().get("joy").unwrap().clone();
    let joy_weight: f32 = params
        .palette
        .iter()
        .filter(|entry| joy.palette.iter().any(|j| j.color.approx_eq(entry.color)))
        .map(|entry| entry.weight)
        .sum();
    let total: f32 = params.palette.iter().map(|entry| entry.weight).sum();
    assert!((total - 1.0).abs() < 1e-3);
    assert!((joy_weight - 0.5).abs() < 0.05, "joy share {joy_weight}");
}

#[test]
fn pulse_completes_one_beat_after_it_starts() {
    let mut engine = engine();
    engine.set_bpm(120.0).unwrap();
    let outcome = engine.trigger_gesture("pulse").unwrap();
    assert!(matches!(outcome, GestureOutcome::Scheduled { beat, .. } if beat == 0.0));

    for _ in 0..49 {
        engine.tick(10.0);
    }
    let progress = engine.gestures().active()[0].progress;
    assert!(progress > 0.95 && progress < 1.0);

    engine.tick(10.0);
    assert!(engine.gestures().active().is_empty());
    assert_eq!(
        count(&engine, |k| matches!(k, DiagnosticKind::GestureCompleted { .. })),
        1
    );
}

#[test]
fn tempo_change_stretches_a_gesture_in_flight() {
    let mut engine = engine();
    let token = match engine.trigger_gesture("pulse").unwrap() {
        GestureOutcome::Scheduled { token, .. } => token,
        other => panic!("unexpected outcome {other:?}"),
    };
    for _ in 0..25 {
        engine.tick(10.0);
    }
    let before = engine.gestures().active()[0].progress;
    assert!((before - 0.5).abs() < 1e-3);

    engine.set_bpm(60.0).unwrap();
    let remaining = engine
        .gestures()
        .remaining_ms(token, engine.clock())
        .unwrap();
    assert!((remaining - 500.0).abs() < 1.0);

    engine.tick(10.0);
    let after = engine.gestures().active()[0].progress;
    assert!((after - (before + 0.01)).abs() < 1e-3, "jumped to {after}");

    for _ in 0..48 {
        engine.tick(10.0);
    }
    assert_eq!(engine.gestures().active().len(), 1);
    for _ in 0..2 {
        engine.tick(10.0);
    }
    assert!(engine.gestures().active().is_empty());
}

#[test]
fn repeated_morph_requests_queue_behind_the_first() {
    let mut engine = engine();
    assert_eq!(
        engine.morph_to("star", MorphOptions::default()).unwrap(),
        MorphOutcome::Started
    );
    assert_eq!(
        engine.morph_to("star", MorphOptions::default()).unwrap(),
        MorphOutcome::Queued { replaced: None }
    );

    for _ in 0..99 {
        engine.tick(10.0);
    }
    let state = engine.state();
    assert_eq!(state.shape, "circle");
    assert_eq!(state.pending_morph.as_deref(), Some("star"));
    assert_eq!(engine.morpher().transition().unwrap().source(), "circle");

    engine.tick(10.0);
    let state = engine.state();
    assert_eq!(state.shape, "star");
    assert!(state.pending_morph.is_none());
    assert_eq!(state.morph_progress, Some(0.0));
    assert_eq!(engine.morpher().transition().unwrap().source(), "star");
    assert_eq!(
        count(&engine, |k| matches!(k, DiagnosticKind::MorphCompleted { .. })),
        1
    );
}

#[test]
fn zero_duration_emotion_has_no_residue() {
    let mut engine = engine();
    engine.set_emotion("anger", Some("nervous"), Some(800.0)).unwrap();
    for _ in 0..10 {
        engine.tick(16.0);
    }
    engine.set_emotion("joy", None, Some(0.0)).unwrap();
    let params = engine.emotions().render_parameters();

    let joy = engine.emotions().emotions().get("joy").unwrap().clone();
    assert_eq!(params.emotion, "joy");
    assert_eq!(params.undertone, "clear");
    assert_eq!(params.transition_progress, 1.0);
    assert_eq!(params.particle_rate, joy.particle_rate);
    assert_eq!(params.glow_intensity, joy.glow_intensity);
    assert_eq!(params.speed_multiplier, joy.particle_speed);
    assert_eq!(params.behavior, joy.behavior);
    let expected = normalize_palette(&joy.palette);
    assert_eq!(params.palette.len(), expected.len());
    for (got, want) in params.palette.iter().zip(&expected) {
        assert!(got.color.approx_eq(want.color));
        assert!((got.weight - want.weight).abs() < 1e-6);
    }
}

#[test]
fn transition_progress_is_monotonic_and_finishes_on_time() {
    let mut engine = engine();
    engine.set_emotion("fear", None, Some(500.0)).unwrap();
    let budget = (500.0_f32 / 16.0).ceil() as usize;

    let mut last = 0.0;
    let mut finished_at = None;
    for tick in 1..=budget {
        engine.tick(16.0);
        let progress = engine.state().transition_progress;
        assert!(progress >= last);
        last = progress;
        if progress == 1.0 && finished_at.is_none() {
            finished_at = Some(tick);
        }
    }
    assert_eq!(last, 1.0);
    assert!(finished_at.is_some());
}

#[test]
fn undertone_speed_does_not_compound() {
    let mut engine = engine();
    let boost = UndertoneModifier {
        id: "brisk".into(),
        saturation_delta: 0.0,
        speed_multiplier: 1.1,
        rate_multiplier: 1.0,
    };
    engine
        .register(emotive_core::AnyDefinition::Undertone(boost))
        .unwrap();
    engine.set_emotion("neutral", Some("brisk"), Some(0.0)).unwrap();

    let mut multiplier = 0.0;
    for _ in 0..100 {
        multiplier = engine.tick(16.0).emotion.unwrap().speed_multiplier;
    }
    assert!((multiplier - 1.1).abs() < 1e-6);
}

#[test]
fn gesture_requested_mid_beat_lands_on_the_next_beat() {
    let mut engine = engine();
    for _ in 0..155 {
        engine.tick(10.0);
    }
    assert!((engine.clock().current_beat() - 3.1).abs() < 1e-6);
    assert_eq!(engine.clock().quantum(), 1.0);

    match engine.trigger_gesture("bounce").unwrap() {
        GestureOutcome::Scheduled { beat, .. } => assert_eq!(beat, 4.0),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn pool_invariant_survives_heavy_churn() {
    let mut engine = engine_with(EngineConfig {
        pool_capacity: 40,
        particle_lifetime_ms: 300.0,
        ..EngineConfig::default()
    });
    let emotions = ["excited", "sadness", "glitch", "love", "anger", "resting"];
    for round in 0..600 {
        if round % 50 == 0 {
            let id = emotions[(round / 50) % emotions.len()];
            engine.set_emotion(id, None, Some(200.0)).unwrap();
        }
        if round % 37 == 0 {
            engine.trigger_gesture("flash").unwrap();
        }
        engine.tick(16.0);
        assert!(engine.particles().pool().is_consistent());
    }
    let particles = engine.particles();
    assert!(particles.spawned_total() > 0);
    assert_eq!(
        particles.spawned_total() - particles.despawned_total(),
        particles.pool().active_len() as u64
    );

    engine.destroy();
    assert_eq!(engine.state().pool.active, 0);
}

#[test]
fn unknown_ids_report_the_valid_set() {
    let mut engine = engine();
    let err = engine.morph_to("hexagon", MorphOptions::default()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("hexagon"));
    for shape in engine.morpher().shapes().iter() {
        assert!(message.contains(shape.id()));
    }
}
