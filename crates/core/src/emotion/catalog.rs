use super::{BreathingPattern, EmotionDefinition, UndertoneModifier, WeightedColor};
use crate::particle::BehaviorKind;

/// Identity undertone, applied when none is requested.
pub const CLEAR_UNDERTONE: &str = "clear";

struct EmotionSeed {
    id: &'static str,
    palette: &'static [(&'static str, f32)],
    rate: f32,
    glow: f32,
    breathing: (f32, f32),
    behavior: BehaviorKind,
    speed: f32,
    gestures: &'static [&'static str],
}

const EMOTIONS: &[EmotionSeed] = &[
    EmotionSeed {
        id: "neutral",
        palette: &[("#B0B8C8", 3.0), ("#DDE3EC", 1.0)],
        rate: 15.0,
        glow: 0.6,
        breathing: (12.0, 0.04),
        behavior: BehaviorKind::Ambient,
        speed: 1.0,
        gestures: &["pulse", "nod", "sway", "float"],
    },
    EmotionSeed {
        id: "joy",
        palette: &[("#FFD93D", 4.0), ("#FF9F1C", 2.0), ("#FFF3B0", 1.0)],
        rate: 30.0,
        glow: 1.2,
        breathing: (18.0, 0.08),
        behavior: BehaviorKind::Popcorn,
        speed: 1.3,
        gestures: &["bounce", "jump", "spin", "wiggle", "flash"],
    },
    EmotionSeed {
        id: "sadness",
        palette: &[("#3A5BA0", 3.0), ("#7A8FB8", 2.0), ("#1F2E4D", 1.0)],
        rate: 8.0,
        glow: 0.4,
        breathing: (8.0, 0.06),
        behavior: BehaviorKind::Falling,
        speed: 0.6,
        gestures: &["sway", "nod", "contract"],
    },
    EmotionSeed {
        id: "anger",
        palette: &[("#D62828", 4.0), ("#F77F00", 1.0), ("#6A040F", 1.0)],
        rate: 35.0,
        glow: 1.5,
        breathing: (22.0, 0.1),
        behavior: BehaviorKind::Aggressive,
        speed: 1.6,
        gestures: &["shake", "pulse", "expand", "flash"],
    },
    EmotionSeed {
        id: "fear",
        palette: &[("#6C4AB6", 3.0), ("#8D72E1", 1.0), ("#2D033B", 1.0)],
        rate: 20.0,
        glow: 0.7,
        breathing: (26.0, 0.05),
        behavior: BehaviorKind::Scattering,
        speed: 1.4,
        gestures: &["shake", "contract", "wiggle"],
    },
    EmotionSeed {
        id: "surprise",
        palette: &[("#FFB703", 2.0), ("#FB8500", 1.0), ("#FFFFFF", 1.0)],
        rate: 25.0,
        glow: 1.4,
        breathing: (16.0, 0.12),
        behavior: BehaviorKind::Burst,
        speed: 1.8,
        gestures: &["jump", "expand", "flash"],
    },
    EmotionSeed {
        id: "disgust",
        palette: &[("#6B8E23", 3.0), ("#9ACD32", 1.0), ("#556B2F", 1.0)],
        rate: 12.0,
        glow: 0.5,
        breathing: (10.0, 0.05),
        behavior: BehaviorKind::Repelling,
        speed: 0.9,
        gestures: &["tilt", "contract", "shake"],
    },
    EmotionSeed {
        id: "love",
        palette: &[("#FF4D8D", 3.0), ("#FF8FB1", 2.0), ("#C9184A", 1.0)],
        rate: 22.0,
        glow: 1.3,
        breathing: (10.0, 0.09),
        behavior: BehaviorKind::Orbiting,
        speed: 0.9,
        gestures: &["pulse", "float", "sway", "expand"],
    },
    EmotionSeed {
        id: "suspicion",
        palette: &[("#5E548E", 2.0), ("#9F86C0", 1.0), ("#231942", 1.0)],
        rate: 10.0,
        glow: 0.5,
        breathing: (9.0, 0.03),
        behavior: BehaviorKind::Watching,
        speed: 0.7,
        gestures: &["tilt", "nod"],
    },
    EmotionSeed {
        id: "excited",
        palette: &[("#FF006E", 2.0), ("#FB5607", 2.0), ("#FFBE0B", 2.0), ("#3A86FF", 1.0)],
        rate: 40.0,
        glow: 1.6,
        breathing: (24.0, 0.1),
        behavior: BehaviorKind::Burst,
        speed: 1.7,
        gestures: &["bounce", "jump", "spin", "wiggle", "flash"],
    },
    EmotionSeed {
        id: "resting",
        palette: &[("#8EA8C3", 2.0), ("#CBD5E1", 1.0)],
        rate: 5.0,
        glow: 0.3,
        breathing: (6.0, 0.07),
        behavior: BehaviorKind::Resting,
        speed: 0.4,
        gestures: &["float", "nod"],
    },
    EmotionSeed {
        id: "euphoria",
        palette: &[("#FFE066", 2.0), ("#F896D8", 2.0), ("#9BF6FF", 2.0), ("#FFFFFF", 1.0)],
        rate: 45.0,
        glow: 2.0,
        breathing: (20.0, 0.12),
        behavior: BehaviorKind::Radiant,
        speed: 1.5,
        gestures: &["spin", "expand", "flash", "float"],
    },
    EmotionSeed {
        id: "focused",
        palette: &[("#00B4D8", 3.0), ("#90E0EF", 1.0)],
        rate: 18.0,
        glow: 0.9,
        breathing: (12.0, 0.02),
        behavior: BehaviorKind::Ascending,
        speed: 1.0,
        gestures: &["nod", "pulse"],
    },
    EmotionSeed {
        id: "glitch",
        palette: &[("#00FF9C", 2.0), ("#FF00E4", 2.0), ("#00E1FF", 1.0)],
        rate: 28.0,
        glow: 1.1,
        breathing: (30.0, 0.03),
        behavior: BehaviorKind::Glitchy,
        speed: 1.2,
        gestures: &["glitch", "shake", "flash"],
    },
    EmotionSeed {
        id: "calm",
        palette: &[("#7FC8A9", 3.0), ("#D5EEBB", 1.0)],
        rate: 10.0,
        glow: 0.5,
        breathing: (7.0, 0.06),
        behavior: BehaviorKind::Rising,
        speed: 0.6,
        gestures: &["sway", "float", "nod"],
    },
];

const UNDERTONES: &[(&str, f32, f32, f32)] = &[
    // id, saturation delta, speed, rate
    (CLEAR_UNDERTONE, 0.0, 1.0, 1.0),
    ("nervous", -0.1, 1.3, 1.2),
    ("confident", 0.15, 1.1, 1.1),
    ("sarcastic", -0.2, 0.9, 0.9),
    ("hesitant", -0.15, 0.7, 0.8),
    ("calm", -0.05, 0.8, 0.85),
    ("intense", 0.25, 1.4, 1.3),
    ("subdued", -0.3, 0.6, 0.7),
];

pub fn builtin_emotions() -> Vec<EmotionDefinition> {
    EMOTIONS
        .iter()
        .map(|seed| EmotionDefinition {
            id: seed.id.to_string(),
            palette: seed
                .palette
                .iter()
                .filter_map(|(hex, weight)| WeightedColor::new(hex, *weight))
                .collect(),
            particle_rate: seed.rate,
            glow_intensity: seed.glow,
            breathing: BreathingPattern {
                rate: seed.breathing.0,
                depth: seed.breathing.1,
            },
            behavior: seed.behavior,
            particle_speed: seed.speed,
            gestures: seed.gestures.iter().map(|g| g.to_string()).collect(),
        })
        .collect()
}

pub fn builtin_undertones() -> Vec<UndertoneModifier> {
    UNDERTONES
        .iter()
        .map(|&(id, saturation_delta, speed_multiplier, rate_multiplier)| UndertoneModifier {
            id: id.to_string(),
            saturation_delta,
            speed_multiplier,
            rate_multiplier,
        })
        .collect()
}
