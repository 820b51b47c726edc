//! Core library for the emotive mascot.
//!
//! A field of pooled particles expresses the current emotion, beat-quantized
//! gestures move the whole figure, and the outline morphs between shapes in
//! musical time. Everything advances inside [`ChoreographyEngine::tick`]; a
//! renderer only ever sees the [`RenderSnapshot`] it returns.

pub mod color;
pub mod config;
pub mod emotion;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod particle;
pub mod record;
pub mod registry;
pub mod render;
pub mod shape;
pub mod timeline;

pub use color::Rgb;
pub use config::EngineConfig;
pub use emotion::{
    EmotionChange, EmotionDefinition, EmotionStateMachine, RenderParameters, UndertoneModifier,
};
pub use engine::{AnyDefinition, ChoreographyEngine, CulturePack, EngineState, PackSummary};
pub use error::{EmotiveError, Result};
pub use gesture::{Gesture, GestureOutcome, GestureScheduler, GestureTransform, QueuePolicy};
pub use particle::{BehaviorKind, BehaviorRegistry, ParticlePool, ParticleSystem, PoolStats};
pub use record::{DiagnosticEvent, DiagnosticKind, DiagnosticLog};
pub use registry::{Definition, Registry};
pub use render::{HeadlessRenderer, RenderSnapshot, Renderer};
pub use shape::{MorphOptions, MorphOutcome, ShapeDescriptor, ShapeMorpher};
pub use timeline::MusicalClock;
