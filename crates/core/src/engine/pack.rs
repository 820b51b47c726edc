use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    emotion::{EmotionDefinition, UndertoneModifier},
    gesture::Gesture,
    registry::Definition,
    shape::ShapeDescriptor,
    Result,
};

/// A single definition handed to [`crate::ChoreographyEngine::register`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "definition", rename_all = "camelCase")]
pub enum AnyDefinition {
    Emotion(EmotionDefinition),
    Undertone(UndertoneModifier),
    Gesture(Gesture),
    Shape(ShapeDescriptor),
}

impl AnyDefinition {
    pub fn id(&self) -> &str {
        match self {
            AnyDefinition::Emotion(d) => d.id(),
            AnyDefinition::Undertone(d) => d.id(),
            AnyDefinition::Gesture(d) => d.id(),
            AnyDefinition::Shape(d) => d.id(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            AnyDefinition::Emotion(d) => d.validate(),
            AnyDefinition::Undertone(d) => d.validate(),
            AnyDefinition::Gesture(d) => d.validate(),
            AnyDefinition::Shape(d) => d.validate(),
        }
    }
}

/// A bundle of definitions for one cultural context, loaded as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CulturePack {
    pub emotions: Vec<EmotionDefinition>,
    pub undertones: Vec<UndertoneModifier>,
    pub gestures: Vec<Gesture>,
    pub shapes: Vec<ShapeDescriptor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackSummary {
    pub emotions: usize,
    pub undertones: usize,
    pub gestures: usize,
    pub shapes: usize,
}

impl CulturePack {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Runs every definition's checks and stops at the first failure.
    pub fn validate(&self) -> Result<PackSummary> {
        self.definitions().try_for_each(|d| d.validate())?;
        Ok(self.summary())
    }

    pub fn summary(&self) -> PackSummary {
        PackSummary {
            emotions: self.emotions.len(),
            undertones: self.undertones.len(),
            gestures: self.gestures.len(),
            shapes: self.shapes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions().next().is_none()
    }

    /// Undertones first, so nothing registered later can name a missing one.
    pub fn definitions(&self) -> impl Iterator<Item = AnyDefinition> + '_ {
        let undertones = self.undertones.iter().cloned().map(AnyDefinition::Undertone);
        let emotions = self.emotions.iter().cloned().map(AnyDefinition::Emotion);
        let gestures = self.gestures.iter().cloned().map(AnyDefinition::Gesture);
        let shapes = self.shapes.iter().cloned().map(AnyDefinition::Shape);
        undertones.chain(emotions).chain(gestures).chain(shapes)
    }
}
