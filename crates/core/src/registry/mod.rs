//! Id-keyed definition stores.
//!
//! Built-ins are inserted at construction; anything else goes through
//! [`Registry::register`], which runs the definition's schema checks first.

use std::collections::BTreeMap;

use crate::Result;

/// A registrable definition: something with an id, a validation pass and a
/// dedicated "unknown id" error.
pub trait Definition: Clone {
    /// Human readable kind, used in validation errors and logs.
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn validate(&self) -> Result<()>;

    /// Error returned when a caller references an id that is not registered.
    fn unknown(id: &str, valid: Vec<String>) -> crate::EmotiveError;
}

#[derive(Debug, Clone)]
pub struct Registry<T: Definition> {
    entries: BTreeMap<String, T>,
}

impl<T: Definition> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Definition> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins(builtins: impl IntoIterator<Item = T>) -> Self {
        let mut registry = Self::new();
        for definition in builtins {
            registry.entries.insert(definition.id().to_string(), definition);
        }
        registry
    }

    /// Validates and inserts `definition`. Returns `true` when an existing
    /// entry with the same id was replaced.
    pub fn register(&mut self, definition: T) -> Result<bool> {
        definition.validate()?;
        let id = definition.id().to_string();
        let replaced = self.entries.insert(id.clone(), definition).is_some();
        if replaced {
            tracing::warn!(kind = T::KIND, %id, "definition overrides an existing entry");
        } else {
            tracing::debug!(kind = T::KIND, %id, "definition registered");
        }
        Ok(replaced)
    }

    pub fn get(&self, id: &str) -> Result<&T> {
        self.entries
            .get(id)
            .ok_or_else(|| T::unknown(id, self.ids()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Sorted list of registered ids.
    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmotiveError;

    #[derive(Debug, Clone)]
    struct Dummy {
        id: String,
        ok: bool,
    }

    impl Definition for Dummy {
        const KIND: &'static str = "dummy";

        fn id(&self) -> &str {
            &self.id
        }

        fn validate(&self) -> Result<()> {
            if self.ok {
                Ok(())
            } else {
                Err(EmotiveError::invalid(Self::KIND, &self.id, "not ok"))
            }
        }

        fn unknown(id: &str, valid: Vec<String>) -> EmotiveError {
            EmotiveError::UnknownShape {
                id: id.to_string(),
                valid,
            }
        }
    }

    fn dummy(id: &str, ok: bool) -> Dummy {
        Dummy {
            id: id.to_string(),
            ok,
        }
    }

    #[test]
    fn resolves_registered_definitions() {
        let mut registry = Registry::with_builtins([dummy("a", true)]);
        assert!(!registry.register(dummy("b", true)).unwrap());
        assert!(registry.get("b").is_ok());
        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn errors_on_missing_ids_with_valid_set() {
        let registry = Registry::with_builtins([dummy("circle", true)]);
        let err = registry.get("missing").unwrap_err();
        let text = format!("{err}");
        assert!(text.contains("missing"));
        assert!(text.contains("circle"));
    }

    #[test]
    fn invalid_definitions_are_not_inserted() {
        let mut registry = Registry::new();
        assert!(registry.register(dummy("bad", false)).is_err());
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn re_registering_reports_replacement() {
        let mut registry = Registry::with_builtins([dummy("a", true)]);
        assert!(registry.register(dummy("a", true)).unwrap());
        assert_eq!(registry.len(), 1);
    }
}
