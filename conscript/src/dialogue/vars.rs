//! Named values substituted into dialogue input.

use indexmap::IndexMap;
use secrecy::SecretString;

/// A variable value.
#[derive(Debug, Clone)]
pub enum VarValue {
    /// Plain text (addresses, menu choices).
    Text(String),

    /// Secret text (passwords); masked in logs and transcripts.
    Secret(SecretString),
}

/// Values for [`Input::Var`](super::Input::Var) placeholders.
///
/// Keeps insertion order so listings are stable.
#[derive(Debug, Clone, Default)]
pub struct DialogueVars {
    values: IndexMap<String, VarValue>,
}

impl DialogueVars {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to plain text, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), VarValue::Text(value.into()));
        self
    }

    /// Bind `name` to a secret, replacing any previous value.
    pub fn set_secret(
        &mut self,
        name: impl Into<String>,
        value: impl Into<SecretString>,
    ) -> &mut Self {
        self.values
            .insert(name.into(), VarValue::Secret(value.into()));
        self
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style [`set_secret`](Self::set_secret).
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<SecretString>) -> Self {
        self.set_secret(name, value);
        self
    }

    /// Look up a value.
    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.values.get(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bound names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Add all of `other`'s bindings, overriding existing ones.
    pub fn merge(&mut self, other: &DialogueVars) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
