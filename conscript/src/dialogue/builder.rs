//! Fluent construction of dialogues.

use std::time::Duration;

use super::Dialogue;
use super::step::{Input, Step};
use crate::channel::IntoPattern;
use crate::error::{DialogueError, PatternError};

/// Builder for [`Dialogue`]s.
///
/// Pattern errors do not break the chain; the first one is reported by
/// [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use conscript::{Dialogue, Input};
///
/// let dialogue = Dialogue::builder("dedicated database")
///     .send("ap")
///     .answer("Press any key to continue.", "")
///     .within(Duration::from_secs(20))
///     .answer("Choose the advanced setting: ", "7")
///     .answer(r"Enter the database password on localhost: ", Input::var("password"))
///     .answer("Press any key to continue.", "")
///     .within(Duration::from_secs(360))
///     .build()
///     .unwrap();
///
/// assert_eq!(dialogue.len(), 5);
/// ```
#[derive(Debug)]
pub struct DialogueBuilder {
    name: String,
    steps: Vec<Step>,
    default_timeout: Option<Duration>,
    error: Option<DialogueError>,
}

impl DialogueBuilder {
    /// Create a new builder for a dialogue called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            default_timeout: None,
            error: None,
        }
    }

    /// Type a line without waiting first.
    pub fn send(mut self, input: impl Into<Input>) -> Self {
        self.steps.push(Step::Send {
            input: input.into(),
        });
        self
    }

    /// Wait for a prompt without answering.
    pub fn expect(mut self, pattern: impl IntoPattern) -> Self {
        match pattern.into_pattern() {
            Ok(pattern) => self.steps.push(Step::Expect {
                pattern,
                timeout: None,
            }),
            Err(source) => self.fail_pattern(source),
        }
        self
    }

    /// Wait for a prompt and answer it. An empty answer only waits.
    pub fn answer(mut self, pattern: impl IntoPattern, input: impl Into<Input>) -> Self {
        match pattern.into_pattern() {
            Ok(pattern) => self.steps.push(Step::Answer {
                pattern,
                input: input.into(),
                timeout: None,
            }),
            Err(source) => self.fail_pattern(source),
        }
        self
    }

    /// Override the timeout of the most recent step.
    ///
    /// The most recent step has to be one that waits.
    pub fn within(mut self, timeout: Duration) -> Self {
        let applied = self
            .steps
            .last_mut()
            .is_some_and(|step| step.set_timeout(timeout));
        if !applied && self.error.is_none() {
            self.error = Some(DialogueError::DanglingTimeout {
                dialogue: self.name.clone(),
            });
        }
        self
    }

    /// Timeout for steps without their own; falls back to the session's
    /// default when unset.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Build the dialogue.
    pub fn build(self) -> Result<Dialogue, DialogueError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.steps.is_empty() {
            return Err(DialogueError::Empty { dialogue: self.name });
        }
        Ok(Dialogue {
            name: self.name,
            steps: self.steps,
            default_timeout: self.default_timeout,
        })
    }

    fn fail_pattern(&mut self, source: PatternError) {
        if self.error.is_none() {
            self.error = Some(DialogueError::InvalidPattern {
                dialogue: self.name.clone(),
                step: self.steps.len(),
                source,
            });
        }
        // Keep step numbering stable for later errors
        self.steps.push(Step::Send {
            input: Input::Text(String::new()),
        });
    }
}
