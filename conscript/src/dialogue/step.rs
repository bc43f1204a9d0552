//! Dialogue steps and the input they send.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::vars::{DialogueVars, VarValue};
use crate::channel::Pattern;
use crate::session::MASK;

/// What a step types into the console.
#[derive(Debug, Clone)]
pub enum Input {
    /// Plain text, logged as-is.
    Text(String),

    /// A secret such as a password; never logged.
    Secret(SecretString),

    /// A value looked up in [`DialogueVars`] when the dialogue runs.
    ///
    /// Secret values are always masked; `hidden` masks plain text values too.
    Var { name: String, hidden: bool },
}

impl Input {
    /// Input taken from the variable `name` at run time.
    pub fn var(name: impl Into<String>) -> Self {
        Input::Var {
            name: name.into(),
            hidden: false,
        }
    }

    /// Like [`var`](Self::var), but never logged even if bound to plain text.
    pub fn hidden_var(name: impl Into<String>) -> Self {
        Input::Var {
            name: name.into(),
            hidden: true,
        }
    }

    /// Secret input.
    pub fn secret(value: impl Into<SecretString>) -> Self {
        Input::Secret(value.into())
    }

    /// Resolve against `vars`. `None` if the input names an unbound variable.
    pub(crate) fn resolve<'a>(&'a self, vars: &'a DialogueVars) -> Option<Resolved<'a>> {
        match self {
            Input::Text(text) => Some(Resolved::plain(text)),
            Input::Secret(secret) => Some(Resolved::hidden(secret.expose_secret())),
            Input::Var { name, hidden } => vars.get(name).map(|value| match value {
                VarValue::Text(text) if *hidden => Resolved::hidden(text),
                VarValue::Text(text) => Resolved::plain(text),
                VarValue::Secret(secret) => Resolved::hidden(secret.expose_secret()),
            }),
        }
    }

    /// Log-safe label that does not need variables (`${name}` for vars).
    pub fn label(&self) -> String {
        match self {
            Input::Text(text) => format!("{text:?}"),
            Input::Secret(_) => MASK.to_string(),
            Input::Var { name, .. } => format!("${{{name}}}"),
        }
    }

    /// Log-safe rendering with variables substituted and secrets masked.
    pub fn display(&self, vars: &DialogueVars) -> String {
        match self.resolve(vars) {
            Some(resolved) if resolved.hidden => MASK.to_string(),
            Some(resolved) => resolved.text.to_string(),
            None => self.label(),
        }
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<&String> for Input {
    fn from(text: &String) -> Self {
        Input::Text(text.clone())
    }
}

impl From<SecretString> for Input {
    fn from(secret: SecretString) -> Self {
        Input::Secret(secret)
    }
}

/// Input with variables looked up.
pub(crate) struct Resolved<'a> {
    pub(crate) text: &'a str,
    pub(crate) hidden: bool,
}

impl<'a> Resolved<'a> {
    fn plain(text: &'a str) -> Self {
        Self {
            text,
            hidden: false,
        }
    }

    fn hidden(text: &'a str) -> Self {
        Self { text, hidden: true }
    }
}

/// One step of a console dialogue.
#[derive(Debug, Clone)]
pub enum Step {
    /// Type a line without waiting for anything first.
    Send { input: Input },

    /// Wait for a prompt without answering it.
    Expect {
        pattern: Pattern,
        timeout: Option<Duration>,
    },

    /// Wait for a prompt, then answer it. An empty answer only waits.
    Answer {
        pattern: Pattern,
        input: Input,
        timeout: Option<Duration>,
    },
}

impl Step {
    /// The prompt this step waits for, if any.
    pub fn pattern(&self) -> Option<&Pattern> {
        match self {
            Step::Send { .. } => None,
            Step::Expect { pattern, .. } | Step::Answer { pattern, .. } => Some(pattern),
        }
    }

    /// The input this step sends, if any.
    pub fn input(&self) -> Option<&Input> {
        match self {
            Step::Send { input } | Step::Answer { input, .. } => Some(input),
            Step::Expect { .. } => None,
        }
    }

    /// The step's own timeout override.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Step::Send { .. } => None,
            Step::Expect { timeout, .. } | Step::Answer { timeout, .. } => *timeout,
        }
    }

    /// Whether the step waits for output.
    pub fn waits(&self) -> bool {
        self.pattern().is_some()
    }

    pub(crate) fn set_timeout(&mut self, value: Duration) -> bool {
        match self {
            Step::Send { .. } => false,
            Step::Expect { timeout, .. } | Step::Answer { timeout, .. } => {
                *timeout = Some(value);
                true
            }
        }
    }

    /// Log-safe one-line description.
    pub fn describe(&self) -> String {
        match self {
            Step::Send { input } => format!("send {}", input.label()),
            Step::Expect { pattern, .. } => format!("expect {:?}", pattern.as_str()),
            Step::Answer { pattern, input, .. } => {
                format!("answer {:?} with {}", pattern.as_str(), input.label())
            }
        }
    }
}
