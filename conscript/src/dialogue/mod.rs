//! Scripted console dialogues.
//!
//! Menu-driven configuration consoles have no machine-readable contract:
//! they print a prompt and wait for a human. A [`Dialogue`] captures one walk
//! through such a menu as data, an ordered list of [`Step`]s, so it can be
//! validated before anything is sent and updated in one place when the menu
//! tree changes.
//!
//! Running a dialogue is strictly sequential. The first step that fails
//! aborts the run; nothing is retried, because a missing prompt means either
//! the script or the remote system is not in the expected state.

mod builder;
mod step;
mod transcript;
mod vars;

pub use builder::DialogueBuilder;
pub use step::{Input, Step};
pub use transcript::{StepRecord, Transcript};
pub use vars::{DialogueVars, VarValue};

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use step::Resolved;

use crate::error::{DialogueError, Result};
use crate::session::Session;
use crate::transport::Transport;

/// An ordered list of console steps.
#[derive(Debug, Clone)]
pub struct Dialogue {
    name: String,
    steps: Vec<Step>,
    default_timeout: Option<Duration>,
}

impl Dialogue {
    /// Start building a dialogue called `name`.
    pub fn builder(name: impl Into<String>) -> DialogueBuilder {
        DialogueBuilder::new(name)
    }

    /// Name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the dialogue has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Dialogue-wide timeout for steps without their own.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Check the dialogue against `vars` without touching any session.
    ///
    /// Fails if there are no steps, if any waiting step would run with a
    /// zero timeout, or if an input names a variable missing from `vars`.
    pub fn validate(&self, vars: &DialogueVars) -> std::result::Result<(), DialogueError> {
        if self.steps.is_empty() {
            return Err(DialogueError::Empty {
                dialogue: self.name.clone(),
            });
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.waits() {
                let timeout = step.timeout().or(self.default_timeout);
                if timeout.is_some_and(|t| t.is_zero()) {
                    return Err(DialogueError::ZeroTimeout {
                        dialogue: self.name.clone(),
                        step: index,
                    });
                }
            }

            if let Some(Input::Var { name, .. }) = step.input() {
                if !vars.contains(name) {
                    return Err(DialogueError::UnboundVariable {
                        dialogue: self.name.clone(),
                        step: index,
                        name: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Validate, then run every step in order on `session`.
    ///
    /// Steps without a timeout use the dialogue's default, then the
    /// session's. The first failing step aborts the run with
    /// [`DialogueError::StepFailed`]; partial configuration on the remote
    /// side is left for the caller to deal with.
    pub fn run<T: Transport>(
        &self,
        session: &mut Session<T>,
        vars: &DialogueVars,
    ) -> Result<Transcript> {
        self.validate(vars)?;

        info!("dialogue '{}': {} steps", self.name, self.steps.len());
        let start = Instant::now();
        let mut records = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let description = step.describe();
            debug!("dialogue '{}' step {}: {}", self.name, index, description);

            let timeout = step
                .timeout()
                .or(self.default_timeout)
                .unwrap_or(session.config().default_timeout);

            let step_start = Instant::now();
            match self.run_step(session, step, index, vars, timeout) {
                Ok((output, typed)) => records.push(StepRecord {
                    index,
                    description,
                    input: step
                        .input()
                        .filter(|_| typed)
                        .map(|input| input.display(vars)),
                    output,
                    elapsed: step_start.elapsed(),
                }),
                Err(source) => {
                    warn!(
                        "dialogue '{}' aborted at step {} ({}): {}",
                        self.name, index, description, source
                    );
                    return Err(DialogueError::StepFailed {
                        dialogue: self.name.clone(),
                        step: index,
                        description,
                        source: Box::new(source),
                    }
                    .into());
                }
            }
        }

        let elapsed = start.elapsed();
        info!("dialogue '{}' finished in {:?}", self.name, elapsed);
        Ok(Transcript::new(self.name.clone(), records, elapsed))
    }

    /// Run one step, returning its output and whether anything was typed.
    fn run_step<T: Transport>(
        &self,
        session: &mut Session<T>,
        step: &Step,
        index: usize,
        vars: &DialogueVars,
        timeout: Duration,
    ) -> Result<(String, bool)> {
        match step {
            Step::Send { input } => {
                let resolved = self.resolve(input, index, vars)?;
                Self::type_input(session, resolved)?;
                Ok((String::new(), true))
            }
            Step::Expect { pattern, .. } => {
                Ok((session.expect_pattern(pattern, timeout)?.output(), false))
            }
            Step::Answer { pattern, input, .. } => {
                let resolved = self.resolve(input, index, vars)?;
                let matched = session.expect_pattern(pattern, timeout)?;
                let typed = !resolved.text.is_empty();
                if typed {
                    Self::type_input(session, resolved)?;
                }
                Ok((matched.output(), typed))
            }
        }
    }

    fn resolve<'a>(
        &self,
        input: &'a Input,
        index: usize,
        vars: &'a DialogueVars,
    ) -> std::result::Result<Resolved<'a>, DialogueError> {
        input
            .resolve(vars)
            .ok_or_else(|| DialogueError::UnboundVariable {
                dialogue: self.name.clone(),
                step: index,
                name: input.label(),
            })
    }

    fn type_input<T: Transport>(session: &mut Session<T>, input: Resolved<'_>) -> Result<()> {
        if input.hidden {
            session.send_masked(input.text)
        } else {
            session.send(input.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::{MASK, SessionConfig};
    use crate::transport::ScriptedTransport;

    fn quick() -> SessionConfig {
        SessionConfig::default()
            .poll_interval(Duration::from_millis(10))
            .default_timeout(Duration::from_secs(2))
    }

    fn replication_primary() -> Dialogue {
        Dialogue::builder("replication primary")
            .send("ap")
            .answer("Press any key to continue.", "")
            .within(Duration::from_secs(5))
            .answer("Choose the advanced setting: ", "8")
            .answer("Choose the database replication operation: ", "1")
            .answer(
                "Enter the number uniquely identifying this node in the replication cluster: ",
                "1",
            )
            .answer(r"Enter the cluster database password: ", Input::var("password"))
            .answer(r"Enter the primary database hostname or IP address: \|.*\| ", Input::var("app0_ip"))
            .answer(r"Apply this Replication Server Configuration\? \(Y/N\): ", "y")
            .expect("Press any key to continue.")
            .build()
            .unwrap()
    }

    fn console() -> ScriptedTransport {
        ScriptedTransport::new()
            .reply_to("ap", "\x1b[2JAppliance summary\nPress any key to continue.")
            .output_after(
                Duration::from_millis(30),
                "\nAdvanced Setting\n\nChoose the advanced setting: ",
            )
            .reply_to("8", "Choose the database replication operation: ")
            .reply_to(
                "1",
                "Enter the number uniquely identifying this node in the replication cluster: ",
            )
            .reply_to("1", "Enter the cluster database password: ")
            .reply_to("smartvm", "Enter the primary database hostname or IP address: |10.0.0.9| ")
            .reply_to("10.0.0.5", "Apply this Replication Server Configuration? (Y/N): ")
            .reply_to_after("y", Duration::from_millis(50), "Configuring...\nPress any key to continue.")
    }

    fn vars() -> DialogueVars {
        DialogueVars::new()
            .with("app0_ip", "10.0.0.5")
            .with_secret("password", "smartvm")
    }

    #[test]
    fn test_run_full_dialogue() {
        let transport = console();
        let log = transport.handle();
        let mut session = Session::with_config(transport, quick());

        let transcript = replication_primary().run(&mut session, &vars()).unwrap();

        assert_eq!(
            log.written_lines(),
            vec!["ap", "8", "1", "1", "smartvm", "10.0.0.5", "y"]
        );
        assert_eq!(transcript.steps.len(), 9);
        assert_eq!(transcript.inputs(), vec!["ap", "8", "1", "1", MASK, "10.0.0.5", "y"]);
        assert_eq!(transcript.steps[1].input, None);
        assert!(transcript.steps[1].output.contains("Press any key"));
        assert!(transcript.full_output().contains("Configuring..."));
        assert!(!transcript.full_output().contains("\x1b"));
    }

    #[test]
    fn test_session_run_delegates() {
        let transport = ScriptedTransport::new().reply_to("ap", "Press any key to continue.");
        let mut session = Session::with_config(transport, quick());
        let dialogue = Dialogue::builder("launch")
            .send("ap")
            .expect("Press any key")
            .build()
            .unwrap();

        let transcript = session.run(&dialogue, &DialogueVars::new()).unwrap();
        assert_eq!(transcript.final_output(), Some("Press any key"));
    }

    #[test]
    fn test_unbound_variable_fails_before_io() {
        let transport = console();
        let log = transport.handle();
        let mut session = Session::with_config(transport, quick());

        let err = replication_primary()
            .run(&mut session, &DialogueVars::new().with("app0_ip", "10.0.0.5"))
            .unwrap_err();

        match err {
            Error::Dialogue(DialogueError::UnboundVariable { step, name, .. }) => {
                assert_eq!(step, 5);
                assert_eq!(name, "password");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(log.written(), "");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dialogue = Dialogue::builder("d")
            .expect("x")
            .within(Duration::ZERO)
            .build()
            .unwrap();
        let err = dialogue.validate(&DialogueVars::new()).unwrap_err();
        assert!(matches!(err, DialogueError::ZeroTimeout { step: 0, .. }));

        let dialogue = Dialogue::builder("d")
            .expect("x")
            .default_timeout(Duration::ZERO)
            .build()
            .unwrap();
        assert!(dialogue.validate(&DialogueVars::new()).is_err());
    }

    #[test]
    fn test_out_of_order_prompt_aborts_with_step() {
        let transport = ScriptedTransport::new()
            .reply_to("ap", "Choose the advanced setting: ")
            .reply_to("7", "Enter the database region number: ");
        let log = transport.handle();
        let mut session = Session::with_config(transport, quick());

        let dialogue = Dialogue::builder("create region")
            .send("ap")
            .answer("Choose the advanced setting: ", "7")
            .answer("Choose the encryption key: ", "1")
            .within(Duration::from_millis(150))
            .answer("Enter the database region number: ", "0")
            .build()
            .unwrap();

        let err = dialogue.run(&mut session, &DialogueVars::new()).unwrap_err();
        assert!(err.is_timeout());
        match err {
            Error::Dialogue(DialogueError::StepFailed {
                step, description, ..
            }) => {
                assert_eq!(step, 2);
                assert!(description.contains("Choose the encryption key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Nothing after the failed step was typed
        assert_eq!(log.written_lines(), vec!["ap", "7"]);
    }
}
