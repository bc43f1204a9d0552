//! # Conscript
//!
//! Scripted console dialogues over SSH, and condition polling, for appliance
//! test automation.
//!
//! Appliance configuration menus are built for people: they print a prompt
//! and wait. Conscript drives them from tests the way `expect` does, and
//! polls the backend until the configuration it triggered has taken effect.
//!
//! ## Features
//!
//! - Blocking SSH sessions via russh, with a PTY shell
//! - `send` / `expect` / `answer` over an append-only output buffer with a
//!   forward-only match cursor
//! - Dialogues as data: ordered steps, validated before anything is sent
//! - Hidden input for passwords, masked in logs and transcripts
//! - Condition polling with a bounded time budget
//! - Scripted in-memory transport for testing dialogues offline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use conscript::{Dialogue, DialogueVars, Input, Poller, Session, SessionConfig, SshConfig};
//!
//! fn main() -> Result<(), conscript::Error> {
//!     let config = SshConfig::new("10.0.0.5", "root").password("smartvm");
//!     let mut session = Session::connect(config, SessionConfig::default())?;
//!
//!     let dialogue = Dialogue::builder("reset region")
//!         .send("ap")
//!         .answer("Press any key to continue.", "")
//!         .answer("Choose the advanced setting: ", "5")
//!         .answer("Enter the database password: ", Input::var("password"))
//!         .expect("Press any key to continue.")
//!         .within(Duration::from_secs(300))
//!         .build()?;
//!
//!     let vars = DialogueVars::new().with_secret("password", "smartvm");
//!     session.run(&dialogue, &vars)?;
//!     session.close()?;
//!
//!     Poller::new(Duration::from_secs(600))
//!         .message("web ui to come up")
//!         .wait_until(|| web_ui_running())?;
//!     Ok(())
//! }
//! # fn web_ui_running() -> bool { true }
//! ```

pub mod channel;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod session;
pub mod transport;
pub mod wait;

// Re-export main types for convenience
pub use channel::Pattern;
pub use config::RunConfig;
pub use dialogue::{Dialogue, DialogueBuilder, DialogueVars, Input, Step, StepRecord, Transcript};
pub use error::{Error, Result};
pub use session::{ExpectMatch, Session, SessionConfig};
pub use transport::{
    AuthMethod, HostKeyVerification, ScriptHandle, ScriptedTransport, SshConfig, SshTransport,
    Transport,
};
pub use wait::{Poller, Truthy, WaitError, WaitOutcome, WaitTimeout, wait_for, wait_for_with};
