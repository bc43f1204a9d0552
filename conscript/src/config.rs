//! Run configuration.
//!
//! Credentials, timeouts and connection settings for a test run, read from a
//! TOML file. Every section is optional and falls back to the defaults used
//! elsewhere in the crate, so a file holding only credentials is enough.
//!
//! ```toml
//! [credentials.ssh]
//! username = "root"
//! password = "smartvm"
//!
//! [session]
//! timeout_secs = 60
//!
//! [ssh]
//! host_key_verification = "disabled"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::dialogue::DialogueVars;
use crate::error::ConfigError;
use crate::session::SessionConfig;
use crate::transport::{HostKeyVerification, SshConfig};
use crate::wait::Poller;

/// Everything a test run needs to reach and drive its consoles.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub credentials: Credentials,
    pub session: SessionSection,
    pub wait: WaitSection,
    pub ssh: SshSection,
}

/// Login pairs, by purpose.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    /// Shell login on the appliance.
    pub ssh: Login,

    /// Database superuser, used by replication and region dialogues.
    pub database: Login,
}

/// A username and password.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Login {
    pub username: String,
    #[serde(deserialize_with = "secret")]
    pub password: Option<SecretString>,
}

impl Default for Login {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            password: None,
        }
    }
}

/// `[session]`: see [`SessionConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub line_terminator: String,
    pub strip_ansi: bool,
    pub search_depth: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            timeout_secs: defaults.default_timeout.as_secs(),
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            line_terminator: defaults.line_terminator,
            strip_ansi: defaults.strip_ansi,
            search_depth: defaults.search_depth,
        }
    }
}

/// `[wait]`: defaults for condition polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitSection {
    pub delay_secs: f64,
    pub timeout_secs: f64,
}

impl Default for WaitSection {
    fn default() -> Self {
        let defaults = Poller::default();
        Self {
            delay_secs: defaults.get_delay().as_secs_f64(),
            timeout_secs: defaults.get_timeout().as_secs_f64(),
        }
    }
}

/// `[ssh]`: connection settings shared by every host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSection {
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub host_key_verification: HostKeyVerification,
    pub known_hosts_path: Option<PathBuf>,
    pub terminal_width: u32,
    pub terminal_height: u32,
}

impl Default for SshSection {
    fn default() -> Self {
        let defaults = SshConfig::new("", "");
        Self {
            port: defaults.port,
            connect_timeout_secs: defaults.timeout.as_secs(),
            host_key_verification: defaults.host_key_verification,
            known_hosts_path: None,
            terminal_width: defaults.terminal_width,
            terminal_height: defaults.terminal_height,
        }
    }
}

fn secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl RunConfig {
    /// Read and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loading run configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no session or poller can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.poll_interval_ms == 0 {
            return Err(invalid("session.poll_interval_ms must be greater than zero"));
        }
        if self.session.line_terminator.is_empty() {
            return Err(invalid("session.line_terminator must not be empty"));
        }
        for (key, value) in [
            ("wait.delay_secs", self.wait.delay_secs),
            ("wait.timeout_secs", self.wait.timeout_secs),
        ] {
            if secs(value).is_none() {
                return Err(invalid(format!(
                    "{key} must be a non-negative number of seconds within range, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Session settings from `[session]`.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .default_timeout(Duration::from_secs(self.session.timeout_secs))
            .poll_interval(Duration::from_millis(self.session.poll_interval_ms))
            .line_terminator(self.session.line_terminator.clone())
            .strip_ansi(self.session.strip_ansi)
            .search_depth(self.session.search_depth)
    }

    /// A poller with the `[wait]` delay and timeout.
    ///
    /// Values that fail [`validate`](Self::validate) fall back to the
    /// poller defaults.
    pub fn poller(&self) -> Poller {
        let defaults = Poller::default();
        Poller::new(secs(self.wait.timeout_secs).unwrap_or(defaults.get_timeout()))
            .delay(secs(self.wait.delay_secs).unwrap_or(defaults.get_delay()))
    }

    /// SSH settings for `host`, logging in with the SSH credentials.
    pub fn ssh_config(&self, host: impl Into<String>) -> SshConfig {
        let ssh = &self.ssh;
        let mut config = SshConfig::new(host, self.credentials.ssh.username.clone())
            .port(ssh.port)
            .timeout(Duration::from_secs(ssh.connect_timeout_secs))
            .terminal_size(ssh.terminal_width, ssh.terminal_height)
            .host_key_verification(ssh.host_key_verification.clone());
        if let Some(path) = &ssh.known_hosts_path {
            config = config.known_hosts_path(path);
        }
        if let Some(password) = &self.credentials.ssh.password {
            config = config.password(password.clone());
        }
        config
    }

    /// Credentials as dialogue variables.
    ///
    /// Binds `username`/`password` to the database login and
    /// `sshlogin`/`sshpass` to the shell login. Unset passwords are left
    /// unbound so a dialogue that needs one fails validation.
    pub fn credential_vars(&self) -> DialogueVars {
        let mut vars = DialogueVars::new();
        let database = &self.credentials.database;
        let ssh = &self.credentials.ssh;

        vars.set("username", database.username.clone());
        if let Some(password) = &database.password {
            vars.set_secret("password", password.clone());
        }
        vars.set("sshlogin", ssh.username.clone());
        if let Some(password) = &ssh.password {
            vars.set_secret("sshpass", password.clone());
        }
        vars
    }
}

/// Seconds as a `Duration`, or `None` if negative, NaN or too large.
fn secs(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
