//! SSH transport implementation using russh.
//!
//! russh is async; sessions are blocking. The transport owns a small tokio
//! runtime that keeps the connection task running in the background and
//! bridges each read and write with `block_on`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;
use tokio::runtime::Runtime;

use super::Transport;
use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::error::{Result, TransportError};

/// SSH transport: one PTY shell channel on one connection.
pub struct SshTransport {
    /// Drives the russh connection task.
    runtime: Runtime,

    /// The russh session handle.
    session: Handle<SshHandler>,

    /// The interactive channel (None once closed or hung up).
    channel: Option<Channel<Msg>>,

    /// Set when the remote side ended the channel.
    hung_up: bool,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect, authenticate and open an interactive PTY shell.
    pub fn connect(config: SshConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("conscript-ssh")
            .enable_all()
            .build()
            .map_err(TransportError::Io)?;

        let (session, channel) = runtime.block_on(Self::establish(&config))?;
        debug!("SSH shell open on {}", config.socket_addr());

        Ok(Self {
            runtime,
            session,
            channel: Some(channel),
            hung_up: false,
            config,
        })
    }

    /// Get the configuration this transport was opened with.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    fn open_channel(&self) -> std::result::Result<&Channel<Msg>, TransportError> {
        match &self.channel {
            Some(channel) => Ok(channel),
            None if self.hung_up => Err(TransportError::Disconnected),
            None => Err(TransportError::Closed),
        }
    }

    async fn establish(config: &SshConfig) -> Result<(Handle<SshHandler>, Channel<Msg>)> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic one
            let stored = host_key_error
                .lock()
                .ok()
                .and_then(|mut slot| slot.take());
            match (stored, e) {
                (Some(hk_err), _) => hk_err,
                (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                },
                (None, e) => TransportError::Ssh(e),
            }
        })?;

        Self::authenticate(&mut session, config).await?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok((session, channel))
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }
}

impl Transport for SshTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let channel = self.open_channel()?;
        self.runtime
            .block_on(channel.data(data))
            .map_err(TransportError::Ssh)?;
        Ok(())
    }

    fn read(&mut self, wait: Duration) -> Result<Bytes> {
        if self.hung_up {
            return Err(TransportError::Disconnected.into());
        }
        let channel = self.channel.as_mut().ok_or(TransportError::Closed)?;

        let msg = self
            .runtime
            .block_on(async { tokio::time::timeout(wait, channel.wait()).await });

        match msg {
            Err(_elapsed) => Ok(Bytes::new()),
            Ok(Some(ChannelMsg::Data { data })) => Ok(Bytes::copy_from_slice(&data)),
            Ok(Some(ChannelMsg::ExtendedData { data, .. })) => Ok(Bytes::copy_from_slice(&data)),
            Ok(Some(ChannelMsg::Eof | ChannelMsg::Close)) | Ok(None) => {
                debug!("SSH channel to {} hung up", self.config.socket_addr());
                self.channel = None;
                self.hung_up = true;
                Err(TransportError::Disconnected.into())
            }
            Ok(Some(_)) => Ok(Bytes::new()),
        }
    }

    fn close(&mut self) -> Result<()> {
        let channel = self.channel.take();
        self.runtime.block_on(async {
            if let Some(channel) = channel {
                if let Err(e) = channel.close().await {
                    debug!("closing SSH channel: {}", e);
                }
            }
            self.session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
        })
        .map_err(TransportError::Ssh)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.channel.is_some() && !self.session.is_closed()
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
