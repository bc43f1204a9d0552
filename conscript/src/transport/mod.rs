//! Transport layer: the byte pipe a session talks through.
//!
//! A [`Transport`] is a blocking, text-oriented, bidirectional channel to an
//! interactive program. [`SshTransport`] speaks SSH (PTY + shell) via russh;
//! [`ScriptedTransport`] is an in-memory stand-in that replays canned output,
//! used for tests and for dry runs of dialogues.

pub mod config;
mod scripted;
mod ssh;

use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use scripted::{ScriptHandle, ScriptedTransport};
pub use ssh::SshTransport;

/// A blocking byte channel to a remote interactive program.
pub trait Transport: Send {
    /// Write raw bytes to the remote input.
    ///
    /// Fails with [`TransportError::Closed`](crate::error::TransportError::Closed)
    /// once the transport is closed.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `wait` for output.
    ///
    /// Returns whatever arrived (possibly empty if nothing did). Fails with
    /// [`TransportError::Disconnected`](crate::error::TransportError::Disconnected)
    /// once the remote side has hung up and no data is left.
    fn read(&mut self, wait: Duration) -> Result<Bytes>;

    /// Release the underlying resources.
    fn close(&mut self) -> Result<()>;

    /// Whether the transport can still be used.
    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, wait: Duration) -> Result<Bytes> {
        (**self).read(wait)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
