//! # Printer Transport Layer
//!
//! This module owns the single physical connection to the device.
//!
//! Two small traits form the seam:
//!
//! - [`Transport`]: one open link — send, bounded receive, advisory
//!   liveness probe
//! - [`Connector`]: knows how to (re)dial the endpoint and produce a fresh
//!   [`Transport`]
//!
//! [`Session`] composes them into the connect / reconnect / disconnect
//! lifecycle the rest of the crate uses. Tests substitute in-memory
//! implementations of both traits; production code uses
//! [`rfcomm::RfcommConnector`].
//!
//! ## Failure policy
//!
//! Every send/receive is bounded by the session's configured timeout. A
//! timeout or transport error is surfaced to the caller as
//! [`PapelitoError::Transport`] and is **never** retried here — retry policy
//! (reconnect with backoff) belongs to [`crate::service::PrintService`].

pub mod rfcomm;

use std::time::Duration;

use tracing::debug;

use crate::error::PapelitoError;

pub use rfcomm::{RfcommConnector, RfcommTransport};

/// Default send/receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default receive buffer size for query responses.
pub const DEFAULT_RECV_SIZE: usize = 1024;

/// One open link to the device.
///
/// Implementations must not retry internally; errors propagate so the
/// session can report the link dead.
pub trait Transport: Send {
    /// Write `data` to the device.
    fn send(&mut self, data: &[u8]) -> Result<(), PapelitoError>;

    /// Read up to `max_len` response bytes, waiting at most the configured
    /// timeout. Reading nothing within the timeout is an error.
    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, PapelitoError>;

    /// Best-effort peer probe. `false` means the link is certainly dead;
    /// `true` does not guarantee the device will answer — the protocol has
    /// no heartbeat, so this is advisory only.
    fn is_live(&self) -> bool;

    /// Update the receive timeout on the open link.
    fn set_timeout(&mut self, timeout: Duration);
}

/// Dials the device endpoint and produces a fresh [`Transport`].
///
/// The print service redials through the same connector on every reconnect
/// cycle, so implementations must be reusable after failures.
pub trait Connector: Send {
    fn open(&mut self, timeout: Duration) -> Result<Box<dyn Transport>, PapelitoError>;
}

/// # Transport Session
///
/// Owns the connection lifecycle over a [`Connector`]: at most one link is
/// open at a time, and every operation on a closed session fails with a
/// transport error rather than panicking.
pub struct Session {
    connector: Box<dyn Connector>,
    link: Option<Box<dyn Transport>>,
    timeout: Duration,
}

impl Session {
    /// Create a disconnected session over `connector`.
    pub fn new(connector: Box<dyn Connector>, timeout: Duration) -> Self {
        Self {
            connector,
            link: None,
            timeout,
        }
    }

    /// Open a new link without checking for an existing one.
    ///
    /// The device neither prints nor responds until a protocol reset is
    /// sent on the new link; [`crate::printer::Printer::reset`] does that.
    /// Prefer [`Session::reconnect`] unless the session is known closed —
    /// dialing twice leaves the first link's descriptor unusable.
    pub fn connect(&mut self) -> Result<(), PapelitoError> {
        let link = self.connector.open(self.timeout)?;
        self.link = Some(link);
        debug!("transport connected");
        Ok(())
    }

    /// Close any live link, then open a fresh one.
    pub fn reconnect(&mut self) -> Result<(), PapelitoError> {
        self.disconnect();
        self.connect()
    }

    /// Drop the link, if any. Always succeeds.
    pub fn disconnect(&mut self) {
        if self.link.take().is_some() {
            debug!("transport disconnected");
        }
    }

    /// Advisory liveness: `false` when disconnected or the peer probe fails.
    pub fn is_live(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_live())
    }

    /// Current send/receive timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the send/receive timeout, applying it to a live link as well.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        if let Some(link) = self.link.as_mut() {
            link.set_timeout(timeout);
        }
    }

    /// Send without expecting a response.
    pub fn send(&mut self, data: &[u8]) -> Result<(), PapelitoError> {
        self.link_mut()?.send(data)
    }

    /// Send, then read up to `max_len` response bytes.
    pub fn send_recv(&mut self, data: &[u8], max_len: usize) -> Result<Vec<u8>, PapelitoError> {
        let link = self.link_mut()?;
        link.send(data)?;
        link.recv(max_len)
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn Transport>, PapelitoError> {
        self.link
            .as_mut()
            .ok_or_else(|| PapelitoError::Transport("session is not connected".to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
