//! # Error Types
//!
//! This module defines error types used throughout the papelito library.
//!
//! The taxonomy follows how failures are handled, not where they occur:
//!
//! - [`PapelitoError::Transport`] — connection, timeout and send/receive
//!   failures. These are expected in normal operation (the printer sleeps,
//!   walks out of Bluetooth range, runs out of battery) and drive the print
//!   service's reconnect cycle. They are never raised to a task's submitter.
//! - [`PapelitoError::Protocol`] — caller passed data the protocol cannot
//!   express (e.g. a model whose row width exceeds the one-byte header
//!   field). These indicate a programmer error and surface immediately.
//!
//! Out-of-range numeric arguments (break size, concentration, power timeout)
//! are *not* errors: the encoder clamps them silently, matching device
//! tolerance.

use thiserror::Error;

/// Main error type for papelito operations
#[derive(Debug, Error)]
pub enum PapelitoError {
    /// Transport-level errors (connection, timeout, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid data that cannot be normalized at the encoding boundary
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PapelitoError {
    /// True for failures that should trigger the service reconnect cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, PapelitoError::Transport(_) | PapelitoError::Io(_))
    }
}
