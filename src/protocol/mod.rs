//! # Peripage Protocol Layer
//!
//! Pure encoding for the Peripage binary command protocol. Nothing in this
//! layer performs I/O; everything returns byte buffers or op lists that the
//! [`crate::printer`] handle plays against a [`crate::transport::Session`].
//!
//! ## Modules
//!
//! - [`commands`]: opcode builders, device query codes, ASCII filtering
//! - [`text`]: stateful line wrapping for the device's raw ASCII mode
//! - [`image`]: raster row normalization and transfer chunking

pub mod commands;
pub mod image;
pub mod text;

pub use text::{LineBuffer, TextOp};
