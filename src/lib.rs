//! # Papelito - Peripage Thermal Printer Library
//!
//! Papelito is a Rust library for printing on Peripage pocket thermal
//! printers (A6, A6+, A40, A40+) via Bluetooth. It provides:
//!
//! - **Protocol implementation**: byte-exact builders for the proprietary
//!   Peripage command set (reset, feed, concentration, raster transfer,
//!   device queries)
//! - **Text wrapping**: stateful line folding that keeps the invisible
//!   in-printer ASCII buffer in sync and never triggers the repeated-LF
//!   firmware freeze
//! - **Image chunking**: raster transfers sliced against the protocol's
//!   height limits, rows normalized to the model's byte width
//! - **Transport**: Bluetooth RFCOMM communication with bounded timeouts
//! - **Print service**: a background worker that serializes concurrent
//!   print requests into one ordered command stream and keeps the flaky
//!   Bluetooth link alive
//!
//! ## Quick Start
//!
//! ```no_run
//! use papelito::printer::{Model, Printer};
//! use papelito::transport::RfcommConnector;
//!
//! // Open a connection (pairs /dev/rfcomm0 by default) and reset
//! let mut printer = Printer::open(RfcommConnector::default_device(), Model::A6p)?;
//!
//! printer.set_concentration(1)?;
//! printer.println_text("hello, thermal world")?;
//! printer.print_break(100)?;
//!
//! # Ok::<(), papelito::PapelitoError>(())
//! ```
//!
//! For anything long-running, put the printer behind a
//! [`service::PrintService`] and submit tasks from as many threads as you
//! like; the service guarantees ordering and handles reconnects.
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Peripage command builders, text wrapping, image chunking |
//! | [`transport`] | Session lifecycle and the RFCOMM backend |
//! | [`printer`] | Model registry and the device handle |
//! | [`service`] | Background print queue and connection management |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Currently tested with:
//! - Peripage A6+ (576 px, Bluetooth)
//!
//! A6, A40 and A40+ use the same protocol with different row geometry and
//! are registered in [`printer::Model`]. The raster header's height byte
//! order varies across firmware generations; see [`printer::HeightOrder`]
//! if prints come out garbled.

pub mod error;
pub mod printer;
pub mod protocol;
pub mod service;
pub mod transport;

// Re-exports for convenience
pub use error::PapelitoError;
pub use printer::{Model, Printer};
pub use service::{PrintService, ServiceConfig};
pub use transport::Session;
