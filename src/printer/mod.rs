//! # Printer Handle
//!
//! [`Printer`] is the collaborator-facing handle: it binds a transport
//! [`Session`] to a [`Model`] and turns logical operations (print text,
//! print an image, query status) into the protocol layer's byte sequences,
//! pacing writes the way the hardware needs.
//!
//! One invariant runs through everything here: **at most one in-flight
//! command exchange at a time**. The protocol has no correlation IDs, so a
//! second request sent before the first response arrives desynchronizes the
//! framing for the rest of the session. Callers that share a printer across
//! threads should go through [`crate::service::PrintService`], which owns
//! the handle on a single worker.
//!
//! ## Example
//!
//! ```no_run
//! use papelito::printer::{Model, Printer};
//! use papelito::transport::RfcommConnector;
//!
//! let mut printer = Printer::open(RfcommConnector::default_device(), Model::A6p)?;
//! printer.print_text("hello from papelito\n")?;
//! printer.flush_text()?;
//! printer.print_break(100)?;
//! println!("battery: {}%", printer.query_battery()?);
//! # Ok::<(), papelito::PapelitoError>(())
//! ```

pub mod model;

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::PapelitoError;
use crate::protocol::text::{LineBuffer, TextOp};
use crate::protocol::{commands, image};
use crate::transport::{Connector, DEFAULT_RECV_SIZE, DEFAULT_TIMEOUT, Session};

pub use model::{HeightOrder, Model, ModelSpec};

/// Delay between text line writes; matches the device's print rate in raw
/// ASCII mode.
pub const DEFAULT_TEXT_DELAY: Duration = Duration::from_millis(250);

/// Delay between raster row writes.
pub const DEFAULT_ROW_DELAY: Duration = Duration::from_millis(image::DEFAULT_ROW_DELAY_MS);

/// Everything the full-info query reports, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device name plus MAC fragment, e.g. `PeriPage+DF7A`
    pub name: String,
    /// Device MAC address as reported by the device
    pub device_mac: String,
    /// MAC of the connected client (us)
    pub client_mac: String,
    /// Firmware version, e.g. `V2.11_304dpi`
    pub firmware: String,
    /// Serial number
    pub serial_number: String,
    /// Battery percentage
    pub battery: u8,
}

/// # Printer Handle
///
/// Owns the transport session, the model geometry and the text-wrap state
/// for one device.
pub struct Printer {
    session: Session,
    model: Model,
    height_order: HeightOrder,
    line: LineBuffer,
    text_delay: Duration,
    row_delay: Duration,
}

impl Printer {
    /// Create a handle over an already-built session.
    pub fn new(session: Session, model: Model) -> Self {
        Self {
            session,
            model,
            height_order: HeightOrder::default(),
            line: LineBuffer::new(model.spec().row_characters),
            text_delay: DEFAULT_TEXT_DELAY,
            row_delay: DEFAULT_ROW_DELAY,
        }
    }

    /// Build a session over `connector` with the default timeout, connect,
    /// and reset the device.
    pub fn open<C: Connector + 'static>(connector: C, model: Model) -> Result<Self, PapelitoError> {
        let mut printer = Self::new(Session::new(Box::new(connector), DEFAULT_TIMEOUT), model);
        printer.connect()?;
        printer.reset()?;
        Ok(printer)
    }

    /// The model this handle encodes for.
    pub fn model(&self) -> Model {
        self.model
    }

    /// Override the row-count byte order of the transfer header.
    ///
    /// This is a firmware quirk that must be verified against the target
    /// device; see [`HeightOrder`].
    pub fn set_height_order(&mut self, order: HeightOrder) {
        self.height_order = order;
    }

    /// Change the pacing delay between text line writes.
    pub fn set_text_delay(&mut self, delay: Duration) {
        self.text_delay = delay;
    }

    /// Change the pacing delay between raster row writes.
    pub fn set_row_delay(&mut self, delay: Duration) {
        self.row_delay = delay;
    }

    /// Change the transport send/receive timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(timeout);
    }

    // ========================================================================
    // CONNECTION LIFECYCLE
    // ========================================================================

    /// Open the transport. Call [`Printer::reset`] afterwards — the device
    /// ignores everything until it sees a reset.
    pub fn connect(&mut self) -> Result<(), PapelitoError> {
        self.session.connect()
    }

    /// Close and re-open the transport. The wrap buffer is cleared: the
    /// in-printer ASCII buffer does not survive a reconnect, so holding on
    /// to `pending` would desynchronize the two. Call [`Printer::reset`]
    /// afterwards.
    pub fn reconnect(&mut self) -> Result<(), PapelitoError> {
        self.line = LineBuffer::new(self.model.spec().row_characters);
        self.session.reconnect()
    }

    /// Close the transport.
    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }

    /// Advisory liveness of the transport; see
    /// [`crate::transport::Transport::is_live`].
    pub fn is_connected(&self) -> bool {
        self.session.is_live()
    }

    // ========================================================================
    // DEVICE CONTROL
    // ========================================================================

    /// Send the reset sequence. Required once after every (re)connect;
    /// issued automatically before each raster chunk.
    pub fn reset(&mut self) -> Result<(), PapelitoError> {
        self.session.send(&commands::reset())
    }

    /// Feed out blank paper; `size` clamps to `[1, 255]`.
    pub fn print_break(&mut self, size: i32) -> Result<(), PapelitoError> {
        self.session.send(&commands::print_break(size))
    }

    /// Set concentration (darkness); `level` snaps to `{0, 1, 2}`.
    pub fn set_concentration(&mut self, level: i32) -> Result<(), PapelitoError> {
        self.session.send(&commands::concentration(level))
    }

    /// Set the auto-poweroff timeout in minutes; clamps to `[1, 0xFFF0]`.
    pub fn set_power_timeout(&mut self, minutes: i32) -> Result<(), PapelitoError> {
        self.session.send(&commands::power_timeout(minutes))
    }

    /// Overwrite the device serial number (ASCII-filtered).
    pub fn set_serial_number(&mut self, serial: &str) -> Result<(), PapelitoError> {
        self.session.send(&commands::set_serial_number(serial))
    }

    // ========================================================================
    // TEXT PRINTING
    // ========================================================================

    /// Print text through the wrap buffer.
    ///
    /// Complete rows are written immediately; a trailing partial row waits
    /// in the buffer for the next call or [`Printer::flush_text`]. Blank
    /// lines become paper feeds — raw `LF` runs would freeze the device.
    pub fn print_text(&mut self, text: &str) -> Result<(), PapelitoError> {
        let ops = self.line.feed(text);
        self.apply_text_ops(&ops)
    }

    /// Print text plus a terminating newline.
    pub fn println_text(&mut self, text: &str) -> Result<(), PapelitoError> {
        let ops = self.line.feed_line(text);
        self.apply_text_ops(&ops)
    }

    /// Force out the partial line held in the wrap buffer, if any.
    pub fn flush_text(&mut self) -> Result<(), PapelitoError> {
        let ops = self.line.flush();
        self.apply_text_ops(&ops)
    }

    /// The partial line currently buffered (mirrors the in-printer buffer).
    pub fn pending_text(&self) -> &str {
        self.line.pending()
    }

    fn apply_text_ops(&mut self, ops: &[TextOp]) -> Result<(), PapelitoError> {
        for op in ops {
            match op {
                TextOp::Write(line) => {
                    let mut bytes = line.as_bytes().to_vec();
                    bytes.push(commands::LF);
                    self.session.send(&bytes)?;
                }
                TextOp::Break(size) => {
                    self.session.send(&commands::print_break(*size))?;
                }
            }
            thread::sleep(self.text_delay);
        }
        Ok(())
    }

    // ========================================================================
    // IMAGE PRINTING
    // ========================================================================

    /// Print a monochrome bitmap given as rows of packed pixels (1 bit per
    /// pixel, row-major). Rows are normalized to the model's byte width and
    /// sent in chunks of at most 255 rows, each under its own reset +
    /// transfer header. Zero rows is a no-op.
    pub fn print_image(&mut self, rows: &[Vec<u8>]) -> Result<(), PapelitoError> {
        let spec = self.model.spec();
        for chunk in image::chunks(rows) {
            debug!(rows = chunk.height(), "sending raster chunk");
            let writes = chunk.encode(&spec, self.height_order)?;
            // reset + header together, then rows paced individually
            self.session.send(&writes[0])?;
            self.session.send(&writes[1])?;
            for row in &writes[2..] {
                self.session.send(row)?;
                thread::sleep(self.row_delay);
            }
        }
        Ok(())
    }

    /// Print a bitmap given as one contiguous buffer of concatenated rows.
    pub fn print_image_bytes(&mut self, buf: &[u8]) -> Result<(), PapelitoError> {
        let rows = image::rows_from_flat(buf, self.model.spec().row_bytes);
        self.print_image(&rows)
    }

    /// Print a single row; convenience wrapper over [`Printer::print_image`].
    pub fn print_row(&mut self, row: &[u8]) -> Result<(), PapelitoError> {
        self.print_image(&[row.to_vec()])
    }

    // ========================================================================
    // DEVICE QUERIES
    // ========================================================================

    /// Battery percentage; second byte of the 2-byte reply.
    ///
    /// This is the cheapest query the device answers, which makes it the
    /// keep-alive of choice for [`crate::service::PrintService`].
    pub fn query_battery(&mut self) -> Result<u8, PapelitoError> {
        let reply = self
            .session
            .send_recv(commands::query::BATTERY, DEFAULT_RECV_SIZE)?;
        reply.get(1).copied().ok_or_else(|| {
            PapelitoError::Transport(format!("Short battery reply: {} bytes", reply.len()))
        })
    }

    /// Firmware version string, e.g. `V2.11_304dpi`.
    pub fn query_firmware(&mut self) -> Result<String, PapelitoError> {
        self.query_string(commands::query::FIRMWARE)
    }

    /// Serial number string.
    pub fn query_serial_number(&mut self) -> Result<String, PapelitoError> {
        self.query_string(commands::query::SERIAL_NUMBER)
    }

    /// Device name plus MAC fragment, e.g. `PeriPage+DF7A`.
    pub fn query_name(&mut self) -> Result<String, PapelitoError> {
        self.query_string(commands::query::NAME)
    }

    /// Hardware info string, e.g. `BR2141e-s(A02)_B9_20190815_r3460`.
    pub fn query_hardware(&mut self) -> Result<String, PapelitoError> {
        self.query_string(commands::query::HARDWARE)
    }

    /// Undocumented identity string, e.g. `IP-300`.
    pub fn query_ident(&mut self) -> Result<String, PapelitoError> {
        self.query_string(commands::query::IDENT)
    }

    /// Raw MAC query reply (6 address bytes repeated twice with
    /// separators); kept raw because the framing varies across firmware.
    pub fn query_mac(&mut self) -> Result<Vec<u8>, PapelitoError> {
        self.session
            .send_recv(commands::query::MAC, DEFAULT_RECV_SIZE)
    }

    /// Full device info via the `|`-separated full-info query.
    ///
    /// WARNING: on some firmware this query corrupts an in-progress print;
    /// never issue it between image chunks.
    pub fn query_info(&mut self) -> Result<DeviceInfo, PapelitoError> {
        let raw = self.query_string(commands::query::FULL_INFO)?;
        parse_device_info(&raw)
    }

    fn query_string(&mut self, request: &[u8]) -> Result<String, PapelitoError> {
        let reply = self.session.send_recv(request, DEFAULT_RECV_SIZE)?;
        Ok(String::from_utf8_lossy(&reply)
            .trim_end_matches('\0')
            .to_string())
    }
}

/// Parse the full-info reply:
/// `name|device_mac|client_mac|firmware|serial|battery`.
fn parse_device_info(raw: &str) -> Result<DeviceInfo, PapelitoError> {
    let parts: Vec<&str> = raw.split('|').collect();
    if parts.len() != 6 {
        return Err(PapelitoError::Transport(format!(
            "Malformed device info reply: {:?}",
            raw
        )));
    }
    let battery = parts[5].trim().parse::<u8>().map_err(|_| {
        PapelitoError::Transport(format!("Bad battery field in device info: {:?}", parts[5]))
    })?;
    Ok(DeviceInfo {
        name: parts[0].to_string(),
        device_mac: parts[1].to_string(),
        client_mac: parts[2].to_string(),
        firmware: parts[3].to_string(),
        serial_number: parts[4].to_string(),
        battery,
    })
}

// ============================================================================
// TESTS
// ============================================================================
