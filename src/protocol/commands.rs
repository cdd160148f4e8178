//! # Peripage Protocol Commands
//!
//! This module implements the proprietary binary command protocol used by
//! Peripage pocket thermal printers (A6, A6+, A40, A40+).
//!
//! ## Protocol Overview
//!
//! The protocol is a mix of two families:
//!
//! - **Control commands**: `DLE 0xFF`-prefixed sequences for device control
//!   and queries (reset, concentration, power timeout, info queries)
//! - **Print commands**: ESC/POS-like sequences for paper feed (`ESC J`) and
//!   raster transfer (`GS v 0`), plus raw ASCII written straight into the
//!   device's internal line buffer
//!
//! All builders here are pure: they validate/clamp their arguments and
//! return the exact byte sequence. No I/O happens in this module.
//!
//! ## Byte Order
//!
//! Multi-byte integers are **big-endian** unless noted. The one exception is
//! the 16-bit row count of the raster transfer header, which differs between
//! firmware generations — see [`HeightOrder`].
//!
//! ## Hazards
//!
//! Two behaviors of the hardware shape this module and its callers:
//!
//! - The device neither prints nor responds until [`reset`] has been sent
//!   after (re)connecting, and raster transfers require a fresh [`reset`]
//!   before each chunk.
//! - Two consecutive `LF` bytes written as raw ASCII freeze the device.
//!   The text layer ([`crate::protocol::text`]) converts blank lines into
//!   [`print_break`] commands instead; never hand-feed raw `\n\n`.
//!
//! ## Reference
//!
//! Derived from USB/Bluetooth captures of Peripage A6 and A6+ units; there
//! is no public command specification.

use crate::error::PapelitoError;
use crate::printer::model::{HeightOrder, ModelSpec};

// ============================================================================
// CONTROL BYTE CONSTANTS
// ============================================================================

/// DLE (Data Link Escape) - control command prefix byte
///
/// Every Peripage control sequence starts `DLE 0xFF`.
pub const DLE: u8 = 0x10;

/// ESC (Escape) - ESC/POS-style command prefix (paper feed)
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - raster graphics command prefix
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - prints the device's ASCII line buffer and advances paper
pub const LF: u8 = 0x0A;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// # Reset Printer
///
/// Returns the 17-byte reset sequence. Must be sent once after every
/// (re)connect and again before each raster transfer chunk; until the first
/// reset of a session the device neither prints nor answers queries.
///
/// ## Protocol Details
///
/// | Format | Bytes |
/// |--------|-------|
/// | Hex    | 10 FF FE 01 + 13 × 00 |
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
///
/// let reset = commands::reset();
/// assert_eq!(reset.len(), 17);
/// assert_eq!(&reset[..4], &[0x10, 0xFF, 0xFE, 0x01]);
/// ```
#[inline]
pub fn reset() -> Vec<u8> {
    let mut req = vec![0u8; 17];
    req[..4].copy_from_slice(&[DLE, 0xFF, 0xFE, 0x01]);
    req
}

// ============================================================================
// PAPER FEED
// ============================================================================

/// # Print Break (ESC J n)
///
/// Feeds out `size` units of blank paper. This is also the safe substitute
/// for blank lines: the device freezes on repeated raw `LF` bytes, a feed
/// command does not touch the ASCII line buffer.
///
/// ## Protocol Details
///
/// | Format | Bytes     |
/// |--------|-----------|
/// | Hex    | 1B 4A n   |
///
/// ## Parameters
///
/// - `size`: feed amount, clamped to `[1, 255]`
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
///
/// assert_eq!(commands::print_break(64), vec![0x1B, 0x4A, 64]);
/// assert_eq!(commands::print_break(300), vec![0x1B, 0x4A, 0xFF]);
/// assert_eq!(commands::print_break(0), vec![0x1B, 0x4A, 0x01]);
/// ```
#[inline]
pub fn print_break(size: i32) -> Vec<u8> {
    let size = size.clamp(0x01, 0xFF) as u8;
    vec![ESC, b'J', size]
}

/// Break size used in place of a blank line by the text layer.
pub const TEXT_BREAK_SIZE: i32 = 30;

// ============================================================================
// DEVICE SETTINGS
// ============================================================================

/// # Set Concentration (10 FF 10 00 n)
///
/// Selects the thermal concentration (darkness) level. Darker prints last
/// longer on the paper at the cost of head temperature.
///
/// ## Protocol Details
///
/// | Level | Bytes            |
/// |-------|------------------|
/// | 0     | 10 FF 10 00 00   |
/// | 1     | 10 FF 10 00 01   |
/// | 2     | 10 FF 10 00 02   |
///
/// ## Parameters
///
/// - `level`: snapped to `{0, 1, 2}` (values below 0 become 0, above 2
///   become 2)
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
///
/// assert_eq!(commands::concentration(-5), commands::concentration(0));
/// assert_eq!(commands::concentration(1), vec![0x10, 0xFF, 0x10, 0x00, 0x01]);
/// ```
#[inline]
pub fn concentration(level: i32) -> Vec<u8> {
    vec![DLE, 0xFF, 0x10, 0x00, level.clamp(0, 2) as u8]
}

/// # Set Power Timeout (10 FF 12 n n)
///
/// Sets the auto-poweroff timeout in minutes. Any request/response exchange
/// (including the battery query the print service uses as keep-alive)
/// restarts the countdown.
///
/// ## Protocol Details
///
/// | Format | Bytes               |
/// |--------|---------------------|
/// | Hex    | 10 FF 12 + u16 (BE) |
///
/// ## Parameters
///
/// - `minutes`: clamped to `[1, 0xFFF0]`
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
///
/// assert_eq!(commands::power_timeout(5), vec![0x10, 0xFF, 0x12, 0x00, 0x05]);
/// assert_eq!(commands::power_timeout(0), vec![0x10, 0xFF, 0x12, 0x00, 0x01]);
/// ```
#[inline]
pub fn power_timeout(minutes: i32) -> Vec<u8> {
    let minutes = minutes.clamp(0x0001, 0xFFF0) as u16;
    let mut req = vec![DLE, 0xFF, 0x12];
    req.extend_from_slice(&minutes.to_be_bytes());
    req
}

/// # Set Serial Number (10 FF 20 F4 + ASCII + 00)
///
/// Writes a new serial number into the device. The text is passed through
/// [`filter_ascii`] and NUL-terminated.
///
/// ## Protocol Details
///
/// | Format | Bytes                        |
/// |--------|------------------------------|
/// | Hex    | 10 FF 20 F4 + ascii_str + 00 |
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
///
/// let req = commands::set_serial_number("A6491571121");
/// assert_eq!(&req[..4], &[0x10, 0xFF, 0x20, 0xF4]);
/// assert_eq!(req.last(), Some(&0x00));
/// ```
pub fn set_serial_number(serial: &str) -> Vec<u8> {
    let mut req = vec![DLE, 0xFF, 0x20, 0xF4];
    req.extend_from_slice(filter_ascii(serial).as_bytes());
    req.push(0x00);
    req
}

// ============================================================================
// DEVICE QUERIES
// ============================================================================

/// Query request codes. Each is sent as-is; the response is a raw ASCII or
/// byte payload interpreted per query by [`crate::printer::Printer`].
pub mod query {
    /// Firmware version, e.g. `V2.11_304dpi`
    pub const FIRMWARE: &[u8] = &[0x10, 0xFF, 0x20, 0xF1];

    /// Serial number, e.g. `A6491571121`
    pub const SERIAL_NUMBER: &[u8] = &[0x10, 0xFF, 0x20, 0xF2];

    /// Undocumented identity string, e.g. `IP-300`
    pub const IDENT: &[u8] = &[0x10, 0xFF, 0x20, 0xF0];

    /// Device name plus MAC fragment, e.g. `PeriPage+DF7A`
    pub const NAME: &[u8] = &[0x10, 0xFF, 0x30, 0x11];

    /// Hardware info, e.g. `BR2141e-s(A02)_B9_20190815_r3460`
    pub const HARDWARE: &[u8] = &[0x10, 0xFF, 0x30, 0x10];

    /// Device MAC address, 6 bytes repeated twice with separators
    pub const MAC: &[u8] = &[0x10, 0xFF, 0x30, 0x12];

    /// Battery level; reply is two bytes `{ 0, percentage }`
    pub const BATTERY: &[u8] = &[0x10, 0xFF, 0x50, 0xF1];

    /// Full info, `|`-separated:
    /// `name|device_mac|client_mac|firmware|serial|battery`.
    ///
    /// WARNING: on some firmware this query corrupts an in-progress print by
    /// shifting the image and pushing a stray character into the in-printer
    /// ASCII buffer. The print service never uses it as keep-alive.
    pub const FULL_INFO: &[u8] = &[0x10, 0xFF, 0x70, 0xF1, 0x00];
}

// ============================================================================
// RASTER TRANSFER
// ============================================================================

/// # Row Transfer Header (GS v 0)
///
/// Builds the preamble announcing `rows` image rows of
/// `spec.row_bytes` bytes each. After this header the device expects exactly
/// `rows * row_bytes` payload bytes.
///
/// ## Protocol Details
///
/// | Format | Bytes                                             |
/// |--------|---------------------------------------------------|
/// | Hex    | 1D 76 30 00 + row_bytes + 00 + u16 row count      |
///
/// The row-count byte order is a per-model firmware quirk; see
/// [`HeightOrder`]. The count is capped at 0xFFFF, though callers should
/// keep chunks at 255 rows or fewer (see [`crate::protocol::image`]).
///
/// ## Errors
///
/// Returns [`PapelitoError::Protocol`] if `spec.row_bytes` does not fit the
/// one-byte width field. No registered model comes close to the limit, so
/// hitting this means a hand-built [`ModelSpec`] is wrong.
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
/// use papelito::printer::{HeightOrder, Model};
///
/// let header =
///     commands::row_transfer_header(&Model::A6p.spec(), 1, HeightOrder::LowHigh).unwrap();
/// assert_eq!(header, vec![0x1D, 0x76, 0x30, 0x00, 0x48, 0x00, 0x01, 0x00]);
/// ```
pub fn row_transfer_header(
    spec: &ModelSpec,
    rows: usize,
    order: HeightOrder,
) -> Result<Vec<u8>, PapelitoError> {
    if spec.row_bytes == 0 || spec.row_bytes > 0xFF {
        return Err(PapelitoError::Protocol(format!(
            "row_bytes {} does not fit the one-byte width field",
            spec.row_bytes
        )));
    }

    let mut req = vec![GS, b'v', b'0', 0x00, spec.row_bytes as u8, 0x00];
    req.extend_from_slice(&order.encode(rows));
    Ok(req)
}

/// # Normalize a Row Payload
///
/// Pads a short row with zero bytes on the right, truncates a long one;
/// the result is always exactly `row_bytes` long. Never rejects.
///
/// A row shorter than the head width would shift every following row
/// horizontally, so normalization is unconditional.
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
///
/// assert_eq!(commands::normalize_row(&[0xFF], 3), vec![0xFF, 0x00, 0x00]);
/// assert_eq!(commands::normalize_row(&[1, 2, 3, 4], 3), vec![1, 2, 3]);
/// ```
pub fn normalize_row(row: &[u8], row_bytes: usize) -> Vec<u8> {
    let mut out = row[..row.len().min(row_bytes)].to_vec();
    out.resize(row_bytes, 0x00);
    out
}

// ============================================================================
// ASCII FILTERING
// ============================================================================

/// Keep only bytes the device's raw ASCII mode can render: `(31, 127)`
/// exclusive, plus LF. Everything else is dropped silently.
///
/// ## Example
///
/// ```
/// use papelito::protocol::commands;
///
/// assert_eq!(commands::filter_ascii("héllo\tworld\n"), "hlloworld\n");
/// ```
pub fn filter_ascii(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            let code = c as u32;
            (31 < code && code < 127) || code == u32::from(LF)
        })
        .collect()
}

/// Check that `text` contains only bytes [`filter_ascii`] would keep.
pub fn is_safe_ascii(text: &str) -> bool {
    text.chars().all(|c| {
        let code = c as u32;
        (31 < code && code < 127) || code == u32::from(LF)
    })
}

// ============================================================================
// TESTS
// ============================================================================
