//! # Printer Model Registry
//!
//! This module defines hardware specifications for supported Peripage
//! printers. Every model prints the same protocol; only the row geometry
//! differs.
//!
//! ## Supported Printers
//!
//! | Model | Row bytes | Row width (px) | Row characters |
//! |-------|-----------|----------------|----------------|
//! | A6    | 48        | 384            | 32             |
//! | A6+   | 72        | 576            | 48             |
//! | A40   | 216       | 1728           | 144            |
//! | A40+  | 231       | 1848           | 154            |
//!
//! ## Usage
//!
//! ```
//! use papelito::printer::Model;
//!
//! let model = Model::A6p;
//! println!("Print width: {} px ({} bytes)",
//!          model.spec().row_width,
//!          model.spec().row_bytes);
//! ```

use crate::error::PapelitoError;

/// # Model Specification
///
/// Immutable per-model geometry used by the encoder and the wrap buffer.
///
/// ## Fields
///
/// - **row_bytes**: bytes per image row (1 bit per pixel, 8 pixels/byte).
///   Row payloads are padded/truncated to exactly this length.
/// - **row_width**: printable width in pixels (`row_bytes * 8`)
/// - **row_characters**: characters per line in the device's raw ASCII mode;
///   the wrap buffer folds longer lines at this width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Bytes per image row
    pub row_bytes: usize,

    /// Printable width in pixels
    pub row_width: usize,

    /// Characters per line in ASCII mode
    pub row_characters: usize,
}

/// # Byte Order of the Row-Transfer Height Field
///
/// The 16-bit row count in the transfer header (`1d 76 30 00 ...`) has been
/// observed in two layouts across firmware generations:
///
/// - [`HeightOrder::LowHigh`]: low byte first (`yL yH`), the canonical form
///   seen on current A6/A6+ firmware
/// - [`HeightOrder::HighLow`]: high byte first, a historical variant
///
/// There is no way to query the device for which layout it expects, so this
/// is a quirk the caller configures after verifying against real hardware.
/// Every registered model defaults to [`HeightOrder::LowHigh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightOrder {
    /// Low byte first (canonical)
    #[default]
    LowHigh,
    /// High byte first (historical variant)
    HighLow,
}

impl HeightOrder {
    /// Encode a row count (capped at 0xffff) in this byte order.
    #[inline]
    pub fn encode(self, rows: usize) -> [u8; 2] {
        let rows = rows.min(0xffff) as u16;
        match self {
            HeightOrder::LowHigh => [rows as u8, (rows >> 8) as u8],
            HeightOrder::HighLow => [(rows >> 8) as u8, rows as u8],
        }
    }
}

/// # Printer Model
///
/// Names for the supported Peripage models. Use [`Model::spec`] to get the
/// row geometry and [`Model::from_name`] to parse a user-supplied name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// Peripage A6 (58mm paper, 384 px)
    A6,
    /// Peripage A6+ (58mm paper, 576 px)
    A6p,
    /// Peripage A40 (A4 paper, 1728 px)
    A40,
    /// Peripage A40+ (A4 paper, 1848 px)
    A40p,
}

impl Model {
    /// All registered models, in registry order.
    pub const ALL: [Model; 4] = [Model::A6, Model::A6p, Model::A40, Model::A40p];

    /// Row geometry for this model.
    pub const fn spec(self) -> ModelSpec {
        match self {
            Model::A6 => ModelSpec {
                row_bytes: 48,
                row_width: 384,
                row_characters: 32,
            },
            Model::A6p => ModelSpec {
                row_bytes: 72,
                row_width: 576,
                row_characters: 48,
            },
            Model::A40 => ModelSpec {
                row_bytes: 216,
                row_width: 1728,
                row_characters: 144,
            },
            Model::A40p => ModelSpec {
                row_bytes: 231,
                row_width: 1848,
                row_characters: 154,
            },
        }
    }

    /// Canonical display name.
    pub const fn name(self) -> &'static str {
        match self {
            Model::A6 => "A6",
            Model::A6p => "A6+",
            Model::A40 => "A40",
            Model::A40p => "A40+",
        }
    }

    /// Parse a model from a user-supplied name.
    ///
    /// Case-insensitive; the `+` suffix may also be written `p`
    /// (`"A6+"` == `"a6p"`).
    ///
    /// ## Errors
    ///
    /// Returns [`PapelitoError::Protocol`] for unknown names: an invalid
    /// model is a configuration mistake, not a device condition.
    pub fn from_name(name: &str) -> Result<Self, PapelitoError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a6" => Ok(Model::A6),
            "a6+" | "a6p" => Ok(Model::A6p),
            "a40" => Ok(Model::A40),
            "a40+" | "a40p" => Ok(Model::A40p),
            other => Err(PapelitoError::Protocol(format!(
                "Unknown printer model: {:?} (expected one of A6, A6+, A40, A40+)",
                other
            ))),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_are_byte_aligned() {
        for model in Model::ALL {
            let spec = model.spec();
            assert_eq!(
                spec.row_bytes * 8,
                spec.row_width,
                "{} row_width must equal row_bytes * 8",
                model.name()
            );
        }
    }

    #[test]
    fn test_a6p_spec() {
        let spec = Model::A6p.spec();
        assert_eq!(spec.row_bytes, 72);
        assert_eq!(spec.row_width, 576);
        assert_eq!(spec.row_characters, 48);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Model::from_name("A6").unwrap(), Model::A6);
        assert_eq!(Model::from_name("a6+").unwrap(), Model::A6p);
        assert_eq!(Model::from_name("A6p").unwrap(), Model::A6p);
        assert_eq!(Model::from_name(" a40 ").unwrap(), Model::A40);
        assert_eq!(Model::from_name("A40P").unwrap(), Model::A40p);
    }

    #[test]
    fn test_from_name_unknown() {
        assert!(Model::from_name("A8").is_err());
        assert!(Model::from_name("").is_err());
    }

    #[test]
    fn test_height_order_low_high() {
        assert_eq!(HeightOrder::LowHigh.encode(1), [0x01, 0x00]);
        assert_eq!(HeightOrder::LowHigh.encode(255), [0xFF, 0x00]);
        assert_eq!(HeightOrder::LowHigh.encode(0x1234), [0x34, 0x12]);
    }

    #[test]
    fn test_height_order_high_low() {
        assert_eq!(HeightOrder::HighLow.encode(1), [0x00, 0x01]);
        assert_eq!(HeightOrder::HighLow.encode(0x1234), [0x12, 0x34]);
    }

    #[test]
    fn test_height_order_caps_at_u16() {
        assert_eq!(HeightOrder::LowHigh.encode(0x2_0000), [0xFF, 0xFF]);
    }

    #[test]
    fn test_default_height_order_is_canonical() {
        assert_eq!(HeightOrder::default(), HeightOrder::LowHigh);
    }
}
