//! # Raster Image Chunking
//!
//! The transfer header's row count is a 16-bit field, but pushing anywhere
//! near 0xFFFF rows in one transfer makes the device buffer dozens of
//! kilobytes it cannot reliably hold; captured traffic from the vendor app
//! never exceeds 255 rows per transfer, and larger transfers have been seen
//! to drop rows mid-print. So images are sliced into chunks of at most
//! [`MAX_CHUNK_ROWS`] rows, each sent as its own `reset` + header + payload
//! sequence.
//!
//! Rows are one bit per pixel, row-major; each row is normalized to the
//! model's `row_bytes` by [`commands::normalize_row`] (zero-pad right,
//! truncate). The caller rasterizes images; this module never looks at
//! image formats.
//!
//! This module is pure: [`chunks`] produces [`Chunk`] descriptors and
//! [`Chunk::encode`] produces bytes. Pacing (the per-row write delay that
//! keeps the device's internal write rate happy) lives in
//! [`crate::printer::Printer`].

use crate::error::PapelitoError;
use crate::printer::model::{HeightOrder, ModelSpec};

use super::commands;

/// Maximum rows per transfer chunk.
///
/// A deliberate fraction of the protocol's nominal 16-bit limit; see the
/// module docs.
pub const MAX_CHUNK_ROWS: usize = 0xFF;

/// Default delay between row writes, in milliseconds.
pub const DEFAULT_ROW_DELAY_MS: u64 = 10;

/// One bounded group of rows sent under a single transfer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Rows of this chunk, not yet normalized.
    pub rows: &'a [Vec<u8>],
}

impl Chunk<'_> {
    /// Number of rows in this chunk (1..=[`MAX_CHUNK_ROWS`]).
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Encode this chunk as the wire sequence: `reset`, transfer header,
    /// then each row normalized to `spec.row_bytes`.
    ///
    /// The writes are returned separately, oldest first, because the
    /// transport layer paces row writes individually.
    pub fn encode(
        &self,
        spec: &ModelSpec,
        order: HeightOrder,
    ) -> Result<Vec<Vec<u8>>, PapelitoError> {
        let mut writes = Vec::with_capacity(self.rows.len() + 2);
        writes.push(commands::reset());
        writes.push(commands::row_transfer_header(spec, self.rows.len(), order)?);
        for row in self.rows {
            writes.push(commands::normalize_row(row, spec.row_bytes));
        }
        Ok(writes)
    }
}

/// Slice `rows` into transfer chunks of at most [`MAX_CHUNK_ROWS`] rows.
///
/// The last chunk holds `rows.len() % 255` rows (or a full 255 when the
/// total divides evenly). Zero rows produce zero chunks, and therefore no
/// device commands at all.
///
/// ## Example
///
/// ```
/// use papelito::protocol::image;
///
/// let rows = vec![vec![0u8; 48]; 600];
/// let chunks: Vec<_> = image::chunks(&rows).collect();
/// assert_eq!(chunks.len(), 3); // ceil(600 / 255)
/// assert_eq!(chunks[2].height(), 600 - 2 * 255);
/// ```
pub fn chunks(rows: &[Vec<u8>]) -> impl Iterator<Item = Chunk<'_>> {
    rows.chunks(MAX_CHUNK_ROWS).map(|rows| Chunk { rows })
}

/// Slice a flat, concatenated image buffer into rows of `row_bytes`.
///
/// A trailing partial row is kept; normalization pads it later. Useful for
/// callers that rasterize into one contiguous buffer.
pub fn rows_from_flat(buf: &[u8], row_bytes: usize) -> Vec<Vec<u8>> {
    if row_bytes == 0 {
        return Vec::new();
    }
    buf.chunks(row_bytes).map(<[u8]>::to_vec).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::model::Model;
    use pretty_assertions::assert_eq;

    fn make_rows(n: usize) -> Vec<Vec<u8>> {
        vec![vec![0x11u8; 48]; n]
    }

    #[test]
    fn test_chunk_count_is_ceil_div() {
        for (n, expected) in [(1, 1), (254, 1), (255, 1), (256, 2), (510, 2), (511, 3)] {
            let rows = make_rows(n);
            assert_eq!(chunks(&rows).count(), expected, "n = {}", n);
        }
    }

    #[test]
    fn test_chunk_heights_sum_to_total() {
        for n in [1usize, 100, 255, 256, 600, 1020] {
            let rows = make_rows(n);
            let total: usize = chunks(&rows).map(|c| c.height()).sum();
            assert_eq!(total, n);
        }
    }

    #[test]
    fn test_last_chunk_height() {
        let rows = make_rows(600);
        let last = chunks(&rows).last().unwrap();
        assert_eq!(last.height(), 600 % 255);

        let rows = make_rows(510);
        let last = chunks(&rows).last().unwrap();
        // Evenly divisible: last chunk is full
        assert_eq!(last.height(), 255);
    }

    #[test]
    fn test_zero_rows_no_chunks() {
        let rows: Vec<Vec<u8>> = Vec::new();
        assert_eq!(chunks(&rows).count(), 0);
    }

    #[test]
    fn test_encode_layout() {
        let spec = Model::A6.spec();
        let rows = vec![vec![0xAB; 10], vec![0xCD; 60]];
        let chunk = chunks(&rows).next().unwrap();
        let writes = chunk.encode(&spec, HeightOrder::LowHigh).unwrap();

        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0], commands::reset());
        assert_eq!(
            writes[1],
            vec![0x1D, 0x76, 0x30, 0x00, 0x30, 0x00, 0x02, 0x00]
        );
        // Short row padded, long row truncated
        assert_eq!(writes[2].len(), spec.row_bytes);
        assert_eq!(&writes[2][..10], &[0xAB; 10]);
        assert!(writes[2][10..].iter().all(|&b| b == 0));
        assert_eq!(writes[3], vec![0xCD; 48]);
    }

    #[test]
    fn test_rows_from_flat() {
        let buf: Vec<u8> = (0..100).collect();
        let rows = rows_from_flat(&buf, 48);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 48);
        assert_eq!(rows[2].len(), 4); // trailing partial row kept
    }

    #[test]
    fn test_rows_from_flat_empty() {
        assert!(rows_from_flat(&[], 48).is_empty());
        assert!(rows_from_flat(&[1, 2, 3], 0).is_empty());
    }
}
