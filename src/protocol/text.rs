//! # ASCII Line Wrapping
//!
//! The device has a raw ASCII mode: printable bytes accumulate in an
//! in-printer line buffer that is printed when an `LF` arrives. Two things
//! make this mode dangerous to drive directly:
//!
//! - Two consecutive `LF` bytes freeze the device. Blank lines must be
//!   turned into feed commands ([`TextOp::Break`]) instead.
//! - The in-printer buffer is invisible. If this side emits a short line
//!   without its terminating `LF`, the device's buffer and ours disagree and
//!   every later line prints shifted.
//!
//! [`LineBuffer`] solves both: it mirrors the in-printer buffer in
//! [`LineBuffer::pending`], folds input at the model's character width, and
//! only ever emits complete `LF`-terminated lines. A trailing partial line
//! stays in `pending` until a later [`LineBuffer::feed`] completes it or
//! [`LineBuffer::flush`] forces it out.
//!
//! This module performs no I/O: `feed`/`flush` return [`TextOp`] lists that
//! [`crate::printer::Printer`] plays against the transport, one write per
//! op, with a pacing delay between them.

use super::commands::{self, TEXT_BREAK_SIZE};

/// One device write produced by the wrap buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOp {
    /// Write the line's ASCII bytes followed by a single terminating `LF`.
    /// The line itself never contains `LF` and never exceeds the row width.
    Write(String),

    /// Emit a paper feed (`ESC J`) of the given size in place of a blank
    /// line. Encoded via [`commands::print_break`].
    Break(i32),
}

/// # Text-Wrap Buffer
///
/// Stateful line folding for raw ASCII printing. One buffer belongs to one
/// device session; `pending` must track the in-printer buffer exactly, so
/// all text for a session has to flow through the same `LineBuffer`.
///
/// ## Example
///
/// ```
/// use papelito::protocol::text::{LineBuffer, TextOp};
///
/// let mut buf = LineBuffer::new(32);
/// // Shorter than a row: nothing emitted, text waits in the buffer
/// assert!(buf.feed("hello ").is_empty());
/// // The newline completes the line
/// assert_eq!(
///     buf.feed("world\n"),
///     vec![TextOp::Write("hello world".into())]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct LineBuffer {
    /// Characters per row on the target model.
    row_characters: usize,

    /// Partial line not yet sent; always shorter than `row_characters`.
    pending: String,
}

impl LineBuffer {
    /// Create a buffer wrapping at `row_characters` columns.
    pub fn new(row_characters: usize) -> Self {
        Self {
            row_characters,
            pending: String::new(),
        }
    }

    /// The partial line currently held back.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Feed arbitrary text through the ASCII filter and the wrapper.
    ///
    /// Complete rows come back as [`TextOp::Write`]; blank lines become
    /// [`TextOp::Break`]; a trailing partial row is retained as `pending`
    /// and emits nothing yet.
    pub fn feed(&mut self, text: &str) -> Vec<TextOp> {
        let text = commands::filter_ascii(text);

        // Pick up where the last call left off
        let text = format!("{}{}", self.pending, text);
        self.pending.clear();

        if text.is_empty() {
            return Vec::new();
        }

        // Whitespace-only input: every LF becomes a break, nothing may reach
        // the ASCII buffer (raw LF runs freeze the device)
        if text.trim().is_empty() {
            return text
                .chars()
                .filter(|&c| c == '\n')
                .map(|_| TextOp::Break(TEXT_BREAK_SIZE))
                .collect();
        }

        let mut ops = Vec::new();
        for line in text.split('\n') {
            if line.trim().is_empty() {
                // Blank line: complete a pending row if there is one,
                // otherwise feed paper
                if self.pending.is_empty() {
                    ops.push(TextOp::Break(TEXT_BREAK_SIZE));
                } else {
                    ops.push(TextOp::Write(std::mem::take(&mut self.pending)));
                }
            } else {
                // The LF that split us off from the previous line completes
                // whatever that line left pending
                if !self.pending.is_empty() {
                    ops.push(TextOp::Write(std::mem::take(&mut self.pending)));
                }

                let chars: Vec<char> = line.chars().collect();
                for piece in chars.chunks(self.row_characters) {
                    if piece.len() == self.row_characters {
                        ops.push(TextOp::Write(piece.iter().collect()));
                    } else {
                        // Short trailing piece: hold it back until completed
                        self.pending = piece.iter().collect();
                    }
                }
            }
        }
        ops
    }

    /// Feed `text` plus a terminating newline (`println` semantics).
    pub fn feed_line(&mut self, text: &str) -> Vec<TextOp> {
        self.feed(&format!("{}\n", text))
    }

    /// Force out the pending partial line, if any.
    ///
    /// Emits nothing when the buffer is empty; in particular a second
    /// consecutive `flush` is a no-op.
    pub fn flush(&mut self) -> Vec<TextOp> {
        if self.pending.is_empty() {
            Vec::new()
        } else {
            vec![TextOp::Write(std::mem::take(&mut self.pending))]
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(s: &str) -> TextOp {
        TextOp::Write(s.to_string())
    }

    #[test]
    fn test_short_text_becomes_pending() {
        let mut buf = LineBuffer::new(32);
        assert_eq!(buf.feed("hello"), Vec::<TextOp>::new());
        assert_eq!(buf.pending(), "hello");
    }

    #[test]
    fn test_exact_row_emits_one_write() {
        let mut buf = LineBuffer::new(8);
        let ops = buf.feed("abcdefgh");
        assert_eq!(ops, vec![write("abcdefgh")]);
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_long_line_wraps() {
        let mut buf = LineBuffer::new(4);
        let ops = buf.feed("abcdefghij");
        assert_eq!(ops, vec![write("abcd"), write("efgh")]);
        assert_eq!(buf.pending(), "ij");
    }

    #[test]
    fn test_newline_completes_pending() {
        let mut buf = LineBuffer::new(32);
        buf.feed("abc");
        let ops = buf.feed("\ndef");
        assert_eq!(ops, vec![write("abc")]);
        assert_eq!(buf.pending(), "def");
    }

    #[test]
    fn test_pending_prepended_to_next_feed() {
        let mut buf = LineBuffer::new(8);
        buf.feed("abcd");
        let ops = buf.feed("efgh");
        // 4 + 4 characters complete one row
        assert_eq!(ops, vec![write("abcdefgh")]);
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_empty_feed_is_noop() {
        let mut buf = LineBuffer::new(32);
        assert_eq!(buf.feed(""), Vec::<TextOp>::new());
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_filtered_to_empty_is_noop() {
        let mut buf = LineBuffer::new(32);
        assert_eq!(buf.feed("\t\r\x00é"), Vec::<TextOp>::new());
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_newlines_only_become_breaks() {
        let mut buf = LineBuffer::new(32);
        let ops = buf.feed("\n\n\n");
        assert_eq!(
            ops,
            vec![TextOp::Break(30), TextOp::Break(30), TextOp::Break(30)]
        );
    }

    #[test]
    fn test_no_consecutive_raw_newlines() {
        // A blank line inside text must never produce two raw LF writes
        let mut buf = LineBuffer::new(32);
        let ops = buf.feed("abc\n\n\ndef\n");
        assert_eq!(
            ops,
            vec![
                write("abc"),
                TextOp::Break(30),
                write("def"),
            ]
        );
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_whitespace_line_acts_as_blank() {
        let mut buf = LineBuffer::new(32);
        // The whitespace line completes the pending "a" row, exactly as an
        // empty line would
        let ops = buf.feed("a\n   \nb");
        assert_eq!(ops, vec![write("a")]);
        assert_eq!(buf.pending(), "b");
    }

    #[test]
    fn test_trailing_newline_flushes_line() {
        let mut buf = LineBuffer::new(32);
        let ops = buf.feed("hello\n");
        assert_eq!(ops, vec![write("hello")]);
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_feed_line() {
        let mut buf = LineBuffer::new(32);
        let ops = buf.feed_line("hello");
        assert_eq!(ops, vec![write("hello")]);
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_flush() {
        let mut buf = LineBuffer::new(32);
        buf.feed("partial");
        assert_eq!(buf.flush(), vec![write("partial")]);
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_flush_twice_is_idempotent() {
        let mut buf = LineBuffer::new(32);
        buf.feed("partial");
        buf.flush();
        assert_eq!(buf.flush(), Vec::<TextOp>::new());
    }

    #[test]
    fn test_pending_always_shorter_than_row() {
        let mut buf = LineBuffer::new(4);
        for chunk in ["ab", "cd", "ef", "g\nhi", "jklmnop"] {
            buf.feed(chunk);
            assert!(buf.pending().len() < 4, "pending {:?}", buf.pending());
        }
    }

    #[test]
    fn test_filter_applied_before_wrapping() {
        let mut buf = LineBuffer::new(4);
        // é is dropped, so only "abcd" remains: exactly one row
        let ops = buf.feed("abécd");
        assert_eq!(ops, vec![write("abcd")]);
        assert_eq!(buf.pending(), "");
    }
}
