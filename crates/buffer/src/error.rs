// Chunk: docs/chunks/span_table - Span storage with implicit interval tree

//! Error type shared by character access, span attachment and mutation.
//!
//! Every variant is raised before any buffer or span-table state is touched,
//! so a failed call always leaves the previous state intact.

use thiserror::Error;

/// Which end of a span failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Start => f.write_str("start"),
            Endpoint::End => f.write_str("end"),
        }
    }
}

/// Errors raised by [`SpannableBuffer`](crate::SpannableBuffer),
/// [`SpannedText`](crate::SpannedText) and [`GapBuffer`](crate::GapBuffer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A range with `start > end`.
    #[error("{op} ({start} ... {end}) has end before start")]
    RangeReversed {
        op: &'static str,
        start: usize,
        end: usize,
    },

    /// A range reaching past the end of the text.
    #[error("{op} ({start} ... {end}) ends beyond length {len}")]
    RangeOutOfBounds {
        op: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },

    /// A single-character access outside `[0, len)`.
    #[error("char_at: index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A PARAGRAPH endpoint that is not at 0, the text end, or after `'\n'`.
    #[error("PARAGRAPH span must {endpoint} at paragraph boundary (offset {offset})")]
    InvalidSpanRange { endpoint: Endpoint, offset: usize },
}

impl Error {
    /// Returns true for the range-error family (reversed, out of bounds,
    /// index out of range).
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            Error::RangeReversed { .. }
                | Error::RangeOutOfBounds { .. }
                | Error::IndexOutOfRange { .. }
        )
    }
}

/// Validates `start..end` against a text of length `len`.
pub(crate) fn check_range(
    op: &'static str,
    start: usize,
    end: usize,
    len: usize,
) -> Result<(), Error> {
    if end < start {
        return Err(Error::RangeReversed { op, start, end });
    }
    if start > len || end > len {
        return Err(Error::RangeOutOfBounds { op, start, end, len });
    }
    Ok(())
}
