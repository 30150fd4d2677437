// Chunk: docs/chunks/mutation_engine - Replace protocol and span adjustment

//! Selection endpoints stored as spans.
//!
//! Each buffer owns two zero-length POINT_POINT marker spans. Being spans,
//! they move with edits like everything else; `replace` additionally keeps
//! them at the same relative position when the text around them is
//! rewritten.

use crate::error::Error;
use crate::span::{Span, SpanFlags, SpanRef};
use crate::span_table::AttachMode;
use crate::SpannableBuffer;

/// Marker span for the selection anchor.
#[derive(Debug)]
pub struct SelectionStart;

impl Span for SelectionStart {
    fn is_no_copy(&self) -> bool {
        true
    }
}

/// Marker span for the selection cursor.
#[derive(Debug)]
pub struct SelectionEnd;

impl Span for SelectionEnd {
    fn is_no_copy(&self) -> bool {
        true
    }
}

/// The per-buffer selection marker identities.
#[derive(Debug, Clone)]
pub(crate) struct SelectionMarkers {
    pub(crate) start: SpanRef,
    pub(crate) end: SpanRef,
}

impl SelectionMarkers {
    pub(crate) fn new() -> Self {
        Self {
            start: SpanRef::new(SelectionStart),
            end: SpanRef::new(SelectionEnd),
        }
    }
}

/// Maps an offset strictly inside `[start, start + old_len)` to the same
/// relative position in a replacement of `new_len` chars.
fn rescaled(offset: usize, start: usize, old_len: usize, new_len: usize) -> usize {
    start + (offset - start) * new_len / old_len
}

impl SpannableBuffer {
    /// Sets the selection. `start` may come after `end`.
    pub fn set_selection(&mut self, start: usize, end: usize) -> Result<(), Error> {
        let markers = self.selection.clone();
        self.set_span(markers.start, start, start, SpanFlags::POINT_POINT)?;
        self.set_span(markers.end, end, end, SpanFlags::POINT_POINT)
    }

    /// Collapses the selection to a cursor at `offset`.
    pub fn set_cursor(&mut self, offset: usize) -> Result<(), Error> {
        self.set_selection(offset, offset)
    }

    pub fn selection_start(&self) -> Option<usize> {
        self.span_start(&self.selection.start)
    }

    pub fn selection_end(&self) -> Option<usize> {
        self.span_end(&self.selection.end)
    }

    pub fn remove_selection(&mut self) {
        let markers = self.selection.clone();
        self.remove_span(&markers.start);
        self.remove_span(&markers.end);
    }

    /// The span identities holding this buffer's selection, anchor first.
    pub fn selection_markers(&self) -> (&SpanRef, &SpanRef) {
        (&self.selection.start, &self.selection.end)
    }

    /// Moves selection endpoints that were strictly inside the replaced
    /// range `[start, end)` to the same relative spot in the new text.
    pub(crate) fn rescale_selection(
        &mut self,
        start: usize,
        end: usize,
        new_len: usize,
        before: (Option<usize>, Option<usize>),
    ) -> Result<(), Error> {
        let old_len = end - start;
        let markers = self.selection.clone();
        let mut changed = false;

        for (marker, offset) in [(markers.start, before.0), (markers.end, before.1)] {
            let Some(offset) = offset.filter(|&o| o > start && o < end) else {
                continue;
            };
            let target = rescaled(offset, start, old_len, new_len);
            let gap = self.text.gap();
            self.spans.attach(
                &self.text,
                gap,
                marker,
                target,
                target,
                SpanFlags::POINT_POINT,
                AttachMode::Adjust,
            )?;
            changed = true;
        }
        if changed {
            self.spans.restore_invariants();
        }
        Ok(())
    }
}
