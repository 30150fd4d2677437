// Chunk: docs/chunks/mutation_engine - Replace protocol and span adjustment

//! SpannableBuffer is the main public API: mutable text with attached spans.
//!
//! It combines a gap buffer (character storage) with a span table (interval
//! index over the attached spans). Every edit goes through
//! [`SpannableBuffer::replace_range`], which moves span endpoints according
//! to their MARK / POINT / PARAGRAPH flags and then notifies watchers.

use std::fmt;
use std::rc::Rc;

use crate::error::{check_range, Error};
use crate::filter::InputFilter;
use crate::gap_buffer::GapBuffer;
use crate::selection::SelectionMarkers;
use crate::span::{Span, SpanFilter, SpanFlags, SpanRef};
use crate::span_table::{
    Attach, AttachMode, EditMarks, RemovedSpan, SpanTable, Upsert, PARAGRAPH_SEPARATOR,
};
use crate::text::{copy_spans, CharSequence, Spanned, SpannedText};

/// Debug builds verify span table invariants after every this many mutations.
#[cfg(debug_assertions)]
const INVARIANT_CHECK_INTERVAL: u64 = 64;

/// Mutable text with attached, possibly overlapping spans.
///
/// The buffer maintains:
/// - Characters in a gap buffer, so edits near the previous edit are cheap
/// - Spans in a table sorted by start, indexed as an implicit interval tree
/// - Input filters applied to every replacement
/// - Selection endpoints as marker spans
///
/// The buffer is single-owner: span handles are `Rc`-based, so it is neither
/// `Send` nor `Sync`.
pub struct SpannableBuffer {
    pub(crate) text: GapBuffer,
    pub(crate) spans: SpanTable,
    filters: Vec<Rc<dyn InputFilter>>,
    /// Nesting depth of watcher callbacks currently running.
    pub(crate) callback_depth: usize,
    pub(crate) selection: SelectionMarkers,
    /// Mutation counter for sampling debug assertions (debug builds only).
    #[cfg(debug_assertions)]
    debug_mutation_count: u64,
}

impl SpannableBuffer {
    /// Creates a new empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty buffer that can hold `capacity` chars before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_parts(GapBuffer::with_capacity(capacity), SpanTable::new())
    }

    fn from_parts(text: GapBuffer, spans: SpanTable) -> Self {
        Self {
            text,
            spans,
            filters: Vec::new(),
            callback_depth: 0,
            selection: SelectionMarkers::new(),
            #[cfg(debug_assertions)]
            debug_mutation_count: 0,
        }
    }

    /// Creates a buffer holding a copy of `text`, including its spans when it
    /// has any.
    pub fn from_text<T: CharSequence>(text: T) -> Self {
        let len = text.len();
        // The full range of a text is always valid.
        Self::from_spanned(&text, 0, len).unwrap_or_default()
    }

    /// Creates a buffer holding `source[start..end]` and the spans over it,
    /// clamped to the range.
    ///
    /// No-copy spans are left behind, as are PARAGRAPH spans whose clamped
    /// ends no longer sit on paragraph boundaries.
    pub fn from_spanned(
        source: &dyn CharSequence,
        start: usize,
        end: usize,
    ) -> Result<Self, Error> {
        check_range("from_spanned", start, end, source.len())?;
        let mut chars = vec!['\0'; end - start];
        source.get_chars(start, end, &mut chars, 0)?;

        let text = GapBuffer::from_chars(&chars);
        let mut spans = SpanTable::new();
        if let Some(spanned) = source.as_spanned() {
            copy_spans(&mut spans, &text, text.gap(), spanned, start, end, 0, false)?;
            spans.restore_invariants();
        }
        Ok(Self::from_parts(text, spans))
    }

    // ==================== Accessors ====================

    /// Returns the length in chars.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_at(&self, index: usize) -> Result<char, Error> {
        self.text.char_at(index)
    }

    pub fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        self.text.get_chars(start, end, dest, dest_offset)
    }

    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.text.chars()
    }

    /// Returns the physical size of the character store.
    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    /// Total chars physically moved by gap moves and growth so far.
    pub fn copied_chars(&self) -> usize {
        self.text.copied_chars()
    }

    /// Copies `[start, end)` and the spans over it into an immutable text.
    pub fn sub_sequence(&self, start: usize, end: usize) -> Result<SpannedText, Error> {
        SpannedText::copy_of(self, start, end)
    }

    /// Copies the whole buffer into an immutable text.
    pub fn freeze(&self) -> SpannedText {
        // The full range of a text is always valid.
        self.sub_sequence(0, self.len()).unwrap_or_default()
    }

    /// How many watcher callbacks, text or span, are running right now.
    /// Non-zero while a watcher re-enters the buffer.
    pub fn callback_depth(&self) -> usize {
        self.callback_depth
    }

    pub fn set_filters(&mut self, filters: Vec<Rc<dyn InputFilter>>) {
        self.filters = filters;
    }

    pub fn filters(&self) -> &[Rc<dyn InputFilter>] {
        &self.filters
    }

    // ==================== Span access ====================

    pub fn span_start(&self, span: &SpanRef) -> Option<usize> {
        let i = self.spans.index_of(span)?;
        Some(self.text.gap().resolve(self.spans.start(i)))
    }

    pub fn span_end(&self, span: &SpanRef) -> Option<usize> {
        let i = self.spans.index_of(span)?;
        Some(self.text.gap().resolve(self.spans.end(i)))
    }

    pub fn span_flags(&self, span: &SpanRef) -> Option<SpanFlags> {
        self.spans.index_of(span).map(|i| self.spans.flags(i))
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Spans overlapping `[start, end]`, highest priority first and
    /// otherwise in table order.
    pub fn get_spans(&self, start: usize, end: usize, filter: &SpanFilter<'_>) -> Vec<SpanRef> {
        self.spans.query(self.text.gap(), start, end, filter, false)
    }

    /// Spans overlapping `[start, end]`, ordered by priority then by the
    /// order they were first attached.
    pub fn get_spans_sorted(
        &self,
        start: usize,
        end: usize,
        filter: &SpanFilter<'_>,
    ) -> Vec<SpanRef> {
        self.spans.query(self.text.gap(), start, end, filter, true)
    }

    /// Span objects of type `T` overlapping `[start, end]`.
    pub fn get_spans_of<T: Span>(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        self.get_spans(start, end, &SpanFilter::of::<T>())
            .iter()
            .filter_map(SpanRef::downcast::<T>)
            .collect()
    }

    pub fn next_span_transition(
        &self,
        start: usize,
        limit: usize,
        filter: &SpanFilter<'_>,
    ) -> usize {
        self.spans.next_transition(self.text.gap(), start, limit, filter)
    }

    // ==================== Span mutation ====================

    /// Attaches `span` over `[start, end]`, or moves it there if it is
    /// already attached.
    ///
    /// A zero-length exclusive-exclusive span is ignored (and logged). A
    /// PARAGRAPH endpoint must sit at 0, at the end, or after a `'\n'`.
    pub fn set_span(
        &mut self,
        span: SpanRef,
        start: usize,
        end: usize,
        flags: SpanFlags,
    ) -> Result<(), Error> {
        let gap = self.text.gap();
        let attached = self
            .spans
            .attach(&self.text, gap, span.clone(), start, end, flags, AttachMode::Public)?;
        let Attach::Stored(upsert) = attached else {
            return Ok(());
        };
        self.spans.restore_invariants();
        self.assert_spans_consistent();

        match upsert {
            Upsert::Added => self.send_span_added(&span, start, end),
            Upsert::Updated { old_start, old_end } => {
                self.send_span_changed(&span, old_start, old_end, start, end)
            }
        }
        Ok(())
    }

    /// Detaches `span`. Does nothing if it is not attached.
    pub fn remove_span(&mut self, span: &SpanRef) {
        self.remove_span_with_flags(span, SpanFlags::default());
    }

    /// Detaches `span`; with [`SpanFlags::INTERMEDIATE`] no watcher hears
    /// about it.
    pub fn remove_span_with_flags(&mut self, span: &SpanRef, flags: SpanFlags) {
        let Some(removed) = self.spans.remove(self.text.gap(), span) else {
            return;
        };
        self.assert_spans_consistent();
        if !flags.contains(SpanFlags::INTERMEDIATE) {
            self.send_span_removed(&removed.span, removed.start, removed.end);
        }
    }

    /// Detaches every span, notifying removals last-attached-slot first, and
    /// restarts insertion order.
    pub fn clear_spans(&mut self) {
        let removed = self.spans.clear(self.text.gap());
        self.notify_cleared(removed);
    }

    // ==================== Mutations ====================

    /// Replaces `[start, end)` with all of `text`.
    pub fn replace<T: CharSequence>(
        &mut self,
        start: usize,
        end: usize,
        text: T,
    ) -> Result<(), Error> {
        let len = text.len();
        self.replace_range(start, end, &text, 0, len)
    }

    /// Replaces `[start, end)` with `text[text_start..text_end]`.
    ///
    /// Runs the input filters, notifies text watchers around the physical
    /// edit, adjusts every span endpoint, copies in the spans carried by
    /// `text`, and finally notifies span watchers of removed, moved and
    /// added spans (in that order). Range errors leave the buffer untouched.
    pub fn replace_range(
        &mut self,
        start: usize,
        end: usize,
        text: &dyn CharSequence,
        text_start: usize,
        text_end: usize,
    ) -> Result<(), Error> {
        check_range("replace", start, end, self.len())?;
        check_range("replace", text_start, text_end, text.len())?;

        let filters = self.filters.clone();
        let mut filtered: Option<SpannedText> = None;
        for filter in &filters {
            let (source, s, e): (&dyn CharSequence, usize, usize) = match &filtered {
                Some(t) => (t, 0, t.len()),
                None => (text, text_start, text_end),
            };
            if let Some(replacement) = filter.filter(source, s, e, self, start, end) {
                filtered = Some(replacement);
            }
        }
        let (text, text_start, text_end): (&dyn CharSequence, usize, usize) = match &filtered {
            Some(t) => (t, 0, t.len()),
            None => (text, text_start, text_end),
        };

        let old_len = end - start;
        let new_len = text_end - text_start;
        if old_len == 0 && new_len == 0 && !has_non_exclusive_span_at(text, text_start) {
            return Ok(());
        }
        tracing::debug!(start, end, new_len, "replace");

        let text_watchers = self.get_spans(start, start + old_len, &SpanFilter::TextWatchers);
        self.send_before_text_changed(&text_watchers, start, old_len, new_len);

        let adjust_selection = old_len != 0 && new_len != 0;
        let selection = if adjust_selection {
            (self.selection_start(), self.selection_end())
        } else {
            (None, None)
        };

        let removed = self.change(start, end, text, text_start, text_end)?;
        if adjust_selection {
            self.rescale_selection(start, end, new_len, selection)?;
        }
        let events = self.collect_span_events(removed, start, end, new_len);
        self.assert_spans_consistent();

        self.send_text_changed(&text_watchers, start, old_len, new_len);
        self.send_after_text_changed(&text_watchers);
        self.dispatch_span_events(events);
        Ok(())
    }

    /// The physical edit: text, span endpoints and copied-in spans.
    ///
    /// Returns the spans the edit collapsed, with their pre-edit bounds.
    fn change(
        &mut self,
        start: usize,
        end: usize,
        source: &dyn CharSequence,
        source_start: usize,
        source_end: usize,
    ) -> Result<Vec<RemovedSpan>, Error> {
        let mut chars = vec!['\0'; source_end - source_start];
        source.get_chars(source_start, source_end, &mut chars, 0)?;

        let replaced_len = end - start;
        let replace_end = start + chars.len();
        let gap = self.text.gap();

        // PARAGRAPH spans with an endpoint inside the edited range are pushed
        // to the next paragraph boundary, then every endpoint sitting on an
        // edit boundary is recorded.
        let mut rebounded = false;
        for i in (0..self.spans.len()).rev() {
            let old_start = gap.resolve(self.spans.start(i));
            let old_end = gap.resolve(self.spans.end(i));
            let flags = self.spans.flags(i);
            let (mut span_start, mut span_end) = (old_start, old_end);

            if flags.is_paragraph() {
                if span_start > start && span_start <= end {
                    span_start = self.next_paragraph_boundary(end);
                }
                if span_end > start && span_end <= end {
                    span_end = self.next_paragraph_boundary(end);
                }
                if (span_start, span_end) != (old_start, old_end) {
                    let span = self.spans.span(i).clone();
                    self.spans.attach(
                        &self.text,
                        gap,
                        span,
                        span_start,
                        span_end,
                        flags,
                        AttachMode::Adjust,
                    )?;
                    rebounded = true;
                }
            }

            let state = self.spans.edit_state_mut(i);
            state.old_start = old_start;
            state.old_end = old_end;
            if span_start == start {
                state.marks.insert(EditMarks::START_AT_START);
            } else if span_start == replace_end {
                state.marks.insert(EditMarks::START_AT_END);
            }
            if span_end == start {
                state.marks.insert(EditMarks::END_AT_START);
            } else if span_end == replace_end {
                state.marks.insert(EditMarks::END_AT_END);
            }
        }
        if rebounded {
            self.spans.restore_invariants();
        }

        self.move_gap_to(end);
        let new_len = self.len() - replaced_len + chars.len();
        let gap = self.text.gap();
        let delta = self.text.resize_for(new_len);
        self.spans.shift_for_resize(gap.start, delta);

        let text_removed = chars.is_empty();
        let mut removed = Vec::new();
        if replaced_len > 0 {
            let gap = self.text.gap();
            while let Some(i) = self.spans.find_collapsed(gap, start, end, text_removed) {
                let span = self.spans.remove_at(gap, i);
                tracing::debug!(
                    span = ?span.span,
                    start = span.start,
                    end = span.end,
                    "span collapsed by edit"
                );
                removed.push(span);
            }
        }

        self.text.replace_before_gap(start, &chars);

        if replaced_len > 0 {
            let gap = self.text.gap();
            let at_end = gap.end() == self.text.capacity();
            self.spans.adjust_after_replace(gap, start, end, at_end, text_removed);
        }

        if let Some(spanned) = source.as_spanned() {
            let gap = self.text.gap();
            copy_spans(
                &mut self.spans,
                &self.text,
                gap,
                spanned,
                source_start,
                source_end,
                start,
                true,
            )?;
            self.spans.restore_invariants();
        }
        Ok(removed)
    }

    /// Moves the gap, re-encoding span offsets for the new gap position.
    fn move_gap_to(&mut self, offset: usize) {
        let old = self.text.gap();
        if old.start == offset {
            return;
        }
        let at_end = offset == self.len();
        self.text.move_gap_to(offset);
        self.spans.relocate_gap(old, offset, at_end);
        tracing::trace!(from = old.start, to = offset, "gap moved");
    }

    /// First offset after `end` that follows a paragraph separator, or the
    /// text length.
    fn next_paragraph_boundary(&self, end: usize) -> usize {
        let len = self.len();
        (end + 1..len)
            .find(|&offset| self.text.char_at(offset - 1) == Ok(PARAGRAPH_SEPARATOR))
            .unwrap_or(len)
    }

    /// Inserts `text` at `offset`.
    pub fn insert<T: CharSequence>(&mut self, offset: usize, text: T) -> Result<(), Error> {
        self.replace(offset, offset, text)
    }

    /// Deletes `[start, end)`.
    pub fn delete(&mut self, start: usize, end: usize) -> Result<(), Error> {
        self.replace(start, end, "")
    }

    pub fn append<T: CharSequence>(&mut self, text: T) -> Result<(), Error> {
        let len = self.len();
        self.replace(len, len, text)
    }

    pub fn append_char(&mut self, ch: char) -> Result<(), Error> {
        let chars = [ch];
        self.append(&chars[..])
    }

    /// Appends `text` and attaches `span` over it.
    pub fn append_with_span<T: CharSequence>(
        &mut self,
        text: T,
        span: SpanRef,
        flags: SpanFlags,
    ) -> Result<(), Error> {
        let start = self.len();
        self.append(text)?;
        let end = self.len();
        self.set_span(span, start, end, flags)
    }

    /// Deletes all text and restarts span insertion order. Spans that
    /// survive the deletion (those not collapsed by it) stay attached.
    pub fn clear(&mut self) -> Result<(), Error> {
        let len = self.len();
        self.replace(0, len, "")?;
        self.spans.reset_insert_count();
        Ok(())
    }

    // ==================== Validation ====================

    /// Verifies the span table invariants and that the gap is open.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.text.capacity() <= self.text.len() {
            return Err(format!(
                "gap closed: {} chars in a store of {}",
                self.text.len(),
                self.text.capacity()
            ));
        }
        self.spans.check_invariants(self.text.gap())
    }

    /// Debug-only sampled check that span bookkeeping has not drifted.
    ///
    /// Checks every 64th mutation so tight edit loops stay linear.
    #[cfg(debug_assertions)]
    fn assert_spans_consistent(&mut self) {
        self.debug_mutation_count += 1;
        if self.debug_mutation_count % INVARIANT_CHECK_INTERVAL != 0 {
            return;
        }
        if let Err(violation) = self.check_invariants() {
            panic!(
                "span table drift after mutation #{}: {} (len={}, spans={})",
                self.debug_mutation_count,
                violation,
                self.len(),
                self.span_count(),
            );
        }
    }

    #[cfg(not(debug_assertions))]
    fn assert_spans_consistent(&mut self) {}
}

/// True if `text` carries a span at `offset` that a zero-length insertion
/// would still copy in.
fn has_non_exclusive_span_at(text: &dyn CharSequence, offset: usize) -> bool {
    let Some(spanned) = text.as_spanned() else {
        return false;
    };
    spanned
        .spans(offset, offset, &SpanFilter::All)
        .iter()
        .any(|span| spanned.span_flags(span) != Some(SpanFlags::EXCLUSIVE_EXCLUSIVE))
}

impl Default for SpannableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpannableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpannableBuffer")
            .field("text", &self.text.to_string())
            .field("spans", &self.spans)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl fmt::Display for SpannableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.text, f)
    }
}

impl CharSequence for SpannableBuffer {
    fn len(&self) -> usize {
        SpannableBuffer::len(self)
    }

    fn char_at(&self, index: usize) -> Result<char, Error> {
        SpannableBuffer::char_at(self, index)
    }

    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        SpannableBuffer::get_chars(self, start, end, dest, dest_offset)
    }

    fn as_spanned(&self) -> Option<&dyn Spanned> {
        Some(self)
    }
}

impl Spanned for SpannableBuffer {
    fn span_start(&self, span: &SpanRef) -> Option<usize> {
        SpannableBuffer::span_start(self, span)
    }

    fn span_end(&self, span: &SpanRef) -> Option<usize> {
        SpannableBuffer::span_end(self, span)
    }

    fn span_flags(&self, span: &SpanRef) -> Option<SpanFlags> {
        SpannableBuffer::span_flags(self, span)
    }

    fn spans(&self, start: usize, end: usize, filter: &SpanFilter<'_>) -> Vec<SpanRef> {
        self.get_spans(start, end, filter)
    }

    fn next_span_transition(&self, start: usize, limit: usize, filter: &SpanFilter<'_>) -> usize {
        SpannableBuffer::next_span_transition(self, start, limit, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Bold;
    impl Span for Bold {}

    #[derive(Debug)]
    struct Link(&'static str);
    impl Span for Link {}

    fn with_span(
        text: &str,
        start: usize,
        end: usize,
        flags: SpanFlags) -> (SpannableBuffer, SpanRef,
    ) {
        let mut buf = SpannableBuffer::from_text(text);
        let span = SpanRef::new(Bold);
        buf.set_span(span.clone(), start, end, flags).unwrap();
        (buf, span)
    }

    fn bounds(buf: &SpannableBuffer, span: &SpanRef) -> Option<(usize, usize)> {
        Some((buf.span_start(span)?, buf.span_end(span)?))
    }

    // ==================== Text editing ====================

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = SpannableBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.to_string(), "");
        assert!(buf.check_invariants().is_ok());
    }

    #[test]
    fn test_insert_delete_replace() {
        let mut buf = SpannableBuffer::from_text("hello");
        buf.insert(5, " world").unwrap();
        assert_eq!(buf.to_string(), "hello world");
        buf.delete(0, 6).unwrap();
        assert_eq!(buf.to_string(), "world");
        buf.replace(0, 1, "W").unwrap();
        assert_eq!(buf.to_string(), "World");
        buf.append_char('!').unwrap();
        assert_eq!(buf.to_string(), "World!");
        assert_eq!(buf.char_at(5), Ok('!'));
    }

    #[test]
    fn test_replace_range_uses_source_slice() {
        let mut buf = SpannableBuffer::from_text("abc");
        buf.replace_range(1, 2, &"0123456", 2, 5).unwrap();
        assert_eq!(buf.to_string(), "a234c");
    }

    #[test]
    fn test_range_errors_leave_buffer_untouched() {
        let (mut buf, span) = with_span("hello", 1, 3, SpanFlags::EXCLUSIVE_EXCLUSIVE);

        let err = buf.replace(3, 1, "x").unwrap_err();
        assert!(matches!(err, Error::RangeReversed { start: 3, end: 1, .. }));
        let err = buf.replace(0, 9, "x").unwrap_err();
        assert!(matches!(err, Error::RangeOutOfBounds { end: 9, len: 5, .. }));
        assert!(buf.replace_range(0, 0, &"abc", 2, 7).unwrap_err().is_range_error());

        assert_eq!(buf.to_string(), "hello");
        assert_eq!(bounds(&buf, &span), Some((1, 3)));
    }

    #[test]
    fn test_empty_replace_is_a_no_op() {
        let (mut buf, span) = with_span("hello", 1, 3, SpanFlags::MARK_MARK);
        buf.replace(2, 2, "").unwrap();
        assert_eq!(buf.to_string(), "hello");
        assert_eq!(bounds(&buf, &span), Some((1, 3)));
    }

    #[test]
    fn test_clear_keeps_surviving_spans() {
        let (mut buf, span) = with_span("hello", 1, 3, SpanFlags::MARK_MARK);
        buf.clear().unwrap();
        assert!(buf.is_empty());
        assert_eq!(bounds(&buf, &span), Some((0, 0)));
    }

    #[test]
    fn test_gap_survives_many_edits() {
        let mut buf = SpannableBuffer::new();
        for i in 0..200 {
            let at = (i * 7) % (buf.len() + 1);
            buf.insert(at, "xy").unwrap();
            if i % 3 == 0 {
                buf.delete(at, at + 1).unwrap();
            }
        }
        assert!(buf.check_invariants().is_ok());
        assert!(buf.capacity() > buf.len());
    }

    // ==================== Span boundaries ====================

    #[test]
    fn test_insert_at_mark_end_stays_before() {
        let (mut buf, span) = with_span("hello world", 0, 5, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        buf.insert(5, "XX").unwrap();
        assert_eq!(bounds(&buf, &span), Some((0, 5)));
    }

    #[test]
    fn test_insert_at_point_end_is_included() {
        let (mut buf, span) = with_span("hello world", 0, 5, SpanFlags::INCLUSIVE_INCLUSIVE);
        buf.insert(5, "XX").unwrap();
        assert_eq!(bounds(&buf, &span), Some((0, 7)));
    }

    #[test]
    fn test_insert_at_point_start_pushes_span() {
        let (mut buf, span) = with_span("hello world", 0, 5, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        buf.insert(0, "XX").unwrap();
        assert_eq!(bounds(&buf, &span), Some((2, 7)));
    }

    #[test]
    fn test_insert_at_mark_start_is_included() {
        let (mut buf, span) = with_span("hello world", 0, 5, SpanFlags::INCLUSIVE_INCLUSIVE);
        buf.insert(0, "XX").unwrap();
        assert_eq!(bounds(&buf, &span), Some((0, 7)));
    }

    #[test]
    fn test_edits_before_span_shift_it() {
        let (mut buf, span) = with_span("hello world", 6, 11, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        buf.delete(0, 2).unwrap();
        assert_eq!(bounds(&buf, &span), Some((4, 9)));
        buf.insert(1, "abc").unwrap();
        assert_eq!(bounds(&buf, &span), Some((7, 12)));
    }

    #[test]
    fn test_emptied_exclusive_span_is_removed() {
        let (mut buf, span) = with_span("hello world", 2, 5, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        buf.delete(2, 5).unwrap();
        assert_eq!(bounds(&buf, &span), None);
        assert_eq!(buf.span_count(), 0);
    }

    #[test]
    fn test_emptied_inclusive_span_survives() {
        let (mut buf, span) = with_span("hello world", 2, 5, SpanFlags::MARK_MARK);
        buf.delete(1, 6).unwrap();
        assert_eq!(buf.to_string(), "hworld");
        assert_eq!(bounds(&buf, &span), Some((1, 1)));
    }

    #[test]
    fn test_replacing_inside_span_resizes_it() {
        let (mut buf, span) = with_span("hello world", 0, 11, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        buf.replace(6, 11, "there, friend").unwrap();
        assert_eq!(buf.to_string(), "hello there, friend");
        assert_eq!(bounds(&buf, &span), Some((0, 19)));
    }

    #[test]
    fn test_paragraph_span_is_pushed_to_next_boundary() {
        let (mut buf, span) = with_span("ab\ncd\nef", 0, 3, SpanFlags::PARAGRAPH);
        // The end sits inside the replaced range, so it moves to the next
        // paragraph start before the edit.
        buf.replace(1, 3, "X").unwrap();
        assert_eq!(buf.to_string(), "aXcd\nef");
        assert_eq!(bounds(&buf, &span), Some((0, 5)));
        assert!(buf.check_invariants().is_ok());
    }

    #[test]
    fn test_paragraph_span_rejects_mid_line_offsets() {
        let mut buf = SpannableBuffer::from_text("ab\ncd");
        let err = buf
            .set_span(SpanRef::new(Bold), 1, 3, SpanFlags::PARAGRAPH)
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidSpanRange {
                endpoint: crate::error::Endpoint::Start,
                offset: 1
            }
        );
        assert!(buf.set_span(SpanRef::new(Bold), 3, 5, SpanFlags::PARAGRAPH).is_ok());
    }

    #[test]
    fn test_zero_length_exclusive_span_is_ignored() {
        let mut buf = SpannableBuffer::from_text("hello");
        let span = SpanRef::new(Bold);
        buf.set_span(span.clone(), 2, 2, SpanFlags::EXCLUSIVE_EXCLUSIVE).unwrap();
        assert_eq!(buf.span_count(), 0);
        assert_eq!(buf.span_start(&span), None);
    }

    // ==================== Span API ====================

    #[test]
    fn test_set_span_moves_existing_span() {
        let (mut buf, span) = with_span("hello world", 0, 5, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        buf.set_span(span.clone(), 6, 11, SpanFlags::MARK_MARK).unwrap();
        assert_eq!(buf.span_count(), 1);
        assert_eq!(bounds(&buf, &span), Some((6, 11)));
        assert_eq!(buf.span_flags(&span), Some(SpanFlags::MARK_MARK));
    }

    #[test]
    fn test_remove_span() {
        let (mut buf, span) = with_span("hello", 0, 5, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        buf.remove_span(&span);
        assert_eq!(buf.span_count(), 0);
        // Removing twice is harmless.
        buf.remove_span(&span);
        buf.clear_spans();
        assert_eq!(buf.span_count(), 0);
    }

    #[test]
    fn test_get_spans_of_type() {
        let mut buf = SpannableBuffer::from_text("see the docs");
        let link = Rc::new(Link("https://example.com"));
        buf.set_span(SpanRef::from(link.clone()), 8, 12, SpanFlags::EXCLUSIVE_EXCLUSIVE)
            .unwrap();
        buf.set_span(SpanRef::new(Bold), 0, 3, SpanFlags::EXCLUSIVE_EXCLUSIVE)
            .unwrap();

        let links = buf.get_spans_of::<Link>(0, 12);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "https://example.com");
        assert!(Rc::ptr_eq(&links[0], &link));
        assert_eq!(buf.get_spans(0, 12, &SpanFilter::All).len(), 2);
        assert!(buf.get_spans_of::<Link>(0, 3).is_empty());
    }

    #[test]
    fn test_next_span_transition() {
        let mut buf = SpannableBuffer::from_text("hello world");
        buf.set_span(SpanRef::new(Bold), 2, 4, SpanFlags::EXCLUSIVE_EXCLUSIVE)
            .unwrap();
        assert_eq!(buf.next_span_transition(0, 11, &SpanFilter::All), 2);
        assert_eq!(buf.next_span_transition(2, 11, &SpanFilter::All), 4);
        assert_eq!(buf.next_span_transition(4, 11, &SpanFilter::All), 11);
    }

    #[test]
    fn test_append_with_span() {
        let mut buf = SpannableBuffer::from_text("ab");
        let span = SpanRef::new(Bold);
        buf.append_with_span("cd", span.clone(), SpanFlags::EXCLUSIVE_EXCLUSIVE)
            .unwrap();
        assert_eq!(buf.to_string(), "abcd");
        assert_eq!(bounds(&buf, &span), Some((2, 4)));
    }

    #[test]
    fn test_replace_copies_source_spans() {
        let (source, span) = with_span("bold", 0, 4, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        let mut buf = SpannableBuffer::from_text("a  b");
        buf.replace(1, 3, &source).unwrap();
        assert_eq!(buf.to_string(), "aboldb");
        assert_eq!(bounds(&buf, &span), Some((1, 5)));
    }

    #[test]
    fn test_from_spanned_clamps_spans() {
        let (source, span) = with_span("hello world", 3, 8, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        let buf = SpannableBuffer::from_spanned(&source, 5, 11).unwrap();
        assert_eq!(buf.to_string(), " world");
        assert_eq!(bounds(&buf, &span), Some((0, 3)));
        assert!(SpannableBuffer::from_spanned(&source, 4, 2).is_err());
    }

    #[test]
    fn test_freeze_snapshots_text_and_spans() {
        let (mut buf, span) = with_span("hello", 1, 4, SpanFlags::EXCLUSIVE_EXCLUSIVE);
        let frozen = buf.freeze();
        buf.delete(0, 5).unwrap();
        assert_eq!(frozen.to_string(), "hello");
        assert_eq!(frozen.span_start(&span), Some(1));
        assert_eq!(frozen.span_end(&span), Some(4));
    }
}
