// Chunk: docs/chunks/spanned_text - Read-only character and span access

//! Read-only text interfaces and the immutable [`SpannedText`].
//!
//! [`CharSequence`] is what `replace` accepts and what filters inspect:
//! plain `str`, `String`, `[char]`, or any spanned text. [`Spanned`] adds
//! span queries on top, and is how spans ride along with copied text.

use std::fmt;
use std::rc::Rc;

use crate::error::{check_range, Error};
use crate::gap_buffer::{Gap, GapBuffer};
use crate::span::{Span, SpanFilter, SpanFlags, SpanRef};
use crate::span_table::{Attach, AttachMode, EditMarks, SpanTable, Upsert};
use crate::spannable_buffer::SpannableBuffer;

/// Read access to a sequence of chars.
pub trait CharSequence {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn char_at(&self, index: usize) -> Result<char, Error>;

    /// Copies `[start, end)` into `dest` at `dest_offset`.
    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error>;

    /// The span view of this text, if it carries spans.
    fn as_spanned(&self) -> Option<&dyn Spanned> {
        None
    }
}

/// A [`CharSequence`] with attached spans.
pub trait Spanned: CharSequence {
    fn span_start(&self, span: &SpanRef) -> Option<usize>;

    fn span_end(&self, span: &SpanRef) -> Option<usize>;

    fn span_flags(&self, span: &SpanRef) -> Option<SpanFlags>;

    /// Spans overlapping `[start, end]`, highest priority first.
    fn spans(&self, start: usize, end: usize, filter: &SpanFilter<'_>) -> Vec<SpanRef>;

    /// First offset in `(start, limit)` where a matching span starts or
    /// ends, or `limit`.
    fn next_span_transition(&self, start: usize, limit: usize, filter: &SpanFilter<'_>) -> usize;
}

fn copy_from_iter(
    chars: impl Iterator<Item = char>,
    count: usize,
    dest: &mut [char],
    dest_offset: usize,
) -> Result<(), Error> {
    check_range("get_chars", dest_offset, dest_offset + count, dest.len())?;
    for (slot, ch) in dest[dest_offset..dest_offset + count].iter_mut().zip(chars) {
        *slot = ch;
    }
    Ok(())
}

impl CharSequence for str {
    fn len(&self) -> usize {
        self.chars().count()
    }

    fn is_empty(&self) -> bool {
        str::is_empty(self)
    }

    fn char_at(&self, index: usize) -> Result<char, Error> {
        self.chars().nth(index).ok_or(Error::IndexOutOfRange {
            index,
            len: CharSequence::len(self),
        })
    }

    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        check_range("get_chars", start, end, CharSequence::len(self))?;
        copy_from_iter(self.chars().skip(start), end - start, dest, dest_offset)
    }
}

impl CharSequence for String {
    fn len(&self) -> usize {
        CharSequence::len(self.as_str())
    }

    fn char_at(&self, index: usize) -> Result<char, Error> {
        self.as_str().char_at(index)
    }

    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        self.as_str().get_chars(start, end, dest, dest_offset)
    }
}

impl CharSequence for [char] {
    fn len(&self) -> usize {
        <[char]>::len(self)
    }

    fn char_at(&self, index: usize) -> Result<char, Error> {
        self.get(index).copied().ok_or(Error::IndexOutOfRange {
            index,
            len: <[char]>::len(self),
        })
    }

    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        check_range("get_chars", start, end, <[char]>::len(self))?;
        copy_from_iter(self[start..end].iter().copied(), end - start, dest, dest_offset)
    }
}

impl CharSequence for GapBuffer {
    fn len(&self) -> usize {
        GapBuffer::len(self)
    }

    fn char_at(&self, index: usize) -> Result<char, Error> {
        GapBuffer::char_at(self, index)
    }

    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        GapBuffer::get_chars(self, start, end, dest, dest_offset)
    }
}

impl<T: CharSequence + ?Sized> CharSequence for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn char_at(&self, index: usize) -> Result<char, Error> {
        (**self).char_at(index)
    }

    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        (**self).get_chars(start, end, dest, dest_offset)
    }

    fn as_spanned(&self) -> Option<&dyn Spanned> {
        (**self).as_spanned()
    }
}

/// Copies the spans of `source` overlapping `[start, end]` into `table`,
/// clamped to that range and shifted so `start` lands on `dest_start`.
///
/// Identities already in `table` and no-copy spans are skipped, as are spans
/// that would be invalid in the destination. With `mark_added`, each copied
/// span is flagged for an added notification.
#[allow(clippy::too_many_arguments)]
pub(crate) fn copy_spans(
    table: &mut SpanTable,
    text: &dyn CharSequence,
    gap: Gap,
    source: &dyn Spanned,
    start: usize,
    end: usize,
    dest_start: usize,
    mark_added: bool,
) -> Result<(), Error> {
    for span in source.spans(start, end, &SpanFilter::All) {
        if span.is_no_copy() || table.index_of(&span).is_some() {
            continue;
        }
        let (Some(st), Some(en), Some(flags)) = (
            source.span_start(&span),
            source.span_end(&span),
            source.span_flags(&span),
        ) else {
            continue;
        };
        let st = st.max(start) - start + dest_start;
        let en = en.min(end) - start + dest_start;
        let attached = table.attach(text, gap, span.clone(), st, en, flags, AttachMode::Copy)?;
        if mark_added && attached == Attach::Stored(Upsert::Added) {
            if let Some(i) = table.index_of(&span) {
                table.edit_state_mut(i).marks.insert(EditMarks::ADDED);
            }
        }
    }
    Ok(())
}

/// An immutable text with spans.
///
/// Produced by [`SpannableBuffer::sub_sequence`] and
/// [`SpannableBuffer::freeze`], and accepted anywhere a [`CharSequence`] is.
/// Span objects are shared with the text they were copied from; the span
/// records (bounds, flags) are independent copies.
#[derive(Debug, Clone, Default)]
pub struct SpannedText {
    chars: Vec<char>,
    spans: SpanTable,
}

impl SpannedText {
    /// A plain text with no spans.
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            spans: SpanTable::new(),
        }
    }

    /// Copies `[start, end)` of `source`, with its spans when it has any.
    pub fn copy_of(source: &dyn CharSequence, start: usize, end: usize) -> Result<Self, Error> {
        check_range("sub_sequence", start, end, source.len())?;
        let mut chars = vec!['\0'; end - start];
        source.get_chars(start, end, &mut chars, 0)?;
        let mut text = Self {
            chars,
            spans: SpanTable::new(),
        };
        if let Some(spanned) = source.as_spanned() {
            text.copy_spans_from(spanned, start, end)?;
        }
        Ok(text)
    }

    /// `chars` with the spans of `source` over `[start, end)` laid on top.
    ///
    /// `chars` must be as long as the source range.
    pub(crate) fn with_spans_of(
        chars: Vec<char>,
        source: Option<&dyn Spanned>,
        start: usize,
        end: usize,
    ) -> Result<Self, Error> {
        debug_assert_eq!(chars.len(), end - start);
        let mut text = Self {
            chars,
            spans: SpanTable::new(),
        };
        if let Some(spanned) = source {
            text.copy_spans_from(spanned, start, end)?;
        }
        Ok(text)
    }

    fn copy_spans_from(
        &mut self,
        source: &dyn Spanned,
        start: usize,
        end: usize,
    ) -> Result<(), Error> {
        let gap = self.gap();
        copy_spans(&mut self.spans, &self.chars.as_slice(), gap, source, start, end, 0, false)?;
        self.spans.restore_invariants();
        Ok(())
    }

    fn gap(&self) -> Gap {
        Gap::closed_at(self.chars.len())
    }

    /// A mutable buffer holding a copy of this text and its spans.
    pub fn to_buffer(&self) -> SpannableBuffer {
        SpannableBuffer::from_text(self)
    }

    pub fn sub_sequence(&self, start: usize, end: usize) -> Result<SpannedText, Error> {
        Self::copy_of(self, start, end)
    }

    /// Spans overlapping `[start, end]` of concrete type `T`.
    pub fn get_spans_of<T: Span>(&self, start: usize, end: usize) -> Vec<Rc<T>> {
        self.spans(start, end, &SpanFilter::of::<T>())
            .iter()
            .filter_map(SpanRef::downcast::<T>)
            .collect()
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        self.spans.check_invariants(self.gap())
    }
}

impl From<&str> for SpannedText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SpannedText {
    fn from(text: String) -> Self {
        Self::new(&text)
    }
}

impl CharSequence for SpannedText {
    fn len(&self) -> usize {
        self.chars.len()
    }

    fn char_at(&self, index: usize) -> Result<char, Error> {
        self.chars.as_slice().char_at(index)
    }

    fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        self.chars.as_slice().get_chars(start, end, dest, dest_offset)
    }

    fn as_spanned(&self) -> Option<&dyn Spanned> {
        Some(self)
    }
}

impl Spanned for SpannedText {
    fn span_start(&self, span: &SpanRef) -> Option<usize> {
        self.spans.index_of(span).map(|i| self.spans.start(i))
    }

    fn span_end(&self, span: &SpanRef) -> Option<usize> {
        self.spans.index_of(span).map(|i| self.spans.end(i))
    }

    fn span_flags(&self, span: &SpanRef) -> Option<SpanFlags> {
        self.spans.index_of(span).map(|i| self.spans.flags(i))
    }

    fn spans(&self, start: usize, end: usize, filter: &SpanFilter<'_>) -> Vec<SpanRef> {
        self.spans.query(self.gap(), start, end, filter, false)
    }

    fn next_span_transition(&self, start: usize, limit: usize, filter: &SpanFilter<'_>) -> usize {
        self.spans.next_transition(self.gap(), start, limit, filter)
    }
}

impl fmt::Display for SpannedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in &self.chars {
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}
