// Chunk: docs/chunks/span_table - Span storage with implicit interval tree

//! Span storage shared by [`SpannableBuffer`](crate::SpannableBuffer) and
//! [`SpannedText`](crate::SpannedText).
//!
//! Spans live in parallel vectors sorted by start offset. The vectors double
//! as an implicit balanced binary tree: index `i` is a node whose children
//! are found by bit arithmetic on `i`, and `max[i]` holds the largest end in
//! the subtree rooted at `i`. Overlap queries skip every subtree whose max
//! end lies before the query, giving O(log n + k) lookups with no pointers.
//!
//! Offsets are stored in physical (gap) coordinates, see [`Gap`]. Every
//! method reading them takes the owning text's current gap.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::error::{check_range, Endpoint, Error};
use crate::gap_buffer::Gap;
use crate::span::{Boundary, SpanFilter, SpanFlags, SpanRef};
use crate::text::CharSequence;

/// Character a PARAGRAPH endpoint must follow (unless at 0 or the text end).
pub(crate) const PARAGRAPH_SEPARATOR: char = '\n';

/// Transient per-span bits recorded while a single edit is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct EditMarks(u8);

impl EditMarks {
    /// Copied in from the replacement text.
    pub(crate) const ADDED: Self = Self(1 << 0);
    pub(crate) const START_AT_START: Self = Self(1 << 1);
    pub(crate) const START_AT_END: Self = Self(1 << 2);
    pub(crate) const END_AT_START: Self = Self(1 << 3);
    pub(crate) const END_AT_END: Self = Self(1 << 4);

    pub(crate) fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// Edit bookkeeping for one span: its marks and its logical bounds before
/// the edit started.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EditState {
    pub(crate) marks: EditMarks,
    pub(crate) old_start: usize,
    pub(crate) old_end: usize,
}

/// A span taken out of the table, with logical bounds.
#[derive(Debug, Clone)]
pub(crate) struct RemovedSpan {
    pub(crate) span: SpanRef,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

/// Result of storing a span record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    Added,
    /// The identity was already attached; carries its previous logical bounds.
    Updated { old_start: usize, old_end: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attach {
    Stored(Upsert),
    /// Dropped without error: a zero-length exclusive-exclusive span, or a
    /// misplaced PARAGRAPH span on a non-enforcing path.
    Skipped,
}

/// How strictly [`SpanTable::attach`] treats invalid spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttachMode {
    /// Caller-facing `set_span`: paragraph violations are errors and ignored
    /// degenerate spans are logged.
    Public,
    /// Internal re-bounding during an edit: paragraph violations are errors.
    Adjust,
    /// Copying spans out of another text: anything invalid is skipped.
    Copy,
}

#[inline]
fn left_child(i: usize) -> usize {
    i - (((i + 1) & !i) >> 1)
}

#[inline]
fn right_child(i: usize) -> usize {
    i + (((i + 1) & !i) >> 1)
}

/// Overlap rule for a span `[s, e]` against a query `[qs, qe]`.
///
/// Edge touches between two non-empty ranges do not count. A zero-length
/// span only matches a point query at the same offset, or a non-empty query
/// that strictly contains it.
pub(crate) fn overlaps(s: usize, e: usize, qs: usize, qe: usize) -> bool {
    match (s == e, qs == qe) {
        (true, true) => s == qs,
        (true, false) => qs < s && s < qe,
        (false, true) => s <= qs && qs <= e,
        (false, false) => s < qe && e > qs,
    }
}

pub(crate) fn is_paragraph_boundary(text: &dyn CharSequence, offset: usize) -> bool {
    offset == 0 || offset == text.len() || text.char_at(offset - 1) == Ok(PARAGRAPH_SEPARATOR)
}

/// Encodes a logical endpoint for storage.
///
/// An endpoint sitting exactly at the gap is stored after it when it must
/// follow text inserted there (POINT, or PARAGRAPH at the very end).
fn to_physical(gap: Gap, offset: usize, boundary: Boundary, text_len: usize) -> usize {
    if offset > gap.start {
        offset + gap.len
    } else if offset == gap.start
        && (boundary == Boundary::Point || (boundary == Boundary::Paragraph && offset == text_len))
    {
        offset + gap.len
    } else {
        offset
    }
}

/// Re-encodes a stored endpoint for a gap that moved from `old` to `to`.
fn relocated(old: Gap, physical: usize, to: usize, boundary: Boundary, at_end: bool) -> usize {
    let logical = old.resolve(physical);
    if logical > to
        || (logical == to
            && (boundary == Boundary::Point || (at_end && boundary == Boundary::Paragraph)))
    {
        logical + old.len
    } else {
        logical
    }
}

/// New stored position of an endpoint after `[start, end)` was overwritten
/// and the gap now starts right after the replacement.
fn updated_bound(
    gap: Gap,
    offset: usize,
    start: usize,
    end: usize,
    boundary: Boundary,
    at_end: bool,
    text_removed: bool,
) -> usize {
    if offset < start || offset >= gap.end() {
        return offset;
    }
    match boundary {
        Boundary::Point if text_removed || offset > start => gap.end(),
        Boundary::Paragraph if at_end => gap.end(),
        Boundary::Mark if text_removed || offset < end => start,
        Boundary::Mark => gap.start,
        _ => offset,
    }
}

/// Span records in parallel vectors, sorted by physical start.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpanTable {
    spans: Vec<SpanRef>,
    starts: Vec<usize>,
    ends: Vec<usize>,
    /// Max physical end per implicit tree node; sized for a perfect tree.
    max: Vec<usize>,
    flags: Vec<SpanFlags>,
    order: Vec<usize>,
    edits: Vec<EditState>,
    insert_count: usize,
    /// Lowest slot whose identity index entry may be stale.
    low_water_mark: usize,
    index: HashMap<SpanRef, usize>,
}

impl SpanTable {
    pub(crate) fn new() -> Self {
        Self {
            low_water_mark: usize::MAX,
            ..Self::default()
        }
    }

    // ==================== Accessors ====================

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub(crate) fn span(&self, i: usize) -> &SpanRef {
        &self.spans[i]
    }

    pub(crate) fn start(&self, i: usize) -> usize {
        self.starts[i]
    }

    pub(crate) fn end(&self, i: usize) -> usize {
        self.ends[i]
    }

    pub(crate) fn flags(&self, i: usize) -> SpanFlags {
        self.flags[i]
    }

    pub(crate) fn index_of(&self, span: &SpanRef) -> Option<usize> {
        self.index
            .get(span)
            .copied()
            .filter(|&i| self.spans.get(i) == Some(span))
    }

    pub(crate) fn edit_state(&self, i: usize) -> EditState {
        self.edits[i]
    }

    pub(crate) fn edit_state_mut(&mut self, i: usize) -> &mut EditState {
        &mut self.edits[i]
    }

    pub(crate) fn reset_edit_states(&mut self) {
        self.edits.fill(EditState::default());
    }

    // ==================== Insertion and removal ====================

    /// Validates and stores a span given in logical offsets.
    ///
    /// Invariants are not restored; callers batch that.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn attach(
        &mut self,
        text: &dyn CharSequence,
        gap: Gap,
        span: SpanRef,
        start: usize,
        end: usize,
        flags: SpanFlags,
        mode: AttachMode,
    ) -> Result<Attach, Error> {
        let len = text.len();
        check_range("set_span", start, end, len)?;

        let endpoints = [
            (Endpoint::Start, start, flags.start_boundary()),
            (Endpoint::End, end, flags.end_boundary()),
        ];
        for (endpoint, offset, boundary) in endpoints {
            if boundary == Boundary::Paragraph && !is_paragraph_boundary(text, offset) {
                if mode == AttachMode::Copy {
                    return Ok(Attach::Skipped);
                }
                return Err(Error::InvalidSpanRange { endpoint, offset });
            }
        }

        if flags.is_degenerate_at(start, end) {
            if mode == AttachMode::Public {
                tracing::warn!(
                    ?span,
                    offset = start,
                    "exclusive-exclusive span cannot have a zero length; ignored"
                );
            }
            return Ok(Attach::Skipped);
        }

        let pstart = to_physical(gap, start, flags.start_boundary(), len);
        let pend = to_physical(gap, end, flags.end_boundary(), len);
        Ok(Attach::Stored(self.upsert(gap, span, pstart, pend, flags)))
    }

    /// Stores a record at physical offsets, updating in place when the
    /// identity is already attached.
    fn upsert(
        &mut self,
        gap: Gap,
        span: SpanRef,
        start: usize,
        end: usize,
        flags: SpanFlags,
    ) -> Upsert {
        if let Some(i) = self.index_of(&span) {
            let old_start = gap.resolve(self.starts[i]);
            let old_end = gap.resolve(self.ends[i]);
            self.starts[i] = start;
            self.ends[i] = end;
            self.flags[i] = flags;
            return Upsert::Updated { old_start, old_end };
        }

        let i = self.spans.len();
        self.index.insert(span.clone(), i);
        self.spans.push(span);
        self.starts.push(start);
        self.ends.push(end);
        self.flags.push(flags);
        self.order.push(self.insert_count);
        self.edits.push(EditState::default());
        self.insert_count += 1;
        self.invalidate_index(i);

        let size_of_max = 2 * self.tree_root() + 1;
        if self.max.len() < size_of_max {
            self.max.resize(size_of_max, 0);
        }
        Upsert::Added
    }

    /// Removes slot `i`, compacting the arrays, and restores invariants.
    pub(crate) fn remove_at(&mut self, gap: Gap, i: usize) -> RemovedSpan {
        let span = self.spans.remove(i);
        let start = self.starts.remove(i);
        let end = self.ends.remove(i);
        self.flags.remove(i);
        self.order.remove(i);
        self.edits.remove(i);
        self.index.remove(&span);
        self.invalidate_index(i);
        self.restore_invariants();

        RemovedSpan {
            span,
            start: gap.resolve(start),
            end: gap.resolve(end),
        }
    }

    pub(crate) fn remove(&mut self, gap: Gap, span: &SpanRef) -> Option<RemovedSpan> {
        let i = self.index_of(span)?;
        Some(self.remove_at(gap, i))
    }

    /// Empties the table, returning every record in slot order, and resets
    /// the insertion counter.
    pub(crate) fn clear(&mut self, gap: Gap) -> Vec<RemovedSpan> {
        let removed = self
            .spans
            .drain(..)
            .zip(self.starts.drain(..).zip(self.ends.drain(..)))
            .map(|(span, (start, end))| RemovedSpan {
                span,
                start: gap.resolve(start),
                end: gap.resolve(end),
            })
            .collect();
        self.max.clear();
        self.flags.clear();
        self.order.clear();
        self.edits.clear();
        self.index.clear();
        self.insert_count = 0;
        self.low_water_mark = usize::MAX;
        removed
    }

    pub(crate) fn reset_insert_count(&mut self) {
        self.insert_count = 0;
    }

    // ==================== Invariants ====================

    fn tree_root(&self) -> usize {
        debug_assert!(!self.is_empty());
        (1usize << self.len().ilog2()) - 1
    }

    fn invalidate_index(&mut self, i: usize) {
        self.low_water_mark = self.low_water_mark.min(i);
    }

    fn calc_max(&mut self, i: usize) -> usize {
        let mut max = 0;
        if i & 1 != 0 {
            max = self.calc_max(left_child(i));
        }
        if i < self.len() {
            max = max.max(self.ends[i]);
            if i & 1 != 0 {
                max = max.max(self.calc_max(right_child(i)));
            }
        }
        self.max[i] = max;
        max
    }

    /// Re-sorts by start, recomputes subtree maxima and refreshes the
    /// identity index from the low-water mark.
    pub(crate) fn restore_invariants(&mut self) {
        if self.is_empty() {
            self.low_water_mark = usize::MAX;
            return;
        }

        // Localized insertion sort: edits usually disturb only a few slots.
        for i in 1..self.len() {
            if self.starts[i] >= self.starts[i - 1] {
                continue;
            }
            let start = self.starts[i];
            let mut j = i;
            while j > 0 && start < self.starts[j - 1] {
                j -= 1;
            }
            self.spans[j..=i].rotate_right(1);
            self.starts[j..=i].rotate_right(1);
            self.ends[j..=i].rotate_right(1);
            self.flags[j..=i].rotate_right(1);
            self.order[j..=i].rotate_right(1);
            self.edits[j..=i].rotate_right(1);
            self.invalidate_index(j);
        }

        let root = self.tree_root();
        self.calc_max(root);

        for i in self.low_water_mark..self.len() {
            if self.index.get(&self.spans[i]) != Some(&i) {
                self.index.insert(self.spans[i].clone(), i);
            }
        }
        self.low_water_mark = usize::MAX;
    }

    /// Checks sort order, start <= end, subtree maxima and the identity
    /// index, describing the first violation found.
    pub(crate) fn check_invariants(&self, gap: Gap) -> Result<(), String> {
        for i in 0..self.len() {
            if i > 0 && self.starts[i] < self.starts[i - 1] {
                return Err(format!(
                    "span {} starts at physical {} before span {} at {}",
                    i,
                    self.starts[i],
                    i - 1,
                    self.starts[i - 1]
                ));
            }
            let (s, e) = (gap.resolve(self.starts[i]), gap.resolve(self.ends[i]));
            if s > e {
                return Err(format!("span {} has start {} after end {}", i, s, e));
            }
            if self.index.get(&self.spans[i]) != Some(&i) {
                return Err(format!(
                    "identity index maps span {} to {:?}",
                    i,
                    self.index.get(&self.spans[i])
                ));
            }
        }
        if self.index.len() != self.len() {
            return Err(format!(
                "identity index has {} entries for {} spans",
                self.index.len(),
                self.len()
            ));
        }
        if !self.is_empty() {
            self.verify_max(self.tree_root())?;
        }
        Ok(())
    }

    fn verify_max(&self, i: usize) -> Result<usize, String> {
        let mut max = 0;
        if i & 1 != 0 {
            max = self.verify_max(left_child(i))?;
        }
        if i < self.len() {
            max = max.max(self.ends[i]);
            if i & 1 != 0 {
                max = max.max(self.verify_max(right_child(i))?);
            }
            if self.max[i] != max {
                return Err(format!(
                    "tree node {} holds max {} but its subtree ends at {}",
                    i, self.max[i], max
                ));
            }
        }
        Ok(max)
    }

    // ==================== Queries ====================

    /// Spans overlapping `[qs, qe]` and matching `filter`.
    ///
    /// With `sorted`, results are ordered by priority (highest first) then
    /// insertion order. Otherwise only priority is ordered and spans of
    /// equal priority keep tree order.
    pub(crate) fn query(
        &self,
        gap: Gap,
        qs: usize,
        qe: usize,
        filter: &SpanFilter<'_>,
        sorted: bool,
    ) -> Vec<SpanRef> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        self.collect_overlapping(gap, qs, qe, filter, self.tree_root(), &mut hits);

        if sorted {
            hits.sort_by_key(|&i| (Reverse(self.flags[i].priority()), self.order[i]));
        } else {
            hits.sort_by_key(|&i| Reverse(self.flags[i].priority()));
        }
        hits.into_iter().map(|i| self.spans[i].clone()).collect()
    }

    fn collect_overlapping(
        &self,
        gap: Gap,
        qs: usize,
        qe: usize,
        filter: &SpanFilter<'_>,
        i: usize,
        out: &mut Vec<usize>,
    ) {
        if i & 1 != 0 {
            let left = left_child(i);
            if gap.resolve(self.max[left]) >= qs {
                self.collect_overlapping(gap, qs, qe, filter, left, out);
            }
        }
        if i >= self.len() {
            return;
        }
        let start = gap.resolve(self.starts[i]);
        if start <= qe {
            let end = gap.resolve(self.ends[i]);
            if overlaps(start, end, qs, qe) && filter.matches(&*self.spans[i]) {
                out.push(i);
            }
            if i & 1 != 0 {
                self.collect_overlapping(gap, qs, qe, filter, right_child(i), out);
            }
        }
    }

    /// Smallest start or end of a matching span strictly inside
    /// `(start, limit)`, or `limit` when there is none.
    pub(crate) fn next_transition(
        &self,
        gap: Gap,
        start: usize,
        limit: usize,
        filter: &SpanFilter<'_>,
    ) -> usize {
        if self.is_empty() {
            return limit;
        }
        self.next_transition_rec(gap, start, limit, filter, self.tree_root())
    }

    fn next_transition_rec(
        &self,
        gap: Gap,
        start: usize,
        mut limit: usize,
        filter: &SpanFilter<'_>,
        i: usize,
    ) -> usize {
        if i & 1 != 0 {
            let left = left_child(i);
            if gap.resolve(self.max[left]) > start {
                limit = self.next_transition_rec(gap, start, limit, filter, left);
            }
        }
        if i < self.len() {
            let st = gap.resolve(self.starts[i]);
            let en = gap.resolve(self.ends[i]);
            let inside = |offset: usize, limit: usize| offset > start && offset < limit;
            if (inside(st, limit) || inside(en, limit)) && filter.matches(&*self.spans[i]) {
                if inside(st, limit) {
                    limit = st;
                }
                if inside(en, limit) {
                    limit = en;
                }
            }
            if st < limit && i & 1 != 0 {
                limit = self.next_transition_rec(gap, start, limit, filter, right_child(i));
            }
        }
        limit
    }

    // ==================== Edit support ====================

    /// Finds a span that the replacement of `[start, end)` would leave empty
    /// and that does not survive emptying. The gap must sit at `end`.
    pub(crate) fn find_collapsed(
        &self,
        gap: Gap,
        start: usize,
        end: usize,
        text_removed: bool,
    ) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        self.find_collapsed_rec(gap, start, end, text_removed, self.tree_root())
    }

    fn find_collapsed_rec(
        &self,
        gap: Gap,
        start: usize,
        end: usize,
        text_removed: bool,
        i: usize,
    ) -> Option<usize> {
        if i & 1 != 0 && gap.resolve(self.max[i]) >= start {
            let left = left_child(i);
            if let Some(found) = self.find_collapsed_rec(gap, start, end, text_removed, left) {
                return Some(found);
            }
        }
        if i >= self.len() {
            return None;
        }
        let (s, e) = (self.starts[i], self.ends[i]);
        if self.flags[i].collapses_when_emptied()
            && s >= start
            && s < gap.end()
            && e >= start
            && e < gap.end()
            && (text_removed || s > start || e < gap.start)
        {
            return Some(i);
        }
        if gap.resolve(s) <= end && i & 1 != 0 {
            return self.find_collapsed_rec(gap, start, end, text_removed, right_child(i));
        }
        None
    }

    /// Re-encodes every endpoint after the gap moved from `old` to logical
    /// offset `to`. `at_end` is true when `to` is the text end.
    pub(crate) fn relocate_gap(&mut self, old: Gap, to: usize, at_end: bool) {
        if self.is_empty() {
            return;
        }
        for i in 0..self.len() {
            let flags = self.flags[i];
            self.starts[i] = relocated(old, self.starts[i], to, flags.start_boundary(), at_end);
            self.ends[i] = relocated(old, self.ends[i], to, flags.end_boundary(), at_end);
        }
        // POINT and MARK endpoints at `to` may have swapped physical order.
        self.restore_invariants();
        tracing::trace!(from = old.start, to, spans = self.len(), "span offsets relocated");
    }

    /// Shifts endpoints stored past the gap after the backing store grew.
    pub(crate) fn shift_for_resize(&mut self, gap_start: usize, delta: usize) {
        if self.is_empty() || delta == 0 {
            return;
        }
        for offset in self.starts.iter_mut().chain(self.ends.iter_mut()) {
            if *offset > gap_start {
                *offset += delta;
            }
        }
        let root = self.tree_root();
        self.calc_max(root);
    }

    /// Moves endpoints that sat in the replaced range `[start, end)` once the
    /// replacement is written and `gap` starts right after it.
    pub(crate) fn adjust_after_replace(
        &mut self,
        gap: Gap,
        start: usize,
        end: usize,
        at_end: bool,
        text_removed: bool,
    ) {
        for i in 0..self.len() {
            let flags = self.flags[i];
            self.starts[i] = updated_bound(
                gap,
                self.starts[i],
                start,
                end,
                flags.start_boundary(),
                at_end,
                text_removed,
            );
            self.ends[i] = updated_bound(
                gap,
                self.ends[i],
                start,
                end,
                flags.end_boundary(),
                at_end,
                text_removed,
            );
        }
        self.restore_invariants();
    }
}
