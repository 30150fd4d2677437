// Chunk: docs/chunks/change_notifier - Text and span watcher dispatch

//! Change notification for [`SpannableBuffer`].
//!
//! Watchers are ordinary spans: a span object that answers
//! [`Span::as_text_watcher`](crate::Span::as_text_watcher) or
//! [`Span::as_span_watcher`](crate::Span::as_span_watcher) is found by the
//! same overlap queries as any other span. A single `replace` notifies in
//! this order:
//!
//! 1. `before_text_changed` to text watchers over the edited range
//! 2. `on_text_changed`, then `after_text_changed`, to the same watchers
//! 3. `on_span_removed` for spans the edit collapsed
//! 4. `on_span_changed` for spans whose bounds moved
//! 5. `on_span_added` for spans copied in with the replacement
//!
//! Span events are computed before any text watcher runs, so a watcher that
//! edits the buffer from a callback cannot corrupt the pending events.
//!
//! Every watcher callback, text or span, runs with
//! [`SpannableBuffer::callback_depth`] raised by one.

use crate::span::{SpanFilter, SpanRef};
use crate::span_table::{overlaps, EditMarks, RemovedSpan};
use crate::SpannableBuffer;

/// Receives notifications about text edits.
///
/// A text watcher attached over `[s, e]` hears about every replace whose
/// range `[start, start + before]` overlaps it.
pub trait TextWatcher {
    /// `count` chars at `start` are about to be replaced by `after` chars.
    fn before_text_changed(
        &self,
        _text: &SpannableBuffer,
        _start: usize,
        _count: usize,
        _after: usize,
    ) {
    }

    /// `before` chars at `start` were replaced by `count` chars.
    fn on_text_changed(
        &self,
        _text: &SpannableBuffer,
        _start: usize,
        _before: usize,
        _count: usize,
    ) {
    }

    /// The edit is complete. The buffer may be edited again from here.
    fn after_text_changed(&self, _text: &mut SpannableBuffer) {}
}

/// Receives notifications about spans being attached, moved or detached.
pub trait SpanWatcher {
    fn on_span_added(
        &self,
        _text: &mut SpannableBuffer,
        _span: &SpanRef,
        _start: usize,
        _end: usize,
    ) {
    }

    fn on_span_removed(
        &self,
        _text: &mut SpannableBuffer,
        _span: &SpanRef,
        _start: usize,
        _end: usize,
    ) {
    }

    #[allow(clippy::too_many_arguments)]
    fn on_span_changed(
        &self,
        _text: &mut SpannableBuffer,
        _span: &SpanRef,
        _old_start: usize,
        _old_end: usize,
        _new_start: usize,
        _new_end: usize,
    ) {
    }
}

/// A span notification waiting to be delivered.
#[derive(Debug, Clone)]
pub(crate) enum SpanEvent {
    Removed {
        span: SpanRef,
        start: usize,
        end: usize,
    },
    Changed {
        span: SpanRef,
        old_start: usize,
        old_end: usize,
        new_start: usize,
        new_end: usize,
    },
    Added {
        span: SpanRef,
        start: usize,
        end: usize,
    },
}

impl SpannableBuffer {
    // ==================== Text watchers ====================

    pub(crate) fn send_before_text_changed(
        &mut self,
        watchers: &[SpanRef],
        start: usize,
        before: usize,
        after: usize,
    ) {
        for watcher in watchers {
            if let Some(w) = watcher.as_text_watcher() {
                self.callback_depth += 1;
                w.before_text_changed(self, start, before, after);
                self.callback_depth -= 1;
            }
        }
    }

    pub(crate) fn send_text_changed(
        &mut self,
        watchers: &[SpanRef],
        start: usize,
        before: usize,
        after: usize,
    ) {
        for watcher in watchers {
            if let Some(w) = watcher.as_text_watcher() {
                self.callback_depth += 1;
                w.on_text_changed(self, start, before, after);
                self.callback_depth -= 1;
            }
        }
    }

    pub(crate) fn send_after_text_changed(&mut self, watchers: &[SpanRef]) {
        for watcher in watchers {
            if let Some(w) = watcher.as_text_watcher() {
                self.callback_depth += 1;
                w.after_text_changed(self);
                self.callback_depth -= 1;
            }
        }
    }

    // ==================== Span watchers ====================

    /// Span watchers overlapping `[start, end]`, clamped to the current text.
    fn span_watchers(&self, start: usize, end: usize) -> Vec<SpanRef> {
        let len = self.len();
        let end = end.min(len);
        self.get_spans(start.min(end), end, &SpanFilter::SpanWatchers)
    }

    pub(crate) fn send_span_added(&mut self, span: &SpanRef, start: usize, end: usize) {
        for watcher in self.span_watchers(start, end) {
            if let Some(w) = watcher.as_span_watcher() {
                self.callback_depth += 1;
                w.on_span_added(self, span, start, end);
                self.callback_depth -= 1;
            }
        }
    }

    pub(crate) fn send_span_removed(&mut self, span: &SpanRef, start: usize, end: usize) {
        for watcher in self.span_watchers(start, end) {
            if let Some(w) = watcher.as_span_watcher() {
                self.callback_depth += 1;
                w.on_span_removed(self, span, start, end);
                self.callback_depth -= 1;
            }
        }
    }

    pub(crate) fn send_span_changed(
        &mut self,
        span: &SpanRef,
        old_start: usize,
        old_end: usize,
        new_start: usize,
        new_end: usize,
    ) {
        let watchers = self.span_watchers(old_start.min(new_start), old_end.max(new_end));
        for watcher in watchers {
            if let Some(w) = watcher.as_span_watcher() {
                self.callback_depth += 1;
                w.on_span_changed(self, span, old_start, old_end, new_start, new_end);
                self.callback_depth -= 1;
            }
        }
    }

    /// Works out which spans an edit of `[start, end)` into `new_len` chars
    /// moved or added, and clears the edit bookkeeping.
    ///
    /// A span endpoint counts as moved when it lies after the edit and the
    /// length changed, or inside the edited range, except when it sat
    /// exactly on an edit boundary before the edit and is still there.
    pub(crate) fn collect_span_events(
        &mut self,
        removed: Vec<RemovedSpan>,
        start: usize,
        end: usize,
        new_len: usize,
    ) -> Vec<SpanEvent> {
        let gap = self.text.gap();
        let replace_end = start + new_len;
        let resized = new_len != end - start;

        let moved = |offset: usize, marks: EditMarks, at_start: EditMarks, at_end: EditMarks| {
            if offset > replace_end {
                resized
            } else {
                offset >= start
                    && !(offset == start && marks.contains(at_start))
                    && !(offset == replace_end && marks.contains(at_end))
            }
        };

        let mut events: Vec<SpanEvent> = removed
            .into_iter()
            .map(|r| SpanEvent::Removed {
                span: r.span,
                start: r.start,
                end: r.end,
            })
            .collect();

        let mut added = Vec::new();
        for i in 0..self.spans.len() {
            let state = self.spans.edit_state(i);
            let span = self.spans.span(i).clone();
            let new_start = gap.resolve(self.spans.start(i));
            let new_end = gap.resolve(self.spans.end(i));

            if state.marks.contains(EditMarks::ADDED) {
                added.push(SpanEvent::Added {
                    span,
                    start: new_start,
                    end: new_end,
                });
                continue;
            }

            let start_moved = moved(
                new_start,
                state.marks,
                EditMarks::START_AT_START,
                EditMarks::START_AT_END,
            );
            let end_moved = moved(
                new_end,
                state.marks,
                EditMarks::END_AT_START,
                EditMarks::END_AT_END,
            );
            if start_moved || end_moved {
                events.push(SpanEvent::Changed {
                    span,
                    old_start: state.old_start,
                    old_end: state.old_end,
                    new_start,
                    new_end,
                });
            }
        }
        events.extend(added);

        self.spans.reset_edit_states();
        events
    }

    pub(crate) fn dispatch_span_events(&mut self, events: Vec<SpanEvent>) {
        for event in events {
            match event {
                SpanEvent::Removed { span, start, end } => {
                    self.send_span_removed(&span, start, end)
                }
                SpanEvent::Changed {
                    span,
                    old_start,
                    old_end,
                    new_start,
                    new_end,
                } => self.send_span_changed(&span, old_start, old_end, new_start, new_end),
                SpanEvent::Added { span, start, end } => self.send_span_added(&span, start, end),
            }
        }
    }

    /// Notifies removal of every span dropped by `clear_spans`, last slot
    /// first. Each removal is heard by the span watchers in lower slots, the
    /// ones still attached at that point of a back-to-front teardown.
    pub(crate) fn notify_cleared(&mut self, removed: Vec<RemovedSpan>) {
        for i in (0..removed.len()).rev() {
            let target = &removed[i];
            let watchers: Vec<SpanRef> = removed[..i]
                .iter()
                .filter(|w| w.span.as_span_watcher().is_some())
                .filter(|w| overlaps(w.start, w.end, target.start, target.end))
                .map(|w| w.span.clone())
                .collect();
            for watcher in watchers {
                if let Some(w) = watcher.as_span_watcher() {
                    self.callback_depth += 1;
                    w.on_span_removed(self, &target.span, target.start, target.end);
                    self.callback_depth -= 1;
                }
            }
        }
    }
}
