// Chunk: docs/chunks/change_notifier - Text and span watcher dispatch

//! Integration tests for watcher notification order and content.

use spannable_buffer::{
    Span, SpanFlags, SpanRef, SpanWatcher, SpannableBuffer, TextWatcher,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
struct Bold;
impl Span for Bold {}

/// Records every callback it receives as a short string.
#[derive(Debug, Default)]
struct Recorder {
    log: RefCell<Vec<String>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        self.log.take()
    }

    fn push(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }
}

impl Span for Recorder {
    fn as_text_watcher(&self) -> Option<&dyn TextWatcher> {
        Some(self)
    }

    fn as_span_watcher(&self) -> Option<&dyn SpanWatcher> {
        Some(self)
    }
}

impl TextWatcher for Recorder {
    fn before_text_changed(
        &self,
        _text: &SpannableBuffer,
        start: usize,
        count: usize,
        after: usize,
    ) {
        self.push(format!("before {start} {count} {after}"));
    }

    fn on_text_changed(&self, _text: &SpannableBuffer, start: usize, before: usize, count: usize) {
        self.push(format!("text {start} {before} {count}"));
    }

    fn after_text_changed(&self, _text: &mut SpannableBuffer) {
        self.push("after".to_string());
    }
}

impl SpanWatcher for Recorder {
    fn on_span_added(
        &self,
        _text: &mut SpannableBuffer,
        _span: &SpanRef,
        start: usize,
        end: usize,
    ) {
        self.push(format!("added {start} {end}"));
    }

    fn on_span_removed(
        &self,
        _text: &mut SpannableBuffer,
        _span: &SpanRef,
        start: usize,
        end: usize,
    ) {
        self.push(format!("removed {start} {end}"));
    }

    fn on_span_changed(
        &self,
        _text: &mut SpannableBuffer,
        _span: &SpanRef,
        old_start: usize,
        old_end: usize,
        new_start: usize,
        new_end: usize,
    ) {
        self.push(format!("changed {old_start} {old_end} {new_start} {new_end}"));
    }
}

/// A buffer with a recorder watching all of it.
fn watched(text: &str) -> (SpannableBuffer, Rc<Recorder>) {
    let mut buf = SpannableBuffer::from_text(text);
    let recorder = Rc::new(Recorder::default());
    let len = buf.len();
    buf.set_span(SpanRef::from(recorder.clone()), 0, len, SpanFlags::INCLUSIVE_INCLUSIVE)
        .unwrap();
    recorder.take();
    (buf, recorder)
}

#[test]
fn test_replace_notifies_in_order() {
    let (mut buf, recorder) = watched("hello world");
    buf.set_span(SpanRef::new(Bold), 6, 11, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    let mut source = SpannableBuffer::from_text("big ");
    source
        .set_span(SpanRef::new(Bold), 0, 3, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    recorder.take();

    buf.insert(0, &source).unwrap();
    assert_eq!(buf.to_string(), "big hello world");
    assert_eq!(
        recorder.take(),
        vec![
            "before 0 0 4",
            "text 0 0 4",
            "after",
            "changed 0 11 0 15",
            "changed 6 11 10 15",
            "added 0 3",
        ]
    );
}

#[test]
fn test_removed_spans_report_pre_edit_bounds() {
    let (mut buf, recorder) = watched("hello world");
    buf.set_span(SpanRef::new(Bold), 6, 11, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    recorder.take();

    buf.delete(5, 11).unwrap();
    assert_eq!(buf.to_string(), "hello");
    assert_eq!(
        recorder.take(),
        vec![
            "before 5 6 0",
            "text 5 6 0",
            "after",
            "removed 6 11",
            "changed 0 11 0 5",
        ]
    );
}

#[test]
fn test_true_no_op_notifies_nobody() {
    let (mut buf, recorder) = watched("hello");
    buf.replace(3, 3, "").unwrap();
    assert!(recorder.take().is_empty());
}

#[test]
fn test_empty_replace_carrying_a_span_still_runs() {
    let (mut buf, recorder) = watched("hello");
    let mut source = SpannableBuffer::from_text("abc");
    let caret = SpanRef::new(Bold);
    source.set_span(caret.clone(), 1, 1, SpanFlags::MARK_POINT).unwrap();

    buf.replace_range(2, 2, &source, 1, 1).unwrap();
    assert_eq!(buf.to_string(), "hello");
    assert_eq!(buf.span_start(&caret), Some(2));
    assert_eq!(buf.span_end(&caret), Some(2));
    assert_eq!(
        recorder.take(),
        vec!["before 2 0 0", "text 2 0 0", "after", "added 2 2"]
    );
}

#[test]
fn test_text_watchers_only_hear_overlapping_edits() {
    let mut buf = SpannableBuffer::from_text("hello world");
    let recorder = Rc::new(Recorder::default());
    buf.set_span(SpanRef::from(recorder.clone()), 0, 3, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    recorder.take();

    buf.replace(6, 8, "W").unwrap();
    assert!(recorder.take().is_empty());

    buf.replace(1, 2, "E").unwrap();
    assert_eq!(recorder.take(), vec!["before 1 1 1", "text 1 1 1", "after"]);
}

#[test]
fn test_set_and_remove_span_notify_watchers() {
    let (mut buf, recorder) = watched("hello world");
    let bold = SpanRef::new(Bold);

    buf.set_span(bold.clone(), 2, 4, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    buf.set_span(bold.clone(), 3, 8, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    buf.remove_span(&bold);
    assert_eq!(recorder.take(), vec!["added 2 4", "changed 2 4 3 8", "removed 3 8"]);
}

#[test]
fn test_intermediate_removal_is_silent() {
    let (mut buf, recorder) = watched("hello world");
    let bold = SpanRef::new(Bold);
    buf.set_span(bold.clone(), 2, 4, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    recorder.take();

    buf.remove_span_with_flags(&bold, SpanFlags::INTERMEDIATE);
    assert!(recorder.take().is_empty());
    assert_eq!(buf.span_start(&bold), None);
}

#[test]
fn test_clear_spans_notifies_in_reverse_slot_order() {
    let (mut buf, recorder) = watched("hello world");
    buf.set_span(SpanRef::new(Bold), 2, 4, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    recorder.take();

    buf.clear_spans();
    assert_eq!(buf.span_count(), 0);
    // The recorder sits in the first slot, so it hears the other span go
    // and is gone itself by the time its own removal is reported.
    assert_eq!(recorder.take(), vec!["removed 2 4"]);
}

#[test]
fn test_spans_copied_in_miss_the_text_wave() {
    let (mut buf, recorder) = watched("hello");
    let late = Rc::new(Recorder::default());
    let mut source = SpannableBuffer::from_text("abc");
    source
        .set_span(SpanRef::from(late.clone()), 0, 3, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    late.take();

    buf.insert(2, &source).unwrap();
    assert_eq!(buf.to_string(), "heabcllo");
    let late_log = late.take();
    assert!(late_log
        .iter()
        .all(|e| !e.starts_with("before") && !e.starts_with("text") && e != "after"));
    assert!(recorder.take().starts_with(&["before 2 0 3".to_string()]));
}

/// Appends a '!' from its after-change callback until the text ends in one.
#[derive(Debug, Default)]
struct Exclaimer {
    depths: RefCell<Vec<usize>>,
}

impl Span for Exclaimer {
    fn as_text_watcher(&self) -> Option<&dyn TextWatcher> {
        Some(self)
    }
}

impl TextWatcher for Exclaimer {
    fn after_text_changed(&self, text: &mut SpannableBuffer) {
        if text.to_string().ends_with('!') {
            return;
        }
        self.depths.borrow_mut().push(text.callback_depth());
        text.append_char('!').unwrap();
    }
}

#[test]
fn test_watchers_may_edit_from_after_callback() {
    let mut buf = SpannableBuffer::from_text("hi");
    let exclaimer = Rc::new(Exclaimer::default());
    buf.set_span(SpanRef::from(exclaimer.clone()), 0, 2, SpanFlags::INCLUSIVE_INCLUSIVE)
        .unwrap();

    buf.append("x").unwrap();
    assert_eq!(buf.to_string(), "hix!");
    assert_eq!(*exclaimer.depths.borrow(), vec![1]);
    assert_eq!(buf.callback_depth(), 0);
    assert!(buf.check_invariants().is_ok());
}

/// Tags the text with a '!' whenever a span is attached, until it ends in one.
#[derive(Debug, Default)]
struct Tagger {
    depths: RefCell<Vec<usize>>,
}

impl Span for Tagger {
    fn as_span_watcher(&self) -> Option<&dyn SpanWatcher> {
        Some(self)
    }
}

impl SpanWatcher for Tagger {
    fn on_span_added(
        &self,
        text: &mut SpannableBuffer,
        _span: &SpanRef,
        _start: usize,
        _end: usize,
    ) {
        self.depths.borrow_mut().push(text.callback_depth());
        if !text.to_string().ends_with('!') {
            text.append_char('!').unwrap();
        }
    }
}

#[test]
fn test_span_watcher_callbacks_count_toward_depth() {
    let mut buf = SpannableBuffer::from_text("abc");
    let tagger = Rc::new(Tagger::default());
    buf.set_span(SpanRef::from(tagger.clone()), 0, 3, SpanFlags::INCLUSIVE_INCLUSIVE)
        .unwrap();
    assert_eq!(buf.to_string(), "abc!");
    assert_eq!(buf.callback_depth(), 0);

    tagger.depths.take();
    buf.set_span(SpanRef::new(Bold), 0, 1, SpanFlags::EXCLUSIVE_EXCLUSIVE)
        .unwrap();
    assert_eq!(buf.to_string(), "abc!");
    assert_eq!(*tagger.depths.borrow(), vec![1]);
    assert_eq!(buf.callback_depth(), 0);
    assert!(buf.check_invariants().is_ok());
}
