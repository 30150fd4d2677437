// Chunk: docs/chunks/span_table - Span storage with implicit interval tree

//! Span identities, boundary flags and query filters.
//!
//! A span is any object implementing [`Span`]. The buffer never owns the
//! object's meaning: it only stores a shared handle ([`SpanRef`]) and compares
//! handles by address, so the same allocation attached twice is one span.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitOr, Deref};
use std::rc::Rc;

use crate::notify::{SpanWatcher, TextWatcher};

/// An object that can be attached to a range of text.
///
/// Watchers are spans too: an object that wants edit callbacks returns
/// itself from [`as_text_watcher`](Span::as_text_watcher) or
/// [`as_span_watcher`](Span::as_span_watcher).
pub trait Span: Any + fmt::Debug {
    fn as_text_watcher(&self) -> Option<&dyn TextWatcher> {
        None
    }

    fn as_span_watcher(&self) -> Option<&dyn SpanWatcher> {
        None
    }

    /// Spans answering true are not carried along when text is copied.
    fn is_no_copy(&self) -> bool {
        false
    }
}

/// Shared handle to an attached span object, compared by address.
#[derive(Clone)]
pub struct SpanRef(Rc<dyn Span>);

impl SpanRef {
    pub fn new<T: Span>(span: T) -> Self {
        Self(Rc::new(span))
    }

    pub fn from_rc(rc: Rc<dyn Span>) -> Self {
        Self(rc)
    }

    pub fn as_rc(&self) -> &Rc<dyn Span> {
        &self.0
    }

    /// Returns true if the span object is a `T`.
    pub fn is<T: Span>(&self) -> bool {
        let any: &dyn Any = &*self.0;
        any.is::<T>()
    }

    /// Returns the span object as an `Rc<T>` if it is a `T`.
    pub fn downcast<T: Span>(&self) -> Option<Rc<T>> {
        let any: Rc<dyn Any> = self.0.clone();
        any.downcast::<T>().ok()
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl<T: Span> From<Rc<T>> for SpanRef {
    fn from(rc: Rc<T>) -> Self {
        Self(rc)
    }
}

impl Deref for SpanRef {
    type Target = dyn Span;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for SpanRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl Eq for SpanRef {}

impl Hash for SpanRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for SpanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:p}", self.0, self.addr())
    }
}

/// How one endpoint of a span reacts to text inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Stays before the inserted text.
    Mark,
    /// Moves after the inserted text.
    Point,
    /// Must sit at 0, at the text end or right after a `'\n'`.
    Paragraph,
}

impl Boundary {
    const fn code(self) -> u32 {
        match self {
            Boundary::Mark => 1,
            Boundary::Point => 2,
            Boundary::Paragraph => 3,
        }
    }

    const fn from_code(code: u32) -> Self {
        match code {
            2 => Boundary::Point,
            3 => Boundary::Paragraph,
            _ => Boundary::Mark,
        }
    }
}

/// Span flag word: start boundary, end boundary, informational bits and
/// priority.
///
/// Layout: bits 4-7 start boundary code, bits 0-3 end boundary code,
/// `0x100` composing, `0x200` intermediate, bits 16-23 priority.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpanFlags(u32);

impl SpanFlags {
    const START_SHIFT: u32 = 4;
    const START_MASK: u32 = 0xF0;
    const END_MASK: u32 = 0x0F;
    const BOUNDARY_MASK: u32 = Self::START_MASK | Self::END_MASK;
    const PRIORITY_SHIFT: u32 = 16;
    const PRIORITY_MASK: u32 = 0xFF << Self::PRIORITY_SHIFT;

    /// Inclusive start, exclusive end.
    pub const MARK_MARK: Self = Self(0x11);
    /// Inclusive start, inclusive end.
    pub const MARK_POINT: Self = Self(0x12);
    /// Exclusive start, exclusive end. Removed when its text is emptied.
    pub const POINT_MARK: Self = Self(0x21);
    /// Exclusive start, inclusive end.
    pub const POINT_POINT: Self = Self(0x22);
    pub const PARAGRAPH: Self = Self(0x33);

    pub const INCLUSIVE_EXCLUSIVE: Self = Self::MARK_MARK;
    pub const INCLUSIVE_INCLUSIVE: Self = Self::MARK_POINT;
    pub const EXCLUSIVE_EXCLUSIVE: Self = Self::POINT_MARK;
    pub const EXCLUSIVE_INCLUSIVE: Self = Self::POINT_POINT;

    /// Marks a span as owned by an in-progress composition.
    pub const COMPOSING: Self = Self(0x100);
    /// Suppresses the removal notification in
    /// [`remove_span_with_flags`](crate::SpannableBuffer::remove_span_with_flags).
    pub const INTERMEDIATE: Self = Self(0x200);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn new(start: Boundary, end: Boundary) -> Self {
        Self((start.code() << Self::START_SHIFT) | end.code())
    }

    pub const fn start_boundary(self) -> Boundary {
        Boundary::from_code((self.0 & Self::START_MASK) >> Self::START_SHIFT)
    }

    pub const fn end_boundary(self) -> Boundary {
        Boundary::from_code(self.0 & Self::END_MASK)
    }

    pub const fn with_priority(self, priority: u8) -> Self {
        Self((self.0 & !Self::PRIORITY_MASK) | ((priority as u32) << Self::PRIORITY_SHIFT))
    }

    pub const fn priority(self) -> u8 {
        ((self.0 & Self::PRIORITY_MASK) >> Self::PRIORITY_SHIFT) as u8
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Both endpoints exclusive: text inserted at either edge stays outside.
    pub const fn is_exclusive_exclusive(self) -> bool {
        self.0 & Self::BOUNDARY_MASK == Self::POINT_MARK.0
    }

    /// Both endpoints are PARAGRAPH.
    pub const fn is_paragraph(self) -> bool {
        self.0 & Self::PARAGRAPH.0 == Self::PARAGRAPH.0
    }

    /// Spans that disappear when every character they cover is replaced:
    /// exclusive-exclusive ones, and paragraph ones.
    pub(crate) const fn collapses_when_emptied(self) -> bool {
        self.0 & Self::POINT_MARK.0 == Self::POINT_MARK.0
    }

    /// A POINT start with a MARK end can only ever cover existing text;
    /// at zero length it would never be able to hold anything.
    pub(crate) fn is_degenerate_at(self, start: usize, end: usize) -> bool {
        start == end
            && self.start_boundary() == Boundary::Point
            && self.end_boundary() == Boundary::Mark
    }
}

impl BitOr for SpanFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for SpanFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanFlags({:#x})", self.0)
    }
}

/// Selects which spans a query returns.
#[derive(Clone, Copy)]
pub enum SpanFilter<'a> {
    All,
    /// Spans whose object is a [`TextWatcher`].
    TextWatchers,
    /// Spans whose object is a [`SpanWatcher`].
    SpanWatchers,
    /// Spans whose concrete type has this id; see [`SpanFilter::of`].
    Type(TypeId),
    Custom(&'a dyn Fn(&dyn Span) -> bool),
}

impl SpanFilter<'_> {
    /// Filter matching span objects of concrete type `T`.
    pub fn of<T: Span>() -> Self {
        SpanFilter::Type(TypeId::of::<T>())
    }

    pub fn matches(&self, span: &dyn Span) -> bool {
        match self {
            SpanFilter::All => true,
            SpanFilter::TextWatchers => span.as_text_watcher().is_some(),
            SpanFilter::SpanWatchers => span.as_span_watcher().is_some(),
            SpanFilter::Type(id) => {
                let any: &dyn Any = span;
                any.type_id() == *id
            }
            SpanFilter::Custom(pred) => pred(span),
        }
    }
}

impl fmt::Debug for SpanFilter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanFilter::All => f.write_str("All"),
            SpanFilter::TextWatchers => f.write_str("TextWatchers"),
            SpanFilter::SpanWatchers => f.write_str("SpanWatchers"),
            SpanFilter::Type(id) => f.debug_tuple("Type").field(id).finish(),
            SpanFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
