// Chunk: docs/chunks/gap_buffer - Gap buffer character storage
// Chunk: docs/chunks/span_table - Span storage with implicit interval tree
// Chunk: docs/chunks/mutation_engine - Replace protocol and span adjustment
// Chunk: docs/chunks/change_notifier - Text and span watcher dispatch
// Chunk: docs/chunks/spanned_text - Read-only text and span views

//! spannable-buffer: mutable text with attached, overlapping spans.
//!
//! The main type is [`SpannableBuffer`], which provides:
//! - Text storage in a gap buffer, cheap to edit near the last edit
//! - Spans attached to arbitrary ranges, kept in an interval index
//! - Span endpoints that move with edits according to their [`SpanFlags`]
//! - Text and span watchers notified around every edit
//!
//! # Example
//!
//! ```
//! use spannable_buffer::{Span, SpanFlags, SpanRef, SpannableBuffer};
//!
//! #[derive(Debug)]
//! struct Bold;
//! impl Span for Bold {}
//!
//! let mut buffer = SpannableBuffer::from_text("Hello World");
//! let bold = SpanRef::new(Bold);
//! buffer.set_span(bold.clone(), 0, 5, SpanFlags::EXCLUSIVE_EXCLUSIVE).unwrap();
//!
//! // An insertion at the exclusive end stays outside the span.
//! buffer.replace(5, 6, " - ").unwrap();
//! assert_eq!(buffer.to_string(), "Hello - World");
//! assert_eq!(buffer.span_start(&bold), Some(0));
//! assert_eq!(buffer.span_end(&bold), Some(5));
//! ```
//!
//! # Span boundaries
//!
//! Each endpoint of a span is one of:
//!
//! - `MARK` - text inserted exactly at the endpoint goes after it
//! - `POINT` - text inserted exactly at the endpoint goes before it
//! - `PARAGRAPH` - the endpoint must sit on a paragraph boundary. It acts
//!   like `MARK`, except at the very end of the text where inserted text
//!   goes before it. It is pushed to the next boundary when its paragraph is
//!   rewritten

mod error;
mod filter;
mod gap_buffer;
mod notify;
mod selection;
mod span;
mod span_table;
mod spannable_buffer;
mod text;

pub use error::{Endpoint, Error};
pub use filter::{AllCaps, InputFilter, LengthFilter};
pub use gap_buffer::GapBuffer;
pub use notify::{SpanWatcher, TextWatcher};
pub use selection::{SelectionEnd, SelectionStart};
pub use span::{Boundary, Span, SpanFilter, SpanFlags, SpanRef};
pub use spannable_buffer::SpannableBuffer;
pub use text::{CharSequence, Spanned, SpannedText};
