// Chunk: docs/chunks/mutation_engine - Replace protocol and span adjustment

//! Input filters: rewrite replacement text before an edit touches the buffer.
//!
//! Filters run in registration order inside
//! [`SpannableBuffer::replace_range`], each seeing the previous filter's
//! output.

use crate::text::{CharSequence, SpannedText};
use crate::SpannableBuffer;

/// Rewrites text about to replace `dest[dest_start..dest_end]`.
pub trait InputFilter {
    /// Returns the text to insert instead of `source[start..end]`, or `None`
    /// to keep it unchanged.
    fn filter(
        &self,
        source: &dyn CharSequence,
        start: usize,
        end: usize,
        dest: &SpannableBuffer,
        dest_start: usize,
        dest_end: usize,
    ) -> Option<SpannedText>;
}

/// Caps the buffer length, truncating replacements that would exceed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthFilter {
    max: usize,
}

impl LengthFilter {
    pub fn new(max: usize) -> Self {
        Self { max }
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

impl InputFilter for LengthFilter {
    fn filter(
        &self,
        source: &dyn CharSequence,
        start: usize,
        end: usize,
        dest: &SpannableBuffer,
        dest_start: usize,
        dest_end: usize,
    ) -> Option<SpannedText> {
        let surviving = dest.len() - (dest_end - dest_start);
        let keep = self.max.saturating_sub(surviving);
        if keep == 0 {
            Some(SpannedText::new(""))
        } else if keep >= end - start {
            None
        } else {
            SpannedText::copy_of(source, start, start + keep).ok()
        }
    }
}

/// Upper-cases inserted text, keeping its spans.
///
/// Characters whose upper case is more than one char are left alone so span
/// offsets stay valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllCaps;

impl InputFilter for AllCaps {
    fn filter(
        &self,
        source: &dyn CharSequence,
        start: usize,
        end: usize,
        _dest: &SpannableBuffer,
        _dest_start: usize,
        _dest_end: usize,
    ) -> Option<SpannedText> {
        let mut chars = vec!['\0'; end - start];
        source.get_chars(start, end, &mut chars, 0).ok()?;
        let mut changed = false;
        for ch in chars.iter_mut() {
            let mut upper = ch.to_uppercase();
            if let (Some(single), None) = (upper.next(), upper.next()) {
                changed |= single != *ch;
                *ch = single;
            }
        }
        if !changed {
            return None;
        }
        SpannedText::with_spans_of(chars, source.as_spanned(), start, end).ok()
    }
}
