// Chunk: docs/chunks/gap_buffer - Gap buffer character storage

//! Gap buffer implementation for efficient text editing.
//!
//! A gap buffer is a character array with a movable gap. Edits at the gap are
//! O(1); moving the gap is O(distance) but amortizes well because edits are
//! usually local. Growth is geometric and always leaves at least one free
//! slot, so typing N characters one by one costs O(N) copies in total.

use crate::error::{check_range, Error};

/// Smallest backing store handed out by [`grow_size`].
const MIN_CAPACITY: usize = 8;
const GAP_GROWTH_FACTOR: usize = 2;

/// Capacity to allocate for a text that needs `size` characters.
///
/// Always strictly greater than `size`, so the gap never closes.
pub(crate) fn grow_size(size: usize) -> usize {
    if size <= 4 {
        MIN_CAPACITY
    } else {
        size * GAP_GROWTH_FACTOR
    }
}

/// Location of the gap in physical coordinates.
///
/// Span offsets are stored physically: a logical offset `o` is stored as `o`
/// when it sits before the gap and as `o + len` after it. An offset equal to
/// `start` may be stored either way, which is how MARK and POINT endpoints
/// sitting exactly at the gap are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Gap {
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl Gap {
    /// The gap of a frozen text: empty and parked at the end.
    pub(crate) fn closed_at(len: usize) -> Self {
        Self { start: len, len: 0 }
    }

    /// First physical index after the gap.
    pub(crate) fn end(self) -> usize {
        self.start + self.len
    }

    /// Converts a stored physical offset back to a logical one.
    #[inline]
    pub(crate) fn resolve(self, physical: usize) -> usize {
        if physical > self.start {
            physical - self.len
        } else {
            physical
        }
    }
}

/// A gap buffer for efficient text storage and manipulation.
///
/// The buffer stores characters with a "gap" - an empty region that can be moved
/// to any position. Operations at the gap position are O(1), making it ideal for
/// text editing where insertions and deletions are localized.
#[derive(Debug, Clone)]
pub struct GapBuffer {
    /// The underlying storage. Contains [pre-gap content | gap | post-gap content].
    data: Vec<char>,
    /// Index where the gap starts (first unused position).
    gap_start: usize,
    /// Index where the gap ends (first used position after gap).
    gap_end: usize,
    /// Characters physically copied by gap moves and growth.
    copied: usize,
}

impl GapBuffer {
    /// Creates a new empty gap buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty gap buffer able to hold at least `capacity` characters
    /// before it has to grow.
    pub fn with_capacity(capacity: usize) -> Self {
        let size = grow_size(capacity);
        Self {
            data: vec!['\0'; size],
            gap_start: 0,
            gap_end: size,
            copied: 0,
        }
    }

    /// Creates a gap buffer initialized with the given text.
    ///
    /// Note: We don't implement `FromStr` because it requires returning `Result`,
    /// but building a buffer from a string cannot fail.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self::from_chars(&chars)
    }

    /// Creates a gap buffer holding a copy of `chars`, with the gap at the end.
    pub fn from_chars(chars: &[char]) -> Self {
        let len = chars.len();
        let capacity = grow_size(len);

        let mut data = Vec::with_capacity(capacity);
        data.extend_from_slice(chars);
        data.resize(capacity, '\0');

        Self {
            data,
            gap_start: len,
            gap_end: capacity,
            copied: 0,
        }
    }

    /// Returns the logical length of the buffer (excluding the gap).
    pub fn len(&self) -> usize {
        self.data.len() - self.gap_len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the physical size of the backing store.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the current gap size.
    fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Returns the current gap position in logical coordinates.
    pub fn gap_position(&self) -> usize {
        self.gap_start
    }

    pub(crate) fn gap(&self) -> Gap {
        Gap {
            start: self.gap_start,
            len: self.gap_len(),
        }
    }

    /// Total number of characters copied by gap moves and growth so far.
    pub fn copied_chars(&self) -> usize {
        self.copied
    }

    /// Moves the gap to the specified logical position.
    ///
    /// This is O(distance) where distance is the absolute difference between
    /// the current gap position and the target position.
    pub fn move_gap_to(&mut self, pos: usize) {
        let pos = pos.min(self.len());

        if pos < self.gap_start {
            // Move gap left: shift content from [pos..gap_start] to [gap_end - shift..gap_end]
            let shift = self.gap_start - pos;
            self.data.copy_within(pos..self.gap_start, self.gap_end - shift);
            self.gap_start = pos;
            self.gap_end -= shift;
            self.copied += shift;
        } else if pos > self.gap_start {
            // Move gap right: shift content from [gap_end..gap_end + shift] to [gap_start..]
            let shift = pos - self.gap_start;
            self.data.copy_within(self.gap_end..self.gap_end + shift, self.gap_start);
            self.gap_start += shift;
            self.gap_end += shift;
            self.copied += shift;
        }
    }

    /// Grows the backing store so that a text of `size` characters fits with
    /// at least one free slot left over.
    ///
    /// The gap stays where `move_gap_to` left it; only its length changes.
    /// Returns how much the gap grew, which is also how far every physical
    /// offset past the gap moved.
    pub fn resize_for(&mut self, size: usize) -> usize {
        let old_len = self.data.len();
        if size < old_len {
            return 0;
        }

        let new_len = grow_size(size);
        let post_gap_len = old_len - self.gap_end;

        // Grow in place, then slide the post-gap content to the new end.
        self.data.resize(new_len, '\0');
        if post_gap_len > 0 {
            self.data
                .copy_within(self.gap_end..old_len, new_len - post_gap_len);
        }

        let delta = new_len - old_len;
        self.gap_end += delta;
        self.copied += self.gap_start + post_gap_len;
        tracing::trace!(old_len, new_len, gap_start = self.gap_start, "gap buffer grew");
        delta
    }

    /// Overwrites the logical range `[start, gap_position)` with `chars`.
    ///
    /// The gap must already sit at the end of the replaced range and be large
    /// enough (see [`resize_for`](Self::resize_for)) to absorb the growth.
    pub(crate) fn replace_before_gap(&mut self, start: usize, chars: &[char]) {
        debug_assert!(start <= self.gap_start, "replaced range must end at the gap");
        let new_gap_start = start + chars.len();
        debug_assert!(new_gap_start < self.gap_end, "gap must keep one free slot");
        self.data[start..new_gap_start].copy_from_slice(chars);
        self.gap_start = new_gap_start;
    }

    /// Replaces the logical range `[start, end)` with `chars`.
    pub fn replace(&mut self, start: usize, end: usize, chars: &[char]) -> Result<(), Error> {
        check_range("replace", start, end, self.len())?;
        self.move_gap_to(end);
        let new_len = self.len() - (end - start) + chars.len();
        self.resize_for(new_len);
        self.replace_before_gap(start, chars);
        Ok(())
    }

    /// Returns the character at the given logical position.
    pub fn char_at(&self, pos: usize) -> Result<char, Error> {
        if pos >= self.len() {
            return Err(Error::IndexOutOfRange {
                index: pos,
                len: self.len(),
            });
        }
        let physical = if pos < self.gap_start {
            pos
        } else {
            pos + self.gap_len()
        };
        Ok(self.data[physical])
    }

    /// The two physical slices making up the logical range `[start, end)`.
    ///
    /// The second slice is empty unless the range straddles the gap.
    fn segments(&self, start: usize, end: usize) -> (&[char], &[char]) {
        let gap_len = self.gap_len();
        if end <= self.gap_start {
            (&self.data[start..end], &[])
        } else if start >= self.gap_start {
            (&self.data[start + gap_len..end + gap_len], &[])
        } else {
            (
                &self.data[start..self.gap_start],
                &self.data[self.gap_end..end + gap_len],
            )
        }
    }

    /// Copies the logical range `[start, end)` into `dest` at `dest_offset`.
    pub fn get_chars(
        &self,
        start: usize,
        end: usize,
        dest: &mut [char],
        dest_offset: usize,
    ) -> Result<(), Error> {
        check_range("get_chars", start, end, self.len())?;
        let count = end - start;
        check_range("get_chars", dest_offset, dest_offset + count, dest.len())?;

        let (head, tail) = self.segments(start, end);
        dest[dest_offset..dest_offset + head.len()].copy_from_slice(head);
        dest[dest_offset + head.len()..dest_offset + count].copy_from_slice(tail);
        Ok(())
    }

    /// Returns an iterator over all characters in the buffer.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.data[..self.gap_start]
            .iter()
            .chain(self.data[self.gap_end..].iter())
            .copied()
    }

    /// Returns the content of a range as a String.
    ///
    /// The range is in logical coordinates and clamped to the buffer.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let start = start.min(self.len());
        let end = end.min(self.len());
        if start >= end {
            return String::new();
        }

        let (head, tail) = self.segments(start, end);
        head.iter().chain(tail.iter()).collect()
    }
}

impl Default for GapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GapBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for ch in self.chars() {
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_empty() {
        let buf = GapBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn test_from_str() {
        let buf = GapBuffer::from_str("hello");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.to_string(), "hello");
        assert_eq!(buf.capacity(), 10);
        assert_eq!(buf.gap_position(), 5);
    }

    #[test]
    fn test_grow_size_never_closes_gap() {
        for size in 0..100 {
            assert!(grow_size(size) > size, "grow_size({size}) must leave a free slot");
        }
    }

    #[test]
    fn test_replace_insert_in_middle() {
        let mut buf = GapBuffer::from_str("ac");
        buf.replace(1, 1, &['b']).unwrap();
        assert_eq!(buf.to_string(), "abc");
        assert_eq!(buf.gap_position(), 2);
    }

    #[test]
    fn test_replace_delete() {
        let mut buf = GapBuffer::from_str("abcdef");
        buf.replace(1, 4, &[]).unwrap();
        assert_eq!(buf.to_string(), "aef");
    }

    #[test]
    fn test_replace_shrink_and_grow() {
        let mut buf = GapBuffer::from_str("hello world");
        buf.replace(0, 5, &['h', 'i']).unwrap();
        assert_eq!(buf.to_string(), "hi world");
        let long: Vec<char> = "everyone in the whole wide".chars().collect();
        buf.replace(3, 8, &long).unwrap();
        assert_eq!(buf.to_string(), "hi everyone in the whole wide");
    }

    #[test]
    fn test_replace_rejects_bad_range() {
        let mut buf = GapBuffer::from_str("abc");
        assert!(matches!(
            buf.replace(2, 1, &[]),
            Err(Error::RangeReversed { .. })
        ));
        assert!(matches!(
            buf.replace(0, 4, &[]),
            Err(Error::RangeOutOfBounds { .. })
        ));
        assert_eq!(buf.to_string(), "abc");
    }

    #[test]
    fn test_move_gap() {
        let mut buf = GapBuffer::from_str("abcdef");
        assert_eq!(buf.gap_position(), 6);

        buf.move_gap_to(3);
        assert_eq!(buf.gap_position(), 3);
        assert_eq!(buf.to_string(), "abcdef");

        buf.move_gap_to(0);
        assert_eq!(buf.gap_position(), 0);
        assert_eq!(buf.to_string(), "abcdef");

        buf.move_gap_to(6);
        assert_eq!(buf.gap_position(), 6);
        assert_eq!(buf.to_string(), "abcdef");
    }

    #[test]
    fn test_move_gap_counts_copies() {
        let mut buf = GapBuffer::from_str("abcdef");
        buf.move_gap_to(2);
        assert_eq!(buf.copied_chars(), 4);
        buf.move_gap_to(5);
        assert_eq!(buf.copied_chars(), 7);
    }

    #[test]
    fn test_resize_preserves_gap_position() {
        let mut buf = GapBuffer::from_str("abcdef");
        buf.move_gap_to(3);
        let before = buf.capacity();
        let delta = buf.resize_for(before);
        assert!(delta > 0);
        assert_eq!(buf.capacity(), before + delta);
        assert_eq!(buf.gap_position(), 3);
        assert_eq!(buf.to_string(), "abcdef");
    }

    #[test]
    fn test_resize_noop_when_room_left() {
        let mut buf = GapBuffer::from_str("abc");
        assert_eq!(buf.resize_for(5), 0);
    }

    #[test]
    fn test_char_at() {
        let buf = GapBuffer::from_str("hello");
        assert_eq!(buf.char_at(0), Ok('h'));
        assert_eq!(buf.char_at(4), Ok('o'));
        assert_eq!(
            buf.char_at(5),
            Err(Error::IndexOutOfRange { index: 5, len: 5 })
        );
    }

    #[test]
    fn test_char_at_with_gap_in_middle() {
        let mut buf = GapBuffer::from_str("hello");
        buf.move_gap_to(2);
        let collected: String = (0..5).map(|i| buf.char_at(i).unwrap()).collect();
        assert_eq!(collected, "hello");
    }

    #[test]
    fn test_get_chars_straddles_gap() {
        let mut buf = GapBuffer::from_str("hello world");
        buf.move_gap_to(4);
        let mut dest = ['_'; 9];
        buf.get_chars(2, 9, &mut dest, 1).unwrap();
        assert_eq!(dest.iter().collect::<String>(), "_llo wor_");
    }

    #[test]
    fn test_get_chars_rejects_small_dest() {
        let buf = GapBuffer::from_str("hello");
        let mut dest = ['_'; 2];
        assert!(matches!(
            buf.get_chars(0, 3, &mut dest, 0),
            Err(Error::RangeOutOfBounds { .. })
        ));
        assert!(matches!(
            buf.get_chars(3, 1, &mut dest, 0),
            Err(Error::RangeReversed { .. })
        ));
    }

    #[test]
    fn test_slice() {
        let mut buf = GapBuffer::from_str("hello world");
        assert_eq!(buf.slice(0, 5), "hello");
        buf.move_gap_to(7);
        assert_eq!(buf.slice(6, 11), "world");
        assert_eq!(buf.slice(0, 11), "hello world");
        assert_eq!(buf.slice(9, 40), "ld");
    }

    #[test]
    fn test_large_insert() {
        let mut buf = GapBuffer::new();
        for i in 0..1000 {
            let ch = char::from_u32('a' as u32 + (i % 26) as u32).unwrap();
            let end = buf.len();
            buf.replace(end, end, &[ch]).unwrap();
        }
        assert_eq!(buf.len(), 1000);
        assert!(buf.capacity() > 1000);
    }
}
