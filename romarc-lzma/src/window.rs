//! Push-fed input window for the encoder.
//!
//! Input is appended with [`InputWindow::fill`] and consumed by the match
//! finder one position at a time. The window keeps `keep_size_before` bytes
//! of history behind the current position for back-references and requires
//! `keep_size_after` bytes ahead of it before the encoder may proceed, so
//! the coded output does not depend on how the input was split into chunks.
//!
//! Positions are logical `u32` counters starting at 1; the buffer index of a
//! position is `buffer_offset + pos` with wrapping arithmetic.

/// Sliding input buffer with history and lookahead reservations.
#[derive(Debug)]
pub struct InputWindow {
    buffer: Vec<u8>,
    /// Usable length; the buffer carries one extra byte past it.
    block_size: usize,
    buffer_offset: u32,
    pos: u32,
    stream_pos: u32,
    keep_size_before: u32,
    keep_size_after: u32,
    stream_end: bool,
}

impl InputWindow {
    /// Allocate a window holding `keep_size_before` bytes of history,
    /// `keep_size_after` bytes of lookahead and `reserve` bytes of slack.
    pub fn new(keep_size_before: u32, keep_size_after: u32, reserve: u32) -> Self {
        let block_size = keep_size_before as usize + keep_size_after as usize + reserve as usize;
        let mut window = Self {
            // One extra byte: the tree walk may peek one byte past the match limit.
            buffer: vec![0; block_size + 1],
            block_size,
            buffer_offset: 0,
            pos: 0,
            stream_pos: 0,
            keep_size_before,
            keep_size_after,
            stream_end: false,
        };
        window.init();
        window
    }

    /// Reset to an empty window positioned at 1.
    pub fn init(&mut self) {
        self.buffer_offset = 0;
        self.pos = 0;
        self.stream_pos = 0;
        self.stream_end = false;
        self.reduce_offsets(-1);
    }

    #[inline]
    fn index(&self, pos: u32) -> usize {
        self.buffer_offset.wrapping_add(pos) as usize
    }

    /// Buffer index of the current position.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.index(self.pos)
    }

    /// Current logical position.
    #[inline]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// The raw buffer, indexed through [`cursor`](Self::cursor).
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Append input. Returns the number of bytes accepted; zero means the
    /// window is full until the encoder advances.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        if self.stream_end || data.is_empty() {
            return 0;
        }

        if self.block_size - self.index(self.stream_pos) < data.len()
            && self.cursor() > self.keep_size_before as usize + 1
        {
            self.move_block();
        }

        let start = self.index(self.stream_pos);
        let n = data.len().min(self.block_size - start);
        self.buffer[start..start + n].copy_from_slice(&data[..n]);
        self.stream_pos += n as u32;
        n
    }

    /// Mark the end of input.
    pub fn finish(&mut self) {
        self.stream_end = true;
        // The byte past the data may be compared by the tree walk; pin it so
        // the result never depends on stale buffer contents.
        let end = self.index(self.stream_pos);
        self.buffer[end] = 0;
    }

    /// True while input is still open and less than the required lookahead is buffered.
    #[inline]
    pub fn is_data_starved(&self) -> bool {
        !self.stream_end && self.stream_pos - self.pos < self.keep_size_after
    }

    /// Drop history older than `keep_size_before` by sliding the live block to the front.
    fn move_block(&mut self) {
        let mut offset = self.cursor() - self.keep_size_before as usize;
        if offset > 0 {
            offset -= 1;
        }
        let end = self.index(self.stream_pos);
        self.buffer.copy_within(offset..end, 0);
        self.buffer_offset = self.buffer_offset.wrapping_sub(offset as u32);
    }

    /// Advance one position.
    #[inline]
    pub fn move_pos(&mut self) {
        self.pos += 1;
    }

    /// Byte at `index` relative to the current position.
    #[inline]
    pub fn byte_at(&self, index: i64) -> u8 {
        self.buffer[(self.cursor() as i64 + index) as usize]
    }

    /// Length of the match between the data at `index` and the data
    /// `distance + 1` bytes before it, capped at `limit` and at the buffered input.
    pub fn match_len(&self, index: i64, distance: u32, limit: u32) -> u32 {
        let start = self.cursor() as i64 + index;
        let available = (self.index(self.stream_pos) as i64 - start).max(0);
        let limit = (limit as i64).min(available) as usize;

        let cur = start as usize;
        let back = (start - distance as i64 - 1) as usize;
        self.buffer[cur..cur + limit]
            .iter()
            .zip(&self.buffer[back..back + limit])
            .take_while(|(a, b)| a == b)
            .count() as u32
    }

    /// Bytes buffered ahead of the current position.
    #[inline]
    pub fn available(&self) -> u32 {
        self.stream_pos - self.pos
    }

    /// Rebase logical positions by `sub_value` without moving data.
    pub fn reduce_offsets(&mut self, sub_value: i32) {
        self.buffer_offset = self.buffer_offset.wrapping_add(sub_value as u32);
        self.pos = self.pos.wrapping_sub(sub_value as u32);
        self.stream_pos = self.stream_pos.wrapping_sub(sub_value as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_position_one() {
        let window = InputWindow::new(16, 8, 8);
        assert_eq!(window.pos(), 1);
        assert_eq!(window.cursor(), 0);
        assert_eq!(window.available(), 0);
        assert!(window.is_data_starved());
    }

    #[test]
    fn test_fill_and_starvation() {
        let mut window = InputWindow::new(16, 8, 8);
        assert_eq!(window.fill(b"abcd"), 4);
        assert!(window.is_data_starved());
        assert_eq!(window.fill(b"efgh"), 4);
        assert!(!window.is_data_starved());

        let mut short = InputWindow::new(16, 8, 8);
        short.fill(b"ab");
        short.finish();
        assert!(!short.is_data_starved());
        assert_eq!(short.fill(b"more"), 0);
    }

    #[test]
    fn test_match_len() {
        let mut window = InputWindow::new(64, 8, 8);
        window.fill(b"abcabcabx");
        window.finish();
        for _ in 0..3 {
            window.move_pos();
        }
        // "abcabx" at offset 3 against "abcabc" three bytes back.
        assert_eq!(window.match_len(0, 2, 10), 5);
        assert_eq!(window.match_len(0, 2, 3), 3);
        assert_eq!(window.byte_at(-1), b'c');
        assert_eq!(window.byte_at(0), b'a');
    }

    #[test]
    fn test_match_len_clamped_to_input() {
        let mut window = InputWindow::new(64, 8, 8);
        window.fill(b"aaaaaa");
        window.finish();
        window.move_pos();
        assert_eq!(window.match_len(0, 0, 100), 5);
    }

    #[test]
    fn test_move_block_keeps_history() {
        let mut window = InputWindow::new(8, 4, 4);
        let data: Vec<u8> = (0..16).collect();
        assert_eq!(window.fill(&data), 16);
        for _ in 0..12 {
            window.move_pos();
        }
        // Buffer is full; the next fill slides the live block to the front.
        assert_eq!(window.fill(&[100, 101, 102]), 3);
        assert_eq!(window.byte_at(0), 12);
        assert_eq!(window.byte_at(-8), 4);
        assert_eq!(window.available(), 7);
        assert_eq!(window.byte_at(6), 102);
    }

    #[test]
    fn test_reduce_offsets() {
        let mut window = InputWindow::new(16, 4, 4);
        window.fill(b"xyz");
        window.move_pos();
        let cursor = window.cursor();
        window.reduce_offsets(1);
        assert_eq!(window.pos(), 1);
        assert_eq!(window.cursor(), cursor);
        assert_eq!(window.available(), 2);
    }
}
