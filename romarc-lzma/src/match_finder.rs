//! Binary-tree match finder.
//!
//! Every position is inserted into a binary search tree ordered by the bytes
//! that follow it. The tree for the current hash bucket is walked from the
//! most recent candidate towards older ones; each step both reports longer
//! matches and re-links the tree so the current position becomes its root.
//!
//! Two variants exist:
//! - **BT2**: the bucket is chosen by the first two bytes directly.
//! - **BT4**: the bucket is a CRC-mixed hash of four bytes, with auxiliary
//!   2- and 3-byte tables that report short matches cheaply.
//!
//! Tree nodes live in a cyclic `son` array of `2 * (dict_size + 1)` slots;
//! a stored position of 0 means "no entry", which is why window positions
//! start at 1.

use crate::options::MatchFinderKind;
use crate::window::InputWindow;
use log::trace;

const HASH2_SIZE: u32 = 1 << 10;
const HASH3_SIZE: u32 = 1 << 16;
const BT2_HASH_SIZE: u32 = 1 << 16;
const START_MAX_LEN: u32 = 1;
const HASH3_OFFSET: u32 = HASH2_SIZE;
const EMPTY_HASH_VALUE: u32 = 0;
const MAX_VAL_FOR_NORMALIZE: u32 = (1 << 31) - 1;

/// CRC-32 lookup table (polynomial 0xEDB88320, reflected), used for hash mixing.
const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// A match candidate: `len` bytes at zero-based `dist` (actual offset `dist + 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPair {
    /// Match length.
    pub len: u32,
    /// Zero-based distance.
    pub dist: u32,
}

/// Binary-tree match finder over an [`InputWindow`].
#[derive(Debug)]
pub struct BinTreeMatchFinder {
    window: InputWindow,
    kind: MatchFinderKind,
    cyclic_pos: u32,
    cyclic_size: u32,
    match_max_len: u32,
    son: Vec<u32>,
    hash: Vec<u32>,
    cut_value: u32,
    hash_mask: u32,
    fix_hash_size: u32,
    num_hash_direct_bytes: u32,
    min_match_check: u32,
}

impl BinTreeMatchFinder {
    /// Create a match finder for `history_size` bytes of history.
    ///
    /// `keep_before` and `keep_after` are extra reservations the encoder
    /// needs around the current position; `match_max_len` bounds reported
    /// match lengths.
    pub fn new(
        kind: MatchFinderKind,
        history_size: u32,
        keep_before: u32,
        match_max_len: u32,
        keep_after: u32,
    ) -> Self {
        let window_reserve =
            (history_size + keep_before + match_max_len + keep_after) / 2 + 256;
        let window = InputWindow::new(
            history_size + keep_before,
            match_max_len + keep_after,
            window_reserve,
        );

        let cyclic_size = history_size + 1;

        let (hash_size, hash_mask, fix_hash_size, num_hash_direct_bytes, min_match_check) =
            match kind {
                MatchFinderKind::Bt2 => (BT2_HASH_SIZE, BT2_HASH_SIZE - 1, 0, 2, 3),
                MatchFinderKind::Bt4 => {
                    let mut hs = history_size - 1;
                    hs |= hs >> 1;
                    hs |= hs >> 2;
                    hs |= hs >> 4;
                    hs |= hs >> 8;
                    hs >>= 1;
                    hs |= 0xFFFF;
                    if hs > (1 << 24) {
                        hs >>= 1;
                    }
                    (hs + 1, hs, HASH2_SIZE + HASH3_SIZE, 0, 4)
                }
            };

        trace!(
            "match finder {kind}: cyclic size {cyclic_size}, hash size {}",
            hash_size + fix_hash_size
        );

        Self {
            window,
            kind,
            cyclic_pos: 0,
            cyclic_size,
            match_max_len,
            son: vec![EMPTY_HASH_VALUE; cyclic_size as usize * 2],
            hash: vec![EMPTY_HASH_VALUE; (hash_size + fix_hash_size) as usize],
            cut_value: 16 + (match_max_len >> 1),
            hash_mask,
            fix_hash_size,
            num_hash_direct_bytes,
            min_match_check,
        }
    }

    /// Clear all state and restart at position 1.
    pub fn init(&mut self) {
        self.window.init();
        self.hash.fill(EMPTY_HASH_VALUE);
        self.cyclic_pos = 0;
    }

    /// Append input; see [`InputWindow::fill`].
    pub fn fill(&mut self, data: &[u8]) -> usize {
        self.window.fill(data)
    }

    /// Mark the end of input.
    pub fn finish(&mut self) {
        self.window.finish();
    }

    /// See [`InputWindow::is_data_starved`].
    pub fn is_data_starved(&self) -> bool {
        self.window.is_data_starved()
    }

    /// Bytes buffered ahead of the current position.
    pub fn available(&self) -> u32 {
        self.window.available()
    }

    /// Byte at `index` relative to the current position.
    pub fn byte_at(&self, index: i64) -> u8 {
        self.window.byte_at(index)
    }

    /// See [`InputWindow::match_len`].
    pub fn match_len(&self, index: i64, distance: u32, limit: u32) -> u32 {
        self.window.match_len(index, distance, limit)
    }

    fn move_pos(&mut self) {
        self.cyclic_pos += 1;
        if self.cyclic_pos >= self.cyclic_size {
            self.cyclic_pos = 0;
        }
        self.window.move_pos();
        if self.window.pos() == MAX_VAL_FOR_NORMALIZE {
            self.normalize();
        }
    }

    fn normalize(&mut self) {
        let sub_value = self.window.pos() - self.cyclic_size;
        trace!("match finder normalize: subtracting {sub_value}");
        for item in self.son.iter_mut().chain(self.hash.iter_mut()) {
            *item = if *item <= sub_value {
                EMPTY_HASH_VALUE
            } else {
                *item - sub_value
            };
        }
        self.window.reduce_offsets(sub_value as i32);
    }

    /// Limit on match length at the current position, or `None` when too
    /// few bytes remain to hash.
    fn len_limit(&self) -> Option<u32> {
        let available = self.window.available();
        if available >= self.match_max_len {
            Some(self.match_max_len)
        } else if available < self.min_match_check {
            None
        } else {
            Some(available)
        }
    }

    /// Hash the bytes at the current position: (main, 2-byte, 3-byte).
    fn hashes(&self, cur: usize) -> (u32, u32, u32) {
        let buf = self.window.buffer();
        match self.kind {
            MatchFinderKind::Bt2 => (buf[cur] as u32 | ((buf[cur + 1] as u32) << 8), 0, 0),
            MatchFinderKind::Bt4 => {
                let mut temp = CRC_TABLE[buf[cur] as usize] ^ buf[cur + 1] as u32;
                let hash2 = temp & (HASH2_SIZE - 1);
                temp ^= (buf[cur + 2] as u32) << 8;
                let hash3 = temp & (HASH3_SIZE - 1);
                let main = (temp ^ (CRC_TABLE[buf[cur + 3] as usize] << 5)) & self.hash_mask;
                (main, hash2, hash3)
            }
        }
    }

    /// Find matches at the current position and advance by one.
    ///
    /// `out` receives pairs with strictly increasing lengths, each the
    /// shortest distance found for its length.
    pub fn get_matches(&mut self, out: &mut Vec<MatchPair>) {
        out.clear();
        let Some(len_limit) = self.len_limit() else {
            self.move_pos();
            return;
        };

        let pos = self.window.pos();
        let match_min_pos = pos.saturating_sub(self.cyclic_size);
        let cur = self.window.cursor();
        let buffer_offset = (cur as u32).wrapping_sub(pos);
        let mut max_len = START_MAX_LEN;

        let (hash_value, hash2, hash3) = self.hashes(cur);
        let buf = self.window.buffer();
        let at = |p: u32| buffer_offset.wrapping_add(p) as usize;

        let mut cur_match = self.hash[(self.fix_hash_size + hash_value) as usize];

        if self.kind == MatchFinderKind::Bt4 {
            let mut cur_match2 = self.hash[hash2 as usize];
            let cur_match3 = self.hash[(HASH3_OFFSET + hash3) as usize];
            self.hash[hash2 as usize] = pos;
            self.hash[(HASH3_OFFSET + hash3) as usize] = pos;

            if cur_match2 > match_min_pos && buf[at(cur_match2)] == buf[cur] {
                max_len = 2;
                out.push(MatchPair {
                    len: 2,
                    dist: pos - cur_match2 - 1,
                });
            }
            if cur_match3 > match_min_pos && buf[at(cur_match3)] == buf[cur] {
                if cur_match3 == cur_match2 {
                    out.pop();
                }
                max_len = 3;
                out.push(MatchPair {
                    len: 3,
                    dist: pos - cur_match3 - 1,
                });
                cur_match2 = cur_match3;
            }
            // The tree walk below will find this candidate again with its full length.
            if !out.is_empty() && cur_match2 == cur_match {
                out.pop();
                max_len = START_MAX_LEN;
            }
        }

        self.hash[(self.fix_hash_size + hash_value) as usize] = pos;

        let mut ptr0 = ((self.cyclic_pos << 1) + 1) as usize;
        let mut ptr1 = (self.cyclic_pos << 1) as usize;
        let mut len0 = self.num_hash_direct_bytes;
        let mut len1 = self.num_hash_direct_bytes;

        if self.num_hash_direct_bytes != 0
            && cur_match > match_min_pos
            && buf[at(cur_match) + self.num_hash_direct_bytes as usize]
                != buf[cur + self.num_hash_direct_bytes as usize]
        {
            max_len = self.num_hash_direct_bytes;
            out.push(MatchPair {
                len: max_len,
                dist: pos - cur_match - 1,
            });
        }

        let son = &mut self.son;
        let mut count = self.cut_value;
        loop {
            if cur_match <= match_min_pos || count == 0 {
                son[ptr0] = EMPTY_HASH_VALUE;
                son[ptr1] = EMPTY_HASH_VALUE;
                break;
            }
            count -= 1;

            let delta = pos - cur_match;
            let cyclic = if delta <= self.cyclic_pos {
                (self.cyclic_pos - delta) << 1
            } else {
                (self.cyclic_pos + self.cyclic_size - delta) << 1
            } as usize;

            let pby1 = at(cur_match);
            let mut len = len0.min(len1);
            if buf[pby1 + len as usize] == buf[cur + len as usize] {
                len += 1;
                while len != len_limit && buf[pby1 + len as usize] == buf[cur + len as usize] {
                    len += 1;
                }
                if max_len < len {
                    max_len = len;
                    out.push(MatchPair {
                        len,
                        dist: delta - 1,
                    });
                    if len == len_limit {
                        son[ptr1] = son[cyclic];
                        son[ptr0] = son[cyclic + 1];
                        break;
                    }
                }
            }

            if buf[pby1 + len as usize] < buf[cur + len as usize] {
                son[ptr1] = cur_match;
                ptr1 = cyclic + 1;
                cur_match = son[ptr1];
                len1 = len;
            } else {
                son[ptr0] = cur_match;
                ptr0 = cyclic;
                cur_match = son[ptr0];
                len0 = len;
            }
        }

        debug_assert!(out.iter().all(|m| m.len <= self.match_max_len));
        self.move_pos();
    }

    /// Insert `num` positions into the tree without reporting matches.
    pub fn skip(&mut self, num: u32) {
        for _ in 0..num {
            let Some(len_limit) = self.len_limit() else {
                self.move_pos();
                continue;
            };

            let pos = self.window.pos();
            let match_min_pos = pos.saturating_sub(self.cyclic_size);
            let cur = self.window.cursor();
            let buffer_offset = (cur as u32).wrapping_sub(pos);

            let (hash_value, hash2, hash3) = self.hashes(cur);
            if self.kind == MatchFinderKind::Bt4 {
                self.hash[hash2 as usize] = pos;
                self.hash[(HASH3_OFFSET + hash3) as usize] = pos;
            }

            let slot = (self.fix_hash_size + hash_value) as usize;
            let mut cur_match = self.hash[slot];
            self.hash[slot] = pos;

            let buf = self.window.buffer();
            let at = |p: u32| buffer_offset.wrapping_add(p) as usize;
            let son = &mut self.son;

            let mut ptr0 = ((self.cyclic_pos << 1) + 1) as usize;
            let mut ptr1 = (self.cyclic_pos << 1) as usize;
            let mut len0 = self.num_hash_direct_bytes;
            let mut len1 = self.num_hash_direct_bytes;
            let mut count = self.cut_value;

            loop {
                if cur_match <= match_min_pos || count == 0 {
                    son[ptr0] = EMPTY_HASH_VALUE;
                    son[ptr1] = EMPTY_HASH_VALUE;
                    break;
                }
                count -= 1;

                let delta = pos - cur_match;
                let cyclic = if delta <= self.cyclic_pos {
                    (self.cyclic_pos - delta) << 1
                } else {
                    (self.cyclic_pos + self.cyclic_size - delta) << 1
                } as usize;

                let pby1 = at(cur_match);
                let mut len = len0.min(len1);
                if buf[pby1 + len as usize] == buf[cur + len as usize] {
                    len += 1;
                    while len != len_limit && buf[pby1 + len as usize] == buf[cur + len as usize]
                    {
                        len += 1;
                    }
                    if len == len_limit {
                        son[ptr1] = son[cyclic];
                        son[ptr0] = son[cyclic + 1];
                        break;
                    }
                }

                if buf[pby1 + len as usize] < buf[cur + len as usize] {
                    son[ptr1] = cur_match;
                    ptr1 = cyclic + 1;
                    cur_match = son[ptr1];
                    len1 = len;
                } else {
                    son[ptr0] = cur_match;
                    ptr0 = cyclic;
                    cur_match = son[ptr0];
                    len0 = len;
                }
            }

            self.move_pos();
        }
    }
}
