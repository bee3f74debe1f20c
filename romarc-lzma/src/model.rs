//! LZMA probability models.
//!
//! LZMA uses context-dependent probability models for:
//! - Literal encoding (context = previous byte + position)
//! - Match length encoding
//! - Distance encoding
//! - State machine transitions
//!
//! The encoder and the decoder share these structures; each side owns its
//! own copy and both evolve it identically, symbol by symbol.

use crate::bit_tree::BitTree;
use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder, bit_price, price0, price1};
use romarc_core::error::Result;
use std::fmt;
use std::io::Read;

/// Default literal context bits.
pub const LC_DEFAULT: u32 = 3;

/// Default literal position bits.
pub const LP_DEFAULT: u32 = 0;

/// Default position bits.
pub const PB_DEFAULT: u32 = 2;

/// Largest legal `lc`.
pub const LC_MAX: u32 = 8;
/// Largest legal `lp`.
pub const LP_MAX: u32 = 4;
/// Largest legal `pb`.
pub const PB_MAX: u32 = 4;

/// Maximum number of position states.
pub const POS_STATES_MAX: usize = 1 << PB_MAX;

/// Number of states in the LZMA state machine.
pub const NUM_STATES: usize = 12;

/// Number of remembered match distances.
pub const NUM_REP_DISTANCES: usize = 4;

/// Number of bits for low length coding.
pub const LEN_LOW_BITS: u32 = 3;
/// Number of bits for mid length coding.
pub const LEN_MID_BITS: u32 = 3;
/// Number of bits for high length coding.
pub const LEN_HIGH_BITS: u32 = 8;

/// Number of low length symbols.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Number of mid length symbols.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Number of high length symbols.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;
/// Total number of length symbols.
pub const LEN_SYMBOLS: usize = LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS;

/// Minimum match length.
pub const MATCH_LEN_MIN: u32 = 2;

/// Maximum match length.
pub const MATCH_LEN_MAX: u32 = MATCH_LEN_MIN + LEN_SYMBOLS as u32 - 1;

/// Number of length buckets selecting a distance-slot tree.
pub const NUM_LEN_TO_POS_STATES: usize = 4;

/// Number of bits in a distance slot.
pub const DIST_SLOT_BITS: u32 = 6;

/// Number of distance slots.
pub const DIST_SLOTS: usize = 1 << DIST_SLOT_BITS;

/// Number of alignment bits.
pub const DIST_ALIGN_BITS: u32 = 4;
/// Size of the alignment tree.
pub const DIST_ALIGN_SIZE: usize = 1 << DIST_ALIGN_BITS;
/// Mask for the alignment bits of a distance.
pub const DIST_ALIGN_MASK: u32 = DIST_ALIGN_SIZE as u32 - 1;

/// First slot with footer bits.
pub const START_POS_MODEL_INDEX: u32 = 4;

/// First slot whose footer is coded with direct bits.
pub const END_POS_MODEL_INDEX: u32 = 14;

/// Distances below this are priced exactly from the footer models.
pub const FULL_DISTANCES: usize = 1 << (END_POS_MODEL_INDEX / 2);

/// Distance value that encodes the end-of-stream marker.
pub const END_MARKER_DISTANCE: u32 = 0xFFFF_FFFF;

/// Length-dependent selector for the distance-slot tree.
#[inline]
pub fn len_to_pos_state(len: u32) -> usize {
    let len = len - MATCH_LEN_MIN;
    (len as usize).min(NUM_LEN_TO_POS_STATES - 1)
}

/// Get the distance slot for a zero-based distance.
#[inline]
pub fn dist_slot(dist: u32) -> u32 {
    if dist < START_POS_MODEL_INDEX {
        return dist;
    }
    let bits = 32 - dist.leading_zeros();
    ((bits - 1) << 1) | ((dist >> (bits - 2)) & 1)
}

/// Footer layout of a slot: number of footer bits and the base distance.
#[inline]
pub fn slot_footer(slot: u32) -> (u32, u32) {
    let footer_bits = (slot >> 1) - 1;
    let base = (2 | (slot & 1)) << footer_bits;
    (footer_bits, base)
}

/// LZMA state machine state.
///
/// States 0..=6 follow a literal, 7..=11 follow a match or rep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State(u8);

impl State {
    /// Create initial state.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Get state value as an index into per-state tables.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if the last symbol was a literal.
    #[inline]
    pub fn is_char_state(self) -> bool {
        self.0 < 7
    }

    /// Update state after a literal.
    #[inline]
    pub fn update_char(&mut self) {
        self.0 = match self.0 {
            0..=3 => 0,
            4..=9 => self.0 - 3,
            _ => self.0 - 6,
        };
    }

    /// Update state after a match.
    #[inline]
    pub fn update_match(&mut self) {
        self.0 = if self.0 < 7 { 7 } else { 10 };
    }

    /// Update state after a rep match of length two or more.
    #[inline]
    pub fn update_rep(&mut self) {
        self.0 = if self.0 < 7 { 8 } else { 11 };
    }

    /// Update state after a one-byte rep0.
    #[inline]
    pub fn update_short_rep(&mut self) {
        self.0 = if self.0 < 7 { 9 } else { 11 };
    }
}

/// The four most recently used match distances, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepDistances([u32; NUM_REP_DISTANCES]);

impl RepDistances {
    /// Distance at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        self.0[index]
    }

    /// Most recent distance.
    #[inline]
    pub fn rep0(&self) -> u32 {
        self.0[0]
    }

    /// Move entry `index` to the front, shifting the ones before it back.
    pub fn promote(&mut self, index: usize) {
        let dist = self.0[index];
        self.0.copy_within(0..index, 1);
        self.0[0] = dist;
    }

    /// Record a new match distance, dropping the oldest.
    pub fn push(&mut self, dist: u32) {
        self.0.copy_within(0..NUM_REP_DISTANCES - 1, 1);
        self.0[0] = dist;
    }
}

/// LZMA properties (lc, lp, pb).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
}

impl LzmaProperties {
    /// Create new properties.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self { lc, lp, pb }
    }

    /// Parse from property byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let pb = byte as u32 / 45;
        let remaining = byte as u32 - pb * 45;
        let lp = remaining / 9;
        let lc = remaining - lp * 9;

        if lc > LC_MAX || lp > LP_MAX || pb > PB_MAX {
            return None;
        }

        Some(Self { lc, lp, pb })
    }

    /// Encode to property byte.
    pub fn to_byte(&self) -> u8 {
        ((self.pb * 45) + (self.lp * 9) + self.lc) as u8
    }

    /// Get number of literal sub-coders.
    pub fn num_lit_states(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Get number of position states.
    pub fn num_pos_states(&self) -> usize {
        1 << self.pb
    }

    /// Mask selecting the position state from a stream position.
    pub fn pos_state_mask(&self) -> u32 {
        (1 << self.pb) - 1
    }
}

impl fmt::Display for LzmaProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lc={} lp={} pb={}", self.lc, self.lp, self.pb)
    }
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self {
            lc: LC_DEFAULT,
            lp: LP_DEFAULT,
            pb: PB_DEFAULT,
        }
    }
}

/// Length coder: a two-level choice followed by a low, mid or high tree.
#[derive(Debug, Clone)]
pub struct LengthCoder {
    choice: u16,
    choice2: u16,
    low: [BitTree<LEN_LOW_SYMBOLS>; POS_STATES_MAX],
    mid: [BitTree<LEN_MID_SYMBOLS>; POS_STATES_MAX],
    high: BitTree<LEN_HIGH_SYMBOLS>,
}

impl LengthCoder {
    /// Create a new length coder.
    pub fn new() -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: std::array::from_fn(|_| BitTree::new()),
            mid: std::array::from_fn(|_| BitTree::new()),
            high: BitTree::new(),
        }
    }

    /// Reset the model.
    pub fn reset(&mut self) {
        self.choice = PROB_INIT;
        self.choice2 = PROB_INIT;
        self.low.iter_mut().for_each(|tree| tree.reset());
        self.mid.iter_mut().for_each(|tree| tree.reset());
        self.high.reset();
    }

    /// Encode `symbol` (`length - 2`).
    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32, pos_state: usize) {
        if symbol < LEN_LOW_SYMBOLS as u32 {
            rc.encode_bit(&mut self.choice, 0);
            self.low[pos_state].encode(rc, symbol);
            return;
        }
        rc.encode_bit(&mut self.choice, 1);
        let symbol = symbol - LEN_LOW_SYMBOLS as u32;
        if symbol < LEN_MID_SYMBOLS as u32 {
            rc.encode_bit(&mut self.choice2, 0);
            self.mid[pos_state].encode(rc, symbol);
        } else {
            rc.encode_bit(&mut self.choice2, 1);
            self.high.encode(rc, symbol - LEN_MID_SYMBOLS as u32);
        }
    }

    /// Decode a symbol (`length - 2`).
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>, pos_state: usize) -> Result<u32> {
        if rc.decode_bit(&mut self.choice)? == 0 {
            return self.low[pos_state].decode(rc);
        }
        if rc.decode_bit(&mut self.choice2)? == 0 {
            Ok(LEN_LOW_SYMBOLS as u32 + self.mid[pos_state].decode(rc)?)
        } else {
            Ok((LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32 + self.high.decode(rc)?)
        }
    }

    /// Fill `prices[..num_symbols]` with the cost of each symbol under `pos_state`.
    pub fn set_prices(&self, pos_state: usize, num_symbols: usize, prices: &mut [u32]) {
        let a0 = price0(self.choice);
        let a1 = price1(self.choice);
        let b0 = a1 + price0(self.choice2);
        let b1 = a1 + price1(self.choice2);

        for (i, price) in prices.iter_mut().enumerate().take(num_symbols) {
            *price = if i < LEN_LOW_SYMBOLS {
                a0 + self.low[pos_state].price(i as u32)
            } else if i < LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS {
                b0 + self.mid[pos_state].price((i - LEN_LOW_SYMBOLS) as u32)
            } else {
                b1 + self
                    .high
                    .price((i - LEN_LOW_SYMBOLS - LEN_MID_SYMBOLS) as u32)
            };
        }
    }
}

impl Default for LengthCoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Literal coder: one 0x300-cell sub-coder per (position bits, previous byte bits) context.
#[derive(Debug, Clone)]
pub struct LiteralCoder {
    probs: Vec<[u16; 0x300]>,
    lc: u32,
    lp_mask: u64,
}

impl LiteralCoder {
    /// Create a new literal coder.
    pub fn new(props: LzmaProperties) -> Self {
        Self {
            probs: vec![[PROB_INIT; 0x300]; props.num_lit_states()],
            lc: props.lc,
            lp_mask: (1u64 << props.lp) - 1,
        }
    }

    /// Reset the model.
    pub fn reset(&mut self) {
        for state in &mut self.probs {
            state.fill(PROB_INIT);
        }
    }

    /// Select the sub-coder for the byte at `pos` following `prev_byte`.
    #[inline]
    pub fn sub_coder(&self, pos: u64, prev_byte: u8) -> usize {
        let lit_pos = (pos & self.lp_mask) as usize;
        let prev_bits = (prev_byte as usize) >> (8 - self.lc);
        (lit_pos << self.lc) + prev_bits
    }

    /// Encode a byte without a match byte.
    pub fn encode(&mut self, rc: &mut RangeEncoder, sub: usize, symbol: u8) {
        let probs = &mut self.probs[sub];
        let mut context = 1usize;
        for i in (0..8).rev() {
            let bit = (symbol as u32 >> i) & 1;
            rc.encode_bit(&mut probs[context], bit);
            context = (context << 1) | bit as usize;
        }
    }

    /// Encode a byte using the byte at rep0 as extra context while the bits agree.
    pub fn encode_matched(
        &mut self,
        rc: &mut RangeEncoder,
        sub: usize,
        match_byte: u8,
        symbol: u8,
    ) {
        let probs = &mut self.probs[sub];
        let mut context = 1usize;
        let mut same = true;
        for i in (0..8).rev() {
            let bit = (symbol as u32 >> i) & 1;
            let mut index = context;
            if same {
                let match_bit = (match_byte as u32 >> i) & 1;
                index += (1 + match_bit as usize) << 8;
                same = match_bit == bit;
            }
            rc.encode_bit(&mut probs[index], bit);
            context = (context << 1) | bit as usize;
        }
    }

    /// Decode a byte without a match byte.
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>, sub: usize) -> Result<u8> {
        let probs = &mut self.probs[sub];
        let mut symbol = 1usize;
        while symbol < 0x100 {
            symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
        }
        Ok(symbol as u8)
    }

    /// Decode a byte coded with [`encode_matched`](Self::encode_matched).
    pub fn decode_matched<R: Read>(
        &mut self,
        rc: &mut RangeDecoder<R>,
        sub: usize,
        match_byte: u8,
    ) -> Result<u8> {
        let probs = &mut self.probs[sub];
        let mut symbol = 1usize;
        let mut match_byte = match_byte as usize;
        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;
            let bit = rc.decode_bit(&mut probs[((1 + match_bit) << 8) + symbol])? as usize;
            symbol = (symbol << 1) | bit;
            if match_bit != bit {
                while symbol < 0x100 {
                    symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
                }
                break;
            }
        }
        Ok(symbol as u8)
    }

    /// Price of coding `symbol`, in matched mode when `match_mode` is set.
    pub fn price(&self, sub: usize, match_mode: bool, match_byte: u8, symbol: u8) -> u32 {
        let probs = &self.probs[sub];
        let mut price = 0;
        let mut context = 1usize;
        let mut i = 8;
        if match_mode {
            while i > 0 {
                i -= 1;
                let match_bit = (match_byte as u32 >> i) & 1;
                let bit = (symbol as u32 >> i) & 1;
                price += bit_price(probs[((1 + match_bit as usize) << 8) + context], bit);
                context = (context << 1) | bit as usize;
                if match_bit != bit {
                    break;
                }
            }
        }
        while i > 0 {
            i -= 1;
            let bit = (symbol as u32 >> i) & 1;
            price += bit_price(probs[context], bit);
            context = (context << 1) | bit as usize;
        }
        price
    }
}

/// Complete LZMA model containing all probability tables.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// LZMA properties.
    pub props: LzmaProperties,

    /// Is-match probabilities.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// Is-rep probabilities.
    pub is_rep: [u16; NUM_STATES],
    /// Is-rep0 probabilities (named G0 in the format description).
    pub is_rep_g0: [u16; NUM_STATES],
    /// Is-rep1 probabilities.
    pub is_rep_g1: [u16; NUM_STATES],
    /// Is-rep2 probabilities.
    pub is_rep_g2: [u16; NUM_STATES],
    /// Is-rep0-long probabilities.
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],

    /// Distance slot trees, one per length bucket.
    pub pos_slot: [BitTree<DIST_SLOTS>; NUM_LEN_TO_POS_STATES],
    /// Footer cells for slots 4..14, laid out back to back.
    pub pos_special: [u16; FULL_DISTANCES - END_POS_MODEL_INDEX as usize],
    /// Alignment tree for the low four bits of long distances.
    pub pos_align: BitTree<DIST_ALIGN_SIZE>,

    /// Match length model.
    pub match_len: LengthCoder,
    /// Rep match length model.
    pub rep_len: LengthCoder,

    /// Literal model.
    pub literal: LiteralCoder,
}

impl LzmaModel {
    /// Create a new LZMA model with the given properties.
    pub fn new(props: LzmaProperties) -> Self {
        Self {
            props,
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            pos_slot: std::array::from_fn(|_| BitTree::new()),
            pos_special: [PROB_INIT; FULL_DISTANCES - END_POS_MODEL_INDEX as usize],
            pos_align: BitTree::new(),
            match_len: LengthCoder::new(),
            rep_len: LengthCoder::new(),
            literal: LiteralCoder::new(props),
        }
    }

    /// Reset all probabilities to initial values.
    pub fn reset(&mut self) {
        for state in &mut self.is_match {
            state.fill(PROB_INIT);
        }
        self.is_rep.fill(PROB_INIT);
        self.is_rep_g0.fill(PROB_INIT);
        self.is_rep_g1.fill(PROB_INIT);
        self.is_rep_g2.fill(PROB_INIT);
        for state in &mut self.is_rep0_long {
            state.fill(PROB_INIT);
        }
        self.pos_slot.iter_mut().for_each(|tree| tree.reset());
        self.pos_special.fill(PROB_INIT);
        self.pos_align.reset();
        self.match_len.reset();
        self.rep_len.reset();
        self.literal.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_state_transitions() {
        let mut state = State::new();
        assert!(state.is_char_state());

        state.update_match();
        assert!(!state.is_char_state());
        assert_eq!(state.index(), 7);

        state.update_char();
        assert!(state.is_char_state());
        assert_eq!(state.index(), 4);
    }

    #[test]
    fn test_state_table() {
        let after_char: Vec<usize> = (0..12u8)
            .map(|s| {
                let mut st = State(s);
                st.update_char();
                st.index()
            })
            .collect();
        assert_eq!(after_char, [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 4, 5]);

        for s in 0..12u8 {
            let mut m = State(s);
            m.update_match();
            let mut r = State(s);
            r.update_rep();
            let mut sr = State(s);
            sr.update_short_rep();
            if s < 7 {
                assert_eq!((m.index(), r.index(), sr.index()), (7, 8, 9));
            } else {
                assert_eq!((m.index(), r.index(), sr.index()), (10, 11, 11));
            }
        }
    }

    #[test]
    fn test_rep_distances_lru() {
        let mut reps = RepDistances::default();
        reps.push(10);
        reps.push(20);
        reps.push(30);
        reps.push(40);
        assert_eq!(reps.0, [40, 30, 20, 10]);

        reps.promote(2);
        assert_eq!(reps.0, [20, 40, 30, 10]);

        reps.promote(0);
        assert_eq!(reps.0, [20, 40, 30, 10]);

        reps.promote(3);
        assert_eq!(reps.0, [10, 20, 40, 30]);
        assert_eq!(reps.rep0(), 10);
        assert_eq!(reps.get(3), 30);
    }

    #[test]
    fn test_dist_slot() {
        assert_eq!(dist_slot(0), 0);
        assert_eq!(dist_slot(3), 3);
        assert_eq!(dist_slot(4), 4);
        assert_eq!(dist_slot(5), 4);
        assert_eq!(dist_slot(6), 5);
        assert_eq!(dist_slot(127), 13);
        assert_eq!(dist_slot(128), 14);
        assert_eq!(dist_slot(END_MARKER_DISTANCE), 63);

        for dist in [4u32, 100, 4095, 1 << 20, (1 << 30) - 1] {
            let slot = dist_slot(dist);
            let (footer_bits, base) = slot_footer(slot);
            assert!(dist >= base && dist - base < (1 << footer_bits));
        }
    }

    #[test]
    fn test_len_to_pos_state() {
        assert_eq!(len_to_pos_state(2), 0);
        assert_eq!(len_to_pos_state(4), 2);
        assert_eq!(len_to_pos_state(5), 3);
        assert_eq!(len_to_pos_state(273), 3);
        assert_eq!(MATCH_LEN_MAX, 273);
    }

    #[test]
    fn test_properties_encoding() {
        let props = LzmaProperties::new(3, 0, 2);
        assert_eq!(props.to_byte(), 0x5D);
        let decoded = LzmaProperties::from_byte(0x5D).unwrap();
        assert_eq!(decoded, props);

        assert!(LzmaProperties::from_byte(225).is_none());
    }

    #[test]
    fn test_default_properties() {
        let props = LzmaProperties::default();
        assert_eq!(props.lc, 3);
        assert_eq!(props.lp, 0);
        assert_eq!(props.pb, 2);
        assert_eq!(props.pos_state_mask(), 3);
        assert_eq!(props.to_string(), "lc=3 lp=0 pb=2");
    }

    #[test]
    fn test_literal_sub_coder() {
        let lit = LiteralCoder::new(LzmaProperties::new(3, 1, 2));
        assert_eq!(lit.sub_coder(0, 0xFF), 7);
        assert_eq!(lit.sub_coder(1, 0xFF), 15);

        let lit = LiteralCoder::new(LzmaProperties::new(0, 0, 0));
        assert_eq!(lit.sub_coder(12345, 0xAB), 0);
    }

    #[test]
    fn test_literal_roundtrip_and_price() {
        let props = LzmaProperties::default();
        let mut enc = LiteralCoder::new(props);
        let mut rc = RangeEncoder::new();
        enc.encode(&mut rc, 0, b'x');
        enc.encode_matched(&mut rc, 1, b'y', b'z');
        enc.encode_matched(&mut rc, 1, b'q', b'q');
        let data = rc.finish();

        let mut dec = LiteralCoder::new(props);
        let mut rd = RangeDecoder::new(Cursor::new(data)).unwrap();
        assert_eq!(dec.decode(&mut rd, 0).unwrap(), b'x');
        assert_eq!(dec.decode_matched(&mut rd, 1, b'y').unwrap(), b'z');
        assert_eq!(dec.decode_matched(&mut rd, 1, b'q').unwrap(), b'q');

        let fresh = LiteralCoder::new(props);
        assert_eq!(fresh.price(0, false, 0, b'a'), 8 * 64);
        assert_eq!(fresh.price(0, true, b'b', b'a'), 8 * 64);
    }

    #[test]
    fn test_length_coder() {
        let mut enc = LengthCoder::new();
        let mut rc = RangeEncoder::new();
        for sym in [0u32, 7, 8, 15, 16, 271] {
            enc.encode(&mut rc, sym, 1);
        }
        let data = rc.finish();

        let mut dec = LengthCoder::new();
        let mut rd = RangeDecoder::new(Cursor::new(data)).unwrap();
        for sym in [0u32, 7, 8, 15, 16, 271] {
            assert_eq!(dec.decode(&mut rd, 1).unwrap(), sym);
        }

        let fresh = LengthCoder::new();
        let mut prices = [0u32; LEN_SYMBOLS];
        fresh.set_prices(0, LEN_SYMBOLS, &mut prices);
        assert_eq!(prices[0], 4 * 64);
        assert_eq!(prices[8], 5 * 64);
        assert_eq!(prices[16], 10 * 64);
    }

    #[test]
    fn test_model_creation() {
        let props = LzmaProperties::default();
        let mut model = LzmaModel::new(props);

        assert_eq!(model.is_match.len(), NUM_STATES);
        assert_eq!(model.pos_special.len(), 114);

        model.is_rep[3] = 100;
        model.reset();
        assert_eq!(model.is_rep[3], PROB_INIT);
    }
}
