//! Optimal-parse support for the LZMA encoder.
//!
//! The encoder prices every way of coding the next stretch of input
//! (literals, short reps, rep matches, matches, and a few two-step
//! combinations) into an arena of [`Optimal`] nodes indexed by offset from
//! the current position, then walks the cheapest chain backwards to recover
//! the decisions in coding order.
//!
//! Prices are in 1/64-bit units (see [`crate::range_coder::PRICE_SHIFT_BITS`]).

use crate::model::{LEN_SYMBOLS, LengthCoder, POS_STATES_MAX, RepDistances, State};
use romarc_core::error::{Result, RomArcError};

/// Size of the optimal-parse arena; the parser looks at most this far ahead.
pub const NUM_OPTS: u32 = 1 << 12;

/// Price of an unreachable node.
pub const INFINITY_PRICE: u32 = 0x0FFF_FFFF;

/// Sentinel `back_prev` meaning "reached by a literal".
pub const BACK_LITERAL: u32 = u32::MAX;

/// One node of the parse graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimal {
    /// Coder state on arrival at this node.
    pub state: State,
    /// The step into this node ends with a literal that follows `pos_prev`.
    pub prev1_is_char: bool,
    /// The step is a three-part combination whose first part is
    /// described by `pos_prev2`/`back_prev2`.
    pub prev2: bool,
    /// Start of the first part of a three-part step.
    pub pos_prev2: u32,
    /// Distance code of the first part of a three-part step.
    pub back_prev2: u32,
    /// Cheapest known price to reach this node.
    pub price: u32,
    /// Node this one is reached from.
    pub pos_prev: u32,
    /// Distance code of the step: [`BACK_LITERAL`], rep index 0..4, or distance + 4.
    pub back_prev: u32,
    /// Rep distances on arrival at this node.
    pub backs: RepDistances,
}

impl Optimal {
    /// Mark the step as a literal.
    #[inline]
    pub fn make_as_char(&mut self) {
        self.back_prev = BACK_LITERAL;
        self.prev1_is_char = false;
    }

    /// Mark the step as a one-byte rep0.
    #[inline]
    pub fn make_as_short_rep(&mut self) {
        self.back_prev = 0;
        self.prev1_is_char = false;
    }

    /// Whether the step is a one-byte rep0.
    #[inline]
    pub fn is_short_rep(&self) -> bool {
        self.back_prev == 0
    }
}

/// Reverse the back-links ending at `cur` so they read front to back.
///
/// Returns the offset of the first decision's end and its distance code;
/// afterwards `optimum[i].pos_prev` is the end of the decision starting at `i`.
pub fn backward(optimum: &mut [Optimal], mut cur: u32) -> Result<(u32, u32)> {
    let mut pos_mem = optimum[cur as usize].pos_prev;
    let mut back_mem = optimum[cur as usize].back_prev;

    loop {
        if pos_mem >= cur {
            return Err(RomArcError::invariant(format!(
                "optimal parse link from {cur} points forward to {pos_mem}"
            )));
        }

        let node = optimum[cur as usize];
        if node.prev1_is_char {
            let pm = pos_mem as usize;
            optimum[pm].make_as_char();
            optimum[pm].pos_prev = pos_mem - 1;
            if node.prev2 {
                optimum[pm - 1].prev1_is_char = false;
                optimum[pm - 1].pos_prev = node.pos_prev2;
                optimum[pm - 1].back_prev = node.back_prev2;
            }
        }

        let pos_prev = pos_mem;
        let back_cur = back_mem;

        back_mem = optimum[pos_prev as usize].back_prev;
        pos_mem = optimum[pos_prev as usize].pos_prev;

        optimum[pos_prev as usize].back_prev = back_cur;
        optimum[pos_prev as usize].pos_prev = cur;
        cur = pos_prev;

        if cur == 0 {
            break;
        }
    }

    Ok((optimum[0].pos_prev, optimum[0].back_prev))
}

/// Cached length prices per position state, refreshed lazily.
#[derive(Debug, Clone)]
pub struct LenPriceTable {
    prices: Vec<u32>,
    table_size: usize,
    counters: [u32; POS_STATES_MAX],
}

impl LenPriceTable {
    /// Create a table covering `table_size` length symbols.
    pub fn new(table_size: usize) -> Self {
        Self {
            prices: vec![0; LEN_SYMBOLS * POS_STATES_MAX],
            table_size,
            counters: [0; POS_STATES_MAX],
        }
    }

    /// Recompute prices for one position state.
    pub fn update_table(&mut self, coder: &LengthCoder, pos_state: usize) {
        let start = pos_state * LEN_SYMBOLS;
        coder.set_prices(
            pos_state,
            self.table_size,
            &mut self.prices[start..start + LEN_SYMBOLS],
        );
        self.counters[pos_state] = self.table_size as u32;
    }

    /// Recompute prices for the first `num_pos_states` position states.
    pub fn update_tables(&mut self, coder: &LengthCoder, num_pos_states: usize) {
        for pos_state in 0..num_pos_states {
            self.update_table(coder, pos_state);
        }
    }

    /// Account for one coded length; refresh the table when its counter runs out.
    pub fn note_coded(&mut self, coder: &LengthCoder, pos_state: usize) {
        self.counters[pos_state] -= 1;
        if self.counters[pos_state] == 0 {
            self.update_table(coder, pos_state);
        }
    }

    /// Price of length symbol `symbol` under `pos_state`.
    #[inline]
    pub fn price(&self, symbol: u32, pos_state: usize) -> u32 {
        self.prices[pos_state * LEN_SYMBOLS + symbol as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range_coder::RangeEncoder;

    #[test]
    fn test_optimal_markers() {
        let mut opt = Optimal::default();
        opt.prev1_is_char = true;
        opt.make_as_char();
        assert_eq!(opt.back_prev, BACK_LITERAL);
        assert!(!opt.prev1_is_char);
        assert!(!opt.is_short_rep());

        opt.make_as_short_rep();
        assert!(opt.is_short_rep());
    }

    #[test]
    fn test_backward_simple_chain() {
        // 0 --literal--> 1 --match(len 3)--> 4
        let mut arena = vec![Optimal::default(); 8];
        arena[1].pos_prev = 0;
        arena[1].make_as_char();
        arena[4].pos_prev = 1;
        arena[4].back_prev = 10 + 4;

        let (first_end, back) = backward(&mut arena, 4).unwrap();
        assert_eq!((first_end, back), (1, BACK_LITERAL));
        assert_eq!(arena[1].pos_prev, 4);
        assert_eq!(arena[1].back_prev, 14);
    }

    #[test]
    fn test_backward_three_part_step() {
        // 0 --rep1 (len 2)--> 2 --literal--> 3 --rep0 (len 2)--> 5
        let mut arena = vec![Optimal::default(); 8];
        arena[5].pos_prev = 3;
        arena[5].back_prev = 0;
        arena[5].prev1_is_char = true;
        arena[5].prev2 = true;
        arena[5].pos_prev2 = 0;
        arena[5].back_prev2 = 1;

        let (first_end, back) = backward(&mut arena, 5).unwrap();
        assert_eq!((first_end, back), (2, 1));
        assert_eq!((arena[2].pos_prev, arena[2].back_prev), (3, BACK_LITERAL));
        assert_eq!((arena[3].pos_prev, arena[3].back_prev), (5, 0));
    }

    #[test]
    fn test_backward_rejects_cycle() {
        let mut arena = vec![Optimal::default(); 4];
        arena[2].pos_prev = 3;
        assert!(matches!(
            backward(&mut arena, 2),
            Err(RomArcError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_len_price_table_refresh() {
        let mut coder = LengthCoder::new();
        let mut table = LenPriceTable::new(4);
        table.update_tables(&coder, 1);
        let fresh = table.price(0, 0);
        assert_eq!(fresh, 4 * 64);

        let mut rc = RangeEncoder::new();
        for _ in 0..3 {
            coder.encode(&mut rc, 0, 0);
            table.note_coded(&coder, 0);
        }
        // Still cached after three of four counted symbols.
        assert_eq!(table.price(0, 0), fresh);

        coder.encode(&mut rc, 0, 0);
        table.note_coded(&coder, 0);
        assert!(table.price(0, 0) < fresh);
    }
}
