//! Binary-tree probability coders.
//!
//! A bit tree of `N` bits owns `1 << N` probability cells and codes a symbol
//! one bit at a time, using the prefix decoded so far as the cell index. The
//! reverse variants walk the bits least significant first and are used for
//! distance footers and the alignment bits.

use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder, bit_price};
use romarc_core::error::Result;
use std::io::Read;

/// Probability tree over `SIZE = 1 << bits` cells.
#[derive(Debug, Clone)]
pub struct BitTree<const SIZE: usize> {
    probs: [u16; SIZE],
}

impl<const SIZE: usize> BitTree<SIZE> {
    /// Number of bits coded per symbol.
    pub const NUM_BITS: u32 = SIZE.trailing_zeros();

    /// Create a tree with every cell at 50%.
    pub fn new() -> Self {
        Self {
            probs: [PROB_INIT; SIZE],
        }
    }

    /// Reset every cell to 50%.
    pub fn reset(&mut self) {
        self.probs.fill(PROB_INIT);
    }

    /// Encode `symbol`, most significant bit first.
    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32) {
        let mut m = 1usize;
        for i in (0..Self::NUM_BITS).rev() {
            let bit = (symbol >> i) & 1;
            rc.encode_bit(&mut self.probs[m], bit);
            m = (m << 1) | bit as usize;
        }
    }

    /// Encode `symbol`, least significant bit first.
    pub fn encode_reverse(&mut self, rc: &mut RangeEncoder, symbol: u32) {
        encode_reverse(&mut self.probs, 0, rc, Self::NUM_BITS, symbol);
    }

    /// Decode a symbol coded with [`encode`](Self::encode).
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>) -> Result<u32> {
        let mut m = 1usize;
        for _ in 0..Self::NUM_BITS {
            m = (m << 1) | rc.decode_bit(&mut self.probs[m])? as usize;
        }
        Ok(m as u32 - (1 << Self::NUM_BITS))
    }

    /// Decode a symbol coded with [`encode_reverse`](Self::encode_reverse).
    pub fn decode_reverse<R: Read>(&mut self, rc: &mut RangeDecoder<R>) -> Result<u32> {
        decode_reverse(&mut self.probs, 0, rc, Self::NUM_BITS)
    }

    /// Price of coding `symbol` forward.
    pub fn price(&self, symbol: u32) -> u32 {
        let mut price = 0;
        let mut m = 1usize;
        for i in (0..Self::NUM_BITS).rev() {
            let bit = (symbol >> i) & 1;
            price += bit_price(self.probs[m], bit);
            m = (m << 1) | bit as usize;
        }
        price
    }

    /// Price of coding `symbol` in reverse.
    pub fn reverse_price(&self, symbol: u32) -> u32 {
        reverse_price(&self.probs, 0, Self::NUM_BITS, symbol)
    }
}

impl<const SIZE: usize> Default for BitTree<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reverse-encode `num_bits` of `symbol` into a tree embedded in a shared
/// array; the tree's cell `m` lives at `probs[offset + m - 1]`.
pub fn encode_reverse(
    probs: &mut [u16],
    offset: usize,
    rc: &mut RangeEncoder,
    num_bits: u32,
    mut symbol: u32,
) {
    let mut m = 1usize;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        rc.encode_bit(&mut probs[offset + m - 1], bit);
        m = (m << 1) | bit as usize;
        symbol >>= 1;
    }
}

/// Reverse-decode `num_bits` from a tree embedded in a shared array.
pub fn decode_reverse<R: Read>(
    probs: &mut [u16],
    offset: usize,
    rc: &mut RangeDecoder<R>,
    num_bits: u32,
) -> Result<u32> {
    let mut m = 1usize;
    let mut symbol = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[offset + m - 1])?;
        m = (m << 1) | bit as usize;
        symbol |= bit << i;
    }
    Ok(symbol)
}

/// Price of reverse-coding `symbol` with a tree embedded in a shared array.
pub fn reverse_price(probs: &[u16], offset: usize, num_bits: u32, mut symbol: u32) -> u32 {
    let mut price = 0;
    let mut m = 1usize;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        symbol >>= 1;
        price += bit_price(probs[offset + m - 1], bit);
        m = (m << 1) | bit as usize;
    }
    price
}
