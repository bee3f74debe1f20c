//! Range coder for LZMA compression.
//!
//! The range coder is an entropy coding method similar to arithmetic coding.
//! LZMA uses a specific variant with:
//! - 32-bit range tracking
//! - Normalization when range drops below 2^24
//! - 11-bit probability model (2048 = certainty)
//!
//! The encoder collects its output in an internal buffer so that bit coding
//! never fails; callers drain the buffer into their sink between blocks.
//! This module also owns the static price table used by the optimal parser.

use romarc_core::error::{Result, RomArcError};
use std::io::{self, Read, Write};

/// Number of bits in probability model.
pub const PROB_BITS: u32 = 11;

/// Initial probability (50%).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Probability scale; a cell always stays strictly inside `(0, PROB_MAX)`.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Number of bits to shift for probability update.
pub const MOVE_BITS: u32 = 5;

/// Fixed-point precision of prices: one bit costs `1 << PRICE_SHIFT_BITS`.
pub const PRICE_SHIFT_BITS: u32 = 6;

/// Probabilities are quantized by this many bits before the price lookup.
const MOVE_REDUCING_BITS: u32 = 2;

/// Top value for range normalization.
const TOP_VALUE: u32 = 1 << 24;

const PRICE_TABLE_BITS: u32 = PROB_BITS - MOVE_REDUCING_BITS;

/// Approximate `-log2(p) << 6` for each quantized probability.
static PROB_PRICES: [u32; 1 << PRICE_TABLE_BITS] = {
    let mut prices = [0u32; 1 << PRICE_TABLE_BITS];
    let mut i = PRICE_TABLE_BITS;
    while i > 0 {
        i -= 1;
        let start = 1u32 << (PRICE_TABLE_BITS - i - 1);
        let end = 1u32 << (PRICE_TABLE_BITS - i);
        let mut j = start;
        while j < end {
            prices[j as usize] = (i << PRICE_SHIFT_BITS)
                + (((end - j) << PRICE_SHIFT_BITS) >> (PRICE_TABLE_BITS - i - 1));
            j += 1;
        }
    }
    prices
};

/// Price of coding `bit` with probability cell value `prob`.
#[inline]
pub fn bit_price(prob: u16, bit: u32) -> u32 {
    if bit == 0 {
        price0(prob)
    } else {
        price1(prob)
    }
}

/// Price of coding a 0 bit.
#[inline]
pub fn price0(prob: u16) -> u32 {
    PROB_PRICES[(prob >> MOVE_REDUCING_BITS) as usize]
}

/// Price of coding a 1 bit.
#[inline]
pub fn price1(prob: u16) -> u32 {
    PROB_PRICES[((PROB_MAX - prob) >> MOVE_REDUCING_BITS) as usize]
}

/// Price of `count` bits coded at fixed 50% probability.
#[inline]
pub fn direct_bits_price(count: u32) -> u32 {
    count << PRICE_SHIFT_BITS
}

/// Range decoder for LZMA decompression.
#[derive(Debug)]
pub struct RangeDecoder<R: Read> {
    reader: R,
    range: u32,
    code: u32,
    /// Compressed bytes consumed so far, for error offsets.
    consumed: u64,
}

impl<R: Read> RangeDecoder<R> {
    /// Create a new range decoder, consuming the 5-byte stream preamble.
    pub fn new(reader: R) -> Result<Self> {
        let mut rd = Self {
            reader,
            range: 0xFFFF_FFFF,
            code: 0,
            consumed: 0,
        };

        if rd.next_byte()? != 0x00 {
            return Err(RomArcError::corrupted(0, "range coder stream must start with 0x00"));
        }

        for _ in 0..4 {
            rd.code = (rd.code << 8) | rd.next_byte()? as u32;
        }

        Ok(rd)
    }

    fn next_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.consumed += 1;
                Ok(buf[0])
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(RomArcError::truncated(self.consumed))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Normalize the range (refill when range gets small).
    #[inline]
    fn normalize(&mut self) -> Result<()> {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.code = (self.code << 8) | self.next_byte()? as u32;
        }
        Ok(())
    }

    /// Decode a single bit with the given probability.
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        let bit = if self.code < bound {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            0
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            1
        };

        self.normalize()?;
        Ok(bit)
    }

    /// Decode multiple bits with fixed probability, most significant first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..count {
            self.range >>= 1;
            let t = self.code.wrapping_sub(self.range) >> 31;
            self.code = self.code.wrapping_sub(self.range & t.wrapping_sub(1));
            result = (result << 1) | (1 - t);
            self.normalize()?;
        }
        Ok(result)
    }

    /// Check if decoding finished correctly (the code register drained to zero).
    pub fn is_finished_ok(&self) -> bool {
        self.code == 0
    }

    /// Number of compressed bytes consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Recover the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Range encoder for LZMA compression.
#[derive(Debug)]
pub struct RangeEncoder {
    /// Bytes produced; those before `pending_start` were already drained.
    pending: Vec<u8>,
    pending_start: usize,
    /// Bytes already drained.
    drained: u64,
    range: u32,
    /// 33-bit accumulator; bit 32 is the carry into the cached bytes.
    low: u64,
    cache: u8,
    cache_size: u64,
    flushed: bool,
}

impl RangeEncoder {
    /// Create a new range encoder.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            pending_start: 0,
            drained: 0,
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
            flushed: false,
        }
    }

    /// Emit the top byte of `low`, resolving any pending carry first.
    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut tmp = self.cache;

            loop {
                self.pending.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }

            self.cache = (self.low >> 24) as u8;
        }

        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    /// Encode a single bit with the given probability.
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        if bit == 0 {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }

        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode the low `count` bits of `value` at fixed probability, most significant first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.range >>= 1;
            if (value >> i) & 1 != 0 {
                self.low += self.range as u64;
            }
            if self.range < TOP_VALUE {
                self.range <<= 8;
                self.shift_low();
            }
        }
    }

    /// Push the remaining state out so a decoder can consume every coded bit.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
        self.flushed = true;
    }

    /// Total compressed size so far, counting bytes still held in the carry cache.
    pub fn processed_size(&self) -> u64 {
        let produced = self.drained + self.pending().len() as u64;
        if self.flushed {
            produced
        } else {
            produced + self.cache_size + 4
        }
    }

    /// Bytes produced and not yet drained.
    pub fn pending(&self) -> &[u8] {
        &self.pending[self.pending_start..]
    }

    fn mark_drained(&mut self, n: usize) {
        self.pending_start += n;
        self.drained += n as u64;
        if self.pending_start == self.pending.len() {
            self.pending.clear();
            self.pending_start = 0;
        }
    }

    /// Take all produced bytes.
    pub fn take_pending(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.pending);
        if self.pending_start > 0 {
            out.drain(..self.pending_start);
        }
        self.drained += out.len() as u64;
        self.pending_start = 0;
        out
    }

    /// Move up to `out.len()` produced bytes into `out`.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let pending = self.pending();
        let n = out.len().min(pending.len());
        out[..n].copy_from_slice(&pending[..n]);
        self.mark_drained(n);
        n
    }

    /// Write all produced bytes to `writer`.
    pub fn drain_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<()> {
        let n = self.pending().len();
        if n > 0 {
            writer.write_all(self.pending())?;
            self.mark_drained(n);
        }
        Ok(())
    }

    /// Get the encoded data.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.take_pending()
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prob_constants() {
        assert_eq!(PROB_INIT, 1024);
        assert_eq!(PROB_MAX, 2048);
    }

    #[test]
    fn test_price_table_shape() {
        // Even odds cost exactly one bit.
        assert_eq!(price0(PROB_INIT), 1 << PRICE_SHIFT_BITS);
        assert_eq!(price1(PROB_INIT), 1 << PRICE_SHIFT_BITS);

        // Prices never rise as the probability of the coded bit rises.
        let mut last = u32::MAX;
        for prob in 31..=(PROB_MAX - 31) {
            let p = price0(prob);
            assert!(p <= last, "price0 increased at prob {prob}");
            last = p;
        }

        assert_eq!(bit_price(300, 1), price1(300));
        assert_eq!(direct_bits_price(26), 26 * 64);
    }

    #[test]
    fn test_range_encoder_basic() {
        let encoder = RangeEncoder::new();
        assert_eq!(encoder.range, 0xFFFF_FFFF);
        assert_eq!(encoder.processed_size(), 5);
    }

    #[test]
    fn test_encode_decode_bits() {
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;

        encoder.encode_bit(&mut prob, 0);
        encoder.encode_bit(&mut prob, 1);
        encoder.encode_bit(&mut prob, 0);
        encoder.encode_bit(&mut prob, 1);

        let encoded = encoder.finish();
        assert_eq!(encoded[0], 0x00);

        let mut decoder = RangeDecoder::new(Cursor::new(encoded)).unwrap();
        let mut prob = PROB_INIT;

        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 0);
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 1);
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 0);
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 1);
    }

    #[test]
    fn test_direct_bits_and_skewed_probabilities() {
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for _ in 0..500 {
            encoder.encode_bit(&mut prob, 0);
        }
        encoder.encode_direct_bits(0x2AB_CDEF, 26);
        encoder.encode_bit(&mut prob, 1);
        let encoded = encoder.finish();

        let mut decoder = RangeDecoder::new(Cursor::new(encoded)).unwrap();
        let mut prob = PROB_INIT;
        for _ in 0..500 {
            assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 0);
        }
        assert_eq!(decoder.decode_direct_bits(26).unwrap(), 0x2AB_CDEF);
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 1);
    }

    #[test]
    fn test_probability_stays_in_range() {
        let mut prob = PROB_INIT;
        let mut encoder = RangeEncoder::new();
        for _ in 0..10_000 {
            encoder.encode_bit(&mut prob, 0);
            assert!(prob > 0 && prob < PROB_MAX);
        }
        for _ in 0..10_000 {
            encoder.encode_bit(&mut prob, 1);
            assert!(prob > 0 && prob < PROB_MAX);
        }
    }

    #[test]
    fn test_drain_tracks_processed_size() {
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for i in 0..4000u32 {
            encoder.encode_bit(&mut prob, i % 3 & 1);
        }
        let before = encoder.processed_size();
        let mut sink = Vec::new();
        encoder.drain_to(&mut sink).unwrap();
        assert!(encoder.pending().is_empty());
        assert_eq!(encoder.processed_size(), before);

        let mut small = [0u8; 1];
        encoder.flush();
        let n = encoder.drain_into(&mut small);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_partial_drains_preserve_order() {
        let encode = |encoder: &mut RangeEncoder| {
            let mut prob = PROB_INIT;
            for i in 0..3000u32 {
                encoder.encode_bit(&mut prob, (i * 7 % 5 == 0) as u32);
            }
            encoder.encode_direct_bits(0xBEEF, 16);
        };

        let mut whole = RangeEncoder::new();
        encode(&mut whole);
        let expected = whole.finish();

        let mut encoder = RangeEncoder::new();
        encode(&mut encoder);
        encoder.flush();
        let total = encoder.processed_size();
        let mut out = Vec::new();
        let mut chunk = [0u8; 7];
        loop {
            let n = encoder.drain_into(&mut chunk);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
            assert_eq!(encoder.processed_size(), total);
        }
        assert_eq!(out, expected);
        assert!(encoder.take_pending().is_empty());
    }

    #[test]
    fn test_bad_first_byte() {
        let result = RangeDecoder::new(Cursor::new(vec![0x01, 0, 0, 0, 0]));
        assert!(matches!(result, Err(RomArcError::CorruptedData { .. })));
    }

    #[test]
    fn test_truncated_preamble() {
        let result = RangeDecoder::new(Cursor::new(vec![0x00, 0x12]));
        match result {
            Err(RomArcError::TruncatedStream { offset }) => assert_eq!(offset, 2),
            other => panic!("expected truncation, got {other:?}"),
        }
    }
}
