//! LZMA decompression.
//!
//! [`LzmaDecoder`] pulls compressed bytes from any [`Read`] and hands out
//! decompressed bytes through its own [`Read`] implementation, so a match
//! longer than the caller's buffer is copied out across several calls.

use crate::bit_tree;
use crate::encoder::tail;
use crate::model::{
    DIST_ALIGN_BITS, END_MARKER_DISTANCE, END_POS_MODEL_INDEX, LzmaModel, LzmaProperties,
    MATCH_LEN_MIN, RepDistances, START_POS_MODEL_INDEX, State, len_to_pos_state, slot_footer,
};
use crate::range_coder::RangeDecoder;
use log::{debug, trace};
use romarc_core::error::{Result, RomArcError};
use std::io::{self, Read, Write};

/// Smallest dictionary buffer the decoder allocates.
const MIN_DICT_BUFFER: usize = 1 << 12;

/// Circular history of decoded bytes.
///
/// The buffer grows with the output until it reaches `capacity`, then wraps.
#[derive(Debug)]
struct OutWindow {
    buf: Vec<u8>,
    capacity: usize,
    pos: usize,
    /// Bytes ever written, preset dictionary included.
    total: u64,
}

impl OutWindow {
    fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
            pos: 0,
            total: 0,
        }
    }

    #[inline]
    fn put(&mut self, byte: u8) {
        if self.pos == self.buf.len() {
            self.grow();
            self.buf.push(byte);
        } else {
            self.buf[self.pos] = byte;
        }
        self.pos += 1;
        if self.pos == self.capacity {
            self.pos = 0;
        }
        self.total += 1;
    }

    /// Reserve more room, doubling up to `capacity`.
    fn grow(&mut self) {
        if self.buf.len() == self.buf.capacity() {
            let len = self.buf.len();
            self.buf
                .reserve_exact(len.max(MIN_DICT_BUFFER).min(self.capacity - len));
        }
    }

    /// Byte `dist + 1` positions back. Callers check [`has`](Self::has) first.
    #[inline]
    fn get(&self, dist: u32) -> u8 {
        let dist = dist as usize;
        let index = if dist < self.pos {
            self.pos - dist - 1
        } else {
            self.buf.len() + self.pos - dist - 1
        };
        self.buf[index]
    }

    /// Whether zero-based distance `dist` refers to a byte still held.
    #[inline]
    fn has(&self, dist: u32) -> bool {
        (dist as u64) < self.total && (dist as usize) < self.buf.len()
    }

    fn last_byte(&self) -> u8 {
        if self.total == 0 { 0 } else { self.get(0) }
    }

    fn history(&self) -> u64 {
        self.total.min(self.buf.len() as u64)
    }
}

/// Streaming LZMA decoder.
#[derive(Debug)]
pub struct LzmaDecoder<R: Read> {
    rc: RangeDecoder<R>,
    model: LzmaModel,
    window: OutWindow,
    dict_size: u32,
    pos_state_mask: u32,
    state: State,
    reps: RepDistances,
    unpacked_size: Option<u64>,
    /// Decoded bytes, preset dictionary excluded.
    produced: u64,
    /// Bytes of the current match still to be copied out.
    pending_len: u32,
    finished: bool,
}

impl<R: Read> LzmaDecoder<R> {
    /// Create a decoder for a raw stream.
    ///
    /// With `unpacked_size` unknown the stream must end with an end marker.
    pub fn new(
        reader: R,
        props: LzmaProperties,
        dict_size: u32,
        unpacked_size: Option<u64>,
    ) -> Result<Self> {
        let rc = RangeDecoder::new(reader)?;
        let buffer = dict_buffer_size(dict_size, unpacked_size, 0);
        debug!(
            "LZMA decoder: lc {} lp {} pb {} dict {} buffer {} size {:?}",
            props.lc, props.lp, props.pb, dict_size, buffer, unpacked_size
        );

        Ok(Self {
            rc,
            model: LzmaModel::new(props),
            window: OutWindow::new(buffer),
            dict_size,
            pos_state_mask: props.pos_state_mask(),
            state: State::new(),
            reps: RepDistances::default(),
            unpacked_size,
            produced: 0,
            pending_len: 0,
            finished: false,
        })
    }

    /// Create a decoder whose history starts with `preset`.
    pub fn with_preset(
        reader: R,
        props: LzmaProperties,
        dict_size: u32,
        unpacked_size: Option<u64>,
        preset: &[u8],
    ) -> Result<Self> {
        let mut decoder = Self::new(reader, props, dict_size, unpacked_size)?;
        decoder.set_preset_dictionary(preset)?;
        Ok(decoder)
    }

    /// Load the bytes an encoder was trained with. Only valid before the first read.
    pub fn set_preset_dictionary(&mut self, preset: &[u8]) -> Result<()> {
        if self.produced > 0 || self.window.total > 0 {
            return Err(RomArcError::invalid_config(
                "preset dictionary must be set before decoding starts",
            ));
        }
        let preset = tail(preset, self.dict_size);
        let buffer = dict_buffer_size(self.dict_size, self.unpacked_size, preset.len() as u64);
        if buffer != self.window.capacity {
            self.window = OutWindow::new(buffer);
        }
        for &byte in preset {
            self.window.put(byte);
        }
        debug!("LZMA decoder preset with {} bytes", preset.len());
        Ok(())
    }

    /// Decoded bytes handed out so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Compressed bytes consumed so far, range coder preamble included.
    pub fn consumed(&self) -> u64 {
        self.rc.consumed()
    }

    /// Whether the end of the stream has been reached and all output handed out.
    pub fn is_finished(&self) -> bool {
        self.finished && self.pending_len == 0
    }

    /// Recover the underlying reader; bytes after the stream are still unread.
    pub fn into_inner(self) -> R {
        self.rc.into_inner()
    }

    /// Decode the whole stream into `writer`, returning the number of bytes written.
    pub fn decode_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<u64> {
        let mut buf = vec![0u8; 1 << 16];
        let mut total = 0u64;
        loop {
            let n = self.decode_into(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            writer.write_all(&buf[..n])?;
            total += n as u64;
        }
    }

    /// Decode everything that remains into a vector.
    pub fn decode_all(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.decode_to(&mut out)?;
        Ok(out)
    }

    /// Fill `out` with decoded bytes; zero means the stream is complete.
    pub fn decode_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        while written < out.len() {
            if self.pending_len > 0 {
                let byte = self.window.get(self.reps.rep0());
                self.window.put(byte);
                out[written] = byte;
                written += 1;
                self.produced += 1;
                self.pending_len -= 1;
                continue;
            }
            if self.finished {
                break;
            }
            if self.unpacked_size.is_some_and(|size| self.produced >= size) {
                trace!("LZMA decoder reached declared size {}", self.produced);
                self.finished = true;
                break;
            }
            if let Some(byte) = self.decode_symbol()? {
                out[written] = byte;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Decode one literal or match. A literal or short rep is returned;
    /// a longer match is queued in `pending_len`.
    fn decode_symbol(&mut self) -> Result<Option<u8>> {
        let pos_state = (self.produced as u32 & self.pos_state_mask) as usize;
        let s = self.state.index();

        if self.rc.decode_bit(&mut self.model.is_match[s][pos_state])? == 0 {
            let sub = self
                .model
                .literal
                .sub_coder(self.produced, self.window.last_byte());
            let byte = if self.state.is_char_state() {
                self.model.literal.decode(&mut self.rc, sub)?
            } else {
                let match_byte = self.window.get(self.reps.rep0());
                self.model
                    .literal
                    .decode_matched(&mut self.rc, sub, match_byte)?
            };
            self.state.update_char();
            return Ok(Some(self.emit(byte)));
        }

        let len = if self.rc.decode_bit(&mut self.model.is_rep[s])? == 0 {
            let len = self.model.match_len.decode(&mut self.rc, pos_state)? + MATCH_LEN_MIN;
            self.state.update_match();
            let dist = self.decode_distance(len)?;
            if dist == END_MARKER_DISTANCE {
                self.end_marker()?;
                return Ok(None);
            }
            self.reps.push(dist);
            len
        } else {
            if self.rc.decode_bit(&mut self.model.is_rep_g0[s])? == 0 {
                if self.rc.decode_bit(&mut self.model.is_rep0_long[s][pos_state])? == 0 {
                    self.check_distance(self.reps.rep0())?;
                    self.state.update_short_rep();
                    let byte = self.window.get(self.reps.rep0());
                    return Ok(Some(self.emit(byte)));
                }
            } else if self.rc.decode_bit(&mut self.model.is_rep_g1[s])? == 0 {
                self.reps.promote(1);
            } else if self.rc.decode_bit(&mut self.model.is_rep_g2[s])? == 0 {
                self.reps.promote(2);
            } else {
                self.reps.promote(3);
            }
            self.state.update_rep();
            self.model.rep_len.decode(&mut self.rc, pos_state)? + MATCH_LEN_MIN
        };

        self.check_distance(self.reps.rep0())?;
        if let Some(size) = self.unpacked_size {
            if self.produced + len as u64 > size {
                return Err(RomArcError::corrupted(
                    self.rc.consumed(),
                    format!(
                        "match of length {len} at {} runs past declared size {size}",
                        self.produced
                    ),
                ));
            }
        }
        self.pending_len = len;
        Ok(None)
    }

    #[inline]
    fn emit(&mut self, byte: u8) -> u8 {
        self.window.put(byte);
        self.produced += 1;
        byte
    }

    fn check_distance(&self, dist: u32) -> Result<()> {
        if self.window.has(dist) {
            Ok(())
        } else {
            Err(RomArcError::invalid_distance(
                dist as u64 + 1,
                self.window.history(),
            ))
        }
    }

    fn end_marker(&mut self) -> Result<()> {
        if let Some(size) = self.unpacked_size {
            return Err(RomArcError::corrupted(
                self.rc.consumed(),
                format!(
                    "end marker after {} of {size} declared bytes",
                    self.produced
                ),
            ));
        }
        if !self.rc.is_finished_ok() {
            return Err(RomArcError::corrupted(
                self.rc.consumed(),
                "range coder not drained at end marker",
            ));
        }
        trace!("LZMA decoder hit end marker after {} bytes", self.produced);
        self.finished = true;
        Ok(())
    }

    fn decode_distance(&mut self, len: u32) -> Result<u32> {
        let slot = self.model.pos_slot[len_to_pos_state(len)].decode(&mut self.rc)?;
        if slot < START_POS_MODEL_INDEX {
            return Ok(slot);
        }

        let (footer_bits, base) = slot_footer(slot);
        if slot < END_POS_MODEL_INDEX {
            let reduced = bit_tree::decode_reverse(
                &mut self.model.pos_special,
                (base - slot) as usize,
                &mut self.rc,
                footer_bits,
            )?;
            Ok(base + reduced)
        } else {
            let direct = self
                .rc
                .decode_direct_bits(footer_bits - DIST_ALIGN_BITS)?;
            let align = self.model.pos_align.decode_reverse(&mut self.rc)?;
            Ok(base.wrapping_add(direct << DIST_ALIGN_BITS).wrapping_add(align))
        }
    }
}

impl<R: Read> Read for LzmaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.decode_into(buf)?)
    }
}

/// History buffer length: the dictionary, unless the whole output (plus preset) is smaller.
fn dict_buffer_size(dict_size: u32, unpacked_size: Option<u64>, preset_len: u64) -> usize {
    let dict = dict_size as u64;
    let needed = match unpacked_size {
        Some(size) => dict.min(size.saturating_add(preset_len)),
        None => dict,
    };
    (needed as usize).max(MIN_DICT_BUFFER)
}
