//! LZMA encoder.
//!
//! The encoder is a restartable session: input is pushed with
//! [`LzmaEncoder::fill`], and [`LzmaEncoder::code_one_block`] codes up to
//! 4096 positions per call before yielding. A call also yields early when
//! fewer than the required lookahead bytes are buffered and input is still
//! open, which keeps the output independent of how the input was chunked.
//!
//! Each step asks the optimal parser for the cheapest next decision
//! (literal, short rep, rep match or match) and emits it through the range
//! coder, keeping the state machine and rep distances in sync with what a
//! decoder will reconstruct.

use crate::bit_tree;
use crate::match_finder::{BinTreeMatchFinder, MatchPair};
use crate::model::{
    DIST_ALIGN_BITS, DIST_ALIGN_MASK, DIST_ALIGN_SIZE, DIST_SLOT_BITS, END_MARKER_DISTANCE,
    END_POS_MODEL_INDEX, FULL_DISTANCES, LzmaModel, MATCH_LEN_MAX, MATCH_LEN_MIN,
    NUM_LEN_TO_POS_STATES, NUM_REP_DISTANCES, RepDistances, START_POS_MODEL_INDEX, State,
    dist_slot, len_to_pos_state, slot_footer,
};
use crate::optimal::{BACK_LITERAL, INFINITY_PRICE, LenPriceTable, NUM_OPTS, Optimal, backward};
use crate::options::LzmaOptions;
use crate::range_coder::{RangeEncoder, bit_price, direct_bits_price, price0, price1};
use log::{debug, trace};
use romarc_core::error::{Result, RomArcError};
use romarc_core::traits::{CompressStatus, Compressor, FlushMode};
use std::io::Write;

/// Positions coded per [`LzmaEncoder::code_one_block`] call.
const BLOCK_POSITIONS: u64 = 1 << 12;

/// Coded matches between distance price refreshes.
const DIST_PRICE_REFRESH: u32 = 1 << 7;

/// Outcome of one [`LzmaEncoder::code_one_block`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// A block was coded; call again.
    MoreWork,
    /// More input (or [`LzmaEncoder::finish_input`]) is needed before coding can continue.
    NeedsInput,
    /// The stream is complete and flushed.
    Done,
}

/// LZMA encoder session.
#[derive(Debug)]
pub struct LzmaEncoder {
    options: LzmaOptions,
    model: LzmaModel,
    rc: RangeEncoder,
    mf: BinTreeMatchFinder,

    state: State,
    previous_byte: u8,
    reps: RepDistances,

    match_len_prices: LenPriceTable,
    rep_len_prices: LenPriceTable,
    pos_slot_prices: Vec<u32>,
    distance_prices: Vec<u32>,
    align_prices: [u32; DIST_ALIGN_SIZE],
    match_price_count: u32,
    align_price_count: u32,

    optimum: Vec<Optimal>,
    matches: Vec<MatchPair>,
    longest_match_len: u32,
    longest_match_found: bool,
    additional_offset: u32,
    optimum_end_index: u32,
    optimum_current_index: u32,

    dist_table_size: u32,
    pos_state_mask: u32,
    fast_bytes: u32,

    now_pos: u64,
    train_remaining: u32,
    input_started: bool,
    finished: bool,
}

impl LzmaEncoder {
    /// Create an encoder session. Options are validated before anything is allocated.
    pub fn new(options: &LzmaOptions) -> Result<Self> {
        options.validate()?;

        let props = options.properties();
        let mut mf = BinTreeMatchFinder::new(
            options.match_finder,
            options.dict_size,
            NUM_OPTS,
            options.fast_bytes,
            MATCH_LEN_MAX + 1 + NUM_OPTS,
        );
        mf.init();

        debug!(
            "LZMA encoder: dict {} fb {} lc {} lp {} pb {} mf {} eos {}",
            options.dict_size,
            options.fast_bytes,
            options.lc,
            options.lp,
            options.pb,
            options.match_finder,
            options.end_marker
        );

        let table_size = (options.fast_bytes + 1 - MATCH_LEN_MIN) as usize;
        let mut encoder = Self {
            options: options.clone(),
            model: LzmaModel::new(props),
            rc: RangeEncoder::new(),
            mf,
            state: State::new(),
            previous_byte: 0,
            reps: RepDistances::default(),
            match_len_prices: LenPriceTable::new(table_size),
            rep_len_prices: LenPriceTable::new(table_size),
            pos_slot_prices: vec![0; NUM_LEN_TO_POS_STATES << DIST_SLOT_BITS],
            distance_prices: vec![0; NUM_LEN_TO_POS_STATES * FULL_DISTANCES],
            align_prices: [0; DIST_ALIGN_SIZE],
            match_price_count: 0,
            align_price_count: 0,
            optimum: vec![Optimal::default(); NUM_OPTS as usize],
            matches: Vec::with_capacity(MATCH_LEN_MAX as usize + 1),
            longest_match_len: 0,
            longest_match_found: false,
            additional_offset: 0,
            optimum_end_index: 0,
            optimum_current_index: 0,
            dist_table_size: options.dist_table_size(),
            pos_state_mask: props.pos_state_mask(),
            fast_bytes: options.fast_bytes,
            now_pos: 0,
            train_remaining: 0,
            input_started: false,
            finished: false,
        };

        encoder.init_prices();
        Ok(encoder)
    }

    /// Start a new stream with the same options, keeping every allocation.
    ///
    /// Buffered input, pending output and any trained preset are discarded.
    pub fn reset(&mut self) {
        self.model.reset();
        self.rc = RangeEncoder::new();
        self.mf.init();
        self.state = State::new();
        self.previous_byte = 0;
        self.reps = RepDistances::default();
        self.matches.clear();
        self.longest_match_len = 0;
        self.longest_match_found = false;
        self.additional_offset = 0;
        self.optimum_end_index = 0;
        self.optimum_current_index = 0;
        self.now_pos = 0;
        self.train_remaining = 0;
        self.input_started = false;
        self.finished = false;
        self.init_prices();
        trace!("LZMA encoder reset");
    }

    fn init_prices(&mut self) {
        self.fill_distances_prices();
        self.fill_align_prices();
        let num_pos_states = self.model.props.num_pos_states();
        self.match_len_prices
            .update_tables(&self.model.match_len, num_pos_states);
        self.rep_len_prices
            .update_tables(&self.model.rep_len, num_pos_states);
    }

    /// Prime the dictionary with `data` so the first input bytes can refer to it.
    ///
    /// Must be called before any input is filled. A decoder needs the same
    /// bytes via [`LzmaDecoder::set_preset_dictionary`].
    ///
    /// [`LzmaDecoder::set_preset_dictionary`]: crate::decoder::LzmaDecoder::set_preset_dictionary
    pub fn train(&mut self, data: &[u8]) -> Result<()> {
        if self.input_started || self.now_pos > 0 {
            return Err(RomArcError::invalid_config(
                "dictionary training must happen before input is supplied",
            ));
        }
        let data = tail(data, self.options.dict_size);
        let accepted = self.mf.fill(data);
        debug_assert_eq!(accepted, data.len());
        self.train_remaining = accepted as u32;
        debug!("LZMA encoder trained with {accepted} preset bytes");
        Ok(())
    }

    /// Append input. Returns how many bytes were accepted; zero means the
    /// window is full and [`code_one_block`](Self::code_one_block) must run first.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let n = self.mf.fill(data);
        if n > 0 {
            self.input_started = true;
        }
        n
    }

    /// Declare that no more input will follow.
    pub fn finish_input(&mut self) {
        self.mf.finish();
    }

    /// Whether the stream has been completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Input bytes coded so far.
    pub fn processed_in(&self) -> u64 {
        self.now_pos
    }

    /// Compressed size so far, including bytes still held in the range coder.
    pub fn processed_out(&self) -> u64 {
        self.rc.processed_size()
    }

    /// Take the compressed bytes produced so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.rc.take_pending()
    }

    /// Write the compressed bytes produced so far to `writer`.
    pub fn drain_output<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<()> {
        self.rc.drain_to(writer)?;
        Ok(())
    }

    /// Number of compressed bytes waiting to be drained.
    pub fn pending_output(&self) -> usize {
        self.rc.pending().len()
    }

    /// Code the next block of input.
    pub fn code_one_block(&mut self) -> Result<BlockStatus> {
        if self.finished {
            return Ok(BlockStatus::Done);
        }

        let progress_start = self.now_pos;

        if self.now_pos == 0 {
            if self.train_remaining > 0 {
                while self.train_remaining > 0 && !self.mf.is_data_starved() {
                    self.mf.skip(1);
                    self.train_remaining -= 1;
                }
                if self.train_remaining == 0 {
                    self.previous_byte = self.mf.byte_at(-1);
                }
            }
            if self.mf.is_data_starved() {
                return Ok(BlockStatus::NeedsInput);
            }
            if self.mf.available() == 0 {
                self.flush();
                return Ok(BlockStatus::Done);
            }

            // Only primes the match finder; the first byte is always a literal.
            self.read_match_distances();
            let pos_state = self.pos_state(self.now_pos);
            self.rc.encode_bit(
                &mut self.model.is_match[self.state.index()][pos_state],
                0,
            );
            self.state.update_char();
            let cur_byte = self.mf.byte_at(-(self.additional_offset as i64));
            let sub = self.model.literal.sub_coder(self.now_pos, self.previous_byte);
            self.model.literal.encode(&mut self.rc, sub, cur_byte);
            self.previous_byte = cur_byte;
            self.additional_offset -= 1;
            self.now_pos += 1;
        }

        if self.additional_offset == 0 {
            if self.mf.is_data_starved() {
                return Ok(BlockStatus::NeedsInput);
            }
            if self.mf.available() == 0 {
                self.flush();
                return Ok(BlockStatus::Done);
            }
        }

        loop {
            if self.mf.is_data_starved() {
                return Ok(BlockStatus::NeedsInput);
            }

            let (len, back) = self.get_optimum(self.now_pos as u32)?;
            self.emit(len, back);

            self.additional_offset -= len;
            self.now_pos += len as u64;

            if self.additional_offset == 0 {
                if self.match_price_count >= DIST_PRICE_REFRESH {
                    self.fill_distances_prices();
                }
                if self.align_price_count >= DIST_ALIGN_SIZE as u32 {
                    self.fill_align_prices();
                }
                if self.mf.is_data_starved() {
                    return Ok(BlockStatus::NeedsInput);
                }
                if self.mf.available() == 0 {
                    self.flush();
                    return Ok(BlockStatus::Done);
                }
                if self.now_pos - progress_start >= BLOCK_POSITIONS {
                    return Ok(BlockStatus::MoreWork);
                }
            }
        }
    }

    #[inline]
    fn pos_state(&self, pos: u64) -> usize {
        (pos as u32 & self.pos_state_mask) as usize
    }

    /// Code one parse decision.
    fn emit(&mut self, len: u32, back: u32) {
        let pos_state = self.pos_state(self.now_pos);
        let s = self.state.index();

        if len == 1 && back == BACK_LITERAL {
            self.rc.encode_bit(&mut self.model.is_match[s][pos_state], 0);
            let cur_byte = self.mf.byte_at(-(self.additional_offset as i64));
            let sub = self.model.literal.sub_coder(self.now_pos, self.previous_byte);
            if self.state.is_char_state() {
                self.model.literal.encode(&mut self.rc, sub, cur_byte);
            } else {
                let match_byte = self
                    .mf
                    .byte_at(-(self.reps.rep0() as i64) - 1 - self.additional_offset as i64);
                self.model
                    .literal
                    .encode_matched(&mut self.rc, sub, match_byte, cur_byte);
            }
            self.previous_byte = cur_byte;
            self.state.update_char();
            return;
        }

        self.rc.encode_bit(&mut self.model.is_match[s][pos_state], 1);
        if back < NUM_REP_DISTANCES as u32 {
            self.rc.encode_bit(&mut self.model.is_rep[s], 1);
            if back == 0 {
                self.rc.encode_bit(&mut self.model.is_rep_g0[s], 0);
                self.rc.encode_bit(
                    &mut self.model.is_rep0_long[s][pos_state],
                    u32::from(len != 1),
                );
            } else {
                self.rc.encode_bit(&mut self.model.is_rep_g0[s], 1);
                if back == 1 {
                    self.rc.encode_bit(&mut self.model.is_rep_g1[s], 0);
                } else {
                    self.rc.encode_bit(&mut self.model.is_rep_g1[s], 1);
                    self.rc.encode_bit(&mut self.model.is_rep_g2[s], back - 2);
                }
            }
            if len == 1 {
                self.state.update_short_rep();
            } else {
                self.model
                    .rep_len
                    .encode(&mut self.rc, len - MATCH_LEN_MIN, pos_state);
                self.rep_len_prices
                    .note_coded(&self.model.rep_len, pos_state);
                self.state.update_rep();
            }
            self.reps.promote(back as usize);
        } else {
            self.rc.encode_bit(&mut self.model.is_rep[s], 0);
            self.state.update_match();
            self.model
                .match_len
                .encode(&mut self.rc, len - MATCH_LEN_MIN, pos_state);
            self.match_len_prices
                .note_coded(&self.model.match_len, pos_state);
            let dist = back - NUM_REP_DISTANCES as u32;
            self.encode_distance(dist, len);
            self.reps.push(dist);
            self.match_price_count += 1;
        }

        self.previous_byte = self
            .mf
            .byte_at(len as i64 - 1 - self.additional_offset as i64);
    }

    fn encode_distance(&mut self, dist: u32, len: u32) {
        let slot = dist_slot(dist);
        self.model.pos_slot[len_to_pos_state(len)].encode(&mut self.rc, slot);

        if slot >= START_POS_MODEL_INDEX {
            let (footer_bits, base) = slot_footer(slot);
            let reduced = dist - base;
            if slot < END_POS_MODEL_INDEX {
                bit_tree::encode_reverse(
                    &mut self.model.pos_special,
                    (base - slot) as usize,
                    &mut self.rc,
                    footer_bits,
                    reduced,
                );
            } else {
                self.rc
                    .encode_direct_bits(reduced >> DIST_ALIGN_BITS, footer_bits - DIST_ALIGN_BITS);
                self.model
                    .pos_align
                    .encode_reverse(&mut self.rc, reduced & DIST_ALIGN_MASK);
                self.align_price_count += 1;
            }
        }
    }

    /// Finish the stream: optional end marker, then the range coder tail.
    fn flush(&mut self) {
        if self.options.end_marker {
            let pos_state = self.pos_state(self.now_pos);
            let s = self.state.index();
            self.rc.encode_bit(&mut self.model.is_match[s][pos_state], 1);
            self.rc.encode_bit(&mut self.model.is_rep[s], 0);
            self.state.update_match();
            self.model.match_len.encode(&mut self.rc, 0, pos_state);
            self.match_len_prices
                .note_coded(&self.model.match_len, pos_state);
            self.encode_distance(END_MARKER_DISTANCE, MATCH_LEN_MIN);
        }
        self.rc.flush();
        self.finished = true;
        debug!(
            "LZMA encoder finished: {} bytes in, {} bytes out",
            self.now_pos,
            self.rc.processed_size()
        );
    }

    /// Fetch matches at the next position; returns the longest length,
    /// extended past `fast_bytes` when the finder stopped there.
    fn read_match_distances(&mut self) -> u32 {
        self.mf.get_matches(&mut self.matches);
        let mut len = 0;
        if let Some(last) = self.matches.last() {
            len = last.len;
            if len == self.fast_bytes {
                len += self
                    .mf
                    .match_len(len as i64 - 1, last.dist, MATCH_LEN_MAX - len);
            }
        }
        self.additional_offset += 1;
        len
    }

    fn move_pos(&mut self, num: u32) {
        if num > 0 {
            self.mf.skip(num);
            self.additional_offset += num;
        }
    }

    fn fill_distances_prices(&mut self) {
        let mut temp_prices = [0u32; FULL_DISTANCES];
        for (dist, price) in temp_prices
            .iter_mut()
            .enumerate()
            .skip(START_POS_MODEL_INDEX as usize)
        {
            let slot = dist_slot(dist as u32);
            let (footer_bits, base) = slot_footer(slot);
            *price = bit_tree::reverse_price(
                &self.model.pos_special,
                (base - slot) as usize,
                footer_bits,
                dist as u32 - base,
            );
        }

        for lps in 0..NUM_LEN_TO_POS_STATES {
            let st = lps << DIST_SLOT_BITS;
            let tree = &self.model.pos_slot[lps];
            for slot in 0..self.dist_table_size {
                let mut price = tree.price(slot);
                if slot >= END_POS_MODEL_INDEX {
                    price += direct_bits_price((slot >> 1) - 1 - DIST_ALIGN_BITS);
                }
                self.pos_slot_prices[st + slot as usize] = price;
            }

            let st2 = lps * FULL_DISTANCES;
            for dist in 0..FULL_DISTANCES {
                let slot_price = self.pos_slot_prices[st + dist_slot(dist as u32) as usize];
                self.distance_prices[st2 + dist] = if dist < START_POS_MODEL_INDEX as usize {
                    slot_price
                } else {
                    slot_price + temp_prices[dist]
                };
            }
        }

        self.match_price_count = 0;
        trace!("distance prices refreshed at position {}", self.now_pos);
    }

    fn fill_align_prices(&mut self) {
        for (i, price) in self.align_prices.iter_mut().enumerate() {
            *price = self.model.pos_align.reverse_price(i as u32);
        }
        self.align_price_count = 0;
        trace!("align prices refreshed at position {}", self.now_pos);
    }

    fn rep_len1_price(&self, state: State, pos_state: usize) -> u32 {
        price0(self.model.is_rep_g0[state.index()])
            + price0(self.model.is_rep0_long[state.index()][pos_state])
    }

    fn pure_rep_price(&self, rep_index: u32, state: State, pos_state: usize) -> u32 {
        let s = state.index();
        if rep_index == 0 {
            price0(self.model.is_rep_g0[s]) + price1(self.model.is_rep0_long[s][pos_state])
        } else {
            let mut price = price1(self.model.is_rep_g0[s]);
            if rep_index == 1 {
                price += price0(self.model.is_rep_g1[s]);
            } else {
                price += price1(self.model.is_rep_g1[s]);
                price += bit_price(self.model.is_rep_g2[s], rep_index - 2);
            }
            price
        }
    }

    fn rep_price(&self, rep_index: u32, len: u32, state: State, pos_state: usize) -> u32 {
        self.rep_len_prices.price(len - MATCH_LEN_MIN, pos_state)
            + self.pure_rep_price(rep_index, state, pos_state)
    }

    fn pos_len_price(&self, dist: u32, len: u32, pos_state: usize) -> u32 {
        let lps = len_to_pos_state(len);
        let price = if (dist as usize) < FULL_DISTANCES {
            self.distance_prices[lps * FULL_DISTANCES + dist as usize]
        } else {
            self.pos_slot_prices[(lps << DIST_SLOT_BITS) + dist_slot(dist) as usize]
                + self.align_prices[(dist & DIST_ALIGN_MASK) as usize]
        };
        price + self.match_len_prices.price(len - MATCH_LEN_MIN, pos_state)
    }

    fn literal_price(
        &self,
        pos: u32,
        prev_byte: u8,
        matched: bool,
        match_byte: u8,
        byte: u8,
    ) -> u32 {
        let sub = self.model.literal.sub_coder(pos as u64, prev_byte);
        self.model.literal.price(sub, matched, match_byte, byte)
    }

    /// Extend the parse horizon to `end`, marking new nodes unreachable.
    fn extend_len_end(&mut self, len_end: &mut u32, end: u32) {
        while *len_end < end {
            *len_end += 1;
            self.optimum[*len_end as usize].price = INFINITY_PRICE;
        }
    }

    /// Relax node `index` with a plain step from `pos_prev`.
    fn relax(&mut self, index: u32, price: u32, pos_prev: u32, back_prev: u32) {
        let opt = &mut self.optimum[index as usize];
        if price < opt.price {
            opt.price = price;
            opt.pos_prev = pos_prev;
            opt.back_prev = back_prev;
            opt.prev1_is_char = false;
        }
    }

    /// Relax node `index` with a step ending in literal + rep0.
    fn relax_combo(&mut self, index: u32, price: u32, pos_prev: u32, first: Option<(u32, u32)>) {
        let opt = &mut self.optimum[index as usize];
        if price < opt.price {
            opt.price = price;
            opt.pos_prev = pos_prev;
            opt.back_prev = 0;
            opt.prev1_is_char = true;
            match first {
                Some((pos_prev2, back_prev2)) => {
                    opt.prev2 = true;
                    opt.pos_prev2 = pos_prev2;
                    opt.back_prev2 = back_prev2;
                }
                None => opt.prev2 = false,
            }
        }
    }

    /// Pick the next decision: `(length, back)` where `back` is
    /// [`BACK_LITERAL`], a rep index, or distance + 4.
    fn get_optimum(&mut self, mut position: u32) -> Result<(u32, u32)> {
        if self.optimum_end_index != self.optimum_current_index {
            let cur = self.optimum_current_index as usize;
            let len = self.optimum[cur].pos_prev - self.optimum_current_index;
            let back = self.optimum[cur].back_prev;
            self.optimum_current_index = self.optimum[cur].pos_prev;
            return Ok((len, back));
        }
        self.optimum_current_index = 0;
        self.optimum_end_index = 0;

        let len_main = if self.longest_match_found {
            self.longest_match_found = false;
            self.longest_match_len
        } else {
            self.read_match_distances()
        };

        let num_available = self.mf.available() + 1;
        if num_available < 2 {
            return Ok((1, BACK_LITERAL));
        }

        let mut reps = self.reps;
        let mut rep_lens = [0u32; NUM_REP_DISTANCES];
        let mut rep_max_index = 0;
        for i in 0..NUM_REP_DISTANCES {
            rep_lens[i] = self.mf.match_len(-1, reps.get(i), MATCH_LEN_MAX);
            if rep_lens[i] > rep_lens[rep_max_index] {
                rep_max_index = i;
            }
        }
        if rep_lens[rep_max_index] >= self.fast_bytes {
            let len = rep_lens[rep_max_index];
            self.move_pos(len - 1);
            return Ok((len, rep_max_index as u32));
        }

        if len_main >= self.fast_bytes {
            let Some(last) = self.matches.last() else {
                return Err(RomArcError::invariant("long match reported without a distance"));
            };
            let back = last.dist + NUM_REP_DISTANCES as u32;
            self.move_pos(len_main - 1);
            return Ok((len_main, back));
        }

        let current_byte = self.mf.byte_at(-1);
        let match_byte = self.mf.byte_at(-(reps.rep0() as i64) - 2);

        if len_main < 2 && current_byte != match_byte && rep_lens[rep_max_index] < 2 {
            return Ok((1, BACK_LITERAL));
        }

        let state = self.state;
        self.optimum[0].state = state;
        let pos_state = (position & self.pos_state_mask) as usize;
        let s = state.index();

        self.optimum[1].price = price0(self.model.is_match[s][pos_state])
            + self.literal_price(
                position,
                self.previous_byte,
                !state.is_char_state(),
                match_byte,
                current_byte,
            );
        self.optimum[1].make_as_char();

        let match_price = price1(self.model.is_match[s][pos_state]);
        let rep_match_price = match_price + price1(self.model.is_rep[s]);

        if match_byte == current_byte {
            let short_rep_price = rep_match_price + self.rep_len1_price(state, pos_state);
            if short_rep_price < self.optimum[1].price {
                self.optimum[1].price = short_rep_price;
                self.optimum[1].make_as_short_rep();
            }
        }

        let mut len_end = len_main.max(rep_lens[rep_max_index]);
        if len_end < 2 {
            return Ok((1, self.optimum[1].back_prev));
        }

        self.optimum[1].pos_prev = 0;
        self.optimum[0].backs = reps;

        for len in 2..=len_end {
            self.optimum[len as usize].price = INFINITY_PRICE;
        }

        for (i, &rep_len) in rep_lens.iter().enumerate() {
            if rep_len < 2 {
                continue;
            }
            let price = rep_match_price + self.pure_rep_price(i as u32, state, pos_state);
            for len in (2..=rep_len).rev() {
                let total = price + self.rep_len_prices.price(len - MATCH_LEN_MIN, pos_state);
                self.relax(len, total, 0, i as u32);
            }
        }

        let normal_match_price = match_price + price0(self.model.is_rep[s]);

        let mut len = if rep_lens[0] >= 2 { rep_lens[0] + 1 } else { 2 };
        if len <= len_main {
            let mut offs = 0;
            while len > self.matches[offs].len {
                offs += 1;
            }
            loop {
                let dist = self.matches[offs].dist;
                let total = normal_match_price + self.pos_len_price(dist, len, pos_state);
                self.relax(len, total, 0, dist + NUM_REP_DISTANCES as u32);
                if len == self.matches[offs].len {
                    offs += 1;
                    if offs == self.matches.len() {
                        break;
                    }
                }
                len += 1;
            }
        }

        let mut cur = 0u32;
        loop {
            cur += 1;
            if cur == len_end {
                return self.finish_parse(cur);
            }

            let mut new_len = self.read_match_distances();
            if new_len >= self.fast_bytes {
                self.longest_match_len = new_len;
                self.longest_match_found = true;
                return self.finish_parse(cur);
            }
            position = position.wrapping_add(1);

            let cur_opt = self.optimum[cur as usize];
            let mut pos_prev = cur_opt.pos_prev;
            let mut state;
            if cur_opt.prev1_is_char {
                pos_prev -= 1;
                if cur_opt.prev2 {
                    state = self.optimum[cur_opt.pos_prev2 as usize].state;
                    if cur_opt.back_prev2 < NUM_REP_DISTANCES as u32 {
                        state.update_rep();
                    } else {
                        state.update_match();
                    }
                } else {
                    state = self.optimum[pos_prev as usize].state;
                }
                state.update_char();
            } else {
                state = self.optimum[pos_prev as usize].state;
            }

            if pos_prev == cur - 1 {
                if cur_opt.is_short_rep() {
                    state.update_short_rep();
                } else {
                    state.update_char();
                }
                reps = self.optimum[pos_prev as usize].backs;
            } else {
                let back;
                if cur_opt.prev1_is_char && cur_opt.prev2 {
                    pos_prev = cur_opt.pos_prev2;
                    back = cur_opt.back_prev2;
                    state.update_rep();
                } else {
                    back = cur_opt.back_prev;
                    if back < NUM_REP_DISTANCES as u32 {
                        state.update_rep();
                    } else {
                        state.update_match();
                    }
                }
                reps = self.optimum[pos_prev as usize].backs;
                if back < NUM_REP_DISTANCES as u32 {
                    reps.promote(back as usize);
                } else {
                    reps.push(back - NUM_REP_DISTANCES as u32);
                }
            }
            self.optimum[cur as usize].state = state;
            self.optimum[cur as usize].backs = reps;
            let cur_price = self.optimum[cur as usize].price;

            let current_byte = self.mf.byte_at(-1);
            let match_byte = self.mf.byte_at(-(reps.rep0() as i64) - 2);
            let pos_state = (position & self.pos_state_mask) as usize;
            let s = state.index();

            let cur_and1_price = cur_price
                + price0(self.model.is_match[s][pos_state])
                + self.literal_price(
                    position,
                    self.mf.byte_at(-2),
                    !state.is_char_state(),
                    match_byte,
                    current_byte,
                );

            let mut next_is_char = false;
            {
                let next = &mut self.optimum[cur as usize + 1];
                if cur_and1_price < next.price {
                    next.price = cur_and1_price;
                    next.pos_prev = cur;
                    next.make_as_char();
                    next_is_char = true;
                }
            }

            let match_price = cur_price + price1(self.model.is_match[s][pos_state]);
            let rep_match_price = match_price + price1(self.model.is_rep[s]);

            let next = self.optimum[cur as usize + 1];
            if match_byte == current_byte && !(next.pos_prev < cur && next.back_prev == 0) {
                let short_rep_price = rep_match_price + self.rep_len1_price(state, pos_state);
                let next = &mut self.optimum[cur as usize + 1];
                if short_rep_price <= next.price {
                    next.price = short_rep_price;
                    next.pos_prev = cur;
                    next.make_as_short_rep();
                    next_is_char = true;
                }
            }

            let num_available_full = (self.mf.available() + 1).min(NUM_OPTS - 1 - cur);
            if num_available_full < 2 {
                continue;
            }
            let num_available = num_available_full.min(self.fast_bytes);

            if !next_is_char && match_byte != current_byte {
                // Literal followed by rep0.
                let limit = (num_available_full - 1).min(self.fast_bytes);
                let len_test2 = self.mf.match_len(0, reps.rep0(), limit);
                if len_test2 >= 2 {
                    let mut state2 = state;
                    state2.update_char();
                    let pos_state_next = (position.wrapping_add(1) & self.pos_state_mask) as usize;
                    let next_rep_match_price = cur_and1_price
                        + price1(self.model.is_match[state2.index()][pos_state_next])
                        + price1(self.model.is_rep[state2.index()]);
                    let offset = cur + 1 + len_test2;
                    self.extend_len_end(&mut len_end, offset);
                    let total =
                        next_rep_match_price + self.rep_price(0, len_test2, state2, pos_state_next);
                    self.relax_combo(offset, total, cur + 1, None);
                }
            }

            let mut start_len = 2;

            for rep_index in 0..NUM_REP_DISTANCES as u32 {
                let rep_dist = reps.get(rep_index as usize);
                let len_test = self.mf.match_len(-1, rep_dist, num_available);
                if len_test < 2 {
                    continue;
                }

                self.extend_len_end(&mut len_end, cur + len_test);
                for l in (2..=len_test).rev() {
                    let total = rep_match_price + self.rep_price(rep_index, l, state, pos_state);
                    self.relax(cur + l, total, cur, rep_index);
                }

                if rep_index == 0 {
                    start_len = len_test + 1;
                }

                if len_test < num_available_full {
                    // Rep match, literal, rep0.
                    let limit = (num_available_full - 1 - len_test).min(self.fast_bytes);
                    let len_test2 = self.mf.match_len(len_test as i64, rep_dist, limit);
                    if len_test2 >= 2 {
                        let mut state2 = state;
                        state2.update_rep();
                        let pos_after = position.wrapping_add(len_test);
                        let pos_state_next = (pos_after & self.pos_state_mask) as usize;
                        let lt = len_test as i64;
                        let cur_and_len_char_price = rep_match_price
                            + self.rep_price(rep_index, len_test, state, pos_state)
                            + price0(self.model.is_match[state2.index()][pos_state_next])
                            + self.literal_price(
                                pos_after,
                                self.mf.byte_at(lt - 2),
                                true,
                                self.mf.byte_at(lt - 1 - (rep_dist as i64 + 1)),
                                self.mf.byte_at(lt - 1),
                            );
                        state2.update_char();
                        let pos_state_next =
                            (pos_after.wrapping_add(1) & self.pos_state_mask) as usize;
                        let next_rep_match_price = cur_and_len_char_price
                            + price1(self.model.is_match[state2.index()][pos_state_next])
                            + price1(self.model.is_rep[state2.index()]);

                        let offset = len_test + 1 + len_test2;
                        self.extend_len_end(&mut len_end, cur + offset);
                        let total = next_rep_match_price
                            + self.rep_price(0, len_test2, state2, pos_state_next);
                        self.relax_combo(
                            cur + offset,
                            total,
                            cur + len_test + 1,
                            Some((cur, rep_index)),
                        );
                    }
                }
            }

            if new_len > num_available {
                new_len = num_available;
                let mut k = 0;
                while new_len > self.matches[k].len {
                    k += 1;
                }
                self.matches[k].len = new_len;
                self.matches.truncate(k + 1);
            }

            if new_len >= start_len {
                let normal_match_price = match_price + price0(self.model.is_rep[s]);
                self.extend_len_end(&mut len_end, cur + new_len);

                let mut offs = 0;
                while start_len > self.matches[offs].len {
                    offs += 1;
                }

                let mut len_test = start_len;
                loop {
                    let cur_back = self.matches[offs].dist;
                    let cur_and_len_price =
                        normal_match_price + self.pos_len_price(cur_back, len_test, pos_state);
                    self.relax(
                        cur + len_test,
                        cur_and_len_price,
                        cur,
                        cur_back + NUM_REP_DISTANCES as u32,
                    );

                    if len_test == self.matches[offs].len {
                        if len_test < num_available_full {
                            // Match, literal, rep0.
                            let limit = (num_available_full - 1 - len_test).min(self.fast_bytes);
                            let len_test2 = self.mf.match_len(len_test as i64, cur_back, limit);
                            if len_test2 >= 2 {
                                let mut state2 = state;
                                state2.update_match();
                                let pos_after = position.wrapping_add(len_test);
                                let pos_state_next = (pos_after & self.pos_state_mask) as usize;
                                let lt = len_test as i64;
                                let cur_and_len_char_price = cur_and_len_price
                                    + price0(self.model.is_match[state2.index()][pos_state_next])
                                    + self.literal_price(
                                        pos_after,
                                        self.mf.byte_at(lt - 2),
                                        true,
                                        self.mf.byte_at(lt - (cur_back as i64 + 1) - 1),
                                        self.mf.byte_at(lt - 1),
                                    );
                                state2.update_char();
                                let pos_state_next =
                                    (pos_after.wrapping_add(1) & self.pos_state_mask) as usize;
                                let next_rep_match_price = cur_and_len_char_price
                                    + price1(self.model.is_match[state2.index()][pos_state_next])
                                    + price1(self.model.is_rep[state2.index()]);

                                let offset = len_test + 1 + len_test2;
                                self.extend_len_end(&mut len_end, cur + offset);
                                let total = next_rep_match_price
                                    + self.rep_price(0, len_test2, state2, pos_state_next);
                                self.relax_combo(
                                    cur + offset,
                                    total,
                                    cur + len_test + 1,
                                    Some((cur, cur_back + NUM_REP_DISTANCES as u32)),
                                );
                            }
                        }
                        offs += 1;
                        if offs == self.matches.len() {
                            break;
                        }
                    }
                    len_test += 1;
                }
            }
        }
    }

    fn finish_parse(&mut self, cur: u32) -> Result<(u32, u32)> {
        self.optimum_end_index = cur;
        let (first_end, back) = backward(&mut self.optimum, cur)?;
        self.optimum_current_index = first_end;
        Ok((first_end, back))
    }
}

impl Compressor for LzmaEncoder {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        let mut consumed = self.fill(input);
        if flush == FlushMode::Finish && consumed == input.len() {
            self.finish_input();
        }

        while self.pending_output() < output.len() && !self.finished {
            match self.code_one_block()? {
                BlockStatus::MoreWork => {}
                BlockStatus::NeedsInput => {
                    // Coding freed window space; take more of this call's input.
                    let more = self.fill(&input[consumed..]);
                    if more == 0 {
                        break;
                    }
                    consumed += more;
                    if flush == FlushMode::Finish && consumed == input.len() {
                        self.finish_input();
                    }
                }
                BlockStatus::Done => break,
            }
        }

        let produced = self.rc.drain_into(output);
        let status = if self.pending_output() > 0 {
            CompressStatus::NeedsOutput
        } else if self.finished {
            CompressStatus::Done
        } else {
            CompressStatus::NeedsInput
        };
        Ok((consumed, produced, status))
    }

    fn reset(&mut self) {
        LzmaEncoder::reset(self);
    }

    fn is_finished(&self) -> bool {
        self.finished && self.pending_output() == 0
    }
}

/// Last `max` bytes of `data`.
pub(crate) fn tail(data: &[u8], max: u32) -> &[u8] {
    &data[data.len().saturating_sub(max as usize)..]
}
