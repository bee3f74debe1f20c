//! # RomArc LZMA
//!
//! LZMA (Lempel-Ziv-Markov chain Algorithm) compression and decompression,
//! bit-compatible with the standard LZMA format used by 7-Zip archives and
//! `.lzma` files.
//!
//! ## Features
//!
//! - **Pure Rust** implementation
//! - **Optimal-parse encoder** with BT2/BT4 binary-tree match finders
//! - **Restartable sessions**: [`LzmaEncoder::code_one_block`] codes a bounded
//!   unit of work per call, so large inputs stream through with bounded memory
//! - **Streaming decoder** implementing [`std::io::Read`]
//! - Dictionary pre-training (preset dictionaries)
//!
//! ## Usage
//!
//! ```
//! use romarc_lzma::{LzmaOptions, compress, decompress_bytes};
//!
//! let data = b"Hello, World! Hello, World! Hello, World!";
//! let packed = compress(data, &LzmaOptions::preset(6)?)?;
//! assert_eq!(decompress_bytes(&packed)?, data);
//! # Ok::<(), romarc_core::RomArcError>(())
//! ```
//!
//! Streaming through `io` adapters:
//!
//! ```
//! use romarc_lzma::{LzmaOptions, LzmaReader, LzmaWriter};
//! use std::io::{Read, Write};
//!
//! let mut writer = LzmaWriter::new(Vec::new(), &LzmaOptions::default())?;
//! writer.write_all(b"streamed payload")?;
//! let packed = writer.finish()?;
//!
//! let mut out = Vec::new();
//! LzmaReader::new(&packed[..])?.read_to_end(&mut out)?;
//! assert_eq!(out, b"streamed payload");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Layout
//!
//! - [`range_coder`]: adaptive binary range coder and the price table
//! - [`bit_tree`]: forward and reverse bit-tree codes
//! - [`model`]: state machine, rep distances and probability model
//! - [`window`] / [`match_finder`]: input window and binary-tree match finder
//! - [`optimal`]: optimal-parse arena and length price tables
//! - [`encoder`] / [`decoder`]: the two coding drivers
//! - [`stream`]: `.lzma` framing and `io` adapters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bit_tree;
pub mod decoder;
pub mod encoder;
pub mod match_finder;
pub mod model;
pub mod optimal;
pub mod options;
pub mod range_coder;
pub mod stream;
pub mod window;

// Re-exports
pub use decoder::LzmaDecoder;
pub use encoder::{BlockStatus, LzmaEncoder};
pub use match_finder::{BinTreeMatchFinder, MatchPair};
pub use model::{LzmaModel, LzmaProperties, State};
pub use options::{LzmaOptions, MatchFinderKind};
pub use range_coder::{RangeDecoder, RangeEncoder};
pub use stream::{
    HEADER_SIZE, LzmaHeader, LzmaReader, LzmaWriter, UNKNOWN_SIZE, compress, compress_raw,
    decompress, decompress_bytes, decompress_raw, encode_sized_with_progress, encode_stream,
    encode_stream_with_progress,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress_single_byte() {
        let original = b"A";
        let compressed = compress(original, &LzmaOptions::default()).unwrap();
        assert_eq!(decompress_bytes(&compressed).unwrap(), original);
    }

    #[test]
    fn test_compress_decompress_hello() {
        let original = b"Hello";
        let compressed = compress(original, &LzmaOptions::default()).unwrap();
        assert_eq!(decompress_bytes(&compressed).unwrap(), original);
    }

    #[test]
    fn test_compression_levels() {
        let data =
            b"Hello World! This is a test of LZMA compression with various levels.".repeat(8);
        for level in 0..=9 {
            let opts = LzmaOptions::preset(level).unwrap();
            let compressed = compress(&data, &opts).unwrap();
            let decompressed = decompress_bytes(&compressed).unwrap();
            assert_eq!(decompressed, data, "level {level} roundtrip failed");
            assert!(compressed.len() < data.len() / 3, "level {level}");
        }
    }

    #[test]
    fn test_optimal_parse_beats_literals() {
        let mut data = Vec::new();
        for _ in 0..10 {
            data.extend_from_slice(b"The quick brown fox jumps over the lazy dog. ");
        }
        let compressed = compress(&data, &LzmaOptions::preset(9).unwrap()).unwrap();
        assert_eq!(decompress_bytes(&compressed).unwrap(), data);
        assert!(compressed.len() < 80, "got {}", compressed.len());
    }
}
