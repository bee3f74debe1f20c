//! End-to-end behaviour of the LZMA codec: round trips across configurations,
//! compression of characteristic inputs, determinism and error reporting.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use romarc_core::error::RomArcError;
use romarc_core::traits::Compressor;
use romarc_lzma::{
    BlockStatus, LzmaDecoder, LzmaEncoder, LzmaOptions, LzmaProperties, MatchFinderKind,
    compress, compress_raw, decompress_bytes, decompress_raw,
};
use std::io::Cursor;

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// Text-ish data with repeats at many distances.
fn mixed_corpus(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let words: [&[u8]; 8] = [
        b"alpha ", b"beta ", b"gamma ", b"delta ", b"rom ", b"set ", b"merge ", b"crc32 ",
    ];
    let mut data = Vec::with_capacity(len);
    while data.len() < len {
        match rng.random_range(0..10) {
            0 => data.push(rng.random()),
            1 if data.len() > 300 => {
                let back = rng.random_range(1..300);
                let run = rng.random_range(3..40);
                let start = data.len() - back;
                for i in 0..run {
                    let byte = data[start + i];
                    data.push(byte);
                }
            }
            _ => data.extend_from_slice(words[rng.random_range(0..words.len())]),
        }
    }
    data.truncate(len);
    data
}

fn roundtrip_raw(data: &[u8], opts: &LzmaOptions) -> Vec<u8> {
    let raw = compress_raw(data, opts).unwrap();
    let size = (!opts.end_marker).then_some(data.len() as u64);
    let out = decompress_raw(Cursor::new(&raw), opts.properties(), opts.dict_size, size).unwrap();
    assert_eq!(out, data, "roundtrip mismatch for {opts:?}");
    raw
}

#[test]
fn test_empty_input() {
    let packed = compress(b"", &LzmaOptions::default()).unwrap();
    assert_eq!(decompress_bytes(&packed).unwrap(), b"");

    let plain = compress_raw(b"", &LzmaOptions::default()).unwrap();
    let marked = roundtrip_raw(b"", &LzmaOptions::default().with_end_marker(true));
    // The marked stream carries only the end marker: a handful of bytes, no literals.
    assert!(marked.len() > plain.len());
    assert!(marked.len() <= plain.len() + 8, "{} bytes", marked.len());
}

#[test]
fn test_single_byte() {
    for byte in [0u8, 0x41, 0xFF] {
        roundtrip_raw(&[byte], &LzmaOptions::default());
        roundtrip_raw(&[byte], &LzmaOptions::default().with_end_marker(true));
    }
}

#[test]
fn test_repeated_byte_run() {
    let data = vec![b'A'; 1000];
    let raw = roundtrip_raw(&data, &LzmaOptions::default());
    assert!(raw.len() < 50, "1000 x 'A' took {} bytes", raw.len());
}

#[test]
fn test_random_data_overhead() {
    let data = random_bytes(0x5EED, 64 * 1024);
    let raw = roundtrip_raw(&data, &LzmaOptions::default());
    // Adaptive literal coding costs roughly 1% on incompressible input.
    let limit = data.len() + data.len() / 50;
    assert!(raw.len() <= limit, "{} > {limit}", raw.len());
}

#[test]
fn test_selects_distant_match() {
    // 50-byte pattern, 150 bytes of noise, then the pattern again: 200 bytes back.
    let pattern = random_bytes(1, 50);
    let mut data = pattern.clone();
    data.extend_from_slice(&random_bytes(2, 150));
    data.extend_from_slice(&pattern);

    let with_repeat = roundtrip_raw(&data, &LzmaOptions::default());

    let mut without = data.clone();
    without[200..].copy_from_slice(&random_bytes(3, 50));
    let no_repeat = roundtrip_raw(&without, &LzmaOptions::default());

    // Fifty literals cost about fifty bytes; one match costs a few.
    assert!(
        with_repeat.len() + 35 < no_repeat.len(),
        "{} vs {}",
        with_repeat.len(),
        no_repeat.len()
    );
}

#[test]
fn test_dictionary_smaller_than_input() {
    let block = random_bytes(9, 6000);
    let mut data = block.clone();
    data.extend_from_slice(&random_bytes(10, 5000));
    data.extend_from_slice(&block);

    let small = LzmaOptions::default().with_dict_size(1 << 12);
    let raw_small = roundtrip_raw(&data, &small);

    // The decoder's history is only 4 KiB: a longer distance would be rejected.
    let raw_large = roundtrip_raw(&data, &LzmaOptions::default());
    assert!(raw_large.len() + 4000 < raw_small.len());
}

#[test]
fn test_configuration_matrix() {
    let data = mixed_corpus(42, 20_000);
    for kind in [MatchFinderKind::Bt2, MatchFinderKind::Bt4] {
        for (lc, lp, pb) in [(3, 0, 2), (0, 0, 0), (8, 0, 0), (0, 4, 4), (4, 2, 1)] {
            for fast_bytes in [5, 32, 273] {
                let opts = LzmaOptions::default()
                    .with_match_finder(kind)
                    .with_literal_bits(lc, lp, pb)
                    .with_fast_bytes(fast_bytes)
                    .with_dict_size(1 << 16);
                let raw = roundtrip_raw(&data, &opts);
                assert!(raw.len() < data.len() / 2, "{opts:?}: {}", raw.len());
            }
        }
    }
}

#[test]
fn test_long_input_crosses_many_blocks() {
    let data = mixed_corpus(7, 300_000);
    let opts = LzmaOptions::preset(1).unwrap();
    roundtrip_raw(&data, &opts);
    roundtrip_raw(&data, &opts.with_end_marker(true));
}

#[test]
fn test_deterministic_output() {
    let data = mixed_corpus(3, 50_000);
    let opts = LzmaOptions::preset(5).unwrap();
    assert_eq!(compress(&data, &opts).unwrap(), compress(&data, &opts).unwrap());
}

#[test]
fn test_chunked_feed_matches_one_shot() {
    let data = mixed_corpus(11, 40_000);
    let opts = LzmaOptions::default();
    let expected = compress_raw(&data, &opts).unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    let mut enc = LzmaEncoder::new(&opts).unwrap();
    let mut out = Vec::new();
    let mut rest = &data[..];
    while !rest.is_empty() {
        let take = rng.random_range(1..3000).min(rest.len());
        let n = enc.fill(&rest[..take]);
        rest = &rest[n..];
        while enc.code_one_block().unwrap() == BlockStatus::MoreWork {
            enc.drain_output(&mut out).unwrap();
        }
    }
    enc.finish_input();
    while enc.code_one_block().unwrap() != BlockStatus::Done {}
    enc.drain_output(&mut out).unwrap();

    assert_eq!(out, expected);
}

#[test]
fn test_compressor_trait_matches_one_shot() {
    let data = mixed_corpus(5, 30_000);
    let opts = LzmaOptions::default();
    let expected = compress_raw(&data, &opts).unwrap();
    let mut enc = LzmaEncoder::new(&opts).unwrap();
    assert_eq!(enc.compress_all(&data).unwrap(), expected);
}

#[test]
fn test_invalid_configuration_rejected_up_front() {
    let cases = [
        LzmaOptions::default().with_fast_bytes(4),
        LzmaOptions::default().with_fast_bytes(274),
        LzmaOptions::default().with_dict_size(1 << 11),
        LzmaOptions::default().with_literal_bits(9, 0, 2),
        LzmaOptions::default().with_literal_bits(3, 5, 2),
        LzmaOptions::default().with_literal_bits(3, 0, 5),
    ];
    for opts in cases {
        assert!(LzmaEncoder::new(&opts).unwrap_err().is_config_error(), "{opts:?}");
        assert!(compress(b"data", &opts).unwrap_err().is_config_error());
    }
    assert!("HC4".parse::<MatchFinderKind>().unwrap_err().is_config_error());
}

#[test]
fn test_truncated_stream_reports_error() {
    let data = mixed_corpus(21, 10_000);
    let packed = compress(&data, &LzmaOptions::default()).unwrap();
    for cut in [0, 5, 13, 20, packed.len() / 2, packed.len() - 1] {
        let err = decompress_bytes(&packed[..cut]).unwrap_err();
        assert!(err.is_truncation(), "cut at {cut}: {err:?}");
    }
}

#[test]
fn test_error_converts_to_io_error() {
    let packed = compress(b"some bytes to cut", &LzmaOptions::default()).unwrap();
    let mut reader = romarc_lzma::LzmaReader::new(&packed[..packed.len() - 3]).unwrap();
    let mut out = Vec::new();
    let err = std::io::Read::read_to_end(&mut reader, &mut out).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn test_preset_dictionary_roundtrip() {
    let preset = mixed_corpus(30, 8000);
    let data = {
        let mut d = preset[2000..5000].to_vec();
        d.extend_from_slice(b" plus a fresh tail");
        d
    };
    let opts = LzmaOptions::default().with_dict_size(1 << 16);

    let mut enc = LzmaEncoder::new(&opts).unwrap();
    enc.train(&preset).unwrap();
    enc.fill(&data);
    enc.finish_input();
    while enc.code_one_block().unwrap() != BlockStatus::Done {}
    let raw = enc.take_output();

    let plain = compress_raw(&data, &opts).unwrap();
    assert!(raw.len() * 4 < plain.len(), "{} vs {}", raw.len(), plain.len());

    let dec = LzmaDecoder::with_preset(
        Cursor::new(raw),
        opts.properties(),
        opts.dict_size,
        Some(data.len() as u64),
        &preset,
    )
    .unwrap();
    assert_eq!(dec.decode_all().unwrap(), data);
}

#[test]
fn test_invalid_distance_detected() {
    // A stream that starts with a match has nothing to refer to.
    let mut rc = romarc_lzma::RangeEncoder::new();
    let mut model = romarc_lzma::LzmaModel::new(LzmaProperties::default());
    rc.encode_bit(&mut model.is_match[0][0], 1);
    rc.encode_bit(&mut model.is_rep[0], 1);
    rc.encode_bit(&mut model.is_rep_g0[0], 0);
    rc.encode_bit(&mut model.is_rep0_long[0][0], 0);
    let raw = rc.finish();

    let err = decompress_raw(Cursor::new(raw), LzmaProperties::default(), 1 << 16, Some(1))
        .unwrap_err();
    assert!(
        matches!(err, RomArcError::InvalidDistance { distance: 1, history_size: 0 }),
        "{err:?}"
    );
}
