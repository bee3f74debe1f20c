//! `.lzma` framing and `io` adapters.
//!
//! A `.lzma` file is a 13-byte header followed by a raw range-coded stream:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 1    | lc/lp/pb property byte |
//! | 1      | 4    | dictionary size, little-endian |
//! | 5      | 8    | uncompressed size, little-endian; `u64::MAX` = unknown |
//!
//! A stream of unknown size must be terminated by an end marker.

use crate::decoder::LzmaDecoder;
use crate::encoder::{BlockStatus, LzmaEncoder};
use crate::model::LzmaProperties;
use crate::options::{LzmaOptions, PROPERTIES_SIZE};
use log::{debug, warn};
use romarc_core::error::{Result, RomArcError};
use std::io::{self, Read, Write};

/// Size of the `.lzma` header.
pub const HEADER_SIZE: usize = PROPERTIES_SIZE + 8;

/// Uncompressed-size value meaning "unknown, look for the end marker".
pub const UNKNOWN_SIZE: u64 = u64::MAX;

const IO_BUFFER_SIZE: usize = 1 << 16;

/// Parsed `.lzma` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaHeader {
    /// Literal and position bits.
    pub props: LzmaProperties,
    /// Dictionary size the stream was encoded with.
    pub dict_size: u32,
    /// Uncompressed size, when recorded.
    pub unpacked_size: Option<u64>,
}

impl LzmaHeader {
    /// Serialize to the on-disk layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..PROPERTIES_SIZE].copy_from_slice(&self.props.encode_header(self.dict_size));
        out[PROPERTIES_SIZE..]
            .copy_from_slice(&self.unpacked_size.unwrap_or(UNKNOWN_SIZE).to_le_bytes());
        out
    }

    /// Parse the on-disk layout.
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let mut props_blob = [0u8; PROPERTIES_SIZE];
        props_blob.copy_from_slice(&bytes[..PROPERTIES_SIZE]);
        let (props, dict_size) = LzmaProperties::decode_header(&props_blob)?;

        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[PROPERTIES_SIZE..]);
        let size = u64::from_le_bytes(size);

        Ok(Self {
            props,
            dict_size,
            unpacked_size: (size != UNKNOWN_SIZE).then_some(size),
        })
    }

    /// Read and parse a header from `reader`.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            match reader.read(&mut bytes[filled..]) {
                Ok(0) => return Err(RomArcError::truncated(filled as u64)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Self::parse(&bytes)
    }

    /// Header describing a stream encoded with `options`.
    pub fn for_options(options: &LzmaOptions, unpacked_size: Option<u64>) -> Self {
        Self {
            props: options.properties(),
            dict_size: options.dict_size,
            unpacked_size,
        }
    }
}

/// Compress `data` into a `.lzma` file image.
///
/// The uncompressed size is recorded unless the options ask for an end
/// marker, in which case the size is left unknown.
pub fn compress(data: &[u8], options: &LzmaOptions) -> Result<Vec<u8>> {
    let size = (!options.end_marker).then_some(data.len() as u64);
    let header = LzmaHeader::for_options(options, size);
    let body = compress_raw(data, options)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Compress `data` into a bare range-coded stream with no header.
pub fn compress_raw(data: &[u8], options: &LzmaOptions) -> Result<Vec<u8>> {
    let mut encoder = LzmaEncoder::new(options)?;
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    let mut rest = data;
    loop {
        if !rest.is_empty() {
            let n = encoder.fill(rest);
            rest = &rest[n..];
            if rest.is_empty() {
                encoder.finish_input();
            }
        } else {
            encoder.finish_input();
        }
        let status = encoder.code_one_block()?;
        encoder.drain_output(&mut out)?;
        if status == BlockStatus::Done {
            return Ok(out);
        }
    }
}

/// Decompress a `.lzma` file read from `reader`.
pub fn decompress<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let header = LzmaHeader::read_from(&mut reader)?;
    LzmaDecoder::new(reader, header.props, header.dict_size, header.unpacked_size)?.decode_all()
}

/// Decompress a bare range-coded stream.
pub fn decompress_raw<R: Read>(
    reader: R,
    props: LzmaProperties,
    dict_size: u32,
    unpacked_size: Option<u64>,
) -> Result<Vec<u8>> {
    LzmaDecoder::new(reader, props, dict_size, unpacked_size)?.decode_all()
}

/// Decompress a `.lzma` file image held in memory.
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = data;
    let header = LzmaHeader::read_from(&mut reader)?;
    let mut decoder =
        LzmaDecoder::new(reader, header.props, header.dict_size, header.unpacked_size)?;
    let mut out = Vec::new();
    decoder.decode_to(&mut out)?;

    let rest = decoder.into_inner();
    if !rest.is_empty() {
        warn!("{} bytes of trailing data after LZMA stream ignored", rest.len());
    }
    Ok(out)
}

/// Stream `reader` into `writer` as a `.lzma` file of unknown size.
///
/// Memory stays bounded by the dictionary; the end marker is always written.
/// Returns the number of uncompressed bytes read.
pub fn encode_stream<R, W>(reader: R, writer: W, options: &LzmaOptions) -> Result<u64>
where
    R: Read,
    W: Write,
{
    encode_stream_with_progress(reader, writer, options, |_, _| {})
}

/// [`encode_stream`] that reports `(bytes in, bytes out)` after every block.
pub fn encode_stream_with_progress<R, W, F>(
    reader: R,
    writer: W,
    options: &LzmaOptions,
    progress: F,
) -> Result<u64>
where
    R: Read,
    W: Write,
    F: FnMut(u64, u64),
{
    let options = options.clone().with_end_marker(true);
    encode_framed(reader, writer, &options, None, progress)
}

/// Stream exactly `size` bytes of `reader` into `writer` as a `.lzma` file.
///
/// The size is recorded in the header unless `options` ask for an end
/// marker. A reader that ends early fails with
/// [`io::ErrorKind::UnexpectedEof`]; bytes past `size` are not read.
pub fn encode_sized_with_progress<R, W, F>(
    reader: R,
    writer: W,
    options: &LzmaOptions,
    size: u64,
    progress: F,
) -> Result<u64>
where
    R: Read,
    W: Write,
    F: FnMut(u64, u64),
{
    let recorded = (!options.end_marker).then_some(size);
    let read = encode_framed(reader.take(size), writer, options, recorded, progress)?;
    if read != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("input ended after {read} of {size} bytes"),
        )
        .into());
    }
    Ok(read)
}

fn encode_framed<R, W, F>(
    mut reader: R,
    mut writer: W,
    options: &LzmaOptions,
    unpacked_size: Option<u64>,
    mut progress: F,
) -> Result<u64>
where
    R: Read,
    W: Write,
    F: FnMut(u64, u64),
{
    let mut encoder = LzmaEncoder::new(options)?;
    writer.write_all(&LzmaHeader::for_options(options, unpacked_size).to_bytes())?;

    let mut buf = vec![0u8; IO_BUFFER_SIZE];
    let (mut start, mut end) = (0, 0);
    loop {
        match encoder.code_one_block()? {
            BlockStatus::Done => break,
            BlockStatus::MoreWork => {}
            BlockStatus::NeedsInput => {
                if start == end {
                    let n = read_some(&mut reader, &mut buf)?;
                    if n == 0 {
                        encoder.finish_input();
                    }
                    (start, end) = (0, n);
                }
                start += encoder.fill(&buf[start..end]);
            }
        }
        encoder.drain_output(&mut writer)?;
        progress(encoder.processed_in(), encoder.processed_out());
    }
    encoder.drain_output(&mut writer)?;
    writer.flush()?;
    progress(encoder.processed_in(), encoder.processed_out());

    debug!(
        "encoded stream: {} -> {} bytes",
        encoder.processed_in(),
        encoder.processed_out() + HEADER_SIZE as u64
    );
    Ok(encoder.processed_in())
}

fn read_some<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            result => return result,
        }
    }
}

/// Push-style compressor writing a `.lzma` file of unknown size.
///
/// Call [`finish`](Self::finish) to write the end marker; a writer that is
/// dropped instead leaves a stream without one, which decoders reject as
/// truncated.
#[derive(Debug)]
pub struct LzmaWriter<W: Write> {
    inner: W,
    encoder: LzmaEncoder,
}

impl<W: Write> LzmaWriter<W> {
    /// Write the header and start a session.
    pub fn new(mut inner: W, options: &LzmaOptions) -> Result<Self> {
        let options = options.clone().with_end_marker(true);
        let encoder = LzmaEncoder::new(&options)?;
        inner.write_all(&LzmaHeader::for_options(&options, None).to_bytes())?;
        Ok(Self { inner, encoder })
    }

    /// Code as much as the buffered input allows and pass the output on.
    fn pump(&mut self) -> Result<()> {
        while self.encoder.code_one_block()? == BlockStatus::MoreWork {
            self.encoder.drain_output(&mut self.inner)?;
        }
        self.encoder.drain_output(&mut self.inner)
    }

    /// Complete the stream and return the wrapped writer.
    pub fn finish(mut self) -> Result<W> {
        self.encoder.finish_input();
        while self.encoder.code_one_block()? != BlockStatus::Done {
            self.encoder.drain_output(&mut self.inner)?;
        }
        self.encoder.drain_output(&mut self.inner)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for LzmaWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.encoder.fill(buf);
            self.pump()?;
            if n > 0 {
                return Ok(n);
            }
        }
    }

    /// Passes on everything coded so far. Input still held as lookahead is
    /// only coded by more writes or [`finish`](LzmaWriter::finish).
    fn flush(&mut self) -> io::Result<()> {
        self.encoder.drain_output(&mut self.inner)?;
        self.inner.flush()
    }
}

/// Pull-style decompressor.
#[derive(Debug)]
pub struct LzmaReader<R: Read> {
    decoder: LzmaDecoder<R>,
    header: LzmaHeader,
}

impl<R: Read> LzmaReader<R> {
    /// Read the `.lzma` header from `reader` and prepare to decode.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = LzmaHeader::read_from(&mut reader)?;
        let decoder =
            LzmaDecoder::new(reader, header.props, header.dict_size, header.unpacked_size)?;
        Ok(Self { decoder, header })
    }

    /// The parsed `.lzma` header.
    pub fn header(&self) -> &LzmaHeader {
        &self.header
    }

    /// Compressed bytes consumed so far, header excluded.
    pub fn compressed_consumed(&self) -> u64 {
        self.decoder.consumed()
    }
}

impl<R: Read> Read for LzmaReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}
