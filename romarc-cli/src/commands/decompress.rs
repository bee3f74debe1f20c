//! Decompress command implementation.

use super::for_each_file;
use crate::utils::{CliResult, copy_mtime, create_progress_bar, decompressed_path};
use indicatif::{MultiProgress, ProgressBar};
use log::debug;
use romarc_lzma::{HEADER_SIZE, LzmaReader};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const COPY_BUFFER_SIZE: usize = 1 << 16;

pub fn cmd_decompress(
    files: &[PathBuf],
    keep: bool,
    force: bool,
    verbose: bool,
    progress: bool,
) -> CliResult {
    for_each_file(files, "decompression", |file, multi| {
        let output = decompressed_path(file)
            .ok_or_else(|| format!("{}: unknown suffix, expected .lzma", file.display()))?;
        if output.exists() && !force {
            return Err(format!("{} already exists (use --force)", output.display()).into());
        }

        let result = File::create(&output)
            .map_err(Into::into)
            .and_then(|out| decode_file(file, BufWriter::new(out), multi, progress));
        let unpacked = match result {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&output);
                return Err(e);
            }
        };

        copy_mtime(file, &output)?;
        if !keep {
            fs::remove_file(file)?;
        }
        if verbose {
            println!(
                "  {} -> {} ({} bytes)",
                file.display(),
                output.display(),
                unpacked
            );
        }
        Ok(())
    })
}

/// Decode `input` into `out`, returning the number of bytes produced.
pub(crate) fn decode_file<W: Write>(
    input: &Path,
    mut out: W,
    multi: &MultiProgress,
    progress: bool,
) -> CliResult<u64> {
    let packed = fs::metadata(input)?.len();
    let mut reader = LzmaReader::new(BufReader::new(File::open(input)?))?;
    let header = reader.header();
    debug!(
        "{}: {}, dict {} bytes, size {:?}",
        input.display(),
        header.props,
        header.dict_size,
        header.unpacked_size
    );

    let pb = create_progress_bar(multi, packed, progress);
    pb.set_message(input.display().to_string());
    match copy_decoded(&mut reader, &mut out, &pb) {
        Ok(n) => {
            pb.finish_and_clear();
            Ok(n)
        }
        Err(e) => {
            pb.abandon();
            Err(e)
        }
    }
}

fn copy_decoded<R: Read, W: Write>(
    reader: &mut LzmaReader<R>,
    out: &mut W,
    pb: &ProgressBar,
) -> CliResult<u64> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        total += n as u64;
        pb.set_position(reader.compressed_consumed() + HEADER_SIZE as u64);
    }
    out.flush()?;
    Ok(total)
}
