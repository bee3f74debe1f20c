//! Compress command implementation.

use super::for_each_file;
use crate::utils::{CliResult, compressed_path, copy_mtime, create_progress_bar, space_savings};
use indicatif::MultiProgress;
use log::{debug, info};
use romarc_lzma::{LzmaOptions, MatchFinderKind, encode_sized_with_progress};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Settings for the `compress` command.
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub level: u8,
    pub dict_size: Option<u32>,
    pub fast_bytes: Option<u32>,
    pub match_finder: Option<MatchFinderKind>,
    pub lc: Option<u32>,
    pub lp: Option<u32>,
    pub pb: Option<u32>,
    pub end_marker: bool,
    pub keep: bool,
    pub force: bool,
    pub verbose: bool,
    pub progress: bool,
}

impl CompressOptions {
    /// Codec options: the level's preset with explicit overrides applied.
    pub fn lzma_options(&self) -> CliResult<LzmaOptions> {
        let mut options = LzmaOptions::preset(self.level)?;
        if let Some(dict_size) = self.dict_size {
            options = options.with_dict_size(dict_size);
        }
        if let Some(fast_bytes) = self.fast_bytes {
            options = options.with_fast_bytes(fast_bytes);
        }
        if let Some(kind) = self.match_finder {
            options = options.with_match_finder(kind);
        }
        let lc = self.lc.unwrap_or(options.lc);
        let lp = self.lp.unwrap_or(options.lp);
        let pb = self.pb.unwrap_or(options.pb);
        options = options
            .with_literal_bits(lc, lp, pb)
            .with_end_marker(self.end_marker);
        options.validate()?;
        Ok(options)
    }
}

pub fn cmd_compress(files: &[PathBuf], options: &CompressOptions) -> CliResult {
    let lzma = options.lzma_options()?;
    info!(
        "compressing {} files: dict {} bytes, fb {}, {}, lc={} lp={} pb={}",
        files.len(),
        lzma.dict_size,
        lzma.fast_bytes,
        lzma.match_finder,
        lzma.lc,
        lzma.lp,
        lzma.pb
    );

    for_each_file(files, "compression", |file, multi| {
        compress_file(file, &lzma, options, multi)
    })
}

fn compress_file(
    input: &Path,
    lzma: &LzmaOptions,
    options: &CompressOptions,
    multi: &MultiProgress,
) -> CliResult {
    let output = compressed_path(input);
    if output.exists() && !options.force {
        return Err(format!("{} already exists (use --force)", output.display()).into());
    }

    let size = fs::metadata(input)?.len();
    let reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(&output)?);

    let pb = create_progress_bar(multi, size, options.progress);
    pb.set_message(input.display().to_string());

    let result = encode_sized_with_progress(reader, &mut writer, lzma, size, |done, _| {
        pb.set_position(done)
    });
    drop(writer);
    if let Err(e) = result {
        pb.abandon();
        let _ = fs::remove_file(&output);
        return Err(e.into());
    }
    pb.finish_and_clear();
    let packed = fs::metadata(&output)?.len();

    copy_mtime(input, &output)?;
    if !options.keep {
        fs::remove_file(input)?;
    }

    debug!("{}: {} -> {} bytes", input.display(), size, packed);
    if options.verbose {
        println!(
            "  {} -> {} ({:.1}% saved)",
            input.display(),
            output.display(),
            space_savings(size, packed)
        );
    }
    Ok(())
}
