//! Command implementations for RomArc CLI.

pub mod compress;
pub mod decompress;
pub mod info;

pub use compress::{CompressOptions, cmd_compress};
pub use decompress::cmd_decompress;
pub use info::cmd_info;
pub use test::cmd_test;

use crate::utils::CliResult;
use indicatif::MultiProgress;
use log::error;
use rayon::prelude::*;
use std::path::PathBuf;

/// Run `job` for every file on the rayon pool, then report failures.
///
/// Each file is an independent codec session, so nothing is shared between
/// workers but the progress display.
fn for_each_file<F>(files: &[PathBuf], verb: &str, job: F) -> CliResult
where
    F: Fn(&PathBuf, &MultiProgress) -> CliResult + Sync,
{
    if files.is_empty() {
        return Err("no input files".into());
    }

    let multi = MultiProgress::new();
    let results: Vec<CliResult> = files.par_iter().map(|file| job(file, &multi)).collect();

    let mut failed = 0usize;
    for (file, result) in files.iter().zip(results) {
        if let Err(e) = result {
            failed += 1;
            error!("{}: {}", file.display(), e);
            eprintln!("  FAILED: {} - {}", file.display(), e);
        }
    }

    if failed > 0 {
        return Err(format!("{verb} failed for {failed} of {} files", files.len()).into());
    }
    Ok(())
}
