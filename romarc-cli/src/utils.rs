//! Utility functions for the CLI.

use filetime::FileTime;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

/// Result type shared by the commands; errors must cross rayon workers.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Extension of `.lzma` files.
pub const LZMA_EXTENSION: &str = "lzma";

/// Create a byte-count progress bar attached to `multi`.
pub fn create_progress_bar(multi: &MultiProgress, len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = multi.add(ProgressBar::new(len));
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
    {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb
}

/// `file` -> `file.lzma`.
pub fn compressed_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".");
    name.push(LZMA_EXTENSION);
    PathBuf::from(name)
}

/// `file.lzma` -> `file`; `None` when the name lacks the extension.
pub fn decompressed_path(input: &Path) -> Option<PathBuf> {
    let ext = input.extension()?;
    if !ext.eq_ignore_ascii_case(LZMA_EXTENSION) {
        return None;
    }
    let stem = input.file_stem()?;
    Some(input.with_file_name(stem))
}

/// Parse a size such as `65536`, `64K`, `16M` or `1G`.
pub fn parse_size(text: &str) -> Result<u32, String> {
    let text = text.trim();
    let (digits, shift) = match text.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => {
            let shift = match c.to_ascii_uppercase() {
                'K' => 10,
                'M' => 20,
                'G' => 30,
                _ => return Err(format!("unknown size suffix '{c}'")),
            };
            (&text[..i], shift)
        }
        _ => (text, 0),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{text}'"))?;
    value
        .checked_mul(1 << shift)
        .filter(|&v| v <= u64::from(u32::MAX))
        .map(|v| v as u32)
        .ok_or_else(|| format!("size '{text}' too large"))
}

/// Give `output` the modification time of `input`.
pub fn copy_mtime(input: &Path, output: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(input)?;
    filetime::set_file_mtime(output, FileTime::from_last_modification_time(&metadata))
}

/// Percentage of space saved.
pub fn space_savings(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        0.0
    } else {
        (1.0 - compressed as f64 / original as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths() {
        assert_eq!(
            compressed_path(Path::new("dir/data.bin")),
            PathBuf::from("dir/data.bin.lzma")
        );
        assert_eq!(
            decompressed_path(Path::new("dir/data.bin.lzma")),
            Some(PathBuf::from("dir/data.bin"))
        );
        assert_eq!(
            decompressed_path(Path::new("DATA.LZMA")),
            Some(PathBuf::from("DATA"))
        );
        assert_eq!(decompressed_path(Path::new("data.xz")), None);
        assert_eq!(decompressed_path(Path::new("lzma")), None);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("65536"), Ok(65536));
        assert_eq!(parse_size("64K"), Ok(64 << 10));
        assert_eq!(parse_size("16m"), Ok(16 << 20));
        assert_eq!(parse_size("1G"), Ok(1 << 30));
        assert!(parse_size("4G").is_err());
        assert!(parse_size("12Q").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_space_savings() {
        assert_eq!(space_savings(0, 10), 0.0);
        assert_eq!(space_savings(100, 25), 75.0);
    }
}
