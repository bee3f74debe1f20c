//! Info command implementation.

use crate::utils::{CliResult, space_savings};
use romarc_lzma::{HEADER_SIZE, LzmaHeader};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// JSON serializable `.lzma` header summary.
#[derive(Debug, Serialize)]
struct LzmaInfoJson {
    file: String,
    file_size: u64,
    lc: u32,
    lp: u32,
    pb: u32,
    dict_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    unpacked_size: Option<u64>,
    end_marker_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<f64>,
}

impl LzmaInfoJson {
    fn new(path: &Path, file_size: u64, header: &LzmaHeader) -> Self {
        Self {
            file: path.display().to_string(),
            file_size,
            lc: header.props.lc,
            lp: header.props.lp,
            pb: header.props.pb,
            dict_size: header.dict_size,
            unpacked_size: header.unpacked_size,
            end_marker_required: header.unpacked_size.is_none(),
            ratio: header
                .unpacked_size
                .map(|size| space_savings(size, file_size)),
        }
    }
}

pub fn cmd_info(file: &PathBuf, json: bool) -> CliResult {
    let file_size = std::fs::metadata(file)?.len();
    let header = LzmaHeader::read_from(&mut BufReader::new(File::open(file)?))?;
    let info = LzmaInfoJson::new(file, file_size, &header);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("LZMA Information");
    println!("================");
    println!("File: {}", file.display());
    println!("Size: {} bytes", file_size);
    println!();
    println!("Header:");
    println!("  Properties: {}", header.props);
    println!("  Dictionary size: {} bytes", header.dict_size);
    match header.unpacked_size {
        Some(size) => {
            println!("  Uncompressed size: {} bytes", size);
            println!(
                "  Payload: {} bytes",
                file_size.saturating_sub(HEADER_SIZE as u64)
            );
            if let Some(ratio) = info.ratio {
                println!("  Compression ratio: {:.1}%", ratio);
            }
        }
        None => println!("  Uncompressed size: unknown (terminated by end marker)"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use romarc_lzma::LzmaProperties;

    #[test]
    fn test_info_json_fields() {
        let header = LzmaHeader {
            props: LzmaProperties::new(3, 0, 2),
            dict_size: 1 << 20,
            unpacked_size: Some(400),
        };
        let info = LzmaInfoJson::new(Path::new("a.lzma"), 100, &header);
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["dict_size"], 1 << 20);
        assert_eq!(value["unpacked_size"], 400);
        assert_eq!(value["end_marker_required"], false);
        assert_eq!(value["ratio"], 75.0);

        let streamed = LzmaHeader {
            unpacked_size: None,
            ..header
        };
        let value = serde_json::to_value(LzmaInfoJson::new(Path::new("b.lzma"), 100, &streamed))
            .unwrap();
        assert!(value.get("unpacked_size").is_none());
        assert_eq!(value["end_marker_required"], true);
    }
}
