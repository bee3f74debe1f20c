//! RomArc CLI - LZMA compression from the command line
//!
//! Compresses files to `.lzma`, restores them, verifies them and shows their
//! headers. Multiple files are processed in parallel.

mod commands;
mod utils;

use clap::{ArgAction, Parser, Subcommand};
use commands::{CompressOptions, cmd_compress, cmd_decompress, cmd_info, cmd_test};
use log::LevelFilter;
use romarc_lzma::MatchFinderKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "romarc")]
#[command(author, version, about = "Pure Rust LZMA compressor")]
#[command(long_about = "
RomArc compresses files with LZMA into the .lzma format.

Examples:
  romarc compress file.bin
  romarc compress -l 9 --mf bt2 -d 64K *.log
  romarc decompress file.bin.lzma
  romarc test file.bin.lzma
  romarc info --json file.bin.lzma
")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files to .lzma
    #[command(alias = "c")]
    Compress {
        /// Files to compress
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Compression level (0-9)
        #[arg(
            short,
            long,
            default_value_t = 6,
            value_parser = clap::value_parser!(u8).range(0..=9)
        )]
        level: u8,

        /// Dictionary size (bytes, or with K/M/G suffix)
        #[arg(short, long, value_parser = utils::parse_size)]
        dict: Option<u32>,

        /// Fast bytes: match length at which the parser stops searching (5-273)
        #[arg(long)]
        fb: Option<u32>,

        /// Match finder (bt2, bt4)
        #[arg(long)]
        mf: Option<MatchFinderKind>,

        /// Literal context bits (0-8)
        #[arg(long)]
        lc: Option<u32>,

        /// Literal position bits (0-4)
        #[arg(long)]
        lp: Option<u32>,

        /// Position bits (0-4)
        #[arg(long)]
        pb: Option<u32>,

        /// Terminate the stream with an end marker instead of recording the size
        #[arg(long)]
        eos: bool,

        /// Keep input files
        #[arg(short, long)]
        keep: bool,

        /// Overwrite existing output files
        #[arg(short, long)]
        force: bool,
    },

    /// Decompress .lzma files
    #[command(alias = "d")]
    Decompress {
        /// Files to decompress
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Keep input files
        #[arg(short, long)]
        keep: bool,

        /// Overwrite existing output files
        #[arg(short, long)]
        force: bool,
    },

    /// Test integrity of .lzma files
    #[command(alias = "t")]
    Test {
        /// Files to test
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the header of a .lzma file
    #[command(alias = "i")]
    Info {
        /// File to inspect
        file: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let verbose = cli.verbose > 0;
    let progress = !cli.no_progress;

    let result = match cli.command {
        Commands::Compress {
            files,
            level,
            dict,
            fb,
            mf,
            lc,
            lp,
            pb,
            eos,
            keep,
            force,
        } => {
            let options = CompressOptions {
                level,
                dict_size: dict,
                fast_bytes: fb,
                match_finder: mf,
                lc,
                lp,
                pb,
                end_marker: eos,
                keep,
                force,
                verbose,
                progress,
            };
            cmd_compress(&files, &options)
        }
        Commands::Decompress { files, keep, force } => {
            cmd_decompress(&files, keep, force, verbose, progress)
        }
        Commands::Test { files } => cmd_test(&files, verbose, progress),
        Commands::Info { file, json } => cmd_info(&file, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compress_flags() {
        let cli = Cli::try_parse_from([
            "romarc", "-vv", "compress", "-l", "9", "-d", "64K", "--mf", "bt2", "--lc", "0",
            "--eos", "-k", "a.bin", "b.bin",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compress {
                files,
                level,
                dict,
                mf,
                lc,
                eos,
                keep,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(level, 9);
                assert_eq!(dict, Some(64 << 10));
                assert_eq!(mf, Some(MatchFinderKind::Bt2));
                assert_eq!(lc, Some(0));
                assert!(eos && keep);
            }
            _ => panic!("expected compress"),
        }
    }

    #[test]
    fn test_rejects_out_of_range_level() {
        assert!(Cli::try_parse_from(["romarc", "compress", "-l", "10", "a"]).is_err());
        assert!(Cli::try_parse_from(["romarc", "compress"]).is_err());
    }
}
