//! # RomArc Core
//!
//! Core components shared by the RomArc codec crates.
//!
//! - [`error`]: Error types
//! - [`traits`]: Streaming compressor trait
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ CLI                                                     │
//! │     romarc compress / decompress / test / info          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Codec                                                   │
//! │     LZMA: range coder, match finder, optimal parser     │
//! ├─────────────────────────────────────────────────────────┤
//! │ Core (this crate)                                       │
//! │     RomArcError, Compressor                             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use romarc_core::error::{Result, RomArcError};
//!
//! fn check_fast_bytes(fb: u32) -> Result<u32> {
//!     if !(5..=273).contains(&fb) {
//!         return Err(RomArcError::invalid_config(format!("fast bytes {fb}")));
//!     }
//!     Ok(fb)
//! }
//!
//! assert!(check_fast_bytes(32).is_ok());
//! assert!(check_fast_bytes(2).unwrap_err().is_config_error());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod traits;

// Re-exports for convenience
pub use error::{Result, RomArcError};
pub use traits::{CompressStatus, Compressor, FlushMode};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, RomArcError};
    pub use crate::traits::{CompressStatus, Compressor, FlushMode};
}
