//! Encoder configuration.
//!
//! [`LzmaOptions`] collects every tunable of an encoding session. Options are
//! checked by [`LzmaOptions::validate`] before any encoder state is
//! allocated, so an invalid configuration never produces partial output.

use crate::model::{LC_MAX, LP_MAX, LzmaProperties, MATCH_LEN_MAX, PB_MAX};
use romarc_core::error::{Result, RomArcError};
use std::fmt;
use std::str::FromStr;

/// Smallest accepted dictionary size.
pub const DICT_SIZE_MIN: u32 = 1 << 12;

/// Largest accepted dictionary size.
pub const DICT_SIZE_MAX: u32 = 1 << 30;

/// Smallest accepted fast-bytes value.
pub const FAST_BYTES_MIN: u32 = 5;

/// Size of the coder-properties blob: one property byte plus the dictionary size.
pub const PROPERTIES_SIZE: usize = 5;

/// Binary-tree match finder variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchFinderKind {
    /// Two-byte direct hash.
    Bt2,
    /// Four-byte hash with auxiliary 2- and 3-byte tables.
    #[default]
    Bt4,
}

impl MatchFinderKind {
    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bt2 => "BT2",
            Self::Bt4 => "BT4",
        }
    }
}

impl fmt::Display for MatchFinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MatchFinderKind {
    type Err = RomArcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BT2" => Ok(Self::Bt2),
            "BT4" => Ok(Self::Bt4),
            _ => Err(RomArcError::invalid_config(format!(
                "unknown match finder '{s}' (expected BT2 or BT4)"
            ))),
        }
    }
}

/// LZMA encoder options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LzmaOptions {
    /// Dictionary (history window) size in bytes.
    pub dict_size: u32,
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
    /// Match length at which the parser stops searching and takes the match.
    pub fast_bytes: u32,
    /// Match finder variant.
    pub match_finder: MatchFinderKind,
    /// Terminate the stream with an explicit end marker.
    pub end_marker: bool,
}

impl Default for LzmaOptions {
    fn default() -> Self {
        Self {
            dict_size: 1 << 20,
            lc: 3,
            lp: 0,
            pb: 2,
            fast_bytes: 32,
            match_finder: MatchFinderKind::Bt4,
            end_marker: false,
        }
    }
}

impl LzmaOptions {
    /// Options for compression level 0 (fastest) through 9 (best).
    pub fn preset(level: u8) -> Result<Self> {
        let (dict_log, fast_bytes) = match level {
            0 => (16, 8),
            1 => (18, 16),
            2 => (20, 32),
            3 => (21, 32),
            4 => (22, 32),
            5 => (23, 32),
            6 => (23, 64),
            7 => (24, 64),
            8 => (25, 128),
            9 => (26, MATCH_LEN_MAX),
            _ => {
                return Err(RomArcError::invalid_config(format!(
                    "compression level {level} out of range 0..=9"
                )));
            }
        };

        Ok(Self {
            dict_size: 1 << dict_log,
            lc: if level >= 7 { 4 } else { 3 },
            fast_bytes,
            match_finder: if level == 0 {
                MatchFinderKind::Bt2
            } else {
                MatchFinderKind::Bt4
            },
            ..Self::default()
        })
    }

    /// Set the dictionary size.
    pub fn with_dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size;
        self
    }

    /// Set the fast-bytes threshold.
    pub fn with_fast_bytes(mut self, fast_bytes: u32) -> Self {
        self.fast_bytes = fast_bytes;
        self
    }

    /// Set the match finder.
    pub fn with_match_finder(mut self, match_finder: MatchFinderKind) -> Self {
        self.match_finder = match_finder;
        self
    }

    /// Set literal context, literal position and position bits.
    pub fn with_literal_bits(mut self, lc: u32, lp: u32, pb: u32) -> Self {
        self.lc = lc;
        self.lp = lp;
        self.pb = pb;
        self
    }

    /// Enable or disable the end marker.
    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    /// Check every parameter against its legal range.
    pub fn validate(&self) -> Result<()> {
        if !(FAST_BYTES_MIN..=MATCH_LEN_MAX).contains(&self.fast_bytes) {
            return Err(RomArcError::invalid_config(format!(
                "fast bytes {} out of range {FAST_BYTES_MIN}..={MATCH_LEN_MAX}",
                self.fast_bytes
            )));
        }
        if !(DICT_SIZE_MIN..=DICT_SIZE_MAX).contains(&self.dict_size) {
            return Err(RomArcError::invalid_config(format!(
                "dictionary size {} out of range {DICT_SIZE_MIN}..={DICT_SIZE_MAX}",
                self.dict_size
            )));
        }
        if self.lc > LC_MAX {
            return Err(RomArcError::invalid_config(format!(
                "literal context bits {} exceed {LC_MAX}",
                self.lc
            )));
        }
        if self.lp > LP_MAX {
            return Err(RomArcError::invalid_config(format!(
                "literal position bits {} exceed {LP_MAX}",
                self.lp
            )));
        }
        if self.pb > PB_MAX {
            return Err(RomArcError::invalid_config(format!(
                "position bits {} exceed {PB_MAX}",
                self.pb
            )));
        }
        Ok(())
    }

    /// The lc/lp/pb triple.
    pub fn properties(&self) -> LzmaProperties {
        LzmaProperties::new(self.lc, self.lp, self.pb)
    }

    /// Number of distance slots that can occur with this dictionary.
    pub(crate) fn dist_table_size(&self) -> u32 {
        let mut dict_log = 0;
        while dict_log < 30 && self.dict_size > (1u32 << dict_log) {
            dict_log += 1;
        }
        dict_log * 2
    }
}

impl LzmaProperties {
    /// Serialize the property byte followed by the little-endian dictionary size.
    pub fn encode_header(&self, dict_size: u32) -> [u8; PROPERTIES_SIZE] {
        let mut header = [0u8; PROPERTIES_SIZE];
        header[0] = self.to_byte();
        header[1..].copy_from_slice(&dict_size.to_le_bytes());
        header
    }

    /// Parse a coder-properties blob into properties and dictionary size.
    pub fn decode_header(header: &[u8; PROPERTIES_SIZE]) -> Result<(Self, u32)> {
        let props = Self::from_byte(header[0]).ok_or_else(|| {
            RomArcError::invalid_header(format!("invalid LZMA property byte 0x{:02X}", header[0]))
        })?;
        let dict_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
        Ok((props, dict_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let opts = LzmaOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.dict_size, 1 << 20);
        assert_eq!(opts.properties().to_byte(), 0x5D);
    }

    #[test]
    fn test_presets() {
        for level in 0..=9 {
            let opts = LzmaOptions::preset(level).unwrap();
            assert!(opts.validate().is_ok(), "level {level}");
        }
        assert_eq!(LzmaOptions::preset(9).unwrap().fast_bytes, 273);
        assert_eq!(LzmaOptions::preset(7).unwrap().lc, 4);
        assert_eq!(LzmaOptions::preset(0).unwrap().match_finder, MatchFinderKind::Bt2);
        assert!(LzmaOptions::preset(10).unwrap_err().is_config_error());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let base = LzmaOptions::default();
        assert!(base.clone().with_fast_bytes(4).validate().is_err());
        assert!(base.clone().with_fast_bytes(274).validate().is_err());
        assert!(base.clone().with_fast_bytes(273).validate().is_ok());
        assert!(base.clone().with_dict_size(1 << 11).validate().is_err());
        assert!(base.clone().with_dict_size((1 << 30) + 1).validate().is_err());
        assert!(base.clone().with_literal_bits(9, 0, 2).validate().is_err());
        assert!(base.clone().with_literal_bits(3, 5, 2).validate().is_err());
        assert!(base.clone().with_literal_bits(3, 0, 5).validate().is_err());
        assert!(base.with_literal_bits(8, 4, 4).validate().is_ok());
    }

    #[test]
    fn test_match_finder_parsing() {
        assert_eq!("bt2".parse::<MatchFinderKind>().unwrap(), MatchFinderKind::Bt2);
        assert_eq!("BT4".parse::<MatchFinderKind>().unwrap(), MatchFinderKind::Bt4);
        let err = "HC4".parse::<MatchFinderKind>().unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(MatchFinderKind::Bt4.to_string(), "BT4");
    }

    #[test]
    fn test_dist_table_size() {
        let opts = LzmaOptions::default();
        assert_eq!(opts.dist_table_size(), 40);
        assert_eq!(opts.with_dict_size(DICT_SIZE_MAX).dist_table_size(), 60);
        let opts = LzmaOptions::default().with_dict_size(5000);
        assert_eq!(opts.dist_table_size(), 26);
    }

    #[test]
    fn test_properties_header() {
        let props = LzmaProperties::new(3, 0, 2);
        let header = props.encode_header(1 << 16);
        assert_eq!(header, [0x5D, 0x00, 0x00, 0x01, 0x00]);

        let (decoded, dict) = LzmaProperties::decode_header(&header).unwrap();
        assert_eq!(decoded, props);
        assert_eq!(dict, 1 << 16);

        let bad = [0xE1, 0, 0, 1, 0];
        assert!(matches!(
            LzmaProperties::decode_header(&bad),
            Err(RomArcError::InvalidHeader { .. })
        ));
    }
}
