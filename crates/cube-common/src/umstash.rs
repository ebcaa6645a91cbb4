//! UM STASH codes.
//!
//! The UM names diagnostics by section and item. Run configurations write
//! them as a bare number of at most five digits (`24`, `16222`), the last
//! three digits being the item and the rest the section. Processed files
//! use the `mXXsYYiZZZ` form with the model number spelled out
//! (`m01s00i024`, `m01s16i222`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CubeError, CubeResult};

/// The atmosphere model number used by UM-style codes.
pub const ATMOSPHERE_MODEL: u8 = 1;

/// A STASH diagnostic identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StashCode {
    pub model: u8,
    pub section: u16,
    pub item: u16,
}

impl StashCode {
    pub fn new(model: u8, section: u16, item: u16) -> CubeResult<Self> {
        if model > 99 || section > 99 || item > 999 {
            return Err(CubeError::invalid_stash_code(
                format!("m{}s{}i{}", model, section, item),
                "model and section take two digits, item takes three",
            ));
        }
        Ok(Self {
            model,
            section,
            item,
        })
    }

    /// Parse a UM-style code such as `24` or `16222`.
    pub fn from_um(code: &str) -> CubeResult<Self> {
        if code.len() > 5 {
            return Err(CubeError::invalid_stash_code(
                code,
                "UM codes are no longer than 5 characters",
            ));
        }
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CubeError::invalid_stash_code(code, "only digits are allowed"));
        }
        let number: u32 = code
            .parse()
            .map_err(|_| CubeError::invalid_stash_code(code, "not a number"))?;
        Self::new(ATMOSPHERE_MODEL, (number / 1000) as u16, (number % 1000) as u16)
    }

    /// The five-digit UM form, zero padded.
    pub fn to_um(&self) -> String {
        format!("{:02}{:03}", self.section, self.item)
    }
}

impl fmt::Display for StashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{:02}s{:02}i{:03}", self.model, self.section, self.item)
    }
}

impl FromStr for StashCode {
    type Err = CubeError;

    /// Parse the `mXXsYYiZZZ` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CubeError::invalid_stash_code(s, "expected the form mXXsYYiZZZ");
        let bytes = s.as_bytes();
        if bytes.len() != 10 || bytes[0] != b'm' || bytes[3] != b's' || bytes[6] != b'i' {
            return Err(invalid());
        }
        let field = |range: std::ops::Range<usize>| -> CubeResult<u16> {
            let digits = &s[range];
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            digits.parse().map_err(|_| invalid())
        };
        let model = field(1..3)?;
        Self::new(model as u8, field(4..6)?, field(7..10)?)
    }
}

/// Convert UM-style codes to the `m01sYYiZZZ` form, failing on the first
/// invalid one.
pub fn um_stash_to_msi<S: AsRef<str>>(codes: &[S]) -> CubeResult<Vec<String>> {
    codes
        .iter()
        .map(|code| StashCode::from_um(code.as_ref()).map(|stash| stash.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_um() {
        assert_eq!(StashCode::from_um("24").unwrap().to_string(), "m01s00i024");
        assert_eq!(StashCode::from_um("16222").unwrap().to_string(), "m01s16i222");
        assert_eq!(StashCode::from_um("05216").unwrap().to_um(), "05216");
    }

    #[test]
    fn test_list_conversion() {
        let codes = um_stash_to_msi(&["24", "16222", "3236"]).unwrap();
        assert_eq!(codes, vec!["m01s00i024", "m01s16i222", "m01s03i236"]);
        assert_eq!(um_stash_to_msi(&["1", "15201"]).unwrap(), vec!["m01s00i001", "m01s15i201"]);
    }

    #[test]
    fn test_invalid_um_codes() {
        for code in ["-24", "aaa", "24a", "", "1234567"] {
            assert!(
                matches!(StashCode::from_um(code), Err(CubeError::InvalidStashCode { .. })),
                "{code} should be rejected"
            );
        }
        assert!(um_stash_to_msi(&["24", "x"]).is_err());
    }

    #[test]
    fn test_parse_msi() {
        let stash: StashCode = "m01s03i236".parse().unwrap();
        assert_eq!(stash, StashCode::new(1, 3, 236).unwrap());
        assert!("m01s03i23".parse::<StashCode>().is_err());
        assert!("m01x03i236".parse::<StashCode>().is_err());
        assert!("m0as03i236".parse::<StashCode>().is_err());
    }
}
