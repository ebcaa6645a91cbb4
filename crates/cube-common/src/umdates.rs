//! Unified Model (UM) date stamps and file names.
//!
//! UM output files carry a five-character date stamp built from the PRECIS
//! table D2 alphabet (`0`-`9` then `a`-`z` for 10-35). Two layouts are
//! supported:
//!
//! - `YYMMM`: two-character year followed by a lowercase month abbreviation,
//!   e.g. `i1nov` for November 1981.
//! - `YYMDH`: two-character year followed by one D2 character each for
//!   month, day and hour, e.g. `i1b20` for 1981-11-02 00:00.
//!
//! The two-character year is the decade since 1800 as a D2 character plus
//! the last digit of the year, so years 1800-2159 are representable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CubeError, CubeResult};
use crate::time::{Calendar, ModelDateTime};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Layout of a UM date stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StampFormat {
    #[serde(rename = "YYMMM")]
    YyMmm,
    #[serde(rename = "YYMDH")]
    YyMdh,
}

impl FromStr for StampFormat {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YYMMM" => Ok(StampFormat::YyMmm),
            "YYMDH" => Ok(StampFormat::YyMdh),
            other => Err(CubeError::invalid_parameter(
                "format",
                format!("'{}' is neither YYMMM nor YYMDH", other),
            )),
        }
    }
}

/// UM output stream, PRECIS table D1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UmStream {
    /// `pa`: daily data spanning one month.
    Pa,
    /// `pj`: hourly data spanning one day.
    Pj,
    /// `pm`: monthly means.
    Pm,
}

impl UmStream {
    pub fn code(&self) -> &'static str {
        match self {
            UmStream::Pa => "pa",
            UmStream::Pj => "pj",
            UmStream::Pm => "pm",
        }
    }
}

impl fmt::Display for UmStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for UmStream {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pa" => Ok(UmStream::Pa),
            "pj" => Ok(UmStream::Pj),
            "pm" => Ok(UmStream::Pm),
            other => Err(CubeError::invalid_parameter(
                "freq",
                format!("unsupported stream '{}'", other),
            )),
        }
    }
}

/// Decode one PRECIS D2 character.
pub fn decode_d2(c: char) -> CubeResult<u32> {
    match c {
        '0'..='9' => Ok(c as u32 - '0' as u32),
        'a'..='z' => Ok(c as u32 - 'a' as u32 + 10),
        _ => Err(CubeError::invalid_parameter(
            "d2",
            format!("'{}' is not a table D2 character", c),
        )),
    }
}

/// Encode a value in 0-35 as a PRECIS D2 character.
pub fn encode_d2(value: u32) -> CubeResult<char> {
    match value {
        0..=9 => Ok((b'0' + value as u8) as char),
        10..=35 => Ok((b'a' + (value - 10) as u8) as char),
        _ => Err(CubeError::invalid_parameter(
            "d2",
            format!("{} is outside 0-35", value),
        )),
    }
}

/// Two-character UM year, e.g. 1973 -> "h3".
pub fn encode_year(year: i32) -> CubeResult<String> {
    if !(1800..=2159).contains(&year) {
        return Err(CubeError::invalid_parameter(
            "year",
            format!("{} cannot be expressed as a UM year (1800-2159)", year),
        ));
    }
    let decade = encode_d2((year / 10 - 180) as u32)?;
    Ok(format!("{}{}", decade, year % 10))
}

/// Encode a timestamp as a UM date stamp.
pub fn to_um_stamp(dt: &ModelDateTime, format: StampFormat) -> CubeResult<String> {
    let year = encode_year(dt.year)?;
    let stamp = match format {
        StampFormat::YyMmm => format!("{}{}", year, MONTH_ABBREVIATIONS[(dt.month - 1) as usize]),
        StampFormat::YyMdh => format!(
            "{}{}{}{}",
            year,
            encode_d2(dt.month)?,
            encode_d2(dt.day)?,
            encode_d2(dt.hour)?
        ),
    };
    Ok(stamp)
}

/// Decode a UM date stamp in the given calendar.
pub fn from_um_stamp(
    stamp: &str,
    format: StampFormat,
    calendar: Calendar,
) -> CubeResult<ModelDateTime> {
    let chars: Vec<char> = stamp.chars().collect();
    if chars.len() != 5 {
        return Err(CubeError::invalid_date_stamp(stamp, "expected 5 characters"));
    }
    let bad = |e: CubeError| CubeError::invalid_date_stamp(stamp, e.to_string());

    let decade = decode_d2(chars[0]).map_err(bad)?;
    let digit = chars[1]
        .to_digit(10)
        .ok_or_else(|| CubeError::invalid_date_stamp(stamp, "second character must be a digit"))?;
    let year = 1800 + (decade * 10 + digit) as i32;

    match format {
        StampFormat::YyMmm => {
            let month_text: String = chars[2..].iter().collect::<String>().to_lowercase();
            let month = MONTH_ABBREVIATIONS
                .iter()
                .position(|m| *m == month_text)
                .ok_or_else(|| {
                    CubeError::invalid_date_stamp(stamp, format!("unknown month '{}'", month_text))
                })?;
            ModelDateTime::ymd(calendar, year, month as u32 + 1, 1).map_err(bad)
        }
        StampFormat::YyMdh => {
            let month = decode_d2(chars[2]).map_err(bad)?;
            let day = decode_d2(chars[3]).map_err(bad)?;
            let hour = decode_d2(chars[4]).map_err(bad)?;
            ModelDateTime::new(calendar, year, month, day, hour, 0, 0).map_err(bad)
        }
    }
}

/// Theoretical list of UM file names for a run between two dates
/// (inclusive), assuming no files are missing.
///
/// `pm` files step monthly and are named `{run_id}a.pm{YYMMM}.pp`; `pa`
/// and `pj` files step daily and are named `{run_id}a.{stream}{YYMDH}.pp`.
pub fn um_file_list(
    run_id: &str,
    start: &ModelDateTime,
    end: &ModelDateTime,
    stream: UmStream,
) -> CubeResult<Vec<String>> {
    if start.calendar != end.calendar {
        return Err(CubeError::InvalidTime(format!(
            "start calendar {} differs from end calendar {}",
            start.calendar, end.calendar
        )));
    }

    let mut files = Vec::new();
    let mut dt = *start;
    while dt <= *end {
        let name = match stream {
            UmStream::Pm => {
                let name = format!("{}a.pm{}.pp", run_id, to_um_stamp(&dt, StampFormat::YyMmm)?);
                dt = dt.add_months(1)?;
                name
            }
            UmStream::Pa | UmStream::Pj => {
                let name = format!(
                    "{}a.{}{}.pp",
                    run_id,
                    stream.code(),
                    to_um_stamp(&dt, StampFormat::YyMdh)?
                );
                dt = dt.add_days(1)?;
                name
            }
        };
        files.push(name);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greg(y: i32, m: u32, d: u32) -> ModelDateTime {
        ModelDateTime::gregorian(y, m, d).unwrap()
    }

    #[test]
    fn test_d2_codec() {
        assert_eq!(decode_d2('1').unwrap(), 1);
        assert_eq!(decode_d2('c').unwrap(), 12);
        assert_eq!(decode_d2('s').unwrap(), 28);
        assert_eq!(encode_d2(12).unwrap(), 'c');
        assert_eq!(encode_d2(28).unwrap(), 's');
        assert!(decode_d2('#').is_err());
        assert!(encode_d2(36).is_err());
    }

    #[test]
    fn test_encode_year() {
        assert_eq!(encode_year(1973).unwrap(), "h3");
        assert_eq!(encode_year(1980).unwrap(), "i0");
        assert!(encode_year(1799).is_err());
        assert!(encode_year(2160).is_err());
    }

    #[test]
    fn test_to_stamp() {
        let dt = greg(1981, 11, 2);
        assert_eq!(to_um_stamp(&dt, StampFormat::YyMmm).unwrap(), "i1nov");
        assert_eq!(to_um_stamp(&dt, StampFormat::YyMdh).unwrap(), "i1b20");

        let dt = ModelDateTime::ymd(Calendar::Day360, 1981, 2, 30).unwrap();
        assert_eq!(to_um_stamp(&dt, StampFormat::YyMmm).unwrap(), "i1feb");
        assert_eq!(to_um_stamp(&dt, StampFormat::YyMdh).unwrap(), "i12u0");
    }

    #[test]
    fn test_from_stamp() {
        let dt = from_um_stamp("k5bu0", StampFormat::YyMdh, Calendar::Gregorian).unwrap();
        assert_eq!(dt, greg(2005, 11, 30));
        let dt = from_um_stamp("i1nov", StampFormat::YyMmm, Calendar::Gregorian).unwrap();
        assert_eq!(dt, greg(1981, 11, 1));
        assert!(from_um_stamp("i1no", StampFormat::YyMmm, Calendar::Gregorian).is_err());
        assert!(from_um_stamp("i1xyz", StampFormat::YyMmm, Calendar::Gregorian).is_err());
        assert!(from_um_stamp("i12u0", StampFormat::YyMdh, Calendar::Gregorian).is_err());
    }

    #[test]
    fn test_stamp_roundtrip() {
        let dt = ModelDateTime::new(Calendar::Gregorian, 2012, 7, 19, 18, 0, 0).unwrap();
        let stamp = to_um_stamp(&dt, StampFormat::YyMdh).unwrap();
        assert_eq!(
            from_um_stamp(&stamp, StampFormat::YyMdh, Calendar::Gregorian).unwrap(),
            dt
        );
    }

    #[test]
    fn test_file_list_daily() {
        let files = um_file_list("akwss", &greg(1980, 9, 1), &greg(1980, 9, 3), UmStream::Pa).unwrap();
        assert_eq!(
            files,
            vec!["akwssa.pai0910.pp", "akwssa.pai0920.pp", "akwssa.pai0930.pp"]
        );
    }

    #[test]
    fn test_file_list_monthly() {
        let files =
            um_file_list("akwss", &greg(1980, 9, 1), &greg(1980, 12, 31), UmStream::Pm).unwrap();
        assert_eq!(
            files,
            vec![
                "akwssa.pmi0sep.pp",
                "akwssa.pmi0oct.pp",
                "akwssa.pmi0nov.pp",
                "akwssa.pmi0dec.pp"
            ]
        );
    }

    #[test]
    fn test_unknown_stream() {
        assert!("px".parse::<UmStream>().is_err());
        assert_eq!("pj".parse::<UmStream>().unwrap(), UmStream::Pj);
    }
}
