//! Calendar-aware time handling for climate-model data.
//!
//! Model output uses either the proleptic Gregorian calendar or the 360-day
//! calendar (twelve 30-day months). [`ModelDateTime`] is a timestamp that
//! knows its calendar; [`TimeUnits`] converts between CF-style numeric time
//! values ("hours since 1970-01-01") and timestamps; [`DateRange`] is a
//! half-open interval that can be partitioned into calendar-aligned chunks.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CubeError, CubeResult};

const SECONDS_PER_DAY: i64 = 86_400;

/// Calendar a time coordinate is expressed in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Calendar {
    /// Proleptic Gregorian ("standard") calendar.
    #[default]
    #[serde(rename = "gregorian")]
    Gregorian,
    /// Twelve months of 30 days.
    #[serde(rename = "360_day")]
    Day360,
}

impl Calendar {
    /// Number of days in the given month.
    pub fn days_in_month(&self, year: i32, month: u32) -> u32 {
        match self {
            Calendar::Day360 => 30,
            Calendar::Gregorian => {
                let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
                match (
                    NaiveDate::from_ymd_opt(year, month, 1),
                    NaiveDate::from_ymd_opt(next_year, next_month, 1),
                ) {
                    (Some(first), Some(next)) => (next - first).num_days() as u32,
                    _ => 0,
                }
            }
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Gregorian => write!(f, "gregorian"),
            Calendar::Day360 => write!(f, "360_day"),
        }
    }
}

impl FromStr for Calendar {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gregorian" | "standard" | "proleptic_gregorian" => Ok(Calendar::Gregorian),
            "360_day" | "360day" => Ok(Calendar::Day360),
            other => Err(CubeError::InvalidTime(format!("unsupported calendar '{}'", other))),
        }
    }
}

/// Meteorological season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    Djf,
    Mam,
    Jja,
    Son,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Djf, Season::Mam, Season::Jja, Season::Son];

    /// Season containing a month (1-12).
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Mam,
            6..=8 => Season::Jja,
            9..=11 => Season::Son,
            _ => Season::Djf,
        }
    }

    /// DJF=0, MAM=1, JJA=2, SON=3.
    pub fn index(&self) -> u32 {
        *self as u32
    }

    /// Month numbers in calendar order of the season.
    pub fn months(&self) -> [u32; 3] {
        match self {
            Season::Djf => [12, 1, 2],
            Season::Mam => [3, 4, 5],
            Season::Jja => [6, 7, 8],
            Season::Son => [9, 10, 11],
        }
    }

    /// Lowercase month-initial name, e.g. "djf".
    pub fn name(&self) -> &'static str {
        match self {
            Season::Djf => "djf",
            Season::Mam => "mam",
            Season::Jja => "jja",
            Season::Son => "son",
        }
    }
}

/// Name of an arbitrary run of months built from month initials,
/// e.g. `[12, 1, 2]` -> "djf", `[6, 7]` -> "jj".
pub fn months_name(months: &[u32]) -> String {
    const INITIALS: [char; 12] = ['j', 'f', 'm', 'a', 'm', 'j', 'j', 'a', 's', 'o', 'n', 'd'];
    months
        .iter()
        .filter(|m| (1..=12).contains(*m))
        .map(|m| INITIALS[(*m - 1) as usize])
        .collect()
}

/// A calendar-aware timestamp with one-second resolution.
///
/// Ordering compares fields lexicographically, which is chronological for
/// timestamps sharing a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub calendar: Calendar,
}

impl ModelDateTime {
    pub fn new(
        calendar: Calendar,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> CubeResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(CubeError::InvalidTime(format!("month {} out of range", month)));
        }
        let max_day = calendar.days_in_month(year, month);
        if day == 0 || day > max_day {
            return Err(CubeError::InvalidTime(format!(
                "day {} out of range for {:04}-{:02} ({} calendar)",
                day, year, month, calendar
            )));
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(CubeError::InvalidTime(format!(
                "time {:02}:{:02}:{:02} out of range",
                hour, minute, second
            )));
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            calendar,
        })
    }

    /// Midnight on the given date.
    pub fn ymd(calendar: Calendar, year: i32, month: u32, day: u32) -> CubeResult<Self> {
        Self::new(calendar, year, month, day, 0, 0, 0)
    }

    /// Midnight on the given Gregorian date.
    pub fn gregorian(year: i32, month: u32, day: u32) -> CubeResult<Self> {
        Self::ymd(Calendar::Gregorian, year, month, day)
    }

    /// Parse "YYYY-MM-DD", "YYYY-MM-DD HH:MM[:SS]" or the same with a `T`
    /// separator.
    pub fn parse(s: &str, calendar: Calendar) -> CubeResult<Self> {
        let cleaned = s.trim().trim_end_matches('Z').trim_end_matches("UTC").trim();
        let (date_part, time_part) = match cleaned.split_once(|c: char| c == 'T' || c == ' ') {
            Some((d, t)) => (d, Some(t.trim())),
            None => (cleaned, None),
        };

        let invalid = || CubeError::InvalidTime(format!("cannot parse date '{}'", s));

        let date_fields: Vec<&str> = date_part.split('-').collect();
        if date_fields.len() != 3 {
            return Err(invalid());
        }
        let year: i32 = date_fields[0].parse().map_err(|_| invalid())?;
        let month: u32 = date_fields[1].parse().map_err(|_| invalid())?;
        let day: u32 = date_fields[2].parse().map_err(|_| invalid())?;

        let (mut hour, mut minute, mut second) = (0, 0, 0);
        if let Some(time) = time_part.filter(|t| !t.is_empty()) {
            let fields: Vec<&str> = time.split(':').collect();
            if fields.len() < 2 || fields.len() > 3 {
                return Err(invalid());
            }
            hour = fields[0].parse().map_err(|_| invalid())?;
            minute = fields[1].parse().map_err(|_| invalid())?;
            if let Some(sec) = fields.get(2) {
                // Fractional seconds are truncated.
                let whole = sec.split('.').next().unwrap_or("0");
                second = whole.parse().map_err(|_| invalid())?;
            }
        }

        Self::new(calendar, year, month, day, hour, minute, second)
    }

    /// Number of days in this timestamp's month.
    pub fn days_in_month(&self) -> u32 {
        self.calendar.days_in_month(self.year, self.month)
    }

    fn to_naive(self) -> CubeResult<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|d| d.and_hms_opt(self.hour, self.minute, self.second))
            .ok_or_else(|| CubeError::InvalidTime(format!("{} is not a Gregorian date", self)))
    }

    fn unix_epoch() -> NaiveDate {
        NaiveDate::default()
    }

    /// Seconds since 1970-01-01 00:00:00 in this timestamp's calendar.
    pub fn to_seconds(&self) -> i64 {
        let clock = self.hour as i64 * 3600 + self.minute as i64 * 60 + self.second as i64;
        match self.calendar {
            Calendar::Day360 => {
                let days = (self.year as i64 - 1970) * 360
                    + (self.month as i64 - 1) * 30
                    + (self.day as i64 - 1);
                days * SECONDS_PER_DAY + clock
            }
            Calendar::Gregorian => {
                let days = NaiveDate::from_ymd_opt(self.year, self.month, self.day)
                    .map(|d| d.signed_duration_since(Self::unix_epoch()).num_days())
                    .unwrap_or(0);
                days * SECONDS_PER_DAY + clock
            }
        }
    }

    /// Inverse of [`ModelDateTime::to_seconds`].
    pub fn from_seconds(calendar: Calendar, seconds: i64) -> CubeResult<Self> {
        let days = seconds.div_euclid(SECONDS_PER_DAY);
        let clock = seconds.rem_euclid(SECONDS_PER_DAY) as u32;
        let (hour, minute, second) = (clock / 3600, (clock % 3600) / 60, clock % 60);
        match calendar {
            Calendar::Day360 => {
                let year = 1970 + days.div_euclid(360);
                let day_of_year = days.rem_euclid(360) as u32;
                let year = i32::try_from(year)
                    .map_err(|_| CubeError::InvalidTime(format!("year {} out of range", year)))?;
                Self::new(
                    calendar,
                    year,
                    day_of_year / 30 + 1,
                    day_of_year % 30 + 1,
                    hour,
                    minute,
                    second,
                )
            }
            Calendar::Gregorian => {
                let out_of_range =
                    || CubeError::InvalidTime(format!("{} seconds is out of range", seconds));
                let dt = Self::unix_epoch()
                    .checked_add_signed(Duration::days(days))
                    .and_then(|date| date.and_hms_opt(hour, minute, second))
                    .ok_or_else(out_of_range)?;
                Ok(Self::from_naive(dt))
            }
        }
    }

    /// Build from a chrono timestamp (Gregorian).
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            calendar: Calendar::Gregorian,
        }
    }

    pub fn add_seconds(&self, seconds: i64) -> CubeResult<Self> {
        Self::from_seconds(self.calendar, self.to_seconds() + seconds)
    }

    pub fn add_days(&self, days: i64) -> CubeResult<Self> {
        self.add_seconds(days * SECONDS_PER_DAY)
    }

    /// Add calendar months; the day is clamped to the target month's length.
    pub fn add_months(&self, months: i32) -> CubeResult<Self> {
        let total = self.year * 12 + (self.month as i32 - 1) + months;
        let year = total.div_euclid(12);
        let month = total.rem_euclid(12) as u32 + 1;
        let day = self.day.min(self.calendar.days_in_month(year, month));
        Self::new(self.calendar, year, month, day, self.hour, self.minute, self.second)
    }

    pub fn add_years(&self, years: i32) -> CubeResult<Self> {
        self.add_months(years * 12)
    }

    /// Seconds from `self` to `other` (negative when `other` is earlier).
    pub fn seconds_until(&self, other: &ModelDateTime) -> i64 {
        other.to_seconds() - self.to_seconds()
    }

    /// Day of the year, starting at 1.
    pub fn day_of_year(&self) -> u32 {
        match self.calendar {
            Calendar::Day360 => (self.month - 1) * 30 + self.day,
            Calendar::Gregorian => self.to_naive().map(|d| d.ordinal()).unwrap_or(0),
        }
    }

    pub fn season(&self) -> Season {
        Season::from_month(self.month)
    }

    /// Year a meteorological season is attributed to: December counts
    /// towards the following year's DJF.
    pub fn season_year(&self) -> i32 {
        if self.month == 12 {
            self.year + 1
        } else {
            self.year
        }
    }

    pub fn start_of_day(&self) -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 0,
            ..*self
        }
    }

    pub fn start_of_month(&self) -> Self {
        Self {
            day: 1,
            ..self.start_of_day()
        }
    }

    pub fn start_of_year(&self) -> Self {
        Self {
            month: 1,
            ..self.start_of_month()
        }
    }

    /// First day of the meteorological season containing this timestamp.
    pub fn start_of_season(&self) -> Self {
        let month = self.season().months()[0];
        let year = if self.month < 3 { self.year - 1 } else { self.year };
        Self {
            year,
            month,
            ..self.start_of_month()
        }
    }
}

impl fmt::Display for ModelDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Unit of a numeric time coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86_400.0,
        }
    }

    /// Unit symbol for derived rates, e.g. "day" in "K day-1".
    pub fn symbol(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "day",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

/// CF-style time units, "<unit> since <epoch>".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub epoch: ModelDateTime,
}

impl TimeUnits {
    pub fn new(unit: TimeUnit, epoch: ModelDateTime) -> Self {
        Self { unit, epoch }
    }

    /// Parse a units string such as "hours since 1970-01-01 00:00:00".
    pub fn parse(units: &str, calendar: Calendar) -> CubeResult<Self> {
        let (unit, epoch) = units.split_once(" since ").ok_or_else(|| {
            CubeError::InvalidTime(format!("'{}' is not of the form '<unit> since <date>'", units))
        })?;
        let unit = match unit.trim().to_lowercase().as_str() {
            "second" | "seconds" | "s" | "sec" => TimeUnit::Seconds,
            "minute" | "minutes" | "min" => TimeUnit::Minutes,
            "hour" | "hours" | "h" | "hr" => TimeUnit::Hours,
            "day" | "days" | "d" => TimeUnit::Days,
            other => {
                return Err(CubeError::InvalidTime(format!("unsupported time unit '{}'", other)))
            }
        };
        Ok(Self {
            unit,
            epoch: ModelDateTime::parse(epoch, calendar)?,
        })
    }

    pub fn calendar(&self) -> Calendar {
        self.epoch.calendar
    }

    /// Convert a numeric time value to a timestamp, rounding to the second.
    pub fn num2date(&self, value: f64) -> CubeResult<ModelDateTime> {
        if !value.is_finite() {
            return Err(CubeError::InvalidTime(format!("non-finite time value {}", value)));
        }
        self.epoch.add_seconds((value * self.unit.seconds()).round() as i64)
    }

    /// Convert a timestamp to a numeric time value.
    pub fn date2num(&self, dt: &ModelDateTime) -> f64 {
        self.epoch.seconds_until(dt) as f64 / self.unit.seconds()
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} since {}", self.unit.as_str(), self.epoch)
    }
}

/// Half-open interval `[start, end)`.
///
/// `start == end` is the empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: ModelDateTime,
    pub end: ModelDateTime,
}

impl DateRange {
    pub fn new(start: ModelDateTime, end: ModelDateTime) -> CubeResult<Self> {
        if start.calendar != end.calendar {
            return Err(CubeError::InvalidTime(format!(
                "range mixes calendars {} and {}",
                start.calendar, end.calendar
            )));
        }
        if end < start {
            return Err(CubeError::InvalidTime(format!(
                "range end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// The empty range positioned at `at`.
    pub fn empty_at(at: ModelDateTime) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, dt: &ModelDateTime) -> bool {
        *dt >= self.start && *dt < self.end
    }

    pub fn duration_seconds(&self) -> i64 {
        self.start.seconds_until(&self.end)
    }

    /// Overlap of two ranges; the empty range at the later start when they
    /// do not overlap.
    pub fn intersection(&self, other: &DateRange) -> DateRange {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end <= start {
            DateRange::empty_at(start)
        } else {
            DateRange { start, end }
        }
    }

    /// Partition into consecutive calendar-aligned chunks.
    ///
    /// Chunk boundaries fall on the calendar boundaries of `granularity`
    /// (Jan 1, the first of a month, the first day of a meteorological
    /// season, midnight), counted from the boundary at or before `start`.
    /// The first chunk starts at `start` and the last ends at `end`.
    pub fn chunks(&self, granularity: Granularity) -> CubeResult<Vec<DateRange>> {
        if self.is_empty() {
            return Err(CubeError::invalid_parameter(
                "end",
                format!("end {} must be after start {}", self.end, self.start),
            ));
        }
        granularity.validate()?;

        let mut chunks = Vec::new();
        let mut cursor = self.start;
        let mut boundary = granularity.floor(&self.start);
        loop {
            boundary = granularity.advance(&boundary)?;
            let chunk_end = boundary.min(self.end);
            chunks.push(DateRange {
                start: cursor,
                end: chunk_end,
            });
            if chunk_end >= self.end {
                break;
            }
            cursor = chunk_end;
        }
        Ok(chunks)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Chunk size for [`DateRange::chunks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    Years(u32),
    /// Meteorological seasons (DJF, MAM, JJA, SON).
    Seasons,
    Months(u32),
    Days(u32),
}

impl Granularity {
    fn validate(&self) -> CubeResult<()> {
        match self {
            Granularity::Years(0) | Granularity::Months(0) | Granularity::Days(0) => Err(
                CubeError::invalid_parameter("granularity", format!("{:?} has a zero step", self)),
            ),
            _ => Ok(()),
        }
    }

    fn floor(&self, dt: &ModelDateTime) -> ModelDateTime {
        match self {
            Granularity::Years(_) => dt.start_of_year(),
            Granularity::Seasons => dt.start_of_season(),
            Granularity::Months(_) => dt.start_of_month(),
            Granularity::Days(_) => dt.start_of_day(),
        }
    }

    fn advance(&self, dt: &ModelDateTime) -> CubeResult<ModelDateTime> {
        match *self {
            Granularity::Years(n) => dt.add_years(n as i32),
            Granularity::Seasons => dt.add_months(3),
            Granularity::Months(n) => dt.add_months(n as i32),
            Granularity::Days(n) => dt.add_days(n as i64),
        }
    }
}

impl FromStr for Granularity {
    type Err = CubeError;

    /// Accepts "year", "5 years", "season", "month", "3months", "day", ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let count: u32 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| CubeError::invalid_parameter("granularity", s.clone()))?
        };
        let granularity = match unit.trim().trim_end_matches('s') {
            "year" | "yr" => Granularity::Years(count),
            "season" if count == 1 => Granularity::Seasons,
            "month" | "mon" => Granularity::Months(count),
            "day" => Granularity::Days(count),
            _ => {
                return Err(CubeError::invalid_parameter(
                    "granularity",
                    format!("unsupported granularity '{}'", s),
                ))
            }
        };
        granularity.validate()?;
        Ok(granularity)
    }
}
