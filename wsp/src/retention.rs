//! Retention specifications and cross-archive validation.
//!
//! A retention pairs a sample interval with a point capacity. Compact specs
//! use the grammar `<number>[unit]:<number>[unit]` with units `s`, `m`, `h`,
//! `d`, and `y`; an omitted unit means seconds. `"10:60"` is 10-second
//! samples with 60 slots, `"1m:1h"` is 60-second samples with 3600 slots.
//!
//! Archive ordering invariants are enforced once, at file creation, across
//! the whole retention list.

use std::str::FromStr;

use crate::error::{ParameterError, Result, WhisperError};
use crate::format::unit_multiplier;

/// One archive's retention definition: interval and point capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// Seconds between points.
    pub interval: u32,
    /// Number of point slots in the archive.
    pub points: u32,
}

impl Retention {
    /// Creates a retention from explicit interval and point values.
    pub fn new(interval: u32, points: u32) -> Self {
        Self { interval, points }
    }

    /// Total time span the archive can hold, in seconds.
    pub fn retention(&self) -> u64 {
        u64::from(self.interval) * u64::from(self.points)
    }
}

impl From<(u32, u32)> for Retention {
    fn from((interval, points): (u32, u32)) -> Self {
        Self::new(interval, points)
    }
}

impl FromStr for Retention {
    type Err = WhisperError;

    /// Parses a compact `interval:points` spec.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wsp::Retention;
    ///
    /// let retention: Retention = "1m:1h".parse().unwrap();
    /// assert_eq!(retention.interval, 60);
    /// assert_eq!(retention.points, 3600);
    /// ```
    fn from_str(spec: &str) -> Result<Self> {
        let Some((interval, points)) = spec.split_once(':') else {
            return Err(ParameterError::UnparseableRetention {
                input: spec.to_string(),
            }
            .into());
        };
        Ok(Self::new(parse_time_unit(interval)?, parse_time_unit(points)?))
    }
}

/// Converts a `<number>[unit]` string to seconds (or a raw count).
///
/// # Errors
///
/// Returns [`ParameterError::UnparseableTimeUnit`] for empty input, unknown
/// suffixes, trailing garbage, or values that overflow `u32`.
pub fn parse_time_unit(input: &str) -> Result<u32> {
    let invalid = || -> WhisperError {
        ParameterError::UnparseableTimeUnit {
            input: input.to_string(),
        }
        .into()
    };

    let digits_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, suffix) = input.split_at(digits_end);
    let base: u32 = digits.parse().map_err(|_| invalid())?;

    let mut suffix_chars = suffix.chars();
    let multiplier = match (suffix_chars.next(), suffix_chars.next()) {
        (None, _) => 1,
        (Some(unit), None) => unit_multiplier(unit).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };

    base.checked_mul(multiplier).ok_or_else(invalid)
}

/// Checks the cross-archive invariants over an ordered retention list.
///
/// Archives must run from highest to lowest precision, with strictly
/// increasing intervals, each interval evenly dividing the next, and
/// strictly increasing total retention.
///
/// # Errors
///
/// Returns [`ParameterError`] naming the first violated invariant. Nothing
/// is written on failure; `create` calls this before touching the file.
pub fn validate_retentions(retentions: &[Retention]) -> Result<()> {
    if retentions.is_empty() {
        return Err(ParameterError::NoRetentions.into());
    }

    for retention in retentions {
        if retention.interval == 0 || retention.points == 0 {
            return Err(ParameterError::ZeroRetention.into());
        }
        if retention.retention() > u64::from(u32::MAX) {
            return Err(ParameterError::RetentionTooLarge {
                interval: retention.interval,
                points: retention.points,
            }
            .into());
        }
    }

    for pair in retentions.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if first.interval == second.interval {
            return Err(ParameterError::DuplicateInterval {
                interval: first.interval,
            }
            .into());
        }
        if first.interval > second.interval {
            return Err(ParameterError::IntervalsOutOfOrder {
                first: first.interval,
                second: second.interval,
            }
            .into());
        }
        if second.interval % first.interval != 0 {
            return Err(ParameterError::IntervalNotDivisible {
                first: first.interval,
                second: second.interval,
            }
            .into());
        }
        if first.retention() >= second.retention() {
            return Err(ParameterError::RetentionNotIncreasing {
                first: first.retention(),
                second: second.retention(),
            }
            .into());
        }
    }

    Ok(())
}
