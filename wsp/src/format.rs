//! Binary layout constants and format tables for whisper files.
//!
//! Everything here is pure data: fixed field widths, the aggregation-method
//! code table, time-unit multipliers, and creation defaults. All multi-byte
//! fields in a whisper file are big-endian.
//!
//! # File Format
//!
//! ```text
//! [0..16)          Header: u32 aggregation code, u32 max retention,
//!                  f32 x-files-factor, u32 archive count
//! [16..16+12*N)    N archive descriptors, each: u32 offset, u32 interval,
//!                  u32 points
//! [offset_i..)     archive i point region: points_i * (u32 ts, f64 value)
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{ParameterError, WhisperError};

/// Width of an on-disk timestamp field in bytes.
pub const TIMESTAMP_SIZE: u64 = 4;

/// Width of an on-disk value field in bytes.
pub const VALUE_SIZE: u64 = 8;

/// Width of one (timestamp, value) point in bytes.
pub const POINT_SIZE: u64 = TIMESTAMP_SIZE + VALUE_SIZE;

/// Width of the file header in bytes.
pub const METADATA_SIZE: u64 = 16;

/// Width of one archive descriptor in bytes.
pub const ARCHIVE_INFO_SIZE: u64 = 12;

/// Byte offset of the first archive descriptor.
pub const ARCHIVE_INFO_OFFSET: u64 = METADATA_SIZE;

/// Aggregation method used when `create` is given none.
pub const DEFAULT_AGGREGATION_METHOD: AggregationMethod = AggregationMethod::Average;

/// X-files-factor used when `create` is given none.
pub const DEFAULT_X_FILES_FACTOR: f32 = 0.5;

/// Aggregation method recorded in a whisper file header.
///
/// The numeric codes are part of the on-disk format and must not change.
/// The factor is stored but not enforced by this core; rollup propagation
/// between archives is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationMethod {
    /// Arithmetic mean of the contributing points.
    Average,
    /// Sum of the contributing points.
    Sum,
    /// Most recent contributing point.
    Last,
    /// Maximum of the contributing points.
    Max,
    /// Minimum of the contributing points.
    Min,
}

impl AggregationMethod {
    /// Returns the on-disk code for this method.
    pub fn code(self) -> u32 {
        match self {
            Self::Average => 1,
            Self::Sum => 2,
            Self::Last => 3,
            Self::Max => 4,
            Self::Min => 5,
        }
    }

    /// Looks up a method by its on-disk code.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::UnknownAggregationCode`] for codes outside
    /// the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wsp::AggregationMethod;
    ///
    /// assert_eq!(AggregationMethod::from_code(2).unwrap(), AggregationMethod::Sum);
    /// assert!(AggregationMethod::from_code(9).is_err());
    /// ```
    pub fn from_code(code: u32) -> Result<Self, WhisperError> {
        match code {
            1 => Ok(Self::Average),
            2 => Ok(Self::Sum),
            3 => Ok(Self::Last),
            4 => Ok(Self::Max),
            5 => Ok(Self::Min),
            _ => Err(ParameterError::UnknownAggregationCode { code }.into()),
        }
    }

    /// Returns the lowercase name of this method.
    pub fn name(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Sum => "sum",
            Self::Last => "last",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Pure membership check over the known method names.
    pub fn exists(name: &str) -> bool {
        name.parse::<Self>().is_ok()
    }
}

impl FromStr for AggregationMethod {
    type Err = WhisperError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "average" => Ok(Self::Average),
            "sum" => Ok(Self::Sum),
            "last" => Ok(Self::Last),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            _ => Err(ParameterError::UnknownAggregationMethod {
                name: name.to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the seconds multiplier for a retention-spec unit suffix.
///
/// Recognized suffixes are `s`, `m`, `h`, `d`, and `y`. A year is 365 days.
pub fn unit_multiplier(unit: char) -> Option<u32> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(60 * 60),
        'd' => Some(60 * 60 * 24),
        'y' => Some(60 * 60 * 24 * 365),
        _ => None,
    }
}
