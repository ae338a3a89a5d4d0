//! Error types for the wsp storage engine.

use thiserror::Error;

/// The main error type for all wsp operations.
///
/// Covers every failure mode from file creation through range queries.
/// Validation errors are raised eagerly, before any bytes are written, so
/// a rejected `create` leaves no partial file behind.
#[derive(Error, Debug)]
pub enum WhisperError {
    /// Malformed or out-of-range configuration.
    #[error("invalid parameter: {0}")]
    Parameter(#[from] ParameterError),

    /// A query's time range is invalid.
    #[error("invalid range: {0}")]
    Range(#[from] RangeError),

    /// An archive holds no retained data.
    ///
    /// Reserved for stricter API variants that need a distinguishable
    /// signal instead of a silent empty result.
    #[error("archive {index} holds no data")]
    EmptyArchive {
        /// Index of the empty archive, 0 = highest precision.
        index: usize,
    },

    /// The whisper file does not exist on disk.
    #[error("whisper file not found: '{path}'")]
    FileNotFound {
        /// The missing path.
        path: String,
    },

    /// An underlying I/O operation failed.
    ///
    /// Short header reads, seek failures, and disk errors all land here.
    /// They are fatal and never retried internally.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The file the operation ran against.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by configuration and retention validation.
#[derive(Error, Debug)]
pub enum ParameterError {
    /// An aggregation method name is not one of the five known methods.
    #[error("unknown aggregation method: '{name}'")]
    UnknownAggregationMethod {
        /// The rejected name.
        name: String,
    },

    /// A stored aggregation code does not map to a known method.
    #[error("unknown aggregation method code: {code}")]
    UnknownAggregationCode {
        /// The rejected code.
        code: u32,
    },

    /// The x-files-factor is outside the closed interval [0, 1].
    #[error("x_files_factor {value} must be a value between 0 and 1")]
    XFilesFactorOutOfRange {
        /// The rejected factor.
        value: f32,
    },

    /// No retention definitions were supplied.
    #[error("a whisper file must contain at least one retention definition")]
    NoRetentions,

    /// A time-unit string could not be parsed.
    #[error("invalid time specification: '{input}'")]
    UnparseableTimeUnit {
        /// The rejected input.
        input: String,
    },

    /// A retention spec string could not be parsed.
    #[error("invalid retention specification: '{input}'")]
    UnparseableRetention {
        /// The rejected input.
        input: String,
    },

    /// A retention has a zero interval or zero point count.
    #[error("retention intervals and point counts must be non-zero")]
    ZeroRetention,

    /// Two archives share the same precision.
    #[error("two archives cannot share the same precision ({interval}s)")]
    DuplicateInterval {
        /// The duplicated interval in seconds.
        interval: u32,
    },

    /// Archives are not ordered from highest to lowest precision.
    #[error("archives must be ordered from highest to lowest precision ({first}s listed before {second}s)")]
    IntervalsOutOfOrder {
        /// Interval of the earlier archive.
        first: u32,
        /// Interval of the later, finer archive.
        second: u32,
    },

    /// A finer interval does not evenly divide the next coarser one.
    #[error("archive precisions must evenly divide lower precisions ({second}s % {first}s != 0)")]
    IntervalNotDivisible {
        /// The finer interval.
        first: u32,
        /// The coarser interval that is not a multiple of it.
        second: u32,
    },

    /// Total retentions do not strictly increase across archives.
    #[error("archive retentions must strictly increase ({first}s followed by {second}s)")]
    RetentionNotIncreasing {
        /// Retention of the earlier archive in seconds.
        first: u64,
        /// Retention of the later archive in seconds.
        second: u64,
    },

    /// A single archive's retention does not fit the on-disk u32 field.
    #[error("retention of {interval}s x {points} points does not fit the on-disk format")]
    RetentionTooLarge {
        /// The interval in seconds.
        interval: u32,
        /// The point count.
        points: u32,
    },

    /// The combined archive layout exceeds the addressable file size.
    #[error("archive layout of {bytes} bytes exceeds the addressable file size")]
    FileTooLarge {
        /// The computed total file size.
        bytes: u64,
    },
}

/// Errors raised by time-range validation on the read path.
#[derive(Error, Debug)]
pub enum RangeError {
    /// The first timestamp is greater than the last.
    #[error("first time {from} is greater than last time {to}")]
    StartAfterEnd {
        /// Requested start timestamp.
        from: u32,
        /// Requested end timestamp.
        to: u32,
    },

    /// The requested span exceeds the file's maximum retention.
    #[error("range of {span}s is greater than the max retention ({max_retention}s)")]
    ExceedsMaxRetention {
        /// The requested span in seconds.
        span: u32,
        /// The file's maximum retention in seconds.
        max_retention: u32,
    },
}

/// Type alias for `Result<T, WhisperError>`.
pub type Result<T> = std::result::Result<T, WhisperError>;
