//! Fixed-size, multi-resolution round-robin time-series storage.
//!
//! `wsp` reads and writes the whisper single-file format: one file holds a
//! small header plus N archives, each a circular buffer of fixed-width
//! big-endian points at one resolution, ordered from highest to lowest
//! precision. Files never grow; new points overwrite the oldest slot in
//! their archive's ring.
//!
//! Range reads pick the best archive automatically: among archives whose
//! retention covers the requested span, the finest one that actually holds
//! data over the range wins. Gaps come back as `None` values in a
//! [`Series`].
//!
//! The engine is an embedded library. It is synchronous, takes advisory
//! exclusive locks around writes, and keeps no point data cached between
//! calls, so several handles (or processes) can share one file.
//!
//! # Example
//!
//! ```no_run
//! use wsp::{CreateOptions, Retention, WhisperFile};
//!
//! // 10-second samples for an hour, 60-second rollup slots for a day.
//! let retentions = [Retention::new(10, 360), Retention::new(60, 1440)];
//! let file = WhisperFile::create("cpu.wsp", &retentions, CreateOptions::default())?;
//!
//! file.write(1_700_000_000, 0.42)?;
//! for (value, timestamp) in file.read((1_700_000_000, 1_700_000_060))?.iter_pairs() {
//!     println!("{timestamp}: {value:?}");
//! }
//! # Ok::<(), wsp::WhisperError>(())
//! ```

pub mod archive;
pub mod error;
pub mod file;
pub mod format;
pub mod retention;
pub mod series;

mod fsio;

pub use archive::Archive;
pub use error::{ParameterError, RangeError, Result, WhisperError};
pub use file::{CreateOptions, Query, WhisperFile};
pub use format::AggregationMethod;
pub use retention::{Retention, parse_time_unit};
pub use series::Series;

use std::path::Path;

/// Opens a lazy handle to an existing whisper file.
///
/// Shorthand for [`WhisperFile::open`].
pub fn open<P: AsRef<Path>>(path: P) -> WhisperFile {
    WhisperFile::open(path)
}

/// Creates a whisper file from compact retention specs.
///
/// Each spec is `interval:points` with optional time-unit suffixes on
/// either side, e.g. `"10s:360"` for 10-second samples in 360 slots.
///
/// # Errors
///
/// Returns [`ParameterError`] for unparseable specs, invalid options, or
/// retention lists that violate the archive ordering invariants.
pub fn create<P: AsRef<Path>>(
    path: P,
    specs: &[&str],
    options: CreateOptions,
) -> Result<WhisperFile> {
    let retentions = specs
        .iter()
        .map(|spec| spec.parse())
        .collect::<Result<Vec<Retention>>>()?;
    WhisperFile::create(path, &retentions, options)
}
