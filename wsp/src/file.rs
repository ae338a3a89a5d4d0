//! Whole-file operations: creation, header access, and query routing.
//!
//! A [`WhisperFile`] is a lazy handle over one whisper file on disk. It
//! owns the header and the ordered archive collection, validates query
//! ranges, and picks the archive best able to answer each read. All
//! parameter validation happens before any byte is written, so a rejected
//! `create` leaves nothing behind.
//!
//! # Example
//!
//! ```no_run
//! use wsp::{CreateOptions, Retention, WhisperFile};
//!
//! let retentions = [Retention::new(10, 360), Retention::new(60, 1440)];
//! let file = WhisperFile::create("load.wsp", &retentions, CreateOptions::default())?;
//! file.write(1_700_000_000, 0.71)?;
//! let series = file.read((1_700_000_000, 1_700_000_060))?;
//! assert_eq!(series.interval(), 10);
//! # Ok::<(), wsp::WhisperError>(())
//! ```

use std::cell::OnceCell;
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::archive::Archive;
use crate::error::{ParameterError, RangeError, Result};
use crate::format::{
    ARCHIVE_INFO_SIZE, AggregationMethod, DEFAULT_AGGREGATION_METHOD, DEFAULT_X_FILES_FACTOR,
    METADATA_SIZE, POINT_SIZE,
};
use crate::fsio;
use crate::retention::{Retention, validate_retentions};
use crate::series::Series;

/// Parsed header fields, cached after the first read.
#[derive(Debug, Clone, Copy)]
struct Header {
    aggregation: AggregationMethod,
    max_retention: u32,
    x_files_factor: f32,
    archive_count: u32,
}

/// Creation-time settings with the conventional defaults.
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// Aggregation method recorded in the header.
    pub aggregation_method: AggregationMethod,
    /// Fraction of known points required for a rollup, in [0, 1].
    ///
    /// Recorded for external aggregators; this engine stores it without
    /// acting on it.
    pub x_files_factor: f32,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            aggregation_method: DEFAULT_AGGREGATION_METHOD,
            x_files_factor: DEFAULT_X_FILES_FACTOR,
        }
    }
}

/// A read request: either one timestamp or an inclusive range.
///
/// Built implicitly from a scalar, a `(from, to)` pair, or an inclusive
/// range, so call sites read naturally:
///
/// ```no_run
/// use wsp::WhisperFile;
///
/// let file = WhisperFile::open("load.wsp");
/// let one = file.read(1_700_000_000u32)?;
/// let range = file.read((1_700_000_000, 1_700_003_600))?;
/// let same = file.read(1_700_000_000..=1_700_003_600)?;
/// # Ok::<(), wsp::WhisperError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// A single timestamp; answered by a one-point read.
    SinglePoint(u32),
    /// An inclusive `[from, to]` range.
    Range {
        /// Start of the range.
        from: u32,
        /// End of the range.
        to: u32,
    },
}

impl From<u32> for Query {
    fn from(timestamp: u32) -> Self {
        Self::SinglePoint(timestamp)
    }
}

impl From<(u32, u32)> for Query {
    fn from((from, to): (u32, u32)) -> Self {
        Self::Range { from, to }
    }
}

impl From<RangeInclusive<u32>> for Query {
    fn from(range: RangeInclusive<u32>) -> Self {
        Self::Range {
            from: *range.start(),
            to: *range.end(),
        }
    }
}

/// Handle to one whisper file.
///
/// Holds no open file descriptor; each operation reopens the backing file.
/// The header and archive list are read lazily and cached on the handle,
/// and header mutators invalidate the cache they change.
#[derive(Debug)]
pub struct WhisperFile {
    path: PathBuf,
    header: OnceCell<Header>,
    archives: OnceCell<Vec<Archive>>,
}

impl WhisperFile {
    /// Creates a lazy handle for the file at `path`.
    ///
    /// No I/O happens here; a missing file surfaces as
    /// [`WhisperError::FileNotFound`](crate::WhisperError::FileNotFound)
    /// on first access.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            header: OnceCell::new(),
            archives: OnceCell::new(),
        }
    }

    /// Creates a new whisper file with the given archive layout.
    ///
    /// Archives are laid out in the order given, finest first, with point
    /// regions packed contiguously after the descriptor table. Every slot
    /// starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] if the x-files-factor is outside [0, 1]
    /// or the retention list violates the archive ordering invariants. All
    /// validation runs before the file is touched.
    #[allow(clippy::cast_possible_truncation)] // layout bounds are checked against u32
    pub fn create<P: AsRef<Path>>(
        path: P,
        retentions: &[Retention],
        options: CreateOptions,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&options.x_files_factor) {
            return Err(ParameterError::XFilesFactorOutOfRange {
                value: options.x_files_factor,
            }
            .into());
        }
        validate_retentions(retentions)?;

        let mut offset = METADATA_SIZE + ARCHIVE_INFO_SIZE * retentions.len() as u64;
        let mut offsets = Vec::with_capacity(retentions.len());
        for retention in retentions {
            offsets.push(offset);
            offset += u64::from(retention.points) * POINT_SIZE;
        }
        if offset > u64::from(u32::MAX) {
            return Err(ParameterError::FileTooLarge { bytes: offset }.into());
        }

        // validate_retentions guarantees a non-empty list with strictly
        // increasing totals, so the last entry is the maximum.
        let max_retention = retentions[retentions.len() - 1].retention() as u32;
        let header = Header {
            aggregation: options.aggregation_method,
            max_retention,
            x_files_factor: options.x_files_factor,
            archive_count: retentions.len() as u32,
        };

        let path = path.as_ref();
        {
            let mut file = fsio::open_create(path)?;
            fsio::lock_exclusive(path, &file)?;
            file.write_all(&encode_header(header))
                .map_err(|e| fsio::io_error(path, e))?;
        }
        for (index, retention) in retentions.iter().enumerate() {
            Archive::create(
                path,
                index,
                offsets[index] as u32,
                retention.interval,
                retention.points,
            )?;
        }

        let handle = Self::open(path);
        let _ = handle.header.set(header);
        Ok(handle)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Aggregation method recorded in the header.
    pub fn aggregation_method(&self) -> Result<AggregationMethod> {
        Ok(self.header()?.aggregation)
    }

    /// Largest time span any archive in this file can hold, in seconds.
    pub fn max_retention(&self) -> Result<u32> {
        Ok(self.header()?.max_retention)
    }

    /// X-files-factor recorded in the header.
    pub fn x_files_factor(&self) -> Result<f32> {
        Ok(self.header()?.x_files_factor)
    }

    /// Number of archives in this file.
    pub fn archive_count(&self) -> Result<u32> {
        Ok(self.header()?.archive_count)
    }

    /// Interval of the highest-precision archive, in seconds.
    ///
    /// This is the natural cadence for feeding new points to the file.
    pub fn update_interval(&self) -> Result<u32> {
        match self.archives()?.first() {
            Some(archive) => archive.interval(),
            None => Err(ParameterError::NoRetentions.into()),
        }
    }

    /// Rewrites the header with a new aggregation method.
    ///
    /// All other header fields are preserved. Takes `&mut self` because
    /// the cached header is invalidated.
    pub fn set_aggregation_method(&mut self, method: AggregationMethod) -> Result<()> {
        let mut header = self.header()?;
        header.aggregation = method;
        self.write_header(header)?;
        self.header.take();
        Ok(())
    }

    /// Rewrites the header with a new x-files-factor.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::XFilesFactorOutOfRange`] for values
    /// outside [0, 1]; the file is not touched in that case.
    pub fn set_x_files_factor(&mut self, value: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ParameterError::XFilesFactorOutOfRange { value }.into());
        }
        let mut header = self.header()?;
        header.x_files_factor = value;
        self.write_header(header)?;
        self.header.take();
        Ok(())
    }

    /// The file's archives, index 0 = highest precision.
    pub fn archives(&self) -> Result<&[Archive]> {
        if let Some(archives) = self.archives.get() {
            return Ok(archives);
        }
        let count = self.archive_count()? as usize;
        let archives = (0..count).map(|i| Archive::new(&self.path, i)).collect();
        Ok(self.archives.get_or_init(|| archives))
    }

    /// Answers a query from the best-suited archive.
    ///
    /// A single-point query reads one slot; a range query reads the whole
    /// aligned range. See [`read_series`](Self::read_series) for range
    /// validation and archive selection.
    pub fn read<Q: Into<Query>>(&self, query: Q) -> Result<Series> {
        match query.into() {
            Query::SinglePoint(timestamp) => self.read_series(timestamp, timestamp),
            Query::Range { from, to } => self.read_series(from, to),
        }
    }

    /// Reads the single sample recorded for `timestamp`, if any.
    ///
    /// `None` means a gap at the slot or no archive able to answer.
    pub fn read_point(&self, timestamp: u32) -> Result<Option<f64>> {
        Ok(self.read_series(timestamp, timestamp)?.iter().next().flatten())
    }

    /// Reads the inclusive range `[from, to]` as a [`Series`].
    ///
    /// The archive is chosen by precision and data quality: among archives
    /// whose retention covers the span, the search walks from coarsest to
    /// finest, preferring each finer archive whose measured data span over
    /// the range is at least as good, and stops at the first degradation.
    /// If no archive qualifies or none holds matching data, the result is
    /// the empty series.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError`] if `from > to` or the span exceeds the
    /// file's maximum retention.
    pub fn read_series(&self, from: u32, to: u32) -> Result<Series> {
        if from > to {
            return Err(RangeError::StartAfterEnd { from, to }.into());
        }
        let max_retention = self.max_retention()?;
        if to - from > max_retention {
            return Err(RangeError::ExceedsMaxRetention {
                span: to - from,
                max_retention,
            }
            .into());
        }
        match self.select_archive(from, to)? {
            Some(archive) => archive.read(from, to),
            None => Ok(Series::empty()),
        }
    }

    /// Records a single point at the file's highest precision.
    ///
    /// The point lands in the finest archive only; propagation to coarser
    /// archives is the business of an external aggregator.
    pub fn write(&self, timestamp: u32, value: f64) -> Result<()> {
        match self.archives()?.first() {
            Some(archive) => archive.write_point(timestamp, value),
            None => Err(ParameterError::NoRetentions.into()),
        }
    }

    /// Picks the archive to answer `[from, to]`, or `None` for the empty
    /// fallback.
    fn select_archive(&self, from: u32, to: u32) -> Result<Option<&Archive>> {
        let span = u64::from(to - from);
        let mut best: Option<(&Archive, Option<u32>)> = None;
        for archive in self.archives()?.iter().rev() {
            // Retentions shrink toward the finest archive; the first one
            // that cannot cover the span ends the search.
            if archive.retention()? < span {
                break;
            }
            let quality = archive.point_span(from, to)?;
            match best {
                None => best = Some((archive, quality)),
                Some((_, best_quality)) => {
                    if quality >= best_quality {
                        best = Some((archive, quality));
                    } else {
                        break;
                    }
                }
            }
        }
        match best {
            Some((archive, Some(_))) => Ok(Some(archive)),
            _ => Ok(None),
        }
    }

    fn header(&self) -> Result<Header> {
        if let Some(header) = self.header.get() {
            return Ok(*header);
        }
        let header = self.read_header()?;
        Ok(*self.header.get_or_init(|| header))
    }

    fn read_header(&self) -> Result<Header> {
        let mut file = fsio::open_read(&self.path)?;
        let mut buf = [0u8; 16];
        file.read_exact(&mut buf)
            .map_err(|e| fsio::io_error(&self.path, e))?;

        let mut field = [0u8; 4];
        field.copy_from_slice(&buf[0..4]);
        let aggregation = AggregationMethod::from_code(u32::from_be_bytes(field))?;
        field.copy_from_slice(&buf[4..8]);
        let max_retention = u32::from_be_bytes(field);
        field.copy_from_slice(&buf[8..12]);
        let x_files_factor = f32::from_be_bytes(field);
        field.copy_from_slice(&buf[12..16]);
        let archive_count = u32::from_be_bytes(field);

        Ok(Header {
            aggregation,
            max_retention,
            x_files_factor,
            archive_count,
        })
    }

    fn write_header(&self, header: Header) -> Result<()> {
        let mut file = fsio::open_update(&self.path)?;
        fsio::lock_exclusive(&self.path, &file)?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| fsio::io_error(&self.path, e))?;
        file.write_all(&encode_header(header))
            .map_err(|e| fsio::io_error(&self.path, e))?;
        Ok(())
    }
}

fn encode_header(header: Header) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0..4].copy_from_slice(&header.aggregation.code().to_be_bytes());
    buf[4..8].copy_from_slice(&header.max_retention.to_be_bytes());
    buf[8..12].copy_from_slice(&header.x_files_factor.to_be_bytes());
    buf[12..16].copy_from_slice(&header.archive_count.to_be_bytes());
    buf
}
