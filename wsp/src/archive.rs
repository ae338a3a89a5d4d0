//! One resolution tier of a whisper file: a fixed-size ring of points.
//!
//! An archive is `points` consecutive 12-byte slots starting at the byte
//! offset recorded in its descriptor. The slot at byte offset 0 of the
//! region is the anchor: its stored timestamp defines the mapping from any
//! timestamp to a slot for the whole archive, via modular arithmetic over
//! the region size. There is no separate write-head cursor; a timestamp of
//! 0 in the anchor slot means the archive has never been written.
//!
//! Archives borrow the file path and reopen the file for every logical
//! operation. Descriptor fields are read once and cached; point data is
//! never cached across calls.

use std::cell::OnceCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::format::{ARCHIVE_INFO_OFFSET, ARCHIVE_INFO_SIZE, POINT_SIZE};
use crate::fsio;
use crate::series::Series;

/// Parsed archive descriptor fields.
#[derive(Debug, Clone, Copy)]
struct ArchiveInfo {
    /// Byte offset of the point region within the file.
    offset: u32,
    /// Seconds between points.
    interval: u32,
    /// Point capacity of the ring.
    points: u32,
}

/// Byte-addressing and data access for one resolution tier.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    index: usize,
    info: OnceCell<ArchiveInfo>,
}

impl Archive {
    /// Creates a lazy handle for the archive at `index` within the file.
    ///
    /// Nothing is read until a descriptor field or point is first needed,
    /// so the handle is valid even if the file does not exist yet.
    pub fn new<P: AsRef<Path>>(path: P, index: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            index,
            info: OnceCell::new(),
        }
    }

    /// Writes the archive's descriptor and zero-fills its point region.
    ///
    /// The caller has already validated `interval` and `points`; no value
    /// checks happen here. The result is a ready, all-empty archive.
    pub(crate) fn create(
        path: &Path,
        index: usize,
        offset: u32,
        interval: u32,
        points: u32,
    ) -> Result<Self> {
        let archive = Self::new(path, index);
        let info = ArchiveInfo {
            offset,
            interval,
            points,
        };
        archive.write_info(info)?;
        let _ = archive.info.set(info);
        archive.clear()?;
        Ok(archive)
    }

    /// Index of this archive within the file, 0 = highest precision.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Seconds between points.
    pub fn interval(&self) -> Result<u32> {
        Ok(self.info()?.interval)
    }

    /// Byte offset of the point region within the file.
    pub fn offset(&self) -> Result<u32> {
        Ok(self.info()?.offset)
    }

    /// Point capacity of the ring.
    pub fn points(&self) -> Result<u32> {
        Ok(self.info()?.points)
    }

    /// Total time span this archive can hold, in seconds.
    pub fn retention(&self) -> Result<u64> {
        let info = self.info()?;
        Ok(u64::from(info.interval) * u64::from(info.points))
    }

    /// Size of the point region in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(u64::from(self.info()?.points) * POINT_SIZE)
    }

    /// Zero-fills the point region under an exclusive lock.
    ///
    /// The descriptor is untouched; every slot reads as a gap afterwards.
    #[allow(clippy::cast_possible_truncation)] // region sizes are bounded by u32 points
    pub fn clear(&self) -> Result<()> {
        let info = self.info()?;
        let mut file = fsio::open_update(&self.path)?;
        fsio::lock_exclusive(&self.path, &file)?;
        file.seek(SeekFrom::Start(u64::from(info.offset)))
            .map_err(|e| fsio::io_error(&self.path, e))?;
        let zeros = vec![0u8; (u64::from(info.points) * POINT_SIZE) as usize];
        file.write_all(&zeros)
            .map_err(|e| fsio::io_error(&self.path, e))?;
        Ok(())
    }

    /// Reads the anchor slot's timestamp.
    ///
    /// A value of 0 means the archive has never been written; read
    /// operations short-circuit to "no data" in that case.
    pub fn first_timestamp(&self) -> Result<u32> {
        let info = self.info()?;
        let mut file = fsio::open_read(&self.path)?;
        self.timestamp_at_offset(&mut file, u64::from(info.offset))
    }

    /// Floors `timestamp` to the nearest interval multiple at or below it.
    pub fn align_timestamp(&self, timestamp: u32) -> Result<u32> {
        let interval = self.interval()?;
        Ok(timestamp - timestamp % interval)
    }

    /// Counts the real data present for the aligned range `[from, to]`.
    ///
    /// Searches outward from both ends of the range along the interval
    /// grid until a slot whose stored timestamp equals the expected one is
    /// found at each end, and returns the distance between those matches.
    /// `None` means no matching sample exists in either direction, or the
    /// archive has never been written. Used only for archive-selection
    /// quality comparison.
    pub fn point_span(&self, from: u32, to: u32) -> Result<Option<u32>> {
        let anchor = self.first_timestamp()?;
        if anchor == 0 {
            return Ok(None);
        }
        let interval = self.interval()?;
        let from = self.align_timestamp(from)?;
        let to = self.align_timestamp(to)?;
        let mut file = fsio::open_read(&self.path)?;

        let mut first = None;
        let mut timestamp = i64::from(from);
        while timestamp <= i64::from(to) {
            if i64::from(self.timestamp_at(&mut file, timestamp, anchor)?) == timestamp {
                first = Some(timestamp);
                break;
            }
            timestamp += i64::from(interval);
        }
        let Some(first) = first else {
            return Ok(None);
        };

        let mut last = None;
        let mut timestamp = i64::from(to);
        while timestamp >= first {
            if i64::from(self.timestamp_at(&mut file, timestamp, anchor)?) == timestamp {
                last = Some(timestamp);
                break;
            }
            timestamp -= i64::from(interval);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let span = last.map(|last| (last - first) as u32);
        Ok(span)
    }

    /// Reads the aligned range `[from, to]` as a [`Series`].
    ///
    /// Both bounds are floored to the interval grid. A slot whose stored
    /// timestamp does not equal the expected sequential timestamp is
    /// reported as a gap rather than stale data; this guards against slots
    /// that were never overwritten with the queried era's points. If the
    /// archive has never been written, the result is an all-gap series of
    /// the same shape.
    #[allow(clippy::cast_possible_truncation)] // point counts are bounded by u32 capacities
    pub fn read(&self, from: u32, to: u32) -> Result<Series> {
        let info = self.info()?;
        let from = self.align_timestamp(from)?;
        let to = self.align_timestamp(to)?;
        let total_points = Self::total_points(from, to, info.interval);

        let anchor = self.first_timestamp()?;
        if anchor == 0 {
            return Ok(Series::new(
                vec![None; total_points as usize],
                info.interval,
                from,
                to,
            ));
        }

        let (start, end) = self.byte_offsets(from, to, anchor)?;
        let region_start = u64::from(info.offset);
        let region_end = region_start + u64::from(info.points) * POINT_SIZE;
        let total_bytes = total_points * POINT_SIZE;

        let mut file = fsio::open_read(&self.path)?;
        let mut raw = Vec::with_capacity(total_bytes as usize);
        if start > end {
            // Contiguous run in file order, wrapping past the region end
            // only if the slot count demands it.
            self.seek(&mut file, start)?;
            self.read_up_to(&mut file, total_bytes.min(region_end - start), &mut raw)?;
            if total_bytes > region_end - start {
                self.seek(&mut file, region_start)?;
                self.read_up_to(&mut file, total_bytes - (region_end - start), &mut raw)?;
            }
        } else {
            // The run wraps past the end of the region back to its start.
            self.seek(&mut file, start)?;
            self.read_up_to(&mut file, region_end - start, &mut raw)?;
            self.seek(&mut file, region_start)?;
            self.read_up_to(&mut file, end - region_start, &mut raw)?;
        }

        let mut values = Vec::with_capacity(total_points as usize);
        let mut expected = u64::from(from);
        for chunk in raw.chunks_exact(POINT_SIZE as usize).take(total_points as usize) {
            let mut timestamp_bytes = [0u8; 4];
            timestamp_bytes.copy_from_slice(&chunk[..4]);
            let mut value_bytes = [0u8; 8];
            value_bytes.copy_from_slice(&chunk[4..]);
            let timestamp = u32::from_be_bytes(timestamp_bytes);
            values.push(if u64::from(timestamp) == expected {
                Some(f64::from_be_bytes(value_bytes))
            } else {
                None
            });
            expected += u64::from(info.interval);
        }
        // Anything the file could not supply decodes as gaps.
        values.resize(total_points as usize, None);

        Ok(Series::new(values, info.interval, from, to))
    }

    /// Writes a single point at the slot for `timestamp`.
    ///
    /// The timestamp is floored to the interval grid. The first write to a
    /// never-written archive lands in the anchor slot, making its aligned
    /// timestamp the anchor for all later address computations; subsequent
    /// writes use the same address mapping as `read`. Runs under an
    /// exclusive lock. No propagation to other archives happens here.
    pub fn write_point(&self, timestamp: u32, value: f64) -> Result<()> {
        let info = self.info()?;
        let timestamp = self.align_timestamp(timestamp)?;
        let anchor = self.first_timestamp()?;
        let slot_offset = if anchor == 0 {
            u64::from(info.offset)
        } else {
            self.byte_offsets(timestamp, timestamp, anchor)?.0
        };

        let mut file = fsio::open_update(&self.path)?;
        fsio::lock_exclusive(&self.path, &file)?;
        self.seek(&mut file, slot_offset)?;
        let mut point = [0u8; 12];
        point[..4].copy_from_slice(&timestamp.to_be_bytes());
        point[4..].copy_from_slice(&value.to_be_bytes());
        file.write_all(&point)
            .map_err(|e| fsio::io_error(&self.path, e))?;
        Ok(())
    }

    /// Maps the aligned range `[from, to]` to byte offsets within the file.
    ///
    /// The start offset derives from the anchor timestamp: time deltas map
    /// linearly onto slots and wrap modulo the region size. The end offset
    /// derives from the total number of points spanning the range. Deltas
    /// may be negative, so the modulo is floored (euclidean).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn byte_offsets(&self, from: u32, to: u32, anchor: u32) -> Result<(u64, u64)> {
        let info = self.info()?;
        let size = u64::from(info.points) * POINT_SIZE;
        let time_offset = i64::from(from) - i64::from(anchor);
        let start_distance = (time_offset / i64::from(info.interval)) * POINT_SIZE as i64;
        let start = u64::from(info.offset) + start_distance.rem_euclid(size as i64) as u64;
        let total_bytes = Self::total_points(from, to, info.interval) * POINT_SIZE;
        let end = u64::from(info.offset) + total_bytes % size;
        Ok((start, end))
    }

    /// Number of interval steps spanning `[from, to]`, bounds inclusive.
    fn total_points(from: u32, to: u32, interval: u32) -> u64 {
        u64::from((to - from) / interval) + 1
    }

    /// Reads the stored timestamp at the slot mapped for `timestamp`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn timestamp_at(&self, file: &mut File, timestamp: i64, anchor: u32) -> Result<u32> {
        let timestamp = timestamp as u32;
        let (slot_offset, _) = self.byte_offsets(timestamp, timestamp, anchor)?;
        self.timestamp_at_offset(file, slot_offset)
    }

    fn timestamp_at_offset(&self, file: &mut File, offset: u64) -> Result<u32> {
        self.seek(file, offset)?;
        let mut buf = [0u8; 4];
        file.read_exact(&mut buf)
            .map_err(|e| fsio::io_error(&self.path, e))?;
        Ok(u32::from_be_bytes(buf))
    }

    fn seek(&self, file: &mut File, offset: u64) -> Result<()> {
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| fsio::io_error(&self.path, e))?;
        Ok(())
    }

    /// Reads at most `limit` bytes into `buf`, tolerating end of file.
    fn read_up_to(&self, file: &mut File, limit: u64, buf: &mut Vec<u8>) -> Result<()> {
        file.take(limit)
            .read_to_end(buf)
            .map_err(|e| fsio::io_error(&self.path, e))?;
        Ok(())
    }

    fn info(&self) -> Result<ArchiveInfo> {
        if let Some(info) = self.info.get() {
            return Ok(*info);
        }
        let info = self.read_info()?;
        Ok(*self.info.get_or_init(|| info))
    }

    fn info_offset(&self) -> u64 {
        ARCHIVE_INFO_OFFSET + ARCHIVE_INFO_SIZE * self.index as u64
    }

    fn read_info(&self) -> Result<ArchiveInfo> {
        let mut file = fsio::open_read(&self.path)?;
        self.seek(&mut file, self.info_offset())?;
        let mut buf = [0u8; 12];
        file.read_exact(&mut buf)
            .map_err(|e| fsio::io_error(&self.path, e))?;

        let mut field = [0u8; 4];
        field.copy_from_slice(&buf[0..4]);
        let offset = u32::from_be_bytes(field);
        field.copy_from_slice(&buf[4..8]);
        let interval = u32::from_be_bytes(field);
        field.copy_from_slice(&buf[8..12]);
        let points = u32::from_be_bytes(field);

        Ok(ArchiveInfo {
            offset,
            interval,
            points,
        })
    }

    fn write_info(&self, info: ArchiveInfo) -> Result<()> {
        let mut file = fsio::open_update(&self.path)?;
        fsio::lock_exclusive(&self.path, &file)?;
        self.seek(&mut file, self.info_offset())?;
        let mut buf = [0u8; 12];
        buf[0..4].copy_from_slice(&info.offset.to_be_bytes());
        buf[4..8].copy_from_slice(&info.interval.to_be_bytes());
        buf[8..12].copy_from_slice(&info.points.to_be_bytes());
        file.write_all(&buf)
            .map_err(|e| fsio::io_error(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{CreateOptions, WhisperFile};
    use crate::retention::Retention;
    use tempfile::tempdir;

    fn create_file(retentions: &[Retention]) -> (WhisperFile, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wsp");
        let file = WhisperFile::create(&path, retentions, CreateOptions::default()).unwrap();
        (file, dir)
    }

    #[test]
    fn test_descriptor_fields() {
        let (file, _dir) = create_file(&[Retention::new(10, 60), Retention::new(60, 20)]);
        let archive = Archive::new(file.path(), 0);

        assert_eq!(archive.interval().unwrap(), 10);
        assert_eq!(archive.points().unwrap(), 60);
        assert_eq!(archive.retention().unwrap(), 600);
        // Header (16) + two descriptors (24) = 40.
        assert_eq!(archive.offset().unwrap(), 40);
        assert_eq!(archive.size().unwrap(), 720);

        let coarse = Archive::new(file.path(), 1);
        assert_eq!(coarse.offset().unwrap(), 760);
        assert_eq!(coarse.interval().unwrap(), 60);
        assert_eq!(coarse.retention().unwrap(), 1200);
    }

    #[test]
    fn test_align_timestamp() {
        let (file, _dir) = create_file(&[Retention::new(60, 10)]);
        let archive = Archive::new(file.path(), 0);

        assert_eq!(archive.align_timestamp(630).unwrap(), 600);
        assert_eq!(archive.align_timestamp(600).unwrap(), 600);
        assert_eq!(archive.align_timestamp(659).unwrap(), 600);
    }

    #[test]
    fn test_never_written_archive() {
        let (file, _dir) = create_file(&[Retention::new(10, 60)]);
        let archive = Archive::new(file.path(), 0);

        assert_eq!(archive.first_timestamp().unwrap(), 0);
        assert_eq!(archive.point_span(1000, 1090).unwrap(), None);

        let series = archive.read(1000, 1090).unwrap();
        assert_eq!(series.len(), 10);
        assert!(series.iter().all(|value| value.is_none()));
        assert_eq!(series.interval(), 10);
        assert_eq!(series.begin(), 1000);
        assert_eq!(series.end(), 1090);
    }

    #[test]
    fn test_first_write_defines_anchor() {
        let (file, _dir) = create_file(&[Retention::new(60, 10)]);
        let archive = Archive::new(file.path(), 0);

        // 1000 floors to 960 on the 60s grid.
        archive.write_point(1000, 42.5).unwrap();
        assert_eq!(archive.first_timestamp().unwrap(), 960);

        let series = archive.read(960, 1020).unwrap();
        assert_eq!(series.values(), &[Some(42.5), None]);
    }

    #[test]
    fn test_single_point_then_gap() {
        let (file, _dir) = create_file(&[Retention::new(60, 10)]);
        let archive = Archive::new(file.path(), 0);

        archive.write_point(1200, 7.0).unwrap();
        let series = archive.read(1200, 1260).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.values(), &[Some(7.0), None]);
    }

    #[test]
    fn test_sequential_writes_round_trip() {
        let (file, _dir) = create_file(&[Retention::new(10, 6)]);
        let archive = Archive::new(file.path(), 0);

        for i in 0u32..6 {
            let timestamp = 1000 + i * 10;
            archive.write_point(timestamp, f64::from(i)).unwrap();
        }

        let series = archive.read(1000, 1050).unwrap();
        assert_eq!(
            series.values(),
            &[Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]
        );
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let (file, _dir) = create_file(&[Retention::new(10, 6)]);
        let archive = Archive::new(file.path(), 0);

        // Seven writes into six slots: 1060 reuses the anchor slot.
        for i in 0u32..7 {
            let timestamp = 1000 + i * 10;
            archive.write_point(timestamp, f64::from(i)).unwrap();
        }
        assert_eq!(archive.first_timestamp().unwrap(), 1060);

        let series = archive.read(1000, 1060).unwrap();
        assert_eq!(series.len(), 7);
        // 1000 was overwritten and now reads as a gap; the rest survive.
        assert_eq!(
            series.values(),
            &[
                None,
                Some(1.0),
                Some(2.0),
                Some(3.0),
                Some(4.0),
                Some(5.0),
                Some(6.0)
            ]
        );
    }

    #[test]
    fn test_read_past_newest_slot_wraps_to_gaps() {
        let (file, _dir) = create_file(&[Retention::new(10, 6), Retention::new(60, 2)]);
        let archive = Archive::new(file.path(), 0);

        for i in 0u32..6 {
            archive.write_point(1000 + i * 10, f64::from(i)).unwrap();
        }

        // The run starts mid-region and crosses the region end; the slot
        // past the newest point still belongs to the 1000 era, so it reads
        // as a gap rather than bleeding into the coarse archive's bytes.
        let series = archive.read(1040, 1060).unwrap();
        assert_eq!(series.values(), &[Some(4.0), Some(5.0), None]);
    }

    #[test]
    fn test_point_span_measures_matched_ends() {
        let (file, _dir) = create_file(&[Retention::new(20, 6)]);
        let archive = Archive::new(file.path(), 0);

        archive.write_point(1140, 1.0).unwrap();
        archive.write_point(1160, 2.0).unwrap();
        archive.write_point(1200, 3.0).unwrap();

        assert_eq!(archive.point_span(1140, 1200).unwrap(), Some(60));
        assert_eq!(archive.point_span(1160, 1200).unwrap(), Some(40));
        assert_eq!(archive.point_span(1200, 1200).unwrap(), Some(0));
        // No matching slot anywhere in the probed range.
        assert_eq!(archive.point_span(1220, 1240).unwrap(), None);
    }

    #[test]
    fn test_clear_erases_all_slots() {
        let (file, _dir) = create_file(&[Retention::new(10, 6)]);
        let archive = Archive::new(file.path(), 0);

        for i in 0u32..6 {
            archive.write_point(1000 + i * 10, f64::from(i)).unwrap();
        }
        archive.clear().unwrap();

        assert_eq!(archive.first_timestamp().unwrap(), 0);
        assert_eq!(archive.point_span(1000, 1050).unwrap(), None);
        let series = archive.read(1000, 1050).unwrap();
        assert_eq!(series.len(), 6);
        assert!(series.iter().all(|value| value.is_none()));
    }

    #[test]
    fn test_unaligned_bounds_are_floored() {
        let (file, _dir) = create_file(&[Retention::new(60, 10)]);
        let archive = Archive::new(file.path(), 0);

        archive.write_point(1200, 9.0).unwrap();
        let series = archive.read(1259, 1319).unwrap();
        assert_eq!(series.begin(), 1200);
        assert_eq!(series.end(), 1260);
        assert_eq!(series.values(), &[Some(9.0), None]);
    }
}
