//! Integration tests for archive selection and end-to-end range reads.

use tempfile::tempdir;
use wsp::{CreateOptions, Retention, WhisperFile};

fn retentions(specs: &[&str]) -> Vec<Retention> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

fn create_file(path: &std::path::Path, specs: &[&str]) -> WhisperFile {
    WhisperFile::create(path, &retentions(specs), CreateOptions::default()).unwrap()
}

#[test]
fn test_write_then_read_round_trip() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("round_trip.wsp"), &["10:60", "60:20"]);

    let base = 1_700_000_000u32;
    let base = base - base % 60;
    for i in 0u32..6 {
        file.write(base + i * 10, f64::from(i) * 1.5).unwrap();
    }

    // Writes land in the finest archive and read back from it.
    let series = file.read((base, base + 50)).unwrap();
    assert_eq!(series.interval(), 10);
    assert_eq!(
        series.values(),
        &[Some(0.0), Some(1.5), Some(3.0), Some(4.5), Some(6.0), Some(7.5)]
    );

    // The coarse archive saw nothing.
    let archives = file.archives().unwrap();
    assert_eq!(archives[1].first_timestamp().unwrap(), 0);
}

#[test]
fn test_single_point_queries() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("single.wsp"), &["10:60"]);

    file.write(1000, 42.0).unwrap();

    // Scalar query forms: a one-point series, and the bare value.
    let series = file.read(1000u32).unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series.values(), &[Some(42.0)]);
    assert_eq!(file.read_point(1000).unwrap(), Some(42.0));

    // Unaligned lookups floor to the slot that holds the point.
    assert_eq!(file.read_point(1009).unwrap(), Some(42.0));
    // An empty slot is a gap, not an error.
    assert_eq!(file.read_point(1010).unwrap(), None);
}

#[test]
fn test_query_width_picks_matching_precision() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(
        &temp_dir.path().join("widths.wsp"),
        &["60:1", "240:1", "1200:1"],
    );

    // Populate every archive at the same instant (24000 is aligned to all
    // three intervals).
    let archives = file.archives().unwrap();
    for archive in archives {
        archive.write_point(24_000, 1.0).unwrap();
    }

    // A narrow query fits the finest archive's retention.
    let series = file.read((24_000, 24_060)).unwrap();
    assert_eq!(series.interval(), 60);

    // A wider query disqualifies the 60s archive (60s retention < 240s).
    let series = file.read((24_000, 24_240)).unwrap();
    assert_eq!(series.interval(), 240);

    // The widest query only the coarsest archive can cover.
    let series = file.read((24_000, 25_200)).unwrap();
    assert_eq!(series.interval(), 1200);
}

#[test]
fn test_selection_prefers_archive_with_more_data() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("degraded.wsp"), &["10:6", "20:6"]);
    let archives = file.archives().unwrap();

    // The coarse archive covers the whole window; the fine archive only
    // holds the final point.
    for timestamp in [1140u32, 1160, 1180, 1200] {
        archives[1].write_point(timestamp, 2.0).unwrap();
    }
    archives[0].write_point(1200, 1.0).unwrap();

    // Both archives qualify on retention, but the finer one would answer
    // with a single point, so the coarser archive wins.
    let series = file.read((1140, 1200)).unwrap();
    assert_eq!(series.interval(), 20);
    assert_eq!(
        series.values(),
        &[Some(2.0), Some(2.0), Some(2.0), Some(2.0)]
    );
}

#[test]
fn test_selection_prefers_finest_on_equal_data() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("equal.wsp"), &["10:6", "20:6"]);
    let archives = file.archives().unwrap();

    // Equally good coverage in both archives over the queried window.
    for i in 0u32..6 {
        archives[0].write_point(1140 + i * 10, 1.0).unwrap();
    }
    for i in 0u32..4 {
        archives[1].write_point(1140 + i * 20, 2.0).unwrap();
    }

    let series = file.read((1140, 1190)).unwrap();
    assert_eq!(series.interval(), 10);
    assert!(series.iter().all(|v| v == Some(1.0)));
}

#[test]
fn test_empty_file_falls_back_to_empty_series() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("empty.wsp"), &["10:60", "60:20"]);

    // No archive has ever been written: fallback, not an error.
    let series = file.read((1000, 1300)).unwrap();
    assert!(series.is_empty());
    assert_eq!(file.read_point(1000).unwrap(), None);
}

#[test]
fn test_clear_returns_archive_to_empty() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("cleared.wsp"), &["10:6"]);

    for i in 0u32..6 {
        file.write(1000 + i * 10, f64::from(i)).unwrap();
    }
    assert_eq!(file.read_point(1020).unwrap(), Some(2.0));

    file.archives().unwrap()[0].clear().unwrap();
    let series = file.read((1000, 1050)).unwrap();
    assert!(series.is_empty());
}

#[test]
fn test_ring_wraparound_end_to_end() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("wrap.wsp"), &["10:6"]);

    // Seven writes into six slots: the newest overwrites the oldest.
    for i in 0u32..7 {
        file.write(1000 + i * 10, f64::from(i)).unwrap();
    }

    let series = file.read((1000, 1060)).unwrap();
    assert_eq!(series.interval(), 10);
    assert_eq!(series.len(), 7);
    // The overwritten slot reads as a gap; everything newer survives.
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
fn test_series_pair_iteration_end_to_end() {
    let temp_dir = tempdir().unwrap();
    let file = create_file(&temp_dir.path().join("pairs.wsp"), &["60:10"]);

    file.write(1200, 10.0).unwrap();
    file.write(1260, 20.0).unwrap();

    let series = file.read((1200, 1320)).unwrap();
    let pairs: Vec<_> = series.iter_pairs().collect();
    assert_eq!(
        pairs,
        vec![(Some(10.0), 1200), (Some(20.0), 1260), (None, 1320)]
    );
}
