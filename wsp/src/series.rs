//! Read-result container for range queries.
//!
//! A [`Series`] is an ordered sequence of optional values zipped implicitly
//! with the timestamps `begin, begin + interval, begin + 2*interval, ...`.
//! A `None` value is a gap: no point was recorded for that slot, or the
//! slot still holds data from an older era of the ring.
//!
//! Series are produced by archive reads (and the empty query fallback),
//! and are never mutated after construction.

/// An immutable, time-indexed sequence of optional samples.
///
/// Equality, length, and emptiness follow plain sequence semantics over
/// the value sequence; the interval and bounds are metadata.
#[derive(Debug, Clone)]
pub struct Series {
    values: Vec<Option<f64>>,
    interval: u32,
    begin: u32,
    end: u32,
}

impl Series {
    /// Creates a series from its values and time metadata.
    ///
    /// `begin` and `end` are inclusive and expected to be aligned to
    /// `interval`; the constructor does not re-verify this.
    pub fn new(values: Vec<Option<f64>>, interval: u32, begin: u32, end: u32) -> Self {
        Self {
            values,
            interval,
            begin,
            end,
        }
    }

    /// The zero-shaped series returned when no archive can serve a query.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0, 0)
    }

    /// Seconds between consecutive samples.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Inclusive timestamp of the first sample.
    pub fn begin(&self) -> u32 {
        self.begin
    }

    /// Inclusive timestamp of the last sample.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of samples, gaps included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw value sequence.
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Iterates over values alone.
    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.values.iter().copied()
    }

    /// Iterates over `(value, timestamp)` pairs.
    ///
    /// Timestamps are derived from `begin` and `interval`; the iterator is
    /// restartable and does not touch the file.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wsp::Series;
    ///
    /// let series = Series::new(vec![Some(1.0), None, Some(3.0)], 10, 100, 120);
    /// let pairs: Vec<_> = series.iter_pairs().collect();
    /// assert_eq!(pairs, vec![(Some(1.0), 100), (None, 110), (Some(3.0), 120)]);
    /// ```
    #[allow(clippy::cast_possible_truncation)] // slot counts are bounded by u32 capacities
    pub fn iter_pairs(&self) -> impl Iterator<Item = (Option<f64>, u32)> + '_ {
        let begin = self.begin;
        let interval = self.interval;
        self.values
            .iter()
            .enumerate()
            .map(move |(i, value)| (*value, begin.wrapping_add(interval.wrapping_mul(i as u32))))
    }
}

impl PartialEq for Series {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl PartialEq<Vec<Option<f64>>> for Series {
    fn eq(&self, other: &Vec<Option<f64>>) -> bool {
        &self.values == other
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = Option<f64>;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Option<f64>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Series {
        let values = (0..7).map(|i| Some(f64::from(i))).collect();
        Series::new(values, 1, 1000, 1006)
    }

    #[test]
    fn test_values_iteration() {
        let series = sample();
        for (i, value) in series.iter().enumerate() {
            assert_eq!(value, Some(i as f64));
        }
        // The view is restartable.
        assert_eq!(series.iter().count(), 7);
        assert_eq!(series.iter().count(), 7);
    }

    #[test]
    fn test_pair_iteration() {
        let series = sample();
        let mut expected_timestamp = series.begin();
        for (value, timestamp) in series.iter_pairs() {
            assert_eq!(timestamp, expected_timestamp);
            assert!(value.is_some());
            expected_timestamp += series.interval();
        }
        assert_eq!(expected_timestamp, series.end() + series.interval());
    }

    #[test]
    fn test_sequence_equality_ignores_metadata() {
        let a = Series::new(vec![Some(1.0), None], 10, 0, 10);
        let b = Series::new(vec![Some(1.0), None], 60, 500, 560);
        assert_eq!(a, b);
        assert_eq!(a, vec![Some(1.0), None]);
    }

    #[test]
    fn test_empty_fallback_shape() {
        let series = Series::empty();
        assert!(series.is_empty());
        assert_eq!(series.len(), 0);
        assert_eq!(series.interval(), 0);
        assert_eq!(series.begin(), 0);
        assert_eq!(series.end(), 0);
    }

    #[test]
    fn test_gaps_preserved_in_length() {
        let series = Series::new(vec![None, Some(2.0), None], 60, 0, 120);
        assert_eq!(series.len(), 3);
        assert!(!series.is_empty());
    }
}
