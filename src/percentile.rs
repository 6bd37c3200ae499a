use std::cmp::Ordering;

use crate::error::DigestError;

/// Nearest-rank percentile over an unordered sample set.
///
/// Sorts `samples` ascending in place, then returns the element at index
/// `ceil(rank/100 * n)`, clamped to the last element. The upstream analyzer
/// indexes without the clamp, which reads one past the end at `rank = 100`;
/// here the top rank deliberately resolves to the largest sample.
///
/// Works for both duration samples (`f64`) and counter samples (`u64`), like
/// every metric this tool extracts. Callers must not rely on the pre-call
/// ordering of `samples`.
pub fn percentile<T>(rank: i64, samples: &mut [T]) -> Result<T, DigestError>
where
    T: PartialOrd + Copy,
{
    if !(1..=100).contains(&rank) {
        return Err(DigestError::InvalidRank(rank));
    }
    if samples.is_empty() {
        return Err(DigestError::EmptyInput);
    }

    samples.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let k = ((rank as f64 / 100.0) * samples.len() as f64).ceil() as usize;
    Ok(samples[k.min(samples.len() - 1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_zero_is_invalid() {
        let err = percentile(0, &mut [1.0, 2.0]).unwrap_err();
        assert!(matches!(err, DigestError::InvalidRank(0)));
    }

    #[test]
    fn test_rank_above_hundred_is_invalid() {
        let err = percentile(101, &mut [1.0, 2.0]).unwrap_err();
        assert!(matches!(err, DigestError::InvalidRank(101)));
    }

    #[test]
    fn test_empty_samples_fail() {
        let err = percentile::<f64>(95, &mut []).unwrap_err();
        assert!(matches!(err, DigestError::EmptyInput));
    }

    #[test]
    fn test_nearest_rank_selects_an_actual_sample() {
        let mut samples = vec![12.5, 0.3, 7.1, 99.9, 4.4];
        let original = samples.clone();
        for rank in 1..=100 {
            let value = percentile(rank, &mut samples).unwrap();
            assert!(original.contains(&value), "rank {rank} returned {value}");
        }
    }

    #[test]
    fn test_median_of_ten() {
        let mut samples = vec![100.0, 10.0, 50.0, 90.0, 20.0, 60.0, 30.0, 70.0, 40.0, 80.0];
        // k = ceil(0.5 * 10) = 5, zero-based into the sorted samples.
        assert_eq!(percentile(50, &mut samples).unwrap(), 60.0);
    }

    #[test]
    fn test_p95_of_ten() {
        let mut samples: Vec<u64> = (1..=10).map(|n| n * 10).collect();
        // k = ceil(9.5) = 10, clamped to the last index.
        assert_eq!(percentile(95, &mut samples).unwrap(), 100);
    }

    #[test]
    fn test_rank_100_returns_largest_sample() {
        let mut samples = vec![3.0, 1.0, 2.0];
        assert_eq!(percentile(100, &mut samples).unwrap(), 3.0);
    }

    #[test]
    fn test_single_sample_any_rank() {
        assert_eq!(percentile(1, &mut [42u64]).unwrap(), 42);
        assert_eq!(percentile(50, &mut [42u64]).unwrap(), 42);
        assert_eq!(percentile(100, &mut [42u64]).unwrap(), 42);
    }

    #[test]
    fn test_sorts_the_buffer_in_place() {
        let mut samples = vec![3, 1, 2];
        percentile(50, &mut samples).unwrap();
        assert_eq!(samples, vec![1, 2, 3]);
    }
}
