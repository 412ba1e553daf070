/// Arithmetic mean truncated toward zero. Returns 0 for empty input.
///
/// Summed in `i128`; the mean of `i64` values always fits back in `i64`.
pub fn truncated_mean(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let sum: i128 = values.iter().map(|&v| i128::from(v)).sum();
    (sum / values.len() as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_mean() {
        assert_eq!(truncated_mean(&[10, 11, 12]), 11);
        assert_eq!(truncated_mean(&[10, 10, 11]), 10);
        assert_eq!(truncated_mean(&[10, 10, 12]), 10);
        assert_eq!(truncated_mean(&[]), 0);
    }

    #[test]
    fn test_truncated_mean_rounds_toward_zero_for_negatives() {
        assert_eq!(truncated_mean(&[-10, -10, -12]), -10);
    }

    #[test]
    fn test_truncated_mean_at_the_limits() {
        assert_eq!(truncated_mean(&[i64::MAX; 3]), i64::MAX);
        assert_eq!(truncated_mean(&[i64::MIN; 3]), i64::MIN);
        assert_eq!(truncated_mean(&[i64::MAX, i64::MAX, 0]), 6_148_914_691_236_517_204);
    }
}
