/// Percentile with linear interpolation between closest ranks.
///
/// `p` is in `[0, 100]`. Returns `None` for an empty slice. The input does
/// not need to be sorted.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_sorted(&sorted, p))
}

/// Same as [`percentile`] for an already sorted, non-empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty(), "percentile of empty slice");
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// `num / den`, or 1.0 ("no change") when the result would not be finite.
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() || !num.is_finite() {
        return 1.0;
    }
    num / den
}

/// Causal exponential moving average with `alpha = 2 / (window + 1)`.
///
/// `ema[0] = v[0]`, `ema[i] = alpha * v[i] + (1 - alpha) * ema[i - 1]`.
pub fn ema(values: &[f64], window: usize) -> Vec<f64> {
    let alpha = 2.0 / (window as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return out;
    };
    let mut acc = first;
    out.push(acc);
    for &v in &values[1..] {
        acc = alpha * v + (1.0 - alpha) * acc;
        out.push(acc);
    }
    out
}

/// Half-open window `[start, end)` centered on `i` for a series of length `n`.
pub fn centered_window(i: usize, n: usize, window: usize) -> (usize, usize) {
    let half = window / 2;
    (i.saturating_sub(half), (i + half + 1).min(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::odd_count(&[3.0, 1.0, 2.0], 2.0)]
    #[case::even_count(&[4.0, 1.0, 3.0, 2.0], 2.5)]
    #[case::single(&[7.0], 7.0)]
    fn test_median(#[case] values: &[f64], #[case] expected: f64) {
        assert_relative_eq!(median(values).unwrap(), expected);
    }

    #[test]
    fn test_percentile_interpolates_between_ranks() {
        // rank = 0.75 * 4 = 3.0 -> exact element
        assert_relative_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 75.0).unwrap(), 4.0);
        // rank = 0.75 * 3 = 2.25 -> 3 + 0.25 * (4 - 3)
        assert_relative_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 75.0).unwrap(), 3.25);
    }

    #[test]
    fn test_percentile_bounds() {
        let values = [10.0, 20.0, 30.0];
        assert_relative_eq!(percentile(&values, 0.0).unwrap(), 10.0);
        assert_relative_eq!(percentile(&values, 100.0).unwrap(), 30.0);
    }

    #[test]
    fn test_empty_inputs_return_none() {
        assert!(percentile(&[], 50.0).is_none());
        assert!(median(&[]).is_none());
        assert!(mean(&[]).is_none());
        assert!(std_dev(&[]).is_none());
    }

    #[test]
    fn test_std_dev() {
        assert_relative_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.0);
    }

    #[rstest]
    #[case::zero(10.0, 0.0)]
    #[case::nan(10.0, f64::NAN)]
    #[case::inf(10.0, f64::INFINITY)]
    fn test_safe_ratio_guards(#[case] num: f64, #[case] den: f64) {
        assert_relative_eq!(safe_ratio(num, den), 1.0);
    }

    #[test]
    fn test_safe_ratio_divides() {
        assert_relative_eq!(safe_ratio(3.0, 4.0), 0.75);
    }

    #[rstest]
    #[case::start(0, 100, 15, (0, 8))]
    #[case::middle(50, 100, 15, (43, 58))]
    #[case::end(99, 100, 15, (92, 100))]
    #[case::short(1, 3, 15, (0, 3))]
    fn test_centered_window(
        #[case] i: usize,
        #[case] n: usize,
        #[case] window: usize,
        #[case] expected: (usize, usize),
    ) {
        assert_eq!(centered_window(i, n, window), expected);
    }

    #[test]
    fn test_ema_recurrence() {
        // window 3 -> alpha 0.5
        let out = ema(&[0.0, 10.0, 10.0], 3);
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[1], 5.0);
        assert_relative_eq!(out[2], 7.5);
    }

    #[test]
    fn test_ema_empty() {
        assert!(ema(&[], 45).is_empty());
    }
}
