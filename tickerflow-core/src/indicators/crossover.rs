//! Age of the current fast-above-slow regime.

/// Number of bars since `fast` last crossed above `slow`.
///
/// Returns `None` when the most recent bar is not fast-above-slow. Otherwise
/// scans backward to the first bar of the current above-run and returns
/// `len - start`, i.e. 1 when the cross happened on the latest bar. When the
/// whole series is above, returns the series length.
pub fn bars_since_cross_above(fast: &[f64], slow: &[f64]) -> Option<usize> {
    let len = fast.len().min(slow.len());
    let above = |i: usize| fast[i] > slow[i];

    if len == 0 || !above(len - 1) {
        return None;
    }

    let start = (1..len).rev().find(|&i| !above(i - 1)).unwrap_or(0);
    Some(len - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_when_not_above() {
        assert_eq!(bars_since_cross_above(&[1.0, 2.0], &[1.0, 3.0]), None);
        assert_eq!(bars_since_cross_above(&[], &[]), None);
    }

    #[test]
    fn cross_on_latest_bar_is_one() {
        assert_eq!(bars_since_cross_above(&[1.0, 1.0, 5.0], &[2.0, 2.0, 2.0]), Some(1));
    }

    #[test]
    fn counts_bars_in_current_run() {
        let fast = [1.0, 3.0, 1.0, 3.0, 3.0, 3.0];
        let slow = [2.0; 6];
        assert_eq!(bars_since_cross_above(&fast, &slow), Some(3));
    }

    #[test]
    fn equal_values_are_not_above() {
        let fast = [2.0, 3.0, 3.0];
        let slow = [2.0, 2.0, 2.0];
        assert_eq!(bars_since_cross_above(&fast, &slow), Some(2));
    }

    #[test]
    fn always_above_returns_len() {
        assert_eq!(bars_since_cross_above(&[3.0; 4], &[1.0; 4]), Some(4));
    }
}
