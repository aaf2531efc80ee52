//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window.
//! Lookback: window - 1 (first valid value at index window-1).
//! Any NaN inside a window makes that output NaN.

/// Compute the SMA of an arbitrary series.
///
/// Returns a vector of the same length as `values`. Fewer than `window`
/// values (or `window == 0`) yields an all-NaN result.
pub fn sma_of_series(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if window == 0 || n < window {
        return result;
    }

    // Initial window
    let mut sum = 0.0;
    let mut nan_in_window = false;
    for &v in values.iter().take(window) {
        if v.is_nan() {
            nan_in_window = true;
        }
        sum += v;
    }

    if !nan_in_window {
        result[window - 1] = sum / window as f64;
    }

    // Roll forward
    for i in window..n {
        let leaving = values[i - window];
        let entering = values[i];

        if entering.is_nan() || leaving.is_nan() || nan_in_window {
            // NaN breaks the running sum; rescan the window
            nan_in_window = false;
            sum = 0.0;
            for &v in &values[(i + 1 - window)..=i] {
                if v.is_nan() {
                    nan_in_window = true;
                }
                sum += v;
            }
            if nan_in_window {
                continue;
            }
        } else {
            sum = sum - leaving + entering;
        }

        result[i] = sum / window as f64;
    }

    result
}
