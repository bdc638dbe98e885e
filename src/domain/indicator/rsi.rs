//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! Per step: gain = max(delta, 0), loss = max(-delta, 0). Average gain and
//! loss are exponentially smoothed with alpha = 1/window, seeded with the
//! first observed change:
//!
//!   avg[1] = x[1]
//!   avg[i] = alpha * x[i] + (1 - alpha) * avg[i-1]
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! avg_loss == 0 with avg_gain > 0 gives exactly 100; both zero is undefined.
//!
//! Warmup: the first `window - 1` points are undefined, matching the moving
//! average. Index 0 has no change and is always undefined.

pub fn rsi(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if window == 0 || closes.len() < 2 {
        return out;
    }

    let alpha = 1.0 / window as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }

        if i + 1 >= window {
            out[i] = from_averages(avg_gain, avg_loss);
        }
    }

    out
}

fn from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        if avg_gain > 0.0 { Some(100.0) } else { None }
    } else {
        Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 - i as f64).collect()
    }

    #[test]
    fn rsi_empty_and_single() {
        assert!(rsi(&[], 14).is_empty());
        assert_eq!(rsi(&[100.0], 14), vec![None]);
    }

    #[test]
    fn rsi_warmup_period() {
        let out = rsi(&rising(20), 14);
        for (i, point) in out.iter().enumerate().take(13) {
            assert!(point.is_none(), "point {} should be in warmup", i);
        }
        assert!(out[13].is_some());
    }

    #[test]
    fn rsi_all_gains_is_exactly_100() {
        let out = rsi(&rising(30), 14);
        assert_eq!(out[29], Some(100.0));
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let out = rsi(&falling(30), 14);
        assert_eq!(out[29], Some(0.0));
    }

    #[test]
    fn rsi_flat_series_is_undefined() {
        let out = rsi(&[50.0; 30], 14);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn rsi_declining_tail_is_oversold() {
        let mut closes = rising(20);
        closes.extend((0..20).map(|i| 118.0 - 2.0 * i as f64));
        let out = rsi(&closes, 14);
        let last = out.last().copied().flatten().unwrap();
        assert!(last < 30.0, "expected oversold reading, got {last}");
    }

    #[test]
    fn rsi_zero_window() {
        let out = rsi(&[1.0, 2.0, 3.0], 0);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn rsi_two_step_smoothing() {
        // window 2: avg_gain = 1.0 then 0.5*0 + 0.5*1 = 0.5; avg_loss = 0 then 0.5*2 = 1.0
        let out = rsi(&[10.0, 11.0, 9.0], 2);
        assert_eq!(out[0], None);
        assert_eq!(out[1], Some(100.0));
        let expected = 100.0 - 100.0 / (1.0 + 0.5 / 1.0);
        approx::assert_abs_diff_eq!(out[2].unwrap(), expected, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn rsi_stays_in_range(
            closes in prop::collection::vec(1.0f64..500.0, 2..120),
            window in 1usize..30,
        ) {
            for value in rsi(&closes, window).into_iter().flatten() {
                prop_assert!((0.0..=100.0).contains(&value), "rsi {} out of range", value);
            }
        }
    }
}
