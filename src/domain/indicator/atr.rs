//! Average True Range with Wilder's smoothing.
//!
//! TR[0] = high - low; TR[i] = max(high - low, |high - prevClose|, |low - prevClose|).
//! ATR is the exponential average of TR with alpha = 1/n seeded at TR[0],
//! reported from index n-1 onwards.

use crate::domain::ohlcv::{true_range, PriceBar};

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = high.len().min(low.len()).min(close.len());
    let mut out = vec![None; len];
    if period == 0 {
        return out;
    }

    let alpha = 1.0 / period as f64;
    let mut avg = 0.0;

    for i in 0..len {
        let tr = if i == 0 {
            high[0] - low[0]
        } else {
            true_range(high[i], low[i], close[i - 1])
        }
        .max(0.0);

        avg = if i == 0 {
            tr
        } else {
            alpha * tr + (1.0 - alpha) * avg
        };

        if i + 1 >= period {
            out[i] = Some(avg);
        }
    }

    out
}

pub fn atr_from_bars(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    atr(&high, &low, &close, period)
}
