//! Rolling-window majority vote over raw boolean conditions.
//!
//! A condition is confirmed at index i when at least `min_count` of the last
//! `window` raw observations (fewer at the start of the series) are true.
//! Callers guarantee `min_count <= window`; it is not checked here.

/// Number of true observations in the trailing window ending at each index.
pub fn rolling_counts(raw: &[bool], window: usize) -> Vec<usize> {
    let mut counts = Vec::with_capacity(raw.len());
    let mut count = 0usize;

    for (i, &value) in raw.iter().enumerate() {
        if value {
            count += 1;
        }
        if i >= window && raw[i - window] {
            count -= 1;
        }
        counts.push(count);
    }

    counts
}

pub fn confirm(raw: &[bool], window: usize, min_count: usize) -> Vec<bool> {
    rolling_counts(raw, window)
        .into_iter()
        .map(|count| count >= min_count)
        .collect()
}
