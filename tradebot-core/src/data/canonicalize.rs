//! Canonical bar ordering: ascending, unique timestamps, finite prices.
//!
//! Every provider funnels its output through `canonicalize` so the engine's
//! strict-ascending check only fails on genuinely broken input.

use crate::domain::Bar;

/// Sort ascending, drop rows with non-finite OHLC, and keep the last row for
/// each duplicated timestamp.
pub fn canonicalize(mut bars: Vec<Bar>) -> Vec<Bar> {
    let before = bars.len();
    bars.retain(|b| !b.is_void());
    let void = before - bars.len();

    // Stable sort keeps file order among equal timestamps, so the last
    // occurrence wins below.
    bars.sort_by_key(|b| b.timestamp);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => out.push(bar),
        }
    }

    let duplicates = before - void - out.len();
    if void > 0 || duplicates > 0 {
        tracing::debug!(void, duplicates, kept = out.len(), "canonicalized bars");
    }
    out
}

/// Rows failing the full OHLC consistency check (high is the max, low the min).
pub fn suspicious_rows(bars: &[Bar]) -> Vec<usize> {
    bars.iter()
        .enumerate()
        .filter(|(_, b)| !b.is_sane())
        .map(|(i, _)| i)
        .collect()
}
