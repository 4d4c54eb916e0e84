//! Deterministic synthetic bars for offline runs and tests.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::Bar;

/// Daily random walk from 100.0, weekdays only.
///
/// The RNG is seeded from the BLAKE3 hash of the symbol, so the same symbol
/// and date range always produce the same bars.
pub fn generate(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        bars.push(Bar::new(
            current.and_time(chrono::NaiveTime::MIN),
            open,
            high,
            low,
            close,
            volume,
        ));

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}
