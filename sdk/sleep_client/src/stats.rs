//! Turning decrypted sums back into averages.

use serde::{Deserialize, Serialize};

use crate::fields::SleepMetrics;

/// Averages over a set of folded entries.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SleepStats {
    pub avg_duration_hours: f64,
    pub avg_deep_sleep: f64,
    pub avg_score: f64,
    pub count: u64,
}

/// Averages from encrypted-then-revealed running sums.
///
/// `sum_duration` is in tenths of an hour. A count of zero yields all zeros.
pub fn reconstruct(sum_duration: u64, sum_deep_sleep: u64, sum_score: u64, count: u64) -> SleepStats {
    if count == 0 {
        return SleepStats::default();
    }
    let n = count as f64;
    SleepStats {
        avg_duration_hours: sum_duration as f64 / n / 10.0,
        avg_deep_sleep: sum_deep_sleep as f64 / n,
        avg_score: sum_score as f64 / n,
        count,
    }
}

/// An individually decrypted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedEntry {
    pub index: u64,
    pub date: u32,
    pub metrics: SleepMetrics,
}

pub fn stats_from_entries(entries: &[DecryptedEntry]) -> SleepStats {
    let (d, ds, s) = entries.iter().fold((0u64, 0u64, 0u64), |(d, ds, s), e| {
        (
            d.saturating_add(e.metrics.duration_tenths as u64),
            ds.saturating_add(e.metrics.deep_sleep_ratio as u64),
            s.saturating_add(e.metrics.sleep_score as u64),
        )
    });
    reconstruct(d, ds, s, entries.len() as u64)
}

/// The `k` most recent entries by date, oldest first.
pub fn recent_trend(entries: &[DecryptedEntry], k: usize) -> Vec<DecryptedEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|e| e.date);
    let skip = sorted.len().saturating_sub(k);
    sorted.split_off(skip)
}
