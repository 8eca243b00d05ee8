//! Plaintext sleep metrics and their declared ranges.

use common::FheType;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MINUTES_PER_DAY: u32 = 1440;
pub const SECONDS_PER_DAY: u64 = 86_400;

/// One submitted field: name, inclusive range and encrypted width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub min: u64,
    pub max: u64,
    pub fhe_type: FheType,
}

/// Fields in submission order.
pub const FIELDS: [FieldSpec; 6] = [
    FieldSpec {
        name: "bedtime",
        min: 0,
        max: 1439,
        fhe_type: FheType::Uint16,
    },
    FieldSpec {
        name: "wake_time",
        min: 0,
        max: 1439,
        fhe_type: FheType::Uint16,
    },
    FieldSpec {
        name: "duration_tenths",
        min: 0,
        max: 240,
        fhe_type: FheType::Uint16,
    },
    FieldSpec {
        name: "deep_sleep_ratio",
        min: 0,
        max: 100,
        fhe_type: FheType::Uint8,
    },
    FieldSpec {
        name: "wake_count",
        min: 0,
        max: 50,
        fhe_type: FheType::Uint8,
    },
    FieldSpec {
        name: "sleep_score",
        min: 1,
        max: 10,
        fhe_type: FheType::Uint8,
    },
];

/// One night of metrics.
///
/// `bedtime` and `wake_time` are minutes after midnight; `duration_tenths` is
/// hours slept × 10; `deep_sleep_ratio` is a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepMetrics {
    pub bedtime: u32,
    pub wake_time: u32,
    pub duration_tenths: u32,
    pub deep_sleep_ratio: u32,
    pub wake_count: u32,
    pub sleep_score: u32,
}

impl SleepMetrics {
    /// Fills `duration_tenths` from the bedtime and wake time.
    pub fn from_times(
        bedtime: u32,
        wake_time: u32,
        deep_sleep_ratio: u32,
        wake_count: u32,
        sleep_score: u32,
    ) -> Self {
        Self {
            bedtime,
            wake_time,
            duration_tenths: duration_tenths_between(bedtime, wake_time),
            deep_sleep_ratio,
            wake_count,
            sleep_score,
        }
    }

    pub fn values(&self) -> [u64; 6] {
        [
            self.bedtime as u64,
            self.wake_time as u64,
            self.duration_tenths as u64,
            self.deep_sleep_ratio as u64,
            self.wake_count as u64,
            self.sleep_score as u64,
        ]
    }

    pub fn from_values(values: [u64; 6]) -> Result<Self, ValidationError> {
        let narrow = |i: usize| -> Result<u32, ValidationError> {
            u32::try_from(values[i]).map_err(|_| ValidationError::FieldOutOfRange {
                field: FIELDS[i].name,
                value: values[i],
                min: FIELDS[i].min,
                max: FIELDS[i].max,
            })
        };
        let metrics = Self {
            bedtime: narrow(0)?,
            wake_time: narrow(1)?,
            duration_tenths: narrow(2)?,
            deep_sleep_ratio: narrow(3)?,
            wake_count: narrow(4)?,
            sleep_score: narrow(5)?,
        };
        metrics.validate()?;
        Ok(metrics)
    }

    /// Checks every field against its declared range. Values are never
    /// clamped.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (spec, value) in FIELDS.iter().zip(self.values()) {
            if value < spec.min || value > spec.max {
                return Err(ValidationError::FieldOutOfRange {
                    field: spec.name,
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        Ok(())
    }
}

/// Hours slept × 10 between two minute-of-day times. A wake time at or
/// before the bedtime means the next morning.
pub fn duration_tenths_between(bedtime: u32, wake_time: u32) -> u32 {
    let bed = bedtime % MINUTES_PER_DAY;
    let wake = wake_time % MINUTES_PER_DAY;
    let minutes = if wake > bed {
        wake - bed
    } else {
        wake + MINUTES_PER_DAY - bed
    };
    // round to the nearest tenth of an hour
    (minutes * 10 + 30) / 60
}

/// Calendar-day key: whole days since the Unix epoch.
pub fn day_key(unix_seconds: u64) -> u32 {
    (unix_seconds / SECONDS_PER_DAY) as u32
}
