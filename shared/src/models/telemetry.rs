//! Compartment telemetry

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Hot compartment band (°C)
pub const HOT_RANGE_C: RangeInclusive<f64> = 60.0..=65.0;
/// Cold compartment band (°C)
pub const COLD_RANGE_C: RangeInclusive<f64> = 3.0..=5.0;

/// One hot/cold reading
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySample {
    pub hot_c: f64,
    pub cold_c: f64,
    /// Unix millis
    pub sampled_at: i64,
}

impl TelemetrySample {
    pub fn in_band(&self) -> bool {
        HOT_RANGE_C.contains(&self.hot_c) && COLD_RANGE_C.contains(&self.cold_c)
    }
}
