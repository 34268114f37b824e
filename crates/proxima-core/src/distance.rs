//! Distance estimation from signal strength.
//!
//! Uses the log-distance path-loss model with a path-loss exponent of 2:
//!
//! ```text
//! distance = 10 ^ ((reference_power - rssi) / 20)
//! ```
//!
//! where `reference_power` is the RSSI expected at one distance unit.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::DistanceConfig;

/// Distance value meaning "signal unavailable, distance unknown".
pub const UNKNOWN_DISTANCE: f64 = -1.0;

/// RSSI values a BLE radio can physically report, in dBm.
pub const RSSI_RANGE: RangeInclusive<i32> = -127..=20;

/// Upper bound of the "medium" histogram bucket.
pub const MEDIUM_RANGE_LIMIT: f64 = 5.0;

/// Coarse proximity classification used by the stats histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBucket {
    /// At or below the near threshold.
    Close,
    /// Above the near threshold, at most [`MEDIUM_RANGE_LIMIT`].
    Medium,
    /// Beyond [`MEDIUM_RANGE_LIMIT`].
    Far,
    /// The [`UNKNOWN_DISTANCE`] sentinel.
    Unknown,
}

/// Calibrated distance model.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceModel {
    reference_power: i32,
    near_threshold: f64,
    default_distance: f64,
}

impl Default for DistanceModel {
    fn default() -> Self {
        Self::from(&DistanceConfig::default())
    }
}

impl From<&DistanceConfig> for DistanceModel {
    fn from(config: &DistanceConfig) -> Self {
        Self {
            reference_power: config.reference_power,
            near_threshold: config.near_threshold,
            default_distance: config.default_distance,
        }
    }
}

impl DistanceModel {
    /// Estimate distance from an RSSI reading.
    ///
    /// An RSSI of exactly `0` means the radio reported no usable value and
    /// yields [`UNKNOWN_DISTANCE`], as does any input whose estimate is not
    /// a finite number.
    #[must_use]
    pub fn estimate(&self, rssi: i32) -> f64 {
        if rssi == 0 {
            return UNKNOWN_DISTANCE;
        }
        let distance = 10f64.powf((f64::from(self.reference_power) - f64::from(rssi)) / 20.0);
        if distance.is_finite() {
            distance
        } else {
            UNKNOWN_DISTANCE
        }
    }

    /// Pick the distance for a reading.
    ///
    /// An explicit distance wins, then an RSSI estimate, then the configured
    /// default.
    #[must_use]
    pub fn resolve(&self, distance: Option<f64>, rssi: Option<i32>) -> f64 {
        match (distance, rssi) {
            (Some(distance), _) => distance,
            (None, Some(rssi)) => self.estimate(rssi),
            (None, None) => self.default_distance,
        }
    }

    /// Returns `true` when a known distance is within the near threshold.
    #[must_use]
    pub fn is_near(&self, distance: f64) -> bool {
        distance >= 0.0 && distance <= self.near_threshold
    }

    /// Classify a distance for the stats histogram.
    #[must_use]
    pub fn bucket(&self, distance: f64) -> DistanceBucket {
        if distance < 0.0 {
            DistanceBucket::Unknown
        } else if distance <= self.near_threshold {
            DistanceBucket::Close
        } else if distance <= MEDIUM_RANGE_LIMIT {
            DistanceBucket::Medium
        } else {
            DistanceBucket::Far
        }
    }

    /// The near threshold.
    #[must_use]
    pub const fn near_threshold(&self) -> f64 {
        self.near_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_reference_power_is_one_unit() {
        let model = DistanceModel::default();
        assert!(approx(model.estimate(-59), 1.0));
    }

    #[test]
    fn test_twenty_db_is_ten_units() {
        let model = DistanceModel::default();
        assert!(approx(model.estimate(-79), 10.0));
        assert!(approx(model.estimate(-39), 0.1));
    }

    #[test]
    fn test_zero_rssi_is_unknown() {
        let model = DistanceModel::default();
        assert!(approx(model.estimate(0), UNKNOWN_DISTANCE));
        assert!(approx(model.resolve(None, Some(0)), UNKNOWN_DISTANCE));
    }

    #[test]
    fn test_estimate_is_finite_across_rssi_range() {
        let model = DistanceModel::default();
        for rssi in RSSI_RANGE {
            let distance = model.estimate(rssi);
            assert!(distance.is_finite(), "rssi {rssi} gave {distance}");
            assert!(distance >= 0.0 || approx(distance, UNKNOWN_DISTANCE));
        }
    }

    #[test]
    fn test_overflowing_estimate_is_unknown() {
        let model = DistanceModel::default();
        assert!(approx(model.estimate(-10_000), UNKNOWN_DISTANCE));
        assert!(approx(model.estimate(i32::MIN), UNKNOWN_DISTANCE));
        assert_eq!(model.bucket(model.estimate(-10_000)), DistanceBucket::Unknown);
    }

    #[test]
    fn test_resolve_precedence() {
        let model = DistanceModel::default();
        assert!(approx(model.resolve(Some(3.3), Some(-59)), 3.3));
        assert!(approx(model.resolve(None, Some(-59)), 1.0));
        assert!(approx(model.resolve(None, None), 5.0));
    }

    #[test]
    fn test_default_distance_is_configurable() {
        let model = DistanceModel::from(&DistanceConfig {
            default_distance: 12.0,
            ..DistanceConfig::default()
        });
        assert!(approx(model.resolve(None, None), 12.0));
    }

    #[test]
    fn test_buckets() {
        let model = DistanceModel::default();
        assert_eq!(model.bucket(0.5), DistanceBucket::Close);
        assert_eq!(model.bucket(2.0), DistanceBucket::Close);
        assert_eq!(model.bucket(2.01), DistanceBucket::Medium);
        assert_eq!(model.bucket(5.0), DistanceBucket::Medium);
        assert_eq!(model.bucket(5.1), DistanceBucket::Far);
        assert_eq!(model.bucket(UNKNOWN_DISTANCE), DistanceBucket::Unknown);
    }

    #[test]
    fn test_unknown_is_never_near() {
        let model = DistanceModel::default();
        assert!(!model.is_near(UNKNOWN_DISTANCE));
        assert!(model.is_near(2.0));
        assert!(!model.is_near(2.5));
    }
}
