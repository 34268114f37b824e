//! Last-known state of every device the scanners currently report.
//!
//! The registry holds one entry per address. Entries are created by the
//! first reading that mentions an address, refreshed by later readings and
//! dropped by staleness eviction. The priority flag is never stored here;
//! every read joins against the [`PriorityIndex`].

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::address::DeviceAddress;
use crate::distance::{DistanceModel, RSSI_RANGE, UNKNOWN_DISTANCE};
use crate::error::{ProximaError, Result};
use crate::priority::PriorityIndex;

// ============================================================================
// Readings
// ============================================================================

/// One observation as submitted by a scanner, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "address": "AA:BB:CC:DD:EE:01",
    "name": "Galaxy Buds",
    "rssi": -59
}))]
pub struct RawReading {
    /// Hardware address (`XX:XX:XX:XX:XX:XX`, any case).
    #[schema(example = "AA:BB:CC:DD:EE:01")]
    pub address: String,

    /// Advertised device name.
    #[serde(default)]
    pub name: Option<String>,

    /// Received signal strength in dBm. `0` means unavailable.
    #[serde(default)]
    #[schema(example = -59)]
    pub rssi: Option<i32>,

    /// Distance already computed by the scanner.
    #[serde(default)]
    pub distance: Option<f64>,
}

/// A validated observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Normalized address.
    pub address: DeviceAddress,
    /// Advertised name, if any.
    pub name: Option<String>,
    /// Signal strength, if reported.
    pub rssi: Option<i32>,
    /// Explicit distance, if reported.
    pub distance: Option<f64>,
}

impl Reading {
    /// A reading carrying only an RSSI value.
    #[must_use]
    pub const fn with_rssi(address: DeviceAddress, rssi: i32) -> Self {
        Self {
            address,
            name: None,
            rssi: Some(rssi),
            distance: None,
        }
    }
}

/// Validate a whole batch. Any malformed reading rejects the batch.
///
/// # Errors
///
/// Returns [`ProximaError::InvalidReading`] naming the first bad entry.
pub fn validate_batch(batch: Vec<RawReading>) -> Result<Vec<Reading>> {
    batch
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let address =
                DeviceAddress::parse(&raw.address).map_err(|_| ProximaError::InvalidReading {
                    index,
                    reason: format!("malformed address '{}'", raw.address),
                })?;

            if let Some(rssi) = raw.rssi {
                if !RSSI_RANGE.contains(&rssi) {
                    return Err(ProximaError::InvalidReading {
                        index,
                        reason: format!(
                            "rssi {rssi} is outside {}..={} dBm",
                            RSSI_RANGE.start(),
                            RSSI_RANGE.end()
                        ),
                    });
                }
            }

            if let Some(distance) = raw.distance {
                #[allow(clippy::float_cmp)]
                let is_sentinel = distance == UNKNOWN_DISTANCE;
                if !distance.is_finite() || (distance < 0.0 && !is_sentinel) {
                    return Err(ProximaError::InvalidReading {
                        index,
                        reason: format!("distance {distance} is not a non-negative number"),
                    });
                }
            }

            let name = raw
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty());

            Ok(Reading {
                address,
                name,
                rssi: raw.rssi,
                distance: raw.distance,
            })
        })
        .collect()
}

// ============================================================================
// Records
// ============================================================================

/// A device as exposed to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "address": "AA:BB:CC:DD:EE:01",
    "name": "Galaxy Buds",
    "rssi": -59,
    "distance": 1.0,
    "is_priority": false,
    "was_in_range": true,
    "last_update": "2025-01-15T03:30:00Z",
    "source": "scanner"
}))]
pub struct DeviceRecord {
    /// Normalized hardware address.
    pub address: DeviceAddress,

    /// Last known display name.
    pub name: Option<String>,

    /// Signal strength from the latest reading.
    pub rssi: Option<i32>,

    /// Estimated distance, or `-1.0` when unknown.
    pub distance: f64,

    /// Whether the address is in the priority index right now.
    pub is_priority: bool,

    /// Whether the device was in range when first seen.
    pub was_in_range: bool,

    /// When the latest reading was applied.
    pub last_update: DateTime<Utc>,

    /// Identifier of the producer that sent the latest reading.
    pub source: String,
}

impl DeviceRecord {
    /// Display name, falling back to the address.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

#[derive(Debug, Clone)]
struct DeviceEntry {
    name: Option<String>,
    rssi: Option<i32>,
    distance: f64,
    was_in_range: bool,
    last_update: DateTime<Utc>,
    source: String,
}

impl DeviceEntry {
    fn to_record(&self, address: &DeviceAddress, priority: &PriorityIndex) -> DeviceRecord {
        DeviceRecord {
            address: address.clone(),
            name: self.name.clone(),
            rssi: self.rssi,
            distance: self.distance,
            is_priority: priority.contains(address),
            was_in_range: self.was_in_range,
            last_update: self.last_update,
            source: self.source.clone(),
        }
    }
}

/// Outcome of applying a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Readings applied.
    pub received: usize,
    /// Readings that created a new record.
    pub created: usize,
}

// ============================================================================
// Registry
// ============================================================================

/// Keyed store of last-known device state.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceAddress, DeviceEntry>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of validated readings.
    ///
    /// `was_in_range` is set from the first reading only and carried over on
    /// every later one. A reading without a name keeps the known name.
    pub fn upsert(
        &mut self,
        readings: &[Reading],
        source: &str,
        now: DateTime<Utc>,
        model: &DistanceModel,
    ) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        for reading in readings {
            let distance = model.resolve(reading.distance, reading.rssi);
            summary.received += 1;

            match self.devices.get_mut(&reading.address) {
                Some(entry) => {
                    if reading.name.is_some() {
                        entry.name.clone_from(&reading.name);
                    }
                    entry.rssi = reading.rssi;
                    entry.distance = distance;
                    entry.last_update = now;
                    source.clone_into(&mut entry.source);
                }
                None => {
                    summary.created += 1;
                    self.devices.insert(
                        reading.address.clone(),
                        DeviceEntry {
                            name: reading.name.clone(),
                            rssi: reading.rssi,
                            distance,
                            was_in_range: model.is_near(distance),
                            last_update: now,
                            source: source.to_string(),
                        },
                    );
                }
            }
        }

        summary
    }

    /// Addresses whose last update is more than `threshold` before `now`.
    #[must_use]
    pub fn stale_addresses(&self, now: DateTime<Utc>, threshold: TimeDelta) -> Vec<DeviceAddress> {
        self.devices
            .iter()
            .filter(|(_, entry)| now - entry.last_update > threshold)
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Remove stale records.
    ///
    /// The set of stale keys is collected before anything is removed.
    /// `before_remove` sees each record (with its live priority flag) while
    /// it is still present. Returns the removed records.
    pub fn evict_stale<F>(
        &mut self,
        now: DateTime<Utc>,
        threshold: TimeDelta,
        priority: &PriorityIndex,
        mut before_remove: F,
    ) -> Vec<DeviceRecord>
    where
        F: FnMut(&DeviceRecord),
    {
        let stale = self.stale_addresses(now, threshold);
        let mut evicted = Vec::with_capacity(stale.len());

        for address in stale {
            let Some(record) = self.get(&address, priority) else {
                continue;
            };
            before_remove(&record);
            self.devices.remove(&address);
            evicted.push(record);
        }

        evicted
    }

    /// Current record for `address`.
    #[must_use]
    pub fn get(&self, address: &DeviceAddress, priority: &PriorityIndex) -> Option<DeviceRecord> {
        self.devices
            .get(address)
            .map(|entry| entry.to_record(address, priority))
    }

    /// Every record, ordered by address.
    #[must_use]
    pub fn snapshot(&self, priority: &PriorityIndex) -> Vec<DeviceRecord> {
        self.devices
            .iter()
            .map(|(address, entry)| entry.to_record(address, priority))
            .collect()
    }

    /// Number of tracked devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> DeviceAddress {
        DeviceAddress::parse(s).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn raw(address: &str) -> RawReading {
        RawReading {
            address: address.to_string(),
            name: None,
            rssi: None,
            distance: None,
        }
    }

    #[test]
    fn test_validate_batch_rejects_unphysical_rssi() {
        for rssi in [-10_000, -128, 21, i32::MAX] {
            let batch = vec![
                RawReading {
                    rssi: Some(-60),
                    ..raw("AA:BB:CC:DD:EE:01")
                },
                RawReading {
                    rssi: Some(rssi),
                    ..raw("AA:BB:CC:DD:EE:02")
                },
            ];
            let err = validate_batch(batch).unwrap_err();
            assert!(
                matches!(err, ProximaError::InvalidReading { index: 1, .. }),
                "rssi {rssi} was accepted"
            );
        }
    }

    #[test]
    fn test_rssi_derived_distance_stays_in_domain() {
        let mut registry = DeviceRegistry::new();
        let model = DistanceModel::default();
        let batch: Vec<RawReading> = [-127, -100, -59, -1, 0, 20]
            .into_iter()
            .enumerate()
            .map(|(n, rssi)| RawReading {
                rssi: Some(rssi),
                ..raw(&format!("AA:BB:CC:DD:EE:{n:02X}"))
            })
            .collect();

        let readings = validate_batch(batch).unwrap();
        registry.upsert(&readings, "s", t0(), &model);

        for record in registry.snapshot(&PriorityIndex::new()) {
            assert!(record.distance.is_finite());
            #[allow(clippy::float_cmp)]
            let unknown = record.distance == UNKNOWN_DISTANCE;
            assert!(record.distance >= 0.0 || unknown, "{record:?}");
            let json = serde_json::to_string(&record).unwrap();
            let back: DeviceRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(back.address, record.address);
        }
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let mut registry = DeviceRegistry::new();
        let model = DistanceModel::default();
        let a = addr("AA:BB:CC:DD:EE:01");

        let first = registry.upsert(&[Reading::with_rssi(a.clone(), -59)], "scanner", t0(), &model);
        assert_eq!(first, UpsertSummary { received: 1, created: 1 });

        let later = t0() + TimeDelta::seconds(10);
        let second = registry.upsert(&[Reading::with_rssi(a.clone(), -79)], "scanner-2", later, &model);
        assert_eq!(second, UpsertSummary { received: 1, created: 0 });

        let record = registry.get(&a, &PriorityIndex::new()).unwrap();
        assert_eq!(record.last_update, later);
        assert_eq!(record.source, "scanner-2");
        assert!((record.distance - 10.0).abs() < 1e-9);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_was_in_range_is_carried_over() {
        let mut registry = DeviceRegistry::new();
        let model = DistanceModel::default();
        let a = addr("AA:BB:CC:DD:EE:01");
        let priority = PriorityIndex::new();

        registry.upsert(&[Reading::with_rssi(a.clone(), -59)], "s", t0(), &model);
        assert!(registry.get(&a, &priority).unwrap().was_in_range);

        // Far reading does not flip the bit.
        registry.upsert(&[Reading::with_rssi(a.clone(), -90)], "s", t0(), &model);
        let record = registry.get(&a, &priority).unwrap();
        assert!(record.was_in_range);
        assert!(record.distance > 2.0);
    }

    #[test]
    fn test_same_reading_twice_only_moves_timestamp() {
        let mut registry = DeviceRegistry::new();
        let model = DistanceModel::default();
        let a = addr("AA:BB:CC:DD:EE:01");
        let priority = PriorityIndex::new();
        let reading = Reading::with_rssi(a.clone(), -70);

        registry.upsert(std::slice::from_ref(&reading), "s", t0(), &model);
        let before = registry.get(&a, &priority).unwrap();

        let later = t0() + TimeDelta::seconds(5);
        registry.upsert(std::slice::from_ref(&reading), "s", later, &model);
        let after = registry.get(&a, &priority).unwrap();

        assert_eq!(after.was_in_range, before.was_in_range);
        assert!(!after.was_in_range);
        assert_eq!(after.last_update, later);
    }

    #[test]
    fn test_missing_name_keeps_known_name() {
        let mut registry = DeviceRegistry::new();
        let model = DistanceModel::default();
        let a = addr("AA:BB:CC:DD:EE:01");
        let named = Reading {
            name: Some("Tile".to_string()),
            ..Reading::with_rssi(a.clone(), -60)
        };

        registry.upsert(&[named], "s", t0(), &model);
        registry.upsert(&[Reading::with_rssi(a.clone(), -61)], "s", t0(), &model);

        let record = registry.get(&a, &PriorityIndex::new()).unwrap();
        assert_eq!(record.name.as_deref(), Some("Tile"));
        assert_eq!(record.display_name(), "Tile");
    }

    #[test]
    fn test_priority_is_read_live() {
        let mut registry = DeviceRegistry::new();
        let mut priority = PriorityIndex::new();
        let a = addr("AA:BB:CC:DD:EE:01");

        registry.upsert(&[Reading::with_rssi(a.clone(), -59)], "s", t0(), &DistanceModel::default());
        assert!(!registry.get(&a, &priority).unwrap().is_priority);

        priority.set(&a, true);
        assert!(registry.get(&a, &priority).unwrap().is_priority);
        assert!(registry.snapshot(&priority)[0].is_priority);
    }

    #[test]
    fn test_evict_stale_respects_strict_threshold() {
        let mut registry = DeviceRegistry::new();
        let priority = PriorityIndex::new();
        let model = DistanceModel::default();
        registry.upsert(&[Reading::with_rssi(addr("AA:BB:CC:DD:EE:01"), -59)], "s", t0(), &model);

        let threshold = TimeDelta::minutes(2);
        let exactly = t0() + threshold;
        assert!(registry.evict_stale(exactly, threshold, &priority, |_| {}).is_empty());

        let past = exactly + TimeDelta::seconds(1);
        let evicted = registry.evict_stale(past, threshold, &priority, |_| {});
        assert_eq!(evicted.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_evict_callback_sees_record_before_removal() {
        let mut registry = DeviceRegistry::new();
        let mut priority = PriorityIndex::new();
        let model = DistanceModel::default();
        let a = addr("AA:BB:CC:DD:EE:01");
        let b = addr("AA:BB:CC:DD:EE:02");
        registry.upsert(&[Reading::with_rssi(a.clone(), -59)], "s", t0(), &model);
        registry.upsert(&[Reading::with_rssi(b.clone(), -59)], "s", t0() + TimeDelta::minutes(5), &model);
        priority.set(&a, true);

        let mut seen = Vec::new();
        let now = t0() + TimeDelta::minutes(6);
        let evicted = registry.evict_stale(now, TimeDelta::minutes(2), &priority, |record| {
            seen.push((record.address.clone(), record.is_priority));
        });

        assert_eq!(seen, vec![(a.clone(), true)]);
        assert_eq!(evicted.len(), 1);
        assert!(registry.get(&a, &priority).is_none());
        assert!(registry.get(&b, &priority).is_some());
    }

    #[test]
    fn test_validate_batch_accepts_well_formed() {
        let mut reading = raw("aa:bb:cc:dd:ee:01");
        reading.name = Some("  ".to_string());
        reading.distance = Some(-1.0);

        let readings = validate_batch(vec![reading, raw("AA:BB:CC:DD:EE:02")]).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].address.as_str(), "AA:BB:CC:DD:EE:01");
        assert_eq!(readings[0].name, None);
    }

    #[test]
    fn test_validate_batch_rejects_wholesale() {
        let err = validate_batch(vec![raw("AA:BB:CC:DD:EE:01"), raw("AA:BB:CC")]).unwrap_err();
        assert!(matches!(err, ProximaError::InvalidReading { index: 1, .. }));

        let mut negative = raw("AA:BB:CC:DD:EE:01");
        negative.distance = Some(-3.0);
        assert!(validate_batch(vec![negative]).is_err());

        let mut nan = raw("AA:BB:CC:DD:EE:01");
        nan.distance = Some(f64::NAN);
        assert!(validate_batch(vec![nan]).is_err());
    }
}
