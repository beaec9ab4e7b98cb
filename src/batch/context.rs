//! Device context for the leading `context` event of every batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;

use crate::config::LOCATION_LOOKUP_TIMEOUT_SECS;

/// Static facts about the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub os_name: String,
    pub os_version: String,
    /// Offset of the device's local time zone from UTC, in seconds
    pub timezone_offset_secs: i32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        DeviceInfo {
            model: "unknown".to_string(),
            manufacturer: "unknown".to_string(),
            os_name: std::env::consts::OS.to_string(),
            os_version: "unknown".to_string(),
            timezone_offset_secs: Local::now().offset().local_minus_utc(),
        }
    }
}

/// Supplies device details and, when available, the device location.
#[async_trait]
pub trait DeviceInfoProvider: Send + Sync {
    fn device_info(&self) -> DeviceInfo;

    /// Current `(longitude, latitude)`, or `None` if location is unavailable.
    async fn current_location(&self) -> Option<(f64, f64)> {
        None
    }
}

/// Device info fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceInfo {
    info: DeviceInfo,
    location: Option<(f64, f64)>,
}

impl StaticDeviceInfo {
    pub fn new(info: DeviceInfo) -> Self {
        StaticDeviceInfo {
            info,
            location: None,
        }
    }

    pub fn with_location(mut self, longitude: f64, latitude: f64) -> Self {
        self.location = Some((longitude, latitude));
        self
    }
}

#[async_trait]
impl DeviceInfoProvider for StaticDeviceInfo {
    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    async fn current_location(&self) -> Option<(f64, f64)> {
        self.location
    }
}

/// Last known device location.
///
/// Written by the background lookup task and read by the composer without a
/// lock. Each coordinate is a separate atomic, so a reader racing a writer may
/// briefly see a mixed pair; location is advisory metadata and that is accepted.
#[derive(Debug, Default)]
pub struct LocationCache {
    longitude: AtomicU64,
    latitude: AtomicU64,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, longitude: f64, latitude: f64) {
        self.longitude.store(longitude.to_bits(), Ordering::Relaxed);
        self.latitude.store(latitude.to_bits(), Ordering::Relaxed);
    }

    /// `(longitude, latitude)`, both 0 until a lookup succeeds.
    pub fn get(&self) -> (f64, f64) {
        (
            f64::from_bits(self.longitude.load(Ordering::Relaxed)),
            f64::from_bits(self.latitude.load(Ordering::Relaxed)),
        )
    }
}

/// Spawns a location lookup that updates `cache` when it completes in time.
///
/// A lookup that fails or exceeds `LOCATION_LOOKUP_TIMEOUT_SECS` leaves the
/// previous value in place.
pub fn refresh_location(
    provider: Arc<dyn DeviceInfoProvider>,
    cache: Arc<LocationCache>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let lookup = tokio::time::timeout(
            Duration::from_secs(LOCATION_LOOKUP_TIMEOUT_SECS),
            provider.current_location(),
        )
        .await;
        match lookup {
            Ok(Some((longitude, latitude))) => {
                cache.store(longitude, latitude);
                log::debug!("Device location updated ({longitude}, {latitude})");
            }
            Ok(None) => log::debug!("Device location unavailable"),
            Err(_) => log::warn!(
                "Device location lookup timed out after {}s",
                LOCATION_LOOKUP_TIMEOUT_SECS
            ),
        }
    })
}

/// Snapshot of everything the `context` event reports.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextInfo {
    pub device: DeviceInfo,
    pub longitude: f64,
    pub latitude: f64,
}

impl ContextInfo {
    pub fn new(device: DeviceInfo, longitude: f64, latitude: f64) -> Self {
        ContextInfo {
            device,
            longitude,
            latitude,
        }
    }

    /// Reads the provider and the cached location at compose time.
    pub fn snapshot(provider: &dyn DeviceInfoProvider, location: &LocationCache) -> Self {
        let (longitude, latitude) = location.get();
        ContextInfo::new(provider.device_info(), longitude, latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowLocation;

    #[async_trait]
    impl DeviceInfoProvider for SlowLocation {
        fn device_info(&self) -> DeviceInfo {
            DeviceInfo::default()
        }

        async fn current_location(&self) -> Option<(f64, f64)> {
            tokio::time::sleep(Duration::from_secs(LOCATION_LOOKUP_TIMEOUT_SECS * 2)).await;
            Some((1.0, 1.0))
        }
    }

    #[test]
    fn test_location_defaults_to_zero() {
        assert_eq!(LocationCache::new().get(), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_refresh_location_stores_result() {
        let cache = Arc::new(LocationCache::new());
        let provider = Arc::new(StaticDeviceInfo::default().with_location(-122.27, 37.53));
        refresh_location(provider, Arc::clone(&cache)).await.unwrap();
        assert_eq!(cache.get(), (-122.27, 37.53));
    }

    #[tokio::test]
    async fn test_refresh_location_without_fix_keeps_previous() {
        let cache = Arc::new(LocationCache::new());
        cache.store(5.0, 6.0);
        refresh_location(Arc::new(StaticDeviceInfo::default()), Arc::clone(&cache))
            .await
            .unwrap();
        assert_eq!(cache.get(), (5.0, 6.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_location_times_out() {
        let cache = Arc::new(LocationCache::new());
        refresh_location(Arc::new(SlowLocation), Arc::clone(&cache))
            .await
            .unwrap();
        assert_eq!(cache.get(), (0.0, 0.0));
    }

    #[test]
    fn test_snapshot_reads_provider_and_cache() {
        let info = DeviceInfo {
            model: "Pixel 8".to_string(),
            ..DeviceInfo::default()
        };
        let cache = LocationCache::new();
        cache.store(2.5, 3.5);
        let ctx = ContextInfo::snapshot(&StaticDeviceInfo::new(info.clone()), &cache);
        assert_eq!(ctx.device, info);
        assert_eq!((ctx.longitude, ctx.latitude), (2.5, 3.5));
    }
}
