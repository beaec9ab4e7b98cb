//! Batch composition.
//!
//! This module provides:
//! - Device context collection (device info and the cached location)
//! - The batch composer building the wire payload of one flush

mod composer;
mod context;

pub use composer::{compose_batch, format_timestamp};
pub use context::{
    refresh_location, ContextInfo, DeviceInfo, DeviceInfoProvider, LocationCache,
    StaticDeviceInfo,
};
