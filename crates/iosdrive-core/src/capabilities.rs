//! Desired session capabilities.
//!
//! [`Capabilities`] is an unordered string-keyed map of JSON values sent to
//! the server when a session is created. The iOS driver forces the
//! `platformName` entry to [`IOS_PLATFORM`] before the map is handed to
//! session creation; see [`Capabilities::with_platform`].
//!
//! # Example
//!
//! ```
//! use iosdrive_core::capabilities::{Capabilities, IOS_PLATFORM, PLATFORM_NAME};
//!
//! let caps = Capabilities::new()
//!     .with("deviceName", "iPhone 15")
//!     .with(PLATFORM_NAME, "Android")
//!     .with_platform(IOS_PLATFORM);
//!
//! assert_eq!(caps.platform_name(), Some(IOS_PLATFORM));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Capability key holding the target platform.
pub const PLATFORM_NAME: &str = "platformName";

/// Platform identifier for iOS devices and simulators.
pub const IOS_PLATFORM: &str = "iOS";

/// Capability key holding the automation backend name.
pub const AUTOMATION_NAME: &str = "automationName";

/// Capability key holding the device name.
pub const DEVICE_NAME: &str = "deviceName";

/// Capability key holding the path or URL of the app under test.
pub const APP: &str = "app";

/// Capability key holding the bundle id of an installed app.
pub const BUNDLE_ID: &str = "bundleId";

/// Capability key holding the device UDID.
pub const UDID: &str = "udid";

/// An unordered mapping of capability names to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
    /// Creates an empty capability set.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or replaces a capability.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value of a capability, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Removes a capability, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the `platformName` capability when it is a string.
    pub fn platform_name(&self) -> Option<&str> {
        self.0.get(PLATFORM_NAME).and_then(Value::as_str)
    }

    /// Overrides `platformName` with the given platform.
    ///
    /// Any caller-supplied value is replaced silently. All other entries are
    /// left untouched.
    pub fn with_platform(mut self, platform: &str) -> Self {
        self.set(PLATFORM_NAME, platform);
        self
    }

    /// Copies every entry of `other` into `self`, replacing existing keys.
    pub fn merge(mut self, other: &Capabilities) -> Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    /// Iterates over the entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the capabilities, returning them as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Capabilities {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
