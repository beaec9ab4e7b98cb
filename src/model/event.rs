//! Analytic event and its string properties.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{MAX_EVENT_NAME_LENGTH, MAX_PROPERTY_KEY_LENGTH, MAX_PROPERTY_VALUE_LENGTH};
use crate::error_handling::AnalyticsError;

/// Whether an event was logged by the application or generated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Custom,
    System,
}

/// String-only event properties, kept in insertion order.
///
/// # Example
///
/// ```
/// use mcs_analytics::Properties;
///
/// let props = Properties::new()
///     .insert("screen", "checkout")
///     .insert("items", "3");
/// assert_eq!(props.get("items"), Some("3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Properties {
    inner: Map<String, Value>,
}

impl Properties {
    pub fn new() -> Self {
        Self { inner: Map::new() }
    }

    /// Builder-style insert. Re-inserting a key replaces its value in place.
    pub fn insert<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set(key, value);
        self
    }

    /// Sets a property. Re-inserting a key replaces its value in place.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.insert(key.into(), Value::String(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        // Only `set` writes values, so every value is a string
        self.inner
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str().unwrap_or_default()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

/// A single analytic event.
///
/// Length limits on the name, property keys and property values are checked
/// by `validate`, which the batch composer runs before serializing the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    timestamp: Option<DateTime<Utc>>,
    session_id: Option<String>,
    event_type: EventType,
    properties: Properties,
}

impl Event {
    /// Creates a custom event.
    ///
    /// The timestamp is left unset; the proxy fills it (and a missing session
    /// id) when the event is queued.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::InvalidArgument` if `name` is empty or blank.
    pub fn new(
        name: &str,
        session_id: Option<&str>,
        properties: Option<Properties>,
    ) -> Result<Self, AnalyticsError> {
        if name.trim().is_empty() {
            return Err(AnalyticsError::InvalidArgument(
                "event name is required".to_string(),
            ));
        }
        Ok(Event {
            name: name.to_string(),
            timestamp: None,
            session_id: session_id.map(str::to_string),
            event_type: EventType::Custom,
            properties: properties.unwrap_or_default(),
        })
    }

    /// Overrides the event time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Adds or replaces a property before the event is queued.
    pub fn set_property<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.properties.set(key, value);
    }

    /// Fills in the timestamp and session id if the caller left them unset.
    pub(crate) fn fill_missing(&mut self, session_id: &str, now: DateTime<Utc>) {
        if self.timestamp.is_none() {
            self.timestamp = Some(now);
        }
        if self.session_id.is_none() {
            self.session_id = Some(session_id.to_string());
        }
    }

    /// Checks the name and property length limits.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Serialization` naming the first offending field.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.name.chars().count() > MAX_EVENT_NAME_LENGTH {
            return Err(AnalyticsError::Serialization(format!(
                "event name exceeds {MAX_EVENT_NAME_LENGTH} characters"
            )));
        }
        for (key, value) in self.properties.iter() {
            if key.is_empty() {
                return Err(AnalyticsError::Serialization(format!(
                    "event {} has an empty property key",
                    self.name
                )));
            }
            if key.chars().count() > MAX_PROPERTY_KEY_LENGTH {
                return Err(AnalyticsError::Serialization(format!(
                    "property key on event {} exceeds {MAX_PROPERTY_KEY_LENGTH} characters",
                    self.name
                )));
            }
            if value.chars().count() > MAX_PROPERTY_VALUE_LENGTH {
                return Err(AnalyticsError::Serialization(format!(
                    "property {key} on event {} exceeds {MAX_PROPERTY_VALUE_LENGTH} characters",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
