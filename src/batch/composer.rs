//! Batch composer.
//!
//! One flush produces one JSON array, always in the order
//! `[context, sessionStart, ...custom events, sessionEnd]`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::context::ContextInfo;
use crate::error_handling::AnalyticsError;
use crate::model::{Event, EventType, Properties, Session};

const CONTEXT_EVENT: &str = "context";
const SESSION_START_EVENT: &str = "sessionStart";
const SESSION_END_EVENT: &str = "sessionEnd";

#[derive(Serialize)]
struct WireEvent<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(rename = "sessionID")]
    session_id: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    component: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<&'a Properties>,
}

/// Formats an event time the way the collector expects (UTC, millisecond precision).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds the wire payload for one flush.
///
/// An event that fails validation or serialization is logged and left out;
/// the rest of the batch still goes out. Callers can detect omissions by
/// comparing the result length with `events.len() + 3`.
///
/// # Arguments
///
/// * `session` - The session being flushed (an unset end time reads as now)
/// * `context` - Device/location snapshot for the context event
/// * `events` - Queued custom events, in insertion order
/// * `component` - Application/feature identifier stamped on non-context events
pub fn compose_batch(
    session: &Session,
    context: &ContextInfo,
    events: &[Event],
    component: &str,
) -> Vec<Value> {
    let session_id = session.session_id();
    let mut batch = Vec::with_capacity(events.len() + 3);

    let context_props = context_properties(context);
    push_system_event(
        &mut batch,
        WireEvent {
            name: CONTEXT_EVENT,
            event_type: EventType::System,
            session_id,
            timestamp: format_timestamp(Utc::now()),
            component: None,
            properties: Some(&context_props),
        },
    );

    push_system_event(
        &mut batch,
        WireEvent {
            name: SESSION_START_EVENT,
            event_type: EventType::System,
            session_id,
            timestamp: format_timestamp(session.start_time()),
            component: Some(component),
            properties: None,
        },
    );

    for event in events {
        match custom_event_value(event, session_id, component) {
            Ok(value) => batch.push(value),
            Err(e) => log::error!(
                "Batch composer: dropping event {} from session {}: {}",
                event.name(),
                session_id,
                e
            ),
        }
    }

    let end_time = session.end_time().unwrap_or_else(|| {
        log::debug!("Session {session_id} composed before it was ended, using current time");
        Utc::now()
    });
    push_system_event(
        &mut batch,
        WireEvent {
            name: SESSION_END_EVENT,
            event_type: EventType::System,
            session_id,
            timestamp: format_timestamp(end_time),
            component: Some(component),
            properties: None,
        },
    );

    batch
}

fn context_properties(context: &ContextInfo) -> Properties {
    let device = &context.device;
    Properties::new()
        .insert("model", device.model.as_str())
        .insert("manufacturer", device.manufacturer.as_str())
        .insert("timezone", device.timezone_offset_secs.to_string())
        .insert("osName", device.os_name.as_str())
        .insert("osVersion", device.os_version.as_str())
        .insert("longitude", context.longitude.to_string())
        .insert("latitude", context.latitude.to_string())
}

fn push_system_event(batch: &mut Vec<Value>, wire: WireEvent<'_>) {
    match serde_json::to_value(&wire) {
        Ok(value) => batch.push(value),
        // Only string fields, so this cannot fail in practice
        Err(e) => log::error!("Batch composer: failed to serialize {} event: {}", wire.name, e),
    }
}

fn custom_event_value(
    event: &Event,
    session_id: &str,
    component: &str,
) -> Result<Value, AnalyticsError> {
    event.validate()?;
    let properties = event.properties();
    let wire = WireEvent {
        name: event.name(),
        event_type: EventType::Custom,
        session_id: event.session_id().unwrap_or(session_id),
        timestamp: format_timestamp(event.timestamp().unwrap_or_else(Utc::now)),
        component: Some(component),
        properties: (!properties.is_empty()).then_some(properties),
    };
    serde_json::to_value(&wire).map_err(|e| AnalyticsError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DeviceInfo;
    use crate::config::MAX_PROPERTY_VALUE_LENGTH;

    fn context() -> ContextInfo {
        ContextInfo::new(
            DeviceInfo {
                model: "iPhone15,2".to_string(),
                manufacturer: "Apple".to_string(),
                os_name: "iOS".to_string(),
                os_version: "17.4".to_string(),
                timezone_offset_secs: -25200,
            },
            -122.27,
            37.53,
        )
    }

    fn ended_session() -> Session {
        let mut session = Session::new();
        session.end();
        session
    }

    fn event(name: &str) -> Event {
        Event::new(name, None, None).unwrap()
    }

    fn names(batch: &[Value]) -> Vec<&str> {
        batch.iter().map(|v| v["name"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_batch_has_n_plus_three_in_fixed_order() {
        let session = ended_session();
        for n in [1usize, 2, 5, 20] {
            let events: Vec<Event> = (0..n).map(|i| event(&format!("e{i}"))).collect();
            let batch = compose_batch(&session, &context(), &events, "shop");
            assert_eq!(batch.len(), n + 3);

            let mut expected = vec!["context".to_string(), "sessionStart".to_string()];
            expected.extend((0..n).map(|i| format!("e{i}")));
            expected.push("sessionEnd".to_string());
            assert_eq!(names(&batch), expected);
        }
    }

    #[test]
    fn test_context_event_shape() {
        let session = ended_session();
        let batch = compose_batch(&session, &context(), &[event("a")], "shop");
        let ctx = &batch[0];
        assert_eq!(ctx["type"], "system");
        assert_eq!(ctx["sessionID"], session.session_id());
        assert!(ctx.get("component").is_none());
        let props = &ctx["properties"];
        assert_eq!(props["model"], "iPhone15,2");
        assert_eq!(props["manufacturer"], "Apple");
        assert_eq!(props["timezone"], "-25200");
        assert_eq!(props["osName"], "iOS");
        assert_eq!(props["osVersion"], "17.4");
        assert_eq!(props["longitude"], "-122.27");
        assert_eq!(props["latitude"], "37.53");
    }

    #[test]
    fn test_unknown_location_reports_zero() {
        let ctx = ContextInfo::new(DeviceInfo::default(), 0.0, 0.0);
        let batch = compose_batch(&ended_session(), &ctx, &[event("a")], "shop");
        assert_eq!(batch[0]["properties"]["longitude"], "0");
        assert_eq!(batch[0]["properties"]["latitude"], "0");
    }

    #[test]
    fn test_session_events_use_session_times() {
        let session = ended_session();
        let batch = compose_batch(&session, &context(), &[event("a")], "shop");
        let start = &batch[1];
        let end = &batch[3];
        assert_eq!(start["type"], "system");
        assert_eq!(start["component"], "shop");
        assert_eq!(start["timestamp"], format_timestamp(session.start_time()));
        assert_eq!(end["component"], "shop");
        assert_eq!(
            end["timestamp"],
            format_timestamp(session.end_time().unwrap())
        );
    }

    #[test]
    fn test_custom_event_shape() {
        let session = ended_session();
        let ts = Utc::now() - chrono::Duration::minutes(1);
        let with_props = Event::new(
            "purchase",
            Some("other-session"),
            Some(Properties::new().insert("sku", "A-1").insert("qty", "2")),
        )
        .unwrap()
        .with_timestamp(ts);
        let bare = event("open");

        let batch = compose_batch(&session, &context(), &[with_props, bare], "shop");
        let custom = &batch[2];
        assert_eq!(custom["type"], "custom");
        assert_eq!(custom["sessionID"], "other-session");
        assert_eq!(custom["timestamp"], format_timestamp(ts));
        assert_eq!(custom["component"], "shop");
        assert_eq!(custom["properties"]["sku"], "A-1");
        assert_eq!(custom["properties"]["qty"], "2");

        let bare = &batch[3];
        assert_eq!(bare["sessionID"], session.session_id());
        assert!(bare.get("properties").is_none());
    }

    #[test]
    fn test_malformed_event_is_omitted() {
        let session = ended_session();
        let mut bad = event("e2");
        bad.set_property("note", "x".repeat(MAX_PROPERTY_VALUE_LENGTH + 1));
        let events = vec![event("e1"), bad, event("e3")];

        let batch = compose_batch(&session, &context(), &events, "shop");
        assert_eq!(batch.len(), 5);
        assert_eq!(
            names(&batch),
            vec!["context", "sessionStart", "e1", "e3", "sessionEnd"]
        );
    }

    #[test]
    fn test_field_order_on_the_wire() {
        let session = ended_session();
        let batch = compose_batch(&session, &context(), &[event("a")], "shop");
        let text = serde_json::to_string(&batch[2]).unwrap();
        let name_at = text.find("\"name\"").unwrap();
        let type_at = text.find("\"type\"").unwrap();
        let session_at = text.find("\"sessionID\"").unwrap();
        assert!(name_at < type_at && type_at < session_at);
    }
}
