use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// A single captured interaction, tagged by kind.
///
/// Wire shape: `{"type": "mouseMove"|"click"|"scroll", "timestamp": <ms>, "data": {...}}`.
/// Timestamps are milliseconds since the Unix epoch, produced by the capture
/// source. A payload whose `data` does not match its tag fails
/// deserialization; nothing downstream coerces shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InteractionEvent {
    MouseMove { timestamp: i64, data: MouseMoveData },
    Click { timestamp: i64, data: ClickData },
    Scroll { timestamp: i64, data: ScrollData },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MouseMoveData {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickData {
    pub x: f64,
    pub y: f64,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ScrollData {
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl InteractionEvent {
    pub fn timestamp(&self) -> i64 {
        match self {
            InteractionEvent::MouseMove { timestamp, .. } => *timestamp,
            InteractionEvent::Click { timestamp, .. } => *timestamp,
            InteractionEvent::Scroll { timestamp, .. } => *timestamp,
        }
    }

    /// The wire tag, also used as the stored event type column.
    pub fn kind(&self) -> &'static str {
        match self {
            InteractionEvent::MouseMove { .. } => "mouseMove",
            InteractionEvent::Click { .. } => "click",
            InteractionEvent::Scroll { .. } => "scroll",
        }
    }

    /// Serialize just the variant payload (the `data` object).
    pub fn data_json(&self) -> Result<String, serde_json::Error> {
        match self {
            InteractionEvent::MouseMove { data, .. } => serde_json::to_string(data),
            InteractionEvent::Click { data, .. } => serde_json::to_string(data),
            InteractionEvent::Scroll { data, .. } => serde_json::to_string(data),
        }
    }

    /// Rebuild an event from its stored columns, re-validating the payload
    /// shape against the tag.
    pub fn from_parts(kind: &str, timestamp: i64, data: &str) -> Result<Self, serde_json::Error> {
        let data: serde_json::Value = serde_json::from_str(data)?;
        serde_json::from_value(json!({
            "type": kind,
            "timestamp": timestamp,
            "data": data,
        }))
    }
}

/// A group of events shipped together from capture to ingestion.
///
/// Consumed exactly once by the reconciler; persistence explodes it into
/// individual stored events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    pub session_id: String,
    pub website_id: String,
    pub events: Vec<InteractionEvent>,
}

/// One recorded visit. The id is generated client-side at capture start so
/// repeated batches for the same session upsert instead of colliding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub website_id: String,
    pub started_at: DateTime<Utc>,
}

/// One persisted event row. `arrival_seq` records insertion order and breaks
/// timestamp ties so replay order is stable across loads.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub event_id: Uuid,
    pub arrival_seq: i64,
    pub event: InteractionEvent,
}

/// Successful ingestion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub status: String,
    pub session_id: String,
    pub events_processed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_move_round_trip() {
        let json = r#"{"type":"mouseMove","timestamp":1700000000123,"data":{"x":10.5,"y":20.0}}"#;
        let event: InteractionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), "mouseMove");
        assert_eq!(event.timestamp(), 1700000000123);

        let serialized = serde_json::to_value(&event).unwrap();
        assert_eq!(serialized["type"], "mouseMove");
        assert_eq!(serialized["data"]["x"], 10.5);
    }

    #[test]
    fn test_click_carries_target() {
        let json = r##"{"type":"click","timestamp":5,"data":{"x":1,"y":2,"target":"#signup"}}"##;
        let event: InteractionEvent = serde_json::from_str(json).unwrap();
        match event {
            InteractionEvent::Click { data, .. } => assert_eq!(data.target, "#signup"),
            other => panic!("expected click, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_shape_must_match_tag() {
        // A scroll payload under a mouseMove tag is rejected, not coerced.
        let json = r#"{"type":"mouseMove","timestamp":1,"data":{"scrollX":0,"scrollY":50}}"#;
        assert!(serde_json::from_str::<InteractionEvent>(json).is_err());

        // Extra fields from another variant are rejected too.
        let json = r##"{"type":"mouseMove","timestamp":1,"data":{"x":1,"y":2,"target":"#a"}}"##;
        assert!(serde_json::from_str::<InteractionEvent>(json).is_err());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let json = r#"{"type":"keypress","timestamp":1,"data":{"key":"a"}}"#;
        assert!(serde_json::from_str::<InteractionEvent>(json).is_err());
    }

    #[test]
    fn test_from_parts_round_trip() {
        let event = InteractionEvent::Scroll {
            timestamp: 42,
            data: ScrollData {
                scroll_x: 0.0,
                scroll_y: 150.0,
            },
        };

        let restored =
            InteractionEvent::from_parts(event.kind(), event.timestamp(), &event.data_json().unwrap())
                .unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn test_from_parts_rejects_mismatched_stored_payload() {
        assert!(InteractionEvent::from_parts("click", 1, r#"{"x":1,"y":2}"#).is_err());
    }

    #[test]
    fn test_batch_wire_names_are_camel_case() {
        let batch = EventBatch {
            session_id: "s1".to_string(),
            website_id: "w1".to_string(),
            events: vec![],
        };
        let value = serde_json::to_value(&batch).unwrap();
        assert!(value.get("sessionId").is_some());
        assert!(value.get("websiteId").is_some());
    }
}
