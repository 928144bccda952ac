use serde::{Deserialize, Serialize};

/// Image format advertised in every capture event.
pub const CAPTURE_FORMAT: &str = "jpeg";

/// Outcome of classifying one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub class_id: i32,
    pub class_desc: String,
    pub confidence: f32,
}

/// Payload published to the broker for a classified frame.
///
/// Field order matches the wire format consumers expect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub path: String,
    pub name: String,
    pub timestamp: i64,
    pub format: String,
    pub class_id: i32,
    pub class_desc: String,
    pub confidence: f32,
}

impl CaptureEvent {
    pub fn new(captured_dir: &str, timestamp_ms: i64, result: &ClassificationResult) -> Self {
        Self {
            path: captured_dir.to_string(),
            name: timestamp_ms.to_string(),
            timestamp: timestamp_ms,
            format: CAPTURE_FORMAT.to_string(),
            class_id: result.class_id,
            class_desc: result.class_desc.clone(),
            confidence: result.confidence,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(confidence: f32) -> ClassificationResult {
        ClassificationResult {
            class_id: 207,
            class_desc: "golden retriever".to_string(),
            confidence,
        }
    }

    #[test]
    fn event_uses_timestamp_as_name() {
        let ev = CaptureEvent::new("/srv/captured", 1_700_000_000_123, &result(0.9));
        assert_eq!(ev.name, "1700000000123");
        assert_eq!(ev.timestamp, 1_700_000_000_123);
        assert_eq!(ev.path, "/srv/captured");
        assert_eq!(ev.format, "jpeg");
    }

    #[test]
    fn json_keeps_field_order() {
        let ev = CaptureEvent::new("/srv/captured", 5, &result(0.5));
        let json = ev.to_json().expect("serialize");
        assert_eq!(
            json,
            r#"{"path":"/srv/captured","name":"5","timestamp":5,"format":"jpeg","class_id":207,"class_desc":"golden retriever","confidence":0.5}"#
        );
    }

    #[test]
    fn class_desc_is_escaped() {
        let mut r = result(0.1);
        r.class_desc = "say \"cheese\"".to_string();
        let json = CaptureEvent::new("/tmp", 1, &r).to_json().expect("serialize");
        let back: CaptureEvent = serde_json::from_str(&json).expect("parse");
        assert_eq!(back.class_desc, "say \"cheese\"");
    }
}
