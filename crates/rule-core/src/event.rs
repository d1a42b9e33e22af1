//! Trigger event types for the rule event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic identifier for trigger events
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    /// Create a new topic
    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// Get the topic as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Special topic that matches all events
    pub fn match_all() -> Self {
        Self("*".to_string())
    }

    /// Check if this is the MATCH_ALL topic
    pub fn is_match_all(&self) -> bool {
        self.0 == "*"
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A trigger-fire event delivered by a binding or event-bus collaborator
///
/// Events carry a topic and an arbitrary JSON value payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Topic the event was published under
    pub topic: Topic,

    /// Value payload
    pub payload: serde_json::Value,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,
}

impl TriggerEvent {
    /// Create a new event with the current timestamp
    pub fn new(topic: impl Into<Topic>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            time_fired: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_new() {
        let event = TriggerEvent::new("sensor/temperature", json!("21.5 °C"));

        assert_eq!(event.topic.as_str(), "sensor/temperature");
        assert_eq!(event.payload, json!("21.5 °C"));
    }

    #[test]
    fn test_match_all_topic() {
        assert!(Topic::match_all().is_match_all());
        assert!(!Topic::new("sensor/temperature").is_match_all());
    }
}
