// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Message shapes exchanged with the transport.

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, Topic};

/// Payload carried by a raw event and handed to listeners
pub type EventPayload = serde_json::Value;

/// Correlated reply to a single action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub payload: ResponsePayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ActionResponse {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            payload: ResponsePayload { data },
        }
    }

    pub fn into_data(self) -> serde_json::Value {
        self.payload.data
    }
}

/// Variant of a remote subscription. One value is in effect per (topic, event type).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionOptions {
    /// Ask the remote side to stamp each event with its emission time
    #[serde(default)]
    pub timestamp: bool,
}

impl SubscriptionOptions {
    pub fn with_timestamp() -> Self {
        Self { timestamp: true }
    }
}

/// Body of the subscribe / unsubscribe actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Entity kind segment of the topic
    pub topic: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SubscriptionOptions>,
}

impl SubscriptionRequest {
    pub fn new(topic: &Topic, identity: &Identity, event_type: &str) -> Self {
        Self {
            topic: topic.kind().to_string(),
            event_type: event_type.to_string(),
            identity: identity.clone(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: &SubscriptionOptions) -> Self {
        self.options = Some(options.clone());
        self
    }
}

/// Unsolicited notification pushed by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub topic: Topic,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: EventPayload,
}

impl RawEvent {
    pub fn new(topic: Topic, event_type: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            topic,
            event_type: event_type.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_request_wire_shape() {
        let identity = Identity::new("app", "child");
        let topic = Topic::new("frame", &identity);

        let request = SubscriptionRequest::new(&topic, &identity, "connected")
            .with_options(&SubscriptionOptions::with_timestamp());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "topic": "frame",
                "type": "connected",
                "uuid": "app",
                "name": "child",
                "options": { "timestamp": true }
            })
        );

        // unsubscribe carries no options
        let request = SubscriptionRequest::new(&topic, &identity, "connected");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "topic": "frame", "type": "connected", "uuid": "app", "name": "child" })
        );
    }

    #[test]
    fn test_action_response_missing_data_is_null() {
        let response: ActionResponse = serde_json::from_value(json!({ "payload": {} })).unwrap();
        assert_eq!(response.into_data(), serde_json::Value::Null);
    }
}
