// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::identity::Topic;

/// Failures surfaced by entity handles and their subscription registries.
///
/// Transport failures are opaque to this layer; their rendered message is kept as `reason`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HandleError {
    #[error("Invalid identity: {reason}")]
    InvalidIdentity { reason: String },

    #[error("Action '{action}' failed: {reason}")]
    RemoteAction { action: String, reason: String },

    #[error("Subscribing to '{event_type}' on {topic} failed: {reason}")]
    SubscriptionFailed {
        topic: Topic,
        event_type: String,
        reason: String,
    },

    #[error("Unsubscribing from '{event_type}' on {topic} failed: {reason}")]
    UnsubscribeFailed {
        topic: Topic,
        event_type: String,
        reason: String,
    },

    #[error("{} unsubscribe action(s) failed during teardown", .failures.len())]
    TeardownFailed { failures: Vec<HandleError> },

    #[error("Listener for '{event_type}' on {topic} failed: {reason}")]
    ListenerCallback {
        topic: Topic,
        event_type: String,
        reason: String,
    },
}

impl HandleError {
    pub(crate) fn remote_action(action: &str, err: &anyhow::Error) -> Self {
        HandleError::RemoteAction {
            action: action.to_string(),
            reason: format!("{err:#}"),
        }
    }

    /// Event type the failure relates to, if any
    pub fn event_type(&self) -> Option<&str> {
        match self {
            HandleError::SubscriptionFailed { event_type, .. }
            | HandleError::UnsubscribeFailed { event_type, .. }
            | HandleError::ListenerCallback { event_type, .. } => Some(event_type),
            _ => None,
        }
    }
}
