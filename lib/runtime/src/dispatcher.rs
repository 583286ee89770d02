// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! One-shot request/response actions against the remote runtime.
//!
//! The dispatcher is the only place handles and registries reach the [`Transport`]. It never
//! retries; concurrent invocations are independent and may complete in any order.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::config::RuntimeConfig;
use crate::error::HandleError;
use crate::identity::{Identity, Topic};
use crate::protocols::{SubscriptionOptions, SubscriptionRequest};
use crate::transports::Transport;

#[derive(Clone)]
pub struct ActionDispatcher {
    transport: Arc<dyn Transport>,
    subscribe_action: Arc<str>,
    unsubscribe_action: Arc<str>,
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("transport", &self.transport.transport_name())
            .field("subscribe_action", &self.subscribe_action)
            .field("unsubscribe_action", &self.unsubscribe_action)
            .finish()
    }
}

impl ActionDispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: &RuntimeConfig) -> Self {
        Self {
            transport,
            subscribe_action: Arc::from(config.subscribe_action.as_str()),
            unsubscribe_action: Arc::from(config.unsubscribe_action.as_str()),
        }
    }

    /// Send `action` for `identity` and resolve with the response's `data` field.
    pub async fn invoke(
        &self,
        identity: &Identity,
        action: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, HandleError> {
        let span = tracing::debug_span!(
            "invoke",
            action,
            %identity,
            transport = self.transport.transport_name()
        );
        async {
            match self.transport.send_action(action, identity, payload).await {
                Ok(response) => {
                    tracing::trace!("action completed");
                    Ok(response.into_data())
                }
                Err(err) => {
                    tracing::debug!(error = %err, "action failed");
                    Err(HandleError::remote_action(action, &err))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// [`ActionDispatcher::invoke`] and deserialize the `data` field into `T`.
    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        identity: &Identity,
        action: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<T, HandleError> {
        let data = self.invoke(identity, action, payload).await?;
        serde_json::from_value(data).map_err(|err| HandleError::RemoteAction {
            action: action.to_string(),
            reason: format!("unexpected response data: {err}"),
        })
    }

    pub(crate) async fn subscribe(
        &self,
        topic: &Topic,
        identity: &Identity,
        event_type: &str,
        options: &SubscriptionOptions,
    ) -> anyhow::Result<()> {
        let request = SubscriptionRequest::new(topic, identity, event_type).with_options(options);
        self.send_subscription(&self.subscribe_action, identity, request)
            .await
    }

    pub(crate) async fn unsubscribe(
        &self,
        topic: &Topic,
        identity: &Identity,
        event_type: &str,
    ) -> anyhow::Result<()> {
        let request = SubscriptionRequest::new(topic, identity, event_type);
        self.send_subscription(&self.unsubscribe_action, identity, request)
            .await
    }

    async fn send_subscription(
        &self,
        action: &str,
        identity: &Identity,
        request: SubscriptionRequest,
    ) -> anyhow::Result<()> {
        let payload = serde_json::to_value(&request)?;
        self.transport
            .send_action(action, identity, Some(payload))
            .await?;
        Ok(())
    }
}
