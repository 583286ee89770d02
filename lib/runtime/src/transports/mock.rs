// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`Transport`] for tests.
//!
//! Records every action it receives, answers with scripted data or failures, can hold an action
//! in flight until the test releases it, and pushes raw events straight into the bound router.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{EventRouter, Transport};
use crate::identity::Identity;
use crate::protocols::{ActionResponse, RawEvent};

/// One recorded call to [`Transport::send_action`]
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    pub action: String,
    pub identity: Identity,
    pub payload: Option<serde_json::Value>,
}

/// Holds the next call of an action in flight until [`ActionGate::open`] is called.
#[derive(Debug, Default)]
pub struct ActionGate {
    entered: Notify,
    release: Notify,
}

impl ActionGate {
    /// Resolves once the gated call has been received by the transport
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the gated call complete
    pub fn open(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<ActionCall>,
    responses: HashMap<String, serde_json::Value>,
    failures: HashMap<String, VecDeque<String>>,
    gates: HashMap<String, VecDeque<Arc<ActionGate>>>,
    router: Option<EventRouter>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every future `action` with `data` (default is `null`)
    pub fn respond_with(&self, action: &str, data: serde_json::Value) {
        self.state.lock().responses.insert(action.to_string(), data);
    }

    /// Fail the next call of `action` with `reason`. Queued failures are consumed in order.
    pub fn fail_next(&self, action: &str, reason: &str) {
        self.state
            .lock()
            .failures
            .entry(action.to_string())
            .or_default()
            .push_back(reason.to_string());
    }

    /// Hold the next call of `action` until the returned gate is opened
    pub fn gate(&self, action: &str) -> Arc<ActionGate> {
        let gate = Arc::new(ActionGate::default());
        self.state
            .lock()
            .gates
            .entry(action.to_string())
            .or_default()
            .push_back(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<ActionCall> {
        self.state.lock().calls.clone()
    }

    /// Names of every action received, in arrival order
    pub fn action_names(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|c| c.action.clone())
            .collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.action == action)
            .count()
    }

    /// Push a raw event to the bound router; returns the number of registries reached.
    pub fn emit(&self, event: RawEvent) -> usize {
        let router = self.state.lock().router.clone();
        match router {
            Some(router) => router.deliver(&event),
            None => {
                tracing::warn!(topic = %event.topic, "mock transport has no event router bound");
                0
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_action(
        &self,
        action: &str,
        identity: &Identity,
        payload: Option<serde_json::Value>,
    ) -> Result<ActionResponse> {
        let gate = {
            let mut state = self.state.lock();
            state.calls.push(ActionCall {
                action: action.to_string(),
                identity: identity.clone(),
                payload,
            });
            state.gates.get_mut(action).and_then(VecDeque::pop_front)
        };

        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut state = self.state.lock();
        if let Some(reason) = state
            .failures
            .get_mut(action)
            .and_then(VecDeque::pop_front)
        {
            anyhow::bail!(reason);
        }
        let data = state
            .responses
            .get(action)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        Ok(ActionResponse::new(data))
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }

    fn bind_event_router(&self, router: EventRouter) {
        self.state.lock().router = Some(router);
    }
}
