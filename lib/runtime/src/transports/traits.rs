// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Transport trait abstractions.
//!
//! These traits define the low-level interface a transport backend implements. Handles only
//! ever talk to the transport through [`Transport::send_action`]; pushed events reach them
//! through the [`EventRouter`].

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use super::EventRouter;
use crate::identity::Identity;
use crate::protocols::{ActionResponse, RawEvent};

/// Stream of raw wire bytes from a push channel.
pub type WireStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Stream of decoded raw events from a push channel.
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawEvent>> + Send>>;

/// Request/response channel to the remote runtime.
///
/// Implementations own correlation of requests to responses. They must not retry on their
/// own behalf unless that is their documented policy; this crate never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one action for `identity` and wait for its correlated response
    ///
    /// # Errors
    ///
    /// Any failure reported by the remote side or by the connection. The error is opaque to
    /// the runtime and is surfaced to callers as its rendered message.
    async fn send_action(
        &self,
        action: &str,
        identity: &Identity,
        payload: Option<serde_json::Value>,
    ) -> Result<ActionResponse>;

    /// Static identifier used in logs
    fn transport_name(&self) -> &'static str;

    /// Called once when a connection adopts this transport.
    ///
    /// Transports that receive pushed events in-process deliver them through `router`.
    /// Byte-oriented transports can instead hand a stream to
    /// [`crate::Connection::pump_raw_events`] and ignore this hook.
    fn bind_event_router(&self, _router: EventRouter) {}
}
