// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The process-wide bundle every handle is created from.
//!
//! A [`Connection`] owns the transport reference, the event router feeding pushed events to
//! registries, the listener error channel, and the identity of the current process. It is cheap
//! to clone; all clones share the same state.

use std::sync::Arc;

use anyhow::Result;
use derive_builder::Builder;
use derive_getters::Dissolve;
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::config::RuntimeConfig;
use crate::dispatcher::ActionDispatcher;
use crate::entity::{EntityHandle, EntityKind, Frames};
use crate::error::HandleError;
use crate::identity::{Identity, IdentityValidator, validate_identity};
use crate::registry::ListenerErrors;
use crate::transports::{EventRouter, RawEventStream, Transport, WireStream, decode_wire_stream};

#[derive(Builder, Dissolve)]
#[builder(pattern = "owned", build_fn(private, name = "build_internal"))]
pub struct ConnectionConfig {
    /// Carries actions and pushed events
    transport: Arc<dyn Transport>,

    /// Identity of the current process, used by `get_current`
    me: Identity,

    #[builder(default)]
    config: RuntimeConfig,

    /// Extra identity rules applied by `wrap` after the structural checks
    #[builder(default = "validate_identity as IdentityValidator")]
    validator: IdentityValidator,
}

impl ConnectionConfigBuilder {
    /// Validate the configuration, bind the transport to a fresh event router and return the
    /// connection.
    pub fn connect(self) -> Result<Connection> {
        let (transport, me, config, validator) = self.build_internal()?.dissolve();
        config.validate()?;

        let router = EventRouter::new();
        transport.bind_event_router(router.clone());

        let dispatcher = ActionDispatcher::new(transport.clone(), &config);
        let errors = ListenerErrors::new(config.listener_error_capacity);

        tracing::debug!(transport = transport.transport_name(), %me, %config, "connection ready");

        Ok(Connection {
            inner: Arc::new(ConnectionInner {
                me,
                transport,
                dispatcher,
                router,
                errors,
                validator,
                config,
                cancel_token: CancellationToken::new(),
            }),
        })
    }
}

struct ConnectionInner {
    me: Identity,
    transport: Arc<dyn Transport>,
    dispatcher: ActionDispatcher,
    router: EventRouter,
    errors: ListenerErrors,
    validator: IdentityValidator,
    config: RuntimeConfig,
    cancel_token: CancellationToken,
}

#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("me", &self.inner.me)
            .field("transport", &self.inner.transport.transport_name())
            .finish()
    }
}

impl Connection {
    pub fn builder(transport: Arc<dyn Transport>, me: Identity) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default().transport(transport).me(me)
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.me
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.inner.dispatcher
    }

    pub fn router(&self) -> &EventRouter {
        &self.inner.router
    }

    /// New receiver for listener callback failures raised after this call
    pub fn listener_errors(&self) -> broadcast::Receiver<HandleError> {
        self.inner.errors.subscribe()
    }

    pub(crate) fn listener_error_sink(&self) -> &ListenerErrors {
        &self.inner.errors
    }

    /// Run the structural identity checks, then the configured validator.
    pub fn validate(&self, identity: &Identity) -> Result<(), HandleError> {
        let rejection = validate_identity(identity).or_else(|| (self.inner.validator)(identity));
        match rejection {
            Some(reason) if !reason.is_empty() => Err(HandleError::InvalidIdentity { reason }),
            _ => Ok(()),
        }
    }

    /// Handle for a remote entity of kind `K`. Validates `identity`; performs no I/O.
    pub fn wrap<K: EntityKind>(&self, identity: Identity) -> Result<EntityHandle<K>, HandleError> {
        self.validate(&identity)?;
        Ok(self.wrap_unchecked(identity))
    }

    /// Handle for the current process as an entity of kind `K`
    pub fn current<K: EntityKind>(&self) -> EntityHandle<K> {
        self.wrap_unchecked(self.inner.me.clone())
    }

    pub(crate) fn wrap_unchecked<K: EntityKind>(&self, identity: Identity) -> EntityHandle<K> {
        EntityHandle::new(self.clone(), identity)
    }

    pub fn frames(&self) -> Frames {
        Frames::new(self.clone())
    }

    /// Feed a stream of decoded raw events into the router until it ends or the connection
    /// shuts down. Up to `raw_event_buffer` events are queued ahead of dispatch.
    pub fn pump_raw_events(&self, mut stream: RawEventStream) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel(self.inner.config.raw_event_buffer);
        let cancel_token = self.inner.cancel_token.child_token();

        let forward_cancel = cancel_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = forward_cancel.cancelled() => break,
                    item = stream.next() => {
                        let Some(item) = item else { break };
                        if tx.send(item).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.inner
            .router
            .pump(Box::pin(ReceiverStream::new(rx)), cancel_token)
    }

    /// [`Connection::pump_raw_events`] for a transport that hands over raw frames
    pub fn pump_wire(&self, stream: WireStream) -> JoinHandle<()> {
        self.pump_raw_events(decode_wire_stream(stream))
    }

    /// Stop every pump task. Remote subscriptions are left as they are.
    pub fn shutdown(&self) {
        tracing::debug!(me = %self.inner.me, "shutting down connection");
        self.inner.cancel_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.cancel_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Frame, Window};
    use crate::protocols::RawEvent;
    use crate::transports::mock::MockTransport;
    use crate::transports::RawEventCodec;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use serde_json::json;

    fn connect(transport: &MockTransport) -> Connection {
        Connection::builder(Arc::new(transport.clone()), Identity::new("app", "main"))
            .connect()
            .unwrap()
    }

    #[test]
    fn test_connect_rejects_invalid_config() {
        let config = RuntimeConfig {
            listener_error_capacity: 0,
            ..Default::default()
        };
        let result = Connection::builder(Arc::new(MockTransport::new()), Identity::new("app", "main"))
            .config(config)
            .connect();
        assert!(result.is_err());
    }

    #[test]
    fn test_wrap_validates_without_io() {
        let transport = MockTransport::new();
        let connection = connect(&transport);

        let err = connection
            .wrap::<Frame>(Identity::new("", "child"))
            .unwrap_err();
        assert_matches!(err, HandleError::InvalidIdentity { ref reason } if reason == "uuid must not be empty");
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_custom_validator() {
        fn no_admins(identity: &Identity) -> Option<String> {
            (identity.local_name() == "admin").then(|| "reserved name".to_string())
        }

        let connection = Connection::builder(Arc::new(MockTransport::new()), Identity::new("app", "main"))
            .validator(no_admins)
            .connect()
            .unwrap();

        assert_matches!(
            connection.wrap::<Window>(Identity::new("app", "admin")),
            Err(HandleError::InvalidIdentity { ref reason }) if reason == "reserved name"
        );
        // the structural checks still run underneath
        assert_matches!(
            connection.wrap::<Window>(Identity::new("app", "")),
            Err(HandleError::InvalidIdentity { .. })
        );
        assert!(connection.wrap::<Window>(Identity::new("app", "child")).is_ok());
    }

    #[test]
    fn test_permissive_validator_keeps_structural_checks() {
        fn anything(_: &Identity) -> Option<String> {
            None
        }

        let connection = Connection::builder(Arc::new(MockTransport::new()), Identity::new("app", "main"))
            .validator(anything)
            .connect()
            .unwrap();

        let err = connection.wrap::<Frame>(Identity::new("", "child")).unwrap_err();
        assert_matches!(err, HandleError::InvalidIdentity { ref reason } if reason == "uuid must not be empty");
    }

    #[test]
    fn test_current_skips_validation() {
        let connection = Connection::builder(Arc::new(MockTransport::new()), Identity::new("", ""))
            .connect()
            .unwrap();
        let handle = connection.current::<Frame>();
        assert_eq!(handle.topic().segments(), ["frame", "", ""]);
    }

    #[tokio::test]
    async fn test_pump_wire_delivers_to_handles() {
        let transport = MockTransport::new();
        let connection = connect(&transport);
        let handle = connection.current::<Frame>();

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        handle
            .on(
                crate::entity::FrameEvent::Connected,
                crate::registry::Listener::infallible(move |payload| sink.lock().push(payload.clone())),
            )
            .await
            .unwrap();

        let frame = RawEventCodec
            .encode(&RawEvent::new(handle.topic().clone(), "connected", json!({ "n": 1 })))
            .unwrap();
        let frames: Vec<anyhow::Result<Bytes>> = vec![Ok(Bytes::from_static(b"garbage")), Ok(frame)];

        connection
            .pump_wire(Box::pin(futures::stream::iter(frames)))
            .await
            .unwrap();

        assert_eq!(seen.lock().as_slice(), [json!({ "n": 1 })]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_pump() {
        let connection = connect(&MockTransport::new());
        let task = connection.pump_raw_events(Box::pin(futures::stream::pending::<
            anyhow::Result<RawEvent>,
        >()));

        connection.shutdown();
        task.await.unwrap();
        assert!(connection.is_shutdown());
    }
}
