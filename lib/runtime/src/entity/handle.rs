// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::{EntityKind, EventKind};
use crate::connection::Connection;
use crate::error::HandleError;
use crate::identity::{Identity, Topic};
use crate::protocols::SubscriptionOptions;
use crate::registry::{EventRegistry, Listener, ListenerFlags};

/// Local proxy for one remote entity.
///
/// Creating a handle performs no I/O and never checks that the entity exists. The handle owns
/// its subscription registry; listener methods resolve once any remote subscribe or unsubscribe
/// they trigger has completed, and return the handle for chaining.
///
/// Dropping a handle does not unsubscribe remotely. Call
/// [`EntityHandle::remove_all_listeners`] first.
pub struct EntityHandle<K: EntityKind> {
    identity: Identity,
    connection: Connection,
    registry: EventRegistry,
    _kind: PhantomData<fn() -> K>,
}

impl<K: EntityKind> std::fmt::Debug for EntityHandle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHandle")
            .field("kind", &K::KIND)
            .field("identity", &self.identity)
            .field("event_types", &self.registry.event_types())
            .finish()
    }
}

impl<K: EntityKind> EntityHandle<K> {
    /// Assumes `identity` has been validated, or comes from the runtime itself.
    pub(crate) fn new(connection: Connection, identity: Identity) -> Self {
        let registry = EventRegistry::new(
            Topic::new(K::KIND, &identity),
            identity.clone(),
            connection.dispatcher().clone(),
            connection.listener_error_sink().clone(),
        );
        connection.router().register(registry.sink());
        tracing::trace!(kind = K::KIND, %identity, "created entity handle");

        Self {
            identity,
            connection,
            registry,
            _kind: PhantomData,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn topic(&self) -> &Topic {
        self.registry.topic()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub async fn add_listener(&self, event: K::Event, listener: Listener) -> Result<&Self, HandleError> {
        self.register(event, listener, SubscriptionOptions::default(), ListenerFlags::default())
            .await
    }

    /// Like [`EntityHandle::add_listener`]; `options` only take effect if this listener opens
    /// the remote subscription.
    pub async fn add_listener_with_options(
        &self,
        event: K::Event,
        listener: Listener,
        options: SubscriptionOptions,
    ) -> Result<&Self, HandleError> {
        self.register(event, listener, options, ListenerFlags::default())
            .await
    }

    pub async fn on(&self, event: K::Event, listener: Listener) -> Result<&Self, HandleError> {
        self.add_listener(event, listener).await
    }

    pub async fn once(&self, event: K::Event, listener: Listener) -> Result<&Self, HandleError> {
        self.register(event, listener, SubscriptionOptions::default(), ListenerFlags::once())
            .await
    }

    pub async fn prepend_listener(&self, event: K::Event, listener: Listener) -> Result<&Self, HandleError> {
        self.register(event, listener, SubscriptionOptions::default(), ListenerFlags::prepend())
            .await
    }

    pub async fn prepend_once_listener(
        &self,
        event: K::Event,
        listener: Listener,
    ) -> Result<&Self, HandleError> {
        self.register(
            event,
            listener,
            SubscriptionOptions::default(),
            ListenerFlags::prepend_once(),
        )
        .await
    }

    pub async fn remove_listener(&self, event: K::Event, listener: &Listener) -> Result<&Self, HandleError> {
        self.registry
            .remove_listener(event.event_type(), listener)
            .await?;
        Ok(self)
    }

    /// Remove every listener of `event`, or every listener of the handle when `None`.
    pub async fn remove_all_listeners(&self, event: Option<K::Event>) -> Result<&Self, HandleError> {
        self.registry
            .remove_all_listeners(event.map(EventKind::event_type))
            .await?;
        Ok(self)
    }

    /// Number of local listeners for `event`
    pub fn listener_count(&self, event: K::Event) -> usize {
        self.registry.listener_count(event.event_type())
    }

    /// One-shot action against this entity.
    pub async fn invoke(
        &self,
        action: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, HandleError> {
        self.connection
            .dispatcher()
            .invoke(&self.identity, action, payload)
            .await
    }

    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        action: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<T, HandleError> {
        self.connection
            .dispatcher()
            .invoke_as(&self.identity, action, payload)
            .await
    }

    async fn register(
        &self,
        event: K::Event,
        listener: Listener,
        options: SubscriptionOptions,
        flags: ListenerFlags,
    ) -> Result<&Self, HandleError> {
        self.registry
            .add_listener(event.event_type(), listener, options, flags)
            .await?;
        Ok(self)
    }
}
