// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reference-counted remote event subscriptions for a single topic.
//!
//! Every event type goes through `Unsubscribed -> Subscribing -> Subscribed -> Unsubscribing ->
//! Unsubscribed`. The first local listener for a type drives the remote subscribe, the last one
//! to leave drives the remote unsubscribe, and every listener in between is purely local.
//!
//! Local bookkeeping sits behind a synchronous lock that is never held across an `.await`.
//! Wire operations for one event type are serialized by that type's wire lock, so a subscribe
//! and an unsubscribe for the same key never overlap on the wire, and at most one of each is
//! outstanding at a time.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

mod listener;

pub use listener::{Listener, ListenerErrors, ListenerFlags};
pub(crate) use listener::ListenerRecord;

use crate::dispatcher::ActionDispatcher;
use crate::error::HandleError;
use crate::identity::{Identity, Topic};
use crate::protocols::{EventPayload, SubscriptionOptions};
use crate::transports::RawEventSink;

type WireLock = Arc<tokio::sync::Mutex<()>>;

/// A remote subscription that is in effect for one event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEntry {
    pub event_type: String,
    /// Equals the number of local listeners for the type
    pub ref_count: usize,
    /// Options sent with the subscribe that established the entry
    pub options: SubscriptionOptions,
}

#[derive(Debug)]
enum SubscriptionPhase {
    Unsubscribed,
    Subscribing,
    Subscribed(SubscriptionEntry),
    Unsubscribing,
}

/// Slots are never removed, which keeps the wire lock of a type stable for the registry's life.
struct EventSlot {
    listeners: Vec<ListenerRecord>,
    phase: SubscriptionPhase,
    wire: WireLock,
}

impl EventSlot {
    fn new() -> Self {
        Self {
            listeners: Vec::new(),
            phase: SubscriptionPhase::Unsubscribed,
            wire: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Add a record to an established subscription; hands it back otherwise.
    fn attach(&mut self, record: ListenerRecord) -> Result<(), ListenerRecord> {
        let SubscriptionPhase::Subscribed(entry) = &mut self.phase else {
            return Err(record);
        };
        if entry.options != record.options {
            tracing::debug!(
                event_type = %entry.event_type,
                established = ?entry.options,
                requested = ?record.options,
                "subscription options differ; keeping the established ones"
            );
        }
        entry.ref_count += 1;
        if record.flags.prepend {
            self.listeners.insert(0, record);
        } else {
            self.listeners.push(record);
        }
        Ok(())
    }

    /// Drop `count` references. Returns the wire lock once nothing references the entry.
    fn detach(&mut self, count: usize) -> Option<WireLock> {
        let SubscriptionPhase::Subscribed(entry) = &mut self.phase else {
            return None;
        };
        entry.ref_count = entry.ref_count.saturating_sub(count);
        (entry.ref_count == 0).then(|| self.wire.clone())
    }

    /// The entry while at least one listener holds it. A zero-count entry is a release that
    /// has not reached the wire yet.
    fn live_entry(&self) -> Option<&SubscriptionEntry> {
        match &self.phase {
            SubscriptionPhase::Subscribed(entry) if entry.ref_count > 0 => Some(entry),
            _ => None,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<String, EventSlot>,
    /// Releases scheduled from event dispatch
    deferred: Vec<JoinHandle<()>>,
}

struct RegistryInner {
    topic: Topic,
    identity: Identity,
    dispatcher: ActionDispatcher,
    errors: ListenerErrors,
    state: Mutex<RegistryState>,
    me: Weak<RegistryInner>,
}

/// Subscription registry owned by one entity handle.
#[derive(Clone)]
pub struct EventRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("topic", &self.inner.topic)
            .field("event_types", &self.event_types())
            .finish()
    }
}

impl EventRegistry {
    pub fn new(
        topic: Topic,
        identity: Identity,
        dispatcher: ActionDispatcher,
        errors: ListenerErrors,
    ) -> Self {
        let inner = Arc::new_cyclic(|me| RegistryInner {
            topic,
            identity,
            dispatcher,
            errors,
            state: Mutex::new(RegistryState::default()),
            me: me.clone(),
        });
        Self { inner }
    }

    pub fn topic(&self) -> &Topic {
        &self.inner.topic
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// Weak view used by the event router
    pub fn sink(&self) -> Weak<dyn RawEventSink> {
        Arc::downgrade(&self.inner) as Weak<dyn RawEventSink>
    }

    /// Register `listener` for `event_type`, subscribing remotely if it is the first one.
    ///
    /// # Errors
    ///
    /// [`HandleError::SubscriptionFailed`] if the remote subscribe fails. The listener is not
    /// registered in that case.
    ///
    /// The subscribe runs on the runtime: dropping this future before it resolves does not stop
    /// the listener from being registered.
    pub async fn add_listener(
        &self,
        event_type: &str,
        listener: Listener,
        options: SubscriptionOptions,
        flags: ListenerFlags,
    ) -> Result<(), HandleError> {
        self.inner
            .add_listener(event_type, listener, options, flags)
            .await
    }

    /// Remove the first registration of `listener` for `event_type`. Unknown listeners are
    /// ignored.
    ///
    /// # Errors
    ///
    /// [`HandleError::UnsubscribeFailed`] if this was the last listener and the remote
    /// unsubscribe failed. The local entry is gone regardless.
    pub async fn remove_listener(
        &self,
        event_type: &str,
        listener: &Listener,
    ) -> Result<(), HandleError> {
        self.inner.remove_listener(event_type, listener).await
    }

    /// Remove every listener of `event_type`, or of every type when `None`.
    ///
    /// # Errors
    ///
    /// With a type, [`HandleError::UnsubscribeFailed`]. Without, [`HandleError::TeardownFailed`]
    /// listing each failed unsubscribe; a failure never stops the other types from being
    /// released.
    pub async fn remove_all_listeners(&self, event_type: Option<&str>) -> Result<(), HandleError> {
        match event_type {
            Some(event_type) => self.inner.remove_all_of(event_type).await,
            None => self.inner.remove_all().await,
        }
    }

    /// Wait for every release scheduled by `once` listeners to reach the wire.
    pub async fn flush(&self) {
        self.inner.flush().await
    }

    /// Event types with a remote subscription in effect, sorted
    pub fn event_types(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut types: Vec<String> = state
            .slots
            .iter()
            .filter(|(_, slot)| slot.live_entry().is_some())
            .map(|(event_type, _)| event_type.clone())
            .collect();
        types.sort();
        types
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .state
            .lock()
            .slots
            .get(event_type)
            .map_or(0, |slot| slot.listeners.len())
    }

    /// Listeners of `event_type` in dispatch order
    pub fn listeners(&self, event_type: &str) -> Vec<Listener> {
        self.inner
            .state
            .lock()
            .slots
            .get(event_type)
            .map(|slot| slot.listeners.iter().map(|r| r.listener.clone()).collect())
            .unwrap_or_default()
    }

    /// The remote subscription for `event_type`, if any listener holds it
    pub fn subscription(&self, event_type: &str) -> Option<SubscriptionEntry> {
        self.inner
            .state
            .lock()
            .slots
            .get(event_type)?
            .live_entry()
            .cloned()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .slots
            .values()
            .filter(|slot| slot.live_entry().is_some())
            .count()
    }

    /// Deliver one pushed event; same as the event router would.
    pub fn dispatch_raw_event(&self, topic: &Topic, event_type: &str, payload: &EventPayload) {
        self.inner.dispatch_raw_event(topic, event_type, payload)
    }
}

impl RegistryInner {
    async fn add_listener(
        self: &Arc<Self>,
        event_type: &str,
        listener: Listener,
        options: SubscriptionOptions,
        flags: ListenerFlags,
    ) -> Result<(), HandleError> {
        let record = ListenerRecord {
            listener,
            options,
            flags,
        };

        let (record, wire) = {
            let mut state = self.state.lock();
            let slot = state
                .slots
                .entry(event_type.to_string())
                .or_insert_with(EventSlot::new);
            match slot.attach(record) {
                Ok(()) => return Ok(()),
                Err(record) => (record, slot.wire.clone()),
            }
        };

        // runs to completion even if the caller stops polling
        let this = Arc::clone(self);
        let owned = event_type.to_string();
        let task =
            tokio::spawn(async move { this.subscribe_and_attach(&owned, record, wire).await });
        task.await.map_err(|err| HandleError::SubscriptionFailed {
            topic: self.topic.clone(),
            event_type: event_type.to_string(),
            reason: format!("subscribe task failed: {err}"),
        })?
    }

    /// Subscribe `event_type` under its wire lock and attach `record`, unless a subscription
    /// finished while we waited for the lock.
    async fn subscribe_and_attach(
        &self,
        event_type: &str,
        record: ListenerRecord,
        wire: WireLock,
    ) -> Result<(), HandleError> {
        let _wire = wire.lock().await;

        let record = {
            let mut state = self.state.lock();
            let slot = state
                .slots
                .entry(event_type.to_string())
                .or_insert_with(EventSlot::new);
            match slot.attach(record) {
                Ok(()) => return Ok(()),
                Err(record) => {
                    slot.phase = SubscriptionPhase::Subscribing;
                    record
                }
            }
        };

        tracing::debug!(topic = %self.topic, event_type, "subscribing");
        let result = self
            .dispatcher
            .subscribe(&self.topic, &self.identity, event_type, &record.options)
            .await;

        let mut state = self.state.lock();
        let slot = state
            .slots
            .entry(event_type.to_string())
            .or_insert_with(EventSlot::new);
        match result {
            Ok(()) => {
                slot.phase = SubscriptionPhase::Subscribed(SubscriptionEntry {
                    event_type: event_type.to_string(),
                    ref_count: 0,
                    options: record.options.clone(),
                });
                // cannot fail, the phase was just set
                let _ = slot.attach(record);
                tracing::debug!(topic = %self.topic, event_type, "subscribed");
                Ok(())
            }
            Err(err) => {
                slot.phase = SubscriptionPhase::Unsubscribed;
                tracing::debug!(topic = %self.topic, event_type, error = %err, "subscribe failed");
                Err(HandleError::SubscriptionFailed {
                    topic: self.topic.clone(),
                    event_type: event_type.to_string(),
                    reason: format!("{err:#}"),
                })
            }
        }
    }

    async fn remove_listener(
        self: &Arc<Self>,
        event_type: &str,
        listener: &Listener,
    ) -> Result<(), HandleError> {
        let wire = {
            let mut state = self.state.lock();
            let Some(slot) = state.slots.get_mut(event_type) else {
                return Ok(());
            };
            let Some(index) = slot.listeners.iter().position(|r| r.listener == *listener) else {
                tracing::trace!(topic = %self.topic, event_type, "listener not registered");
                return Ok(());
            };
            slot.listeners.remove(index);
            slot.detach(1)
        };

        match wire {
            Some(wire) => {
                let task = self.spawn_release(event_type, wire);
                self.join_release(event_type, task).await
            }
            None => Ok(()),
        }
    }

    async fn remove_all_of(self: &Arc<Self>, event_type: &str) -> Result<(), HandleError> {
        let wire = {
            let mut state = self.state.lock();
            let Some(slot) = state.slots.get_mut(event_type) else {
                return Ok(());
            };
            let removed = std::mem::take(&mut slot.listeners).len();
            slot.detach(removed)
        };

        match wire {
            Some(wire) => {
                let task = self.spawn_release(event_type, wire);
                self.join_release(event_type, task).await
            }
            None => Ok(()),
        }
    }

    async fn remove_all(self: &Arc<Self>) -> Result<(), HandleError> {
        let released: Vec<(String, WireLock)> = {
            let mut state = self.state.lock();
            state
                .slots
                .iter_mut()
                .filter_map(|(event_type, slot)| {
                    let removed = std::mem::take(&mut slot.listeners).len();
                    slot.detach(removed).map(|wire| (event_type.clone(), wire))
                })
                .collect()
        };
        let pending: Vec<_> = released
            .into_iter()
            .map(|(event_type, wire)| {
                let task = self.spawn_release(&event_type, wire);
                (event_type, task)
            })
            .collect();

        let results = futures::future::join_all(
            pending
                .into_iter()
                .map(|(event_type, task)| async move { self.join_release(&event_type, task).await }),
        )
        .await;

        let failures: Vec<HandleError> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(HandleError::TeardownFailed { failures })
        }
    }

    /// Run [`Self::release`] on the runtime so the unsubscribe and its phase change complete
    /// even if the caller stops polling.
    fn spawn_release(
        self: &Arc<Self>,
        event_type: &str,
        wire: WireLock,
    ) -> JoinHandle<Result<(), HandleError>> {
        let this = Arc::clone(self);
        let event_type = event_type.to_string();
        tokio::spawn(async move { this.release(&event_type, wire).await })
    }

    async fn join_release(
        &self,
        event_type: &str,
        task: JoinHandle<Result<(), HandleError>>,
    ) -> Result<(), HandleError> {
        task.await.map_err(|err| HandleError::UnsubscribeFailed {
            topic: self.topic.clone(),
            event_type: event_type.to_string(),
            reason: format!("unsubscribe task failed: {err}"),
        })?
    }

    /// Unsubscribe `event_type` if nothing references it by the time the wire lock is ours.
    async fn release(&self, event_type: &str, wire: WireLock) -> Result<(), HandleError> {
        let _wire = wire.lock().await;

        {
            let mut state = self.state.lock();
            let Some(slot) = state.slots.get_mut(event_type) else {
                return Ok(());
            };
            let idle = matches!(
                &slot.phase,
                SubscriptionPhase::Subscribed(entry) if entry.ref_count == 0
            );
            if !idle {
                tracing::trace!(topic = %self.topic, event_type, "subscription revived before release");
                return Ok(());
            }
            slot.phase = SubscriptionPhase::Unsubscribing;
        }

        tracing::debug!(topic = %self.topic, event_type, "unsubscribing");
        let result = self
            .dispatcher
            .unsubscribe(&self.topic, &self.identity, event_type)
            .await;

        if let Some(slot) = self.state.lock().slots.get_mut(event_type) {
            slot.phase = SubscriptionPhase::Unsubscribed;
        }

        result.map_err(|err| {
            tracing::warn!(topic = %self.topic, event_type, error = %err, "unsubscribe failed; local subscription dropped");
            HandleError::UnsubscribeFailed {
                topic: self.topic.clone(),
                event_type: event_type.to_string(),
                reason: format!("{err:#}"),
            }
        })
    }

    /// Hand a release triggered by dispatch to the runtime; dispatch itself never awaits.
    fn schedule_release(&self, event_type: &str, wire: WireLock) {
        let Some(this) = self.me.upgrade() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let event_type = event_type.to_string();
                let handle = runtime.spawn(async move {
                    // failures are already logged by release
                    let _ = this.release(&event_type, wire).await;
                });
                let mut state = self.state.lock();
                state.deferred.retain(|h| !h.is_finished());
                state.deferred.push(handle);
            }
            Err(_) => {
                tracing::warn!(
                    topic = %self.topic,
                    event_type,
                    "no tokio runtime to release subscription; remote side keeps it"
                );
                if let Some(slot) = self.state.lock().slots.get_mut(event_type)
                    && matches!(&slot.phase, SubscriptionPhase::Subscribed(entry) if entry.ref_count == 0)
                {
                    slot.phase = SubscriptionPhase::Unsubscribed;
                }
            }
        }
    }

    async fn flush(&self) {
        loop {
            let pending = std::mem::take(&mut self.state.lock().deferred);
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(err) = handle.await {
                    tracing::warn!(topic = %self.topic, error = %err, "deferred release task failed");
                }
            }
        }
    }

    fn invoke(&self, listener: &Listener, event_type: &str, payload: &EventPayload) {
        let reason = match std::panic::catch_unwind(AssertUnwindSafe(|| listener.call(payload))) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => format!("{err:#}"),
            Err(panic) => listener::panic_reason(panic.as_ref()),
        };
        self.errors.report(HandleError::ListenerCallback {
            topic: self.topic.clone(),
            event_type: event_type.to_string(),
            reason,
        });
    }
}

impl RawEventSink for RegistryInner {
    fn topic(&self) -> &Topic {
        &self.topic
    }

    fn dispatch_raw_event(&self, topic: &Topic, event_type: &str, payload: &EventPayload) {
        if *topic != self.topic {
            return;
        }

        let (snapshot, released) = {
            let mut state = self.state.lock();
            let Some(slot) = state.slots.get_mut(event_type) else {
                tracing::trace!(%topic, event_type, "no listeners for event");
                return;
            };
            let snapshot: Vec<Listener> =
                slot.listeners.iter().map(|r| r.listener.clone()).collect();

            let before = slot.listeners.len();
            slot.listeners.retain(|r| !r.flags.once);
            let fired_once = before - slot.listeners.len();
            let released = if fired_once > 0 {
                slot.detach(fired_once)
            } else {
                None
            };
            (snapshot, released)
        };

        tracing::trace!(%topic, event_type, listeners = snapshot.len(), "dispatching event");
        for listener in &snapshot {
            self.invoke(listener, event_type, payload);
        }

        if let Some(wire) = released {
            self.schedule_release(event_type, wire);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::transports::mock::MockTransport;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SUBSCRIBE: &str = crate::config::DEFAULT_SUBSCRIBE_ACTION;
    const UNSUBSCRIBE: &str = crate::config::DEFAULT_UNSUBSCRIBE_ACTION;

    fn registry(transport: &MockTransport) -> EventRegistry {
        let identity = Identity::new("app", "child");
        let dispatcher =
            ActionDispatcher::new(Arc::new(transport.clone()), &RuntimeConfig::default());
        EventRegistry::new(
            Topic::new("frame", &identity),
            identity,
            dispatcher,
            ListenerErrors::new(8),
        )
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Listener {
        let log = log.clone();
        Listener::infallible(move |_| log.lock().push(tag))
    }

    fn fire(registry: &EventRegistry, event_type: &str) {
        let topic = registry.topic().clone();
        registry.dispatch_raw_event(&topic, event_type, &json!(null));
    }

    #[tokio::test]
    async fn test_first_add_subscribes_and_last_remove_unsubscribes() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        let a = Listener::infallible(|_| {});
        let b = Listener::infallible(|_| {});

        for listener in [&a, &b] {
            registry
                .add_listener("connected", listener.clone(), Default::default(), Default::default())
                .await
                .unwrap();
        }
        assert_eq!(transport.count(SUBSCRIBE), 1);
        assert_eq!(registry.subscription("connected").unwrap().ref_count, 2);

        registry.remove_listener("connected", &a).await.unwrap();
        assert_eq!(transport.count(UNSUBSCRIBE), 0);
        assert_eq!(registry.subscription("connected").unwrap().ref_count, 1);

        registry.remove_listener("connected", &b).await.unwrap();
        assert_eq!(transport.count(UNSUBSCRIBE), 1);
        assert_eq!(registry.subscription("connected"), None);
        assert_eq!(registry.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_listener_is_noop() {
        let transport = MockTransport::new();
        let registry = registry(&transport);

        let stranger = Listener::infallible(|_| {});
        registry.remove_listener("connected", &stranger).await.unwrap();

        registry
            .add_listener("connected", Listener::infallible(|_| {}), Default::default(), Default::default())
            .await
            .unwrap();
        registry.remove_listener("connected", &stranger).await.unwrap();

        assert_eq!(registry.listener_count("connected"), 1);
        assert_eq!(transport.action_names(), [SUBSCRIBE]);
    }

    #[tokio::test]
    async fn test_prepend_order() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        let log = Arc::new(Mutex::new(Vec::new()));

        registry
            .add_listener("t", recorder(&log, "a"), Default::default(), Default::default())
            .await
            .unwrap();
        registry
            .add_listener("t", recorder(&log, "p1"), Default::default(), ListenerFlags::prepend())
            .await
            .unwrap();
        registry
            .add_listener("t", recorder(&log, "b"), Default::default(), Default::default())
            .await
            .unwrap();
        registry
            .add_listener("t", recorder(&log, "p2"), Default::default(), ListenerFlags::prepend())
            .await
            .unwrap();

        fire(&registry, "t");
        assert_eq!(log.lock().as_slice(), ["p2", "p1", "a", "b"]);
    }

    #[tokio::test]
    async fn test_once_listener_releases_subscription() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        registry
            .add_listener(
                "connected",
                Listener::infallible(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                Default::default(),
                ListenerFlags::once(),
            )
            .await
            .unwrap();

        fire(&registry, "connected");
        fire(&registry, "connected");
        registry.flush().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.listener_count("connected"), 0);
        assert_eq!(transport.action_names(), [SUBSCRIBE, UNSUBSCRIBE]);
    }

    #[tokio::test]
    async fn test_pending_release_is_not_reported_as_subscribed() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        registry
            .add_listener(
                "connected",
                Listener::infallible(|_| {}),
                Default::default(),
                ListenerFlags::once(),
            )
            .await
            .unwrap();
        assert_eq!(registry.subscription_count(), 1);

        // current-thread runtime: the release is scheduled but has not run yet
        fire(&registry, "connected");
        assert_eq!(transport.action_names(), [SUBSCRIBE]);
        assert_eq!(registry.subscription("connected"), None);
        assert_eq!(registry.subscription_count(), 0);
        assert!(registry.event_types().is_empty());

        registry.flush().await;
        assert_eq!(transport.action_names(), [SUBSCRIBE, UNSUBSCRIBE]);
    }

    #[tokio::test]
    async fn test_add_revives_pending_release_without_wire_traffic() {
        let transport = MockTransport::new();
        let registry = registry(&transport);

        registry
            .add_listener("connected", Listener::infallible(|_| {}), Default::default(), ListenerFlags::once())
            .await
            .unwrap();

        // current-thread runtime: the deferred release cannot run before the add below
        fire(&registry, "connected");
        registry
            .add_listener("connected", Listener::infallible(|_| {}), Default::default(), Default::default())
            .await
            .unwrap();
        registry.flush().await;

        assert_eq!(transport.action_names(), [SUBSCRIBE]);
        assert_eq!(registry.subscription("connected").unwrap().ref_count, 1);
    }

    #[tokio::test]
    async fn test_first_options_win() {
        let transport = MockTransport::new();
        let registry = registry(&transport);

        registry
            .add_listener(
                "connected",
                Listener::infallible(|_| {}),
                SubscriptionOptions::with_timestamp(),
                Default::default(),
            )
            .await
            .unwrap();
        registry
            .add_listener("connected", Listener::infallible(|_| {}), Default::default(), Default::default())
            .await
            .unwrap();

        assert_eq!(
            registry.subscription("connected").unwrap().options,
            SubscriptionOptions::with_timestamp()
        );
        assert_eq!(transport.count(SUBSCRIBE), 1);
    }

    #[tokio::test]
    async fn test_failed_subscribe_registers_nothing() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        transport.fail_next(SUBSCRIBE, "denied");

        let err = registry
            .add_listener("connected", Listener::infallible(|_| {}), Default::default(), Default::default())
            .await
            .unwrap_err();
        assert_matches!(err, HandleError::SubscriptionFailed { ref reason, .. } if reason == "denied");
        assert_eq!(registry.listener_count("connected"), 0);
        assert_eq!(registry.subscription("connected"), None);

        registry
            .add_listener("connected", Listener::infallible(|_| {}), Default::default(), Default::default())
            .await
            .unwrap();
        assert_eq!(transport.count(SUBSCRIBE), 2);
    }

    #[tokio::test]
    async fn test_remove_all_collects_failures() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        for event_type in ["a", "b", "c"] {
            registry
                .add_listener(event_type, Listener::infallible(|_| {}), Default::default(), Default::default())
                .await
                .unwrap();
        }
        transport.fail_next(UNSUBSCRIBE, "gone");

        let err = registry.remove_all_listeners(None).await.unwrap_err();
        assert_matches!(err, HandleError::TeardownFailed { ref failures } if failures.len() == 1);
        assert_eq!(transport.count(UNSUBSCRIBE), 3);
        assert_eq!(registry.subscription_count(), 0);
        assert!(registry.event_types().is_empty());
    }

    #[tokio::test]
    async fn test_listener_failures_do_not_stop_dispatch() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        let mut errors = registry.inner.errors.subscribe();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry
            .add_listener("t", Listener::new(|_| anyhow::bail!("nope")), Default::default(), Default::default())
            .await
            .unwrap();
        registry
            .add_listener("t", Listener::infallible(|_| panic!("kaboom")), Default::default(), Default::default())
            .await
            .unwrap();
        registry
            .add_listener("t", recorder(&log, "last"), Default::default(), Default::default())
            .await
            .unwrap();

        fire(&registry, "t");

        assert_eq!(log.lock().as_slice(), ["last"]);
        assert_matches!(errors.recv().await.unwrap(), HandleError::ListenerCallback { ref reason, .. } if reason == "nope");
        assert_matches!(errors.recv().await.unwrap(), HandleError::ListenerCallback { ref reason, .. } if reason == "listener panicked: kaboom");
    }

    #[tokio::test]
    async fn test_other_topics_and_types_are_ignored() {
        let transport = MockTransport::new();
        let registry = registry(&transport);
        let log = Arc::new(Mutex::new(Vec::new()));
        registry
            .add_listener("connected", recorder(&log, "hit"), Default::default(), Default::default())
            .await
            .unwrap();

        let other = Topic::new("frame", &Identity::new("app", "other"));
        registry.dispatch_raw_event(&other, "connected", &json!(null));
        fire(&registry, "disconnected");

        assert!(log.lock().is_empty());
    }
}
