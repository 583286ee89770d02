// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Fan-in of pushed raw events to the registries that observe their topic.
//!
//! Registries are held weakly: dropping a handle never requires unregistering from the router,
//! dead entries are pruned the next time their topic sees traffic.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::RawEventStream;
use crate::identity::Topic;
use crate::protocols::{EventPayload, RawEvent};

/// Receiver side of the push channel, implemented by subscription registries.
pub trait RawEventSink: Send + Sync {
    fn topic(&self) -> &Topic;

    /// Must not block; called synchronously from the delivering task.
    fn dispatch_raw_event(&self, topic: &Topic, event_type: &str, payload: &EventPayload);
}

type SinkMap = HashMap<Topic, Vec<Weak<dyn RawEventSink>>>;

#[derive(Clone, Default)]
pub struct EventRouter {
    sinks: Arc<RwLock<SinkMap>>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("topics", &self.sinks.read().len())
            .finish()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Weak<dyn RawEventSink>) {
        let Some(topic) = sink.upgrade().map(|s| s.topic().clone()) else {
            return;
        };
        tracing::trace!(%topic, "registering raw event sink");
        self.sinks.write().entry(topic).or_default().push(sink);
    }

    /// Number of live sinks observing `topic`
    pub fn sink_count(&self, topic: &Topic) -> usize {
        self.sinks
            .read()
            .get(topic)
            .map(|sinks| sinks.iter().filter(|s| s.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Deliver `event` to every live sink for its topic, in registration order.
    ///
    /// Returns the number of sinks reached. The map lock is released before any sink runs, so
    /// listeners may freely create new handles.
    pub fn deliver(&self, event: &RawEvent) -> usize {
        let (live, registered) = {
            let sinks = self.sinks.read();
            let Some(entries) = sinks.get(&event.topic) else {
                tracing::trace!(topic = %event.topic, event_type = %event.event_type, "no sink for raw event");
                return 0;
            };
            let live: Vec<Arc<dyn RawEventSink>> =
                entries.iter().filter_map(Weak::upgrade).collect();
            (live, entries.len())
        };

        if live.len() < registered {
            self.prune(&event.topic);
        }

        for sink in &live {
            sink.dispatch_raw_event(&event.topic, &event.event_type, &event.payload);
        }
        live.len()
    }

    fn prune(&self, topic: &Topic) {
        let mut sinks = self.sinks.write();
        if let Some(entries) = sinks.get_mut(topic) {
            entries.retain(|s| s.strong_count() > 0);
            if entries.is_empty() {
                sinks.remove(topic);
            }
        }
    }

    /// Drain `stream` into the router until it ends or `cancel_token` fires.
    ///
    /// Events are delivered in stream order. Items that failed to decode are logged and
    /// skipped.
    pub fn pump(&self, mut stream: RawEventStream, cancel_token: CancellationToken) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            tracing::debug!("raw event pump started");
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("raw event pump cancelled");
                        break;
                    }

                    event = stream.next() => {
                        match event {
                            Some(Ok(event)) => {
                                router.deliver(&event);
                            }
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "dropping undecodable raw event");
                            }
                            None => {
                                tracing::debug!("raw event stream ended");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}
