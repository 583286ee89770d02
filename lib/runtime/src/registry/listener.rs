// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::HandleError;
use crate::protocols::{EventPayload, SubscriptionOptions};

type Callback = dyn Fn(&EventPayload) -> anyhow::Result<()> + Send + Sync;

/// A registered callback.
///
/// Two `Listener`s are equal only if one is a clone of the other, so keep a clone around to
/// remove it later.
#[derive(Clone)]
pub struct Listener {
    callback: Arc<Callback>,
}

impl Listener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&EventPayload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Wrap a callback that cannot fail
    pub fn infallible<F>(callback: F) -> Self
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        Self::new(move |payload| {
            callback(payload);
            Ok(())
        })
    }

    pub(crate) fn call(&self, payload: &EventPayload) -> anyhow::Result<()> {
        (self.callback)(payload)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.callback).cast::<()>())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerFlags {
    /// Remove the listener right before its first invocation
    pub once: bool,
    /// Insert ahead of every current listener instead of appending
    pub prepend: bool,
}

impl ListenerFlags {
    pub fn once() -> Self {
        Self {
            once: true,
            prepend: false,
        }
    }

    pub fn prepend() -> Self {
        Self {
            once: false,
            prepend: true,
        }
    }

    pub fn prepend_once() -> Self {
        Self {
            once: true,
            prepend: true,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ListenerRecord {
    pub(crate) listener: Listener,
    pub(crate) options: SubscriptionOptions,
    pub(crate) flags: ListenerFlags,
}

/// Process-wide channel for failures raised by listener callbacks.
///
/// Failures are also logged at `error`; the channel only matters to callers that want to react
/// to them. Slow receivers lag and lose the oldest entries.
#[derive(Clone)]
pub struct ListenerErrors {
    tx: broadcast::Sender<HandleError>,
}

impl fmt::Debug for ListenerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerErrors")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

impl ListenerErrors {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HandleError> {
        self.tx.subscribe()
    }

    pub(crate) fn report(&self, err: HandleError) {
        tracing::error!(error = %err, "listener callback failed");
        // no receivers is fine
        let _ = self.tx.send(err);
    }
}

pub(crate) fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("listener panicked: {message}")
    } else {
        "listener panicked".to_string()
    }
}
