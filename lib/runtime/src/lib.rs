// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Conduit
//!
//! Client runtime for addressing remote entities (windows, frames, external connections) of a
//! multi-process application host. A [`Connection`] hands out [`EntityHandle`]s; a handle turns
//! method calls into request/response actions over a [`transports::Transport`] and local event
//! listeners into deduplicated remote subscriptions.

pub use anyhow::{
    Context as ErrorContext, Error, Ok as OK, Result, anyhow as error, bail as raise,
};

pub mod config;
pub use config::RuntimeConfig;

pub mod connection;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod identity;
pub mod logging;
pub mod protocols;
pub mod registry;
pub mod transports;

pub use connection::{Connection, ConnectionConfig, ConnectionConfigBuilder};
pub use dispatcher::ActionDispatcher;
pub use entity::{
    EntityHandle, EntityKind, EventKind, ExternalConnection, ExternalConnectionEvent, Frame,
    FrameEvent, FrameHandle, FrameInfo, Frames, Window, WindowEvent, WindowHandle,
};
pub use error::HandleError;
pub use identity::{Identity, IdentityValidator, Topic, validate_identity};
pub use protocols::{EventPayload, RawEvent, SubscriptionOptions};
pub use registry::{EventRegistry, Listener, ListenerErrors, ListenerFlags, SubscriptionEntry};
pub use tokio_util::sync::CancellationToken;
