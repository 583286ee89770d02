// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Frames: the renderer contexts (main documents and iframes) hosted by a window.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::{EntityHandle, EntityKind, Window};
use crate::connection::Connection;
use crate::error::HandleError;
use crate::identity::Identity;

const GET_FRAME_INFO: &str = "get-frame-info";
const GET_PARENT_WINDOW: &str = "get-parent-window";

#[derive(Debug, Clone, Copy)]
pub struct Frame;

impl EntityKind for Frame {
    const KIND: &'static str = "frame";
    type Event = FrameEvent;
}

pub type FrameHandle = EntityHandle<Frame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum FrameEvent {
    Connected,
    Disconnected,
}

/// Answer to `get-frame-info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    uuid: String,
    name: String,
    /// `"window"` for a main frame, `"iframe"` otherwise
    entity_type: String,
    parent: Identity,
}

/// Entry point for frame handles on one connection.
#[derive(Debug, Clone)]
pub struct Frames {
    connection: Connection,
}

impl Frames {
    pub(crate) fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Same as [`Frames::wrap_sync`]; construction never awaits.
    pub async fn wrap(&self, identity: Identity) -> Result<FrameHandle, HandleError> {
        self.wrap_sync(identity)
    }

    /// # Errors
    ///
    /// [`HandleError::InvalidIdentity`] before anything reaches the transport.
    pub fn wrap_sync(&self, identity: Identity) -> Result<FrameHandle, HandleError> {
        self.connection.wrap(identity)
    }

    pub async fn get_current(&self) -> FrameHandle {
        self.get_current_sync()
    }

    /// Handle for the frame this connection belongs to
    pub fn get_current_sync(&self) -> FrameHandle {
        self.connection.current()
    }
}

impl EntityHandle<Frame> {
    pub async fn get_info(&self) -> Result<FrameInfo, HandleError> {
        self.invoke_as(GET_FRAME_INFO, None).await
    }

    /// Handle for the window hosting this frame.
    pub async fn get_parent_window(&self) -> Result<EntityHandle<Window>, HandleError> {
        let parent: Identity = self.invoke_as(GET_PARENT_WINDOW, None).await?;
        // supplied by the runtime, not by the caller
        Ok(self.connection().wrap_unchecked(parent))
    }
}
