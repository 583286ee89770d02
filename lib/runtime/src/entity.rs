// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Remote entities and their handles.
//!
//! An entity kind fixes the first topic segment and the set of events its handles accept. Event
//! enums are converted to the registry's string keys at this boundary only.

use std::fmt;

mod external;
mod frame;
mod handle;
mod window;

pub use external::{ExternalConnection, ExternalConnectionEvent};
pub use frame::{Frame, FrameEvent, FrameHandle, FrameInfo, Frames};
pub use handle::EntityHandle;
pub use window::{Window, WindowEvent, WindowHandle};

/// Event names understood by one entity kind.
///
/// Implemented for every `strum::IntoStaticStr` enum.
pub trait EventKind: Copy + fmt::Debug + Send + Sync + 'static {
    fn event_type(self) -> &'static str;
}

impl<T> EventKind for T
where
    T: Copy + fmt::Debug + Send + Sync + 'static + Into<&'static str>,
{
    fn event_type(self) -> &'static str {
        self.into()
    }
}

pub trait EntityKind: Send + Sync + 'static {
    /// First segment of every topic for this kind
    const KIND: &'static str;

    type Event: EventKind;
}
