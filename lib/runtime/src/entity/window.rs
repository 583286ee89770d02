// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::{EntityHandle, EntityKind};

/// Top-level window owned by an application
#[derive(Debug, Clone, Copy)]
pub struct Window;

impl EntityKind for Window {
    const KIND: &'static str = "window";
    type Event = WindowEvent;
}

pub type WindowHandle = EntityHandle<Window>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum WindowEvent {
    Shown,
    Hidden,
    Closed,
    #[strum(serialize = "focused")]
    FocusGained,
    #[strum(serialize = "blurred")]
    FocusLost,
}
