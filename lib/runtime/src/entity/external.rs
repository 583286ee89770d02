// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::EntityKind;

/// A process attached to the runtime from outside, addressed like any other entity.
#[derive(Debug, Clone, Copy)]
pub struct ExternalConnection;

impl EntityKind for ExternalConnection {
    const KIND: &'static str = "external-application";
    type Event = ExternalConnectionEvent;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ExternalConnectionEvent {
    Connected,
    Disconnected,
}
