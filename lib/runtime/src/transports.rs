// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Transports module hosts the seam between handles and whatever carries actions and
//! raw events between processes.
//!
//! The transport itself (handshake, reconnection, wire encoding) lives outside this crate; this
//! module defines what the runtime needs from it and how pushed events are routed to registries.

pub mod codec;
pub mod event_router;
pub mod mock;
mod traits;

pub use codec::{RawEventCodec, decode_wire_stream};
pub use event_router::{EventRouter, RawEventSink};
pub use traits::{RawEventStream, Transport, WireStream};
