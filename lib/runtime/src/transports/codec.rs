// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Codec for raw event frames on byte-oriented push channels.
//!
//! A frame is a JSON object `{ "topic": [...], "type": "...", "payload": ... }`.

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::StreamExt;

use super::{RawEventStream, WireStream};
use crate::protocols::RawEvent;

#[derive(Debug, Clone, Copy, Default)]
pub struct RawEventCodec;

impl RawEventCodec {
    pub fn encode(&self, event: &RawEvent) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(event)?))
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<RawEvent> {
        serde_json::from_slice(bytes).with_context(|| {
            format!(
                "Failed to decode raw event frame: {}",
                String::from_utf8_lossy(bytes)
            )
        })
    }

    /// Codec name for debugging
    pub fn name(&self) -> &'static str {
        "json"
    }
}

/// Decode every frame of `stream`. Frames that fail to decode become `Err` items; the stream
/// itself keeps going.
pub fn decode_wire_stream(stream: WireStream) -> RawEventStream {
    let codec = RawEventCodec;
    Box::pin(stream.map(move |frame| frame.and_then(|bytes| codec.decode(&bytes))))
}
