// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Environment variable name constants for centralized management across the codebase
//!
//! ## Organization
//!
//! Environment variables are organized by functional area:
//! - **Logging**: Log level, configuration file and output format
//! - **Runtime**: Subscription action names and event fan-out buffers

/// Logging and tracing environment variables
pub mod logging {
    /// Log level (e.g., "debug", "info", "warn", "error")
    pub const CONDUIT_LOG: &str = "CONDUIT_LOG";

    /// Path to logging configuration file
    pub const CONDUIT_LOGGING_CONFIG_PATH: &str = "CONDUIT_LOGGING_CONFIG_PATH";

    /// Enable JSONL logging format
    pub const CONDUIT_LOGGING_JSONL: &str = "CONDUIT_LOGGING_JSONL";

    /// Disable ANSI terminal colors in logs
    pub const CONDUIT_SDK_DISABLE_ANSI_LOGGING: &str = "CONDUIT_SDK_DISABLE_ANSI_LOGGING";

    /// Use local timezone for logging timestamps (default is UTC)
    pub const CONDUIT_LOG_USE_LOCAL_TZ: &str = "CONDUIT_LOG_USE_LOCAL_TZ";
}

/// Runtime configuration environment variables
///
/// These map one-to-one onto the fields of [`crate::RuntimeConfig`]
pub mod runtime {
    /// Prefix shared by every runtime variable; figment strips it to find the field name
    pub const PREFIX: &str = "CONDUIT_RUNTIME_";

    /// Action name used to open a remote event subscription
    pub const CONDUIT_RUNTIME_SUBSCRIBE_ACTION: &str = "CONDUIT_RUNTIME_SUBSCRIBE_ACTION";

    /// Action name used to close a remote event subscription
    pub const CONDUIT_RUNTIME_UNSUBSCRIBE_ACTION: &str = "CONDUIT_RUNTIME_UNSUBSCRIBE_ACTION";

    /// Capacity of the listener error broadcast channel
    pub const CONDUIT_RUNTIME_LISTENER_ERROR_CAPACITY: &str =
        "CONDUIT_RUNTIME_LISTENER_ERROR_CAPACITY";

    /// Bound of the raw event channel feeding the router
    pub const CONDUIT_RUNTIME_RAW_EVENT_BUFFER: &str = "CONDUIT_RUNTIME_RAW_EVENT_BUFFER";
}
