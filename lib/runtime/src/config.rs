// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use derive_builder::Builder;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

pub mod environment_names;

use environment_names::logging as env_logging;
use environment_names::runtime as env_runtime;

/// Action used to open a remote event subscription
pub const DEFAULT_SUBSCRIBE_ACTION: &str = "subscribe-to-desktop-event";

/// Action used to close a remote event subscription
pub const DEFAULT_UNSUBSCRIBE_ACTION: &str = "unsubscribe-to-desktop-event";

/// Capacity of the broadcast channel carrying listener callback failures
pub const DEFAULT_LISTENER_ERROR_CAPACITY: usize = 256;

/// Bound of the channel between a raw event stream and the event router
pub const DEFAULT_RAW_EVENT_BUFFER: usize = 1024;

const RUNTIME_TOML_PATH: &str = "/opt/conduit/etc/runtime.toml";

/// Runtime configuration
/// Defines how handles talk to the transport and how events are fanned out
#[derive(Serialize, Deserialize, Validate, Debug, Builder, Clone, PartialEq)]
#[builder(build_fn(private, name = "build_internal"), derive(Debug, Serialize))]
pub struct RuntimeConfig {
    /// Transport action issued on the first listener for an event type
    /// Set this at runtime with environment variable CONDUIT_RUNTIME_SUBSCRIBE_ACTION
    #[validate(length(min = 1))]
    #[builder(default = "DEFAULT_SUBSCRIBE_ACTION.to_string()", setter(into))]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub subscribe_action: String,

    /// Transport action issued when the last listener for an event type goes away
    /// Set this at runtime with environment variable CONDUIT_RUNTIME_UNSUBSCRIBE_ACTION
    #[validate(length(min = 1))]
    #[builder(default = "DEFAULT_UNSUBSCRIBE_ACTION.to_string()", setter(into))]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub unsubscribe_action: String,

    /// Number of listener failures buffered for slow error-channel receivers
    /// Set this at runtime with environment variable CONDUIT_RUNTIME_LISTENER_ERROR_CAPACITY
    #[validate(range(min = 1))]
    #[builder(default = "DEFAULT_LISTENER_ERROR_CAPACITY")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub listener_error_capacity: usize,

    /// Number of raw events buffered between a transport stream and the router
    /// Set this at runtime with environment variable CONDUIT_RUNTIME_RAW_EVENT_BUFFER
    #[validate(range(min = 1))]
    #[builder(default = "DEFAULT_RAW_EVENT_BUFFER")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub raw_event_buffer: usize,
}

impl fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscribe_action={}, ", self.subscribe_action)?;
        write!(f, "unsubscribe_action={}, ", self.unsubscribe_action)?;
        write!(
            f,
            "listener_error_capacity={}, ",
            self.listener_error_capacity
        )?;
        write!(f, "raw_event_buffer={}", self.raw_event_buffer)
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    pub(crate) fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(RuntimeConfig::default()))
            .merge(Toml::file(RUNTIME_TOML_PATH))
            .merge(
                Env::prefixed(env_runtime::PREFIX).filter_map(|k| {
                    let full_key = format!("{}{}", env_runtime::PREFIX, k.as_str());
                    // filters out empty environment variables
                    match std::env::var(&full_key) {
                        Ok(v) if !v.is_empty() => Some(k.into()),
                        _ => None,
                    }
                }),
            )
    }

    /// Load the runtime configuration from the environment and configuration files
    /// Configuration is prioritized in the following order, where the last has the lowest priority:
    /// 1. Environment variables prefixed with `CONDUIT_RUNTIME_`
    /// 2. /opt/conduit/etc/runtime.toml
    /// 3. Built-in defaults
    pub fn from_settings() -> Result<RuntimeConfig> {
        let config: RuntimeConfig = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            subscribe_action: DEFAULT_SUBSCRIBE_ACTION.to_string(),
            unsubscribe_action: DEFAULT_UNSUBSCRIBE_ACTION.to_string(),
            listener_error_capacity: DEFAULT_LISTENER_ERROR_CAPACITY,
            raw_event_buffer: DEFAULT_RAW_EVENT_BUFFER,
        }
    }
}

impl RuntimeConfigBuilder {
    /// Build and validate the runtime configuration
    pub fn build(&self) -> Result<RuntimeConfig> {
        let config = self.build_internal()?;
        config.validate()?;
        Ok(config)
    }
}

/// Check if a string is truthy
/// This will be used to evaluate environment variables or any other subjective
/// configuration parameters that can be set by the user that should be evaluated
/// as a boolean value.
///
/// Truthy values: "1", "true", "on", "yes" (case-insensitive)
pub fn is_truthy(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

/// Opposite of [`is_truthy`]: "0", "false", "off", "no" (case-insensitive)
pub fn is_falsey(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "0" | "false" | "off" | "no")
}

/// Parse a boolean strictly; anything that is neither truthy nor falsey is an error.
pub fn parse_bool(val: &str) -> Result<bool> {
    if is_truthy(val) {
        Ok(true)
    } else if is_falsey(val) {
        Ok(false)
    } else {
        anyhow::bail!(
            "Invalid boolean value: '{}'. Expected one of: true/false, 1/0, on/off, yes/no",
            val
        )
    }
}

/// Check if an environment variable is truthy. Unset or unparsable counts as `false`.
pub fn env_is_truthy(env: &str) -> bool {
    match std::env::var(env) {
        Ok(val) => is_truthy(val.as_str()),
        Err(_) => false,
    }
}

/// `Ok(None)` when unset, `Err` when set to something that is not a boolean.
pub fn env_parse_bool(env: &str) -> Result<Option<bool>> {
    match std::env::var(env) {
        Ok(val) => parse_bool(&val).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => anyhow::bail!("Failed to read environment variable {}: {}", env, e),
    }
}

/// Check whether JSONL logging is enabled
/// Set the `CONDUIT_LOGGING_JSONL` environment variable to a truthy value
pub fn jsonl_logging_enabled() -> bool {
    env_is_truthy(env_logging::CONDUIT_LOGGING_JSONL)
}

/// Check whether ANSI terminal colors should be disabled in logs
/// Set the `CONDUIT_SDK_DISABLE_ANSI_LOGGING` environment variable to a truthy value
pub fn disable_ansi_logging() -> bool {
    env_is_truthy(env_logging::CONDUIT_SDK_DISABLE_ANSI_LOGGING)
}

/// Check whether to use local timezone for logging timestamps (default is UTC)
/// Set the `CONDUIT_LOG_USE_LOCAL_TZ` environment variable to a truthy value
pub fn use_local_timezone() -> bool {
    env_is_truthy(env_logging::CONDUIT_LOG_USE_LOCAL_TZ)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_runtime_config_defaults() {
        temp_env::with_vars(
            [
                (env_runtime::CONDUIT_RUNTIME_SUBSCRIBE_ACTION, None::<&str>),
                (env_runtime::CONDUIT_RUNTIME_UNSUBSCRIBE_ACTION, None),
                (env_runtime::CONDUIT_RUNTIME_LISTENER_ERROR_CAPACITY, None),
                (env_runtime::CONDUIT_RUNTIME_RAW_EVENT_BUFFER, None),
            ],
            || {
                let config = RuntimeConfig::from_settings().unwrap();
                assert_eq!(config, RuntimeConfig::default());
                assert_eq!(config.subscribe_action, "subscribe-to-desktop-event");
                assert_eq!(config.unsubscribe_action, "unsubscribe-to-desktop-event");
            },
        );
    }

    #[test]
    fn test_runtime_config_env_overrides() {
        temp_env::with_vars(
            [
                (
                    env_runtime::CONDUIT_RUNTIME_SUBSCRIBE_ACTION,
                    Some("subscribe-v2"),
                ),
                (env_runtime::CONDUIT_RUNTIME_LISTENER_ERROR_CAPACITY, Some("8")),
                // empty values fall back to the defaults
                (env_runtime::CONDUIT_RUNTIME_RAW_EVENT_BUFFER, Some("")),
            ],
            || {
                let config = RuntimeConfig::from_settings().unwrap();
                assert_eq!(config.subscribe_action, "subscribe-v2");
                assert_eq!(config.listener_error_capacity, 8);
                assert_eq!(config.raw_event_buffer, DEFAULT_RAW_EVENT_BUFFER);
            },
        );
    }

    #[test]
    fn test_runtime_config_rejects_zero_capacity() {
        temp_env::with_vars(
            [(
                env_runtime::CONDUIT_RUNTIME_LISTENER_ERROR_CAPACITY,
                Some("0"),
            )],
            || {
                assert!(RuntimeConfig::from_settings().is_err());
            },
        );
    }

    #[test]
    fn test_builder_validates() {
        let config = RuntimeConfig::builder()
            .unsubscribe_action("release")
            .build()
            .unwrap();
        assert_eq!(config.unsubscribe_action, "release");
        assert_eq!(config.subscribe_action, DEFAULT_SUBSCRIBE_ACTION);

        assert!(RuntimeConfig::builder().subscribe_action("").build().is_err());
        assert!(RuntimeConfig::builder().raw_event_buffer(0).build().is_err());
    }

    #[rstest]
    #[case("1", Some(true))]
    #[case("YES", Some(true))]
    #[case("on", Some(true))]
    #[case("0", Some(false))]
    #[case("Off", Some(false))]
    #[case("no", Some(false))]
    #[case("maybe", None)]
    #[case("", None)]
    fn test_parse_bool(#[case] input: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_bool(input).ok(), expected);
        assert_eq!(is_truthy(input), expected == Some(true));
        assert_eq!(is_falsey(input), expected == Some(false));
    }

    #[test]
    fn test_env_parse_bool() {
        temp_env::with_var("CONDUIT_TEST_FLAG", None::<&str>, || {
            assert_eq!(env_parse_bool("CONDUIT_TEST_FLAG").unwrap(), None);
            assert!(!env_is_truthy("CONDUIT_TEST_FLAG"));
        });
        temp_env::with_var("CONDUIT_TEST_FLAG", Some("true"), || {
            assert_eq!(env_parse_bool("CONDUIT_TEST_FLAG").unwrap(), Some(true));
            assert!(env_is_truthy("CONDUIT_TEST_FLAG"));
        });
        temp_env::with_var("CONDUIT_TEST_FLAG", Some("sometimes"), || {
            assert!(env_parse_bool("CONDUIT_TEST_FLAG").is_err());
        });
    }
}
