//! Configuration settings for the render manager.
//!
//! Configuration can be constructed programmatically, loaded from environment
//! variables, or parsed from JSON.

use anyhow::{Context as _, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Runtime configuration for a [`crate::RenderManager`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Whether contract violations (wrong manager, double release, unbalanced
    /// layers) trip a debug assertion after being logged.
    pub assert_on_misuse: bool,
    /// Whether resources still alive when the manager is dropped are logged as errors.
    pub report_leaks: bool,
    /// Initial capacity of the callback texture cache.
    pub callback_texture_reserve: usize,
}

impl RenderConfig {
    /// Construct a new `RenderConfig` with explicit values.
    #[inline]
    #[must_use]
    pub const fn new(
        assert_on_misuse: bool,
        report_leaks: bool,
        callback_texture_reserve: usize,
    ) -> Self {
        Self {
            assert_on_misuse,
            report_leaks,
            callback_texture_reserve,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `RENDERER_ASSERT_ON_MISUSE`: "1" or "0" (default: on in debug builds)
    /// - `RENDERER_REPORT_LEAKS`: "1" or "0" (default: "1")
    /// - `RENDERER_CALLBACK_TEXTURE_RESERVE`: initial callback texture capacity (default: 30)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| match env::var(name).ok().as_deref() {
            Some("1") => true,
            Some("0") => false,
            _ => default,
        };
        let callback_texture_reserve = env::var("RENDERER_CALLBACK_TEXTURE_RESERVE")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(defaults.callback_texture_reserve);
        Self {
            assert_on_misuse: flag("RENDERER_ASSERT_ON_MISUSE", defaults.assert_on_misuse),
            report_leaks: flag("RENDERER_REPORT_LEAKS", defaults.report_leaks),
            callback_texture_reserve,
        }
    }

    /// Parse configuration from JSON; missing fields keep their defaults.
    ///
    /// # Errors
    /// Returns an error if `json` is not a valid configuration object.
    pub fn from_json(json: &str) -> AnyResult<Self> {
        serde_json::from_str(json).context("invalid render manager configuration")
    }
}

impl Default for RenderConfig {
    #[inline]
    fn default() -> Self {
        Self::new(cfg!(debug_assertions), true, 30)
    }
}
