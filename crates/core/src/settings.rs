// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Editor-host configuration with defaults and boundary clamping.
//!
//! Settings are read from `<workspace>/.mb/config.toml`; a missing file
//! yields all defaults. Values outside their architectural bounds are
//! clamped (never rejected) with a warning so a bad config cannot keep the
//! bridge from starting.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// How the bridge worker is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BridgeMode {
    /// Long-lived daemon, supervised with lock/idle/recovery handling.
    #[default]
    Daemon,
    /// One worker per call; no lock, no idle timer.
    Spawn,
}

/// Minimum level forwarded to log sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Architectural caps. Config values above these are clamped, not honored.
pub const MAX_CONCURRENT_CAP: usize = 5;
pub const RATE_LIMIT_CAP: u32 = 30;
pub const QUEUE_SIZE: usize = 5;

const IDLE_TIMEOUT_RANGE: (u64, u64) = (1, 60);
const HALF_LIFE_RANGE: (f64, f64) = (0.5, 90.0);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch; when false every bridge surface reports DAEMON_DISABLED.
    pub memory_enabled: bool,
    pub bridge_mode: BridgeMode,
    pub daemon_idle_timeout_minutes: u64,
    pub max_context_results: usize,
    pub max_context_tokens: u32,
    pub search_top_k: u32,
    pub ranking_half_life_days: f64,
    pub wide_search_top_k: u32,
    pub triplet_distance_penalty: f64,
    pub log_level: LogLevel,
    pub debug_logging: bool,
    /// Explicit interpreter override; takes precedence over the managed venv.
    pub python_path: Option<PathBuf>,
    pub max_concurrent_requests: usize,
    pub rate_limit_per_minute: u32,
    pub max_queue_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            bridge_mode: BridgeMode::Daemon,
            daemon_idle_timeout_minutes: 30,
            max_context_results: 3,
            max_context_tokens: 32_000,
            search_top_k: 10,
            ranking_half_life_days: 7.0,
            wide_search_top_k: 150,
            triplet_distance_penalty: 3.0,
            log_level: LogLevel::Info,
            debug_logging: false,
            python_path: None,
            max_concurrent_requests: 2,
            rate_limit_per_minute: 10,
            max_queue_size: QUEUE_SIZE,
        }
    }
}

/// Settings load errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config at {}: {}", .0.display(), .1)]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse config at {}: {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),
}

impl Settings {
    /// Load settings from a TOML file, clamped. A missing file is not an
    /// error; it yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Read(path.to_path_buf(), e))?;
        let settings: Settings =
            toml::from_str(&content).map_err(|e| SettingsError::Parse(path.to_path_buf(), e))?;
        Ok(settings.clamped())
    }

    /// Apply architectural bounds. One warning per out-of-range field.
    pub fn clamped(mut self) -> Self {
        let (idle_min, idle_max) = IDLE_TIMEOUT_RANGE;
        if self.daemon_idle_timeout_minutes < idle_min || self.daemon_idle_timeout_minutes > idle_max
        {
            let clamped = self.daemon_idle_timeout_minutes.clamp(idle_min, idle_max);
            warn!(
                configured = self.daemon_idle_timeout_minutes,
                clamped, "daemon_idle_timeout_minutes out of range, clamping"
            );
            self.daemon_idle_timeout_minutes = clamped;
        }

        let (hl_min, hl_max) = HALF_LIFE_RANGE;
        if !(hl_min..=hl_max).contains(&self.ranking_half_life_days) {
            let clamped = self.ranking_half_life_days.clamp(hl_min, hl_max);
            warn!(
                configured = self.ranking_half_life_days,
                clamped, "ranking_half_life_days out of range, clamping"
            );
            self.ranking_half_life_days = clamped;
        }

        if self.max_concurrent_requests > MAX_CONCURRENT_CAP {
            warn!(
                configured = self.max_concurrent_requests,
                cap = MAX_CONCURRENT_CAP,
                "max_concurrent_requests above architectural cap, clamping"
            );
            self.max_concurrent_requests = MAX_CONCURRENT_CAP;
        }
        if self.max_concurrent_requests == 0 {
            self.max_concurrent_requests = 1;
        }

        if self.rate_limit_per_minute > RATE_LIMIT_CAP {
            warn!(
                configured = self.rate_limit_per_minute,
                cap = RATE_LIMIT_CAP,
                "rate_limit_per_minute above architectural cap, clamping"
            );
            self.rate_limit_per_minute = RATE_LIMIT_CAP;
        }
        if self.rate_limit_per_minute == 0 {
            self.rate_limit_per_minute = 1;
        }

        if self.max_queue_size != QUEUE_SIZE {
            warn!(
                configured = self.max_queue_size,
                fixed = QUEUE_SIZE,
                "max_queue_size is fixed, overriding"
            );
            self.max_queue_size = QUEUE_SIZE;
        }

        if self.max_context_results == 0 {
            self.max_context_results = 1;
        }
        if self.max_context_tokens == 0 {
            self.max_context_tokens = 1;
        }
        if self.search_top_k == 0 {
            self.search_top_k = 1;
        }
        if self.wide_search_top_k == 0 {
            self.wide_search_top_k = 1;
        }
        if self.triplet_distance_penalty < 0.0 {
            self.triplet_distance_penalty = 0.0;
        }

        self
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.daemon_idle_timeout_minutes * 60)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
