//! Observability configuration parsing from environment variables.
//!
//! This module handles loading the log verbosity and output format. The
//! resulting struct is handed to the logging initializer; nothing here mutates
//! process-wide state.

use super::parse_or;
use anyhow::Result;
use std::str::FromStr;

/// Output layout of the diagnostic log written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => anyhow::bail!("Invalid LOG_FORMAT: {}. Must be 'pretty' or 'compact'", s),
        }
    }
}

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            ansi: false,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let format = match lookup("LOG_FORMAT") {
            Some(raw) => LogFormat::from_str(raw.trim())?,
            None => defaults.format,
        };

        Ok(Self {
            level: lookup("LOG_LEVEL").unwrap_or(defaults.level),
            format,
            ansi: parse_or(lookup, "LOG_ANSI", defaults.ansi)?,
        })
    }
}
