use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::constants::{CHECKPOINT_ORDER_HINT, MAX_DRAIN_STEPS, MAX_INLINE_DEPTH};

/// Engine limits. Every field has a default, so an empty TOML file or an
/// empty environment yields [`ProcessorConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Nesting limit for inline adapter dispatch.
    pub max_inline_depth: usize,
    /// Tasks a single drain may execute before the batch is aborted.
    pub max_drain_steps: usize,
    /// Registration priority of the checkpoint processor.
    pub checkpoint_order_hint: i64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_inline_depth: MAX_INLINE_DEPTH,
            max_drain_steps: MAX_DRAIN_STEPS,
            checkpoint_order_hint: CHECKPOINT_ORDER_HINT,
        }
    }
}

impl ProcessorConfig {
    /// Load overrides from `BLUEDOC_*` environment variables (after `.env`).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_inline_depth: parse_var(&lookup, "BLUEDOC_MAX_INLINE_DEPTH")?
                .unwrap_or(defaults.max_inline_depth),
            max_drain_steps: parse_var(&lookup, "BLUEDOC_MAX_DRAIN_STEPS")?
                .unwrap_or(defaults.max_drain_steps),
            checkpoint_order_hint: parse_var(&lookup, "BLUEDOC_CHECKPOINT_ORDER")?
                .unwrap_or(defaults.checkpoint_order_hint),
        })
    }

    pub fn log_summary(&self) {
        info!(
            max_inline_depth = self.max_inline_depth,
            max_drain_steps = self.max_drain_steps,
            checkpoint_order_hint = self.checkpoint_order_hint,
            "Processor config"
        );
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{key} must be a number, got '{raw}'"))
        })
        .transpose()
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<ProcessorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: ProcessorConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
