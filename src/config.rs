//! Service configuration.
//!
//! Read from the process environment (after `.env` is loaded by `main`).
//! Every setting has a default; malformed values are errors.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::schema::{DEFAULT_MAX_DEPTH, MIN_MAX_DEPTH};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_BODY_MB: usize = 100;

/// Runtime settings for the conversion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to (`REFTREE_BIND_ADDR`).
    pub bind_addr: String,
    /// Run the validator on every converted output (`REFTREE_VALIDATE_OUTPUT`).
    pub validate_output: bool,
    /// Request body limit in bytes (`REFTREE_MAX_BODY_MB`, megabytes).
    pub max_body_bytes: usize,
    /// Deepest nesting a converted tree may reach (`REFTREE_MAX_DEPTH`).
    pub max_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            validate_output: true,
            max_body_bytes: DEFAULT_MAX_BODY_MB * 1024 * 1024,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("REFTREE_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(raw) = lookup("REFTREE_VALIDATE_OUTPUT") {
            config.validate_output = parse_bool(&raw)
                .with_context(|| format!("REFTREE_VALIDATE_OUTPUT is not a boolean: {:?}", raw))?;
        }

        if let Some(raw) = lookup("REFTREE_MAX_BODY_MB") {
            let mb: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("REFTREE_MAX_BODY_MB is not a number: {:?}", raw))?;
            config.max_body_bytes = mb * 1024 * 1024;
        }

        if let Some(raw) = lookup("REFTREE_MAX_DEPTH") {
            let depth: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("REFTREE_MAX_DEPTH is not a number: {:?}", raw))?;
            if depth < MIN_MAX_DEPTH {
                anyhow::bail!("REFTREE_MAX_DEPTH must be at least {}, got {}", MIN_MAX_DEPTH, depth);
            }
            config.max_depth = depth;
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
