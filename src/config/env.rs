//! Environment loading for `RenderConfig`

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use super::builder::RenderConfigBuilder;
use super::types::{LogFormat, RenderConfig};

pub const ENV_RENDER_TIMEOUT_MS: &str = "RENDER_TIMEOUT_MS";
pub const ENV_POOL_SIZE: &str = "RENDER_POOL_SIZE";
pub const ENV_VIEWPORT_WIDTH: &str = "RENDER_VIEWPORT_WIDTH";
pub const ENV_VIEWPORT_HEIGHT: &str = "RENDER_VIEWPORT_HEIGHT";
pub const ENV_QUEUE_TIMEOUT_MS: &str = "RENDER_QUEUE_TIMEOUT_MS";
pub const ENV_BIND_ADDR: &str = "RENDER_BIND_ADDR";
pub const ENV_HEADLESS: &str = "RENDER_HEADLESS";
pub const ENV_MAX_BODY_BYTES: &str = "RENDER_MAX_BODY_BYTES";
pub const ENV_LOG_FORMAT: &str = "RENDER_LOG_FORMAT";
pub const ENV_CHROMIUM_PATH: &str = "CHROMIUM_PATH";

impl RenderConfig {
    /// Load from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a value does not parse, or when
    /// the resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset or blank keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = RenderConfigBuilder::default();

        if let Some(ms) = parse::<u64>(ENV_RENDER_TIMEOUT_MS, get(ENV_RENDER_TIMEOUT_MS))? {
            builder = builder.render_timeout(Duration::from_millis(ms));
        }
        if let Some(size) = parse::<usize>(ENV_POOL_SIZE, get(ENV_POOL_SIZE))? {
            builder = builder.pool_size(size);
        }
        let width = parse::<u32>(ENV_VIEWPORT_WIDTH, get(ENV_VIEWPORT_WIDTH))?;
        let height = parse::<u32>(ENV_VIEWPORT_HEIGHT, get(ENV_VIEWPORT_HEIGHT))?;
        let default_viewport = builder.viewport;
        builder = builder.viewport(
            width.unwrap_or(default_viewport.width),
            height.unwrap_or(default_viewport.height),
        );
        if let Some(ms) = parse::<u64>(ENV_QUEUE_TIMEOUT_MS, get(ENV_QUEUE_TIMEOUT_MS))? {
            builder = builder.queue_timeout(Some(Duration::from_millis(ms)));
        }
        if let Some(addr) = parse::<SocketAddr>(ENV_BIND_ADDR, get(ENV_BIND_ADDR))? {
            builder = builder.bind_addr(addr);
        }
        if let Some(raw) = get(ENV_HEADLESS) {
            builder = builder.headless(parse_bool(ENV_HEADLESS, &raw)?);
        }
        if let Some(bytes) = parse::<usize>(ENV_MAX_BODY_BYTES, get(ENV_MAX_BODY_BYTES))? {
            builder = builder.max_body_bytes(bytes);
        }
        if let Some(format) = parse::<LogFormat>(ENV_LOG_FORMAT, get(ENV_LOG_FORMAT))? {
            builder = builder.log_format(format);
        }
        if let Some(path) = get(ENV_CHROMIUM_PATH) {
            builder = builder.chromium_path(path);
        }

        builder.build().context("Invalid render configuration")
    }
}

fn parse<T>(key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}={value:?} is invalid: {e}"))
    })
    .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("{key}={other:?} is not a boolean")),
    }
}
