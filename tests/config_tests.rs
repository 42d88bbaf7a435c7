//! Tests for `RenderConfig`: defaults, environment overrides, validation

use kodegen_tools_htmlrender::config::env::{
    ENV_BIND_ADDR, ENV_CHROMIUM_PATH, ENV_HEADLESS, ENV_LOG_FORMAT, ENV_POOL_SIZE,
    ENV_QUEUE_TIMEOUT_MS, ENV_RENDER_TIMEOUT_MS, ENV_VIEWPORT_WIDTH,
};
use kodegen_tools_htmlrender::{LogFormat, RenderConfig, Viewport};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

fn from_vars(vars: &[(&str, &str)]) -> anyhow::Result<RenderConfig> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    RenderConfig::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn test_defaults_when_nothing_is_set() {
    let config = from_vars(&[]).unwrap();

    assert_eq!(config.render_timeout(), Duration::from_secs(60));
    assert_eq!(config.pool_size(), 4);
    assert_eq!(config.viewport(), Viewport::new(1920, 1080));
    assert_eq!(config.queue_timeout(), None);
    assert_eq!(
        config.bind_addr(),
        "0.0.0.0:3033".parse::<SocketAddr>().unwrap()
    );
    assert!(config.headless());
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert_eq!(config.chromium_path(), None);
}

#[test]
fn test_default_impl_matches_empty_environment() {
    let config = RenderConfig::default();
    let loaded = from_vars(&[]).unwrap();
    assert_eq!(config.pool_size(), loaded.pool_size());
    assert_eq!(config.render_timeout(), loaded.render_timeout());
    assert_eq!(config.bind_addr(), loaded.bind_addr());
}

#[test]
fn test_environment_overrides() {
    let config = from_vars(&[
        (ENV_RENDER_TIMEOUT_MS, "1500"),
        (ENV_POOL_SIZE, "2"),
        (ENV_VIEWPORT_WIDTH, "1280"),
        (ENV_QUEUE_TIMEOUT_MS, "250"),
        (ENV_BIND_ADDR, "127.0.0.1:8080"),
        (ENV_HEADLESS, "false"),
        (ENV_LOG_FORMAT, "json"),
        (ENV_CHROMIUM_PATH, "/opt/chromium/chrome"),
    ])
    .unwrap();

    assert_eq!(config.render_timeout(), Duration::from_millis(1500));
    assert_eq!(config.pool_size(), 2);
    // Height keeps its default when only width is set
    assert_eq!(config.viewport(), Viewport::new(1280, 1080));
    assert_eq!(config.queue_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(
        config.bind_addr(),
        "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
    );
    assert!(!config.headless());
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(
        config.chromium_path(),
        Some(Path::new("/opt/chromium/chrome"))
    );
}

#[test]
fn test_blank_values_keep_defaults() {
    let config = from_vars(&[(ENV_POOL_SIZE, "  "), (ENV_LOG_FORMAT, "")]).unwrap();
    assert_eq!(config.pool_size(), 4);
    assert_eq!(config.log_format(), LogFormat::Compact);
}

#[test]
fn test_invalid_values_name_the_variable() {
    for (key, value) in [
        (ENV_RENDER_TIMEOUT_MS, "soon"),
        (ENV_POOL_SIZE, "-1"),
        (ENV_BIND_ADDR, "localhost"),
        (ENV_HEADLESS, "maybe"),
        (ENV_LOG_FORMAT, "xml"),
    ] {
        let err = from_vars(&[(key, value)]).unwrap_err();
        assert!(
            format!("{err:#}").contains(key),
            "error for {key}={value} should name the variable: {err:#}"
        );
    }
}

#[test]
fn test_zero_pool_size_is_rejected() {
    let err = from_vars(&[(ENV_POOL_SIZE, "0")]).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Invalid render configuration"), "{message}");
    assert!(message.contains("pool size"), "{message}");
}

#[test]
fn test_builder_validation() {
    assert!(RenderConfig::builder().pool_size(0).build().is_err());
    assert!(RenderConfig::builder().viewport(0, 600).build().is_err());
    assert!(
        RenderConfig::builder()
            .render_timeout(Duration::ZERO)
            .build()
            .is_err()
    );
    assert!(
        RenderConfig::builder()
            .queue_timeout(Some(Duration::ZERO))
            .build()
            .is_err()
    );
    assert!(RenderConfig::builder().max_body_bytes(0).build().is_err());
    assert!(RenderConfig::builder().build().is_ok());
}

#[test]
fn test_derived_settings() {
    let config = RenderConfig::builder()
        .render_timeout(Duration::from_secs(5))
        .queue_timeout(Some(Duration::from_secs(1)))
        .viewport(800, 600)
        .headless(false)
        .chromium_path("/usr/bin/chromium")
        .build()
        .unwrap();

    let executor = config.executor_settings();
    assert_eq!(executor.default_timeout, Duration::from_secs(5));
    assert_eq!(executor.queue_timeout, Some(Duration::from_secs(1)));
    assert_eq!(executor.default_viewport, Viewport::new(800, 600));

    let launch = config.launch_settings();
    assert!(!launch.headless);
    assert_eq!(launch.window, Viewport::new(800, 600));
    assert_eq!(
        launch.executable.as_deref(),
        Some(Path::new("/usr/bin/chromium"))
    );
}
