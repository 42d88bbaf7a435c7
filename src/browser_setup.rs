//! Browser discovery and launch

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::render::Viewport;
use crate::utils::constants::CDP_REQUEST_TIMEOUT_SECS;

/// Chromium flags for unattended rendering in containers and CI
const LAUNCH_FLAGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-software-rasterizer",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-extensions",
    "--disable-notifications",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-breakpad",
    "--disable-component-extensions-with-background-pages",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-prompt-on-repost",
    "--metrics-recording-only",
    "--password-store=basic",
    "--use-mock-keychain",
    "--font-render-hinting=none",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Well-known install locations for the current platform
fn candidate_paths() -> Vec<PathBuf> {
    let raw: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"%PROGRAMFILES%\Google\Chrome\Application\chrome.exe",
            r"%PROGRAMFILES(X86)%\Google\Chrome\Application\chrome.exe",
            r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
            r"%PROGRAMFILES%\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/local/bin/chromium",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    raw.iter()
        .filter_map(|entry| match entry.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None if entry.contains('%') => Some(PathBuf::from(expand_windows_env_vars(entry))),
            None => Some(PathBuf::from(entry)),
        })
        .collect()
}

/// Resolve a browser binary through `which`
fn which_browser() -> Option<PathBuf> {
    ["chromium", "chromium-browser", "google-chrome", "chrome"]
        .into_iter()
        .find_map(|name| {
            let output = Command::new("which").arg(name).output().ok()?;
            if !output.status.success() {
                return None;
            }
            let found = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            (!found.is_empty()).then(|| PathBuf::from(found))
        })
}

/// Locate a Chrome/Chromium executable
///
/// Lookup order: `explicit` (from `CHROMIUM_PATH`), platform install locations,
/// then `which` on Unix. Errors when nothing is found; callers fall back to
/// [`download_managed_browser`].
pub async fn find_browser_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path.to_path_buf());
        }
        warn!("CHROMIUM_PATH does not exist, searching instead: {}", path.display());
    }

    if let Some(path) = candidate_paths().into_iter().find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if cfg!(unix)
        && let Some(path) = task::spawn_blocking(which_browser).await.ok().flatten()
    {
        info!("Found browser on PATH: {}", path.display());
        return Ok(path);
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Expand `%VAR%` tokens; unknown variables and unterminated tokens are kept as-is
fn expand_windows_env_vars(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }

        let mut var_name = String::new();
        let mut found_closing = false;
        for c in chars.by_ref() {
            if c == '%' {
                found_closing = true;
                break;
            }
            var_name.push(c);
        }

        match (found_closing, var_name.is_empty()) {
            (true, false) => match std::env::var(&var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    result.push('%');
                    result.push_str(&var_name);
                    result.push('%');
                }
            },
            // %% is a literal percent
            (true, true) => result.push('%'),
            (false, _) => {
                result.push('%');
                result.push_str(&var_name);
            }
        }
    }

    result
}

/// Downloads a managed Chromium into the user cache dir and returns its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir();
            warn!(
                "Could not determine user cache directory, using temp directory fallback: {}",
                fallback.display()
            );
            fallback
        })
        .join("kodegen_htmlrender")
        .join("chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );

    Ok(revision_info.executable_path)
}

/// Settings for one browser launch
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub headless: bool,
    /// Initial window size; pages override it per render
    pub window: Viewport,
    /// Explicit executable, usually `CHROMIUM_PATH`
    pub executable: Option<PathBuf>,
}

/// A launched browser with its CDP handler task
pub struct LaunchedBrowser {
    pub browser: Browser,
    pub handler: JoinHandle<()>,
    /// Flips to `true` when the CDP connection ends
    pub disconnected: watch::Receiver<bool>,
}

/// Finds or downloads Chrome/Chromium and launches it for rendering
///
/// `user_data_dir` must already exist and must not be shared with another
/// running browser.
pub async fn launch_browser(
    settings: &LaunchSettings,
    user_data_dir: &Path,
) -> Result<LaunchedBrowser> {
    let chrome_path = match find_browser_executable(settings.executable.as_deref()).await {
        Ok(path) => path,
        Err(e) => {
            warn!("{e}, downloading a managed Chromium");
            download_managed_browser().await?
        }
    };

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(CDP_REQUEST_TIMEOUT_SECS))
        .window_size(settings.window.width, settings.window.height)
        .user_data_dir(user_data_dir)
        .chrome_executable(chrome_path);

    if settings.headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    config_builder = config_builder.args(LAUNCH_FLAGS.iter().copied());

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    debug!(?browser_config, "Launching browser");
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let (disconnect_tx, disconnected) = watch::channel(false);
    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            let Err(e) = event else { continue };
            let message = e.to_string();
            // chromiumoxide does not know every CDP event Chrome emits
            // https://github.com/mattsse/chromiumoxide/issues/167
            if is_unknown_cdp_message(&message) {
                trace!("Ignoring unknown CDP message: {message}");
            } else {
                error!("Browser handler error: {e:?}");
            }
        }
        info!("CDP connection closed");
        disconnect_tx.send_replace(true);
    });

    Ok(LaunchedBrowser {
        browser,
        handler: handler_task,
        disconnected,
    })
}

fn is_unknown_cdp_message(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}
