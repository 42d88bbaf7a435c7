//! Chrome profile directory management
//!
//! Every browser launch gets its own UUID-named user-data directory, so a
//! relaunch never contends for the previous generation's SingletonLock.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::utils::PROFILE_DIR_PREFIX;

// =============================================================================
// BrowserProfile - RAII wrapper for profile directory
// =============================================================================

/// RAII wrapper for a Chrome profile directory
///
/// Removes the directory on drop.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
}

impl BrowserProfile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.path.exists() {
            debug!("BrowserProfile cleanup: removing {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(
                    "Failed to cleanup profile directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

// =============================================================================
// Profile Creation
// =============================================================================

/// Create a unique profile directory under the system temp dir
pub fn create_unique_profile() -> Result<BrowserProfile> {
    create_unique_profile_in(&std::env::temp_dir())
}

/// Create a unique profile directory under `parent`
///
/// `create_dir` (not `create_dir_all`) so a name collision fails instead of
/// silently sharing a directory.
pub fn create_unique_profile_in(parent: &Path) -> Result<BrowserProfile> {
    let path = parent.join(format!("{PROFILE_DIR_PREFIX}_{}", Uuid::new_v4()));

    std::fs::create_dir(&path)
        .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;

    debug!("Created Chrome profile directory: {}", path.display());
    Ok(BrowserProfile::new(path))
}

/// Remove profile directories left behind by earlier runs under `parent`
///
/// Called once at startup, before the first launch, so no live browser of this
/// process can own one of them.
pub fn cleanup_stale_profiles_in(parent: &Path) -> Result<usize> {
    let mut cleaned = 0;

    let entries = std::fs::read_dir(parent)
        .with_context(|| format!("Failed to read directory: {}", parent.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with(PROFILE_DIR_PREFIX)
            && path.is_dir()
        {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => cleaned += 1,
                Err(e) => warn!("Failed to remove stale profile {}: {}", path.display(), e),
            }
        }
    }

    if cleaned > 0 {
        info!("Cleaned {cleaned} stale Chrome profile directories");
    }

    Ok(cleaned)
}

/// [`cleanup_stale_profiles_in`] for the system temp dir
pub fn cleanup_stale_profiles() -> Result<usize> {
    cleanup_stale_profiles_in(&std::env::temp_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_unique_and_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();

        let first = create_unique_profile_in(parent.path()).unwrap();
        let second = create_unique_profile_in(parent.path()).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().is_dir());

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
        assert!(second.path().exists());
    }

    #[test]
    fn stale_cleanup_only_touches_prefixed_dirs() {
        let parent = tempfile::tempdir().unwrap();
        // Profiles of a process that died without running destructors
        std::mem::forget(create_unique_profile_in(parent.path()).unwrap());
        std::mem::forget(create_unique_profile_in(parent.path()).unwrap());
        std::fs::create_dir(parent.path().join("unrelated")).unwrap();

        assert_eq!(cleanup_stale_profiles_in(parent.path()).unwrap(), 2);
        assert!(parent.path().join("unrelated").exists());
    }
}
