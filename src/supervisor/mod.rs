//! Browser lifecycle supervision
//!
//! [`BrowserSupervisor`] owns the single live browser process and the render
//! surface pool built from it. It launches the browser, watches it for
//! unexpected disconnects, and rebuilds everything on restart.
//!
//! # Lifecycle
//! ```text
//! Launching -> Ready -> Restarting -> Ready -> ... -> Closed
//!                            \-> Failed (relaunch failed, terminal)
//! ```
//! Restarts are single-flight: a trigger that arrives while a restart is running
//! collapses into it. Every launch bumps the generation; the pool carries it so
//! callers can tell a stale pool from the live one.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::render::RenderError;
use crate::surface_pool::{PoolStats, RenderSurface, RenderSurfacePool};

// =============================================================================
// Browser abstraction
// =============================================================================

/// A running browser process that can open render surfaces
pub trait BrowserProcess: Send + Sync + 'static {
    type Surface: RenderSurface;

    /// Open a new tab prepared for rendering
    fn open_surface(&self) -> impl Future<Output = Result<Self::Surface>> + Send;

    /// Resolves when the process exits or its control channel drops
    fn disconnected(&self) -> impl Future<Output = ()> + Send + 'static;

    /// Close the process and release its resources
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Starts browser processes
pub trait BrowserLauncher: Send + Sync + 'static {
    type Process: BrowserProcess;

    fn launch(&self) -> impl Future<Output = Result<Self::Process>> + Send;
}

/// Surface type produced by a launcher's processes
pub type SurfaceOf<L> = <<L as BrowserLauncher>::Process as BrowserProcess>::Surface;

/// Pool type managed by a supervisor over launcher `L`
pub type PoolOf<L> = RenderSurfacePool<SurfaceOf<L>>;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Launching,
    Ready,
    Restarting,
    Closed,
    Failed,
}

/// Lifecycle snapshot broadcast to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    pub state: SupervisorState,
    /// Generation of the most recent launch (0 before the first one)
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// A render exceeded its deadline or the browser reported a stalled call
    Timeout,
    /// The browser process exited or dropped its control channel
    Disconnected,
    /// Requested explicitly
    Manual,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// A new browser and pool are live
    Restarted { generation: u64 },
    /// Another restart was already running; this call had no effect
    AlreadyRestarting,
    /// The supervisor is closed or failed; nothing was done
    Skipped,
}

/// Health report of the supervisor and its live pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub generation: u64,
    pub launches: u64,
    pub pool: PoolStats,
}

// =============================================================================
// Supervisor
// =============================================================================

pub struct BrowserSupervisor<L: BrowserLauncher> {
    launcher: L,
    capacity: usize,
    process: tokio::sync::Mutex<Option<L::Process>>,
    pool: RwLock<Arc<PoolOf<L>>>,
    disconnect_watcher: Mutex<Option<JoinHandle<()>>>,
    /// Single-flight restart guard
    restarting: AtomicBool,
    launches: AtomicU64,
    lifecycle: watch::Sender<Lifecycle>,
}

impl<L: BrowserLauncher> BrowserSupervisor<L> {
    /// Launch the first browser generation and build its pool
    pub async fn start(launcher: L, capacity: usize) -> Result<Arc<Self>> {
        anyhow::ensure!(capacity > 0, "Render pool capacity must be at least 1");

        let (lifecycle, _) = watch::channel(Lifecycle {
            state: SupervisorState::Launching,
            generation: 0,
        });
        let launches = AtomicU64::new(1);

        info!("Launching browser (generation 1, pool capacity {capacity})");
        let (process, pool) = launch_generation(&launcher, capacity, 1).await?;
        let disconnected = process.disconnected();

        let supervisor = Arc::new(Self {
            launcher,
            capacity,
            process: tokio::sync::Mutex::new(Some(process)),
            pool: RwLock::new(pool),
            disconnect_watcher: Mutex::new(None),
            restarting: AtomicBool::new(false),
            launches,
            lifecycle,
        });

        // Ready first: the watcher ignores disconnects of a generation that is not live
        supervisor.transition(SupervisorState::Ready, 1);
        supervisor.watch_disconnect(Box::pin(disconnected), 1);
        info!("Browser ready (generation 1)");

        Ok(supervisor)
    }

    /// The pool live right now; re-fetch per operation, never cache across a restart
    pub fn current_pool(&self) -> Arc<PoolOf<L>> {
        Arc::clone(&*self.pool.read())
    }

    /// Number of browser launches attempted so far, including the first
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::Acquire)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    pub fn status(&self) -> SupervisorStatus {
        let lifecycle = self.lifecycle();
        SupervisorStatus {
            state: lifecycle.state,
            generation: lifecycle.generation,
            launches: self.launch_count(),
            pool: self.current_pool().stats(),
        }
    }

    /// Tear down the current browser and pool and launch fresh ones
    ///
    /// Single-flight: returns [`RestartOutcome::AlreadyRestarting`] immediately if a
    /// restart is in progress. Teardown failures are logged and ignored; a failed
    /// relaunch moves the supervisor to [`SupervisorState::Failed`] and is returned.
    pub async fn restart(self: &Arc<Self>, reason: RestartReason) -> Result<RestartOutcome> {
        if self
            .restarting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Restart ({reason}) collapsed into the restart already in progress");
            return Ok(RestartOutcome::AlreadyRestarting);
        }

        let relaunch = {
            let _guard = RestartGuard(&self.restarting);
            self.restart_inner(reason).await?
        };

        match relaunch {
            Relaunch::Skipped => Ok(RestartOutcome::Skipped),
            Relaunch::Live {
                generation,
                disconnected,
            } => {
                // Registered after the guard is released so an immediate disconnect
                // can start the next restart instead of collapsing into this one
                self.watch_disconnect(disconnected, generation);
                Ok(RestartOutcome::Restarted { generation })
            }
        }
    }

    /// Fire-and-forget restart
    pub fn trigger_restart(self: &Arc<Self>, reason: RestartReason) {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            match supervisor.restart(reason).await {
                Ok(RestartOutcome::Restarted { generation }) => {
                    debug!("Restart ({reason}) completed, generation {generation} live");
                }
                Ok(_) => {}
                Err(e) => error!("Browser restart ({reason}) failed: {e:#}"),
            }
        });
    }

    async fn restart_inner(self: &Arc<Self>, reason: RestartReason) -> Result<Relaunch> {
        let previous = self.lifecycle();
        if !self.transition(SupervisorState::Restarting, previous.generation) {
            debug!(
                "Ignoring restart ({reason}): supervisor is {:?}",
                self.lifecycle().state
            );
            return Ok(Relaunch::Skipped);
        }

        warn!(
            "Restarting browser (reason: {reason}, generation {})",
            previous.generation
        );

        self.stop_disconnect_watcher();
        self.current_pool().discard().await;
        {
            let mut process = self.process.lock().await;
            if let Some(mut old) = process.take()
                && let Err(e) = old.close().await
            {
                warn!("Failed to close browser generation {}: {e:#}", previous.generation);
            }
        }

        let generation = self.launches.fetch_add(1, Ordering::AcqRel) + 1;
        info!("Launching browser (generation {generation})");
        let (mut process, pool) =
            match launch_generation(&self.launcher, self.capacity, generation).await {
                Ok(launched) => launched,
                Err(e) => {
                    if !self.transition(SupervisorState::Failed, previous.generation) {
                        debug!("Relaunch failed after shutdown, ignoring: {e:#}");
                        return Ok(Relaunch::Skipped);
                    }
                    error!("Browser relaunch failed, renderer is unavailable: {e:#}");
                    return Err(e);
                }
            };

        // Publishing Ready and installing the new browser happen under the process
        // lock, so shutdown either sees the new browser or stops it from going live
        let mut slot = self.process.lock().await;
        if !self.transition(SupervisorState::Ready, generation) {
            drop(slot);
            info!("Supervisor closed during restart, discarding generation {generation}");
            pool.discard().await;
            if let Err(e) = process.close().await {
                warn!("Failed to close browser generation {generation}: {e:#}");
            }
            return Ok(Relaunch::Skipped);
        }

        let disconnected: BoxFuture<'static, ()> = Box::pin(process.disconnected());
        *self.pool.write() = pool;
        *slot = Some(process);
        drop(slot);

        info!("Browser restarted (generation {generation})");
        Ok(Relaunch::Live {
            generation,
            disconnected,
        })
    }

    /// Resolve once a pool newer than `generation` is live
    ///
    /// Fails with [`RenderError::Unavailable`] if the supervisor closes or fails first.
    pub async fn wait_for_generation_after(&self, generation: u64) -> Result<(), RenderError> {
        let mut rx = self.lifecycle.subscribe();
        let lifecycle = *rx
            .wait_for(|l| {
                (l.state == SupervisorState::Ready && l.generation > generation)
                    || matches!(l.state, SupervisorState::Closed | SupervisorState::Failed)
            })
            .await
            .map_err(|_| RenderError::unavailable("browser supervisor is gone"))?;

        match lifecycle.state {
            SupervisorState::Ready => Ok(()),
            SupervisorState::Failed => Err(RenderError::unavailable(
                "browser failed to relaunch after a restart",
            )),
            _ => Err(RenderError::unavailable("renderer is shut down")),
        }
    }

    /// Resolves when the supervisor enters [`SupervisorState::Failed`]
    pub async fn failed(&self) {
        let mut rx = self.lifecycle.subscribe();
        let _ = rx.wait_for(|l| l.state == SupervisorState::Failed).await;
    }

    /// Close the pool and the browser; safe to call more than once
    ///
    /// `Closed` is terminal: no restart in flight can bring the supervisor back.
    pub async fn shutdown(&self) -> Result<()> {
        let mut generation = 0;
        let closed_now = self.lifecycle.send_if_modified(|lifecycle| {
            if lifecycle.state == SupervisorState::Closed {
                return false;
            }
            lifecycle.state = SupervisorState::Closed;
            generation = lifecycle.generation;
            true
        });
        if !closed_now {
            return Ok(());
        }
        info!("Shutting down browser supervisor (generation {generation})");

        let mut process = self.process.lock().await;
        self.stop_disconnect_watcher();
        self.current_pool().discard().await;
        if let Some(mut browser) = process.take()
            && let Err(e) = browser.close().await
        {
            warn!("Failed to close browser cleanly: {e:#}");
        }

        info!("Browser supervisor shutdown complete");
        Ok(())
    }

    /// Move to `state` at `generation` unless the supervisor is already terminal
    ///
    /// `Closed` is never left; `Failed` only gives way to `Closed`, which goes
    /// through `shutdown`. Returns whether the transition happened.
    fn transition(&self, state: SupervisorState, generation: u64) -> bool {
        self.lifecycle.send_if_modified(|lifecycle| {
            if matches!(
                lifecycle.state,
                SupervisorState::Closed | SupervisorState::Failed
            ) {
                return false;
            }
            *lifecycle = Lifecycle { state, generation };
            true
        })
    }

    fn watch_disconnect(self: &Arc<Self>, disconnected: BoxFuture<'static, ()>, generation: u64) {
        let mut slot = self.disconnect_watcher.lock();
        let live = self.lifecycle();
        if live.state != SupervisorState::Ready || live.generation != generation {
            debug!("Generation {generation} is no longer live, not watching it");
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            disconnected.await;
            let Some(supervisor) = weak.upgrade() else {
                return;
            };
            let current = supervisor.lifecycle();
            if current.generation != generation || current.state != SupervisorState::Ready {
                debug!("Ignoring disconnect of browser generation {generation}");
                return;
            }
            warn!("Browser generation {generation} disconnected unexpectedly");
            // Spawned: the restart aborts this watcher task
            supervisor.trigger_restart(RestartReason::Disconnected);
        });

        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn stop_disconnect_watcher(&self) {
        if let Some(handle) = self.disconnect_watcher.lock().take() {
            handle.abort();
        }
    }
}

/// Result of one restart attempt that got past the single-flight guard
enum Relaunch {
    Skipped,
    Live {
        generation: u64,
        disconnected: BoxFuture<'static, ()>,
    },
}

/// Clears the single-flight flag even if the restarting future is dropped
struct RestartGuard<'a>(&'a AtomicBool);

impl Drop for RestartGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Launch one browser and build a full pool from it
///
/// The process is closed again if the pool cannot be filled.
async fn launch_generation<L: BrowserLauncher>(
    launcher: &L,
    capacity: usize,
    generation: u64,
) -> Result<(L::Process, Arc<PoolOf<L>>)> {
    let mut process = launcher
        .launch()
        .await
        .with_context(|| format!("Failed to launch browser generation {generation}"))?;

    let pool = RenderSurfacePool::init(generation, capacity, || process.open_surface()).await;
    match pool {
        Ok(pool) => Ok((process, pool)),
        Err(e) => {
            if let Err(close_err) = process.close().await {
                warn!("Failed to close browser after pool init failure: {close_err:#}");
            }
            Err(e.context(format!("Failed to build render pool for generation {generation}")))
        }
    }
}
