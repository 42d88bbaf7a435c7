//! Fixed-capacity pool of reusable render surfaces (browser tabs)
//!
//! The pool is the admission-control point of the service: at most `capacity`
//! surfaces exist, so at most `capacity` renders hit the browser at once. Excess
//! callers queue rather than fail.
//!
//! - Idle surfaces are reused most-recently-released first (LIFO) to keep a warm
//!   working set.
//! - Waiters are served strictly in arrival order (FIFO); a released surface is
//!   handed directly to the oldest waiter and never passes through the idle set.
//! - A pool belongs to exactly one browser launch (its `generation`). It is
//!   discarded wholesale on restart; pending waiters are failed with
//!   [`PoolError::Discarded`] so they can move on to the next generation.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::render::{RenderError, RenderJob};

// =============================================================================
// Surface abstraction
// =============================================================================

/// A reusable render context: one browser tab capable of producing bytes for a job
pub trait RenderSurface: Send + Sync + 'static {
    /// Whether the surface can still be used; closed surfaces are never returned to a pool
    fn is_open(&self) -> bool;

    /// Load the job's source and capture it in the job's format
    fn render(&self, job: &RenderJob)
    -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;

    /// Close the surface
    fn close(self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

// =============================================================================
// Errors and stats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool was torn down (browser restart or shutdown) before a surface was handed over
    #[error("Render surface pool generation {generation} was discarded")]
    Discarded { generation: u64 },
}

/// Point-in-time view of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub generation: u64,
    pub capacity: usize,
    pub idle: usize,
    pub checked_out: usize,
    pub waiting: usize,
    pub discarded: bool,
}

// =============================================================================
// Pool
// =============================================================================

struct PoolState<S> {
    /// Stack: last element is the most recently released surface
    idle: Vec<S>,
    /// Queue of suspended acquirers, oldest at the front
    waiters: VecDeque<oneshot::Sender<S>>,
    checked_out: usize,
    discarded: bool,
}

pub struct RenderSurfacePool<S: RenderSurface> {
    generation: u64,
    capacity: usize,
    state: Mutex<PoolState<S>>,
}

impl<S: RenderSurface> std::fmt::Debug for RenderSurfacePool<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSurfacePool")
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S: RenderSurface> RenderSurfacePool<S> {
    /// Create `capacity` surfaces through `factory`, one after another, and mark them idle
    ///
    /// A factory failure aborts initialization; surfaces created so far are closed.
    pub async fn init<F, Fut>(generation: u64, capacity: usize, mut factory: F) -> anyhow::Result<Arc<Self>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<S>>,
    {
        anyhow::ensure!(capacity > 0, "Render surface pool capacity must be at least 1");

        let mut idle = Vec::with_capacity(capacity);
        for index in 0..capacity {
            match factory().await {
                Ok(surface) => idle.push(surface),
                Err(e) => {
                    for surface in idle {
                        if let Err(close_err) = surface.close().await {
                            debug!("Failed to close surface after aborted pool init: {close_err}");
                        }
                    }
                    return Err(e.context(format!(
                        "Failed to create render surface {} of {capacity}",
                        index + 1
                    )));
                }
            }
        }

        info!("Render surface pool generation {generation} ready with {capacity} surfaces");

        Ok(Arc::new(Self {
            generation,
            capacity,
            state: Mutex::new(PoolState {
                idle,
                waiters: VecDeque::new(),
                checked_out: 0,
                discarded: false,
            }),
        }))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check out a surface, waiting in FIFO order when none is idle
    ///
    /// No timeout is applied here; callers bound the wait themselves if they need to.
    pub async fn acquire(self: &Arc<Self>) -> Result<SurfaceLease<S>, PoolError> {
        let rx = {
            let mut state = self.state.lock();
            if state.discarded {
                return Err(self.discarded_error());
            }
            if let Some(surface) = state.idle.pop() {
                state.checked_out += 1;
                debug!(
                    generation = self.generation,
                    idle = state.idle.len(),
                    "Acquired idle render surface"
                );
                return Ok(SurfaceLease::new(surface, Arc::clone(self)));
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(
                generation = self.generation,
                waiting = state.waiters.len(),
                "Pool exhausted, queueing acquire"
            );
            rx
        };

        let mut pending = PendingAcquire {
            rx,
            pool: Arc::clone(self),
            settled: false,
        };
        let received = (&mut pending.rx).await;
        pending.settled = true;

        match received {
            Ok(surface) => Ok(SurfaceLease::new(surface, Arc::clone(self))),
            // Sender dropped without a surface: the pool was discarded
            Err(_) => Err(self.discarded_error()),
        }
    }

    /// Return a checked-out surface
    ///
    /// Hands it to the oldest live waiter if there is one, otherwise pushes it on
    /// the idle stack. Surfaces released into a discarded pool are dropped; they go
    /// away with their browser process.
    pub fn release(&self, surface: S) {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);

        if state.discarded {
            debug!(
                generation = self.generation,
                "Dropping surface released into discarded pool"
            );
            return;
        }

        let mut surface = surface;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(surface) {
                Ok(()) => {
                    state.checked_out += 1;
                    debug!(
                        generation = self.generation,
                        waiting = state.waiters.len(),
                        "Handed released surface to waiter"
                    );
                    return;
                }
                // Waiter went away; try the next one
                Err(returned) => surface = returned,
            }
        }

        state.idle.push(surface);
        debug!(
            generation = self.generation,
            idle = state.idle.len(),
            "Released render surface to idle set"
        );
    }

    /// Tear the pool down: fail all waiters and close idle surfaces, best-effort
    ///
    /// Checked-out surfaces are not reclaimed. Never fails; calling it twice is a no-op.
    pub async fn discard(&self) {
        let (idle, waiters) = {
            let mut state = self.state.lock();
            if state.discarded {
                return;
            }
            state.discarded = true;
            (
                std::mem::take(&mut state.idle),
                std::mem::take(&mut state.waiters),
            )
        };

        if !waiters.is_empty() {
            info!(
                generation = self.generation,
                waiters = waiters.len(),
                "Failing waiters of discarded pool"
            );
        }
        // Dropping the senders wakes each waiter with PoolError::Discarded
        drop(waiters);

        let closing = idle.len();
        for surface in idle {
            if let Err(e) = surface.close().await {
                debug!(
                    generation = self.generation,
                    "Ignoring surface close failure during discard: {e}"
                );
            }
        }
        debug!(
            generation = self.generation,
            "Discarded pool, closed {closing} idle surfaces"
        );
    }

    pub fn is_discarded(&self) -> bool {
        self.state.lock().discarded
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            generation: self.generation,
            capacity: self.capacity,
            idle: state.idle.len(),
            checked_out: state.checked_out,
            waiting: state.waiters.iter().filter(|w| !w.is_closed()).count(),
            discarded: state.discarded,
        }
    }

    fn discarded_error(&self) -> PoolError {
        PoolError::Discarded {
            generation: self.generation,
        }
    }
}

/// Receiving side of a queued acquire
///
/// If the acquiring future is dropped after a surface was already handed over,
/// the surface is pushed back through `release` instead of being lost.
struct PendingAcquire<S: RenderSurface> {
    rx: oneshot::Receiver<S>,
    pool: Arc<RenderSurfacePool<S>>,
    settled: bool,
}

impl<S: RenderSurface> Drop for PendingAcquire<S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.rx.close();
        if let Ok(surface) = self.rx.try_recv() {
            debug!("Acquire cancelled after handoff, returning surface");
            self.pool.release(surface);
        }
    }
}

// =============================================================================
// RAII Lease
// =============================================================================

/// A checked-out surface; returns to its issuing pool on drop if still open
pub struct SurfaceLease<S: RenderSurface> {
    surface: Option<S>,
    pool: Arc<RenderSurfacePool<S>>,
}

impl<S: RenderSurface> SurfaceLease<S> {
    fn new(surface: S, pool: Arc<RenderSurfacePool<S>>) -> Self {
        Self {
            surface: Some(surface),
            pool,
        }
    }

    /// Generation of the pool that issued this surface
    pub fn generation(&self) -> u64 {
        self.pool.generation
    }

    /// Give the surface back now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl<S: RenderSurface> Deref for SurfaceLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
            .as_ref()
            .expect("surface is present until the lease is dropped")
    }
}

impl<S: RenderSurface> Drop for SurfaceLease<S> {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.take() {
            if surface.is_open() {
                self.pool.release(surface);
            } else {
                debug!(
                    generation = self.pool.generation,
                    "Surface closed while checked out, not returning it to the pool"
                );
            }
        }
    }
}
