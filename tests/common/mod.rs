//! Test utilities: a scripted in-memory browser for the htmlrender test suite
//!
//! `FakeLauncher` stands in for Chrome. Every knob lives on the shared
//! `FakeControl`, so a test can slow renders down, fail launches, or simulate a
//! browser crash while the code under test holds the launcher.

#![allow(dead_code)]

use anyhow::Result;
use kodegen_tools_htmlrender::{
    BrowserLauncher, BrowserProcess, BrowserSupervisor, ExecutorSettings, RenderError,
    RenderExecutor, RenderFormat, RenderJob, RenderSurface, SupervisorState, Viewport,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Shared knobs and counters for every fake process and surface
#[derive(Debug, Default)]
pub struct FakeControl {
    /// Successful launches
    pub launches: AtomicU64,
    pub launch_delay_ms: AtomicU64,
    pub fail_launches: AtomicBool,
    /// The next launched browser is already disconnected when `launch` returns
    pub crash_next_launch: AtomicBool,

    pub render_delay_ms: AtomicU64,
    /// The next render loses its connection and closes its surface
    pub break_next_render: AtomicBool,
    pub renders_started: AtomicUsize,
    pub renders_finished: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,

    pub surfaces_opened: AtomicUsize,
    pub surfaces_closed: AtomicUsize,
    pub processes_closed: AtomicUsize,

    disconnect: Mutex<Option<watch::Sender<bool>>>,
}

impl FakeControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_render_delay(&self, delay: Duration) {
        self.render_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_launch_delay(&self, delay: Duration) {
        self.launch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_launches(&self, fail: bool) {
        self.fail_launches.store(fail, Ordering::SeqCst);
    }

    pub fn crash_next_launch(&self) {
        self.crash_next_launch.store(true, Ordering::SeqCst);
    }

    pub fn processes_closed(&self) -> usize {
        self.processes_closed.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn renders_started(&self) -> usize {
        self.renders_started.load(Ordering::SeqCst)
    }

    pub fn surfaces_closed(&self) -> usize {
        self.surfaces_closed.load(Ordering::SeqCst)
    }

    /// Simulate the most recently launched browser crashing
    pub fn crash_browser(&self) {
        if let Some(tx) = self.disconnect.lock().as_ref() {
            tx.send_replace(true);
        }
    }

    /// A standalone surface, for driving a pool directly
    pub fn new_surface(self: &Arc<Self>) -> FakeSurface {
        let id = self.surfaces_opened.fetch_add(1, Ordering::SeqCst);
        FakeSurface {
            id,
            control: Arc::clone(self),
            open: AtomicBool::new(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeLauncher {
    pub control: Arc<FakeControl>,
}

impl FakeLauncher {
    pub fn new(control: Arc<FakeControl>) -> Self {
        Self { control }
    }
}

impl BrowserLauncher for FakeLauncher {
    type Process = FakeProcess;

    async fn launch(&self) -> Result<FakeProcess> {
        let delay = self.control.launch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.control.fail_launches.load(Ordering::SeqCst) {
            anyhow::bail!("scripted launch failure");
        }

        let (tx, rx) = watch::channel(false);
        *self.control.disconnect.lock() = Some(tx.clone());
        self.control.launches.fetch_add(1, Ordering::SeqCst);
        if self.control.crash_next_launch.swap(false, Ordering::SeqCst) {
            tx.send_replace(true);
        }

        Ok(FakeProcess {
            control: Arc::clone(&self.control),
            disconnect_tx: tx,
            disconnect_rx: rx,
        })
    }
}

pub struct FakeProcess {
    control: Arc<FakeControl>,
    disconnect_tx: watch::Sender<bool>,
    disconnect_rx: watch::Receiver<bool>,
}

impl BrowserProcess for FakeProcess {
    type Surface = FakeSurface;

    async fn open_surface(&self) -> Result<FakeSurface> {
        Ok(self.control.new_surface())
    }

    fn disconnected(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.disconnect_rx.clone();
        async move {
            let _ = rx.wait_for(|gone| *gone).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.control.processes_closed.fetch_add(1, Ordering::SeqCst);
        // A real browser drops its connection when closed
        self.disconnect_tx.send_replace(true);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeSurface {
    pub id: usize,
    control: Arc<FakeControl>,
    open: AtomicBool,
}

impl FakeSurface {
    /// Mark the surface dead, as if its tab crashed
    pub fn kill(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Keeps `in_flight` right even when a render is cancelled mid-way
struct InFlight<'a>(&'a FakeControl);

impl<'a> InFlight<'a> {
    fn enter(control: &'a FakeControl) -> Self {
        let now = control.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        control.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(control)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RenderSurface for FakeSurface {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn render(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError> {
        self.control.renders_started.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.control);

        let delay = self.control.render_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.control.break_next_render.swap(false, Ordering::SeqCst) {
            self.kill();
            return Err(RenderError::render("browser connection lost"));
        }

        self.control.renders_finished.fetch_add(1, Ordering::SeqCst);
        Ok(fake_bytes(job.format))
    }

    async fn close(self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        self.control.surfaces_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Bytes a fake render produces, starting with the format's real signature
pub fn fake_bytes(format: RenderFormat) -> Vec<u8> {
    match format {
        RenderFormat::Pdf => b"%PDF-1.7 fake".to_vec(),
        RenderFormat::Png => b"\x89PNG\r\n\x1a\n fake".to_vec(),
        RenderFormat::Jpeg => b"\xff\xd8\xff fake".to_vec(),
        RenderFormat::Webp => b"RIFF fake WEBP".to_vec(),
    }
}

pub async fn start_supervisor(
    control: &Arc<FakeControl>,
    capacity: usize,
) -> Arc<BrowserSupervisor<FakeLauncher>> {
    BrowserSupervisor::start(FakeLauncher::new(Arc::clone(control)), capacity)
        .await
        .unwrap()
}

pub fn executor(
    supervisor: &Arc<BrowserSupervisor<FakeLauncher>>,
    default_timeout: Duration,
    queue_timeout: Option<Duration>,
) -> RenderExecutor<FakeLauncher> {
    RenderExecutor::new(
        Arc::clone(supervisor),
        ExecutorSettings {
            default_timeout,
            queue_timeout,
            default_viewport: Viewport::new(800, 600),
        },
    )
}

/// Wait until the supervisor is Ready on a generation newer than `after`
pub async fn wait_for_ready_after(supervisor: &BrowserSupervisor<FakeLauncher>, after: u64) -> u64 {
    let mut rx = supervisor.subscribe();
    let generation = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|l| l.state == SupervisorState::Ready && l.generation > after),
    )
    .await
    .expect("supervisor did not become ready in time")
    .expect("supervisor dropped")
    .generation;
    generation
}

/// Poll `check` every few milliseconds until it holds or five seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
