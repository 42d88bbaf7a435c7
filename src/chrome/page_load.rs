//! Page settling before capture
//!
//! `goto` and `set_content` return once the document is committed, which is too
//! early for a faithful capture: scripts, styles and images may still be
//! loading. [`wait_for_network_idle`] holds a URL render until its requests
//! have drained, then [`wait_for_page_settle`] polls the document until it is
//! complete.

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use futures::StreamExt;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Extra wait when the document is complete but images are still decoding
const IMAGE_GRACE: Duration = Duration::from_millis(500);

const READY_STATE_SCRIPT: &str = r"
    (function() {
        return {
            readyState: document.readyState,
            imagesLoaded: Array.from(document.images).every(img => img.complete),
            bodyExists: document.body !== null
        };
    })()
";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentState {
    ready_state: String,
    #[serde(default)]
    images_loaded: bool,
    #[serde(default)]
    body_exists: bool,
}

impl DocumentState {
    fn is_complete(&self) -> bool {
        self.ready_state == "complete" && self.body_exists
    }
}

/// Lifecycle event Chrome emits once a frame has had no requests in flight for 500ms
const NETWORK_IDLE_EVENT: &str = "networkIdle";

/// Subscribe to the page's lifecycle events
///
/// Call before navigating so the idle signal of the new document is not missed.
pub async fn network_idle_events(
    page: &Page,
) -> Result<EventStream<EventLifecycleEvent>, CdpError> {
    page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
    page.event_listener::<EventLifecycleEvent>().await
}

fn is_idle_signal(name: &str, frame: &str, main_frame: Option<&str>) -> bool {
    name == NETWORK_IDLE_EVENT && main_frame.is_none_or(|main| main == frame)
}

/// Wait for the main frame's `networkIdle` event, for at most `max_wait`
///
/// Returns whether the network went idle. Like the settle wait this never
/// fails; a page that keeps polling the network is captured when time runs out.
pub async fn wait_for_network_idle(
    events: &mut EventStream<EventLifecycleEvent>,
    main_frame: Option<&str>,
    max_wait: Duration,
) -> bool {
    let start = Instant::now();
    let idle = tokio::time::timeout(max_wait, async {
        while let Some(event) = events.next().await {
            let frame: &str = event.frame_id.as_ref();
            trace!("Lifecycle event {} on frame {frame}", event.name);
            if is_idle_signal(&event.name, frame, main_frame) {
                return true;
            }
        }
        false
    })
    .await;

    match idle {
        Ok(true) => {
            debug!(
                "Network idle after {:.2}s",
                start.elapsed().as_secs_f64()
            );
            true
        }
        Ok(false) => {
            debug!("Lifecycle event stream ended before the network went idle");
            false
        }
        Err(_) => {
            debug!("Network still busy after {max_wait:?}, capturing anyway");
            false
        }
    }
}

/// Poll until `document.readyState === 'complete'`, for at most `max_wait`
///
/// Never fails: a page that does not settle in time is captured as-is. The
/// caller's render deadline still bounds the whole operation.
pub async fn wait_for_page_settle(page: &Page, max_wait: Duration) {
    let start = Instant::now();

    loop {
        match page.evaluate(READY_STATE_SCRIPT).await {
            Ok(result) => match result.into_value::<DocumentState>() {
                Ok(state) if state.is_complete() => {
                    if !state.images_loaded {
                        trace!("Images still loading, waiting {IMAGE_GRACE:?}");
                        tokio::time::sleep(IMAGE_GRACE).await;
                    }
                    debug!(
                        "Page settled after {:.2}s",
                        start.elapsed().as_secs_f64()
                    );
                    return;
                }
                Ok(state) => trace!("Document state {}", state.ready_state),
                Err(e) => trace!("Unreadable document state: {e}"),
            },
            Err(e) => trace!("Failed to check readyState: {e}, retrying"),
        }

        if start.elapsed() >= max_wait {
            debug!("Page did not settle within {max_wait:?}, capturing anyway");
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
