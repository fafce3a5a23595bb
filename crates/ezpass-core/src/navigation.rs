//! Navigation monitoring: decide when a page change warrants a fetch.

use parking_lot::Mutex;
use tracing::debug;

use crate::fill::{FillEngine, FillOutcome};
use ezpass_protocols::EzpassError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Full page load.
    InitialLoad,
    /// Single-page-app route change (DOM mutation with a new address).
    RouteChange,
    /// Back/forward navigation.
    HistoryPop,
}

/// Remembers the last seen address so repeated events for the same page do
/// not trigger duplicate fetches.
#[derive(Debug, Default)]
pub struct NavigationMonitor {
    last_url: Mutex<Option<String>>,
}

impl NavigationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().clone()
    }

    /// Record `event` at `url`; returns whether a fetch should follow.
    pub fn observe(&self, event: NavigationEvent, url: &str) -> bool {
        let mut last = self.last_url.lock();
        if event != NavigationEvent::InitialLoad && last.as_deref() == Some(url) {
            return false;
        }
        if let Some(previous) = last.as_deref() {
            debug!("{:?}: URL changed from {} to {}", event, previous, url);
        }
        *last = Some(url.to_string());
        true
    }

    /// Observe `event` on the engine's document and fill when it is a new page.
    pub async fn handle(
        &self,
        event: NavigationEvent,
        url: &str,
        engine: &FillEngine,
    ) -> Result<Option<FillOutcome>, EzpassError> {
        if !self.observe(event, url) {
            return Ok(None);
        }
        engine.refresh().await.map(Some)
    }
}
