//! Headless browser collaborator.
//!
//! The pipeline needs exactly two things from a browser: the list of
//! requests a page issues while loading, and the visible text of elements
//! matching a selector. [`BrowserDriver`] exposes both as blocking calls;
//! async callers go through [`observe_requests`] and [`read_dom`], which run
//! the driver on the blocking pool.

mod chrome;

use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::BrowserError;

pub use chrome::{ChromeDriver, ChromeOptions};

/// One outgoing HTTP request seen during a page load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservedRequest {
    pub url: String,
    pub method: String,
    /// Header names are lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

/// Bounds on how long a page is watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Hard limit on the whole observation, navigation included.
    pub timeout: Duration,
    /// The network is considered idle once no request arrives for this long.
    pub idle_window: Duration,
    /// Minimum time to keep watching after navigation completes, so that
    /// requests fired by client-side scripts are not missed.
    pub settle: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(25),
            idle_window: Duration::from_millis(1500),
            settle: Duration::from_secs(3),
        }
    }
}

impl WaitPolicy {
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Blocking browser automation. Each call owns a fresh, isolated browser
/// session that is torn down before the call returns.
pub trait BrowserDriver: Send + Sync {
    /// Loads `url` and returns every request issued until the network goes
    /// idle or `wait.timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] if the browser cannot launch or the page fails to load.
    fn observe_requests(
        &self,
        url: &str,
        wait: &WaitPolicy,
    ) -> Result<Vec<ObservedRequest>, BrowserError>;

    /// Loads `url`, waits per `wait`, and returns the visible text of every
    /// element matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] if the browser cannot launch or the page fails to load.
    fn read_dom(
        &self,
        url: &str,
        selector: &str,
        wait: &WaitPolicy,
    ) -> Result<Vec<String>, BrowserError>;
}

/// Runs [`BrowserDriver::observe_requests`] on the blocking thread pool.
///
/// # Errors
///
/// Propagates the driver's error, or [`BrowserError::Join`] if the task panicked.
pub async fn observe_requests(
    driver: Arc<dyn BrowserDriver>,
    url: String,
    wait: WaitPolicy,
) -> Result<Vec<ObservedRequest>, BrowserError> {
    tokio::task::spawn_blocking(move || driver.observe_requests(&url, &wait))
        .await
        .map_err(|e| BrowserError::Join(e.to_string()))?
}

/// Runs [`BrowserDriver::read_dom`] on the blocking thread pool.
///
/// # Errors
///
/// Propagates the driver's error, or [`BrowserError::Join`] if the task panicked.
pub async fn read_dom(
    driver: Arc<dyn BrowserDriver>,
    url: String,
    selector: String,
    wait: WaitPolicy,
) -> Result<Vec<String>, BrowserError> {
    tokio::task::spawn_blocking(move || driver.read_dom(&url, &selector, &wait))
        .await
        .map_err(|e| BrowserError::Join(e.to_string()))?
}

/// Drains `rx` until the network is idle or the deadline passes.
///
/// `started` is when observation began (the deadline is `started + timeout`)
/// and `navigated` is when the page finished loading (idle is only accepted
/// once `settle` has passed since then).
pub(crate) fn collect_until_idle(
    rx: &Receiver<ObservedRequest>,
    wait: &WaitPolicy,
    started: Instant,
    navigated: Instant,
) -> Vec<ObservedRequest> {
    let deadline = started + wait.timeout;
    let settled_at = navigated + wait.settle;
    let mut observed = Vec::new();

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let window = wait.idle_window.min(deadline - now);
        match rx.recv_timeout(window) {
            Ok(request) => observed.push(request),
            Err(RecvTimeoutError::Timeout) => {
                if Instant::now() >= settled_at {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    observed
}
