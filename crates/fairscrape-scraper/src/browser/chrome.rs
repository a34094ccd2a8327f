//! [`BrowserDriver`] backed by a locally installed Chrome/Chromium via
//! `headless_chrome`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::{RequestPausedDecision, Tab};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::{Browser, LaunchOptions};
use serde_json::Value;

use super::{collect_until_idle, BrowserDriver, ObservedRequest, WaitPolicy};
use crate::error::BrowserError;

/// Extra idle time granted to the browser process beyond the caller's timeout.
const BROWSER_IDLE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct ChromeOptions {
    /// Explicit browser binary; auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
    /// Containers usually lack the kernel features Chrome's sandbox needs.
    pub sandbox: bool,
}

impl ChromeOptions {
    /// Reads `CHROME_PATH` and disables the sandbox inside containers.
    #[must_use]
    pub fn from_env() -> Self {
        let in_container = std::path::Path::new("/.dockerenv").exists()
            || std::env::var_os("container").is_some();
        Self {
            chrome_path: std::env::var_os("CHROME_PATH").map(PathBuf::from),
            sandbox: !in_container,
        }
    }
}

/// Launches a fresh headless browser for every call.
#[derive(Debug, Clone, Default)]
pub struct ChromeDriver {
    options: ChromeOptions,
}

impl ChromeDriver {
    #[must_use]
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }

    fn launch(&self, wait: &WaitPolicy) -> Result<Browser, BrowserError> {
        let options = LaunchOptions::default_builder()
            .sandbox(self.options.sandbox)
            .path(self.options.chrome_path.clone())
            .idle_browser_timeout(wait.timeout + BROWSER_IDLE_GRACE)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))
    }

    fn open(browser: &Browser, wait: &WaitPolicy) -> Result<Arc<Tab>, BrowserError> {
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        tab.set_default_timeout(wait.timeout);
        Ok(tab)
    }
}

impl BrowserDriver for ChromeDriver {
    fn observe_requests(
        &self,
        url: &str,
        wait: &WaitPolicy,
    ) -> Result<Vec<ObservedRequest>, BrowserError> {
        let started = Instant::now();
        let browser = self.launch(wait)?;
        let tab = Self::open(&browser, wait)?;

        let (tx, rx) = mpsc::channel::<ObservedRequest>();
        let tx = Mutex::new(tx);
        tab.enable_fetch(None, None)
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        tab.enable_request_interception(Arc::new(
            move |_transport: Arc<Transport>, _session: SessionId, event: RequestPausedEvent| {
                if let Some(request) = observed_from_event(&event) {
                    if let Ok(tx) = tx.lock() {
                        // The receiver is gone once collection ends; later requests are irrelevant.
                        let _ = tx.send(request);
                    }
                }
                RequestPausedDecision::Continue(None)
            },
        ))
        .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        if let Err(err) = tab.navigate_to(url).and_then(|t| t.wait_until_navigated()) {
            return Err(BrowserError::Navigation {
                url: url.to_owned(),
                reason: err.to_string(),
            });
        }
        let navigated = Instant::now();

        let observed = collect_until_idle(&rx, wait, started, navigated);
        tracing::debug!(url, observed = observed.len(), "browser observation complete");

        // Dropping the browser kills the process.
        drop(tab);
        drop(browser);
        Ok(observed)
    }

    fn read_dom(
        &self,
        url: &str,
        selector: &str,
        wait: &WaitPolicy,
    ) -> Result<Vec<String>, BrowserError> {
        let browser = self.launch(wait)?;
        let tab = Self::open(&browser, wait)?;

        if let Err(err) = tab.navigate_to(url).and_then(|t| t.wait_until_navigated()) {
            return Err(BrowserError::Navigation {
                url: url.to_owned(),
                reason: err.to_string(),
            });
        }
        std::thread::sleep(wait.settle);

        let texts = match tab.find_elements(selector) {
            Ok(elements) => elements
                .iter()
                .filter_map(|el| el.get_inner_text().ok())
                .collect(),
            // No matching element is an empty page, not a failure.
            Err(_) => Vec::new(),
        };
        tracing::debug!(url, selector, elements = texts.len(), "browser DOM read complete");

        drop(tab);
        drop(browser);
        Ok(texts)
    }
}

/// Converts a paused request into an [`ObservedRequest`].
///
/// Works on the event's JSON form so the protocol struct layout stays an
/// implementation detail of `headless_chrome`.
fn observed_from_event(event: &RequestPausedEvent) -> Option<ObservedRequest> {
    let request = serde_json::to_value(&event.params.request).ok()?;
    observed_from_json(&request)
}

pub(super) fn observed_from_json(request: &Value) -> Option<ObservedRequest> {
    let url = request.get("url")?.as_str()?.to_owned();
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("GET")
        .to_owned();
    let headers = request
        .get("headers")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.to_ascii_lowercase(), value)
                })
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();
    let body = request
        .get("postData")
        .and_then(Value::as_str)
        .map(str::to_owned);

    Some(ObservedRequest {
        url,
        method,
        headers,
        body,
    })
}
