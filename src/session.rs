//! One automation context bound to a browser window/profile, registered
//! with the owning [`Drover`](crate::Drover) context for orderly shutdown.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::prelude::*;

use crate::element::Element;
use crate::error::{self, DroverError, Result};
use crate::poll::{self, Tick};
use crate::query::{self, Queryable};
use crate::registry;
use crate::snapshot;

/// Options for opening one automation session.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Browser profile directory; `None` uses a throwaway profile.
    pub profile_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub headless: bool,
    /// Default bound for every polled operation on the session.
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            profile_dir: None,
            width: 1920,
            height: 1080,
            headless: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Browser arguments derived from the options.
fn browser_args(options: &SessionOptions) -> Vec<String> {
    let mut args = vec![
        format!("--window-size={},{}", options.width, options.height),
        "--disable-notifications".to_string(),
    ];
    if options.headless {
        args.push("--headless".to_string());
    }
    if let Some(dir) = &options.profile_dir {
        args.push(format!("--user-data-dir={}", dir.display()));
    }
    args
}

/// Handle to one open session. Cheap to clone; all clones share the remote
/// session and the closed gate.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("timeout", &self.inner.timeout)
            .field("closed", &self.inner.closed)
            .finish_non_exhaustive()
    }
}

pub(crate) struct SessionInner {
    driver: WebDriver,
    timeout: Duration,
    id: u64,
    registry: Weak<registry::Inner>,
    closed: AtomicBool,
}

impl Session {
    pub(crate) async fn connect(
        hub: &str,
        options: SessionOptions,
        id: u64,
        registry: Weak<registry::Inner>,
    ) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in browser_args(&options) {
            caps.add_arg(&arg)?;
        }
        let driver = WebDriver::new(hub, caps).await?;
        Ok(Session {
            inner: Arc::new(SessionInner {
                driver,
                timeout: options.timeout,
                id,
                registry,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Default timeout bounding this session's polled operations.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub(crate) fn local_id(&self) -> u64 {
        self.inner.id
    }

    pub(crate) fn is_same(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Loads `url`. Transport and protocol errors surface unmodified.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.inner.driver.goto(url).await?;
        Ok(())
    }

    /// Resolves exactly one element, polling until it appears or the
    /// session timeout elapses ([`DroverError::NotFound`] on expiry).
    pub async fn locate_one(&self, xpath: &str) -> Result<Element> {
        query::locate_one(self, xpath, self.inner.timeout).await
    }

    /// [`locate_one`](Session::locate_one) with an explicit deadline.
    pub async fn locate_one_within(&self, xpath: &str, timeout: Duration) -> Result<Element> {
        query::locate_one(self, xpath, timeout).await
    }

    /// Resolves at least one element. An empty match set keeps polling
    /// exactly like not-found.
    pub async fn locate_many(&self, xpath: &str) -> Result<Vec<Element>> {
        query::locate_many(self, xpath, self.inner.timeout).await
    }

    /// Locates, scrolls the element into the viewport, waits until it is
    /// visually displayed, then clicks, all under one retry envelope.
    pub async fn click(&self, xpath: &str) -> Result<()> {
        query::click(self, xpath, self.inner.timeout).await
    }

    /// Waits until the engine reports ready and any of `xpaths` matches,
    /// returning the index of the first matching path in list order.
    pub async fn wait_for_any(&self, xpaths: &[&str]) -> Result<usize> {
        query::wait_for_any(self, xpaths, self.inner.timeout).await
    }

    /// Captures a screenshot and serves it on an ephemeral local port until
    /// it has been viewed.
    pub async fn capture_snapshot(&self) -> Result<()> {
        let png = self.inner.driver.screenshot_as_png().await?;
        snapshot::serve(png).await
    }

    /// Runs `op` under the session timeout, retrying on
    /// [`DroverError::NeedRetry`] and on stale-element failures. Any other
    /// error aborts immediately.
    pub async fn retry_on_stale<F, Fut>(&self, mut op: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        poll::poll_until(
            move || {
                let attempt = op();
                async move {
                    match attempt.await {
                        Ok(()) => Ok(Tick::Ready(())),
                        Err(DroverError::NeedRetry) => Ok(Tick::Pending),
                        Err(err) if err.is_stale() => Ok(Tick::Pending),
                        Err(err) => Err(err),
                    }
                }
            },
            self.inner.timeout,
        )
        .await
    }

    /// Deregisters the session and terminates the remote side. Exactly one
    /// remote close is ever issued, so racing a concurrent shutdown (or a
    /// second `close`) is a safe no-op.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.deregister(self).await;
        }
        self.inner.driver.clone().quit().await?;
        Ok(())
    }

    /// Executes `script` against this session with the given arguments.
    pub(crate) async fn execute(&self, script: &str, args: Vec<Value>) -> Result<()> {
        self.inner.driver.execute(script, args).await?;
        Ok(())
    }

    /// Whether the engine reports itself ready to take commands.
    pub(crate) async fn engine_ready(&self) -> Result<bool> {
        let status = self.inner.driver.status().await?;
        Ok(status.ready)
    }
}

#[async_trait]
impl Queryable for Session {
    async fn raw_find(&self, xpath: &str) -> Result<Element> {
        match self.inner.driver.find(By::XPath(xpath)).await {
            Ok(handle) => Ok(Element::new(self.clone(), handle)),
            Err(err) => Err(error::classify_find_error(err, xpath)),
        }
    }

    async fn raw_find_all(&self, xpath: &str) -> Result<Vec<Element>> {
        let handles = self
            .inner
            .driver
            .find_all(By::XPath(xpath))
            .await
            .map_err(|err| error::classify_find_error(err, xpath))?;
        if handles.is_empty() {
            return Err(DroverError::NotFound);
        }
        Ok(handles
            .into_iter()
            .map(|handle| Element::new(self.clone(), handle))
            .collect())
    }

    fn owner(&self) -> &Session {
        self
    }
}
