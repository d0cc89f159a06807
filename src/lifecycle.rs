//! Supervision of the engine process: detect an instance that is already
//! listening, or spawn one and health-check it, and stop an owned process
//! exactly once.

use std::process::Stdio;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::process::{Child, Command};
use tokio::time::sleep;

use crate::error::{DroverError, Result};

/// Lowest accepted engine port; rejects the privileged range and the usual
/// system services.
const MIN_PORT: u16 = 1000;
/// Startup health-check allowance, one probe per second.
const STARTUP_PROBE_ATTEMPTS: u32 = 30;
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_secs(1);
/// How long a stopping engine gets between the shutdown request and the
/// hard kill.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);
/// Per-request bound on health probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const SHUTDOWN_PATH: &str = "/shutdown";

/// A supervised engine process: either spawned by this program ("owned")
/// or detected already listening on the target port ("adopted").
#[derive(Debug)]
pub struct DriverProcess {
    port: u16,
    base: String,
    child: Option<Child>,
    shutdown_path: Option<&'static str>,
    http: reqwest::Client,
}

impl DriverProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base address of the engine, e.g. `http://localhost:9515`.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Endpoint session traffic goes to.
    pub fn hub_url(&self) -> String {
        format!("{}/wd/hub", self.base)
    }

    /// True when this program spawned the process and is responsible for
    /// stopping it. An adopted process is never killed.
    pub fn is_owned(&self) -> bool {
        self.child.is_some()
    }

    /// Stops an owned process and waits for it to exit; an adopted one is
    /// left running untouched.
    ///
    /// Prefers the engine's shutdown endpoint (older engine generations
    /// expose it, newer ones dropped it) and falls back to killing the
    /// child directly. A stop that ends in the kill signal is a clean
    /// outcome, not an error.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Some(path) = self.shutdown_path {
            let url = format!("{}{}", self.base, path);
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match tokio::time::timeout(STOP_GRACE_PERIOD, child.wait()).await {
                        Ok(status) => {
                            let status = status?;
                            tracing::debug!(%status, "driver exited");
                            return Ok(());
                        }
                        Err(_) => {
                            tracing::warn!(
                                port = self.port,
                                "driver ignored the shutdown request, killing it"
                            );
                        }
                    }
                }
                Ok(resp) => {
                    tracing::debug!(
                        status = %resp.status(),
                        "shutdown endpoint unavailable, killing driver"
                    );
                }
                Err(err) => {
                    tracing::debug!(error = %err, "shutdown request failed, killing driver");
                }
            }
        }

        child.kill().await?;
        Ok(())
    }
}

/// Acquires the engine process for `exe` on `port`: adopts an already
/// healthy instance when one is listening, otherwise spawns a new one and
/// health-checks it once per second for up to 30 seconds.
///
/// `debug` wires the child's output streams through to the caller's.
pub async fn acquire(exe: &str, port: u16, debug: bool) -> Result<DriverProcess> {
    if exe.trim().is_empty() {
        return Err(DroverError::Startup("driver executable path is empty".into()));
    }
    if port < MIN_PORT {
        return Err(DroverError::Startup(format!(
            "driver port {port} is below {MIN_PORT}"
        )));
    }

    let http = reqwest::Client::builder()
        .no_proxy()
        .timeout(PROBE_TIMEOUT)
        .build()?;
    let base = format!("http://localhost:{port}");

    if engine_alive(&http, &base).await {
        tracing::info!(port, "adopting already-running driver");
        return Ok(DriverProcess {
            port,
            base,
            child: None,
            shutdown_path: Some(SHUTDOWN_PATH),
            http,
        });
    }

    tracing::info!(port, exe, "starting driver");
    let mut cmd = Command::new(exe);
    cmd.arg(format!("--port={port}"))
        .arg("--url-base=wd/hub")
        .arg("--verbose")
        .kill_on_drop(true);
    if debug {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    let mut child = cmd
        .spawn()
        .map_err(|err| DroverError::Startup(format!("failed to launch {exe}: {err}")))?;

    for _ in 0..STARTUP_PROBE_ATTEMPTS {
        sleep(STARTUP_PROBE_INTERVAL).await;
        if engine_alive(&http, &base).await {
            return Ok(DriverProcess {
                port,
                base,
                child: Some(child),
                shutdown_path: Some(SHUTDOWN_PATH),
                http,
            });
        }
        if let Some(status) = child.try_wait()? {
            return Err(DroverError::Startup(format!(
                "driver exited during startup with {status}"
            )));
        }
    }

    let _ = child.kill().await;
    Err(DroverError::Startup(format!(
        "no healthy driver on port {port} after {STARTUP_PROBE_ATTEMPTS}s"
    )))
}

/// One status probe. Forbidden and BadRequest count as "alive" for engine
/// generations that predate the ok response.
async fn engine_alive(http: &reqwest::Client, base: &str) -> bool {
    match http.get(format!("{base}/status")).send().await {
        Ok(resp) => matches!(
            resp.status(),
            StatusCode::OK | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
impl DriverProcess {
    pub(crate) fn for_tests(
        port: u16,
        child: Option<Child>,
        shutdown_path: Option<&'static str>,
    ) -> Self {
        DriverProcess {
            port,
            base: format!("http://127.0.0.1:{port}"),
            child,
            shutdown_path,
            http: reqwest::Client::builder()
                .no_proxy()
                .timeout(PROBE_TIMEOUT)
                .build()
                .unwrap(),
        }
    }
}
