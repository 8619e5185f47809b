//! Wait for the front end, then open it
//!
//! A background task polls the URL once per tick and reports readiness over
//! a oneshot channel. The foreground races that signal against the deadline.
//! The poller runs under a child cancellation token that is cancelled on
//! return, so it never outlives the wait.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use homeport_kube::MIN_POLL_INTERVAL;
use reqwest::StatusCode;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{InstallError, Result};
use crate::preflight::challenges_with_marker;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// How the URL reached the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Browser opened
    Launched { url: String },

    /// Browser could not be opened; the user must open `url` themselves
    Manual { url: String, reason: String },

    /// Launch not requested
    Skipped { url: String },
}

impl LaunchOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Launched { url } | Self::Manual { url, .. } | Self::Skipped { url } => url,
        }
    }
}

/// Opens a URL for the user
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, url: &str) -> std::io::Result<()>;
}

/// The platform's default browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

#[async_trait]
impl BrowserLauncher for SystemBrowser {
    async fn launch(&self, url: &str) -> std::io::Result<()> {
        let mut command = match std::env::consts::OS {
            "macos" => tokio::process::Command::new("open"),
            "windows" => {
                let mut c = tokio::process::Command::new("cmd");
                c.args(["/C", "start", ""]);
                c
            }
            _ => tokio::process::Command::new("xdg-open"),
        };

        let status = command
            .arg(url)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!("browser launcher exited with {}", status)))
        }
    }
}

/// Records launched URLs instead of opening them
#[derive(Debug, Default, Clone)]
pub struct RecordingBrowser {
    urls: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launch fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserLauncher for RecordingBrowser {
    async fn launch(&self, url: &str) -> std::io::Result<()> {
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
        if self.fail {
            return Err(std::io::Error::other("no display available"));
        }
        Ok(())
    }
}

/// Readiness wait with deadline
pub struct LivenessGate {
    http: reqwest::Client,
    marker: String,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
}

impl LivenessGate {
    pub fn new(marker: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            marker: marker.into(),
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            cancel,
        }
    }

    /// Poll cadence; zero is raised to the minimum tick
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait until `url` answers `200`, or `401` with our realm
    pub async fn wait_ready(&self, url: &str) -> Result<()> {
        let target = Url::parse(url).map_err(|e| InstallError::LivenessRequest {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let token = self.cancel.child_token();
        let _guard = token.clone().drop_guard();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(poll_ready(
            self.http.clone(),
            target,
            self.marker.clone(),
            self.interval,
            token,
            tx,
        ));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(InstallError::Cancelled),
            _ = tokio::time::sleep(self.timeout) => Err(InstallError::LivenessTimeout {
                url: url.to_string(),
                timeout: self.timeout,
            }),
            result = rx => match result {
                Ok(result) => result,
                // poller gone without a verdict
                Err(_) => Err(InstallError::LivenessTimeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }),
            },
        }
    }

    /// Wait for readiness, then hand the URL to `launcher`
    ///
    /// A failed launch is not an error; the URL is returned for the user to
    /// open by hand.
    pub async fn wait_ready_then_launch(
        &self,
        url: &str,
        launcher: &dyn BrowserLauncher,
    ) -> Result<LaunchOutcome> {
        self.wait_ready(url).await?;

        match launcher.launch(url).await {
            Ok(()) => {
                tracing::info!(url, "opened browser");
                Ok(LaunchOutcome::Launched {
                    url: url.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to open browser");
                Ok(LaunchOutcome::Manual {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

async fn poll_ready(
    http: reqwest::Client,
    url: Url,
    marker: String,
    interval: Duration,
    token: CancellationToken,
    tx: oneshot::Sender<Result<()>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let request = match http.get(url.clone()).build() {
            Ok(request) => request,
            Err(e) => {
                let _ = tx.send(Err(InstallError::LivenessRequest {
                    url: url.to_string(),
                    message: e.to_string(),
                }));
                return;
            }
        };

        let response = tokio::select! {
            _ = token.cancelled() => return,
            response = http.execute(request) => response,
        };

        match response {
            Ok(resp) if resp.status() == StatusCode::OK => {
                let _ = tx.send(Ok(()));
                return;
            }
            Ok(resp)
                if resp.status() == StatusCode::UNAUTHORIZED
                    && challenges_with_marker(resp.headers(), &marker) =>
            {
                let _ = tx.send(Ok(()));
                return;
            }
            Ok(resp) => tracing::debug!(url = %url, status = %resp.status(), "not ready yet"),
            Err(e) => tracing::debug!(url = %url, error = %e, "not reachable yet"),
        }
    }
}
