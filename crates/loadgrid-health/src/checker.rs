//! Probing and status tracking for one app.
//!
//! `http_probe` does a single `GET` over a fresh HTTP/1 connection.
//! `HealthTracker` turns a stream of probe results into a status and the
//! delay before the next probe.

use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use http::uri::Authority;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use tracing::debug;

use loadgrid_core::{HealthSettings, HealthStatus};

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// 2xx from the health endpoint.
    Healthy,
    /// Any other status code.
    Unhealthy,
    /// No response: refused, reset, or timed out.
    Failed,
}

/// Probe outcome with the detail `/services/status` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub result: ProbeResult,
    pub response_code: Option<u16>,
    pub error: Option<String>,
}

impl ProbeReport {
    fn from_code(code: u16) -> Self {
        if (200..300).contains(&code) {
            Self {
                result: ProbeResult::Healthy,
                response_code: Some(code),
                error: None,
            }
        } else {
            Self {
                result: ProbeResult::Unhealthy,
                response_code: Some(code),
                error: Some(format!("status {code}")),
            }
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            result: ProbeResult::Failed,
            response_code: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.result == ProbeResult::Healthy
    }
}

/// Status state machine for one app.
///
/// `Unknown` until the first probe. Any success makes the app `Healthy`;
/// `unhealthy_threshold` consecutive failures make it `Unhealthy`. While
/// failing, the probe delay doubles up to `max_backoff`.
#[derive(Debug)]
pub struct HealthTracker {
    status: HealthStatus,
    consecutive_failures: u32,
    unhealthy_threshold: u32,
    interval: Duration,
    max_backoff: Duration,
    delay: Duration,
}

impl HealthTracker {
    pub fn new(settings: &HealthSettings) -> Self {
        let interval = settings.interval();
        Self {
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            unhealthy_threshold: settings.unhealthy_threshold.max(1),
            interval,
            max_backoff: settings.max_backoff().max(interval),
            delay: interval,
        }
    }

    /// Feed one probe result; returns the status after it.
    pub fn record(&mut self, result: ProbeResult) -> HealthStatus {
        if result == ProbeResult::Healthy {
            self.consecutive_failures = 0;
            self.delay = self.interval;
            self.status = HealthStatus::Healthy;
            return self.status;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.delay = self.delay.saturating_mul(2).min(self.max_backoff);
        if self.consecutive_failures >= self.unhealthy_threshold {
            self.status = HealthStatus::Unhealthy;
        }
        self.status
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Delay before the next probe.
    pub fn next_interval(&self) -> Duration {
        self.delay
    }
}

/// Probe `{base}{path}` once, bounded by `timeout`. A path on `base` is kept.
pub async fn http_probe(base: &Uri, path: &str, timeout: Duration) -> ProbeReport {
    let Some(authority) = base.authority().cloned() else {
        return ProbeReport::failed(format!("no host in {base}"));
    };

    let path = request_path(base, path);
    let path = path.as_str();

    match tokio::time::timeout(timeout, fetch_status(&authority, path)).await {
        Ok(Ok(code)) => {
            let report = ProbeReport::from_code(code);
            if !report.is_healthy() {
                debug!(%authority, path, code, "health probe non-2xx");
            }
            report
        }
        Ok(Err(e)) => {
            debug!(%authority, path, error = %e, "health probe failed");
            ProbeReport::failed(e)
        }
        Err(_) => {
            debug!(%authority, path, "health probe timed out");
            ProbeReport::failed(format!("timed out after {}ms", timeout.as_millis()))
        }
    }
}

/// `path` appended to the base URL's own path, e.g. `/users` + `/health`.
fn request_path(base: &Uri, path: &str) -> String {
    let prefix = base.path().trim_end_matches('/');
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

/// One `GET` over a dedicated connection; returns the status code.
async fn fetch_status(authority: &Authority, path: &str) -> Result<u16, String> {
    let port = authority.port_u16().unwrap_or(80);
    // IPv6 literals keep their brackets in the authority.
    let host = authority.host().trim_start_matches('[').trim_end_matches(']');
    let stream = tokio::net::TcpStream::connect((host, port))
        .await
        .map_err(|e| format!("connect: {e}"))?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| format!("handshake: {e}"))?;
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::get(path)
        .header(http::header::HOST, authority.as_str())
        .header(http::header::USER_AGENT, "loadgrid-health/0.1")
        .body(Empty::<Bytes>::new())
        .map_err(|e| e.to_string())?;

    let resp = sender.send_request(req).await.map_err(|e| e.to_string())?;
    Ok(resp.status().as_u16())
}
