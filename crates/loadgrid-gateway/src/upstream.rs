//! HTTP client for talking to workers.
//!
//! A pooled hyper client with one timeout for reads and one for writes.
//! Every failure mode (connect error, timeout, non-2xx, undecodable body)
//! is reported as `UpstreamUnavailable` naming the app.

use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use loadgrid_core::{LoadgridError, LoadgridResult};

/// Longest slice of an error body quoted back to the caller.
const MAX_ERROR_EXCERPT: usize = 200;

#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Full<Bytes>>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            read_timeout,
            write_timeout,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// `GET {base}{path}`, decoded as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        app: &str,
        base: &Uri,
        path: &str,
    ) -> LoadgridResult<T> {
        let req = build_request(app, Method::GET, base, path, Bytes::new())?;
        self.send(app, req, self.read_timeout).await
    }

    /// `POST {base}{path}` with a JSON body, response decoded as JSON.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        app: &str,
        base: &Uri,
        path: &str,
        body: &B,
    ) -> LoadgridResult<T> {
        let bytes = serde_json::to_vec(body).map_err(|e| LoadgridError::upstream(app, e))?;
        let req = build_request(app, Method::POST, base, path, Bytes::from(bytes))?;
        self.send(app, req, self.write_timeout).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        app: &str,
        req: Request<Full<Bytes>>,
        timeout: Duration,
    ) -> LoadgridResult<T> {
        let method = req.method().clone();
        let uri = req.uri().clone();

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| LoadgridError::upstream(app, e))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| LoadgridError::upstream(app, e))?
                .to_bytes();
            Ok::<_, LoadgridError>((status, body))
        };

        let (status, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| {
                LoadgridError::upstream(app, format!("timed out after {}ms", timeout.as_millis()))
            })??;

        debug!(%app, %method, %uri, %status, "upstream call finished");

        if !status.is_success() {
            let excerpt: String = String::from_utf8_lossy(&body)
                .chars()
                .take(MAX_ERROR_EXCERPT)
                .collect();
            return Err(LoadgridError::upstream(app, format!("status {status}: {excerpt}")));
        }

        serde_json::from_slice(&body)
            .map_err(|e| LoadgridError::upstream(app, format!("invalid response body: {e}")))
    }
}

/// Join a worker base URL and an endpoint path.
pub fn join_url(base: &Uri, path: &str) -> Result<Uri, http::uri::InvalidUri> {
    let base = base.to_string();
    format!("{}{}", base.trim_end_matches('/'), path).parse()
}

fn build_request(
    app: &str,
    method: Method,
    base: &Uri,
    path: &str,
    body: Bytes,
) -> LoadgridResult<Request<Full<Bytes>>> {
    let uri = join_url(base, path).map_err(|e| LoadgridError::upstream(app, e))?;
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header("user-agent", "loadgrid-gateway/0.1")
        .body(Full::new(body))
        .map_err(|e| LoadgridError::upstream(app, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};

    async fn serve(app: Router) -> Uri {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}").parse().unwrap()
    }

    fn client() -> UpstreamClient {
        UpstreamClient::new(Duration::from_millis(300), Duration::from_millis(300))
    }

    #[test]
    fn join_url_handles_trailing_slash() {
        let base: Uri = "http://127.0.0.1:8001/".parse().unwrap();
        assert_eq!(join_url(&base, "/metrics").unwrap().to_string(), "http://127.0.0.1:8001/metrics");
        let base: Uri = "http://127.0.0.1:8001".parse().unwrap();
        assert_eq!(join_url(&base, "/health").unwrap().to_string(), "http://127.0.0.1:8001/health");
    }

    #[tokio::test]
    async fn get_and_post_json() {
        let base = serve(
            Router::new()
                .route("/value", get(|| async { axum::Json(serde_json::json!({"n": 1})) }))
                .route(
                    "/echo",
                    post(|axum::Json(v): axum::Json<serde_json::Value>| async move { axum::Json(v) }),
                ),
        )
        .await;

        let got: serde_json::Value = client().get_json("a", &base, "/value").await.unwrap();
        assert_eq!(got["n"], 1);

        let echoed: serde_json::Value = client()
            .post_json("a", &base, "/echo", &serde_json::json!({"processing": 5}))
            .await
            .unwrap();
        assert_eq!(echoed["processing"], 5);
    }

    #[tokio::test]
    async fn non_success_is_upstream_error() {
        let base = serve(Router::new().route(
            "/metrics",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let err = client()
            .get_json::<serde_json::Value>("inventory_system", &base, "/metrics")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn unreachable_is_upstream_error() {
        let base: Uri = "http://127.0.0.1:1".parse().unwrap();
        let err = client()
            .get_json::<serde_json::Value>("payment_processing", &base, "/metrics")
            .await
            .unwrap_err();
        assert!(matches!(err, LoadgridError::UpstreamUnavailable { ref app, .. } if app == "payment_processing"));
    }

    #[tokio::test]
    async fn slow_worker_times_out() {
        let base = serve(Router::new().route(
            "/metrics",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let err = client()
            .get_json::<serde_json::Value>("slow", &base, "/metrics")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
