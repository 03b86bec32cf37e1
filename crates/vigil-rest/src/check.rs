//! HTTP endpoint polling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use tracing::debug;

use vigil_core::{CheckStatus, ReportList};
use vigil_monitor::Check;

/// Turns a 200-response body into a report list. Implemented per
/// monitored service; a parse failure here is a check failure and ends
/// up as a `down` report.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, body: &str) -> anyhow::Result<ReportList>;
}

/// Check strategy that polls an HTTP API and validates its body.
pub struct RestCheck {
    id: String,
    name: String,
    api_url: String,
    timeout: Duration,
    validator: Arc<dyn Validator>,
}

impl RestCheck {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            api_url: api_url.into(),
            timeout,
            validator,
        }
    }
}

#[async_trait]
impl Check for RestCheck {
    async fn check(&self) -> anyhow::Result<ReportList> {
        let (status, body) = http_get(&self.api_url, self.timeout).await?;
        if status == 200 {
            return self.validator.validate(&body).await;
        }
        debug!(url = %self.api_url, status, "non-200 from monitored endpoint");
        Ok(ReportList::single(
            &self.id,
            &self.name,
            CheckStatus::Down,
            format!("invalid status {status}"),
        ))
    }
}

/// Plain HTTP/1.1 GET returning (status, body). One connection per
/// request; the check interval makes connection reuse pointless.
async fn http_get(url: &str, timeout: Duration) -> anyhow::Result<(u16, String)> {
    let uri: http::Uri = url.parse().with_context(|| format!("invalid url {url}"))?;
    // Only plain http is spoken here; probing an https endpoint over
    // cleartext would report a down service instead of the
    // misconfiguration.
    match uri.scheme_str() {
        Some("http") | None => {}
        Some(scheme) => {
            return Err(anyhow!("unsupported scheme {scheme} in url {url}, only http is supported"));
        }
    }
    let authority = uri
        .authority()
        .with_context(|| format!("url {url} has no authority"))?
        .clone();
    let port = uri.port_u16().unwrap_or(80);
    let address = format!("{}:{port}", authority.host());
    let path = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let response = tokio::time::timeout(timeout, async {
        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .with_context(|| format!("connect to {address} failed"))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(path.as_str())
            .header("host", authority.as_str())
            .header("user-agent", "vigil-rest/0.1")
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await?;
        let status = resp.status().as_u16();
        let collected = resp.into_body().collect().await?;
        let body = String::from_utf8_lossy(&collected.to_bytes()).into_owned();
        anyhow::Ok((status, body))
    })
    .await
    .map_err(|_| anyhow!("request to {url} timed out"))??;

    Ok(response)
}
