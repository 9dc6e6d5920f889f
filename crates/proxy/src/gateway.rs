//! Request gateway to the search service
//!
//! A connection whose first line is a request line gets exactly one
//! request/response cycle: the request is re-issued against the search
//! service over the authenticated client, and the upstream status and
//! body come back verbatim. The client owns its own keep-alive pool,
//! independent of the ingestion pool.
//!
//! Errors always produce a response: 400 before the upstream was
//! contacted, 502 after. This path never publishes to the hub — requests
//! are not events.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use recap_event::LineReader;

/// End-to-end deadline for one proxied request
pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how requests are replayed
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Scheme, host, and port of the search service, no trailing slash
    pub base_url: String,
    /// Value the `Host` header is rewritten to
    pub host_override: String,
}

/// Errors while reading the client's request
#[derive(Debug, Error)]
enum RequestError {
    #[error("malformed request line")]
    BadRequestLine,

    #[error("malformed header: {0}")]
    BadHeader(String),

    #[error("invalid content length: {0}")]
    BadContentLength(String),

    #[error("connection ended mid-request")]
    Truncated,

    #[error("{0}")]
    Read(#[from] recap_event::EventError),
}

/// One parsed client request
#[derive(Debug)]
struct ClientRequest {
    method: reqwest::Method,
    target: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

/// Replays client requests against the search service
pub struct Gateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl Gateway {
    /// Build a gateway over a prepared (authenticated) client
    pub fn new(client: reqwest::Client, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    /// The configured upstream base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Serve one request/response cycle on an accepted connection
    ///
    /// `request_line` is the first line the classifier consumed.
    pub async fn handle<S>(&self, mut lines: LineReader<S>, request_line: &str)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = match read_request(request_line, &mut lines).await {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "rejecting malformed request");
                let (mut stream, _) = lines.into_parts();
                write_error(&mut stream, StatusCode::BAD_REQUEST, &format!("bad request: {e}"))
                    .await;
                return;
            }
        };

        debug!(method = %request.method, target = %request.target, "proxying request");
        let (mut stream, _) = lines.into_parts();

        match self.execute(request).await {
            Ok((status, headers, body)) => {
                if let Err(e) = write_response(&mut stream, status, &headers, &body).await {
                    debug!(error = %e, "failed to write response to client");
                }
            }
            Err(e) => {
                debug!(error = %e, "upstream request failed");
                write_error(
                    &mut stream,
                    StatusCode::BAD_GATEWAY,
                    &format!("upstream request failed: {e}"),
                )
                .await;
            }
        }
    }

    /// Re-issue the request upstream and collect the response
    async fn execute(
        &self,
        request: ClientRequest,
    ) -> Result<(StatusCode, HeaderMap, Bytes), reqwest::Error> {
        let url = format!("{}{}", self.config.base_url, request.target);
        let mut builder = self.client.request(request.method, url);

        for (name, value) in &request.headers {
            // Host is rewritten below; framing headers are recomputed.
            if name.eq_ignore_ascii_case("host")
                || name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("transfer-encoding")
                || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.header(reqwest::header::HOST, &self.config.host_override);

        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok((status, headers, body))
    }
}

/// Read request line, headers, and any Content-Length body
async fn read_request<S>(
    request_line: &str,
    lines: &mut LineReader<S>,
) -> Result<ClientRequest, RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = request_line.trim_end_matches('\r');
    let mut parts = line.split(' ');
    let (method, target) = match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version))
            if !target.is_empty() && version.starts_with("HTTP/") =>
        {
            (method, target)
        }
        _ => return Err(RequestError::BadRequestLine),
    };
    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| RequestError::BadRequestLine)?;

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let raw = lines.read_line().await?.ok_or(RequestError::Truncated)?;
        let header = std::str::from_utf8(&raw)
            .map_err(|_| RequestError::BadHeader("not UTF-8".into()))?
            .trim_end_matches('\r');
        if header.is_empty() {
            break;
        }
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| RequestError::BadHeader(header.to_string()))?;
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value
                .parse()
                .map_err(|_| RequestError::BadContentLength(value.to_string()))?;
        }
        headers.push((name.to_string(), value.to_string()));
    }

    let body = if content_length > 0 {
        lines.read_exact(content_length).await?
    } else {
        Bytes::new()
    };

    Ok(ClientRequest {
        method,
        target: target.to_string(),
        headers,
        body,
    })
}

/// Write a full response: status line, headers, blank line, body
async fn write_response<S: AsyncWrite + Unpin>(
    stream: &mut S,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> std::io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    for (name, value) in headers {
        // The body is relayed as one counted payload; upstream framing
        // headers no longer describe it.
        let name_str = name.as_str();
        if name_str.eq_ignore_ascii_case("content-length")
            || name_str.eq_ignore_ascii_case("transfer-encoding")
            || name_str.eq_ignore_ascii_case("connection")
        {
            continue;
        }
        if let Ok(value) = value.to_str() {
            head.push_str(name.as_str());
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await
}

/// Best-effort minimal error response
async fn write_error<S: AsyncWrite + Unpin>(stream: &mut S, status: StatusCode, message: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        message.len(),
        message
    );
    let _ = stream.write_all(response.as_bytes()).await;
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
