//! Upstream HTTP client
//!
//! Opens one connection per downstream call, writes the request, reads a
//! single response and closes the connection. Nothing is pooled, so dropping
//! the call future (e.g. when the inbound client disconnects) releases the
//! socket immediately.

use crate::config::UpstreamConfig;
use crate::http::chunked::decode_chunked;
use crate::http::headers::HeaderMap;
use crate::http::parser::{MAX_BODY_BYTES, MAX_HEADER_BYTES};
use crate::http::request::Method;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::proxy::registry::Service;
use anyhow::{Context, Result};
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default buffer size for reading responses
const BUFFER_SIZE: usize = 8192;

/// A request ready to be sent to a downstream service.
#[derive(Debug, Clone)]
pub struct DownstreamRequest<'a> {
    pub method: Method,
    pub service: &'a Service,
    /// Origin-form request-target, e.g. `/foo?x=1`.
    pub target: String,
    pub headers: HeaderMap,
    pub body: &'a [u8],
}

impl DownstreamRequest<'_> {
    pub fn url(&self) -> String {
        self.service.url_for(&self.target)
    }
}

/// Result of one downstream call.
#[derive(Debug)]
pub enum DownstreamOutcome {
    /// A response to relay.
    Success(Response),
    /// The TCP connection could not be established.
    ConnectFailure(String),
    /// Connecting, or waiting for the response, exceeded the client timeout.
    Timeout(String),
    /// An HTTP error status, when the client raises for status.
    UpstreamHttpError { status: StatusCode, message: String },
    /// The downstream sent something that is not a valid HTTP/1.x response.
    ProtocolFailure(String),
}

/// HTTP/1.1 client used for every forwarded request.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    /// Connection timeout duration
    connect_timeout: Duration,

    /// Time allowed to send the request and receive the full response
    request_timeout: Duration,

    /// Classify 4xx/5xx responses as errors instead of relaying them
    raise_for_status: bool,
}

impl UpstreamClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration, raise_for_status: bool) -> Self {
        Self {
            connect_timeout,
            request_timeout,
            raise_for_status,
        }
    }

    pub fn from_config(cfg: &UpstreamConfig) -> Self {
        Self::new(cfg.connect_timeout(), cfg.request_timeout(), cfg.raise_for_status)
    }

    /// Performs exactly one downstream call and classifies its outcome.
    pub async fn execute(&self, request: &DownstreamRequest<'_>) -> DownstreamOutcome {
        let addr = request.service.socket_addr();
        let url = request.url();

        let stream = match timeout(self.connect_timeout, TcpStream::connect(addr.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return DownstreamOutcome::ConnectFailure(format!(
                    "failed to connect to {addr}: {e}"
                ));
            }
            Err(_) => {
                return DownstreamOutcome::Timeout(format!(
                    "timed out connecting to {addr} after {}ms",
                    self.connect_timeout.as_millis()
                ));
            }
        };

        tracing::trace!(service = %request.service.name, %addr, "Connected to downstream");

        let response = match timeout(
            self.request_timeout,
            self.send_request_and_receive_response(stream, request),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return DownstreamOutcome::ProtocolFailure(format!(
                    "invalid response from {url}: {e:#}"
                ));
            }
            Err(_) => {
                return DownstreamOutcome::Timeout(format!(
                    "no response from {url} within {}ms",
                    self.request_timeout.as_millis()
                ));
            }
        };

        let status = response.status;
        if self.raise_for_status && (status.is_client_error() || status.is_server_error()) {
            let kind = if status.is_client_error() { "Client" } else { "Server" };
            return DownstreamOutcome::UpstreamHttpError {
                status,
                message: format!(
                    "{kind} error '{} {}' for url '{url}'",
                    status.as_u16(),
                    status.reason_phrase()
                ),
            };
        }

        DownstreamOutcome::Success(response)
    }

    /// Send request to downstream and receive response
    async fn send_request_and_receive_response(
        &self,
        mut stream: TcpStream,
        request: &DownstreamRequest<'_>,
    ) -> Result<Response> {
        let request_bytes = self.build_http_request(request);
        stream
            .write_all(&request_bytes)
            .await
            .context("failed to send request")?;
        stream.flush().await?;

        tracing::trace!("Request sent to downstream");

        self.read_http_response(&mut stream, request.method).await
    }

    /// Build HTTP request bytes to send to the downstream.
    ///
    /// End-to-end headers are copied in order; hop-by-hop headers are
    /// replaced by `Connection: close`.
    pub fn build_http_request(&self, request: &DownstreamRequest<'_>) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(512 + request.body.len());

        buffer.extend_from_slice(
            format!("{} {} HTTP/1.1\r\n", request.method, request.target).as_bytes(),
        );

        let mut headers = request.headers.clone();
        headers.strip_hop_by_hop();

        if !headers.contains_key("Host") {
            headers.append("Host", request.service.authority());
        }

        // a chunked inbound body is sent de-chunked
        if !request.body.is_empty() || headers.contains_key("Content-Length") {
            headers.insert("Content-Length", request.body.len().to_string());
        }

        headers.append("Connection", "close");

        for (key, value) in headers.iter() {
            buffer.extend_from_slice(format!("{key}: {value}\r\n").as_bytes());
        }

        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(request.body);

        buffer
    }

    /// Read one final HTTP response, skipping interim 1xx responses.
    async fn read_http_response(&self, stream: &mut TcpStream, method: Method) -> Result<Response> {
        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

        loop {
            let headers_end = loop {
                if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                    break end;
                }

                // Prevent unbounded header growth
                if buffer.len() > MAX_HEADER_BYTES {
                    anyhow::bail!("Response headers too large");
                }

                let n = stream.read_buf(&mut buffer).await?;
                if n == 0 {
                    anyhow::bail!("Connection closed before complete response received");
                }
            };

            let head = buffer.split_to(headers_end + 4);
            let (status, mut headers) = parse_response_head(&head)?;

            if (100..200).contains(&status.as_u16()) && status.as_u16() != 101 {
                tracing::trace!(status = status.as_u16(), "Skipping interim response");
                continue;
            }

            let has_body = method != Method::HEAD && !status.is_bodyless();

            let body = if !has_body {
                Vec::new()
            } else if headers.has_token("Transfer-Encoding", "chunked") {
                read_chunked_body(stream, &mut buffer).await?
            } else if let Some(length) = headers.get("Content-Length") {
                let length = length
                    .trim()
                    .parse::<usize>()
                    .context("Invalid Content-Length in response")?;
                if length > MAX_BODY_BYTES {
                    anyhow::bail!("Response body of {length} bytes exceeds {MAX_BODY_BYTES}");
                }
                read_sized_body(stream, &mut buffer, length).await?
            } else {
                read_body_until_close(stream, &mut buffer).await?
            };

            headers.strip_hop_by_hop();
            if has_body {
                headers.insert("Content-Length", body.len().to_string());
            }

            return Ok(ResponseBuilder::new(status)
                .headers(headers)
                .body(body)
                .build());
        }
    }
}

/// Parse a response status line and header block.
fn parse_response_head(head: &[u8]) -> Result<(StatusCode, HeaderMap)> {
    let head = std::str::from_utf8(head).context("Invalid UTF-8 in response headers")?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().context("Empty response")?;
    let parts: Vec<&str> = status_line.splitn(3, ' ').collect();

    if parts.len() < 2 || !parts[0].starts_with("HTTP/1.") {
        anyhow::bail!("Invalid status line: {status_line}");
    }

    let status = parts[1]
        .parse::<u16>()
        .ok()
        .and_then(StatusCode::from_u16)
        .with_context(|| format!("Invalid status code in '{status_line}'"))?;

    let mut headers = HeaderMap::new();
    for line in lines.filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once(':')
            .with_context(|| format!("Invalid response header '{line}'"))?;
        headers.append(key.trim(), value.trim());
    }

    Ok((status, headers))
}

async fn read_chunked_body(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<Vec<u8>> {
    loop {
        let decoded = decode_chunked(&buffer[..])
            .map_err(|e| anyhow::anyhow!("Invalid chunked body: {e:?}"))?;

        if let Some((body, consumed)) = decoded {
            buffer.advance(consumed);
            return Ok(body);
        }

        if buffer.len() > MAX_BODY_BYTES + MAX_HEADER_BYTES {
            anyhow::bail!("Chunked response body exceeds {MAX_BODY_BYTES} bytes");
        }
        if stream.read_buf(buffer).await? == 0 {
            anyhow::bail!("Connection closed before complete body received");
        }
    }
}

async fn read_sized_body(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    length: usize,
) -> Result<Vec<u8>> {
    while buffer.len() < length {
        buffer.reserve((length - buffer.len()).min(BUFFER_SIZE * 8));
        if stream.read_buf(buffer).await? == 0 {
            anyhow::bail!("Connection closed before complete body received");
        }
    }

    Ok(buffer.split_to(length).to_vec())
}

async fn read_body_until_close(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<Vec<u8>> {
    while stream.read_buf(buffer).await? != 0 {
        if buffer.len() > MAX_BODY_BYTES {
            anyhow::bail!("Response body exceeds {MAX_BODY_BYTES} bytes");
        }
    }
    Ok(buffer.split().to_vec())
}
