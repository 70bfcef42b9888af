use crate::http::chunked::{decode_chunked, ChunkedError};
use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Request};

/// Largest header block accepted from a client.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Largest message body buffered in either direction.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    InvalidContentLength,
    InvalidChunkedBody,
    HeadersTooLarge,
    BodyTooLarge,
    Incomplete,
}

impl From<ChunkedError> for ParseError {
    fn from(e: ChunkedError) -> Self {
        match e {
            ChunkedError::BodyTooLarge => ParseError::BodyTooLarge,
            _ => ParseError::InvalidChunkedBody,
        }
    }
}

pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = match find_headers_end(buf) {
        Some(end) => end,
        None if buf.len() > MAX_HEADER_BYTES => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes)
        .map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || !version.starts_with("HTTP/1.") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    // Headers
    let mut headers = HeaderMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or(ParseError::InvalidHeader)?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::InvalidHeader);
        }
        headers.append(key, value.trim());
    }

    // Body
    if headers.has_token("Transfer-Encoding", "chunked") {
        let Some((body, consumed)) = decode_chunked(body_bytes)? else {
            // framing overhead is bounded; anything past it never completes
            if body_bytes.len() > MAX_BODY_BYTES + MAX_HEADER_BYTES {
                return Err(ParseError::BodyTooLarge);
            }
            return Err(ParseError::Incomplete);
        };

        let request = Request {
            method,
            path: path.to_string(),
            version: version.to_string(),
            headers,
            body,
        };
        return Ok((request, headers_end + 4 + consumed));
    }

    let content_length = headers
        .get("Content-Length")
        .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()?
        .unwrap_or(0);

    if content_length > MAX_BODY_BYTES {
        return Err(ParseError::BodyTooLarge);
    }
    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let body = body_bytes[..content_length].to_vec();

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
    };

    let total_consumed = headers_end + 4 + content_length;
    Ok((request, total_consumed))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
}
