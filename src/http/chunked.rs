//! `Transfer-Encoding: chunked` body decoding.

use crate::http::parser::MAX_BODY_BYTES;

#[derive(Debug, PartialEq, Eq)]
pub enum ChunkedError {
    InvalidChunkSize,
    MissingChunkTerminator,
    /// The decoded body would exceed [`MAX_BODY_BYTES`].
    BodyTooLarge,
}

/// Decodes a chunked body from the start of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the decoded body
/// and the number of bytes consumed (including the trailer section). A chunk
/// size that would take the body past [`MAX_BODY_BYTES`] is rejected as soon
/// as its size line arrives.
pub fn decode_chunked(buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, ChunkedError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let Some(line_end) = find_crlf(&buf[pos..]) else {
            return Ok(None);
        };
        let size_line = std::str::from_utf8(&buf[pos..pos + line_end])
            .map_err(|_| ChunkedError::InvalidChunkSize)?;
        // chunk extensions follow a ';'
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16).map_err(|_| ChunkedError::InvalidChunkSize)?;
        pos += line_end + 2;

        if size == 0 {
            // trailer fields up to an empty line
            loop {
                let Some(line_end) = find_crlf(&buf[pos..]) else {
                    return Ok(None);
                };
                pos += line_end + 2;
                if line_end == 0 {
                    return Ok(Some((body, pos)));
                }
            }
        }

        if size > MAX_BODY_BYTES - body.len() {
            return Err(ChunkedError::BodyTooLarge);
        }

        let Some(frame_end) = pos.checked_add(size).and_then(|end| end.checked_add(2)) else {
            return Err(ChunkedError::InvalidChunkSize);
        };
        if buf.len() < frame_end {
            return Ok(None);
        }
        let chunk_end = frame_end - 2;
        body.extend_from_slice(&buf[pos..chunk_end]);
        if &buf[chunk_end..frame_end] != b"\r\n" {
            return Err(ChunkedError::MissingChunkTerminator);
        }
        pos = frame_end;
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
