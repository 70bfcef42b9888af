use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::gateway::Gateway;
use crate::http::parser::{parse_http_request, ParseError, MAX_HEADER_BYTES};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
    state: ConnectionState,
    gateway: Arc<Gateway>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

/// What the read phase produced.
pub enum Incoming {
    Request(Request),
    Malformed(ParseError),
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, gateway: Arc<Gateway>) -> Self {
        Self {
            stream,
            peer,
            buffer: Vec::with_capacity(4096),
            state: ConnectionState::Reading,
            gateway,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await? {
                    Incoming::Request(req) => {
                        self.state = ConnectionState::Processing(req);
                    }
                    Incoming::Malformed(e) => {
                        tracing::warn!(peer = %self.peer, error = ?e, "Malformed request");
                        let mut response = malformed_response(&e);
                        response.headers.insert("Connection", "close");
                        self.state =
                            ConnectionState::Writing(ResponseWriter::new(&response), false);
                    }
                    Incoming::Closed => {
                        self.state = ConnectionState::Closed;
                    }
                },

                ConnectionState::Processing(req) => {
                    let keep_alive = req.keep_alive();

                    // A client that goes away cancels the in-flight downstream call.
                    let mut response = tokio::select! {
                        response = self.gateway.handle(&req) => response,
                        _ = wait_for_disconnect(&mut self.stream, &mut self.buffer) => {
                            tracing::info!(
                                peer = %self.peer,
                                method = %req.method,
                                path = %req.path,
                                "Client disconnected, abandoning request"
                            );
                            break;
                        }
                    };

                    if req.method == Method::HEAD {
                        response.body.clear();
                    }
                    if !keep_alive {
                        response.headers.insert("Connection", "close");
                    }

                    let writer = ResponseWriter::new(&response);
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn read_request(&mut self) -> anyhow::Result<Incoming> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    // Remove consumed bytes
                    self.buffer.drain(..consumed);
                    return Ok(Incoming::Request(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => return Ok(Incoming::Malformed(e)),
            }

            // Read more data
            let mut temp = [0u8; 4096];
            let n = self.stream.read(&mut temp).await?;

            if n == 0 {
                // Client closed connection
                return Ok(Incoming::Closed);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }
}

fn malformed_response(error: &ParseError) -> Response {
    match error {
        ParseError::HeadersTooLarge => Response::error(
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            "Request Header Fields Too Large",
        ),
        ParseError::BodyTooLarge => {
            Response::error(StatusCode::CONTENT_TOO_LARGE, "Content Too Large")
        }
        _ => Response::error(StatusCode::BAD_REQUEST, "Bad Request"),
    }
}

/// Resolves once the client closes its side of the connection.
///
/// Bytes that arrive meanwhile (a pipelined request) are kept in `buffer`.
/// A half-close (client shuts down writing but still reads) also resolves
/// this, so such a client's in-flight request is abandoned.
async fn wait_for_disconnect(stream: &mut TcpStream, buffer: &mut Vec<u8>) {
    let mut temp = [0u8; 1024];
    loop {
        if buffer.len() > MAX_HEADER_BYTES {
            return std::future::pending().await;
        }

        match stream.read(&mut temp).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buffer.extend_from_slice(&temp[..n]),
        }
    }
}
