//! Shared fixtures: fake downstream services and a running gateway.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use waypoint::config::Config;
use waypoint::gateway::Gateway;
use waypoint::http::parser::parse_http_request;
use waypoint::http::request::Request;
use waypoint::server::listener;

pub const VALID_AUTH: &str = "Bearer test-token";

/// A fake downstream that answers every request with a canned response.
pub struct Downstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Downstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of connections accepted so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

pub async fn spawn_downstream(response: &'static [u8]) -> Downstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let (task_hits, task_requests) = (Arc::clone(&hits), Arc::clone(&requests));
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            task_hits.fetch_add(1, Ordering::SeqCst);
            let requests = Arc::clone(&task_requests);

            tokio::spawn(async move {
                if let Some(request) = read_request(&mut socket).await {
                    requests.lock().unwrap().push(request);
                }
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Downstream {
        addr,
        hits,
        requests,
    }
}

/// A downstream that accepts connections and never answers.
pub async fn spawn_silent_downstream() -> Downstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let task_hits = Arc::clone(&hits);
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            task_hits.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    Downstream {
        addr,
        hits,
        requests: Arc::new(Mutex::new(Vec::new())),
    }
}

/// A downstream that never answers and reports when the gateway closes the
/// connection to it.
pub async fn spawn_hanging_downstream() -> (Downstream, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    let task_hits = Arc::clone(&hits);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            task_hits.fetch_add(1, Ordering::SeqCst);
            let closed_tx = closed_tx.clone();

            tokio::spawn(async move {
                let mut temp = [0u8; 1024];
                while let Ok(n) = socket.read(&mut temp).await {
                    if n == 0 {
                        break;
                    }
                }
                let _ = closed_tx.send(());
            });
        }
    });

    let downstream = Downstream {
        addr,
        hits,
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    (downstream, closed_rx)
}

/// An address nothing is listening on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn read_request(socket: &mut TcpStream) -> Option<Request> {
    let mut buffer = Vec::new();
    let mut temp = [0u8; 4096];
    loop {
        if let Ok((request, _)) = parse_http_request(&buffer) {
            return Some(request);
        }
        let n = socket.read(&mut temp).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&temp[..n]);
    }
}

pub fn config_with_services(services: &[(&str, String)]) -> Config {
    let mut cfg = Config::default();
    cfg.services = services
        .iter()
        .map(|(name, url)| (name.to_string(), url.clone()))
        .collect::<BTreeMap<_, _>>();
    cfg
}

/// Runs a gateway on an ephemeral port for the rest of the test.
pub async fn spawn_gateway(cfg: &Config) -> SocketAddr {
    let gateway = Arc::new(Gateway::from_config(cfg).unwrap());
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(listener::serve(socket, gateway, std::future::pending()));
    addr
}

/// Sends raw bytes and reads until the server closes the connection.
pub async fn send_raw(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Status code of a raw HTTP response.
pub fn status_of(raw: &str) -> u16 {
    raw.split(' ').nth(1).and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// Body of a raw HTTP response.
pub fn body_of(raw: &str) -> &str {
    raw.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}
