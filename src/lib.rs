//! Waypoint - authenticating HTTP API gateway
//!
//! Core library: HTTP/1.1 wire handling, the middleware pipeline with its
//! auth gate, and request forwarding to named downstream services.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod proxy;
pub mod server;
