//! Request forwarding to downstream services
//!
//! This module implements the forwarding half of the gateway: the static
//! service registry, the upstream HTTP client and the forwarder that ties
//! them together.

pub mod forwarder;
pub mod registry;
pub mod upstream;

pub use forwarder::Forwarder;
pub use registry::{Service, ServiceRegistry};
pub use upstream::{DownstreamOutcome, DownstreamRequest, UpstreamClient};
