//! The gateway request handler.
//!
//! Every inbound request goes through the [`Pipeline`] and then the router:
//!
//! ```text
//! request -> https-redirect -> cors -> auth -> router
//!                                               ├─ /health-check      -> 200
//!                                               └─ /{service}/{path}  -> Forwarder
//! ```

pub mod auth;
pub mod cors;
pub mod pipeline;
pub mod redirect;
pub mod router;

use anyhow::Result;
use serde_json::json;

use crate::config::Config;
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::proxy::{Forwarder, ServiceRegistry, UpstreamClient};

pub use auth::{AuthGate, Credential};
pub use pipeline::{Flow, Pipeline, Stage};
pub use router::Route;

pub const HEALTH_CHECK_PATH: &str = "/health-check";

pub struct Gateway {
    pipeline: Pipeline,
    forwarder: Forwarder,
}

impl Gateway {
    pub fn new(pipeline: Pipeline, forwarder: Forwarder) -> Self {
        Self {
            pipeline,
            forwarder,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let registry = ServiceRegistry::from_config(&cfg.services)?;
        let client = UpstreamClient::from_config(&cfg.upstream);
        let pipeline = Pipeline::from_config(cfg);

        tracing::info!(
            services = ?registry.names(),
            stages = ?pipeline.stage_names(),
            "Gateway configured"
        );
        tracing::warn!(
            scheme = %cfg.auth.scheme,
            "Auth gate checks the Authorization scheme only; tokens are not verified"
        );

        Ok(Self::new(pipeline, Forwarder::new(registry, client)))
    }

    /// Produces the response for one inbound request.
    pub async fn handle(&self, request: &Request) -> Response {
        self.pipeline
            .run(request, || self.route(request))
            .await
    }

    async fn route(&self, request: &Request) -> Response {
        match router::resolve(request.method, request.route_path()) {
            Route::HealthCheck => health_check(),
            Route::Forward { service, path } => self
                .forwarder
                .forward(service, path, request)
                .await
                .unwrap_or_else(|e| e.into_response()),
            Route::MethodNotAllowed { allow } => Response::method_not_allowed(allow),
            Route::NotFound => Response::not_found(),
        }
    }
}

pub fn health_check() -> Response {
    Response::json(StatusCode::OK, &json!({ "status": "API Gateway is running!" }))
}
