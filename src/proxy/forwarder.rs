//! Request forwarding
//!
//! Resolves the target service, dispatches a single downstream call and
//! translates its outcome into a gateway response.

use crate::error::{GatewayError, RoutingError, TransportError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::proxy::registry::ServiceRegistry;
use crate::proxy::upstream::{DownstreamOutcome, DownstreamRequest, UpstreamClient};

pub struct Forwarder {
    registry: ServiceRegistry,
    client: UpstreamClient,
}

impl Forwarder {
    pub fn new(registry: ServiceRegistry, client: UpstreamClient) -> Self {
        Self { registry, client }
    }

    /// Forwards `request` to `path` on `service`.
    ///
    /// Attempted exactly once; an unknown service never reaches the network.
    pub async fn forward(
        &self,
        service: &str,
        path: &str,
        request: &Request,
    ) -> Result<Response, GatewayError> {
        let target_service = self
            .registry
            .resolve(service)
            .ok_or_else(|| RoutingError::ServiceNotFound(service.to_string()))?;

        let downstream = DownstreamRequest {
            method: request.method,
            service: target_service,
            target: target_service.request_target(path, request.query()),
            headers: request.headers.clone(),
            body: &request.body,
        };

        tracing::debug!(
            service,
            method = %request.method,
            url = %downstream.url(),
            "Forwarding request"
        );

        let outcome = self.client.execute(&downstream).await;
        let result = translate(outcome);

        match &result {
            Ok(response) => tracing::info!(
                service,
                method = %request.method,
                path = %request.path,
                status = response.status.as_u16(),
                "Request forwarded"
            ),
            Err(e) => tracing::warn!(
                service,
                method = %request.method,
                path = %request.path,
                status = e.status().as_u16(),
                error = %e,
                "Forwarding failed"
            ),
        }

        result
    }
}

/// Maps a downstream outcome onto the gateway's result.
pub fn translate(outcome: DownstreamOutcome) -> Result<Response, GatewayError> {
    match outcome {
        DownstreamOutcome::Success(response) => Ok(response),
        DownstreamOutcome::ConnectFailure(detail) => {
            Err(TransportError::ConnectFailure(detail).into())
        }
        DownstreamOutcome::Timeout(detail) => Err(TransportError::Timeout(detail).into()),
        DownstreamOutcome::ProtocolFailure(detail) => Err(TransportError::Protocol(detail).into()),
        DownstreamOutcome::UpstreamHttpError { status, message } => {
            Err(GatewayError::Upstream { status, message })
        }
    }
}
