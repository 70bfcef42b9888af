//! Error types for request handling.
//!
//! Each variant is scoped to the request that produced it and is turned into
//! an HTTP response at the gateway boundary via [`GatewayError::into_response`].

use crate::http::response::{Response, StatusCode};

/// Rejections produced by the auth gate before any routing happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingAuthHeader,

    #[error("Authorization header must have the form '<scheme> <token>'")]
    MalformedAuthHeader,

    #[error("Authorization scheme '{found}' is not accepted")]
    SchemeMismatch { found: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("Service {0} not found")]
    ServiceNotFound(String),
}

/// Failures to complete the exchange with a downstream service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    ConnectFailure(String),

    #[error("{0}")]
    Timeout(String),

    /// The downstream answered with something that is not valid HTTP/1.x.
    #[error("{0}")]
    Protocol(String),
}

/// Errors that can occur while handling a gateway request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Rejected by the auth gate; `status` is the configured reject status.
    #[error("{reason}")]
    Auth {
        status: StatusCode,
        #[source]
        reason: AuthError,
    },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The downstream returned an HTTP error status; its code is passed through.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth { status, .. } => *status,
            GatewayError::Routing(RoutingError::ServiceNotFound(_)) => StatusCode::NOT_FOUND,
            GatewayError::Transport(TransportError::ConnectFailure(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Transport(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Transport(TransportError::Protocol(_)) => StatusCode::BAD_GATEWAY,
            GatewayError::Upstream { status, .. } => *status,
        }
    }

    pub fn into_response(self) -> Response {
        Response::error(self.status(), &self.to_string())
    }
}
