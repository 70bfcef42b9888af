//! Authorization header gate.
//!
//! Only the *shape* of the header and its scheme are checked. The token is
//! accepted as-is: nothing verifies that it is a real credential.

use std::fmt;

use crate::config::AuthConfig;
use crate::error::{AuthError, GatewayError};
use crate::gateway::pipeline::{Flow, Stage};
use crate::http::headers::HeaderMap;
use crate::http::request::Request;
use crate::http::response::StatusCode;

/// The `(scheme, token)` pair taken from an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub scheme: String,
    pub token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    expected_scheme: String,
}

impl AuthGate {
    pub fn new(expected_scheme: impl Into<String>) -> Self {
        Self {
            expected_scheme: expected_scheme.into(),
        }
    }

    pub fn expected_scheme(&self) -> &str {
        &self.expected_scheme
    }

    /// Admits or rejects a request based on its headers.
    ///
    /// The value must be exactly `<scheme> <token>`: one space, both parts
    /// non-empty, and the scheme byte-equal to the expected one.
    pub fn check(&self, headers: &HeaderMap) -> Result<Credential, AuthError> {
        let value = headers
            .get("Authorization")
            .ok_or(AuthError::MissingAuthHeader)?;

        let mut parts = value.split(' ');
        let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) if !scheme.is_empty() && !token.is_empty() => {
                (scheme, token)
            }
            _ => return Err(AuthError::MalformedAuthHeader),
        };

        if scheme != self.expected_scheme {
            return Err(AuthError::SchemeMismatch {
                found: scheme.to_string(),
            });
        }

        Ok(Credential {
            scheme: scheme.to_string(),
            token: token.to_string(),
        })
    }
}

/// Pipeline stage applying the [`AuthGate`] to every non-exempt path.
pub struct AuthStage {
    gate: AuthGate,
    exempt_paths: Vec<String>,
    reject_status: StatusCode,
}

impl AuthStage {
    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self {
            gate: AuthGate::new(cfg.scheme.clone()),
            exempt_paths: cfg.exempt_paths.clone(),
            reject_status: StatusCode::from_u16(cfg.reject_status).unwrap_or(StatusCode::UNAUTHORIZED),
        }
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
    }
}

impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn on_request(&self, request: &Request) -> Flow {
        if self.is_exempt(request.route_path()) {
            return Flow::Continue;
        }

        match self.gate.check(&request.headers) {
            Ok(credential) => {
                tracing::trace!(scheme = %credential.scheme, "Request admitted");
                Flow::Continue
            }
            Err(e) => {
                tracing::warn!(
                    method = %request.method,
                    path = %request.route_path(),
                    reason = %e,
                    "Request rejected by auth gate"
                );

                let mut response = GatewayError::Auth {
                    status: self.reject_status,
                    reason: e,
                }
                .into_response();
                if self.reject_status == StatusCode::UNAUTHORIZED {
                    response
                        .headers
                        .insert("WWW-Authenticate", self.gate.expected_scheme());
                }
                Flow::Respond(response)
            }
        }
    }
}
