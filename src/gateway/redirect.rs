//! HTTP -> HTTPS redirect.
//!
//! TLS is terminated in front of the gateway, so the original scheme is
//! read from `X-Forwarded-Proto`.

use crate::gateway::pipeline::{Flow, Stage};
use crate::http::request::Request;
use crate::http::response::{ResponseBuilder, StatusCode};

pub struct HttpsRedirectStage;

impl Stage for HttpsRedirectStage {
    fn name(&self) -> &'static str {
        "https-redirect"
    }

    fn on_request(&self, request: &Request) -> Flow {
        let secure = request
            .header("X-Forwarded-Proto")
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        if secure {
            return Flow::Continue;
        }

        let Some(host) = request.header("Host") else {
            return Flow::Respond(
                ResponseBuilder::new(StatusCode::BAD_REQUEST)
                    .body(b"Host header required".to_vec())
                    .build(),
            );
        };

        // default ports are dropped for the https origin
        let host = host.strip_suffix(":80").unwrap_or(host);
        let location = format!("https://{host}{}", request.path);

        Flow::Respond(
            ResponseBuilder::new(StatusCode::TEMPORARY_REDIRECT)
                .header("Location", location)
                .build(),
        )
    }
}
