//! Cross-origin resource sharing.

use crate::config::CorsConfig;
use crate::gateway::pipeline::{Flow, Stage};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};

const ALL_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";

pub struct CorsStage {
    allow_origins: Vec<String>,
    allow_methods: Vec<String>,
    allow_headers: Vec<String>,
    allow_credentials: bool,
    max_age_secs: u64,
}

impl CorsStage {
    pub fn from_config(cfg: &CorsConfig) -> Self {
        Self {
            allow_origins: cfg.allow_origins.clone(),
            allow_methods: cfg.allow_methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
            allow_headers: cfg.allow_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
            allow_credentials: cfg.allow_credentials,
            max_age_secs: cfg.max_age_secs,
        }
    }

    fn allows_all_origins(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.allows_all_origins() || self.allow_origins.iter().any(|o| o == origin)
    }

    fn method_allowed(&self, method: &str) -> bool {
        self.allow_methods.iter().any(|m| m == "*" || m == method)
    }

    fn headers_allowed(&self, requested: &str) -> bool {
        if self.allow_headers.iter().any(|h| h == "*") {
            return true;
        }
        requested
            .split(',')
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .all(|h| self.allow_headers.contains(&h))
    }

    /// Value for `Access-Control-Allow-Origin` in reply to `origin`.
    fn allow_origin_value<'a>(&self, origin: &'a str) -> &'a str {
        if self.allows_all_origins() && !self.allow_credentials {
            "*"
        } else {
            origin
        }
    }

    fn preflight(&self, request: &Request, origin: &str, requested_method: &str) -> Response {
        let requested_headers = request
            .header("Access-Control-Request-Headers")
            .unwrap_or_default();

        let mut failures = Vec::new();
        if !self.origin_allowed(origin) {
            failures.push("origin");
        }
        if !self.method_allowed(requested_method) {
            failures.push("method");
        }
        if !self.headers_allowed(requested_headers) {
            failures.push("headers");
        }

        if !failures.is_empty() {
            tracing::debug!(origin, ?failures, "Rejected CORS preflight");
            return ResponseBuilder::new(StatusCode::BAD_REQUEST)
                .header("Content-Type", "text/plain; charset=utf-8")
                .body(format!("Disallowed CORS {}", failures.join(", ")).into_bytes())
                .build();
        }

        let allow_methods = if self.allow_methods.iter().any(|m| m == "*") {
            ALL_METHODS.to_string()
        } else {
            self.allow_methods.join(", ")
        };

        let allow_headers = if self.allow_headers.iter().any(|h| h == "*") {
            requested_headers.to_string()
        } else {
            self.allow_headers.join(", ")
        };

        let mut builder = ResponseBuilder::new(StatusCode::OK)
            .header("Access-Control-Allow-Origin", self.allow_origin_value(origin))
            .header("Access-Control-Allow-Methods", allow_methods)
            .header("Access-Control-Max-Age", self.max_age_secs.to_string())
            .header("Vary", "Origin")
            .header("Content-Type", "text/plain; charset=utf-8");

        if !allow_headers.is_empty() {
            builder = builder.header("Access-Control-Allow-Headers", allow_headers);
        }
        if self.allow_credentials {
            builder = builder.header("Access-Control-Allow-Credentials", "true");
        }

        builder.body(b"OK".to_vec()).build()
    }
}

impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn on_request(&self, request: &Request) -> Flow {
        if request.method != Method::OPTIONS {
            return Flow::Continue;
        }

        match (
            request.header("Origin"),
            request.header("Access-Control-Request-Method"),
        ) {
            (Some(origin), Some(method)) => Flow::Respond(self.preflight(request, origin, method)),
            _ => Flow::Continue,
        }
    }

    fn on_response(&self, request: &Request, response: &mut Response) {
        let Some(origin) = request.header("Origin") else {
            return;
        };
        if !self.origin_allowed(origin) {
            return;
        }

        let headers = &mut response.headers;
        headers.insert("Access-Control-Allow-Origin", self.allow_origin_value(origin));
        if self.allow_credentials {
            headers.insert("Access-Control-Allow-Credentials", "true");
        }
        if !headers.has_token("Vary", "Origin") {
            headers.append("Vary", "Origin");
        }
    }
}
