//! Maps an inbound request onto a gateway route.

use crate::gateway::HEALTH_CHECK_PATH;
use crate::http::request::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    HealthCheck,
    Forward { service: &'a str, path: &'a str },
    MethodNotAllowed { allow: &'static str },
    NotFound,
}

/// Resolves `route_path` (the request path without its query string).
///
/// `/{service}` and `/{service}/{path...}` forward; the sub-path is kept
/// exactly as received and may be empty.
pub fn resolve(method: Method, route_path: &str) -> Route<'_> {
    if route_path == HEALTH_CHECK_PATH {
        return match method {
            Method::GET => Route::HealthCheck,
            _ => Route::MethodNotAllowed { allow: "GET" },
        };
    }

    let Some(rest) = route_path.strip_prefix('/') else {
        return Route::NotFound;
    };
    let (service, path) = rest.split_once('/').unwrap_or((rest, ""));

    if service.is_empty() {
        return Route::NotFound;
    }
    if !method.is_forwardable() {
        return Route::MethodNotAllowed {
            allow: "GET, POST, PUT, DELETE, PATCH",
        };
    }

    Route::Forward { service, path }
}
