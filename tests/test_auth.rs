//! Tests for the Authorization header gate

use waypoint::config::AuthConfig;
use waypoint::error::AuthError;
use waypoint::gateway::auth::{AuthGate, AuthStage};
use waypoint::gateway::pipeline::{Flow, Stage};
use waypoint::http::headers::HeaderMap;
use waypoint::http::request::{Method, RequestBuilder};

fn headers(authorization: Option<&str>) -> HeaderMap {
    let mut headers: HeaderMap = [("Host", "gateway.local")].into_iter().collect();
    if let Some(value) = authorization {
        headers.append("Authorization", value);
    }
    headers
}

#[test]
fn test_missing_header_is_rejected() {
    let gate = AuthGate::new("Bearer");
    assert_eq!(gate.check(&headers(None)), Err(AuthError::MissingAuthHeader));
}

#[test]
fn test_valid_header_is_admitted() {
    let gate = AuthGate::new("Bearer");
    let credential = gate.check(&headers(Some("Bearer abc.def.ghi"))).unwrap();

    assert_eq!(credential.scheme, "Bearer");
    assert_eq!(credential.token, "abc.def.ghi");
}

#[test]
fn test_header_name_is_case_insensitive() {
    let gate = AuthGate::new("Bearer");
    let headers: HeaderMap = [("authorization", "Bearer t")].into_iter().collect();

    assert!(gate.check(&headers).is_ok());
}

#[test]
fn test_malformed_shapes_are_rejected() {
    let gate = AuthGate::new("Bearer");
    let malformed = [
        "",
        "Bearer",
        "Bearertoken",
        "Bearer  token",
        "Bearer token extra",
        "Bearer ",
        " token",
        "Bearer\ttoken",
    ];

    for value in malformed {
        assert_eq!(
            gate.check(&headers(Some(value))),
            Err(AuthError::MalformedAuthHeader),
            "value {value:?}"
        );
    }
}

#[test]
fn test_scheme_compare_is_exact() {
    let gate = AuthGate::new("Bearer");

    for scheme in ["bearer", "BEARER", "Basic", "Token"] {
        let value = format!("{scheme} abc");
        assert_eq!(
            gate.check(&headers(Some(&value))),
            Err(AuthError::SchemeMismatch {
                found: scheme.to_string()
            })
        );
    }
}

#[test]
fn test_first_authorization_header_wins() {
    let gate = AuthGate::new("Bearer");
    let headers: HeaderMap = [("Authorization", "Basic x"), ("Authorization", "Bearer y")]
        .into_iter()
        .collect();

    assert!(matches!(
        gate.check(&headers),
        Err(AuthError::SchemeMismatch { .. })
    ));
}

#[test]
fn test_credential_debug_redacts_token() {
    let gate = AuthGate::new("Bearer");
    let credential = gate.check(&headers(Some("Bearer s3cr3t"))).unwrap();

    let debug = format!("{credential:?}");
    assert!(!debug.contains("s3cr3t"));
    assert!(debug.contains("Bearer"));
}

#[test]
fn test_stage_skips_exempt_paths() {
    let stage = AuthStage::from_config(&AuthConfig::default());
    let request = RequestBuilder::new()
        .method(Method::GET)
        .path("/health-check?verbose=1")
        .build()
        .unwrap();

    assert!(matches!(stage.on_request(&request), Flow::Continue));
}

#[test]
fn test_stage_rejects_with_configured_status() {
    let stage = AuthStage::from_config(&AuthConfig {
        reject_status: 403,
        ..AuthConfig::default()
    });
    let request = RequestBuilder::new()
        .method(Method::GET)
        .path("/echo/foo")
        .build()
        .unwrap();

    match stage.on_request(&request) {
        Flow::Respond(response) => {
            assert_eq!(response.status.as_u16(), 403);
            assert!(!response.headers.contains_key("WWW-Authenticate"));

            let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
            assert_eq!(body["detail"], "Authorization header is missing");
        }
        Flow::Continue => panic!("request without Authorization must be rejected"),
    }
}

#[test]
fn test_stage_401_carries_challenge() {
    let stage = AuthStage::from_config(&AuthConfig::default());
    let request = RequestBuilder::new()
        .method(Method::POST)
        .path("/echo")
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .build()
        .unwrap();

    let Flow::Respond(response) = stage.on_request(&request) else {
        panic!("wrong scheme must be rejected");
    };
    assert_eq!(response.status.as_u16(), 401);
    assert_eq!(response.headers.get("WWW-Authenticate"), Some("Bearer"));

    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["detail"].as_str().unwrap().contains("Basic"));
}
