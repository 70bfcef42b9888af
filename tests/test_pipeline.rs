//! Tests for stage ordering, HTTPS redirects and CORS

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use waypoint::config::{Config, CorsConfig};
use waypoint::gateway::cors::CorsStage;
use waypoint::gateway::pipeline::{Flow, Pipeline, Stage};
use waypoint::gateway::redirect::HttpsRedirectStage;
use waypoint::http::request::{Method, Request, RequestBuilder};
use waypoint::http::response::{Response, StatusCode};

/// Records the order in which it sees requests and responses.
struct Probe {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    answer: bool,
}

impl Stage for Probe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_request(&self, _request: &Request) -> Flow {
        self.log.lock().unwrap().push(format!("in:{}", self.name));
        if self.answer {
            Flow::Respond(Response::error(StatusCode::FORBIDDEN, self.name))
        } else {
            Flow::Continue
        }
    }

    fn on_response(&self, _request: &Request, _response: &mut Response) {
        self.log.lock().unwrap().push(format!("out:{}", self.name));
    }
}

fn request(method: Method, path: &str, headers: &[(&str, &str)]) -> Request {
    let mut builder = RequestBuilder::new().method(method).path(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.build().unwrap()
}

#[test]
fn test_default_stage_order() {
    let mut cfg = Config::default();
    assert_eq!(Pipeline::from_config(&cfg).stage_names(), vec!["cors", "auth"]);

    cfg.https_redirect.enabled = true;
    assert_eq!(
        Pipeline::from_config(&cfg).stage_names(),
        vec!["https-redirect", "cors", "auth"]
    );

    cfg.cors.enabled = false;
    assert_eq!(
        Pipeline::from_config(&cfg).stage_names(),
        vec!["https-redirect", "auth"]
    );
}

#[tokio::test]
async fn test_stages_wrap_the_handler_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new()
        .with_stage(Probe { name: "outer", log: Arc::clone(&log), answer: false })
        .with_stage(Probe { name: "inner", log: Arc::clone(&log), answer: false });

    let handler_log = Arc::clone(&log);
    let response = pipeline
        .run(&request(Method::GET, "/x", &[]), || async move {
            handler_log.lock().unwrap().push("handler".to_string());
            Response::not_found()
        })
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["in:outer", "in:inner", "handler", "out:inner", "out:outer"]
    );
}

#[tokio::test]
async fn test_short_circuit_skips_inner_stages_and_handler() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new()
        .with_stage(Probe { name: "outer", log: Arc::clone(&log), answer: false })
        .with_stage(Probe { name: "gate", log: Arc::clone(&log), answer: true })
        .with_stage(Probe { name: "inner", log: Arc::clone(&log), answer: false });

    let handler_ran = AtomicBool::new(false);
    let response = pipeline
        .run(&request(Method::GET, "/x", &[]), || async {
            handler_ran.store(true, Ordering::SeqCst);
            Response::not_found()
        })
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(!handler_ran.load(Ordering::SeqCst));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["in:outer", "in:gate", "out:gate", "out:outer"]
    );
}

#[test]
fn test_redirect_plain_http_to_https() {
    let stage = HttpsRedirectStage;
    let req = request(Method::GET, "/echo/foo?x=1", &[("Host", "api.example.com:80")]);

    let Flow::Respond(response) = stage.on_request(&req) else {
        panic!("plain HTTP must be redirected");
    };
    assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers.get("Location"),
        Some("https://api.example.com/echo/foo?x=1")
    );
}

#[test]
fn test_redirect_passes_forwarded_https() {
    let stage = HttpsRedirectStage;
    let req = request(
        Method::GET,
        "/echo/foo",
        &[("Host", "api.example.com"), ("X-Forwarded-Proto", "https")],
    );

    assert!(matches!(stage.on_request(&req), Flow::Continue));
}

#[test]
fn test_cors_rejects_disallowed_preflight() {
    let stage = CorsStage::from_config(&CorsConfig {
        allow_origins: vec!["https://app.example.com".to_string()],
        allow_methods: vec!["GET".to_string()],
        allow_headers: vec!["Authorization".to_string()],
        ..CorsConfig::default()
    });
    let req = request(
        Method::OPTIONS,
        "/echo/foo",
        &[
            ("Origin", "https://evil.example.com"),
            ("Access-Control-Request-Method", "DELETE"),
            ("Access-Control-Request-Headers", "X-Secret"),
        ],
    );

    let Flow::Respond(response) = stage.on_request(&req) else {
        panic!("preflight must be answered");
    };
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, b"Disallowed CORS origin, method, headers".to_vec());
}

#[test]
fn test_cors_preflight_with_explicit_lists() {
    let stage = CorsStage::from_config(&CorsConfig {
        allow_origins: vec!["https://app.example.com".to_string()],
        allow_methods: vec!["GET".to_string(), "POST".to_string()],
        allow_headers: vec!["Authorization".to_string(), "Content-Type".to_string()],
        allow_credentials: false,
        ..CorsConfig::default()
    });
    let req = request(
        Method::OPTIONS,
        "/echo/foo",
        &[
            ("Origin", "https://app.example.com"),
            ("Access-Control-Request-Method", "POST"),
            ("Access-Control-Request-Headers", "authorization, content-type"),
        ],
    );

    let Flow::Respond(response) = stage.on_request(&req) else {
        panic!("preflight must be answered");
    };
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers.get("Access-Control-Allow-Origin"),
        Some("https://app.example.com")
    );
    assert_eq!(response.headers.get("Access-Control-Allow-Methods"), Some("GET, POST"));
    assert_eq!(response.headers.get("Access-Control-Max-Age"), Some("600"));
    assert!(!response.headers.contains_key("Access-Control-Allow-Credentials"));
}

#[test]
fn test_cors_wildcard_without_credentials_uses_star() {
    let stage = CorsStage::from_config(&CorsConfig {
        allow_credentials: false,
        ..CorsConfig::default()
    });
    let req = request(Method::GET, "/echo/foo", &[("Origin", "https://a.example")]);
    let mut response = Response::not_found();

    assert!(matches!(stage.on_request(&req), Flow::Continue));
    stage.on_response(&req, &mut response);

    assert_eq!(response.headers.get("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(response.headers.get("Vary"), Some("Origin"));
}

#[test]
fn test_cors_ignores_requests_without_origin() {
    let stage = CorsStage::from_config(&CorsConfig::default());
    let req = request(Method::OPTIONS, "/echo/foo", &[]);
    let mut response = Response::not_found();

    assert!(matches!(stage.on_request(&req), Flow::Continue));
    stage.on_response(&req, &mut response);
    assert!(!response.headers.contains_key("Access-Control-Allow-Origin"));
}
