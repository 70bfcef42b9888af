//! Ordered middleware stages.
//!
//! Stages run outermost first on the way in. A stage may answer the request
//! itself, in which case the inner stages and the router are skipped. On the
//! way out, the response passes back through every stage that was entered,
//! innermost first.

use std::future::Future;

use crate::config::Config;
use crate::gateway::auth::AuthStage;
use crate::gateway::cors::CorsStage;
use crate::gateway::redirect::HttpsRedirectStage;
use crate::http::request::Request;
use crate::http::response::Response;

/// What a stage decided about an inbound request.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Respond(Response),
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_request(&self, request: &Request) -> Flow;

    fn on_response(&self, _request: &Request, _response: &mut Response) {}
}

#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The gateway's stage order: https-redirect, cors, auth.
    ///
    /// Redirects happen before anything else, and CORS sits outside auth so
    /// that preflights (which never carry credentials) are answered and auth
    /// rejections still carry CORS headers.
    pub fn from_config(cfg: &Config) -> Self {
        let mut pipeline = Self::new();
        if cfg.https_redirect.enabled {
            pipeline = pipeline.with_stage(HttpsRedirectStage);
        }
        if cfg.cors.enabled {
            pipeline = pipeline.with_stage(CorsStage::from_config(&cfg.cors));
        }
        pipeline.with_stage(AuthStage::from_config(&cfg.auth))
    }

    /// Appends `stage` inside the existing ones.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs `request` through every stage and then `handler`.
    pub async fn run<F, Fut>(&self, request: &Request, handler: F) -> Response
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut entered = 0;
        let mut short_circuit = None;

        for stage in &self.stages {
            entered += 1;
            if let Flow::Respond(response) = stage.on_request(request) {
                tracing::debug!(stage = stage.name(), "Stage answered request");
                short_circuit = Some(response);
                break;
            }
        }

        let mut response = match short_circuit {
            Some(response) => response,
            None => handler().await,
        };

        for stage in self.stages[..entered].iter().rev() {
            stage.on_response(request, &mut response);
        }

        response
    }
}
