//! Shared helpers for the lifecycle integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use vra_core::client::{ApiClient, ConvergencePolicy};
use vra_lifecycle::{LifecycleClient, LockRegistry};
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

/// Lifecycle client pointed at `server` with a fresh lock registry.
pub fn client(server: &MockServer, policy: ConvergencePolicy) -> LifecycleClient {
    client_for(&server.uri(), policy)
}

/// Lifecycle client pointed at an arbitrary base URL.
pub fn client_for(base_url: &str, policy: ConvergencePolicy) -> LifecycleClient {
    let api = ApiClient::builder(base_url)
        .unwrap()
        .with_token("test-token")
        .build()
        .unwrap();
    LifecycleClient::new(api, Arc::new(LockRegistry::new())).with_policy(policy)
}

/// Policy with millisecond bounds and a fixed interval.
pub fn policy(max_wait_ms: u64, interval_ms: u64) -> ConvergencePolicy {
    ConvergencePolicy::new()
        .with_max_wait(Duration::from_millis(max_wait_ms))
        .with_interval(Duration::from_millis(interval_ms))
}

/// Responder that records when each request arrived.
#[derive(Clone)]
pub struct Recorder {
    arrivals: Arc<Mutex<Vec<(String, Instant)>>>,
    template: ResponseTemplate,
}

impl Recorder {
    pub fn new(template: ResponseTemplate) -> Self {
        Self {
            arrivals: Arc::new(Mutex::new(Vec::new())),
            template,
        }
    }

    /// Recorder sharing this one's arrival log but answering with `template`.
    pub fn answering(&self, template: ResponseTemplate) -> Self {
        Self {
            arrivals: Arc::clone(&self.arrivals),
            template,
        }
    }

    /// `(method, arrival)` pairs in arrival order.
    pub fn arrivals(&self) -> Vec<(String, Instant)> {
        let mut arrivals = self.arrivals.lock().unwrap().clone();
        arrivals.sort_by_key(|(_, at)| *at);
        arrivals
    }
}

impl Respond for Recorder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.arrivals
            .lock()
            .unwrap()
            .push((request.method.to_string(), Instant::now()));
        self.template.clone()
    }
}
