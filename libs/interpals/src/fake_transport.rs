//! In-memory transport for unit tests
//!
//! Answers every request through a handler closure and records what was sent.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use common::InterpalsResult;
use common::config::DEFAULT_BASE_URL;

use crate::transport::{HttpRequest, HttpResponse, Transport};

type Handler = Box<dyn Fn(&HttpRequest) -> InterpalsResult<HttpResponse> + Send + Sync>;

pub struct FakeTransport {
    handler: Handler,
    sent: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
    base_url: String,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> InterpalsResult<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
            latency: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Delay every answer by `latency` (tokio time, so a paused clock applies)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Requests sent so far, oldest first
    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: HttpRequest) -> InterpalsResult<HttpResponse> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.sent.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}
