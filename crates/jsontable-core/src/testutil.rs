//! Mock fetcher and poller reporter for unit tests.
//!
//! State sits behind `Arc<Mutex<_>>` so clones handed to a poller still
//! record into the instance the test asserts on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{FetchRequest, FetchedDocument};
use crate::poller::{PollerEvent, PollerReporter};
use crate::traits::Fetcher;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns configurable documents and records requests.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns `fallback`.
    responses: Arc<Mutex<Vec<Result<serde_json::Value, AppError>>>>,
    fallback: serde_json::Value,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    /// Fetcher that always returns `data`.
    pub fn new(data: serde_json::Value) -> Self {
        Self::build(Vec::new(), data)
    }

    pub fn with_error(error: AppError) -> Self {
        Self::build(vec![Err(error)], serde_json::Value::Null)
    }

    pub fn with_responses(responses: Vec<Result<serde_json::Value, AppError>>) -> Self {
        Self::build(responses, serde_json::Value::Null)
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn build(responses: Vec<Result<serde_json::Value, AppError>>, fallback: serde_json::Value) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback,
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of concurrently running fetches observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(self.fallback.clone())
            } else {
                responses.remove(0)
            }
        };

        next.map(|data| FetchedDocument {
            data,
            final_url: request.url.clone(),
            redirects: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Poller reporter that records event names in order.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PollerReporter for RecordingReporter {
    fn report(&self, event: PollerEvent<'_>) {
        let name = match event {
            PollerEvent::Started { .. } => "started",
            PollerEvent::FetchStarted { .. } => "fetch_started",
            PollerEvent::FetchSucceeded { .. } => "fetch_succeeded",
            PollerEvent::FetchFailed { .. } => "fetch_failed",
            PollerEvent::Stopped { .. } => "stopped",
        };
        self.events.lock().unwrap().push(name.to_string());
    }
}
