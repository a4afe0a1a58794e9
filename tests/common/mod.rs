//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_api;

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use pagekit::data::{ApiResponse, DataError, Method, ModelDef, QueryParams, RestTransport};
use pagekit::events::EventBus;
use pagekit::page::{Page, PageHooks, Params, Query};
use parking_lot::Mutex;
use serde_json::Value;

/// One call seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub params: Option<QueryParams>,
}

/// In-process transport answering from a queue of canned responses.
///
/// With the queue empty it answers `{success: true, data: null}`.
#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<Result<ApiResponse, DataError>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, data: Value) {
        self.responses.lock().push_back(Ok(ApiResponse::ok(data)));
    }

    pub fn respond_with(&self, response: ApiResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn fail(&self, error: DataError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait(?Send)]
impl RestTransport for MockTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        params: Option<&QueryParams>,
    ) -> Result<ApiResponse, DataError> {
        self.calls.lock().push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.cloned(),
            params: params.cloned(),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::ok(Value::Null)))
    }
}

/// Ordered log shared between hooks, listeners and assertions.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Record every emission of `events` on `bus` by name.
    pub fn listen(&self, bus: &EventBus, events: &[&'static str]) {
        for event in events {
            let journal = self.clone();
            let name = *event;
            bus.on(name, move |_| {
                journal.push(name);
                Ok(())
            });
        }
    }
}

/// Page hooks that log `<label>.params`, `<label>.enter` and `<label>.exit`.
pub struct RecordingPageHooks {
    pub label: String,
    pub journal: Journal,
}

impl RecordingPageHooks {
    pub fn new(label: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            journal: journal.clone(),
        })
    }
}

#[async_trait(?Send)]
impl PageHooks for RecordingPageHooks {
    async fn on_params(&self, _page: &Page, _params: &Params, _query: &Query) -> anyhow::Result<()> {
        self.journal.push(format!("{}.params", self.label));
        Ok(())
    }

    async fn on_enter(&self, _page: &Page) -> anyhow::Result<()> {
        self.journal.push(format!("{}.enter", self.label));
        Ok(())
    }

    async fn on_exit(&self, _page: &Page) -> anyhow::Result<()> {
        self.journal.push(format!("{}.exit", self.label));
        Ok(())
    }
}

/// `users` model definition used across data tests.
pub fn user_def() -> Arc<ModelDef> {
    Arc::new(ModelDef::new("user", "/users"))
}

pub fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
