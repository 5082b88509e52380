//! Mock backend implementation for testing
//!
//! A configurable backend that can simulate successes, failures, and
//! latency without credentials or network access. Counters and recorded
//! payloads let tests verify exactly what the engine did.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::backend::Backend;
use crate::error::{PlatformError, Result};
use crate::types::{ContentType, MediaKind, PlatformResponse, PostPayload};

/// Shared observable state of a [`MockBackend`]
#[derive(Debug, Default)]
pub struct MockState {
    pub upload_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub connections_opened: AtomicUsize,
    pub connections_closed: AtomicUsize,
    pub submitted: Mutex<Vec<PostPayload>>,
}

/// Configurable mock backend
pub struct MockBackend {
    name: String,
    /// Submit attempts that fail before one succeeds (usize::MAX = always)
    submit_failures: usize,
    /// Upload attempts that fail before one succeeds (usize::MAX = always)
    upload_failures: usize,
    delay: Duration,
    unsupported: Vec<ContentType>,
    state: Arc<MockState>,
}

/// Opaque mock transport session
#[derive(Debug)]
pub struct MockConn {
    pub id: usize,
}

impl MockBackend {
    /// A backend where every operation succeeds
    pub fn success(name: &str) -> Self {
        Self {
            name: name.to_string(),
            submit_failures: 0,
            upload_failures: 0,
            delay: Duration::ZERO,
            unsupported: Vec::new(),
            state: Arc::new(MockState::default()),
        }
    }

    /// Submits fail `failures` times, then succeed
    pub fn submit_failing_then_success(name: &str, failures: usize) -> Self {
        Self {
            submit_failures: failures,
            ..Self::success(name)
        }
    }

    /// Every submit fails
    pub fn submit_failure(name: &str) -> Self {
        Self {
            submit_failures: usize::MAX,
            ..Self::success(name)
        }
    }

    /// Uploads fail `failures` times, then succeed
    pub fn upload_failing_then_success(name: &str, failures: usize) -> Self {
        Self {
            upload_failures: failures,
            ..Self::success(name)
        }
    }

    /// Every upload fails
    pub fn upload_failure(name: &str) -> Self {
        Self {
            upload_failures: usize::MAX,
            ..Self::success(name)
        }
    }

    /// Simulate network latency on upload and submit
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::success(name)
        }
    }

    /// Reject the given content types via [`Backend::supports`]
    pub fn without_support(name: &str, unsupported: Vec<ContentType>) -> Self {
        Self {
            unsupported,
            ..Self::success(name)
        }
    }

    /// Handle to the observable counters and recorded payloads
    pub fn state(&self) -> Arc<MockState> {
        self.state.clone()
    }

    pub fn upload_calls(&self) -> usize {
        self.state.upload_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.state.submit_calls.load(Ordering::SeqCst)
    }

    pub fn connections_opened(&self) -> usize {
        self.state.connections_opened.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.state.connections_closed.load(Ordering::SeqCst)
    }

    /// Payloads submitted so far, in completion order
    pub fn submitted(&self) -> Vec<PostPayload> {
        self.state.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Conn = MockConn;

    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, content_type: ContentType) -> bool {
        !self.unsupported.contains(&content_type)
    }

    async fn connect(&self) -> Result<MockConn> {
        let id = self.state.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockConn { id })
    }

    async fn close(&self, _conn: MockConn) {
        self.state.connections_closed.fetch_add(1, Ordering::SeqCst);
    }

    async fn upload_media(
        &self,
        _conn: &MockConn,
        file_ref: &str,
        kind: MediaKind,
    ) -> std::result::Result<String, PlatformError> {
        let call = self.state.upload_calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if call < self.upload_failures {
            return Err(PlatformError::Upload(format!(
                "mock upload of {} rejected",
                file_ref
            )));
        }

        Ok(format!("{}:media-{}-{}", self.name, kind, call))
    }

    async fn submit_post(
        &self,
        _conn: &MockConn,
        payload: &PostPayload,
    ) -> std::result::Result<PlatformResponse, PlatformError> {
        let call = self.state.submit_calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if call < self.submit_failures {
            return Err(PlatformError::Submit("mock submit rejected".to_string()));
        }

        self.state.submitted.lock().unwrap().push(payload.clone());

        Ok(PlatformResponse {
            post_id: format!("{}:post-{}", self.name, call),
            backend: self.name.clone(),
        })
    }
}
