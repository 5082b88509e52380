//! Dispatcher wiring rate limiting, pooling, retry, upload caching and
//! scheduling into one posting engine
//!
//! One dispatcher per backend connector. `submit` either executes the
//! request immediately or queues it for its due time; a background runner
//! drains the queue. `shutdown` stops the runner and closes idle
//! connections, and is safe to call more than once.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::backend::Backend;
use crate::config::DispatcherConfig;
use crate::error::{PulsepostError, Result};
use crate::media_cache::MediaUploadCache;
use crate::pool::ConnectionPool;
use crate::queue::{run_scheduler, ScheduledPostQueue};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::types::{PlatformResponse, PostPayload, PostRequest, ScheduleAck, SubmitOutcome};

/// Shared state behind the dispatcher, also held by the runner task
struct Inner<B: Backend> {
    backend: Arc<B>,
    limiter: RateLimiter,
    pool: ConnectionPool<B>,
    retry: RetryPolicy,
    media_cache: MediaUploadCache,
    queue: Arc<ScheduledPostQueue>,
}

impl<B: Backend> Inner<B> {
    /// Execute one post now: lease a connection, upload media if the
    /// request carries any, submit, and return the connection on every path.
    async fn execute(&self, request: &PostRequest) -> Result<PlatformResponse> {
        // Submit token comes first; a leased connection never sits idle
        // through a token wait.
        self.limiter.acquire(1).await?;
        let conn = self.pool.acquire().await?;
        let result = self.execute_on(&conn, request).await;
        self.pool.release(conn).await;
        result
    }

    async fn execute_on(&self, conn: &B::Conn, request: &PostRequest) -> Result<PlatformResponse> {
        let media_id = match request.content_type.media_kind() {
            Some(kind) => {
                let id = self
                    .media_cache
                    .get_or_upload(&request.content, kind, || async {
                        self.limiter.acquire(1).await?;
                        self.retry
                            .run("upload media", || {
                                self.backend.upload_media(conn, &request.content, kind)
                            })
                            .await
                    })
                    .await?;
                Some(id)
            }
            None => None,
        };

        let payload = PostPayload {
            text: match media_id {
                Some(_) => String::new(),
                None => request.content.clone(),
            },
            caption: request.caption.clone(),
            media_id,
        };

        let response = self
            .retry
            .run("submit post", || self.backend.submit_post(conn, &payload))
            .await?;

        info!(
            request_id = %request.id,
            backend = %response.backend,
            post_id = %response.post_id,
            "post submitted"
        );
        Ok(response)
    }
}

/// Posting engine for a single backend
pub struct Dispatcher<B: Backend> {
    inner: Arc<Inner<B>>,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl<B: Backend> Dispatcher<B> {
    /// Build the engine around `backend` and start the scheduled-post
    /// runner. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a config error when the rate-limit settings are invalid
    /// (non-positive refill rate).
    pub fn new(backend: B, config: DispatcherConfig) -> Result<Self> {
        let limiter =
            RateLimiter::new(config.rate_limit.capacity, config.rate_limit.rate_per_sec)?;

        let backend = Arc::new(backend);
        let queue = Arc::new(ScheduledPostQueue::new());

        let inner = Arc::new(Inner {
            backend: backend.clone(),
            limiter,
            pool: ConnectionPool::new(backend, config.pool.size),
            retry: RetryPolicy::from_config(&config.retry),
            media_cache: MediaUploadCache::new(config.media_cache.capacity),
            queue: queue.clone(),
        });

        let runner = {
            let inner = inner.clone();
            tokio::spawn(run_scheduler(
                queue,
                config.scheduler.clone(),
                move |request| {
                    // Fire and forget: one due post must not delay the next
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        if let Err(e) = inner.execute(&request).await {
                            error!(request_id = %request.id, "scheduled post failed: {}", e);
                        }
                    });
                    Ok(())
                },
            ))
        };

        Ok(Self {
            inner,
            runner: Mutex::new(Some(runner)),
        })
    }

    /// Post `request` now, or queue it when its due time is in the future.
    ///
    /// Requests due in the past execute immediately. Validation failures
    /// are returned before any network activity.
    pub async fn submit(&self, request: PostRequest) -> Result<SubmitOutcome> {
        self.validate(&request)?;

        if let Some(due_time) = request.due_time {
            let now = chrono::Utc::now().timestamp();
            if due_time > now {
                let ack = ScheduleAck {
                    request_id: request.id.clone(),
                    due_time,
                };
                self.inner.queue.push(due_time, request).await;
                return Ok(SubmitOutcome::Scheduled(ack));
            }
            debug!(request_id = %request.id, due_time, "due time already passed, posting now");
        }

        let response = self.inner.execute(&request).await?;
        Ok(SubmitOutcome::Posted(response))
    }

    /// Submit many requests concurrently.
    ///
    /// Returns one result per input, in input order. A failing request
    /// never affects its neighbours.
    pub async fn submit_batch(&self, requests: Vec<PostRequest>) -> Vec<Result<SubmitOutcome>> {
        futures::future::join_all(requests.into_iter().map(|request| self.submit(request))).await
    }

    /// Stop the scheduled-post runner and close idle connections.
    ///
    /// Idempotent; repeated calls are no-ops. Posts already executing are
    /// left to finish on their own.
    pub async fn shutdown(&self) {
        let handle = self.runner.lock().await.take();
        let handle = match handle {
            Some(handle) => handle,
            None => {
                debug!("shutdown already performed");
                return;
            }
        };

        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("scheduled post runner ended abnormally: {}", e),
        }

        self.inner.pool.drain().await;
        info!(backend = self.inner.backend.name(), "dispatcher shut down");
    }

    /// Number of posts waiting in the schedule queue
    pub async fn pending_scheduled(&self) -> usize {
        self.inner.queue.len().await
    }

    fn validate(&self, request: &PostRequest) -> Result<()> {
        if request.content.trim().is_empty() {
            return Err(PulsepostError::InvalidContent(
                "post content is empty".to_string(),
            ));
        }
        if !self.inner.backend.supports(request.content_type) {
            return Err(PulsepostError::UnsupportedContentType(request.content_type));
        }
        if let Some(due_time) = request.due_time {
            if due_time < 0 {
                return Err(PulsepostError::InvalidSchedule(format!(
                    "due time {} is not a valid Unix timestamp",
                    due_time
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::types::ContentType;
    use std::time::Duration;

    fn fast_config() -> DispatcherConfig {
        let mut config = DispatcherConfig::default();
        config.rate_limit.capacity = 100;
        config.rate_limit.rate_per_sec = 1000.0;
        config.retry.base_delay_ms = 10;
        config
    }

    fn dispatcher(backend: MockBackend) -> Dispatcher<MockBackend> {
        Dispatcher::new(backend, fast_config()).unwrap()
    }

    #[tokio::test]
    async fn test_submit_text_posts_immediately() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        let outcome = engine
            .submit(PostRequest::text("Hello world"))
            .await
            .unwrap();

        let response = outcome.response().expect("should post immediately");
        assert_eq!(response.backend, "mock");
        let submitted = state.submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].text, "Hello world");
        assert_eq!(submitted[0].media_id, None);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_media_uploads_then_posts() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        let request = PostRequest::media(ContentType::Image, "/tmp/sunset.jpg")
            .with_caption("Golden hour");
        engine.submit(request).await.unwrap();

        let submitted = state.submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].media_id.is_some());
        assert_eq!(submitted[0].caption, Some("Golden hour".to_string()));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_repeat_media_upload_is_cached() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        for _ in 0..2 {
            engine
                .submit(PostRequest::media(ContentType::Image, "/tmp/a.jpg"))
                .await
                .unwrap();
        }

        use std::sync::atomic::Ordering;
        assert_eq!(state.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.submit_calls.load(Ordering::SeqCst), 2);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_transient_submit_failure_is_retried() {
        let backend = MockBackend::submit_failing_then_success("mock", 2);
        let state = backend.state();
        let engine = dispatcher(backend);

        let outcome = engine.submit(PostRequest::text("persistent")).await.unwrap();

        assert!(outcome.response().is_some());
        use std::sync::atomic::Ordering;
        assert_eq!(state.submit_calls.load(Ordering::SeqCst), 3);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_operation_failed() {
        let engine = dispatcher(MockBackend::submit_failure("mock"));

        let result = engine.submit(PostRequest::text("doomed")).await;

        match result {
            Err(PulsepostError::OperationFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("Expected OperationFailed, got {:?}", other.err()),
        }

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_content_rejected_before_network() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        let result = engine.submit(PostRequest::text("   ")).await;

        assert!(matches!(result, Err(PulsepostError::InvalidContent(_))));
        use std::sync::atomic::Ordering;
        assert_eq!(state.submit_calls.load(Ordering::SeqCst), 0);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_unsupported_content_type_rejected() {
        let backend = MockBackend::without_support("mock", vec![ContentType::Video]);
        let engine = dispatcher(backend);

        let result = engine
            .submit(PostRequest::media(ContentType::Video, "/tmp/clip.mp4"))
            .await;

        assert!(matches!(
            result,
            Err(PulsepostError::UnsupportedContentType(ContentType::Video))
        ));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_negative_due_time_rejected() {
        let engine = dispatcher(MockBackend::success("mock"));

        let result = engine.submit(PostRequest::text("when?").due_at(-5)).await;

        assert!(matches!(result, Err(PulsepostError::InvalidSchedule(_))));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_past_due_time_posts_immediately() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        let yesterday = chrono::Utc::now().timestamp() - 86_400;
        let outcome = engine
            .submit(PostRequest::text("late").due_at(yesterday))
            .await
            .unwrap();

        assert!(!outcome.is_scheduled());
        use std::sync::atomic::Ordering;
        assert_eq!(state.submit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.pending_scheduled().await, 0);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_future_due_time_is_queued() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        let in_an_hour = chrono::Utc::now().timestamp() + 3_600;
        let request = PostRequest::text("later").due_at(in_an_hour);
        let request_id = request.id.clone();
        let outcome = engine.submit(request).await.unwrap();

        match outcome {
            SubmitOutcome::Scheduled(ack) => {
                assert_eq!(ack.request_id, request_id);
                assert_eq!(ack.due_time, in_an_hour);
            }
            SubmitOutcome::Posted(_) => panic!("Expected the request to be queued"),
        }
        use std::sync::atomic::Ordering;
        assert_eq!(state.submit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.pending_scheduled().await, 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        let results = engine
            .submit_batch(vec![
                PostRequest::text("first"),
                PostRequest::text(""),
                PostRequest::text("third"),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(PulsepostError::InvalidContent(_))
        ));
        assert!(results[2].is_ok());

        use std::sync::atomic::Ordering;
        assert_eq!(state.submit_calls.load(Ordering::SeqCst), 2);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_connections_are_reused_across_submits() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        for i in 0..3 {
            engine
                .submit(PostRequest::text(format!("post {}", i)))
                .await
                .unwrap();
        }

        use std::sync::atomic::Ordering;
        assert_eq!(
            state.connections_opened.load(Ordering::SeqCst),
            1,
            "Sequential posts should share one pooled connection"
        );

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_refill_rate_rejected_at_construction() {
        let mut config = fast_config();
        config.rate_limit.rate_per_sec = 0.0;

        let result = Dispatcher::new(MockBackend::success("mock"), config);

        assert!(matches!(result, Err(PulsepostError::Config(_))));
    }

    #[tokio::test]
    async fn test_token_wait_happens_before_connection_open() {
        let mut config = fast_config();
        config.rate_limit.capacity = 1;
        config.rate_limit.rate_per_sec = 2.0;
        // No idle retention, so every submit must open a fresh connection
        config.pool.size = 0;

        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = Arc::new(Dispatcher::new(backend, config).unwrap());

        // Drains the single token
        engine.submit(PostRequest::text("first")).await.unwrap();
        use std::sync::atomic::Ordering;
        assert_eq!(state.connections_opened.load(Ordering::SeqCst), 1);

        // The next submit needs ~500ms of refill; no connection may be
        // opened while it waits for its token.
        let second = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(PostRequest::text("second")).await })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            state.connections_opened.load(Ordering::SeqCst),
            1,
            "Connection was opened before the rate-limit token"
        );

        assert!(second.await.unwrap().is_ok());
        assert_eq!(state.connections_opened.load(Ordering::SeqCst), 2);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let backend = MockBackend::success("mock");
        let state = backend.state();
        let engine = dispatcher(backend);

        engine.submit(PostRequest::text("before")).await.unwrap();

        engine.shutdown().await;
        engine.shutdown().await;

        use std::sync::atomic::Ordering;
        assert_eq!(
            state.connections_closed.load(Ordering::SeqCst),
            state.connections_opened.load(Ordering::SeqCst),
            "Shutdown should close every idle connection"
        );
    }
}
