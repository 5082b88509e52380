//! Pulsepost: a scheduled dispatch engine for social posting backends
//!
//! The engine wraps a single backend connector with the plumbing every
//! connector needs: token-bucket rate limiting, connection pooling, retry
//! with exponential backoff, media upload caching, and a schedule queue
//! with a background runner. Backends implement the [`Backend`] trait;
//! everything else is shared.
//!
//! # Example
//!
//! ```no_run
//! use pulsepost::backend::mock::MockBackend;
//! use pulsepost::{Dispatcher, DispatcherConfig, PostRequest};
//!
//! # #[tokio::main]
//! # async fn main() -> pulsepost::Result<()> {
//! let engine = Dispatcher::new(MockBackend::success("demo"), DispatcherConfig::default())?;
//!
//! // Posts immediately
//! let outcome = engine.submit(PostRequest::text("Hello world")).await?;
//! println!("posted as {:?}", outcome.response());
//!
//! // Queued until its due time, handled by the background runner
//! let tomorrow = chrono::Utc::now().timestamp() + 86_400;
//! engine.submit(PostRequest::text("See you then").due_at(tomorrow)).await?;
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod media_cache;
pub mod pool;
pub mod queue;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use backend::Backend;
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, PlatformError, PulsepostError, Result};
pub use media_cache::MediaUploadCache;
pub use pool::ConnectionPool;
pub use queue::ScheduledPostQueue;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use types::{
    ContentType, MediaKind, PlatformResponse, PostPayload, PostRequest, ScheduleAck,
    SubmitOutcome,
};
