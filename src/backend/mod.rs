//! Backend abstraction over platform SDKs
//!
//! The dispatch engine never talks to a social-media API directly. Each
//! platform integration implements [`Backend`] and the engine drives it
//! through the rate limiter, connection pool, retry policy, and upload
//! cache. Authentication, payload shaping, and wire formats all live behind
//! this trait.
//!
//! # Examples
//!
//! ```no_run
//! use pulsepost::backend::mock::MockBackend;
//! use pulsepost::{Dispatcher, DispatcherConfig, PostRequest};
//!
//! # async fn example() -> pulsepost::Result<()> {
//! let dispatcher = Dispatcher::new(MockBackend::success("demo"), DispatcherConfig::default())?;
//!
//! let outcome = dispatcher.submit(PostRequest::text("Hello world")).await?;
//! if let Some(response) = outcome.response() {
//!     println!("Posted: {}", response.post_id);
//! }
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::types::{ContentType, MediaKind, PlatformResponse, PostPayload};

// Mock backend is available for all builds (not just tests) to support
// integration tests and embedder test suites.
pub mod mock;

/// Capability trait each platform collaborator supplies.
///
/// `Conn` is an opaque transport session (an HTTP client, an SDK handle).
/// The pool creates sessions through [`connect`](Backend::connect), hands
/// them to one in-flight operation at a time, and closes surplus sessions
/// through [`close`](Backend::close).
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Conn: Send + Sync;

    /// Lowercase backend identifier (e.g. "twitter", "facebook")
    fn name(&self) -> &str;

    /// Whether this backend accepts the given content type.
    ///
    /// Backends must opt out of content types they cannot publish; the
    /// dispatcher rejects unsupported requests before any network activity.
    fn supports(&self, _content_type: ContentType) -> bool {
        true
    }

    /// Open a new transport session
    async fn connect(&self) -> Result<Self::Conn>;

    /// Close a session the pool will not retain
    async fn close(&self, conn: Self::Conn);

    /// Upload a media file, returning the backend's media identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Upload`] on backend rejection; the retry
    /// policy treats these as transient.
    async fn upload_media(
        &self,
        conn: &Self::Conn,
        file_ref: &str,
        kind: MediaKind,
    ) -> std::result::Result<String, PlatformError>;

    /// Submit a post payload, returning the platform's response.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Submit`] on backend rejection (rate-limited,
    /// malformed, auth failure); the specific cause is carried as a message.
    async fn submit_post(
        &self,
        conn: &Self::Conn,
        payload: &PostPayload,
    ) -> std::result::Result<PlatformResponse, PlatformError>;
}
