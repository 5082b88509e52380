//! Core types for Pulsepost

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of content a post request carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
}

impl ContentType {
    /// Media kind for upload caching, `None` for plain text
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            ContentType::Text => None,
            ContentType::Image => Some(MediaKind::Image),
            ContentType::Video => Some(MediaKind::Video),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            "video" => Ok(ContentType::Video),
            _ => Err(format!(
                "Invalid content type: '{}'. Valid options: text, image, video",
                s
            )),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Text => write!(f, "text"),
            ContentType::Image => write!(f, "image"),
            ContentType::Video => write!(f, "video"),
        }
    }
}

/// Kind of media behind an upload, one half of the upload-cache key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// A request to post content, immutable once created.
///
/// `content` holds the text body for text posts, or a file reference for
/// image and video posts. `due_time` is a Unix timestamp in seconds; when
/// set to a future time the request is queued instead of executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRequest {
    pub id: String,
    pub content_type: ContentType,
    pub content: String,
    pub caption: Option<String>,
    pub due_time: Option<i64>,
    pub created_at: i64,
}

impl PostRequest {
    /// Create an immediate text post request
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(ContentType::Text, content, None)
    }

    /// Create an immediate media post request from a file reference
    pub fn media(content_type: ContentType, file_ref: impl Into<String>) -> Self {
        Self::new(content_type, file_ref, None)
    }

    pub fn new(
        content_type: ContentType,
        content: impl Into<String>,
        caption: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content_type,
            content: content.into(),
            caption,
            due_time: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Return a copy carrying a caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Return a copy due at the given Unix timestamp (seconds)
    pub fn due_at(mut self, due_time: i64) -> Self {
        self.due_time = Some(due_time);
        self
    }
}

/// What a backend receives when submitting a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPayload {
    /// Text body for text posts, empty for media-only posts
    pub text: String,
    pub caption: Option<String>,
    /// Backend media identifier from a prior upload
    pub media_id: Option<String>,
}

/// A backend's answer to a successful submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformResponse {
    /// Platform-specific post id (e.g. a tweet id or graph object id)
    pub post_id: String,
    /// Backend name the post landed on
    pub backend: String,
}

/// Acknowledgement that a request was queued, not posted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAck {
    pub request_id: String,
    pub due_time: i64,
}

/// Outcome of `Dispatcher::submit`: either the platform's response or an
/// acknowledgement that the request is waiting in the schedule queue.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Posted(PlatformResponse),
    Scheduled(ScheduleAck),
}

impl SubmitOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, SubmitOutcome::Scheduled(_))
    }

    /// The platform response, if the post was executed immediately
    pub fn response(&self) -> Option<&PlatformResponse> {
        match self {
            SubmitOutcome::Posted(response) => Some(response),
            SubmitOutcome::Scheduled(_) => None,
        }
    }
}
