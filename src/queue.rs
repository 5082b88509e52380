//! In-memory queue of scheduled posts and its background runner
//!
//! Entries are ordered by due time, ties broken by insertion order. The
//! queue lives in process memory only: scheduled posts do not survive a
//! restart. That limitation is deliberate; durability is out of scope for
//! this engine.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::types::PostRequest;

/// A post waiting for its due time
#[derive(Debug)]
struct ScheduledEntry {
    due_time: i64,
    /// Insertion sequence, keeps equal due times stable
    seq: u64,
    request: PostRequest,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_time == other.due_time && self.seq == other.seq
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    // Reversed so the std max-heap pops the earliest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due_time, other.seq).cmp(&(self.due_time, self.seq))
    }
}

struct QueueInner {
    heap: BinaryHeap<ScheduledEntry>,
    next_seq: u64,
}

/// Priority queue of pending posts, ordered by due time
pub struct ScheduledPostQueue {
    inner: Mutex<QueueInner>,
}

impl ScheduledPostQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
        }
    }

    pub async fn push(&self, due_time: i64, request: PostRequest) {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        debug!(request_id = %request.id, due_time, "queued scheduled post");
        inner.heap.push(ScheduledEntry {
            due_time,
            seq,
            request,
        });
    }

    /// Pop every entry due at or before `now`, earliest first
    pub async fn pop_due(&self, now: i64) -> Vec<PostRequest> {
        let mut inner = self.inner.lock().await;
        let mut due = Vec::new();
        while inner
            .heap
            .peek()
            .is_some_and(|entry| entry.due_time <= now)
        {
            if let Some(entry) = inner.heap.pop() {
                due.push(entry.request);
            }
        }
        due
    }

    /// Due time of the earliest pending entry
    pub async fn next_due(&self) -> Option<i64> {
        self.inner.lock().await.heap.peek().map(|entry| entry.due_time)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ScheduledPostQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Long-lived runner loop dispatching due posts.
///
/// `dispatch` hands one due request off for execution (fire-and-forget);
/// a handoff failure is logged and answered with a cooldown pause instead
/// of terminating the loop. The caller runs this inside a task and cancels
/// it on shutdown; every `sleep` is a cancellation point.
pub(crate) async fn run_scheduler<D>(
    queue: Arc<ScheduledPostQueue>,
    config: SchedulerConfig,
    dispatch: D,
) where
    D: Fn(PostRequest) -> Result<()>,
{
    info!(
        max_poll_interval = %humantime::format_duration(config.max_poll_interval()),
        "scheduled post runner started"
    );

    loop {
        let now = chrono::Utc::now().timestamp();

        let due = queue.pop_due(now).await;
        let mut handoff_failed = false;
        for request in due {
            debug!(request_id = %request.id, "dispatching due post");
            if let Err(e) = dispatch(request) {
                error!("failed to hand off scheduled post: {}", e);
                handoff_failed = true;
            }
        }

        if handoff_failed {
            sleep(config.error_cooldown()).await;
            continue;
        }

        // Sleep until the next entry is due, capped by the poll interval and
        // floored by the wake granularity so newly scheduled earlier posts
        // are noticed promptly.
        let until_next = match queue.next_due().await {
            Some(due_time) => {
                let now = chrono::Utc::now().timestamp();
                Duration::from_secs(due_time.saturating_sub(now).max(0) as u64)
            }
            None => config.max_poll_interval(),
        };
        let wake_in = until_next
            .min(config.max_poll_interval())
            .max(config.min_wake());
        sleep(wake_in).await;
    }
}
