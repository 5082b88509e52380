//! Memoization cache for media uploads
//!
//! Uploading the same file to the same backend twice wastes quota, so
//! upload results are cached by `(file reference, media kind)`. Concurrent
//! requests for one key collapse onto a single in-flight upload: the first
//! caller uploads while holding the key's slot, later callers await the
//! slot and read the resolved identifier. A failed upload leaves the slot
//! unresolved, so the next caller retries it.
//!
//! Capacity is bounded with least-recently-used eviction; a key is never
//! evicted while its upload is in flight or a caller is waiting on it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::types::MediaKind;

type CacheKey = (String, MediaKind);

/// Per-key slot: `None` until an upload resolves
type Slot = Arc<Mutex<Option<String>>>;

struct CacheInner {
    entries: HashMap<CacheKey, Slot>,
    /// Keys in recency order, oldest first
    order: Vec<CacheKey>,
}

impl CacheInner {
    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let key = self.order.remove(pos);
            self.order.push(key);
        }
    }

    /// Evict oldest-unused entries until within capacity. Slots still held
    /// elsewhere (in-flight upload or a waiting caller) are skipped.
    fn evict_over_capacity(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let victim = self
                .order
                .iter()
                .position(|key| {
                    self.entries
                        .get(key)
                        .is_some_and(|slot| Arc::strong_count(slot) == 1)
                })
                .map(|pos| self.order.remove(pos));

            match victim {
                Some(key) => {
                    debug!(file_ref = %key.0, kind = %key.1, "evicting cached upload");
                    self.entries.remove(&key);
                }
                // Everything over capacity is in flight; try again later
                None => break,
            }
        }
    }
}

/// Memoizes media-upload results per `(file reference, media kind)` pair
pub struct MediaUploadCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl MediaUploadCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Return the cached media identifier for the key, or run `upload` and
    /// cache its result. At most one upload per key is in flight at a time.
    pub async fn get_or_upload<F, Fut>(
        &self,
        file_ref: &str,
        kind: MediaKind,
        upload: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let key = (file_ref.to_string(), kind);

        let slot = {
            let mut inner = self.inner.lock().await;
            match inner.entries.get(&key) {
                Some(slot) => {
                    let slot = slot.clone();
                    inner.touch(&key);
                    slot
                }
                None => {
                    let slot: Slot = Arc::new(Mutex::new(None));
                    inner.entries.insert(key.clone(), slot.clone());
                    inner.order.push(key.clone());
                    inner.evict_over_capacity(self.capacity);
                    slot
                }
            }
        };

        // The map lock is released; only this key's slot is held across the
        // upload, so other keys proceed independently.
        let mut resolved = slot.lock().await;
        if let Some(media_id) = resolved.as_ref() {
            debug!(file_ref, kind = %kind, media_id, "upload cache hit");
            return Ok(media_id.clone());
        }

        let media_id = upload().await?;
        *resolved = Some(media_id.clone());
        Ok(media_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
