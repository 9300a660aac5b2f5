//! Short-lived storage for PDFs uploaded into the order configurator.
//!
//! The configurator draft lives in the visitor's session and only carries
//! file metadata; the bytes wait here until checkout sends them to the
//! backend. Entries expire after an hour of not being read.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

/// How long an upload survives without being touched.
pub const UPLOAD_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on total buffered upload bytes.
const MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024;

/// Uploaded file bytes keyed by an opaque random key.
#[derive(Clone)]
pub struct UploadStore {
    files: Cache<String, Arc<Vec<u8>>>,
}

impl std::fmt::Debug for UploadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStore")
            .field("entries", &self.files.entry_count())
            .finish()
    }
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new(UPLOAD_IDLE_TTL)
    }
}

impl UploadStore {
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        let files = Cache::builder()
            .max_capacity(MAX_TOTAL_BYTES)
            .weigher(|_key: &String, data: &Arc<Vec<u8>>| {
                u32::try_from(data.len()).unwrap_or(u32::MAX)
            })
            .time_to_idle(idle_ttl)
            .build();
        Self { files }
    }

    /// Keep `data` and return the key to fetch it with.
    pub async fn put(&self, data: Vec<u8>) -> String {
        let key = Uuid::new_v4().to_string();
        self.files.insert(key.clone(), Arc::new(data)).await;
        key
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        self.files.get(key).await
    }

    pub async fn remove(&self, key: &str) {
        self.files.invalidate(key).await;
    }
}
