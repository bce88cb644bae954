// 响应缓存
// 以对话指纹为键，按 TTL 惰性过期

pub mod entry;
pub mod fingerprint;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

pub use entry::CacheEntry;
pub use fingerprint::{MAX_FINGERPRINT_CHARS, fingerprint};

pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// 命中且未过期时返回缓存的回复；过期条目在此处删除
    pub fn lookup(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries();

        let entry = entries.get(key)?;
        if !entry.is_expired(now) {
            return Some(entry.value.clone());
        }

        entries.remove(key);
        None
    }

    /// 覆盖写入，过期时间为当前时间加 TTL
    pub fn store(&self, key: String, value: String) {
        let now = Instant::now();
        let mut entries = self.entries();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            Self::make_room(&mut entries, now, self.max_entries);
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// 清除所有过期条目，返回清除数量
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_room(entries: &mut HashMap<String, CacheEntry>, now: Instant, max_entries: usize) {
        entries.retain(|_, entry| !entry.is_expired(now));

        while entries.len() >= max_entries {
            let soonest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            match soonest {
                Some(key) => {
                    tracing::debug!("Response cache full, evicting {:?}", key);
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
