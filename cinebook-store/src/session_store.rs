use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cinebook_core::{session_key, Clock, CoreError, CoreResult, SessionStore};
use cinebook_shared::SessionRecord;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app_config::{SessionBackend, SessionConfig};
use crate::redis_repo::RedisClient;

/// Records without a deadline still expire eventually
const UNBOUNDED_RECORD_TTL_SECONDS: u64 = 24 * 60 * 60;
/// Kept a little past the deadline so restore can see it expired and clean up
const EXPIRED_RECORD_GRACE_SECONDS: i64 = 60;

fn io_error(err: std::io::Error) -> CoreError {
    CoreError::StorageError(err.to_string())
}

fn redis_error(err: redis::RedisError) -> CoreError {
    CoreError::TransientError(err.to_string())
}

/// Pick the backend named in config
pub fn open_session_store(
    config: &SessionConfig,
    redis: Option<RedisClient>,
    clock: Arc<dyn Clock>,
) -> CoreResult<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config.backend {
        SessionBackend::Memory => Arc::new(MemorySessionStore::new(&config.key_prefix)),
        SessionBackend::File => Arc::new(FileSessionStore::new(&config.directory, &config.key_prefix)),
        SessionBackend::Redis => {
            let redis = redis.ok_or_else(|| {
                CoreError::ValidationError("Redis session backend needs redis.url".to_string())
            })?;
            Arc::new(RedisSessionStore::new(redis, &config.key_prefix, clock))
        }
    };
    info!("Session store: {:?} ({})", config.backend, config.key_prefix);
    Ok(store)
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    prefix: String,
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            records: Arc::default(),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, showtime_id: Uuid, record: &SessionRecord) -> CoreResult<()> {
        self.records
            .write()
            .await
            .insert(session_key(&self.prefix, showtime_id), record.clone());
        Ok(())
    }

    async fn load(&self, showtime_id: Uuid) -> CoreResult<Option<SessionRecord>> {
        Ok(self.records.read().await.get(&session_key(&self.prefix, showtime_id)).cloned())
    }

    async fn clear(&self, showtime_id: Uuid) -> CoreResult<()> {
        self.records.write().await.remove(&session_key(&self.prefix, showtime_id));
        Ok(())
    }
}

/// One JSON document per showtime, survives process restarts
#[derive(Clone)]
pub struct FileSessionStore {
    directory: PathBuf,
    prefix: String,
}

impl FileSessionStore {
    pub fn new(directory: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.to_string(),
        }
    }

    fn path_for(&self, showtime_id: Uuid) -> PathBuf {
        // ':' is not portable in file names
        let name = session_key(&self.prefix, showtime_id).replace(':', "_");
        self.directory.join(format!("{}.json", name))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, showtime_id: Uuid, record: &SessionRecord) -> CoreResult<()> {
        let payload = serde_json::to_vec_pretty(record)?;
        let path = self.path_for(showtime_id);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.directory).await.map_err(io_error)?;
        tokio::fs::write(&tmp, payload).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error)?;

        debug!("Saved session {}", path.display());
        Ok(())
    }

    async fn load(&self, showtime_id: Uuid) -> CoreResult<Option<SessionRecord>> {
        match tokio::fs::read(self.path_for(showtime_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn clear(&self, showtime_id: Uuid) -> CoreResult<()> {
        match tokio::fs::remove_file(self.path_for(showtime_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

/// Session records in Redis with a TTL derived from the hold deadline
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: RedisClient,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl RedisSessionStore {
    pub fn new(redis: RedisClient, prefix: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            redis,
            prefix: prefix.to_string(),
            clock,
        }
    }

    fn ttl_for(&self, record: &SessionRecord) -> u64 {
        match record.expires_at {
            Some(at) => {
                let remaining = (at - self.clock.now()).num_seconds() + EXPIRED_RECORD_GRACE_SECONDS;
                remaining.max(1) as u64
            }
            None => UNBOUNDED_RECORD_TTL_SECONDS,
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, showtime_id: Uuid, record: &SessionRecord) -> CoreResult<()> {
        let payload = serde_json::to_string(record)?;
        self.redis
            .set_with_ttl(&session_key(&self.prefix, showtime_id), &payload, self.ttl_for(record))
            .await
            .map_err(redis_error)
    }

    async fn load(&self, showtime_id: Uuid) -> CoreResult<Option<SessionRecord>> {
        let raw = self
            .redis
            .get(&session_key(&self.prefix, showtime_id))
            .await
            .map_err(redis_error)?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self, showtime_id: Uuid) -> CoreResult<()> {
        self.redis
            .del(&session_key(&self.prefix, showtime_id))
            .await
            .map_err(redis_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use cinebook_core::SystemClock;
    use cinebook_shared::TicketQuantities;
    use std::collections::BTreeMap;

    fn record() -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            quantities: TicketQuantities { standard: 2, vip: 0, couple: 0 },
            selected_seats: vec![Uuid::new_v4(), Uuid::new_v4()],
            food_quantities: BTreeMap::from([(Uuid::new_v4(), 1)]),
            expires_at: Some(now + Duration::minutes(5)),
            timestamp: now,
        }
    }

    #[tokio::test]
    async fn test_memory_store_is_namespaced() {
        let store = MemorySessionStore::new("booking-session");
        let showtime_id = Uuid::new_v4();
        let record = record();

        store.save(showtime_id, &record).await.unwrap();
        assert_eq!(store.keys().await, vec![format!("booking-session:{}", showtime_id)]);
        assert_eq!(store.load(showtime_id).await.unwrap(), Some(record));
        assert_eq!(store.load(Uuid::new_v4()).await.unwrap(), None);

        store.clear(showtime_id).await.unwrap();
        assert_eq!(store.load(showtime_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let directory = std::env::temp_dir().join(format!("cinebook-sessions-{}", Uuid::new_v4()));
        let showtime_id = Uuid::new_v4();
        let record = record();

        FileSessionStore::new(&directory, "booking-session")
            .save(showtime_id, &record)
            .await
            .unwrap();

        let reopened = FileSessionStore::new(&directory, "booking-session");
        assert_eq!(reopened.load(showtime_id).await.unwrap(), Some(record));

        reopened.clear(showtime_id).await.unwrap();
        reopened.clear(showtime_id).await.unwrap();
        assert_eq!(reopened.load(showtime_id).await.unwrap(), None);

        let _ = std::fs::remove_dir_all(&directory);
    }

    #[test]
    fn test_redis_backend_requires_client() {
        let config = SessionConfig {
            backend: SessionBackend::Redis,
            ..SessionConfig::default()
        };
        let result = open_session_store(&config, None, Arc::new(SystemClock));
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }
}
