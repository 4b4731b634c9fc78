use async_trait::async_trait;
use cinebook_shared::SessionRecord;
use uuid::Uuid;

use crate::CoreResult;

/// Namespaced key for the persisted session of a showtime
pub fn session_key(prefix: &str, showtime_id: Uuid) -> String {
    format!("{}:{}", prefix, showtime_id)
}

/// Durable key/value storage for in-progress selections.
///
/// Advisory cache only: the seat inventory stays the source of truth.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, showtime_id: Uuid, record: &SessionRecord) -> CoreResult<()>;

    async fn load(&self, showtime_id: Uuid) -> CoreResult<Option<SessionRecord>>;

    async fn clear(&self, showtime_id: Uuid) -> CoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_is_namespaced() {
        let showtime_id = Uuid::new_v4();
        assert_eq!(
            session_key("booking-session", showtime_id),
            format!("booking-session:{}", showtime_id)
        );
    }
}
