use futures_util::{Stream, StreamExt};
use redis::{AsyncCommands, RedisResult};
use tracing::{debug, info};

/// Result of a seat lock attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Acquired,
    HeldByOther,
    Booked,
}

// KEYS: lock, held index, booked set. ARGV: holder, seat, ttl, expires_at.
// A lock already owned by the holder is refreshed instead of rejected.
const ACQUIRE_SCRIPT: &str = r#"
    if redis.call("SISMEMBER", KEYS[3], ARGV[2]) == 1 then
        return -1
    end
    if redis.call("SET", KEYS[1], ARGV[1], "NX", "EX", ARGV[3]) then
        redis.call("ZADD", KEYS[2], ARGV[4], ARGV[2])
        return 1
    end
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        redis.call("EXPIRE", KEYS[1], ARGV[3])
        redis.call("ZADD", KEYS[2], ARGV[4], ARGV[2])
        return 1
    end
    return 0
"#;

// KEYS: lock, held index. ARGV: holder, seat. Only the owner may release.
const RELEASE_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        redis.call("DEL", KEYS[1])
        redis.call("ZREM", KEYS[2], ARGV[2])
        return 1
    end
    return 0
"#;

// KEYS: booked set, held index, then one lock per seat. ARGV: holder, then the seats.
// Every lock must belong to the holder or nothing is booked.
const COMMIT_SCRIPT: &str = r#"
    for i = 3, #KEYS do
        if redis.call("GET", KEYS[i]) ~= ARGV[1] then
            return 0
        end
    end
    for i = 3, #KEYS do
        redis.call("DEL", KEYS[i])
        redis.call("ZREM", KEYS[2], ARGV[i - 1])
        redis.call("SADD", KEYS[1], ARGV[i - 1])
    end
    return 1
"#;

pub fn seat_lock_key(showtime_id: &str, seat_id: &str) -> String {
    format!("seat:{}:{}", showtime_id, seat_id)
}

pub fn held_index_key(showtime_id: &str) -> String {
    format!("showtime:{}:held", showtime_id)
}

pub fn booked_set_key(showtime_id: &str) -> String {
    format!("showtime:{}:booked", showtime_id)
}

pub fn seat_channel_name(showtime_id: &str) -> String {
    format!("showtime:{}:seats", showtime_id)
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn acquire_seat_lock(
        &self,
        showtime_id: &str,
        seat_id: &str,
        holder: &str,
        ttl_seconds: u64,
        expires_at: i64,
    ) -> RedisResult<HoldOutcome> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: i64 = redis::Script::new(ACQUIRE_SCRIPT)
            .key(seat_lock_key(showtime_id, seat_id))
            .key(held_index_key(showtime_id))
            .key(booked_set_key(showtime_id))
            .arg(holder)
            .arg(seat_id)
            .arg(ttl_seconds)
            .arg(expires_at)
            .invoke_async(&mut conn)
            .await?;

        let outcome = match result {
            1 => HoldOutcome::Acquired,
            -1 => HoldOutcome::Booked,
            _ => HoldOutcome::HeldByOther,
        };
        debug!("Seat lock {}:{} for {} -> {:?}", showtime_id, seat_id, holder, outcome);
        Ok(outcome)
    }

    /// Returns whether a lock owned by `holder` was removed
    pub async fn release_seat_lock(&self, showtime_id: &str, seat_id: &str, holder: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let removed: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(seat_lock_key(showtime_id, seat_id))
            .key(held_index_key(showtime_id))
            .arg(holder)
            .arg(seat_id)
            .invoke_async(&mut conn)
            .await?;

        Ok(removed == 1)
    }

    /// Turn the holder's locks into bookings, all or nothing
    pub async fn commit_seats(&self, showtime_id: &str, seat_ids: &[String], holder: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let script = redis::Script::new(COMMIT_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(booked_set_key(showtime_id)).key(held_index_key(showtime_id));
        for seat_id in seat_ids {
            invocation.key(seat_lock_key(showtime_id, seat_id));
        }
        invocation.arg(holder);
        for seat_id in seat_ids {
            invocation.arg(seat_id);
        }

        let committed: i64 = invocation.invoke_async(&mut conn).await?;
        info!("Commit of {} seats on {} for {} -> {}", seat_ids.len(), showtime_id, holder, committed == 1);
        Ok(committed == 1)
    }

    /// Seats whose lock is still live at `now`. Stale index entries are pruned on the way.
    pub async fn held_seats(&self, showtime_id: &str, now: i64) -> RedisResult<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = held_index_key(showtime_id);
        conn.zrembyscore::<_, _, _, ()>(&key, "-inf", now).await?;
        conn.zrangebyscore(&key, format!("({}", now), "+inf").await
    }

    pub async fn booked_seats(&self, showtime_id: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.smembers(booked_set_key(showtime_id)).await
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
    }

    pub async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    pub async fn del(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(key).await
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.publish::<_, _, ()>(channel, payload).await
    }

    /// Payloads published on `channel`. The subscription ends when the stream is dropped.
    pub async fn subscribe(&self, channel: &str) -> RedisResult<impl Stream<Item = String> + Send + 'static> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        info!("Subscribed to {}", channel);

        Ok(pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(seat_lock_key("s1", "a1"), "seat:s1:a1");
        assert_eq!(held_index_key("s1"), "showtime:s1:held");
        assert_eq!(booked_set_key("s1"), "showtime:s1:booked");
        assert_eq!(seat_channel_name("s1"), "showtime:s1:seats");
    }
}
