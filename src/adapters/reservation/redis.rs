//! Redis-backed reservation store for multi-server deployments.
//!
//! Each claim is a key `reservation:{org}:{topic}:{bucket}:{item}` written
//! with `SET .. NX PX ttl`, so Redis performs the compare-and-set. A holder
//! index set per scope lets `release` find the holder's items; deletion
//! runs in a Lua script that only removes keys still owned by the holder.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use crate::domain::foundation::{HolderId, ItemId};
use crate::ports::{ClaimOutcome, ReservationError, ReservationStore, ScopeKey};

const RELEASE_SCRIPT: &str = r#"
local released = 0
local items = redis.call('SMEMBERS', KEYS[1])
for _, item in ipairs(items) do
    local key = ARGV[2] .. ':' .. item
    if redis.call('GET', key) == ARGV[1] then
        redis.call('DEL', key)
        released = released + 1
    end
end
redis.call('DEL', KEYS[1])
return released
"#;

/// Redis-backed atomic-claim store.
#[derive(Clone)]
pub struct RedisReservationStore {
    conn: MultiplexedConnection,
}

impl RedisReservationStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn item_key(scope: &ScopeKey, item_id: &ItemId) -> String {
        format!("{}:{}", scope.to_redis_key(), item_id)
    }

    fn holder_index_key(scope: &ScopeKey, holder: &HolderId) -> String {
        format!("{}:holder:{}", scope.to_redis_key(), holder)
    }
}

fn unavailable(e: redis::RedisError) -> ReservationError {
    if e.is_timeout() {
        ReservationError::Timeout(e.to_string())
    } else {
        ReservationError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl ReservationStore for RedisReservationStore {
    async fn claim(
        &self,
        scope: &ScopeKey,
        item_ids: &[ItemId],
        holder: &HolderId,
        ttl: Duration,
    ) -> Result<ClaimOutcome, ReservationError> {
        let mut conn = self.conn.clone();
        let holder_value = holder.to_string();
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let index_key = Self::holder_index_key(scope, holder);

        let mut outcome = ClaimOutcome::default();
        for item_id in item_ids {
            let key = Self::item_key(scope, item_id);

            // SET NX replies OK on success and nil when the key exists.
            let set: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&holder_value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            let owned = match set {
                Some(_) => true,
                None => {
                    let current: Option<String> = conn.get(&key).await.map_err(unavailable)?;
                    current.as_deref() == Some(holder_value.as_str())
                }
            };

            if owned {
                conn.sadd::<_, _, ()>(&index_key, item_id.as_str())
                    .await
                    .map_err(unavailable)?;
                outcome.claimed.push(item_id.clone());
            } else {
                outcome.conflicted.push(item_id.clone());
            }
        }

        if !outcome.claimed.is_empty() {
            redis::cmd("PEXPIRE")
                .arg(&index_key)
                .arg(ttl_ms)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(unavailable)?;
        }

        Ok(outcome)
    }

    async fn release(&self, scope: &ScopeKey, holder: &HolderId) -> Result<u32, ReservationError> {
        let mut conn = self.conn.clone();
        let released: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(Self::holder_index_key(scope, holder))
            .arg(holder.to_string())
            .arg(scope.to_redis_key())
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        Ok(u32::try_from(released).unwrap_or(0))
    }
}

impl std::fmt::Debug for RedisReservationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisReservationStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::OrganizationId;

    fn scope() -> ScopeKey {
        ScopeKey::new(OrganizationId::new("acme").unwrap(), "dsa", 7)
    }

    #[test]
    fn item_keys_extend_the_scope_key() {
        let key = RedisReservationStore::item_key(&scope(), &ItemId::new("q1").unwrap());
        assert_eq!(key, "reservation:acme:dsa:7:q1");
    }

    #[test]
    fn holder_index_is_scoped() {
        let holder = HolderId::new();
        let key = RedisReservationStore::holder_index_key(&scope(), &holder);
        assert_eq!(key, format!("reservation:acme:dsa:7:holder:{}", holder));
    }

    #[tokio::test]
    #[ignore] // Run with: REDIS_URL=... cargo test -- --ignored
    async fn claims_conflict_across_holders() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let client = redis::Client::open(url).unwrap();
        let conn = client.get_multiplexed_tokio_connection().await.unwrap();
        let store = RedisReservationStore::new(conn);
        let scope = ScopeKey::new(OrganizationId::new("acme").unwrap(), "it", rand::random());
        let items = vec![ItemId::new("q1").unwrap(), ItemId::new("q2").unwrap()];
        let (a, b) = (HolderId::new(), HolderId::new());
        let ttl = Duration::from_secs(5);

        let first = store.claim(&scope, &items, &a, ttl).await.unwrap();
        let second = store.claim(&scope, &items, &b, ttl).await.unwrap();
        assert_eq!(first.claimed, items);
        assert_eq!(second.conflicted, items);

        assert_eq!(store.release(&scope, &a).await.unwrap(), 2);
        let third = store.claim(&scope, &items, &b, ttl).await.unwrap();
        assert!(third.is_complete());
        store.release(&scope, &b).await.unwrap();
    }
}
