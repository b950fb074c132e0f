use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

use crate::services::store::{SharedStore, StoreError};

/// Deletes KEYS[1] only while it still holds ARGV[1]
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Redis-backed shared store
///
/// `ConnectionManager` multiplexes a single connection and reconnects on
/// failure, so each call works on a cheap clone instead of holding a lock
/// across the round-trip.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    compare_and_delete: redis::Script,
}

impl RedisStore {
    /// Connect to Redis at the given URL
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!("Connected to Redis shared store");

        Ok(Self {
            conn,
            compare_and_delete: redis::Script::new(COMPARE_AND_DELETE),
        })
    }
}

fn millis(ttl: Duration) -> u64 {
    // PX/PEXPIRE reject 0
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("RPUSH").arg(key).arg(value).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("LPUSH").arg(key).arg(value).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("LPOP").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn range(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop: i64 = if limit == usize::MAX {
            -1
        } else {
            i64::try_from(limit - 1).unwrap_or(-1)
        };

        let mut conn = self.conn.clone();
        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn remove_all(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let removed: usize = redis::cmd("LREM")
            .arg(key)
            .arg(0)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("LLEN").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn position(&self, key: &str, value: &str) -> Result<Option<usize>, StoreError> {
        let mut conn = self.conn.clone();
        let pos: Option<usize> = redis::cmd("LPOS").arg(key).arg(value).query_async(&mut conn).await?;
        Ok(pos)
    }

    async fn trim_to_newest(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        if max_len == 0 {
            return self.delete(key).await;
        }
        let start = -i64::try_from(max_len).unwrap_or(i64::MAX);

        let mut conn = self.conn.clone();
        let _: () = redis::cmd("LTRIM")
            .arg(key)
            .arg(start)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(StoreError::InvalidValue {
                key: "PING".to_string(),
                message: pong,
            });
        }
        Ok(())
    }
}
