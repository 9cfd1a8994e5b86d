//! Per-user run lock in Redis: `SET key token NX EX ttl`, released by a
//! compare-and-delete script so an expired holder never frees a newer lock.

use redis::Script;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

/// Upper bound on a single run. The lock expires on its own after this.
const LOCK_TTL_SECS: u64 = 600;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Debug)]
pub struct RunLock {
    key: String,
    token: String,
}

fn lock_key(user_id: Uuid) -> String {
    format!("tailor:run-lock:{user_id}")
}

impl RunLock {
    /// Returns `None` while another run for the same user holds the lock.
    pub async fn acquire(redis: &redis::Client, user_id: Uuid) -> Result<Option<RunLock>, AppError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let key = lock_key(user_id);
        let token = Uuid::new_v4().to_string();

        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL_SECS)
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(|_| RunLock { key, token }))
    }

    /// Releases the lock if this holder still owns it. Failures are logged;
    /// the TTL bounds how long a stuck lock can live.
    pub async fn release(self, redis: &redis::Client) {
        let result = async {
            let mut conn = redis.get_multiplexed_async_connection().await?;
            Script::new(RELEASE_SCRIPT)
                .key(&self.key)
                .arg(&self.token)
                .invoke_async::<_, i32>(&mut conn)
                .await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to release run lock {}: {e}", self.key);
        }
    }
}
