//! Redis-backed counter store shared by every replica.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;

use super::{Clock, CounterStore, Quota, RateLimitDecision, SystemClock};
use crate::error::RelayError;

/// Namespace for every counter key.
pub const KEY_PREFIX: &str = "relay:ratelimit";

/// Checks every counter first and increments only when all have room.
/// KEYS[i] is a window counter; ARGV[2i-1] its limit, ARGV[2i] its TTL.
/// Returns `{1, limit, remaining}` for the tightest quota or `{0, retry_secs}`.
const ACQUIRE_SCRIPT: &str = r"
local retry = 0
for i, key in ipairs(KEYS) do
  local limit = tonumber(ARGV[2 * i - 1])
  local used = tonumber(redis.call('GET', key) or '0')
  if used >= limit then
    local ttl = redis.call('TTL', key)
    if ttl < 1 then ttl = 1 end
    if ttl > retry then retry = ttl end
  end
end
if retry > 0 then
  return {0, retry}
end
local best_limit = -1
local best_remaining = -1
for i, key in ipairs(KEYS) do
  local limit = tonumber(ARGV[2 * i - 1])
  local used = redis.call('INCR', key)
  if used == 1 then
    redis.call('EXPIRE', key, tonumber(ARGV[2 * i]))
  end
  local remaining = limit - used
  if best_limit < 0 or remaining < best_remaining then
    best_limit = limit
    best_remaining = remaining
  end
end
return {1, best_limit, best_remaining}
";

/// Counter store kept in Redis so budgets hold across instances.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    script: Script,
    clock: Arc<dyn Clock>,
}

impl RedisCounterStore {
    /// Connects to `redis_url` and prepares the acquire script.
    pub async fn connect(redis_url: &str) -> Result<Self, RelayError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RelayError::Internal(anyhow!("invalid redis url: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| RelayError::Internal(anyhow!("redis connection failed: {e}")))?;

        Ok(Self {
            conn,
            script: Script::new(ACQUIRE_SCRIPT),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Interprets the script's reply.
fn decision_from_reply(reply: &[i64]) -> Result<RateLimitDecision, RelayError> {
    match *reply {
        [1, limit, remaining] => Ok(RateLimitDecision::Allowed {
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
            remaining: u32::try_from(remaining).unwrap_or(0),
        }),
        [0, retry_secs] => Ok(RateLimitDecision::Denied {
            retry_after: Duration::from_secs(u64::try_from(retry_secs).unwrap_or(1).max(1)),
        }),
        _ => Err(RelayError::Internal(anyhow!(
            "unexpected rate limit script reply: {reply:?}"
        ))),
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn acquire(&self, key: &str, quotas: &[Quota]) -> Result<RateLimitDecision, RelayError> {
        if quotas.is_empty() {
            return Ok(RateLimitDecision::unlimited());
        }

        let now = self.clock.now_secs();
        let mut invocation = self.script.prepare_invoke();
        for quota in quotas {
            let slot = quota.slot(now);
            invocation.key(format!(
                "{KEY_PREFIX}:{}:{}",
                quota.counter_key(key),
                slot.index
            ));
            invocation.arg(quota.limit).arg(slot.reset_after.as_secs());
        }

        let mut conn = self.conn.clone();
        let reply: Vec<i64> = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RelayError::Internal(anyhow!("rate limit store failed: {e}")))?;

        decision_from_reply(&reply)
    }
}
