//! Process-local counter store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Clock, CounterStore, Quota, RateLimitDecision, SystemClock};
use crate::error::RelayError;

/// Stale windows are swept every this many acquisitions.
const PRUNE_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    index: u64,
    window_secs: u64,
    count: u32,
}

/// Counter store held in process memory.
///
/// The check across all quotas and the increments that follow happen under
/// a single lock, so concurrent callers can never overshoot a limit.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, WindowCounter>>,
    clock: Arc<dyn Clock>,
    acquisitions: AtomicU64,
}

impl InMemoryCounterStore {
    /// Creates an empty store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            clock,
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    /// True when no counters are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(counters: &mut HashMap<String, WindowCounter>, now_secs: u64) {
        counters.retain(|_, c| c.index >= now_secs / c.window_secs);
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn acquire(&self, key: &str, quotas: &[Quota]) -> Result<RateLimitDecision, RelayError> {
        if quotas.is_empty() {
            return Ok(RateLimitDecision::unlimited());
        }

        let now = self.clock.now_secs();
        let mut counters = self.counters.lock();

        if self.acquisitions.fetch_add(1, Ordering::Relaxed) % PRUNE_INTERVAL == 0 {
            Self::prune(&mut counters, now);
        }

        let slots: Vec<_> = quotas
            .iter()
            .map(|quota| (quota.counter_key(key), quota, quota.slot(now)))
            .collect();

        let mut retry_after: Option<Duration> = None;
        for (counter_key, quota, slot) in &slots {
            let used = counters
                .get(counter_key)
                .filter(|c| c.index == slot.index)
                .map_or(0, |c| c.count);
            if used >= quota.limit {
                retry_after = Some(retry_after.map_or(slot.reset_after, |r| r.max(slot.reset_after)));
            }
        }
        if let Some(retry_after) = retry_after {
            return Ok(RateLimitDecision::Denied { retry_after });
        }

        let mut tightest: Option<(u32, u32)> = None;
        for (counter_key, quota, slot) in slots {
            let counter = counters.entry(counter_key).or_insert(WindowCounter {
                index: slot.index,
                window_secs: quota.window_secs(),
                count: 0,
            });
            if counter.index != slot.index {
                counter.index = slot.index;
                counter.count = 0;
            }
            counter.count += 1;

            let remaining = quota.limit.saturating_sub(counter.count);
            if tightest.map_or(true, |(_, r)| remaining < r) {
                tightest = Some((quota.limit, remaining));
            }
        }

        let (limit, remaining) = tightest.unwrap_or((u32::MAX, u32::MAX));
        Ok(RateLimitDecision::Allowed { limit, remaining })
    }
}
