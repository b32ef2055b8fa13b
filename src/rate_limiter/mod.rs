//! Multi-Quota Rate Limiter
//!
//! Implements fixed-window rate limiting with HTTP 429 responses. A policy
//! holds several quotas (for example `200/day` and `50/hour`); a request is
//! admitted only if every quota still has room, and admission consumes one
//! unit from each of them atomically. Counters live in a [`CounterStore`],
//! either in process memory or in Redis so several replicas share budgets.

mod memory;
mod redis;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::RelayError;

pub use self::memory::InMemoryCounterStore;
pub use self::redis::{RedisCounterStore, KEY_PREFIX};

/// A limit on requests per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Requests admitted per window
    pub limit: u32,
    /// Window length
    pub window: Duration,
}

impl Quota {
    /// Creates a quota of `limit` requests per `window`.
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// `limit` requests per second.
    pub const fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    /// `limit` requests per minute.
    pub const fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// `limit` requests per hour.
    pub const fn per_hour(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(3_600))
    }

    /// `limit` requests per day.
    pub const fn per_day(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(86_400))
    }

    /// Window length in whole seconds, never zero.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    /// Locates the epoch-aligned window containing `now_secs`.
    pub fn slot(&self, now_secs: u64) -> WindowSlot {
        let window = self.window_secs();
        WindowSlot {
            index: now_secs / window,
            reset_after: Duration::from_secs(window - now_secs % window),
        }
    }

    /// Counter name for this quota under `key`.
    pub(crate) fn counter_key(&self, key: &str) -> String {
        format!("{key}:{}/{}", self.limit, self.window_secs())
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.window_secs() {
            86_400 => write!(f, "{}/day", self.limit),
            3_600 => write!(f, "{}/hour", self.limit),
            60 => write!(f, "{}/minute", self.limit),
            1 => write!(f, "{}/second", self.limit),
            secs => write!(f, "{}/{}s", self.limit, secs),
        }
    }
}

/// Errors from parsing quota strings such as `200/day`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuotaParseError {
    /// Not of the form `<count>/<unit>`
    #[error("invalid quota '{0}': expected <count>/<unit>")]
    Format(String),
    /// Unit is not second, minute, hour or day
    #[error("unknown quota unit '{0}'")]
    Unit(String),
    /// A zero limit would reject everything
    #[error("quota limit must be greater than 0")]
    ZeroLimit,
}

impl FromStr for Quota {
    type Err = QuotaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (count, unit) = s
            .split_once('/')
            .or_else(|| s.split_once(" per "))
            .ok_or_else(|| QuotaParseError::Format(s.to_string()))?;

        let limit: u32 = count
            .trim()
            .parse()
            .map_err(|_| QuotaParseError::Format(s.to_string()))?;
        if limit == 0 {
            return Err(QuotaParseError::ZeroLimit);
        }

        let window = match unit.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Duration::from_secs(1),
            "m" | "min" | "minute" | "minutes" => Duration::from_secs(60),
            "h" | "hour" | "hours" => Duration::from_secs(3_600),
            "d" | "day" | "days" => Duration::from_secs(86_400),
            other => return Err(QuotaParseError::Unit(other.to_string())),
        };

        Ok(Quota::new(limit, window))
    }
}

/// Parses `;`- or `,`-separated quotas. An empty string yields no quotas.
///
/// Repeated quotas collapse to one entry.
pub fn parse_quotas(input: &str) -> Result<Vec<Quota>, QuotaParseError> {
    let quotas = input
        .split([';', ','])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Quota>, _>>()?;
    Ok(distinct(quotas))
}

/// Drops repeated quotas, keeping first occurrences in order. Two equal
/// quotas share one counter, so both must not be charged.
fn distinct(quotas: Vec<Quota>) -> Vec<Quota> {
    let mut kept: Vec<Quota> = Vec::with_capacity(quotas.len());
    for quota in quotas {
        if !kept.contains(&quota) {
            kept.push(quota);
        }
    }
    kept
}

/// Position of one instant within a quota's window sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSlot {
    /// Window number since the epoch
    pub index: u64,
    /// Time until this window closes
    pub reset_after: Duration,
}

/// Rate limit decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request allowed; figures describe the tightest quota after admission
    Allowed {
        /// Limit of the tightest quota
        limit: u32,
        /// Units left in the tightest quota
        remaining: u32,
    },
    /// Request denied with retry-after duration
    Denied {
        /// Time until the exhausted quotas reset
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Decision for a policy without quotas.
    pub(crate) fn unlimited() -> Self {
        Self::Allowed {
            limit: u32::MAX,
            remaining: u32::MAX,
        }
    }
}

/// Source of the current time in whole seconds since the epoch.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_secs(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
    }
}

/// Shared counter storage with atomic check-and-increment across quotas.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Admits one request for `key` if every quota has room, consuming one
    /// unit from each. Denied requests consume nothing.
    async fn acquire(&self, key: &str, quotas: &[Quota]) -> Result<RateLimitDecision, RelayError>;
}

/// A named set of quotas applied to a group of routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Namespace for this policy's counters
    pub name: String,
    /// Quotas that must all admit a request
    pub quotas: Vec<Quota>,
}

impl RateLimitPolicy {
    /// Creates a policy. Repeated quotas are kept once.
    pub fn new(name: impl Into<String>, quotas: Vec<Quota>) -> Self {
        Self {
            name: name.into(),
            quotas: distinct(quotas),
        }
    }
}

/// Applies one policy against a shared counter store.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Creates a limiter for `policy` backed by `store`.
    pub fn new(policy: RateLimitPolicy, store: Arc<dyn CounterStore>) -> Self {
        Self { policy, store }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Checks and records one request for `client_key`.
    pub async fn check(&self, client_key: &str) -> Result<RateLimitDecision, RelayError> {
        if self.policy.quotas.is_empty() {
            return Ok(RateLimitDecision::unlimited());
        }
        let key = format!("{}:{}", self.policy.name, client_key);
        self.store.acquire(&key, &self.policy.quotas).await
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
