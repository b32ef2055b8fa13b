//! Rate Limiter Property Tests
//!
//! Validates limit enforcement against the in-memory counter store.

use std::sync::Arc;

use proptest::prelude::*;
use relay_edge::rate_limiter::{
    Clock, InMemoryCounterStore, Quota, RateLimitDecision, RateLimitPolicy, RateLimiter,
};

use super::generators::client_key;

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

fn limiter(now: u64, quotas: Vec<Quota>) -> RateLimiter {
    RateLimiter::new(
        RateLimitPolicy::new("route", quotas),
        Arc::new(InMemoryCounterStore::with_clock(Arc::new(FixedClock(now)))),
    )
}

fn admitted(limiter: &RateLimiter, key: &str, attempts: u32) -> u32 {
    tokio_test::block_on(async {
        let mut admitted = 0;
        for _ in 0..attempts {
            if matches!(limiter.check(key).await.unwrap(), RateLimitDecision::Allowed { .. }) {
                admitted += 1;
            }
        }
        admitted
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: exactly `limit` requests are admitted within one window
    #[test]
    fn prop_admits_exactly_limit(
        limit in 1u32..40,
        extra in 0u32..20,
        now in 0u64..10_000_000,
    ) {
        let limiter = limiter(now, vec![Quota::per_day(limit)]);
        prop_assert_eq!(admitted(&limiter, "k", limit + extra), limit);
    }

    /// Property: the tightest quota bounds admissions
    #[test]
    fn prop_tightest_quota_wins(
        day in 1u32..50,
        hour in 1u32..50,
        now in 0u64..10_000_000,
    ) {
        let limiter = limiter(now, vec![Quota::per_day(day), Quota::per_hour(hour)]);
        prop_assert_eq!(admitted(&limiter, "k", 120), day.min(hour));
    }

    /// Property: exhausting one client's budget leaves another's untouched
    #[test]
    fn prop_keys_are_isolated(
        a in client_key(),
        b in client_key(),
        limit in 1u32..10,
    ) {
        prop_assume!(a != b);
        let limiter = limiter(1_000, vec![Quota::per_minute(limit)]);

        prop_assert_eq!(admitted(&limiter, &a, limit + 5), limit);
        prop_assert_eq!(admitted(&limiter, &b, limit), limit);
    }

    /// Property: denied requests consume nothing from any quota
    #[test]
    fn prop_denials_are_free(
        minute in 1u32..5,
        denied_attempts in 1u32..30,
    ) {
        let store = Arc::new(InMemoryCounterStore::with_clock(Arc::new(FixedClock(0))));
        let limiter = RateLimiter::new(
            RateLimitPolicy::new("route", vec![Quota::per_minute(minute), Quota::per_day(1_000)]),
            store.clone(),
        );

        prop_assert_eq!(admitted(&limiter, "k", minute + denied_attempts), minute);

        // Same day counter, seen through a day-only policy
        let decision = tokio_test::block_on(
            RateLimiter::new(RateLimitPolicy::new("route", vec![Quota::per_day(1_000)]), store)
                .check("k"),
        )
        .unwrap();
        prop_assert_eq!(
            decision,
            RateLimitDecision::Allowed { limit: 1_000, remaining: 1_000 - minute - 1 }
        );
    }

    /// Property: retry-after never exceeds the longest window
    #[test]
    fn prop_retry_after_within_window(now in 0u64..10_000_000) {
        let limiter = limiter(now, vec![Quota::per_hour(1)]);
        tokio_test::block_on(async {
            limiter.check("k").await.unwrap();
            match limiter.check("k").await.unwrap() {
                RateLimitDecision::Denied { retry_after } => {
                    prop_assert!(retry_after.as_secs() >= 1);
                    prop_assert!(retry_after.as_secs() <= 3_600);
                }
                other => prop_assert!(false, "expected denial, got {:?}", other),
            }
            Ok(())
        })?;
    }
}
