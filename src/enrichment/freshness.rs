//! Freshness policy for cached intelligence records.
//!
//! A record is fresh iff its age is within the caller-supplied maximum.
//! EPSS scores update weekly at most, so they tolerate a long window; the
//! KEV list changes more often and staleness there is higher-risk, so its
//! window is short. Both defaults are only defaults: every read takes an
//! explicit max-age, and a zero max-age forces a refresh.

use chrono::{DateTime, Duration, Utc};

/// Default maximum age for cached EPSS scores.
#[must_use]
pub fn epss_default_max_age() -> Duration {
    Duration::days(7)
}

/// Default maximum age for cached KEV entries.
#[must_use]
pub fn kev_default_max_age() -> Duration {
    Duration::days(1)
}

/// Check whether a record cached at `cached_at` is still fresh at `now`.
///
/// The boundary is inclusive: a record exactly `max_age` old is fresh.
/// Every read path (EPSS and KEV alike) goes through this one predicate so
/// the boundary cannot drift between sources.
#[must_use]
pub fn is_fresh(cached_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    now.signed_duration_since(cached_at) <= max_age
}
