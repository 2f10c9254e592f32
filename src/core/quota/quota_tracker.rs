// Per-user daily quota for AI rewrites.
//
// A quota day is a calendar day in one fixed reference timezone, the same for
// every user regardless of where they write from. Records reset lazily: the
// first touch after midnight starts a fresh day, no background sweeper.
//
// `check` and `commit` are separate on purpose: the workflow checks before
// starting a rewrite and commits only after the rewrite actually succeeded.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("daily rewrite limit reached ({used}/{limit})")]
    Exceeded { used: u32, limit: u32 },
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    pub daily_limit: u32,
    pub timezone: Tz,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 3,
            timezone: chrono_tz::Europe::Moscow,
        }
    }
}

// ============================================================================
// TRACKER
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct QuotaRecord {
    day: NaiveDate,
    used: u32,
}

pub struct QuotaTracker {
    config: QuotaConfig,
    records: DashMap<u64, QuotaRecord>,
}

impl QuotaTracker {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now()
            .with_timezone(&self.config.timezone)
            .date_naive()
    }

    /// Does this user have quota left today? Does not consume anything.
    pub fn check(&self, user_id: u64) -> Result<(), QuotaError> {
        self.check_on(user_id, self.today())
    }

    /// Consume one unit of today's quota. Call only after the paid action
    /// succeeded; counts never rise above the configured limit.
    pub fn commit(&self, user_id: u64) {
        self.commit_on(user_id, self.today());
    }

    /// `(used, limit)` for today, for user-facing status lines.
    pub fn usage(&self, user_id: u64) -> (u32, u32) {
        self.usage_on(user_id, self.today())
    }

    fn used_on(&self, user_id: u64, day: NaiveDate) -> u32 {
        self.records
            .get(&user_id)
            .map(|r| if r.day == day { r.used } else { 0 })
            .unwrap_or(0)
    }

    fn check_on(&self, user_id: u64, day: NaiveDate) -> Result<(), QuotaError> {
        let used = self.used_on(user_id, day);
        if used >= self.config.daily_limit {
            return Err(QuotaError::Exceeded {
                used,
                limit: self.config.daily_limit,
            });
        }
        Ok(())
    }

    fn commit_on(&self, user_id: u64, day: NaiveDate) {
        let mut record = self.records.entry(user_id).or_insert(QuotaRecord { day, used: 0 });
        if record.day != day {
            record.day = day;
            record.used = 0;
        }
        if record.used < self.config.daily_limit {
            record.used += 1;
        }
    }

    fn usage_on(&self, user_id: u64, day: NaiveDate) -> (u32, u32) {
        (self.used_on(user_id, day), self.config.daily_limit)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(daily_limit: u32) -> QuotaTracker {
        QuotaTracker::new(QuotaConfig {
            daily_limit,
            ..QuotaConfig::default()
        })
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_quota_exhausts_at_limit() {
        let quota = tracker(2);
        let today = day(1);

        assert!(quota.check_on(7, today).is_ok());
        quota.commit_on(7, today);
        assert!(quota.check_on(7, today).is_ok());
        quota.commit_on(7, today);

        assert_eq!(
            quota.check_on(7, today),
            Err(QuotaError::Exceeded { used: 2, limit: 2 })
        );
    }

    #[test]
    fn test_new_day_resets_lazily() {
        let quota = tracker(2);
        quota.commit_on(7, day(1));
        quota.commit_on(7, day(1));
        assert!(quota.check_on(7, day(1)).is_err());

        // First touch on the next day starts fresh.
        assert!(quota.check_on(7, day(2)).is_ok());
        assert_eq!(quota.usage_on(7, day(2)), (0, 2));
        quota.commit_on(7, day(2));
        assert_eq!(quota.usage_on(7, day(2)), (1, 2));
    }

    #[test]
    fn test_count_never_exceeds_limit() {
        let quota = tracker(2);
        for _ in 0..5 {
            quota.commit_on(7, day(1));
        }
        assert_eq!(quota.usage_on(7, day(1)), (2, 2));
    }

    #[test]
    fn test_zero_limit_always_refuses() {
        let quota = tracker(0);
        assert_eq!(
            quota.check_on(7, day(1)),
            Err(QuotaError::Exceeded { used: 0, limit: 0 })
        );
    }

    #[test]
    fn test_users_are_tracked_independently() {
        let quota = tracker(1);
        quota.commit_on(7, day(1));
        assert!(quota.check_on(7, day(1)).is_err());
        assert!(quota.check_on(8, day(1)).is_ok());
        assert_eq!(quota.usage_on(8, day(1)), (0, 1));
    }
}
