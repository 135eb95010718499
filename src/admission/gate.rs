//! Composite admission gate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use crate::config::LimitConfig;
use crate::store::RecordStore;

use super::budget::TokenBudget;
use super::key::{QuotaKey, QuotaKind};
use super::window::WindowLimiter;

const MINUTE_WINDOW_SECS: i64 = 60;
const HOUR_WINDOW_SECS: i64 = 3_600;
const BURST_WINDOW_SECS: i64 = 10;
/// Retry hint for a blown token budget. The budget resets at the next UTC
/// midnight regardless of when the violation occurred, so the hint is
/// pinned to a full day rather than derived from a window reset.
const TOKEN_BUDGET_RETRY_SECS: i64 = 86_400;

/// The outcome of evaluating one request against every quota.
#[derive(Debug, Clone)]
pub struct AdmissionVerdict {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Human-readable description of each failed check, in check order
    pub violations: Vec<String>,
    /// Longest retry delay suggested by any failed check; zero when allowed
    pub retry_after_secs: u64,
    /// Furthest reset among failed checks; the minute window's reset when allowed
    pub reset_at: DateTime<Utc>,
}

/// Evaluates the five admission checks and consumes quota on allow.
///
/// Checks run in a fixed order and every check is evaluated even after an
/// earlier one fails, so the verdict carries the complete violation list.
/// Quota is only consumed when all five checks pass: a denied request
/// leaves every counter and the token budget untouched.
pub struct AdmissionGate {
    limits: LimitConfig,
    windows: WindowLimiter,
    budget: TokenBudget,
}

impl AdmissionGate {
    /// Create a gate over `store` with the given quota ceilings.
    pub fn new(store: Arc<dyn RecordStore>, limits: LimitConfig) -> Self {
        Self {
            limits,
            windows: WindowLimiter::new(store.clone()),
            budget: TokenBudget::new(store),
        }
    }

    /// The token budget tracker, for refunding a provisional charge after a
    /// failed downstream call.
    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Evaluate a request and, if every check passes, consume quota for it.
    pub async fn evaluate(
        &self,
        user_id: &str,
        client_ip: &str,
        estimated_tokens: i64,
    ) -> AdmissionVerdict {
        let now = Utc::now();
        let mut violations = Vec::new();
        let mut retry_after_secs: i64 = 0;
        let mut reset_at = now;

        let minute_window = Duration::seconds(MINUTE_WINDOW_SECS);
        let hour_window = Duration::seconds(HOUR_WINDOW_SECS);
        let burst_window = Duration::seconds(BURST_WINDOW_SECS);

        let minute_key =
            QuotaKey::per_user_ip(QuotaKind::Minute, user_id, client_ip).to_storage_key();
        let hour_key = QuotaKey::per_user_ip(QuotaKind::Hour, user_id, client_ip).to_storage_key();
        let burst_key =
            QuotaKey::per_user_ip(QuotaKind::Burst, user_id, client_ip).to_storage_key();
        let ip_key = QuotaKey::per_ip(client_ip).to_storage_key();

        let minute = self
            .windows
            .check(&minute_key, minute_window, self.limits.requests_per_minute)
            .await;
        if !minute.within_limit {
            violations.push(format!(
                "Rate limit exceeded: {} requests per minute",
                self.limits.requests_per_minute
            ));
            retry_after_secs = retry_after_secs.max(seconds_until(now, minute.reset_at));
            reset_at = reset_at.max(minute.reset_at);
        }

        let hour = self
            .windows
            .check(&hour_key, hour_window, self.limits.requests_per_hour)
            .await;
        if !hour.within_limit {
            violations.push(format!(
                "Rate limit exceeded: {} requests per hour",
                self.limits.requests_per_hour
            ));
            retry_after_secs = retry_after_secs.max(seconds_until(now, hour.reset_at));
            reset_at = reset_at.max(hour.reset_at);
        }

        let burst = self
            .windows
            .check(&burst_key, burst_window, self.limits.burst_limit)
            .await;
        if !burst.within_limit {
            violations.push(format!(
                "Burst limit exceeded: {} requests per {} seconds",
                self.limits.burst_limit, BURST_WINDOW_SECS
            ));
            retry_after_secs = retry_after_secs.max(seconds_until(now, burst.reset_at));
            reset_at = reset_at.max(burst.reset_at);
        }

        let spent = self.budget.peek(user_id).await;
        if spent + estimated_tokens > self.limits.daily_token_limit {
            violations.push(format!(
                "Daily token budget of {} exhausted",
                self.limits.daily_token_limit
            ));
            retry_after_secs = retry_after_secs.max(TOKEN_BUDGET_RETRY_SECS);
            reset_at = reset_at.max(now + Duration::seconds(TOKEN_BUDGET_RETRY_SECS));
        }

        // Per-IP ceiling. Unlike the per-user windows, this admits the
        // request that lands exactly on the limit: the count the request
        // would reach must strictly exceed the ceiling to deny.
        let ip = self
            .windows
            .check(&ip_key, hour_window, self.limits.ip_hourly_limit)
            .await;
        if ip.current_count + 1 > self.limits.ip_hourly_limit {
            violations.push(format!(
                "IP request ceiling of {} per hour exceeded",
                self.limits.ip_hourly_limit
            ));
            retry_after_secs = retry_after_secs.max(seconds_until(now, ip.reset_at));
            reset_at = reset_at.max(ip.reset_at);
        }

        let allowed = violations.is_empty();
        if allowed {
            self.windows.record_hit(&minute_key, minute_window).await;
            self.windows.record_hit(&hour_key, hour_window).await;
            self.windows.record_hit(&burst_key, burst_window).await;
            self.windows.record_hit(&ip_key, hour_window).await;
            self.budget.charge(user_id, estimated_tokens).await;
            reset_at = minute.reset_at;
            trace!(user = %user_id, ip = %client_ip, "Request admitted");
        } else {
            debug!(
                user = %user_id,
                ip = %client_ip,
                violations = violations.len(),
                "Request denied"
            );
        }

        AdmissionVerdict {
            allowed,
            violations,
            retry_after_secs: retry_after_secs.max(0) as u64,
            reset_at,
        }
    }
}

/// Whole seconds from `now` until `reset_at`, at least one for a live window.
fn seconds_until(now: DateTime<Utc>, reset_at: DateTime<Utc>) -> i64 {
    (reset_at - now).num_seconds().max(1)
}
