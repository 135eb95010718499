//! Daily token budget tracking.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{self, RecordStore};

use super::key::QuotaKey;

/// Persistent state for one user's daily token spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetRecord {
    /// Cumulative tokens charged today
    pub total: i64,
    /// When the total was last written
    pub updated_at: DateTime<Utc>,
}

/// Estimated token cost of a prompt: one token per four characters,
/// rounded up.
pub fn estimate_tokens(text: &str) -> i64 {
    (text.chars().count() as i64 + 3) / 4
}

/// Tracks cumulative token spend per user, resetting at UTC midnight.
///
/// The day boundary is recomputed against the wall clock on every access;
/// no day identifier is stored. A record written before the current UTC
/// midnight reads as zero, and the next charge overwrites it with the
/// charged amount alone.
pub struct TokenBudget {
    store: Arc<dyn RecordStore>,
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

impl TokenBudget {
    /// Create a tracker over `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Tokens charged to `user_id` so far today.
    pub async fn peek(&self, user_id: &str) -> i64 {
        let key = QuotaKey::tokens(user_id).to_storage_key();
        match store::load::<BudgetRecord>(self.store.as_ref(), &key).await {
            Some(record) if record.updated_at >= start_of_day(Utc::now()) => record.total,
            _ => 0,
        }
    }

    /// Add `amount` to today's total for `user_id`.
    ///
    /// A stored total from a previous UTC day is discarded: the new total
    /// becomes `amount` alone.
    pub async fn charge(&self, user_id: &str, amount: i64) {
        let key = QuotaKey::tokens(user_id).to_storage_key();
        let now = Utc::now();
        let prior = match store::load::<BudgetRecord>(self.store.as_ref(), &key).await {
            Some(record) if record.updated_at >= start_of_day(now) => record.total,
            _ => 0,
        };
        let record = BudgetRecord {
            total: prior + amount,
            updated_at: now,
        };
        debug!(user = %user_id, amount, total = record.total, "Charged token budget");
        store::persist(self.store.as_ref(), &key, &record).await;
    }

    /// Reverse a provisional charge after a failed downstream call.
    pub async fn refund(&self, user_id: &str, amount: i64) {
        self.charge(user_id, -amount).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use serde_json::json;

    fn budget() -> (Arc<MemoryStore>, TokenBudget) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), TokenBudget::new(store))
    }

    #[tokio::test]
    async fn test_peek_without_record() {
        let (_, budget) = budget();
        assert_eq!(budget.peek("alice").await, 0);
    }

    #[tokio::test]
    async fn test_charge_accumulates() {
        let (_, budget) = budget();

        budget.charge("alice", 1000).await;
        budget.charge("alice", 250).await;
        assert_eq!(budget.peek("alice").await, 1250);
    }

    #[tokio::test]
    async fn test_refund_restores_prior_total() {
        let (_, budget) = budget();

        budget.charge("alice", 500).await;
        budget.charge("alice", 700).await;
        budget.refund("alice", 700).await;
        assert_eq!(budget.peek("alice").await, 500);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let (_, budget) = budget();

        budget.charge("alice", 100).await;
        assert_eq!(budget.peek("bob").await, 0);
    }

    #[tokio::test]
    async fn test_stale_record_reads_as_zero() {
        let (store, budget) = budget();
        let yesterday = BudgetRecord {
            total: 90_000,
            updated_at: Utc::now() - Duration::days(1),
        };
        store
            .put("tokens:alice", serde_json::to_value(&yesterday).unwrap())
            .await
            .unwrap();

        assert_eq!(budget.peek("alice").await, 0);
    }

    #[tokio::test]
    async fn test_charge_resets_stale_record() {
        let (store, budget) = budget();
        let yesterday = BudgetRecord {
            total: 90_000,
            updated_at: Utc::now() - Duration::days(1),
        };
        store
            .put("tokens:alice", serde_json::to_value(&yesterday).unwrap())
            .await
            .unwrap();

        budget.charge("alice", 400).await;
        assert_eq!(budget.peek("alice").await, 400);
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_zero() {
        let (store, budget) = budget();
        store.put("tokens:alice", json!("garbage")).await.unwrap();

        assert_eq!(budget.peek("alice").await, 0);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }
}
