//! Storage-key construction for quota records.

use std::fmt;

/// The kind of quota a stored record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaKind {
    /// Per-(user, IP) minute window
    Minute,
    /// Per-(user, IP) hour window
    Hour,
    /// Per-(user, IP) burst window
    Burst,
    /// Per-IP hour window, across all users
    IpHour,
    /// Per-user daily token budget
    Tokens,
}

impl QuotaKind {
    fn prefix(&self) -> &'static str {
        match self {
            QuotaKind::Minute => "rate_minute",
            QuotaKind::Hour => "rate_hour",
            QuotaKind::Burst => "rate_burst",
            QuotaKind::IpHour => "rate_ip",
            QuotaKind::Tokens => "tokens",
        }
    }
}

/// A key that uniquely identifies one quota record.
///
/// Keys serialize to stable `kind:subject` strings, so an admin surface can
/// purge a user's records by substring match without knowing the kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    kind: QuotaKind,
    subject: String,
}

impl QuotaKey {
    /// Key for a window scoped to a (user, IP) pair.
    pub fn per_user_ip(kind: QuotaKind, user_id: &str, client_ip: &str) -> Self {
        Self {
            kind,
            subject: format!("{}:{}", user_id, client_ip),
        }
    }

    /// Key for the hourly window scoped to an IP alone.
    pub fn per_ip(client_ip: &str) -> Self {
        Self {
            kind: QuotaKind::IpHour,
            subject: client_ip.to_string(),
        }
    }

    /// Key for a user's daily token budget.
    pub fn tokens(user_id: &str) -> Self {
        Self {
            kind: QuotaKind::Tokens,
            subject: user_id.to_string(),
        }
    }

    /// The string form used as the record store key.
    pub fn to_storage_key(&self) -> String {
        format!("{}:{}", self.kind.prefix(), self.subject)
    }
}

impl fmt::Display for QuotaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_user_ip_key() {
        let key = QuotaKey::per_user_ip(QuotaKind::Minute, "alice", "1.2.3.4");
        assert_eq!(key.to_storage_key(), "rate_minute:alice:1.2.3.4");
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let minute = QuotaKey::per_user_ip(QuotaKind::Minute, "alice", "1.2.3.4");
        let burst = QuotaKey::per_user_ip(QuotaKind::Burst, "alice", "1.2.3.4");
        assert_ne!(minute.to_storage_key(), burst.to_storage_key());
    }

    #[test]
    fn test_user_appears_as_substring() {
        // Admin purges match on the bare user id
        for key in [
            QuotaKey::per_user_ip(QuotaKind::Hour, "alice", "1.2.3.4").to_storage_key(),
            QuotaKey::tokens("alice").to_storage_key(),
        ] {
            assert!(key.contains("alice"));
        }
    }

    #[test]
    fn test_display_matches_storage_key() {
        let key = QuotaKey::per_ip("10.0.0.1");
        assert_eq!(key.to_string(), key.to_storage_key());
    }
}
