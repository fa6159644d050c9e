//! Email-confirmation code policy
//!
//! Pure rules for code generation, expiry and the resend cooldown. The
//! random generator is injected so behavior is reproducible under test.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Policy governing the lifetime of confirmation codes.
#[derive(Debug, Clone)]
pub struct ConfirmationPolicy {
    /// How long an issued code stays valid.
    code_ttl: Duration,
    /// Minimum time from issuance before a new code may be requested.
    resend_cooldown: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(30),
            resend_cooldown: Duration::minutes(2),
        }
    }
}

impl ConfirmationPolicy {
    pub fn new(code_ttl: Duration, resend_cooldown: Duration) -> Self {
        Self {
            code_ttl,
            resend_cooldown,
        }
    }

    /// Generate a fresh `(code, expires_at)` pair.
    ///
    /// Codes are uniform 6-digit decimals in `[100000, 999999]`, so the
    /// string form never loses a leading zero.
    pub fn issue<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> (String, DateTime<Utc>) {
        let code = rng.gen_range(100_000..=999_999).to_string();
        (code, now + self.code_ttl)
    }

    pub fn is_expired(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        expires_at < now
    }

    /// Whether a new code may be issued for a user whose live pair (if any)
    /// expires at `expires_at`.
    ///
    /// The issuance instant is recovered as `expires_at - code_ttl`; a resend
    /// becomes eligible `resend_cooldown` after that instant, and is always
    /// eligible when no pair is live.
    pub fn can_reissue(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match expires_at {
            None => true,
            Some(expires_at) => now >= expires_at - self.code_ttl + self.resend_cooldown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn codes_are_six_decimal_digits_in_range() {
        let policy = ConfirmationPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();

        for _ in 0..200 {
            let (code, _) = policy.issue(&mut rng, now);
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().expect("code must be numeric");
            assert!((100_000..=999_999).contains(&value), "out of range: {value}");
        }
    }

    #[test]
    fn expiry_is_thirty_minutes_from_issuance() {
        let policy = ConfirmationPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();

        let (_, expires_at) = policy.issue(&mut rng, now);
        assert_eq!(expires_at, now + Duration::minutes(30));
    }

    #[test]
    fn consecutive_codes_differ() {
        let policy = ConfirmationPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        let now = Utc::now();

        let (first, _) = policy.issue(&mut rng, now);
        let (second, _) = policy.issue(&mut rng, now);
        assert_ne!(first, second);
    }

    #[test]
    fn resend_blocked_inside_cooldown() {
        let policy = ConfirmationPolicy::default();
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::minutes(30);

        // One minute after issuance: still locked out.
        assert!(!policy.can_reissue(Some(expires_at), issued_at + Duration::minutes(1)));
        // Exactly two minutes after issuance: eligible.
        assert!(policy.can_reissue(Some(expires_at), issued_at + Duration::minutes(2)));
        // Well after expiry: always eligible.
        assert!(policy.can_reissue(Some(expires_at), issued_at + Duration::hours(2)));
    }

    #[test]
    fn resend_always_allowed_without_live_code() {
        let policy = ConfirmationPolicy::default();
        assert!(policy.can_reissue(None, Utc::now()));
    }

    #[test]
    fn code_expiry_boundary() {
        let policy = ConfirmationPolicy::default();
        let now = Utc::now();
        assert!(!policy.is_expired(now, now));
        assert!(policy.is_expired(now - Duration::seconds(1), now));
    }
}
