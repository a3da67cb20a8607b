//! Stateless action tokens for the switch protocol.
//!
//! A token proves that the request originated from a page rendered for a
//! specific action scope (`switch-to:<principal-id>` or `switch-back`). It is
//! an HMAC-SHA256 over the current time window and the scope, keyed by the
//! process-wide secret, so verification needs no server-side storage. Two
//! adjacent windows are accepted to tolerate requests issued just before a
//! window boundary.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default rolling window. With two adjacent windows accepted, a token stays
/// valid for 12 to 24 hours after issue.
pub const DEFAULT_WINDOW_SECS: i64 = 12 * 3600;

/// Truncated MAC length embedded in the token.
const TAG_LEN: usize = 20;

pub const SWITCH_BACK_SCOPE: &str = "switch-back";

pub fn switch_to_scope(target_id: &str) -> String {
    format!("switch-to:{}", target_id)
}

/// Issues and verifies time-windowed action tokens. Pure function of
/// (scope, secret, current time); no side effects.
#[derive(Clone)]
pub struct TokenService {
    key: HmacSha256,
    window_secs: i64,
}

impl TokenService {
    pub fn new(secret: &[u8], window_secs: i64) -> Self {
        // HMAC accepts keys of any length.
        let key = HmacSha256::new_from_slice(secret).expect("hmac key");
        let window_secs = window_secs.max(1);
        Self { key, window_secs }
    }

    pub fn with_default_window(secret: &[u8]) -> Self {
        Self::new(secret, DEFAULT_WINDOW_SECS)
    }

    fn tag_for(&self, window_index: i64, scope: &str) -> Vec<u8> {
        let mut mac = self.key.clone();
        mac.update(format!("{}|{}", window_index, scope).as_bytes());
        mac.finalize().into_bytes()[..TAG_LEN].to_vec()
    }

    pub fn issue(&self, scope: &str) -> String {
        self.issue_at(scope, Utc::now().timestamp())
    }

    pub fn issue_at(&self, scope: &str, now: i64) -> String {
        let tag = self.tag_for(now.div_euclid(self.window_secs), scope);
        URL_SAFE_NO_PAD.encode(tag)
    }

    /// Recomputes the expected token for the current and previous window and
    /// compares in constant time. Returns false on any mismatch, expired
    /// window or malformed input; never errors.
    pub fn verify(&self, token: &str, scope: &str) -> bool {
        self.verify_at(token, scope, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, scope: &str, now: i64) -> bool {
        let Ok(tag) = URL_SAFE_NO_PAD.decode(token) else { return false };
        if tag.len() != TAG_LEN {
            return false;
        }
        let idx = now.div_euclid(self.window_secs);
        for i in [idx, idx - 1] {
            let mut mac = self.key.clone();
            mac.update(format!("{}|{}", i, scope).as_bytes());
            if mac.verify_truncated_left(&tag).is_ok() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc() -> TokenService {
        TokenService::new(b"test-secret", DEFAULT_WINDOW_SECS)
    }

    #[test]
    fn issue_then_verify_same_scope() {
        let s = svc();
        let t = s.issue_at("switch-back", 1_000_000);
        assert!(s.verify_at(&t, "switch-back", 1_000_000));
    }

    #[test]
    fn scope_binding() {
        let s = svc();
        let t = s.issue_at(&switch_to_scope("7"), 1_000_000);
        assert!(s.verify_at(&t, &switch_to_scope("7"), 1_000_000));
        assert!(!s.verify_at(&t, &switch_to_scope("8"), 1_000_000));
        assert!(!s.verify_at(&t, SWITCH_BACK_SCOPE, 1_000_000));
    }

    #[test]
    fn previous_window_accepted_older_rejected() {
        let s = svc();
        let now = 10 * DEFAULT_WINDOW_SECS;
        let t = s.issue_at("switch-back", now);
        // Same and next window verify.
        assert!(s.verify_at(&t, "switch-back", now + DEFAULT_WINDOW_SECS - 1));
        assert!(s.verify_at(&t, "switch-back", now + DEFAULT_WINDOW_SECS));
        // Two windows later it is expired.
        assert!(!s.verify_at(&t, "switch-back", now + 2 * DEFAULT_WINDOW_SECS));
    }

    #[test]
    fn malformed_tokens_rejected() {
        let s = svc();
        assert!(!s.verify_at("", "switch-back", 0));
        assert!(!s.verify_at("not base64 !!!", "switch-back", 0));
        assert!(!s.verify_at("AAAA", "switch-back", 0));
    }

    #[test]
    fn different_secrets_do_not_cross_verify() {
        let a = TokenService::new(b"secret-a", DEFAULT_WINDOW_SECS);
        let b = TokenService::new(b"secret-b", DEFAULT_WINDOW_SECS);
        let t = a.issue_at("switch-back", 1_000_000);
        assert!(!b.verify_at(&t, "switch-back", 1_000_000));
    }
}
