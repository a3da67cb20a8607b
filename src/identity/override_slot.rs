//! The override slot: a single signed, expiring client-held record of the
//! original principal during a switch. The cookie value carries its own
//! HMAC-SHA256 tag because the HTTP layer has no built-in cookie signing;
//! a tampered or expired value reads back as "no override".
//!
//! Wire format: `<id>|<expires_at>|<tag>` with the id percent-encoded so the
//! separator stays unambiguous.

use axum::http::HeaderValue;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const OVERRIDE_COOKIE: &str = "switchgate_original";

/// Override records expire one hour after the switch.
pub const OVERRIDE_TTL_SECS: i64 = 3600;

/// Who is really logged in while a switch is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideRecord {
    pub original_principal_id: String,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct OverrideSlot {
    key: HmacSha256,
}

impl OverrideSlot {
    pub fn new(secret: &[u8]) -> Self {
        // HMAC accepts keys of any length.
        let key = HmacSha256::new_from_slice(secret).expect("hmac key");
        Self { key }
    }

    fn tag(&self, id: &str, expires_at: i64) -> String {
        let mut mac = self.key.clone();
        mac.update(format!("{}|{}", id, expires_at).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    pub fn encode(&self, record: &OverrideRecord) -> String {
        let id = urlencoding::encode(&record.original_principal_id);
        format!("{}|{}|{}", id, record.expires_at, self.tag(&id, record.expires_at))
    }

    /// Parse a cookie value back into a record. Returns `None` when the value
    /// is malformed, the tag does not verify, or the record has expired --
    /// all three are indistinguishable from "no override" to callers.
    pub fn decode(&self, value: &str, now: i64) -> Option<OverrideRecord> {
        let mut parts = value.splitn(3, '|');
        let id_enc = parts.next()?;
        let expires_at: i64 = parts.next()?.parse().ok()?;
        let tag_b64 = parts.next()?;
        let tag = URL_SAFE_NO_PAD.decode(tag_b64).ok()?;
        let mut mac = self.key.clone();
        mac.update(format!("{}|{}", id_enc, expires_at).as_bytes());
        if mac.verify_slice(&tag).is_err() {
            return None;
        }
        if expires_at <= now {
            return None;
        }
        let id = urlencoding::decode(id_enc).ok()?.into_owned();
        Some(OverrideRecord { original_principal_id: id, expires_at })
    }

    /// Set-Cookie header establishing the override slot. HttpOnly and
    /// path-scoped to the site root, invisible to page scripts.
    pub fn set_cookie(&self, record: &OverrideRecord) -> HeaderValue {
        HeaderValue::from_str(&format!(
            "{}={}; Max-Age={}; HttpOnly; Secure; SameSite=Strict; Path=/",
            OVERRIDE_COOKIE,
            self.encode(record),
            OVERRIDE_TTL_SECS
        ))
        .unwrap()
    }

    /// Set-Cookie header that makes the client discard the slot on the next
    /// exchange: an already-expired value.
    pub fn clear_cookie(&self) -> HeaderValue {
        HeaderValue::from_str(&format!(
            "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
            OVERRIDE_COOKIE
        ))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> OverrideSlot {
        OverrideSlot::new(b"test-secret")
    }

    #[test]
    fn encode_decode_round_trip() {
        let s = slot();
        let rec = OverrideRecord { original_principal_id: "1".into(), expires_at: 5000 };
        let value = s.encode(&rec);
        assert_eq!(s.decode(&value, 4999), Some(rec));
    }

    #[test]
    fn expired_record_reads_as_none() {
        let s = slot();
        let rec = OverrideRecord { original_principal_id: "1".into(), expires_at: 5000 };
        let value = s.encode(&rec);
        assert_eq!(s.decode(&value, 5000), None);
        assert_eq!(s.decode(&value, 9000), None);
    }

    #[test]
    fn tampered_value_reads_as_none() {
        let s = slot();
        let rec = OverrideRecord { original_principal_id: "1".into(), expires_at: 5000 };
        let value = s.encode(&rec);
        // Swap the principal id without re-signing.
        let forged = value.replacen("1|", "2|", 1);
        assert_eq!(s.decode(&forged, 4000), None);
    }

    #[test]
    fn malformed_values_read_as_none() {
        let s = slot();
        assert_eq!(s.decode("", 0), None);
        assert_eq!(s.decode("1|not-a-number|tag", 0), None);
        assert_eq!(s.decode("1|5000", 0), None);
    }

    #[test]
    fn wrong_secret_reads_as_none() {
        let a = OverrideSlot::new(b"secret-a");
        let b = OverrideSlot::new(b"secret-b");
        let value = a.encode(&OverrideRecord { original_principal_id: "1".into(), expires_at: 5000 });
        assert_eq!(b.decode(&value, 4000), None);
    }

    #[test]
    fn ids_with_separator_survive_encoding() {
        let s = slot();
        let rec = OverrideRecord { original_principal_id: "a|b".into(), expires_at: 5000 };
        let value = s.encode(&rec);
        assert_eq!(s.decode(&value, 4000), Some(rec));
    }

    #[test]
    fn clear_cookie_is_epoch_expired() {
        let s = slot();
        let v = s.clear_cookie();
        let text = v.to_str().unwrap();
        assert!(text.contains("Expires=Thu, 01 Jan 1970"));
        assert!(text.contains("HttpOnly"));
    }
}
