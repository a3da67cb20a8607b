//! Host session management. The switch engine never touches the session map
//! directly; it re-establishes the session principal through
//! [`SessionManager::re_establish`], the same primitive login uses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::principal::Principal;

pub type SessionId = String;

#[derive(Debug, Clone)]
struct SessionEntry {
    principal: Principal,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct SessionManager {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
}

fn gen_sid() -> String {
    let mut bytes = [0u8; 16];
    let _ = getrandom::getrandom(&mut bytes);
    let mut sid = String::with_capacity(32);
    use std::fmt::Write as _;
    for b in &bytes {
        let _ = write!(&mut sid, "{:02x}", b);
    }
    sid
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(60 * 60))
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Create a fresh session for a principal; returns the new session id.
    pub fn establish(&self, principal: Principal) -> SessionId {
        let sid = gen_sid();
        let entry = SessionEntry { principal: principal.clone(), expires_at: Instant::now() + self.ttl };
        self.sessions.write().insert(sid.clone(), entry);
        debug!("session.establish user={} sid={}", principal.user_id, sid);
        sid
    }

    /// Replace the principal bound to an existing session, refreshing its
    /// expiry. Returns false if the session is unknown or expired.
    pub fn re_establish(&self, sid: &str, principal: Principal) -> bool {
        let mut map = self.sessions.write();
        match map.get_mut(sid) {
            Some(entry) if entry.expires_at > Instant::now() => {
                debug!("session.re_establish user={} sid={}", principal.user_id, sid);
                entry.principal = principal;
                entry.expires_at = Instant::now() + self.ttl;
                true
            }
            Some(_) => {
                map.remove(sid);
                false
            }
            None => false,
        }
    }

    /// The principal the session system currently treats as logged in.
    pub fn current(&self, sid: &str) -> Option<Principal> {
        let now = Instant::now();
        let mut drop_key = false;
        let out = {
            let map = self.sessions.read();
            match map.get(sid) {
                Some(entry) if entry.expires_at > now => Some(entry.principal.clone()),
                Some(_) => {
                    drop_key = true;
                    None
                }
                None => None,
            }
        };
        if drop_key {
            self.sessions.write().remove(sid);
        }
        out
    }

    pub fn logout(&self, sid: &str) -> bool {
        self.sessions.write().remove(sid).is_some()
    }
}
