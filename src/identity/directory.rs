//! Directory collaborator: resolves principals and lists switch candidates.
//! The engine only ever references principals by id; candidate filtering
//! (excluding elevated roles) happens here so the menu feed never offers a
//! privileged identity as a switch target.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};

use super::capability::ELEVATED_ROLE;
use super::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    MostRecentlyRegistered,
}

#[derive(Debug, Clone)]
pub struct DirectoryQuery {
    pub exclude_roles: Vec<String>,
    pub limit: usize,
    pub order_by: OrderBy,
}

impl Default for DirectoryQuery {
    fn default() -> Self {
        Self {
            exclude_roles: vec![ELEVATED_ROLE.to_string()],
            limit: 20,
            order_by: OrderBy::MostRecentlyRegistered,
        }
    }
}

pub trait Directory: Send + Sync {
    fn resolve(&self, user_id: &str) -> Option<Principal>;
    fn candidates(&self, query: &DirectoryQuery) -> Vec<Principal>;
}

#[derive(Debug, Clone)]
struct UserRecord {
    principal: Principal,
    password_hash: String,
    registered_at: i64,
}

/// In-process user registry backing both the directory lookups and the host
/// login path.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a user. `registered_at` is a unix timestamp used
    /// for most-recently-registered ordering.
    pub fn add_user(&self, principal: Principal, password: &str, registered_at: i64) -> Result<()> {
        let hash = hash_password(password)?;
        let rec = UserRecord { principal: principal.clone(), password_hash: hash, registered_at };
        self.users.write().insert(principal.user_id.clone(), rec);
        Ok(())
    }

    pub fn authenticate(&self, user_id: &str, password: &str) -> Result<bool> {
        let users = self.users.read();
        match users.get(user_id) {
            Some(rec) => Ok(verify_password(&rec.password_hash, password)),
            None => Ok(false),
        }
    }

    pub fn has_user_with_role(&self, role: &str) -> bool {
        self.users.read().values().any(|r| r.principal.roles.iter().any(|x| x == role))
    }
}

impl Directory for InMemoryDirectory {
    fn resolve(&self, user_id: &str) -> Option<Principal> {
        self.users.read().get(user_id).map(|r| r.principal.clone())
    }

    fn candidates(&self, query: &DirectoryQuery) -> Vec<Principal> {
        let users = self.users.read();
        let mut recs: Vec<&UserRecord> = users
            .values()
            .filter(|r| !r.principal.roles.iter().any(|role| query.exclude_roles.contains(role)))
            .collect();
        match query.order_by {
            OrderBy::MostRecentlyRegistered => {
                recs.sort_by(|a, b| b.registered_at.cmp(&a.registered_at).then_with(|| a.principal.user_id.cmp(&b.principal.user_id)));
            }
        }
        recs.into_iter().take(query.limit).map(|r| r.principal.clone()).collect()
    }
}
