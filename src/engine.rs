//! The switch protocol engine: the state machine deciding switch-to and
//! switch-back requests.
//!
//! A session is `Normal` when no override record is present and `Switched`
//! while one is. Guards run strictly before any mutation: when a guard fails
//! the session principal and override slot are exactly as they were before
//! the request.
//!
//! The engine's switch-to authorization is token possession plus the elevated
//! capability. Tokens scoped to privileged targets are never issued (the
//! candidate list excludes elevated roles), so the engine does not repeat
//! that policy check here.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{
    can_manage_site, Directory, DirectoryQuery, OverrideRecord, RequestContext, SessionManager,
    OVERRIDE_TTL_SECS,
};
use crate::token::{switch_to_scope, TokenService, SWITCH_BACK_SCOPE};

/// Inbound switch intent, parsed from the `switch_to` / `switch_back` /
/// `_token` query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchRequest {
    To { target_id: String, token: String },
    Back { token: String },
}

impl SwitchRequest {
    /// Returns `None` when the query names neither intent; a present intent
    /// with a missing `_token` yields an empty token, which verification
    /// rejects downstream.
    pub fn from_query(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        if let Some(target_id) = get("switch_to") {
            let token = get("_token").unwrap_or_default();
            return Some(SwitchRequest::To { target_id, token });
        }
        if get("switch_back").is_some() {
            let token = get("_token").unwrap_or_default();
            return Some(SwitchRequest::Back { token });
        }
        None
    }
}

/// What the override slot should become as part of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideDirective {
    Establish(OverrideRecord),
    Clear,
}

/// A successful transition: the caller redirects and applies the override
/// directive to the client-held slot.
#[derive(Debug, Clone)]
pub struct SwitchOutcome {
    pub redirect_to: String,
    pub override_directive: OverrideDirective,
}

/// Menu feed for the presentation layer. Rendering is a collaborator
/// concern; the engine only supplies the data.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchMenu {
    SwitchBack { original_display_name: String, url: String },
    SwitchTo { links: Vec<SwitchLink> },
    Hidden,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SwitchLink {
    pub label: String,
    pub url: String,
}

#[derive(Clone)]
pub struct SwitchEngine {
    tokens: TokenService,
    sessions: SessionManager,
    directory: Arc<dyn Directory>,
    dashboard_url: String,
}

impl SwitchEngine {
    pub fn new(
        tokens: TokenService,
        sessions: SessionManager,
        directory: Arc<dyn Directory>,
        dashboard_url: impl Into<String>,
    ) -> Self {
        Self { tokens, sessions, directory, dashboard_url: dashboard_url.into() }
    }

    pub fn handle(&self, ctx: &RequestContext, req: &SwitchRequest) -> AppResult<SwitchOutcome> {
        match req {
            SwitchRequest::To { target_id, token } => self.switch_to(ctx, target_id, token),
            SwitchRequest::Back { token } => self.switch_back(ctx, token),
        }
    }

    fn switch_to(&self, ctx: &RequestContext, target_id: &str, token: &str) -> AppResult<SwitchOutcome> {
        // Capability first: a non-privileged actor is rejected regardless of
        // what token it presents.
        let (Some(sid), Some(actor)) = (&ctx.session_id, &ctx.principal) else {
            return Err(AppError::permission("not_privileged", "you do not have permission to switch users"));
        };
        if !can_manage_site(actor) {
            warn!("switch.to denied: actor={} lacks elevated capability", actor.user_id);
            return Err(AppError::permission("not_privileged", "you do not have permission to switch users"));
        }
        if !self.tokens.verify(token, &switch_to_scope(target_id)) {
            warn!("switch.to denied: bad token for target={}", target_id);
            return Err(AppError::authorization("bad_token", "security check failed, please try again"));
        }
        // Single-slot invariant: never overwrite an active override. A second
        // switch would permanently lose the original principal.
        if ctx.override_record.is_some() {
            return Err(AppError::conflict("switch_active", "a switch is already active, switch back first"));
        }
        // An unresolvable target is indistinguishable from a forged request.
        let Some(target) = self.directory.resolve(target_id) else {
            warn!("switch.to denied: unknown target={}", target_id);
            return Err(AppError::authorization("bad_token", "security check failed, please try again"));
        };
        // Guards passed; mutate the session and instruct the slot write.
        let original_id = actor.user_id.clone();
        if !self.sessions.re_establish(sid, target) {
            return Err(AppError::internal("session_lost", "session expired during switch"));
        }
        info!("switch.to ok: {} -> {}", original_id, target_id);
        let record = OverrideRecord {
            original_principal_id: original_id,
            expires_at: chrono::Utc::now().timestamp() + OVERRIDE_TTL_SECS,
        };
        Ok(SwitchOutcome {
            redirect_to: self.dashboard_url.clone(),
            override_directive: OverrideDirective::Establish(record),
        })
    }

    fn switch_back(&self, ctx: &RequestContext, token: &str) -> AppResult<SwitchOutcome> {
        let Some(record) = &ctx.override_record else {
            return Err(AppError::no_override("no_override", "no original user to switch back to"));
        };
        if !self.tokens.verify(token, SWITCH_BACK_SCOPE) {
            warn!("switch.back denied: bad token");
            return Err(AppError::authorization("bad_token", "security check failed, please try again"));
        }
        let Some(sid) = &ctx.session_id else {
            return Err(AppError::authorization("no_session", "not logged in"));
        };
        let Some(original) = self.directory.resolve(&record.original_principal_id) else {
            warn!("switch.back denied: original principal {} no longer resolvable", record.original_principal_id);
            return Err(AppError::authorization("bad_token", "security check failed, please try again"));
        };
        let original_id = original.user_id.clone();
        if !self.sessions.re_establish(sid, original) {
            return Err(AppError::internal("session_lost", "session expired during switch"));
        }
        info!("switch.back ok: restored {}", original_id);
        Ok(SwitchOutcome {
            redirect_to: self.dashboard_url.clone(),
            override_directive: OverrideDirective::Clear,
        })
    }

    /// Data for the presentation layer: a switch-back link while switched, a
    /// candidate list for a privileged viewer, nothing otherwise.
    pub fn menu_for(&self, ctx: &RequestContext) -> SwitchMenu {
        if let Some(record) = &ctx.override_record {
            // Switched: only the way back is offered, never more switching.
            let Some(original) = self.directory.resolve(&record.original_principal_id) else {
                return SwitchMenu::Hidden;
            };
            let token = self.tokens.issue(SWITCH_BACK_SCOPE);
            return SwitchMenu::SwitchBack {
                original_display_name: original.display_name,
                url: format!("/switch?switch_back=1&_token={}", token),
            };
        }
        let Some(viewer) = &ctx.principal else { return SwitchMenu::Hidden };
        if !can_manage_site(viewer) {
            return SwitchMenu::Hidden;
        }
        let links = self
            .directory
            .candidates(&DirectoryQuery::default())
            .into_iter()
            .map(|p| {
                let token = self.tokens.issue(&switch_to_scope(&p.user_id));
                SwitchLink {
                    label: format!("{} ({})", p.display_name, p.contact),
                    url: format!(
                        "/switch?switch_to={}&_token={}",
                        urlencoding::encode(&p.user_id),
                        token
                    ),
                }
            })
            .collect();
        SwitchMenu::SwitchTo { links }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_query_parses_switch_to() {
        let q = |k: &str| match k {
            "switch_to" => Some("5".to_string()),
            "_token" => Some("t".to_string()),
            _ => None,
        };
        assert_eq!(
            SwitchRequest::from_query(q),
            Some(SwitchRequest::To { target_id: "5".into(), token: "t".into() })
        );
    }

    #[test]
    fn from_query_parses_switch_back() {
        let q = |k: &str| match k {
            "switch_back" => Some("1".to_string()),
            "_token" => Some("t".to_string()),
            _ => None,
        };
        assert_eq!(SwitchRequest::from_query(q), Some(SwitchRequest::Back { token: "t".into() }));
    }

    #[test]
    fn from_query_ignores_unrelated_params() {
        let q = |k: &str| match k {
            "page" => Some("2".to_string()),
            _ => None,
        };
        assert_eq!(SwitchRequest::from_query(q), None);
    }

    #[test]
    fn from_query_missing_token_yields_empty_token() {
        let q = |k: &str| match k {
            "switch_back" => Some("1".to_string()),
            _ => None,
        };
        assert_eq!(SwitchRequest::from_query(q), Some(SwitchRequest::Back { token: String::new() }));
    }
}
