use super::override_slot::OverrideRecord;
use super::principal::Principal;
use super::session::SessionId;

/// Everything the engine needs to know about one inbound request, resolved
/// once at the HTTP boundary: the host session (if any), the principal it
/// maps to, and the override record carried by the client (if any).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub session_id: Option<SessionId>,
    pub principal: Option<Principal>,
    pub override_record: Option<OverrideRecord>,
}
