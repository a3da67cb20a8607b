use super::principal::Principal;

/// Role granting the site-management capability that gates switch-to.
pub const ELEVATED_ROLE: &str = "admin";

/// The single capability predicate consulted at every protocol transition.
/// Keeping it in one place avoids policy drift between the menu feed and the
/// engine guards.
pub fn can_manage_site(p: &Principal) -> bool {
    p.roles.iter().any(|r| r == ELEVATED_ROLE)
}
