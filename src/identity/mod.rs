//! Identity, session and override-slot management for the switch protocol.
//! Keep the public surface thin and split implementation across sub-modules.

mod capability;
mod directory;
mod override_slot;
mod principal;
mod request_context;
mod session;

pub use capability::{can_manage_site, ELEVATED_ROLE};
pub use directory::{Directory, DirectoryQuery, InMemoryDirectory, OrderBy};
pub use override_slot::{OverrideRecord, OverrideSlot, OVERRIDE_COOKIE, OVERRIDE_TTL_SECS};
pub use principal::Principal;
pub use request_context::RequestContext;
pub use session::{SessionId, SessionManager};
