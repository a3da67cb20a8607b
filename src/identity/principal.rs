use serde::{Deserialize, Serialize};

/// An authenticated identity tracked by the session system. The id is the
/// only field the protocol core keys on; display attributes exist for the
/// presentation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, contact: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            contact: contact.into(),
            roles,
        }
    }
}
