//! Unified application error model for the switch protocol.
//! Every protocol failure is terminal for the request: the HTTP layer maps the
//! variant to a status code and a blocking JSON body, never a redirect.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed request input (unparseable query parameters and the like).
    UserInput { code: String, message: String },
    /// Bad, expired or wrong-scope action token. Unresolvable switch targets
    /// also land here: the engine cannot distinguish a forged target id from
    /// a token replayed against the wrong scope.
    Authorization { code: String, message: String },
    /// Actor lacks the elevated capability required to initiate a switch.
    Permission { code: String, message: String },
    /// Switch-back requested with no override record present.
    NoOverride { code: String, message: String },
    /// Switch-to requested while an override is already active.
    Conflict { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Authorization { code, .. }
            | AppError::Permission { code, .. }
            | AppError::NoOverride { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Authorization { message, .. }
            | AppError::Permission { message, .. }
            | AppError::NoOverride { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn authorization<S: Into<String>>(code: S, msg: S) -> Self { AppError::Authorization { code: code.into(), message: msg.into() } }
    pub fn permission<S: Into<String>>(code: S, msg: S) -> Self { AppError::Permission { code: code.into(), message: msg.into() } }
    pub fn no_override<S: Into<String>>(code: S, msg: S) -> Self { AppError::NoOverride { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Authorization { .. } => 401,
            AppError::Permission { .. } => 403,
            AppError::NoOverride { .. } => 409,
            AppError::Conflict { .. } => 409,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::authorization("bad_token", "no").http_status(), 401);
        assert_eq!(AppError::permission("not_admin", "no").http_status(), 403);
        assert_eq!(AppError::no_override("no_override", "nothing to switch back to").http_status(), 409);
        assert_eq!(AppError::conflict("switch_active", "already switched").http_status(), 409);
        assert_eq!(AppError::internal("internal", "boom").http_status(), 500);
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = AppError::no_override("no_override", "nothing to switch back to");
        assert_eq!(e.to_string(), "no_override: nothing to switch back to");
    }
}
