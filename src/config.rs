//! Environment-driven configuration. The token/cookie secret has a defined
//! lifecycle: taken from `SWITCHGATE_SECRET` (base64) when set, otherwise
//! generated once at process start and rotated only on restart, which also
//! invalidates outstanding tokens and override cookies.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::warn;

use crate::token::DEFAULT_WINDOW_SECS;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub secret: Vec<u8>,
    pub dashboard_url: String,
    pub token_window_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let http_port = match std::env::var("SWITCHGATE_HTTP_PORT") {
            Ok(v) => v.parse::<u16>().with_context(|| format!("invalid SWITCHGATE_HTTP_PORT: {}", v))?,
            Err(_) => 7878,
        };
        let secret = match std::env::var("SWITCHGATE_SECRET") {
            Ok(v) => {
                let bytes = STANDARD.decode(v.trim()).context("SWITCHGATE_SECRET is not valid base64")?;
                if bytes.len() < 16 {
                    return Err(anyhow!("SWITCHGATE_SECRET must decode to at least 16 bytes"));
                }
                bytes
            }
            Err(_) => {
                warn!("SWITCHGATE_SECRET not set; generating an ephemeral secret, tokens will not survive a restart");
                let mut bytes = [0u8; 32];
                getrandom::getrandom(&mut bytes).map_err(|e| anyhow!(e.to_string()))?;
                bytes.to_vec()
            }
        };
        let dashboard_url = std::env::var("SWITCHGATE_DASHBOARD_URL").unwrap_or_else(|_| "/".to_string());
        let token_window_secs = match std::env::var("SWITCHGATE_TOKEN_WINDOW_SECS") {
            Ok(v) => v.parse::<i64>().with_context(|| format!("invalid SWITCHGATE_TOKEN_WINDOW_SECS: {}", v))?,
            Err(_) => DEFAULT_WINDOW_SECS,
        };
        Ok(Self { http_port, secret, dashboard_url, token_window_secs })
    }
}
