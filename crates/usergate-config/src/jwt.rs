use std::env;
use std::time::Duration;

use crate::env_parse;

pub const DEFAULT_SECRET: &str = "default_secret_key";

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of issued tokens.
    pub access_token_expiry: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.to_string(),
            access_token_expiry: Duration::from_secs(4 * 3600),
        }
    }
}

impl JwtConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            secret: env::var("JWT_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.secret),
            access_token_expiry: env_parse::<u64>("JWT_ACCESS_EXPIRY")
                .map(Duration::from_secs)
                .unwrap_or(defaults.access_token_expiry),
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }
}
