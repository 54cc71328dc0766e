use std::path::PathBuf;
use std::time::Duration;

use crate::env_parse;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    /// Root directory; presets store under it or its subdirectories.
    pub root: PathBuf,
    /// Upper bound for writing and committing one request's files.
    pub io_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            io_timeout: Duration::from_secs(30),
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: env_parse("UPLOAD_ROOT").unwrap_or(defaults.root),
            io_timeout: env_parse::<u64>("UPLOAD_IO_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.io_timeout),
        }
    }
}
