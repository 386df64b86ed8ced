mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::secret::secret_from_env;

/// Environment variables consulted, in order, for the chat backend API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["LECTERN_LLM_API_KEY", "DEEPSEEK_API_KEY"];

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Pull secrets out of the environment.
    pub fn resolve_secrets(&mut self) {
        self.secrets.llm_api_key = secret_from_env(&API_KEY_ENV_VARS);
        if self.secrets.llm_api_key.is_none() {
            tracing::warn!(
                vars = ?API_KEY_ENV_VARS,
                "no chat backend API key found in environment"
            );
        }
    }

    /// Reject values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url must not be empty");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.llm.timeout_secs == 0 || self.llm.connect_timeout_secs == 0 {
            bail!("llm timeouts must be greater than zero");
        }
        if self.server.port == 0 {
            bail!("server.port must be greater than zero");
        }
        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be greater than zero");
        }
        if self.server.upload_dir.trim().is_empty() {
            bail!("server.upload_dir must not be empty");
        }
        if self.session.ttl_secs == 0 {
            bail!("session.ttl_secs must be greater than zero");
        }
        if self.session.sweep_interval_secs == 0 {
            bail!("session.sweep_interval_secs must be greater than zero");
        }
        if self.session.cookie_name.is_empty()
            || !self
                .session
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            bail!(
                "session.cookie_name must be non-empty and contain only ASCII letters, digits, '-' or '_'"
            );
        }
        if self.context.max_context_chars == Some(0) {
            bail!("context.max_context_chars must be greater than zero when set");
        }
        Ok(())
    }
}
