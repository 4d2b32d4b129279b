use anyhow::{Context, Result};
use std::env;

use crate::services::openrouter::DEFAULT_BASE_URL;

const DEFAULT_SECRET_KEY: &str = "your-secret-key-here";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    pub secret_key: String,
    pub bind_addr: String,
    pub upload_dir: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Read configuration from the environment (after `.env` has been loaded)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set in .env file", key))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let secret_key = lookup("SECRET_KEY").unwrap_or_else(|| {
            log::warn!("⚠️ SECRET_KEY not set, using default (INSECURE!)");
            DEFAULT_SECRET_KEY.to_string()
        });

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {}", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            openrouter_model: optional("OPENROUTER_MODEL", "meta-llama/llama-4-scout:free"),
            openrouter_base_url: optional("OPENROUTER_BASE_URL", DEFAULT_BASE_URL),
            secret_key,
            bind_addr: optional("BIND_ADDR", "0.0.0.0:8080"),
            upload_dir: optional("UPLOAD_DIR", "./uploads"),
            public_base_url: optional("PUBLIC_BASE_URL", "http://localhost:8080"),
            max_upload_bytes,
        })
    }
}
