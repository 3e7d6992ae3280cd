//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::resolver::ResolverConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the facility REST API (required).
    pub api_url: String,

    /// Bearer token for the API. When None, requests are unauthenticated.
    pub api_token: Option<String>,

    /// User the API token authenticates. The user-role endpoint is only
    /// trusted for this user.
    pub api_user_id: Option<String>,

    /// How long a resolved role is served from cache (default: 30s).
    pub role_cache_ttl: Duration,

    /// How long a facility member list is served from cache (default: 60s).
    pub members_cache_ttl: Duration,

    /// Deadline for the member-list fallback request (default: 10s).
    pub members_timeout: Duration,

    /// Per-request HTTP timeout (default: 30s).
    pub http_timeout: Duration,

    /// Maximum resident cache entries (default: 10000).
    pub cache_max_entries: usize,

    /// Interval between sweeps of expired cache entries (default: 60s).
    pub cache_sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_url =
            env::var("TASKHUB_API_URL").context("TASKHUB_API_URL environment variable is required")?;

        let api_token = env::var("TASKHUB_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let api_user_id = env::var("TASKHUB_USER_ID")
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let role_cache_ttl = secs_var("ROLE_CACHE_TTL_SECS", 30)?;
        let members_cache_ttl = secs_var("MEMBERS_CACHE_TTL_SECS", 60)?;
        let members_timeout = secs_var("MEMBERS_TIMEOUT_SECS", 10)?;
        let http_timeout = secs_var("HTTP_TIMEOUT_SECS", 30)?;
        let cache_sweep_interval = nonzero(
            "CACHE_SWEEP_INTERVAL_SECS",
            secs_var("CACHE_SWEEP_INTERVAL_SECS", 60)?,
        )?;

        let cache_max_entries = env::var("CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| DEFAULT_MAX_ENTRIES.to_string())
            .parse()
            .context("CACHE_MAX_ENTRIES must be a valid usize")?;

        Ok(Self {
            api_url,
            api_token,
            api_user_id,
            role_cache_ttl,
            members_cache_ttl,
            members_timeout,
            http_timeout,
            cache_max_entries,
            cache_sweep_interval,
        })
    }

    /// Resolver tuning derived from this configuration.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            role_ttl: self.role_cache_ttl,
            members_ttl: self.members_cache_ttl,
            members_timeout: self.members_timeout,
        }
    }
}

/// Read a whole-seconds duration, falling back to `default` when unset.
fn secs_var(name: &str, default: u64) -> Result<Duration> {
    parse_secs(name, env::var(name).ok().as_deref(), default)
}

fn parse_secs(name: &str, raw: Option<&str>, default: u64) -> Result<Duration> {
    let secs: u64 = match raw {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a whole number of seconds"))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn nonzero(name: &str, value: Duration) -> Result<Duration> {
    if value.is_zero() {
        bail!("{name} must be greater than zero");
    }
    Ok(value)
}
