//! Client configuration: candidate backends, deadlines and retry policy.

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Well-known local addresses tried after the primary base URL.
pub const FALLBACK_BASE_URLS: [&str; 3] = [
    "http://127.0.0.1:8000",
    "http://0.0.0.0:8000",
    // docker desktop alias for the host
    "http://host.docker.internal:8000",
];

pub const ENV_BASE_URL: &str = "TASKDESK_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TASKDESK_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    candidates: Vec<String>,
    /// Deadline for each liveness probe during endpoint resolution.
    pub probe_timeout: Duration,
    /// Deadline for each request attempt.
    pub request_timeout: Duration,
    /// Deadline for `test_connection`.
    pub health_timeout: Duration,
    /// Attempts per candidate before falling back to the next one.
    pub max_attempts: u32,
    /// Pause after an attempt that hit its deadline.
    pub timeout_backoff: Duration,
    /// Pause after an attempt that failed at the network level.
    pub network_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_primary(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    /// Primary base URL followed by the local fallbacks.
    pub fn with_primary(base_url: &str) -> Self {
        let mut urls = vec![base_url.to_string()];
        urls.extend(FALLBACK_BASE_URLS.iter().map(|u| u.to_string()));
        Self {
            candidates: normalize(urls),
            probe_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(10),
            max_attempts: 3,
            timeout_backoff: Duration::from_secs(2),
            network_backoff: Duration::from_secs(1),
        }
    }

    /// An exact candidate list, without the built-in fallbacks.
    pub fn with_candidates<I, S>(urls: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates = normalize(urls.into_iter().map(Into::into).collect());
        if candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        Ok(Self {
            candidates,
            ..Self::default()
        })
    }

    /// Read `TASKDESK_API_BASE_URL` and `TASKDESK_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let primary = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::with_primary(primary.trim());

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_REQUEST_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Replace the primary base URL, keeping the fallbacks and all timings.
    pub fn with_primary_url(mut self, base_url: &str) -> Self {
        self.candidates = Self::with_primary(base_url).candidates;
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn primary(&self) -> &str {
        &self.candidates[0]
    }

    pub fn with_timeouts(mut self, probe: Duration, request: Duration, health: Duration) -> Self {
        self.probe_timeout = probe;
        self.request_timeout = request;
        self.health_timeout = health;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, timeout_backoff: Duration, network_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.timeout_backoff = timeout_backoff;
        self.network_backoff = network_backoff;
        self
    }
}

/// Strip trailing slashes, drop blanks and keep the first occurrence of each URL.
fn normalize(urls: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.trim().trim_end_matches('/').to_string();
        if !url.is_empty() && !out.contains(&url) {
            out.push(url);
        }
    }
    out
}
