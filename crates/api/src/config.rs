use std::str::FromStr;
use std::time::Duration;

/// A configuration variable held a value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a valid {expected}, got {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time each job task gets to exit during shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Token for the GitHub API. Comment notifications are disabled when unset.
    pub github_token: Option<String>,
    /// GitHub API root (default: `https://api.github.com`).
    pub github_api_url: String,
    /// Maximum running time per job in seconds; `0` disables the supervisor.
    pub job_timeout_secs: u64,
    /// How often the supervisor checks running jobs (default: `30`).
    pub supervisor_interval_secs: u64,
    /// Duration of one simulated work phase in milliseconds (default: `1000`).
    pub simulation_step_millis: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                       |
    /// | `GITHUB_TOKEN`             | unset                      |
    /// | `GITHUB_API_URL`           | `https://api.github.com`   |
    /// | `JOB_TIMEOUT_SECS`         | `3600`                     |
    /// | `SUPERVISOR_INTERVAL_SECS` | `30`                       |
    /// | `SIMULATION_STEP_MILLIS`   | `1000`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let github_token = lookup("GITHUB_TOKEN").filter(|t| !t.trim().is_empty());
        let github_api_url = lookup("GITHUB_API_URL")
            .unwrap_or_else(|| mvbot_github::client::DEFAULT_API_URL.into());

        Ok(Self {
            host,
            port: parse(&lookup, "PORT", 3000, "u16")?,
            cors_origins,
            request_timeout_secs: parse(&lookup, "REQUEST_TIMEOUT_SECS", 30, "u64")?,
            shutdown_timeout_secs: parse(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30, "u64")?,
            github_token,
            github_api_url,
            job_timeout_secs: parse(&lookup, "JOB_TIMEOUT_SECS", 3600, "u64")?,
            supervisor_interval_secs: parse(&lookup, "SUPERVISOR_INTERVAL_SECS", 30, "u64")?,
            simulation_step_millis: parse(&lookup, "SIMULATION_STEP_MILLIS", 1000, "u64")?,
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Running-time budget, or `None` when the supervisor is disabled.
    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_secs(self.supervisor_interval_secs.max(1))
    }

    pub fn simulation_step(&self) -> Duration {
        Duration::from_millis(self.simulation_step_millis)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            var,
            expected,
            value,
        }),
    }
}
