use crate::notices::orchestrator::PollSettings;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the notices service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub gateway: GatewayConfig,
    pub polling: PollingConfig,
    pub dismissals: DismissalConfig,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("NOTICES_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let origin = env::var("NOTICES_GATEWAY_ORIGIN")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let origin = origin.trim().to_string();
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            return Err(ConfigError::InvalidGatewayOrigin(origin));
        }

        let poll_interval_ms = positive_millis("NOTICES_POLL_INTERVAL_MS", 60_000)?;
        let fetch_timeout_ms = positive_millis("NOTICES_FETCH_TIMEOUT_MS", 10_000)?;

        let ttl_secs = env::var("NOTICES_DISMISSAL_TTL_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidDuration("NOTICES_DISMISSAL_TTL_SECS"))?;

        let session_file = env::var("NOTICES_SESSION_FILE")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let host = env::var("NOTICES_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("NOTICES_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("NOTICES_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            gateway: GatewayConfig { origin },
            polling: PollingConfig {
                interval: Duration::from_millis(poll_interval_ms),
                fetch_timeout: Duration::from_millis(fetch_timeout_ms),
            },
            dismissals: DismissalConfig {
                ttl: chrono::Duration::seconds(ttl_secs),
                session_file,
            },
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn positive_millis(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|millis| *millis > 0)
            .ok_or(ConfigError::InvalidDuration(key)),
        Err(_) => Ok(default),
    }
}

/// Where the notices endpoint lives.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub origin: String,
}

/// Poll cadence and the per-fetch bound.
#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl PollingConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            poll_interval: self.interval,
            fetch_timeout: self.fetch_timeout,
        }
    }
}

/// Dismissal memory settings. Without a session file the process itself is
/// the session.
#[derive(Debug, Clone)]
pub struct DismissalConfig {
    pub ttl: chrono::Duration,
    pub session_file: Option<PathBuf>,
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidGatewayOrigin(String),
    InvalidDuration(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "NOTICES_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "NOTICES_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidGatewayOrigin(origin) => write!(
                f,
                "NOTICES_GATEWAY_ORIGIN must be an http(s) origin, got '{}'",
                origin
            ),
            ConfigError::InvalidDuration(key) => {
                write!(f, "{} must be a positive whole number", key)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidGatewayOrigin(_)
            | ConfigError::InvalidDuration(_) => None,
        }
    }
}
