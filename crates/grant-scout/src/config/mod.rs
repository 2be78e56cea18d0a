use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub grants_api: GrantsApiConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let api_key = env::var("GRANTS_API_KEY").unwrap_or_default();
        let base_url = env::var("GRANTS_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.simpler.grants.gov/v1".to_string());
        let request_timeout = parse_seconds("GRANTS_REQUEST_TIMEOUT_SECONDS", 30)?;
        let max_retries = parse_count("GRANTS_MAX_RETRIES", 3)?;

        let cache_ttl = parse_seconds("CACHE_TTL_SECONDS", 300)?;
        let cache_max_size = parse_count("CACHE_MAX_SIZE", 1000)?;
        if cache_max_size == 0 {
            return Err(ConfigError::InvalidCacheSize);
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            grants_api: GrantsApiConfig {
                api_key,
                base_url,
                request_timeout,
                max_retries,
            },
            cache: CacheConfig {
                ttl: cache_ttl,
                max_size: cache_max_size,
            },
        })
    }
}

fn parse_seconds(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidDuration { var }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn parse_count(var: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidCount { var }),
        Err(_) => Ok(default),
    }
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Credentials and limits for the upstream grants API.
#[derive(Debug, Clone)]
pub struct GrantsApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub max_retries: usize,
}

/// Bounds for the in-process response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDuration { var: &'static str },
    InvalidCount { var: &'static str },
    InvalidCacheSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDuration { var } => {
                write!(f, "{var} must be a whole number of seconds")
            }
            ConfigError::InvalidCount { var } => {
                write!(f, "{var} must be a non-negative integer")
            }
            ConfigError::InvalidCacheSize => write!(f, "CACHE_MAX_SIZE must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
