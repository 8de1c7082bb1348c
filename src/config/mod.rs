use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::intake::{ApplicationStatus, CanonicalField};

const DEFAULT_MAX_ROWS: usize = 5_000;

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
    pub intake: IntakeConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            intake: IntakeConfig::from_env()?,
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Upload rules handed to the intake service at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    pub default_status: ApplicationStatus,
    /// Canonical fields every row must carry. `net_id` is always implied.
    pub required_fields: Vec<CanonicalField>,
    pub max_rows: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            default_status: ApplicationStatus::Pending,
            required_fields: vec![CanonicalField::NetId],
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl IntakeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("INTAKE_DEFAULT_STATUS") {
            config.default_status =
                ApplicationStatus::parse(&raw).ok_or(ConfigError::InvalidDefaultStatus(raw))?;
        }

        if let Ok(raw) = env::var("INTAKE_REQUIRED_FIELDS") {
            config.required_fields = raw
                .split(',')
                .filter(|key| !key.trim().is_empty())
                .map(|key| {
                    CanonicalField::from_key(key)
                        .ok_or_else(|| ConfigError::InvalidRequiredField(key.trim().to_string()))
                })
                .collect::<Result<_, _>>()?;
        }

        if let Ok(raw) = env::var("INTAKE_MAX_ROWS") {
            config.max_rows = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|rows| *rows > 0)
                .ok_or(ConfigError::InvalidMaxRows)?;
        }

        Ok(config)
    }

    /// Required fields with `net_id` first and duplicates removed.
    pub fn required_fields(&self) -> Vec<CanonicalField> {
        let mut fields = vec![CanonicalField::NetId];
        for field in &self.required_fields {
            if !fields.contains(field) {
                fields.push(*field);
            }
        }
        fields
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDefaultStatus(String),
    InvalidRequiredField(String),
    InvalidMaxRows,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDefaultStatus(value) => {
                write!(f, "INTAKE_DEFAULT_STATUS '{}' is not an application status", value)
            }
            ConfigError::InvalidRequiredField(value) => {
                write!(f, "INTAKE_REQUIRED_FIELDS entry '{}' is not a canonical field", value)
            }
            ConfigError::InvalidMaxRows => write!(f, "INTAKE_MAX_ROWS must be a positive integer"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDefaultStatus(_)
            | ConfigError::InvalidRequiredField(_)
            | ConfigError::InvalidMaxRows => None,
        }
    }
}
