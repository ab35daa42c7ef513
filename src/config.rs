use serde::{Deserialize, Serialize};
use std::env;

use crate::entities::OrderStatus;
use crate::error::{AppError, AppResult};

/// Database URL that selects the in-process store instead of Postgres.
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Longest dwell accepted for any status (one week).
pub const MAX_DWELL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url.starts_with(MEMORY_DATABASE_URL)
    }
}

/// Timing of the automatic order lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    pub tick_interval_secs: u64,
    /// Minimum drift (percentage points) before live progress is written back.
    pub progress_persist_threshold: i32,
    pub dwell: DwellDurations,
    pub successors: SuccessorTable,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            progress_persist_threshold: 5,
            dwell: DwellDurations::default(),
            successors: SuccessorTable::default(),
        }
    }
}

/// Seconds an order rests in each non-terminal status. Zero means "advance at once".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DwellDurations {
    pub pending_secs: u64,
    pub preparing_secs: u64,
    pub ready_for_pickup_secs: u64,
    pub out_for_delivery_secs: u64,
}

impl Default for DwellDurations {
    fn default() -> Self {
        Self {
            pending_secs: 300,
            preparing_secs: 600,
            ready_for_pickup_secs: 0,
            out_for_delivery_secs: 1800,
        }
    }
}

impl DwellDurations {
    pub fn for_status(&self, status: OrderStatus) -> u64 {
        match status {
            OrderStatus::Pending => self.pending_secs,
            OrderStatus::Preparing => self.preparing_secs,
            OrderStatus::ReadyForPickup => self.ready_for_pickup_secs,
            OrderStatus::OutForDelivery => self.out_for_delivery_secs,
            OrderStatus::Delivered | OrderStatus::Cancelled => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuccessorTable {
    pub pending: Option<OrderStatus>,
    pub preparing: Option<OrderStatus>,
    pub ready_for_pickup: Option<OrderStatus>,
    pub out_for_delivery: Option<OrderStatus>,
}

impl Default for SuccessorTable {
    fn default() -> Self {
        Self {
            pending: Some(OrderStatus::Preparing),
            preparing: Some(OrderStatus::ReadyForPickup),
            ready_for_pickup: Some(OrderStatus::OutForDelivery),
            out_for_delivery: Some(OrderStatus::Delivered),
        }
    }
}

impl SuccessorTable {
    pub fn successor(&self, status: OrderStatus) -> Option<OrderStatus> {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Preparing => self.preparing,
            OrderStatus::ReadyForPickup => self.ready_for_pickup,
            OrderStatus::OutForDelivery => self.out_for_delivery,
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ReportingConfig {
    /// Offset of the restaurant's local day boundaries from UTC.
    pub utc_offset_minutes: i32,
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::from_toml_str(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No config file at {config_path}, using environment variables");
                Self::from_env()?
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "cannot read config file {config_path}: {e}"
                )));
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        toml::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("invalid config file: {e}")))
    }

    fn from_env() -> AppResult<Self> {
        let database_url = get_env("DATABASE_URL").ok_or_else(|| {
            AppError::ConfigError(
                "DATABASE_URL is not set and no config.toml was found".to_string(),
            )
        })?;

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
                allowed_origins: Vec::new(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            lifecycle: LifecycleConfig::default(),
            reporting: ReportingConfig::default(),
        })
    }

    /// Environment variables win over file values.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get_env("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Some(v) = get_env("ALLOWED_ORIGINS") {
            self.server.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get_env("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Some(v) = get_env("ORDER_TICK_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            self.lifecycle.tick_interval_secs = n;
        }
        if let Some(v) = get_env("ORDER_PROGRESS_PERSIST_THRESHOLD")
            && let Ok(n) = v.parse()
        {
            self.lifecycle.progress_persist_threshold = n;
        }
        let dwell = &mut self.lifecycle.dwell;
        for (name, slot) in [
            ("DWELL_PENDING_SECS", &mut dwell.pending_secs),
            ("DWELL_PREPARING_SECS", &mut dwell.preparing_secs),
            ("DWELL_READY_FOR_PICKUP_SECS", &mut dwell.ready_for_pickup_secs),
            ("DWELL_OUT_FOR_DELIVERY_SECS", &mut dwell.out_for_delivery_secs),
        ] {
            if let Some(v) = get_env(name)
                && let Ok(n) = v.parse()
            {
                *slot = n;
            }
        }
        if let Some(v) = get_env("REPORTING_UTC_OFFSET_MINUTES")
            && let Ok(n) = v.parse()
        {
            self.reporting.utc_offset_minutes = n;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.lifecycle.tick_interval_secs == 0 {
            return Err(AppError::ConfigError(
                "lifecycle.tick_interval_secs must be greater than zero".to_string(),
            ));
        }
        for status in [
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::ReadyForPickup,
            OrderStatus::OutForDelivery,
        ] {
            if self.lifecycle.dwell.for_status(status) > MAX_DWELL_SECS {
                return Err(AppError::ConfigError(format!(
                    "lifecycle dwell for {status} exceeds {MAX_DWELL_SECS} seconds"
                )));
            }
        }
        if !(0..=100).contains(&self.lifecycle.progress_persist_threshold) {
            return Err(AppError::ConfigError(
                "lifecycle.progress_persist_threshold must be within 0..=100".to_string(),
            ));
        }
        if self.reporting.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(AppError::ConfigError(
                "reporting.utc_offset_minutes must be less than a day".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
