use anyhow::{bail, Result};
use cohort_core::AppConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;

/// The generated file carries the JWT secret; keep it owner-only.
fn harden_secret_file_permissions(path: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_expiry_seconds: default_jwt_expiry(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub min_send_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub event_bus_capacity: usize,
    pub max_connections: usize,
    pub max_connections_per_user: usize,
    pub history_default_limit: i64,
    pub history_max_limit: i64,
    pub join_history_limit: i64,
    pub max_message_length: usize,
    pub max_attachments: usize,
    pub throttle_prune_interval_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        let core = AppConfig::default();
        Self {
            min_send_interval_ms: core.min_send_interval_ms,
            heartbeat_interval_ms: core.heartbeat_interval_ms,
            heartbeat_timeout_ms: core.heartbeat_timeout_ms,
            event_bus_capacity: core.event_bus_capacity,
            max_connections: core.max_connections,
            max_connections_per_user: core.max_connections_per_user,
            history_default_limit: core.history_default_limit,
            history_max_limit: core.history_max_limit,
            join_history_limit: core.join_history_limit,
            max_message_length: core.max_message_length,
            max_attachments: core.max_attachments,
            throttle_prune_interval_secs: core.throttle_prune_interval_secs,
        }
    }
}

fn generate_random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..16u8);
            char::from(if idx < 10 {
                b'0' + idx
            } else {
                b'a' + idx - 10
            })
        })
        .collect()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".into()
}
fn default_database_url() -> String {
    "sqlite://./data/cohort.db?mode=rwc".into()
}
fn default_max_connections() -> u32 {
    20
}
fn default_jwt_secret() -> String {
    generate_random_hex(64)
}
fn default_jwt_expiry() -> u64 {
    7 * 24 * 3600
}

impl Config {
    /// Read the config file, generating one from defaults if it does not
    /// exist, then apply `COHORT_*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!("Config file not found at '{}', generating defaults...", path);
            let config = Config::default();
            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml::to_string_pretty(&config)?)?;
            if let Err(e) = harden_secret_file_permissions(path) {
                tracing::warn!("Could not restrict permissions on '{}': {}", path, e);
            }
            tracing::info!("Generated default config at '{}'", path);
            config
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
            target: &mut T,
        ) {
            if let Some(value) = lookup(name) {
                match value.trim().parse::<T>() {
                    Ok(parsed) => *target = parsed,
                    Err(_) => tracing::warn!("Ignoring invalid {} value '{}'", name, value),
                }
            }
        }

        if let Some(value) = lookup("COHORT_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = lookup("COHORT_DATABASE_URL") {
            self.database.url = value;
        }
        parsed(&lookup, "COHORT_DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections);
        if let Some(value) = lookup("COHORT_JWT_SECRET") {
            self.auth.jwt_secret = value;
        }
        parsed(&lookup, "COHORT_JWT_EXPIRY_SECONDS", &mut self.auth.jwt_expiry_seconds);

        let rt = &mut self.realtime;
        parsed(&lookup, "COHORT_MIN_SEND_INTERVAL_MS", &mut rt.min_send_interval_ms);
        parsed(&lookup, "COHORT_HEARTBEAT_INTERVAL_MS", &mut rt.heartbeat_interval_ms);
        parsed(&lookup, "COHORT_HEARTBEAT_TIMEOUT_MS", &mut rt.heartbeat_timeout_ms);
        parsed(&lookup, "COHORT_EVENT_BUS_CAPACITY", &mut rt.event_bus_capacity);
        parsed(&lookup, "COHORT_WS_MAX_CONNECTIONS", &mut rt.max_connections);
        parsed(&lookup, "COHORT_WS_MAX_CONNECTIONS_PER_USER", &mut rt.max_connections_per_user);
        parsed(&lookup, "COHORT_HISTORY_DEFAULT_LIMIT", &mut rt.history_default_limit);
        parsed(&lookup, "COHORT_HISTORY_MAX_LIMIT", &mut rt.history_max_limit);
        parsed(&lookup, "COHORT_JOIN_HISTORY_LIMIT", &mut rt.join_history_limit);
        parsed(&lookup, "COHORT_MAX_MESSAGE_LENGTH", &mut rt.max_message_length);
        parsed(&lookup, "COHORT_MAX_ATTACHMENTS", &mut rt.max_attachments);
        parsed(&lookup, "COHORT_THROTTLE_PRUNE_INTERVAL_SECS", &mut rt.throttle_prune_interval_secs);
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().len() < 32 {
            bail!("auth.jwt_secret must be at least 32 characters");
        }
        if self.realtime.heartbeat_timeout_ms <= self.realtime.heartbeat_interval_ms {
            bail!("realtime.heartbeat_timeout_ms must exceed realtime.heartbeat_interval_ms");
        }
        if self.realtime.history_max_limit < 1 {
            bail!("realtime.history_max_limit must be at least 1");
        }
        Ok(())
    }

    pub fn app_config(&self) -> AppConfig {
        let rt = &self.realtime;
        AppConfig {
            jwt_secret: self.auth.jwt_secret.clone(),
            jwt_expiry_seconds: self.auth.jwt_expiry_seconds,
            min_send_interval_ms: rt.min_send_interval_ms,
            heartbeat_interval_ms: rt.heartbeat_interval_ms,
            heartbeat_timeout_ms: rt.heartbeat_timeout_ms,
            event_bus_capacity: rt.event_bus_capacity,
            max_connections: rt.max_connections,
            max_connections_per_user: rt.max_connections_per_user,
            history_default_limit: rt.history_default_limit,
            history_max_limit: rt.history_max_limit,
            join_history_limit: rt.join_history_limit,
            max_message_length: rt.max_message_length,
            max_attachments: rt.max_attachments,
            throttle_prune_interval_secs: rt.throttle_prune_interval_secs,
        }
    }
}
