use std::env;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub permissions: PermissionConfig,
    pub listing: ListingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Skip the permission manager entirely and allow every action.
    pub ignore_permission_check: bool,
    pub service_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    pub default_per_page: i64,
    pub max_per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };
        Self::preset(environment).with_env_overrides()
    }

    /// Loads a YAML file layered over the preset its `environment` names,
    /// then applies environment variable overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match env::var("METASTORE_CONFIG") {
                Ok(p) if !p.is_empty() => p.into(),
                _ => return Ok(Self::from_env()),
            },
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let overlay: Value = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        let environment = overlay
            .get("environment")
            .cloned()
            .map(serde_json::from_value::<Environment>)
            .transpose()
            .context("invalid environment in config file")?
            .unwrap_or(Environment::Development);

        let mut merged = serde_json::to_value(Self::preset(environment))?;
        deep_merge(&mut merged, overlay);
        let config: AppConfig = serde_json::from_value(merged)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("API_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse().ok())
        {
            self.server.port = port;
        }

        // Store overrides
        if let Ok(v) = env::var("METASTORE_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.store.backend = StoreBackend::Memory,
                "postgres" | "postgresql" => self.store.backend = StoreBackend::Postgres,
                other => tracing::warn!("Ignoring unknown METASTORE_BACKEND {:?}", other),
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }

        // Permission overrides
        if let Ok(v) = env::var("API_IGNORE_PERMISSION_CHECK") {
            self.permissions.ignore_permission_check =
                parse_flag(&v).unwrap_or(self.permissions.ignore_permission_check);
        }
        if let Ok(v) = env::var("PERMISSION_MANAGER_URL") {
            self.permissions.service_url = Some(v);
        }

        // Listing overrides
        if let Ok(v) = env::var("LISTING_DEFAULT_PER_PAGE") {
            self.listing.default_per_page = v.parse().unwrap_or(self.listing.default_per_page);
        }
        if let Ok(v) = env::var("LISTING_MAX_PER_PAGE") {
            self.listing.max_per_page = v.parse().ok();
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = parse_flag(&v).unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 8080 },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 5,
            },
            permissions: PermissionConfig {
                ignore_permission_check: true,
                service_url: None,
            },
            listing: ListingConfig { default_per_page: 50, max_per_page: Some(1000) },
            security: SecurityConfig { enable_cors: true, cors_origins: vec![] },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 8080 },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 20,
            },
            permissions: PermissionConfig {
                ignore_permission_check: false,
                service_url: Some("http://permission-manager:8080".to_string()),
            },
            listing: ListingConfig { default_per_page: 50, max_per_page: Some(500) },
            security: SecurityConfig { enable_cors: true, cors_origins: vec![] },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 8080 },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 50,
            },
            permissions: PermissionConfig {
                ignore_permission_check: false,
                service_url: Some("http://permission-manager:8080".to_string()),
            },
            listing: ListingConfig { default_per_page: 50, max_per_page: Some(200) },
            security: SecurityConfig { enable_cors: true, cors_origins: vec![] },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Accepts the usual spellings of a boolean switch.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (k, v) in overlay {
                match base.get_mut(&k) {
                    Some(slot) => deep_merge(slot, v),
                    None => {
                        base.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}
