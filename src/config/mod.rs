//! Configuration Management
//!
//! This module handles loading and saving named database connections.
//!
//! # Configuration Locations
//! - Local: `.dbwrap/config.json` (team-shareable, per-project)
//! - Global: `~/.config/dbwrap/connections.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit connection parameters (`--dsn`, highest priority)
//! 2. Local config file (`.dbwrap/config.json`)
//! 3. Global config file (`~/.config/dbwrap/connections.json`)
//!
//! Both files share one format:
//! ```json
//! {
//!   "connections": {
//!     "local": { "engine": "sqlite", "file": "app.db" },
//!     "prod": { "engine": "mysql", "host": "db", "user": "app", "password_env": "PROD_PW" }
//!   },
//!   "default": "local"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::ConnectionConfig;
use crate::error::{DbError, Result};

/// Named connections stored in one config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRegistry {
    #[serde(default)]
    pub connections: BTreeMap<String, StoredConnection>,

    /// Name of the default connection (must exist in connections map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ConnectionRegistry {
    /// Add or replace a connection; the first one added becomes the default
    pub fn insert(&mut self, name: impl Into<String>, connection: StoredConnection) {
        let name = name.into();
        if self.connections.is_empty() {
            self.default = Some(name.clone());
        }
        self.connections.insert(name, connection);
    }

    /// Overlay `local` on top of `self`: same-named entries and the default
    /// pointer are taken from `local`
    #[must_use]
    pub fn merge(mut self, local: Self) -> Self {
        self.connections.extend(local.connections);
        if local.default.is_some() {
            self.default = local.default;
        }
        self
    }

    /// Look up `name`, or the default connection when `name` is `None`
    pub fn get(&self, name: Option<&str>) -> Result<&StoredConnection> {
        let available = || self.connections.keys().cloned().collect::<Vec<_>>().join(", ");

        let conn_name = match name {
            Some(n) => n,
            None => self.default.as_deref().ok_or_else(|| {
                DbError::config_error(format!(
                    "No default connection set. Available connections: [{}]. \
                     Specify one with --name or set a default in the config.",
                    available()
                ))
            })?,
        };

        self.connections.get(conn_name).ok_or_else(|| {
            DbError::config_error(format!(
                "Connection '{conn_name}' not found. Available connections: [{}]",
                available()
            ))
        })
    }
}

/// Stored connection configuration
///
/// Same as [`ConnectionConfig`] but may name an environment variable that
/// holds the password instead of the password itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConnection {
    #[serde(flatten)]
    pub config: ConnectionConfig,

    /// Environment variable name for password (if not storing password directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl StoredConnection {
    #[must_use]
    pub const fn new(config: ConnectionConfig) -> Self {
        Self { config, password_env: None }
    }

    /// Read the password from `var` at resolve time; any literal password is dropped
    #[must_use]
    pub fn with_password_env(mut self, var: impl Into<String>) -> Self {
        self.config.password = None;
        self.password_env = Some(var.into());
        self
    }

    /// Resolve environment variables and return a usable `ConnectionConfig`
    pub fn resolve(&self) -> Result<ConnectionConfig> {
        let mut config = self.config.clone();

        if let Some(env_var) = &self.password_env {
            let password = std::env::var(env_var).map_err(|_| {
                DbError::config_error(format!(
                    "Environment variable {env_var} not found for password"
                ))
            })?;
            config.password = Some(password);
        }

        Ok(config)
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.dbwrap/config.json` (team-shareable)
    Local,
    /// Global config: `~/.config/dbwrap/connections.json` (per-user)
    Global,
}

impl ConfigLocation {
    pub fn path(self) -> Result<PathBuf> {
        match self {
            Self::Local => local_config_path(),
            Self::Global => global_config_path(),
        }
    }
}

/// Get path to local config file (`.dbwrap/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        DbError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".dbwrap").join("config.json"))
}

/// Get path to global config file (`~/.config/dbwrap/connections.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| DbError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("dbwrap").join("connections.json"))
}

/// Load a connection registry; a missing file is an empty registry
pub fn load_registry(path: &Path) -> Result<ConnectionRegistry> {
    if !path.exists() {
        return Ok(ConnectionRegistry::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| DbError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents).map_err(|e| {
        DbError::config_error(format!("Invalid config file format in {}: {e}", path.display()))
    })
}

/// Save a connection registry, creating parent directories as needed
pub fn save_registry(path: &Path, registry: &ConnectionRegistry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DbError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(registry)
        .map_err(|e| DbError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| DbError::config_error(format!("Could not write config file: {e}")))?;

    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Merge the files at `global` and `local`, local taking precedence
pub fn load_merged(local: &Path, global: &Path) -> Result<ConnectionRegistry> {
    let global_registry = load_registry(global)?;
    let local_registry = load_registry(local)?;
    Ok(global_registry.merge(local_registry))
}

/// Load the merged view of the local and global config files
pub fn load_with_precedence() -> Result<ConnectionRegistry> {
    load_merged(&local_config_path()?, &global_config_path()?)
}

/// Resolve a connection by name (or the default) from the merged view
pub fn resolve_connection(name: Option<&str>) -> Result<ConnectionConfig> {
    load_with_precedence()?.get(name)?.resolve()
}

/// Save a connection to `path`; the first connection in a file becomes its default
pub fn save_connection_to(path: &Path, name: &str, connection: StoredConnection) -> Result<()> {
    let mut registry = load_registry(path)?;
    registry.insert(name, connection);
    save_registry(path, &registry)
}

/// Save a connection to the local or global config file
///
/// Returns the path written.
pub fn save_connection(
    name: &str,
    connection: StoredConnection,
    location: ConfigLocation,
) -> Result<PathBuf> {
    let path = location.path()?;
    save_connection_to(&path, name, connection)?;
    Ok(path)
}

/// List all resolvable connections from the merged view
///
/// Connections whose password variable is unset are skipped with a warning.
pub fn list_connections() -> Result<Vec<(String, ConnectionConfig)>> {
    Ok(resolve_all(&load_with_precedence()?))
}

fn resolve_all(registry: &ConnectionRegistry) -> Vec<(String, ConnectionConfig)> {
    let mut connections = Vec::new();
    for (conn_name, stored) in &registry.connections {
        match stored.resolve() {
            Ok(config) => connections.push((conn_name.clone(), config)),
            // Error details are not logged; they may name credentials
            Err(_) => tracing::warn!(connection = %conn_name, "could not resolve connection"),
        }
    }
    connections
}
