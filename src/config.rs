//! Warehouse connection settings, loaded from the environment.
//!
//! Values usually come from a local `.env.local` (or `.env`) file loaded by
//! [`load_env_files`] before [`WarehouseConfig::from_env`] runs.

use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment files tried in order; the first one found is loaded.
pub const ENV_FILES: [&str; 2] = [".env.local", ".env"];

const DEFAULT_DATABASE: &str = "FNF";
const DEFAULT_SCHEMA: &str = "SAP_FNF";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 900;

/// Loads the first of [`ENV_FILES`] present in `dir` into the process
/// environment and returns its path.
///
/// Variables that are already set are left untouched.
pub fn load_env_files(dir: &Path) -> Option<PathBuf> {
    ENV_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .and_then(|path| dotenvy::from_path(&path).ok().map(|_| path))
}

/// Snowflake connection parameters.
#[derive(Clone)]
pub struct WarehouseConfig {
    pub account: String,
    pub user: String,
    pub password: String,
    pub warehouse: Option<String>,
    pub database: String,
    pub schema: String,
    pub role: Option<String>,
    /// Overrides `<account>.snowflakecomputing.com`. May carry a scheme.
    pub host: Option<String>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// How long to keep polling a statement that is still running.
    pub query_timeout: Duration,
}

impl WarehouseConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                        | Default   |
    /// |--------------------------------|-----------|
    /// | `SNOWFLAKE_ACCOUNT`            | required  |
    /// | `SNOWFLAKE_USERNAME`           | required  |
    /// | `SNOWFLAKE_PASSWORD`           | required  |
    /// | `SNOWFLAKE_WAREHOUSE`          | unset     |
    /// | `SNOWFLAKE_DATABASE`           | `FNF`     |
    /// | `SNOWFLAKE_SCHEMA`             | `SAP_FNF` |
    /// | `SNOWFLAKE_ROLE`               | unset     |
    /// | `SNOWFLAKE_HOST`               | derived   |
    /// | `SNOWFLAKE_TIMEOUT_SECS`       | `60`      |
    /// | `SNOWFLAKE_QUERY_TIMEOUT_SECS` | `900`     |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty
    /// values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));
        let secs = |key: &str, default: u64| -> Result<Duration> {
            let secs = match get(key) {
                Some(v) => v
                    .parse()
                    .with_context(|| format!("{key} must be a whole number of seconds"))?,
                None => default,
            };
            Ok(Duration::from_secs(secs))
        };

        Ok(Self {
            account: required("SNOWFLAKE_ACCOUNT")?,
            user: required("SNOWFLAKE_USERNAME")?,
            password: required("SNOWFLAKE_PASSWORD")?,
            warehouse: get("SNOWFLAKE_WAREHOUSE"),
            database: get("SNOWFLAKE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.into()),
            schema: get("SNOWFLAKE_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.into()),
            role: get("SNOWFLAKE_ROLE"),
            host: get("SNOWFLAKE_HOST"),
            request_timeout: secs("SNOWFLAKE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            query_timeout: secs("SNOWFLAKE_QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT_SECS)?,
        })
    }

    /// Account name sent at login: the identifier before any region or
    /// cloud suffix (`xy12345.ap-northeast-2.aws` becomes `xy12345`).
    pub fn account_name(&self) -> &str {
        self.account.split('.').next().unwrap_or(&self.account)
    }

    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) if host.contains("://") => host.trim_end_matches('/').to_string(),
            Some(host) => format!("https://{}", host.trim_end_matches('/')),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("host", &self.host)
            .field("request_timeout", &self.request_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}
