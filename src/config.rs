//! Settings loaded from built-in defaults, an optional `sqlforge.toml` and
//! `SQLFORGE_` environment variables, in that order of precedence.
//!
//! Nested keys use a double underscore, e.g. `SQLFORGE_PREFIXES__OWNER=dbo`.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::driver::{ConnectionTarget, SqliteDriver};
use crate::error::{Error, Result};
use crate::prefix::TablePrefixes;
use crate::session::{QueryOptions, Session};

pub const DEFAULT_CONFIG_FILE: &str = "sqlforge.toml";
const ENV_PREFIX: &str = "SQLFORGE";
const MEMORY_TARGET: &str = "memory";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// `memory` or the path of a database file.
    pub database: String,
    pub busy_timeout_ms: u64,
    pub query_timeout_ms: Option<u64>,
    pub log_filter: String,
    #[serde(default)]
    pub prefixes: TablePrefixes,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }
    /// A missing file is not an error; the defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let settings = Config::builder()
            .set_default("database", MEMORY_TARGET)?
            .set_default("busy_timeout_ms", 5000_i64)?
            .set_default("log_filter", "info")?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
    pub fn connection_target(&self) -> Result<ConnectionTarget> {
        let database = self.database.trim();
        if database.is_empty() {
            return Err(Error::Config(String::from("No database has been configured")));
        }
        if database.eq_ignore_ascii_case(MEMORY_TARGET) {
            Ok(ConnectionTarget::Memory)
        } else {
            Ok(ConnectionTarget::File(PathBuf::from(database)))
        }
    }
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
    pub fn driver(&self) -> Result<SqliteDriver> {
        Ok(SqliteDriver::new(self.connection_target()?)?.with_busy_timeout(self.busy_timeout()))
    }
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            timeout: self.query_timeout_ms.map(Duration::from_millis),
        }
    }
    pub fn prefixes(&self) -> &TablePrefixes {
        &self.prefixes
    }
    /// A session over the configured driver with the configured options.
    pub fn session(&self) -> Result<Session> {
        Ok(Session::new(Arc::new(self.driver()?)).with_options(self.query_options()))
    }
}

/// Installs a fmt subscriber filtered by `log_filter`. Returns false when a
/// global subscriber was already installed.
pub fn init_tracing(settings: &Settings) -> bool {
    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok()
}
