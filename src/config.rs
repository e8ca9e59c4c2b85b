//! Configuration (§6): the four opaque settings the core exposes as typed fields.
//! Values are opaque to the core — dialect selection, the oracle's module loading, and
//! the RPC listener itself all live in the surrounding service, which reads these fields
//! back out of the loaded `Config`. Loaded in layers: a base file, an optional
//! `RUN_MODE`-named overlay, then environment variables, in that precedence order.

use config_crate::{Config as RawConfig, ConfigError, Environment, File};
use serde_derive::Deserialize;
use std::env;

/// `DB_SERVER_TYPE`: selects the dialect the surrounding service wires up for the `Store`
/// this core is given. The core itself never branches on dialect.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DbServerType {
    Sqlite,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db_server_type: DbServerType,
    pub db_server_addr: String,
    pub opa_module_file: Option<String>,
    pub service_port: u16,
}

impl Config {
    /// Loads a base file, an optional `RUN_MODE`-named overlay, then environment
    /// variables with the service's prefix taking final precedence.
    pub fn new() -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();
        s.merge(File::with_name("config/base"))?;

        // Note that this file is _optional_
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        s.merge(File::with_name(&format!("config/{}", env)).required(false))?;

        s.merge(Environment::with_prefix("RIGHTSERVER"))?;

        s.try_into()
    }
}
