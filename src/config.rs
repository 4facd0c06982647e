use anyhow::{Context, Result, bail};
use std::env;

/// Table used when `TABLE_NAME` is unset
pub const DEFAULT_TABLE_NAME: &str = "vendor_fast_store";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Spanner,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannerConfig {
    pub emulator_host: Option<String>,
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl SpannerConfig {
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub store_backend: StoreBackend,
    pub spanner: Option<SpannerConfig>,
    pub service_port: u16,
    pub service_host: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table_name = lookup("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        validate_table_name(&table_name)?;

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("spanner") => StoreBackend::Spanner,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be 'spanner' or 'memory', got '{}'", other),
        };

        let spanner = match store_backend {
            StoreBackend::Spanner => Some(SpannerConfig {
                emulator_host: lookup("SPANNER_EMULATOR_HOST"),
                project: lookup("SPANNER_PROJECT")
                    .context("SPANNER_PROJECT environment variable is required")?,
                instance: lookup("SPANNER_INSTANCE")
                    .context("SPANNER_INSTANCE environment variable is required")?,
                database: lookup("SPANNER_DATABASE")
                    .context("SPANNER_DATABASE environment variable is required")?,
            }),
            StoreBackend::Memory => None,
        };

        let service_port = lookup("SERVICE_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = lookup("SERVICE_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        Ok(Config {
            table_name,
            store_backend,
            spanner,
            service_port,
            service_host,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Table: {}", self.table_name);
        tracing::info!("  Store backend: {:?}", self.store_backend);
        if let Some(spanner) = &self.spanner {
            tracing::info!(
                "  Spanner emulator: {}",
                spanner
                    .emulator_host
                    .as_deref()
                    .unwrap_or("disabled (using production)")
            );
            tracing::info!("  Spanner database: {}", spanner.database_path());
        }
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

/// The table name is interpolated into SQL and DDL, so only plain identifiers are accepted
fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!(
            "TABLE_NAME must start with a letter and contain only letters, digits and '_', got '{}'",
            name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const SPANNER_VARS: [(&str, &str); 3] = [
        ("SPANNER_PROJECT", "test-project"),
        ("SPANNER_INSTANCE", "test-instance"),
        ("SPANNER_DATABASE", "test-database"),
    ];

    #[test]
    fn test_config_with_all_vars() {
        let mut vars = SPANNER_VARS.to_vec();
        vars.extend([
            ("TABLE_NAME", "member_records"),
            ("STORE_BACKEND", "spanner"),
            ("SPANNER_EMULATOR_HOST", "localhost:9010"),
            ("SERVICE_PORT", "8080"),
            ("SERVICE_HOST", "127.0.0.1"),
        ]);

        let config = config_from(&vars).unwrap();

        assert_eq!(config.table_name, "member_records");
        assert_eq!(config.store_backend, StoreBackend::Spanner);
        let spanner = config.spanner.unwrap();
        assert_eq!(spanner.emulator_host, Some("localhost:9010".to_string()));
        assert_eq!(
            spanner.database_path(),
            "projects/test-project/instances/test-instance/databases/test-database"
        );
        assert_eq!(config.service_port, 8080);
        assert_eq!(config.service_host, "127.0.0.1");
    }

    #[test]
    fn test_config_with_defaults() {
        let config = config_from(&SPANNER_VARS).unwrap();

        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config.store_backend, StoreBackend::Spanner);
        assert_eq!(config.spanner.unwrap().emulator_host, None);
        assert_eq!(config.service_port, 3000);
        assert_eq!(config.service_host, "0.0.0.0");
    }

    #[test]
    fn test_memory_backend_needs_no_spanner_vars() {
        let config = config_from(&[("STORE_BACKEND", "memory")]).unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.spanner.is_none());
    }

    #[test]
    fn test_missing_required_var() {
        let result = config_from(&[
            ("SPANNER_PROJECT", "test-project"),
            ("SPANNER_INSTANCE", "test-instance"),
        ]);

        let error = result.unwrap_err();
        assert!(error.to_string().contains("SPANNER_DATABASE"));
    }

    #[test]
    fn test_unknown_backend() {
        let error = config_from(&[("STORE_BACKEND", "dynamo")]).unwrap_err();
        assert!(error.to_string().contains("STORE_BACKEND"));
    }

    #[test]
    fn test_invalid_table_name() {
        for name in ["", "1records", "records; DROP TABLE x", "my-table"] {
            let error = config_from(&[("STORE_BACKEND", "memory"), ("TABLE_NAME", name)]).unwrap_err();
            assert!(error.to_string().contains("TABLE_NAME"), "accepted '{}'", name);
        }
    }

    #[test]
    fn test_invalid_port() {
        let error = config_from(&[("STORE_BACKEND", "memory"), ("SERVICE_PORT", "not-a-number")])
            .unwrap_err();
        assert!(error.to_string().contains("SERVICE_PORT"));
    }

    #[test]
    fn test_port_out_of_range() {
        let result = config_from(&[("STORE_BACKEND", "memory"), ("SERVICE_PORT", "99999")]);
        assert!(result.is_err());
    }
}
