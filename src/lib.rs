//! Ventwatch core library
//!
//! Ventilation target prediction for mechanically ventilated patients:
//! interval charting, feature derivation, and next-interval range alerts.

pub mod api;
pub mod core;
pub mod db;
pub mod error;
pub mod models;
pub mod service;
pub mod telemetry;

pub use service::VentilationService;

/// Application configuration
pub mod config {
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    pub struct Config {
        pub server: ServerConfig,
        pub database: DatabaseConfig,
        pub model: ModelConfig,
        pub logging: LoggingConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct DatabaseConfig {
        pub url: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ModelConfig {
        /// JSON classifier definition.
        pub model_path: String,
        /// JSON array of trained feature names, in training column order.
        pub feature_names_path: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LoggingConfig {
        /// Default filter when `RUST_LOG` is unset.
        pub level: String,
        pub json: bool,
    }

    /// Load configuration from file
    pub fn load_config() -> Result<Config, ::config::ConfigError> {
        let env = std::env::var("VENTWATCH_ENV").unwrap_or_else(|_| "development".into());

        ::config::Config::builder()
            // Start with default settings
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://ventwatch.db")?
            .set_default("model.model_path", "model/ventilation_model.json")?
            .set_default("model.feature_names_path", "model/feature_names.json")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(::config::File::with_name("config/default").required(false))
            // Override with environment-specific settings
            .add_source(::config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables, e.g. VENTWATCH__DATABASE__URL
            .add_source(::config::Environment::with_prefix("VENTWATCH").separator("__"))
            .build()?
            .try_deserialize()
    }
}
