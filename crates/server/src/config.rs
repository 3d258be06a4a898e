use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub prefect_api_url: String,
    pub prefect_api_key: Option<String>,
    pub internal_service_key: String,
    pub s3_host_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidVar("PORT", raw))?,
            Err(_) => 3001,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/tasks.db".to_string()),
            prefect_api_url: std::env::var("PREFECT_API_URL")
                .map_err(|_| ConfigError::MissingVar("PREFECT_API_URL"))?,
            prefect_api_key: std::env::var("PREFECT_API_KEY").ok(),
            internal_service_key: std::env::var("INTERNAL_SERVICE_KEY")
                .map_err(|_| ConfigError::MissingVar("INTERNAL_SERVICE_KEY"))?,
            s3_host_url: std::env::var("S3_HOST_URL").ok(),
        })
    }
}
