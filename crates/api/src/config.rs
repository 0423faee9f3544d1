use keyflow_access::GatewayConfig;
use keyflow_database::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            database: DatabaseConfig::from_env(),
            gateway: GatewayConfig::from_env()
                .expect("ACCESS_CONTROL_SERVER_URL, _USERNAME and _PASSWORD must be set"),
        }
    }
}
