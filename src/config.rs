use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_JWT_EXPIRES_IN: &str = "60m";
const DEFAULT_LOG_DIR: &str = "./logs";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: PathBuf,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: Option<String>,
    pub jwt_expires_in: String,
    pub bcrypt_cost: u32,
    pub curriculum_seed_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let enable_file_logs = env_string("ENABLE_FILE_LOGS")
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        let log_dir = env_string("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        let database_url = env_string("DATABASE_URL").unwrap_or_else(crate::db::default_database_url);
        let database_max_connections = env_string("DATABASE_MAX_CONNECTIONS")
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let bcrypt_cost = env_string("BCRYPT_COST")
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|cost| (4..=31).contains(cost))
            .unwrap_or(bcrypt::DEFAULT_COST);

        Self {
            host,
            port,
            log_level,
            enable_file_logs,
            log_dir,
            database_url,
            database_max_connections,
            jwt_secret: env_string("JWT_SECRET"),
            jwt_expires_in: env_string("JWT_EXPIRES_IN")
                .unwrap_or_else(|| DEFAULT_JWT_EXPIRES_IN.to_string()),
            bcrypt_cost,
            curriculum_seed_path: env_string("CURRICULUM_SEED_PATH").map(PathBuf::from),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        let config = Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8123,
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            jwt_secret: None,
            jwt_expires_in: DEFAULT_JWT_EXPIRES_IN.to_string(),
            bcrypt_cost: 4,
            curriculum_seed_path: None,
        };
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8123");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }
}
