//! Application configuration.
//!
//! Everything is read from the process environment once at startup and then
//! handed to the components that need it. Missing database settings do not
//! stop the service; they are reported and every later connection attempt fails.

use std::path::PathBuf;
use std::time::Duration;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 5000;
/// Default connection-establishment timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 240;
/// Default origin allowed to call `/transactions`.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://skyalcu.com";
/// Default static file directory.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the service, used in logs and informational responses.
    pub service_name: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// SQL Server connection settings.
    pub database: DatabaseSettings,
    /// Cross-origin policy for the transactions endpoint.
    pub cors: CorsSettings,
    /// Directory holding `favicon.ico` and other static assets.
    pub static_dir: PathBuf,
}

/// SQL Server connection settings.
#[derive(Clone, Default)]
pub struct DatabaseSettings {
    /// `SERVER`: `host`, `host,port`, `tcp:host,port` or `host\instance`.
    pub server: Option<String>,
    /// `DATABASE`
    pub database: Option<String>,
    /// `SQLUSERNAME`
    pub username: Option<String>,
    /// `PASSWORD`
    pub password: Option<String>,
    /// Accept the server certificate without validation.
    pub trust_server_certificate: bool,
    /// Upper bound on TCP connect plus login handshake.
    pub connect_timeout: Duration,
}

// Hand-written so the password never reaches the logs.
impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// 配置值是否视为未设置；密码可以包含空白，只有空字符串算缺失
fn is_blank(key: &str, value: &str) -> bool {
    if key == "PASSWORD" {
        value.is_empty()
    } else {
        value.trim().is_empty()
    }
}

impl DatabaseSettings {
    /// Returns the environment variable names of required settings that are unset or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("SERVER", &self.server),
            ("DATABASE", &self.database),
            ("SQLUSERNAME", &self.username),
            ("PASSWORD", &self.password),
        ]
        .into_iter()
        .filter(|(name, value)| value.as_deref().map_or(true, |v| is_blank(name, v)))
        .map(|(name, _)| name)
        .collect()
    }

    /// Whether all required settings are present.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Cross-origin allow-list.
#[derive(Debug, Clone)]
pub struct CorsSettings {
    /// Allowed origins. A single `*` entry allows any origin.
    pub allowed_origins: Vec<String>,
}

impl CorsSettings {
    /// Whether the list contains the wildcard.
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment for the named service.
    ///
    /// Missing database settings are logged as a configuration error; the
    /// returned config is still usable for starting the HTTP server.
    pub fn load_with_service(service_name: &str) -> Self {
        let config = Self::from_lookup(service_name, |key| std::env::var(key).ok());

        let missing = config.database.missing();
        if !missing.is_empty() {
            tracing::error!(
                missing = ?missing,
                "Configuration error: database settings are incomplete, connections will fail"
            );
        }

        config
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !is_blank(key, v));

        let database = DatabaseSettings {
            server: non_empty("SERVER"),
            database: non_empty("DATABASE"),
            username: non_empty("SQLUSERNAME"),
            password: non_empty("PASSWORD"),
            trust_server_certificate: non_empty("DB_TRUST_SERVER_CERTIFICATE")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            connect_timeout: Duration::from_secs(
                non_empty("DB_CONNECT_TIMEOUT_SECS")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        };

        let cors = non_empty("CORS_ALLOWED_ORIGINS")
            .map(|v| CorsSettings {
                allowed_origins: v
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect(),
            })
            .unwrap_or_default();

        Self {
            service_name: service_name.to_string(),
            host: non_empty("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: non_empty("SERVER_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            database,
            cors,
            static_dir: non_empty("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        }
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
