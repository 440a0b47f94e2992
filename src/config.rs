use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and as whom to connect.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the server, e.g. `https://odoo.example.com`.
    pub hostname: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Config {
    pub fn new(hostname: &str, database: &str, username: &str, password: &str) -> Config {
        Config {
            hostname: hostname.to_string(),
            database: database.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Config {
        self.timeout = timeout;
        self
    }

    /// URL of one of the `/xmlrpc/2` services (`common` or `object`).
    pub fn endpoint(&self, service: &str) -> String {
        format!("{}/xmlrpc/2/{}", self.hostname.trim_end_matches('/'), service)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("hostname", &self.hostname)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
