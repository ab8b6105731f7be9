use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum plausible length for a start.gg API token.
pub const MIN_TOKEN_LEN: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "arenahub", about = "Esports community hub server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub startgg: StartggConfig,
    pub rate_limits: RateLimitsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub cors_origins: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_days: i64,
    pub secure_cookie: bool,
    pub bcrypt_cost: u32,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StartggConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub max: u32,
    pub window_secs: u64,
}

impl WindowLimit {
    pub const fn new(max: u32, window_secs: u64) -> Self {
        Self { max, window_secs }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RateLimitsConfig {
    pub threads: WindowLimit,
    pub posts: WindowLimit,
    pub votes: WindowLimit,
    pub auth: WindowLimit,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            body_limit_bytes: 1024 * 1024,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
            ],
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            session_days: 14,
            secure_cookie: false,
            bcrypt_cost: 11,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

impl Default for StartggConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.start.gg/gql/alpha".to_string(),
            token: None,
            cache_ttl_secs: 60,
            cache_max_entries: 512,
        }
    }
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            threads: WindowLimit::new(10, 15 * 60),
            posts: WindowLimit::new(20, 60),
            votes: WindowLimit::new(30, 60),
            auth: WindowLimit::new(5, 15 * 60),
        }
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_days)
    }
}

impl StartggConfig {
    /// Trimmed token, if one is configured at all.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("arenahub.db"));
        }

        Ok(config)
    }

    /// Environment values win over the config file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("STARTGG_TOKEN") {
            self.startgg.token = Some(token);
        }
        if let Some(email) = var("BOOTSTRAP_ADMIN_EMAIL") {
            self.auth.bootstrap_admin_email = Some(email);
        }
        if let Some(pass) = var("BOOTSTRAP_ADMIN_PASS") {
            self.auth.bootstrap_admin_password = Some(pass);
        }
    }

    /// Refuse to start without a usable upstream credential.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.startgg.token() {
            Some(token) if token.len() >= MIN_TOKEN_LEN => Ok(()),
            _ => anyhow::bail!(
                "STARTGG_TOKEN missing or shorter than {} characters",
                MIN_TOKEN_LEN
            ),
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".arenahub")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("arenahub.db"))
    }
}
