use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "newsdesk", about = "Content and client management service")]
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

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Run one backup and exit; meant for cron or a job runner
    Backup {
        /// Dump schema only, no row data
        #[arg(long)]
        structure: bool,
        /// Apply the retention policy after the run
        #[arg(long)]
        cleanup: bool,
    },
    /// Change a user's role (admin, employee, client, user)
    SetRole { username: String, role: String },
    /// Attach a client profile to an existing user
    MakeClient { username: String, company: String },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub backup: BackupConfig,
    pub mail: MailConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    /// Name used in backup filenames
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub remember_cookie_name: String,
    pub session_hours: u64,
    pub remember_days: i64,
    pub csrf_ttl_minutes: i64,
    /// Session keys consulted when validating a CSRF token. The first entry is
    /// the canonical key the server issues; the rest are legacy locations.
    pub csrf_session_keys: Vec<String>,
    pub bcrypt_cost: u32,
}

/// Static backup defaults. Rows in `site_settings` may override these at run time.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BackupConfig {
    pub directory: Option<PathBuf>,
    pub compression_level: u32,
    pub max_backups: usize,
    pub retention_days: u32,
    pub tables: Vec<String>,
    pub create_checksum: bool,
    pub notification_email: Option<String>,
    pub notify_on_success: bool,
    pub notify_on_failure: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub admin_email: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: "newsdesk".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "newsdesk_session".to_string(),
            remember_cookie_name: "newsdesk_remember".to_string(),
            session_hours: 24,
            remember_days: 30,
            csrf_ttl_minutes: 120,
            csrf_session_keys: vec![
                "csrf_token".to_string(),
                "_token".to_string(),
                "form_token".to_string(),
            ],
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: None,
            compression_level: 6,
            max_backups: 30,
            retention_days: 0,
            tables: Vec::new(),
            create_checksum: false,
            notification_email: None,
            notify_on_success: false,
            notify_on_failure: true,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "newsdesk@localhost".to_string(),
            admin_email: None,
        }
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

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("newsdesk.db"));
        }
        if config.backup.directory.is_none() {
            config.backup.directory = Some(data_dir.join("backups"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".newsdesk")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("newsdesk.db"))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("backups"))
    }
}
