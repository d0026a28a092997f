use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

/// Per-process configuration, loaded once at startup and passed down.
/// No stage mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub broker: BrokerConfig,
    pub lake: LakeConfig,
    pub source: SourceConfig,
    pub session: SessionConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            broker: BrokerConfig::from_env(),
            lake: LakeConfig::from_env(),
            source: SourceConfig::from_env(),
            session: SessionConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  broker:   servers={}, group={}, offset_reset={}",
            self.broker.bootstrap_servers,
            self.broker.group_id,
            self.broker.auto_offset_reset
        );
        tracing::info!(
            "  lake:     host={}:{}, db={}, configured={}",
            self.lake.host,
            self.lake.port,
            self.lake.database,
            self.lake.is_configured()
        );
        tracing::info!("  source:   configured={}", self.source.is_configured());
        tracing::info!(
            "  session:  dir={}, max_age={}h",
            self.session.storage_dir.display(),
            self.session.max_age_hours
        );
    }
}

// ── Message log ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Initial list of brokers (HOST:PORT) the client uses to discover the cluster.
    pub bootstrap_servers: String,
    /// Consumer group; all workers of one pipeline share it.
    pub group_id: String,
    /// Where a fresh consumer starts reading: "earliest" or "latest".
    pub auto_offset_reset: String,
    /// Optional client id, useful in broker-side logs.
    pub client_id: Option<String>,
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self {
            bootstrap_servers: env_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:9092"),
            group_id: env_or("KAFKA_GROUP_ID", "jobrail"),
            auto_offset_reset: env_or("KAFKA_AUTO_OFFSET_RESET", "earliest"),
            client_id: env_opt("KAFKA_CLIENT_ID"),
        }
    }
}

// ── Document store ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LakeConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LakeConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("MONGO_HOST", "localhost"),
            port: env_u16("MONGO_PORT", 27017),
            database: env_or("MONGO_DATABASE", "jobrail"),
            username: env_opt("MONGO_USERNAME"),
            password: env_opt("MONGO_PASSWORD"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }

    /// Connection URI; credentials are percent-escaped per RFC 3986.
    pub fn uri(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!(
                "mongodb://{}:{}@{}:{}/{}?authSource=admin",
                escape(user),
                escape(pass),
                self.host,
                self.port,
                self.database
            ),
            _ => format!("mongodb://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

// ── Authenticated source ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SourceConfig {
    pub fn from_env() -> Self {
        Self {
            username: env_opt("SOURCE_USERNAME"),
            password: env_opt("SOURCE_PASSWORD"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

// ── Session state ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding per-worker session files.
    pub storage_dir: PathBuf,
    /// A session file older than this is treated as stale.
    pub max_age_hours: u64,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            storage_dir: PathBuf::from(env_or("SESSION_STORAGE_DIR", ".sessions")),
            max_age_hours: env_u64("SESSION_MAX_AGE_HOURS", 12),
        }
    }
}
