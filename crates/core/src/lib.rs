pub mod config;

pub use config::{load_dotenv, BrokerConfig, Config, LakeConfig, SessionConfig, SourceConfig};
