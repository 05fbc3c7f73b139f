use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use gauntlet_bot::emoji::EmojiTable;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{0} is still a placeholder")]
    Placeholder(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub bridge_token: String,
    pub bot_user_id: String,
    pub store_timeout: Duration,
    pub bridge_timeout: Duration,
    pub emoji: EmojiTable,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bridge_token =
            var("GAUNTLET_BRIDGE_TOKEN").ok_or(ConfigError::Missing("GAUNTLET_BRIDGE_TOKEN"))?;
        if PLACEHOLDER_SECRETS.contains(&bridge_token.as_str()) {
            return Err(ConfigError::Placeholder("GAUNTLET_BRIDGE_TOKEN"));
        }
        let bot_user_id =
            var("GAUNTLET_BOT_USER_ID").ok_or(ConfigError::Missing("GAUNTLET_BOT_USER_ID"))?;

        let host = var("GAUNTLET_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("GAUNTLET_PORT").unwrap_or_else(|| "3400".into());
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "GAUNTLET_HOST/GAUNTLET_PORT",
                value: format!("{}:{}", host, port),
            })?;

        let millis = |key: &'static str, default: u64| match var(key) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
                _ => Err(ConfigError::Invalid { key, value: raw }),
            },
            None => Ok(Duration::from_millis(default)),
        };
        let store_timeout = millis("GAUNTLET_STORE_TIMEOUT_MS", 5000)?;
        // Round trip to the chat platform through the bridge.
        let bridge_timeout = millis("GAUNTLET_BRIDGE_TIMEOUT_MS", 10_000)?;

        let defaults = EmojiTable::default();
        let emoji = EmojiTable {
            challenger: var("GAUNTLET_EMOJI_CHALLENGER").unwrap_or(defaults.challenger),
            defender: var("GAUNTLET_EMOJI_DEFENDER").unwrap_or(defaults.defender),
            abstain: var("GAUNTLET_EMOJI_ABSTAIN").unwrap_or(defaults.abstain),
            stop: var("GAUNTLET_EMOJI_STOP").unwrap_or(defaults.stop),
        };

        Ok(Self {
            db_path: var("GAUNTLET_DB_PATH").unwrap_or_else(|| "gauntlet.db".into()).into(),
            addr,
            bridge_token,
            bot_user_id,
            store_timeout,
            bridge_timeout,
            emoji,
        })
    }
}
