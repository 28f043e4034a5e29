use crate::db::retry::RetryConfig;
use crate::error::{ChatError, ChatResult};
use std::env;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub mongo_uri: String,
    pub store: StoreKind,
    /// Deadline for requests that do not carry their own
    pub request_timeout: Duration,
    pub read_retry: RetryConfig,
    pub log_level: String,
}

impl Config {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up
    /// a local `.env` file.
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("CHAT_STORE").as_deref() {
            None | Some("mongo") => StoreKind::Mongo,
            Some("memory") => StoreKind::Memory,
            Some(other) => {
                return Err(ChatError::Config(format!(
                    "CHAT_STORE must be `mongo` or `memory`, got `{other}`"
                )))
            }
        };

        let read_retry = RetryConfig {
            max_retries: parse_or(&lookup, "READ_RETRY_ATTEMPTS", 3)?,
            initial_backoff: Duration::from_millis(parse_or(&lookup, "READ_RETRY_BACKOFF_MS", 50)?),
            ..RetryConfig::default()
        };

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "localhost".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8085)?,
            mongo_uri: lookup("MONGO_URI")
                .unwrap_or_else(|| "mongodb://localhost:27017/shm_chat".to_string()),
            store,
            request_timeout: Duration::from_millis(parse_or(&lookup, "REQUEST_TIMEOUT_MS", 5000)?),
            read_retry,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn bind_addr(&self) -> ChatResult<SocketAddr> {
        (self.server_host.as_str(), self.server_port)
            .to_socket_addrs()
            .map_err(|e| ChatError::Config(format!("resolve {}: {e}", self.server_host)))?
            .next()
            .ok_or_else(|| ChatError::Config(format!("{} resolved to no address", self.server_host)))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> ChatResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ChatError::Config(format!("{key} has an invalid value `{raw}`"))),
    }
}
