use crate::application::connection_manager::ConnectionOptions;
use crate::application::connection_state::Backoff;
use crate::application::device_store::StoreOptions;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

const CONFIG_PATH: &str = "config/console";
const ENV_PREFIX: &str = "CONSOLE";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub realtime: RealtimeSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    #[serde(default = "default_ws_url")]
    pub url: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_true")]
    pub reject_stale_updates: bool,
    #[serde(default = "default_true")]
    pub resubscribe_on_reconnect: bool,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            heartbeat_interval_secs: default_heartbeat_secs(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: default_max_attempts(),
            history_capacity: default_history_capacity(),
            reject_stale_updates: true,
            resubscribe_on_reconnect: true,
            auto_connect: true,
        }
    }
}

impl RealtimeSettings {
    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.heartbeat_interval_secs > 0,
            "realtime.heartbeat_interval_secs must be greater than zero"
        );
        anyhow::ensure!(
            self.reconnect_base_ms > 0,
            "realtime.reconnect_base_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.reconnect_max_ms >= self.reconnect_base_ms,
            "realtime.reconnect_max_ms ({}) is below reconnect_base_ms ({})",
            self.reconnect_max_ms,
            self.reconnect_base_ms
        );
        anyhow::ensure!(
            self.history_capacity > 0,
            "realtime.history_capacity must be greater than zero"
        );
        Ok(())
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            backoff: Backoff::new(
                Duration::from_millis(self.reconnect_base_ms),
                Duration::from_millis(self.reconnect_max_ms),
            ),
            max_attempts: self.max_reconnect_attempts,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            resubscribe_on_reconnect: self.resubscribe_on_reconnect,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            history_capacity: self.history_capacity,
            reject_stale_updates: self.reject_stale_updates,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:3001/ws".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_reconnect_base_ms() -> u64 {
    1000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_history_capacity() -> usize {
    100
}

fn default_true() -> bool {
    true
}

/// Load settings from `config/console.toml` (optional), `CONSOLE__*`
/// variables, then the frontend's `API_URL` / `WS_URL`
pub fn load_settings() -> anyhow::Result<Settings> {
    build_settings(config::File::with_name(CONFIG_PATH).required(false), None)
}

fn build_settings<S>(file: S, env: Option<config::Map<String, String>>) -> anyhow::Result<Settings>
where
    S: config::Source + Send + Sync + 'static,
{
    let frontend_var = |key: &str| match &env {
        Some(vars) => vars.get(key).cloned(),
        None => std::env::var(key).ok(),
    };
    let api_url = frontend_var("API_URL");
    let ws_url = frontend_var("WS_URL");

    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .set_override_option("api.base_url", api_url)?
        .set_override_option("realtime.url", ws_url)?
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.realtime.validate().context("invalid realtime settings")?;
    Ok(settings)
}
