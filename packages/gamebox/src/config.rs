use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::RegistrySettings;

// =============================================================================
// File config (figment-deserialized from defaults / gamebox.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   gamebox.toml:    [game]
//                    heartbeat_interval_ms = 500
//
//   env var:         GAMEBOX_GAME__HEARTBEAT_INTERVAL_MS=500   (double underscore = nesting)
//
//   CLI:             --host / --port override [server]

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub game: GameFileConfig,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
}

/// Listener settings (lives under `[server]` in gamebox.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Game tunables (lives under `[game]` in gamebox.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameFileConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_game_id_length")]
    pub game_id_length: usize,
    /// JSON array of `{"word", "hint"}` objects. Built-in list when unset.
    #[serde(default)]
    pub word_list: Option<PathBuf>,
}

impl Default for GameFileConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            game_id_length: default_game_id_length(),
            word_list: None,
        }
    }
}

/// Push channel tunables (lives under `[websocket]` in gamebox.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    /// Per-socket outgoing queue
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
    /// Snapshots a socket may fall behind before it starts skipping
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            send_channel_capacity: default_send_channel_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_heartbeat_interval_ms() -> u64 {
    1000
}
fn default_game_id_length() -> usize {
    6
}
fn default_send_channel_capacity() -> usize {
    100
}
fn default_broadcast_capacity() -> usize {
    256
}

/// Build a figment that layers: defaults → gamebox.toml → GAMEBOX_* env vars.
///
/// A missing config file is not an error; its layer is simply empty.
///
/// Env vars use double-underscore for nesting into sections:
///   `GAMEBOX_SERVER__PORT=9000`  →  `server.port = 9000`
///   `GAMEBOX_WEBSOCKET__BROADCAST_CAPACITY=512`  →  `websocket.broadcast_capacity = 512`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("GAMEBOX_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct GameboxConfig {
    pub host: String,
    pub port: u16,
    pub registry: RegistrySettings,
    pub word_list: Option<PathBuf>,
    pub websocket: WebSocketConfig,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    pub send_channel_capacity: usize,
    pub broadcast_capacity: usize,
}

impl GameboxConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            host: fc.server.host.clone(),
            port: fc.server.port,
            registry: RegistrySettings {
                // A zero period would panic in tokio's interval
                heartbeat_interval: Duration::from_millis(fc.game.heartbeat_interval_ms.max(1)),
                game_id_length: fc.game.game_id_length.max(1),
            },
            word_list: fc.game.word_list.clone(),
            websocket: WebSocketConfig {
                send_channel_capacity: fc.websocket.send_channel_capacity.max(1),
                broadcast_capacity: fc.websocket.broadcast_capacity.max(1),
            },
        }
    }

    /// Apply CLI overrides on top of the file/env layers.
    pub fn with_overrides(mut self, host: Option<&str>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host.to_string();
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid host address: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
