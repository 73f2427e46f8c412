//! Settings loader: defaults, overlaid by an optional system TOML file,
//! overlaid by `IPSC_`-prefixed environment variables.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/ipsc/config.toml";

/// Server-side settings: what port tag to bind, how large a backlog to
/// request, which dialect to speak, and how logging should behave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Port tag used to derive the socket path (`/tmp/ipsc.<port>.sock`).
    pub port: u16,
    /// Accept backlog; clamped to `[MAX_QUEUE_DEFAULT, MAX_QUEUE]` by
    /// [`crate::endpoint::ServerEndpoint::listen`].
    pub maxq: i32,
    /// Per-receive timeout in milliseconds applied to each connection.
    pub recv_timeout_ms: u64,
    /// Require the JSON-RPC 2.0 `jsonrpc` version field on every request.
    pub strict: bool,
    /// Output logs as JSON instead of pretty console format.
    pub log_json: bool,
    pub verbose: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 9847,
            maxq: 16,
            recv_timeout_ms: 5_000,
            strict: true,
            log_json: false,
            verbose: false,
        }
    }
}

impl ServerSettings {
    /// Layer defaults, then the system config file if present, then an
    /// optional caller-supplied overlay (e.g. parsed CLI flags), then
    /// environment variables, in that order of increasing priority.
    pub fn load(args: Option<&impl Serialize>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(ServerSettings::default()))
            .merge(Toml::file(SYSTEM_CONFIG_PATH));

        if let Some(args) = args {
            figment = figment.merge(Serialized::defaults(args));
        }

        figment = figment.merge(Env::prefixed("IPSC_"));

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict_and_on_the_documented_port() {
        let settings = ServerSettings::default();
        assert!(settings.strict);
        assert_eq!(settings.port, 9847);
    }
}
