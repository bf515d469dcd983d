//! Shared configuration for all harness crates. Load from TOML or env.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default test alias the agent service resolves when none is configured.
pub const DEFAULT_AGENT_ALIAS_ID: &str = "TSTALIASID";

/// Global harness configuration (gateway identity + remote agent endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Title shown in the chat page header.
    pub ui_title: String,
    /// Optional icon (emoji or URL) shown next to the title.
    #[serde(default)]
    pub ui_icon: Option<String>,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Agent identifier passed on every invocation. Not validated here; an
    /// empty value simply fails at the remote call.
    #[serde(default)]
    pub agent_id: String,
    /// Agent alias identifier. Defaults to the service's test alias.
    pub agent_alias_id: String,
    /// Base URL of the agent-invocation endpoint.
    pub runtime_endpoint: String,
    /// Optional bearer key sent on every invocation.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `HARNESS_CONFIG`
    /// path > `config/gateway.toml` > defaults, then `HARNESS__*` env vars on
    /// top (e.g. `HARNESS__AGENT_ID`, `HARNESS__UI_TITLE`).
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("HARNESS_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("ui_title", "Agent Test Harness")?
            .set_default("port", 8001_i64)?
            .set_default("agent_id", "")?
            .set_default("agent_alias_id", DEFAULT_AGENT_ALIAS_ID)?
            .set_default("runtime_endpoint", "http://127.0.0.1:9400")?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("HARNESS").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
