//! Loads a JSON gateway descriptor from disk and turns it into the
//! `Vec<gateway_core::ModuleDescriptorEntry>` the Gateway needs to start.
//!
//! This is ambient stack, not a spec feature: every runnable binary needs a
//! way to get from a file on disk to a descriptor. Mirrors the teacher's
//! `discover` crate's "parse JSON from a path, fall back to a safe default"
//! shape, generalized from a static service catalog to a module descriptor.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One module entry in a gateway descriptor file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfigEntry {
    /// Human-readable name, used only in logs/error messages.
    pub name: String,
    /// Path to the module's shared library.
    pub path: String,
    /// Arbitrary JSON forwarded to the module as opaque bytes; the module
    /// parses it however it likes, exactly as `hello_world_hl`'s
    /// `Module_Create` parses its own `broker.address`/`broker.topic`
    /// fields out of a JSON blob.
    #[serde(default)]
    pub config: serde_json::Value,
    /// When present, asks the Gateway to open a broker `Subscriber` on
    /// this module's behalf and forward matching messages into its
    /// `receive` capability.
    pub subscribe: Option<SubscribeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeConfig {
    pub address: String,
    pub topic: String,
}

/// The full gateway descriptor document: `{ "modules": [ ... ] }`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub modules: Vec<ModuleConfigEntry>,
}

impl GatewayConfig {
    /// Reads and parses a descriptor file. There is no fallback catalog
    /// here, unlike `discover::get_services`: an edge gateway with no
    /// modules configured is a no-op gateway, not a useful default, so a
    /// missing or malformed file is surfaced rather than silently
    /// substituted.
    pub fn load(path: impl AsRef<Path>) -> Result<GatewayConfig> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading gateway config at {}", path.display()))?;
        let config: GatewayConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing gateway config at {}", path.display()))?;
        Ok(config)
    }

    /// Converts every entry into the descriptor form `gateway_core::Gateway`
    /// consumes. The per-module `config` JSON value is re-serialized to
    /// bytes (UTF-8 JSON text) so the module can parse it with whatever
    /// JSON library it links, matching the opaque-bytes contract of §4.6.
    pub fn descriptor(&self) -> Result<Vec<gateway_core::ModuleDescriptorEntry>> {
        self.modules
            .iter()
            .map(|entry| {
                let config = serde_json::to_vec(&entry.config).with_context(|| {
                    format!("serializing config for module '{}'", entry.name)
                })?;
                Ok(gateway_core::ModuleDescriptorEntry {
                    path: entry.path.clone(),
                    config,
                    subscribe: entry.subscribe.as_ref().map(|s| gateway_core::SubscribeSpec {
                        address: s.address.clone(),
                        topic: s.topic.clone(),
                    }),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_modules_with_and_without_subscribe() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "modules": [
                    {{ "name": "echo", "path": "./libecho.so", "config": {{"greeting": "hi"}},
                      "subscribe": {{ "address": "inproc://gateway", "topic": "telemetry" }} }},
                    {{ "name": "sink", "path": "./libsink.so" }}
                ]
            }}"#
        )
        .unwrap();

        let config = GatewayConfig::load(file.path()).unwrap();
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[0].name, "echo");
        let sub = config.modules[0].subscribe.as_ref().unwrap();
        assert_eq!(sub.address, "inproc://gateway");
        assert_eq!(sub.topic, "telemetry");
        assert!(config.modules[1].subscribe.is_none());

        let descriptor = config.descriptor().unwrap();
        assert_eq!(descriptor.len(), 2);
        assert_eq!(descriptor[0].path, "./libecho.so");
        assert!(descriptor[0].subscribe.is_some());
        assert!(descriptor[1].subscribe.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = GatewayConfig::load("/nonexistent/gateway.json").unwrap_err();
        assert!(err.to_string().contains("reading gateway config"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = GatewayConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing gateway config"));
    }
}
