//! Tracing initialisation for the CLI.

use std::collections::HashMap;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose level `--verbose` raises. The binary's own targets live
/// under its crate name, `chainfeed`.
const OWN_CRATES: [&str; 5] = [
    "chainfeed",
    "chainfeed-core",
    "chainfeed-ws",
    "chainfeed-http",
    "chainfeed-store",
];

/// Log level per component.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Override per component: component_name → level
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Config for the global CLI flags. `verbose` turns on debug output for
    /// the chainfeed crates only; dependencies stay at the default level.
    pub fn from_flags(verbose: bool, json: bool) -> Self {
        let components = if verbose {
            OWN_CRATES
                .iter()
                .map(|c| (c.to_string(), "debug".to_string()))
                .collect()
        } else {
            HashMap::new()
        };
        Self {
            components,
            json,
            ..Self::default()
        }
    }

    /// `EnvFilter` directive string, e.g. "info,chainfeed_ws=debug".
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Initialise tracing. `RUST_LOG`, when set, wins over the config.
/// Logs go to stderr so stdout carries only command output.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_covers_the_binary_targets() {
        // targets in this crate are prefixed with the bin crate name
        assert!(module_path!().starts_with("chainfeed::"));
        let config = LogConfig::from_flags(true, false);
        assert_eq!(config.components.get("chainfeed").map(String::as_str), Some("debug"));
    }

    #[test]
    fn quiet_by_default() {
        assert_eq!(LogConfig::from_flags(false, false).directives(), "info");
    }

    #[test]
    fn verbose_targets_own_crates() {
        let directives = LogConfig::from_flags(true, true).directives();
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("chainfeed_ws=debug"));
        assert!(directives.contains(",chainfeed=debug"));
        assert!(!directives.contains("chainfeed_cli"));
        assert!(!directives.contains("tungstenite"));
    }
}
