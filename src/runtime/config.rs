//! Application configuration types

use mongolap_core::CompilerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Settings of the `demo` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_insert_interval_ms")]
    pub insert_interval_ms: u64,
    #[serde(default = "default_query_interval_ms")]
    pub query_interval_ms: u64,
    #[serde(default = "default_range")]
    pub range: String,
}

fn default_namespace() -> String {
    "testMetrics".to_string()
}

fn default_insert_interval_ms() -> u64 {
    1000
}

fn default_query_interval_ms() -> u64 {
    2000
}

fn default_range() -> String {
    "1 Minute".to_string()
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            insert_interval_ms: default_insert_interval_ms(),
            query_interval_ms: default_query_interval_ms(),
            range: default_range(),
        }
    }
}

impl DemoConfig {
    pub fn insert_interval(&self) -> Duration {
        Duration::from_millis(self.insert_interval_ms.max(1))
    }

    pub fn query_interval(&self) -> Duration {
        Duration::from_millis(self.query_interval_ms.max(1))
    }
}
