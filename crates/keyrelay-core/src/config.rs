use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine settings. Every field has a default, so partial documents load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long `ensure_language` waits before re-checking the layout.
    #[serde(default = "default_layout_verify_delay_ms")]
    pub layout_verify_delay_ms: u64,
    /// Forward events carrying `injection_marker` without dispatching them.
    #[serde(default = "default_ignore_injected")]
    pub ignore_injected: bool,
    /// Tag placed in the extra-info field of every injected record.
    #[serde(default = "default_injection_marker")]
    pub injection_marker: usize,
}

fn default_layout_verify_delay_ms() -> u64 {
    10
}

fn default_ignore_injected() -> bool {
    true
}

fn default_injection_marker() -> usize {
    0x4B52_4C59
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout_verify_delay_ms: default_layout_verify_delay_ms(),
            ignore_injected: default_ignore_injected(),
            injection_marker: default_injection_marker(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn layout_verify_delay(&self) -> Duration {
        Duration::from_millis(self.layout_verify_delay_ms)
    }

    /// Marker the hook should skip, if filtering is enabled.
    pub fn ignored_marker(&self) -> Option<usize> {
        self.ignore_injected.then_some(self.injection_marker)
    }
}
