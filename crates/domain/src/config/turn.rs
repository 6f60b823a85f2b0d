use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Turn policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Wall-clock bound on waiting for a terminal signal (milliseconds).
    /// 0 = no limit.
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl TurnConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

fn d_30000() -> u64 {
    30_000
}
