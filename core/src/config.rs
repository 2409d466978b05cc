use std::time::Duration;

use serde::Deserialize;

pub const ROUND_SECS_DEFAULT: u32 = 30;
pub const TICK_MS_DEFAULT: u64 = 1_000;
pub const VICTORY_RESET_MS_DEFAULT: u64 = 5_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("round duration must be at least one second")]
    ZeroRound,
    #[error("tick interval must be non-zero")]
    ZeroTick,
    #[error("victory reset delay must be non-zero")]
    ZeroResetDelay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub round_secs: u32,
    pub tick_ms: u64,
    pub victory_reset_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_secs: ROUND_SECS_DEFAULT,
            tick_ms: TICK_MS_DEFAULT,
            victory_reset_ms: VICTORY_RESET_MS_DEFAULT,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round_secs == 0 {
            return Err(ConfigError::ZeroRound);
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.victory_reset_ms == 0 {
            return Err(ConfigError::ZeroResetDelay);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn victory_reset_delay(&self) -> Duration {
        Duration::from_millis(self.victory_reset_ms)
    }
}
