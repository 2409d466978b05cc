pub mod chat;
pub mod client;
pub mod config;
pub mod grid;
pub mod identity;
pub mod machine;
pub mod mint;
pub mod reward;
pub mod store;
pub mod tile;

pub use chat::{ChatLog, ChatMessage};
pub use client::{GameClient, LocalUi};
pub use config::{ConfigError, GameConfig};
pub use grid::{GlyphPattern, GridLayout, LayoutError, GLYPH_SIZE};
pub use identity::{ConnectedUser, DisplayNames};
pub use machine::{Effect, GameMachine, GameView, Phase, TimerBand, TimerKind, TimerToken, VictoryNotice};
pub use mint::{MintAdapter, MintCallback, MintError, MintOutcome, MintRequest, MintStatus};
pub use reward::{tier_from_remaining, RewardTier};
pub use store::{MemoryStore, SharedField, SharedStore};
pub use tile::{tile_key, TileKey, TileKeyError, TileState};
