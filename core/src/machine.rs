use std::time::Duration;

use crate::config::GameConfig;
use crate::grid::GridLayout;
use crate::identity::has_username;
use crate::mint::{MintError, MintOutcome, MintRequest, MintStatus};
use crate::reward::{tier_from_remaining, RewardTier};
use crate::store::{SharedStore, GAME_TIMER, TILES};
use crate::tile::{TileKey, TileState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Playing,
    Victory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Tick,
    AutoReset,
}

impl TimerKind {
    fn slot(self) -> usize {
        match self {
            TimerKind::Tick => 0,
            TimerKind::AutoReset => 1,
        }
    }
}

/// Identifies one arming of a timer. Only the most recent arming of each kind
/// is honoured by [`GameMachine::on_timer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub kind: TimerKind,
    generation: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VictoryNotice {
    pub tier: RewardTier,
    pub remaining_secs: u32,
    pub mint: MintStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Arm { token: TimerToken, after: Duration },
    Disarm { kind: TimerKind },
    Victory(VictoryNotice),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerBand {
    Green,
    Yellow,
    Orange,
    Red,
}

pub fn timer_band(remaining_secs: u32) -> TimerBand {
    if remaining_secs > 20 {
        TimerBand::Green
    } else if remaining_secs > 10 {
        TimerBand::Yellow
    } else if remaining_secs > 5 {
        TimerBand::Orange
    } else {
        TimerBand::Red
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameView {
    pub phase: Phase,
    pub flipped: usize,
    pub total: usize,
    pub remaining_secs: u32,
    pub round_secs: u32,
    pub notice: Option<VictoryNotice>,
    pub notice_visible: bool,
}

impl GameView {
    pub fn progress_percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.flipped as f32 / self.total as f32 * 100.0
    }

    pub fn timer_fraction(&self) -> f32 {
        if self.round_secs == 0 {
            return 0.0;
        }
        (self.remaining_secs as f32 / self.round_secs as f32).clamp(0.0, 1.0)
    }

    pub fn timer_band(&self) -> TimerBand {
        timer_band(self.remaining_secs)
    }
}

/// Per-client game state machine. Shared fields are read and written through
/// a [`SharedStore`]; everything else here is local to one client.
///
/// The machine never sleeps. Timers are requested with [`Effect::Arm`] and
/// handed back through [`GameMachine::on_timer`] when they fire.
#[derive(Clone, Debug)]
pub struct GameMachine {
    config: GameConfig,
    layout: GridLayout,
    phase: Phase,
    notice: Option<VictoryNotice>,
    notice_visible: bool,
    armed: [Option<u64>; 2],
    next_generation: u64,
}

impl GameMachine {
    pub fn new(config: GameConfig) -> Self {
        Self::with_layout(config, GridLayout::standard().clone())
    }

    pub fn with_layout(config: GameConfig, layout: GridLayout) -> Self {
        Self {
            config,
            layout,
            phase: Phase::Playing,
            notice: None,
            notice_visible: false,
            armed: [None; 2],
            next_generation: 0,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notice(&self) -> Option<&VictoryNotice> {
        self.notice.as_ref()
    }

    pub fn notice_visible(&self) -> bool {
        self.notice_visible
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed[kind.slot()].is_some()
    }

    /// Starts the countdown and evaluates whatever state the session already has.
    pub fn start<S: SharedStore + ?Sized>(&mut self, store: &S) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.evaluate(store, &mut effects);
        self.arm(TimerKind::Tick, self.config.tick_interval(), &mut effects);
        effects
    }

    /// Re-evaluates after a shared field changed, locally or remotely.
    pub fn observe<S: SharedStore + ?Sized>(&mut self, store: &S) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.evaluate(store, &mut effects);
        effects
    }

    /// Toggles one active tile. Ignored in `Victory` so the board stays
    /// complete until the auto-reset fires.
    pub fn click_tile<S: SharedStore + ?Sized>(
        &mut self,
        store: &mut S,
        actor: &str,
        key: TileKey,
    ) -> Vec<Effect> {
        if self.phase == Phase::Victory
            || !has_username(&*store, actor)
            || !self.layout.is_active(&key)
        {
            return Vec::new();
        }
        TILES.update(store, TileState::new, |tiles| {
            tiles.toggle(key);
        });
        self.observe(&*store)
    }

    /// Background click: abort the round and start a fresh one.
    pub fn click_background<S: SharedStore + ?Sized>(&mut self, store: &mut S, actor: &str) -> Vec<Effect> {
        if !has_username(&*store, actor) {
            return Vec::new();
        }
        let mut effects = Vec::new();
        self.reset_round(store, &mut effects);
        self.arm(TimerKind::Tick, self.config.tick_interval(), &mut effects);
        tracing::info!(actor, "round reset by background click");
        effects
    }

    pub fn on_timer<S: SharedStore + ?Sized>(&mut self, store: &mut S, token: TimerToken) -> Vec<Effect> {
        let slot = token.kind.slot();
        if self.armed[slot] != Some(token.generation) {
            tracing::debug!(kind = ?token.kind, "dropping stale timer");
            return Vec::new();
        }
        self.armed[slot] = None;

        let mut effects = Vec::new();
        match token.kind {
            TimerKind::Tick => {
                // Completion that lands on the expiring tick still counts.
                self.evaluate(&*store, &mut effects);
                let remaining = self.remaining_secs(&*store);
                let next = remaining.saturating_sub(1);
                if next == 0 {
                    tracing::info!("round expired");
                    self.reset_round(store, &mut effects);
                } else {
                    GAME_TIMER.write(store, &next);
                }
                self.arm(TimerKind::Tick, self.config.tick_interval(), &mut effects);
            }
            TimerKind::AutoReset => {
                tracing::info!("auto reset after victory");
                self.reset_round(store, &mut effects);
            }
        }
        effects
    }

    /// Hides the local notice. Shared state is untouched.
    pub fn dismiss_notice(&mut self) {
        self.notice_visible = false;
    }

    pub fn begin_mint(&mut self, wallet: Option<&str>) -> Result<MintRequest, MintError> {
        let notice = self.notice.as_mut().ok_or(MintError::NoVictory)?;
        notice.mint.can_start()?;
        let request = MintRequest::for_victory(wallet, notice.tier)?;
        notice.mint = MintStatus::Minting;
        Ok(request)
    }

    pub fn finish_mint(&mut self, outcome: MintOutcome) {
        match self.notice.as_mut() {
            Some(notice) => notice.mint.finish(outcome),
            None => tracing::debug!(?outcome, "mint finished without a notice"),
        }
    }

    pub fn remaining_secs<S: SharedStore + ?Sized>(&self, store: &S) -> u32 {
        let round_secs = self.config.round_secs;
        GAME_TIMER.read_or_else(store, || round_secs)
    }

    pub fn is_complete(&self, tiles: &TileState) -> bool {
        tiles.flipped_active_count(&self.layout) == self.layout.total_active_tiles()
    }

    pub fn view<S: SharedStore + ?Sized>(&self, store: &S) -> GameView {
        let tiles = TILES.read_or_default(store);
        GameView {
            phase: self.phase,
            flipped: tiles.flipped_active_count(&self.layout),
            total: self.layout.total_active_tiles(),
            remaining_secs: self.remaining_secs(store),
            round_secs: self.config.round_secs,
            notice: self.notice.clone(),
            notice_visible: self.notice_visible,
        }
    }

    fn evaluate<S: SharedStore + ?Sized>(&mut self, store: &S, effects: &mut Vec<Effect>) {
        let tiles = TILES.read_or_default(store);
        let complete = self.is_complete(&tiles);
        match (self.phase, complete) {
            (Phase::Playing, true) => {
                let remaining = self.remaining_secs(store);
                let tier = tier_from_remaining(remaining, self.config.round_secs);
                let notice = VictoryNotice {
                    tier,
                    remaining_secs: remaining,
                    mint: MintStatus::Idle,
                };
                tracing::info!(remaining, tier = %tier, "victory");
                self.phase = Phase::Victory;
                self.notice = Some(notice.clone());
                self.notice_visible = true;
                self.arm(TimerKind::AutoReset, self.config.victory_reset_delay(), effects);
                effects.push(Effect::Victory(notice));
            }
            (Phase::Victory, false) => {
                self.phase = Phase::Playing;
                self.disarm(TimerKind::AutoReset, effects);
            }
            _ => {}
        }
    }

    fn reset_round<S: SharedStore + ?Sized>(&mut self, store: &mut S, effects: &mut Vec<Effect>) {
        TILES.write(store, &TileState::new());
        GAME_TIMER.write(store, &self.config.round_secs);
        self.evaluate(&*store, effects);
    }

    fn arm(&mut self, kind: TimerKind, after: Duration, effects: &mut Vec<Effect>) {
        self.disarm(kind, effects);
        self.next_generation = self.next_generation.wrapping_add(1);
        let generation = self.next_generation;
        self.armed[kind.slot()] = Some(generation);
        effects.push(Effect::Arm {
            token: TimerToken { kind, generation },
            after,
        });
    }

    fn disarm(&mut self, kind: TimerKind, effects: &mut Vec<Effect>) {
        if self.armed[kind.slot()].take().is_some() {
            effects.push(Effect::Disarm { kind });
        }
    }
}
