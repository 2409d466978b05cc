use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use monad_tiles_core::{
    Effect, GameClient, MemoryStore, MintAdapter, MintOutcome, RewardTier, SharedStore, TileKey,
    TimerKind, TimerToken, VictoryNotice,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;

const CHANGE_FEED_CAPACITY: usize = 256;

/// Stand-in for the sync layer: one in-process store plus a change feed that
/// every client subscribes to.
#[derive(Clone)]
pub(crate) struct SessionStore {
    inner: MemoryStore,
    changes: broadcast::Sender<String>,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: MemoryStore::new(),
            changes,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    fn notify(&self, key: &str) {
        // No subscribers is fine: nobody is connected yet.
        let _ = self.changes.send(key.to_string());
    }
}

impl SharedStore for SessionStore {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.load(key)
    }

    fn save(&mut self, key: &str, bytes: Vec<u8>) {
        self.inner.save(key, bytes);
        self.notify(key);
    }

    fn update(&mut self, key: &str, apply: &mut dyn FnMut(Option<Vec<u8>>) -> Option<Vec<u8>>) {
        self.inner.update(key, apply);
        self.notify(key);
    }
}

#[derive(Debug)]
pub(crate) enum ClientInput {
    ClaimUsername(String),
    LinkWallet(String),
    ClickTile(TileKey),
    ClickBackground,
    DismissNotice,
    Chat(String),
    Mint,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub(crate) enum ClientEvent {
    Victory {
        user_id: String,
        tier: u8,
        remaining_secs: u32,
    },
    MintStarted {
        user_id: String,
        tier: u8,
    },
    MintRejected {
        user_id: String,
        reason: String,
    },
    MintFinished {
        user_id: String,
        ok: bool,
        detail: String,
    },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ClientReport {
    pub(crate) user_id: String,
    pub(crate) display_name: String,
    pub(crate) victories: Vec<RewardTier>,
    pub(crate) minted: usize,
    pub(crate) mint_failures: usize,
    pub(crate) chat_seen: usize,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Turns `Arm`/`Disarm` effects into spawned sleeps. Aborting a sleep is
/// best-effort; a token that already fired is dropped by the machine.
struct TimerSet {
    handles: HashMap<TimerKind, AbortHandle>,
    fired: mpsc::UnboundedSender<TimerToken>,
}

impl TimerSet {
    fn new(fired: mpsc::UnboundedSender<TimerToken>) -> Self {
        Self {
            handles: HashMap::new(),
            fired,
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Vec<VictoryNotice> {
        let mut notices = Vec::new();
        for effect in effects {
            match effect {
                Effect::Arm { token, after } => self.arm(token, after),
                Effect::Disarm { kind } => self.cancel(kind),
                Effect::Victory(notice) => notices.push(notice),
            }
        }
        notices
    }

    fn arm(&mut self, token: TimerToken, after: Duration) {
        self.cancel(token.kind);
        let fired = self.fired.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = fired.send(token);
        });
        self.handles.insert(token.kind, handle.abort_handle());
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.handles.remove(&kind) {
            handle.abort();
        }
    }

    fn shutdown(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

struct ClientTask {
    client: GameClient<SessionStore>,
    mint: Option<Box<dyn MintAdapter + Send>>,
    mint_results: mpsc::UnboundedSender<MintOutcome>,
    events: mpsc::UnboundedSender<ClientEvent>,
    report: ClientReport,
}

impl ClientTask {
    fn user_id(&self) -> String {
        self.client.user_id().to_string()
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn apply_input(&mut self, input: ClientInput) -> Vec<Effect> {
        match input {
            ClientInput::ClaimUsername(name) => {
                self.client.set_username_draft(&name);
                self.client.submit_username();
                Vec::new()
            }
            ClientInput::LinkWallet(address) => {
                self.client.link_wallet(&address);
                Vec::new()
            }
            ClientInput::ClickTile(key) => self.client.click_tile(key),
            ClientInput::ClickBackground => self.client.click_background(),
            ClientInput::DismissNotice => {
                self.client.dismiss_notice();
                Vec::new()
            }
            ClientInput::Chat(text) => {
                self.client.set_chat_draft(&text);
                self.client.send_chat(now_ms());
                Vec::new()
            }
            ClientInput::Mint => {
                self.start_mint();
                Vec::new()
            }
        }
    }

    fn on_victory(&mut self, notice: VictoryNotice) {
        tracing::info!(
            user_id = %self.client.user_id(),
            tier = %notice.tier,
            remaining = notice.remaining_secs,
            "victory notice"
        );
        self.report.victories.push(notice.tier);
        self.emit(ClientEvent::Victory {
            user_id: self.user_id(),
            tier: notice.tier.level(),
            remaining_secs: notice.remaining_secs,
        });
        if self.mint.is_some() {
            self.start_mint();
        }
    }

    fn start_mint(&mut self) {
        let Some(mint) = self.mint.as_mut() else {
            return;
        };
        match self.client.begin_mint() {
            Ok(request) => {
                let tier = request.level();
                let results = self.mint_results.clone();
                mint.mint(
                    request,
                    Box::new(move |outcome| {
                        let _ = results.send(outcome);
                    }),
                );
                self.emit(ClientEvent::MintStarted {
                    user_id: self.user_id(),
                    tier,
                });
            }
            Err(err) => {
                tracing::debug!(user_id = %self.client.user_id(), %err, "mint not started");
                self.emit(ClientEvent::MintRejected {
                    user_id: self.user_id(),
                    reason: err.to_string(),
                });
            }
        }
    }

    fn on_mint_finished(&mut self, outcome: MintOutcome) {
        let (ok, detail) = match &outcome {
            MintOutcome::Minted { tx_hash } => {
                self.report.minted += 1;
                (true, tx_hash.clone())
            }
            MintOutcome::Failed { message } => {
                self.report.mint_failures += 1;
                tracing::warn!(user_id = %self.client.user_id(), %message, "mint failed");
                (false, message.clone())
            }
        };
        self.client.finish_mint(outcome);
        self.emit(ClientEvent::MintFinished {
            user_id: self.user_id(),
            ok,
            detail,
        });
    }
}

/// Drives one client until its input channel closes.
pub(crate) async fn run_client(
    client: GameClient<SessionStore>,
    mut inputs: mpsc::UnboundedReceiver<ClientInput>,
    events: mpsc::UnboundedSender<ClientEvent>,
    mint: Option<Box<dyn MintAdapter + Send>>,
) -> ClientReport {
    let mut changes = client.store().subscribe();
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
    let (mint_tx, mut mint_rx) = mpsc::unbounded_channel();
    let mut timers = TimerSet::new(fired_tx);
    let report = ClientReport {
        user_id: client.user_id().to_string(),
        ..ClientReport::default()
    };
    let mut task = ClientTask {
        client,
        mint,
        mint_results: mint_tx,
        events,
        report,
    };

    let mut effects = task.client.start();
    loop {
        for notice in timers.apply(effects) {
            task.on_victory(notice);
        }
        effects = tokio::select! {
            input = inputs.recv() => match input {
                Some(input) => task.apply_input(input),
                None => break,
            },
            change = changes.recv() => match change {
                Ok(_) | Err(RecvError::Lagged(_)) => task.client.observe(),
                Err(RecvError::Closed) => break,
            },
            Some(token) = fired_rx.recv() => task.client.on_timer(token),
            Some(outcome) = mint_rx.recv() => {
                task.on_mint_finished(outcome);
                Vec::new()
            }
        };
    }
    timers.shutdown();

    let mut report = task.report;
    report.display_name = task.client.display_name(task.client.user_id());
    report.chat_seen = task.client.chat().len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use monad_tiles_core::store::{GAME_TIMER, TILES};
    use monad_tiles_core::{GameConfig, MintCallback, MintRequest};

    struct InstantMint;

    impl MintAdapter for InstantMint {
        fn mint(&mut self, request: MintRequest, on_done: MintCallback) {
            on_done(MintOutcome::Minted {
                tx_hash: format!("0x{:02x}", request.level()),
            });
        }
    }

    fn slow_ticks() -> GameConfig {
        GameConfig {
            tick_ms: 60_000,
            ..GameConfig::default()
        }
    }

    async fn next_victory(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> (String, u8) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .expect("event before timeout")
                .expect("event channel open");
            if let ClientEvent::Victory { user_id, tier, .. } = event {
                return (user_id, tier);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_client_sees_victory_and_round_resets() {
        let store = SessionStore::new();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (alice_tx, alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, bob_rx) = mpsc::unbounded_channel();

        let alice = tokio::spawn(run_client(
            GameClient::new("conn-alice", store.clone(), slow_ticks()),
            alice_rx,
            events_tx.clone(),
            Some(Box::new(InstantMint)),
        ));
        let bob = tokio::spawn(run_client(
            GameClient::new("conn-bob", store.clone(), slow_ticks()),
            bob_rx,
            events_tx,
            None,
        ));

        alice_tx
            .send(ClientInput::ClaimUsername("alice".to_string()))
            .expect("alice running");
        alice_tx
            .send(ClientInput::LinkWallet("0x1234567890abcdef".to_string()))
            .expect("alice running");
        let keys: Vec<TileKey> = monad_tiles_core::GridLayout::standard().active_keys().collect();
        for key in keys {
            alice_tx.send(ClientInput::ClickTile(key)).expect("alice running");
        }

        let mut winners = vec![next_victory(&mut events_rx).await, next_victory(&mut events_rx).await];
        winners.sort();
        assert_eq!(
            winners,
            vec![("conn-alice".to_string(), 3), ("conn-bob".to_string(), 3)]
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(TILES.read_or_default(&store).is_empty());
        assert_eq!(GAME_TIMER.read_or_else(&store, || 0), 30);

        drop(alice_tx);
        drop(bob_tx);
        let alice = alice.await.expect("alice task");
        let bob = bob.await.expect("bob task");
        assert_eq!(alice.victories, vec![RewardTier::Lightning]);
        assert_eq!(alice.minted, 1);
        assert_eq!(alice.display_name, "alice");
        assert_eq!(bob.victories, vec![RewardTier::Lightning]);
        assert_eq!(bob.minted, 0);
        assert_eq!(bob.display_name, "User conn-b");
    }

    #[tokio::test(start_paused = true)]
    async fn nameless_client_cannot_touch_the_board() {
        let store = SessionStore::new();
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (ghost_tx, ghost_rx) = mpsc::unbounded_channel();
        let ghost = tokio::spawn(run_client(
            GameClient::new("conn-ghost", store.clone(), GameConfig::default()),
            ghost_rx,
            events_tx,
            None,
        ));

        let key = monad_tiles_core::tile_key('M', 0, 0);
        ghost_tx.send(ClientInput::ClickTile(key)).expect("ghost running");
        ghost_tx.send(ClientInput::ClickBackground).expect("ghost running");
        ghost_tx
            .send(ClientInput::Chat("anyone?".to_string()))
            .expect("ghost running");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!TILES.read_or_default(&store).is_flipped(&key));
        drop(ghost_tx);
        let report = ghost.await.expect("ghost task");
        assert!(report.victories.is_empty());
        assert_eq!(report.chat_seen, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_on_real_timers() {
        let store = SessionStore::new();
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let config = GameConfig {
            round_secs: 3,
            ..GameConfig::default()
        };
        let client = tokio::spawn(run_client(
            GameClient::new("conn-solo", store.clone(), config),
            rx,
            events_tx,
            None,
        ));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(GAME_TIMER.read_or_else(&store, || 0), 2);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(GAME_TIMER.read_or_else(&store, || 0), 1);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(GAME_TIMER.read_or_else(&store, || 0), 3);

        drop(tx);
        client.await.expect("client task");
    }
}
