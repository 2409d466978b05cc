use crate::chat::{chat_log, send_chat, ChatLog, ChatMessage};
use crate::config::GameConfig;
use crate::identity::{claim_username, display_name_in, has_username, link_wallet, wallet_address};
use crate::machine::{Effect, GameMachine, GameView, TimerToken};
use crate::mint::{MintError, MintOutcome, MintRequest};
use crate::store::SharedStore;
use crate::tile::TileKey;

/// Local-only UI state: drafts and panel toggles. Never shared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalUi {
    pub username_draft: String,
    pub chat_draft: String,
    pub chat_open: bool,
}

/// One connected participant: its id, a handle on the session store and its
/// own state machine.
pub struct GameClient<S> {
    user_id: String,
    store: S,
    machine: GameMachine,
    ui: LocalUi,
}

impl<S: SharedStore> GameClient<S> {
    pub fn new(user_id: impl Into<String>, store: S, config: GameConfig) -> Self {
        Self::with_machine(user_id, store, GameMachine::new(config))
    }

    pub fn with_machine(user_id: impl Into<String>, store: S, machine: GameMachine) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            machine,
            ui: LocalUi::default(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn machine(&self) -> &GameMachine {
        &self.machine
    }

    pub fn ui(&self) -> &LocalUi {
        &self.ui
    }

    pub fn start(&mut self) -> Vec<Effect> {
        self.machine.start(&self.store)
    }

    pub fn observe(&mut self) -> Vec<Effect> {
        self.machine.observe(&self.store)
    }

    pub fn on_timer(&mut self, token: TimerToken) -> Vec<Effect> {
        self.machine.on_timer(&mut self.store, token)
    }

    pub fn click_tile(&mut self, key: TileKey) -> Vec<Effect> {
        self.machine.click_tile(&mut self.store, &self.user_id, key)
    }

    pub fn click_background(&mut self) -> Vec<Effect> {
        self.machine.click_background(&mut self.store, &self.user_id)
    }

    pub fn dismiss_notice(&mut self) {
        self.machine.dismiss_notice();
    }

    pub fn has_username(&self) -> bool {
        has_username(&self.store, &self.user_id)
    }

    pub fn display_name(&self, user_id: &str) -> String {
        display_name_in(&self.store, user_id)
    }

    pub fn set_username_draft(&mut self, draft: &str) {
        self.ui.username_draft = draft.to_string();
    }

    pub fn submit_username(&mut self) -> bool {
        let submitted = claim_username(&mut self.store, &self.user_id, &self.ui.username_draft);
        if submitted {
            self.ui.username_draft.clear();
        }
        submitted
    }

    pub fn set_chat_draft(&mut self, draft: &str) {
        self.ui.chat_draft = draft.to_string();
    }

    pub fn send_chat(&mut self, now_ms: u64) -> Option<ChatMessage> {
        let sent = send_chat(&mut self.store, &self.user_id, &self.ui.chat_draft, now_ms);
        if sent.is_some() {
            self.ui.chat_draft.clear();
        }
        sent
    }

    pub fn toggle_chat(&mut self) -> bool {
        self.ui.chat_open = !self.ui.chat_open;
        self.ui.chat_open
    }

    pub fn chat(&self) -> ChatLog {
        chat_log(&self.store)
    }

    pub fn link_wallet(&mut self, address: &str) -> bool {
        link_wallet(&mut self.store, &self.user_id, address)
    }

    pub fn begin_mint(&mut self) -> Result<MintRequest, MintError> {
        let wallet = wallet_address(&self.store, &self.user_id);
        self.machine.begin_mint(wallet.as_deref())
    }

    pub fn finish_mint(&mut self, outcome: MintOutcome) {
        self.machine.finish_mint(outcome);
    }

    pub fn view(&self) -> GameView {
        self.machine.view(&self.store)
    }
}
