use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use monad_tiles_core::store::{GAME_TIMER, TILES};
use monad_tiles_core::{
    GameClient, GameConfig, GridLayout, MintAdapter, MintCallback, MintOutcome, MintRequest,
    RewardTier, TileKey, TileState,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::session::{run_client, ClientEvent, ClientInput, ClientReport, SessionStore};

/// Bots abandon a round that is less than half done with this little time left.
const GIVE_UP_SECS: u32 = 3;
const CHAT_LINES: &[&str] = &["gm", "lfg", "nearly there", "who has the D?", "nice"];

#[derive(clap::Subcommand)]
pub(super) enum SimCommand {
    /// Play rounds with seeded bots for a fixed duration, then print a summary.
    Run {
        #[arg(long, default_value_t = 3)]
        players: usize,
        #[arg(long, default_value_t = 1)]
        nameless: usize,
        #[arg(long, default_value_t = 60)]
        duration_secs: u64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 40)]
        think_min_ms: u64,
        #[arg(long, default_value_t = 220)]
        think_max_ms: u64,
        #[arg(long, default_value_t = 0.05)]
        conflict_rate: f32,
        #[arg(long, default_value_t = 0.02)]
        chat_rate: f32,
        #[arg(long, default_value_t = 0.25)]
        mint_failure_rate: f32,
        #[arg(long)]
        no_mint: bool,
        #[arg(long, env = "MONAD_TILES_ROUND_SECS")]
        round_secs: Option<u32>,
        #[arg(long, env = "MONAD_TILES_CONFIG")]
        config: Option<PathBuf>,
        #[arg(long)]
        events_out: Option<PathBuf>,
    },
}

pub(super) async fn run(command: SimCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        SimCommand::Run {
            players,
            nameless,
            duration_secs,
            seed,
            think_min_ms,
            think_max_ms,
            conflict_rate,
            chat_rate,
            mint_failure_rate,
            no_mint,
            round_secs,
            config,
            events_out,
        } => {
            let settings = SimSettings {
                players,
                nameless,
                duration_secs,
                think_min_ms,
                think_max_ms,
                conflict_rate,
                chat_rate,
                mint_failure_rate,
                mint: !no_mint,
            };
            validate_settings(settings)?;
            let config = load_config(config.as_deref(), round_secs)?;
            let seed = seed.unwrap_or_else(|| rand::rng().random());
            eprintln!(
                "sim: players={} nameless={} duration={}s round={}s seed={seed}",
                settings.players, settings.nameless, settings.duration_secs, config.round_secs
            );
            let reports = run_sim(settings, config, seed, events_out.as_deref()).await?;
            print_summary(&reports);
            Ok(())
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SimSettings {
    players: usize,
    nameless: usize,
    duration_secs: u64,
    think_min_ms: u64,
    think_max_ms: u64,
    conflict_rate: f32,
    chat_rate: f32,
    mint_failure_rate: f32,
    mint: bool,
}

#[derive(Serialize)]
struct EventRow<'a> {
    id: u64,
    ts_ms: u64,
    #[serde(flatten)]
    event: &'a ClientEvent,
}

/// What every bot shares: the session it plays in and when to stop.
#[derive(Clone)]
struct BotTable {
    store: SessionStore,
    layout: &'static GridLayout,
    round_secs: u32,
    deadline: Instant,
}

struct BotIdentity {
    username: String,
    wallet: String,
}

fn err_msg(message: &str) -> Box<dyn std::error::Error> {
    message.into()
}

fn validate_settings(settings: SimSettings) -> Result<(), Box<dyn std::error::Error>> {
    if settings.players == 0 {
        return Err(err_msg("at least one player is required"));
    }
    if settings.nameless > settings.players {
        return Err(err_msg("nameless players cannot outnumber players"));
    }
    if settings.duration_secs == 0 {
        return Err(err_msg("duration must be positive"));
    }
    if settings.think_min_ms == 0 || settings.think_max_ms < settings.think_min_ms {
        return Err(err_msg("invalid think-time range"));
    }
    if !(0.0..=1.0).contains(&settings.conflict_rate) {
        return Err(err_msg("conflict-rate must be between 0 and 1"));
    }
    if !(0.0..=1.0).contains(&settings.chat_rate) {
        return Err(err_msg("chat-rate must be between 0 and 1"));
    }
    if !(0.0..=1.0).contains(&settings.mint_failure_rate) {
        return Err(err_msg("mint-failure-rate must be between 0 and 1"));
    }
    Ok(())
}

/// Reads the optional TOML file, then applies flag overrides on top.
fn load_config(
    path: Option<&Path>,
    round_secs: Option<u32>,
) -> Result<GameConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str::<GameConfig>(&raw)?
        }
        None => GameConfig::default(),
    };
    if let Some(round_secs) = round_secs {
        config.round_secs = round_secs;
    }
    config.validate()?;
    Ok(config)
}

async fn run_sim(
    settings: SimSettings,
    config: GameConfig,
    seed: u64,
    events_out: Option<&Path>,
) -> Result<Vec<ClientReport>, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let store = SessionStore::new();
    let layout = GridLayout::standard();
    let started = Instant::now();
    let deadline = started + Duration::from_secs(settings.duration_secs);

    let table = BotTable {
        store: store.clone(),
        layout,
        round_secs: config.round_secs,
        deadline,
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut clients = Vec::with_capacity(settings.players);
    let mut bots = Vec::with_capacity(settings.players);
    for index in 0..settings.players {
        let user_id = format!("conn-{index:02}-{:04x}", rng.random::<u16>());
        // The first `nameless` players never claim a name and only watch.
        let identity = (index >= settings.nameless).then(|| BotIdentity {
            username: format!("tiler-{index}"),
            wallet: random_hex(&mut rng, 20),
        });
        let mint: Option<Box<dyn MintAdapter + Send>> = if settings.mint && identity.is_some() {
            Some(Box::new(SimulatedMint::new(
                StdRng::seed_from_u64(rng.random()),
                settings.mint_failure_rate,
            )))
        } else {
            None
        };

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let client = GameClient::new(user_id, store.clone(), config);
        clients.push(tokio::spawn(run_client(client, input_rx, events_tx.clone(), mint)));
        bots.push(tokio::spawn(run_bot(
            table.clone(),
            input_tx,
            StdRng::seed_from_u64(rng.random()),
            identity,
            settings,
        )));
    }
    drop(events_tx);

    let mut writer = match events_out {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };
    let mut next_id = 1u64;
    while let Some(event) = events_rx.recv().await {
        tracing::debug!(?event, "client event");
        if let Some(writer) = writer.as_mut() {
            let row = EventRow {
                id: next_id,
                ts_ms: started.elapsed().as_millis() as u64,
                event: &event,
            };
            writeln!(writer, "{}", serde_json::to_string(&row)?)?;
        }
        next_id += 1;
    }
    if let Some(mut writer) = writer {
        writer.flush()?;
    }

    for bot in bots {
        bot.await?;
    }
    let mut reports = Vec::with_capacity(clients.len());
    for client in clients {
        reports.push(client.await?);
    }
    tracing::info!(events = next_id - 1, "sim finished");
    Ok(reports)
}

async fn run_bot(
    table: BotTable,
    inputs: mpsc::UnboundedSender<ClientInput>,
    mut rng: StdRng,
    identity: Option<BotIdentity>,
    settings: SimSettings,
) {
    let BotTable {
        store,
        layout,
        round_secs,
        deadline,
    } = table;
    if let Some(identity) = identity {
        let _ = inputs.send(ClientInput::ClaimUsername(identity.username));
        let _ = inputs.send(ClientInput::LinkWallet(identity.wallet));
    }
    let keys: Vec<TileKey> = layout.active_keys().collect();
    loop {
        let think_ms = sample_low_biased_u64(&mut rng, settings.think_min_ms, settings.think_max_ms);
        tokio::time::sleep(Duration::from_millis(think_ms)).await;
        if Instant::now() >= deadline {
            break;
        }
        let tiles = TILES.read_or_default(&store);
        let remaining = GAME_TIMER.read_or_else(&store, || round_secs);
        let flipped = tiles.flipped_active_count(layout);
        let total = layout.total_active_tiles();
        let batch = if flipped == total {
            // Board is done: retry a failed mint, then close the notice.
            vec![ClientInput::Mint, ClientInput::DismissNotice]
        } else if remaining <= GIVE_UP_SECS && flipped * 2 < total {
            vec![ClientInput::ClickBackground]
        } else if rng.random::<f32>() < settings.chat_rate {
            let line = CHAT_LINES[rng.random_range(0..CHAT_LINES.len())];
            vec![ClientInput::Chat(line.to_string())]
        } else {
            vec![ClientInput::ClickTile(choose_tile(
                &keys,
                &tiles,
                settings.conflict_rate,
                &mut rng,
            ))]
        };
        for input in batch {
            if inputs.send(input).is_err() {
                return;
            }
        }
    }
}

/// Picks an unflipped tile, or any tile with probability `conflict_rate`.
/// `keys` must not be empty.
fn choose_tile(keys: &[TileKey], tiles: &TileState, conflict_rate: f32, rng: &mut StdRng) -> TileKey {
    let unflipped: Vec<TileKey> = keys
        .iter()
        .copied()
        .filter(|key| !tiles.is_flipped(key))
        .collect();
    if unflipped.is_empty() || rng.random::<f32>() < conflict_rate {
        return keys[rng.random_range(0..keys.len())];
    }
    unflipped[rng.random_range(0..unflipped.len())]
}

fn sample_low_biased_u64(rng: &mut StdRng, min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    let span = (max - min) as f32;
    let u = rng.random::<f32>();
    let shaped = u.powf(1.9);
    min.saturating_add((span * shaped).round() as u64)
}

fn random_hex(rng: &mut StdRng, bytes: usize) -> String {
    let mut out = String::with_capacity(2 + bytes * 2);
    out.push_str("0x");
    for _ in 0..bytes {
        out.push_str(&format!("{:02x}", rng.random::<u8>()));
    }
    out
}

/// Pretends to submit the mint transaction: waits a little, then reports a
/// hash or a revert.
struct SimulatedMint {
    rng: StdRng,
    failure_rate: f32,
}

impl SimulatedMint {
    const LATENCY_MS: (u64, u64) = (300, 1_500);

    fn new(rng: StdRng, failure_rate: f32) -> Self {
        Self { rng, failure_rate }
    }
}

impl MintAdapter for SimulatedMint {
    fn mint(&mut self, request: MintRequest, on_done: MintCallback) {
        let (lo, hi) = Self::LATENCY_MS;
        let delay_ms = self.rng.random_range(lo..=hi);
        let outcome = if self.rng.random::<f32>() < self.failure_rate {
            MintOutcome::Failed {
                message: "execution reverted".to_string(),
            }
        } else {
            MintOutcome::Minted {
                tx_hash: random_hex(&mut self.rng, 32),
            }
        };
        tracing::debug!(
            recipient = %request.recipient,
            tier = request.level(),
            delay_ms,
            "submitting mint"
        );
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            on_done(outcome);
        });
    }
}

fn print_summary(reports: &[ClientReport]) {
    println!(
        "{:<20} {:<14} {:>9} {:>9} {:>6} {:>6} {:>7} {:>6} {:>5}",
        "player", "id", "victories", "lightning", "swift", "clutch", "minted", "failed", "chat"
    );
    for report in reports {
        let count = |tier: RewardTier| report.victories.iter().filter(|won| **won == tier).count();
        println!(
            "{:<20} {:<14} {:>9} {:>9} {:>6} {:>6} {:>7} {:>6} {:>5}",
            report.display_name,
            report.user_id,
            report.victories.len(),
            count(RewardTier::Lightning),
            count(RewardTier::Swift),
            count(RewardTier::Clutch),
            report.minted,
            report.mint_failures,
            report.chat_seen
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SimSettings {
        SimSettings {
            players: 3,
            nameless: 1,
            duration_secs: 20,
            think_min_ms: 40,
            think_max_ms: 220,
            conflict_rate: 0.05,
            chat_rate: 0.02,
            mint_failure_rate: 0.25,
            mint: true,
        }
    }

    #[test]
    fn choose_tile_prefers_unflipped() {
        let keys: Vec<TileKey> = GridLayout::standard().active_keys().collect();
        let mut tiles = TileState::default();
        for key in &keys[1..] {
            tiles.set(*key, true);
        }
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            assert_eq!(choose_tile(&keys, &tiles, 0.0, &mut rng), keys[0]);
        }
    }

    #[test]
    fn choose_tile_falls_back_when_board_is_full() {
        let keys: Vec<TileKey> = GridLayout::standard().active_keys().collect();
        let mut tiles = TileState::default();
        for key in &keys {
            tiles.set(*key, true);
        }
        let mut rng = StdRng::seed_from_u64(7);
        let picked = choose_tile(&keys, &tiles, 0.0, &mut rng);
        assert!(keys.contains(&picked));
    }

    #[test]
    fn low_biased_samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let value = sample_low_biased_u64(&mut rng, 40, 220);
            assert!((40..=220).contains(&value));
        }
        assert_eq!(sample_low_biased_u64(&mut rng, 50, 10), 50);
    }

    #[test]
    fn random_hex_has_expected_width() {
        let mut rng = StdRng::seed_from_u64(3);
        let address = random_hex(&mut rng, 20);
        assert_eq!(address.len(), 42);
        assert!(address.starts_with("0x"));
        assert!(address[2..].chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn settings_are_validated() {
        assert!(validate_settings(settings()).is_ok());
        assert!(validate_settings(SimSettings { nameless: 4, ..settings() }).is_err());
        assert!(validate_settings(SimSettings { players: 0, nameless: 0, ..settings() }).is_err());
        assert!(validate_settings(SimSettings { think_min_ms: 300, ..settings() }).is_err());
        assert!(validate_settings(SimSettings { mint_failure_rate: 1.5, ..settings() }).is_err());
    }

    #[test]
    fn config_file_is_layered_under_flags() {
        let path = std::env::temp_dir().join(format!("monad-tiles-config-{}.toml", std::process::id()));
        std::fs::write(&path, "round_secs = 45\ntick_ms = 500\n").expect("write temp config");

        let config = load_config(Some(&path), None).expect("config loads");
        assert_eq!(config.round_secs, 45);
        assert_eq!(config.tick_ms, 500);
        assert_eq!(config.victory_reset_ms, GameConfig::default().victory_reset_ms);

        let config = load_config(Some(&path), Some(20)).expect("config loads");
        assert_eq!(config.round_secs, 20);

        assert!(load_config(None, Some(0)).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_session_reaches_victory_everywhere() {
        let path = std::env::temp_dir().join(format!("monad-tiles-events-{}.ndjson", std::process::id()));
        // Every client decrements the shared timer, so give the round headroom.
        let config = GameConfig {
            round_secs: 120,
            ..GameConfig::default()
        };
        let reports = run_sim(settings(), config, 11, Some(&path))
            .await
            .expect("sim runs");

        assert_eq!(reports.len(), 3);
        for report in &reports {
            assert!(!report.victories.is_empty(), "{} saw no victory", report.user_id);
        }
        assert!(reports[0].display_name.starts_with("User conn-0"));
        assert_eq!(reports[0].minted + reports[0].mint_failures, 0);
        assert_eq!(reports[1].display_name, "tiler-1");

        let log = std::fs::read_to_string(&path).expect("events written");
        let first: serde_json::Value =
            serde_json::from_str(log.lines().next().expect("at least one event")).expect("json row");
        assert_eq!(first["id"], 1);
        assert!(first["kind"].is_string());
        let _ = std::fs::remove_file(&path);
    }
}
