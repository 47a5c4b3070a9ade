//! Arcade Portal Game Host
//!
//! `arcade-server [CONFIG.toml]` serves games over WebSocket.
//! `arcade-server demo` plays a scripted headless Breakout session and
//! checks that it replays identically from its seed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use arcade::{
    VERSION,
    game::{GameEventData, InputEvent, Phase, Session},
    games::breakout::{Ball, Breakout, PADDLE_Y},
    network::GameServer,
    portal::{MemStorage, PortalConfig, ProfileContext},
};

const DEMO_SEED: u64 = 0x00c0_ffee;
const DEMO_MAX_TICKS: u32 = 20_000;

#[tokio::main]
async fn main() -> Result<()> {
    let arg = std::env::args().nth(1);
    let demo = arg.as_deref() == Some("demo");
    let config_path = arg.filter(|_| !demo).map(PathBuf::from);

    let config = PortalConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_tracing(&config.log_filter)?;

    info!("Arcade Portal v{}", VERSION);

    if demo {
        return demo_session();
    }

    let profile = ProfileContext::load(&config.profile_path)?;
    match profile.profile() {
        Some(p) => info!(email = %p.email, avatar = p.avatar, "Cached profile loaded"),
        None => info!(path = %profile.path().display(), "No cached profile"),
    }

    let store = Arc::new(MemStorage::new());
    let server = Arc::new(GameServer::new(config.server_config(), store).with_profile(profile));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_server.shutdown();
        }
    });

    server.run().await?;
    info!("Game host stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("parsing log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!(e))
}

/// Demo: play Breakout with a paddle autopilot, then replay it.
fn demo_session() -> Result<()> {
    info!("=== Starting Demo Session ===");
    info!("RNG Seed: {}", hex::encode(DEMO_SEED.to_le_bytes()));

    let first = play_breakout(DEMO_SEED)?;
    info!(
        phase = %first.phase,
        score = first.score,
        ticks = first.ticks,
        "Demo finished"
    );

    info!("=== Verifying Determinism ===");
    let replay = play_breakout(DEMO_SEED)?;
    if replay == first {
        info!("DETERMINISM VERIFIED: replay matches");
        Ok(())
    } else {
        Err(anyhow!("replay diverged: {:?} vs {:?}", first, replay))
    }
}

#[derive(Debug, PartialEq)]
struct DemoResult {
    phase: Phase,
    score: u32,
    ticks: u32,
}

fn play_breakout(seed: u64) -> Result<DemoResult> {
    let mut session = Session::with_seed(Uuid::new_v4(), Breakout::new(), seed);
    session.start()?;

    while !session.phase().is_terminal() && session.current_tick() < DEMO_MAX_TICKS {
        let tick = session.current_tick();

        // Aim off-centre so the ball picks up spin
        if let Ball::InPlay { pos, .. } = session.game().ball() {
            let offset = ((tick / 200) % 5) as f32 * 15.0 - 30.0;
            session.handle_input(&InputEvent::PointerMove { x: pos.x + offset, y: PADDLE_Y });
        }

        let result = session.tick()?;
        for event in &result.events {
            match &event.data {
                GameEventData::LifeLost { lives_remaining } => {
                    info!("Tick {}: ball lost, {} lives left", event.tick, lives_remaining);
                }
                GameEventData::ScoreChanged { score } => {
                    debug!("Tick {}: score {}", event.tick, score);
                }
                _ => {}
            }
        }

        if tick > 0 && tick % 600 == 0 {
            info!(
                "Tick {}: score {}, {} blocks left",
                tick,
                session.score(),
                session.game().remaining_blocks()
            );
        }
    }

    Ok(DemoResult {
        phase: session.phase(),
        score: session.score(),
        ticks: session.current_tick(),
    })
}
