//! Integration tests for the host crate: sessions, the tick loop and save files.
//!
//! Run with: cargo test --package alembic --test host_scenarios

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alembic::economy::{content, CraftRequest, EconomyConfig, ScaledNumber, Tier};
use alembic::{
    load_session, save_session, AutosaveConfig, EventBus, GameSession, PersistenceError, TickLoop, TickLoopConfig,
};

// ============================================================================
// Fixtures
// ============================================================================

fn temp_save_path(tag: &str) -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("alembic_host_{tag}_{id}.save"))
}

/// Runs `seconds` of 60 Hz play through a tick loop.
fn play(session: &GameSession, seconds: u64) {
    let bus = EventBus::default();
    let mut tick_loop = TickLoop::new(TickLoopConfig::default());
    for _ in 0..seconds {
        tick_loop.advance(Duration::from_secs(1), session, &bus.sender()).unwrap();
    }
}

/// Bottles ingredients and brews Bittersweet `times` times.
fn brew(session: &GameSession, times: usize) {
    for _ in 0..times {
        let joy = session.distill(Tier::Smiles, ScaledNumber::from_count(6)).unwrap();
        let sadness = session.distill(Tier::Sighs, ScaledNumber::from_count(4)).unwrap();
        let request = CraftRequest {
            recipe: content::BITTERSWEET,
            inputs: vec![joy, sadness],
            equipment: None,
        };
        session.craft(&request).unwrap();
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_resumed_save_plays_identically() {
    let config = EconomyConfig::default().shared();
    let original = GameSession::new(Arc::clone(&config), 2024).unwrap();
    play(&original, 300);
    brew(&original, 3);

    let path = temp_save_path("resume");
    save_session(&path, &original).unwrap();
    let resumed = load_session(&path, Arc::clone(&config)).unwrap();
    assert_eq!(resumed.to_state(), original.to_state());

    for session in [&original, &resumed] {
        play(session, 60);
        brew(session, 2);
    }
    assert_eq!(resumed.to_state(), original.to_state());
    assert_eq!(original.to_state().rng.draws, resumed.to_state().rng.draws);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_tampered_save_file_is_rejected() {
    let session = GameSession::new(EconomyConfig::default().shared(), 5).unwrap();
    play(&session, 30);
    let path = temp_save_path("tamper");
    save_session(&path, &session).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let (header, body) = text.split_once('\n').unwrap();
    let tampered = format!("{header}\n{}", body.replacen("xp = 0", "xp = 1000000", 1));
    fs::write(&path, tampered).unwrap();

    let err = load_session(&path, Arc::clone(session.config())).unwrap_err();
    assert!(matches!(err, PersistenceError::ChecksumMismatch { .. }), "{err}");
    let _ = fs::remove_file(&path);
}

#[test]
fn test_save_from_other_content_is_rejected() {
    let session = GameSession::new(EconomyConfig::default().shared(), 5).unwrap();
    // 120 Smiles fires the "Distill" unlock
    session.tick(120.0).unwrap();
    let path = temp_save_path("content");
    save_session(&path, &session).unwrap();

    let mut bare = EconomyConfig::default();
    bare.unlocks.clear();
    let err = load_session(&path, bare.shared()).unwrap_err();
    assert!(matches!(err, PersistenceError::State(_)), "{err}");
    let _ = fs::remove_file(&path);
}

#[test]
fn test_offline_window_is_capped() {
    let session = GameSession::new(EconomyConfig::default().shared(), 1).unwrap();
    let report = session.offline_catch_up(3.0 * 24.0 * 3600.0).unwrap();
    assert_eq!(report.simulated_seconds, 8.0 * 3600.0);
    for tier in session.snapshot().tiers {
        assert!(tier.amount <= tier.capacity);
    }
}

#[test]
fn test_reset_discards_progress() {
    let session = GameSession::new(EconomyConfig::default().shared(), 3).unwrap();
    play(&session, 120);
    brew(&session, 1);
    session.reset().unwrap();

    let snapshot = session.snapshot();
    assert!(snapshot.tier(Tier::Smiles).unwrap().amount.is_zero());
    assert_eq!(snapshot.crafted, 0);
    assert_eq!(snapshot.xp, 0);
}

#[test]
fn test_pause_stops_production_without_backlog() {
    let session = GameSession::new(EconomyConfig::default().shared(), 8).unwrap();
    let bus = EventBus::default();
    let mut tick_loop = TickLoop::new(TickLoopConfig::default());
    tick_loop.advance(Duration::from_secs(10), &session, &bus.sender()).unwrap();
    let before = session.to_state();

    tick_loop.pause();
    for _ in 0..120 {
        assert_eq!(tick_loop.advance(Duration::from_secs(1), &session, &bus.sender()).unwrap(), 0);
    }
    assert_eq!(session.to_state(), before);

    // resuming picks up from the pause, not from two minutes of backlog
    tick_loop.resume();
    let ran = tick_loop.advance(Duration::from_secs(1), &session, &bus.sender()).unwrap();
    assert_eq!(ran, 60);
    assert_eq!(tick_loop.caught_up(), Duration::ZERO);
    let smiles = session.with_workshop(|w| w.ledger().tier(Tier::Smiles).lifetime().to_f64());
    assert!((smiles - 11.0).abs() < 1e-3, "{smiles}");
}

#[test]
fn test_autosave_writes_every_interval() {
    let config = EconomyConfig::default().shared();
    let session = GameSession::new(Arc::clone(&config), 12).unwrap();
    let bus = EventBus::default();
    let path = temp_save_path("autosave");
    let mut tick_loop = TickLoop::new(TickLoopConfig {
        autosave: Some(AutosaveConfig::new(&path)),
        ..TickLoopConfig::default()
    });

    for _ in 0..9 {
        tick_loop.advance(Duration::from_secs(1), &session, &bus.sender()).unwrap();
    }
    assert_eq!(tick_loop.autosaves(), 0);
    assert!(!path.exists());

    tick_loop.advance(Duration::from_secs(1), &session, &bus.sender()).unwrap();
    assert_eq!(tick_loop.autosaves(), 1);
    let saved = load_session(&path, Arc::clone(&config)).unwrap();
    assert_eq!(saved.to_state(), session.to_state());

    // paused time does not bring the next save closer
    tick_loop.pause();
    tick_loop.advance(Duration::from_secs(30), &session, &bus.sender()).unwrap();
    tick_loop.resume();
    for _ in 0..9 {
        tick_loop.advance(Duration::from_secs(1), &session, &bus.sender()).unwrap();
    }
    assert_eq!(tick_loop.autosaves(), 1);
    tick_loop.advance(Duration::from_secs(1), &session, &bus.sender()).unwrap();
    assert_eq!(tick_loop.autosaves(), 2);

    let _ = fs::remove_file(&path);
}
