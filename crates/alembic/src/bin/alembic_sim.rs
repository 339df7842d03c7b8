//! # ALEMBIC Headless Simulator
//!
//! Plays a session without a UI: ticks at 60 Hz, clicks, bottles tiers before
//! they spill, brews Bittersweet, and prints formatted snapshots.
//!
//! Run with: cargo run --release --bin alembic_sim -- [OPTIONS]
//!
//! ```text
//! --config PATH    balance sheet (default: built-in content)
//! --seconds N      simulated seconds (default 3600)
//! --seed N         generator seed (default 7)
//! --offline N      seconds credited as offline time before play
//! --report N       seconds between snapshots (default 600)
//! --load PATH      resume a save instead of starting fresh
//! --save PATH      write a save when done
//! --autosave N     also save to --save every N seconds of play (0 disables)
//! ```
//!
//! Log level follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use alembic::economy::{
    content, AlchemyEvent, CraftOutcome, CraftRequest, EconomyConfig, EconomyError, ScaledNumber, Tier,
};
use alembic::{
    load_session, save_session, AutosaveConfig, EventBus, GameSession, PersistenceError, TickLoop, TickLoopConfig,
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Seconds between clicks.
const CLICK_EVERY: u64 = 5;

/// Seconds between brewing attempts.
const BREW_EVERY: u64 = 30;

#[derive(Error, Debug)]
enum SimError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Economy(#[from] EconomyError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug)]
struct Options {
    config: Option<PathBuf>,
    seconds: u64,
    seed: u64,
    offline: f64,
    report_every: u64,
    load: Option<PathBuf>,
    save: Option<PathBuf>,
    autosave_every: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            seconds: 3600,
            seed: 7,
            offline: 0.0,
            report_every: 600,
            load: None,
            save: None,
            autosave_every: 0,
        }
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options, SimError> {
    fn value<T: std::str::FromStr>(flag: &str, raw: Option<String>) -> Result<T, SimError> {
        let raw = raw.ok_or_else(|| SimError::Usage(format!("{flag} needs a value")))?;
        raw.parse()
            .map_err(|_| SimError::Usage(format!("{flag}: cannot parse {raw:?}")))
    }

    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--config" => options.config = Some(value(&flag, args.next())?),
            "--seconds" => options.seconds = value(&flag, args.next())?,
            "--seed" => options.seed = value(&flag, args.next())?,
            "--offline" => options.offline = value(&flag, args.next())?,
            "--report" => options.report_every = value::<u64>(&flag, args.next())?.max(1),
            "--load" => options.load = Some(value(&flag, args.next())?),
            "--save" => options.save = Some(value(&flag, args.next())?),
            "--autosave" => options.autosave_every = value(&flag, args.next())?,
            other => return Err(SimError::Usage(format!("unknown argument {other:?}"))),
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match parse_args(std::env::args().skip(1)).and_then(|options| run(&options)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> Result<(), SimError> {
    let config = match &options.config {
        Some(path) => EconomyConfig::from_toml_file(path)?,
        None => EconomyConfig::default(),
    }
    .shared();

    let session = match &options.load {
        Some(path) => load_session(path, config)?,
        None => GameSession::new(config, options.seed)?,
    };
    if options.offline > 0.0 {
        let report = session.offline_catch_up(options.offline)?;
        println!(
            "Offline: {:.0}s credited in {} steps ({} overflows)",
            report.simulated_seconds, report.steps, report.overflows
        );
    }

    let bus = EventBus::default();
    let sender = bus.sender();
    let receiver = bus.receiver();
    let autosave = match (&options.save, options.autosave_every) {
        (Some(path), every) if every > 0 => Some(AutosaveConfig {
            path: path.clone(),
            every: Duration::from_secs(every),
        }),
        _ => None,
    };
    let mut tick_loop = TickLoop::new(TickLoopConfig {
        autosave,
        ..TickLoopConfig::default()
    });
    let mut brews = 0u32;
    let mut bottled = 0usize;
    let mut events_seen = 0usize;

    tracing::info!(seconds = options.seconds, seed = session.seed(), "simulation started");

    for second in 1..=options.seconds {
        tick_loop.advance(Duration::from_secs(1), &session, &sender)?;

        if second % CLICK_EVERY == 0 {
            session.click()?;
        }
        if second % BREW_EVERY == 0 && brew(&session)? {
            brews += 1;
        }
        bottled += bottle_full_tiers(&session)?;
        session.forward_events(&sender);

        for event in receiver.drain() {
            events_seen += 1;
            match &event {
                AlchemyEvent::Unlocked { id, unlock } => println!("[{second:>6}s] unlocked #{id}: {unlock:?}"),
                AlchemyEvent::LevelUp { level } => println!("[{second:>6}s] alchemist reached level {level}"),
                other => tracing::debug!(event = ?other, "event"),
            }
        }

        if second % options.report_every == 0 || second == options.seconds {
            println!("── t = {second}s ──");
            print!("{}", session.snapshot());
        }
    }

    tick_loop.stats().log_summary();
    println!(
        "Brews attempted: {brews}, batches bottled: {bottled}, events: {events_seen}, dropped: {}",
        sender.dropped()
    );

    if let Some(path) = &options.save {
        save_session(path, &session)?;
    }
    Ok(())
}

/// Bottles half of every tier that is at least 90 % full, before it spills.
fn bottle_full_tiers(session: &GameSession) -> Result<usize, SimError> {
    let mut bottled = 0;
    for tier in session.snapshot().tiers {
        if tier.amount >= tier.capacity.scale(0.9)? {
            session.distill(tier.tier, tier.amount.scale(0.5)?)?;
            bottled += 1;
        }
    }
    Ok(bottled)
}

/// Bottles six Smiles and four Sighs and brews Bittersweet.
///
/// Returns `false` when there was not enough stock to try.
fn brew(session: &GameSession) -> Result<bool, SimError> {
    let joy = ScaledNumber::from_count(6);
    let sadness = ScaledNumber::from_count(4);
    let stocked = session.with_workshop(|w| {
        w.ledger().tier(Tier::Smiles).amount() >= joy && w.ledger().tier(Tier::Sighs).amount() >= sadness
    });
    if !stocked {
        return Ok(false);
    }

    let inputs = vec![session.distill(Tier::Smiles, joy)?, session.distill(Tier::Sighs, sadness)?];
    let request = CraftRequest {
        recipe: content::BITTERSWEET,
        inputs,
        equipment: None,
    };
    match session.craft(&request) {
        Ok(report) => {
            if let CraftOutcome::Success { amount, purity, .. } = report.outcome {
                tracing::info!(amount = %amount, purity, "brewed Bittersweet");
            }
        }
        // damaged bench or similar: keep simulating
        Err(err) => tracing::warn!(%err, "brew skipped"),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_defaults() {
        let options = parse_args(Vec::new()).unwrap();
        assert_eq!(options.seconds, 3600);
        assert!(options.config.is_none());
    }

    #[test]
    fn test_parse_flags() {
        let options = parse_args(args(&["--seconds", "90", "--seed", "3", "--report", "0", "--save", "a.save"])).unwrap();
        assert_eq!(options.seconds, 90);
        assert_eq!(options.seed, 3);
        assert_eq!(options.report_every, 1);
        assert_eq!(options.save, Some(PathBuf::from("a.save")));
        assert_eq!(options.autosave_every, 0);

        let options = parse_args(args(&["--save", "a.save", "--autosave", "10"])).unwrap();
        assert_eq!(options.autosave_every, 10);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(args(&["--seconds"])).is_err());
        assert!(parse_args(args(&["--seconds", "soon"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
    }

    #[test]
    fn test_short_run() {
        let options = Options {
            seconds: 120,
            report_every: 60,
            ..Options::default()
        };
        run(&options).unwrap();
    }
}
