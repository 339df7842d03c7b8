//! # ALEMBIC
//!
//! Host side of the ALEMBIC idle alchemy game: everything that touches a
//! clock, a thread or a file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           ALEMBIC                                │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │   ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     │
//! │   │   TickLoop   │────>│ GameSession  │────>│   EventBus   │──> UI
//! │   │  (60 Hz max) │     │ Mutex<(      │     │  (bounded)   │     │
//! │   └──────────────┘     │  Workshop,   │     └──────────────┘     │
//! │          ^             │  SeededRng)> │                          │
//! │   commands ───────────>│              │<──> save files           │
//! │                        └──────────────┘     (crc32, atomic)      │
//! │                               │                                  │
//! │                     ┌─────────┴─────────┐                        │
//! │                     │  alembic_economy  │                        │
//! │                     │  (pure, no I/O)   │                        │
//! │                     └───────────────────┘                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`session`]: one lock per game state
//! - [`events`]: crossbeam channel to the presentation thread
//! - [`game_loop`]: fixed-timestep tick driver with pause and autosave
//! - [`persistence`]: versioned, checksummed save files

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod events;
pub mod game_loop;
pub mod persistence;
pub mod session;

pub use alembic_economy as economy;

pub use events::{EventBus, EventReceiver, EventSender, DEFAULT_EVENT_CAPACITY};
pub use game_loop::{
    AutosaveConfig, TickLoop, TickLoopConfig, TickStats, TickStatsAccumulator, AUTOSAVE_INTERVAL, MAX_TICK_HZ,
};
pub use persistence::{load_session, load_state, save_session, save_state, PersistenceError, PersistenceResult};
pub use session::{GameSession, SessionSnapshot, SessionState, TierSnapshot};
