//! # Save Files
//!
//! **Crash-safe, checksummed game saves.**
//!
//! A save is written to a temporary file next to the target, synced, then
//! renamed over it: a crash mid-write leaves the previous save intact.
//!
//! ## Guarantees
//!
//! 1. **Atomic**: readers see the old save or the new one, never a mix
//! 2. **Checked**: a body that does not match its checksum is rejected
//! 3. **Versioned**: saves from an unknown format version are refused
//!
//! ## Format
//!
//! ```text
//! ALEMBIC-SAVE v1 crc32=1a2b3c4d\n     header line
//! [rng]                                TOML body: SessionState
//! seed = "42"
//! draws = 17
//! [workshop]
//! ...
//! ```
//!
//! The CRC32 covers every byte after the header line.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alembic_economy::{EconomyConfig, EconomyError};
use thiserror::Error;

use crate::session::{GameSession, SessionState};

/// First token of every save file.
pub const SAVE_MAGIC: &str = "ALEMBIC-SAVE";

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

/// Errors reading or writing save files.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Filesystem failure.
    #[error("save file I/O on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// State could not be written as TOML.
    #[error("failed to encode save: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Body is not a valid TOML session record.
    #[error("failed to decode save: {0}")]
    Decode(#[from] toml::de::Error),

    /// Header line missing or malformed.
    #[error("bad save header: {0}")]
    BadHeader(String),

    /// Save written by a format this build does not read.
    #[error("unsupported save version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the file.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// Body does not match the header checksum.
    #[error("save checksum mismatch: header {expected:08x}, body {actual:08x}")]
    ChecksumMismatch {
        /// Checksum in the header.
        expected: u32,
        /// Checksum of the body as read.
        actual: u32,
    },

    /// Decoded state does not fit the loaded config.
    #[error("saved state rejected: {0}")]
    State(#[from] EconomyError),
}

/// Result type for save file operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

// ============================================================================
// Encoding
// ============================================================================

/// Renders a session record as save file text.
///
/// # Errors
///
/// Returns `Encode` if the record cannot be written as TOML.
pub fn encode(state: &SessionState) -> PersistenceResult<String> {
    let body = toml::to_string(state)?;
    let crc = crc32fast::hash(body.as_bytes());
    Ok(format!("{SAVE_MAGIC} v{SAVE_VERSION} crc32={crc:08x}\n{body}"))
}

/// Parses save file text, verifying header and checksum.
///
/// # Errors
///
/// `BadHeader`, `UnsupportedVersion`, `ChecksumMismatch` or `Decode`.
pub fn decode(text: &str) -> PersistenceResult<SessionState> {
    let (header, body) = text
        .split_once('\n')
        .ok_or_else(|| PersistenceError::BadHeader("no header line".to_string()))?;
    let expected = parse_header(header)?;

    let actual = crc32fast::hash(body.as_bytes());
    if actual != expected {
        return Err(PersistenceError::ChecksumMismatch { expected, actual });
    }
    Ok(toml::from_str(body)?)
}

fn parse_header(header: &str) -> PersistenceResult<u32> {
    let mut fields = header.split_whitespace();
    if fields.next() != Some(SAVE_MAGIC) {
        return Err(PersistenceError::BadHeader(format!("not an ALEMBIC save: {header:?}")));
    }

    let version = fields
        .next()
        .and_then(|v| v.strip_prefix('v'))
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| PersistenceError::BadHeader(format!("missing version: {header:?}")))?;
    if version != SAVE_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: version,
            expected: SAVE_VERSION,
        });
    }

    fields
        .next()
        .and_then(|c| c.strip_prefix("crc32="))
        .and_then(|c| u32::from_str_radix(c, 16).ok())
        .ok_or_else(|| PersistenceError::BadHeader(format!("missing checksum: {header:?}")))
}

// ============================================================================
// Files
// ============================================================================

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes a session record to `path` atomically.
///
/// # Errors
///
/// `Encode` or `Io`. On error the previous file at `path` is untouched.
pub fn save_state(path: impl AsRef<Path>, state: &SessionState) -> PersistenceResult<()> {
    let path = path.as_ref();
    let text = encode(state)?;
    let temp = temp_path(path);

    {
        let mut file = File::create(&temp).map_err(io_error(&temp))?;
        file.write_all(text.as_bytes()).map_err(io_error(&temp))?;
        file.sync_all().map_err(io_error(&temp))?;
    }
    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(io_error(path)(err));
    }

    tracing::info!(path = %path.display(), bytes = text.len(), "game saved");
    Ok(())
}

/// Reads and verifies a session record from `path`.
///
/// # Errors
///
/// `Io` or any [`decode`] error.
pub fn load_state(path: impl AsRef<Path>) -> PersistenceResult<SessionState> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    let state = decode(&text)?;
    tracing::info!(path = %path.display(), xp = state.workshop.xp, "game loaded");
    Ok(state)
}

/// Saves a running session.
///
/// # Errors
///
/// See [`save_state`].
pub fn save_session(path: impl AsRef<Path>, session: &GameSession) -> PersistenceResult<()> {
    save_state(path, &session.to_state())
}

/// Loads a save and resumes it against `config`.
///
/// # Errors
///
/// Any [`load_state`] error, or `State` if the save does not fit the config.
pub fn load_session(path: impl AsRef<Path>, config: Arc<EconomyConfig>) -> PersistenceResult<GameSession> {
    let state = load_state(path)?;
    Ok(GameSession::from_state(config, &state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_economy::Tier;

    fn temp_save_path(tag: &str) -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("alembic_{tag}_{id}.save"))
    }

    fn played_session() -> GameSession {
        let session = GameSession::new(EconomyConfig::default().shared(), 9).unwrap();
        session.tick(40.0).unwrap();
        session.click().unwrap();
        session.distill(Tier::Smiles, alembic_economy::ScaledNumber::from_count(5)).unwrap();
        session
    }

    #[test]
    fn test_encode_decode() {
        let state = played_session().to_state();
        let text = encode(&state).unwrap();
        assert!(text.starts_with("ALEMBIC-SAVE v1 crc32="));
        assert_eq!(decode(&text).unwrap(), state);
    }

    #[test]
    fn test_corrupted_body_is_rejected() {
        let text = encode(&played_session().to_state()).unwrap();
        let corrupted = text.replacen("xp = 0", "xp = 9", 1);
        assert_ne!(corrupted, text);
        assert!(matches!(decode(&corrupted), Err(PersistenceError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_header_checks() {
        assert!(matches!(decode("no newline"), Err(PersistenceError::BadHeader(_))));
        assert!(matches!(decode("SOMETHING v1 crc32=0\nx = 1"), Err(PersistenceError::BadHeader(_))));
        assert!(matches!(
            decode("ALEMBIC-SAVE v7 crc32=00000000\n"),
            Err(PersistenceError::UnsupportedVersion { found: 7, expected: 1 })
        ));
        assert!(matches!(decode("ALEMBIC-SAVE v1\n"), Err(PersistenceError::BadHeader(_))));
    }

    #[test]
    fn test_matching_checksum_but_bad_body() {
        let body = "not = [valid";
        let text = format!("ALEMBIC-SAVE v1 crc32={:08x}\n{body}", crc32fast::hash(body.as_bytes()));
        assert!(matches!(decode(&text), Err(PersistenceError::Decode(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = temp_save_path("roundtrip");
        let session = played_session();

        save_session(&path, &session).unwrap();
        assert!(!temp_path(&path).exists());
        let loaded = load_session(&path, Arc::clone(session.config())).unwrap();
        assert_eq!(loaded.to_state(), session.to_state());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_replaces_previous() {
        let path = temp_save_path("replace");
        let session = played_session();
        save_session(&path, &session).unwrap();
        session.tick(5.0).unwrap();
        save_session(&path, &session).unwrap();

        assert_eq!(load_state(&path).unwrap(), session.to_state());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_state(temp_save_path("missing")).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
        assert!(err.to_string().contains("alembic_missing_"));
    }
}
