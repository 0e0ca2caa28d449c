//! Save/load of the resumable session
//!
//! The save is a flat JSON object:
//! `{rows, pattern, risk, bet, ballColor, balance, streak, leaderboard[]}`.
//! Loading is tolerant: every field falls back to its default on its own
//! when it is missing or unusable, so one bad value never costs the player
//! the rest of their save.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::consts::{MAX_ROWS, MIN_BET, MIN_ROWS};
use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::session::Session;
use crate::settings::Settings;
use crate::sim::{Pattern, RiskProfile};

/// Storage key of the session save
pub const SAVE_KEY: &str = "plinko.save.v2";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key/value string storage
pub trait Store {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// In-memory store (tests, headless runs)
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
}

impl Store for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileStore {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> std::path::PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Store for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves half a save behind
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, self.path(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Browser LocalStorage
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStore;

#[cfg(target_arch = "wasm32")]
impl LocalStore {
    fn storage() -> Result<web_sys::Storage, PersistenceError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| PersistenceError::Unavailable("no localStorage".into()))
    }
}

#[cfg(target_arch = "wasm32")]
impl Store for LocalStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| PersistenceError::Unavailable(format!("{e:?}")))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| PersistenceError::Unavailable(format!("{e:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| PersistenceError::Unavailable(format!("{e:?}")))
    }
}

/// On-disk shape of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub rows: u32,
    pub pattern: Pattern,
    pub risk: RiskProfile,
    pub bet: f64,
    pub ball_color: String,
    pub balance: f64,
    pub streak: u32,
    pub leaderboard: Leaderboard,
}

impl From<&Session> for SavedSession {
    fn from(session: &Session) -> Self {
        Self {
            rows: session.rows,
            pattern: session.pattern,
            risk: session.risk,
            bet: session.bet,
            ball_color: session.ball_color.clone(),
            balance: session.balance,
            streak: session.streak,
            leaderboard: session.leaderboard.clone(),
        }
    }
}

impl SavedSession {
    /// Rebuild a session from arbitrary JSON, field by field
    pub fn restore(json: &str, settings: &Settings) -> Session {
        let mut session = Session::new(settings);
        let value: Value = match serde_json::from_str(json) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                log::warn!("Save is not an object, starting fresh");
                return session;
            }
            Err(e) => {
                log::warn!("Unreadable save, starting fresh: {e}");
                return session;
            }
        };

        if let Some(rows) = value.get("rows").and_then(Value::as_f64).filter(|r| r.is_finite()) {
            session.rows = (rows.round() as i64).clamp(MIN_ROWS as i64, MAX_ROWS as i64) as u32;
        }
        if let Some(pattern) = value.get("pattern").and_then(Value::as_str).and_then(Pattern::from_name) {
            session.pattern = pattern;
        }
        if let Some(risk) = value.get("risk").and_then(Value::as_str).and_then(RiskProfile::from_name) {
            session.risk = risk;
        }
        if let Some(bet) = value
            .get("bet")
            .and_then(Value::as_f64)
            .filter(|b| b.is_finite() && *b > 0.0)
        {
            session.bet = bet.max(MIN_BET);
        }
        if let Some(color) = value
            .get("ballColor")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
        {
            session.ball_color = color.to_string();
        }
        if let Some(balance) = value
            .get("balance")
            .and_then(Value::as_f64)
            .filter(|b| b.is_finite() && *b >= 0.0)
        {
            session.balance = balance;
        }
        if let Some(streak) = value
            .get("streak")
            .and_then(Value::as_f64)
            .filter(|s| s.is_finite() && *s >= 0.0)
        {
            session.streak = streak.floor().min(u32::MAX as f64) as u32;
        }
        if let Some(entries) = value.get("leaderboard").and_then(Value::as_array) {
            let parsed = entries
                .iter()
                .filter_map(|e| serde_json::from_value::<LeaderboardEntry>(e.clone()).ok());
            session.leaderboard = Leaderboard::from_entries(parsed);
        }

        session
    }
}

/// Persist the session under `SAVE_KEY`
pub fn save_session(store: &dyn Store, session: &Session) -> Result<(), PersistenceError> {
    let json = serde_json::to_string(&SavedSession::from(session))?;
    store.write(SAVE_KEY, &json)?;
    log::debug!("Session saved (balance {:.2})", session.balance);
    Ok(())
}

/// Load the saved session, or a fresh one when there is none
pub fn load_session(store: &dyn Store, settings: &Settings) -> Session {
    match store.read(SAVE_KEY) {
        Ok(Some(json)) => {
            let session = SavedSession::restore(&json, settings);
            log::info!(
                "Session restored: balance {:.2}, {} leaderboard entries",
                session.balance,
                session.leaderboard.len()
            );
            session
        }
        Ok(None) => Session::new(settings),
        Err(e) => {
            log::warn!("Save unavailable, starting fresh: {e}");
            Session::new(settings)
        }
    }
}

/// Forget the saved session
pub fn clear_session(store: &dyn Store) -> Result<(), PersistenceError> {
    store.remove(SAVE_KEY)
}
