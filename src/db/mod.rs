use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub mod models;
use models::*;

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// The two persisted match collections share one table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchList {
    Hidden,
    Favorite,
}

impl MatchList {
    fn table(self) -> &'static str {
        match self {
            MatchList::Hidden => "hidden_matches",
            MatchList::Favorite => "favorite_matches",
        }
    }
}

/// The two persisted league collections share one table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeagueList {
    Favorite,
    Selected,
}

impl LeagueList {
    fn table(self) -> &'static str {
        match self {
            LeagueList::Favorite => "favorite_leagues",
            LeagueList::Selected => "selected_leagues",
        }
    }
}

const FILTER_STATE_KEY: &str = "filter_state";

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// In-memory store, used by tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    // ── Hidden / favorite matches ────────────────────────────────────────────

    /// Insert or replace one match in the given collection.
    pub fn add_match(&self, list: MatchList, m: &Match) -> Result<()> {
        let data = serde_json::to_string(m)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, data, added_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)",
                list.table()
            ),
            params![m.id, data],
        )?;
        Ok(())
    }

    /// Returns true if a row was removed.
    pub fn remove_match(&self, list: MatchList, match_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", list.table()),
            params![match_id],
        )?;
        Ok(n > 0)
    }

    /// All matches in the collection, newest first. Rows whose JSON no longer
    /// parses are skipped.
    pub fn list_matches(&self, list: MatchList) -> Result<Vec<Match>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, data FROM {} ORDER BY added_at DESC, rowid DESC",
            list.table()
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, data)| match serde_json::from_str::<Match>(&data) {
                Ok(m) => Some(m),
                Err(e) => {
                    debug!("Dropping unreadable {} row {}: {}", list.table(), id, e);
                    None
                }
            })
            .collect())
    }

    pub fn match_ids(&self, list: MatchList) -> Result<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT id FROM {}", list.table()))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    pub fn contains_match(&self, list: MatchList, match_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", list.table()),
                params![match_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn clear_matches(&self, list: MatchList) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(&format!("DELETE FROM {}", list.table()), [])?;
        Ok(())
    }

    /// Replace the whole collection.
    pub fn save_matches(&self, list: MatchList, matches: &[Match]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", list.table()), [])?;
        for m in matches {
            let data = serde_json::to_string(m)?;
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, data, added_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)",
                    list.table()
                ),
                params![m.id, data],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ── Favorite / selected leagues ──────────────────────────────────────────

    pub fn add_league(&self, list: LeagueList, league: &League) -> Result<()> {
        let data = serde_json::to_string(league)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, name, data, added_at)
                 VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)",
                list.table()
            ),
            params![league.id, league.name, data],
        )?;
        Ok(())
    }

    pub fn remove_league(&self, list: LeagueList, league_id: u32) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", list.table()),
            params![league_id],
        )?;
        Ok(n > 0)
    }

    /// Leagues in insertion order. A row whose JSON is unreadable falls back
    /// to its id and name columns.
    pub fn list_leagues(&self, list: LeagueList) -> Result<Vec<League>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, data FROM {} ORDER BY added_at ASC, rowid ASC",
            list.table()
        ))?;
        let leagues = stmt
            .query_map([], |row| {
                let id: u32 = row.get(0)?;
                let name: String = row.get(1)?;
                let data: Option<String> = row.get(2)?;
                Ok(data
                    .and_then(|d| serde_json::from_str::<League>(&d).ok())
                    .unwrap_or_else(|| League {
                        id,
                        name,
                        kind: None,
                        logo: None,
                        country_name: None,
                        country_code: None,
                        flag: None,
                        season: None,
                    }))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(leagues)
    }

    pub fn league_ids(&self, list: LeagueList) -> Result<HashSet<u32>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT id FROM {}", list.table()))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, u32>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    pub fn contains_league(&self, list: LeagueList, league_id: u32) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", list.table()),
                params![league_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Replace the whole collection.
    pub fn save_leagues(&self, list: LeagueList, leagues: &[League]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", list.table()), [])?;
        for league in leagues {
            let data = serde_json::to_string(league)?;
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, name, data, added_at)
                     VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)",
                    list.table()
                ),
                params![league.id, league.name, data],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Selected plus favorite league IDs: the leagues a live filter pass
    /// is restricted to.
    pub fn required_league_ids(&self) -> Result<HashSet<u32>> {
        let mut ids = self.league_ids(LeagueList::Selected)?;
        ids.extend(self.league_ids(LeagueList::Favorite)?);
        Ok(ids)
    }

    // ── Filter toggles ───────────────────────────────────────────────────────

    /// Stored filter state; a missing or unreadable value yields the default.
    pub fn load_filter_state(&self) -> Result<FilterState> {
        let raw = self.get_setting(FILTER_STATE_KEY)?;
        Ok(raw
            .and_then(|r| match serde_json::from_str::<FilterState>(&r) {
                Ok(s) => Some(s),
                Err(e) => {
                    debug!("Ignoring unreadable filter state: {}", e);
                    None
                }
            })
            .unwrap_or_default())
    }

    pub fn save_filter_state(&self, state: &FilterState) -> Result<()> {
        self.put_setting(FILTER_STATE_KEY, state)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            params![key, json],
        )?;
        Ok(())
    }
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS hidden_matches (
    id       TEXT PRIMARY KEY,
    data     TEXT NOT NULL,
    added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS favorite_matches (
    id       TEXT PRIMARY KEY,
    data     TEXT NOT NULL,
    added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS favorite_leagues (
    id       INTEGER PRIMARY KEY,
    name     TEXT NOT NULL,
    data     TEXT,
    added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS selected_leagues (
    id       INTEGER PRIMARY KEY,
    name     TEXT NOT NULL,
    data     TEXT,
    added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;
