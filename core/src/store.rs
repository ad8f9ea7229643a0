//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database. The engine never touches
//! it; hosts decide what to persist and when.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::{
    error::SimResult,
    event::EventLogEntry,
    save::SaveBlob,
    types::Tick,
};

/// Schema migrations, applied in order.
const MIGRATIONS: &[&str] = &[include_str!("../../migrations/001_foundation.sql")];

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the simulation database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> SimResult<()> {
        for sql in MIGRATIONS {
            self.conn.execute_batch(sql)?;
        }
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    /// SQLite integers are signed, so the seed is stored as its two's
    /// complement bit pattern. `run_seed` reverses it.
    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, i64::from_ne_bytes(seed.to_ne_bytes()), version, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn run_seed(&self, run_id: &str) -> SimResult<Option<u64>> {
        let seed = self
            .conn
            .query_row("SELECT seed FROM run WHERE run_id = ?1", params![run_id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;
        Ok(seed.map(|s| u64::from_ne_bytes(s.to_ne_bytes())))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, tick, event_type, payload) VALUES (?1, ?2, ?3, ?4)",
            params![entry.run_id, entry.tick as i64, entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    pub fn events_for_tick(&self, run_id: &str, tick: Tick) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, tick, event_type, payload
             FROM event_log WHERE run_id = ?1 AND tick = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id, tick as i64], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    tick:       row.get::<_, i64>(2)? as u64,
                    event_type: row.get(3)?,
                    payload:    row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ── Save blobs ─────────────────────────────────────────────

    /// Persist `blob` and return its generated save id.
    pub fn save_blob(&self, run_id: &str, blob: &SaveBlob) -> SimResult<String> {
        let save_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO save_blob (save_id, run_id, tick, version, blob_json, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                save_id,
                run_id,
                blob.tick as i64,
                blob.version,
                blob.to_json()?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(save_id)
    }

    /// Most recent save for the run, migrated to the current version.
    pub fn latest_save(&self, run_id: &str) -> SimResult<Option<SaveBlob>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT blob_json FROM save_blob WHERE run_id = ?1
                 ORDER BY tick DESC, rowid DESC LIMIT 1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|raw| SaveBlob::from_json(&raw)).transpose()
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn save_snapshot(&self, run_id: &str, tick: Tick, state_json: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshot (run_id, tick, state_json) VALUES (?1, ?2, ?3)",
            params![run_id, tick as i64, state_json],
        )?;
        Ok(())
    }

    pub fn latest_snapshot_before(&self, run_id: &str, tick: Tick) -> SimResult<Option<(Tick, String)>> {
        let result = self
            .conn
            .query_row(
                "SELECT tick, state_json FROM snapshot
                 WHERE run_id = ?1 AND tick <= ?2
                 ORDER BY tick DESC LIMIT 1",
                params![run_id, tick as i64],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(result)
    }
}
