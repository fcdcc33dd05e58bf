use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::hashing::Fingerprint;

#[derive(Debug, Clone)]
pub struct Recording {
    pub id: i64,
    pub name: String,
    /// SHA-1 of the source file bytes, lowercase hex.
    pub content_hash: String,
    pub fingerprinted: bool,
}

/// Persistent store mapping landmark hashes to `(recording, anchor_time)`.
///
/// Backed by SQLite. The `hashes.hash` index is what keeps
/// [`HashIndex::return_matches`] an index join rather than a scan.
pub struct HashIndex {
    conn: Connection,
}

impl HashIndex {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS recordings (
                 recording_id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 content_hash TEXT NOT NULL UNIQUE,
                 fingerprinted INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS hashes (
                 hash TEXT NOT NULL,
                 recording_id INTEGER NOT NULL
                     REFERENCES recordings(recording_id) ON DELETE CASCADE,
                 anchor_time INTEGER NOT NULL,
                 UNIQUE (recording_id, hash, anchor_time)
             );
             CREATE INDEX IF NOT EXISTS idx_hashes_hash ON hashes (hash);
             COMMIT;",
        )?;
        Ok(Self { conn })
    }

    pub fn recordings(&self) -> Result<Vec<Recording>> {
        let mut stmt = self.conn.prepare(
            "SELECT recording_id, name, content_hash, fingerprinted FROM recordings
             ORDER BY recording_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Recording {
                id: row.get(0)?,
                name: row.get(1)?,
                content_hash: row.get(2)?,
                fingerprinted: row.get(3)?,
            })
        })?;
        let mut recordings = Vec::new();
        for row in rows {
            recordings.push(row?);
        }
        Ok(recordings)
    }

    pub fn lookup_content_hash(&self, content_hash: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT recording_id FROM recordings WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Creates a recording row with `fingerprinted = false`.
    ///
    /// A second insert with the same content hash fails with
    /// [`Error::DuplicateContent`]; the unique constraint makes the check
    /// atomic.
    pub fn insert_recording(&self, name: &str, content_hash: &str) -> Result<i64> {
        match self.conn.execute(
            "INSERT INTO recordings (name, content_hash, fingerprinted) VALUES (?1, ?2, 0)",
            params![name, content_hash],
        ) {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateContent(content_hash.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Bulk-inserts a recording's hashes inside one transaction.
    /// `INSERT OR IGNORE` makes duplicate `(hash, anchor_time)` rows
    /// idempotent, so prefix collisions within a recording are harmless.
    pub fn insert_hashes(&mut self, recording_id: i64, hashes: &HashSet<Fingerprint>) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO hashes (hash, recording_id, anchor_time)
                 VALUES (?1, ?2, ?3)",
            )?;
            for fp in hashes {
                stmt.execute(params![fp.hash, recording_id, fp.anchor_time])?;
            }
        }
        tx.commit()?;
        debug!(recording_id, hashes = hashes.len(), "committed hashes");
        Ok(())
    }

    /// Marks a recording fully fingerprinted. Only called after
    /// [`HashIndex::insert_hashes`] has committed.
    pub fn set_fingerprinted(&self, recording_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE recordings SET fingerprinted = 1 WHERE recording_id = ?1",
            params![recording_id],
        )?;
        Ok(())
    }

    /// For every stored hash equal to a query hash, yields
    /// `(recording_id, stored_anchor_time - query_anchor_time)`.
    pub fn return_matches(&self, query: &HashSet<Fingerprint>) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT recording_id, anchor_time FROM hashes WHERE hash = ?1")?;
        let mut matches = Vec::new();
        for fp in query {
            let rows = stmt.query_map(params![fp.hash], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (recording_id, anchor_time) = row?;
                matches.push((recording_id, anchor_time - fp.anchor_time as i64));
            }
        }
        Ok(matches)
    }

    pub fn recording_by_id(&self, recording_id: i64) -> Result<Option<Recording>> {
        let recording = self
            .conn
            .query_row(
                "SELECT recording_id, name, content_hash, fingerprinted
                 FROM recordings WHERE recording_id = ?1",
                params![recording_id],
                |row| {
                    Ok(Recording {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        content_hash: row.get(2)?,
                        fingerprinted: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(recording)
    }

    /// Deletes recordings a crashed run left half-ingested, cascading their
    /// hashes. Returns how many were removed.
    pub fn purge_unfingerprinted(&self) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM recordings WHERE fingerprinted = 0", [])?)
    }

    /// Total number of hash rows across all recordings.
    pub fn hash_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM hashes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_index() -> (tempfile::TempDir, HashIndex) {
        let dir = tempfile::tempdir().unwrap();
        let index = HashIndex::open(&dir.path().join("index.sqlite")).unwrap();
        (dir, index)
    }

    fn fp(hash: &str, anchor_time: u32) -> Fingerprint {
        Fingerprint {
            hash: hash.to_owned(),
            anchor_time,
        }
    }

    #[test]
    fn duplicate_content_hash_is_rejected() {
        let (_dir, index) = open_index();
        index.insert_recording("first", "aa11").unwrap();
        match index.insert_recording("second", "aa11") {
            Err(Error::DuplicateContent(h)) => assert_eq!(h, "aa11"),
            other => panic!("expected DuplicateContent, got {other:?}"),
        }
        assert!(index.lookup_content_hash("aa11").unwrap());
        assert!(!index.lookup_content_hash("bb22").unwrap());
    }

    #[test]
    fn hash_inserts_are_idempotent() {
        let (_dir, mut index) = open_index();
        let id = index.insert_recording("song", "cc33").unwrap();
        let hashes: HashSet<Fingerprint> = [fp("f0bd90097f416da0404f", 1), fp("fd5162f4622848090d7d", 2)]
            .into_iter()
            .collect();
        index.insert_hashes(id, &hashes).unwrap();
        index.insert_hashes(id, &hashes).unwrap();
        assert_eq!(index.hash_count().unwrap(), 2);
    }

    #[test]
    fn matches_report_anchor_offsets() {
        let (_dir, mut index) = open_index();
        let id = index.insert_recording("song", "dd44").unwrap();
        index
            .insert_hashes(id, &[fp("f0bd90097f416da0404f", 10)].into_iter().collect())
            .unwrap();

        let query = [fp("f0bd90097f416da0404f", 3)].into_iter().collect();
        assert_eq!(index.return_matches(&query).unwrap(), vec![(id, 7)]);

        let miss = [fp("0000000000000000dead", 3)].into_iter().collect();
        assert!(index.return_matches(&miss).unwrap().is_empty());
    }

    #[test]
    fn fingerprinted_flag_round_trips() {
        let (_dir, index) = open_index();
        let id = index.insert_recording("song", "ee55").unwrap();
        assert!(!index.recording_by_id(id).unwrap().unwrap().fingerprinted);
        index.set_fingerprinted(id).unwrap();
        assert!(index.recording_by_id(id).unwrap().unwrap().fingerprinted);
        assert!(index.recording_by_id(9999).unwrap().is_none());
    }

    #[test]
    fn purge_drops_unfinished_recordings_and_their_hashes() {
        let (_dir, mut index) = open_index();
        let done = index.insert_recording("done", "ff66").unwrap();
        index
            .insert_hashes(done, &[fp("f0bd90097f416da0404f", 0)].into_iter().collect())
            .unwrap();
        index.set_fingerprinted(done).unwrap();

        let crashed = index.insert_recording("crashed", "0077").unwrap();
        index
            .insert_hashes(crashed, &[fp("fd5162f4622848090d7d", 0)].into_iter().collect())
            .unwrap();

        assert_eq!(index.purge_unfingerprinted().unwrap(), 1);
        assert_eq!(index.recordings().unwrap().len(), 1);
        assert_eq!(index.hash_count().unwrap(), 1);
    }
}
