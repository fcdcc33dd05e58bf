use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use tracing::{debug, info, warn};

use crate::aligner::{self, Match};
use crate::database::{HashIndex, Recording};
use crate::decoder;
use crate::error::{Error, Result};
use crate::fingerprint::{self, FingerprintOutcome};
use crate::mic;

/// Where a recognition query's samples come from.
pub enum QuerySource<'a> {
    /// A caller-supplied single-channel buffer at 16-bit full scale.
    Samples {
        samples: &'a [f32],
        sample_rate: u32,
    },
    /// Decode an audio file and match all of its channels.
    File(&'a Path),
    /// Capture from the default microphone for a fixed duration.
    Mic { seconds: u32 },
}

/// Facade over the whole pipeline: owns the [`HashIndex`], fingerprints and
/// persists recordings, and recognizes queries against them.
pub struct Engine {
    index: HashIndex,
    limit: Option<u32>,
    /// Content hashes of fully fingerprinted recordings, used to skip
    /// re-ingesting files the index already knows.
    known_hashes: HashSet<String>,
}

impl Engine {
    /// Opens (creating if needed) the index at `db_path`.
    ///
    /// Recordings a crashed run left with `fingerprinted = false` are
    /// deleted here, so every ingest starts from a consistent index.
    /// `limit` caps fingerprinting to the first `limit` seconds per file.
    pub fn open(db_path: &Path, limit: Option<u32>) -> Result<Self> {
        let index = HashIndex::open(db_path)?;
        let purged = index.purge_unfingerprinted()?;
        if purged > 0 {
            info!(purged, "removed recordings left unfinished by an earlier run");
        }
        let known_hashes = index
            .recordings()?
            .into_iter()
            .map(|r| r.content_hash)
            .collect();
        Ok(Self {
            index,
            limit,
            known_hashes,
        })
    }

    pub fn recordings(&self) -> Result<Vec<Recording>> {
        self.index.recordings()
    }

    /// Decodes, fingerprints and persists one file. Files whose content
    /// hash is already indexed are skipped.
    pub fn index_file(&mut self, path: &Path, name: Option<&str>) -> Result<()> {
        let content_hash = decoder::content_hash(path)?;
        if self.known_hashes.contains(&content_hash) {
            info!(path = %path.display(), "skipping: already fingerprinted");
            return Ok(());
        }
        let outcome = fingerprint::fingerprint_file(path, name, self.limit)?;
        self.persist(outcome)
    }

    /// Fingerprints every matching file under `dir` on a pool of worker
    /// threads, persisting results serially as they complete.
    ///
    /// `workers == 0` selects the number of hardware threads. Per-file
    /// failures are logged and dropped; the run continues.
    pub fn index_directory(&mut self, dir: &Path, extensions: &[&str], workers: usize) -> Result<()> {
        let workers = if workers == 0 {
            num_cpus::get().max(1)
        } else {
            workers
        };

        let mut pending = Vec::new();
        for (path, _extension) in decoder::find_files(dir, extensions)? {
            match decoder::content_hash(&path) {
                Ok(hash) if self.known_hashes.contains(&hash) => {
                    info!(path = %path.display(), "skipping: already fingerprinted");
                }
                Ok(_) => pending.push(path),
                Err(e) => warn!("skipping unreadable file: {e}"),
            }
        }
        if pending.is_empty() {
            info!(dir = %dir.display(), "nothing new to fingerprint");
            return Ok(());
        }
        info!(files = pending.len(), workers, "fingerprinting directory");

        // Bounded channels on both sides: job submission blocks while the
        // pool is busy, and workers block while the consumer persists.
        let (job_tx, job_rx) = mpsc::sync_channel::<PathBuf>(workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::sync_channel::<Result<FingerprintOutcome>>(workers);

        let mut handles = Vec::with_capacity(workers + 1);
        for _ in 0..workers {
            let jobs = Arc::clone(&job_rx);
            let results = result_tx.clone();
            let limit = self.limit;
            handles.push(thread::spawn(move || {
                loop {
                    let job = match jobs.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(path) = job else { break };
                    debug!(path = %path.display(), "fingerprinting");
                    let outcome = fingerprint::fingerprint_file(&path, None, limit);
                    if results.send(outcome).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        handles.push(thread::spawn(move || {
            for path in pending {
                if job_tx.send(path).is_err() {
                    break;
                }
            }
        }));

        // Single consumer: the index handle never leaves this thread.
        for outcome in result_rx {
            match outcome {
                Ok(outcome) => {
                    let name = outcome.name.clone();
                    match self.persist(outcome) {
                        Ok(()) => {}
                        Err(Error::DuplicateContent(hash)) => {
                            info!(%name, %hash, "skipping: duplicate content within this run");
                        }
                        Err(e) => warn!(%name, "failed to persist fingerprints: {e}"),
                    }
                }
                Err(e) => warn!("fingerprinting failed: {e}"),
            }
        }

        for handle in handles {
            let _ = handle.join();
        }
        Ok(())
    }

    fn persist(&mut self, outcome: FingerprintOutcome) -> Result<()> {
        if self.known_hashes.contains(&outcome.content_hash) {
            return Err(Error::DuplicateContent(outcome.content_hash));
        }
        let recording_id = self
            .index
            .insert_recording(&outcome.name, &outcome.content_hash)?;
        self.index.insert_hashes(recording_id, &outcome.hashes)?;
        self.index.set_fingerprinted(recording_id)?;
        info!(
            name = %outcome.name,
            recording_id,
            hashes = outcome.hashes.len(),
            "indexed recording"
        );
        self.known_hashes.insert(outcome.content_hash);
        Ok(())
    }

    /// Recognizes a query, returning `None` when nothing matches.
    pub fn recognize(&self, source: QuerySource<'_>) -> Result<Option<Match>> {
        match source {
            QuerySource::Samples {
                samples,
                sample_rate,
            } => self.recognize_samples(samples, sample_rate),
            QuerySource::File(path) => {
                let decoded = decoder::decode(path, None)?;
                let hashes = fingerprint::fingerprint_channels(&decoded.channels);
                let matches = self.index.return_matches(&hashes)?;
                aligner::align_matches(&self.index, &matches, decoded.sample_rate)
            }
            QuerySource::Mic { seconds } => {
                let (samples, sample_rate) = mic::record(seconds)?;
                self.recognize_samples(&samples, sample_rate)
            }
        }
    }

    /// Fingerprints a single-channel buffer and aligns it against the index.
    pub fn recognize_samples(&self, samples: &[f32], sample_rate: u32) -> Result<Option<Match>> {
        let hashes = fingerprint::fingerprint_samples(samples);
        let matches = self.index.return_matches(&hashes)?;
        debug!(
            query_hashes = hashes.len(),
            hits = matches.len(),
            "aligning hash hits"
        );
        aligner::align_matches(&self.index, &matches, sample_rate)
    }
}
