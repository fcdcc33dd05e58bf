use std::collections::HashMap;

use crate::database::HashIndex;
use crate::error::Result;
use crate::spectrogram::HOP_SIZE;

/// A recognized recording with alignment details.
#[derive(Debug, Clone)]
pub struct Match {
    pub recording_id: i64,
    pub name: String,
    /// Number of hash hits agreeing on the winning offset.
    pub confidence: usize,
    /// Winning `stored_anchor_time - query_anchor_time`, in frames.
    pub offset_frames: i64,
    /// The same offset in seconds, rounded to 5 decimals.
    pub offset_seconds: f64,
    pub content_hash: String,
}

/// Reduces raw `(recording_id, offset_delta)` hits to an identification.
///
/// True matches pile up on one delta because stored and query anchor times
/// advance together; unrelated hits scatter. The histogram mode is taken as
/// the alignment. Ties keep the first bucket to reach the winning count, in
/// input order. Returns `None` when there are no hits or the winning
/// recording no longer exists.
pub fn align_matches(
    index: &HashIndex,
    matches: &[(i64, i64)],
    sample_rate: u32,
) -> Result<Option<Match>> {
    let mut counter: HashMap<(i64, i64), usize> = HashMap::new();
    let mut best: Option<((i64, i64), usize)> = None;

    for &(recording_id, delta) in matches {
        let count = counter.entry((recording_id, delta)).or_insert(0);
        *count += 1;
        if best.as_ref().is_none_or(|&(_, top)| *count > top) {
            best = Some(((recording_id, delta), *count));
        }
    }

    let Some(((recording_id, offset_frames), confidence)) = best else {
        return Ok(None);
    };
    let Some(recording) = index.recording_by_id(recording_id)? else {
        return Ok(None);
    };

    let offset_seconds = round5(offset_frames as f64 * HOP_SIZE as f64 / sample_rate as f64);
    Ok(Some(Match {
        recording_id,
        name: recording.name,
        confidence,
        offset_frames,
        offset_seconds,
        content_hash: recording.content_hash,
    }))
}

fn round5(x: f64) -> f64 {
    (x * 100_000.0).round() / 100_000.0
}
