use sha1::{Digest, Sha1};
use std::collections::HashSet;

use crate::peaks::Peak;

/// Maximum number of partner peaks paired with each anchor.
pub const FAN_VALUE: usize = 15;
/// Inclusive bounds on the anchor-to-partner frame distance.
pub const MIN_HASH_TIME_DELTA: usize = 0;
pub const MAX_HASH_TIME_DELTA: usize = 200;
/// Hex characters of the SHA-1 digest kept as the stored hash.
pub const FINGERPRINT_REDUCTION: usize = 20;

/// A landmark hash and the time frame of its anchor peak.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub hash: String,
    pub anchor_time: u32,
}

/// Pairs peaks into landmark hashes.
///
/// Peaks are sorted by `(time_frame, freq_bin)`; each anchor is paired with
/// the next `FAN_VALUE` peaks whose frame distance falls inside the delta
/// bounds. The hash is the `FINGERPRINT_REDUCTION`-character prefix of
/// `sha1("f1|f2|dt")` over the decimal bin/frame values. Duplicate
/// `(hash, anchor_time)` pairs collapse in the returned set.
pub fn create_hashes(peaks: &[Peak]) -> HashSet<Fingerprint> {
    let mut sorted: Vec<Peak> = peaks.to_vec();
    sorted.sort_by_key(|p| (p.time_frame, p.freq_bin));

    let mut fingerprints = HashSet::new();
    for i in 0..sorted.len() {
        let anchor = sorted[i];
        for target in &sorted[i + 1..(i + 1 + FAN_VALUE).min(sorted.len())] {
            let delta = target.time_frame - anchor.time_frame;
            if !(MIN_HASH_TIME_DELTA..=MAX_HASH_TIME_DELTA).contains(&delta) {
                continue;
            }

            let digest = Sha1::digest(
                format!("{}|{}|{}", anchor.freq_bin, target.freq_bin, delta).as_bytes(),
            );
            let mut hash = hex::encode(digest);
            hash.truncate(FINGERPRINT_REDUCTION);

            fingerprints.insert(Fingerprint {
                hash,
                anchor_time: anchor.time_frame as u32,
            });
        }
    }
    fingerprints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(time_frame: usize, freq_bin: usize) -> Peak {
        Peak {
            time_frame,
            freq_bin,
        }
    }

    #[test]
    fn single_pair_hashes_to_the_sha1_prefix() {
        // sha1("10|20|30") = f0bd90097f416da0404f...
        let fingerprints = create_hashes(&[peak(0, 10), peak(30, 20)]);
        assert_eq!(fingerprints.len(), 1);
        let fp = fingerprints.iter().next().unwrap();
        assert_eq!(fp.hash, "f0bd90097f416da0404f");
        assert_eq!(fp.anchor_time, 0);
        assert_eq!(fp.hash.len(), FINGERPRINT_REDUCTION);
    }

    #[test]
    fn pairs_beyond_the_delta_window_are_dropped() {
        let fingerprints = create_hashes(&[peak(0, 10), peak(MAX_HASH_TIME_DELTA + 100, 20)]);
        assert!(fingerprints.is_empty());
    }

    #[test]
    fn same_frame_pairs_are_allowed() {
        // sha1("5|9|0") = fd5162f4622848090d7d...
        let fingerprints = create_hashes(&[peak(0, 5), peak(0, 9)]);
        assert_eq!(fingerprints.len(), 1);
        assert_eq!(
            fingerprints.iter().next().unwrap().hash,
            "fd5162f4622848090d7d"
        );
    }

    #[test]
    fn identical_triples_at_different_anchors_share_a_hash() {
        let early = create_hashes(&[peak(0, 5), peak(0, 9)]);
        let late = create_hashes(&[peak(100, 5), peak(100, 9)]);
        let early = early.iter().next().unwrap();
        let late = late.iter().next().unwrap();
        assert_eq!(early.hash, late.hash);
        assert_eq!(early.anchor_time, 0);
        assert_eq!(late.anchor_time, 100);
    }

    #[test]
    fn fan_value_caps_partners_per_anchor() {
        let peaks: Vec<Peak> = (0..=20).map(|t| peak(t, 100)).collect();
        let fingerprints = create_hashes(&peaks);
        let from_first_anchor = fingerprints.iter().filter(|fp| fp.anchor_time == 0).count();
        assert_eq!(from_first_anchor, FAN_VALUE);
    }

    #[test]
    fn deterministic_regardless_of_peak_order() {
        let forward = vec![peak(0, 10), peak(5, 40), peak(9, 12), peak(40, 7)];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(create_hashes(&forward), create_hashes(&reversed));
    }
}
