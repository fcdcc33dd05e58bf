use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::decoder;
use crate::error::Result;
use crate::hashing::{self, Fingerprint};
use crate::peaks::{self, AMP_MIN};
use crate::spectrogram;

/// Everything the index needs to persist one fingerprinted recording.
#[derive(Debug)]
pub struct FingerprintOutcome {
    pub name: String,
    pub hashes: HashSet<Fingerprint>,
    pub content_hash: String,
}

/// Runs the spectrogram -> peaks -> landmarks pipeline over one channel.
///
/// Samples are expected at 16-bit integer full scale (see [`crate::decoder`]);
/// buffers shorter than one STFT window produce an empty set.
pub fn fingerprint_samples(samples: &[f32]) -> HashSet<Fingerprint> {
    let spectrogram = spectrogram::create_spectrogram(samples);
    let peaks = peaks::find_peaks(&spectrogram, AMP_MIN);
    hashing::create_hashes(&peaks)
}

/// Fingerprints every channel and unions the results. Channel order is not
/// observable in the output.
pub fn fingerprint_channels(channels: &[Vec<f32>]) -> HashSet<Fingerprint> {
    let mut hashes = HashSet::new();
    for (n, channel) in channels.iter().enumerate() {
        let channel_hashes = fingerprint_samples(channel);
        debug!(
            channel = n + 1,
            of = channels.len(),
            hashes = channel_hashes.len(),
            "fingerprinted channel"
        );
        hashes.extend(channel_hashes);
    }
    hashes
}

/// Decodes and fingerprints a whole file. The name defaults to the file
/// stem; `limit` truncates each channel to its first `limit` seconds.
pub fn fingerprint_file(
    path: &Path,
    name: Option<&str>,
    limit: Option<u32>,
) -> Result<FingerprintOutcome> {
    let decoded = decoder::decode(path, limit)?;
    let hashes = fingerprint_channels(&decoded.channels);
    let name = name
        .map(str::to_owned)
        .unwrap_or_else(|| decoder::path_to_name(path));
    Ok(FingerprintOutcome {
        name,
        hashes,
        content_hash: decoded.content_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
        let len = (seconds * 44100.0) as usize;
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / 44100.0).sin())
            .collect()
    }

    #[test]
    fn short_buffers_fingerprint_to_nothing() {
        assert!(fingerprint_samples(&[]).is_empty());
        assert!(fingerprint_samples(&vec![0.0; 1000]).is_empty());
    }

    #[test]
    fn fingerprinting_is_deterministic() {
        let samples = tone(523.0, 2.0, 12000.0);
        assert_eq!(fingerprint_samples(&samples), fingerprint_samples(&samples));
    }

    #[test]
    fn channel_union_matches_per_channel_sets() {
        let left = tone(440.0, 1.5, 12000.0);
        let right = tone(660.0, 1.5, 12000.0);
        let union = fingerprint_channels(&[left.clone(), right.clone()]);

        let mut expected = fingerprint_samples(&left);
        expected.extend(fingerprint_samples(&right));
        assert_eq!(union, expected);
    }
}
