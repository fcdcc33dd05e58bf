use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};

/// Decoded PCM is rescaled from symphonia's [-1, 1] floats to 16-bit
/// integer full scale. The peak amplitude floor is calibrated against this
/// scale; feeding [-1, 1] samples into the pipeline shifts every bin down
/// by ~90 dB and produces no peaks.
pub const SAMPLE_SCALE: f32 = 32768.0;

pub struct DecodedAudio {
    /// One buffer per audio channel, not downmixed.
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
    /// SHA-1 over the file bytes, lowercase hex.
    pub content_hash: String,
}

/// Decodes an audio file into per-channel sample buffers.
///
/// `limit_seconds` truncates each channel to its first `limit * Fs` samples.
pub fn decode(path: &Path, limit_seconds: Option<u32>) -> Result<DecodedAudio> {
    let content_hash = content_hash(path)?;

    let src = File::open(path).map_err(|e| Error::io(path, e))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::decode(path, e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or_else(|| Error::decode(path, "no decodable audio track"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::decode(path, "track has no sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::decode(path, e))?;

    let limit_samples = limit_seconds.map(|s| s as usize * sample_rate as usize);
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        if let Some(limit) = limit_samples {
            if channels.first().is_some_and(|c| c.len() >= limit) {
                break;
            }
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(Error::decode(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);

                let channel_count = spec.channels.count();
                if channels.len() < channel_count {
                    channels.resize_with(channel_count, Vec::new);
                }
                for frame in sample_buf.samples().chunks_exact(channel_count) {
                    for (channel, &sample) in channels.iter_mut().zip(frame) {
                        channel.push(sample * SAMPLE_SCALE);
                    }
                }
            }
            // A corrupt packet is recoverable; keep going.
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = %path.display(), "skipping undecodable packet: {e}");
            }
            Err(e) => return Err(Error::decode(path, e)),
        }
    }

    if let Some(limit) = limit_samples {
        for channel in &mut channels {
            channel.truncate(limit);
        }
    }

    if channels.iter().all(|c| c.is_empty()) {
        return Err(Error::decode(path, "stream decoded to zero samples"));
    }

    Ok(DecodedAudio {
        channels,
        sample_rate,
        content_hash,
    })
}

/// SHA-1 of the file bytes (not the decoded samples), lowercase hex.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// File stem without extension, used as the default recording name.
pub fn path_to_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Recursively collects files whose extension matches one of `extensions`
/// (dotted, case-insensitive, e.g. ".mp3"). Returns the matched extension
/// alongside each path.
pub fn find_files(dir: &Path, extensions: &[&str]) -> Result<Vec<(PathBuf, String)>> {
    let mut found = Vec::new();
    collect_files(dir, extensions, &mut found)?;
    Ok(found)
}

fn collect_files(dir: &Path, extensions: &[&str], out: &mut Vec<(PathBuf, String)>) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, extensions, out)?;
            continue;
        }
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let dotted = format!(".{}", extension.to_ascii_lowercase());
        if extensions.iter().any(|e| e.eq_ignore_ascii_case(&dotted)) {
            out.push((path, dotted));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn tone_i16(freq: f32, sample_rate: u32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                (12000.0 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin()) as i16
            })
            .collect()
    }

    #[test]
    fn path_to_name_strips_directory_and_extension() {
        assert_eq!(path_to_name(Path::new("library/track.mp3")), "track");
        assert_eq!(path_to_name(Path::new("track")), "track");
    }

    #[test]
    fn wav_decodes_to_full_scale_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples = tone_i16(440.0, 8000, 8000);
        write_wav(&path, &samples, 8000);

        let decoded = decode(&path, None).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels.len(), 1);
        assert_eq!(decoded.channels[0].len(), samples.len());
        for (&expected, &got) in samples.iter().zip(&decoded.channels[0]).step_by(97) {
            assert!(
                (got - expected as f32).abs() <= 1.0,
                "expected ~{expected}, got {got}"
            );
        }
    }

    #[test]
    fn limit_truncates_to_the_leading_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, &tone_i16(330.0, 8000, 8000 * 3), 8000);

        let full = decode(&path, None).unwrap();
        let limited = decode(&path, Some(1)).unwrap();
        assert_eq!(limited.channels[0].len(), 8000);
        assert_eq!(limited.channels[0][..], full.channels[0][..8000]);
    }

    #[test]
    fn content_hash_matches_a_direct_digest_of_the_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &tone_i16(500.0, 8000, 4000), 8000);

        let expected = hex::encode(Sha1::digest(fs::read(&path).unwrap()));
        assert_eq!(content_hash(&path).unwrap(), expected);
        assert_eq!(content_hash(&path).unwrap(), expected);
    }

    #[test]
    fn find_files_matches_extensions_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();
        for name in ["a.wav", "b.WAV", "c.mp3", "d.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::write(sub.join("e.Mp3"), b"x").unwrap();

        let mut found = find_files(dir.path(), &[".wav", ".mp3"]).unwrap();
        found.sort();
        let names: Vec<String> = found
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.wav", "b.WAV", "c.mp3", "e.Mp3"]);
        assert!(found.iter().all(|(_, ext)| ext == ".wav" || ext == ".mp3"));
    }
}
