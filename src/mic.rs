use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use crate::decoder::SAMPLE_SCALE;
use crate::error::{Error, Result};

/// Records `seconds` of audio from the default input device.
///
/// Returns one downmixed channel at the device's native sample rate,
/// rescaled to the pipeline's 16-bit full-scale convention.
pub fn record(seconds: u32) -> Result<(Vec<f32>, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Capture("no default input device".into()))?;
    let config = device
        .default_input_config()
        .map_err(|e| Error::Capture(e.to_string()))?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let captured = Arc::new(Mutex::new(Vec::<f32>::new()));
    let sink = Arc::clone(&captured);
    let err_fn = |err| error!("input stream error: {err}");

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut sink) = sink.lock() {
                    sink.extend_from_slice(data);
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut sink) = sink.lock() {
                    sink.extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut sink) = sink.lock() {
                    sink.extend(data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0));
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(Error::Capture(format!("unsupported sample format {other:?}")));
        }
    }
    .map_err(|e| Error::Capture(e.to_string()))?;

    stream.play().map_err(|e| Error::Capture(e.to_string()))?;
    info!(seconds, sample_rate, channels, "recording from default input");
    thread::sleep(Duration::from_secs(u64::from(seconds)));
    drop(stream);

    let interleaved = captured
        .lock()
        .map_err(|_| Error::Capture("capture buffer poisoned".into()))?;
    Ok((downmix(&interleaved, channels), sample_rate))
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.iter().map(|&s| s * SAMPLE_SCALE).collect();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32 * SAMPLE_SCALE)
        .collect()
}
