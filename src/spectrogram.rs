use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f32::consts::PI;

/// STFT frame length in samples. Part of the hash contract: changing it
/// invalidates every stored fingerprint.
pub const WINDOW_SIZE: usize = 4096;
/// Fraction of each window shared with the next frame.
pub const OVERLAP_RATIO: f64 = 0.5;
/// Samples advanced between frames (`WINDOW_SIZE * OVERLAP_RATIO`).
pub const HOP_SIZE: usize = WINDOW_SIZE / 2;

// Keeps log10 finite on silent bins.
const POWER_FLOOR: f32 = 1e-10;

/// Frames outer, frequency bins inner: `spectrogram[time_frame][freq_bin]`.
pub type Spectrogram = Vec<Vec<f32>>;

fn hann_window(size: usize) -> Vec<f32> {
    let mut window = Vec::with_capacity(size);
    for i in 0..size {
        window.push(0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()));
    }
    window
}

/// Computes Hann-windowed STFT magnitudes in decibels.
///
/// Each frame holds `WINDOW_SIZE / 2 + 1` bins scaled as
/// `10 * log10(max(|X|^2, 1e-10))`. Input shorter than one window yields an
/// empty spectrogram.
pub fn create_spectrogram(samples: &[f32]) -> Spectrogram {
    if samples.len() < WINDOW_SIZE {
        return Vec::new();
    }

    let num_frames = (samples.len() - WINDOW_SIZE) / HOP_SIZE + 1;
    let num_bins = WINDOW_SIZE / 2 + 1;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(WINDOW_SIZE);
    let window = hann_window(WINDOW_SIZE);
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); WINDOW_SIZE];
    let mut frames: Spectrogram = Vec::with_capacity(num_frames);

    for i in 0..num_frames {
        let start = i * HOP_SIZE;
        let chunk = &samples[start..start + WINDOW_SIZE];

        for (j, &sample) in chunk.iter().enumerate() {
            buffer[j] = Complex::new(sample * window[j], 0.0);
        }

        fft.process(&mut buffer);

        let mut magnitudes = Vec::with_capacity(num_bins);
        for bin in &buffer[..num_bins] {
            magnitudes.push(10.0 * bin.norm_sqr().max(POWER_FLOOR).log10());
        }
        frames.push(magnitudes);
    }
    frames
}
