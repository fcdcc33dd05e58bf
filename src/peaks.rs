use crate::spectrogram::Spectrogram;

/// Minimum magnitude (dB) for a spectrogram cell to qualify as a peak,
/// calibrated against the decoder's 16-bit full-scale samples.
pub const AMP_MIN: f32 = 10.0;
/// Radius of the square local-maximum neighborhood, in frames and bins.
pub const PEAK_NEIGHBORHOOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub time_frame: usize,
    pub freq_bin: usize,
}

/// Finds cells that are strict local maxima of their
/// `(2 * PEAK_NEIGHBORHOOD + 1)^2` neighborhood and at least `amp_min` dB.
///
/// Equal magnitudes within a neighborhood are resolved deterministically:
/// the earlier `(time_frame, freq_bin)` position wins.
pub fn find_peaks(spectrogram: &Spectrogram, amp_min: f32) -> Vec<Peak> {
    let mut peaks = Vec::new();
    if spectrogram.is_empty() {
        return peaks;
    }

    let num_frames = spectrogram.len();
    let num_bins = spectrogram[0].len();

    for t in 0..num_frames {
        for f in 0..num_bins {
            let magnitude = spectrogram[t][f];
            if magnitude < amp_min {
                continue;
            }

            let t_start = t.saturating_sub(PEAK_NEIGHBORHOOD);
            let t_end = (t + PEAK_NEIGHBORHOOD + 1).min(num_frames);
            let f_start = f.saturating_sub(PEAK_NEIGHBORHOOD);
            let f_end = (f + PEAK_NEIGHBORHOOD + 1).min(num_bins);

            let mut is_peak = true;
            'neighborhood: for nt in t_start..t_end {
                for nf in f_start..f_end {
                    if nt == t && nf == f {
                        continue;
                    }
                    let other = spectrogram[nt][nf];
                    if other > magnitude || (other == magnitude && (nt, nf) < (t, f)) {
                        is_peak = false;
                        break 'neighborhood;
                    }
                }
            }

            if is_peak {
                peaks.push(Peak {
                    time_frame: t,
                    freq_bin: f,
                });
            }
        }
    }
    peaks
}
