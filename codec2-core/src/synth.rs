//! Harmonic synthesiser (C5): IFFT-based summation, triangular
//! overlap-add, and the ear-protection limiter. No `synth.c` exists in
//! the retrieved pack; this module is built directly from spec.md
//! §4.5's literal description.

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::model::Model;

/// Carry-over memory between frames: the synthesiser keeps the right
/// half of the previous frame's overlap-add buffer.
#[derive(Debug, Clone)]
pub struct SynthMemory {
    pub tail: Vec<f64>,
}

impl SynthMemory {
    pub fn new(n_samp: usize) -> Self {
        Self {
            tail: vec![0.0; n_samp],
        }
    }
}

/// Triangular window `Pn`: zero at both edges, 1 in the middle, length
/// `2*n_samp`.
fn triangular_window(n_samp: usize) -> Vec<f64> {
    let len = 2 * n_samp;
    (0..len)
        .map(|i| 1.0 - ((i as f64 - (len as f64 - 1.0) / 2.0).abs() / (len as f64 / 2.0)))
        .collect()
}

/// Synthesise `n_samp` PCM samples from the harmonic model `phase`
/// (per-harmonic final phases from [`crate::phase::synthesize_phase`]),
/// windowing with `Pn` and overlap-adding against `mem.tail`.
pub fn synthesize(model: &Model, phase: &[f64], n_samp: usize, mem: &mut SynthMemory) -> Vec<i16> {
    let fft_len = (2 * n_samp).next_power_of_two();
    let mut spec = vec![Complex64::new(0.0, 0.0); fft_len];

    for m in 1..=model.l {
        let bin = (m as f64 * model.wo * fft_len as f64 / std::f64::consts::TAU).round() as usize;
        if bin < fft_len / 2 {
            let c = Complex64::from_polar(model.amp[m], phase[m]);
            spec[bin] += c;
            spec[fft_len - bin] += c.conj();
        }
    }

    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(fft_len);
    ifft.process(&mut spec);
    let time: Vec<f64> = spec.iter().map(|c| c.re).collect();

    let window = triangular_window(n_samp);
    let len2 = 2 * n_samp;
    let mut buf = vec![0.0f64; len2];
    for i in 0..len2.min(fft_len) {
        buf[i] = time[i] * window[i];
    }

    // Overlap-add: left half combines with the previous frame's tail.
    let mut out = vec![0.0f64; n_samp];
    for i in 0..n_samp {
        out[i] = buf[i] + mem.tail[i];
    }
    mem.tail = buf[n_samp..len2].to_vec();

    limiter(&mut out);
    out.iter().map(|&v| v.round() as i16).collect()
}

/// Ear-protection limiter: if any sample exceeds 30000, scale the whole
/// frame by `(30000/max)^2`, per spec.md §4.5.
fn limiter(buf: &mut [f64]) {
    let max_abs = buf.iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
    if max_abs > 30000.0 {
        let scale = (30000.0 / max_abs).powi(2);
        for v in buf.iter_mut() {
            *v *= scale;
        }
    }
}
