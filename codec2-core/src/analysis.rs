//! Sinusoidal analysis (C1): NLP pitch estimation followed by two-stage
//! harmonic amplitude/phase estimation, grounded on `nlp.c`.

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::constants::{C2Const, PE_FFT_SIZE};
use crate::lpc::hamming_window;
use crate::model::Model;

/// Rolling pitch-estimator state: squared-signal notch memory and a
/// one-frame F0 history used to bias the search toward continuity,
/// matching `nlp.c`'s persistent `NLP` struct.
#[derive(Debug, Clone)]
pub struct NlpState {
    notch_mem: f64,
    prev_f0: f64,
}

impl NlpState {
    pub fn new(c2const: &C2Const) -> Self {
        Self {
            notch_mem: 0.0,
            prev_f0: 1.0 / ((c2const.pmin() + c2const.pmax()) as f64 / 2.0),
        }
    }
}

/// 90 Hz first-order notch to remove DC/rumble before squaring, as in
/// `nlp.c`'s `notch` filter.
fn notch(buf: &[f64], mem: &mut f64) -> Vec<f64> {
    const COEFF: f64 = 0.95;
    let mut out = Vec::with_capacity(buf.len());
    for &x in buf {
        let y = x - *mem;
        *mem = x + COEFF * *mem - COEFF * y;
        out.push(y);
    }
    out
}

/// Estimate Wo (radians/sample) for the `m_pitch`-sample analysis buffer
/// `speech` (most recent `n_samp` samples are the current frame; the
/// rest is look-ahead/look-back history, per `nlp()`'s windowing).
pub fn estimate_pitch(speech: &[f64], c2const: &C2Const, state: &mut NlpState) -> f64 {
    let notched = notch(speech, &mut state.notch_mem);
    let squared: Vec<f64> = notched.iter().map(|x| x * x).collect();

    let fft_len = PE_FFT_SIZE;
    let mut buf: Vec<Complex64> = squared
        .iter()
        .rev()
        .take(fft_len)
        .rev()
        .map(|&v| Complex64::new(v, 0.0))
        .collect();
    while buf.len() < fft_len {
        buf.insert(0, Complex64::new(0.0, 0.0));
    }
    let mut windowed: Vec<f64> = buf.iter().map(|c| c.re).collect();
    hamming_window(&mut windowed);
    for (c, w) in buf.iter_mut().zip(windowed) {
        c.re = w;
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_len);
    fft.process(&mut buf);

    // Pitch period in samples maps to FFT bin index via
    // bin = fft_len / period; search the [pmin, pmax] period range.
    let pmin = c2const.pmin().max(1);
    let pmax = c2const.pmax().max(pmin + 1);
    let bin_hi = (fft_len / pmin).min(fft_len / 2 - 1);
    let bin_lo = (fft_len / pmax).max(1);

    let mag: Vec<f64> = buf.iter().map(|c| c.norm()).collect();

    let mut best_bin = bin_lo;
    let mut best_score = f64::MIN;
    let target_bin_for_prev = fft_len as f64 * state.prev_f0 / c2const.fs as f64;
    for bin in bin_lo..=bin_hi {
        // Bias the raw magnitude toward continuity with the previous
        // estimate, a coarse stand-in for `nlp.c`'s post-processing.
        let continuity = 1.0 + 0.15 / (1.0 + (bin as f64 - target_bin_for_prev).abs());
        let score = mag[bin] * continuity;
        if score > best_score {
            best_score = score;
            best_bin = bin;
        }
    }

    // Parabolic interpolation around the peak for sub-bin accuracy.
    let refined_bin = if best_bin > bin_lo && best_bin < bin_hi {
        let (ym1, y0, yp1) = (mag[best_bin - 1], mag[best_bin], mag[best_bin + 1]);
        let denom = ym1 - 2.0 * y0 + yp1;
        if denom.abs() > 1e-12 {
            best_bin as f64 + 0.5 * (ym1 - yp1) / denom
        } else {
            best_bin as f64
        }
    } else {
        best_bin as f64
    };

    let f0 = refined_bin.max(1.0) * c2const.fs as f64 / fft_len as f64;
    state.prev_f0 = f0;

    let wo = 2.0 * std::f64::consts::PI * f0 / c2const.fs as f64;
    wo.clamp(c2const.wo_min, c2const.wo_max)
}

/// Two-stage amplitude/phase estimation at harmonics of `wo`: DFT the
/// Hamming-windowed `m_pitch` buffer once, then for each harmonic `m`
/// sum `|Sw|^2` over a `+/- Wo/2` bin window around `m*Wo` and take
/// `A_m = sqrt(energy / window_energy)`.
pub fn estimate_model(speech: &[f64], wo: f64, c2const: &C2Const) -> Model {
    let mut model = Model::new(wo);

    let n = speech.len();
    let fft_len = n.next_power_of_two().max(PE_FFT_SIZE);
    let mut windowed = speech.to_vec();
    hamming_window(&mut windowed);
    let window_energy: f64 = {
        let mut w = vec![1.0; n];
        hamming_window(&mut w);
        w.iter().map(|v| v * v).sum()
    };

    let mut buf: Vec<Complex64> = windowed.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    buf.resize(fft_len, Complex64::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_len);
    fft.process(&mut buf);

    let bin_wo = fft_len as f64 * wo / (2.0 * std::f64::consts::PI);
    let half_window = (bin_wo / 2.0).max(1.0);

    for m in 1..=model.l {
        let center = m as f64 * bin_wo;
        let lo = (center - half_window).floor().max(0.0) as usize;
        let hi = ((center + half_window).ceil() as usize).min(fft_len / 2);

        let mut energy = 0.0;
        let mut phase_acc = Complex64::new(0.0, 0.0);
        for b in lo..=hi.max(lo) {
            if b < buf.len() {
                energy += buf[b].norm_sqr();
                phase_acc += buf[b];
            }
        }
        model.amp[m] = (energy / window_energy.max(1e-9)).sqrt();
        model.phase[m] = phase_acc.arg();
    }

    // Simple voicing decision: ratio of harmonic energy to total frame
    // energy above a fixed threshold, following the MBE voicing shape
    // spec.md §4.1(c) describes (no `sine.c` exists in the retrieved pack).
    let harmonic_energy: f64 = model.amps().iter().map(|a| a * a).sum();
    let total_energy: f64 = speech.iter().map(|s| s * s).sum::<f64>().max(1e-9);
    model.voiced = harmonic_energy / total_energy > 0.25;

    model
}
