//! Cepstral minimum-phase synthesis and excitation phase tracking (C4),
//! grounded on `phase.c`'s `aks_to_M2`/`phase_synth_zero_order` shape.

use num_complex::Complex64;
use rand::Rng;
use rustfft::FftPlanner;

use crate::model::Model;

const N_FFT: usize = 128;

/// Accumulated excitation phase, advanced by `Wo * n_samp` each 10 ms
/// frame and wrapped to `(-pi, pi]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcitationPhase {
    pub ex_phase: f64,
}

impl ExcitationPhase {
    pub fn advance(&mut self, wo: f64, n_samp: usize) {
        self.ex_phase += wo * n_samp as f64;
        self.ex_phase = wrap_phase(self.ex_phase);
    }
}

fn wrap_phase(mut p: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    p %= tau;
    if p > std::f64::consts::PI {
        p -= tau;
    } else if p <= -std::f64::consts::PI {
        p += tau;
    }
    p
}

/// Build the real cepstrum of a rate-L dB magnitude envelope and sample
/// the resulting minimum-phase spectrum at each harmonic bin.
///
/// 1. Parabolic-interpolate the dB envelope onto the `N_FFT/2+1` grid.
/// 2. Build a symmetric log-magnitude spectrum (mirror the positive
///    half).
/// 3. Inverse-DFT to get the real cepstrum.
/// 4. Fold the cepstrum (`c'[0]=c[0]`, `c'[n]=c[n]+c[N-n]` for
///    `0<n<N/2`, `c'[N/2]=c[N/2]`, zero elsewhere) to get the
///    minimum-phase cepstrum.
/// 5. Forward-DFT and sample at harmonic bins `b = round(m*Wo*N/2pi)`.
pub fn minimum_phase_spectrum(amp_db: &[f64], model: &Model) -> Vec<Complex64> {
    let half = N_FFT / 2;
    let grid_db = resample_envelope_to_grid(amp_db, half + 1);

    // Symmetric full spectrum of length 2*N_FFT for the cepstrum IDFT.
    let full_len = 2 * N_FFT;
    let mut log_mag = vec![0.0f64; full_len];
    for i in 0..=half {
        log_mag[i] = grid_db[i] / 20.0 * std::f64::consts::LN_10; // dB -> ln(magnitude)
    }
    for i in 1..half {
        log_mag[full_len - i] = log_mag[i];
    }

    let mut spec: Vec<Complex64> = log_mag.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(full_len);
    ifft.process(&mut spec);
    let cepstrum: Vec<f64> = spec.iter().map(|c| c.re / full_len as f64).collect();

    let mut folded = vec![0.0f64; full_len];
    folded[0] = cepstrum[0];
    for n in 1..N_FFT {
        folded[n] = cepstrum[n] + cepstrum.get(full_len - n).copied().unwrap_or(0.0);
    }
    folded[N_FFT] = cepstrum[N_FFT];

    let mut fwd: Vec<Complex64> = folded.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let fft = planner.plan_fft_forward(full_len);
    fft.process(&mut fwd);

    let mut h = vec![Complex64::new(1.0, 0.0); model.l + 1];
    for m in 1..=model.l {
        let bin = (m as f64 * model.wo * full_len as f64 / std::f64::consts::TAU).round() as usize;
        let bin = bin.min(full_len - 1);
        h[m] = Complex64::from_polar(1.0, fwd[bin].im);
    }
    h
}

fn resample_envelope_to_grid(amp_db: &[f64], grid_len: usize) -> Vec<f64> {
    if amp_db.is_empty() {
        return vec![0.0; grid_len];
    }
    let mut out = vec![0.0; grid_len];
    for (i, slot) in out.iter_mut().enumerate() {
        let pos = i as f64 / (grid_len - 1).max(1) as f64 * (amp_db.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(amp_db.len() - 1);
        let frac = pos - lo as f64;
        *slot = amp_db[lo] + (amp_db[hi] - amp_db[lo]) * frac;
    }
    out
}

/// Generate per-harmonic phases for one frame. Voiced harmonics take
/// `m * ex_phase` plus the minimum-phase contribution; unvoiced
/// harmonics take a uniform random phase in `(-pi, pi]`.
pub fn synthesize_phase(
    model: &Model,
    h: &[Complex64],
    ex_phase: f64,
    rng: &mut impl Rng,
) -> Vec<f64> {
    let mut phase = vec![0.0; model.l + 1];
    for m in 1..=model.l {
        let excitation = if model.voiced {
            Complex64::from_polar(1.0, m as f64 * ex_phase)
        } else {
            Complex64::from_polar(1.0, rng.gen_range(-std::f64::consts::PI..=std::f64::consts::PI))
        };
        let combined = h.get(m).copied().unwrap_or(Complex64::new(1.0, 0.0)) * excitation;
        phase[m] = combined.arg();
    }
    phase
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_AMP;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_model(wo: f64, voiced: bool) -> Model {
        let mut m = Model::new(wo);
        m.voiced = voiced;
        for i in 1..=m.l.min(MAX_AMP) {
            m.amp[i] = 1.0;
        }
        m
    }

    #[test]
    fn excitation_phase_wraps_to_pi_range() {
        let mut ex = ExcitationPhase::default();
        for _ in 0..1000 {
            ex.advance(0.3, 80);
            assert!(ex.ex_phase > -std::f64::consts::PI && ex.ex_phase <= std::f64::consts::PI);
        }
    }

    #[test]
    fn minimum_phase_spectrum_has_unit_magnitude_harmonics() {
        let model = test_model(0.15, true);
        let db = vec![0.0; model.l];
        let h = minimum_phase_spectrum(&db, &model);
        for m in 1..=model.l {
            assert!((h[m].norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn unvoiced_phases_vary_across_harmonics() {
        let model = test_model(0.1, false);
        let db = vec![0.0; model.l];
        let h = minimum_phase_spectrum(&db, &model);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let phase = synthesize_phase(&model, &h, 0.0, &mut rng);
        let distinct = phase[1..].windows(2).filter(|w| (w[0] - w[1]).abs() > 1e-6).count();
        assert!(distinct > 0);
    }
}
