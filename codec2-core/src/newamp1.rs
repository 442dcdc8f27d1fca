//! Rate-K mel quantiser (C3, "newamp1"): harmonic-to-rate-K resampling,
//! mean removal, two-stage mbest VQ, Wo coding, decoder postfilter, and
//! the encoder-side equaliser. Grounded on `newamp1.c`.

use crate::codebooks;
use crate::constants::{NEWAMP1_F_HIGH_HZ, NEWAMP1_F_LOW_HZ, NEWAMP1_K};
use crate::mbest::{MbestList, mbest_search, residual, MBEST_STAGES};
use crate::model::{unvoiced_wo, Model};

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// The K=20 mel-spaced analysis frequencies, fixed for the life of the
/// process (pure function of `NEWAMP1_F_LOW_HZ`/`NEWAMP1_F_HIGH_HZ`).
pub fn mel_grid() -> [f64; NEWAMP1_K] {
    let m_lo = hz_to_mel(NEWAMP1_F_LOW_HZ);
    let m_hi = hz_to_mel(NEWAMP1_F_HIGH_HZ);
    let mut grid = [0.0; NEWAMP1_K];
    for (k, slot) in grid.iter_mut().enumerate() {
        let m = m_lo + (m_hi - m_lo) * k as f64 / (NEWAMP1_K as f64 - 1.0);
        *slot = mel_to_hz(m);
    }
    grid
}

/// Resample a harmonic magnitude envelope onto the rate-K mel grid:
/// `AmdB_m = 20*log10(A_m)`, clipped to `[peak-50dB, peak]`, then
/// piecewise-parabolic interpolated (with `L+2` anchors: 0 dB endpoints
/// at 0 Hz and Fs/2) onto each mel frequency.
pub fn resample_to_rate_k(model: &Model, fs: usize) -> [f64; NEWAMP1_K] {
    let amps = model.amps();
    let mut peak_db = f64::MIN;
    let mut db: Vec<f64> = amps
        .iter()
        .map(|&a| 20.0 * a.max(1e-6).log10())
        .collect();
    for &v in &db {
        if v > peak_db {
            peak_db = v;
        }
    }
    for v in db.iter_mut() {
        *v = v.max(peak_db - 50.0);
    }

    // Anchors: 0 Hz, each harmonic center, Fs/2, dB-clamped at the
    // two endpoints per spec.
    let mut anchor_hz = Vec::with_capacity(amps.len() + 2);
    let mut anchor_db = Vec::with_capacity(amps.len() + 2);
    anchor_hz.push(0.0);
    anchor_db.push(0.0);
    for (m, &v) in db.iter().enumerate() {
        anchor_hz.push((m + 1) as f64 * model.wo * fs as f64 / (2.0 * std::f64::consts::PI));
        anchor_db.push(v);
    }
    anchor_hz.push(fs as f64 / 2.0);
    anchor_db.push(0.0);

    let grid = mel_grid();
    let mut out = [0.0; NEWAMP1_K];
    for (k, &f) in grid.iter().enumerate() {
        out[k] = parabolic_interp(&anchor_hz, &anchor_db, f);
    }
    out
}

/// Piecewise-parabolic interpolation through `(x, y)` anchors at `query`.
fn parabolic_interp(xs: &[f64], ys: &[f64], query: f64) -> f64 {
    let n = xs.len();
    if n == 0 {
        return 0.0;
    }
    if query <= xs[0] {
        return ys[0];
    }
    if query >= xs[n - 1] {
        return ys[n - 1];
    }
    let mut i = 1;
    while i < n - 1 && xs[i] < query {
        i += 1;
    }
    // Use the triple (i-1, i, i+1) when available, else linear fallback.
    if i + 1 < n && i >= 1 {
        let (x0, x1, x2) = (xs[i - 1], xs[i], xs[i + 1]);
        let (y0, y1, y2) = (ys[i - 1], ys[i], ys[i + 1]);
        lagrange3(x0, y0, x1, y1, x2, y2, query)
    } else {
        let (x0, x1) = (xs[i - 1], xs[i]);
        let (y0, y1) = (ys[i - 1], ys[i]);
        y0 + (y1 - y0) * (query - x0) / (x1 - x0)
    }
}

fn lagrange3(x0: f64, y0: f64, x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    let l0 = (x - x1) * (x - x2) / ((x0 - x1) * (x0 - x2));
    let l1 = (x - x0) * (x - x2) / ((x1 - x0) * (x1 - x2));
    let l2 = (x - x0) * (x - x1) / ((x2 - x0) * (x2 - x1));
    y0 * l0 + y1 * l1 + y2 * l2
}

/// Mean of a rate-K vector across its 20 bins.
pub fn mean(vec: &[f64; NEWAMP1_K]) -> f64 {
    vec.iter().sum::<f64>() / NEWAMP1_K as f64
}

/// Nearest entry in the 16-point mean codebook.
pub fn encode_mean(m: f64) -> u32 {
    let cb = codebooks::newamp1_mean_codebook();
    let mut best = 0usize;
    let mut best_err = f32::MAX;
    for (i, &v) in cb.iter().enumerate() {
        let e = (v as f64 - m).abs() as f32;
        if e < best_err {
            best_err = e;
            best = i;
        }
    }
    best as u32
}

pub fn decode_mean(idx: u32) -> f64 {
    codebooks::newamp1_mean_codebook()[idx as usize] as f64
}

/// Index pair for the two-stage mel-vector VQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Newamp1VqIndex {
    pub stage1: usize,
    pub stage2: usize,
}

/// Two-stage mbest VQ of the mean-removed rate-K vector: 9 bits/stage,
/// beam width 5 between stages.
pub fn encode_vq(mean_removed: &[f64; NEWAMP1_K]) -> Newamp1VqIndex {
    let vq = codebooks::newamp1_vq();
    let target: Vec<f32> = mean_removed.iter().map(|&v| v as f32).collect();

    let mut beam1 = MbestList::new(5);
    mbest_search(
        &vq.stage1,
        &target,
        NEWAMP1_K,
        vq.entries_per_stage,
        &mut beam1,
        0,
        [0; MBEST_STAGES],
    );
    let idx1 = beam1.best().index[0];
    let resid = residual(&target, &vq.stage1, NEWAMP1_K, idx1);

    let mut beam2 = MbestList::new(5);
    mbest_search(
        &vq.stage2,
        &resid,
        NEWAMP1_K,
        vq.entries_per_stage,
        &mut beam2,
        0,
        [0; MBEST_STAGES],
    );
    let idx2 = beam2.best().index[0];

    Newamp1VqIndex {
        stage1: idx1,
        stage2: idx2,
    }
}

pub fn decode_vq(idx: Newamp1VqIndex) -> [f64; NEWAMP1_K] {
    let vq = codebooks::newamp1_vq();
    let mut out = [0.0; NEWAMP1_K];
    let s1 = &vq.stage1[idx.stage1 * NEWAMP1_K..idx.stage1 * NEWAMP1_K + NEWAMP1_K];
    let s2 = &vq.stage2[idx.stage2 * NEWAMP1_K..idx.stage2 * NEWAMP1_K + NEWAMP1_K];
    for k in 0..NEWAMP1_K {
        out[k] = (s1[k] + s2[k]) as f64;
    }
    out
}

const WO_BITS_NEWAMP1: u32 = 6;

/// 6-bit log-domain Wo index. Index 0 means *unvoiced*.
pub fn encode_wo(wo: f64, voiced: bool, wo_min: f64, wo_max: f64) -> u32 {
    if !voiced {
        return 0;
    }
    let levels = (1u32 << WO_BITS_NEWAMP1) - 1; // reserve index 0
    let log_lo = wo_min.ln();
    let log_hi = wo_max.ln();
    let frac = ((wo.clamp(wo_min, wo_max).ln() - log_lo) / (log_hi - log_lo)).clamp(0.0, 1.0);
    1 + (frac * (levels - 1) as f64).round() as u32
}

/// Inverse of [`encode_wo`]. Returns `(Wo, voiced)`; index 0 decodes to
/// the unvoiced default `2*pi/100`.
pub fn decode_wo(idx: u32, wo_min: f64, wo_max: f64) -> (f64, bool) {
    if idx == 0 {
        return (unvoiced_wo(), false);
    }
    let levels = (1u32 << WO_BITS_NEWAMP1) - 1;
    let log_lo = wo_min.ln();
    let log_hi = wo_max.ln();
    let frac = (idx - 1) as f64 / (levels - 1) as f64;
    (((log_lo + frac * (log_hi - log_lo))).exp(), true)
}

/// Decoder-side postfilter: pre-emphasise by `20*log10(f_k/0.3)` dB,
/// apply `gain` (1.2-1.5), renormalise so total energy is unchanged,
/// then undo the pre-emphasis. Applied to the mean-removed vector.
pub fn postfilter(mean_removed: &mut [f64; NEWAMP1_K], gain: f64) {
    let grid = mel_grid();
    let pre: Vec<f64> = grid.iter().map(|&f| 20.0 * (f / 0.3).log10()).collect();

    let energy_before: f64 = mean_removed.iter().map(|v| 10f64.powf(v / 10.0)).sum();

    let mut boosted = [0.0; NEWAMP1_K];
    for k in 0..NEWAMP1_K {
        boosted[k] = (mean_removed[k] + pre[k]) * gain;
    }
    let energy_after: f64 = boosted.iter().map(|v| 10f64.powf(v / 10.0)).sum();
    let renorm_db = 10.0 * (energy_before.max(1e-9) / energy_after.max(1e-9)).log10();
    for k in 0..NEWAMP1_K {
        mean_removed[k] = boosted[k] + renorm_db - pre[k];
    }
}

/// Slow leaky (gain 0.02) spectral-tilt equaliser, applied encoder-side
/// before VQ. `ideal` is the running estimate, updated in place.
pub fn equalise(ideal: &mut [f64; NEWAMP1_K], rate_k: &mut [f64; NEWAMP1_K]) {
    const LEAK: f64 = 0.02;
    for k in 0..NEWAMP1_K {
        ideal[k] = (1.0 - LEAK) * ideal[k] + LEAK * rate_k[k];
        rate_k[k] -= ideal[k];
    }
}

/// Linearly interpolate two rate-K vectors at `frac` in `[0, 1]`.
pub fn interpolate_rate_k(
    prev: &[f64; NEWAMP1_K],
    cur: &[f64; NEWAMP1_K],
    frac: f64,
) -> [f64; NEWAMP1_K] {
    let mut out = [0.0; NEWAMP1_K];
    for k in 0..NEWAMP1_K {
        out[k] = prev[k] + (cur[k] - prev[k]) * frac;
    }
    out
}

/// Interpolate Wo across the 4-frame (40 ms) envelope update interval.
/// Linear in Wo when both endpoints are voiced; otherwise the unvoiced
/// default, biasing voicing toward the voiced end as spec requires.
pub fn interpolate_wo(
    prev_wo: f64,
    prev_voiced: bool,
    cur_wo: f64,
    cur_voiced: bool,
    frac: f64,
) -> (f64, bool) {
    match (prev_voiced, cur_voiced) {
        (true, true) => (prev_wo + (cur_wo - prev_wo) * frac, true),
        (false, false) => (unvoiced_wo(), false),
        // Mixed: bias the voicing decision toward the voiced endpoint
        // for the half of the interval nearer to it.
        (true, false) => (if frac < 0.5 { prev_wo } else { unvoiced_wo() }, frac < 0.5),
        (false, true) => (if frac >= 0.5 { cur_wo } else { unvoiced_wo() }, frac >= 0.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_grid_spans_low_to_high() {
        let grid = mel_grid();
        assert!((grid[0] - NEWAMP1_F_LOW_HZ).abs() < 1.0);
        assert!((grid[NEWAMP1_K - 1] - NEWAMP1_F_HIGH_HZ).abs() < 1.0);
        for pair in grid.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn mean_and_vq_round_trip_shapes() {
        let mut rate_k = [0.0; NEWAMP1_K];
        for (k, v) in rate_k.iter_mut().enumerate() {
            *v = 10.0 + (k as f64).sin() * 3.0;
        }
        let m = mean(&rate_k);
        let mean_idx = encode_mean(m);
        let decoded_mean = decode_mean(mean_idx);
        assert!((decoded_mean - m).abs() < 5.0);

        let mut removed = rate_k;
        for v in removed.iter_mut() {
            *v -= m;
        }
        let vq_idx = encode_vq(&removed);
        let decoded = decode_vq(vq_idx);
        assert_eq!(decoded.len(), NEWAMP1_K);
    }

    #[test]
    fn wo_index_zero_is_reserved_for_unvoiced() {
        let (wo, voiced) = decode_wo(0, 0.01, 0.5);
        assert!(!voiced);
        assert!((wo - unvoiced_wo()).abs() < 1e-9);
    }

    #[test]
    fn wo_round_trips_approximately_when_voiced() {
        let wo_min = 0.01;
        let wo_max = 0.5;
        let wo = 0.1;
        let idx = encode_wo(wo, true, wo_min, wo_max);
        assert!(idx > 0);
        let (decoded, voiced) = decode_wo(idx, wo_min, wo_max);
        assert!(voiced);
        assert!((decoded - wo).abs() < 0.01);
    }

    #[test]
    fn equaliser_converges_ideal_toward_input_tilt() {
        let mut ideal = [0.0; NEWAMP1_K];
        let mut tilt = [0.0; NEWAMP1_K];
        for (k, v) in tilt.iter_mut().enumerate() {
            *v = k as f64;
        }
        for _ in 0..500 {
            let mut frame = tilt;
            equalise(&mut ideal, &mut frame);
        }
        for k in 0..NEWAMP1_K {
            assert!((ideal[k] - tilt[k]).abs() < 1.0);
        }
    }
}
