//! LSP, energy, and joint Wo-energy quantisers (C2), grounded on
//! `quantise.c`'s scalar/LSPd/JMV quantiser families and the Wo/energy
//! joint VQ used by the 2400/1400/1200 modes.

use crate::codebooks::{self, LspScalarCodebooks};
use crate::constants::{E_BITS, E_MAX_DB, E_MIN_DB, LPC_ORD, WO_E_BITS};
use crate::lsp::check_lsp_order;
use crate::mbest::{self, MbestList, MBEST_STAGES};

/// Quantise `lsp[i]` against its own scalar codebook, returning the
/// nearest index per coefficient.
pub fn encode_lsp_scalar(lsp: &[f64; LPC_ORD]) -> [u32; LPC_ORD] {
    let cb = codebooks::lsp_scalar_codebooks();
    let mut idx = [0u32; LPC_ORD];
    for i in 0..LPC_ORD {
        idx[i] = nearest_scalar(&cb.tables[i], lsp[i] as f32);
    }
    idx
}

pub fn decode_lsp_scalar(idx: &[u32; LPC_ORD]) -> [f64; LPC_ORD] {
    let cb = codebooks::lsp_scalar_codebooks();
    let mut lsp = [0.0f64; LPC_ORD];
    for i in 0..LPC_ORD {
        lsp[i] = cb.tables[i][idx[i] as usize] as f64;
    }
    let mut out = lsp;
    check_lsp_order(&mut out);
    out
}

/// Differential scalar (LSPd): each coefficient is coded against the
/// *previously decoded* coefficient, so encoder and decoder stay in sync
/// under quantisation error (matches `encode_lspds_scalar`/`decode_lspds_scalar`).
pub fn encode_lsp_lspd(lsp: &[f64; LPC_ORD]) -> [u32; LPC_ORD] {
    let cb = &codebooks::lspd_scalar_codebooks().tables;
    let mut idx = [0u32; LPC_ORD];
    let mut prev_decoded = 0.0f64;
    for i in 0..LPC_ORD {
        let delta = lsp[i] - prev_decoded;
        let j = nearest_scalar(&cb[i], delta as f32);
        idx[i] = j;
        prev_decoded += cb[i][j as usize] as f64;
    }
    idx
}

pub fn decode_lsp_lspd(idx: &[u32; LPC_ORD]) -> [f64; LPC_ORD] {
    let cb = &codebooks::lspd_scalar_codebooks().tables;
    let mut lsp = [0.0f64; LPC_ORD];
    let mut prev = 0.0f64;
    for i in 0..LPC_ORD {
        prev += cb[i][idx[i] as usize] as f64;
        lsp[i] = prev;
    }
    check_lsp_order(&mut lsp);
    lsp
}

/// Per-coefficient adjacency-gap weight `w_i = 1 / (0.01 + min(gap to
/// neighbours))`, used by the predictive VQ search.
fn gap_weights(lsp: &[f64; LPC_ORD]) -> [f64; LPC_ORD] {
    let mut w = [0.0f64; LPC_ORD];
    for i in 0..LPC_ORD {
        let left = if i > 0 {
            Some((lsp[i] - lsp[i - 1]).abs())
        } else {
            None
        };
        let right = if i + 1 < LPC_ORD {
            Some((lsp[i + 1] - lsp[i]).abs())
        } else {
            None
        };
        let gap = match (left, right) {
            (Some(l), Some(r)) => l.min(r),
            (Some(l), None) => l,
            (None, Some(r)) => r,
            (None, None) => 1.0,
        };
        w[i] = 1.0 / (0.01 + gap);
    }
    w
}

/// Index path for the 3-stage predictive VQ: stage 0 over all 10 dims,
/// stages 1/2 over the even/odd 5-dim halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredVqIndex {
    pub stage0: usize,
    pub stage1: usize,
    pub stage2: usize,
}

/// Predictive (JMV) multistage VQ encode: weighted nearest-neighbour
/// search, stage 0 against the full 10-dim vector, stages 1/2 against the
/// even/odd-indexed residual halves.
pub fn encode_lsp_pred_vq(lsp: &[f64; LPC_ORD]) -> PredVqIndex {
    let vq = codebooks::lsp_pred_vq();
    let w = gap_weights(lsp);

    let stage0 = &vq.stages[0];
    let target0: Vec<f32> = (0..LPC_ORD).map(|i| (lsp[i] * w[i].sqrt()) as f32).collect();
    let weighted_cb0: Vec<f32> = stage0
        .data
        .iter()
        .enumerate()
        .map(|(n, &v)| v * w[n % LPC_ORD].sqrt() as f32)
        .collect();
    let mut beam0 = MbestList::new(5);
    mbest::mbest_search(
        &weighted_cb0,
        &target0,
        LPC_ORD,
        stage0.entries,
        &mut beam0,
        0,
        [0; MBEST_STAGES],
    );
    let stage0_idx = beam0.best().index[0];
    let residual = mbest::residual(
        &lsp.map(|v| v as f32),
        &stage0.data,
        LPC_ORD,
        stage0_idx,
    );

    let (even, odd): (Vec<f32>, Vec<f32>) = residual
        .iter()
        .enumerate()
        .fold((Vec::new(), Vec::new()), |(mut e, mut o), (i, &v)| {
            if i % 2 == 0 {
                e.push(v);
            } else {
                o.push(v);
            }
            (e, o)
        });

    let stage1_idx = nearest_vq(&vq.stages[1], &even);
    let stage2_idx = nearest_vq(&vq.stages[2], &odd);

    PredVqIndex {
        stage0: stage0_idx,
        stage1: stage1_idx,
        stage2: stage2_idx,
    }
}

fn nearest_vq(stage: &codebooks::PvqStage, target: &[f32]) -> usize {
    let mut best = 0;
    let mut best_err = f32::MAX;
    for j in 0..stage.entries {
        let row = &stage.data[j * stage.dim..j * stage.dim + stage.dim];
        let e: f32 = row
            .iter()
            .zip(target)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if e < best_err {
            best_err = e;
            best = j;
        }
    }
    best
}

pub fn decode_lsp_pred_vq(idx: PredVqIndex) -> [f64; LPC_ORD] {
    let vq = codebooks::lsp_pred_vq();
    let s0 = &vq.stages[0].data[idx.stage0 * LPC_ORD..idx.stage0 * LPC_ORD + LPC_ORD];
    let dim1 = vq.stages[1].dim;
    let dim2 = vq.stages[2].dim;
    let s1 = &vq.stages[1].data[idx.stage1 * dim1..idx.stage1 * dim1 + dim1];
    let s2 = &vq.stages[2].data[idx.stage2 * dim2..idx.stage2 * dim2 + dim2];

    let mut lsp = [0.0f64; LPC_ORD];
    for i in 0..LPC_ORD {
        let residual = if i % 2 == 0 { s1[i / 2] } else { s2[i / 2] };
        lsp[i] = (s0[i] + residual) as f64;
    }
    check_lsp_order(&mut lsp);
    lsp
}

fn nearest_scalar(table: &[f32], value: f32) -> u32 {
    let mut best = 0usize;
    let mut best_err = f32::MAX;
    for (i, &v) in table.iter().enumerate() {
        let e = (v - value).abs();
        if e < best_err {
            best_err = e;
            best = i;
        }
    }
    best as u32
}

/// 5-bit uniform-in-dB energy quantiser spanning `[E_MIN_DB, E_MAX_DB]`.
pub fn encode_energy(e: f64) -> u32 {
    let db = 10.0 * (e.max(1e-9)).log10();
    let levels = 1u32 << E_BITS;
    let clamped = db.clamp(E_MIN_DB, E_MAX_DB);
    let step = (E_MAX_DB - E_MIN_DB) / (levels as f64 - 1.0);
    (((clamped - E_MIN_DB) / step).round() as u32).min(levels - 1)
}

pub fn decode_energy(idx: u32) -> f64 {
    let levels = 1u32 << E_BITS;
    let step = (E_MAX_DB - E_MIN_DB) / (levels as f64 - 1.0);
    let db = E_MIN_DB + idx as f64 * step;
    10f64.powf(db / 10.0)
}

/// Predictor + running history for the joint Wo-energy VQ, one instance
/// per encoder/decoder direction, matching the 2-float predictor state
/// the encoder/decoder own.
#[derive(Debug, Clone, Copy, Default)]
pub struct WoeVqState {
    pub prev_x_wo: f64,
    pub prev_x_e: f64,
}

const PREDICT_WO: f64 = 0.8;
const PREDICT_E: f64 = 0.9;

fn x_wo_of(wo: f64) -> f64 {
    (4000.0 * wo / (std::f64::consts::PI * 50.0)).log2()
}

fn wo_of_x(x_wo: f64) -> f64 {
    std::f64::consts::PI * 50.0 / 4000.0 * 2f64.powf(x_wo)
}

fn x_e_of(e: f64) -> f64 {
    10.0 * (1e-4 + e).log10()
}

fn e_of_x(x_e: f64) -> f64 {
    10f64.powf(x_e / 10.0) - 1e-4
}

/// Search weights, adapted to voicing stability and energy trajectory per
/// the joint Wo-E table: baseline `30^2`/`1^2`, scaled by the listed
/// conditions on `x_e`/`delta_x_wo`/`prev_x_e`.
fn woe_weights(x_e: f64, delta_x_wo: f64, prev_x_e: f64) -> (f64, f64) {
    let mut w_wo = 30.0 * 30.0;
    let mut w_e = 1.0 * 1.0;

    if x_e < 0.0 {
        w_wo *= 0.6 * 0.6;
        w_e *= 0.3 * 0.3;
        if x_e < -10.0 {
            w_wo *= 0.3 * 0.3;
            w_e *= 0.3 * 0.3;
        }
    }
    if delta_x_wo.abs() < 0.2 {
        w_wo *= 2.0 * 2.0;
        w_e *= 1.5 * 1.5;
    }
    if delta_x_wo.abs() > 0.5 {
        w_wo *= 0.5 * 0.5;
    }
    if x_e < prev_x_e - 10.0 {
        w_e *= 0.5 * 0.5;
        if x_e < prev_x_e - 20.0 {
            w_e *= 0.5 * 0.5;
        }
    }
    (w_wo, w_e)
}

/// Encode `(Wo, E)` as a residual index into the 256-entry joint
/// codebook, updating `state`'s predictor history in place.
pub fn encode_woe(state: &mut WoeVqState, wo: f64, e: f64) -> u32 {
    let x_wo = x_wo_of(wo);
    let x_e = x_e_of(e);

    let pred_wo = PREDICT_WO * state.prev_x_wo;
    let pred_e = PREDICT_E * state.prev_x_e;
    let res_wo = x_wo - pred_wo;
    let res_e = x_e - pred_e;

    let (w_wo, w_e) = woe_weights(x_e, x_wo - state.prev_x_wo, state.prev_x_e);

    let cb = codebooks::woe_codebook();
    let entries = cb.len() / 2;
    let mut best = 0usize;
    let mut best_err = f64::MAX;
    for j in 0..entries {
        let cwo = cb[j * 2] as f64;
        let ce = cb[j * 2 + 1] as f64;
        let err = w_wo * (cwo - res_wo).powi(2) + w_e * (ce - res_e).powi(2);
        if err < best_err {
            best_err = err;
            best = j;
        }
    }

    state.prev_x_wo = pred_wo + cb[best * 2] as f64;
    state.prev_x_e = pred_e + cb[best * 2 + 1] as f64;
    best as u32
}

/// Decode a joint Wo-E index, updating `state`'s predictor history and
/// returning `(Wo, E)`. Per the documented deviation from the original,
/// both decoded Wo *and* decoded E are clamped to their valid ranges
/// (the original only clamps Wo).
pub fn decode_woe(state: &mut WoeVqState, idx: u32, wo_min: f64, wo_max: f64) -> (f64, f64) {
    let cb = codebooks::woe_codebook();
    let j = idx as usize;
    let x_wo = PREDICT_WO * state.prev_x_wo + cb[j * 2] as f64;
    let mut x_e = PREDICT_E * state.prev_x_e + cb[j * 2 + 1] as f64;

    state.prev_x_wo = x_wo;
    state.prev_x_e = x_e;

    let wo = wo_of_x(x_wo).clamp(wo_min, wo_max);

    x_e = x_e.clamp(E_MIN_DB, E_MAX_DB);
    let e = e_of_x(x_e);
    (wo, e)
}

#[allow(dead_code)]
fn woe_bits_hint() -> u32 {
    WO_E_BITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip_stays_ordered_and_close() {
        let lsp = crate::lsp::benign_lsps(LPC_ORD);
        let lsp: [f64; LPC_ORD] = lsp.try_into().unwrap();
        let idx = encode_lsp_scalar(&lsp);
        let decoded = decode_lsp_scalar(&idx);
        for pair in decoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn lspd_round_trip_stays_ordered() {
        let lsp = crate::lsp::benign_lsps(LPC_ORD);
        let lsp: [f64; LPC_ORD] = lsp.try_into().unwrap();
        let idx = encode_lsp_lspd(&lsp);
        let decoded = decode_lsp_lspd(&idx);
        for pair in decoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn pred_vq_round_trip_stays_ordered() {
        let lsp = crate::lsp::benign_lsps(LPC_ORD);
        let lsp: [f64; LPC_ORD] = lsp.try_into().unwrap();
        let idx = encode_lsp_pred_vq(&lsp);
        let decoded = decode_lsp_pred_vq(idx);
        for pair in decoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn energy_quantiser_round_trips_within_one_step() {
        let step = (E_MAX_DB - E_MIN_DB) / ((1u32 << E_BITS) as f64 - 1.0);
        for &e_db in &[-10.0, -3.0, 0.0, 12.5, 39.0] {
            let e = 10f64.powf(e_db / 10.0);
            let idx = encode_energy(e);
            let decoded = decode_energy(idx);
            let decoded_db = 10.0 * decoded.log10();
            assert!((decoded_db - e_db).abs() <= step);
        }
    }

    #[test]
    fn encode_energy_clamps_out_of_range_input() {
        assert_eq!(encode_energy(10f64.powf(100.0 / 10.0)), (1u32 << E_BITS) - 1);
        assert_eq!(encode_energy(1e-12), 0);
    }

    #[test]
    fn woe_round_trip_tracks_predictor_state() {
        let mut enc_state = WoeVqState::default();
        let mut dec_state = WoeVqState::default();
        let wo_min = 2.0 * std::f64::consts::PI / (8000.0 * crate::constants::P_MAX_S);
        let wo_max = 2.0 * std::f64::consts::PI / (8000.0 * crate::constants::P_MIN_S);

        let frames = [(0.08, 400.0), (0.082, 420.0), (0.079, 380.0)];
        for &(wo, e) in &frames {
            let idx = encode_woe(&mut enc_state, wo, e);
            let (wo_d, e_d) = decode_woe(&mut dec_state, idx, wo_min, wo_max);
            assert!(wo_d >= wo_min && wo_d <= wo_max);
            assert!(e_d > 0.0);
        }
    }

    #[test]
    fn decode_woe_clamps_energy() {
        // Force a predictor history that would push x_e far outside
        // [E_MIN_DB, E_MAX_DB] absent clamping.
        let mut state = WoeVqState {
            prev_x_wo: 0.0,
            prev_x_e: 1000.0,
        };
        let wo_min = 2.0 * std::f64::consts::PI / (8000.0 * crate::constants::P_MAX_S);
        let wo_max = 2.0 * std::f64::consts::PI / (8000.0 * crate::constants::P_MIN_S);
        let (_, e) = decode_woe(&mut state, 0, wo_min, wo_max);
        let e_db = 10.0 * e.log10();
        assert!(e_db <= E_MAX_DB + 1e-6);
        assert!(e_db >= E_MIN_DB - 1e-6);
    }
}
