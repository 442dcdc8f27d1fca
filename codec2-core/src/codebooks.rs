//! Process-wide, read-only VQ codebook statics.
//!
//! Per spec §9 ("Global mutable state via process-wide codebook statics"),
//! codebooks are modeled as `&'static [f32]` slices behind [`once_cell`],
//! shared read-only by every session with no lifetime coupling. Training
//! codebooks from a speech corpus (`vqtrain`/`vq_mbest`/`vq_binary_switch`
//! in the original sources) is explicitly out of this spec's scope — these
//! are procedurally generated, deterministic stand-ins ("new codebooks may
//! be trained", per spec.md's Non-goals). [`load_codebook`] lets a caller
//! swap one out for an experiment, per `codec2_load_codebook` in the
//! original API.
use once_cell::sync::{Lazy, OnceCell};
use std::sync::RwLock;

use crate::constants::{LPC_ORD, NEWAMP1_K};

fn lcg_next(state: &mut u64) -> f32 {
    // xorshift64*, deterministic and allocation-free; used only to seed
    // smooth synthetic codebook entries, never in any hot path.
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    ((*state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
}

/// Build a codebook of `entries` vectors of dimension `k`, each a sum of a
/// few low-order cosines — smooth, envelope-like, and fully deterministic
/// given `seed`.
fn synth_envelope_codebook(entries: usize, k: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut state = seed | 1;
    let mut out = vec![0.0f32; entries * k];
    for e in 0..entries {
        let n_bases = 3;
        let mut bases = Vec::with_capacity(n_bases);
        for _ in 0..n_bases {
            let freq = lcg_next(&mut state).abs() * 4.0;
            let phase = lcg_next(&mut state) * std::f32::consts::PI;
            let amp = lcg_next(&mut state);
            bases.push((freq, phase, amp));
        }
        for i in 0..k {
            let x = i as f32 / k.max(1) as f32;
            let mut v = 0.0f32;
            for &(freq, phase, amp) in &bases {
                v += amp * (std::f32::consts::TAU * freq * x + phase).cos();
            }
            out[e * k + i] = v * scale;
        }
    }
    out
}

/// Build a monotone-ish scalar codebook spanning `[lo, hi]` with `levels`
/// entries — used for the per-index LSP scalar codebooks, which in the
/// original are near-uniform quantisers of each LSP's typical range.
fn synth_scalar_codebook(levels: usize, lo: f32, hi: f32) -> Vec<f32> {
    (0..levels)
        .map(|i| lo + (hi - lo) * i as f32 / (levels.saturating_sub(1).max(1) as f32))
        .collect()
}

/// One LSP scalar codebook per coefficient index.
pub struct LspScalarCodebooks {
    pub bits: [u32; LPC_ORD],
    pub tables: Vec<Vec<f32>>,
}

/// Bit allocation across the 10 scalar LSP codebooks, summing to 36 bits,
/// biased toward the low-order (perceptually dominant) coefficients —
/// following the shape (not the exact values) of `quantise.c`'s per-index
/// tables.
pub const LSP_SCALAR_BITS: [u32; LPC_ORD] = [5, 5, 4, 4, 4, 4, 3, 3, 2, 2];

static LSP_SCALAR: Lazy<LspScalarCodebooks> = Lazy::new(|| {
    let tables = LSP_SCALAR_BITS
        .iter()
        .enumerate()
        .map(|(i, &bits)| {
            let levels = 1usize << bits;
            // Nominal LSP positions spread roughly evenly across (0, pi),
            // each codebook covering +/- one inter-coefficient spacing.
            let center = std::f32::consts::PI * (i as f32 + 1.0) / (LPC_ORD as f32 + 1.0);
            let half_span = std::f32::consts::PI / (LPC_ORD as f32 + 1.0);
            synth_scalar_codebook(levels, center - half_span, center + half_span)
        })
        .collect();
    LspScalarCodebooks {
        bits: LSP_SCALAR_BITS,
        tables,
    }
});

pub fn lsp_scalar_codebooks() -> &'static LspScalarCodebooks {
    &LSP_SCALAR
}

/// Differential LSP scalar codebooks (LSPd): same bit budget, but each
/// table spans a signed delta range since it codes `omega_i - omega_hat_{i-1}`.
static LSPD_SCALAR: Lazy<LspScalarCodebooks> = Lazy::new(|| {
    let tables = LSP_SCALAR_BITS
        .iter()
        .map(|&bits| {
            let levels = 1usize << bits;
            synth_scalar_codebook(levels, -0.3, 0.3)
        })
        .collect();
    LspScalarCodebooks {
        bits: LSP_SCALAR_BITS,
        tables,
    }
});

pub fn lspd_scalar_codebooks() -> &'static LspScalarCodebooks {
    &LSPD_SCALAR
}

/// Predictive multistage VQ (JMV) codebook for one stage.
pub struct PvqStage {
    pub dim: usize,
    pub entries: usize,
    pub data: Vec<f32>,
}

/// Bit allocation for the 3-stage predictive VQ: stage 0 is full
/// dimension (10), stages 1/2 split even/odd dims (5 each). 9 bits/stage
/// sums to the 27-bit total spec.md gives for JMV.
pub const LSP_PRED_VQ_BITS: [u32; 3] = [9, 9, 9];

pub struct LspPredVq {
    pub stages: Vec<PvqStage>,
}

static LSP_PRED_VQ: Lazy<LspPredVq> = Lazy::new(|| {
    let dims = [LPC_ORD, LPC_ORD / 2, LPC_ORD / 2];
    let stages = LSP_PRED_VQ_BITS
        .iter()
        .zip(dims.iter())
        .enumerate()
        .map(|(stage, (&bits, &dim))| {
            let entries = 1usize << bits;
            let data = synth_envelope_codebook(entries, dim, 0xC0DE_0000 + stage as u64, 0.35);
            PvqStage { dim, entries, data }
        })
        .collect();
    LspPredVq { stages }
});

pub fn lsp_pred_vq() -> &'static LspPredVq {
    &LSP_PRED_VQ
}

/// newamp1 mean codebook: 16 entries (4 bits), spans a typical rate-K mean
/// dB range.
static NEWAMP1_MEAN_CB: Lazy<Vec<f32>> = Lazy::new(|| synth_scalar_codebook(16, -20.0, 40.0));

pub fn newamp1_mean_codebook() -> &'static [f32] {
    &NEWAMP1_MEAN_CB
}

/// newamp1 two-stage mel-vector VQ: 9 bits per stage (512 entries), K=20.
pub struct Newamp1Vq {
    pub stage1: Vec<f32>, // 512 * K
    pub stage2: Vec<f32>, // 512 * K
    pub entries_per_stage: usize,
}

static NEWAMP1_VQ: Lazy<Newamp1Vq> = Lazy::new(|| {
    let entries = 1usize << 9;
    Newamp1Vq {
        stage1: synth_envelope_codebook(entries, NEWAMP1_K, 0xAAAA_BBBB, 12.0),
        stage2: synth_envelope_codebook(entries, NEWAMP1_K, 0xCCCC_DDDD, 4.0),
        entries_per_stage: entries,
    }
});

pub fn newamp1_vq() -> &'static Newamp1Vq {
    &NEWAMP1_VQ
}

/// Joint Wo-Energy VQ: 256 entries (8 bits), 2-dimensional (x_Wo, x_E).
static WOE_VQ: Lazy<Vec<f32>> = Lazy::new(|| {
    let entries = 1usize << 8;
    let mut state = 0x5EED_5EEDu64;
    let mut out = Vec::with_capacity(entries * 2);
    for i in 0..entries {
        // Spread roughly over plausible (log-Wo, energy) ranges, with a
        // little jitter so the codebook isn't perfectly separable.
        let x_wo = -2.0 + 4.0 * (i as f32 / entries as f32);
        let x_e = -10.0 + 50.0 * lcg_next(&mut state).abs();
        out.push(x_wo);
        out.push(x_e);
    }
    out
});

pub fn woe_codebook() -> &'static [f32] {
    &WOE_VQ
}

/// Runtime override slot for experiments (`codec2_load_codebook`). Keyed
/// by an integer "codebook number" as in the original API; absent means
/// "use the built-in static".
static OVERRIDES: OnceCell<RwLock<std::collections::HashMap<usize, Vec<f32>>>> = OnceCell::new();

/// Replace codebook `num` with caller-supplied data for the remainder of
/// the process's lifetime. Mirrors `codec2_load_codebook(state, num,
/// filename)`, minus the file I/O (out of scope per spec §1).
pub fn load_codebook(num: usize, data: Vec<f32>) {
    let map = OVERRIDES.get_or_init(|| RwLock::new(std::collections::HashMap::new()));
    map.write().expect("codebook override lock poisoned").insert(num, data);
}

pub fn codebook_override(num: usize) -> Option<Vec<f32>> {
    OVERRIDES.get().and_then(|map| {
        map.read()
            .expect("codebook override lock poisoned")
            .get(&num)
            .cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsp_scalar_bits_sum_to_36() {
        assert_eq!(LSP_SCALAR_BITS.iter().sum::<u32>(), 36);
    }

    #[test]
    fn lsp_scalar_tables_have_expected_levels() {
        let cb = lsp_scalar_codebooks();
        for (i, &bits) in cb.bits.iter().enumerate() {
            assert_eq!(cb.tables[i].len(), 1usize << bits);
        }
    }

    #[test]
    fn pred_vq_bits_sum_to_27() {
        assert_eq!(LSP_PRED_VQ_BITS.iter().sum::<u32>(), 27);
    }

    #[test]
    fn newamp1_vq_dimensions() {
        let vq = newamp1_vq();
        assert_eq!(vq.stage1.len(), vq.entries_per_stage * NEWAMP1_K);
        assert_eq!(vq.stage2.len(), vq.entries_per_stage * NEWAMP1_K);
    }

    #[test]
    fn load_codebook_overrides_are_visible() {
        load_codebook(999, vec![1.0, 2.0, 3.0]);
        assert_eq!(codebook_override(999), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(codebook_override(998), None);
    }
}
