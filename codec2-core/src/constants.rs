//! Crate-wide constants that never vary per session.
//!
//! Mirrors the `#define`s spread across `codec2_internal.h`, `quantise.h`
//! and `newamp1.h` in the original C sources: these are true compile-time
//! constants of the codec, not configuration.

use std::f64::consts::PI;

/// Minimum pitch period in seconds (400 Hz max fundamental).
pub const P_MIN_S: f64 = 0.0025;
/// Maximum pitch period in seconds (50 Hz min fundamental).
pub const P_MAX_S: f64 = 0.02;

/// FFT size used by the NLP pitch estimator.
pub const PE_FFT_SIZE: usize = 512;

/// Maximum number of harmonics any `Model` can carry.
pub const MAX_AMP: usize = 160;

/// LPC analysis order used throughout the codec.
pub const LPC_ORD: usize = 10;

/// Rate-K mel vector dimension used by the newamp1 quantiser.
pub const NEWAMP1_K: usize = 20;

/// Mel-grid endpoints for the rate-K resampling (Hz).
pub const NEWAMP1_F_LOW_HZ: f64 = 200.0;
pub const NEWAMP1_F_HIGH_HZ: f64 = 3700.0;

/// Default decoder-side rate-K postfilter gain (`newamp1.c`'s
/// `NEWAMP1_PF_GAIN`), within spec.md's documented 1.2-1.5 range.
pub const NEWAMP1_POSTFILTER_GAIN: f64 = 1.2;

/// LSP order-repair minimum gaps, in Hz, converted to radians by the
/// caller via [`hz_to_rad`]. First four gaps are tighter than the rest,
/// matching `bw_expand_lsps()` in `quantise.c`.
pub const LSP_MIN_GAP_LOW_HZ: f64 = 50.0;
pub const LSP_MIN_GAP_HIGH_HZ: f64 = 100.0;
/// Number of leading LSPs that use the tighter gap.
pub const LSP_MIN_GAP_LOW_COUNT: usize = 4;

/// 15 Hz bandwidth expansion factor base (`0.994^i` in `quantise.c`).
pub const LPC_BW_EXPANSION_BASE: f64 = 0.994;

/// Energy quantiser range, in dB.
pub const E_MIN_DB: f64 = -10.0;
pub const E_MAX_DB: f64 = 40.0;
pub const E_BITS: u32 = 5;

pub const WO_BITS: u32 = 7;
pub const WO_E_BITS: u32 = 8;

pub const LSP_SCALAR_INDEXES: usize = LPC_ORD;
pub const LSPD_SCALAR_INDEXES: usize = LPC_ORD;
pub const LSP_PRED_VQ_STAGES: usize = 3;

/// LPC post-filter defaults (`LPCPF_GAMMA`/`LPCPF_BETA` in `quantise.h`).
pub const LPCPF_GAMMA: f32 = 0.5;
pub const LPCPF_BETA: f32 = 0.2;

/// Analysis frame period: 10 ms.
pub const FRAME_PERIOD_S: f64 = 0.01;

/// Derive angular-frequency bounds and buffer sizes for a given sample
/// rate. Created once per session and never mutated — this is the Rust
/// analogue of `C2CONST` in `codec2_internal.h`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct C2Const {
    pub fs: usize,
    pub n_samp: usize,
    pub m_pitch: usize,
    pub wo_min: f64,
    pub wo_max: f64,
}

impl C2Const {
    /// `fs` must be 8000 or 16000 Hz, matching every mode table in
    /// `codec2.c`.
    pub fn new(fs: usize) -> Self {
        let n_samp = (fs as f64 * FRAME_PERIOD_S).round() as usize;
        let m_pitch = 6 * n_samp;
        let pmin = (fs as f64 * P_MIN_S).floor();
        let pmax = (fs as f64 * P_MAX_S).floor();
        Self {
            fs,
            n_samp,
            m_pitch,
            wo_min: 2.0 * PI / pmax,
            wo_max: 2.0 * PI / pmin,
        }
    }

    /// Minimum FFT pitch-search bin, `floor(Fs * P_MIN_S)`.
    pub fn pmin(&self) -> usize {
        (self.fs as f64 * P_MIN_S).floor() as usize
    }

    /// Maximum FFT pitch-search bin, `floor(Fs * P_MAX_S)`.
    pub fn pmax(&self) -> usize {
        (self.fs as f64 * P_MAX_S).floor() as usize
    }
}

/// Convert a frequency in Hz to radians/sample at the given sample rate.
pub fn hz_to_rad(hz: f64, fs: usize) -> f64 {
    2.0 * PI * hz / fs as f64
}

/// Convert radians/sample back to Hz at the given sample rate.
pub fn rad_to_hz(rad: f64, fs: usize) -> f64 {
    rad * fs as f64 / (2.0 * PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c2const_8k_matches_known_values() {
        let c = C2Const::new(8000);
        assert_eq!(c.n_samp, 80);
        assert_eq!(c.m_pitch, 480);
        assert!(c.wo_min > 0.0 && c.wo_min < c.wo_max);
        assert!(c.wo_max < std::f64::consts::PI);
    }

    #[test]
    fn c2const_16k_doubles_sample_counts() {
        let c8 = C2Const::new(8000);
        let c16 = C2Const::new(16000);
        assert_eq!(c16.n_samp, 2 * c8.n_samp);
        assert_eq!(c16.m_pitch, 2 * c8.m_pitch);
    }
}
