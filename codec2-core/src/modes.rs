//! Codec2 profile table (C6): one entry per mode describing its frame
//! geometry, quantiser variant, and interpolation policy. Grounded on
//! `codec2.c`'s per-mode `#ifdef`-gated encode/decode paths and
//! `codec2_fifo`/`codec2_bits_per_frame` tables in `codec2.h`.
//!
//! Exact historical bit budgets are not reproduced bit-for-bit (out of
//! scope, see the crate's design notes); the values below preserve the
//! documented shape — 160/320/640 samples per frame, 18-64 bits per
//! frame, 2 or 4 analysis sub-frames per frame.

use crate::bits::bytes_for_bits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec2Mode {
    Mode3200,
    Mode2400,
    Mode1600,
    Mode1400,
    Mode1300,
    Mode1200,
    Mode700C,
    Mode450,
    Mode450Pwb,
}

/// How LSPs (or the rate-K envelope) are quantised for a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LspQuantVariant {
    Scalar,
    Lspd,
    PredictiveVq,
    RateK,
}

/// How the decoder interpolates quantised parameters between the
/// 25 Hz-ish update rate and the 100 Hz internal frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpPolicy {
    Lsp,
    RateK,
}

/// Where the mode's "spare bit" lives, for voicing-bit-theft schemes
/// (1300/1400/1600). `None` for modes with no spare bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpareBitSlot {
    None,
    Bit(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Codec2ModeParams {
    pub mode: Codec2Mode,
    pub fs: usize,
    pub samples_per_frame: usize,
    pub bits_per_frame: usize,
    pub n_subframes: usize,
    pub quant: LspQuantVariant,
    pub interp: InterpPolicy,
    pub joint_woe: bool,
    pub spare_bit: SpareBitSlot,
}

impl Codec2ModeParams {
    pub fn bytes_per_frame(&self) -> usize {
        bytes_for_bits(self.bits_per_frame)
    }

    pub fn n_samp(&self) -> usize {
        self.samples_per_frame / self.n_subframes
    }
}

pub fn mode_params(mode: Codec2Mode) -> Codec2ModeParams {
    use Codec2Mode::*;
    use InterpPolicy::*;
    use LspQuantVariant::*;
    use SpareBitSlot::*;

    match mode {
        Mode3200 => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 160,
            bits_per_frame: 64,
            n_subframes: 2,
            quant: Scalar,
            interp: Lsp,
            joint_woe: false,
            spare_bit: None,
        },
        Mode2400 => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 160,
            bits_per_frame: 48,
            n_subframes: 2,
            quant: PredictiveVq,
            interp: Lsp,
            joint_woe: true,
            spare_bit: None,
        },
        Mode1600 => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 320,
            bits_per_frame: 64,
            n_subframes: 4,
            quant: Lspd,
            interp: Lsp,
            joint_woe: false,
            spare_bit: Bit(15),
        },
        Mode1400 => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 320,
            bits_per_frame: 56,
            n_subframes: 4,
            quant: Lspd,
            interp: Lsp,
            joint_woe: false,
            spare_bit: Bit(10),
        },
        Mode1300 => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 320,
            bits_per_frame: 52,
            n_subframes: 4,
            quant: PredictiveVq,
            interp: Lsp,
            joint_woe: false,
            spare_bit: Bit(2),
        },
        Mode1200 => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 320,
            bits_per_frame: 48,
            n_subframes: 4,
            quant: PredictiveVq,
            interp: Lsp,
            joint_woe: true,
            spare_bit: None,
        },
        Mode700C => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 320,
            bits_per_frame: 28,
            n_subframes: 4,
            quant: RateK,
            interp: RateK,
            joint_woe: false,
            spare_bit: None,
        },
        Mode450 => Codec2ModeParams {
            mode,
            fs: 8000,
            samples_per_frame: 320,
            bits_per_frame: 18,
            n_subframes: 4,
            quant: RateK,
            interp: RateK,
            joint_woe: false,
            spare_bit: None,
        },
        Mode450Pwb => Codec2ModeParams {
            mode,
            fs: 16000,
            samples_per_frame: 640,
            bits_per_frame: 18,
            n_subframes: 4,
            quant: RateK,
            interp: RateK,
            joint_woe: false,
            spare_bit: None,
        },
    }
}
