//! Error taxonomy for codec2-core, following spec §7.
//!
//! Per-frame conditions (sync loss, CRC failure, excessive BER) are never
//! returned as errors from `tx`/`rx` — they degrade audio or surface as
//! status flags/counters, exactly as spec.md requires. `Codec2Error` is
//! reserved for construction-time failures and caller protocol misuse.

use thiserror::Error;

/// Top-level error type for codec2-core.
#[derive(Debug, Error)]
pub enum Codec2Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("caller supplied {got} samples, but nin() requires exactly {expected}")]
    InputShort { expected: usize, got: usize },

    #[error("LPC/LSP analysis error: {0}")]
    Lsp(#[from] LspError),

    #[error("fatal error at construction: {0}")]
    Fatal(#[from] FatalError),
}

/// Configuration errors (`ConfigError` in spec §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported codec2 mode: {mode}")]
    UnsupportedMode { mode: String },

    #[error("unsupported sample rate: {fs} Hz (must be 8000 or 16000)")]
    InvalidSampleRate { fs: usize },

    #[error("mutually exclusive options: {a} and {b}")]
    MutuallyExclusive { a: &'static str, b: &'static str },

    #[error("codebook {num} replaced while an encoder-side equaliser is active; call reset_eq() or reopen the session first")]
    EqualiserStale { num: usize },

    #[error("invalid tuning range: min {min_hz} Hz >= max {max_hz} Hz")]
    InvalidTuningRange { min_hz: f64, max_hz: f64 },
}

/// LPC -> LSP analysis degradation (`LspRootFind` in spec §7). This is
/// carried as an error type for the low-level `lsp` module, but callers at
/// the `Codec2`/`FreeDvSession` level never see it: the analysis step
/// catches it and substitutes the benign equally-spaced LSPs, exactly as
/// `quantise.c::speech_to_uq_lsps` does, and continues.
#[derive(Debug, Error, Clone, Copy)]
pub enum LspError {
    #[error("fewer than {order} real roots found in (0, pi); found {found}")]
    NotEnoughRoots { order: usize, found: usize },
}

/// Fatal, construction-only errors.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("required codebook {name} is missing or empty")]
    MissingCodebook { name: &'static str },

    #[error("out of memory while allocating {what}")]
    OutOfMemory { what: &'static str },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Codec2Error>;
