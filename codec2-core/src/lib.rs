//! Codec2 sinusoidal speech codec and FreeDV frame/session layer.
//!
//! The codec path (analysis -> quantisation -> phase/sinusoidal
//! synthesis) is a from-scratch Rust port of the `codec2`/`freedv_api`
//! pipeline; the ambient stack (errors, config, diagnostics, bit
//! packing, codebook statics) follows this workspace's established
//! idiom throughout.

pub mod analysis;
pub mod bits;
pub mod channel;
pub mod codebooks;
pub mod codec2;
pub mod config;
pub mod constants;
pub mod container;
pub mod diagnostics;
pub mod errors;
pub mod freedv;
pub mod lpc;
pub mod lsp;
pub mod mbest;
pub mod model;
pub mod modes;
pub mod newamp1;
pub mod phase;
pub mod quantise;
pub mod synth;

pub use codec2::Codec2;
pub use config::FreeDvConfig;
pub use errors::{Codec2Error, ConfigError, FatalError, LspError, Result};
pub use freedv::modem::{Modem, ModemRxEvent, ReferenceModem, SyncCmd, SyncState};
pub use freedv::modes::{mode_params as freedv_mode_params, FreeDvMode, FreeDvModeParams};
pub use freedv::{FreeDvSession, RxOutcome};
pub use modes::Codec2Mode;
