//! FreeDV mode table: the full configuration surface spec.md's `mode`
//! option lists, each entry naming its underlying [`Codec2Mode`] (for
//! voice modes) and its modem-level frame size. Grounded on `freedv_api.h`'s
//! `FREEDV_MODE_*` enum and `freedv_get_modem_stats`'s per-mode bit
//! budgets.

use serde::{Deserialize, Serialize};

use crate::bits::bytes_for_bits;
use crate::modes::Codec2Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreeDvMode {
    Mode3200,
    Mode2400A,
    Mode2400B,
    Mode1600,
    Mode1400,
    Mode1300,
    Mode1200,
    Mode700C,
    Mode700D,
    Mode700E,
    Mode450,
    Mode450Pwb,
    Mode2020,
    Mode2020B,
    Mode800Xa,
    DataC0,
    DataC1,
    DataC3,
    FskLdpc,
}

#[derive(Debug, Clone, Copy)]
pub struct FreeDvModeParams {
    pub mode: FreeDvMode,
    /// The codec2 profile this mode carries speech with, or `None` for
    /// a raw-data mode that carries user bytes directly.
    pub codec2_mode: Option<Codec2Mode>,
    pub bits_per_modem_frame: usize,
    pub is_raw_data: bool,
}

/// Look up a mode's parameters.
///
/// **Deviations from the historical mode table, documented rather than
/// silently approximated:**
/// - `700D`/`700E`/`2020`/`2020B` are routed through the same newamp1
///   rate-K codec as `700C` (`Codec2Mode::Mode700C`) rather than their
///   own distinct LPC/LDPC variants — this crate implements one rate-K
///   quantiser, not five near-identical historical ones.
/// - `2400A`/`2400B` both carry `Codec2Mode::Mode2400` speech; the "A"
///   and "B" suffixes historically distinguish FSK vs OFDM modem
///   framing, a distinction that lives at the [`crate::freedv::modem`]
///   seam in this port, not in the codec.
/// - `800XA` is modeled only at this table level (as a 450-class rate
///   running a 4-FSK modem profile) — no distinct DSP path exists for
///   it here.
/// - historically several of these modes (`700D`/`700E`/`2020`/`2020B`)
///   pack multiple Codec2 analysis frames into one modem "super-frame";
///   `FreeDvSession` carries exactly one Codec2 frame per modem frame,
///   so `bits_per_modem_frame` here is always the byte-padded size of a
///   single underlying Codec2 frame (`8 * bytes_for_bits(bits_per_frame)`),
///   not the historical multi-subframe total.
pub fn mode_params(mode: FreeDvMode) -> FreeDvModeParams {
    use FreeDvMode::*;

    let voice_bits = |codec2_mode: Codec2Mode| 8 * bytes_for_bits(crate::modes::mode_params(codec2_mode).bits_per_frame);

    let (codec2_mode, bits_per_modem_frame, is_raw_data) = match mode {
        Mode3200 => (Some(Codec2Mode::Mode3200), voice_bits(Codec2Mode::Mode3200), false),
        Mode2400A => (Some(Codec2Mode::Mode2400), voice_bits(Codec2Mode::Mode2400), false),
        Mode2400B => (Some(Codec2Mode::Mode2400), voice_bits(Codec2Mode::Mode2400), false),
        Mode1600 => (Some(Codec2Mode::Mode1600), voice_bits(Codec2Mode::Mode1600), false),
        Mode1400 => (Some(Codec2Mode::Mode1400), voice_bits(Codec2Mode::Mode1400), false),
        Mode1300 => (Some(Codec2Mode::Mode1300), voice_bits(Codec2Mode::Mode1300), false),
        Mode1200 => (Some(Codec2Mode::Mode1200), voice_bits(Codec2Mode::Mode1200), false),
        Mode700C => (Some(Codec2Mode::Mode700C), voice_bits(Codec2Mode::Mode700C), false),
        Mode700D => (Some(Codec2Mode::Mode700C), voice_bits(Codec2Mode::Mode700C), false),
        Mode700E => (Some(Codec2Mode::Mode700C), voice_bits(Codec2Mode::Mode700C), false),
        Mode450 => (Some(Codec2Mode::Mode450), voice_bits(Codec2Mode::Mode450), false),
        Mode450Pwb => (Some(Codec2Mode::Mode450Pwb), voice_bits(Codec2Mode::Mode450Pwb), false),
        Mode2020 => (Some(Codec2Mode::Mode700C), voice_bits(Codec2Mode::Mode700C), false),
        Mode2020B => (Some(Codec2Mode::Mode700C), voice_bits(Codec2Mode::Mode700C), false),
        Mode800Xa => (Some(Codec2Mode::Mode450), voice_bits(Codec2Mode::Mode450), false),
        DataC0 => (None, 504, true),
        DataC1 => (None, 1568, true),
        DataC3 => (None, 504, true),
        FskLdpc => (None, 256, true),
    };
    FreeDvModeParams {
        mode,
        codec2_mode,
        bits_per_modem_frame,
        is_raw_data,
    }
}
