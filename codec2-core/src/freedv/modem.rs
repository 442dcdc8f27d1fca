//! The `Modem` seam: spec.md scopes real OFDM/FSK modem DSP (PAPR
//! control, pilot-assisted channel estimation, LDPC-coded modem framing)
//! out of this crate entirely — those stay black boxes behind this
//! trait. [`ReferenceModem`] is the one shipped implementation: BPSK
//! over a correlation-based preamble sync, good enough to exercise the
//! session/framing layers end-to-end, not a port of `ofdm.c`/`fsk.c`.

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::bits::{BitPacker, BitUnpacker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsync,
    Trial,
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCmd {
    Unsync,
    Auto,
    Manual,
}

bitflags::bitflags! {
    /// `rx_status` flags, exposed after every `rx()` call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxStatus: u8 {
        const TRIAL_SYNC  = 0b0001;
        const SYNC        = 0b0010;
        const BITS        = 0b0100;
        const BIT_ERRORS  = 0b1000;
    }
}

/// What happened on one `rx()` call.
#[derive(Debug, Clone)]
pub enum ModemRxEvent {
    /// No frame available this call (still searching or between frames).
    NoFrame,
    /// A full modem frame's worth of hard bits, one byte per bit (0/1).
    Frame(Vec<u8>),
}

/// The boundary between the framing/session layer and modem DSP. A
/// `Modem` owns its own internal clock and sync state; the session
/// layer only calls `nin`/`rx`/`tx` and reacts to [`SyncState`].
pub trait Modem {
    /// Exact sample count the next `rx()` call must be given.
    fn nin(&self) -> usize;
    fn bits_per_frame(&self) -> usize;
    fn rx(&mut self, samples: &[i16]) -> ModemRxEvent;
    fn tx(&mut self, bits: &[u8]) -> Vec<i16>;
    fn sync_state(&self) -> SyncState;
    fn set_sync_cmd(&mut self, cmd: SyncCmd);
    fn rx_status(&self) -> RxStatus;
    /// Fractional-sample early/late timing error observed on the most
    /// recent `rx()` call (positive = preamble arrived later than the
    /// window assumed), fed to [`crate::freedv::sync::NinGovernor::update`].
    fn fine_timing_estimate(&self) -> f64;
}

/// BPSK-over-AWGN reference modem with a correlation-detected preamble.
/// One "symbol" is one sample (no pulse shaping/carrier — this is a
/// baseband stand-in, not a radio-realistic modem).
pub struct ReferenceModem {
    bits_per_frame: usize,
    n_nom: usize,
    preamble: Vec<i16>,
    sync_state: SyncState,
    sync_cmd: SyncCmd,
    trial_hits: u32,
    rx_status: RxStatus,
    symbol_amplitude: i16,
    prev_tail: i16,
    timing_estimate: f64,
}

const PREAMBLE_LEN: usize = 32;
const TRIAL_HITS_TO_SYNC: u32 = 3;

impl ReferenceModem {
    pub fn new(bits_per_frame: usize) -> Self {
        let preamble = generate_preamble(PREAMBLE_LEN);
        Self {
            bits_per_frame,
            n_nom: PREAMBLE_LEN + bits_per_frame,
            preamble,
            sync_state: SyncState::Unsync,
            sync_cmd: SyncCmd::Auto,
            trial_hits: 0,
            rx_status: RxStatus::empty(),
            symbol_amplitude: 16000,
            prev_tail: 0,
            timing_estimate: 0.0,
        }
    }

    fn correlate(&self, samples: &[i16]) -> f64 {
        if samples.len() < self.preamble.len() {
            return 0.0;
        }
        let mut acc = 0.0;
        let mut energy = 0.0;
        for (a, b) in samples.iter().zip(&self.preamble) {
            acc += *a as f64 * *b as f64;
            energy += (*b as f64).powi(2);
        }
        acc / energy.max(1.0)
    }

    /// Early-late gate: correlate the preamble one sample early (using
    /// the previous call's trailing sample to extend the window back)
    /// and one sample late, against the on-time correlation. A positive
    /// result means the preamble is arriving later than this call's
    /// window assumed; negative means earlier. This is a synthetic
    /// stand-in for real sub-sample timing recovery (out of scope per
    /// spec.md's OFDM/FSK-modem-internals non-goal), sufficient to
    /// exercise the `nin()` drift contract end to end.
    fn estimate_fine_timing(&self, samples: &[i16]) -> f64 {
        let n = self.preamble.len();
        if samples.len() <= n {
            return 0.0;
        }

        let mut early_buf = Vec::with_capacity(n);
        early_buf.push(self.prev_tail);
        early_buf.extend_from_slice(&samples[..n - 1]);

        let early = self.correlate(&early_buf).abs();
        let on_time = self.correlate(&samples[..n]).abs();
        let late = self.correlate(&samples[1..n + 1]).abs();

        let denom = (early + late + 2.0 * on_time).max(1e-6);
        (late - early) / denom
    }
}

impl Modem for ReferenceModem {
    fn nin(&self) -> usize {
        self.n_nom
    }

    fn bits_per_frame(&self) -> usize {
        self.bits_per_frame
    }

    fn rx(&mut self, samples: &[i16]) -> ModemRxEvent {
        self.rx_status = RxStatus::empty();
        self.timing_estimate = self.estimate_fine_timing(samples);
        self.prev_tail = *samples.last().unwrap_or(&0);

        if self.sync_cmd == SyncCmd::Unsync {
            self.sync_state = SyncState::Unsync;
            self.trial_hits = 0;
            return ModemRxEvent::NoFrame;
        }

        let corr = self.correlate(samples);
        let detected = corr.abs() > 0.5;

        match self.sync_state {
            SyncState::Unsync => {
                if detected {
                    self.sync_state = SyncState::Trial;
                    self.trial_hits = 1;
                    self.rx_status |= RxStatus::TRIAL_SYNC;
                }
                ModemRxEvent::NoFrame
            }
            SyncState::Trial => {
                if detected {
                    self.trial_hits += 1;
                    self.rx_status |= RxStatus::TRIAL_SYNC;
                    if self.trial_hits >= TRIAL_HITS_TO_SYNC || self.sync_cmd == SyncCmd::Manual {
                        self.sync_state = SyncState::Sync;
                    }
                } else {
                    self.sync_state = SyncState::Unsync;
                    self.trial_hits = 0;
                }
                ModemRxEvent::NoFrame
            }
            SyncState::Sync => {
                self.rx_status |= RxStatus::SYNC;
                if !detected && self.sync_cmd == SyncCmd::Auto {
                    self.sync_state = SyncState::Unsync;
                    self.trial_hits = 0;
                    return ModemRxEvent::NoFrame;
                }
                let payload = &samples[samples.len().min(self.preamble.len())..];
                let mut unpacker = BitUnpacker::new(&to_bytes(payload, self.symbol_amplitude));
                let mut bits = Vec::with_capacity(self.bits_per_frame);
                for _ in 0..self.bits_per_frame {
                    bits.push(unpacker.unpack(1) as u8);
                }
                self.rx_status |= RxStatus::BITS;
                ModemRxEvent::Frame(bits)
            }
        }
    }

    fn tx(&mut self, bits: &[u8]) -> Vec<i16> {
        let mut payload_bytes = vec![0u8; crate::bits::bytes_for_bits(bits.len())];
        {
            let mut packer = BitPacker::new(&mut payload_bytes);
            for &b in bits {
                packer.pack(b as u32, 1);
            }
        }
        let mut out = self.preamble.clone();
        for byte in payload_bytes {
            for i in (0..8).rev() {
                let bit = (byte >> i) & 1;
                out.push(if bit == 1 {
                    self.symbol_amplitude
                } else {
                    -self.symbol_amplitude
                });
            }
        }
        out
    }

    fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    fn set_sync_cmd(&mut self, cmd: SyncCmd) {
        self.sync_cmd = cmd;
        match cmd {
            SyncCmd::Unsync => self.sync_state = SyncState::Unsync,
            SyncCmd::Manual => self.sync_state = SyncState::Sync,
            SyncCmd::Auto => {}
        }
    }

    fn rx_status(&self) -> RxStatus {
        self.rx_status
    }

    fn fine_timing_estimate(&self) -> f64 {
        self.timing_estimate
    }
}

/// Deterministic BPSK preamble: an m-sequence-like alternating pattern
/// generated from a fixed LFSR, good enough for correlation sync in the
/// reference modem.
fn generate_preamble(len: usize) -> Vec<i16> {
    let mut lfsr: u16 = 0b1010_1100_1001_0110;
    (0..len)
        .map(|_| {
            let bit = lfsr & 1;
            let feedback = ((lfsr >> 0) ^ (lfsr >> 2) ^ (lfsr >> 3) ^ (lfsr >> 5)) & 1;
            lfsr = (lfsr >> 1) | (feedback << 15);
            if bit == 1 {
                16000
            } else {
                -16000
            }
        })
        .collect()
}

fn to_bytes(samples: &[i16], amplitude: i16) -> Vec<u8> {
    let mut out = vec![0u8; crate::bits::bytes_for_bits(samples.len())];
    let mut packer = BitPacker::new(&mut out);
    for &s in samples {
        packer.pack((s > 0) as u32, 1);
    }
    let _ = amplitude;
    out
}

/// Decimate/interpolate by an FFT round-trip — present purely so the
/// reference modem has a plausible hook for sample-rate-offset handling
/// (spec.md's scenario 4); unused by the BPSK correlation path itself.
#[allow(dead_code)]
fn resample_stub(samples: &[Complex64], ratio: f64) -> Vec<Complex64> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(samples.len().max(1));
    let mut buf = samples.to_vec();
    buf.resize(samples.len().max(1), Complex64::new(0.0, 0.0));
    fft.process(&mut buf);
    let _ = ratio;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modem_acquires_sync_after_repeated_preambles() {
        let mut modem = ReferenceModem::new(16);
        let bits: Vec<u8> = (0..16).map(|i| (i % 2) as u8).collect();
        let frame = modem.tx(&bits);

        for _ in 0..TRIAL_HITS_TO_SYNC + 1 {
            let _ = modem.rx(&frame);
        }
        assert_eq!(modem.sync_state(), SyncState::Sync);
    }

    #[test]
    fn fine_timing_estimate_responds_to_a_one_sample_shift() {
        let mut tx_modem = ReferenceModem::new(16);
        let bits: Vec<u8> = (0..16).map(|i| (i % 2) as u8).collect();
        let frame = tx_modem.tx(&bits);

        let modem = ReferenceModem::new(16);
        let on_time = modem.estimate_fine_timing(&frame).abs();

        let mut shifted = vec![0i16];
        shifted.extend_from_slice(&frame[..frame.len() - 1]);
        let late = modem.estimate_fine_timing(&shifted).abs();

        assert!(late > on_time, "late={late} on_time={on_time}");
    }

    #[test]
    fn manual_sync_cmd_forces_sync_state() {
        let mut modem = ReferenceModem::new(16);
        modem.set_sync_cmd(SyncCmd::Manual);
        assert_eq!(modem.sync_state(), SyncState::Sync);
    }

    #[test]
    fn unsync_cmd_forces_unsync_and_clears_events() {
        let mut modem = ReferenceModem::new(16);
        modem.set_sync_cmd(SyncCmd::Unsync);
        let samples = vec![0i16; modem.nin()];
        let event = modem.rx(&samples);
        assert!(matches!(event, ModemRxEvent::NoFrame));
        assert_eq!(modem.sync_state(), SyncState::Unsync);
    }
}
