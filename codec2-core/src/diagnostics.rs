//! Session-level diagnostics: the counters spec.md's "FreeDV Session"
//! entity carries (bits sent, bit errors, packets, packet errors) plus
//! sync status, reshaped from the teacher's `DiagnosticsBundle`/
//! `SimulationReport` pair to the BER/PER-centric view a speech codec
//! session reports instead of an OFDM demodulator's EVM/constellation
//! view.

use serde::{Deserialize, Serialize};

use crate::freedv::modem::SyncState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct SessionCounters {
    pub total_bits: u64,
    pub total_bit_errors: u64,
    pub total_bits_coded: u64,
    pub total_bit_errors_coded: u64,
    pub total_packets: u64,
    pub total_packet_errors: u64,
}

impl SessionCounters {
    pub fn ber(&self) -> f64 {
        ratio(self.total_bit_errors, self.total_bits)
    }

    pub fn coded_ber(&self) -> f64 {
        ratio(self.total_bit_errors_coded, self.total_bits_coded)
    }

    pub fn per(&self) -> f64 {
        ratio(self.total_packet_errors, self.total_packets)
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// A single rx() call's worth of diagnostic state, suitable for logging
/// via `tracing` at the CLI layer or collecting into a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub state: SyncStateReport,
    pub counters: SessionCounters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStateReport {
    Unsync,
    Trial,
    Sync,
}

impl From<SyncState> for SyncStateReport {
    fn from(s: SyncState) -> Self {
        match s {
            SyncState::Unsync => SyncStateReport::Unsync,
            SyncState::Trial => SyncStateReport::Trial,
            SyncState::Sync => SyncStateReport::Sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ber_is_zero_with_no_bits_observed() {
        let counters = SessionCounters::default();
        assert_eq!(counters.ber(), 0.0);
    }

    #[test]
    fn ber_reflects_observed_errors() {
        let counters = SessionCounters {
            total_bits: 1000,
            total_bit_errors: 50,
            ..Default::default()
        };
        assert!((counters.ber() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn sync_state_report_converts_from_modem_sync_state() {
        assert_eq!(SyncStateReport::from(SyncState::Sync), SyncStateReport::Sync);
    }
}
