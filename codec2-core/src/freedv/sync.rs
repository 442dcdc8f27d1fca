//! nin() pull-model sample-accounting and the TRIAL/SYNC/UNSYNC state
//! machine (C8). Grounded on `freedv_api.h`'s declared `freedv_nin`/
//! `freedv_get_sync` surface and spec.md §4.8's description of their
//! behaviour (no `freedv_api.c` exists in the retrieved pack).

use crate::freedv::modem::SyncState;

pub use crate::freedv::modem::SyncCmd;

/// Maximum fractional-timing drift (in samples) the demodulator will
/// absorb per `nin()` call before the caller needs a wider/narrower
/// read, mirroring `ofdm_config.ofdm_timing_mx`-style tolerances.
const MAX_TIMING_DRIFT_SAMPLES: i32 = 1;

/// Governs how many samples the session layer must hand the modem on the
/// next `rx()` call, nudging `N` by `±1` sample as the modem's internal
/// fine timing estimate drifts past half a sample.
#[derive(Debug, Clone)]
pub struct NinGovernor {
    n_nom: usize,
    timing_offset: f64,
}

impl NinGovernor {
    pub fn new(n_nom: usize) -> Self {
        Self {
            n_nom,
            timing_offset: 0.0,
        }
    }

    /// Current required sample count for the next `rx()` call.
    pub fn nin(&self) -> usize {
        let adjust = self.drift_adjustment();
        (self.n_nom as i32 + adjust).max(1) as usize
    }

    fn drift_adjustment(&self) -> i32 {
        if self.timing_offset > 0.5 {
            MAX_TIMING_DRIFT_SAMPLES
        } else if self.timing_offset < -0.5 {
            -MAX_TIMING_DRIFT_SAMPLES
        } else {
            0
        }
    }

    /// Feed in this call's fine-timing estimate (fractional samples of
    /// early/late drift), updating the governor's running offset and
    /// resetting it by a whole sample once `nin()` has compensated.
    pub fn update(&mut self, fine_timing_estimate: f64) {
        self.timing_offset += fine_timing_estimate;
        if self.drift_adjustment() != 0 {
            self.timing_offset -= self.drift_adjustment() as f64;
        }
    }
}

/// Counters reset whenever sync is lost, per spec.md §4.8: "The
/// adapter, when it sees a sync loss, resets (Tbits, Terrs, Tbits_coded,
/// Terrs_coded) to 0 to avoid inflating BER during search."
#[derive(Debug, Clone, Default)]
pub struct SyncCounters {
    pub total_bits: u64,
    pub total_bit_errors: u64,
    pub total_packets: u64,
    pub total_packet_errors: u64,
}

impl SyncCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_frame(&mut self, bits: u64, bit_errors: u64) {
        self.total_bits += bits;
        self.total_bit_errors += bit_errors;
        self.total_packets += 1;
        if bit_errors > 0 {
            self.total_packet_errors += 1;
        }
    }

    pub fn ber_estimate(&self) -> f64 {
        if self.total_bits == 0 {
            0.0
        } else {
            self.total_bit_errors as f64 / self.total_bits as f64
        }
    }
}

/// Tracks sync transitions and resets [`SyncCounters`] on sync loss.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    last_state: SyncState,
    pub counters: SyncCounters,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self {
            last_state: SyncState::Unsync,
            counters: SyncCounters::default(),
        }
    }

    /// Call once per `rx()` with the modem's freshly observed state.
    pub fn observe(&mut self, state: SyncState) {
        if self.last_state == SyncState::Sync && state != SyncState::Sync {
            self.counters.reset();
        }
        self.last_state = state;
    }
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nin_holds_nominal_when_drift_is_small() {
        let gov = NinGovernor::new(320);
        assert_eq!(gov.nin(), 320);
    }

    #[test]
    fn nin_widens_on_late_drift() {
        let mut gov = NinGovernor::new(320);
        gov.update(0.6);
        assert_eq!(gov.nin(), 321);
    }

    #[test]
    fn nin_narrows_on_early_drift() {
        let mut gov = NinGovernor::new(320);
        gov.update(-0.6);
        assert_eq!(gov.nin(), 319);
    }

    #[test]
    fn sync_loss_resets_counters() {
        let mut tracker = SyncTracker::new();
        tracker.observe(SyncState::Sync);
        tracker.counters.record_frame(100, 5);
        assert!(tracker.counters.total_bits > 0);

        tracker.observe(SyncState::Unsync);
        assert_eq!(tracker.counters.total_bits, 0);
    }
}
