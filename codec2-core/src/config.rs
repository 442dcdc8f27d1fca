//! Session configuration surface: the recognised-options table spec.md
//! lists for the FreeDV session, plus the mode selector. Grounded on
//! `freedv_api.h`'s declared `freedv_set_*` setter family and
//! `freedv_open`'s configuration struct (no `freedv_api.c` exists in
//! the retrieved pack).

use serde::{Deserialize, Serialize};

use crate::freedv::modes::FreeDvMode;

/// Manual sync override, serialisable form of
/// [`crate::freedv::modem::SyncCmd`] for config files/CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncCmdConfig {
    Unsync,
    #[default]
    Auto,
    Manual,
}

impl From<SyncCmdConfig> for crate::freedv::modem::SyncCmd {
    fn from(c: SyncCmdConfig) -> Self {
        use crate::freedv::modem::SyncCmd;
        match c {
            SyncCmdConfig::Unsync => SyncCmd::Unsync,
            SyncCmdConfig::Auto => SyncCmd::Auto,
            SyncCmdConfig::Manual => SyncCmd::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Verbosity {
    #[default]
    Silent,
    Info,
    Debug,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TuningRangeHz {
    pub min: f64,
    pub max: f64,
}

impl Default for TuningRangeHz {
    fn default() -> Self {
        Self {
            min: -60.0,
            max: 60.0,
        }
    }
}

/// Every option spec.md's "Configuration (recognised options)" table
/// names, bundled into one struct so `FreeDvSession::new` (or a CLI's
/// clap-derived flags) has a single configuration type to pass around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeDvConfig {
    pub mode: FreeDvMode,
    pub clip: bool,
    pub tx_bpf: bool,
    pub dpsk: bool,
    pub squelch_en: bool,
    pub snr_squelch_thresh_db: f64,
    pub eq: bool,
    pub frames_per_burst: usize,
    pub testframes: bool,
    pub tx_amp: f64,
    pub verbose: Verbosity,
    pub sync_cmd: SyncCmdConfig,
    pub tuning_range_hz: TuningRangeHz,
}

impl FreeDvConfig {
    pub fn new(mode: FreeDvMode) -> Self {
        Self {
            mode,
            clip: false,
            tx_bpf: false,
            dpsk: false,
            squelch_en: false,
            snr_squelch_thresh_db: 0.0,
            eq: false,
            frames_per_burst: 1,
            testframes: false,
            tx_amp: 1.0,
            verbose: Verbosity::default(),
            sync_cmd: SyncCmdConfig::default(),
            tuning_range_hz: TuningRangeHz::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let cfg = FreeDvConfig::new(FreeDvMode::Mode700C);
        assert!(!cfg.clip);
        assert!(!cfg.squelch_en);
        assert_eq!(cfg.tx_amp, 1.0);
        assert_eq!(cfg.sync_cmd, SyncCmdConfig::Auto);
    }

    #[test]
    fn sync_cmd_config_converts_to_modem_sync_cmd() {
        let cmd: crate::freedv::modem::SyncCmd = SyncCmdConfig::Manual.into();
        assert_eq!(cmd, crate::freedv::modem::SyncCmd::Manual);
    }
}
