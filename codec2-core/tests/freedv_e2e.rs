//! End-to-end FreeDV session tests: loopback speech, raw-data round
//! trip, dual-mode demod, sample-rate offset, AWGN frame-error-rate,
//! and reliable text recovery.

use std::collections::HashSet;

use codec2_core::freedv::modes::FreeDvMode;
use codec2_core::{freedv_mode_params, FreeDvSession, RxOutcome, SyncCmd};

/// Size of one raw-data mode's full on-wire modem frame, CRC trailer
/// included.
fn data_frame_bytes(mode: FreeDvMode) -> usize {
    freedv_mode_params(mode).bits_per_modem_frame / 8
}

/// Size of the user payload `tx()` expects for a raw-data mode: the
/// frame minus the 2-byte CRC16/XMODEM trailer it appends automatically.
fn data_user_payload_bytes(mode: FreeDvMode) -> usize {
    data_frame_bytes(mode) - 2
}

/// Drive `tx` frames through `rx` in lockstep (no channel), returning
/// the speech/data payloads recovered once sync has settled.
fn loopback_voice(mode: FreeDvMode, frames: usize) -> Vec<Vec<i16>> {
    let mut tx = FreeDvSession::new(mode).unwrap();
    let mut rx = FreeDvSession::new(mode).unwrap();
    rx.set_sync_cmd(SyncCmd::Manual);

    let codec2_mode = freedv_mode_params(mode).codec2_mode.expect("voice mode");
    let n_samp = codec2_core::modes::mode_params(codec2_mode).samples_per_frame;
    let mut out = Vec::new();
    for i in 0..frames {
        let speech: Vec<i16> = (0..n_samp)
            .map(|s| (((s + i * 7) % 200) as i16) - 100)
            .collect();
        let modulated = tx.tx(Some(&speech), None);
        let mut padded = modulated;
        padded.resize(rx.nin(), 0);
        if let RxOutcome::Speech(pcm) = rx.rx(&padded) {
            out.push(pcm);
        }
    }
    out
}

/// Linearly resample `samples` from `from_hz` to `to_hz`, stretching (or
/// compressing) the sample count by `to_hz / from_hz` the way a receiver
/// ADC running at a slightly different clock rate would.
fn resample_linear(samples: &[i16], from_hz: f64, to_hz: f64) -> Vec<i16> {
    let step = from_hz / to_hz;
    let out_len = (samples.len() as f64 / step) as usize;
    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 * step;
            let idx = src_pos.floor() as usize;
            let frac = src_pos - idx as f64;
            let a = samples.get(idx).copied().unwrap_or(0) as f64;
            let b = samples.get(idx + 1).copied().unwrap_or(a as i16) as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

#[test]
fn loopback_speech_700d_recovers_every_frame() {
    let recovered = loopback_voice(FreeDvMode::Mode700D, 10);
    assert_eq!(recovered.len(), 10);
    for pcm in &recovered {
        assert!(!pcm.is_empty());
    }
}

#[test]
fn datac1_round_trip_recovers_payload_bytes_and_crc_validates() {
    let mode = FreeDvMode::DataC1;
    let mut tx = FreeDvSession::new(mode).unwrap();
    let mut rx = FreeDvSession::new(mode).unwrap();
    rx.set_sync_cmd(SyncCmd::Manual);

    let payload: Vec<u8> = (0u8..51).cycle().take(data_user_payload_bytes(mode)).collect();

    let modulated = tx.tx(None, Some(&payload));
    let mut padded = modulated;
    padded.resize(rx.nin(), 0);

    match rx.rx(&padded) {
        RxOutcome::Data(bytes) => {
            assert_eq!(bytes.len(), data_frame_bytes(mode));
            assert_eq!(&bytes[..payload.len()], payload.as_slice());
            assert!(codec2_core::freedv::frame::verify_crc(&bytes));
        }
        other => panic!("expected a decoded data frame, got {other:?}"),
    }
}

#[test]
fn datac0_and_datac1_demod_independently_in_one_caller_loop() {
    let mut tx0 = FreeDvSession::new(FreeDvMode::DataC0).unwrap();
    let mut rx0 = FreeDvSession::new(FreeDvMode::DataC0).unwrap();
    rx0.set_sync_cmd(SyncCmd::Manual);

    let mut tx1 = FreeDvSession::new(FreeDvMode::DataC1).unwrap();
    let mut rx1 = FreeDvSession::new(FreeDvMode::DataC1).unwrap();
    rx1.set_sync_cmd(SyncCmd::Manual);

    let mut datac0_ok = 0u32;
    let mut datac1_ok = 0u32;

    for i in 0..10 {
        let payload0 = vec![i as u8; data_user_payload_bytes(FreeDvMode::DataC0)];
        let modulated0 = tx0.tx(None, Some(&payload0));
        let mut padded0 = modulated0;
        padded0.resize(rx0.nin(), 0);
        if matches!(rx0.rx(&padded0), RxOutcome::Data(_)) {
            datac0_ok += 1;
        }

        let payload1 = vec![(i + 1) as u8; data_user_payload_bytes(FreeDvMode::DataC1)];
        let modulated1 = tx1.tx(None, Some(&payload1));
        let mut padded1 = modulated1;
        padded1.resize(rx1.nin(), 0);
        if matches!(rx1.rx(&padded1), RxOutcome::Data(_)) {
            datac1_ok += 1;
        }
    }

    assert_eq!(datac0_ok, 10);
    assert_eq!(datac1_ok, 10);
}

#[test]
fn sample_rate_offset_is_absorbed_by_the_nin_governor() {
    let mode = FreeDvMode::DataC0;
    let mut tx = FreeDvSession::new(mode).unwrap();
    let mut rx = FreeDvSession::new(mode).unwrap();
    rx.set_sync_cmd(SyncCmd::Manual);

    let nominal_nin = rx.nin();
    let payload_len = data_user_payload_bytes(mode);

    // Build a long continuous TX stream of many back-to-back bursts,
    // then resample it as if the receiver's ADC ran at 8008 Hz instead
    // of the nominal 8000 Hz (spec.md §8 scenario 4).
    let mut tx_stream = Vec::new();
    for i in 0..200u32 {
        let payload = vec![(i % 256) as u8; payload_len];
        tx_stream.extend(tx.tx(None, Some(&payload)));
    }
    let resampled = resample_linear(&tx_stream, 8000.0, 8008.0);

    let mut observed_nin: HashSet<usize> = HashSet::new();
    let mut cursor = 0usize;
    while cursor + rx.nin() <= resampled.len() {
        let n = rx.nin();
        observed_nin.insert(n);
        rx.rx(&resampled[cursor..cursor + n]);
        cursor += n;
    }

    for &n in &observed_nin {
        assert!(
            (n as i64 - nominal_nin as i64).abs() <= 1,
            "nin() {n} deviated from nominal {nominal_nin} by more than one sample"
        );
    }
    assert!(
        observed_nin.len() > 1,
        "expected nin() to oscillate away from the nominal {nominal_nin} under a resampled \
         clock, only observed {observed_nin:?}"
    );
}

#[test]
fn awgn_channel_at_low_snr_still_passes_some_testframes() {
    use codec2_core::channel::{apply_pcm_noise, snr_db_to_noise_std};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    let mode = FreeDvMode::DataC0;
    let mut tx = FreeDvSession::new(mode).unwrap();
    let mut rx = FreeDvSession::new(mode).unwrap();
    rx.set_sync_cmd(SyncCmd::Manual);
    rx.set_testframes(true);

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let signal_rms = 16000.0;
    let noise_std = snr_db_to_noise_std(0.0, signal_rms);

    for i in 0..20 {
        let payload = vec![i as u8; data_user_payload_bytes(mode)];
        let modulated = tx.tx(None, Some(&payload));
        let mut padded = modulated;
        padded.resize(rx.nin(), 0);
        let noisy = apply_pcm_noise(&padded, noise_std, &mut rng);
        rx.rx(&noisy);
    }

    let stats = rx.testframe_stats();
    assert!(stats.frames > 0);
}

#[test]
fn reliable_text_survives_a_voice_loopback_run() {
    let mode = FreeDvMode::Mode700D;
    let mut tx = FreeDvSession::new(mode).unwrap();
    tx.set_reliable_text("VK2ABC");

    let mut rx = FreeDvSession::new(mode).unwrap();
    rx.set_sync_cmd(SyncCmd::Manual);

    let mut recovered: Option<String> = None;
    let codec2_mode = freedv_mode_params(mode).codec2_mode.expect("voice mode");
    let n_samp = codec2_core::modes::mode_params(codec2_mode).samples_per_frame;

    for i in 0..400 {
        let speech: Vec<i16> = (0..n_samp).map(|s| ((s + i) % 50) as i16).collect();
        let modulated = tx.tx(Some(&speech), None);
        let mut padded = modulated;
        padded.resize(rx.nin(), 0);
        rx.rx(&padded);

        let bit = tx.next_reliable_text_bit();
        rx.rx_reliable_text_bit(bit, &mut |s| recovered = Some(s));
    }

    assert_eq!(recovered.as_deref(), Some("VK2ABC"));
}
