// ============================================================================
// INTEGRATION TESTS
// ============================================================================
// Full sender -> speaker -> microphone -> receiver runs over a simulated
// channel. A 120-byte frame is about 13 s of audio, so these are the slowest
// tests in the crate; run them in release mode when iterating:
//   cargo test -p tonealert-core --test integration_test --release
// ============================================================================

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tonealert_core::{
    compose, receive_acoustic, transmit, AlertType, Ed25519KeyHandle, Ed25519Verifier,
    FskDemodulator, FskModulator, Integrity, ModemConfig, SemanticFields, Verification,
    FRAME_LEN,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn literal_fields() -> SemanticFields {
    SemanticFields {
        alert_type: AlertType::Fire,
        severity: 7,
        lat: 34.0522,
        lon: -118.2437,
        pop: 2000,
        msg: "TRAPPED".to_string(),
    }
}

fn signer() -> Ed25519KeyHandle {
    Ed25519KeyHandle::from_seed(&[7u8; 32])
}

fn add_noise(samples: &mut [f32], sigma: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, sigma).unwrap();
    for sample in samples.iter_mut() {
        *sample += normal.sample(&mut rng);
    }
}

#[test]
fn test_frame_round_trip_clean_channel() {
    let frame: Vec<u8> = (0..FRAME_LEN).map(|i| (i * 37 + 11) as u8).collect();

    let samples = FskModulator::default().modulate(&frame);
    let result = FskDemodulator::default().demodulate(&samples, FRAME_LEN);

    assert_eq!(result.data, frame, "Decoded frame doesn't match original");
    assert!(result.confidence >= 0.95, "confidence {}", result.confidence);
    assert!(result.error_positions.is_empty(), "{:?}", result.error_positions);
}

#[test]
fn test_alert_pipeline_over_audio() {
    init_logging();
    let config = ModemConfig::default();
    let outgoing = compose(&literal_fields(), &signer());
    let samples = transmit(&outgoing.frame, &config);

    let reception = receive_acoustic(&samples, &config, &Ed25519Verifier);
    assert!(reception.decode.is_clean());

    let alert = reception.alert.expect("alert should decode");
    assert_eq!(alert.verification, Verification::Verified);
    assert_eq!(alert.integrity, Integrity::Valid);
    assert_eq!(alert.fields.alert_type, AlertType::Fire);
    assert_eq!(alert.fields.severity, 7);
    assert_eq!(alert.fields.pop, 2048);
    assert_eq!(alert.fields.msg, "TRAPPED");
    assert!((alert.fields.lat - 34.0522).abs() < 1e-3);
    assert!((alert.fields.lon + 118.2437).abs() < 1e-3);
}

#[test]
fn test_alert_pipeline_with_silence_and_noise() {
    init_logging();
    let config = ModemConfig::default();
    let outgoing = compose(&literal_fields(), &signer());

    let mut samples = vec![0.0f32; 22_050];
    samples.extend(transmit(&outgoing.frame, &config));
    samples.extend(vec![0.0f32; 22_050]);
    add_noise(&mut samples, 0.05, 42);

    let reception = receive_acoustic(&samples, &config, &Ed25519Verifier);
    assert!(reception.decode.confidence >= 0.9, "confidence {}", reception.decode.confidence);
    assert!(reception.decode.is_clean());
    assert_eq!(reception.decode.data, outgoing.frame.as_bytes().to_vec());

    let alert = reception.alert.expect("alert should decode");
    assert_eq!(alert.verification, Verification::Verified);
}

#[test]
fn test_attenuated_and_noisy_capture() {
    let data = b"Offline alerts over sound";
    let mut samples = FskModulator::default().modulate(data);
    for sample in samples.iter_mut() {
        *sample *= 0.05;
    }
    add_noise(&mut samples, 0.002, 7);

    let result = FskDemodulator::default().demodulate(&samples, data.len());
    assert_eq!(result.data, data);
    assert!(result.is_clean());
}

#[test]
fn test_heavy_noise_never_panics() {
    init_logging();
    let data = vec![0xA5u8; 16];
    let mut samples = FskModulator::default().modulate(&data);
    add_noise(&mut samples, 2.0, 99);

    let result = FskDemodulator::default().demodulate(&samples, data.len());
    assert_eq!(result.data.len(), data.len());
    assert!((0.0..=1.0).contains(&result.confidence));
    assert!(result.error_positions.iter().all(|&i| i < data.len()));
}

#[test]
fn test_silence_yields_zero_confidence() {
    init_logging();
    let config = ModemConfig::default();
    let samples = vec![0.0f32; config.sample_rate as usize * 3];

    let reception = receive_acoustic(&samples, &config, &Ed25519Verifier);
    assert_eq!(reception.decode.confidence, 0.0);
    assert_eq!(reception.decode.error_positions.len(), FRAME_LEN);
    assert!(reception.alert.is_none());
}

#[test]
fn test_tampered_audio_frame_fails_signature() {
    let config = ModemConfig::default();
    let outgoing = compose(&literal_fields(), &signer());
    let mut bytes = *outgoing.frame.as_bytes();
    // Byte 10 is inside the message text
    bytes[10] ^= 0x20;

    let samples = FskModulator::new(config).modulate(&bytes);
    let reception = receive_acoustic(&samples, &config, &Ed25519Verifier);

    let alert = reception.alert.expect("lenient decode still yields fields");
    assert_eq!(alert.verification, Verification::Failed);
    assert_eq!(alert.integrity, Integrity::Unverified);
}

#[test]
fn test_lower_sample_rate() {
    let config = ModemConfig::new(16_000);
    config.validate().unwrap();

    let outgoing = compose(&literal_fields(), &signer());
    let samples = transmit(&outgoing.frame, &config);
    let reception = receive_acoustic(&samples, &config, &Ed25519Verifier);

    assert!(reception.decode.is_clean(), "{:?}", reception.decode.error_positions);
    assert_eq!(reception.alert.unwrap().verification, Verification::Verified);
}

#[test]
fn test_resampled_capture_decodes() {
    use tonealert_core::resample::resample;

    let outgoing = compose(&literal_fields(), &signer());
    let played = transmit(&outgoing.frame, &ModemConfig::new(48_000));
    let captured = resample(&played, 48_000, 44_100).unwrap();

    let reception = receive_acoustic(&captured, &ModemConfig::default(), &Ed25519Verifier);
    assert_eq!(reception.decode.data, outgoing.frame.as_bytes().to_vec());
}
