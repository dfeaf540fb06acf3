//! Decoder behavior on signals that carry no burst.

use burstwave_core::{Channel, Decoder, Status};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_two_seconds_of_silence_stay_idle() {
    let mut dec = Decoder::new(8000, 1500.0, Channel::Mono).unwrap();
    let e = dec.extended_length();
    let chunk = vec![0i16; e];
    let mut slots = 0;
    while slots * e < 16000 {
        if dec.feed(&chunk) {
            let status = dec.process();
            assert!(
                status != Status::Sync && status != Status::Done,
                "silence produced {:?}",
                status
            );
            slots += 1;
        }
    }
}

#[test]
fn test_white_noise_never_completes() {
    let mut rng = StdRng::seed_from_u64(0xB0A7);
    let mut dec = Decoder::new(8000, 1500.0, Channel::Mono).unwrap();
    let e = dec.extended_length();
    // four seconds of uniform noise
    for _ in 0..(32000 / e) {
        let chunk: Vec<i16> = (0..e).map(|_| rng.gen_range(-1000..=1000)).collect();
        if dec.feed(&chunk) {
            let status = dec.process();
            assert!(
                status != Status::Done && status != Status::Sync && status != Status::Ping,
                "noise produced {:?}",
                status
            );
        }
    }
}

#[test]
fn test_stereo_left_channel_burst_decodes() {
    let mut enc = burstwave_core::Encoder::new(8000).unwrap();
    enc.configure(b"LEFT ONLY", "TEST", 1500.0, 0, false);
    let e = enc.extended_length();
    let mut mono = vec![0i16; 2 * e];
    let mut buf = vec![0i16; e];
    while enc.produce(&mut buf) {
        mono.extend_from_slice(&buf);
    }
    mono.extend(std::iter::repeat(0).take(4 * e));

    // left carries the burst, right carries junk
    let mut rng = StdRng::seed_from_u64(42);
    let stereo: Vec<i16> = mono
        .iter()
        .flat_map(|&s| [s, rng.gen_range(-300..=300)])
        .collect();

    let mut dec = Decoder::new(8000, 1500.0, Channel::Left).unwrap();
    let mut done = false;
    for chunk in stereo.chunks(2 * e) {
        if dec.feed(chunk) && dec.process() == Status::Done {
            let mut payload = vec![0u8; burstwave_core::MAX_PAYLOAD_BYTES];
            assert!(dec.fetch(&mut payload) >= 0);
            assert!(payload.starts_with(b"LEFT ONLY"));
            done = true;
        }
    }
    assert!(done, "left-channel burst was not decoded");
}
