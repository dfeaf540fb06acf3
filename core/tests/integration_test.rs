//! End-to-end loopback: encoder bursts fed straight into the decoder.

use burstwave_core::{Channel, Decoder, Encoder, Staged, Status, MAX_PAYLOAD_BYTES};

fn encode_burst(
    rate: u32,
    text: &[u8],
    callsign: &str,
    noise_symbols: usize,
    fancy: bool,
) -> Vec<i16> {
    let mut enc = Encoder::new(rate).unwrap();
    enc.configure(text, callsign, 1500.0, noise_symbols, fancy);
    let e = enc.extended_length();
    let mut samples = vec![0i16; 2 * e];
    let mut buf = vec![0i16; e];
    while enc.produce(&mut buf) {
        samples.extend_from_slice(&buf);
    }
    samples.extend(std::iter::repeat(0).take(4 * e));
    samples
}

struct Outcome {
    statuses: Vec<Status>,
    fetched: Option<(i32, Vec<u8>, Staged)>,
}

fn run_decoder(rate: u32, samples: &[i16]) -> Outcome {
    let mut dec = Decoder::new(rate, 1500.0, Channel::Mono).unwrap();
    let e = dec.extended_length();
    let mut statuses = Vec::new();
    let mut fetched = None;
    for chunk in samples.chunks(e) {
        if dec.feed(chunk) {
            let status = dec.process();
            statuses.push(status);
            if status == Status::Done {
                let mut payload = vec![0u8; MAX_PAYLOAD_BYTES];
                let flips = dec.fetch(&mut payload);
                fetched = Some((flips, payload, dec.staged()));
            }
        }
    }
    Outcome { statuses, fetched }
}

fn text_of(payload: &[u8]) -> &str {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    std::str::from_utf8(&payload[..end]).unwrap()
}

#[test]
fn test_hello_round_trip() {
    let samples = encode_burst(8000, b"HELLO", "TEST", 0, false);
    let out = run_decoder(8000, &samples);
    assert!(out.statuses.contains(&Status::Sync), "no sync: {:?}", out.statuses);
    let (flips, payload, staged) = out.fetched.expect("no done");
    assert_eq!(flips, 0, "clean loopback should correct nothing");
    assert_eq!(text_of(&payload), "HELLO");
    assert!(staged.callsign.starts_with("TEST"), "callsign {:?}", staged.callsign);
}

#[test]
fn test_cq_call_round_trip() {
    let text = b"CQ CQ CQ DE W1AW W1AW K";
    let samples = encode_burst(8000, text, "W1AW", 0, false);
    let out = run_decoder(8000, &samples);
    let (flips, payload, staged) = out.fetched.expect("no done");
    assert!(flips >= 0);
    assert_eq!(text_of(&payload).as_bytes(), text);
    assert_eq!(staged.callsign.trim_end(), "W1AW");
}

#[test]
fn test_mode16_at_80_bytes() {
    let text = vec![b'A'; 80];
    let samples = encode_burst(8000, &text, "N0CALL", 0, false);
    let out = run_decoder(8000, &samples);
    let (_, payload, staged) = out.fetched.expect("no done");
    assert_eq!(staged.mode, 16);
    assert_eq!(&payload[..80], &text[..]);
    assert!(payload[80..].iter().all(|&b| b == 0));
}

#[test]
fn test_mode15_at_120_bytes() {
    let text = vec![b'B'; 120];
    let samples = encode_burst(8000, &text, "K1ABC", 0, false);
    let out = run_decoder(8000, &samples);
    let (_, payload, staged) = out.fetched.expect("no done");
    assert_eq!(staged.mode, 15);
    assert_eq!(&payload[..120], &text[..]);
}

#[test]
fn test_ping_reports_callsign() {
    let samples = encode_burst(8000, b"", "TEST", 0, false);
    let mut dec = Decoder::new(8000, 1500.0, Channel::Mono).unwrap();
    let e = dec.extended_length();
    let mut saw_ping = false;
    for chunk in samples.chunks(e) {
        if dec.feed(chunk) {
            let status = dec.process();
            assert_ne!(status, Status::Done, "ping has no payload");
            if status == Status::Ping {
                saw_ping = true;
                let staged = dec.staged();
                assert_eq!(staged.mode, 0);
                assert_eq!(staged.callsign.trim_end(), "TEST");
            }
        }
    }
    assert!(saw_ping, "ping burst was not reported");
}

#[test]
fn test_round_trip_at_48k() {
    let mut enc = Encoder::new(48000).unwrap();
    assert_eq!(enc.extended_length(), 8640);
    let text = vec![b'C'; 80];
    enc.configure(&text, "TEST", 1500.0, 0, false);
    let e = enc.extended_length();
    let mut samples = vec![0i16; 2 * e];
    let mut buf = vec![0i16; e];
    while enc.produce(&mut buf) {
        samples.extend_from_slice(&buf);
    }
    samples.extend(std::iter::repeat(0).take(4 * e));

    let out = run_decoder(48000, &samples);
    let (_, payload, staged) = out.fetched.expect("no done at 48k");
    assert_eq!(staged.mode, 16);
    assert_eq!(&payload[..80], &text[..]);
}

#[test]
fn test_noise_preroll_and_fancy_header_still_decode() {
    let samples = encode_burst(8000, b"73 DE K6XYZ", "K6XYZ", 2, true);
    let out = run_decoder(8000, &samples);
    let (_, payload, _) = out.fetched.expect("no done with trimmings");
    assert_eq!(text_of(&payload), "73 DE K6XYZ");
}
