//! Tests for the audio relay

use super::*;
use std::io::Cursor;

fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn samples_of(frame: &[u8]) -> Vec<i16> {
    frame
        .chunks_exact(2)
        .map(|p| i16::from_le_bytes([p[0], p[1]]))
        .collect()
}

#[test]
fn test_unity_volume_is_bytewise_passthrough() {
    let input = pcm_bytes(&[0, 100, -100, i16::MAX, i16::MIN, 12345]);
    let mut relay = AudioRelay::new(Cursor::new(input.clone()), SharedVolume::new(1.0));
    let frame = relay.read_frame(input.len()).unwrap();
    assert_eq!(frame, input);
}

#[test]
fn test_half_volume_scales_samples() {
    let input = pcm_bytes(&[1000, -1000, 400]);
    let mut relay = AudioRelay::new(Cursor::new(input), SharedVolume::new(0.5));
    let frame = relay.read_frame(6).unwrap();
    assert_eq!(samples_of(&frame), vec![500, -500, 200]);
}

#[test]
fn test_volume_clamped_at_two() {
    let input = pcm_bytes(&[1000, -1000]);
    let mut relay = AudioRelay::new(Cursor::new(input), SharedVolume::new(5.0));
    let frame = relay.read_frame(4).unwrap();
    // Requested 5x, effective 2x.
    assert_eq!(samples_of(&frame), vec![2000, -2000]);
}

#[test]
fn test_scaling_saturates_at_sample_range() {
    let input = pcm_bytes(&[i16::MAX, i16::MIN]);
    let mut relay = AudioRelay::new(Cursor::new(input), SharedVolume::new(2.0));
    let frame = relay.read_frame(4).unwrap();
    assert_eq!(samples_of(&frame), vec![i16::MAX, i16::MIN]);
}

#[test]
fn test_negative_volume_clamps_to_silence() {
    let input = pcm_bytes(&[1000, -1000]);
    let mut relay = AudioRelay::new(Cursor::new(input), SharedVolume::new(-5.0));
    let frame = relay.read_frame(4).unwrap();
    // No phase-inverted amplification; the effective floor is zero gain.
    assert_eq!(samples_of(&frame), vec![0, 0]);
}

#[test]
fn test_zero_volume_silences() {
    let input = pcm_bytes(&[1234, -9876]);
    let mut relay = AudioRelay::new(Cursor::new(input), SharedVolume::new(0.0));
    let frame = relay.read_frame(4).unwrap();
    assert_eq!(samples_of(&frame), vec![0, 0]);
}

#[test]
fn test_volume_change_applies_mid_stream() {
    let input = pcm_bytes(&[1000, 1000]);
    let volume = SharedVolume::new(1.0);
    let mut relay = AudioRelay::new(Cursor::new(input), volume.clone());

    let first = relay.read_frame(2).unwrap();
    assert_eq!(samples_of(&first), vec![1000]);

    volume.set(0.5);
    let second = relay.read_frame(2).unwrap();
    assert_eq!(samples_of(&second), vec![500]);
}

#[test]
fn test_eof_yields_empty_frame() {
    let input = pcm_bytes(&[42]);
    let mut relay = AudioRelay::new(Cursor::new(input), SharedVolume::new(1.0));
    let first = relay.read_frame(2).unwrap();
    assert_eq!(first.len(), 2);
    let second = relay.read_frame(2).unwrap();
    assert!(second.is_empty());
    assert_eq!(relay.frames_read(), 1);
}

#[test]
fn test_short_final_frame_is_truncated() {
    let input = pcm_bytes(&[1, 2, 3]);
    let mut relay = AudioRelay::new(Cursor::new(input), SharedVolume::new(1.0));
    let frame = relay.read_frame(4).unwrap();
    assert_eq!(frame.len(), 4);
    let tail = relay.read_frame(4).unwrap();
    assert_eq!(tail.len(), 2);
}

#[test]
fn test_audio_error_display() {
    let stream_error = AudioError::StreamError("Test stream error".to_string());
    let state_error = AudioError::InvalidState("not playing".to_string());

    assert_eq!(format!("{}", stream_error), "Streaming error: Test stream error");
    assert_eq!(format!("{}", state_error), "Invalid state: not playing");
}
