use parley::audio::capture::BlockAssembler;
use parley::audio::pcm::{self, Frame, BLOCK_SIZE, CAPTURE_SAMPLE_RATE};

#[test]
fn test_conversion_saturates() {
    assert_eq!(pcm::f32_to_i16(1.5), 32767);
    assert_eq!(pcm::f32_to_i16(-1.5), -32768);
    assert_eq!(pcm::f32_to_i16(0.0), 0);

    // Full scale positive clamps rather than wrapping to -32768.
    assert_eq!(pcm::f32_to_i16(1.0), 32767);
    assert_eq!(pcm::f32_to_i16(-1.0), -32768);
    assert_eq!(pcm::f32_to_i16(0.5), 16384);
    assert_eq!(pcm::f32_to_i16(f32::INFINITY), 32767);
    assert_eq!(pcm::f32_to_i16(f32::NEG_INFINITY), -32768);
    assert_eq!(pcm::f32_to_i16(f32::NAN), 0);
}

#[test]
fn test_block_conversion_is_elementwise() {
    let block = pcm::convert_block(&[2.0, -2.0, 0.25, 0.0]);
    assert_eq!(block, vec![32767, -32768, 8192, 0]);
}

#[test]
fn test_little_endian_bytes() {
    let samples = [1i16, -2, 0x1234];
    let bytes = pcm::to_le_bytes(&samples);
    assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0x34, 0x12]);
    assert_eq!(pcm::from_le_bytes(&bytes), samples.to_vec());

    // Trailing odd byte is discarded.
    let mut odd = bytes.clone();
    odd.push(0x7F);
    assert_eq!(pcm::from_le_bytes(&odd), samples.to_vec());
}

#[test]
fn test_pcm_mime_detection() {
    assert!(pcm::is_pcm_mime("audio/pcm"));
    assert!(pcm::is_pcm_mime("audio/pcm;rate=24000"));
    assert!(pcm::is_pcm_mime("AUDIO/PCM; rate=16000"));
    assert!(!pcm::is_pcm_mime("image/jpeg"));
    assert!(!pcm::is_pcm_mime("audio/pcmx"));
    assert!(!pcm::is_pcm_mime(""));
}

#[test]
fn test_frame_bytes_match_samples() {
    let frame = Frame::new(vec![0x0102, -1]);
    assert_eq!(frame.len(), 2);
    assert_eq!(frame.to_le_bytes(), vec![0x02, 0x01, 0xFF, 0xFF]);
}

#[test]
fn test_assembler_emits_fixed_blocks() {
    let mut assembler = BlockAssembler::new(CAPTURE_SAMPLE_RATE, 1, CAPTURE_SAMPLE_RATE, BLOCK_SIZE).unwrap();

    let frames = assembler.push(&vec![0.25f32; BLOCK_SIZE * 3]);
    assert_eq!(frames.len(), 3);
    for frame in &frames {
        assert_eq!(frame.len(), BLOCK_SIZE);
        assert!(frame.samples().iter().all(|&s| s == 8192));
    }
    assert_eq!(assembler.buffered(), 0);
}

#[test]
fn test_assembler_holds_less_than_one_block() {
    let mut assembler = BlockAssembler::new(CAPTURE_SAMPLE_RATE, 1, CAPTURE_SAMPLE_RATE, BLOCK_SIZE).unwrap();

    assert!(assembler.push(&vec![0.0f32; 1000]).is_empty());
    assert_eq!(assembler.buffered(), 1000);

    let frames = assembler.push(&vec![0.0f32; 100]);
    assert_eq!(frames.len(), 1);
    assert_eq!(assembler.buffered(), 76);
}

#[test]
fn test_assembler_downmixes_stereo() {
    let mut assembler = BlockAssembler::new(CAPTURE_SAMPLE_RATE, 2, CAPTURE_SAMPLE_RATE, 4).unwrap();

    // L/R pairs average to 0.5, 0.0, -0.5, 0.25
    let frames = assembler.push(&[1.0, 0.0, 0.5, -0.5, -1.0, 0.0, 0.25, 0.25]);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].samples(), &[16384, 0, -16384, 8192]);
}

#[test]
fn test_assembler_resamples_to_capture_rate() {
    let mut assembler = BlockAssembler::new(48_000, 1, CAPTURE_SAMPLE_RATE, BLOCK_SIZE).unwrap();

    // One second at 48kHz is one second at 24kHz: 24000 samples, 23 full blocks.
    let frames = assembler.push(&vec![0.0f32; 48_000]);
    assert!(frames.len() >= 22 && frames.len() <= 23, "got {} blocks", frames.len());
    assert!(frames.iter().all(|f| f.len() == BLOCK_SIZE));
    assert!(assembler.buffered() < BLOCK_SIZE);
}
