/// Capture rate for microphone audio sent upstream.
pub const CAPTURE_SAMPLE_RATE: u32 = 24_000;
/// Rate assumed for PCM audio received from the endpoint.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;
/// Samples per captured frame.
pub const BLOCK_SIZE: usize = 1024;

pub const PCM_MIME_TYPE: &str = "audio/pcm";

/// Saturating float -> 16-bit conversion. Out-of-range input clamps, never wraps.
pub fn f32_to_i16(sample: f32) -> i16 {
    let scaled = sample * 32768.0;
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

pub fn convert_block(input: &[f32]) -> Vec<i16> {
    input.iter().map(|&s| f32_to_i16(s)).collect()
}

pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Little-endian bytes -> samples. A trailing odd byte is discarded.
pub fn from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// True for `audio/pcm` and its parameterised forms (`audio/pcm;rate=24000`).
pub fn is_pcm_mime(mime_type: &str) -> bool {
    mime_type
        .split(';')
        .next()
        .map(|base| base.trim().eq_ignore_ascii_case(PCM_MIME_TYPE))
        .unwrap_or(false)
}

/// One fixed-size block of captured audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<i16>,
}

impl Frame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        to_le_bytes(&self.samples)
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl AsRef<[i16]> for Frame {
    fn as_ref(&self) -> &[i16] {
        &self.samples
    }
}
