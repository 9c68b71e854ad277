use std::io::Cursor;

use crate::error::Result;

/// Size of the canonical PCM WAV header produced by [`Clip::to_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// A finalized, playable run of mono 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub sample_rate: u32,
    samples: Vec<i16>,
}

impl Clip {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self { sample_rate, samples }
    }

    /// Concatenate frames in order.
    pub fn from_frames<I, F>(sample_rate: u32, frames: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[i16]>,
    {
        let mut samples = Vec::new();
        for frame in frames {
            samples.extend_from_slice(frame.as_ref());
        }
        Self { sample_rate, samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the PCM payload in bytes.
    pub fn pcm_len(&self) -> usize {
        self.samples.len() * 2
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    pub fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Header + sample data. RIFF and data sizes are filled in by the writer on finalize.
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + self.pcm_len()));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.wav_spec())?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}
