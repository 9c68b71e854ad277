use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use crate::error::{RelayError, Result};

const CHUNK_FRAMES: usize = 480;

/// Mono rate conversion. Passes samples through untouched when the rates match.
pub struct RateConverter {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
}

impl RateConverter {
    pub fn new(from: u32, to: u32) -> Result<Self> {
        let inner = if from == to {
            None
        } else {
            debug!("Resampling {}Hz -> {}Hz", from, to);
            let resampler = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK_FRAMES, 2, 1)
                .map_err(|e| RelayError::Resample(e.to_string()))?;
            Some(resampler)
        };
        Ok(Self {
            inner,
            pending: Vec::new(),
        })
    }

    /// Feed samples; returns whatever full chunks could be converted.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(input.to_vec());
        };

        self.pending.extend_from_slice(input);
        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            let converted = resampler
                .process(&[chunk], None)
                .map_err(|e| RelayError::Resample(e.to_string()))?;
            if let Some(channel) = converted.into_iter().next() {
                out.extend(channel);
            }
        }
        Ok(out)
    }

    /// Convert any buffered remainder, zero-padding the final chunk.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let chunk = [std::mem::take(&mut self.pending)];
        let converted = resampler
            .process_partial(Some(&chunk[..]), None)
            .map_err(|e| RelayError::Resample(e.to_string()))?;
        Ok(converted.into_iter().next().unwrap_or_default())
    }
}

/// Convert a whole buffer in one go.
pub fn resample_all(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    let mut converter = RateConverter::new(from, to)?;
    let mut out = converter.process(input)?;
    out.extend(converter.flush()?);
    Ok(out)
}
