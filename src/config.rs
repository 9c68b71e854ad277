use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::pcm::{BLOCK_SIZE, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE};
use crate::kernel::reactor::ReactorConfig;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:9083";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket endpoint of the live session.
    pub endpoint: String,
    pub setup_model: Option<String>,

    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub block_size: usize,

    pub frame_interval_ms: u64,
    pub jpeg_quality: u8,
    pub screen_on_start: bool,
    pub microphone_on_start: bool,
    /// Directory of still images replayed as the video source.
    pub video_dir: Option<PathBuf>,

    /// Where finalized clips are written as WAV files.
    pub recordings_dir: Option<PathBuf>,

    pub api_base_url: String,
    pub api_key: Option<String>,
    pub model: String,

    pub event_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            setup_model: None,
            capture_sample_rate: CAPTURE_SAMPLE_RATE,
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            block_size: BLOCK_SIZE,
            frame_interval_ms: 1000,
            jpeg_quality: 92,
            screen_on_start: false,
            microphone_on_start: false,
            video_dir: None,
            recordings_dir: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            event_queue_capacity: 1024,
        }
    }
}

impl RelayConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn reactor(&self) -> ReactorConfig {
        ReactorConfig {
            capture_sample_rate: self.capture_sample_rate,
            playback_sample_rate: self.playback_sample_rate,
            setup_model: self.setup_model.clone(),
        }
    }
}
