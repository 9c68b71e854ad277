use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{RelayConfig, DEFAULT_API_BASE_URL, DEFAULT_ENDPOINT, DEFAULT_MODEL};

/// parley - real-time audio/screen relay to a generative-AI live endpoint
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub api: ApiArgs,

    #[command(flatten)]
    pub live: LiveArgs,

    /// Without a subcommand, runs a live session
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// One-shot text generation
    Ask {
        prompt: String,
        /// Print partial results as they stream in
        #[arg(long)]
        stream: bool,
    },

    /// Interactive multi-turn chat over stdin
    Chat {
        /// Print each reply as it streams in
        #[arg(long)]
        stream: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    #[arg(long, env = "PARLEY_API_BASE_URL", default_value = DEFAULT_API_BASE_URL, global = true)]
    pub api_base_url: String,

    #[arg(long, env = "PARLEY_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "PARLEY_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,
}

#[derive(Args, Debug, Clone)]
pub struct LiveArgs {
    /// WebSocket endpoint of the live session
    #[arg(long, env = "PARLEY_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Send a setup message naming this model when the channel opens
    #[arg(long, env = "PARLEY_SETUP_MODEL")]
    pub setup_model: Option<String>,

    /// Start with the microphone on
    #[arg(long)]
    pub mic: bool,

    /// Start sharing the primary screen
    #[arg(long)]
    pub screen: bool,

    /// Directory of still images replayed as the video source
    #[arg(long, env = "PARLEY_VIDEO_DIR")]
    pub video_dir: Option<PathBuf>,

    /// Write finalized clips as WAV files into this directory
    #[arg(long, env = "PARLEY_RECORDINGS_DIR")]
    pub recordings_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    pub frame_interval_ms: u64,

    #[arg(long, default_value_t = 92, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,
}

impl Cli {
    pub fn config(&self) -> RelayConfig {
        let mut config = RelayConfig {
            api_base_url: self.api.api_base_url.clone(),
            api_key: self.api.api_key.clone(),
            model: self.api.model.clone(),
            ..RelayConfig::default()
        };
        self.live.apply(&mut config);
        config
    }
}

impl LiveArgs {
    fn apply(&self, config: &mut RelayConfig) {
        config.endpoint = self.endpoint.clone();
        config.setup_model = self.setup_model.clone();
        config.microphone_on_start = self.mic;
        config.screen_on_start = self.screen;
        config.video_dir = self.video_dir.clone();
        config.recordings_dir = self.recordings_dir.clone();
        config.frame_interval_ms = self.frame_interval_ms;
        config.jpeg_quality = self.jpeg_quality;
    }
}
