use crate::audio::clip::Clip;
use crate::audio::pcm::Frame;
use crate::audio::playback::PlaybackPipeline;
use crate::vision::source::SourceKind;

/// Everything the reactor mutates. Owned by the reactor alone.
#[derive(Debug)]
pub struct SessionState {
    /// Frames sent upstream since the last turn boundary.
    pub sent_audio: Vec<Frame>,
    /// Frames received since the last turn boundary.
    pub received_audio: Vec<Vec<i16>>,
    pub playback: PlaybackPipeline,

    pub channel_open: bool,
    pub microphone: bool,
    pub screen: bool,
    pub video: bool,
    screen_generation: u64,
    video_generation: u64,
}

impl SessionState {
    pub fn new(playback_sample_rate: u32) -> Self {
        Self {
            sent_audio: Vec::new(),
            received_audio: Vec::new(),
            playback: PlaybackPipeline::new(playback_sample_rate),
            channel_open: false,
            microphone: false,
            screen: false,
            video: false,
            screen_generation: 0,
            video_generation: 0,
        }
    }

    pub fn source_active(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Screen => self.screen,
            SourceKind::Video => self.video,
        }
    }

    pub fn set_source_active(&mut self, kind: SourceKind, active: bool) {
        match kind {
            SourceKind::Screen => self.screen = active,
            SourceKind::Video => self.video = active,
        }
    }

    pub fn source_generation(&self, kind: SourceKind) -> u64 {
        match kind {
            SourceKind::Screen => self.screen_generation,
            SourceKind::Video => self.video_generation,
        }
    }

    /// Mark the source active under a fresh generation and return it.
    pub fn begin_source(&mut self, kind: SourceKind) -> u64 {
        let generation = match kind {
            SourceKind::Screen => &mut self.screen_generation,
            SourceKind::Video => &mut self.video_generation,
        };
        *generation += 1;
        let current = *generation;
        self.set_source_active(kind, true);
        current
    }

    /// True only for events from the sampler that is running right now.
    pub fn is_current_source(&self, kind: SourceKind, generation: u64) -> bool {
        self.source_active(kind) && self.source_generation(kind) == generation
    }

    /// Finalize and clear the sent-audio accumulator. `None` when nothing was sent.
    pub fn take_sent_clip(&mut self, sample_rate: u32) -> Option<Clip> {
        if self.sent_audio.is_empty() {
            return None;
        }
        Some(Clip::from_frames(sample_rate, self.sent_audio.drain(..)))
    }

    /// Finalize and clear the received-audio accumulator, even when it is empty.
    pub fn take_received_clip(&mut self, sample_rate: u32) -> Clip {
        Clip::from_frames(sample_rate, self.received_audio.drain(..))
    }
}
