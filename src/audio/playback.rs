use std::collections::VecDeque;

use super::clip::Clip;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Serial playback of inbound audio.
///
/// Frames that arrive while a clip is playing are coalesced into the next
/// clip instead of interrupting the current one. A clip is only handed out
/// from `Idle`, and the only way back to `Idle` is [`PlaybackPipeline::finished`],
/// so two clips can never overlap.
#[derive(Debug)]
pub struct PlaybackPipeline {
    sample_rate: u32,
    state: PlaybackState,
    queue: VecDeque<Vec<i16>>,
}

impl PlaybackPipeline {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: PlaybackState::Idle,
            queue: VecDeque::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    /// Queue a frame. Returns the clip to start playing if the pipeline was idle.
    pub fn enqueue(&mut self, frame: Vec<i16>) -> Option<Clip> {
        self.queue.push_back(frame);
        match self.state {
            PlaybackState::Idle => self.drain(),
            PlaybackState::Playing => None,
        }
    }

    /// Completion of the active clip. Returns the next clip if frames queued up meanwhile.
    pub fn finished(&mut self) -> Option<Clip> {
        self.state = PlaybackState::Idle;
        self.drain()
    }

    fn drain(&mut self) -> Option<Clip> {
        if self.queue.is_empty() {
            return None;
        }
        let clip = Clip::from_frames(self.sample_rate, self.queue.drain(..));
        self.state = PlaybackState::Playing;
        Some(clip)
    }
}
