use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::capture::{CaptureActor, CaptureController};
use crate::audio::speaker::{SpeakerActor, SpeakerController};
use crate::config::RelayConfig;
use crate::kernel::effect::SideEffect;
use crate::kernel::event::{Event, StopReason};
use crate::session::{ClipRecorder, EntryContent, SessionEntry};
use crate::transport::{Channel, SendOutcome};
use crate::vision::sampler::{self, SamplerHandle};
use crate::vision::source::{FrameSequenceSource, ScreenSource, SourceKind};

/// Carries out the reactor's side effects against real devices and the network.
pub struct Driver {
    config: RelayConfig,
    tx: mpsc::Sender<Event>,
    channel: Channel,
    capture: CaptureController,
    speaker: SpeakerController,
    samplers: HashMap<SourceKind, SamplerHandle>,
    recorder: Option<ClipRecorder>,
}

impl Driver {
    pub fn new(config: RelayConfig, tx: mpsc::Sender<Event>) -> Self {
        let capture = CaptureActor::spawn(tx.clone(), config.capture_sample_rate, config.block_size);
        let speaker = SpeakerActor::spawn(tx.clone());
        let recorder = config.recordings_dir.as_ref().and_then(|dir| match ClipRecorder::new(dir) {
            Ok(recorder) => Some(recorder),
            Err(e) => {
                warn!("Recording disabled ({}): {}", dir.display(), e);
                None
            }
        });

        Self {
            config,
            tx,
            channel: Channel::new(),
            capture,
            speaker,
            samplers: HashMap::new(),
            recorder,
        }
    }

    /// Returns false once the session should end.
    pub fn execute(&mut self, effect: SideEffect) -> bool {
        match effect {
            SideEffect::Connect => {
                if self.channel.open(&self.config.endpoint, self.tx.clone()) {
                    info!("Connecting to {}", self.config.endpoint);
                }
            }
            SideEffect::Transmit(envelope) => {
                if self.channel.send(envelope) == SendOutcome::Dropped {
                    debug!("Envelope dropped ({:?})", self.channel.state());
                }
            }
            SideEffect::Play(clip) => self.speaker.play(clip),
            SideEffect::StartCapture => self.capture.start(),
            SideEffect::StopCapture => self.capture.stop(),
            SideEffect::StartSampler(kind, generation) => self.start_sampler(kind, generation),
            SideEffect::StopSampler(kind) => {
                if let Some(handle) = self.samplers.remove(&kind) {
                    handle.cancel();
                }
            }
            SideEffect::PauseSource(kind) => {
                if let Some(handle) = self.samplers.get(&kind) {
                    handle.control.pause();
                }
            }
            SideEffect::Logged(entry) => self.publish(&entry),
            SideEffect::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    fn start_sampler(&mut self, kind: SourceKind, generation: u64) {
        if let Some(previous) = self.samplers.remove(&kind) {
            previous.cancel();
        }
        let interval = self.config.frame_interval();
        let quality = self.config.jpeg_quality;
        let tx = self.tx.clone();

        let handle = match kind {
            SourceKind::Screen => sampler::spawn(kind, generation, ScreenSource::primary, tx, interval, quality),
            SourceKind::Video => {
                let Some(dir) = self.config.video_dir.clone() else {
                    warn!("No video directory configured");
                    let _ = self.tx.try_send(Event::SourceStopped {
                        source: kind,
                        generation,
                        reason: StopReason::Ended,
                    });
                    return;
                };
                sampler::spawn(
                    kind,
                    generation,
                    move |control| FrameSequenceSource::open(&dir, control),
                    tx,
                    interval,
                    quality,
                )
            }
        };
        self.samplers.insert(kind, handle);
    }

    fn publish(&mut self, entry: &SessionEntry) {
        match &entry.content {
            EntryContent::Text(text) => info!("[{}] {}", entry.participant.label(), text),
            EntryContent::Audio(clip) => info!(
                "[{}] audio clip {}ms ({} bytes)",
                entry.participant.label(),
                clip.duration_ms(),
                clip.pcm_len()
            ),
        }
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record(entry) {
                warn!("Failed to record clip: {}", e);
            }
        }
    }

    fn shutdown(&mut self) {
        for (_, handle) in self.samplers.drain() {
            handle.cancel();
        }
        self.capture.shutdown();
        self.speaker.shutdown();
        self.channel.close();
    }
}
