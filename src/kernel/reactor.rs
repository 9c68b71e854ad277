use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::effect::SideEffect;
use super::event::{Device, Event, StopReason, UserCommand};
use super::state::SessionState;
use crate::audio::pcm::{Frame, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE};
use crate::driver::Driver;
use crate::protocol::envelope::{ClientEnvelope, ServerEnvelope};
use crate::session::{EntryContent, Participant, SessionLog};
use crate::vision::source::SourceKind;

#[derive(Debug, Clone)]
pub struct ReactorConfig {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    /// Sent as a setup envelope every time the channel opens.
    pub setup_model: Option<String>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate: CAPTURE_SAMPLE_RATE,
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            setup_model: None,
        }
    }
}

/// Single consumer of every event in the system.
///
/// All mutable session state lives here and is only touched from `step`, one
/// event at a time, in arrival order. `step` is pure with respect to I/O: it
/// returns the side effects for the driver to carry out.
pub struct Reactor {
    pub receiver: mpsc::Receiver<Event>,
    pub state: SessionState,
    pub log: SessionLog,
    config: ReactorConfig,
}

impl Reactor {
    pub fn new(receiver: mpsc::Receiver<Event>, config: ReactorConfig) -> Self {
        Self {
            receiver,
            state: SessionState::new(config.playback_sample_rate),
            log: SessionLog::new(),
            config,
        }
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Apply a batch of events in order.
    pub fn tick_step(&mut self, events: Vec<Event>) -> Vec<SideEffect> {
        events.into_iter().flat_map(|event| self.step(event)).collect()
    }

    pub fn step(&mut self, event: Event) -> Vec<SideEffect> {
        match event {
            Event::ChannelOpened => {
                self.state.channel_open = true;
                info!("Channel opened");
                match &self.config.setup_model {
                    Some(model) => vec![SideEffect::Transmit(ClientEnvelope::setup(model.clone()))],
                    None => Vec::new(),
                }
            }
            Event::ChannelClosed => {
                self.state.channel_open = false;
                info!("Channel closed");
                Vec::new()
            }
            Event::Inbound(envelope) => self.on_inbound(envelope),
            Event::CapturedBlock(frame) => self.on_captured(frame),
            Event::PlaybackFinished => match self.state.playback.finished() {
                Some(clip) => vec![SideEffect::Play(clip)],
                None => Vec::new(),
            },
            Event::FrameSampled { source, generation, jpeg } => {
                if !self.state.is_current_source(source, generation) {
                    debug!("Dropping late {:?} frame", source);
                    return Vec::new();
                }
                vec![SideEffect::Transmit(ClientEnvelope::jpeg(&jpeg))]
            }
            Event::SourceStopped {
                source,
                generation,
                reason,
            } => self.on_source_stopped(source, generation, reason),
            Event::DeviceFailed(Device::Microphone) => {
                self.state.microphone = false;
                warn!("Microphone unavailable; capture off");
                Vec::new()
            }
            Event::DeviceFailed(Device::Speaker) => {
                warn!("Speaker unavailable");
                Vec::new()
            }
            Event::Command(command) => self.on_command(command),
        }
    }

    fn on_inbound(&mut self, envelope: ServerEnvelope) -> Vec<SideEffect> {
        if envelope.setup_complete.is_some() {
            debug!("Setup complete");
        }
        let Some(content) = envelope.server_content else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        for frame in content.audio_frames() {
            self.state.received_audio.push(frame.clone());
            if let Some(clip) = self.state.playback.enqueue(frame) {
                effects.push(SideEffect::Play(clip));
            }
        }
        for text in content.texts() {
            let entry = self.log.append(Participant::Remote, EntryContent::Text(text));
            effects.push(SideEffect::Logged(entry.clone()));
        }
        if content.turn_complete {
            effects.extend(self.finish_turn());
        }
        effects
    }

    /// Turn boundary: the only point where accumulated frames become clips.
    fn finish_turn(&mut self) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if let Some(clip) = self.state.take_sent_clip(self.config.capture_sample_rate) {
            let entry = self.log.append(Participant::Local, EntryContent::Audio(clip));
            effects.push(SideEffect::Logged(entry.clone()));
        }
        // Emitted even when nothing was received.
        let remote = self.state.take_received_clip(self.config.playback_sample_rate);
        let entry = self.log.append(Participant::Remote, EntryContent::Audio(remote));
        effects.push(SideEffect::Logged(entry.clone()));
        effects
    }

    fn on_captured(&mut self, frame: Frame) -> Vec<SideEffect> {
        if !self.state.microphone {
            debug!("Dropping block captured after stop");
            return Vec::new();
        }
        let envelope = ClientEnvelope::audio(&frame.to_le_bytes());
        self.state.sent_audio.push(frame);
        vec![SideEffect::Transmit(envelope)]
    }

    fn on_source_stopped(&mut self, source: SourceKind, generation: u64, reason: StopReason) -> Vec<SideEffect> {
        // Stops from a sampler we already replaced or stopped ourselves, including cancel acknowledgements.
        if !self.state.is_current_source(source, generation) {
            debug!("Ignoring {:?} stop ({:?}) from generation {}", source, reason, generation);
            return Vec::new();
        }
        self.state.set_source_active(source, false);
        let mut effects = vec![SideEffect::StopSampler(source)];
        info!("{:?} sampling stopped ({:?})", source, reason);

        // The user ending a screen share also tears down microphone capture.
        if source == SourceKind::Screen && reason == StopReason::Ended && self.state.microphone {
            self.state.microphone = false;
            effects.push(SideEffect::StopCapture);
        }
        effects
    }

    fn on_command(&mut self, command: UserCommand) -> Vec<SideEffect> {
        match command {
            UserCommand::SendText(text) => {
                let envelope = ClientEnvelope::text(text.clone());
                let entry = self.log.append(Participant::Local, EntryContent::Text(text));
                vec![SideEffect::Transmit(envelope), SideEffect::Logged(entry.clone())]
            }
            UserCommand::ToggleMicrophone => {
                self.state.microphone = !self.state.microphone;
                info!("Microphone {}", if self.state.microphone { "on" } else { "off" });
                if self.state.microphone {
                    vec![SideEffect::StartCapture]
                } else {
                    vec![SideEffect::StopCapture]
                }
            }
            UserCommand::ToggleScreen => self.toggle_source(SourceKind::Screen),
            UserCommand::ToggleVideo => self.toggle_source(SourceKind::Video),
            UserCommand::PauseVideo => {
                if self.state.video {
                    vec![SideEffect::PauseSource(SourceKind::Video)]
                } else {
                    Vec::new()
                }
            }
            UserCommand::Connect => vec![SideEffect::Connect],
            UserCommand::Quit => vec![SideEffect::Shutdown],
        }
    }

    fn toggle_source(&mut self, kind: SourceKind) -> Vec<SideEffect> {
        if self.state.source_active(kind) {
            self.state.set_source_active(kind, false);
            info!("{:?} sampling off", kind);
            vec![SideEffect::StopSampler(kind)]
        } else {
            let generation = self.state.begin_source(kind);
            info!("{:?} sampling on", kind);
            vec![SideEffect::StartSampler(kind, generation)]
        }
    }

    /// Event loop: one event at a time until the queue closes or a shutdown is requested.
    pub async fn run(&mut self, driver: &mut Driver) {
        info!("Reactor started");
        while let Some(event) = self.receiver.recv().await {
            for effect in self.step(event) {
                if !driver.execute(effect) {
                    info!("Reactor stopping");
                    return;
                }
            }
        }
        info!("Event queue closed");
    }
}
