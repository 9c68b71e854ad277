use crate::audio::pcm::Frame;
use crate::protocol::envelope::ServerEnvelope;
use crate::vision::source::SourceKind;

/// Everything the reactor reacts to. Every producer (device threads, socket
/// task, sampler threads, console) posts into the same queue.
#[derive(Debug, Clone)]
pub enum Event {
    ChannelOpened,
    ChannelClosed,
    Inbound(ServerEnvelope),
    /// One converted block from the microphone.
    CapturedBlock(Frame),
    /// The speaker finished the clip it was given.
    PlaybackFinished,
    /// `generation` identifies which start of the source produced the event.
    FrameSampled { source: SourceKind, generation: u64, jpeg: Vec<u8> },
    SourceStopped { source: SourceKind, generation: u64, reason: StopReason },
    DeviceFailed(Device),
    Command(UserCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Paused,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Microphone,
    Speaker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    SendText(String),
    ToggleMicrophone,
    ToggleScreen,
    ToggleVideo,
    PauseVideo,
    Connect,
    Quit,
}
