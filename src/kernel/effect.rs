use crate::audio::clip::Clip;
use crate::protocol::envelope::ClientEnvelope;
use crate::session::SessionEntry;
use crate::vision::source::SourceKind;

/// Work the reactor asks the driver to do. The reactor itself never touches I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Connect,
    /// Hand to the channel; dropped there if it is not open.
    Transmit(ClientEnvelope),
    Play(Clip),
    StartCapture,
    StopCapture,
    /// Start sampling; events from this sampler carry the given generation.
    StartSampler(SourceKind, u64),
    StopSampler(SourceKind),
    PauseSource(SourceKind),
    Logged(SessionEntry),
    Shutdown,
}
