use std::io::Cursor;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::source::{FrameSource, SourceControl, SourceKind, SourceStatus};
use crate::error::Result;
use crate::kernel::event::{Event, StopReason};

/// Granularity of the cancellation check while waiting for the next tick.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Frame(Vec<u8>),
    /// Live source, but this grab failed. The timer keeps running.
    Skipped,
    /// The source is paused or ended; the timer must not fire again.
    Stop(StopReason),
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out.into_inner())
}

pub struct Sampler<S> {
    source: S,
    jpeg_quality: u8,
    generation: u64,
}

impl<S: FrameSource> Sampler<S> {
    pub fn new(source: S, jpeg_quality: u8) -> Self {
        Self {
            source,
            jpeg_quality,
            generation: 0,
        }
    }

    /// Tag every event this sampler posts with `generation`.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// One timer firing. Nothing is grabbed or encoded unless the source is live.
    pub fn tick(&mut self) -> TickOutcome {
        match self.source.status() {
            SourceStatus::Paused => return TickOutcome::Stop(StopReason::Paused),
            SourceStatus::Ended => return TickOutcome::Stop(StopReason::Ended),
            SourceStatus::Live => {}
        }

        let encoded = self
            .source
            .grab()
            .and_then(|frame| encode_jpeg(&frame, self.jpeg_quality));
        match encoded {
            Ok(jpeg) => TickOutcome::Frame(jpeg),
            Err(e) => {
                debug!("{:?} frame skipped: {}", self.source.kind(), e);
                if self.source.status() == SourceStatus::Ended {
                    TickOutcome::Stop(StopReason::Ended)
                } else {
                    TickOutcome::Skipped
                }
            }
        }
    }

    /// Fixed-interval loop. Runs on a dedicated OS thread so grabbing and
    /// encoding never stall the async runtime.
    pub fn run(mut self, tx: mpsc::Sender<Event>, cancel: CancellationToken, interval: Duration) {
        let kind = self.source.kind();
        let generation = self.generation;
        info!("{:?} sampler started ({}ms)", kind, interval.as_millis());

        let reason = loop {
            if wait_or_cancel(&cancel, interval) {
                break StopReason::Cancelled;
            }
            match self.tick() {
                TickOutcome::Frame(jpeg) => {
                    let event = Event::FrameSampled {
                        source: kind,
                        generation,
                        jpeg,
                    };
                    if tx.blocking_send(event).is_err() {
                        break StopReason::Cancelled;
                    }
                }
                TickOutcome::Skipped => {}
                TickOutcome::Stop(reason) => break reason,
            }
        };

        info!("{:?} sampler stopped: {:?}", kind, reason);
        let _ = tx.blocking_send(Event::SourceStopped {
            source: kind,
            generation,
            reason,
        });
    }
}

/// Sleeps for `interval`; returns true if cancelled first.
fn wait_or_cancel(cancel: &CancellationToken, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if cancel.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}

/// Control side of a running sampler.
#[derive(Debug, Clone)]
pub struct SamplerHandle {
    pub kind: SourceKind,
    pub control: SourceControl,
    cancel: CancellationToken,
}

impl SamplerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Build the source on its own thread and start sampling it.
pub fn spawn<S, F>(
    kind: SourceKind,
    generation: u64,
    open: F,
    tx: mpsc::Sender<Event>,
    interval: Duration,
    jpeg_quality: u8,
) -> SamplerHandle
where
    S: FrameSource,
    F: FnOnce(SourceControl) -> Result<S> + Send + 'static,
{
    let control = SourceControl::default();
    let cancel = CancellationToken::new();
    let handle = SamplerHandle {
        kind,
        control: control.clone(),
        cancel: cancel.clone(),
    };

    std::thread::spawn(move || match open(control) {
        Ok(source) => Sampler::new(source, jpeg_quality)
            .with_generation(generation)
            .run(tx, cancel, interval),
        Err(e) => {
            error!("Failed to open {:?} source: {}", kind, e);
            let _ = tx.blocking_send(Event::SourceStopped {
                source: kind,
                generation,
                reason: StopReason::Ended,
            });
        }
    });

    handle
}
