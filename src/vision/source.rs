use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Screen,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Live,
    Paused,
    Ended,
}

/// Anything the sampler can pull still frames from. Sources live on the
/// sampler's own thread, so they need not be `Send`.
pub trait FrameSource {
    fn kind(&self) -> SourceKind;
    fn status(&self) -> SourceStatus;
    fn grab(&mut self) -> Result<DynamicImage>;
}

/// Shared pause switch for a source running on another thread.
#[derive(Debug, Clone, Default)]
pub struct SourceControl {
    paused: Arc<AtomicBool>,
}

impl SourceControl {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Primary monitor capture. Ends as soon as the monitor can no longer be captured.
pub struct ScreenSource {
    monitor: Option<xcap::Monitor>,
    control: SourceControl,
}

impl ScreenSource {
    pub fn primary(control: SourceControl) -> Result<Self> {
        let monitors = xcap::Monitor::all().map_err(|e| RelayError::Source(e.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary())
            .ok_or_else(|| RelayError::Source("no primary monitor".to_string()))?;
        debug!("Screen source: {}", monitor.name());
        Ok(Self {
            monitor: Some(monitor),
            control,
        })
    }
}

impl FrameSource for ScreenSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Screen
    }

    fn status(&self) -> SourceStatus {
        if self.monitor.is_none() {
            SourceStatus::Ended
        } else if self.control.is_paused() {
            SourceStatus::Paused
        } else {
            SourceStatus::Live
        }
    }

    fn grab(&mut self) -> Result<DynamicImage> {
        let monitor = self
            .monitor
            .as_ref()
            .ok_or_else(|| RelayError::Source("screen sharing ended".to_string()))?;
        match monitor.capture_image() {
            Ok(captured) => {
                let (width, height) = captured.dimensions();
                let rgba = image::RgbaImage::from_raw(width, height, captured.into_raw())
                    .ok_or_else(|| RelayError::Source("bad screen buffer".to_string()))?;
                Ok(DynamicImage::ImageRgba8(rgba))
            }
            Err(e) => {
                warn!("Screen capture lost: {}", e);
                self.monitor = None;
                Err(RelayError::Source(e.to_string()))
            }
        }
    }
}

/// Image files in a directory played back in name order, one per grab.
pub struct FrameSequenceSource {
    frames: Vec<PathBuf>,
    cursor: usize,
    control: SourceControl,
}

impl FrameSequenceSource {
    pub fn open(dir: &Path, control: SourceControl) -> Result<Self> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if is_image(&path) {
                frames.push(path);
            }
        }
        frames.sort();
        debug!("Frame sequence: {} frames from {}", frames.len(), dir.display());
        Ok(Self::from_paths(frames, control))
    }

    pub fn from_paths(frames: Vec<PathBuf>, control: SourceControl) -> Self {
        Self {
            frames,
            cursor: 0,
            control,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }
}

impl FrameSource for FrameSequenceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn status(&self) -> SourceStatus {
        if self.cursor >= self.frames.len() {
            SourceStatus::Ended
        } else if self.control.is_paused() {
            SourceStatus::Paused
        } else {
            SourceStatus::Live
        }
    }

    fn grab(&mut self) -> Result<DynamicImage> {
        let path = self
            .frames
            .get(self.cursor)
            .ok_or_else(|| RelayError::Source("sequence ended".to_string()))?;
        self.cursor += 1;
        Ok(image::open(path)?)
    }
}

fn is_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("jpg" | "jpeg" | "png")
    )
}
