use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::audio::clip::Clip;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Local,
    Remote,
}

impl Participant {
    pub fn label(&self) -> &'static str {
        match self {
            Participant::Local => "local",
            Participant::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    Audio(Clip),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub id: Uuid,
    pub participant: Participant,
    pub content: EntryContent,
}

/// Append-only record of the conversation.
#[derive(Debug, Default)]
pub struct SessionLog {
    entries: Vec<SessionEntry>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, participant: Participant, content: EntryContent) -> &SessionEntry {
        let index = self.entries.len();
        self.entries.push(SessionEntry {
            id: Uuid::new_v4(),
            participant,
            content,
        });
        &self.entries[index]
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clips(&self, participant: Participant) -> impl Iterator<Item = &Clip> {
        self.entries.iter().filter_map(move |e| match &e.content {
            EntryContent::Audio(clip) if e.participant == participant => Some(clip),
            _ => None,
        })
    }
}

/// Writes audio entries out as WAV files, numbered in log order.
pub struct ClipRecorder {
    dir: PathBuf,
    written: usize,
}

impl ClipRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file written, or `None` for text entries.
    pub fn record(&mut self, entry: &SessionEntry) -> Result<Option<PathBuf>> {
        let EntryContent::Audio(clip) = &entry.content else {
            return Ok(None);
        };
        self.written += 1;
        let path = self
            .dir
            .join(format!("{:04}-{}-{}.wav", self.written, entry.participant.label(), entry.id));
        std::fs::write(&path, clip.to_wav()?)?;
        info!("Recorded {} clip ({}ms) to {}", entry.participant.label(), clip.duration_ms(), path.display());
        Ok(Some(path))
    }
}
