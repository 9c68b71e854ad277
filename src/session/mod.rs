pub mod log;

pub use log::{ClipRecorder, EntryContent, Participant, SessionEntry, SessionLog};
