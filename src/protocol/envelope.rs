//! JSON envelopes exchanged over the live channel.
//!
//! Outbound:
//! - `{"clientContent": {"turnComplete": true, "turns": [{"parts": [{"text": ..}]}]}}`
//! - `{"media": {"data": <base64>, "mimeType": "audio/pcm" | "image/jpeg"}}`
//! - `{"setup": {"model": ..}}`, only when a model is configured
//!
//! Inbound:
//! - `{"serverContent": {"turnComplete": true}}`
//! - `{"serverContent": {"modelTurn": {"parts": [{"inlineData": {..}}]}}}`
//!
//! There are no sequence numbers; order is delivery order.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::content::{Blob, Content};
use crate::audio::pcm::{self, PCM_MIME_TYPE};

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientEnvelope {
    Setup(Setup),
    ClientContent(ClientContent),
    Media(Blob),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turn_complete: bool,
    pub turns: Vec<Content>,
}

impl ClientEnvelope {
    /// A complete user text turn.
    pub fn text(text: impl Into<String>) -> Self {
        Self::ClientContent(ClientContent {
            turn_complete: true,
            turns: vec![Content::text(text)],
        })
    }

    pub fn media(mime_type: &str, payload: &[u8]) -> Self {
        Self::Media(Blob {
            mime_type: mime_type.to_string(),
            data: BASE64_STANDARD.encode(payload),
        })
    }

    pub fn audio(pcm_bytes: &[u8]) -> Self {
        Self::media(PCM_MIME_TYPE, pcm_bytes)
    }

    pub fn jpeg(jpeg: &[u8]) -> Self {
        Self::media(JPEG_MIME_TYPE, jpeg)
    }

    pub fn setup(model: impl Into<String>) -> Self {
        Self::Setup(Setup { model: model.into() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub turn_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<Content>,
}

impl ServerEnvelope {
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                debug!("Ignoring malformed envelope: {}", e);
                None
            }
        }
    }

    pub fn turn_complete() -> Self {
        Self {
            server_content: Some(ServerContent {
                turn_complete: true,
                model_turn: None,
            }),
            setup_complete: None,
        }
    }

    pub fn model_turn(content: Content) -> Self {
        Self {
            server_content: Some(ServerContent {
                turn_complete: false,
                model_turn: Some(content),
            }),
            setup_complete: None,
        }
    }
}

impl ServerContent {
    /// Decoded PCM samples of every audio part. Parts that fail to decode are skipped.
    pub fn audio_frames(&self) -> Vec<Vec<i16>> {
        let Some(turn) = &self.model_turn else {
            return Vec::new();
        };
        turn.parts
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|blob| pcm::is_pcm_mime(&blob.mime_type))
            .filter_map(|blob| match BASE64_STANDARD.decode(blob.data.as_bytes()) {
                Ok(bytes) => Some(pcm::from_le_bytes(&bytes)),
                Err(e) => {
                    debug!("Ignoring undecodable audio part: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        let Some(turn) = &self.model_turn else {
            return Vec::new();
        };
        turn.parts.iter().filter_map(|p| p.text.clone()).collect()
    }
}
