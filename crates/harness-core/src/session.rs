//! Per-browser-session state bag: ordered transcript plus the citations and
//! trace of the most recent exchange.

use crate::event::{Citation, Trace};
use crate::normalize::NormalizedResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTurn {
    pub role: Role,
    pub content: String,
}

/// State bag for one browser session. Held only in gateway memory; a reset
/// discards the whole value and starts over with a fresh identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub messages: Vec<MessageTurn>,
    pub citations: Vec<Citation>,
    pub trace: Trace,
}

impl SessionState {
    /// Fresh session: new identifier, empty transcript, empty side panels.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            citations: Vec::new(),
            trace: Trace::new(),
        }
    }

    /// Appends the user's message to the transcript.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(MessageTurn {
            role: Role::User,
            content: content.into(),
        });
    }

    /// Appends the assistant reply and replaces the side-panel data.
    /// Citations and trace always reflect the most recent exchange only.
    pub fn record_reply(&mut self, response: NormalizedResponse) {
        self.messages.push(MessageTurn {
            role: Role::Assistant,
            content: response.output_text,
        });
        self.citations = response.citations;
        self.trace = response.trace;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
