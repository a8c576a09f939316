//! Timeline message, response candidate, and mailbox entry types for Conclave.
//!
//! `Message` is the unit of the shared, append-only round-table timeline.
//! Each message can carry several `Response` candidates of which at most one
//! is selected. `MailboxEntry` is an inbound turn queued for one agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Who authored a timeline message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    User,
    Agent,
    System,
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderKind::User => write!(f, "user"),
            SenderKind::Agent => write!(f, "agent"),
            SenderKind::System => write!(f, "system"),
        }
    }
}

impl FromStr for SenderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(SenderKind::User),
            "agent" => Ok(SenderKind::Agent),
            "system" => Ok(SenderKind::System),
            other => Err(format!("invalid sender kind: '{other}'")),
        }
    }
}

/// Per-conversation turn mode controlling the reply budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    /// Ordinary conversation; small per-agent reply budget.
    Broadcast,
    /// Goal-directed collaboration; larger per-agent reply budget.
    Goal,
}

impl Default for TurnMode {
    fn default() -> Self {
        TurnMode::Broadcast
    }
}

impl fmt::Display for TurnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnMode::Broadcast => write!(f, "broadcast"),
            TurnMode::Goal => write!(f, "goal"),
        }
    }
}

impl FromStr for TurnMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "broadcast" => Ok(TurnMode::Broadcast),
            "goal" | "target" => Ok(TurnMode::Goal),
            other => Err(format!("invalid turn mode: '{other}'")),
        }
    }
}

/// Kind of a media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    File,
}

/// Media attached to a message or produced by a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl MediaAttachment {
    pub fn new(kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            mime_type: None,
        }
    }
}

/// A candidate response attached to a timeline message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub message_id: Uuid,
    pub author_agent_id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub selected: bool,
    pub created_at: DateTime<Utc>,
}

impl Response {
    /// Create an unselected response candidate for `message_id`.
    pub fn new(message_id: Uuid, author_agent_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            message_id,
            author_agent_id,
            text: text.into(),
            reasoning: None,
            selected: false,
            created_at: Utc::now(),
        }
    }
}

/// A single entry of the round-table timeline.
///
/// `sequence` is assigned by the timeline on append (0 until appended).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub round_table_id: Uuid,
    #[serde(default)]
    pub sequence: u64,
    pub sender_kind: SenderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_agent_id: Option<Uuid>,
    /// Display name of the sender (denormalized).
    pub sender_name: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaAttachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<Response>,
    /// Set when the agent contributed proactively (raise-hand marker).
    #[serde(default)]
    pub raised_hand: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn base(
        round_table_id: Uuid,
        sender_kind: SenderKind,
        sender_agent_id: Option<Uuid>,
        sender_name: String,
        text: String,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            round_table_id,
            sequence: 0,
            sender_kind,
            sender_agent_id,
            sender_name,
            text,
            mentions: Vec::new(),
            reply_to: None,
            media: Vec::new(),
            responses: Vec::new(),
            raised_hand: false,
            created_at: Utc::now(),
        }
    }

    /// A user-originated message. Appending one starts a new turn.
    pub fn user(
        round_table_id: Uuid,
        sender_name: impl Into<String>,
        text: impl Into<String>,
        mentions: Vec<Uuid>,
    ) -> Self {
        let mut msg = Self::base(
            round_table_id,
            SenderKind::User,
            None,
            sender_name.into(),
            text.into(),
        );
        msg.mentions = dedup(mentions);
        msg
    }

    /// An agent-authored message. The author's own id is removed from
    /// `mentions`, so a reply can never route back to its author.
    pub fn agent(
        round_table_id: Uuid,
        author_agent_id: Uuid,
        sender_name: impl Into<String>,
        text: impl Into<String>,
        mentions: Vec<Uuid>,
    ) -> Self {
        let mut msg = Self::base(
            round_table_id,
            SenderKind::Agent,
            Some(author_agent_id),
            sender_name.into(),
            text.into(),
        );
        msg.mentions = dedup(mentions)
            .into_iter()
            .filter(|id| *id != author_agent_id)
            .collect();
        msg
    }

    /// A system notice on the timeline.
    pub fn system(round_table_id: Uuid, text: impl Into<String>) -> Self {
        Self::base(
            round_table_id,
            SenderKind::System,
            None,
            "system".to_string(),
            text.into(),
        )
    }

    pub fn with_reply_to(mut self, message_id: Uuid) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_media(mut self, media: Vec<MediaAttachment>) -> Self {
        self.media = media;
        self
    }

    pub fn with_raised_hand(mut self, raised: bool) -> Self {
        self.raised_hand = raised;
        self
    }

    pub fn is_user(&self) -> bool {
        self.sender_kind == SenderKind::User
    }

    /// Whether this message was authored by `agent_id`.
    pub fn is_authored_by(&self, agent_id: &Uuid) -> bool {
        self.sender_agent_id.as_ref() == Some(agent_id)
    }

    /// The selected response candidate, if any.
    pub fn selected_response(&self) -> Option<&Response> {
        self.responses.iter().find(|r| r.selected)
    }
}

/// Deduplicate ids while keeping first-seen order.
fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// An inbound turn waiting in one agent's mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub target_agent_id: Uuid,
    /// The timeline message this entry asks the agent to respond to.
    pub message_id: Uuid,
    pub text: String,
    pub sender_kind: SenderKind,
    pub sender_name: String,
    pub turn_mode: TurnMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaAttachment>,
    pub enqueued_at: DateTime<Utc>,
}

impl MailboxEntry {
    /// Build an entry asking `target_agent_id` to respond to `message`.
    pub fn for_message(target_agent_id: Uuid, message: &Message, turn_mode: TurnMode) -> Self {
        Self {
            target_agent_id,
            message_id: message.id,
            text: message.text.clone(),
            sender_kind: message.sender_kind,
            sender_name: message.sender_name.clone(),
            turn_mode,
            media: message.media.clone(),
            enqueued_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
