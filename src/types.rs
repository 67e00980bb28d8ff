//! Wire and conversation types.

use serde::{Deserialize, Serialize};

/// Event type tag for follow-up suggestions.
pub const FOLLOW_UP_TYPE: &str = "follow_up";

/// Event type tag for the end-of-reply marker.
pub const DONE_TYPE: &str = "done";

///////////////////////////////////////// StreamEvent /////////////////////////////////////////

/// One decoded event from a chat reply stream.
///
/// The wire object carries a `type` tag and, except for `done`, a `content` string. Only
/// `follow_up` and `done` are recognized tags: any other tag (the server sends `message`) and a
/// missing tag both decode as a text fragment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireEvent")]
pub enum StreamEvent {
    /// A suggested next user message.
    FollowUp(String),
    /// The current assistant message is complete.
    Done,
    /// An incremental fragment of assistant text.
    Text(String),
}

/// The discriminant of a [`StreamEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// See [`StreamEvent::FollowUp`].
    FollowUp,
    /// See [`StreamEvent::Done`].
    Done,
    /// See [`StreamEvent::Text`].
    Text,
}

impl StreamEvent {
    /// Creates a text fragment event.
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::Text(content.into())
    }

    /// Creates a follow-up event.
    pub fn follow_up(content: impl Into<String>) -> Self {
        StreamEvent::FollowUp(content.into())
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::FollowUp(_) => EventKind::FollowUp,
            StreamEvent::Done => EventKind::Done,
            StreamEvent::Text(_) => EventKind::Text,
        }
    }

    /// Returns true for follow-up events.
    pub fn is_follow_up(&self) -> bool {
        matches!(self, StreamEvent::FollowUp(_))
    }
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl TryFrom<WireEvent> for StreamEvent {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        match (wire.kind.as_deref(), wire.content) {
            (Some(DONE_TYPE), _) => Ok(StreamEvent::Done),
            (Some(FOLLOW_UP_TYPE), Some(content)) => Ok(StreamEvent::FollowUp(content)),
            (Some(FOLLOW_UP_TYPE), None) => Err("follow_up event without content".to_string()),
            (_, Some(content)) => Ok(StreamEvent::Text(content)),
            (kind, None) => Err(format!(
                "{} event without content",
                kind.unwrap_or("untyped")
            )),
        }
    }
}

///////////////////////////////////////// Endpoints ///////////////////////////////////////////

/// Body of the welcome endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeResponse {
    /// Welcome text rendered as the first assistant turn.
    pub content: String,
    /// Session identifier issued by the server, if it issues one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Body of a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

impl ChatRequest {
    /// Creates a new chat request.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/////////////////////////////////////// Conversation //////////////////////////////////////////

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    /// The person typing.
    User,
    /// The server's reply.
    Assistant,
}

/// What a turn renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// A chat bubble.
    Message,
    /// A clickable follow-up suggestion.
    FollowUp,
}

/// A rendered unit of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who authored the turn.
    pub author: Author,
    /// The turn's text.
    pub text: String,
    /// What the turn renders as.
    pub kind: TurnKind,
}

impl ConversationTurn {
    /// Creates a user message turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            text: text.into(),
            kind: TurnKind::Message,
        }
    }

    /// Creates an assistant message turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            author: Author::Assistant,
            text: text.into(),
            kind: TurnKind::Message,
        }
    }

    /// Creates a follow-up turn.
    pub fn follow_up(text: impl Into<String>) -> Self {
        Self {
            author: Author::Assistant,
            text: text.into(),
            kind: TurnKind::FollowUp,
        }
    }
}
