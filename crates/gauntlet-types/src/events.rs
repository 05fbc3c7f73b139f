use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The message a command was written in reply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub author_id: String,
    pub author_name: String,
    pub content: String,
}

/// A message posted on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<ReplyRef>,
}

/// A reaction added to or removed from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub reactor_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub emoji: String,
}

/// Frames sent FROM the platform bridge TO the bot over the gateway socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BridgeFrame {
    /// Authenticate the bridge connection
    Identify { token: String },

    /// A message was posted in a channel the bot can see
    MessageCreate(MessageEvent),

    /// A user reacted to a message
    ReactionAdd(ReactionEvent),

    /// A user took a reaction back
    ReactionRemove(ReactionEvent),

    /// The platform accepted a `SendMessage` and assigned it an ID
    MessageSent { request_id: Uuid, message_id: String },

    /// The platform rejected a command
    CommandFailed { request_id: Uuid, reason: String },
}

/// Commands sent FROM the bot TO the platform bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BotCommand {
    /// Bot accepted the bridge's credentials
    Ready,

    /// Post plain text in a channel. Answered by `MessageSent` or `CommandFailed`.
    SendMessage {
        request_id: Uuid,
        channel_id: String,
        content: String,
    },

    /// Attach a reaction affordance to a message
    AddReaction {
        channel_id: String,
        message_id: String,
        emoji: String,
    },
}
