//! Chat-facing half of the challenge bot: turns platform messages and
//! reactions into [`Arbiter`] calls and posts the replies.

pub mod announce;
pub mod commands;
pub mod emoji;
pub mod messages;
pub mod reactions;
pub mod transport;

use std::sync::Arc;

use tracing::warn;

use gauntlet_core::{Arbiter, BallotAction};

use crate::emoji::EmojiTable;
pub use crate::transport::{ChatEvent, ChatTransport};

pub struct Bot<T> {
    inner: Arc<BotInner<T>>,
}

struct BotInner<T> {
    arbiter: Arbiter,
    transport: T,
    emoji: EmojiTable,
    /// The bot's own platform user ID. Its messages and reactions are ignored.
    user_id: String,
}

impl<T> Clone for Bot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ChatTransport> Bot<T> {
    pub fn new(
        arbiter: Arbiter,
        transport: T,
        emoji: EmojiTable,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(BotInner {
                arbiter,
                transport,
                emoji,
                user_id: user_id.into(),
            }),
        }
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.inner.arbiter
    }

    /// Handle one platform event. Failures are logged and dropped so one bad
    /// event never takes the bot down.
    pub async fn handle_event(&self, event: ChatEvent) {
        let result = match event {
            ChatEvent::Message(msg) => self.on_message(msg).await,
            ChatEvent::ReactionAdd(reaction) => {
                self.on_reaction(reaction, BallotAction::Cast).await
            }
            ChatEvent::ReactionRemove(reaction) => {
                self.on_reaction(reaction, BallotAction::Retract).await
            }
        };

        if let Err(e) = result {
            warn!("Event handling failed: {:#}", e);
        }
    }

    fn is_self(&self, user_id: &str) -> bool {
        self.inner.user_id == user_id
    }
}
