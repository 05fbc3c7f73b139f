use std::future::Future;

use gauntlet_types::events::{MessageEvent, ReactionEvent};

/// Platform events the bot reacts to.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Message(MessageEvent),
    ReactionAdd(ReactionEvent),
    ReactionRemove(ReactionEvent),
}

/// The bot's only ways of talking back to the platform.
pub trait ChatTransport: Clone + Send + Sync + 'static {
    /// Post plain text. Resolves to the platform-assigned message ID.
    fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;

    fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::ChatTransport;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Message { channel_id: String, content: String },
        Reaction { message_id: String, emoji: String },
    }

    /// Transport that records everything and hands out sequential message IDs.
    #[derive(Clone, Default)]
    pub struct RecordingTransport {
        sent: Arc<Mutex<Vec<Sent>>>,
        offline: Arc<AtomicBool>,
    }

    impl RecordingTransport {
        /// While offline every send fails and nothing is recorded.
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub fn messages(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Message { content, .. } => Some(content),
                    Sent::Reaction { .. } => None,
                })
                .collect()
        }
    }

    impl ChatTransport for RecordingTransport {
        async fn send_message(&self, channel_id: &str, content: &str) -> anyhow::Result<String> {
            if self.offline.load(Ordering::SeqCst) {
                anyhow::bail!("bridge not connected");
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(Sent::Message {
                channel_id: channel_id.to_string(),
                content: content.to_string(),
            });
            Ok(format!("sent-{}", sent.len()))
        }

        async fn add_reaction(
            &self,
            _channel_id: &str,
            message_id: &str,
            emoji: &str,
        ) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(Sent::Reaction {
                message_id: message_id.to_string(),
                emoji: emoji.to_string(),
            });
            Ok(())
        }
    }
}
