use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use gauntlet_bot::ChatTransport;
use gauntlet_types::events::BotCommand;

/// Platform answer to a `SendMessage`: the new message ID or the failure reason.
type Delivery = Result<String, String>;

/// Routes bot commands to the connected bridge and matches its
/// confirmations back to the waiting senders.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Outbound channel of the current bridge connection: (conn_id, sender)
    bridge: RwLock<Option<(Uuid, mpsc::UnboundedSender<BotCommand>)>>,

    /// SendMessage requests still waiting for MessageSent / CommandFailed
    pending: Mutex<HashMap<Uuid, oneshot::Sender<Delivery>>>,

    reply_timeout: Duration,
}

impl Dispatcher {
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                bridge: RwLock::new(None),
                pending: Mutex::new(HashMap::new()),
                reply_timeout,
            }),
        }
    }

    /// Install a bridge connection. A newer bridge replaces an older one.
    pub async fn register_bridge(&self) -> (Uuid, mpsc::UnboundedReceiver<BotCommand>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some((old, _)) = self.inner.bridge.write().await.replace((conn_id, tx)) {
            warn!("Bridge {} replaced by {}", old, conn_id);
        }
        (conn_id, rx)
    }

    /// Remove the bridge, but only if conn_id still owns it.
    pub async fn unregister_bridge(&self, conn_id: Uuid) {
        {
            let mut bridge = self.inner.bridge.write().await;
            if !bridge.as_ref().is_some_and(|(current, _)| *current == conn_id) {
                return;
            }
            *bridge = None;
        }

        // Dropping the senders wakes every waiter with a disconnect error.
        let dropped = {
            let mut pending = self.inner.pending.lock().await;
            let n = pending.len();
            pending.clear();
            n
        };
        if dropped > 0 {
            warn!("Bridge {} left with {} unconfirmed messages", conn_id, dropped);
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.bridge.read().await.is_some()
    }

    /// Complete a pending `SendMessage`. Unknown or late request IDs are ignored.
    pub async fn resolve(&self, request_id: Uuid, delivery: Delivery) {
        match self.inner.pending.lock().await.remove(&request_id) {
            Some(tx) => {
                let _ = tx.send(delivery);
            }
            None => debug!("No pending request {}, dropping confirmation", request_id),
        }
    }

    async fn send(&self, command: BotCommand) -> anyhow::Result<()> {
        let bridge = self.inner.bridge.read().await;
        let (_, tx) = bridge.as_ref().context("no bridge connected")?;
        tx.send(command).ok().context("bridge connection closed")
    }
}

impl ChatTransport for Dispatcher {
    async fn send_message(&self, channel_id: &str, content: &str) -> anyhow::Result<String> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(request_id, tx);

        let command = BotCommand::SendMessage {
            request_id,
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        };
        if let Err(e) = self.send(command).await {
            self.inner.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.inner.reply_timeout, rx).await {
            Ok(Ok(Ok(message_id))) => Ok(message_id),
            Ok(Ok(Err(reason))) => bail!("platform refused message: {}", reason),
            Ok(Err(_)) => bail!("bridge disconnected before confirming message"),
            Err(_) => {
                self.inner.pending.lock().await.remove(&request_id);
                bail!("no confirmation within {:?}", self.inner.reply_timeout)
            }
        }
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> anyhow::Result<()> {
        self.send(BotCommand::AddReaction {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_id(cmd: &BotCommand) -> Uuid {
        match cmd {
            BotCommand::SendMessage { request_id, .. } => *request_id,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_message_waits_for_confirmation() {
        let dispatcher = Dispatcher::new(Duration::from_secs(1));
        let (_, mut rx) = dispatcher.register_bridge().await;

        let bridge = dispatcher.clone();
        let confirm = tokio::spawn(async move {
            let cmd = rx.recv().await.unwrap();
            bridge.resolve(request_id(&cmd), Ok("m42".into())).await;
        });

        let id = dispatcher.send_message("c1", "hello").await.unwrap();
        assert_eq!(id, "m42");
        confirm.await.unwrap();
    }

    #[tokio::test]
    async fn refused_message_is_an_error() {
        let dispatcher = Dispatcher::new(Duration::from_secs(1));
        let (_, mut rx) = dispatcher.register_bridge().await;

        let bridge = dispatcher.clone();
        tokio::spawn(async move {
            let cmd = rx.recv().await.unwrap();
            bridge.resolve(request_id(&cmd), Err("missing permissions".into())).await;
        });

        let err = dispatcher.send_message("c1", "hello").await.unwrap_err();
        assert!(err.to_string().contains("missing permissions"));
    }

    #[tokio::test]
    async fn unconfirmed_message_times_out() {
        let dispatcher = Dispatcher::new(Duration::from_millis(20));
        let (_, _rx) = dispatcher.register_bridge().await;
        assert!(dispatcher.send_message("c1", "hello").await.is_err());
        assert!(dispatcher.inner.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn sending_without_bridge_fails_fast() {
        let dispatcher = Dispatcher::new(Duration::from_secs(5));
        assert!(dispatcher.send_message("c1", "hello").await.is_err());
        assert!(dispatcher.add_reaction("c1", "m1", "🟦").await.is_err());
    }

    #[tokio::test]
    async fn stale_connection_cannot_unregister_newer_bridge() {
        let dispatcher = Dispatcher::new(Duration::from_secs(1));
        let (old, _old_rx) = dispatcher.register_bridge().await;
        let (_new, mut new_rx) = dispatcher.register_bridge().await;

        dispatcher.unregister_bridge(old).await;
        assert!(dispatcher.is_connected().await);

        dispatcher.add_reaction("c1", "m1", "✋").await.unwrap();
        assert!(matches!(new_rx.recv().await, Some(BotCommand::AddReaction { .. })));
    }

    #[tokio::test]
    async fn disconnect_wakes_waiters() {
        let dispatcher = Dispatcher::new(Duration::from_secs(5));
        let (conn_id, mut rx) = dispatcher.register_bridge().await;

        let bridge = dispatcher.clone();
        tokio::spawn(async move {
            rx.recv().await.unwrap();
            bridge.unregister_bridge(conn_id).await;
        });

        let err = dispatcher.send_message("c1", "hello").await.unwrap_err();
        assert!(err.to_string().contains("disconnected"));
        assert!(!dispatcher.is_connected().await);
    }
}
