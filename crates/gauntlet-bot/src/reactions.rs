use anyhow::Context;
use tracing::{error, info, trace};

use gauntlet_core::BallotAction;
use gauntlet_types::events::ReactionEvent;

use crate::announce;
use crate::{Bot, ChatTransport};

impl<T: ChatTransport> Bot<T> {
    pub(crate) async fn on_reaction(
        &self,
        reaction: ReactionEvent,
        action: BallotAction,
    ) -> anyhow::Result<()> {
        if self.is_self(&reaction.reactor_id) {
            return Ok(());
        }

        let Some(ballot) = self.inner.emoji.ballot_for(&reaction.emoji) else {
            trace!("Ignoring unmapped reaction {} on {}", reaction.emoji, reaction.message_id);
            return Ok(());
        };

        let settlement = match self
            .inner
            .arbiter
            .handle_ballot(&reaction.reactor_id, &reaction.message_id, ballot, action)
            .await
        {
            Ok(settlement) => settlement,
            Err(e) if e.is_not_found() => {
                trace!("{} is not a challenge announcement", reaction.message_id);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if settlement.closed_now {
            let challenge = &settlement.challenge;
            info!(
                "Announcing result of {}: {:?}, winner {}",
                challenge.message_id,
                challenge.outcome,
                challenge.winner_id().unwrap_or("none")
            );
            let text = announce::result_announcement(challenge);
            if let Err(e) = self.inner.transport.send_message(&challenge.channel_id, &text).await {
                // The close already committed, so no later reaction will retry this post.
                error!(
                    "Result of {} ({:?}, winner {}) was not announced: {:#}",
                    challenge.message_id,
                    challenge.outcome,
                    challenge.winner_id().unwrap_or("none"),
                    e
                );
                return Err(e).with_context(|| {
                    format!("posting result of challenge {}", challenge.message_id)
                });
            }
        }

        Ok(())
    }
}
