use anyhow::Context;
use tracing::{debug, info, warn};

use gauntlet_core::NewChallenge;
use gauntlet_types::events::MessageEvent;

use crate::announce;
use crate::commands::{self, Command};
use crate::{Bot, ChatTransport};

impl<T: ChatTransport> Bot<T> {
    pub(crate) async fn on_message(&self, msg: MessageEvent) -> anyhow::Result<()> {
        if self.is_self(&msg.author_id) {
            return Ok(());
        }

        match commands::parse(&msg.content) {
            Some(Command::Challenge) => self.open_challenge(msg).await,
            Some(Command::CheckScore(target)) => self.check_score(&msg.channel_id, target).await,
            None => Ok(()),
        }
    }

    async fn open_challenge(&self, msg: MessageEvent) -> anyhow::Result<()> {
        let Some(reply) = msg.reply_to else {
            debug!("{} sent !challenge outside a reply, ignoring", msg.author_name);
            return Ok(());
        };
        if reply.author_id == msg.author_id {
            debug!("{} tried to challenge themselves, ignoring", msg.author_name);
            return Ok(());
        }
        if self.is_self(&reply.author_id) {
            debug!("{} tried to challenge the bot, ignoring", msg.author_name);
            return Ok(());
        }

        let inner = &self.inner;
        let text = announce::challenge_announcement(
            &msg.author_id,
            &reply.author_id,
            &reply.content,
            &inner.emoji,
        );
        let announcement_id = inner
            .transport
            .send_message(&msg.channel_id, &text)
            .await
            .context("posting challenge announcement")?;

        // Seed before the affordances go up so early reactions find the challenge.
        inner
            .arbiter
            .on_challenge_created(NewChallenge {
                announcement_id: announcement_id.clone(),
                channel_id: msg.channel_id.clone(),
                challenger_id: msg.author_id,
                challenger_name: msg.author_name,
                defender_id: reply.author_id,
                defender_name: reply.author_name,
            })
            .await?;

        for emoji in inner.emoji.affordances() {
            if let Err(e) = inner
                .transport
                .add_reaction(&msg.channel_id, &announcement_id, emoji)
                .await
            {
                warn!("Failed to add {} to {}: {:#}", emoji, announcement_id, e);
            }
        }

        info!("Challenge {} announced in {}", announcement_id, msg.channel_id);
        Ok(())
    }

    async fn check_score(&self, channel_id: &str, target: Option<String>) -> anyhow::Result<()> {
        let text = match target {
            Some(user_id) => match self.inner.arbiter.scoreboard_entry(&user_id).await? {
                Some(entry) => announce::score_card(&entry),
                None => announce::no_record(&user_id),
            },
            None => announce::CHECKSCORE_USAGE.to_string(),
        };

        self.inner
            .transport
            .send_message(channel_id, &text)
            .await
            .context("posting score card")?;
        Ok(())
    }
}
