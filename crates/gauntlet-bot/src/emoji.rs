use gauntlet_types::models::{Ballot, VoteCategory};

const VARIATION_SELECTOR: char = '\u{FE0F}';

/// Maps the four reaction emoji onto ballots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiTable {
    pub challenger: String,
    pub defender: String,
    pub abstain: String,
    pub stop: String,
}

impl Default for EmojiTable {
    fn default() -> Self {
        Self {
            challenger: "🟦".into(),
            defender: "🟨".into(),
            abstain: "🟥".into(),
            stop: "✋".into(),
        }
    }
}

impl EmojiTable {
    /// The ballot a reaction stands for, if any. Emoji-presentation
    /// selectors are ignored so `✋` and `✋️` match alike.
    pub fn ballot_for(&self, emoji: &str) -> Option<Ballot> {
        let emoji = normalize(emoji);
        if emoji == normalize(&self.challenger) {
            Some(Ballot::Vote(VoteCategory::Challenger))
        } else if emoji == normalize(&self.defender) {
            Some(Ballot::Vote(VoteCategory::Defender))
        } else if emoji == normalize(&self.abstain) {
            Some(Ballot::Vote(VoteCategory::Abstain))
        } else if emoji == normalize(&self.stop) {
            Some(Ballot::Stop)
        } else {
            None
        }
    }

    /// Reactions the bot attaches to every announcement, in legend order.
    pub fn affordances(&self) -> [&str; 4] {
        [&self.challenger, &self.defender, &self.abstain, &self.stop]
    }
}

fn normalize(emoji: &str) -> &str {
    emoji.trim_end_matches(VARIATION_SELECTOR)
}
