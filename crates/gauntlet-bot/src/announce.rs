use gauntlet_types::models::{Challenge, Outcome, ScoreboardEntry};

use crate::emoji::EmojiTable;

pub const CHECKSCORE_USAGE: &str = "Usage: `!checkscore @user`";

fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

/// Posted in reply to `!challenge`. Reactions on this message are the ballots.
pub fn challenge_announcement(
    challenger_id: &str,
    defender_id: &str,
    statement: &str,
    emoji: &EmojiTable,
) -> String {
    let challenger = mention(challenger_id);
    let defender = mention(defender_id);
    format!(
        "{challenger} has challenged {defender}!\n\n\
         {defender} says: `{statement}`\n\n\
         {challenger} disagrees!\n\n\
         Vote below to decide who's right!\n\n\
         {} = {challenger}\n\
         {} = {defender}\n\
         {} = Abstain\n\
         {} = Close Voting",
        emoji.challenger, emoji.defender, emoji.abstain, emoji.stop,
    )
}

/// Posted once, when a challenge closes.
pub fn result_announcement(challenge: &Challenge) -> String {
    match challenge.outcome {
        Outcome::ChallengerWin => format!(
            "{} has won the challenge!\n\nThe score was: {} to {}",
            mention(&challenge.challenger_id),
            challenge.challenger_votes,
            challenge.defender_votes
        ),
        Outcome::DefenderWin => format!(
            "{} has won the challenge!\n\nThe score was: {} to {}",
            mention(&challenge.defender_id),
            challenge.defender_votes,
            challenge.challenger_votes
        ),
        Outcome::Tie => format!(
            "The challenge between {} and {} was a tie!",
            mention(&challenge.challenger_id),
            mention(&challenge.defender_id)
        ),
    }
}

pub fn score_card(entry: &ScoreboardEntry) -> String {
    format!(
        "{} has the following challenge record:\n`{}\n\
         Total challenge wins: {}\n\
         Total challenge losses: {}\n\
         Total challenge ties: {}\n\
         Total challenges: {}\n\
         Wins as challenger: {}\n\
         Losses as challenger: {}\n\
         Wins as defender: {}\n\
         Losses as defender: {}`",
        mention(&entry.user_id),
        entry.username,
        entry.total_challenge_wins,
        entry.total_challenge_losses,
        entry.total_challenge_ties,
        entry.total_challenges,
        entry.successful_challenges,
        entry.failed_challenges,
        entry.successful_defenses,
        entry.failed_defenses,
    )
}

pub fn no_record(user_id: &str) -> String {
    format!("{} has not taken part in any challenges yet.", mention(user_id))
}
