use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A voter's stance on a challenge. A voter holds at most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteCategory {
    Challenger,
    Defender,
    Abstain,
}

impl VoteCategory {
    /// Whether a change in this category's tally can move the outcome.
    pub fn affects_outcome(self) -> bool {
        !matches!(self, Self::Abstain)
    }
}

impl fmt::Display for VoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Challenger => f.write_str("challenger"),
            Self::Defender => f.write_str("defender"),
            Self::Abstain => f.write_str("abstain"),
        }
    }
}

/// What a recognized reaction means to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ballot {
    Vote(VoteCategory),
    Stop,
}

/// Derived result of a challenge. Always a function of the
/// challenger and defender tallies, abstentions are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Tie,
    ChallengerWin,
    DefenderWin,
}

impl Outcome {
    pub fn from_tally(challenger_votes: u32, defender_votes: u32) -> Self {
        match challenger_votes.cmp(&defender_votes) {
            Ordering::Greater => Self::ChallengerWin,
            Ordering::Less => Self::DefenderWin,
            Ordering::Equal => Self::Tie,
        }
    }

    /// Storage code: 0 = tie, 1 = challenger wins, 2 = defender wins.
    pub fn code(self) -> i64 {
        match self {
            Self::Tie => 0,
            Self::ChallengerWin => 1,
            Self::DefenderWin => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Tie),
            1 => Some(Self::ChallengerWin),
            2 => Some(Self::DefenderWin),
            _ => None,
        }
    }
}

/// A debate announced on the platform, keyed by the announcement's message ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub message_id: String,
    pub channel_id: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub defender_id: String,
    pub defender_name: String,
    pub challenger_votes: u32,
    pub defender_votes: u32,
    pub abstain_votes: u32,
    pub stop_votes: u32,
    pub outcome: Outcome,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    pub fn tally(&self, category: VoteCategory) -> u32 {
        match category {
            VoteCategory::Challenger => self.challenger_votes,
            VoteCategory::Defender => self.defender_votes,
            VoteCategory::Abstain => self.abstain_votes,
        }
    }

    /// User ID of the winner, `None` on a tie.
    pub fn winner_id(&self) -> Option<&str> {
        match self.outcome {
            Outcome::ChallengerWin => Some(&self.challenger_id),
            Outcome::DefenderWin => Some(&self.defender_id),
            Outcome::Tie => None,
        }
    }
}

/// Cumulative challenge record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreboardEntry {
    pub user_id: String,
    pub username: String,
    pub total_challenge_wins: u32,
    pub total_challenge_losses: u32,
    pub total_challenge_ties: u32,
    pub total_challenges: u32,
    /// Wins while acting as challenger.
    pub successful_challenges: u32,
    pub failed_challenges: u32,
    /// Wins while acting as defender.
    pub successful_defenses: u32,
    pub failed_defenses: u32,
}

impl ScoreboardEntry {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Checks the totals against the per-role counters.
    pub fn is_consistent(&self) -> bool {
        self.total_challenge_wins == self.successful_challenges + self.successful_defenses
            && self.total_challenge_losses == self.failed_challenges + self.failed_defenses
            && self.total_challenges
                == self.total_challenge_wins
                    + self.total_challenge_losses
                    + self.total_challenge_ties
    }
}

/// Additive change to one scoreboard entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreDelta {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub successful_challenges: u32,
    pub failed_challenges: u32,
    pub successful_defenses: u32,
    pub failed_defenses: u32,
}

impl ScoreDelta {
    /// Every delta counts as one more challenge for the user.
    pub fn total(&self) -> u32 {
        self.wins + self.losses + self.ties
    }
}

/// One voter's ballot state on one challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter_id: String,
    pub challenge_id: String,
    pub category: Option<VoteCategory>,
    pub stopped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_follows_total_order() {
        for challenger in 0..6 {
            for defender in 0..6 {
                let expected = if challenger > defender {
                    Outcome::ChallengerWin
                } else if challenger < defender {
                    Outcome::DefenderWin
                } else {
                    Outcome::Tie
                };
                assert_eq!(Outcome::from_tally(challenger, defender), expected);
            }
        }
    }

    #[test]
    fn outcome_codes_match_storage() {
        assert_eq!(Outcome::Tie.code(), 0);
        assert_eq!(Outcome::ChallengerWin.code(), 1);
        assert_eq!(Outcome::DefenderWin.code(), 2);
        assert_eq!(Outcome::from_code(2), Some(Outcome::DefenderWin));
        assert_eq!(Outcome::from_code(7), None);
    }

    #[test]
    fn fresh_entry_is_consistent() {
        let entry = ScoreboardEntry::new("1", "gabe");
        assert_eq!(entry.username, "gabe");
        assert_eq!(entry.total_challenges, 0);
        assert!(entry.is_consistent());
    }
}
