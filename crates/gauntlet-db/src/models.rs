//! Database row types — these map directly to SQLite rows.
//! Converted into gauntlet-types models before leaving the crate.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use gauntlet_types::models::{Challenge, Outcome, ScoreboardEntry, VoteCategory, VoteRecord};

pub struct ChallengeRow {
    pub message_id: String,
    pub channel_id: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub defender_id: String,
    pub defender_name: String,
    pub challenger_votes: i64,
    pub defender_votes: i64,
    pub abstain_votes: i64,
    pub stop_votes: i64,
    pub outcome: i64,
    pub closed: bool,
    pub created_at: String,
    pub closed_at: Option<String>,
}

pub struct ScoreboardRow {
    pub user_id: String,
    pub username: String,
    pub total_challenge_wins: i64,
    pub total_challenge_losses: i64,
    pub total_challenge_ties: i64,
    pub total_challenges: i64,
    pub successful_challenges: i64,
    pub failed_challenges: i64,
    pub successful_defenses: i64,
    pub failed_defenses: i64,
}

pub struct VoteRecordRow {
    pub voter_id: String,
    pub challenge_id: String,
    pub category: Option<String>,
    pub stopped: bool,
}

/// Per-challenge ballot counts taken straight from `vote_records`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BallotCounts {
    pub challenger: u32,
    pub defender: u32,
    pub abstain: u32,
    pub stop: u32,
}

impl ChallengeRow {
    pub fn into_model(self) -> Result<Challenge> {
        let outcome = Outcome::from_code(self.outcome).ok_or_else(|| {
            anyhow!("Corrupt outcome {} on challenge {}", self.outcome, self.message_id)
        })?;

        Ok(Challenge {
            challenger_votes: count(self.challenger_votes, "challenger_votes")?,
            defender_votes: count(self.defender_votes, "defender_votes")?,
            abstain_votes: count(self.abstain_votes, "abstain_votes")?,
            stop_votes: count(self.stop_votes, "stop_votes")?,
            outcome,
            closed: self.closed,
            created_at: parse_timestamp(&self.created_at)?,
            closed_at: self.closed_at.as_deref().map(parse_timestamp).transpose()?,
            message_id: self.message_id,
            channel_id: self.channel_id,
            challenger_id: self.challenger_id,
            challenger_name: self.challenger_name,
            defender_id: self.defender_id,
            defender_name: self.defender_name,
        })
    }
}

impl ScoreboardRow {
    pub fn into_model(self) -> Result<ScoreboardEntry> {
        Ok(ScoreboardEntry {
            total_challenge_wins: count(self.total_challenge_wins, "total_challenge_wins")?,
            total_challenge_losses: count(self.total_challenge_losses, "total_challenge_losses")?,
            total_challenge_ties: count(self.total_challenge_ties, "total_challenge_ties")?,
            total_challenges: count(self.total_challenges, "total_challenges")?,
            successful_challenges: count(self.successful_challenges, "successful_challenges")?,
            failed_challenges: count(self.failed_challenges, "failed_challenges")?,
            successful_defenses: count(self.successful_defenses, "successful_defenses")?,
            failed_defenses: count(self.failed_defenses, "failed_defenses")?,
            user_id: self.user_id,
            username: self.username,
        })
    }
}

impl VoteRecordRow {
    pub fn into_model(self) -> Result<VoteRecord> {
        let category = self.category.as_deref().map(category_from_str).transpose()?;
        Ok(VoteRecord {
            voter_id: self.voter_id,
            challenge_id: self.challenge_id,
            category,
            stopped: self.stopped,
        })
    }
}

pub(crate) fn category_str(category: VoteCategory) -> &'static str {
    match category {
        VoteCategory::Challenger => "challenger",
        VoteCategory::Defender => "defender",
        VoteCategory::Abstain => "abstain",
    }
}

fn category_from_str(raw: &str) -> Result<VoteCategory> {
    match raw {
        "challenger" => Ok(VoteCategory::Challenger),
        "defender" => Ok(VoteCategory::Defender),
        "abstain" => Ok(VoteCategory::Abstain),
        other => Err(anyhow!("Corrupt vote category '{}'", other)),
    }
}

fn count(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("Column {} out of range: {}", column, value))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    // SQLite's datetime('now') has no timezone suffix; it is always UTC.
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_timestamps() {
        let ts = parse_timestamp("2024-03-01 12:30:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(count(-1, "stop_votes").is_err());
        assert_eq!(count(3, "stop_votes").unwrap(), 3);
    }

    #[test]
    fn unknown_category_is_corrupt() {
        let row = VoteRecordRow {
            voter_id: "u".into(),
            challenge_id: "c".into(),
            category: Some("blue".into()),
            stopped: false,
        };
        assert!(row.into_model().is_err());
    }
}
