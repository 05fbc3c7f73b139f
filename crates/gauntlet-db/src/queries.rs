use crate::Database;
use crate::models::{BallotCounts, ChallengeRow, ScoreboardRow, VoteRecordRow, category_str};
use anyhow::Result;
use rusqlite::Connection;

use gauntlet_types::models::{
    Ballot, Challenge, Outcome, ScoreDelta, ScoreboardEntry, VoteCategory, VoteRecord,
};

const CHALLENGE_COLUMNS: &str = "message_id, channel_id, challenger_id, challenger_name, \
     defender_id, defender_name, challenger_votes, defender_votes, abstain_votes, stop_votes, \
     outcome, closed, created_at, closed_at";

const SCOREBOARD_COLUMNS: &str = "user_id, username, total_challenge_wins, total_challenge_losses, \
     total_challenge_ties, total_challenges, successful_challenges, failed_challenges, \
     successful_defenses, failed_defenses";

impl Database {
    // -- Challenges --

    /// Insert a fresh challenge with zero tallies. Returns false if the
    /// message ID is already known.
    pub fn insert_challenge(
        &self,
        message_id: &str,
        channel_id: &str,
        challenger_id: &str,
        challenger_name: &str,
        defender_id: &str,
        defender_name: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO challenges
                    (message_id, channel_id, challenger_id, challenger_name,
                     defender_id, defender_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message_id,
                    channel_id,
                    challenger_id,
                    challenger_name,
                    defender_id,
                    defender_name
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_challenge(&self, message_id: &str) -> Result<Option<Challenge>> {
        self.with_conn(|conn| query_challenge(conn, message_id))?
            .map(ChallengeRow::into_model)
            .transpose()
    }

    /// Apply a relative change to one tally in a single statement.
    /// Refused (returns false) when the challenge is closed, unknown, or
    /// the tally would go negative.
    pub fn adjust_tally(&self, message_id: &str, ballot: Ballot, delta: i64) -> Result<bool> {
        let column = tally_column(ballot);
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE challenges SET {column} = {column} + ?1
                 WHERE message_id = ?2 AND closed = 0 AND {column} + ?1 >= 0"
            );
            let changed = conn.execute(&sql, rusqlite::params![delta, message_id])?;
            Ok(changed == 1)
        })
    }

    pub fn set_outcome(&self, message_id: &str, outcome: Outcome) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE challenges SET outcome = ?1 WHERE message_id = ?2",
                rusqlite::params![outcome.code(), message_id],
            )?;
            Ok(())
        })
    }

    /// Close an open challenge whose stop tally reached `quorum` and credit
    /// its outcome, all or nothing. Only the caller that performs the close
    /// gets `Some`; a failure leaves the challenge open for the next attempt.
    pub fn close_and_push<F>(
        &self,
        message_id: &str,
        quorum: u32,
        deltas: F,
    ) -> Result<Option<Challenge>>
    where
        F: FnOnce(Outcome) -> (ScoreDelta, ScoreDelta),
    {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE challenges SET closed = 1, closed_at = datetime('now')
                 WHERE message_id = ?1 AND closed = 0 AND stop_votes >= ?2",
                rusqlite::params![message_id, quorum],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            let Some(challenge) = query_challenge(tx, message_id)? else {
                anyhow::bail!("challenge {} vanished while closing", message_id);
            };
            let challenge = challenge.into_model()?;
            credit_participants(tx, &challenge, deltas)?;
            Ok(Some(challenge))
        })
    }

    // -- Scoreboard --

    /// Create an empty entry unless one exists. Never overwrites.
    pub fn insert_scoreboard_entry(&self, user_id: &str, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO scoreboard (user_id, username) VALUES (?1, ?2)",
                (user_id, username),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_scoreboard_entry(&self, user_id: &str) -> Result<Option<ScoreboardEntry>> {
        self.with_conn(|conn| query_scoreboard(conn, user_id))?
            .map(ScoreboardRow::into_model)
            .transpose()
    }

    // -- Vote records --

    pub fn get_vote_record(
        &self,
        voter_id: &str,
        challenge_id: &str,
    ) -> Result<Option<VoteRecord>> {
        self.with_conn(|conn| query_vote_record(conn, voter_id, challenge_id))?
            .map(VoteRecordRow::into_model)
            .transpose()
    }

    /// Record a vote category, creating the row if absent. Refused (false)
    /// when the voter already holds any category.
    pub fn set_vote_category(
        &self,
        voter_id: &str,
        challenge_id: &str,
        category: VoteCategory,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT INTO vote_records (voter_id, challenge_id, category, stopped)
                 VALUES (?1, ?2, ?3, 0)
                 ON CONFLICT(voter_id, challenge_id)
                 DO UPDATE SET category = excluded.category
                 WHERE vote_records.category IS NULL",
                (voter_id, challenge_id, category_str(category)),
            )?;
            Ok(changed == 1)
        })
    }

    /// Clear a vote category if it is the one held. The row is removed once
    /// it carries neither a vote nor a stop flag.
    pub fn clear_vote_category(
        &self,
        voter_id: &str,
        challenge_id: &str,
        category: VoteCategory,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE vote_records SET category = NULL
                 WHERE voter_id = ?1 AND challenge_id = ?2 AND category = ?3",
                (voter_id, challenge_id, category_str(category)),
            )?;
            if changed == 0 {
                return Ok(false);
            }

            conn.execute(
                "DELETE FROM vote_records
                 WHERE voter_id = ?1 AND challenge_id = ?2 AND category IS NULL AND stopped = 0",
                (voter_id, challenge_id),
            )?;
            Ok(true)
        })
    }

    /// Toggle the stop flag. Returns false if it was already in the requested
    /// state. Clearing never deletes the row.
    pub fn set_stop_flag(&self, voter_id: &str, challenge_id: &str, stopped: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = if stopped {
                conn.execute(
                    "INSERT INTO vote_records (voter_id, challenge_id, stopped)
                     VALUES (?1, ?2, 1)
                     ON CONFLICT(voter_id, challenge_id)
                     DO UPDATE SET stopped = 1
                     WHERE vote_records.stopped = 0",
                    (voter_id, challenge_id),
                )?
            } else {
                conn.execute(
                    "UPDATE vote_records SET stopped = 0
                     WHERE voter_id = ?1 AND challenge_id = ?2 AND stopped = 1",
                    (voter_id, challenge_id),
                )?
            };
            Ok(changed == 1)
        })
    }

    /// Count ledger rows per category, for checking tallies against the ledger.
    pub fn count_ballots(&self, challenge_id: &str) -> Result<BallotCounts> {
        self.with_conn(|conn| {
            let (challenger, defender, abstain, stop): (u32, u32, u32, u32) = conn.query_row(
                "SELECT
                    COALESCE(SUM(category = 'challenger'), 0),
                    COALESCE(SUM(category = 'defender'), 0),
                    COALESCE(SUM(category = 'abstain'), 0),
                    COALESCE(SUM(stopped = 1), 0)
                 FROM vote_records WHERE challenge_id = ?1",
                [challenge_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
            Ok(BallotCounts {
                challenger,
                defender,
                abstain,
                stop,
            })
        })
    }
}

/// Recreate missing entries, then add each participant's delta.
fn credit_participants<F>(conn: &Connection, challenge: &Challenge, deltas: F) -> Result<()>
where
    F: FnOnce(Outcome) -> (ScoreDelta, ScoreDelta),
{
    let (challenger_delta, defender_delta) = deltas(challenge.outcome);
    for (user_id, username, delta) in [
        (&challenge.challenger_id, &challenge.challenger_name, challenger_delta),
        (&challenge.defender_id, &challenge.defender_name, defender_delta),
    ] {
        conn.execute(
            "INSERT OR IGNORE INTO scoreboard (user_id, username) VALUES (?1, ?2)",
            (user_id, username),
        )?;
        let changed = conn.execute(
            "UPDATE scoreboard SET
                total_challenge_wins   = total_challenge_wins + ?1,
                total_challenge_losses = total_challenge_losses + ?2,
                total_challenge_ties   = total_challenge_ties + ?3,
                total_challenges       = total_challenges + ?4,
                successful_challenges  = successful_challenges + ?5,
                failed_challenges      = failed_challenges + ?6,
                successful_defenses    = successful_defenses + ?7,
                failed_defenses        = failed_defenses + ?8
             WHERE user_id = ?9",
            rusqlite::params![
                delta.wins,
                delta.losses,
                delta.ties,
                delta.total(),
                delta.successful_challenges,
                delta.failed_challenges,
                delta.successful_defenses,
                delta.failed_defenses,
                user_id
            ],
        )?;
        if changed != 1 {
            anyhow::bail!("scoreboard entry for {} missing after insert", user_id);
        }
    }
    Ok(())
}

fn tally_column(ballot: Ballot) -> &'static str {
    match ballot {
        Ballot::Vote(VoteCategory::Challenger) => "challenger_votes",
        Ballot::Vote(VoteCategory::Defender) => "defender_votes",
        Ballot::Vote(VoteCategory::Abstain) => "abstain_votes",
        Ballot::Stop => "stop_votes",
    }
}

fn query_challenge(conn: &Connection, message_id: &str) -> Result<Option<ChallengeRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE message_id = ?1"
    ))?;

    let row = stmt
        .query_row([message_id], |row| {
            Ok(ChallengeRow {
                message_id: row.get(0)?,
                channel_id: row.get(1)?,
                challenger_id: row.get(2)?,
                challenger_name: row.get(3)?,
                defender_id: row.get(4)?,
                defender_name: row.get(5)?,
                challenger_votes: row.get(6)?,
                defender_votes: row.get(7)?,
                abstain_votes: row.get(8)?,
                stop_votes: row.get(9)?,
                outcome: row.get(10)?,
                closed: row.get(11)?,
                created_at: row.get(12)?,
                closed_at: row.get(13)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_scoreboard(conn: &Connection, user_id: &str) -> Result<Option<ScoreboardRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCOREBOARD_COLUMNS} FROM scoreboard WHERE user_id = ?1"
    ))?;

    let row = stmt
        .query_row([user_id], |row| {
            Ok(ScoreboardRow {
                user_id: row.get(0)?,
                username: row.get(1)?,
                total_challenge_wins: row.get(2)?,
                total_challenge_losses: row.get(3)?,
                total_challenge_ties: row.get(4)?,
                total_challenges: row.get(5)?,
                successful_challenges: row.get(6)?,
                failed_challenges: row.get(7)?,
                successful_defenses: row.get(8)?,
                failed_defenses: row.get(9)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_vote_record(
    conn: &Connection,
    voter_id: &str,
    challenge_id: &str,
) -> Result<Option<VoteRecordRow>> {
    let mut stmt = conn.prepare(
        "SELECT voter_id, challenge_id, category, stopped FROM vote_records
         WHERE voter_id = ?1 AND challenge_id = ?2",
    )?;

    let row = stmt
        .query_row([voter_id, challenge_id], |row| {
            Ok(VoteRecordRow {
                voter_id: row.get(0)?,
                challenge_id: row.get(1)?,
                category: row.get(2)?,
                stopped: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_challenge("m1", "c1", "u1", "gabe", "u2", "miia").unwrap());
        db
    }

    #[test]
    fn challenge_insert_is_create_if_missing() {
        let db = seeded();
        assert!(!db.insert_challenge("m1", "c1", "u9", "other", "u8", "other").unwrap());

        let challenge = db.get_challenge("m1").unwrap().unwrap();
        assert_eq!(challenge.challenger_id, "u1");
        assert_eq!(challenge.defender_name, "miia");
        assert_eq!(challenge.outcome, Outcome::Tie);
        assert_eq!(challenge.stop_votes, 0);
        assert!(!challenge.closed);
        assert!(db.get_challenge("missing").unwrap().is_none());
    }

    #[test]
    fn tally_never_goes_negative() {
        let db = seeded();
        assert!(!db.adjust_tally("m1", Ballot::Vote(VoteCategory::Defender), -1).unwrap());
        assert!(db.adjust_tally("m1", Ballot::Vote(VoteCategory::Defender), 1).unwrap());
        assert!(db.adjust_tally("m1", Ballot::Vote(VoteCategory::Defender), -1).unwrap());
        assert_eq!(db.get_challenge("m1").unwrap().unwrap().defender_votes, 0);
    }

    fn win_for_challenger(_: Outcome) -> (ScoreDelta, ScoreDelta) {
        let challenger = ScoreDelta {
            wins: 1,
            successful_challenges: 1,
            ..ScoreDelta::default()
        };
        let defender = ScoreDelta {
            losses: 1,
            failed_defenses: 1,
            ..ScoreDelta::default()
        };
        (challenger, defender)
    }

    #[test]
    fn close_fires_once_and_freezes_tallies() {
        let db = seeded();
        db.adjust_tally("m1", Ballot::Stop, 1).unwrap();
        assert!(db.close_and_push("m1", 2, win_for_challenger).unwrap().is_none());

        db.adjust_tally("m1", Ballot::Stop, 1).unwrap();
        let closed = db.close_and_push("m1", 2, win_for_challenger).unwrap().unwrap();
        assert!(closed.closed);
        assert!(db.close_and_push("m1", 2, win_for_challenger).unwrap().is_none());

        assert!(!db.adjust_tally("m1", Ballot::Stop, -1).unwrap());
        let challenge = db.get_challenge("m1").unwrap().unwrap();
        assert!(challenge.closed);
        assert!(challenge.closed_at.is_some());
        assert_eq!(challenge.stop_votes, 2);

        let challenger = db.get_scoreboard_entry("u1").unwrap().unwrap();
        assert_eq!(challenger.total_challenge_wins, 1);
        assert_eq!(challenger.total_challenges, 1);
        let defender = db.get_scoreboard_entry("u2").unwrap().unwrap();
        assert_eq!(defender.failed_defenses, 1);
        assert!(defender.is_consistent());
    }

    #[test]
    fn failed_credit_rolls_back_close() {
        let db = seeded();
        db.adjust_tally("m1", Ballot::Stop, 2).unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TEMP TRIGGER reject_defender BEFORE UPDATE ON scoreboard
                 WHEN NEW.user_id = 'u2'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.close_and_push("m1", 2, win_for_challenger).is_err());
        let challenge = db.get_challenge("m1").unwrap().unwrap();
        assert!(!challenge.closed);
        assert!(challenge.closed_at.is_none());
        assert!(db.get_scoreboard_entry("u1").unwrap().is_none());
        assert!(db.get_scoreboard_entry("u2").unwrap().is_none());

        db.with_conn(|conn| Ok(conn.execute_batch("DROP TRIGGER reject_defender;")?))
            .unwrap();
        assert!(db.close_and_push("m1", 2, win_for_challenger).unwrap().is_some());
        assert_eq!(db.get_scoreboard_entry("u1").unwrap().unwrap().total_challenge_wins, 1);
        assert_eq!(db.get_scoreboard_entry("u2").unwrap().unwrap().total_challenge_losses, 1);
    }

    #[test]
    fn scoreboard_insert_never_overwrites() {
        let db = seeded();
        assert!(db.insert_scoreboard_entry("u1", "gabe").unwrap());
        db.adjust_tally("m1", Ballot::Stop, 2).unwrap();
        assert!(db.close_and_push("m1", 2, win_for_challenger).unwrap().is_some());
        assert!(!db.insert_scoreboard_entry("u1", "renamed").unwrap());

        let entry = db.get_scoreboard_entry("u1").unwrap().unwrap();
        assert_eq!(entry.username, "gabe");
        assert_eq!(entry.total_challenge_wins, 1);
        assert_eq!(entry.total_challenges, 1);
        assert!(entry.is_consistent());

        // The defender's entry is recreated by the push.
        assert_eq!(db.get_scoreboard_entry("u2").unwrap().unwrap().username, "miia");
    }

    #[test]
    fn vote_category_is_exclusive() {
        let db = seeded();
        assert!(db.set_vote_category("u3", "m1", VoteCategory::Challenger).unwrap());
        assert!(!db.set_vote_category("u3", "m1", VoteCategory::Defender).unwrap());

        let record = db.get_vote_record("u3", "m1").unwrap().unwrap();
        assert_eq!(record.category, Some(VoteCategory::Challenger));
        assert!(!record.stopped);
    }

    #[test]
    fn clearing_vote_keeps_stop_flag() {
        let db = seeded();
        db.set_vote_category("u3", "m1", VoteCategory::Abstain).unwrap();
        assert!(db.set_stop_flag("u3", "m1", true).unwrap());

        assert!(!db.clear_vote_category("u3", "m1", VoteCategory::Defender).unwrap());
        assert!(db.clear_vote_category("u3", "m1", VoteCategory::Abstain).unwrap());

        let record = db.get_vote_record("u3", "m1").unwrap().unwrap();
        assert_eq!(record.category, None);
        assert!(record.stopped);
    }

    #[test]
    fn clearing_last_ballot_removes_row() {
        let db = seeded();
        db.set_vote_category("u3", "m1", VoteCategory::Challenger).unwrap();
        db.clear_vote_category("u3", "m1", VoteCategory::Challenger).unwrap();
        assert!(db.get_vote_record("u3", "m1").unwrap().is_none());
    }

    #[test]
    fn stop_flag_toggles_in_place() {
        let db = seeded();
        assert!(!db.set_stop_flag("u4", "m1", false).unwrap());
        assert!(db.set_stop_flag("u4", "m1", true).unwrap());
        assert!(!db.set_stop_flag("u4", "m1", true).unwrap());
        assert!(db.set_stop_flag("u4", "m1", false).unwrap());

        let record = db.get_vote_record("u4", "m1").unwrap().unwrap();
        assert!(!record.stopped);
        assert_eq!(record.category, None);
    }

    #[test]
    fn ballots_are_counted_per_category() {
        let db = seeded();
        db.set_vote_category("u1", "m1", VoteCategory::Challenger).unwrap();
        db.set_vote_category("u3", "m1", VoteCategory::Challenger).unwrap();
        db.set_vote_category("u4", "m1", VoteCategory::Defender).unwrap();
        db.set_stop_flag("u2", "m1", true).unwrap();

        let counts = db.count_ballots("m1").unwrap();
        assert_eq!(
            counts,
            BallotCounts {
                challenger: 2,
                defender: 1,
                abstain: 0,
                stop: 1
            }
        );
    }

    #[test]
    fn vote_on_unknown_challenge_is_rejected_by_store() {
        let db = seeded();
        assert!(db.set_vote_category("u3", "nope", VoteCategory::Challenger).is_err());
    }
}
